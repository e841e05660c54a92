// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Epoch helpers and human-readable durations.

/// Return current epoch seconds.
pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Seconds left before a session times out, clamped at zero.
pub fn remaining_secs(last_activity: u64, timeout_minutes: u32, now: u64) -> u64 {
    let deadline = last_activity.saturating_add(u64::from(timeout_minutes) * 60);
    deadline.saturating_sub(now)
}

/// Format an elapsed duration as `2h 5m 3s` / `5m 3s` / `3s`.
pub fn format_uptime(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Format remaining time as `12m 30s` / `45s`, floor `0s`.
pub fn format_remaining(secs: u64) -> String {
    let minutes = secs / 60;
    let seconds = secs % 60;
    if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
#[path = "timefmt_tests.rs"]
mod timefmt_tests;
