// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device-code authentication against the identity provider.
//!
//! The provider scopes permissions by client credential pair: the pair that
//! supports the public device-code grant may not be allowed to mint durable
//! device credentials, and vice versa. The pairing is therefore an ordered,
//! operator-configurable list ([`AuthClientSet`]) rather than constants;
//! [`flow::DeviceAuthFlow`] walks it when the primary client is refused.

pub mod flow;
pub mod provider;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// One client credential pair registered with the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthClient {
    /// Display name for logs and config (`switch`, `android`, ...).
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    /// Whether this pair holds the permission to mint device credentials.
    #[serde(default)]
    pub can_create_device_auth: bool,
}

impl AuthClient {
    /// HTTP Basic token for this pair (`base64(id:secret)`).
    pub fn basic_token(&self) -> String {
        STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret))
    }
}

/// Ordered client list: the first entry drives the device-code grant, the
/// remaining device-auth-capable entries are tried in order when the primary
/// is refused permission to mint credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthClientSet {
    pub clients: Vec<AuthClient>,
}

impl Default for AuthClientSet {
    /// The pairing the provider currently honors: a console client for the
    /// device-code grant, mobile clients for minting device credentials.
    fn default() -> Self {
        Self {
            clients: vec![
                AuthClient {
                    name: "switch".into(),
                    client_id: "98f7e42c2e3a4f86a74eb43fbb41ed39".into(),
                    client_secret: "0a2449a2-001a-451e-afec-3e812901c4d7".into(),
                    can_create_device_auth: false,
                },
                AuthClient {
                    name: "android".into(),
                    client_id: "3f69e56c7649492c8cc29f1af08a8a12".into(),
                    client_secret: "b51ee9cb12234f50a69efa67ef53812e".into(),
                    can_create_device_auth: true,
                },
                AuthClient {
                    name: "ios".into(),
                    client_id: "3446cd72694c4a4485d81b77adbb2141".into(),
                    client_secret: "9209d4a5e25a457fb9b07489d313b41a".into(),
                    can_create_device_auth: true,
                },
            ],
        }
    }
}

impl AuthClientSet {
    /// Load an operator-supplied list from a JSON file.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let set: Self = serde_json::from_str(&contents)?;
        if set.clients.is_empty() {
            anyhow::bail!("auth client list is empty: {}", path.display());
        }
        Ok(set)
    }

    /// The client that drives the device-code grant.
    pub fn primary(&self) -> &AuthClient {
        // Construction guarantees at least one entry.
        &self.clients[0]
    }

    /// Clients to try, in order, when minting device credentials needs a
    /// different pair than the primary.
    pub fn device_auth_fallbacks(&self) -> impl Iterator<Item = &AuthClient> {
        self.clients.iter().skip(1).filter(|c| c.can_create_device_auth)
    }

    /// Default client token for replaying a device-auth grant when the
    /// stored bundle predates `client_token_used`.
    pub fn default_verify_token(&self) -> String {
        self.device_auth_fallbacks()
            .next()
            .unwrap_or_else(|| self.primary())
            .basic_token()
    }
}

/// The durable secret triple plus the client pair required to redeem it.
/// `client_token_used` must travel with the secret: liveness checks replay
/// the device-auth grant through the same client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBundle {
    pub device_id: String,
    pub account_id: String,
    pub secret: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_token_used: Option<String>,
}

/// Device authorization response from the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    pub user_code: String,
    #[serde(default)]
    pub verification_uri: Option<String>,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
}

fn default_expires_in() -> u64 {
    600
}

fn default_interval() -> u64 {
    5
}

/// Token endpoint response. `account_id` and `display_name` are present on
/// user grants (`device_code`, `exchange_code`, `device_auth`), absent on
/// `client_credentials`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
}

/// Device-credential creation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAuthResponse {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(rename = "accountId")]
    pub account_id: String,
    pub secret: String,
}

/// One pending device-code login, shown to the requesting user.
#[derive(Debug, Clone)]
pub struct DeviceCodeSession {
    pub device_code: String,
    pub user_code: String,
    pub verification_link: String,
    /// Absolute budget in seconds from flow start.
    pub expires_in: u64,
    /// Poll interval in seconds requested by the provider.
    pub interval: u64,
}
