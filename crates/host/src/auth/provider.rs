// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin HTTP client for the identity provider's OAuth surface.
//!
//! One method per grant. Error bodies are classified by the substrings the
//! provider is known to emit; callers decide which classes are retryable.

use std::time::Duration;

use reqwest::StatusCode;

use crate::auth::{AuthClient, DeviceAuthResponse, DeviceCodeResponse, TokenResponse};
use crate::error::AuthError;

/// Provider endpoints. All overridable so tests can point at a local fake.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    pub token_url: String,
    pub device_authorization_url: String,
    pub exchange_url: String,
    /// Base for `POST {base}/account/{account_id}/deviceAuth`.
    pub account_service_url: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            token_url: "https://account-public-service-prod.ol.epicgames.com/account/api/oauth/token".into(),
            device_authorization_url: "https://account-public-service-prod03.ol.epicgames.com/account/api/oauth/deviceAuthorization".into(),
            exchange_url: "https://account-public-service-prod.ol.epicgames.com/account/api/oauth/exchange".into(),
            account_service_url: "https://account-public-service-prod.ol.epicgames.com/account/api/public".into(),
        }
    }
}

/// Reqwest-backed identity provider client.
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    endpoints: ProviderEndpoints,
}

impl IdentityClient {
    pub fn new(endpoints: ProviderEndpoints) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            endpoints,
        }
    }

    /// `grant_type=client_credentials` with a client pair.
    pub async fn client_credentials(&self, client: &AuthClient) -> Result<TokenResponse, AuthError> {
        let resp = self
            .http
            .post(&self.endpoints.token_url)
            .header("Authorization", format!("Basic {}", client.basic_token()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if resp.status().is_success() {
            return Ok(resp.json().await?);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(AuthError::Provider(format!("failed to get client token: {}", truncate(&body, 200))))
    }

    /// Request a device code (`prompt=login`) using a service-level token.
    pub async fn request_device_code(&self, bearer: &str) -> Result<DeviceCodeResponse, AuthError> {
        let resp = self
            .http
            .post(&self.endpoints.device_authorization_url)
            .header("Authorization", format!("Bearer {bearer}"))
            .form(&[("prompt", "login")])
            .send()
            .await?;

        if resp.status().is_success() {
            return Ok(resp.json().await?);
        }
        let body = resp.text().await.unwrap_or_default();
        if body.contains("unsupported_grant_type") {
            return Err(AuthError::UnsupportedGrant);
        }
        Err(AuthError::Provider(format!(
            "failed to start authentication: {}",
            truncate(&body, 200)
        )))
    }

    /// One poll attempt: `grant_type=device_code`.
    ///
    /// HTTP 400 bodies carry the RFC 8628 state machine
    /// (`authorization_pending`, `slow_down`, `expired`, `access_denied`);
    /// any other failing status is reported as [`AuthError::Provider`].
    pub async fn redeem_device_code(
        &self,
        client: &AuthClient,
        device_code: &str,
    ) -> Result<TokenResponse, AuthError> {
        let resp = self
            .http
            .post(&self.endpoints.token_url)
            .header("Authorization", format!("Basic {}", client.basic_token()))
            .form(&[("grant_type", "device_code"), ("device_code", device_code)])
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }
        let body = resp.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST {
            return Err(classify_grant_error(&body));
        }
        Err(AuthError::Provider(format!("unexpected poll response ({status}): {}", truncate(&body, 200))))
    }

    /// Request a short-lived exchange code with a user access token.
    pub async fn exchange_code(&self, bearer: &str) -> Result<String, AuthError> {
        let resp = self
            .http
            .get(&self.endpoints.exchange_url)
            .header("Authorization", format!("Bearer {bearer}"))
            .send()
            .await?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::Provider(format!(
                "failed to get exchange code: {}",
                truncate(&body, 200)
            )));
        }

        #[derive(serde::Deserialize)]
        struct Exchange {
            code: String,
        }
        let exchange: Exchange = resp.json().await?;
        Ok(exchange.code)
    }

    /// Redeem an exchange code against a (fallback) client pair.
    pub async fn redeem_exchange_code(
        &self,
        client: &AuthClient,
        code: &str,
    ) -> Result<TokenResponse, AuthError> {
        let resp = self
            .http
            .post(&self.endpoints.token_url)
            .header("Authorization", format!("Basic {}", client.basic_token()))
            .form(&[("grant_type", "exchange_code"), ("exchange_code", code)])
            .send()
            .await?;

        if resp.status().is_success() {
            return Ok(resp.json().await?);
        }
        let body = resp.text().await.unwrap_or_default();
        if body.contains("client_disabled") {
            return Err(AuthError::ClientDisabled);
        }
        Err(AuthError::Provider(format!(
            "failed to redeem exchange code: {}",
            truncate(&body, 200)
        )))
    }

    /// Mint durable device credentials for an account.
    pub async fn create_device_auth(
        &self,
        bearer: &str,
        account_id: &str,
    ) -> Result<DeviceAuthResponse, AuthError> {
        let url = format!("{}/account/{account_id}/deviceAuth", self.endpoints.account_service_url);
        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {bearer}"))
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }
        let body = resp.text().await.unwrap_or_default();
        if status == StatusCode::FORBIDDEN || body.to_lowercase().contains("permission") {
            return Err(AuthError::MissingPermission);
        }
        Err(AuthError::Provider(format!(
            "failed to create device credentials ({status}): {}",
            truncate(&body, 200)
        )))
    }

    /// Replay a device-auth grant with a stored basic token. Used by
    /// liveness checks.
    pub async fn device_auth_grant(
        &self,
        basic_token: &str,
        device_id: &str,
        account_id: &str,
        secret: &str,
    ) -> Result<TokenResponse, AuthError> {
        let resp = self
            .http
            .post(&self.endpoints.token_url)
            .header("Authorization", format!("Basic {basic_token}"))
            .form(&[
                ("grant_type", "device_auth"),
                ("device_id", device_id),
                ("account_id", account_id),
                ("secret", secret),
            ])
            .send()
            .await?;

        if resp.status().is_success() {
            return Ok(resp.json().await?);
        }
        let body = resp.text().await.unwrap_or_default();
        if body.contains("invalid_grant") {
            return Err(AuthError::InvalidGrant);
        }
        if body.contains("client_disabled") {
            return Err(AuthError::ClientDisabled);
        }
        Err(AuthError::Provider(format!("verification failed: {}", truncate(&body, 100))))
    }
}

/// Map an HTTP 400 token-endpoint body onto the grant state machine.
fn classify_grant_error(body: &str) -> AuthError {
    if body.contains("authorization_pending") {
        AuthError::Pending
    } else if body.contains("slow_down") {
        AuthError::SlowDown
    } else if body.contains("expired_token") || body.contains("expired") {
        AuthError::Expired
    } else if body.contains("access_denied") {
        AuthError::Denied
    } else if body.contains("invalid_grant") {
        AuthError::InvalidGrant
    } else if body.contains("client_disabled") {
        AuthError::ClientDisabled
    } else if body.contains("unsupported_grant_type") {
        AuthError::UnsupportedGrant
    } else {
        AuthError::Provider(truncate(body, 200).to_owned())
    }
}

/// Byte-bounded truncation that never splits a UTF-8 character.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
