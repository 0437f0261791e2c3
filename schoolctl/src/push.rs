//! Browser push delivery through a push relay.
//!
//! Each staff member and the super admin may store one browser subscription (the JSON the
//! browser hands out, with an `endpoint`). A push is a JSON `{title, body, url}` POSTed to that
//! endpoint, signed the same way as Standard Webhooks:
//!
//! - Signature is computed over `{msg_id}.{timestamp}.{payload}`
//! - The signature is base64-encoded HMAC-SHA256, sent as `v1,{signature}`
//! - Headers: `webhook-id`, `webhook-timestamp`, `webhook-signature`, plus `TTL`
//!
//! A `404` or `410` from the endpoint means the browser unsubscribed; the stored subscription
//! is deleted. Every other failure is logged and dropped.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use serde::Serialize;
use sha2::Sha256;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::PushConfig;
use crate::db::handlers::PushSubscriptions;
use crate::types::ParticipantRef;

type HmacSha256 = Hmac<Sha256>;

/// Prefix for base64-encoded signing secrets
pub const SECRET_PREFIX: &str = "whsec_";

/// Raw key bytes for a signing secret: `whsec_`-prefixed secrets are base64 decoded, anything
/// else is used as-is.
pub fn decode_secret(secret: &str) -> Vec<u8> {
    secret
        .strip_prefix(SECRET_PREFIX)
        .and_then(|encoded| BASE64_STANDARD.decode(encoded).ok())
        .unwrap_or_else(|| secret.as_bytes().to_vec())
}

/// Sign a payload, returning `v1,{base64-hmac-sha256}`
pub fn sign_payload(msg_id: &str, timestamp: i64, payload: &str, secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(&decode_secret(secret)).ok()?;
    mac.update(format!("{msg_id}.{timestamp}.{payload}").as_bytes());
    let signature = mac.finalize().into_bytes();

    Some(format!("v1,{}", BASE64_STANDARD.encode(signature)))
}

/// What the browser shows
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub url: String,
}

/// Result of a single delivery attempt
#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    Delivered,
    /// Push disabled, or the recipient has no subscription
    Skipped,
    /// The subscription is gone and was removed
    Expired,
    Failed(String),
}

pub struct PushDispatcher {
    config: PushConfig,
    http_client: reqwest::Client,
}

/// Make sure a rustls crypto provider is installed before a TLS client is built.
///
/// The binary installs aws-lc-rs at startup; library and test callers may not have.
pub fn ensure_crypto_provider() -> anyhow::Result<()> {
    if rustls::crypto::CryptoProvider::get_default().is_some() {
        return Ok(());
    }
    // Losing a race to another installer is fine, as long as some provider ends up installed
    if rustls::crypto::aws_lc_rs::default_provider().install_default().is_err()
        && rustls::crypto::CryptoProvider::get_default().is_none()
    {
        anyhow::bail!("Failed to install the rustls crypto provider");
    }
    Ok(())
}

impl PushDispatcher {
    pub fn new(config: &PushConfig) -> anyhow::Result<Self> {
        ensure_crypto_provider()?;
        let http_client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config: config.clone(),
            http_client,
        })
    }

    /// Public key browsers need to subscribe, if configured
    pub fn vapid_public_key(&self) -> Option<&str> {
        self.config.vapid_public_key.as_deref().filter(|k| !k.is_empty())
    }

    /// Deliver to whatever subscription `recipient` has stored
    pub async fn send_to(&self, pool: &PgPool, recipient: ParticipantRef, message: &PushMessage) -> PushOutcome {
        if !self.config.enabled {
            return PushOutcome::Skipped;
        }

        let subscription = match pool.acquire().await {
            Ok(mut conn) => PushSubscriptions::new(&mut conn).get(recipient).await,
            Err(e) => {
                tracing::warn!(recipient = %recipient, "Failed to acquire connection for push: {}", e);
                return PushOutcome::Failed(e.to_string());
            }
        };
        let subscription = match subscription {
            Ok(Some(subscription)) => subscription,
            Ok(None) => return PushOutcome::Skipped,
            Err(e) => {
                tracing::warn!(recipient = %recipient, "Failed to load push subscription: {}", e);
                return PushOutcome::Failed(e.to_string());
            }
        };

        let outcome = self.deliver(&subscription.subscription_json, message).await;
        if outcome == PushOutcome::Expired {
            tracing::info!(recipient = %recipient, "Push subscription expired, removing it");
            let deleted = match pool.acquire().await {
                Ok(mut conn) => PushSubscriptions::new(&mut conn).delete(subscription.id).await.map(|_| ()),
                Err(e) => Err(e.into()),
            };
            if let Err(e) = deleted {
                tracing::warn!(recipient = %recipient, "Failed to delete expired push subscription: {}", e);
            }
        }
        outcome
    }

    /// POST the signed message to the subscription's endpoint
    pub async fn deliver(&self, subscription: &serde_json::Value, message: &PushMessage) -> PushOutcome {
        let Some(endpoint) = subscription.get("endpoint").and_then(|e| e.as_str()) else {
            return PushOutcome::Failed("subscription has no endpoint".to_string());
        };

        let body = match serde_json::to_string(message) {
            Ok(body) => body,
            Err(e) => return PushOutcome::Failed(e.to_string()),
        };
        let msg_id = format!("msg_{}", Uuid::new_v4().simple());
        let timestamp = Utc::now().timestamp();

        let mut request = self
            .http_client
            .post(endpoint)
            .header("Content-Type", "application/json")
            .header("TTL", self.config.ttl.as_secs().to_string())
            .header("webhook-id", &msg_id)
            .header("webhook-timestamp", timestamp.to_string())
            .header("webhook-version", "1");
        if let Some(signature) = self
            .config
            .signing_secret
            .as_deref()
            .and_then(|secret| sign_payload(&msg_id, timestamp, &body, secret))
        {
            request = request.header("webhook-signature", signature);
        }

        match request.body(body).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(msg_id = %msg_id, "Push delivered");
                PushOutcome::Delivered
            }
            Ok(response) if matches!(response.status(), StatusCode::NOT_FOUND | StatusCode::GONE) => PushOutcome::Expired,
            Ok(response) => {
                let status = response.status().as_u16();
                tracing::warn!(msg_id = %msg_id, status, "Push relay rejected message");
                PushOutcome::Failed(format!("HTTP {status}"))
            }
            Err(e) => {
                tracing::warn!(msg_id = %msg_id, "Push delivery failed: {}", e);
                PushOutcome::Failed(e.to_string())
            }
        }
    }
}
