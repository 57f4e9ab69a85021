use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::models::DeviceSession;
use crate::notify::Notification;

use super::{alert_body, alert_title, device_token, PushError, PushSender};

/// APNs accepts provider tokens for up to an hour; refresh well inside
/// that window.
const PROVIDER_TOKEN_LIFETIME: Duration = Duration::from_secs(40 * 60);

#[derive(Serialize)]
struct ProviderClaims<'a> {
    iss: &'a str,
    iat: i64,
}

/// Token-based APNs HTTP/2 provider. One ES256 provider token is shared
/// across sends and refreshed on expiry.
pub struct ApnsSender {
    client: reqwest::Client,
    endpoint: String,
    topic: String,
    team_id: String,
    key_id: String,
    key: EncodingKey,
    cached_token: Mutex<Option<(Instant, String)>>,
}

impl ApnsSender {
    /// Returns None unless every APNs credential is configured.
    pub fn from_config(config: &Config, client: reqwest::Client) -> Option<Self> {
        let key_path = config.apns_key_path.as_deref()?;
        let key_id = config.apns_key_id.clone()?;
        let team_id = config.apns_team_id.clone()?;
        let topic = config.apns_topic.clone()?;

        let pem = match std::fs::read(key_path) {
            Ok(pem) => pem,
            Err(err) => {
                tracing::warn!("APNs disabled, cannot read signing key {key_path}: {err}");
                return None;
            }
        };
        let key = match EncodingKey::from_ec_pem(&pem) {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!("APNs disabled, invalid signing key {key_path}: {err}");
                return None;
            }
        };

        Some(Self {
            client,
            endpoint: config.apns_endpoint.clone(),
            topic,
            team_id,
            key_id,
            key,
            cached_token: Mutex::new(None),
        })
    }

    async fn provider_token(&self) -> Result<String, PushError> {
        let mut cached = self.cached_token.lock().await;
        if let Some((issued_at, token)) = cached.as_ref() {
            if issued_at.elapsed() < PROVIDER_TOKEN_LIFETIME {
                return Ok(token.clone());
            }
        }

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id.clone());
        let claims = ProviderClaims {
            iss: &self.team_id,
            iat: chrono::Utc::now().timestamp(),
        };
        let token = jsonwebtoken::encode(&header, &claims, &self.key)?;
        *cached = Some((Instant::now(), token.clone()));
        Ok(token)
    }
}

#[async_trait]
impl PushSender for ApnsSender {
    async fn send(
        &self,
        notification: &Notification,
        session: &DeviceSession,
    ) -> Result<(), PushError> {
        let device_token = device_token(session)?;
        let provider_token = self.provider_token().await?;

        let body = serde_json::json!({
            "aps": {
                "alert": {
                    "title": alert_title(notification),
                    "body": alert_body(notification),
                },
                "sound": "default",
            },
            "event": notification.event,
            "source": notification.source,
            "payload": notification.payload,
        });

        let url = format!("{}/3/device/{}", self.endpoint, device_token);
        let response = self
            .client
            .post(&url)
            .bearer_auth(provider_token)
            .header("apns-topic", &self.topic)
            .header("apns-push-type", "alert")
            .header("apns-priority", "10")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PushError::Status(response.status()));
        }
        Ok(())
    }
}
