use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;

use crate::config::Config;
use crate::models::DeviceSession;
use crate::notify::Notification;

use super::{device_token, PushError, PushSender};

/// VAPID tokens may live for at most 24h; stay well under that.
const VAPID_TOKEN_LIFETIME_SECS: i64 = 12 * 60 * 60;

#[derive(Serialize)]
struct VapidClaims<'a> {
    aud: String,
    exp: i64,
    sub: &'a str,
}

/// Web Push sender. The device token is the full subscription endpoint
/// URL; each send is signed with a VAPID token scoped to the endpoint's
/// origin. The request body stays empty: the push is a wake-up signal and
/// clients fetch actual content over the API.
pub struct WebPushSender {
    client: reqwest::Client,
    subject: String,
    public_key: String,
    key: EncodingKey,
}

impl WebPushSender {
    pub fn from_config(config: &Config, client: reqwest::Client) -> Option<Self> {
        let key_path = config.vapid_key_path.as_deref()?;
        let public_key = config.vapid_public_key.clone()?;

        let pem = match std::fs::read(key_path) {
            Ok(pem) => pem,
            Err(err) => {
                tracing::warn!("Web Push disabled, cannot read VAPID key {key_path}: {err}");
                return None;
            }
        };
        let key = match EncodingKey::from_ec_pem(&pem) {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!("Web Push disabled, invalid VAPID key {key_path}: {err}");
                return None;
            }
        };

        Some(Self {
            client,
            subject: config.vapid_subject.clone(),
            public_key,
            key,
        })
    }
}

#[async_trait]
impl PushSender for WebPushSender {
    async fn send(
        &self,
        _notification: &Notification,
        session: &DeviceSession,
    ) -> Result<(), PushError> {
        let endpoint = device_token(session)?;
        let url = url::Url::parse(endpoint)
            .map_err(|err| PushError::BadToken(format!("bad subscription endpoint: {err}")))?;

        let claims = VapidClaims {
            aud: url.origin().ascii_serialization(),
            exp: chrono::Utc::now().timestamp() + VAPID_TOKEN_LIFETIME_SECS,
            sub: &self.subject,
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::ES256), &claims, &self.key)?;

        let response = self
            .client
            .post(endpoint)
            .header("Authorization", format!("vapid t={}, k={}", token, self.public_key))
            .header("TTL", "86400")
            .header("Urgency", "high")
            .body(Vec::new())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PushError::Status(response.status()));
        }
        Ok(())
    }
}
