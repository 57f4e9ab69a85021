use async_trait::async_trait;

use crate::config::Config;
use crate::models::DeviceSession;
use crate::notify::Notification;

use super::{alert_body, alert_title, device_token, PushError, PushSender};

/// FCM legacy HTTP sender authenticated with a server key.
pub struct FcmSender {
    client: reqwest::Client,
    endpoint: String,
    server_key: String,
}

impl FcmSender {
    pub fn from_config(config: &Config, client: reqwest::Client) -> Option<Self> {
        let server_key = config.fcm_server_key.clone()?;
        Some(Self {
            client,
            endpoint: config.fcm_endpoint.clone(),
            server_key,
        })
    }
}

#[async_trait]
impl PushSender for FcmSender {
    async fn send(
        &self,
        notification: &Notification,
        session: &DeviceSession,
    ) -> Result<(), PushError> {
        let device_token = device_token(session)?;

        let body = serde_json::json!({
            "to": device_token,
            "priority": "high",
            "notification": {
                "title": alert_title(notification),
                "body": alert_body(notification),
            },
            "data": {
                "event": notification.event,
                "source": notification.source,
                "payload": notification.payload,
            },
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PushError::Status(response.status()));
        }
        Ok(())
    }
}
