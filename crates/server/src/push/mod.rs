mod apns;
mod fcm;
mod web;

pub use apns::ApnsSender;
pub use fcm::FcmSender;
pub use web::WebPushSender;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;
use crate::models::{DeviceSession, PushTransport};
use crate::notify::Notification;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("push service responded {0}")]
    Status(reqwest::StatusCode),
    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("unusable push token: {0}")]
    BadToken(String),
}

/// One store-and-forward transport. Implementations deliver a single
/// notification to a single device and report failure without retrying.
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(
        &self,
        notification: &Notification,
        session: &DeviceSession,
    ) -> Result<(), PushError>;
}

/// Routes a notification to whichever sender matches the device's
/// registered transport. Transports without credentials stay unconfigured
/// and their devices are skipped. Failures are logged and swallowed.
#[derive(Clone, Default)]
pub struct PushDispatch {
    apns: Option<Arc<dyn PushSender>>,
    fcm: Option<Arc<dyn PushSender>>,
    web: Option<Arc<dyn PushSender>>,
}

impl PushDispatch {
    pub fn new(
        apns: Option<Arc<dyn PushSender>>,
        fcm: Option<Arc<dyn PushSender>>,
        web: Option<Arc<dyn PushSender>>,
    ) -> Self {
        Self { apns, fcm, web }
    }

    /// Builds every transport whose credentials are present in the config.
    pub fn from_config(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        let apns = ApnsSender::from_config(config, client.clone())
            .map(|sender| Arc::new(sender) as Arc<dyn PushSender>);
        let fcm = FcmSender::from_config(config, client.clone())
            .map(|sender| Arc::new(sender) as Arc<dyn PushSender>);
        let web = WebPushSender::from_config(config, client)
            .map(|sender| Arc::new(sender) as Arc<dyn PushSender>);

        if apns.is_some() {
            tracing::info!("APNs push transport configured");
        }
        if fcm.is_some() {
            tracing::info!("FCM push transport configured");
        }
        if web.is_some() {
            tracing::info!("Web Push transport configured");
        }

        Self { apns, fcm, web }
    }

    pub async fn send(&self, notification: &Notification, session: &DeviceSession) {
        let sender = match session.push_transport {
            PushTransport::None => return,
            PushTransport::Apns => &self.apns,
            PushTransport::Fcm => &self.fcm,
            PushTransport::Web => &self.web,
        };

        let Some(sender) = sender else {
            tracing::debug!(
                session = %session.id,
                transport = ?session.push_transport,
                "push transport not configured, dropping notification"
            );
            return;
        };

        if let Err(err) = sender.send(notification, session).await {
            tracing::warn!(
                session = %session.id,
                transport = ?session.push_transport,
                "push delivery failed: {err}"
            );
        }
    }
}

/// Alert title shown by OS-level notification UIs.
pub(crate) fn alert_title(_notification: &Notification) -> &'static str {
    "New message"
}

/// Alert body for OS-level notification UIs. Only message events reach a
/// push transport, so the payload is a serialized message.
pub(crate) fn alert_body(notification: &Notification) -> String {
    let text = notification
        .payload
        .as_ref()
        .and_then(|payload| payload.get("text"))
        .and_then(|text| text.as_str())
        .filter(|text| !text.is_empty());

    match text {
        Some(text) if text.chars().count() > 120 => {
            let mut body: String = text.chars().take(119).collect();
            body.push('…');
            body
        }
        Some(text) => text.to_string(),
        None => "Sent an attachment".to_string(),
    }
}

/// Device token required by every transport; absence is a caller bug the
/// sender reports instead of panicking over.
pub(crate) fn device_token(session: &DeviceSession) -> Result<&str, PushError> {
    session
        .push_token
        .as_deref()
        .filter(|token| !token.is_empty())
        .ok_or_else(|| PushError::BadToken("session has no push token".into()))
}
