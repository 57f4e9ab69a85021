use std::env;

#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub media_dir: String,
    pub apns_endpoint: String,
    pub apns_key_path: Option<String>,
    pub apns_key_id: Option<String>,
    pub apns_team_id: Option<String>,
    pub apns_topic: Option<String>,
    pub fcm_endpoint: String,
    pub fcm_server_key: Option<String>,
    pub vapid_key_path: Option<String>,
    pub vapid_public_key: Option<String>,
    pub vapid_subject: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3001),
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "./palaver.db".into()),
            media_dir: env::var("MEDIA_DIR").unwrap_or_else(|_| "./media".into()),
            apns_endpoint: env::var("APNS_ENDPOINT")
                .unwrap_or_else(|_| "https://api.push.apple.com".into()),
            apns_key_path: env::var("APNS_KEY_PATH").ok(),
            apns_key_id: env::var("APNS_KEY_ID").ok(),
            apns_team_id: env::var("APNS_TEAM_ID").ok(),
            apns_topic: env::var("APNS_TOPIC").ok(),
            fcm_endpoint: env::var("FCM_ENDPOINT")
                .unwrap_or_else(|_| "https://fcm.googleapis.com/fcm/send".into()),
            fcm_server_key: env::var("FCM_SERVER_KEY").ok(),
            vapid_key_path: env::var("VAPID_KEY_PATH").ok(),
            vapid_public_key: env::var("VAPID_PUBLIC_KEY").ok(),
            vapid_subject: env::var("VAPID_SUBJECT")
                .unwrap_or_else(|_| "mailto:admin@example.com".into()),
        }
    }
}
