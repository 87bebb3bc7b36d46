use std::env;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Environment variable holding the chat bot credential.
pub const BOT_TOKEN_VAR: &str = "TELEGRAM_TOKEN";

/// Environment variable holding the sheet service credential bundle as JSON.
pub const STORE_CREDS_VAR: &str = "GOOGLE_CREDS_JSON";

/// Environment variable holding a short-lived OAuth access token for the sheet
/// service. Minting and refreshing the token happens outside the process.
pub const STORE_TOKEN_VAR: &str = "GOOGLE_ACCESS_TOKEN";

/// The subset of the service-account bundle the bot needs. The email is what a
/// user has to share their sheet with, so it shows up in chat messages.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceCredentials {
    pub client_email: String,
}

impl ServiceCredentials {
    pub fn from_env() -> Result<Self> {
        let raw = env::var(STORE_CREDS_VAR)
            .with_context(|| format!("{STORE_CREDS_VAR} is not set"))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("{STORE_CREDS_VAR} does not contain valid credentials JSON"))
    }
}

/// Full startup configuration. Missing or malformed values abort startup
/// before any traffic is served; there is no runtime fallback.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub credentials: ServiceCredentials,
    pub store_access_token: String,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        let bot_token =
            env::var(BOT_TOKEN_VAR).with_context(|| format!("{BOT_TOKEN_VAR} is not set"))?;
        let store_access_token =
            env::var(STORE_TOKEN_VAR).with_context(|| format!("{STORE_TOKEN_VAR} is not set"))?;
        Ok(Self {
            bot_token,
            credentials: ServiceCredentials::from_env()?,
            store_access_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceCredentials;

    #[test]
    fn credentials_parse_the_client_email() {
        let creds: ServiceCredentials = serde_json::from_str(
            r#"{
                "type": "service_account",
                "client_email": "bot@project.iam.gserviceaccount.com",
                "private_key": "irrelevant here"
            }"#,
        )
        .unwrap();
        assert_eq!(creds.client_email, "bot@project.iam.gserviceaccount.com");
    }

    #[test]
    fn malformed_credentials_are_rejected() {
        assert!(serde_json::from_str::<ServiceCredentials>("{}").is_err());
        assert!(serde_json::from_str::<ServiceCredentials>("not json").is_err());
    }
}
