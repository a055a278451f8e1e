//! Startup configuration read from the environment.

use std::env;

use reqwest::Url;
use tracing::warn;

use crate::error::ConfigError;
use crate::recognizer::LuisConfig;

pub const LUIS_APP_ID: &str = "LUIS_APP_ID";
pub const LUIS_API_KEY: &str = "LUIS_API_KEY";
pub const LUIS_API_HOST_NAME: &str = "LUIS_API_HOST_NAME";
pub const APPROVAL_ENDPOINT: &str = "APPROVAL_ENDPOINT";
pub const DEFAULT_USER_ID: &str = "DEFAULT_USER_ID";
pub const SLACK_OAUTH_TOKEN: &str = "SLACK_OAUTH_TOKEN";

/// Process configuration, read once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotConfig {
    /// `None` disables recognition; turns then start the flow with no date.
    pub luis: Option<LuisConfig>,
    pub approval_endpoint: Option<String>,
    /// Identity used only when a channel cannot supply the responding user.
    pub default_user_id: Option<String>,
    pub slack_oauth_token: Option<String>,
}

impl BotConfig {
    /// Build a config from any key lookup. Blank values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let luis = match (get(LUIS_APP_ID), get(LUIS_API_KEY), get(LUIS_API_HOST_NAME)) {
            (Some(app_id), Some(api_key), Some(host_name)) => Some(LuisConfig {
                app_id,
                api_key,
                host_name,
            }),
            (None, None, None) => None,
            _ => {
                warn!("incomplete LUIS configuration; recognition disabled");
                None
            }
        };

        let approval_endpoint = match get(APPROVAL_ENDPOINT) {
            Some(endpoint) => {
                let url = Url::parse(&endpoint).map_err(|err| ConfigError::InvalidValue {
                    key: APPROVAL_ENDPOINT,
                    message: err.to_string(),
                })?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(ConfigError::InvalidValue {
                        key: APPROVAL_ENDPOINT,
                        message: format!("unsupported scheme `{}`", url.scheme()),
                    });
                }
                Some(endpoint)
            }
            None => None,
        };

        Ok(Self {
            luis,
            approval_endpoint,
            default_user_id: get(DEFAULT_USER_ID),
            slack_oauth_token: get(SLACK_OAUTH_TOKEN),
        })
    }
}

pub fn config_from_env() -> Result<BotConfig, ConfigError> {
    BotConfig::from_lookup(|key| env::var(key).ok())
}
