//! Intent and date recognition port, with a LUIS-backed implementation.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::RecognitionError;
use crate::timex::{self, DateExpression};

const REQUEST_VACATION_INTENT: &str = "Request_vacation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    RequestVacation,
    Other(String),
    None,
}

impl Intent {
    fn from_name(name: &str) -> Self {
        if name == REQUEST_VACATION_INTENT {
            Intent::RequestVacation
        } else if name.is_empty() || name.eq_ignore_ascii_case("none") {
            Intent::None
        } else {
            Intent::Other(name.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizerResult {
    pub intent: Intent,
    pub vacation_date: Option<DateExpression>,
}

#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, text: &str) -> Result<RecognizerResult, RecognitionError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuisConfig {
    pub app_id: String,
    pub api_key: String,
    pub host_name: String,
}

#[derive(Debug, Deserialize)]
struct LuisResponse {
    #[serde(rename = "topScoringIntent", default)]
    top_scoring_intent: Option<LuisIntent>,
    #[serde(default)]
    entities: Vec<LuisEntity>,
}

#[derive(Debug, Deserialize)]
struct LuisIntent {
    intent: String,
}

#[derive(Debug, Deserialize)]
struct LuisEntity {
    #[serde(default)]
    resolution: Option<LuisResolution>,
}

#[derive(Debug, Deserialize)]
struct LuisResolution {
    #[serde(default)]
    values: Vec<LuisResolutionValue>,
}

#[derive(Debug, Deserialize)]
struct LuisResolutionValue {
    #[serde(default)]
    timex: Option<String>,
}

impl LuisResponse {
    /// First datetime entity; with several candidate resolutions the second
    /// (future) one wins.
    fn vacation_date(&self) -> Option<DateExpression> {
        let values = &self
            .entities
            .iter()
            .find_map(|entity| entity.resolution.as_ref())?
            .values;
        let chosen = if values.len() > 1 {
            values.get(1)
        } else {
            values.first()
        }?;
        chosen.timex.as_deref().map(timex::resolve)
    }

    fn into_result(self) -> RecognizerResult {
        let intent = self
            .top_scoring_intent
            .as_ref()
            .map(|top| Intent::from_name(&top.intent))
            .unwrap_or(Intent::None);
        let vacation_date = match intent {
            Intent::RequestVacation => self.vacation_date(),
            _ => None,
        };
        RecognizerResult {
            intent,
            vacation_date,
        }
    }
}

/// Client for the LUIS v2 prediction endpoint.
pub struct LuisRecognizer {
    http: reqwest::Client,
    config: LuisConfig,
}

impl LuisRecognizer {
    pub fn new(config: LuisConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "https://{}/luis/v2.0/apps/{}",
            self.config.host_name.trim_end_matches('/'),
            self.config.app_id
        )
    }
}

#[async_trait]
impl Recognizer for LuisRecognizer {
    async fn recognize(&self, text: &str) -> Result<RecognizerResult, RecognitionError> {
        let body = self
            .http
            .get(self.endpoint())
            .query(&[
                ("subscription-key", self.config.api_key.as_str()),
                ("verbose", "true"),
                ("q", text),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let result = parse_luis_response(&body)?;
        debug!(?result, "recognized utterance");
        Ok(result)
    }
}

/// Decode a LUIS v2 response body.
pub(crate) fn parse_luis_response(body: &str) -> Result<RecognizerResult, RecognitionError> {
    serde_json::from_str::<LuisResponse>(body)
        .map(LuisResponse::into_result)
        .map_err(|err| RecognitionError::Malformed(err.to_string()))
}
