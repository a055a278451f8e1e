//! Slack channel: interactive confirmation buttons, action payload decoding
//! and the Web API client used for sends and profile lookups.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::approval::ProfileDirectory;
use crate::communication_channel::{
    ActionButton, ButtonStyle, ChannelAdapter, CommunicationChannel, ConversationRef,
    ExtractedAction, InteractiveMessage, OutboundMessage, CONFIRM_NO, CONFIRM_YES,
};
use crate::error::{ChannelError, CorrelationError, DownstreamError};

const SLACK_API_BASE: &str = "https://slack.com/api";

/// Slack interactive-message callback, reduced to the fields the bot reads.
#[derive(Debug, Deserialize)]
pub(crate) struct SlackActionPayload {
    #[serde(default)]
    pub actions: Vec<SlackAction>,
    #[serde(default)]
    pub user: Option<SlackUser>,
    #[serde(default)]
    pub response_url: Option<String>,
    #[serde(default)]
    pub callback_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SlackAction {
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SlackUser {
    #[serde(default)]
    pub id: Option<String>,
}

impl SlackActionPayload {
    /// `Ok(None)` when the payload is not an action callback at all. A
    /// callback that lost its `actions` is an error, not a message.
    pub(crate) fn decode(payload: &Value) -> Result<Option<Self>, CorrelationError> {
        if payload.get("actions").is_none() {
            if Self::looks_like_callback(payload) {
                return Err(CorrelationError::MissingField("actions"));
            }
            return Ok(None);
        }
        serde_json::from_value(payload.clone())
            .map(Some)
            .map_err(|err| CorrelationError::InvalidPayload(err.to_string()))
    }

    fn looks_like_callback(payload: &Value) -> bool {
        let callback_type = matches!(
            payload.get("type").and_then(Value::as_str),
            Some("interactive_message" | "block_actions")
        );
        callback_type || payload.get("response_url").is_some() || payload.get("callback_id").is_some()
    }

    pub(crate) fn action_value(&self) -> Result<String, CorrelationError> {
        self.actions
            .first()
            .and_then(|action| action.value.clone())
            .filter(|value| !value.is_empty())
            .ok_or(CorrelationError::MissingField("actions[].value"))
    }

    pub(crate) fn user_id(&self) -> Option<String> {
        self.user
            .as_ref()
            .and_then(|user| user.id.clone())
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SlackAdapter;

impl ChannelAdapter for SlackAdapter {
    fn extract_action(&self, payload: &Value) -> Result<Option<ExtractedAction>, CorrelationError> {
        let Some(decoded) = SlackActionPayload::decode(payload)? else {
            return Ok(None);
        };
        let value = decoded.action_value()?;
        let user_id = decoded
            .user_id()
            .ok_or(CorrelationError::MissingField("user.id"))?;

        Ok(Some(ExtractedAction {
            value,
            user_id: Some(user_id),
            callback_id: decoded.callback_id,
        }))
    }

    fn build_confirmation_message(&self, summary: &str, callback_id: &str) -> OutboundMessage {
        OutboundMessage::Interactive(InteractiveMessage {
            title: summary.to_string(),
            callback_id: callback_id.to_string(),
            actions: vec![
                ActionButton {
                    id: "confirm_yes".to_string(),
                    text: "Yes".to_string(),
                    value: CONFIRM_YES.to_string(),
                    style: ButtonStyle::Primary,
                },
                ActionButton {
                    id: "confirm_no".to_string(),
                    text: "No".to_string(),
                    value: CONFIRM_NO.to_string(),
                    style: ButtonStyle::Danger,
                },
            ],
        })
    }

    fn build_ack_address(&self, payload: &Value) -> Option<String> {
        SlackActionPayload::decode(payload)
            .ok()
            .flatten()
            .and_then(|decoded| decoded.response_url)
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct SlackApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    user: Option<SlackUserInfo>,
}

#[derive(Debug, Deserialize)]
struct SlackUserInfo {
    #[serde(default)]
    profile: Option<SlackProfile>,
}

#[derive(Debug, Deserialize)]
struct SlackProfile {
    #[serde(default)]
    email: Option<String>,
}

/// Slack Web API client authenticated with the bot OAuth token.
pub struct SlackClient {
    http: reqwest::Client,
    token: String,
    api_base: String,
}

impl SlackClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
            api_base: SLACK_API_BASE.to_string(),
        }
    }

    fn render(recipient: &ConversationRef, message: &OutboundMessage) -> Value {
        match message {
            OutboundMessage::Text(text) => json!({
                "channel": recipient.conversation_id,
                "text": text,
            }),
            OutboundMessage::Interactive(interactive) => {
                let actions: Vec<Value> = interactive
                    .actions
                    .iter()
                    .map(|action| {
                        json!({
                            "name": action.id,
                            "text": action.text,
                            "type": "button",
                            "value": action.value,
                            "style": action.style,
                        })
                    })
                    .collect();
                json!({
                    "channel": recipient.conversation_id,
                    "text": interactive.title,
                    "attachments": [{
                        "text": interactive.title,
                        "callback_id": interactive.callback_id,
                        "actions": actions,
                    }],
                })
            }
        }
    }
}

#[async_trait]
impl CommunicationChannel for SlackClient {
    async fn send_message(
        &self,
        recipient: &ConversationRef,
        message: &OutboundMessage,
    ) -> Result<(), ChannelError> {
        let response: SlackApiResponse = self
            .http
            .post(format!("{}/chat.postMessage", self.api_base))
            .bearer_auth(&self.token)
            .json(&Self::render(recipient, message))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !response.ok {
            return Err(ChannelError::Api(
                response.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileDirectory for SlackClient {
    async fn lookup_identity(&self, user_id: &str) -> Result<String, DownstreamError> {
        let response: SlackApiResponse = self
            .http
            .get(format!("{}/users.info", self.api_base))
            .bearer_auth(&self.token)
            .query(&[("user", user_id)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !response.ok {
            return Err(DownstreamError::Api(
                response.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }
        response
            .user
            .and_then(|user| user.profile)
            .and_then(|profile| profile.email)
            .ok_or_else(|| DownstreamError::Api(format!("no email on profile for {user_id}")))
    }
}

