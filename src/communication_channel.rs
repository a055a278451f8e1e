//! Inbound turns, outbound messages and the per-channel adapter seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::emulator_manager::EmulatorAdapter;
use crate::error::{ChannelError, CorrelationError};
use crate::slack_manager::SlackAdapter;

/// Action value carried by the affirmative confirmation button.
pub const CONFIRM_YES: &str = "yes";
/// Action value carried by the negative confirmation button.
pub const CONFIRM_NO: &str = "no";

/// Where a conversation lives: the channel and the conversation within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationRef {
    pub channel_id: String,
    pub conversation_id: String,
}

/// One inbound activity delivered by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundTurn {
    pub text: String,
    pub channel_id: String,
    pub conversation_id: String,
    /// Channel user id of the sender, when the transport provides one.
    pub from_id: Option<String>,
    /// Channel-specific data, e.g. a button click on an earlier message.
    pub channel_payload: Option<Value>,
}

impl InboundTurn {
    pub fn message(
        channel_id: impl Into<String>,
        conversation_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            channel_id: channel_id.into(),
            conversation_id: conversation_id.into(),
            from_id: None,
            channel_payload: None,
        }
    }

    pub fn with_from(mut self, from_id: impl Into<String>) -> Self {
        self.from_id = Some(from_id.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.channel_payload = Some(payload);
        self
    }

    pub fn reference(&self) -> ConversationRef {
        ConversationRef {
            channel_id: self.channel_id.clone(),
            conversation_id: self.conversation_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonStyle {
    Primary,
    Danger,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionButton {
    pub id: String,
    pub text: String,
    pub value: String,
    pub style: ButtonStyle,
}

/// A message with clickable actions. `callback_id` names the conversation
/// that owns the pending confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractiveMessage {
    pub title: String,
    pub callback_id: String,
    pub actions: Vec<ActionButton>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OutboundMessage {
    Text(String),
    Interactive(InteractiveMessage),
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        OutboundMessage::Text(text.into())
    }

    /// Plain-text rendering, used for logs and text-only transports.
    pub fn summary(&self) -> &str {
        match self {
            OutboundMessage::Text(text) => text,
            OutboundMessage::Interactive(message) => &message.title,
        }
    }
}

#[async_trait]
pub trait CommunicationChannel: Send + Sync {
    async fn send_message(
        &self,
        recipient: &ConversationRef,
        message: &OutboundMessage,
    ) -> Result<(), ChannelError>;
}

/// Action fields decoded from a channel payload, before identity policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedAction {
    pub value: String,
    pub user_id: Option<String>,
    pub callback_id: Option<String>,
}

/// Capability surface every supported channel implements.
pub trait ChannelAdapter: Send + Sync {
    /// `Ok(None)` when the payload is not an action click.
    fn extract_action(&self, payload: &Value) -> Result<Option<ExtractedAction>, CorrelationError>;

    fn build_confirmation_message(&self, summary: &str, callback_id: &str) -> OutboundMessage;

    fn build_ack_address(&self, payload: &Value) -> Option<String>;
}

/// Channels without interactive messages: confirmations are typed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextOnlyAdapter;

impl ChannelAdapter for TextOnlyAdapter {
    fn extract_action(&self, _payload: &Value) -> Result<Option<ExtractedAction>, CorrelationError> {
        Ok(None)
    }

    fn build_confirmation_message(&self, summary: &str, _callback_id: &str) -> OutboundMessage {
        OutboundMessage::text(format!("{summary} (1) Yes or (2) No"))
    }

    fn build_ack_address(&self, _payload: &Value) -> Option<String> {
        None
    }
}

static SLACK: SlackAdapter = SlackAdapter;
static EMULATOR: EmulatorAdapter = EmulatorAdapter;
static TEXT_ONLY: TextOnlyAdapter = TextOnlyAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Slack,
    Emulator,
    TextOnly,
}

impl ChannelKind {
    pub fn from_channel_id(channel_id: &str) -> Self {
        match channel_id.to_ascii_lowercase().as_str() {
            "slack" => ChannelKind::Slack,
            "emulator" | "console" => ChannelKind::Emulator,
            _ => ChannelKind::TextOnly,
        }
    }

    pub fn adapter(self) -> &'static dyn ChannelAdapter {
        match self {
            ChannelKind::Slack => &SLACK,
            ChannelKind::Emulator => &EMULATOR,
            ChannelKind::TextOnly => &TEXT_ONLY,
        }
    }
}

pub fn adapter_for(channel_id: &str) -> &'static dyn ChannelAdapter {
    ChannelKind::from_channel_id(channel_id).adapter()
}
