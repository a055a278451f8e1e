//! Emulator channel: typed confirmations and a stdout console transport.

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

use crate::communication_channel::{
    ChannelAdapter, CommunicationChannel, ConversationRef, ExtractedAction, OutboundMessage,
};
use crate::error::{ChannelError, CorrelationError};
use crate::slack_manager::SlackActionPayload;

/// Development channel. Confirmations are typed, but Slack-shaped action
/// payloads are accepted so button clicks can be simulated. The emulator has
/// no user directory, so extracted actions never carry a user id.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmulatorAdapter;

impl ChannelAdapter for EmulatorAdapter {
    fn extract_action(&self, payload: &Value) -> Result<Option<ExtractedAction>, CorrelationError> {
        let Some(decoded) = SlackActionPayload::decode(payload)? else {
            return Ok(None);
        };
        Ok(Some(ExtractedAction {
            value: decoded.action_value()?,
            user_id: None,
            callback_id: decoded.callback_id,
        }))
    }

    fn build_confirmation_message(&self, summary: &str, _callback_id: &str) -> OutboundMessage {
        OutboundMessage::text(format!("{summary} (1) Yes or (2) No"))
    }

    fn build_ack_address(&self, payload: &Value) -> Option<String> {
        SlackActionPayload::decode(payload)
            .ok()
            .flatten()
            .and_then(|decoded| decoded.response_url)
            .filter(|url| !url.is_empty())
    }
}

/// Writes bot replies to stdout.
pub struct ConsoleChannel {
    stdout: Mutex<Stdout>,
}

impl ConsoleChannel {
    pub fn new() -> Self {
        Self {
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for ConsoleChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommunicationChannel for ConsoleChannel {
    async fn send_message(
        &self,
        _recipient: &ConversationRef,
        message: &OutboundMessage,
    ) -> Result<(), ChannelError> {
        let mut line = format!("bot> {}\n", message.summary());
        if let OutboundMessage::Interactive(interactive) = message {
            for action in &interactive.actions {
                line.push_str(&format!("     [{}] value={}\n", action.text, action.value));
            }
        }

        let mut stdout = self.stdout.lock().await;
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }
}
