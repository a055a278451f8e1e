//! Recognizes channel action clicks and ties them back to the pending
//! confirmation they answer.

use tracing::{debug, warn};

use crate::communication_channel::{adapter_for, ExtractedAction, InboundTurn, CONFIRM_YES};
use crate::error::CorrelationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    /// Supplied by the channel that delivered the turn.
    Channel,
    /// Substituted from configuration.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Responder {
    pub user_id: String,
    pub source: IdentitySource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelAction {
    pub action_value: String,
    pub responder: Responder,
    pub ack_address: Option<String>,
    /// Conversation that posted the message being answered.
    pub origin_conversation: Option<String>,
}

impl ChannelAction {
    pub fn is_affirmative(&self) -> bool {
        self.action_value == CONFIRM_YES
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnKind {
    Message,
    Action(ChannelAction),
}

pub struct ChannelCallbackCorrelator {
    fallback_identity: Option<String>,
}

impl ChannelCallbackCorrelator {
    pub fn new(fallback_identity: Option<String>) -> Self {
        Self { fallback_identity }
    }

    /// Classify a turn as typed text or an action click.
    ///
    /// # Errors
    ///
    /// Returns a `CorrelationError` when the payload is an action but lacks
    /// the fields needed to act on it.
    pub fn classify(&self, turn: &InboundTurn) -> Result<TurnKind, CorrelationError> {
        let Some(payload) = turn.channel_payload.as_ref() else {
            return Ok(TurnKind::Message);
        };

        let adapter = adapter_for(&turn.channel_id);
        let Some(extracted) = adapter.extract_action(payload)? else {
            return Ok(TurnKind::Message);
        };

        let responder = self.resolve_responder(extracted.user_id)?;
        let action = ChannelAction {
            action_value: extracted.value,
            responder,
            ack_address: adapter.build_ack_address(payload),
            origin_conversation: extracted.callback_id,
        };
        debug!(
            channel = %turn.channel_id,
            value = %action.action_value,
            origin = ?action.origin_conversation,
            "correlated channel action"
        );
        Ok(TurnKind::Action(action))
    }

    /// Decode a turn's action fields without applying identity policy.
    /// `None` for ordinary text turns.
    pub fn peek(&self, turn: &InboundTurn) -> Option<Result<ExtractedAction, CorrelationError>> {
        let payload = turn.channel_payload.as_ref()?;
        adapter_for(&turn.channel_id)
            .extract_action(payload)
            .transpose()
    }

    /// Conversation that posted the message a click answers, if named.
    pub fn origin_conversation(&self, turn: &InboundTurn) -> Option<String> {
        match self.peek(turn)? {
            Ok(extracted) => extracted.callback_id.filter(|id| !id.is_empty()),
            Err(_) => None,
        }
    }

    /// Responder for a typed confirmation: the sender, else the fallback.
    pub fn typed_responder(&self, turn: &InboundTurn) -> Option<Responder> {
        self.resolve_responder(turn.from_id.clone().filter(|id| !id.is_empty()))
            .ok()
    }

    fn resolve_responder(&self, user_id: Option<String>) -> Result<Responder, CorrelationError> {
        if let Some(user_id) = user_id {
            return Ok(Responder {
                user_id,
                source: IdentitySource::Channel,
            });
        }
        match &self.fallback_identity {
            Some(fallback) => {
                warn!(fallback = %fallback, "channel supplied no user identity; using fallback identity");
                Ok(Responder {
                    user_id: fallback.clone(),
                    source: IdentitySource::Fallback,
                })
            }
            None => Err(CorrelationError::MissingIdentity),
        }
    }
}
