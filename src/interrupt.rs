//! Global keyword interrupts, applied to every turn before stack dispatch.

use std::sync::Arc;

use tracing::info;

use crate::communication_channel::{CommunicationChannel, OutboundMessage};
use crate::error::BotError;
use crate::waterfall::{DialogContext, DialogTurnResult};

pub const HELP_TEXT: &str = "I support the following actions: Request Vacation Time";
pub const CANCEL_TEXT: &str = "Cancelling";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Help,
    Cancel,
}

impl Interrupt {
    pub fn detect(text: &str) -> Option<Self> {
        match text.trim().to_lowercase().as_str() {
            "help" | "?" => Some(Interrupt::Help),
            "cancel" | "quit" => Some(Interrupt::Cancel),
            _ => None,
        }
    }
}

pub struct InterruptLayer {
    channel: Arc<dyn CommunicationChannel>,
}

impl InterruptLayer {
    pub fn new(channel: Arc<dyn CommunicationChannel>) -> Self {
        Self { channel }
    }

    /// `Some` when the turn was consumed by an interrupt.
    pub async fn intercept(
        &self,
        dc: &mut DialogContext<'_>,
    ) -> Result<Option<DialogTurnResult>, BotError> {
        let Some(interrupt) = Interrupt::detect(&dc.turn().text) else {
            return Ok(None);
        };
        info!(?interrupt, depth = dc.stack_depth(), "interrupt");

        match interrupt {
            Interrupt::Help => {
                self.channel
                    .send_message(dc.reference(), &OutboundMessage::text(HELP_TEXT))
                    .await?;
                Ok(Some(DialogTurnResult::Waiting))
            }
            Interrupt::Cancel => {
                self.channel
                    .send_message(dc.reference(), &OutboundMessage::text(CANCEL_TEXT))
                    .await?;
                Ok(Some(dc.cancel_all_dialogs()))
            }
        }
    }
}
