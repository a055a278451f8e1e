//! Conversational vacation requests: a stack-based dialog engine that
//! collects start and end dates, asks for confirmation and forwards the
//! confirmed request for approval, including confirmations that arrive
//! later as channel button clicks.

#[cfg(test)]
mod tests;

pub mod approval;
pub mod communication_channel;
pub mod config;
pub mod conversation_manager;
pub mod correlator;
pub mod date_extractor;
pub mod date_resolver;
pub mod dialog_stack;
pub mod emulator_manager;
pub mod error;
pub mod interrupt;
pub mod logging;
pub mod recognizer;
pub mod slack_manager;
pub mod timex;
pub mod vacation_dialog;
pub mod waterfall;

pub use communication_channel::{InboundTurn, OutboundMessage};
pub use config::{config_from_env, BotConfig};
pub use conversation_manager::{BotServices, ConversationManager};
pub use waterfall::{DialogResult, DialogTurnResult};
