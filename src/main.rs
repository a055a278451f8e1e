use std::sync::Arc;

use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use vacation_bot::emulator_manager::ConsoleChannel;
use vacation_bot::logging::init_logging;
use vacation_bot::{config_from_env, BotServices, ConversationManager, InboundTurn};

const CHANNEL_ID: &str = "emulator";
const CONVERSATION_ID: &str = "console";
const USER_ID: &str = "console-user";

/// A line starting with `{` is a channel payload (a simulated button click);
/// anything else is typed text.
fn turn_from_line(line: &str) -> InboundTurn {
    let turn = InboundTurn::message(CHANNEL_ID, CONVERSATION_ID, "").with_from(USER_ID);
    if line.starts_with('{') {
        match serde_json::from_str(line) {
            Ok(payload) => return turn.with_payload(payload),
            Err(err) => warn!(error = %err, "line looked like a payload but is not JSON"),
        }
    }
    InboundTurn {
        text: line.to_string(),
        ..turn
    }
}

#[tokio::main]
async fn main() {
    // A .env file is optional; plain environment variables work too.
    dotenv().ok();
    init_logging();

    let config = match config_from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };
    if config.luis.is_none() {
        warn!("LUIS is not configured; every conversation starts a vacation request");
    }

    let channel = Arc::new(ConsoleChannel::new());
    let manager = ConversationManager::new(BotServices::from_config(&config, channel));
    info!("vacation bot ready; type a message, `help` or `cancel`");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Err(err) = manager.handle_turn(&turn_from_line(line)).await {
                    error!(error = %err, "turn failed");
                }
            }
            Ok(None) => break,
            Err(err) => {
                error!(error = %err, "failed to read stdin");
                break;
            }
        }
    }
}
