//! Error types for the vacation bot.
//!
//! Every error is scoped to the turn that produced it. None of them is fatal
//! to the process.

use thiserror::Error;

/// The natural-language recognizer could not produce a result.
#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("recognizer request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected recognizer response: {0}")]
    Malformed(String),
}

/// A channel action payload was present but could not be correlated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrelationError {
    #[error("channel payload is missing `{0}`")]
    MissingField(&'static str),

    #[error("channel payload could not be decoded: {0}")]
    InvalidPayload(String),

    #[error("no responding user identity and no fallback identity configured")]
    MissingIdentity,
}

/// Profile lookup, approval submission or acknowledgement post failed.
#[derive(Error, Debug)]
pub enum DownstreamError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// An outbound message could not be delivered.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("channel API error: {0}")]
    Api(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A configuration value was present but unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// Turn-level failure surfaced by the conversation manager.
#[derive(Error, Debug)]
pub enum BotError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("dialog engine error: {0}")]
    Engine(String),
}
