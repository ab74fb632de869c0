//! Error types for the coaching engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown exercise: {0}")]
    UnknownExercise(String),

    #[error("invalid frame at line {line}: {reason}")]
    InvalidFrame { line: usize, reason: String },

    #[error("score component '{component}' has no {input} to score")]
    MissingScoreInput {
        component: String,
        input: &'static str,
    },

    #[error("profile parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(e.to_string())
    }
}
