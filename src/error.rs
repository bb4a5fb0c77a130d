//! Error types for session, terminal and control-plane operations

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A local precondition on user input failed; nothing was sent.
    #[error("{0}")]
    Validation(String),

    /// Another terminal command submission is still outstanding.
    #[error("a command is already being submitted")]
    Busy,

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The current run-state does not allow the operation.
    #[error("{0}")]
    Precondition(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Error::Precondition(message.into())
    }
}

/// Network, HTTP or decoding failure against the control plane.
///
/// Callers only distinguish "succeeded" from "failed"; the status is kept for
/// logging and display.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", self.describe())]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    fn describe(&self) -> String {
        match self.status {
            Some(status) if !self.message.starts_with("HTTP ") => {
                format!("HTTP {}: {}", status, self.message)
            }
            _ => self.message.clone(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        Self {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

impl From<url::ParseError> for TransportError {
    fn from(e: url::ParseError) -> Self {
        Self::network(format!("invalid server url: {}", e))
    }
}
