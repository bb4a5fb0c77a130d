use serde::{Deserialize, Serialize};

/// Classification the control plane attaches to each terminal line.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Command,
    Error,
    Success,
    Info,
    #[default]
    #[serde(other)]
    Output,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TerminalLine {
    #[serde(rename = "type", default)]
    pub kind: LineKind,
    #[serde(rename = "message", default)]
    pub text: String,
}

impl TerminalLine {
    pub fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn output(text: impl Into<String>) -> Self {
        Self::new(LineKind::Output, text)
    }
}

/// Payload of `GET /get_terminal_output`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TerminalOutput {
    #[serde(default)]
    pub output: Vec<TerminalLine>,
}

/// Body of `POST /run_terminal_command`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunCommandRequest {
    pub command: String,
}
