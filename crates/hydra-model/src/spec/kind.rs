use serde::{Deserialize, Serialize};

use crate::JsonCodec;

/// What a job runs.
///
/// Both variants are opaque to the coordinator: the command string and the function
/// payload are passed through to the control plane unchanged.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobKind {
    /// Run a shell command on a worker.
    Command {
        /// Command line, e.g. `"echo 'Hello Dist Sys'"`.
        command: String,
    },
    /// Run a function known to the workers.
    Function(FunctionCall),
}

impl JobKind {
    /// Returns a short symbolic identifier used for logging and metrics:
    /// - `"command"`
    /// - `"function"`
    pub fn kind(&self) -> &'static str {
        match self {
            JobKind::Command { .. } => "command",
            JobKind::Function(_) => "function",
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, JobKind::Function(_))
    }
}

/// Reference to a callable plus its encoded arguments.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall {
    /// Handle the workers resolve to a callable (e.g. `"analyze_data"`).
    pub callable: String,
    /// Positional arguments, encoded with `codec`.
    #[serde(default)]
    pub args: Vec<u8>,
    /// Keyword arguments, encoded with `codec`.
    #[serde(default)]
    pub kwargs: Vec<u8>,
    /// Name of the [`crate::PayloadCodec`] used for the arguments and the result.
    #[serde(default = "default_codec")]
    pub codec: String,
}

impl FunctionCall {
    pub fn new(callable: impl Into<String>, args: Vec<u8>, kwargs: Vec<u8>) -> Self {
        Self {
            callable: callable.into(),
            args,
            kwargs,
            codec: default_codec(),
        }
    }

    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec = codec.into();
        self
    }
}

fn default_codec() -> String {
    JsonCodec::NAME.to_string()
}
