//! Typed errors for the orchestration core.
//!
//! Fatal conditions (unknown module binding, corrupted checkpoint file) get
//! their own variants; everything else flows through `anyhow` with context
//! at the call site.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    /// A module binding names an implementation the registry does not know.
    /// Raised when bindings are resolved, never deferred to first use.
    #[error("unknown {role} module `{name}`: not present in the registry")]
    UnknownModule { role: &'static str, name: String },

    /// A checkpoint file contains a line that is not a valid JSON record.
    /// The file is not partially consumed; the whole load fails.
    #[error("malformed record in {} at line {line}", path.display())]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A record could not be serialized for appending.
    #[error("failed to serialize record for {}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to {action} {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EvalError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
