//! Error handling for scylla-api.

use thiserror::Error;

use crate::transport::TransportError;

/// The main error type for scylla-api operations.
///
/// Every variant maps to a stable process exit code, see [`Error::exit_code`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The transport could not complete a discovery fetch.
    #[error("API discovery unavailable at {path}: {source}")]
    DiscoveryUnavailable {
        path: String,
        #[source]
        source: TransportError,
    },

    /// A discovery document is missing expected fields.
    #[error("malformed discovery document {path}: {reason}")]
    MalformedDocument { path: String, reason: String },

    #[error("duplicate key '{0}'")]
    DuplicateKey(String),

    #[error("invalid key '{0}': keys must be non-empty and not purely numeric")]
    InvalidKey(String),

    #[error("key '{0}' not found")]
    NotFound(String),

    #[error("index {index} out of range (size {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("could not find module '{0}'")]
    ModuleNotFound(String),

    #[error("could not find command '{command}'{}", in_module(.module))]
    CommandNotFound {
        module: Option<String>,
        command: String,
    },

    #[error(
        "command '{command}' exists in multiple modules ({}). Specify 'module/command' to uniquely identify the command",
        joined(.modules)
    )]
    AmbiguousCommand {
        command: String,
        modules: Vec<String>,
    },

    #[error("command '{command}' requires a method, one of: {}", or_none(.available))]
    VerbRequired {
        command: String,
        available: Vec<String>,
    },

    #[error("missing required option '--{option}' for {verb} {command}")]
    MissingRequiredOption {
        command: String,
        verb: String,
        option: String,
    },

    #[error("invalid value '{value}' for option '--{option}': {reason}")]
    InvalidOptionValue {
        option: String,
        value: String,
        reason: String,
    },

    #[error("unknown option '--{option}' for {verb} {command}")]
    UnknownOption {
        command: String,
        verb: String,
        option: String,
    },

    #[error("option '--{0}' requires a value")]
    MissingOptionValue(String),

    #[error("unexpected argument '{0}'")]
    UnexpectedArgument(String),

    /// Opaque failure reported by the transport, surfaced verbatim.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

fn in_module(module: &Option<String>) -> String {
    module
        .as_deref()
        .map(|m| format!(" in module '{m}'"))
        .unwrap_or_default()
}

fn joined(items: &[String]) -> String {
    items.join(", ")
}

fn or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

impl Error {
    /// Process exit code for this failure kind.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::DiscoveryUnavailable { .. } => 3,
            Error::MalformedDocument { .. } => 4,
            Error::Transport(_) => 5,
            Error::ModuleNotFound(_) => 10,
            Error::CommandNotFound { .. } => 11,
            Error::AmbiguousCommand { .. } => 12,
            Error::VerbRequired { .. } => 13,
            Error::MissingRequiredOption { .. } => 20,
            Error::InvalidOptionValue { .. } => 21,
            Error::UnknownOption { .. } => 22,
            Error::MissingOptionValue(_) => 23,
            Error::UnexpectedArgument(_) => 24,
            Error::DuplicateKey(_)
            | Error::InvalidKey(_)
            | Error::NotFound(_)
            | Error::IndexOutOfRange { .. } => 70,
        }
    }
}

/// A Result type alias for scylla-api operations.
pub type Result<T> = std::result::Result<T, Error>;
