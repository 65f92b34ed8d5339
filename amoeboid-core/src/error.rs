//! Error types for card lookup, caching and settings
//!
//! Per-item failures (`NotFound`, `MalformedRecord`, `Transient`) are logged and
//! skipped by batch operations. `InvalidInput` and `PermissionDenied` carry the
//! plain-text message shown to the user and abort only the request that raised them.

use thiserror::Error;

/// Errors raised while resolving, fetching, caching or rendering cards
#[derive(Error, Debug)]
pub enum AmoeboidError {
    /// The name resolved to nothing upstream, or no corpus entry matched
    #[error("No card found matching `{0}`")]
    NotFound(String),

    /// An expected field is absent from an upstream record
    #[error("Malformed record for `{name}`: {reason}")]
    MalformedRecord { name: String, reason: String },

    /// Network failure, timeout, rate limiting or an unexpected upstream status
    #[error("Catalog request failed: {0}")]
    Transient(String),

    /// The user's request could not be understood
    #[error(transparent)]
    InvalidInput(#[from] InputError),

    /// A non-administrator tried to run a settings command
    #[error("You do not have permission to run the command `{command}`.")]
    PermissionDenied { command: String },

    #[error("Card store error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AmoeboidError {
    pub fn malformed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether a batch should log this error and move on to the next item
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::MalformedRecord { .. } | Self::Transient(_)
        )
    }

    /// Whether the message is meant to be shown to the user verbatim
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::PermissionDenied { .. })
    }
}

/// Malformed user input, with the reply text as its display form
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Please request {max} or less cards at a time.")]
    TooManyCards { max: usize },

    #[error("Invalid formatting of parameters.")]
    InvalidParameters(String),

    #[error("Bot wrapping is not valid. Wrap a \\* in characters, like this: `[[*]]`")]
    InvalidWrapping(String),

    #[error("Bot prefix is not valid. Use a prefix without spaces, like this: `a!`")]
    InvalidPrefix(String),

    #[error("Please provide a card name.")]
    EmptyQuery,
}

pub type Result<T> = std::result::Result<T, AmoeboidError>;
