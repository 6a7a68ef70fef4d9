use thiserror::Error;

/// Expected, caller-correctable failure modes of the store.
///
/// Anything outside this taxonomy (lock poisoning, resource
/// exhaustion) is treated as fatal and propagates as a panic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Configuration ID {id} already exists.")]
    AlreadyExists { id: String },

    #[error("Configuration ID {id} not found.")]
    NotFound { id: String },

    #[error("Invalid JSON format.")]
    InvalidFormat,
}
