//! Error types for the board core and its document stores.

use crate::types::RecordId;
use std::fmt;
use thiserror::Error;

/// Errors raised by a [`DocumentStore`](crate::store::DocumentStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Store is locked by another process")]
    Locked,

    #[error("Store not initialized")]
    NotInitialized,

    #[error("Document not found: {0}")]
    NotFound(RecordId),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Write rejected: {0}")]
    Rejected(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for StoreError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for StoreError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        StoreError::Deserialization(e.to_string())
    }
}

/// A field that must be filled before a draft can be submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequiredField {
    Title,
    Body,
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequiredField::Title => f.write_str("title"),
            RequiredField::Body => f.write_str("body"),
        }
    }
}

/// Local, pre-submission failure. Never reaches the store.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("missing required fields: {}", join_fields(.missing))]
pub struct ValidationError {
    pub missing: Vec<RequiredField>,
}

fn join_fields(fields: &[RequiredField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Main error type for repository and editor operations.
#[derive(Debug, Error)]
pub enum BoardError {
    /// Read path failure (listing records).
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// Write path failure (create, update or delete).
    #[error("Persistence error: {0}")]
    Persistence(#[source] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl BoardError {
    /// Whether the failure happened before anything was sent to the store.
    pub fn is_local(&self) -> bool {
        matches!(self, BoardError::Validation(_))
    }
}

/// Failure to load a [`BoardConfig`](crate::repository::BoardConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type for repository and editor operations.
pub type Result<T> = std::result::Result<T, BoardError>;

/// Result type for document store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_fields() {
        let err = ValidationError {
            missing: vec![RequiredField::Title, RequiredField::Body],
        };
        assert_eq!(err.to_string(), "missing required fields: title, body");
    }

    #[test]
    fn test_board_error_wraps_store_error() {
        let err = BoardError::Persistence(StoreError::Rejected("quota".into()));
        assert_eq!(err.to_string(), "Persistence error: Write rejected: quota");
        assert!(!err.is_local());

        let err: BoardError = ValidationError {
            missing: vec![RequiredField::Body],
        }
        .into();
        assert!(err.is_local());
    }
}
