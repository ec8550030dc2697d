//! Error types for the postbox-spool crate.
//!
//! This module provides typed error handling for outbox operations
//! including directory validation, message composition, and state
//! transitions.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::store::Disposition;

/// Top-level spool error type.
///
/// All store operations return this error type, which categorizes
/// failures into I/O, validation, composition, and transition errors.
#[derive(Debug, Error)]
pub enum SpoolError {
    /// I/O operation failed (directory scan, file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Outbox root validation failed.
    #[error("Store validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A message could not be composed for deposit.
    #[error("Compose error: {0}")]
    Compose(#[from] ComposeError),

    /// A state transition failed, most commonly because the source file
    /// disappeared between enumeration and the move.
    #[error("failed to move {} to {state}: {source}", .path.display())]
    Move {
        path: PathBuf,
        state: Disposition,
        source: io::Error,
    },
}

/// Outbox root validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The configured root is a relative path.
    #[error("Outbox root must be absolute: {}", .0.display())]
    NotAbsolute(PathBuf),

    /// The configured root contains a `..` component.
    #[error("Outbox root cannot contain '..' components: {}", .0.display())]
    ParentComponent(PathBuf),

    /// The configured root sits inside a sensitive system directory.
    #[error("Outbox root cannot be in system directory {prefix}: {}", .path.display())]
    SystemDirectory {
        prefix: &'static str,
        path: PathBuf,
    },

    /// A state directory path exists but is not a directory.
    #[error("Expected {} to be a directory, but it is not", .0.display())]
    NotADirectory(PathBuf),
}

/// Message composition errors.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// Neither the message nor the store configuration names a sender.
    #[error("message has no sender and no default sender is configured")]
    MissingSender,

    /// The message names no recipients.
    #[error("message has no recipients")]
    NoRecipients,

    /// The message has neither a plain-text nor an HTML body.
    #[error("message has no body")]
    NoBody,
}

/// Directory-watch errors.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The OS-level watch could not be established.
    #[error("failed to establish filesystem watch on {}: {source}", .path.display())]
    Setup {
        path: PathBuf,
        source: notify::Error,
    },

    /// The event channel feeding the debounce loop closed while the
    /// watcher was still supposed to be running.
    #[error("filesystem event channel closed unexpectedly")]
    ChannelClosed,
}

/// Specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, SpoolError>;
