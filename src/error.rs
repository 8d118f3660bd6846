use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::encoding::{EncodingError, UnknownEncoding};

/// Problems detected before any network activity. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no HL7 messages to send")]
    EmptyMessageSet,

    #[error(transparent)]
    UnknownEncoding(#[from] UnknownEncoding),

    #[error("invalid {name}: {value} (expected a non-negative number of seconds)")]
    InvalidDuration { name: &'static str, value: f64 },

    #[error("failed to read message file {}: {source}", .path.display())]
    MessageFile { path: PathBuf, source: io::Error },

    #[error("message file {} is empty", .0.display())]
    EmptyMessageFile(PathBuf),
}

/// Faults that end one connection cycle. The sender recovers from all of
/// them by backing off and reconnecting.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("connection fault: {0}")]
    Connection(#[from] io::Error),

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}
