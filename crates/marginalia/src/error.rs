use thiserror::Error;

use crate::model::ThreadId;

#[derive(Error, Debug)]
pub enum MarginaliaError {
    #[error("Thread not found: {thread} in {target}")]
    ThreadNotFound { target: String, thread: ThreadId },

    #[error("Comment {index} is out of range for thread {thread} ({total} comments)")]
    CommentOutOfRange {
        thread: ThreadId,
        index: usize,
        total: usize,
    },

    #[error("Invalid creator: {0}")]
    InvalidCreator(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed payload for {target}: {reason}")]
    MalformedPayload { target: String, reason: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, MarginaliaError>;
