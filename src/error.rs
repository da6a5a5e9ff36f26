use std::io;
use thiserror::Error;

/// Main error type for the server
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("bind failed: {0}")]
    Bind(io::Error),

    #[error("listen failed: {0}")]
    Listen(io::Error),

    #[error("accept failed: {0}")]
    Accept(io::Error),

    #[error("connection read failed: {0}")]
    ConnectionRead(io::Error),

    #[error("connection write failed: {0}")]
    ConnectionWrite(io::Error),

    #[error("could not open {path}: {source}")]
    FileOpen { path: String, source: io::Error },

    #[error("file stream failed: {0}")]
    FileStream(io::Error),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;
