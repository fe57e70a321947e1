use std::path::PathBuf;
use thiserror::Error;

/// A single HTTP request could not produce a usable response.
///
/// Never retried by the library; the caller decides what to do next.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("server responded with HTTP {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Connection(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => TransportError::Status(status.as_u16()),
            // Strip the URL so query-string tokens never leak into logs.
            None => TransportError::Connection(err.without_url().to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("failed to fetch releases: {0}")]
    Transport(#[from] TransportError),

    #[error("malformed releases response: {0}")]
    MalformedResponse(String),
}

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("download failed: {0}")]
    Transport(#[from] TransportError),

    #[error("cannot write {}: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TransferError {
    pub fn file_system(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TransferError::FileSystem {
            path: path.into(),
            source,
        }
    }
}
