use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Every failure the workflows can surface.
///
/// Nothing is retried or rolled back: an error aborts the current step, and
/// for batches, the rest of the batch.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed configuration, detected before any network call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Any failure reported by (or while talking to) the remote API.
    #[error("remote call `{operation}` failed: {message}")]
    Remote { operation: String, message: String },

    /// An uploaded file settled in a state other than active.
    #[error("file upload failed with state: {state} (file: {file})")]
    UnexpectedState { file: String, state: String },

    /// A remote resource did not reach its expected state within the polling budget.
    #[error("timed out after {waited:?} waiting for {what}")]
    TimedOut { what: String, waited: Duration },

    #[error("no files found in {0:?}")]
    NoFiles(PathBuf),

    #[error("store '{0}' not found")]
    StoreNotFound(String),

    #[error("i/o error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn remote(operation: impl Into<String>, message: impl ToString) -> Self {
        Error::Remote {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
