//! Error kinds shared by the library. The policy at the boundaries is
//! fail-fast: binaries print the error and exit; library callers get a
//! structured `Result`.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// An unparsable dataset or model file.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A training option value outside the recognized set.
    #[error("unknown option value: {0}")]
    UnknownOption(String),

    /// A file that could not be opened.
    #[error("cannot open {path}: {source}")]
    MissingFile {
        path: String,
        #[source]
        source: io::Error,
    },

    /// A broken internal invariant. Indicates a bug, not bad input.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Wraps an `io::Error` from opening `path`.
    pub fn missing_file(path: &std::path::Path, source: io::Error) -> Self {
        Error::MissingFile {
            path: path.display().to_string(),
            source,
        }
    }
}
