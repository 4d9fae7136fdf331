//! Errors raised while loading and querying Content Dictionaries.

use std::path::PathBuf;

use thiserror::Error;

/// Content Dictionary errors.
#[derive(Debug, Error)]
pub enum CdError {
    /// The text is not a well-formed Content Dictionary.
    #[error("malformed content dictionary: {0}")]
    Malformed(String),

    /// The dictionary does not define the requested symbol.
    #[error("content dictionary {cd} does not define {name}")]
    UnknownSymbol {
        /// Dictionary name.
        cd: String,
        /// Requested symbol name.
        name: String,
    },

    /// A dictionary file or directory could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The file or directory.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// An embedded OpenMath object could not be decoded or built.
    #[error(transparent)]
    Om(#[from] openmath::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CdError>;
