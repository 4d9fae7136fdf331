//! Error type shared by every OpenMath operation.

use thiserror::Error;

/// Errors raised while building, decoding, or resolving OpenMath objects.
///
/// All of them are terminal for the operation that raised them. Traversal
/// and equality never fail; absence is reported as `None` or `false`.
#[derive(Debug, Error)]
pub enum Error {
    /// A node of the wrong kind was passed where a specific kind is required,
    /// or an operation was invoked on a kind that does not carry the field.
    #[error("type mismatch: expected {expected}, got {found}")]
    TypeMismatch {
        /// What the operation accepts.
        expected: String,
        /// What it was given.
        found: String,
    },

    /// A kind-specific invariant does not hold (empty binding variables,
    /// non-symbol attribution key, ownership cycle, ...).
    #[error("{0}")]
    ValueConstraint(String),

    /// The text or tree handed to a decoder is not a valid OpenMath object.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Auto-detection found neither a JSON object nor an XML element.
    #[error("unable to detect encoding: input starts with neither '{{' nor '<'")]
    UnknownEncoding,

    /// The target of a reference could not be located or fetched.
    #[error("could not resolve {href}: {reason}")]
    Unresolvable {
        /// The reference being resolved.
        href: String,
        /// Why it failed.
        reason: String,
    },

    /// Resolution revisited an href that is still being resolved.
    #[error("cyclic reference: {}", chain.join(" > "))]
    CyclicReference {
        /// The resolution stack, ending with the repeated href.
        chain: Vec<String>,
    },
}

impl Error {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput(message.into())
    }

    pub(crate) fn mismatch(expected: impl Into<String>, found: impl ToString) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.to_string(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclic_reference_names_the_chain() {
        let err = Error::CyclicReference {
            chain: vec!["a.om#x".to_owned(), "b.om".to_owned(), "a.om#x".to_owned()],
        };
        assert_eq!(err.to_string(), "cyclic reference: a.om#x > b.om > a.om#x");
    }

    #[test]
    fn mismatch_message() {
        let err = Error::mismatch("OMS", "OMI");
        assert_eq!(err.to_string(), "type mismatch: expected OMS, got OMI");
    }
}
