//! OpenMath objects as a typed Rust tree.
//!
//! The `openmath` crate provides the thirteen OpenMath object kinds as a
//! shared, parent-aware tree, generic algorithms over that tree (traversal,
//! structural equality, deep copy, in-place substitution), the JSON and XML
//! encodings, and resolution of `OMR` references used for structure sharing.
//!
//! # Building objects
//!
//! ```
//! use openmath::Om;
//!
//! let plus = Om::symbol("plus", "arith1");
//! let sum = Om::application(plus, [Om::integer(1), Om::variable("x")]);
//! assert_eq!(sum.arguments().len(), 2);
//! ```
//!
//! # Encodings
//!
//! ```
//! use openmath::{codec, Om};
//!
//! let sin_x = Om::application(Om::symbol("sin", "transc1"), [Om::variable("x")]);
//! let xml = sin_x.to_xml();
//! let json = sin_x.to_json();
//! assert_eq!(codec::parse(&xml).ok(), Some(sin_x.clone()));
//! assert_eq!(codec::parse(&json).ok(), Some(sin_x));
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod codec;
pub mod dom;
pub mod error;
pub mod model;
pub mod resolve;
pub mod traverse;

pub use error::{Error, Result};
pub use model::{Content, Foreign, Kind, Om, SymbolKey};
pub use resolve::{DefaultFetcher, Fetch, FetchError, Resolver};

/// Namespace of OpenMath XML elements.
pub const OPENMATH_NS: &str = "http://www.openmath.org/OpenMath";

/// Version written on `OMOBJ` when none is given.
pub const DEFAULT_VERSION: &str = "2.0";
