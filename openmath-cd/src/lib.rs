//! OpenMath Content Dictionaries.
//!
//! A Content Dictionary (CD) defines the meaning of the symbols an OpenMath
//! object refers to. This crate parses CD files, keeps them in an explicit
//! [`Registry`], and checks objects against it. CD groups
//! ([`ContentDictionaryGroup`]) narrow a registry to a named set of
//! dictionaries.
//!
//! # Checks
//!
//! | Finding | Severity |
//! |---------|----------|
//! | Symbol not defined by any loaded CD | Warning |
//! | Symbol from an `experimental` or `obsolete` CD | Warning |
//! | Symbol used in a position its role forbids | Failure |
//!
//! # Entry Point
//!
//! ```no_run
//! use openmath_cd::{validate, Registry, SearchPath};
//!
//! let registry = Registry::from_search_path(&SearchPath::from_env());
//! let om = openmath::codec::parse(r#"<OMA><OMS cd="arith1" name="plus"/></OMA>"#)?;
//! let report = validate(&om, &registry);
//! assert!(report.all_passed());
//! # Ok::<(), openmath::Error>(())
//! ```

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

pub mod config;
pub mod dictionary;
pub mod error;
pub mod group;
pub mod parser;
pub mod registry;
pub mod report;
pub mod validate;

pub use config::{SearchPath, CD_PATH_VAR};
pub use dictionary::{ContentDictionary, Example, Role, Status, SymbolDefinition, CDBASE_OFFICIAL};
pub use error::{CdError, Result};
pub use group::{ContentDictionaryGroup, GroupMember};
pub use parser::{parse_cd, parse_cdg};
pub use registry::Registry;
pub use report::{Finding, Outcome, Severity, ValidationReport};
pub use validate::validate;
