//! Content Dictionary model.

use std::fmt;
use std::str::FromStr;

use openmath::{Om, SymbolKey};
use serde::Serialize;

use crate::error::{CdError, Result};

/// Base URI of the official OpenMath Content Dictionaries. Symbols without a
/// `cdbase` are looked up against it.
pub const CDBASE_OFFICIAL: &str = "http://www.openmath.org/cd";

/// Publication status of a dictionary (`CDStatus`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Approved by the OpenMath Society.
    Official,
    /// Under development; may change.
    Experimental,
    /// For private use.
    Private,
    /// Superseded; kept for backward compatibility.
    Obsolete,
}

impl Status {
    /// Returns the `CDStatus` keyword.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Official => "official",
            Status::Experimental => "experimental",
            Status::Private => "private",
            Status::Obsolete => "obsolete",
        }
    }
}

impl FromStr for Status {
    type Err = CdError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "official" => Ok(Status::Official),
            "experimental" => Ok(Status::Experimental),
            "private" => Ok(Status::Private),
            "obsolete" => Ok(Status::Obsolete),
            other => Err(CdError::Malformed(format!("unknown CDStatus '{other}'"))),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a symbol: the positions in which it may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Head of an application.
    Application,
    /// Binder of a binding.
    Binder,
    /// Key of an attribution.
    Attribution,
    /// Key of an attribution that changes the meaning of the object.
    SemanticAttribution,
    /// Head of an error.
    Error,
    /// Stands alone.
    Constant,
}

impl Role {
    /// Returns the `Role` keyword.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Application => "application",
            Role::Binder => "binder",
            Role::Attribution => "attribution",
            Role::SemanticAttribution => "semantic-attribution",
            Role::Error => "error",
            Role::Constant => "constant",
        }
    }
}

impl FromStr for Role {
    type Err = CdError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "application" => Ok(Role::Application),
            "binder" => Ok(Role::Binder),
            "attribution" => Ok(Role::Attribution),
            "semantic-attribution" => Ok(Role::SemanticAttribution),
            "error" => Ok(Role::Error),
            "constant" => Ok(Role::Constant),
            other => Err(CdError::Malformed(format!("unknown Role '{other}'"))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An `Example` of a symbol definition: prose and the objects it shows.
#[derive(Debug, Clone, Default)]
pub struct Example {
    /// Prose of the example, trimmed.
    pub text: String,
    /// Objects embedded in the example.
    pub objects: Vec<Om>,
}

/// A `CDDefinition`.
#[derive(Debug, Clone, Default)]
pub struct SymbolDefinition {
    /// Symbol name.
    pub name: String,
    /// Prose description.
    pub description: Option<String>,
    /// Declared role; `None` when the definition states none.
    pub role: Option<Role>,
    /// Commented mathematical properties.
    pub cmp: Vec<String>,
    /// Formal mathematical properties.
    pub fmp: Vec<Om>,
    /// Examples.
    pub examples: Vec<Example>,
}

/// A parsed Content Dictionary.
#[derive(Debug, Clone, Default)]
pub struct ContentDictionary {
    /// `CDName`.
    pub name: String,
    /// `Description`.
    pub description: Option<String>,
    /// `CDDate`.
    pub revision: Option<String>,
    /// `CDReviewDate`.
    pub review: Option<String>,
    /// `CDVersion`.
    pub version: Option<String>,
    /// `CDStatus`.
    pub status: Option<Status>,
    /// `CDBase`.
    pub base: Option<String>,
    /// `CDURL`.
    pub url: Option<String>,
    /// `CDComment` entries.
    pub comments: Vec<String>,
    /// Symbol definitions in document order.
    pub definitions: Vec<SymbolDefinition>,
}

impl ContentDictionary {
    /// The definition of symbol `name`.
    #[must_use]
    pub fn definition(&self, name: &str) -> Option<&SymbolDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    /// The base symbols of this dictionary live under, official if unstated.
    #[must_use]
    pub fn effective_base(&self) -> &str {
        self.base.as_deref().unwrap_or(CDBASE_OFFICIAL)
    }

    /// Whether this dictionary defines the symbol identified by `key`.
    #[must_use]
    pub fn contains(&self, key: &SymbolKey) -> bool {
        key.cd == self.name
            && key.cdbase.as_deref().unwrap_or(CDBASE_OFFICIAL) == self.effective_base()
            && self.definition(&key.name).is_some()
    }

    /// Builds an `OMS` for symbol `name`, with this dictionary's base as its
    /// `cdbase` when `with_base` is set.
    ///
    /// # Errors
    ///
    /// Returns [`CdError::UnknownSymbol`] if the dictionary does not define
    /// `name`.
    pub fn symbol(&self, name: &str, with_base: bool) -> Result<Om> {
        if self.definition(name).is_none() {
            return Err(CdError::UnknownSymbol {
                cd: self.name.clone(),
                name: name.to_owned(),
            });
        }
        let symbol = Om::symbol(name, self.name.as_str());
        match (&self.base, with_base) {
            (Some(base), true) => Ok(symbol.with_cdbase(base.as_str())?),
            _ => Ok(symbol),
        }
    }

    /// Whether symbols from this dictionary deserve a warning.
    #[must_use]
    pub fn is_unstable(&self) -> bool {
        matches!(self.status, Some(Status::Experimental | Status::Obsolete))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arith1() -> ContentDictionary {
        ContentDictionary {
            name: "arith1".to_owned(),
            base: Some(CDBASE_OFFICIAL.to_owned()),
            definitions: vec![SymbolDefinition {
                name: "plus".to_owned(),
                role: Some(Role::Application),
                ..SymbolDefinition::default()
            }],
            ..ContentDictionary::default()
        }
    }

    #[test]
    fn keywords_round_trip() {
        for role in [
            Role::Application,
            Role::Binder,
            Role::Attribution,
            Role::SemanticAttribution,
            Role::Error,
            Role::Constant,
        ] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert_eq!(" experimental ".parse::<Status>().unwrap(), Status::Experimental);
        assert!("draft".parse::<Status>().is_err());
    }

    #[test]
    fn contains_defaults_to_official_base() {
        let cd = arith1();
        let plain = Om::symbol("plus", "arith1").symbol_key().unwrap();
        assert!(cd.contains(&plain));
        let other = Om::symbol("plus", "arith1")
            .with_cdbase("http://example.org/cd")
            .unwrap()
            .symbol_key()
            .unwrap();
        assert!(!cd.contains(&other));
        let missing = Om::symbol("minus", "arith1").symbol_key().unwrap();
        assert!(!cd.contains(&missing));
    }

    #[test]
    fn symbol_builds_known_names_only() {
        let cd = arith1();
        let plain = cd.symbol("plus", false).unwrap();
        assert_eq!(plain, Om::symbol("plus", "arith1"));
        assert_eq!(plain.own_cdbase(), None);
        let based = cd.symbol("plus", true).unwrap();
        assert_eq!(based.own_cdbase().as_deref(), Some(CDBASE_OFFICIAL));
        assert!(matches!(
            cd.symbol("times", false),
            Err(CdError::UnknownSymbol { .. })
        ));
    }
}
