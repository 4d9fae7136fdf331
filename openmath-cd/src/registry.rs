//! An explicit collection of loaded Content Dictionaries.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use openmath::SymbolKey;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::SearchPath;
use crate::dictionary::{ContentDictionary, SymbolDefinition};
use crate::error::{CdError, Result};
use crate::parser::parse_cd;

const EXTENSION: &str = "ocd";

/// Loaded dictionaries, searched in the order they were added.
#[derive(Debug, Default)]
pub struct Registry {
    dictionaries: Vec<ContentDictionary>,
    loaded: HashSet<PathBuf>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the `.ocd` files directly inside each directory of `path`.
    /// Unreadable files are logged and skipped; a file reachable through
    /// several entries is loaded once.
    #[must_use]
    pub fn from_search_path(path: &SearchPath) -> Self {
        let mut registry = Self::new();
        for dir in path.directories() {
            registry.load_tree(&dir, Some(1));
        }
        registry
    }

    /// Adds a dictionary.
    pub fn add(&mut self, cd: ContentDictionary) {
        debug!(cd = %cd.name, "registered content dictionary");
        self.dictionaries.push(cd);
    }

    /// Reads, parses and adds one file.
    ///
    /// # Errors
    ///
    /// Returns [`CdError::Io`] if the file cannot be read and the errors of
    /// [`parse_cd`] if it is not a valid dictionary.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let text = fs::read_to_string(path).map_err(|source| CdError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let cd = parse_cd(&text)?;
        self.loaded
            .insert(fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()));
        self.add(cd);
        Ok(())
    }

    /// Loads every `.ocd` file below `dir`, recursively. Files that fail to
    /// load are logged and skipped. Returns the number of dictionaries added.
    ///
    /// # Errors
    ///
    /// Returns [`CdError::Io`] if `dir` is not a readable directory.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        fs::read_dir(dir).map_err(|source| CdError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(self.load_tree(dir, None))
    }

    fn load_tree(&mut self, dir: &Path, depth: Option<usize>) -> usize {
        let mut walk = WalkDir::new(dir).follow_links(true).sort_by_file_name();
        if let Some(depth) = depth {
            walk = walk.max_depth(depth);
        }
        let before = self.dictionaries.len();
        for entry in walk {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || !is_cd_file(path) {
                continue;
            }
            if let Ok(canonical) = fs::canonicalize(path) {
                if self.loaded.contains(&canonical) {
                    continue;
                }
            }
            if let Err(err) = self.load_file(path) {
                warn!(path = %path.display(), error = %err, "skipping content dictionary");
            }
        }
        self.dictionaries.len() - before
    }

    /// Finds the dictionary and definition of a symbol.
    #[must_use]
    pub fn lookup(&self, key: &SymbolKey) -> Option<(&ContentDictionary, &SymbolDefinition)> {
        self.dictionaries
            .iter()
            .find(|cd| cd.contains(key))
            .and_then(|cd| cd.definition(&key.name).map(|def| (cd, def)))
    }

    /// The first dictionary named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ContentDictionary> {
        self.dictionaries.iter().find(|cd| cd.name == name)
    }

    /// All dictionaries in load order.
    #[must_use]
    pub fn dictionaries(&self) -> &[ContentDictionary] {
        &self.dictionaries
    }

    /// Number of dictionaries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dictionaries.len()
    }

    /// Whether no dictionary is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dictionaries.is_empty()
    }
}

fn is_cd_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Role;
    use openmath::Om;

    fn cd(name: &str, base: Option<&str>, symbols: &[&str]) -> ContentDictionary {
        ContentDictionary {
            name: name.to_owned(),
            base: base.map(str::to_owned),
            definitions: symbols
                .iter()
                .map(|s| SymbolDefinition {
                    name: (*s).to_owned(),
                    role: Some(Role::Constant),
                    ..SymbolDefinition::default()
                })
                .collect(),
            ..ContentDictionary::default()
        }
    }

    #[test]
    fn lookup_matches_name_cd_and_base() {
        let mut registry = Registry::new();
        registry.add(cd("nums1", None, &["pi", "e"]));
        registry.add(cd("nums1", Some("http://example.org/cd"), &["tau"]));
        assert_eq!(registry.len(), 2);

        let pi = Om::symbol("pi", "nums1").symbol_key().unwrap();
        let (found, def) = registry.lookup(&pi).unwrap();
        assert_eq!(found.base, None);
        assert_eq!(def.name, "pi");

        let tau = Om::symbol("tau", "nums1")
            .with_cdbase("http://example.org/cd")
            .unwrap()
            .symbol_key()
            .unwrap();
        assert_eq!(registry.lookup(&tau).unwrap().0.base.as_deref(), Some("http://example.org/cd"));

        let plain_tau = Om::symbol("tau", "nums1").symbol_key().unwrap();
        assert!(registry.lookup(&plain_tau).is_none());
        assert_eq!(registry.get("nums1").unwrap().definitions.len(), 2);
        assert!(registry.get("arith1").is_none());
    }

    #[test]
    fn recognises_extension_case_insensitively() {
        assert!(is_cd_file(Path::new("a/arith1.ocd")));
        assert!(is_cd_file(Path::new("ARITH1.OCD")));
        assert!(!is_cd_file(Path::new("arith1.xml")));
        assert!(!is_cd_file(Path::new("ocd")));
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Registry::new().load_dir(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, CdError::Io { .. }));
    }
}
