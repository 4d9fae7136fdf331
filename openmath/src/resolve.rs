//! Resolution of `OMR` references.
//!
//! An `href` has the form `location#fragment`. An empty location names the
//! document holding the reference; otherwise the location is fetched through
//! a [`Fetch`] implementation and decoded (by extension, else by sniffing).
//! The fragment names the `id` of the target inside that document; without
//! a fragment the whole document is the target.
//!
//! Resolution is recursive: references inside a target are expanded before
//! the target is copied over the reference. A stack of the hrefs currently
//! being expanded detects cycles.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use crate::codec::{self, Encoding};
use crate::error::{Error, Result};
use crate::model::{Kind, Om};

/// Why a document could not be fetched.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Nothing exists at the location.
    #[error("{0} not found")]
    NotFound(String),
    /// The location exists or may exist, but reading it failed.
    #[error("failed to fetch {location}: {reason}")]
    Transport {
        /// What was being fetched.
        location: String,
        /// The underlying failure.
        reason: String,
    },
}

/// Loads documents by location.
pub trait Fetch {
    /// Returns the text of the document at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::NotFound`] if there is no such document and
    /// [`FetchError::Transport`] if it could not be read.
    fn fetch(&self, location: &str) -> std::result::Result<String, FetchError>;
}

impl<F: Fetch + ?Sized> Fetch for &F {
    fn fetch(&self, location: &str) -> std::result::Result<String, FetchError> {
        (**self).fetch(location)
    }
}

/// In-memory documents keyed by location.
impl Fetch for HashMap<String, String> {
    fn fetch(&self, location: &str) -> std::result::Result<String, FetchError> {
        self.get(location)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(location.to_owned()))
    }
}

/// Fetches `http`/`https` URLs over the network and everything else from
/// the file system. Relative paths are taken from `base_dir`.
///
/// Network access needs the `remote` feature.
#[derive(Debug, Clone)]
pub struct DefaultFetcher {
    base_dir: PathBuf,
}

impl Default for DefaultFetcher {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
        }
    }
}

impl DefaultFetcher {
    /// Fetcher resolving relative paths against the working directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetcher resolving relative paths against `base_dir`.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Directory relative paths are resolved against.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl Fetch for DefaultFetcher {
    fn fetch(&self, location: &str) -> std::result::Result<String, FetchError> {
        match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => fetch_remote(&url),
            Ok(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|()| FetchError::NotFound(location.to_owned()))?;
                read_local(&path)
            }
            // Single letters are Windows drive prefixes, not schemes.
            Ok(url) if url.scheme().len() > 1 => Err(FetchError::Transport {
                location: location.to_owned(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            }),
            _ => read_local(&self.base_dir.join(location)),
        }
    }
}

fn read_local(path: &Path) -> std::result::Result<String, FetchError> {
    debug!(path = %path.display(), "reading local document");
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => FetchError::NotFound(path.display().to_string()),
        _ => FetchError::Transport {
            location: path.display().to_string(),
            reason: e.to_string(),
        },
    })
}

#[cfg(feature = "remote")]
fn fetch_remote(url: &Url) -> std::result::Result<String, FetchError> {
    debug!(%url, "fetching remote document");
    let transport = |e: reqwest::Error| FetchError::Transport {
        location: url.to_string(),
        reason: e.to_string(),
    };
    let response = reqwest::blocking::get(url.as_str()).map_err(transport)?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound(url.to_string()));
    }
    response
        .error_for_status()
        .map_err(transport)?
        .text()
        .map_err(transport)
}

#[cfg(not(feature = "remote"))]
fn fetch_remote(url: &Url) -> std::result::Result<String, FetchError> {
    Err(FetchError::Transport {
        location: url.to_string(),
        reason: "remote documents need the `remote` feature".to_owned(),
    })
}

/// Splits an href into its location and its non-empty fragment.
///
/// ```
/// use openmath::resolve::split_href;
///
/// assert_eq!(split_href("doc.om#a"), ("doc.om", Some("a")));
/// assert_eq!(split_href("#a"), ("", Some("a")));
/// assert_eq!(split_href("doc.om"), ("doc.om", None));
/// ```
#[must_use]
pub fn split_href(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((location, fragment)) if !fragment.is_empty() => (location, Some(fragment)),
        Some((location, _)) => (location, None),
        None => (href, None),
    }
}

/// Expands references, tracking the hrefs under expansion.
#[derive(Debug)]
pub struct Resolver<F> {
    fetcher: F,
    stack: Vec<String>,
}

impl<F: Fetch> Resolver<F> {
    /// Creates a resolver loading external documents through `fetcher`.
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            stack: Vec::new(),
        }
    }

    /// The fetcher in use.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Resolves one `OMR` and returns its fully expanded target.
    ///
    /// When the reference has a parent, the parent's slot is replaced by a
    /// copy of the target.
    ///
    /// # Errors
    ///
    /// - [`Error::TypeMismatch`] if `reference` is not an `OMR`.
    /// - [`Error::CyclicReference`] if the href is already being expanded.
    /// - [`Error::Unresolvable`] if the document cannot be fetched or holds
    ///   no object with the fragment's `id`.
    /// - Decoding errors of the fetched document.
    pub fn resolve(&mut self, reference: &Om) -> Result<Om> {
        self.resolve_in_place(reference).map(|(target, _)| target)
    }

    /// Expands every reference in `tree` and returns the expanded tree.
    ///
    /// The tree is changed in place. If `tree` itself is an `OMR`, the
    /// returned object is its expanded target.
    ///
    /// # Errors
    ///
    /// Stops at the first reference that fails to resolve, with the errors of
    /// [`Resolver::resolve`]. Replacements made before the failure remain.
    pub fn dereference(&mut self, tree: &Om) -> Result<Om> {
        let mut root = tree.clone();
        loop {
            let mut found = 0usize;
            let mut substituted = 0usize;
            let mut new_root = None;
            let failure = root.try_apply(|node| {
                if node.kind() != Kind::Reference {
                    return ControlFlow::Continue(());
                }
                found += 1;
                match self.resolve_in_place(node) {
                    Ok((target, replaced)) => {
                        if replaced {
                            substituted += 1;
                        } else if node.ptr_eq(&root) {
                            new_root = Some(target);
                            substituted += 1;
                        }
                        ControlFlow::Continue(())
                    }
                    Err(e) => ControlFlow::Break(e),
                }
            });
            if let Some(e) = failure {
                return Err(e);
            }
            if let Some(target) = new_root {
                root = target;
            }
            debug!(found, substituted, "dereference pass");
            if found == 0 || substituted == 0 {
                return Ok(root);
            }
        }
    }

    fn resolve_in_place(&mut self, reference: &Om) -> Result<(Om, bool)> {
        let href = reference
            .href()
            .ok_or_else(|| Error::mismatch(Kind::Reference.as_str(), reference.kind()))?;
        if self.stack.contains(&href) {
            let mut chain = self.stack.clone();
            chain.push(href);
            return Err(Error::CyclicReference { chain });
        }
        debug!(href = %href, depth = self.stack.len(), "resolving reference");

        let (location, fragment) = split_href(&href);
        let document = if location.is_empty() {
            reference.root()
        } else {
            self.load(&href, location)?
        };
        let target = match fragment {
            Some(id) => document.get_by_id(id).ok_or_else(|| Error::Unresolvable {
                href: href.clone(),
                reason: format!("no object with id '{id}'"),
            })?,
            None => document,
        };

        self.stack.push(href);
        let expanded = self.dereference(&target);
        self.stack.pop();
        let target = expanded?;

        let replaced = match reference.parent() {
            Some(parent) => parent.replace(reference, &target)? > 0,
            None => false,
        };
        Ok((target, replaced))
    }

    fn load(&self, href: &str, location: &str) -> Result<Om> {
        let text = self
            .fetcher
            .fetch(location)
            .map_err(|e| Error::Unresolvable {
                href: href.to_owned(),
                reason: e.to_string(),
            })?;
        match Encoding::from_path(location) {
            Some(encoding) => encoding.parse(&text),
            None => codec::parse(&text),
        }
    }
}

/// Expands every reference in `tree`, fetching through `fetcher`.
///
/// # Errors
///
/// See [`Resolver::dereference`].
pub fn dereference<F: Fetch>(tree: &Om, fetcher: F) -> Result<Om> {
    Resolver::new(fetcher).dereference(tree)
}

impl Om {
    /// Resolves this `OMR` with a [`DefaultFetcher`].
    ///
    /// # Errors
    ///
    /// See [`Resolver::resolve`].
    pub fn resolve(&self) -> Result<Om> {
        Resolver::new(DefaultFetcher::new()).resolve(self)
    }

    /// Expands every reference in this tree with a [`DefaultFetcher`].
    ///
    /// # Errors
    ///
    /// See [`Resolver::dereference`].
    pub fn dereference(&self) -> Result<Om> {
        dereference(self, DefaultFetcher::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn documents(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(location, text)| ((*location).to_owned(), (*text).to_owned()))
            .collect()
    }

    #[test]
    fn splits_hrefs() {
        assert_eq!(split_href("a.om#x"), ("a.om", Some("x")));
        assert_eq!(split_href("a.om#"), ("a.om", None));
        assert_eq!(split_href(""), ("", None));
    }

    #[test]
    fn resolves_local_fragment() {
        let shared = Om::application(Om::symbol("plus", "arith1"), [Om::integer(1)]).with_id("s");
        let reference = Om::reference("#s");
        let doc = Om::object(Om::application(
            Om::symbol("times", "arith1"),
            [shared.clone(), reference.clone()],
        ));
        let mut resolver = Resolver::new(documents(&[]));
        let target = resolver.resolve(&reference).unwrap();
        assert_eq!(target, shared);
        let args = doc.inner().unwrap().arguments();
        assert_eq!(args[1], shared);
        assert_eq!(args[1].kind(), Kind::Application);
    }

    #[test]
    fn resolves_external_document() {
        let fetcher = documents(&[(
            "lib.json",
            r#"{"kind":"OMOBJ","object":{"kind":"OMI","integer":7,"id":"seven"}}"#,
        )]);
        let doc = Om::object(Om::application(
            Om::symbol("f", "cd"),
            [Om::reference("lib.json#seven")],
        ));
        let expanded = dereference(&doc, &fetcher).unwrap();
        assert!(expanded.ptr_eq(&doc));
        assert_eq!(doc.inner().unwrap().arguments()[0].as_integer(), Some(7));
    }

    #[test]
    fn missing_target_is_unresolvable() {
        let doc = Om::object(Om::reference("#nowhere"));
        let err = dereference(&doc, documents(&[])).unwrap_err();
        assert!(matches!(err, Error::Unresolvable { .. }), "{err}");
        let doc = Om::object(Om::reference("absent.om#a"));
        let err = dereference(&doc, documents(&[])).unwrap_err();
        assert!(matches!(err, Error::Unresolvable { .. }), "{err}");
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let fetcher = documents(&[(
            "doc1.om",
            r##"<OMOBJ><OMA id="a"><OMS name="f" cd="c"/><OMR href="doc1.om#a"/></OMA></OMOBJ>"##,
        )]);
        let err = Resolver::new(&fetcher)
            .resolve(&Om::reference("doc1.om#a"))
            .unwrap_err();
        match err {
            Error::CyclicReference { chain } => assert_eq!(chain, ["doc1.om#a", "doc1.om#a"]),
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn root_reference_is_replaced_by_target() {
        let fetcher = documents(&[("v.json", r#"{"kind":"OMV","name":"x"}"#)]);
        let expanded = dereference(&Om::reference("v.json"), &fetcher).unwrap();
        assert_eq!(expanded, Om::variable("x"));
    }

    #[test]
    fn nested_references_are_expanded_before_copying() {
        let fetcher = documents(&[
            ("a.om", r#"<OMA id="top"><OMS name="f" cd="c"/><OMR href="b.om#leaf"/></OMA>"#),
            ("b.om", r#"<OMOBJ><OMI id="leaf">3</OMI></OMOBJ>"#),
        ]);
        let doc = Om::object(Om::reference("a.om#top"));
        dereference(&doc, &fetcher).unwrap();
        let app = doc.inner().unwrap();
        assert_eq!(app.kind(), Kind::Application);
        assert_eq!(app.arguments()[0].as_integer(), Some(3));
        assert!(!doc.contains(&Om::reference("b.om#leaf")));
    }

    #[test]
    fn resolve_rejects_other_kinds() {
        let err = Resolver::new(documents(&[]))
            .resolve(&Om::integer(1))
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }), "{err}");
    }

    #[test]
    fn default_fetcher_reads_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.om"), "<OMV name='x'/>").unwrap();
        let fetcher = DefaultFetcher::with_base_dir(dir.path());
        assert!(fetcher.fetch("x.om").unwrap().contains("OMV"));
        assert!(matches!(fetcher.fetch("y.om"), Err(FetchError::NotFound(_))));
        assert!(matches!(
            fetcher.fetch("ftp://example.org/x.om"),
            Err(FetchError::Transport { .. })
        ));
    }
}
