//! Where Content Dictionaries are looked for.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Environment variable holding extra CD directories, separated by `;`.
pub const CD_PATH_VAR: &str = "OM_CD_PATH";

const SEPARATOR: char = ';';

/// Ordered list of directories to load `.ocd` files from.
///
/// Order: explicit directories, then the entries of [`CD_PATH_VAR`], then
/// `./cd` and `./`. Blank entries are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    explicit: Vec<PathBuf>,
    env: Vec<PathBuf>,
}

impl SearchPath {
    /// A search path with no explicit directories, reading [`CD_PATH_VAR`].
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(Vec::<PathBuf>::new())
    }

    /// A search path starting with `explicit`, then reading [`CD_PATH_VAR`].
    #[must_use]
    pub fn new<P: Into<PathBuf>>(explicit: impl IntoIterator<Item = P>) -> Self {
        let env = std::env::var(CD_PATH_VAR).unwrap_or_default();
        Self::with_env_value(explicit, &env)
    }

    /// As [`SearchPath::new`], with the environment value given directly.
    #[must_use]
    pub fn with_env_value<P: Into<PathBuf>>(
        explicit: impl IntoIterator<Item = P>,
        env: &str,
    ) -> Self {
        let explicit = explicit
            .into_iter()
            .map(Into::into)
            .filter(|p: &PathBuf| !p.as_os_str().to_string_lossy().trim().is_empty())
            .collect();
        let env = env
            .split(SEPARATOR)
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(PathBuf::from)
            .collect();
        Self { explicit, env }
    }

    /// All entries in search order, existing or not.
    pub fn entries(&self) -> impl Iterator<Item = &Path> {
        self.explicit
            .iter()
            .chain(&self.env)
            .map(PathBuf::as_path)
            .chain([Path::new("./cd"), Path::new("./")])
    }

    /// Entries that are existing directories.
    #[must_use]
    pub fn directories(&self) -> Vec<PathBuf> {
        self.entries()
            .filter(|entry| {
                let found = entry.is_dir();
                if !found {
                    debug!(path = %entry.display(), "skipping missing CD directory");
                }
                found
            })
            .map(Path::to_path_buf)
            .collect()
    }
}
