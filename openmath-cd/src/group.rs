//! Content Dictionary groups.
//!
//! A group (`.cdg` file) names a set of dictionaries, usually the ones a
//! phrasebook understands. Members refer to dictionaries by name; the
//! dictionaries themselves still come from a [`Registry`].

use tracing::warn;

use crate::registry::Registry;

/// One `CDGroupMember` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupMember {
    /// `CDName`.
    pub name: String,
    /// `CDVersion`.
    pub version: Option<String>,
    /// `CDURL`.
    pub url: Option<String>,
}

/// A parsed Content Dictionary group.
#[derive(Debug, Clone, Default)]
pub struct ContentDictionaryGroup {
    /// `CDGroupName`.
    pub name: String,
    /// `CDGroupDescription`.
    pub description: Option<String>,
    /// `CDGroupVersion`.
    pub version: Option<String>,
    /// `CDGroupRevision`.
    pub revision: Option<String>,
    /// `CDGroupURL`.
    pub url: Option<String>,
    /// Top-level `CDComment` entries.
    pub comments: Vec<String>,
    /// Members in document order.
    pub members: Vec<GroupMember>,
}

impl ContentDictionaryGroup {
    /// The member entry for dictionary `cd`.
    #[must_use]
    pub fn member(&self, cd: &str) -> Option<&GroupMember> {
        self.members.iter().find(|member| member.name == cd)
    }

    /// Whether dictionary `cd` belongs to the group.
    #[must_use]
    pub fn contains(&self, cd: &str) -> bool {
        self.member(cd).is_some()
    }

    /// Members with no dictionary of that name in `registry`.
    #[must_use]
    pub fn missing<'a>(&'a self, registry: &Registry) -> Vec<&'a str> {
        self.members
            .iter()
            .filter(|member| registry.get(&member.name).is_none())
            .map(|member| member.name.as_str())
            .collect()
    }

    /// A registry holding only the dictionaries of `registry` that belong to
    /// the group. Missing members are logged.
    #[must_use]
    pub fn select(&self, registry: &Registry) -> Registry {
        for name in self.missing(registry) {
            warn!(group = %self.name, cd = name, "group member not loaded");
        }
        let mut selected = Registry::new();
        for cd in registry.dictionaries() {
            if self.contains(&cd.name) {
                selected.add(cd.clone());
            }
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::ContentDictionary;

    fn cd(name: &str) -> ContentDictionary {
        ContentDictionary {
            name: name.to_owned(),
            ..ContentDictionary::default()
        }
    }

    fn group() -> ContentDictionaryGroup {
        ContentDictionaryGroup {
            name: "basic".to_owned(),
            members: ["arith1", "fns1", "nums1"]
                .into_iter()
                .map(|name| GroupMember {
                    name: name.to_owned(),
                    ..GroupMember::default()
                })
                .collect(),
            ..ContentDictionaryGroup::default()
        }
    }

    #[test]
    fn membership() {
        let group = group();
        assert!(group.contains("fns1"));
        assert!(!group.contains("transc1"));
        assert_eq!(group.member("nums1").map(|m| m.name.as_str()), Some("nums1"));
    }

    #[test]
    fn select_keeps_members_only() {
        let mut registry = Registry::new();
        for name in ["arith1", "transc1", "fns1"] {
            registry.add(cd(name));
        }
        let group = group();
        assert_eq!(group.missing(&registry), ["nums1"]);

        let selected = group.select(&registry);
        let names: Vec<_> = selected.dictionaries().iter().map(|cd| cd.name.as_str()).collect();
        assert_eq!(names, ["arith1", "fns1"]);
        assert_eq!(registry.len(), 3);
    }
}
