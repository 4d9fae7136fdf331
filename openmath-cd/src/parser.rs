//! Reader for the OpenMath Content Dictionary XML format.
//!
//! The reader is namespace tolerant: header and definition elements are
//! looked up in whatever namespace the `CD` root uses (normally
//! `http://www.openmath.org/OpenMathCD`, or none). Objects inside `FMP` and
//! `Example` are decoded with the core XML codec. Group files (`CDGroup`
//! root) are read the same way.

use openmath::codec;
use openmath::dom::Element;
use openmath::{Kind, Om};
use tracing::debug;

use crate::dictionary::{ContentDictionary, Example, SymbolDefinition};
use crate::error::{CdError, Result};
use crate::group::{ContentDictionaryGroup, GroupMember};

/// Parses a Content Dictionary document.
///
/// # Errors
///
/// Returns [`CdError::Malformed`] if the text is not XML, the root is not
/// `CD`, `CDName` is missing, or a `CDStatus` or `Role` keyword is unknown.
/// Returns [`CdError::Om`] if an embedded object cannot be decoded.
pub fn parse_cd(text: &str) -> Result<ContentDictionary> {
    let root = Element::parse(text).map_err(|err| CdError::Malformed(err.to_string()))?;
    from_element(&root)
}

/// Builds a Content Dictionary from a parsed `CD` element.
///
/// # Errors
///
/// As for [`parse_cd`].
pub fn from_element(root: &Element) -> Result<ContentDictionary> {
    if root.name != "CD" {
        return Err(CdError::Malformed(format!(
            "root element must be CD, not {}",
            root.name
        )));
    }
    let name = field(root, "CDName")
        .ok_or_else(|| CdError::Malformed("missing CDName".to_owned()))?;
    let cd = ContentDictionary {
        description: field(root, "Description"),
        revision: field(root, "CDDate"),
        review: field(root, "CDReviewDate"),
        version: field(root, "CDVersion"),
        status: field(root, "CDStatus").map(|s| s.parse()).transpose()?,
        base: field(root, "CDBase"),
        url: field(root, "CDURL"),
        comments: named(root, "CDComment").map(trimmed).collect(),
        definitions: named(root, "CDDefinition")
            .map(|def| definition(root, def))
            .collect::<Result<_>>()?,
        name,
    };
    debug!(cd = %cd.name, symbols = cd.definitions.len(), "parsed content dictionary");
    Ok(cd)
}

/// Parses a Content Dictionary group document.
///
/// # Errors
///
/// Returns [`CdError::Malformed`] if the text is not XML, the root is not
/// `CDGroup`, `CDGroupName` is missing, or a member has no `CDName`.
pub fn parse_cdg(text: &str) -> Result<ContentDictionaryGroup> {
    let root = Element::parse(text).map_err(|err| CdError::Malformed(err.to_string()))?;
    group_from_element(&root)
}

/// Builds a group from a parsed `CDGroup` element.
///
/// # Errors
///
/// As for [`parse_cdg`].
pub fn group_from_element(root: &Element) -> Result<ContentDictionaryGroup> {
    if root.name != "CDGroup" {
        return Err(CdError::Malformed(format!(
            "root element must be CDGroup, not {}",
            root.name
        )));
    }
    let name = field(root, "CDGroupName")
        .ok_or_else(|| CdError::Malformed("missing CDGroupName".to_owned()))?;
    let members = named(root, "CDGroupMember")
        .map(|member| {
            Ok(GroupMember {
                name: field(member, "CDName").ok_or_else(|| {
                    CdError::Malformed(format!("member of group {name} without CDName"))
                })?,
                version: field(member, "CDVersion"),
                url: field(member, "CDURL"),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let group = ContentDictionaryGroup {
        description: field(root, "CDGroupDescription"),
        version: field(root, "CDGroupVersion"),
        revision: field(root, "CDGroupRevision"),
        url: field(root, "CDGroupURL"),
        comments: named(root, "CDComment").map(trimmed).collect(),
        members,
        name,
    };
    debug!(group = %group.name, members = group.members.len(), "parsed content dictionary group");
    Ok(group)
}

fn definition(root: &Element, element: &Element) -> Result<SymbolDefinition> {
    let name = field(element, "Name")
        .ok_or_else(|| CdError::Malformed("CDDefinition without Name".to_owned()))?;
    Ok(SymbolDefinition {
        description: field(element, "Description"),
        role: field(element, "Role").map(|r| r.parse()).transpose()?,
        cmp: named(element, "CMP").map(trimmed).collect(),
        fmp: named(element, "FMP")
            .map(|fmp| objects(root, fmp))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect(),
        examples: named(element, "Example")
            .map(|example| {
                Ok(Example {
                    text: trimmed(example),
                    objects: objects(root, example)?,
                })
            })
            .collect::<Result<_>>()?,
        name,
    })
}

/// Decodes the OpenMath children of `element`, skipping prose markup.
fn objects(root: &Element, element: &Element) -> Result<Vec<Om>> {
    element
        .elements()
        .filter(|child| Kind::from_tag(&child.name).is_some())
        .map(|child| {
            // An OMOBJ without its own declaration sits in the CD namespace.
            let mut child = child.clone();
            if let Some(ns) = &root.namespace {
                child.strip_namespace(ns);
            }
            Ok(codec::from_element(&child)?)
        })
        .collect()
}

fn named<'a>(element: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> {
    element
        .elements()
        .filter(move |child| child.name == name && child.namespace == element.namespace)
}

fn trimmed(element: &Element) -> String {
    element.text().trim().to_owned()
}

/// Trimmed text of the first child `name`; blank counts as absent.
fn field(element: &Element, name: &str) -> Option<String> {
    element
        .find(name)
        .map(trimmed)
        .filter(|text| !text.is_empty())
}
