//! A small namespace-aware XML element tree.
//!
//! The XML codec decodes in two steps: text is read into an [`Element`]
//! tree with `quick-xml`, then the tree is mapped onto objects. Encoding
//! runs the other way and writes the tree out with [`Element`]'s own
//! serializer, which declares a default namespace only where it changes.
//! `OMFOREIGN` payloads keep their markup as an [`Element`].
//!
//! Element names are stored resolved (local name plus namespace URI).
//! Attribute names keep their prefix, and each element records the prefix
//! bindings it needs, so any subtree can be written out on its own.

use std::fmt;

use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};

/// Content of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A child element.
    Element(Element),
    /// Character data, unescaped.
    Text(String),
}

/// An XML element with a resolved namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Local name, without prefix.
    pub name: String,
    /// Namespace URI. `None` inherits the enclosing element's namespace when
    /// written out.
    pub namespace: Option<String>,
    /// Attributes in document order, excluding namespace declarations.
    /// Prefixed names keep their prefix, as in `xlink:href`.
    pub attributes: Vec<(String, String)>,
    /// Prefix bindings written on this element: those it declares and those
    /// its prefixed attributes rely on. Bindings already in scope are not
    /// repeated on output.
    pub prefixes: Vec<(String, String)>,
    /// Children in document order.
    pub children: Vec<Node>,
}

impl Element {
    /// Creates an empty element with no namespace.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the namespace and returns the element.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Value of attribute `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Sets attribute `name`, replacing an existing value.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Appends a child element.
    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Appends character data, merging with a preceding text node.
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.children.last_mut() {
            Some(Node::Text(last)) => last.push_str(text),
            _ => self.children.push(Node::Text(text.to_owned())),
        }
    }

    /// Child elements in order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// First child element named `name` in this element's namespace.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.elements()
            .find(|child| child.name == name && child.namespace == self.namespace)
    }

    /// Concatenated character data of the direct children.
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                Node::Text(text) => Some(text.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Clears `namespace` on this element and every descendant that carries
    /// it, so the tree no longer depends on an enclosing declaration.
    pub fn strip_namespace(&mut self, namespace: &str) {
        if self.namespace.as_deref() == Some(namespace) {
            self.namespace = None;
        }
        for child in &mut self.children {
            if let Node::Element(element) = child {
                element.strip_namespace(namespace);
            }
        }
    }

    /// Parses a document with exactly one root element.
    ///
    /// Comments, processing instructions and the XML declaration are
    /// skipped. Whitespace-only text next to child elements is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedInput`] if the text is not well-formed,
    /// uses an undeclared prefix, or does not contain exactly one root.
    pub fn parse(text: &str) -> Result<Element> {
        let mut reader = Reader::from_str(text);
        let mut scopes: Vec<Scope> = Vec::new();
        let mut open: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                Error::malformed(format!(
                    "invalid XML at byte {}: {e}",
                    reader.buffer_position()
                ))
            })?;
            match event {
                Event::Start(start) => {
                    let (element, scope) = open_element(&start, &scopes)?;
                    scopes.push(scope);
                    open.push(element);
                }
                Event::Empty(start) => {
                    let (element, _) = open_element(&start, &scopes)?;
                    close_element(element, &mut open, &mut root)?;
                }
                Event::End(_) => {
                    scopes.pop();
                    let mut element = open
                        .pop()
                        .ok_or_else(|| Error::malformed("unexpected closing tag"))?;
                    element.drop_layout_whitespace();
                    close_element(element, &mut open, &mut root)?;
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| Error::malformed(format!("invalid character data: {e}")))?;
                    add_text(&text, &mut open)?;
                }
                Event::CData(data) => {
                    let text = std::str::from_utf8(&data)
                        .map_err(|e| Error::malformed(format!("invalid CDATA section: {e}")))?;
                    add_text(text, &mut open)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(unclosed) = open.last() {
            return Err(Error::malformed(format!(
                "element <{}> is not closed",
                unclosed.name
            )));
        }
        root.ok_or_else(|| Error::malformed("no root element"))
    }

    /// Serializes with each nested element on its own line, indented by
    /// `width` spaces per level. Elements holding text stay on one line.
    #[must_use]
    pub fn to_pretty_string(&self, width: usize) -> String {
        let mut out = String::new();
        self.write(&mut out, None, &mut Vec::new(), Some(width), 0);
        out
    }

    fn drop_layout_whitespace(&mut self) {
        if self.elements().next().is_some() {
            self.children
                .retain(|child| !matches!(child, Node::Text(text) if text.trim().is_empty()));
        }
    }

    fn write(
        &self,
        out: &mut String,
        scope: Option<&str>,
        bound: &mut Vec<(String, String)>,
        indent: Option<usize>,
        depth: usize,
    ) {
        out.push('<');
        out.push_str(&self.name);
        let namespace = self.namespace.as_deref();
        if let Some(ns) = namespace.filter(|ns| Some(*ns) != scope) {
            push_attribute(out, "xmlns", ns);
        }
        let outer = bound.len();
        for (prefix, uri) in &self.prefixes {
            let visible = bound.iter().rev().find(|(p, _)| p == prefix).map(|(_, u)| u);
            if visible != Some(uri) {
                push_attribute(out, &format!("xmlns:{prefix}"), uri);
                bound.push((prefix.clone(), uri.clone()));
            }
        }
        for (key, value) in &self.attributes {
            push_attribute(out, key, value);
        }
        if self.children.is_empty() {
            out.push_str("/>");
            bound.truncate(outer);
            return;
        }
        out.push('>');

        let inner_scope = namespace.or(scope);
        let layout = indent.filter(|_| self.children.iter().all(|c| matches!(c, Node::Element(_))));
        for child in &self.children {
            match child {
                Node::Text(text) => out.push_str(&partial_escape(text.as_str())),
                Node::Element(element) => {
                    if let Some(width) = layout {
                        newline(out, width, depth + 1);
                    }
                    element.write(out, inner_scope, bound, layout, depth + 1);
                }
            }
        }
        if let Some(width) = layout {
            newline(out, width, depth);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
        bound.truncate(outer);
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write(&mut out, None, &mut Vec::new(), None, 0);
        f.write_str(&out)
    }
}

/// Prefix bindings introduced by one open element.
#[derive(Default)]
struct Scope {
    default: Option<Option<String>>,
    prefixes: Vec<(String, String)>,
}

fn lookup_default(scopes: &[Scope]) -> Option<String> {
    scopes
        .iter()
        .rev()
        .find_map(|scope| scope.default.clone())
        .flatten()
}

fn lookup_prefix(scopes: &[Scope], prefix: &str) -> Option<String> {
    scopes.iter().rev().find_map(|scope| {
        scope
            .prefixes
            .iter()
            .find(|(bound, _)| bound == prefix)
            .map(|(_, uri)| uri.clone())
    })
}

fn utf8<'a>(bytes: &'a [u8], what: &str) -> Result<&'a str> {
    std::str::from_utf8(bytes).map_err(|e| Error::malformed(format!("invalid UTF-8 in {what}: {e}")))
}

fn open_element(start: &BytesStart<'_>, scopes: &[Scope]) -> Result<(Element, Scope)> {
    let qname = utf8(start.name().as_ref(), "element name")?.to_owned();
    if qname.is_empty() {
        return Err(Error::malformed("element with an empty name"));
    }

    let mut scope = Scope::default();
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute =
            attribute.map_err(|e| Error::malformed(format!("invalid attribute on <{qname}>: {e}")))?;
        let key = utf8(attribute.key.as_ref(), "attribute name")?.to_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| Error::malformed(format!("invalid value for '{key}': {e}")))?
            .into_owned();
        if key == "xmlns" {
            scope.default = Some(Some(value).filter(|uri| !uri.is_empty()));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            scope.prefixes.push((prefix.to_owned(), value));
        } else {
            attributes.push((key, value));
        }
    }

    // Declarations on this element are visible to its own name.
    let resolve_prefix = |prefix: &str| {
        scope
            .prefixes
            .iter()
            .find(|(bound, _)| bound == prefix)
            .map(|(_, uri)| uri.clone())
            .or_else(|| lookup_prefix(scopes, prefix))
    };
    let (namespace, name) = match qname.split_once(':') {
        Some((prefix, local)) => {
            let uri = resolve_prefix(prefix).ok_or_else(|| {
                Error::malformed(format!("undeclared namespace prefix '{prefix}' on <{qname}>"))
            })?;
            (Some(uri), local.to_owned())
        }
        None => {
            let default = match &scope.default {
                Some(declared) => declared.clone(),
                None => lookup_default(scopes),
            };
            (default, qname.clone())
        }
    };

    let mut prefixes = scope.prefixes.clone();
    for (key, _) in &attributes {
        let Some((prefix, _)) = key.split_once(':') else {
            continue;
        };
        // `xml` is bound by definition and never declared.
        if prefix == "xml" || prefixes.iter().any(|(bound, _)| bound == prefix) {
            continue;
        }
        let uri = resolve_prefix(prefix).ok_or_else(|| {
            Error::malformed(format!(
                "undeclared namespace prefix '{prefix}' on attribute '{key}' of <{qname}>"
            ))
        })?;
        prefixes.push((prefix.to_owned(), uri));
    }

    Ok((
        Element {
            name,
            namespace,
            attributes,
            prefixes,
            children: Vec::new(),
        },
        scope,
    ))
}

fn close_element(element: Element, open: &mut [Element], root: &mut Option<Element>) -> Result<()> {
    match open.last_mut() {
        Some(parent) => {
            parent.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(Error::malformed("more than one root element")),
    }
}

fn add_text(text: &str, open: &mut [Element]) -> Result<()> {
    match open.last_mut() {
        Some(parent) => {
            parent.push_text(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(Error::malformed("text outside the root element")),
    }
}

fn push_attribute(out: &mut String, key: &str, value: &str) {
    out.push(' ');
    out.push_str(key);
    out.push_str("=\"");
    out.push_str(&escape(value));
    out.push('"');
}

fn newline(out: &mut String, width: usize, depth: usize) {
    out.push('\n');
    out.extend(std::iter::repeat(' ').take(width * depth));
}
