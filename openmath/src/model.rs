//! Core object model types.
//!
//! An OpenMath object is a tree of [`Om`] handles. Each handle points to a
//! node holding an optional `id`, a non-owning link to its parent, and the
//! kind-specific [`Content`]. Ownership flows strictly from parent to child;
//! the parent link is only used for upward lookups (`cdbase` inheritance and
//! the document root) and never takes part in encoding or equality.
//!
//! Cloning an [`Om`] clones the handle, so both values refer to the same node.
//! Use [`Om::deep_clone`] for an independent copy of a whole tree.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::dom::Element;
use crate::error::{Error, Result};
use crate::{DEFAULT_VERSION, OPENMATH_NS};

/// The thirteen OpenMath object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// `OMOBJ`: wraps a whole document.
    Object,
    /// `OMI`: integer.
    Integer,
    /// `OMF`: IEEE double.
    Float,
    /// `OMSTR`: Unicode string.
    String,
    /// `OMB`: byte array.
    Bytearray,
    /// `OMS`: symbol from a content dictionary.
    Symbol,
    /// `OMV`: variable.
    Variable,
    /// `OMA`: application of an object to arguments.
    Application,
    /// `OMATTR`: object annotated with symbol/value pairs.
    Attribution,
    /// `OMBIND`: binder applied to bound variables and a body.
    Binding,
    /// `OME`: error object.
    Error,
    /// `OMFOREIGN`: opaque non-OpenMath payload.
    Foreign,
    /// `OMR`: reference used for structure sharing.
    Reference,
}

impl Kind {
    /// Every kind, in declaration order.
    pub const ALL: [Kind; 13] = [
        Kind::Object,
        Kind::Integer,
        Kind::Float,
        Kind::String,
        Kind::Bytearray,
        Kind::Symbol,
        Kind::Variable,
        Kind::Application,
        Kind::Attribution,
        Kind::Binding,
        Kind::Error,
        Kind::Foreign,
        Kind::Reference,
    ];

    /// Returns the tag used for this kind in both wire encodings.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Object => "OMOBJ",
            Kind::Integer => "OMI",
            Kind::Float => "OMF",
            Kind::String => "OMSTR",
            Kind::Bytearray => "OMB",
            Kind::Symbol => "OMS",
            Kind::Variable => "OMV",
            Kind::Application => "OMA",
            Kind::Attribution => "OMATTR",
            Kind::Binding => "OMBIND",
            Kind::Error => "OME",
            Kind::Foreign => "OMFOREIGN",
            Kind::Reference => "OMR",
        }
    }

    /// Looks up a kind by its wire tag. Returns `None` for unknown tags.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Kind> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }

    /// Whether nodes of this kind carry their own `cdbase`.
    #[must_use]
    pub fn has_cdbase(self) -> bool {
        matches!(
            self,
            Kind::Object | Kind::Symbol | Kind::Application | Kind::Attribution | Kind::Binding
        )
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of an `OMFOREIGN` object.
///
/// The payload is opaque to OpenMath. Two payloads are equal when their
/// canonical text (see [`Foreign::canonical_text`]) is equal, so a payload
/// keeps its identity across encodings that cannot carry its variant.
#[derive(Debug, Clone)]
pub enum Foreign {
    /// Plain text.
    Text(String),
    /// A structured JSON value.
    Structured(serde_json::Value),
    /// Embedded XML markup.
    Markup(Element),
}

impl Foreign {
    /// Text form of the payload: text as-is, structured values as compact
    /// JSON, markup as compact XML.
    #[must_use]
    pub fn canonical_text(&self) -> String {
        match self {
            Foreign::Text(text) => text.clone(),
            Foreign::Structured(value) => value.to_string(),
            Foreign::Markup(element) => element.to_string(),
        }
    }
}

impl PartialEq for Foreign {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_text() == other.canonical_text()
    }
}

/// Kind-specific fields of a node.
///
/// Read through [`Om::content`]. Child fields hold [`Om`] handles; they are
/// changed through the setters on [`Om`], which keep parent links in sync.
#[derive(Debug)]
pub enum Content {
    /// `OMOBJ`.
    Object {
        /// The wrapped object.
        object: Om,
        /// OpenMath version, `"2.0"` unless stated otherwise.
        version: String,
        /// XML namespace; `None` stands for the standard OpenMath namespace.
        xmlns: Option<String>,
        /// Base URI for content dictionaries.
        cdbase: Option<String>,
    },
    /// `OMI`.
    Integer(i64),
    /// `OMF`.
    Float(f64),
    /// `OMSTR`.
    String(String),
    /// `OMB`.
    Bytearray(Vec<u8>),
    /// `OMS`.
    Symbol {
        /// Symbol name.
        name: String,
        /// Content dictionary name.
        cd: String,
        /// Base URI for the content dictionary.
        cdbase: Option<String>,
    },
    /// `OMV`.
    Variable {
        /// Variable name.
        name: String,
    },
    /// `OMA`.
    Application {
        /// The applied object, usually a symbol.
        applicant: Om,
        /// Arguments in order.
        arguments: Vec<Om>,
        /// Base URI for content dictionaries.
        cdbase: Option<String>,
    },
    /// `OMATTR`.
    Attribution {
        /// Symbol/value pairs in order. Every key is an `OMS`.
        attributes: Vec<(Om, Om)>,
        /// The annotated object.
        object: Om,
        /// Base URI for content dictionaries.
        cdbase: Option<String>,
    },
    /// `OMBIND`.
    Binding {
        /// The binder, usually a symbol.
        binder: Om,
        /// Bound variables: `OMV`, or `OMATTR` wrapping an `OMV`. Never empty.
        variables: Vec<Om>,
        /// The body.
        object: Om,
        /// Base URI for content dictionaries.
        cdbase: Option<String>,
    },
    /// `OME`.
    Error {
        /// The error symbol.
        error: Om,
        /// Arguments in order.
        arguments: Vec<Om>,
    },
    /// `OMFOREIGN`.
    Foreign {
        /// Opaque payload.
        foreign: Foreign,
        /// Media type or encoding name of the payload.
        encoding: Option<String>,
    },
    /// `OMR`.
    Reference {
        /// Target URI, optionally with a `#fragment` naming an `id`.
        href: String,
    },
}

impl Content {
    /// Returns the kind of this content.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Content::Object { .. } => Kind::Object,
            Content::Integer(_) => Kind::Integer,
            Content::Float(_) => Kind::Float,
            Content::String(_) => Kind::String,
            Content::Bytearray(_) => Kind::Bytearray,
            Content::Symbol { .. } => Kind::Symbol,
            Content::Variable { .. } => Kind::Variable,
            Content::Application { .. } => Kind::Application,
            Content::Attribution { .. } => Kind::Attribution,
            Content::Binding { .. } => Kind::Binding,
            Content::Error { .. } => Kind::Error,
            Content::Foreign { .. } => Kind::Foreign,
            Content::Reference { .. } => Kind::Reference,
        }
    }

    /// The node's own `cdbase`, without inheritance.
    #[must_use]
    pub fn cdbase(&self) -> Option<&str> {
        match self {
            Content::Object { cdbase, .. }
            | Content::Symbol { cdbase, .. }
            | Content::Application { cdbase, .. }
            | Content::Attribution { cdbase, .. }
            | Content::Binding { cdbase, .. } => cdbase.as_deref(),
            _ => None,
        }
    }

    fn cdbase_mut(&mut self) -> Option<&mut Option<String>> {
        match self {
            Content::Object { cdbase, .. }
            | Content::Symbol { cdbase, .. }
            | Content::Application { cdbase, .. }
            | Content::Attribution { cdbase, .. }
            | Content::Binding { cdbase, .. } => Some(cdbase),
            _ => None,
        }
    }
}

/// The `(name, cd, cdbase)` triple identifying a symbol in a content
/// dictionary. `cdbase` is the effective (inherited) base.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolKey {
    /// Symbol name.
    pub name: String,
    /// Content dictionary name.
    pub cd: String,
    /// Effective content dictionary base, if any.
    pub cdbase: Option<String>,
}

/// Handle to an OpenMath object node.
#[derive(Clone)]
pub struct Om(Rc<Node>);

struct Node {
    id: RefCell<Option<String>>,
    parent: RefCell<Weak<Node>>,
    content: RefCell<Content>,
}

impl Om {
    pub(crate) fn new(content: Content) -> Om {
        let om = Om(Rc::new(Node {
            id: RefCell::new(None),
            parent: RefCell::new(Weak::new()),
            content: RefCell::new(content),
        }));
        for child in om.children() {
            child.attach_to(&om);
        }
        om
    }

    // ---- constructors ------------------------------------------------------

    /// Creates an `OMOBJ` wrapping `object`, with version `"2.0"`.
    #[must_use]
    pub fn object(object: Om) -> Om {
        Om::new(Content::Object {
            object,
            version: DEFAULT_VERSION.to_owned(),
            xmlns: None,
            cdbase: None,
        })
    }

    /// Creates an `OMI`.
    #[must_use]
    pub fn integer(value: i64) -> Om {
        Om::new(Content::Integer(value))
    }

    /// Creates an `OMF`.
    #[must_use]
    pub fn float(value: f64) -> Om {
        Om::new(Content::Float(value))
    }

    /// Creates an `OMSTR`.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Om {
        Om::new(Content::String(value.into()))
    }

    /// Creates an `OMB`.
    #[must_use]
    pub fn bytearray(bytes: impl Into<Vec<u8>>) -> Om {
        Om::new(Content::Bytearray(bytes.into()))
    }

    /// Creates an `OMS` named `name` from content dictionary `cd`.
    #[must_use]
    pub fn symbol(name: impl Into<String>, cd: impl Into<String>) -> Om {
        Om::new(Content::Symbol {
            name: name.into(),
            cd: cd.into(),
            cdbase: None,
        })
    }

    /// Creates an `OMV`.
    #[must_use]
    pub fn variable(name: impl Into<String>) -> Om {
        Om::new(Content::Variable { name: name.into() })
    }

    /// Creates an `OMA` applying `applicant` to `arguments`.
    #[must_use]
    pub fn application(applicant: Om, arguments: impl IntoIterator<Item = Om>) -> Om {
        Om::new(Content::Application {
            applicant,
            arguments: arguments.into_iter().collect(),
            cdbase: None,
        })
    }

    /// Creates an `OMATTR` annotating `object` with symbol/value pairs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueConstraint`] if any key is not an `OMS`.
    pub fn attribution(attributes: impl IntoIterator<Item = (Om, Om)>, object: Om) -> Result<Om> {
        let attributes: Vec<(Om, Om)> = attributes.into_iter().collect();
        for (key, _) in &attributes {
            check_attribution_key(key)?;
        }
        Ok(Om::new(Content::Attribution {
            attributes,
            object,
            cdbase: None,
        }))
    }

    /// Creates an `OMBIND`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueConstraint`] if `variables` is empty or holds an
    /// `OMATTR` that does not wrap an `OMV`, and [`Error::TypeMismatch`] if it
    /// holds anything other than `OMV` or `OMATTR`.
    pub fn binding(binder: Om, variables: impl IntoIterator<Item = Om>, object: Om) -> Result<Om> {
        let variables: Vec<Om> = variables.into_iter().collect();
        check_variables(&variables)?;
        Ok(Om::new(Content::Binding {
            binder,
            variables,
            object,
            cdbase: None,
        }))
    }

    /// Creates an `OME` with error symbol `error`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValueConstraint`] if `error` is not an `OMS`.
    pub fn error(error: Om, arguments: impl IntoIterator<Item = Om>) -> Result<Om> {
        check_error_symbol(&error)?;
        Ok(Om::new(Content::Error {
            error,
            arguments: arguments.into_iter().collect(),
        }))
    }

    /// Creates an `OMFOREIGN`.
    #[must_use]
    pub fn foreign(foreign: Foreign) -> Om {
        Om::new(Content::Foreign {
            foreign,
            encoding: None,
        })
    }

    /// Creates an `OMR` pointing at `href`.
    #[must_use]
    pub fn reference(href: impl Into<String>) -> Om {
        Om::new(Content::Reference { href: href.into() })
    }

    // ---- builders ----------------------------------------------------------

    /// Sets the `id` and returns the handle.
    #[must_use]
    pub fn with_id(self, id: impl Into<String>) -> Om {
        self.set_id(Some(id.into()));
        self
    }

    /// Sets the own `cdbase` and returns the handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if this kind carries no `cdbase`.
    pub fn with_cdbase(self, cdbase: impl Into<String>) -> Result<Om> {
        self.set_cdbase(Some(cdbase.into()))?;
        Ok(self)
    }

    /// Sets the `encoding` of an `OMFOREIGN` and returns the handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if this is not an `OMFOREIGN`.
    pub fn with_encoding(self, encoding: impl Into<String>) -> Result<Om> {
        self.set_encoding(Some(encoding.into()))?;
        Ok(self)
    }

    /// Sets the version of an `OMOBJ` and returns the handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if this is not an `OMOBJ`.
    pub fn with_version(self, version: impl Into<String>) -> Result<Om> {
        self.set_version(version)?;
        Ok(self)
    }

    /// Sets the XML namespace of an `OMOBJ` and returns the handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if this is not an `OMOBJ`.
    pub fn with_xmlns(self, xmlns: impl Into<String>) -> Result<Om> {
        self.set_xmlns(Some(xmlns.into()))?;
        Ok(self)
    }

    // ---- accessors ---------------------------------------------------------

    /// Returns the kind of this node.
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.content().kind()
    }

    /// Borrows the kind-specific fields.
    ///
    /// The borrow must be released before any setter is called on this node.
    #[must_use]
    pub fn content(&self) -> Ref<'_, Content> {
        self.0.content.borrow()
    }

    pub(crate) fn content_mut(&self) -> RefMut<'_, Content> {
        self.0.content.borrow_mut()
    }

    /// Returns the `id`, if any.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.0.id.borrow().clone()
    }

    pub(crate) fn has_id(&self, id: &str) -> bool {
        self.0.id.borrow().as_deref() == Some(id)
    }

    /// Returns the parent this node was last attached to, if still alive.
    #[must_use]
    pub fn parent(&self) -> Option<Om> {
        self.0.parent.borrow().upgrade().map(Om)
    }

    /// Follows parent links up to the topmost ancestor.
    #[must_use]
    pub fn root(&self) -> Om {
        let mut node = self.clone();
        while let Some(parent) = node.parent() {
            node = parent;
        }
        node
    }

    /// The node's own `cdbase`, without inheritance.
    #[must_use]
    pub fn own_cdbase(&self) -> Option<String> {
        self.content().cdbase().map(str::to_owned)
    }

    /// The effective `cdbase`: the node's own, else the nearest ancestor's.
    #[must_use]
    pub fn cdbase(&self) -> Option<String> {
        let mut node = Some(self.clone());
        while let Some(current) = node {
            if let Some(cdbase) = current.own_cdbase() {
                return Some(cdbase);
            }
            node = current.parent();
        }
        None
    }

    /// Whether both handles point to the same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Om) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0).cast()
    }

    /// Value of an `OMI`.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match *self.content() {
            Content::Integer(value) => Some(value),
            _ => None,
        }
    }

    /// Value of an `OMF`.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match *self.content() {
            Content::Float(value) => Some(value),
            _ => None,
        }
    }

    /// Value of an `OMSTR`.
    #[must_use]
    pub fn as_string(&self) -> Option<String> {
        match &*self.content() {
            Content::String(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Value of an `OMB`.
    #[must_use]
    pub fn as_bytes(&self) -> Option<Vec<u8>> {
        match &*self.content() {
            Content::Bytearray(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }

    /// Name of an `OMS` or `OMV`.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        match &*self.content() {
            Content::Symbol { name, .. } | Content::Variable { name } => Some(name.clone()),
            _ => None,
        }
    }

    /// Content dictionary of an `OMS`.
    #[must_use]
    pub fn cd(&self) -> Option<String> {
        match &*self.content() {
            Content::Symbol { cd, .. } => Some(cd.clone()),
            _ => None,
        }
    }

    /// Target of an `OMR`.
    #[must_use]
    pub fn href(&self) -> Option<String> {
        match &*self.content() {
            Content::Reference { href } => Some(href.clone()),
            _ => None,
        }
    }

    /// The wrapped object of an `OMOBJ`, the annotated object of an
    /// `OMATTR`, or the body of an `OMBIND`.
    #[must_use]
    pub fn inner(&self) -> Option<Om> {
        match &*self.content() {
            Content::Object { object, .. }
            | Content::Attribution { object, .. }
            | Content::Binding { object, .. } => Some(object.clone()),
            _ => None,
        }
    }

    /// Applicant of an `OMA`.
    #[must_use]
    pub fn applicant(&self) -> Option<Om> {
        match &*self.content() {
            Content::Application { applicant, .. } => Some(applicant.clone()),
            _ => None,
        }
    }

    /// Arguments of an `OMA` or `OME`; empty for other kinds.
    #[must_use]
    pub fn arguments(&self) -> Vec<Om> {
        match &*self.content() {
            Content::Application { arguments, .. } | Content::Error { arguments, .. } => {
                arguments.clone()
            }
            _ => Vec::new(),
        }
    }

    /// Lookup key of an `OMS` for content dictionary queries.
    #[must_use]
    pub fn symbol_key(&self) -> Option<SymbolKey> {
        let (name, cd) = match &*self.content() {
            Content::Symbol { name, cd, .. } => (name.clone(), cd.clone()),
            _ => return None,
        };
        Some(SymbolKey {
            name,
            cd,
            cdbase: self.cdbase(),
        })
    }

    // ---- mutators ----------------------------------------------------------

    /// Replaces the `id`.
    pub fn set_id(&self, id: Option<String>) {
        *self.0.id.borrow_mut() = id;
    }

    /// Replaces the own `cdbase`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if this kind carries no `cdbase`.
    pub fn set_cdbase(&self, cdbase: Option<String>) -> Result<()> {
        let mut content = self.0.content.borrow_mut();
        let kind = content.kind();
        let slot = content
            .cdbase_mut()
            .ok_or_else(|| Error::mismatch("OMOBJ, OMS, OMA, OMATTR or OMBIND", kind))?;
        *slot = cdbase;
        Ok(())
    }

    /// Replaces the `encoding` of an `OMFOREIGN`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if this is not an `OMFOREIGN`.
    pub fn set_encoding(&self, encoding: Option<String>) -> Result<()> {
        match &mut *self.0.content.borrow_mut() {
            Content::Foreign { encoding: slot, .. } => {
                *slot = encoding;
                Ok(())
            }
            other => Err(Error::mismatch(Kind::Foreign.as_str(), other.kind())),
        }
    }

    /// Replaces the version of an `OMOBJ`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if this is not an `OMOBJ`.
    pub fn set_version(&self, version: impl Into<String>) -> Result<()> {
        match &mut *self.0.content.borrow_mut() {
            Content::Object { version: slot, .. } => {
                *slot = version.into();
                Ok(())
            }
            other => Err(Error::mismatch(Kind::Object.as_str(), other.kind())),
        }
    }

    /// Replaces the XML namespace of an `OMOBJ`. The standard OpenMath
    /// namespace is stored as `None`, the same as an unset namespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if this is not an `OMOBJ`.
    pub fn set_xmlns(&self, xmlns: Option<String>) -> Result<()> {
        match &mut *self.0.content.borrow_mut() {
            Content::Object { xmlns: slot, .. } => {
                *slot = xmlns.filter(|ns| ns != OPENMATH_NS);
                Ok(())
            }
            other => Err(Error::mismatch(Kind::Object.as_str(), other.kind())),
        }
    }

    /// Replaces the applicant of an `OMA`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if this is not an `OMA`, and
    /// [`Error::ValueConstraint`] if `applicant` is an ancestor of this node.
    pub fn set_applicant(&self, applicant: Om) -> Result<()> {
        self.rewire(std::slice::from_ref(&applicant), |content| match content {
            Content::Application { applicant: slot, .. } => {
                *slot = applicant.clone();
                Ok(())
            }
            other => Err(Error::mismatch(Kind::Application.as_str(), other.kind())),
        })
    }

    /// Replaces the arguments of an `OMA` or `OME`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if this is neither, and
    /// [`Error::ValueConstraint`] if an argument is an ancestor of this node.
    pub fn set_arguments(&self, arguments: impl IntoIterator<Item = Om>) -> Result<()> {
        let arguments: Vec<Om> = arguments.into_iter().collect();
        self.rewire(&arguments, |content| match content {
            Content::Application { arguments: slot, .. } | Content::Error { arguments: slot, .. } => {
                slot.clone_from(&arguments);
                Ok(())
            }
            other => Err(Error::mismatch("OMA or OME", other.kind())),
        })
    }

    /// Replaces the binder of an `OMBIND`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if this is not an `OMBIND`, and
    /// [`Error::ValueConstraint`] if `binder` is an ancestor of this node.
    pub fn set_binder(&self, binder: Om) -> Result<()> {
        self.rewire(std::slice::from_ref(&binder), |content| match content {
            Content::Binding { binder: slot, .. } => {
                *slot = binder.clone();
                Ok(())
            }
            other => Err(Error::mismatch(Kind::Binding.as_str(), other.kind())),
        })
    }

    /// Replaces the bound variables of an `OMBIND`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if this is not an `OMBIND` or a
    /// variable is neither `OMV` nor `OMATTR`, and [`Error::ValueConstraint`]
    /// if `variables` is empty or an `OMATTR` does not wrap an `OMV`.
    pub fn set_variables(&self, variables: impl IntoIterator<Item = Om>) -> Result<()> {
        let variables: Vec<Om> = variables.into_iter().collect();
        self.expect_kind(Kind::Binding)?;
        check_variables(&variables)?;
        self.rewire(&variables, |content| match content {
            Content::Binding { variables: slot, .. } => {
                slot.clone_from(&variables);
                Ok(())
            }
            other => Err(Error::mismatch(Kind::Binding.as_str(), other.kind())),
        })
    }

    /// Replaces the wrapped object of an `OMOBJ`, the annotated object of an
    /// `OMATTR`, or the body of an `OMBIND`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] for other kinds, and
    /// [`Error::ValueConstraint`] if `object` is an ancestor of this node.
    pub fn set_object(&self, object: Om) -> Result<()> {
        self.rewire(std::slice::from_ref(&object), |content| match content {
            Content::Object { object: slot, .. }
            | Content::Attribution { object: slot, .. }
            | Content::Binding { object: slot, .. } => {
                *slot = object.clone();
                Ok(())
            }
            other => Err(Error::mismatch("OMOBJ, OMATTR or OMBIND", other.kind())),
        })
    }

    /// Replaces the symbol/value pairs of an `OMATTR`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if this is not an `OMATTR`, and
    /// [`Error::ValueConstraint`] if a key is not an `OMS`.
    pub fn set_attributes(&self, attributes: impl IntoIterator<Item = (Om, Om)>) -> Result<()> {
        let attributes: Vec<(Om, Om)> = attributes.into_iter().collect();
        self.expect_kind(Kind::Attribution)?;
        for (key, _) in &attributes {
            check_attribution_key(key)?;
        }
        let incoming: Vec<Om> = attributes
            .iter()
            .flat_map(|(key, value)| [key.clone(), value.clone()])
            .collect();
        self.rewire(&incoming, |content| match content {
            Content::Attribution { attributes: slot, .. } => {
                slot.clone_from(&attributes);
                Ok(())
            }
            other => Err(Error::mismatch(Kind::Attribution.as_str(), other.kind())),
        })
    }

    /// Replaces the error symbol of an `OME`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if this is not an `OME`, and
    /// [`Error::ValueConstraint`] if `error` is not an `OMS`.
    pub fn set_error(&self, error: Om) -> Result<()> {
        self.expect_kind(Kind::Error)?;
        check_error_symbol(&error)?;
        self.rewire(std::slice::from_ref(&error), |content| match content {
            Content::Error { error: slot, .. } => {
                *slot = error.clone();
                Ok(())
            }
            other => Err(Error::mismatch(Kind::Error.as_str(), other.kind())),
        })
    }

    // ---- parent links ------------------------------------------------------

    pub(crate) fn attach_to(&self, parent: &Om) {
        *self.0.parent.borrow_mut() = Rc::downgrade(&parent.0);
    }

    pub(crate) fn detach_from(&self, parent: &Om) {
        if self.parent().is_some_and(|current| current.ptr_eq(parent)) {
            *self.0.parent.borrow_mut() = Weak::new();
        }
    }

    /// Shares `source`'s parent link without becoming one of its children.
    pub(crate) fn inherit_context(&self, source: &Om) {
        let link = source.0.parent.borrow().clone();
        *self.0.parent.borrow_mut() = link;
    }

    fn expect_kind(&self, kind: Kind) -> Result<()> {
        let found = self.kind();
        if found == kind {
            Ok(())
        } else {
            Err(Error::mismatch(kind.as_str(), found))
        }
    }

    /// Fails if attaching `child` here would make a node its own descendant.
    fn ensure_attachable(&self, child: &Om) -> Result<()> {
        let mut node = Some(self.clone());
        while let Some(current) = node {
            if current.ptr_eq(child) {
                return Err(Error::ValueConstraint(format!(
                    "cannot attach {} below itself",
                    child.kind()
                )));
            }
            node = current.parent();
        }
        Ok(())
    }

    /// Applies `update` to the content, then detaches children that were
    /// dropped and attaches the incoming ones.
    fn rewire(
        &self,
        incoming: &[Om],
        update: impl FnOnce(&mut Content) -> Result<()>,
    ) -> Result<()> {
        for child in incoming {
            self.ensure_attachable(child)?;
        }
        let before = self.children();
        update(&mut self.0.content.borrow_mut())?;
        let after = self.children();
        for old in before {
            if !after.iter().any(|child| child.ptr_eq(&old)) {
                old.detach_from(self);
            }
        }
        for child in incoming {
            child.attach_to(self);
        }
        Ok(())
    }
}

impl fmt::Debug for Om {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let content = self.content();
        match self.id() {
            Some(id) => write!(f, "#{id} {:?}", *content),
            None => write!(f, "{:?}", *content),
        }
    }
}

pub(crate) fn check_attribution_key(key: &Om) -> Result<()> {
    match key.kind() {
        Kind::Symbol => Ok(()),
        other => Err(Error::ValueConstraint(format!(
            "attribution keys must be OMS, got {other}"
        ))),
    }
}

pub(crate) fn check_error_symbol(error: &Om) -> Result<()> {
    match error.kind() {
        Kind::Symbol => Ok(()),
        other => Err(Error::ValueConstraint(format!(
            "the head of an error must be OMS, got {other}"
        ))),
    }
}

pub(crate) fn check_bound_variable(variable: &Om) -> Result<()> {
    match &*variable.content() {
        Content::Variable { .. } => Ok(()),
        Content::Attribution { object, .. } => match object.kind() {
            Kind::Variable => Ok(()),
            other => Err(Error::ValueConstraint(format!(
                "an attributed bound variable must wrap OMV, got {other}"
            ))),
        },
        other => Err(Error::mismatch("OMV or OMATTR", other.kind())),
    }
}

fn check_variables(variables: &[Om]) -> Result<()> {
    if variables.is_empty() {
        return Err(Error::ValueConstraint(
            "a binding needs at least one bound variable".to_owned(),
        ));
    }
    variables.iter().try_for_each(check_bound_variable)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plus() -> Om {
        Om::symbol("plus", "arith1")
    }

    #[test]
    fn kind_tags_round_trip() {
        for kind in Kind::ALL {
            assert_eq!(Kind::from_tag(kind.as_str()), Some(kind));
        }
        assert_eq!(Kind::from_tag("OMATP"), None);
        assert_eq!(Kind::from_tag("omi"), None);
    }

    #[test]
    fn children_are_parented_on_construction() {
        let x = Om::variable("x");
        let one = Om::integer(1);
        let app = Om::application(plus(), [x.clone(), one.clone()]);
        assert!(x.parent().is_some_and(|p| p.ptr_eq(&app)));
        assert!(one.parent().is_some_and(|p| p.ptr_eq(&app)));
        assert!(app.parent().is_none());
        assert!(x.root().ptr_eq(&app));
    }

    #[test]
    fn cdbase_is_inherited() {
        let sym = plus();
        let app = Om::application(sym.clone(), [Om::integer(2)])
            .with_cdbase("http://example.org/cd")
            .unwrap();
        let doc = Om::object(app.clone());
        assert_eq!(sym.own_cdbase(), None);
        assert_eq!(sym.cdbase().as_deref(), Some("http://example.org/cd"));
        assert_eq!(doc.cdbase(), None);

        let local = Om::symbol("sin", "transc1").with_cdbase("urn:local").unwrap();
        let outer = Om::application(local.clone(), [])
            .with_cdbase("urn:outer")
            .unwrap();
        assert_eq!(local.cdbase().as_deref(), Some("urn:local"));
        assert_eq!(outer.cdbase().as_deref(), Some("urn:outer"));
    }

    #[test]
    fn cdbase_on_kind_without_cdbase_is_a_type_mismatch() {
        let err = Om::integer(3).with_cdbase("urn:x").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }), "{err}");
    }

    #[test]
    fn binding_requires_variables() {
        let err = Om::binding(Om::symbol("lambda", "fns1"), [], Om::variable("x")).unwrap_err();
        assert!(matches!(err, Error::ValueConstraint(_)), "{err}");
    }

    #[test]
    fn binding_accepts_plain_and_attributed_variables() {
        let typed = Om::attribution(
            [(Om::symbol("type", "sts"), Om::symbol("Z", "setname1"))],
            Om::variable("y"),
        )
        .unwrap();
        let bind = Om::binding(
            Om::symbol("lambda", "fns1"),
            [Om::variable("x"), typed.clone()],
            Om::variable("x"),
        )
        .unwrap();
        assert_eq!(bind.kind(), Kind::Binding);
        assert!(typed.parent().is_some_and(|p| p.ptr_eq(&bind)));
    }

    #[test]
    fn binding_rejects_attribution_of_non_variable() {
        let attributed = Om::attribution(
            [(Om::symbol("type", "sts"), Om::symbol("Z", "setname1"))],
            Om::integer(1),
        )
        .unwrap();
        let err = Om::binding(Om::symbol("lambda", "fns1"), [attributed], Om::variable("x"))
            .unwrap_err();
        assert!(matches!(err, Error::ValueConstraint(_)), "{err}");
    }

    #[test]
    fn binding_rejects_other_kinds() {
        let err = Om::binding(Om::symbol("lambda", "fns1"), [Om::integer(1)], Om::variable("x"))
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }), "{err}");
    }

    #[test]
    fn attribution_keys_must_be_symbols() {
        let err = Om::attribution([(Om::integer(1), Om::string("x"))], Om::variable("v"))
            .unwrap_err();
        assert!(matches!(err, Error::ValueConstraint(_)), "{err}");
    }

    #[test]
    fn error_head_must_be_symbol() {
        let err = Om::error(Om::variable("oops"), []).unwrap_err();
        assert!(matches!(err, Error::ValueConstraint(_)), "{err}");
        assert!(Om::error(Om::symbol("unhandled_symbol", "error"), [Om::string("x")]).is_ok());
    }

    #[test]
    fn setters_reparent_and_detach() {
        let old = Om::variable("x");
        let app = Om::application(plus(), [old.clone()]);
        let new = Om::variable("y");
        app.set_arguments([new.clone()]).unwrap();
        assert!(new.parent().is_some_and(|p| p.ptr_eq(&app)));
        assert!(old.parent().is_none());
        assert_eq!(app.arguments().len(), 1);
        assert!(app.arguments()[0].ptr_eq(&new));

        let times = Om::symbol("times", "arith1");
        app.set_applicant(times.clone()).unwrap();
        assert!(app.applicant().is_some_and(|a| a.ptr_eq(&times)));
    }

    #[test]
    fn setters_check_kind() {
        let err = Om::integer(1).set_applicant(plus()).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }), "{err}");
        let err = Om::variable("x").set_object(Om::integer(1)).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }), "{err}");
    }

    #[test]
    fn set_variables_revalidates() {
        let bind = Om::binding(Om::symbol("forall", "quant1"), [Om::variable("x")], Om::variable("x"))
            .unwrap();
        assert!(bind.set_variables([]).is_err());
        assert!(bind.set_variables([Om::variable("y"), Om::variable("z")]).is_ok());
    }

    #[test]
    fn set_attributes_revalidates() {
        let attr = Om::attribution([], Om::variable("x")).unwrap();
        let err = attr
            .set_attributes([(Om::variable("k"), Om::integer(1))])
            .unwrap_err();
        assert!(matches!(err, Error::ValueConstraint(_)));
        attr.set_attributes([(Om::symbol("type", "sts"), Om::integer(1))])
            .unwrap();
        assert_eq!(attr.children().len(), 3);
    }

    #[test]
    fn attaching_an_ancestor_is_rejected() {
        let inner = Om::application(plus(), [Om::integer(1)]);
        let outer = Om::application(plus(), [inner.clone()]);
        let err = inner.set_arguments([outer.clone()]).unwrap_err();
        assert!(matches!(err, Error::ValueConstraint(_)), "{err}");
        let err = outer.set_applicant(outer.clone()).unwrap_err();
        assert!(matches!(err, Error::ValueConstraint(_)), "{err}");
    }

    #[test]
    fn symbol_key_uses_effective_cdbase() {
        let sym = plus();
        let _doc = Om::object(Om::application(sym.clone(), []))
            .with_cdbase("http://www.openmath.org/cd")
            .unwrap();
        let key = sym.symbol_key().unwrap();
        assert_eq!(key.name, "plus");
        assert_eq!(key.cd, "arith1");
        assert_eq!(key.cdbase.as_deref(), Some("http://www.openmath.org/cd"));
        assert!(Om::integer(1).symbol_key().is_none());
    }

    #[test]
    fn foreign_payloads_compare_by_canonical_text() {
        let structured = Foreign::Structured(serde_json::json!({"a": [1, 2]}));
        let text = Foreign::Text("{\"a\":[1,2]}".to_owned());
        assert_eq!(structured, text);
        assert_ne!(Foreign::Text("a".to_owned()), Foreign::Text("b".to_owned()));
    }

    #[test]
    fn object_defaults() {
        let doc = Om::object(Om::integer(1));
        match &*doc.content() {
            Content::Object { version, xmlns, cdbase, .. } => {
                assert_eq!(version, "2.0");
                assert!(xmlns.is_none());
                assert!(cdbase.is_none());
            }
            other => panic!("unexpected content {other:?}"),
        };
    }

    #[test]
    fn standard_namespace_is_stored_as_unset() {
        let explicit = Om::object(Om::integer(1)).with_xmlns(OPENMATH_NS).unwrap();
        assert_eq!(explicit, Om::object(Om::integer(1)));
        match &*explicit.content() {
            Content::Object { xmlns, .. } => assert!(xmlns.is_none()),
            other => panic!("unexpected content {other:?}"),
        }
        let custom = Om::object(Om::integer(1)).with_xmlns("urn:custom").unwrap();
        assert_ne!(custom, Om::object(Om::integer(1)));
    }
}
