//! OpenMath 2.0 XML encoding.
//!
//! Each kind maps onto its element (`OMOBJ`, `OMI`, ...). Attribution pairs
//! sit in an `OMATP` wrapper and bound variables in an `OMBVAR` wrapper.
//! Elements are matched by local name; wrappers must share the namespace
//! of their parent.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::{
    check_depth, format_float, format_hex_float, format_hex_integer, parse_decimal_float,
    parse_hex_float, parse_hex_integer,
};
use crate::dom::Element;
use crate::error::{Error, Result};
use crate::model::{Content, Foreign, Kind, Om};
use crate::{DEFAULT_VERSION, OPENMATH_NS};

/// How `OMI` values are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IntegerStyle {
    /// Decimal digits: `<OMI>-42</OMI>`.
    #[default]
    Decimal,
    /// Hex digits after `x`: `<OMI>-x2A</OMI>`.
    Hexadecimal,
}

/// How `OMF` values are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FloatStyle {
    /// A `dec` attribute with the shortest round-trip decimal form.
    #[default]
    Decimal,
    /// A `hex` attribute with the IEEE bit pattern.
    Hexadecimal,
}

/// Options for XML output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XmlOptions {
    /// Integer style.
    pub integers: IntegerStyle,
    /// Float style.
    pub floats: FloatStyle,
    /// Indent width for pretty output; `None` writes a single line.
    pub indent: Option<usize>,
    /// Whether to prepend an XML declaration.
    pub declaration: bool,
}

impl XmlOptions {
    /// Two-space indentation with an XML declaration.
    #[must_use]
    pub fn pretty() -> Self {
        Self {
            indent: Some(2),
            declaration: true,
            ..Self::default()
        }
    }
}

/// Builds the element tree for `om`. The root element and every `OMOBJ`
/// carry a namespace: the object's `xmlns` if it has one, the OpenMath
/// namespace otherwise.
#[must_use]
pub fn to_element(om: &Om, options: &XmlOptions) -> Element {
    let mut root = encode(om, options);
    if root.namespace.is_none() {
        root.namespace = Some(OPENMATH_NS.to_owned());
    }
    root
}

fn encode(om: &Om, options: &XmlOptions) -> Element {
    let mut element = Element::new(om.kind().as_str());
    if let Some(id) = om.id() {
        element.set_attribute("id", id);
    }
    match &*om.content() {
        Content::Object {
            object,
            version,
            xmlns,
            cdbase,
        } => {
            // Nested objects restate the namespace so they never inherit a
            // custom one from an enclosing object.
            element.namespace = Some(xmlns.as_deref().unwrap_or(OPENMATH_NS).to_owned());
            element.set_attribute("version", version);
            set_opt(&mut element, "cdbase", cdbase);
            element.push(encode(object, options));
        }
        Content::Integer(value) => {
            let text = match options.integers {
                IntegerStyle::Decimal => value.to_string(),
                IntegerStyle::Hexadecimal => format_hex_integer(*value),
            };
            element.push_text(&text);
        }
        Content::Float(value) => match options.floats {
            FloatStyle::Decimal => element.set_attribute("dec", format_float(*value)),
            FloatStyle::Hexadecimal => element.set_attribute("hex", format_hex_float(*value)),
        },
        Content::String(text) => element.push_text(text),
        Content::Bytearray(bytes) => element.push_text(&STANDARD.encode(bytes)),
        Content::Symbol { name, cd, cdbase } => {
            element.set_attribute("name", name);
            element.set_attribute("cd", cd);
            set_opt(&mut element, "cdbase", cdbase);
        }
        Content::Variable { name } => element.set_attribute("name", name),
        Content::Application {
            applicant,
            arguments,
            cdbase,
        } => {
            set_opt(&mut element, "cdbase", cdbase);
            element.push(encode(applicant, options));
            for argument in arguments {
                element.push(encode(argument, options));
            }
        }
        Content::Attribution {
            attributes,
            object,
            cdbase,
        } => {
            set_opt(&mut element, "cdbase", cdbase);
            let mut pairs = Element::new("OMATP");
            for (key, value) in attributes {
                pairs.push(encode(key, options));
                pairs.push(encode(value, options));
            }
            element.push(pairs);
            element.push(encode(object, options));
        }
        Content::Binding {
            binder,
            variables,
            object,
            cdbase,
        } => {
            set_opt(&mut element, "cdbase", cdbase);
            element.push(encode(binder, options));
            let mut bound = Element::new("OMBVAR");
            for variable in variables {
                bound.push(encode(variable, options));
            }
            element.push(bound);
            element.push(encode(object, options));
        }
        Content::Error { error, arguments } => {
            element.push(encode(error, options));
            for argument in arguments {
                element.push(encode(argument, options));
            }
        }
        Content::Foreign { foreign, encoding } => {
            set_opt(&mut element, "encoding", encoding);
            match foreign {
                Foreign::Text(text) => element.push_text(text),
                Foreign::Structured(value) => element.push_text(&value.to_string()),
                Foreign::Markup(markup) => element.push(markup.clone()),
            }
        }
        Content::Reference { href } => element.set_attribute("href", href),
    }
    element
}

fn set_opt(element: &mut Element, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        element.set_attribute(key, value);
    }
}

/// Encodes `om` as a single line of XML.
#[must_use]
pub fn to_xml(om: &Om) -> String {
    to_xml_with(om, &XmlOptions::default())
}

/// Encodes `om` as XML with the given options.
#[must_use]
pub fn to_xml_with(om: &Om, options: &XmlOptions) -> String {
    let root = to_element(om, options);
    let body = match options.indent {
        Some(width) => root.to_pretty_string(width),
        None => root.to_string(),
    };
    if options.declaration {
        format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{body}")
    } else {
        body
    }
}

/// Decodes XML text.
///
/// # Errors
///
/// Returns [`Error::MalformedInput`] if the text is not well-formed XML or
/// not a valid encoded object; constraint errors from the constructors are
/// passed through.
pub fn parse_xml(text: &str) -> Result<Om> {
    from_element(&Element::parse(text)?)
}

/// Decodes an element tree.
///
/// # Errors
///
/// Returns [`Error::MalformedInput`] for unknown tags, missing attributes,
/// wrong child counts and objects nested deeper than
/// [`MAX_DEPTH`](super::MAX_DEPTH); constraint errors from the constructors
/// are passed through.
pub fn from_element(element: &Element) -> Result<Om> {
    decode(element, 1)
}

fn decode(element: &Element, depth: usize) -> Result<Om> {
    check_depth(depth)?;
    let child = |element: &Element| decode(element, depth + 1);
    let kind = Kind::from_tag(&element.name)
        .ok_or_else(|| Error::malformed(format!("unknown tag '{}'", element.name)))?;
    let om = match kind {
        Kind::Object => {
            let inner = element
                .elements()
                .next()
                .ok_or_else(|| Error::malformed("OMOBJ: missing the wrapped object"))?;
            let om = Om::object(child(inner)?);
            om.set_version(element.attribute("version").unwrap_or(DEFAULT_VERSION))?;
            om.set_xmlns(element.namespace.clone().filter(|ns| ns != OPENMATH_NS))?;
            om
        }
        Kind::Integer => Om::integer(decode_integer(&element.text())?),
        Kind::Float => Om::float(decode_float(element)?),
        Kind::String => Om::string(element.text()),
        Kind::Bytearray => Om::bytearray(decode_base64(&element.text())?),
        Kind::Symbol => Om::symbol(required(element, kind, "name")?, required(element, kind, "cd")?),
        Kind::Variable => Om::variable(required(element, kind, "name")?),
        Kind::Application => {
            let mut children = element.elements();
            let applicant = children
                .next()
                .ok_or_else(|| Error::malformed("OMA: missing the applicant"))?;
            Om::application(child(applicant)?, decode_all(children, depth + 1)?)
        }
        Kind::Attribution => decode_attribution(element, depth + 1)?,
        Kind::Binding => decode_binding(element, depth + 1)?,
        Kind::Error => {
            let mut children = element.elements();
            let symbol = children
                .next()
                .ok_or_else(|| Error::malformed("OME: missing the error symbol"))?;
            Om::error(child(symbol)?, decode_all(children, depth + 1)?)?
        }
        Kind::Foreign => decode_foreign(element)?,
        Kind::Reference => Om::reference(required(element, kind, "href")?),
    };
    if kind.has_cdbase() {
        if let Some(cdbase) = element.attribute("cdbase") {
            om.set_cdbase(Some(cdbase.to_owned()))?;
        }
    }
    if let Some(id) = element.attribute("id") {
        om.set_id(Some(id.to_owned()));
    }
    Ok(om)
}

fn required<'a>(element: &'a Element, kind: Kind, name: &str) -> Result<&'a str> {
    element
        .attribute(name)
        .ok_or_else(|| Error::malformed(format!("{kind}: missing attribute '{name}'")))
}

fn decode_all<'a>(elements: impl Iterator<Item = &'a Element>, depth: usize) -> Result<Vec<Om>> {
    elements.map(|element| decode(element, depth)).collect()
}

fn decode_integer(text: &str) -> Result<i64> {
    let text = text.trim();
    let value = if text.starts_with('x') || text.starts_with("-x") {
        parse_hex_integer(text)
    } else {
        text.parse().ok()
    };
    value.ok_or_else(|| Error::malformed(format!("OMI: invalid integer '{text}'")))
}

fn decode_float(element: &Element) -> Result<f64> {
    if let Some(text) = element.attribute("dec") {
        return parse_decimal_float(text)
            .ok_or_else(|| Error::malformed(format!("OMF: invalid dec '{text}'")));
    }
    if let Some(text) = element.attribute("hex") {
        return parse_hex_float(text)
            .ok_or_else(|| Error::malformed(format!("OMF: invalid hex '{text}'")));
    }
    let text = element.text();
    if text.trim().is_empty() {
        return Err(Error::malformed("OMF: requires a 'dec' or 'hex' attribute"));
    }
    parse_decimal_float(&text).ok_or_else(|| Error::malformed(format!("OMF: invalid value '{text}'")))
}

fn decode_base64(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| Error::malformed(format!("OMB: invalid base64: {e}")))
}

/// `depth` is the level of the attribution's children.
fn decode_attribution(element: &Element, depth: usize) -> Result<Om> {
    let pairs = element
        .find("OMATP")
        .ok_or_else(|| Error::malformed("OMATTR: missing OMATP"))?;
    let items: Vec<&Element> = pairs.elements().collect();
    if items.len() % 2 != 0 {
        return Err(Error::malformed(format!(
            "OMATTR: OMATP must hold key/value pairs, found {} elements",
            items.len()
        )));
    }
    let attributes = items
        .chunks_exact(2)
        .map(|pair| match pair {
            [key, value] => Ok((decode(key, depth)?, decode(value, depth)?)),
            _ => Err(Error::malformed("OMATTR: incomplete attribute pair")),
        })
        .collect::<Result<Vec<_>>>()?;

    let objects: Vec<&Element> = element
        .elements()
        .filter(|child| !std::ptr::eq(*child, pairs))
        .collect();
    let [object] = objects.as_slice() else {
        return Err(Error::malformed(format!(
            "OMATTR: expected exactly one attributed object, found {}",
            objects.len()
        )));
    };
    Om::attribution(attributes, decode(object, depth)?)
}

fn decode_binding(element: &Element, depth: usize) -> Result<Om> {
    let bound = element
        .find("OMBVAR")
        .ok_or_else(|| Error::malformed("OMBIND: missing OMBVAR"))?;
    let others: Vec<&Element> = element
        .elements()
        .filter(|child| !std::ptr::eq(*child, bound))
        .collect();
    let [binder, body] = others.as_slice() else {
        return Err(Error::malformed(format!(
            "OMBIND: expected a binder and a body besides OMBVAR, found {} elements",
            others.len()
        )));
    };
    let variables = decode_all(bound.elements(), depth)?;
    Om::binding(decode(binder, depth)?, variables, decode(body, depth)?)
}

fn decode_foreign(element: &Element) -> Result<Om> {
    let children: Vec<&Element> = element.elements().collect();
    let payload = match children.as_slice() {
        [] => Foreign::Text(element.text()),
        [markup] => {
            let mut markup = (*markup).clone();
            if let Some(namespace) = &element.namespace {
                markup.strip_namespace(namespace);
            }
            Foreign::Markup(markup)
        }
        _ => {
            return Err(Error::malformed(format!(
                "OMFOREIGN: expected at most one child element, found {}",
                children.len()
            )))
        }
    };
    let om = Om::foreign(payload);
    if let Some(encoding) = element.attribute("encoding") {
        om.set_encoding(Some(encoding.to_owned()))?;
    }
    Ok(om)
}

impl Om {
    /// Encodes this object as a single line of XML.
    #[must_use]
    pub fn to_xml(&self) -> String {
        to_xml(self)
    }

    /// Encodes this object as XML with the given options.
    #[must_use]
    pub fn to_xml_with(&self, options: &XmlOptions) -> String {
        to_xml_with(self, options)
    }
}
