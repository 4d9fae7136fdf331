//! JSON encoding.
//!
//! Every node becomes a JSON object with a `"kind"` key holding the wire tag,
//! an optional `"id"`, and kind-specific keys:
//!
//! | kind | keys |
//! |------|------|
//! | `OMOBJ` | `object`, `version`, `xmlns`?, `cdbase`? |
//! | `OMI` | `integer` (or `decimal` / `hexadecimal` text on input) |
//! | `OMF` | `float` (or `decimal` / `hexadecimal` text) |
//! | `OMSTR` | `string` |
//! | `OMB` | `base64` (or a `bytes` array on input) |
//! | `OMS` | `name`, `cd`, `cdbase`? |
//! | `OMV` | `name` |
//! | `OMA` | `applicant`, `arguments`, `cdbase`? |
//! | `OMATTR` | `attributes` (array of `[key, value]`), `object`, `cdbase`? |
//! | `OMBIND` | `binder`, `variables`, `object`, `cdbase`? |
//! | `OME` | `error`, `arguments` |
//! | `OMFOREIGN` | `foreign`, `encoding`? |
//! | `OMR` | `href` |
//!
//! Keys are written in sorted order. Absent optional fields are omitted.
//! Infinite and NaN floats are written as `"decimal"` text, since JSON
//! numbers cannot hold them.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

use super::{
    check_depth, format_float, parse_decimal_float, parse_hex_float, parse_hex_integer, MAX_DEPTH,
};
use crate::error::{Error, Result};
use crate::model::{Content, Foreign, Kind, Om};
use crate::DEFAULT_VERSION;

/// Encodes `om` as a JSON value.
#[must_use]
pub fn to_value(om: &Om) -> Value {
    let mut node = Map::new();
    node.insert("kind".to_owned(), json!(om.kind().as_str()));
    if let Some(id) = om.id() {
        node.insert("id".to_owned(), json!(id));
    }
    match &*om.content() {
        Content::Object {
            object,
            version,
            xmlns,
            cdbase,
        } => {
            node.insert("object".to_owned(), to_value(object));
            node.insert("version".to_owned(), json!(version));
            insert_opt(&mut node, "xmlns", xmlns);
            insert_opt(&mut node, "cdbase", cdbase);
        }
        Content::Integer(value) => {
            node.insert("integer".to_owned(), json!(value));
        }
        Content::Float(value) if value.is_finite() => {
            node.insert("float".to_owned(), json!(value));
        }
        Content::Float(value) => {
            node.insert("decimal".to_owned(), json!(format_float(*value)));
        }
        Content::String(value) => {
            node.insert("string".to_owned(), json!(value));
        }
        Content::Bytearray(bytes) => {
            node.insert("base64".to_owned(), json!(STANDARD.encode(bytes)));
        }
        Content::Symbol { name, cd, cdbase } => {
            node.insert("name".to_owned(), json!(name));
            node.insert("cd".to_owned(), json!(cd));
            insert_opt(&mut node, "cdbase", cdbase);
        }
        Content::Variable { name } => {
            node.insert("name".to_owned(), json!(name));
        }
        Content::Application {
            applicant,
            arguments,
            cdbase,
        } => {
            node.insert("applicant".to_owned(), to_value(applicant));
            node.insert("arguments".to_owned(), to_values(arguments));
            insert_opt(&mut node, "cdbase", cdbase);
        }
        Content::Attribution {
            attributes,
            object,
            cdbase,
        } => {
            let pairs = attributes
                .iter()
                .map(|(key, value)| json!([to_value(key), to_value(value)]))
                .collect();
            node.insert("attributes".to_owned(), Value::Array(pairs));
            node.insert("object".to_owned(), to_value(object));
            insert_opt(&mut node, "cdbase", cdbase);
        }
        Content::Binding {
            binder,
            variables,
            object,
            cdbase,
        } => {
            node.insert("binder".to_owned(), to_value(binder));
            node.insert("variables".to_owned(), to_values(variables));
            node.insert("object".to_owned(), to_value(object));
            insert_opt(&mut node, "cdbase", cdbase);
        }
        Content::Error { error, arguments } => {
            node.insert("error".to_owned(), to_value(error));
            node.insert("arguments".to_owned(), to_values(arguments));
        }
        Content::Foreign { foreign, encoding } => {
            let payload = match foreign {
                Foreign::Text(text) => json!(text),
                Foreign::Structured(value) => value.clone(),
                Foreign::Markup(element) => json!(element.to_string()),
            };
            node.insert("foreign".to_owned(), payload);
            insert_opt(&mut node, "encoding", encoding);
        }
        Content::Reference { href } => {
            node.insert("href".to_owned(), json!(href));
        }
    }
    Value::Object(node)
}

fn to_values(nodes: &[Om]) -> Value {
    Value::Array(nodes.iter().map(to_value).collect())
}

fn insert_opt(node: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        node.insert(key.to_owned(), json!(value));
    }
}

/// Decodes a JSON value into an object tree.
///
/// # Errors
///
/// Returns [`Error::MalformedInput`] if the value is not an object, has no
/// known `"kind"`, misses a required key, or nests objects deeper than
/// [`MAX_DEPTH`]; constraint errors from the constructors are passed
/// through.
pub fn from_value(value: &Value) -> Result<Om> {
    decode(value, 1)
}

fn decode(value: &Value, depth: usize) -> Result<Om> {
    check_depth(depth)?;
    let node = value
        .as_object()
        .ok_or_else(|| Error::malformed(format!("expected a JSON object, got {value}")))?;
    let tag = node
        .get("kind")
        .ok_or_else(|| Error::malformed("missing key 'kind'"))?
        .as_str()
        .ok_or_else(|| Error::malformed("key 'kind' must be a string"))?;
    let kind = Kind::from_tag(tag).ok_or_else(|| Error::malformed(format!("unknown kind '{tag}'")))?;
    let fields = Fields { kind, node, depth };
    let child = |value: &Value| decode(value, depth + 1);

    let om = match kind {
        Kind::Object => {
            let om = Om::object(child(fields.required("object")?)?);
            let version = match fields.optional_str("version")? {
                Some(version) => Some(version),
                None => fields.optional_str("openmath")?,
            };
            om.set_version(version.unwrap_or(DEFAULT_VERSION))?;
            om.set_xmlns(fields.optional_str("xmlns")?.map(str::to_owned))?;
            om
        }
        Kind::Integer => Om::integer(decode_integer(&fields)?),
        Kind::Float => Om::float(decode_float(&fields)?),
        Kind::String => Om::string(fields.required_str("string")?),
        Kind::Bytearray => Om::bytearray(decode_bytes(&fields)?),
        Kind::Symbol => Om::symbol(fields.required_str("name")?, fields.required_str("cd")?),
        Kind::Variable => Om::variable(fields.required_str("name")?),
        Kind::Application => Om::application(
            child(fields.required("applicant")?)?,
            fields.objects("arguments")?,
        ),
        Kind::Attribution => Om::attribution(
            decode_attributes(&fields)?,
            child(fields.required("object")?)?,
        )?,
        Kind::Binding => {
            fields.required("variables")?;
            Om::binding(
                child(fields.required("binder")?)?,
                fields.objects("variables")?,
                child(fields.required("object")?)?,
            )?
        }
        Kind::Error => Om::error(
            child(fields.required("error")?)?,
            fields.objects("arguments")?,
        )?,
        Kind::Foreign => {
            let payload = match fields.required("foreign")? {
                Value::String(text) => Foreign::Text(text.clone()),
                other => Foreign::Structured(other.clone()),
            };
            let om = Om::foreign(payload);
            om.set_encoding(fields.optional_str("encoding")?.map(str::to_owned))?;
            om
        }
        Kind::Reference => Om::reference(fields.required_str("href")?),
    };

    if kind.has_cdbase() {
        om.set_cdbase(fields.optional_str("cdbase")?.map(str::to_owned))?;
    }
    om.set_id(fields.optional_str("id")?.map(str::to_owned));
    Ok(om)
}

/// Keys of one encoded node, with error messages naming its kind.
struct Fields<'a> {
    kind: Kind,
    node: &'a Map<String, Value>,
    depth: usize,
}

impl<'a> Fields<'a> {
    fn required(&self, key: &str) -> Result<&'a Value> {
        self.node
            .get(key)
            .ok_or_else(|| Error::malformed(format!("{}: missing key '{key}'", self.kind)))
    }

    fn required_str(&self, key: &str) -> Result<&'a str> {
        self.required(key)?
            .as_str()
            .ok_or_else(|| self.invalid(key, "a string"))
    }

    fn optional_str(&self, key: &str) -> Result<Option<&'a str>> {
        match self.node.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => Ok(Some(text)),
            Some(_) => Err(self.invalid(key, "a string")),
        }
    }

    fn objects(&self, key: &str) -> Result<Vec<Om>> {
        match self.node.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| decode(item, self.depth + 1))
                .collect(),
            Some(_) => Err(self.invalid(key, "an array")),
        }
    }

    fn invalid(&self, key: &str, expected: &str) -> Error {
        Error::malformed(format!("{}: key '{key}' must be {expected}", self.kind))
    }
}

fn decode_integer(fields: &Fields<'_>) -> Result<i64> {
    if let Some(value) = fields.node.get("integer") {
        return value
            .as_i64()
            .ok_or_else(|| fields.invalid("integer", "a signed 64-bit integer"));
    }
    if let Some(text) = fields.optional_str("decimal")? {
        return text
            .trim()
            .parse()
            .map_err(|_| Error::malformed(format!("OMI: invalid decimal '{text}'")));
    }
    if let Some(text) = fields.optional_str("hexadecimal")? {
        return parse_hex_integer(text)
            .ok_or_else(|| Error::malformed(format!("OMI: invalid hexadecimal '{text}'")));
    }
    Err(Error::malformed(
        "OMI: missing key 'integer', 'decimal' or 'hexadecimal'",
    ))
}

fn decode_float(fields: &Fields<'_>) -> Result<f64> {
    for key in ["float", "integer"] {
        if let Some(value) = fields.node.get(key) {
            return value.as_f64().ok_or_else(|| fields.invalid(key, "a number"));
        }
    }
    if let Some(text) = fields.optional_str("decimal")? {
        return parse_decimal_float(text)
            .ok_or_else(|| Error::malformed(format!("OMF: invalid decimal '{text}'")));
    }
    if let Some(text) = fields.optional_str("hexadecimal")? {
        return parse_hex_float(text)
            .ok_or_else(|| Error::malformed(format!("OMF: invalid hexadecimal '{text}'")));
    }
    Err(Error::malformed(
        "OMF: missing key 'float', 'decimal' or 'hexadecimal'",
    ))
}

fn decode_bytes(fields: &Fields<'_>) -> Result<Vec<u8>> {
    if let Some(text) = fields.optional_str("base64")? {
        let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        return STANDARD
            .decode(compact)
            .map_err(|e| Error::malformed(format!("OMB: invalid base64: {e}")));
    }
    match fields.node.get("bytes") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|byte| u8::try_from(byte).ok())
                    .ok_or_else(|| fields.invalid("bytes", "an array of bytes"))
            })
            .collect(),
        Some(_) => Err(fields.invalid("bytes", "an array of bytes")),
        None => Err(Error::malformed("OMB: missing key 'base64'")),
    }
}

fn decode_attributes(fields: &Fields<'_>) -> Result<Vec<(Om, Om)>> {
    let Value::Array(pairs) = fields.required("attributes")? else {
        return Err(fields.invalid("attributes", "an array"));
    };
    pairs
        .iter()
        .map(|pair| match pair.as_array().map(Vec::as_slice) {
            Some([key, value]) => Ok((
                decode(key, fields.depth + 1)?,
                decode(value, fields.depth + 1)?,
            )),
            _ => Err(fields.invalid("attributes", "an array of [key, value] pairs")),
        })
        .collect()
}

/// Encodes `om` as compact JSON text.
#[must_use]
pub fn to_json(om: &Om) -> String {
    to_value(om).to_string()
}

/// Encodes `om` as indented JSON text.
#[must_use]
pub fn to_json_pretty(om: &Om) -> String {
    let value = to_value(om);
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

/// Decodes JSON text.
///
/// # Errors
///
/// Returns [`Error::MalformedInput`] if the text is not JSON or not a valid
/// encoded object.
pub fn parse_json(text: &str) -> Result<Om> {
    let nesting = bracket_depth(text);
    if nesting > MAX_NESTING {
        return Err(Error::malformed(format!(
            "JSON nested {nesting} arrays and objects deep, more than {MAX_NESTING}"
        )));
    }
    let invalid = |e: serde_json::Error| Error::malformed(format!("invalid JSON: {e}"));
    let mut deserializer = serde_json::Deserializer::from_str(text);
    deserializer.disable_recursion_limit();
    let value = Value::deserialize(&mut deserializer).map_err(invalid)?;
    deserializer.end().map_err(invalid)?;
    from_value(&value)
}

/// An attribution level costs three containers: the node, its attribute
/// list and one pair.
const MAX_NESTING: usize = 3 * MAX_DEPTH;

/// Deepest bracket nesting outside string literals. Runs before parsing so
/// that the parser's own recursion stays bounded.
fn bracket_depth(text: &str) -> usize {
    let (mut depth, mut deepest) = (0usize, 0usize);
    let (mut in_string, mut escaped) = (false, false);
    for byte in text.bytes() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}

impl Om {
    /// Encodes this object as compact JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        to_json(self)
    }

    /// Encodes this object as indented JSON.
    #[must_use]
    pub fn to_json_pretty(&self) -> String {
        to_json_pretty(self)
    }
}

impl Serialize for Om {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        to_value(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Om {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        from_value(&value).map_err(D::Error::custom)
    }
}
