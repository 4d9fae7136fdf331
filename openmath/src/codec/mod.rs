//! Wire encodings.
//!
//! - [`json`]: one JSON object per node, keyed by `"kind"`.
//! - [`xml`]: the OpenMath 2.0 XML encoding.
//!
//! [`parse`] picks the decoder from the first non-whitespace character.

pub mod json;
pub mod xml;

use std::path::Path;

use crate::error::{Error, Result};
use crate::model::Om;

pub use json::{from_value, parse_json, to_value};
pub use xml::{from_element, parse_xml, to_element, FloatStyle, IntegerStyle, XmlOptions};

/// Deepest object nesting either decoder accepts, counting the outermost
/// object as level one. The `OMATP` and `OMBVAR` wrappers of the XML
/// encoding and the arrays of the JSON encoding do not count. Deeper input
/// is rejected with [`Error::MalformedInput`] by both decoders.
pub const MAX_DEPTH: usize = 256;

pub(crate) fn check_depth(depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(Error::malformed(format!(
            "objects nested deeper than {MAX_DEPTH} levels"
        )));
    }
    Ok(())
}

/// A wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// JSON.
    Json,
    /// OpenMath XML.
    Xml,
}

impl Encoding {
    /// Chooses an encoding from a file name or URL path: `.om` and `.xml`
    /// are XML, `.json` is JSON. Returns `None` for anything else.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Encoding> {
        let extension = Path::new(path).extension()?.to_str()?;
        if extension.eq_ignore_ascii_case("om") || extension.eq_ignore_ascii_case("xml") {
            Some(Encoding::Xml)
        } else if extension.eq_ignore_ascii_case("json") {
            Some(Encoding::Json)
        } else {
            None
        }
    }

    /// Short name, as accepted on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Json => "json",
            Encoding::Xml => "xml",
        }
    }

    /// Decodes `text` with this encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedInput`] if `text` is not a valid object in
    /// this encoding.
    pub fn parse(self, text: &str) -> Result<Om> {
        match self {
            Encoding::Json => parse_json(text),
            Encoding::Xml => parse_xml(text),
        }
    }

    /// Encodes `om` with default options.
    #[must_use]
    pub fn encode(self, om: &Om) -> String {
        match self {
            Encoding::Json => om.to_json(),
            Encoding::Xml => om.to_xml(),
        }
    }
}

/// Decodes `text`, detecting the encoding: JSON if the first non-whitespace
/// character is `{`, XML if it is `<`.
///
/// # Errors
///
/// Returns [`Error::UnknownEncoding`] if neither applies, and
/// [`Error::MalformedInput`] if the chosen decoder rejects the text.
pub fn parse(text: &str) -> Result<Om> {
    detect(text).ok_or(Error::UnknownEncoding)?.parse(text)
}

/// The encoding [`parse`] would pick for `text`.
#[must_use]
pub fn detect(text: &str) -> Option<Encoding> {
    match text.trim_start().chars().next() {
        Some('{') => Some(Encoding::Json),
        Some('<') => Some(Encoding::Xml),
        _ => None,
    }
}

/// Parses `[-][0x|x]digits` as a hexadecimal `i64`.
pub(crate) fn parse_hex_integer(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix('x'))
        .unwrap_or(digits);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let magnitude = u64::from_str_radix(digits, 16).ok()?;
    if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    }
}

/// Writes an integer as `x` followed by upper-case hex digits, with a
/// leading `-` for negatives.
pub(crate) fn format_hex_integer(value: i64) -> String {
    if value < 0 {
        format!("-x{:X}", value.unsigned_abs())
    } else {
        format!("x{value:X}")
    }
}

/// Decimal text of a double: shortest round-trip form, or `INF`, `-INF`
/// and `NaN` for the non-finite values.
pub(crate) fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_owned()
    } else if value.is_infinite() {
        if value > 0.0 { "INF" } else { "-INF" }.to_owned()
    } else {
        format!("{value:?}")
    }
}

/// Parses decimal text, including `INF`, `-INF` and `NaN` in any case.
pub(crate) fn parse_decimal_float(text: &str) -> Option<f64> {
    text.trim().parse().ok()
}

/// The IEEE bit pattern as sixteen upper-case hex digits.
pub(crate) fn format_hex_float(value: f64) -> String {
    format!("{:016X}", value.to_bits())
}

/// Parses sixteen hex digits as an IEEE bit pattern.
pub(crate) fn parse_hex_float(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.len() != 16 || !text.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(text, 16).ok().map(f64::from_bits)
}
