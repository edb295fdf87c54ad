//! Query-string serialization
//!
//! Provides [`build_url`] and the [`QueryValue`] model it serializes.
//!
//! Output is deterministic: keys are visited in lexicographic order, list
//! values expand into repeated `key=value` pairs, and nulls are dropped.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Query parameters keyed by name, iterated in sorted order
pub type QueryParams = BTreeMap<String, QueryValue>;

/// Escapes undone after URI-component encoding
///
/// The first five restore characters `encodeURIComponent` leaves alone, the
/// rest are the reserved characters allowed verbatim in a query.
const UNESCAPES: [(&str, &str); 10] = [
    ("%21", "!"),
    ("%2A", "*"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%40", "@"),
    ("%3A", ":"),
    ("%24", "$"),
    ("%2C", ","),
    ("%3B", ";"),
];

/// How spaces are written in the query string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryEncoding {
    /// Space becomes `+`
    #[default]
    Plus,
    /// Space stays `%20`
    PercentSpaces,
}

/// A single query parameter value
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum QueryValue {
    /// Omitted from the output
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    /// Serialized as ISO-8601 with millisecond precision
    DateTime(DateTime<Utc>),
    /// Expanded into one `key=value` pair per element
    List(Vec<QueryValue>),
    /// Arbitrary structured value, serialized as JSON text
    Json(Value),
}

impl QueryValue {
    /// Check if this value is omitted from the query string
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Render a value as it appears on the right side of `key=`
    ///
    /// Lists nested inside a list and structured values become JSON text.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => render_number(n),
            Self::String(s) => s.clone(),
            Self::DateTime(dt) => iso_timestamp(dt),
            Self::List(_) => self.to_json().to_string(),
            Self::Json(Value::String(s)) => s.clone(),
            Self::Json(v) => v.to_string(),
        }
    }

    /// Convert to a JSON value (date/times become ISO strings)
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::DateTime(dt) => Value::String(iso_timestamp(dt)),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Json(v) => v.clone(),
        }
    }
}

/// Whole floats print without a fraction, as `encodeURIComponent(1.0)` does
fn render_number(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f == 0.0 => "0".to_string(),
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e21 => format!("{f:.0}"),
        _ => n.to_string(),
    }
}

fn iso_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl From<Value> for QueryValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            obj @ Value::Object(_) => Self::Json(obj),
        }
    }
}

impl From<Map<String, Value>> for QueryValue {
    fn from(map: Map<String, Value>) -> Self {
        Self::Json(Value::Object(map))
    }
}

impl From<&str> for QueryValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for QueryValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for QueryValue {
    fn from(v: f64) -> Self {
        Number::from_f64(v).map_or(Self::Null, Self::Number)
    }
}

impl From<DateTime<Utc>> for QueryValue {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }
}

impl<T: Into<QueryValue>> From<Vec<T>> for QueryValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for QueryValue {
                fn from(v: $ty) -> Self {
                    Self::Number(Number::from(v))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

/// Percent-encode a query key or value
///
/// Standard URI-component encoding, then `@ : $ , ;` are restored and spaces
/// are written according to `encoding`.
#[must_use]
pub fn encode_uri_query(value: &str, encoding: QueryEncoding) -> String {
    let mut out = urlencoding::encode(value).into_owned();
    for (escaped, raw) in UNESCAPES {
        if out.contains(escaped) {
            out = out.replace(escaped, raw);
        }
    }
    if encoding == QueryEncoding::Plus {
        out = out.replace("%20", "+");
    }
    out
}

/// Append `params` to `base` as a query string, writing spaces as `+`
///
/// # Examples
/// - `build_url("/x", {b: 2, a: 1})` → `/x?a=1&b=2`
/// - `build_url("/x?already=1", {a: [1, 2]})` → `/x?already=1&a=1&a=2`
/// - `build_url("/x", {a: null})` → `/x`
#[inline]
#[must_use]
pub fn build_url(base: &str, params: Option<&QueryParams>) -> String {
    build_url_with(base, params, QueryEncoding::Plus)
}

/// Append `params` to `base` with an explicit space encoding
#[must_use]
pub fn build_url_with(base: &str, params: Option<&QueryParams>, encoding: QueryEncoding) -> String {
    let Some(params) = params else {
        return base.to_string();
    };

    let mut parts = Vec::new();
    for (key, value) in params {
        let key = encode_uri_query(key, encoding);
        match value {
            QueryValue::Null => {}
            QueryValue::List(items) => {
                for item in items {
                    parts.push(format!("{key}={}", encode_uri_query(&item.render(), encoding)));
                }
            }
            scalar => {
                parts.push(format!("{key}={}", encode_uri_query(&scalar.render(), encoding)));
            }
        }
    }

    if parts.is_empty() {
        return base.to_string();
    }

    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{}", parts.join("&"))
}
