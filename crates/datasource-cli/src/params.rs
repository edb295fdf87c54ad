//! `key=value` query parameters from the command line

use anyhow::{bail, Result};
use datasource_url::{QueryParams, QueryValue};
use serde_json::Value;

/// Parse one `key=value` argument
///
/// The value is read as JSON when it parses (`3`, `null`, `[1,2]`,
/// `{"a":1}`), otherwise as plain text.
///
/// # Errors
/// Returns an error if there is no `=` or the key is empty
pub fn parse_param(arg: &str) -> Result<(String, QueryValue)> {
    let Some((key, raw)) = arg.split_once('=') else {
        bail!("expected key=value, got {arg:?}");
    };
    if key.is_empty() {
        bail!("empty key in {arg:?}");
    }
    let value = serde_json::from_str::<Value>(raw).map_or_else(
        |_| QueryValue::String(raw.to_string()),
        QueryValue::from,
    );
    Ok((key.to_string(), value))
}

/// Collect arguments into a parameter map
///
/// A key given more than once becomes a list, in argument order.
///
/// # Errors
/// Returns the first malformed argument's error
pub fn collect_params<'a>(args: impl IntoIterator<Item = &'a str>) -> Result<QueryParams> {
    let mut params = QueryParams::new();
    for arg in args {
        let (key, value) = parse_param(arg)?;
        match params.remove(&key) {
            None => {
                params.insert(key, value);
            }
            Some(QueryValue::List(mut items)) => {
                items.push(value);
                params.insert(key, QueryValue::List(items));
            }
            Some(previous) => {
                params.insert(key, QueryValue::List(vec![previous, value]));
            }
        }
    }
    Ok(params)
}
