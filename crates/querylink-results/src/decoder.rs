use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{DecodeError, Result};
use crate::result_set::ResultSet;

/// Field holding the path array in object-shaped payloads.
const RESULTS_FIELD: &str = "results";

/// Decode a result frame, absorbing every failure.
///
/// Malformed or unexpected payloads are logged and come back as an empty
/// result set, so the read loop never has to handle a decode error.
pub fn decode(frame: &str) -> ResultSet {
    match try_decode(frame) {
        Ok(results) => results,
        Err(err) => {
            warn!(error = %err, frame_len = frame.len(), "discarding undecodable result frame");
            ResultSet::empty()
        }
    }
}

/// Decode raw frame bytes; invalid UTF-8 is replaced before parsing.
pub fn decode_bytes(frame: &[u8]) -> ResultSet {
    decode(&String::from_utf8_lossy(frame))
}

/// Decode a result frame, reporting why it failed.
///
/// Accepted shapes:
/// - `["/a", "/b"]`: string elements kept in order, others dropped
/// - `{"results": ["/a"]}`: same extraction on the `results` field
/// - either of the above encoded once more as a JSON string
///
/// An empty or whitespace-only frame is an empty result set, not an error.
pub fn try_decode(frame: &str) -> Result<ResultSet> {
    let trimmed = frame.trim();
    if trimmed.is_empty() {
        return Ok(ResultSet::empty());
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(inner)) => {
            debug!("unwrapping string-encoded result payload");
            extract(serde_json::from_str(inner.trim())?)
        }
        Ok(value) => extract(value),
        Err(err) => match unwrap_quoted(trimmed) {
            Some(inner) => {
                debug!("retrying result payload with one layer of quoting removed");
                let value = serde_json::from_str(inner.trim()).map_err(|_| err)?;
                extract(value)
            }
            None => Err(err.into()),
        },
    }
}

fn extract(value: Value) -> Result<ResultSet> {
    match value {
        Value::Array(items) => Ok(strings(items)),
        Value::Object(mut fields) => match fields.remove(RESULTS_FIELD) {
            Some(Value::Array(items)) => Ok(strings(items)),
            _ => {
                debug!("result object has no `results` array");
                Ok(ResultSet::empty())
            }
        },
        other => Err(DecodeError::UnexpectedShape {
            found: kind(&other),
        }),
    }
}

fn strings(items: Vec<Value>) -> ResultSet {
    let total = items.len();
    let results: ResultSet = items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(path) => Some(path),
            _ => None,
        })
        .collect();
    if results.len() != total {
        debug!(
            dropped = total - results.len(),
            "dropped non-string result entries"
        );
    }
    results
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Best-effort removal of one layer of quoting from a payload that is not
/// valid JSON on its own (for example a quoted body with stray escapes).
///
/// Only `\"`, `\\` and `\/` plus the common whitespace escapes are undone;
/// any other escape is kept verbatim.
fn unwrap_quoted(payload: &str) -> Option<String> {
    if payload.len() < 2 || !payload.starts_with('"') || !payload.ends_with('"') {
        return None;
    }
    let body = &payload[1..payload.len() - 1];

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Some(out)
}
