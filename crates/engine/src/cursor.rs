//! Pagination cursor codec
//!
//! A cursor is an opaque token naming the last row a client has seen, plus
//! that row's sort value when the page was sorted.
//!
//! # Wire format
//!
//! URL-safe base64 (no padding) of the JSON object
//!
//! ```text
//! {"row": <u64>, "sort": {"type": "INT" | "FLOAT" | "STRING" | "DATETIME", "value": <json | null>}}
//! ```
//!
//! `sort` is omitted when no sort was active. `DATETIME` values are RFC 3339
//! strings with microsecond precision. Non-finite floats travel as the
//! strings `"NaN"`, `"inf"` and `"-inf"` since JSON has no literal for them.
//!
//! Clients hold these tokens across requests, so the format must not change.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use exemplar_core::{Error, Result, SortValue, SortValueType, Timestamp};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

/// Sort position carried by a cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorSort {
    /// Type tag of the sort expression the cursor was minted under
    pub value_type: SortValueType,
    /// The row's sort value, `None` if the row had none
    pub value: Option<SortValue>,
}

/// Decoded pagination cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    /// Row id (example id)
    pub row: u64,
    /// Sort position, present iff the page was sorted
    pub sort: Option<CursorSort>,
}

impl Cursor {
    /// Cursor for an unsorted page
    pub fn new(row: u64) -> Self {
        Self { row, sort: None }
    }

    /// Cursor for a sorted page
    pub fn sorted(row: u64, value_type: SortValueType, value: Option<SortValue>) -> Self {
        Self {
            row,
            sort: Some(CursorSort { value_type, value }),
        }
    }

    /// Encode to the wire token
    pub fn encode(&self) -> String {
        let body = match &self.sort {
            None => json!({ "row": self.row }),
            Some(sort) => json!({
                "row": self.row,
                "sort": {
                    "type": sort.value_type.as_str(),
                    "value": sort.value.as_ref().map_or(JsonValue::Null, value_to_json),
                },
            }),
        };
        URL_SAFE_NO_PAD.encode(body.to_string())
    }

    /// Decode a wire token
    ///
    /// # Errors
    ///
    /// `MalformedCursor` if the token is not base64, not JSON, not the
    /// expected shape, carries an unknown type tag, or a value that does not
    /// match its tag.
    pub fn decode(token: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| Error::malformed_cursor(format!("invalid base64: {}", e)))?;
        let wire: WireCursor = serde_json::from_slice(&bytes)
            .map_err(|e| Error::malformed_cursor(format!("invalid payload: {}", e)))?;

        let sort = match wire.sort {
            None => None,
            Some(sort) => Some(CursorSort {
                value_type: sort.value_type,
                value: value_from_json(sort.value_type, sort.value)?,
            }),
        };
        Ok(Self {
            row: wire.row,
            sort,
        })
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WireCursor {
    row: u64,
    #[serde(default)]
    sort: Option<WireSort>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WireSort {
    #[serde(rename = "type")]
    value_type: SortValueType,
    value: JsonValue,
}

fn value_to_json(value: &SortValue) -> JsonValue {
    match value {
        SortValue::Int(v) => json!(v),
        SortValue::Float(v) if v.is_nan() => json!("NaN"),
        SortValue::Float(v) if v.is_infinite() && *v > 0.0 => json!("inf"),
        SortValue::Float(v) if v.is_infinite() => json!("-inf"),
        SortValue::Float(v) => json!(v),
        SortValue::Text(v) => json!(v),
        SortValue::Timestamp(v) => json!(v.to_rfc3339()),
    }
}

fn value_from_json(value_type: SortValueType, value: JsonValue) -> Result<Option<SortValue>> {
    if value.is_null() {
        return Ok(None);
    }
    let decoded = match (value_type, &value) {
        (SortValueType::Int, JsonValue::Number(n)) => n.as_i64().map(SortValue::Int),
        (SortValueType::Float, JsonValue::Number(n)) => n.as_f64().map(SortValue::Float),
        (SortValueType::Float, JsonValue::String(s)) => match s.as_str() {
            "NaN" => Some(SortValue::Float(f64::NAN)),
            "inf" => Some(SortValue::Float(f64::INFINITY)),
            "-inf" => Some(SortValue::Float(f64::NEG_INFINITY)),
            _ => None,
        },
        (SortValueType::Text, JsonValue::String(s)) => Some(SortValue::Text(s.clone())),
        (SortValueType::Timestamp, JsonValue::String(s)) => {
            Timestamp::parse_rfc3339(s).map(SortValue::Timestamp)
        }
        _ => None,
    };
    decoded.map(Some).ok_or_else(|| {
        Error::malformed_cursor(format!("value {} is not a valid {}", value, value_type))
    })
}
