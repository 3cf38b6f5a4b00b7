//! OVAPI `/line/` feed: fetch and typed decode
//!
//! The body is a JSON object keyed by line id, each value a flat object of
//! PascalCase fields. Only the fields the pipeline consumes are decoded;
//! everything else is ignored.

use std::fmt;

use rustc_hash::FxHashSet;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::config::Config;
use crate::error::PipelineError;

// === Lenient field deserializers ===

/// Strings pass through, numbers keep their JSON text (`101` → `"101"`).
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::invalid_type(
            unexpected(&other),
            &"a string or number",
        )),
    }
}

/// Integer, or a string holding one.
fn integer_or_numeric_string<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("expected an integer, got {n}"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| de::Error::invalid_value(de::Unexpected::Str(&s), &"an integer")),
        Some(other) => Err(de::Error::invalid_type(unexpected(&other), &"an integer")),
    }
}

/// Any JSON value as text; the transformer decides what is acceptable.
fn any_as_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn unexpected(v: &Value) -> de::Unexpected<'_> {
    match v {
        Value::Bool(b) => de::Unexpected::Bool(*b),
        Value::Array(_) => de::Unexpected::Seq,
        Value::Object(_) => de::Unexpected::Map,
        _ => de::Unexpected::Other("value"),
    }
}

/// One line entry as received. Absent fields decode to `None`.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawLineEntry {
    pub line_name: Option<String>,
    #[serde(deserialize_with = "any_as_text")]
    pub transport_type: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub line_public_number: Option<String>,
    pub data_owner_code: Option<String>,
    #[serde(rename = "DestinationName50")]
    pub destination_name_50: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub line_planning_number: Option<String>,
    #[serde(deserialize_with = "integer_or_numeric_string")]
    pub line_direction: Option<i64>,
}

/// Decoded feed, in document order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FeedDocument {
    pub entries: Vec<(String, RawLineEntry)>,
}

impl FeedDocument {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'de> Deserialize<'de> for FeedDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FeedVisitor;

        impl<'de> Visitor<'de> for FeedVisitor {
            type Value = FeedDocument;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "an object mapping line ids to line fields")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let hint = map.size_hint().unwrap_or(0);
                let mut seen = FxHashSet::with_capacity_and_hasher(hint, Default::default());
                let mut entries = Vec::with_capacity(hint);

                while let Some(key) = map.next_key::<String>()? {
                    if !seen.insert(key.clone()) {
                        return Err(de::Error::custom(format!("duplicate line id {key:?}")));
                    }
                    let entry = map
                        .next_value::<RawLineEntry>()
                        .map_err(|e| de::Error::custom(format!("line {key:?}: {e}")))?;
                    entries.push((key, entry));
                }
                Ok(FeedDocument { entries })
            }
        }

        deserializer.deserialize_map(FeedVisitor)
    }
}

/// Decode a feed body. Repeated line ids are rejected.
pub fn decode_feed(body: &[u8]) -> Result<FeedDocument, serde_json::Error> {
    serde_json::from_slice(body)
}

/// GET `{base_url}{endpoint}` and decode the body.
///
/// Non-200 status, transport failure, timeout and undecodable body all map to
/// [`PipelineError::Extraction`]; a bad body carries status 200.
pub fn fetch_feed(config: &Config) -> Result<FeedDocument, PipelineError> {
    let url = config.feed_url();
    log::debug!("GET {url}");
    let body = linefeed_core::get_bytes(&url, config.timeout)?;
    log::debug!("Received {} bytes from {url}", body.len());

    decode_feed(&body).map_err(|e| PipelineError::Extraction {
        status: Some(200),
        message: format!("malformed feed body: {e}"),
    })
}
