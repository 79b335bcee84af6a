//! Serde building blocks for provider response schemas.
//!
//! Provider payloads are only loosely specified. Fields decoded through
//! [`lenient`] treat a value of the wrong JSON type as absent instead of
//! rejecting the enclosing object, so one odd field never costs a whole item.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserializes an optional field, mapping type mismatches to `None`.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// An item identifier that providers send either as a string or a number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum ItemId {
    Text(String),
    Number(serde_json::Number),
}

impl ItemId {
    /// The identifier as a string, or `None` when it is an empty string.
    pub(crate) fn into_non_empty(self) -> Option<String> {
        match self {
            ItemId::Text(text) if text.is_empty() => None,
            ItemId::Text(text) => Some(text),
            ItemId::Number(number) => Some(number.to_string()),
        }
    }
}

/// Width and height as reported by a provider, each possibly missing.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub(crate) struct Dimensions {
    #[serde(default, deserialize_with = "lenient")]
    pub width: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub height: Option<f64>,
}

impl Dimensions {
    /// Both dimensions, only when both are present and positive.
    pub(crate) fn both_positive(&self) -> Option<(f64, f64)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0.0 && h > 0.0 => Some((w, h)),
            _ => None,
        }
    }
}

/// A string field that only counts when it is non-empty.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
