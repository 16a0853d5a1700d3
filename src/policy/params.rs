//! Per-request color parameters
//!
//! Clients tune delay and failure probability per color by posting a JSON
//! array of these records to the color endpoint.

use serde::{Deserialize, Serialize};

/// Body that some clients send to mean "no parameters": an empty array
/// serialized as a JSON string.
pub const EMPTY_ARRAY_SENTINEL: &[u8] = b"\"[]\"";

/// Delay and failure tuning for one color
///
/// `None` probabilities mean "do not apply", which is distinct from zero.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ColorParameters {
    /// Color this record applies to
    #[serde(default)]
    pub color: String,

    /// Chance in percent (0-100) of delaying the response
    #[serde(rename = "delayPercent", default, skip_serializing_if = "Option::is_none")]
    pub delay_percent: Option<i64>,

    /// Delay length in seconds, used only when `delay_percent` is set
    #[serde(rename = "delayLength", default)]
    pub delay_length: i64,

    /// Chance in percent (0-100) of answering 500
    #[serde(rename = "return500", default, skip_serializing_if = "Option::is_none")]
    pub return500: Option<i64>,
}

/// Decode a request body into parameter records
///
/// An empty body, the `"[]"` sentinel, and JSON `null` all decode to no
/// records.
pub fn parse_body(body: &[u8]) -> Result<Vec<ColorParameters>, serde_json::Error> {
    if body.is_empty() || body == EMPTY_ARRAY_SENTINEL {
        return Ok(Vec::new());
    }
    let params: Option<Vec<ColorParameters>> = serde_json::from_slice(body)?;
    Ok(params.unwrap_or_default())
}

/// The record that applies to `color`
///
/// When several records share a color the last one wins.
// NOTE: last-match-wins is kept for compatibility with existing clients; it
// may be unintended, since earlier duplicates are silently ignored.
pub fn find_active<'a>(params: &'a [ColorParameters], color: &str) -> Option<&'a ColorParameters> {
    params.iter().rev().find(|p| p.color == color)
}
