//! Extraction of the JSON payload a model reply is supposed to carry.
//!
//! Replies are requested as pure JSON but arrive as free text; anything
//! around the outermost braces is discarded. Both failure modes (no object,
//! undecodable object) are logged and reported as `None`, never propagated.

use serde_json::Value;
use tracing::warn;

/// The single field the generation protocol expects in every reply.
pub const NARRATION_FIELD: &str = "inner_monologue";

/// Locate the first `{` and last `}` in the reply (greedy, spans newlines)
/// and decode the span as JSON.
pub fn extract_json(raw: &str) -> Option<Value> {
    let (start, end) = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => {
            warn!(reply = %raw, "No JSON object found in model reply");
            return None;
        }
    };

    match serde_json::from_str(&raw[start..=end]) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, reply = %raw, "Failed to decode JSON in model reply");
            None
        }
    }
}

/// Pull the narration text out of a decoded reply, if the field is present
/// and a string.
pub fn narration_text(value: &Value) -> Option<&str> {
    value.get(NARRATION_FIELD).and_then(Value::as_str)
}
