use serde::{Deserialize, Serialize};

/// A finished narration for one affirmation, as stored in the output table.
///
/// The narration is kept newline-escaped so the whole record fits on a single
/// CSV row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub affirmation: String,
    pub narration: String,
    pub model: String,
}

impl GenerationRecord {
    /// Build a record from raw model output, escaping embedded newlines.
    pub fn new(
        affirmation: impl Into<String>,
        narration: &str,
        model: impl Into<String>,
    ) -> Self {
        Self {
            affirmation: affirmation.into(),
            narration: escape_newlines(narration),
            model: model.into(),
        }
    }
}

/// An affirmation that failed either generation stage this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub affirmation: String,
}

impl FailureRecord {
    pub fn new(affirmation: impl Into<String>) -> Self {
        Self {
            affirmation: affirmation.into(),
        }
    }
}

/// Replace literal newlines with the two-character sequence `\n`.
pub fn escape_newlines(text: &str) -> String {
    text.replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_newlines() {
        assert_eq!(escape_newlines("a\nb"), "a\\nb");
        assert_eq!(escape_newlines("no breaks"), "no breaks");
        assert_eq!(escape_newlines("\n\n"), "\\n\\n");
    }

    #[test]
    fn test_escape_round_trip() {
        let original = "第一段。\n\n第二段。\n第三段。";
        let escaped = escape_newlines(original);
        assert!(!escaped.contains('\n'));
        assert_eq!(escaped.replace("\\n", "\n"), original);
    }

    #[test]
    fn test_record_escapes_narration() {
        let record = GenerationRecord::new("I am enough", "final text\nwith a break", "kimi-latest");
        assert_eq!(record.affirmation, "I am enough");
        assert_eq!(record.narration, "final text\\nwith a break");
        assert_eq!(record.model, "kimi-latest");
    }

    #[test]
    fn test_record_serde_field_names() {
        let record = GenerationRecord::new("a", "b", "m");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["affirmation"], "a");
        assert_eq!(value["narration"], "b");
        assert_eq!(value["model"], "m");
    }
}
