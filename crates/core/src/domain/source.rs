use serde::{Deserialize, Serialize};

/// One row of the operator's source dataset.
///
/// Weight is optional because the curated sheet leaves it blank on rows that
/// were never rated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRow {
    pub affirmation: String,
    #[serde(default)]
    pub weight: Option<u32>,
}

impl SourceRow {
    /// Rows enter a full run only when rated with the selection weight and
    /// carrying a non-blank affirmation.
    pub fn is_selected(&self, selection_weight: u32) -> bool {
        self.weight == Some(selection_weight) && !self.affirmation.trim().is_empty()
    }
}
