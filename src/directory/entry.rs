//! Directory entry type

use serde::{Deserialize, Serialize};

use crate::protocol::SourceId;

/// A known remote camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Camera identity
    pub id: SourceId,

    /// Human-readable name
    #[serde(rename = "name")]
    pub display_name: String,
}

impl DirectoryEntry {
    /// Create a new entry
    pub fn new(id: impl Into<SourceId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}
