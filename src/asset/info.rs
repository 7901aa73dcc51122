//! Puzzle metadata records (`info.json`)
//!
//! The pipeline never interprets these; they are carried for the browsing
//! UI. The only check is a startup completeness pass that warns.

use serde::{Deserialize, Serialize};

/// Fields every record is expected to carry
pub const REQUIRED_FIELDS: &[&str] = &[
    "piecesNumber",
    "fileName",
    "artName",
    "artAuthor",
    "modelAuthor",
    "tags",
    "description",
];

/// One puzzle's descriptive metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    #[serde(default)]
    pub pieces_number: Option<u32>,
    /// Logical asset name this record describes
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub art_name: Option<String>,
    #[serde(default)]
    pub art_author: Option<String>,
    #[serde(default)]
    pub model_author: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ModelInfo {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Required fields that are absent or empty. A zero piece count counts
    /// as missing; an empty tag list does not.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        fn blank(s: &Option<String>) -> bool {
            s.as_deref().map(str::is_empty).unwrap_or(true)
        }

        let mut missing = Vec::new();
        if self.pieces_number.unwrap_or(0) == 0 {
            missing.push("piecesNumber");
        }
        if blank(&self.file_name) {
            missing.push("fileName");
        }
        if blank(&self.art_name) {
            missing.push("artName");
        }
        if blank(&self.art_author) {
            missing.push("artAuthor");
        }
        if blank(&self.model_author) {
            missing.push("modelAuthor");
        }
        if self.tags.is_none() {
            missing.push("tags");
        }
        if blank(&self.description) {
            missing.push("description");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}
