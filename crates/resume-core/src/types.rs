use serde::{Deserialize, Serialize};

/// Descriptive record stored next to every embedding.
///
/// `filename` is the natural key of the index: no two entries share one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Sanitized name of the uploaded document.
    pub filename: String,
    /// Vocabulary terms found in the document text, in vocabulary order.
    pub skills: Vec<String>,
    /// Character count of the extracted text.
    pub length: u64,
}

impl Metadata {
    pub fn new(filename: impl Into<String>, skills: Vec<String>, length: u64) -> Self {
        Self {
            filename: filename.into(),
            skills,
            length,
        }
    }
}
