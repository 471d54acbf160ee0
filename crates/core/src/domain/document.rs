use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// File name a signed document is stored under.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct DocumentKey(pub String);

impl DocumentKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Field-level problem that did not stop the fill.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FillError {
    #[error("template has no form field named `{field}`")]
    UnknownTemplateField { field: String },
    #[error("`{value}` is not an allowed value for `{field}`")]
    InvalidChoiceValue { field: String, value: String },
}

/// Problem that prevents any document from being produced.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FillFailure {
    #[error("required fields are empty: {}", .0.join(", "))]
    MissingRequired(Vec<String>),
    #[error("template could not be parsed: {0}")]
    TemplateParse(String),
    #[error("filled document could not be rendered: {0}")]
    Render(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilledDocument {
    pub bytes: Vec<u8>,
    pub issues: Vec<FillError>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoredDocumentReference {
    pub path: PathBuf,
    pub url: String,
}
