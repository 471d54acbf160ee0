use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use thiserror::Error;

/// CRM custom-field identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct FieldId(pub String);

impl FieldId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrmError {
    #[error("no custom field matches `{label}`")]
    FieldNotFound { label: String },
    #[error("crm rejected credentials (status {status})")]
    AuthFailure { status: u16 },
    #[error("crm request timed out")]
    Timeout,
    #[error("crm rejected request (status {status}): {message}")]
    RemoteRejected { status: u16, message: String },
    #[error("crm transport failure: {message}")]
    Transport { message: String },
    #[error("crm response could not be decoded: {message}")]
    Decode { message: String },
    #[error("crm is not configured: {message}")]
    NotConfigured { message: String },
}

/// Outcome of one publish call.
///
/// `field_updated` and `tag_attached` describe the contact after the call, so they are
/// `true` when the value was already there. `field_written`/`tag_written` record whether a
/// write was actually sent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PublishResult {
    pub field_updated: bool,
    pub tag_attached: bool,
    pub field_written: bool,
    pub tag_written: bool,
    pub field_error: Option<CrmError>,
    pub tag_error: Option<CrmError>,
}

impl PublishResult {
    pub fn failed(error: CrmError) -> Self {
        Self { field_error: Some(error.clone()), tag_error: Some(error), ..Self::default() }
    }

    pub fn is_complete(&self) -> bool {
        self.field_updated && self.tag_attached
    }

    pub fn first_error(&self) -> Option<&CrmError> {
        self.field_error.as_ref().or(self.tag_error.as_ref())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CrmContactLink {
    pub contact_id: String,
    pub field_id: FieldId,
    pub url: String,
    pub tag_attached: bool,
}

/// Custom-field ids by label, shared across runs.
#[derive(Debug, Default)]
pub struct FieldIdCache {
    entries: RwLock<HashMap<String, FieldId>>,
}

impl FieldIdCache {
    pub fn get(&self, label: &str) -> Option<FieldId> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).get(label).cloned()
    }

    pub fn insert(&self, label: impl Into<String>, field_id: FieldId) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).insert(label.into(), field_id);
    }

    pub fn invalidate(&self, label: &str) -> Option<FieldId> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).remove(label)
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{CrmError, FieldId, FieldIdCache, PublishResult};

    #[test]
    fn cache_supports_insert_invalidate_and_clear() {
        let cache = FieldIdCache::default();
        assert_eq!(cache.get("Signed NDA"), None);

        cache.insert("Signed NDA", FieldId("fld-1".to_string()));
        cache.insert("Other", FieldId("fld-2".to_string()));
        assert_eq!(cache.get("Signed NDA"), Some(FieldId("fld-1".to_string())));

        assert_eq!(cache.invalidate("Signed NDA"), Some(FieldId("fld-1".to_string())));
        assert_eq!(cache.get("Signed NDA"), None);

        cache.clear();
        assert_eq!(cache.get("Other"), None);
    }

    #[test]
    fn failed_result_reports_both_sub_operations() {
        let result = PublishResult::failed(CrmError::Timeout);
        assert!(!result.is_complete());
        assert_eq!(result.first_error(), Some(&CrmError::Timeout));
        assert_eq!(result.tag_error, Some(CrmError::Timeout));
    }
}
