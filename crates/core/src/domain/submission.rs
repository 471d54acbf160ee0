use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::form::{field_definitions, field_for_key};

/// Values supplied by the signer, keyed by template field name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FormSubmission {
    values: BTreeMap<String, String>,
    token: String,
}

impl FormSubmission {
    pub fn new() -> Self {
        Self { values: BTreeMap::new(), token: Uuid::new_v4().simple().to_string() }
    }

    /// Builds a submission from arbitrary keyed input. Unknown keys are dropped.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut submission = Self::new();
        for (key, value) in pairs {
            submission.set(key.as_ref(), value);
        }
        submission
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    /// Stores `value` under the schema field `key` resolves to. Returns `false` for unknown keys.
    ///
    /// A value given under the template name is never replaced by one given under an alias.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> bool {
        let Some(field) = field_for_key(key) else {
            return false;
        };
        if field.name == key {
            self.values.insert(field.name.to_string(), value.into());
        } else {
            self.values.entry(field.name.to_string()).or_insert_with(|| value.into());
        }
        true
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Random fallback used for the document key when no reference id was supplied.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn reference_id(&self) -> Option<&str> {
        self.non_empty("ref_id")
    }

    pub fn missing_required(&self) -> Vec<&'static str> {
        field_definitions()
            .iter()
            .filter(|field| field.required && self.non_empty(field.name).is_none())
            .map(|field| field.name)
            .collect()
    }

    /// Number of signing-checklist fields still empty.
    pub fn requirements_left(&self) -> usize {
        field_definitions()
            .iter()
            .filter(|field| field.checklist && self.non_empty(field.name).is_none())
            .count()
    }

    fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).map(str::trim).filter(|value| !value.is_empty())
    }
}

impl Default for FormSubmission {
    fn default() -> Self {
        Self::new()
    }
}
