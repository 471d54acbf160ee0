//! GoHighLevel contact publishing.
//!
//! The publisher writes the signed document URL into a contact custom field and attaches the
//! signing tag. Both writes are skipped when the contact already carries the value, so a
//! repeated publish leaves the remote contact untouched.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use leadsign_core::config::CrmConfig;
use leadsign_core::pipeline::CrmPublisher;
use leadsign_core::{CrmError, FieldId, FieldIdCache, PublishResult};
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

pub const API_VERSION: &str = "2021-07-28";
const MAX_BACKOFF: Duration = Duration::from_secs(10);
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "fieldKey")]
    pub field_key: String,
    #[serde(default, rename = "dataType")]
    pub data_type: String,
}

impl CustomField {
    pub fn matches_label(&self, label: &str) -> bool {
        let label = label.trim();
        let key = self.field_key.strip_prefix("contact.").unwrap_or(&self.field_key);
        self.name.trim().eq_ignore_ascii_case(label)
            || self.field_key.eq_ignore_ascii_case(label)
            || key.eq_ignore_ascii_case(label)
    }
}

#[derive(Deserialize)]
struct CustomFieldsResponse {
    #[serde(default, rename = "customFields")]
    custom_fields: Vec<CustomField>,
}

/// Custom field values and tags of one contact.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContactSnapshot {
    pub id: String,
    pub name: String,
    pub email: String,
    pub custom_fields: BTreeMap<String, String>,
    pub tags: Vec<String>,
}

impl ContactSnapshot {
    fn from_response(body: &Value) -> Self {
        let contact = body.get("contact").unwrap_or(body);
        let custom_fields = contact
            .get("customFields")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|field| {
                        let id = field.get("id").and_then(Value::as_str)?;
                        let value = field.get("value").or_else(|| field.get("field_value"))?;
                        let value = match value {
                            Value::String(text) => text.clone(),
                            other => other.to_string(),
                        };
                        Some((id.to_string(), value))
                    })
                    .collect()
            })
            .unwrap_or_default();
        let tags = contact
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        let text =
            |key: &str| contact.get(key).and_then(Value::as_str).unwrap_or_default().trim();
        let name = match text("name") {
            "" => format!("{} {}", text("firstName"), text("lastName")).trim().to_string(),
            name => name.to_string(),
        };
        Self {
            id: text("id").to_string(),
            name,
            email: text("email").to_string(),
            custom_fields,
            tags,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|existing| existing.trim().eq_ignore_ascii_case(tag.trim()))
    }
}

#[derive(Clone, Copy, Debug)]
struct RetryPolicy {
    max_retries: u32,
    base_backoff: Duration,
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

/// Thin client for the endpoints the signing workflow uses.
#[derive(Clone)]
pub struct GhlClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
    location_id: Option<String>,
    retry: RetryPolicy,
}

impl GhlClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        location_id: Option<String>,
        timeout: Duration,
        max_retries: u32,
        retry_backoff: Duration,
    ) -> Result<Self, CrmError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| CrmError::Transport { message: error.to_string() })?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            location_id,
            retry: RetryPolicy { max_retries, base_backoff: retry_backoff },
        })
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &CrmConfig) -> Result<Option<Self>, CrmError> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        Self::new(
            config.api_base_url.clone(),
            api_key,
            config.location_id.clone(),
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
            Duration::from_millis(config.retry_backoff_ms),
        )
        .map(Some)
    }

    pub fn location_id(&self) -> Option<&str> {
        self.location_id.as_deref()
    }

    pub async fn list_custom_fields(&self) -> Result<Vec<CustomField>, CrmError> {
        let Some(location_id) = self.location_id.as_deref() else {
            return Err(CrmError::NotConfigured {
                message: "crm.location_id is required to list custom fields".to_string(),
            });
        };
        let url = format!("{}/locations/{location_id}/customFields", self.base_url);
        let body = self.execute("list_custom_fields", |http| http.get(&url)).await?;
        let parsed: CustomFieldsResponse = serde_json::from_value(body)
            .map_err(|error| CrmError::Decode { message: error.to_string() })?;
        Ok(parsed.custom_fields)
    }

    pub async fn get_contact(&self, contact_id: &str) -> Result<ContactSnapshot, CrmError> {
        let url = format!("{}/contacts/{contact_id}", self.base_url);
        let body = self.execute("get_contact", |http| http.get(&url)).await?;
        Ok(ContactSnapshot::from_response(&body))
    }

    pub async fn update_custom_field(
        &self,
        contact_id: &str,
        field_id: &FieldId,
        value: &str,
    ) -> Result<(), CrmError> {
        let url = format!("{}/contacts/{contact_id}", self.base_url);
        let payload = json!({ "customFields": [{ "id": field_id.as_str(), "value": value }] });
        self.execute("update_custom_field", |http| http.put(&url).json(&payload)).await?;
        Ok(())
    }

    pub async fn add_tag(&self, contact_id: &str, tag: &str) -> Result<(), CrmError> {
        let url = format!("{}/contacts/{contact_id}/tags", self.base_url);
        let payload = json!({ "tags": [tag] });
        self.execute("add_tag", |http| http.post(&url).json(&payload)).await?;
        Ok(())
    }

    /// Sends one request, retrying timeouts, connect errors, 429 and 5xx.
    async fn execute<F>(&self, operation: &'static str, build: F) -> Result<Value, CrmError>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            let request = build(&self.http)
                .bearer_auth(self.api_key.expose_secret())
                .header("Version", API_VERSION)
                .header("Accept", "application/json");

            let error = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return decode_body(response).await;
                    }
                    let message = response.text().await.unwrap_or_default();
                    let error = status_error(status, message);
                    if !is_retryable_status(status) {
                        return Err(error);
                    }
                    error
                }
                Err(error) if error.is_timeout() => CrmError::Timeout,
                Err(error) if error.is_connect() => {
                    CrmError::Transport { message: error.to_string() }
                }
                Err(error) => return Err(CrmError::Transport { message: error.to_string() }),
            };

            if attempt >= self.retry.max_retries {
                warn!(
                    event_name = "crm.request_exhausted",
                    operation,
                    attempts = attempt + 1,
                    error = %error,
                    "crm request failed after retries"
                );
                return Err(error);
            }
            let delay = self.retry.delay(attempt);
            debug!(
                event_name = "crm.request_retry",
                operation,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying crm request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

async fn decode_body(response: reqwest::Response) -> Result<Value, CrmError> {
    let text = response
        .text()
        .await
        .map_err(|error| CrmError::Decode { message: error.to_string() })?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|error| CrmError::Decode { message: error.to_string() })
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn status_error(status: StatusCode, message: String) -> CrmError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CrmError::AuthFailure { status: status.as_u16() }
        }
        _ => CrmError::RemoteRejected {
            status: status.as_u16(),
            message: message.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        },
    }
}

pub struct GhlPublisher {
    client: GhlClient,
    cache: Arc<FieldIdCache>,
    field_id_override: Option<FieldId>,
}

impl GhlPublisher {
    pub fn new(
        client: GhlClient,
        cache: Arc<FieldIdCache>,
        field_id_override: Option<String>,
    ) -> Self {
        Self {
            client,
            cache,
            field_id_override: field_id_override
                .filter(|id| !id.trim().is_empty())
                .map(FieldId),
        }
    }

    pub fn client(&self) -> &GhlClient {
        &self.client
    }
}

#[async_trait]
impl CrmPublisher for GhlPublisher {
    async fn resolve_custom_field_id(&self, label: &str) -> Result<FieldId, CrmError> {
        if let Some(field_id) = &self.field_id_override {
            return Ok(field_id.clone());
        }
        if let Some(field_id) = self.cache.get(label) {
            return Ok(field_id);
        }

        let fields = self.client.list_custom_fields().await?;
        let field = fields
            .iter()
            .find(|field| field.matches_label(label))
            .ok_or_else(|| CrmError::FieldNotFound { label: label.to_string() })?;
        let field_id = FieldId(field.id.clone());
        self.cache.insert(label, field_id.clone());
        info!(
            event_name = "crm.field_resolved",
            label,
            field_id = %field.id,
            "resolved crm custom field"
        );
        Ok(field_id)
    }

    async fn publish(
        &self,
        contact_id: &str,
        field_id: &FieldId,
        url: &str,
        tag: &str,
    ) -> PublishResult {
        let snapshot = match self.client.get_contact(contact_id).await {
            Ok(snapshot) => snapshot,
            Err(error @ CrmError::AuthFailure { .. }) => return PublishResult::failed(error),
            Err(error) => {
                warn!(
                    event_name = "crm.contact_read_failed",
                    contact_id,
                    error = %error,
                    "could not read contact, writing without comparison"
                );
                ContactSnapshot::default()
            }
        };

        let mut result = PublishResult::default();

        if snapshot.custom_fields.get(field_id.as_str()).is_some_and(|value| value == url) {
            result.field_updated = true;
        } else {
            match self.client.update_custom_field(contact_id, field_id, url).await {
                Ok(()) => {
                    result.field_updated = true;
                    result.field_written = true;
                }
                Err(error) => result.field_error = Some(error),
            }
        }

        if snapshot.has_tag(tag) {
            result.tag_attached = true;
        } else {
            match self.client.add_tag(contact_id, tag).await {
                Ok(()) => {
                    result.tag_attached = true;
                    result.tag_written = true;
                }
                Err(error) => result.tag_error = Some(error),
            }
        }

        info!(
            event_name = "crm.publish_finished",
            contact_id,
            field_updated = result.field_updated,
            field_written = result.field_written,
            tag_attached = result.tag_attached,
            tag_written = result.tag_written,
            "crm publish finished"
        );
        result
    }
}
