//! Inbound email webhook and the stored-email API.
//!
//! - `POST /webhooks/inbound`     multipart payload from the email-parsing relay
//! - `GET  /api/v1/emails`        newest stored emails
//! - `GET  /api/v1/emails/{id}`   one stored email

use std::collections::BTreeMap;

use axum::{
    extract::{
        multipart::{Field, MultipartError},
        Multipart, Path, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use leadsign_agent::EmailContent;
use leadsign_core::{
    ApplicationError, AttachmentInfo, DomainError, InboundEmail, InboundEmailId, NewInboundEmail,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::{correlation_id, failure, ApiFailure};
use crate::bootstrap::AppState;

const LIST_LIMIT: u32 = 100;
const MAX_MESSAGE_ID_LEN: usize = 512;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks/inbound", post(receive_inbound))
        .route("/api/v1/emails", get(list_emails))
        .route("/api/v1/emails/{id}", get(email_detail))
        .with_state(state)
}

/// Text parts and file parts of one webhook delivery.
#[derive(Debug, Default)]
struct InboundPayload {
    fields: BTreeMap<String, String>,
    attachments: Vec<AttachmentInfo>,
    file_text: Option<String>,
    file_html: Option<String>,
}

impl InboundPayload {
    async fn read(mut multipart: Multipart) -> Result<Self, MultipartError> {
        let mut payload = Self::default();
        while let Some(field) = multipart.next_field().await? {
            payload.add(field).await?;
        }
        Ok(payload)
    }

    async fn add(&mut self, field: Field<'_>) -> Result<(), MultipartError> {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().unwrap_or_default().to_ascii_lowercase();
        let bytes = field.bytes().await?;

        let Some(file_name) = file_name else {
            self.fields.insert(name, String::from_utf8_lossy(&bytes).into_owned());
            return Ok(());
        };

        if name.starts_with("attachment") {
            self.attachments.push(AttachmentInfo {
                name: file_name,
                size: bytes.len() as u64,
                content_type,
            });
            return Ok(());
        }

        let content = String::from_utf8_lossy(&bytes).trim().to_string();
        if content.is_empty() {
            return Ok(());
        }
        let lowered = name.to_ascii_lowercase();
        let is_html =
            content_type.contains("text/html") || lowered == "html" || lowered == "html_body";
        if is_html {
            self.file_html.get_or_insert(content);
        } else if content_type.is_empty() || content_type.starts_with("text/") {
            self.file_text.get_or_insert(content);
        }
        Ok(())
    }

    fn field(&self, key: &str) -> &str {
        self.fields.get(key).map(|value| value.trim()).unwrap_or_default()
    }

    /// First non-empty value among `keys`, compared case-insensitively.
    fn first_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .find_map(|key| {
                self.fields.iter().find(|(name, value)| {
                    name.eq_ignore_ascii_case(key) && !value.trim().is_empty()
                })
            })
            .map(|(_, value)| value.trim().to_string())
    }

    fn into_new_email(self) -> NewInboundEmail {
        let text_body = self
            .first_of(&["text", "body", "plain"])
            .or_else(|| self.file_text.clone())
            .or_else(|| self.first_of(&["email"]))
            .unwrap_or_default();
        let html_body = self
            .first_of(&["html", "html_body"])
            .or_else(|| self.file_html.clone())
            .unwrap_or_default();

        let message_id = match self.field("message_id") {
            "" => message_id_from_headers(self.field("headers")),
            id => id.chars().take(MAX_MESSAGE_ID_LEN).collect(),
        };
        let envelope = serde_json::from_str::<Value>(self.field("envelope"))
            .ok()
            .filter(Value::is_object)
            .unwrap_or_else(|| json!({}));

        NewInboundEmail {
            from_address: self.field("from").to_string(),
            to_address: self.field("to").to_string(),
            cc: self.field("cc").to_string(),
            subject: self.field("subject").to_string(),
            text_body,
            html_body,
            envelope,
            crm_contact_id: self.field("contact_id").to_string(),
            message_id,
            attachment_info: self.attachments,
        }
    }
}

pub fn message_id_from_headers(headers: &str) -> String {
    let lowered = headers.to_ascii_lowercase();
    let Some(start) = lowered.find("message-id:") else {
        return String::new();
    };
    let rest = headers[start + "message-id:".len()..].trim_start();
    let Some(rest) = rest.strip_prefix('<') else {
        return String::new();
    };
    match rest.find('>') {
        Some(end) => rest[..end].trim().chars().take(MAX_MESSAGE_ID_LEN).collect(),
        None => String::new(),
    }
}

async fn receive_inbound(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<StatusCode, ApiFailure> {
    let correlation_id = correlation_id();
    let payload = InboundPayload::read(multipart).await.map_err(|error| {
        warn!(
            event_name = "inbound.payload_rejected",
            correlation_id = %correlation_id,
            error = %error,
            "inbound payload could not be read"
        );
        failure(
            DomainError::InvalidSubmission(error.body_text()).into(),
            &correlation_id,
        )
    })?;

    let field_keys: Vec<String> = payload.fields.keys().cloned().collect();
    let email = payload.into_new_email();
    if !email.has_content() {
        warn!(
            event_name = "inbound.no_body",
            correlation_id = %correlation_id,
            field_keys = ?field_keys,
            "inbound email carried neither text nor html"
        );
    }

    let id = state.emails.insert(email.clone()).await.map_err(|error| {
        warn!(
            event_name = "inbound.persist_failed",
            correlation_id = %correlation_id,
            error = %error,
            "inbound email could not be stored"
        );
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            failure(ApplicationError::Persistence(error.to_string()), &correlation_id).1,
        )
    })?;
    info!(
        event_name = "inbound.received",
        correlation_id = %correlation_id,
        email_id = id.0,
        from = %email.from_address,
        subject = %email.subject,
        attachments = email.attachment_info.len(),
        "inbound email stored"
    );

    extract_lead(&state, id, &email, &correlation_id).await;
    Ok(StatusCode::OK)
}

/// Failures here are logged only; the email is already stored.
async fn extract_lead(
    state: &AppState,
    id: InboundEmailId,
    email: &NewInboundEmail,
    correlation_id: &str,
) {
    let Some(extractor) = state.extractor.as_ref() else {
        return;
    };
    let content = EmailContent {
        from_address: &email.from_address,
        subject: &email.subject,
        text_body: &email.text_body,
        html_body: &email.html_body,
    };

    let extraction = match extractor.extract(content).await {
        Ok(Some(extraction)) => extraction,
        Ok(None) => return,
        Err(error) => {
            warn!(
                event_name = "inbound.extraction_failed",
                correlation_id = %correlation_id,
                email_id = id.0,
                error = %error,
                "lead extraction failed"
            );
            return;
        }
    };

    if !extraction.lead.identifies_lead() {
        info!(
            event_name = "inbound.no_lead_data",
            correlation_id = %correlation_id,
            email_id = id.0,
            "no listing, email or phone found; lead fields not stored"
        );
        return;
    }

    if let Err(error) = state.emails.update_lead_fields(id, &extraction.lead, &extraction.raw).await
    {
        warn!(
            event_name = "inbound.lead_save_failed",
            correlation_id = %correlation_id,
            email_id = id.0,
            error = %error,
            "extracted lead could not be stored"
        );
        return;
    }
    info!(
        event_name = "inbound.lead_extracted",
        correlation_id = %correlation_id,
        email_id = id.0,
        listing_id = %extraction.lead.listing_id,
        lead_source = %extraction.lead.lead_source,
        "lead fields stored"
    );
}

async fn list_emails(State(state): State<AppState>) -> Result<Json<Vec<InboundEmail>>, ApiFailure> {
    state.emails.list_recent(LIST_LIMIT).await.map(Json).map_err(|error| {
        failure(ApplicationError::Persistence(error.to_string()), &correlation_id())
    })
}

async fn email_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<InboundEmail>, ApiFailure> {
    let correlation_id = correlation_id();
    match state.emails.find_by_id(InboundEmailId(id)).await {
        Ok(Some(email)) => Ok(Json(email)),
        Ok(None) => {
            Err(failure(ApplicationError::NotFound(format!("inbound email {id}")), &correlation_id))
        }
        Err(error) => {
            Err(failure(ApplicationError::Persistence(error.to_string()), &correlation_id))
        }
    }
}
