//! NDA signing endpoints.
//!
//! - `GET  /api/v1/nda/schema`        field definitions the viewer renders
//! - `GET  /api/v1/nda/contacts`      contacts with a signable NDA, newest first
//! - `GET  /nda/{contact_id}`         saved values and the requirements-left count
//! - `GET  /nda/{contact_id}/pdf`     filled preview, query parameters overlay saved values
//! - `POST /nda/{contact_id}/save`    store values, fill, store the document and publish it

use std::collections::BTreeMap;
use std::io;

use axum::{
    body::Body,
    extract::{FromRequest, Path, Query, Request, State},
    http::{header, StatusCode},
    response::Response,
    routing::{get, post},
    Form, Json, Router,
};
use leadsign_core::form::field_for_key;
use leadsign_core::{
    field_definitions, ApplicationError, DomainError, FieldDefinition, FillError, FormSubmission,
    NdaContact, PipelineState, PublishResult, RunRequest, Stage, StoredDocumentReference,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::api::{correlation_id, failure, ApiFailure};
use crate::bootstrap::AppState;

const CONTACTS_LIMIT: u32 = 500;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/nda/schema", get(schema))
        .route("/api/v1/nda/contacts", get(contacts))
        .route("/nda/{contact_id}", get(form_context))
        .route("/nda/{contact_id}/pdf", get(pdf_preview))
        .route("/nda/{contact_id}/save", post(save_form))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct FormContext {
    pub contact_id: String,
    pub has_record: bool,
    pub values: BTreeMap<String, String>,
    pub requirements_left: usize,
    pub missing_required: Vec<&'static str>,
    pub pdf_url: String,
    pub save_url: String,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub ok: bool,
    pub document: Option<StoredDocumentReference>,
    pub crm_propagated: bool,
    pub publish: Option<PublishResult>,
    pub state: PipelineState,
    pub failed_stage: Option<Stage>,
    pub error: Option<String>,
    pub fill_issues: Vec<FillError>,
    pub received_keys: Vec<String>,
    pub correlation_id: String,
}

async fn schema() -> Json<&'static [FieldDefinition]> {
    Json(field_definitions())
}

async fn contacts(State(state): State<AppState>) -> Result<Json<Vec<NdaContact>>, ApiFailure> {
    state.emails.list_nda_contacts(CONTACTS_LIMIT).await.map(Json).map_err(|error| {
        failure(ApplicationError::Persistence(error.to_string()), &correlation_id())
    })
}

async fn form_context(
    State(state): State<AppState>,
    Path(contact_id): Path<String>,
) -> Result<Json<FormContext>, ApiFailure> {
    let correlation_id = correlation_id();
    let (submission, has_record) = stored_submission(&state, &contact_id, &correlation_id).await?;

    Ok(Json(FormContext {
        has_record,
        values: submission.values().clone(),
        requirements_left: submission.requirements_left(),
        missing_required: submission.missing_required(),
        pdf_url: format!("/nda/{contact_id}/pdf"),
        save_url: format!("/nda/{contact_id}/save"),
        contact_id,
    }))
}

async fn pdf_preview(
    State(state): State<AppState>,
    Path(contact_id): Path<String>,
    Query(overlay): Query<BTreeMap<String, String>>,
) -> Result<Response, ApiFailure> {
    let correlation_id = correlation_id();
    let (mut submission, _) = stored_submission(&state, &contact_id, &correlation_id).await?;
    for (key, value) in &overlay {
        if !value.trim().is_empty() {
            submission.set(key, value.trim());
        }
    }

    let template = read_template(&state, &correlation_id).await?;
    let document = state.pipeline.filler().fill(&template, &submission).map_err(|error| {
        warn!(
            event_name = "nda.preview_failed",
            correlation_id = %correlation_id,
            contact_id = %contact_id,
            error = %error,
            "nda preview could not be filled"
        );
        failure(DomainError::Fill(error).into(), &correlation_id)
    })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(header::CONTENT_DISPOSITION, "inline; filename=\"NDA.pdf\"")
        .body(Body::from(document.bytes))
        .map_err(|error| failure(ApplicationError::Storage(error.to_string()), &correlation_id))
}

async fn save_form(
    State(state): State<AppState>,
    Path(contact_id): Path<String>,
    request: Request,
) -> Result<(StatusCode, Json<SaveResponse>), ApiFailure> {
    let correlation_id = correlation_id();
    let pairs = read_body(request, &correlation_id).await?;
    let received_keys: Vec<String> = pairs.iter().map(|(key, _)| key.clone()).collect();

    let known: BTreeMap<String, String> = pairs
        .into_iter()
        .filter(|(key, _)| field_for_key(key).is_some())
        .map(|(key, value)| (key, value.trim().to_string()))
        .collect();
    state.emails.save_form_values(&contact_id, &known).await.map_err(|error| {
        failure(ApplicationError::Persistence(error.to_string()), &correlation_id)
    })?;

    let (submission, _) = stored_submission(&state, &contact_id, &correlation_id).await?;
    let template = read_template(&state, &correlation_id).await?;
    let target = state.publish_target(&contact_id);

    let report = state
        .pipeline
        .run(RunRequest {
            correlation_id: &correlation_id,
            template: &template,
            submission: &submission,
            target: target.as_ref(),
            publish_timeout: state.publish_timeout(),
        })
        .await;

    let status = match report.failed_stage() {
        Some(Stage::Filling) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(Stage::Storage) => StatusCode::INTERNAL_SERVER_ERROR,
        Some(Stage::Publish) | None => StatusCode::OK,
    };
    let crm_propagated = report.crm_propagated();
    info!(
        event_name = "nda.saved",
        correlation_id = %correlation_id,
        contact_id = %contact_id,
        stored = report.reference.is_some(),
        crm_propagated,
        failed_stage = report.failed_stage().map(Stage::as_str).unwrap_or("none"),
        "nda submission processed"
    );

    Ok((
        status,
        Json(SaveResponse {
            ok: report.reference.is_some(),
            crm_propagated,
            state: report.state().clone(),
            failed_stage: report.failed_stage(),
            error: report.failure.as_ref().map(ToString::to_string),
            document: report.reference,
            publish: report.publish,
            fill_issues: report.fill_issues,
            received_keys,
            correlation_id,
        }),
    ))
}

/// Saved values for the contact's latest record.
///
/// A missing reference id stays empty, so the document key comes from the submission token.
async fn stored_submission(
    state: &AppState,
    contact_id: &str,
    correlation_id: &str,
) -> Result<(FormSubmission, bool), ApiFailure> {
    let record = state.emails.latest_for_contact(contact_id).await.map_err(|error| {
        failure(ApplicationError::Persistence(error.to_string()), correlation_id)
    })?;

    let has_record = record.is_some();
    let submission =
        record.map(|email| FormSubmission::from_pairs(email.form_pairs())).unwrap_or_default();
    Ok((submission, has_record))
}

async fn read_template(state: &AppState, correlation_id: &str) -> Result<Vec<u8>, ApiFailure> {
    let path = &state.config.storage.template_path;
    tokio::fs::read(path).await.map_err(|error| {
        warn!(
            event_name = "nda.template_unavailable",
            correlation_id = %correlation_id,
            path = %path.display(),
            error = %error,
            "nda template could not be read"
        );
        let application = if error.kind() == io::ErrorKind::NotFound {
            ApplicationError::NotFound(format!("nda template `{}`", path.display()))
        } else {
            ApplicationError::Configuration(format!("nda template unreadable: {error}"))
        };
        failure(application, correlation_id)
    })
}

/// Key/value pairs from a JSON object or a urlencoded form, in the order received.
async fn read_body(
    request: Request,
    correlation_id: &str,
) -> Result<Vec<(String, String)>, ApiFailure> {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("application/json"));
    let invalid = |message: String| {
        failure(DomainError::InvalidSubmission(message).into(), correlation_id)
    };

    if !is_json {
        let Form(pairs) = Form::<Vec<(String, String)>>::from_request(request, &())
            .await
            .map_err(|rejection| invalid(rejection.body_text()))?;
        return Ok(pairs);
    }

    let Json(body) = Json::<Value>::from_request(request, &())
        .await
        .map_err(|_| invalid("body is not valid JSON".to_string()))?;
    let Value::Object(object) = body else {
        return Err(invalid("body must be a JSON object".to_string()));
    };
    Ok(object
        .into_iter()
        .filter_map(|(key, value)| json_text(&value).map(|text| (key, text)))
        .collect())
}

fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Array(items) => {
            Some(items.iter().filter_map(json_text).collect::<Vec<_>>().join(","))
        }
        other => Some(other.to_string()),
    }
}
