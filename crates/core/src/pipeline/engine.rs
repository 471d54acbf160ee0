use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::document::{
    DocumentKey, FillError, FillFailure, FilledDocument, StoredDocumentReference,
};
use crate::domain::publish::{CrmContactLink, CrmError, FieldId, PublishResult};
use crate::domain::submission::FormSubmission;
use crate::pipeline::states::{PipelineEvent, PipelineState, Stage, TransitionOutcome};
use crate::store::StorageWriteError;

/// Binds submission values into a template. Pure and synchronous.
pub trait DocumentFiller: Send + Sync {
    fn fill(
        &self,
        template: &[u8],
        submission: &FormSubmission,
    ) -> Result<FilledDocument, FillFailure>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn compute_key(&self, submission: &FormSubmission) -> DocumentKey;
    fn public_reference(&self, key: &DocumentKey) -> StoredDocumentReference;
    async fn save(
        &self,
        key: &DocumentKey,
        bytes: &[u8],
    ) -> Result<StoredDocumentReference, StorageWriteError>;
}

#[async_trait]
pub trait CrmPublisher: Send + Sync {
    async fn resolve_custom_field_id(&self, label: &str) -> Result<FieldId, CrmError>;
    async fn publish(
        &self,
        contact_id: &str,
        field_id: &FieldId,
        url: &str,
        tag: &str,
    ) -> PublishResult;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PipelineTransitionError {
    #[error("invalid pipeline transition from {state:?} using event {event:?}")]
    InvalidTransition { state: PipelineState, event: PipelineEvent },
}

pub fn transition(
    current: &PipelineState,
    event: &PipelineEvent,
) -> Result<TransitionOutcome, PipelineTransitionError> {
    use PipelineEvent::{
        Completed, DocumentFilled, DocumentStored, PublishSkipped, ReferencePublished, StageFailed,
    };
    use PipelineState::{Done, Failed, Filled, Published, Received, Stored};

    let to = match (current, event) {
        (Received, DocumentFilled) => Filled,
        (Filled, DocumentStored) => Stored,
        (Stored, ReferencePublished) => Published,
        (Stored, PublishSkipped) | (Published, Completed) => Done,
        (Received, StageFailed { stage: Stage::Filling, cause })
        | (Filled, StageFailed { stage: Stage::Storage, cause })
        | (Stored, StageFailed { stage: Stage::Publish, cause }) => {
            let stage = match current {
                Received => Stage::Filling,
                Filled => Stage::Storage,
                _ => Stage::Publish,
            };
            Failed { stage, cause: cause.clone() }
        }
        _ => {
            return Err(PipelineTransitionError::InvalidTransition {
                state: current.clone(),
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: current.clone(), to, event: event.clone() })
}

#[derive(Debug, Error)]
pub enum StageCause {
    #[error(transparent)]
    Fill(#[from] FillFailure),
    #[error(transparent)]
    Storage(#[from] StorageWriteError),
    #[error(transparent)]
    Crm(#[from] CrmError),
}

#[derive(Debug, Error)]
#[error("{} stage failed: {cause}", .stage.as_str())]
pub struct StageFailure {
    pub stage: Stage,
    pub cause: StageCause,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishTarget {
    pub contact_id: String,
    pub field_label: String,
    pub tag: String,
}

pub struct RunRequest<'a> {
    pub correlation_id: &'a str,
    pub template: &'a [u8],
    pub submission: &'a FormSubmission,
    /// `None` skips the publish stage.
    pub target: Option<&'a PublishTarget>,
    pub publish_timeout: Option<Duration>,
}

static RECEIVED: PipelineState = PipelineState::Received;

#[derive(Debug)]
pub struct PipelineReport {
    pub trail: Vec<PipelineState>,
    pub key: Option<DocumentKey>,
    pub reference: Option<StoredDocumentReference>,
    pub publish: Option<PublishResult>,
    pub link: Option<CrmContactLink>,
    pub fill_issues: Vec<FillError>,
    pub failure: Option<StageFailure>,
}

impl PipelineReport {
    fn new() -> Self {
        Self {
            trail: vec![PipelineState::Received],
            key: None,
            reference: None,
            publish: None,
            link: None,
            fill_issues: Vec::new(),
            failure: None,
        }
    }

    pub fn state(&self) -> &PipelineState {
        self.trail.last().unwrap_or(&RECEIVED)
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        self.failure.as_ref().map(|failure| failure.stage)
    }

    /// The CRM contact holds the document URL and the tag.
    pub fn crm_propagated(&self) -> bool {
        matches!(self.state(), PipelineState::Done)
            && self.publish.as_ref().is_some_and(PublishResult::is_complete)
    }

    fn apply(&mut self, event: PipelineEvent, correlation_id: &str) {
        match transition(self.state(), &event) {
            Ok(outcome) => self.trail.push(outcome.to),
            Err(error) => warn!(
                event_name = "pipeline.transition_rejected",
                correlation_id = %correlation_id,
                error = %error,
                "pipeline transition rejected"
            ),
        }
    }

    fn fail(mut self, stage: Stage, cause: StageCause, correlation_id: &str) -> Self {
        warn!(
            event_name = "pipeline.stage_failed",
            correlation_id = %correlation_id,
            stage = stage.as_str(),
            error = %cause,
            "pipeline stage failed"
        );
        self.apply(PipelineEvent::StageFailed { stage, cause: cause.to_string() }, correlation_id);
        self.failure = Some(StageFailure { stage, cause });
        self
    }
}

/// Runs Filler, Store and Publisher in order for one submission.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    filler: Arc<dyn DocumentFiller>,
    store: Arc<dyn DocumentStore>,
    publisher: Option<Arc<dyn CrmPublisher>>,
}

impl PipelineOrchestrator {
    pub fn new(
        filler: Arc<dyn DocumentFiller>,
        store: Arc<dyn DocumentStore>,
        publisher: Option<Arc<dyn CrmPublisher>>,
    ) -> Self {
        Self { filler, store, publisher }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn filler(&self) -> &Arc<dyn DocumentFiller> {
        &self.filler
    }

    pub async fn run(&self, request: RunRequest<'_>) -> PipelineReport {
        let correlation_id = request.correlation_id;
        let mut report = PipelineReport::new();

        let missing = request.submission.missing_required();
        let filled = if missing.is_empty() {
            self.filler.fill(request.template, request.submission)
        } else {
            Err(FillFailure::MissingRequired(missing.into_iter().map(str::to_string).collect()))
        };
        let document = match filled {
            Ok(document) => document,
            Err(error) => return report.fail(Stage::Filling, error.into(), correlation_id),
        };
        for issue in &document.issues {
            warn!(
                event_name = "pipeline.fill_issue",
                correlation_id = %correlation_id,
                issue = %issue,
                "field skipped while filling"
            );
        }
        report.fill_issues = document.issues.clone();
        report.apply(PipelineEvent::DocumentFilled, correlation_id);

        let key = self.store.compute_key(request.submission);
        report.key = Some(key.clone());
        let reference = match self.store.save(&key, &document.bytes).await {
            Ok(reference) => reference,
            Err(error) => return report.fail(Stage::Storage, error.into(), correlation_id),
        };
        report.reference = Some(reference.clone());
        report.apply(PipelineEvent::DocumentStored, correlation_id);
        info!(
            event_name = "pipeline.document_stored",
            correlation_id = %correlation_id,
            key = %key,
            url = %reference.url,
            "signed document stored"
        );

        let (Some(publisher), Some(target)) = (self.publisher.as_ref(), request.target) else {
            report.apply(PipelineEvent::PublishSkipped, correlation_id);
            return report;
        };

        let publish = async {
            let field_id = publisher.resolve_custom_field_id(&target.field_label).await?;
            let result =
                publisher.publish(&target.contact_id, &field_id, &reference.url, &target.tag).await;
            Ok::<_, CrmError>((field_id, result))
        };
        let outcome = match request.publish_timeout {
            Some(limit) => tokio::time::timeout(limit, publish)
                .await
                .unwrap_or_else(|_| Err(CrmError::Timeout)),
            None => publish.await,
        };

        match outcome {
            Ok((field_id, result)) => {
                report.link = Some(CrmContactLink {
                    contact_id: target.contact_id.clone(),
                    field_id,
                    url: reference.url.clone(),
                    tag_attached: result.tag_attached,
                });
                let error = result.first_error().cloned();
                report.publish = Some(result);
                if let Some(error) = error {
                    return report.fail(Stage::Publish, error.into(), correlation_id);
                }
                report.apply(PipelineEvent::ReferencePublished, correlation_id);
                report.apply(PipelineEvent::Completed, correlation_id);
                info!(
                    event_name = "pipeline.reference_published",
                    correlation_id = %correlation_id,
                    contact_id = %target.contact_id,
                    "document reference published to crm"
                );
                report
            }
            Err(error) => {
                report.publish = Some(PublishResult::failed(error.clone()));
                report.fail(Stage::Publish, error.into(), correlation_id)
            }
        }
    }
}
