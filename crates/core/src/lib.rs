pub mod config;
pub mod domain;
pub mod errors;
pub mod form;
pub mod pipeline;
pub mod store;

pub use domain::document::{
    DocumentKey, FillError, FillFailure, FilledDocument, StoredDocumentReference,
};
pub use domain::inbound::{
    AttachmentInfo, InboundEmail, InboundEmailId, LeadFields, NdaContact, NewInboundEmail,
};
pub use domain::publish::{CrmContactLink, CrmError, FieldId, FieldIdCache, PublishResult};
pub use domain::submission::FormSubmission;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use form::{field_definitions, FieldDefinition, FieldKind, Placement};
pub use pipeline::{
    CrmPublisher, DocumentFiller, DocumentStore, PipelineOrchestrator, PipelineReport,
    PipelineState, PublishTarget, RunRequest, Stage,
};
pub use store::{compute_key, FsDocumentStore, StorageWriteError};
