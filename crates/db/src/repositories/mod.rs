use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use leadsign_core::domain::inbound::{
    InboundEmail, InboundEmailId, LeadFields, NdaContact, NewInboundEmail,
};

pub mod inbound_email;

pub use inbound_email::SqlInboundEmailRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait InboundEmailRepository: Send + Sync {
    async fn insert(&self, email: NewInboundEmail) -> Result<InboundEmailId, RepositoryError>;

    async fn find_by_id(&self, id: InboundEmailId)
        -> Result<Option<InboundEmail>, RepositoryError>;

    /// Newest first.
    async fn list_recent(&self, limit: u32) -> Result<Vec<InboundEmail>, RepositoryError>;

    /// One entry per contact and listing, newest first.
    async fn list_nda_contacts(&self, limit: u32) -> Result<Vec<NdaContact>, RepositoryError>;

    async fn latest_for_contact(
        &self,
        crm_contact_id: &str,
    ) -> Result<Option<InboundEmail>, RepositoryError>;

    async fn update_lead_fields(
        &self,
        id: InboundEmailId,
        lead: &LeadFields,
        raw_parsed: &Value,
    ) -> Result<(), RepositoryError>;

    /// Merges signer-entered values into the contact's latest record, creating one when the
    /// contact has none yet.
    async fn save_form_values(
        &self,
        crm_contact_id: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<InboundEmailId, RepositoryError>;
}
