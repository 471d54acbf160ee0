use std::sync::Arc;
use std::time::Duration;

use leadsign_agent::{LeadExtractor, OpenAiCompatibleClient};
use leadsign_core::config::{AppConfig, ConfigError, LoadOptions};
use leadsign_core::pipeline::{CrmPublisher, PipelineOrchestrator, PublishTarget};
use leadsign_core::{FieldIdCache, FsDocumentStore};
use leadsign_db::{
    connect_with_config, migrations, DbPool, InboundEmailRepository, SqlInboundEmailRepository,
};
use thiserror::Error;
use tracing::info;

use crate::crm::{GhlClient, GhlPublisher};
use crate::pdf::LopdfFiller;

/// Everything a request handler needs.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub emails: Arc<dyn InboundEmailRepository>,
    pub pipeline: PipelineOrchestrator,
    pub extractor: Option<Arc<LeadExtractor>>,
    pub field_cache: Arc<FieldIdCache>,
}

impl AppState {
    pub fn publish_target(&self, contact_id: &str) -> Option<PublishTarget> {
        if contact_id.trim().is_empty() || !self.config.crm_ready() {
            return None;
        }
        Some(PublishTarget {
            contact_id: contact_id.to_string(),
            field_label: self.config.crm.custom_field_label.clone(),
            tag: self.config.crm.tag.clone(),
        })
    }

    pub fn publish_timeout(&self) -> Option<Duration> {
        Some(Duration::from_secs(self.config.server.request_timeout_secs))
    }
}

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("crm client setup failed: {0}")]
    Crm(String),
    #[error("llm client setup failed: {0}")]
    Llm(String),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let state = build_state(&config, db_pool.clone())?;
    info!(
        event_name = "system.bootstrap.integrations",
        correlation_id = "bootstrap",
        crm = state.config.crm_ready(),
        lead_extraction = state.extractor.is_some(),
        pdf_mode = ?config.pdf.mode,
        "integrations configured"
    );

    Ok(Application { config, db_pool, state })
}

pub fn build_state(config: &AppConfig, db_pool: DbPool) -> Result<AppState, BootstrapError> {
    let field_cache = Arc::new(FieldIdCache::default());

    let publisher: Option<Arc<dyn CrmPublisher>> = if config.crm_ready() {
        GhlClient::from_config(&config.crm)
            .map_err(|error| BootstrapError::Crm(error.to_string()))?
            .map(|client| {
                Arc::new(GhlPublisher::new(
                    client,
                    field_cache.clone(),
                    config.crm.custom_field_id.clone(),
                )) as Arc<dyn CrmPublisher>
            })
    } else {
        None
    };

    let extractor = OpenAiCompatibleClient::from_config(&config.llm)
        .map_err(|error| BootstrapError::Llm(format!("{error:#}")))?
        .map(|client| Arc::new(LeadExtractor::new(Arc::new(client))));

    let pipeline = PipelineOrchestrator::new(
        Arc::new(LopdfFiller::new(config.pdf.mode)),
        Arc::new(FsDocumentStore::new(
            config.storage.root.clone(),
            config.storage.public_base_url.clone(),
        )),
        publisher,
    );

    Ok(AppState {
        config: Arc::new(config.clone()),
        emails: Arc::new(SqlInboundEmailRepository::new(db_pool)),
        pipeline,
        extractor,
        field_cache,
    })
}


#[cfg(test)]
mod tests {
    use leadsign_core::config::{ConfigOverrides, LoadOptions};
    use secrecy::SecretString;

    use super::test_support::{config_in, state_for};
    use super::{bootstrap, build_state};

    #[tokio::test]
    async fn bootstrap_fails_fast_when_crm_lacks_credentials() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                crm_enabled: Some(true),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("crm.api_key"), "unexpected message: {message}");
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                crm_enabled: Some(false),
                llm_enabled: Some(false),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed with integrations off");

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'inbound_email'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("query");
        assert_eq!(count, 1);
        assert!(app.state.extractor.is_none());
        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn publish_target_requires_ready_crm_and_contact() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut config = config_in(dir.path());
        let state = state_for(&config).await;
        assert!(state.publish_target("c-1").is_none());

        config.crm.enabled = true;
        config.crm.api_key = Some(SecretString::from("pit-1".to_string()));
        config.crm.location_id = Some("loc-1".to_string());
        let pool = leadsign_db::connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
        let state = build_state(&config, pool).expect("state");

        let target = state.publish_target("c-1").expect("target");
        assert_eq!(target.tag, "NDA_Signed");
        assert_eq!(target.field_label, "Signed NDA");
        assert!(state.publish_target("  ").is_none());
    }
}
