//! Application State
//!
//! Wires the configuration, storage, query engine, model collaborators, chat
//! service and dashboard generator into one handle.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use query_cascade_core::{
    DatasetSchema, NarrativeSynthesizer, QueryClassifier, QuerySynthesizer, ResultChecker,
};
use query_cascade_llm::{
    LlmClassifier, LlmNarrator, LlmProvider, LlmQuerySynthesizer, LlmResultChecker,
    OpenAICompatibleProvider,
};
use query_cascade_pipeline::{Collaborators, Orchestrator};

use crate::models::response::HealthResponse;
use crate::models::settings::AppConfig;
use crate::services::{
    dashboard_key, ChatService, Dashboard, DashboardService, SqliteQueryEngine,
};
use crate::storage::{
    metadata_key, Database, DatasetEntry, MetadataStore, ResultCache, SqliteMetadataStore,
};
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::database_path;

/// The model-backed half of the pipeline collaborators
#[derive(Clone)]
pub struct ModelCollaborators {
    pub classifier: Arc<dyn QueryClassifier>,
    pub synthesizer: Arc<dyn QuerySynthesizer>,
    pub checker: Arc<dyn ResultChecker>,
    pub narrator: Arc<dyn NarrativeSynthesizer>,
    /// Provider behind the collaborators, used for health reporting
    pub provider: Option<Arc<dyn LlmProvider>>,
}

impl ModelCollaborators {
    /// All four collaborators backed by one provider
    pub fn from_provider(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            classifier: Arc::new(LlmClassifier::new(provider.clone())),
            synthesizer: Arc::new(LlmQuerySynthesizer::new(provider.clone())),
            checker: Arc::new(LlmResultChecker::new(provider.clone())),
            narrator: Arc::new(LlmNarrator::new(provider.clone())),
            provider: Some(provider),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }
}

/// Application state shared by the CLI commands
pub struct AppState {
    config: AppConfig,
    database: Database,
    metadata: Arc<SqliteMetadataStore>,
    cache: ResultCache,
    engine: SqliteQueryEngine,
    chat: ChatService,
    dashboards: DashboardService,
    provider: Option<Arc<dyn LlmProvider>>,
}

impl AppState {
    /// Open the configured database and connect the configured provider
    pub fn initialize(config: AppConfig) -> AppResult<Self> {
        config.validate().map_err(AppError::validation)?;

        let db_path = match &config.database_path {
            Some(path) => PathBuf::from(path),
            None => database_path()?,
        };
        let database = Database::open(&db_path)?;

        let provider = OpenAICompatibleProvider::new(config.llm.clone())
            .map_err(|e| AppError::config(e.to_string()))?;
        let models = ModelCollaborators::from_provider(Arc::new(provider));

        Ok(Self::build(config, database, models))
    }

    /// Assemble the state from already-constructed parts
    pub fn build(config: AppConfig, database: Database, models: ModelCollaborators) -> Self {
        let metadata = Arc::new(SqliteMetadataStore::new(database.clone()));
        let cache = if config.cache_enabled {
            ResultCache::new(true, config.cache_ttl_secs, config.cache_max_entries)
        } else {
            ResultCache::disabled()
        };
        let engine = SqliteQueryEngine::new(database.clone());

        let engine_ref = Arc::new(engine.clone());
        let collaborators = Collaborators {
            classifier: models.classifier,
            synthesizer: models.synthesizer,
            validator: engine_ref.clone(),
            executor: engine_ref,
            checker: models.checker,
            narrator: models.narrator,
        };
        let provider = models.provider;
        let orchestrator = Orchestrator::from_collaborators(collaborators, config.pipeline.clone());
        let chat = ChatService::new(
            orchestrator,
            metadata.clone(),
            cache.clone(),
            Duration::from_secs(config.request_timeout_secs),
        );

        Self {
            config,
            database,
            metadata,
            cache,
            dashboards: DashboardService::new(engine.clone()),
            engine,
            chat,
            provider,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn chat(&self) -> &ChatService {
        &self.chat
    }

    pub fn engine(&self) -> &SqliteQueryEngine {
        &self.engine
    }

    /// Profile an existing table and register it as a dataset
    pub fn register_table(&self, table: &str, dataset_id: &str) -> AppResult<DatasetSchema> {
        let schema = self.engine.profile_table(table, dataset_id)?;
        self.metadata.put_schema(&schema)?;
        self.cache.invalidate(&metadata_key(dataset_id));
        self.cache.invalidate(&dashboard_key(dataset_id));
        Ok(schema)
    }

    pub fn list_datasets(&self) -> AppResult<Vec<DatasetEntry>> {
        self.metadata.list_datasets()
    }

    /// Dashboard for a registered dataset, cached with the schema cache TTL.
    ///
    /// `refresh` drops any cached copy and regenerates.
    pub fn dashboard(&self, dataset_id: &str, refresh: bool) -> AppResult<Dashboard> {
        let key = dashboard_key(dataset_id);
        if refresh {
            self.cache.invalidate(&key);
        } else if let Some(cached) = self.cache.get(&key) {
            match serde_json::from_value::<Dashboard>(cached) {
                Ok(dashboard) => {
                    tracing::debug!("Dashboard cache hit for {}", dataset_id);
                    return Ok(dashboard);
                }
                Err(e) => {
                    tracing::warn!(
                        "Discarding unreadable cached dashboard for {}: {}",
                        dataset_id,
                        e
                    );
                    self.cache.invalidate(&key);
                }
            }
        }

        let schema = self.chat.resolve_schema(dataset_id)?;
        let dashboard = self.dashboards.generate(&schema);
        self.cache.insert(key, serde_json::to_value(&dashboard)?);
        Ok(dashboard)
    }

    /// Report component health. With `check_llm` the provider is contacted
    /// once; otherwise only its model and endpoint are reported.
    pub async fn health(&self, check_llm: bool) -> HealthResponse {
        let mut health = HealthResponse {
            database: self.database.is_healthy(),
            config: self.config.validate().is_ok(),
            ..Default::default()
        };

        if let Some(provider) = &self.provider {
            health.llm_model = Some(provider.model().to_string());
            health.llm_endpoint = Some(provider.config().resolved_base_url().to_string());
            if check_llm {
                let reachable = match provider.health_check().await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!("LLM provider {} is unreachable: {}", provider.name(), e);
                        false
                    }
                };
                health.llm = Some(reachable);
            }
        }

        if !health.is_healthy() {
            health.status = "degraded".to_string();
        }
        health
    }
}
