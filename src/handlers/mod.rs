use std::sync::Arc;

use crate::{
    config::Config,
    database::{QuotaLevelCatalog, QuotaRecordStore},
    errors::{AppError, Result},
    services::{
        compression::CompressionEngine, metrics::MetricsService,
        plan_resolver::PlanTierResolver, quota_checker::QuotaChecker,
    },
};

pub mod compress;
pub mod health;
pub mod metrics;
pub mod quota;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub catalog: Arc<dyn QuotaLevelCatalog>,
    pub checker: Arc<QuotaChecker>,
    pub engine: Arc<CompressionEngine>,
    pub metrics: Arc<MetricsService>,
}

impl AppState {
    /// Wires the services around a store that serves both the catalog and the
    /// per-subject records.
    pub async fn new<S>(config: Config, store: Arc<S>, engine: CompressionEngine) -> Result<Self>
    where
        S: QuotaLevelCatalog + QuotaRecordStore + 'static,
    {
        let catalog: Arc<dyn QuotaLevelCatalog> = store.clone();
        let records: Arc<dyn QuotaRecordStore> = store;

        let resolver = PlanTierResolver::load(catalog.as_ref(), &config.default_tier).await?;
        if catalog.find_active(resolver.default_tier()).await?.is_none() {
            tracing::warn!(
                "Default tier '{}' has no active quota level; unknown plans will fail",
                resolver.default_tier()
            );
        }

        let metrics = MetricsService::new()
            .map_err(|e| AppError::Internal(anyhow::Error::from(e)))?;

        Ok(Self {
            checker: Arc::new(QuotaChecker::new(catalog.clone(), records, resolver)),
            catalog,
            engine: Arc::new(engine),
            metrics: Arc::new(metrics),
            config,
        })
    }
}
