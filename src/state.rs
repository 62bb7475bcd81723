use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::analytics::aggregator::StatsAggregator;
use crate::analytics::overview::{OverviewService, TtlPolicy};
use crate::cache::{CacheInvalidationHook, MokaQueryCache, QueryCache};
use crate::config::{Config, StorageBackend};
use crate::db::init_db;
use crate::marking::AttendanceWriter;
use crate::store::memory::{MemoryAttendanceStore, MemoryClassCatalog};
use crate::store::mysql::{MySqlAttendanceStore, MySqlClassCatalog};
use crate::store::{AttendanceRecordStore, ClassCatalog};

/// Shared services handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub records: Arc<dyn AttendanceRecordStore>,
    pub classes: Arc<dyn ClassCatalog>,
    pub cache: Arc<dyn QueryCache>,
    pub overview: OverviewService,
    pub writer: AttendanceWriter,
}

impl AppState {
    pub fn new(
        records: Arc<dyn AttendanceRecordStore>,
        classes: Arc<dyn ClassCatalog>,
        cache: Arc<dyn QueryCache>,
        ttl: TtlPolicy,
    ) -> Self {
        let aggregator = StatsAggregator::new(records.clone(), classes.clone());
        let overview = OverviewService::new(aggregator, cache.clone(), ttl);
        let writer = AttendanceWriter::new(records.clone(), CacheInvalidationHook::flushing(cache.clone()));

        Self {
            records,
            classes,
            cache,
            overview,
            writer,
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        let (records, classes): (Arc<dyn AttendanceRecordStore>, Arc<dyn ClassCatalog>) =
            match config.storage_backend {
                StorageBackend::MySql => {
                    let url = config
                        .database_url
                        .as_deref()
                        .context("DATABASE_URL must be set for the mysql backend")?;
                    let pool = init_db(url).await?;
                    (
                        Arc::new(MySqlAttendanceStore::new(pool.clone())),
                        Arc::new(MySqlClassCatalog::new(pool)),
                    )
                }
                StorageBackend::Memory => {
                    let classes = match &config.class_seed_path {
                        Some(path) => MemoryClassCatalog::from_seed_file(path)?,
                        None => MemoryClassCatalog::new(),
                    };
                    (Arc::new(MemoryAttendanceStore::new()), Arc::new(classes))
                }
            };
        info!(backend = ?config.storage_backend, "Storage ready");

        let cache: Arc<dyn QueryCache> = Arc::new(MokaQueryCache::new(
            config.cache_max_capacity,
            config.cache_default_ttl,
        ));
        let ttl = TtlPolicy {
            filtered: config.overview_filtered_ttl,
            full: config.overview_full_ttl,
        };

        Ok(Self::new(records, classes, cache, ttl))
    }
}
