use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::cache::QueryCache;
use crate::error::AppResult;
use crate::model::attendance::AttendanceRecord;

/// Namespaces holding attendance-derived results.
pub const ATTENDANCE_NAMESPACES: [&str; 3] = ["attendance:", "stats:", "overview:"];

/// What a successful write touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteEvent {
    pub class_ids: BTreeSet<u64>,
    pub student_ids: BTreeSet<u64>,
    pub dates: BTreeSet<NaiveDate>,
}

impl WriteEvent {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a AttendanceRecord>) -> Self {
        let mut event = WriteEvent::default();
        for record in records {
            event.class_ids.insert(record.class_id);
            event.student_ids.insert(record.student_id);
            event.dates.insert(record.date);
        }
        event
    }

    pub fn is_empty(&self) -> bool {
        self.student_ids.is_empty()
    }
}

#[async_trait]
pub trait InvalidationStrategy: Send + Sync {
    async fn invalidate(&self, cache: &dyn QueryCache, event: &WriteEvent) -> AppResult<()>;
}

/// Drops whole namespaces on any write, whatever the write touched.
pub struct FlushNamespaces {
    prefixes: Vec<String>,
}

impl FlushNamespaces {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for FlushNamespaces {
    fn default() -> Self {
        Self::new(ATTENDANCE_NAMESPACES)
    }
}

#[async_trait]
impl InvalidationStrategy for FlushNamespaces {
    async fn invalidate(&self, cache: &dyn QueryCache, _event: &WriteEvent) -> AppResult<()> {
        for prefix in &self.prefixes {
            cache.delete_prefix(prefix).await?;
        }
        Ok(())
    }
}

/// Called by write paths once persistence has succeeded.
#[derive(Clone)]
pub struct CacheInvalidationHook {
    cache: Arc<dyn QueryCache>,
    strategy: Arc<dyn InvalidationStrategy>,
}

impl CacheInvalidationHook {
    pub fn new(cache: Arc<dyn QueryCache>, strategy: Arc<dyn InvalidationStrategy>) -> Self {
        Self { cache, strategy }
    }

    pub fn flushing(cache: Arc<dyn QueryCache>) -> Self {
        Self::new(cache, Arc::new(FlushNamespaces::default()))
    }

    pub async fn after_write(&self, event: &WriteEvent) -> AppResult<()> {
        if event.is_empty() {
            return Ok(());
        }

        self.strategy.invalidate(self.cache.as_ref(), event).await?;
        log::debug!(
            "Cache invalidated after write: {} students, {} classes, {} days",
            event.student_ids.len(),
            event.class_ids.len(),
            event.dates.len()
        );
        Ok(())
    }
}
