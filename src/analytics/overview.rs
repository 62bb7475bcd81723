use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analytics::aggregator::StatsAggregator;
use crate::cache::{self, QueryCache};
use crate::error::{AppError, AppResult};
use crate::model::class::{Campus, ClassFilter, FloorFilter};
use crate::model::stats::{DateRange, OverviewResult};

pub const OVERVIEW_NAMESPACE: &str = "overview";

/// Overview filters. Every field is optional; these six fields make up the cache key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewParams {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub campus: Option<Campus>,
    pub floor: Option<String>,
    pub program: Option<String>,
    pub class_id: Option<u64>,
}

impl OverviewParams {
    /// True when any of campus, floor, program or class is set.
    pub fn is_filtered(&self) -> bool {
        self.campus.is_some() || self.floor.is_some() || self.program.is_some() || self.class_id.is_some()
    }

    /// Same filters with `floor` spelled the one way its parsed form prints,
    /// so equivalent spellings share a cache key.
    fn canonical(&self, filter: &ClassFilter) -> Self {
        Self {
            floor: filter.floor.map(|f| f.to_string()),
            ..self.clone()
        }
    }

    fn class_filter(&self) -> AppResult<ClassFilter> {
        let floor = self
            .floor
            .as_deref()
            .map(str::parse::<FloorFilter>)
            .transpose()
            .map_err(AppError::BadRequest)?;

        Ok(ClassFilter {
            campus: self.campus,
            floor,
            program: self.program.clone(),
            class_id: self.class_id,
        })
    }
}

/// Filtered overviews are cheap and interactive; the unfiltered one is the
/// expensive query and is kept longer.
#[derive(Debug, Clone, Copy)]
pub struct TtlPolicy {
    pub filtered: Duration,
    pub full: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            filtered: Duration::from_secs(300),
            full: Duration::from_secs(900),
        }
    }
}

impl TtlPolicy {
    pub fn ttl_for(&self, params: &OverviewParams) -> Duration {
        if params.is_filtered() {
            self.filtered
        } else {
            self.full
        }
    }
}

#[derive(Clone)]
pub struct OverviewService {
    aggregator: StatsAggregator,
    cache: Arc<dyn QueryCache>,
    ttl: TtlPolicy,
}

impl OverviewService {
    pub fn new(aggregator: StatsAggregator, cache: Arc<dyn QueryCache>, ttl: TtlPolicy) -> Self {
        Self {
            aggregator,
            cache,
            ttl,
        }
    }

    /// Cached composite overview. With `use_cache = false` the overview is
    /// recomputed and the cached copy replaced.
    pub async fn get_optimized_overview(
        &self,
        params: &OverviewParams,
        use_cache: bool,
    ) -> AppResult<OverviewResult> {
        let range = DateRange::resolve(params.start_date, params.end_date);
        if range.start > range.end {
            return Err(AppError::BadRequest(
                "startDate cannot be after endDate".to_string(),
            ));
        }
        let filter = params.class_filter()?;
        let key = cache::generate_key(OVERVIEW_NAMESPACE, &params.canonical(&filter))?;
        let ttl = self.ttl.ttl_for(params);

        if !use_cache {
            let overview = self.compute(range, &filter).await?;
            cache::set_json(self.cache.as_ref(), &key, &overview, Some(ttl)).await?;
            info!(key = %key, "Overview recomputed on request");
            return Ok(overview);
        }

        if let Some(hit) = cache::get_json::<OverviewResult>(self.cache.as_ref(), &key).await? {
            debug!(key = %key, "Overview cache hit");
            return Ok(hit);
        }

        debug!(key = %key, ttl_secs = ttl.as_secs(), "Overview cache miss");
        let compute = async move {
            let overview = self.compute(range, &filter).await?;
            serde_json::to_value(overview).map_err(AppError::from)
        }
        .boxed();

        let value = self.cache.get_or_compute(&key, Some(ttl), compute).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn compute(&self, range: DateRange, filter: &ClassFilter) -> AppResult<OverviewResult> {
        let stats = self.aggregator.compute(range, filter).await?;

        Ok(OverviewResult {
            basic_stats: stats.basic_stats,
            campus_breakdown: stats.campus_breakdown,
            floor_breakdown: stats.floor_breakdown,
            program_breakdown: stats.program_breakdown,
            class_breakdown: stats.class_breakdown,
            date_range: range,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheInvalidationHook, MokaQueryCache, WriteEvent};
    use crate::model::attendance::{AttendanceQuery, AttendanceRecord, AttendanceStatus, NewAttendance};
    use crate::model::class::{ClassRecord, Grade};
    use crate::model::role::Role;
    use crate::store::AttendanceRecordStore;
    use crate::store::memory::{MemoryAttendanceStore, MemoryClassCatalog};
    use actix_web::rt::time::sleep;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts reads so tests can tell whether the aggregator ran.
    struct CountingStore {
        inner: MemoryAttendanceStore,
        finds: AtomicUsize,
    }

    #[async_trait]
    impl AttendanceRecordStore for CountingStore {
        async fn find(&self, query: &AttendanceQuery) -> AppResult<Vec<AttendanceRecord>> {
            self.finds.fetch_add(1, Ordering::SeqCst);
            self.inner.find(query).await
        }

        async fn insert(&self, record: NewAttendance) -> AppResult<AttendanceRecord> {
            self.inner.insert(record).await
        }
    }

    /// Reads a snapshot, then holds it before returning.
    struct SlowStore {
        inner: MemoryAttendanceStore,
    }

    #[async_trait]
    impl AttendanceRecordStore for SlowStore {
        async fn find(&self, query: &AttendanceQuery) -> AppResult<Vec<AttendanceRecord>> {
            let rows = self.inner.find(query).await;
            sleep(Duration::from_millis(100)).await;
            rows
        }

        async fn insert(&self, record: NewAttendance) -> AppResult<AttendanceRecord> {
            self.inner.insert(record).await
        }
    }

    struct Fixture {
        store: Arc<CountingStore>,
        cache: Arc<dyn QueryCache>,
        service: OverviewService,
    }

    fn service_over(
        store: Arc<dyn AttendanceRecordStore>,
        ttl: TtlPolicy,
    ) -> (Arc<dyn QueryCache>, OverviewService) {
        let classes = Arc::new(MemoryClassCatalog::with_classes([
            ClassRecord::new(1, "XI-ICS", Campus::Boys, Grade::Eleventh, "ICS"),
            ClassRecord::new(2, "XII-PreMed", Campus::Girls, Grade::Twelfth, "Pre-Medical"),
        ]));
        let cache: Arc<dyn QueryCache> = Arc::new(MokaQueryCache::default());
        let service = OverviewService::new(StatsAggregator::new(store, classes), cache.clone(), ttl);
        (cache, service)
    }

    fn fixture_with(ttl: TtlPolicy) -> Fixture {
        let store = Arc::new(CountingStore {
            inner: MemoryAttendanceStore::new(),
            finds: AtomicUsize::new(0),
        });
        let (cache, service) = service_over(store.clone(), ttl);
        Fixture { store, cache, service }
    }

    fn fixture() -> Fixture {
        fixture_with(TtlPolicy::default())
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    fn present(student_id: u64, class_id: u64) -> NewAttendance {
        NewAttendance {
            student_id,
            class_id,
            date: today(),
            status: AttendanceStatus::Present,
            marked_by: 10,
            marked_by_role: Role::Teacher,
            subject: Some("Physics".into()),
        }
    }

    #[test]
    fn ttl_depends_on_filters() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.ttl_for(&OverviewParams::default()), Duration::from_secs(900));

        let dated = OverviewParams {
            start_date: Some(today()),
            ..Default::default()
        };
        assert_eq!(policy.ttl_for(&dated), Duration::from_secs(900));

        let by_program = OverviewParams {
            program: Some("ICS".into()),
            ..Default::default()
        };
        assert_eq!(policy.ttl_for(&by_program), Duration::from_secs(300));
    }

    #[actix_web::test]
    async fn repeated_reads_hit_the_cache() {
        let fx = fixture();
        fx.store.insert(present(1, 1)).await.unwrap();
        let params = OverviewParams::default();

        let first = fx.service.get_optimized_overview(&params, true).await.unwrap();
        // one read of the records serves every figure
        assert_eq!(fx.store.finds.load(Ordering::SeqCst), 1);

        let second = fx.service.get_optimized_overview(&params, true).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fx.store.finds.load(Ordering::SeqCst), 1);
    }

    #[actix_web::test]
    async fn cached_overview_expires_with_policy_ttl() {
        let fx = fixture_with(TtlPolicy {
            filtered: Duration::from_secs(1),
            full: Duration::from_secs(60),
        });
        let full = OverviewParams::default();
        let boys = OverviewParams {
            campus: Some(Campus::Boys),
            ..Default::default()
        };

        fx.service.get_optimized_overview(&full, true).await.unwrap();
        fx.service.get_optimized_overview(&boys, true).await.unwrap();
        fx.service.get_optimized_overview(&boys, true).await.unwrap();
        assert_eq!(fx.store.finds.load(Ordering::SeqCst), 2);

        sleep(Duration::from_millis(1200)).await;

        fx.service.get_optimized_overview(&full, true).await.unwrap();
        assert_eq!(fx.store.finds.load(Ordering::SeqCst), 2);
        fx.service.get_optimized_overview(&boys, true).await.unwrap();
        assert_eq!(fx.store.finds.load(Ordering::SeqCst), 3);
    }

    #[actix_web::test]
    async fn floor_spellings_share_one_cache_entry() {
        let fx = fixture();
        for floor in ["1st", "1ST", " 1st "] {
            let params = OverviewParams {
                floor: Some(floor.into()),
                ..Default::default()
            };
            fx.service.get_optimized_overview(&params, true).await.unwrap();
        }

        assert_eq!(fx.store.finds.load(Ordering::SeqCst), 1);
        assert_eq!(fx.cache.entry_count().await.unwrap(), 1);
    }

    #[actix_web::test]
    async fn write_during_a_fill_is_seen_by_the_next_read() {
        let store = Arc::new(SlowStore {
            inner: MemoryAttendanceStore::new(),
        });
        let (cache, service) = service_over(store.clone(), TtlPolicy::default());
        let hook = CacheInvalidationHook::flushing(cache);
        let params = OverviewParams::default();

        let read = service.get_optimized_overview(&params, true);
        let write = async {
            sleep(Duration::from_millis(30)).await;
            let record = store.insert(present(1, 1)).await.unwrap();
            hook.after_write(&WriteEvent::from_records([&record])).await.unwrap();
        };
        let (first, ()) = futures::join!(read, write);
        assert_eq!(first.unwrap().basic_stats.total_records, 0);

        let next = service.get_optimized_overview(&params, true).await.unwrap();
        assert_eq!(next.basic_stats.total_records, 1);
        assert_eq!(next.campus_breakdown["boys"].present, 1);
    }

    #[actix_web::test]
    async fn fresh_read_bypasses_and_refreshes_cache() {
        let fx = fixture();
        let params = OverviewParams::default();

        let cached = fx.service.get_optimized_overview(&params, true).await.unwrap();
        assert_eq!(cached.basic_stats.total_records, 0);

        // written behind the cache's back, no invalidation
        fx.store.insert(present(1, 1)).await.unwrap();
        let stale = fx.service.get_optimized_overview(&params, true).await.unwrap();
        assert_eq!(stale.basic_stats.total_records, 0);

        let fresh = fx.service.get_optimized_overview(&params, false).await.unwrap();
        assert_eq!(fresh.basic_stats.total_records, 1);

        let after = fx.service.get_optimized_overview(&params, true).await.unwrap();
        assert_eq!(after, fresh);
    }

    #[actix_web::test]
    async fn marking_a_student_shows_up_in_breakdowns() {
        let fx = fixture();
        let hook = CacheInvalidationHook::flushing(fx.cache.clone());

        // warm the cache before the write
        let params = OverviewParams::default();
        fx.service.get_optimized_overview(&params, true).await.unwrap();

        let record = fx.store.insert(present(1, 1)).await.unwrap();
        hook.after_write(&WriteEvent::from_records([&record])).await.unwrap();

        let overview = fx.service.get_optimized_overview(&params, true).await.unwrap();
        let boys = &overview.campus_breakdown["boys"];
        assert_eq!(boys.total, 1);
        assert_eq!(boys.present, 1);
        assert_eq!(boys.absent, 0);
        assert_eq!(boys.percentage, 100);
        assert_eq!(overview.floor_breakdown["boys"]["1st"].total, 1);
        assert_eq!(overview.program_breakdown["boys"]["ICS"].present, 1);
    }

    #[actix_web::test]
    async fn filters_narrow_class_breakdown_only() {
        let fx = fixture();
        fx.store.insert(present(1, 1)).await.unwrap();
        fx.store.insert(present(2, 2)).await.unwrap();

        let params = OverviewParams {
            campus: Some(Campus::Girls),
            floor: Some("2nd".into()),
            ..Default::default()
        };
        let overview = fx.service.get_optimized_overview(&params, true).await.unwrap();

        assert_eq!(overview.basic_stats.total_records, 2);
        assert_eq!(overview.class_breakdown.keys().copied().collect::<Vec<_>>(), vec![2]);

        let none = OverviewParams {
            program: Some("Commerce".into()),
            ..Default::default()
        };
        let overview = fx.service.get_optimized_overview(&none, true).await.unwrap();
        assert!(overview.class_breakdown.is_empty());
    }

    #[actix_web::test]
    async fn rejects_bad_floor_and_inverted_range() {
        let fx = fixture();

        let bad_floor = OverviewParams {
            floor: Some("roof".into()),
            ..Default::default()
        };
        let err = fx.service.get_optimized_overview(&bad_floor, true).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let inverted = OverviewParams {
            start_date: Some(today()),
            end_date: today().pred_opt(),
            ..Default::default()
        };
        let err = fx.service.get_optimized_overview(&inverted, true).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[actix_web::test]
    async fn date_range_is_echoed() {
        let fx = fixture();
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let params = OverviewParams {
            start_date: Some(start),
            ..Default::default()
        };

        let overview = fx.service.get_optimized_overview(&params, true).await.unwrap();
        assert_eq!(overview.date_range, DateRange { start, end: today() });
    }
}
