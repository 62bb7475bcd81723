use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::error::AppResult;
use crate::model::attendance::{AttendanceQuery, AttendanceRecord, AttendanceStatus};
use crate::model::class::{ClassFilter, ClassRecord};
use crate::model::stats::{
    BasicStats, BreakdownStats, CampusBreakdown, ClassBreakdown, ClassStats, DateRange,
    NestedBreakdown, percentage,
};
use crate::store::{AttendanceRecordStore, ClassCatalog};

/// Running counts for one group of records.
///
/// Leave statuses count as absent so that present + absent + late always
/// equals the record total.
#[derive(Default)]
struct Tally {
    students: HashSet<u64>,
    present: u64,
    absent: u64,
    late: u64,
    records: u64,
}

impl Tally {
    fn push(&mut self, record: &AttendanceRecord) {
        self.students.insert(record.student_id);
        self.records += 1;
        match record.status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Late => self.late += 1,
            AttendanceStatus::Absent | AttendanceStatus::HalfLeave | AttendanceStatus::FullLeave => {
                self.absent += 1
            }
        }
    }

    fn breakdown(&self) -> BreakdownStats {
        BreakdownStats {
            total: self.students.len() as u64,
            present: self.present,
            absent: self.absent,
            late: self.late,
            total_records: self.records,
            percentage: percentage(self.present, self.records),
        }
    }

    fn basic(&self) -> BasicStats {
        BasicStats {
            total_students: self.students.len() as u64,
            present_students: self.present,
            absent_students: self.absent,
            late_students: self.late,
            total_records: self.records,
            attendance_percentage: percentage(self.present, self.records),
        }
    }
}

pub fn basic_stats(records: &[AttendanceRecord]) -> BasicStats {
    let mut tally = Tally::default();
    for record in records {
        tally.push(record);
    }
    tally.basic()
}

/// Pair each record with its class. Records whose class is unknown are dropped.
fn join<'a>(
    records: &'a [AttendanceRecord],
    classes: &'a HashMap<u64, ClassRecord>,
) -> impl Iterator<Item = (&'a AttendanceRecord, &'a ClassRecord)> + 'a {
    let mut dropped = 0usize;
    let joined: Vec<_> = records
        .iter()
        .filter_map(|r| match classes.get(&r.class_id) {
            Some(class) => Some((r, class)),
            None => {
                dropped += 1;
                None
            }
        })
        .collect();

    if dropped > 0 {
        debug!(dropped, "Records without a matching class left out of breakdown");
    }
    joined.into_iter()
}

pub fn campus_breakdown(
    records: &[AttendanceRecord],
    classes: &HashMap<u64, ClassRecord>,
) -> CampusBreakdown {
    let mut groups: BTreeMap<String, Tally> = BTreeMap::new();
    for (record, class) in join(records, classes) {
        groups
            .entry(class.campus.key().to_string())
            .or_default()
            .push(record);
    }
    groups.into_iter().map(|(k, t)| (k, t.breakdown())).collect()
}

fn nested_breakdown<F>(
    records: &[AttendanceRecord],
    classes: &HashMap<u64, ClassRecord>,
    label: F,
) -> NestedBreakdown
where
    F: Fn(&ClassRecord) -> String,
{
    let mut groups: BTreeMap<String, BTreeMap<String, Tally>> = BTreeMap::new();
    for (record, class) in join(records, classes) {
        groups
            .entry(class.campus.key().to_string())
            .or_default()
            .entry(label(class))
            .or_default()
            .push(record);
    }

    groups
        .into_iter()
        .map(|(campus, inner)| {
            let stats = inner.into_iter().map(|(k, t)| (k, t.breakdown())).collect();
            (campus, stats)
        })
        .collect()
}

/// campus → "1st" / "2nd"
pub fn floor_breakdown(
    records: &[AttendanceRecord],
    classes: &HashMap<u64, ClassRecord>,
) -> NestedBreakdown {
    nested_breakdown(records, classes, |class| class.floor_label().to_string())
}

/// campus → program; programs without records do not appear.
pub fn program_breakdown(
    records: &[AttendanceRecord],
    classes: &HashMap<u64, ClassRecord>,
) -> NestedBreakdown {
    nested_breakdown(records, classes, |class| class.program.clone())
}

/// One entry per candidate class, including classes with no records in range.
pub fn class_breakdown(records: &[AttendanceRecord], candidates: &[ClassRecord]) -> ClassBreakdown {
    let mut tallies: HashMap<u64, Tally> = candidates.iter().map(|c| (c.id, Tally::default())).collect();
    for record in records {
        if let Some(tally) = tallies.get_mut(&record.class_id) {
            tally.push(record);
        }
    }

    candidates
        .iter()
        .map(|class| {
            let stats = tallies
                .get(&class.id)
                .map(Tally::breakdown)
                .unwrap_or_default();
            (
                class.id,
                ClassStats {
                    class_name: class.name.clone(),
                    campus: class.campus,
                    grade: class.grade,
                    program: class.program.clone(),
                    floor: class.floor,
                    stats,
                },
            )
        })
        .collect()
}

/// Classes matching `filter`, ordered by id.
pub fn candidate_classes(classes: &HashMap<u64, ClassRecord>, filter: &ClassFilter) -> Vec<ClassRecord> {
    let mut candidates: Vec<ClassRecord> = classes.values().filter(|c| filter.matches(c)).cloned().collect();
    candidates.sort_by_key(|c| c.id);
    candidates
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateStats {
    pub basic_stats: BasicStats,
    pub campus_breakdown: CampusBreakdown,
    pub floor_breakdown: NestedBreakdown,
    pub program_breakdown: NestedBreakdown,
    pub class_breakdown: ClassBreakdown,
}

/// Reads the record store and class catalog and runs the pure computations above.
#[derive(Clone)]
pub struct StatsAggregator {
    records: Arc<dyn AttendanceRecordStore>,
    classes: Arc<dyn ClassCatalog>,
}

impl StatsAggregator {
    pub fn new(records: Arc<dyn AttendanceRecordStore>, classes: Arc<dyn ClassCatalog>) -> Self {
        Self { records, classes }
    }

    async fn records_in(&self, range: DateRange) -> AppResult<Vec<AttendanceRecord>> {
        self.records
            .find(&AttendanceQuery::in_range(range.start, range.end))
            .await
    }

    async fn class_index(&self) -> AppResult<HashMap<u64, ClassRecord>> {
        let classes = self.classes.all().await?;
        Ok(classes.into_iter().map(|c| (c.id, c)).collect())
    }

    /// Every figure of the overview from one read of the records in range and
    /// one read of the class catalog.
    pub async fn compute(&self, range: DateRange, filter: &ClassFilter) -> AppResult<AggregateStats> {
        let (records, classes) = futures::try_join!(self.records_in(range), self.class_index())?;
        let candidates = candidate_classes(&classes, filter);

        Ok(AggregateStats {
            basic_stats: basic_stats(&records),
            campus_breakdown: campus_breakdown(&records, &classes),
            floor_breakdown: floor_breakdown(&records, &classes),
            program_breakdown: program_breakdown(&records, &classes),
            class_breakdown: class_breakdown(&records, &candidates),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::class::{Campus, Grade};
    use crate::model::role::Role;
    use crate::store::memory::{MemoryAttendanceStore, MemoryClassCatalog};
    use crate::model::attendance::NewAttendance;
    use chrono::{NaiveDate, Utc};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn rec(student_id: u64, class_id: u64, d: u32, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            id: student_id * 100 + d as u64,
            student_id,
            class_id,
            date: day(d),
            status,
            marked_by: 1,
            marked_by_role: Role::Teacher,
            subject: None,
            created_on: Utc::now(),
        }
    }

    fn classes() -> Vec<ClassRecord> {
        vec![
            ClassRecord::new(1, "XI-ICS", Campus::Boys, Grade::Eleventh, "ICS"),
            ClassRecord::new(2, "XII-PreEng", Campus::Boys, Grade::Twelfth, "Pre-Engineering"),
            ClassRecord::new(3, "XI-PreMed", Campus::Girls, Grade::Eleventh, "Pre-Medical"),
        ]
    }

    fn index() -> HashMap<u64, ClassRecord> {
        classes().into_iter().map(|c| (c.id, c)).collect()
    }

    fn sample() -> Vec<AttendanceRecord> {
        use AttendanceStatus::*;
        vec![
            rec(1, 1, 2, Present),
            rec(1, 1, 3, Late),
            rec(2, 1, 2, Absent),
            rec(3, 2, 2, Present),
            rec(4, 3, 2, HalfLeave),
            rec(5, 3, 2, Present),
            rec(6, 99, 2, Present), // unknown class
        ]
    }

    #[test]
    fn zero_records_give_zeroed_stats() {
        assert_eq!(basic_stats(&[]), BasicStats::default());
        assert!(campus_breakdown(&[], &index()).is_empty());
        assert!(floor_breakdown(&[], &index()).is_empty());
    }

    #[test]
    fn basic_stats_partition_records() {
        let stats = basic_stats(&sample());
        assert_eq!(stats.total_records, 7);
        assert_eq!(stats.total_students, 6);
        assert_eq!(stats.present_students, 4);
        assert_eq!(stats.late_students, 1);
        assert_eq!(stats.absent_students, 2);
        assert_eq!(
            stats.present_students + stats.absent_students + stats.late_students,
            stats.total_records
        );
        assert_eq!(stats.attendance_percentage, 57);
    }

    #[test]
    fn campus_breakdown_drops_unmatched_classes() {
        let campus = campus_breakdown(&sample(), &index());
        assert_eq!(campus.len(), 2);

        let boys = &campus["boys"];
        assert_eq!(boys.total, 3);
        assert_eq!(boys.total_records, 4);
        assert_eq!(boys.present, 2);
        assert_eq!(boys.absent, 1);
        assert_eq!(boys.late, 1);
        assert_eq!(boys.percentage, 50);

        let girls = &campus["girls"];
        assert_eq!(girls.total_records, 2);
        assert_eq!(girls.percentage, 50);
    }

    #[test]
    fn floor_breakdown_uses_two_way_labels() {
        let floors = floor_breakdown(&sample(), &index());
        assert_eq!(floors["boys"]["1st"].total_records, 3);
        assert_eq!(floors["boys"]["2nd"].total_records, 1);
        assert_eq!(floors["girls"]["1st"].total, 2);
        assert!(!floors["girls"].contains_key("2nd"));
    }

    #[test]
    fn program_breakdown_has_no_zero_fill() {
        let programs = program_breakdown(&sample(), &index());
        assert_eq!(programs["boys"].len(), 2);
        assert_eq!(programs["boys"]["ICS"].total_records, 3);
        assert_eq!(programs["girls"].keys().collect::<Vec<_>>(), vec!["Pre-Medical"]);
    }

    #[test]
    fn class_breakdown_covers_every_candidate() {
        let candidates = classes();
        let by_class = class_breakdown(&sample()[..3], &candidates);
        assert_eq!(by_class.len(), 3);
        assert_eq!(by_class[&1].stats.total_records, 3);
        assert_eq!(by_class[&1].floor, 1);
        assert_eq!(by_class[&3].stats, BreakdownStats::default());
    }

    async fn seeded() -> StatsAggregator {
        let store = Arc::new(MemoryAttendanceStore::new());
        for r in sample() {
            store
                .insert(NewAttendance {
                    student_id: r.student_id,
                    class_id: r.class_id,
                    date: r.date,
                    status: r.status,
                    marked_by: r.marked_by,
                    marked_by_role: r.marked_by_role,
                    subject: None,
                })
                .await
                .unwrap();
        }
        StatsAggregator::new(store, Arc::new(MemoryClassCatalog::with_classes(classes())))
    }

    #[actix_web::test]
    async fn range_limits_every_computation() {
        let agg = seeded().await;
        let only_third = DateRange { start: day(3), end: day(3) };

        let stats = agg.compute(only_third, &ClassFilter::default()).await.unwrap();
        assert_eq!(stats.basic_stats.total_records, 1);
        assert_eq!(stats.basic_stats.late_students, 1);
        assert_eq!(stats.campus_breakdown["boys"].total_records, 1);
        assert!(!stats.campus_breakdown.contains_key("girls"));
        assert_eq!(stats.floor_breakdown["boys"]["1st"].late, 1);
        assert_eq!(stats.class_breakdown[&1].stats.total_records, 1);
        assert_eq!(stats.class_breakdown[&3].stats, BreakdownStats::default());

        let empty = DateRange { start: day(20), end: day(25) };
        let stats = agg.compute(empty, &ClassFilter::default()).await.unwrap();
        assert_eq!(stats.basic_stats, BasicStats::default());
        assert!(stats.program_breakdown.is_empty());
    }

    #[actix_web::test]
    async fn class_breakdown_applies_filters() {
        let agg = seeded().await;
        let range = DateRange { start: day(1), end: day(31) };

        let girls = ClassFilter {
            campus: Some(Campus::Girls),
            ..Default::default()
        };
        let result = agg.compute(range, &girls).await.unwrap().class_breakdown;
        assert_eq!(result.keys().copied().collect::<Vec<_>>(), vec![3]);
        assert_eq!(result[&3].stats.present, 1);

        let second_floor = ClassFilter {
            floor: Some("2nd".parse().unwrap()),
            ..Default::default()
        };
        let result = agg.compute(range, &second_floor).await.unwrap().class_breakdown;
        assert_eq!(result.keys().copied().collect::<Vec<_>>(), vec![2]);

        let nothing = ClassFilter {
            program: Some("Commerce".into()),
            ..Default::default()
        };
        let stats = agg.compute(range, &nothing).await.unwrap();
        assert!(stats.class_breakdown.is_empty());
        // the class filter never narrows the other figures
        assert_eq!(stats.basic_stats.total_records, 7);
    }
}
