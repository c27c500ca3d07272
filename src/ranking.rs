use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::{future, stream, StreamExt};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::GpaError;
use crate::models::{CohortEntry, Metric, RankStats};
use crate::upstream::GpaSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CohortKey {
    start: u32,
    end: u32,
    metric: Metric,
}

struct CachedCohort {
    created: Instant,
    entries: Arc<[CohortEntry]>,
}

pub struct RankingService {
    source: Arc<dyn GpaSource>,
    level: String,
    concurrency: usize,
    ttl: Duration,
    cache: DashMap<CohortKey, CachedCohort>,
}

impl RankingService {
    pub fn new(
        source: Arc<dyn GpaSource>,
        level: impl Into<String>,
        concurrency: usize,
        ttl: Duration,
    ) -> Self {
        Self {
            source,
            level: level.into(),
            concurrency: concurrency.max(1),
            ttl,
            cache: DashMap::new(),
        }
    }

    pub async fn rank(
        &self,
        start: u32,
        end: u32,
        metric: Metric,
        target: u32,
    ) -> Result<RankStats, GpaError> {
        if start > end {
            return Err(GpaError::InvalidRange { start, end });
        }

        let cohort = self.cohort(start, end, metric).await;

        rank_stats(&cohort, target).ok_or(GpaError::EmptyCohort { start, end })
    }

    /// Cohort for the range sorted by descending metric value, served from
    /// cache while the entry is younger than the configured TTL.
    pub async fn cohort(&self, start: u32, end: u32, metric: Metric) -> Arc<[CohortEntry]> {
        let key = CohortKey { start, end, metric };

        if let Some(entries) = self.cached(&key) {
            debug!(start, end, %metric, "Cohort cache hit");

            return entries;
        }

        debug!(start, end, %metric, "Cohort cache miss");

        let entries: Arc<[CohortEntry]> = self.collect(start, end, metric).await.into();

        // An empty cohort is reported, not remembered.
        if !entries.is_empty() {
            let cached = CachedCohort {
                created: Instant::now(),
                entries: Arc::clone(&entries),
            };

            self.cache.insert(key, cached);
        }

        entries
    }

    fn cached(&self, key: &CohortKey) -> Option<Arc<[CohortEntry]>> {
        let cached = self.cache.get(key)?;

        (cached.created.elapsed() < self.ttl).then(|| Arc::clone(&cached.entries))
    }

    async fn collect(&self, start: u32, end: u32, metric: Metric) -> Vec<CohortEntry> {
        let level = self.level.as_str();
        let field = metric.gpa_field();
        let field = field.as_str();

        let mut entries: Vec<CohortEntry> = stream::iter(start..=end)
            .map(move |id| async move {
                match self.source.fetch_gpa(id, level).await {
                    Ok(summary) => {
                        let value = cohort_value(&summary, field);

                        if value.is_none() {
                            debug!(id, field, "Dropping cohort member without a numeric ratio");
                        }

                        value.map(|metric_value| CohortEntry { id, metric_value })
                    }
                    Err(err) => {
                        debug!(id, error = %err, "Dropping cohort member");

                        None
                    }
                }
            })
            .buffered(self.concurrency)
            .filter_map(future::ready)
            .collect()
            .await;

        entries.sort_by(|a, b| b.metric_value.total_cmp(&a.metric_value));

        info!(
            start,
            end,
            %metric,
            members = entries.len(),
            requested = u64::from(end - start) + 1,
            "Collected cohort"
        );

        entries
    }
}

fn cohort_value(summary: &HashMap<String, String>, field: &str) -> Option<f64> {
    summary
        .get(field)?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

pub fn rank_stats(cohort: &[CohortEntry], target: u32) -> Option<RankStats> {
    let highest = cohort.first()?.metric_value;
    let lowest = cohort.last()?.metric_value;
    let sum: f64 = cohort.iter().map(|entry| entry.metric_value).sum();

    Some(RankStats {
        total_count: cohort.len(),
        rank: cohort
            .iter()
            .position(|entry| entry.id == target)
            .map(|idx| idx + 1),
        highest_gpa: highest,
        lowest_gpa: lowest,
        average_gpa: sum / cohort.len() as f64,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::models::SubjectGroup;

    #[derive(Default)]
    struct FakeGpa {
        totals: Mutex<HashMap<u32, String>>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeGpa {
        fn with(totals: &[(u32, &str)]) -> Arc<Self> {
            let fake = Self::default();
            fake.set(totals);
            Arc::new(fake)
        }

        fn set(&self, totals: &[(u32, &str)]) {
            let mut map = self.totals.lock().unwrap();
            map.clear();
            map.extend(totals.iter().map(|(id, gpa)| (*id, gpa.to_string())));
        }
    }

    #[async_trait]
    impl GpaSource for FakeGpa {
        async fn fetch_gpa(
            &self,
            stnum: u32,
            _level: &str,
        ) -> Result<HashMap<String, String>, GpaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let total = self.totals.lock().unwrap().get(&stnum).cloned();

            total
                .map(|gpa| {
                    HashMap::from([
                        ("totalGPA".to_string(), gpa),
                        ("chemGPA".to_string(), "NaN".to_string()),
                    ])
                })
                .ok_or(GpaError::UpstreamStatus(reqwest::StatusCode::NOT_FOUND))
        }
    }

    fn service(fake: &Arc<FakeGpa>, concurrency: usize) -> RankingService {
        RankingService::new(
            Arc::clone(fake) as Arc<dyn GpaSource>,
            "4",
            concurrency,
            Duration::from_secs(600),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn ranks_target_within_sorted_cohort() {
        let fake = FakeGpa::with(&[(1, "3.00"), (2, "3.50"), (3, "2.50"), (4, "3.80")]);
        let stats = service(&fake, 4).rank(1, 4, Metric::Total, 2).await.unwrap();

        assert_eq!(stats.total_count, 4);
        assert_eq!(stats.rank, Some(2));
        assert_eq!(stats.highest_gpa, 3.8);
        assert_eq!(stats.lowest_gpa, 2.5);
        assert!((stats.average_gpa - 3.2).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_and_non_numeric_members_are_dropped() {
        let fake = FakeGpa::with(&[(10, "3.00"), (11, "NaN"), (13, "abc"), (14, "2.00")]);
        let ranking = service(&fake, 2);

        let stats = ranking.rank(10, 14, Metric::Total, 11).await.unwrap();
        assert_eq!(stats.total_count, 2);
        assert_eq!(stats.rank, None);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn all_failing_cohort_is_an_error() {
        let fake = FakeGpa::with(&[(1, "3.00")]);
        let ranking = service(&fake, 4);

        let err = ranking.rank(20, 25, Metric::Total, 20).await.unwrap_err();
        assert!(matches!(err, GpaError::EmptyCohort { start: 20, end: 25 }));

        let err = ranking
            .rank(1, 1, Metric::Group(SubjectGroup::Chemistry), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, GpaError::EmptyCohort { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn inverted_range_is_rejected() {
        let fake = FakeGpa::with(&[]);
        let err = service(&fake, 4)
            .rank(9, 3, Metric::Total, 5)
            .await
            .unwrap_err();

        assert!(matches!(err, GpaError::InvalidRange { start: 9, end: 3 }));
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ties_keep_identifier_order() {
        let fake = FakeGpa::with(&[(5, "3.00"), (6, "3.50"), (7, "3.00"), (8, "3.00")]);
        let cohort = service(&fake, 3).cohort(5, 8, Metric::Total).await;
        let ids: Vec<u32> = cohort.iter().map(|entry| entry.id).collect();

        assert_eq!(ids, [6, 5, 7, 8]);
    }

    #[tokio::test(start_paused = true)]
    async fn fan_out_respects_concurrency_limit() {
        let pairs: Vec<(u32, String)> = (1..=40).map(|id| (id, format!("{}.00", id % 4))).collect();
        let borrowed: Vec<(u32, &str)> = pairs.iter().map(|(id, gpa)| (*id, gpa.as_str())).collect();
        let fake = FakeGpa::with(&borrowed);

        let stats = service(&fake, 5).rank(1, 40, Metric::Total, 3).await.unwrap();

        assert_eq!(stats.total_count, 40);
        assert!(fake.max_in_flight.load(Ordering::SeqCst) <= 5);
        assert!(fake.max_in_flight.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cached_cohort_is_served_until_ttl_expires() {
        let fake = FakeGpa::with(&[(1, "3.00"), (2, "2.00")]);
        let ranking = service(&fake, 4);

        let first = ranking.rank(1, 2, Metric::Total, 1).await.unwrap();
        assert_eq!(first.rank, Some(1));

        fake.set(&[(1, "1.00"), (2, "2.00")]);
        tokio::time::advance(Duration::from_secs(599)).await;

        let cached = ranking.rank(1, 2, Metric::Total, 1).await.unwrap();
        assert_eq!(cached, first);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 2);

        tokio::time::advance(Duration::from_secs(2)).await;

        let refreshed = ranking.rank(1, 2, Metric::Total, 1).await.unwrap();
        assert_eq!(refreshed.rank, Some(2));
        assert_eq!(refreshed.highest_gpa, 2.0);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_is_keyed_by_range_and_metric() {
        let fake = FakeGpa::with(&[(1, "3.00"), (2, "2.00"), (3, "1.00")]);
        let ranking = service(&fake, 4);

        ranking.rank(1, 2, Metric::Total, 1).await.unwrap();
        ranking.rank(1, 3, Metric::Total, 1).await.unwrap();
        assert_eq!(fake.calls.load(Ordering::SeqCst), 5);

        let _ = ranking
            .rank(1, 2, Metric::Group(SubjectGroup::Chemistry), 1)
            .await;
        assert_eq!(fake.calls.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn stats_of_empty_cohort_are_absent() {
        assert_eq!(rank_stats(&[], 1), None);
    }
}
