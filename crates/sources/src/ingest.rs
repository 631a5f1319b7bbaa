//! Batch acquisition: resolve historical titles to ids, then fetch metadata.
//!
//! ## Architecture
//! A batch run owns one [`IngestContext`]: progress counters and the seen-title
//! and seen-id sets, all behind a single `Mutex`. Workers only hold the lock
//! for a counter bump or a check-then-insert, never across a provider call.
//!
//! With `workers > 1` the records are cut into contiguous shards and each
//! shard runs serially on a dedicated Rayon pool. Shard outputs are
//! concatenated in shard order, so the output order matches the input.
//! Deduplication across shards is first-writer-wins: which of two duplicate
//! titles in different shards is kept depends on scheduling.

use crate::provider::MetadataProvider;
use crate::resolver::{MatchKind, TitleResolver};
use crate::retry::{
    Attempt, RetryFailure, RetryPolicy, Sleeper, ThreadSleeper, run_with_retry,
};
use crate::tmdb::normalize::normalize_movie;
use anyhow::{Context, Result};
use data_loader::{HistoricalRecord, LabeledSample, RawSample, TmdbId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Default interval between progress log lines
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(5);

// =============================================================================
// Configuration
// =============================================================================

/// Batch acquisition settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Attempts per record during id resolution
    pub max_attempts: u32,
    pub report_interval: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_attempts: crate::retry::BATCH_MAX_ATTEMPTS,
            report_interval: DEFAULT_REPORT_INTERVAL,
        }
    }
}

impl IngestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }
}

// =============================================================================
// Drop reasons and output rows
// =============================================================================

/// Why a record ended up in the rejected partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DropReason {
    /// An earlier record had the same title
    DuplicateTitle(String),
    /// An earlier record resolved to the same id
    DuplicateId { id: TmdbId, title: String },
    /// The provider failed or found nothing
    Lookup(String),
    /// Every allowed attempt was rate limited
    TooManyRetries,
    /// Metadata was fetched but is unusable (e.g. no US release)
    Normalization(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::DuplicateTitle(title) => write!(f, "Duplicate title: {title}"),
            DropReason::DuplicateId { id, title } => {
                write!(f, "Duplicate ID {id} for title {title}")
            }
            DropReason::Lookup(reason) => f.write_str(reason),
            DropReason::TooManyRetries => f.write_str("Too many retries"),
            DropReason::Normalization(issue) => f.write_str(issue),
        }
    }
}

impl From<RetryFailure> for DropReason {
    fn from(failure: RetryFailure) -> Self {
        match failure {
            RetryFailure::Failed(reason) => DropReason::Lookup(reason),
            RetryFailure::TooManyRetries { .. } => DropReason::TooManyRetries,
        }
    }
}

/// A historical record after id resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRecord {
    pub record: HistoricalRecord,
    pub resolved_id: Option<TmdbId>,
    pub match_kind: Option<MatchKind>,
    pub drop_reason: Option<DropReason>,
}

impl ResolvedRecord {
    fn new(record: HistoricalRecord) -> Self {
        Self {
            record,
            resolved_id: None,
            match_kind: None,
            drop_reason: None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.drop_reason.is_none() && self.resolved_id.is_some()
    }
}

/// A resolved record after the metadata fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedRecord {
    pub record: HistoricalRecord,
    pub resolved_id: TmdbId,
    /// Whatever could be normalized, even for rejected records
    pub sample: Option<RawSample>,
    pub drop_reason: Option<DropReason>,
}

impl FetchedRecord {
    pub fn is_accepted(&self) -> bool {
        self.drop_reason.is_none() && self.sample.is_some()
    }

    /// Training example with the historical date and opening applied
    pub fn labeled(&self) -> Option<LabeledSample> {
        self.sample
            .clone()
            .map(|sample| LabeledSample::from_historical(sample, &self.record))
    }
}

/// Output split into accepted and rejected rows, each in input order
#[derive(Debug, Clone, PartialEq)]
pub struct Partitioned<T> {
    pub accepted: Vec<T>,
    pub rejected: Vec<T>,
}

impl<T> Partitioned<T> {
    pub fn from_vec(items: Vec<T>, is_accepted: impl Fn(&T) -> bool) -> Self {
        let (accepted, rejected) = items.into_iter().partition(|item| is_accepted(item));
        Self { accepted, rejected }
    }

    pub fn total(&self) -> usize {
        self.accepted.len() + self.rejected.len()
    }
}

// =============================================================================
// IngestContext
// =============================================================================

struct IngestState {
    processed: usize,
    errors: usize,
    last_report: Instant,
    seen_titles: HashSet<String>,
    seen_ids: HashSet<TmdbId>,
}

/// Snapshot of a batch run's counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub processed: usize,
    pub errors: usize,
    pub titles_seen: usize,
    pub ids_seen: usize,
}

/// Shared coordination state for one batch run.
///
/// Constructed per run and passed to every worker; nothing is global.
pub struct IngestContext {
    total: usize,
    started: Instant,
    report_interval: Duration,
    state: Mutex<IngestState>,
}

impl IngestContext {
    pub fn new(total: usize, report_interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            total,
            started: now,
            report_interval,
            state: Mutex::new(IngestState {
                processed: 0,
                errors: 0,
                last_report: now,
                seen_titles: HashSet::new(),
                seen_ids: HashSet::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, IngestState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim a title. `false` if an earlier record already claimed it.
    pub fn claim_title(&self, title: &str) -> bool {
        let mut state = self.lock();
        if state.seen_titles.contains(title) {
            return false;
        }
        state.seen_titles.insert(title.to_string())
    }

    /// Claim a resolved id. `false` if an earlier record already holds it.
    pub fn claim_id(&self, id: TmdbId) -> bool {
        self.lock().seen_ids.insert(id)
    }

    /// Count one finished record and emit a progress line when due
    pub fn record_processed(&self, failed: bool) {
        let report = {
            let mut state = self.lock();
            state.processed += 1;
            if failed {
                state.errors += 1;
            }
            if state.last_report.elapsed() >= self.report_interval {
                state.last_report = Instant::now();
                Some((state.processed, state.errors))
            } else {
                None
            }
        };

        if let Some((processed, errors)) = report {
            let elapsed = self.started.elapsed().as_secs_f64();
            let rate = if elapsed > 0.0 {
                processed as f64 / elapsed
            } else {
                0.0
            };
            info!(
                "Processed {}/{} in {:.1}s ({:.2}/s) - {} errors",
                processed, self.total, elapsed, rate, errors
            );
        }
    }

    pub fn stats(&self) -> IngestStats {
        let state = self.lock();
        IngestStats {
            processed: state.processed,
            errors: state.errors,
            titles_seen: state.seen_titles.len(),
            ids_seen: state.seen_ids.len(),
        }
    }
}

// =============================================================================
// BatchIngestor
// =============================================================================

/// Drives the two acquisition stages over a historical dataset.
///
/// ## Usage
/// ```ignore
/// let ingestor = BatchIngestor::new(Arc::new(TmdbClient::new(config)?));
/// let ids = ingestor.resolve_ids(&records, 4)?;
/// let fetched = ingestor.fetch_metadata(&ids.accepted);
/// ```
pub struct BatchIngestor {
    provider: Arc<dyn MetadataProvider>,
    sleeper: Arc<dyn Sleeper>,
    config: IngestConfig,
}

impl BatchIngestor {
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self {
            provider,
            sleeper: Arc::new(ThreadSleeper),
            config: IngestConfig::default(),
        }
    }

    /// Replace the sleeper (builder pattern)
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_config(mut self, config: IngestConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve every record's title to an id.
    ///
    /// `workers <= 1` runs serially on the calling thread.
    ///
    /// # Errors
    /// Only if the worker pool cannot be built. Per-record failures are
    /// recorded as drop reasons.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub fn resolve_ids(
        &self,
        records: &[HistoricalRecord],
        workers: usize,
    ) -> Result<Partitioned<ResolvedRecord>> {
        let ctx = IngestContext::new(records.len(), self.config.report_interval);

        let resolved: Vec<ResolvedRecord> = if workers <= 1 || records.len() <= 1 {
            records.iter().map(|r| self.resolve_one(&ctx, r)).collect()
        } else {
            let shard_size = records.len().div_ceil(workers);
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("ingest-{i}"))
                .build()
                .context("Building ingest worker pool")?;
            debug!(
                "Resolving {} records on {} workers, {} per shard",
                records.len(),
                workers,
                shard_size
            );
            let shards: Vec<Vec<ResolvedRecord>> = pool.install(|| {
                records
                    .par_chunks(shard_size)
                    .map(|shard| shard.iter().map(|r| self.resolve_one(&ctx, r)).collect())
                    .collect()
            });
            shards.into_iter().flatten().collect()
        };

        let stats = ctx.stats();
        let out = Partitioned::from_vec(resolved, ResolvedRecord::is_accepted);
        info!(
            "Resolved ids: {} accepted, {} rejected ({} processed)",
            out.accepted.len(),
            out.rejected.len(),
            stats.processed
        );
        Ok(out)
    }

    fn resolve_one(&self, ctx: &IngestContext, record: &HistoricalRecord) -> ResolvedRecord {
        let mut out = ResolvedRecord::new(record.clone());

        if !ctx.claim_title(&record.title) {
            out.drop_reason = Some(DropReason::DuplicateTitle(record.title.clone()));
        } else {
            let resolver = TitleResolver::new(self.provider.as_ref());
            let policy = RetryPolicy::Bounded(self.config.max_attempts);
            let year = Some(record.year());
            match run_with_retry(policy, self.sleeper.as_ref(), &record.title, || {
                Attempt::from(resolver.resolve(&record.title, year))
            }) {
                Ok(resolution) => {
                    out.resolved_id = Some(resolution.id);
                    out.match_kind = Some(resolution.kind);
                    if !ctx.claim_id(resolution.id) {
                        out.drop_reason = Some(DropReason::DuplicateId {
                            id: resolution.id,
                            title: record.title.clone(),
                        });
                    }
                }
                Err(failure) => out.drop_reason = Some(failure.into()),
            }
        }

        if let Some(reason) = &out.drop_reason {
            warn!("{}: {}", record.title, reason);
        }
        ctx.record_processed(out.drop_reason.is_some());
        out
    }

    /// Fetch and normalize metadata for every accepted record.
    ///
    /// Rate limits are retried without bound. Fetch failures and
    /// normalization issues become drop reasons; a sample that normalized
    /// with issues is still attached to its rejected row.
    #[instrument(skip(self, resolved), fields(records = resolved.len()))]
    pub fn fetch_metadata(&self, resolved: &[ResolvedRecord]) -> Partitioned<FetchedRecord> {
        let ctx = IngestContext::new(resolved.len(), self.config.report_interval);
        let fetched: Vec<FetchedRecord> = resolved
            .iter()
            .filter_map(|r| r.resolved_id.map(|id| (r, id)))
            .map(|(r, id)| {
                let out = self.fetch_one(&r.record, id);
                ctx.record_processed(out.drop_reason.is_some());
                out
            })
            .collect();

        let out = Partitioned::from_vec(fetched, FetchedRecord::is_accepted);
        info!(
            "Fetched metadata: {} accepted, {} rejected",
            out.accepted.len(),
            out.rejected.len()
        );
        out
    }

    fn fetch_one(&self, record: &HistoricalRecord, id: TmdbId) -> FetchedRecord {
        let what = format!("fetch {id}");
        let fetched = run_with_retry(RetryPolicy::Unbounded, self.sleeper.as_ref(), &what, || {
            Attempt::from(self.provider.fetch(id))
        });

        let (sample, drop_reason) = match fetched {
            Ok(json) => {
                let normalized = normalize_movie(id, &json);
                let reason = normalized.issue().map(DropReason::Normalization);
                (Some(normalized.sample), reason)
            }
            Err(failure) => (None, Some(failure.into())),
        };
        if let Some(reason) = &drop_reason {
            warn!("{} ({}): {}", record.title, id, reason);
        }
        FetchedRecord {
            record: record.clone(),
            resolved_id: id,
            sample,
            drop_reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderError, SearchCandidate};
    use crate::retry::RecordingSleeper;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory provider: every title resolves to a fixed id. The first
    /// `limit_first` search calls answer 429 with `Retry-After: 3`.
    struct MockProvider {
        ids: HashMap<String, TmdbId>,
        limit_first: usize,
        calls: AtomicUsize,
    }

    impl MockProvider {
        fn new(pairs: &[(&str, TmdbId)]) -> Self {
            Self {
                ids: pairs.iter().map(|(t, id)| (t.to_string(), *id)).collect(),
                limit_first: 0,
                calls: AtomicUsize::new(0),
            }
        }

        fn rate_limit_first(mut self, n: usize) -> Self {
            self.limit_first = n;
            self
        }
    }

    impl MetadataProvider for MockProvider {
        fn search(
            &self,
            title: &str,
            _year: Option<i32>,
        ) -> crate::provider::Result<Vec<SearchCandidate>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.limit_first {
                return Err(ProviderError::RateLimited {
                    retry_after: Duration::from_secs(3),
                });
            }
            Ok(self
                .ids
                .get(title)
                .map(|id| SearchCandidate {
                    id: *id,
                    title: title.to_string(),
                    release_date: Some("2019-07-12".to_string()),
                    overview: None,
                })
                .into_iter()
                .collect())
        }

        fn fetch(&self, id: TmdbId) -> crate::provider::Result<serde_json::Value> {
            if id == 404 {
                return Err(ProviderError::NotFound("404 Not Found".into()));
            }
            let countries = if id == 7 {
                json!([{"iso_3166_1": "GB", "certification": "12A", "release_date": "2019-07-19"}])
            } else {
                json!([{"iso_3166_1": "US", "certification": "PG", "release_date": "2019-07-12"}])
            };
            Ok(json!({
                "id": id,
                "title": format!("Movie {id}"),
                "release_date": "2019-07-12",
                "budget": 1000,
                "runtime": 100,
                "genres": [{"name": "Drama"}],
                "releases": {"countries": countries},
            }))
        }

        fn upcoming(&self) -> crate::provider::Result<Vec<serde_json::Value>> {
            Ok(Vec::new())
        }
    }

    fn record(title: &str) -> HistoricalRecord {
        HistoricalRecord {
            title: title.to_string(),
            studio: "BV".to_string(),
            opening: Some(1_000_000.0),
            theaters: Some(3000),
            date: NaiveDate::from_ymd_opt(2019, 7, 19).unwrap(),
        }
    }

    fn ingestor(provider: MockProvider, sleeper: Arc<RecordingSleeper>) -> BatchIngestor {
        BatchIngestor::new(Arc::new(provider)).with_sleeper(sleeper)
    }

    #[test]
    fn test_duplicate_title_rejected() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let ingest = ingestor(MockProvider::new(&[("Aladdin", 420817)]), sleeper);
        let out = ingest
            .resolve_ids(&[record("Aladdin"), record("Aladdin")], 1)
            .unwrap();

        assert_eq!(out.accepted.len(), 1);
        assert_eq!(out.rejected.len(), 1);
        let reason = out.rejected[0].drop_reason.as_ref().unwrap();
        assert_eq!(reason.to_string(), "Duplicate title: Aladdin");
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let provider = MockProvider::new(&[("Frozen II", 330457), ("Frozen 2", 330457)]);
        let out = ingestor(provider, sleeper)
            .resolve_ids(&[record("Frozen II"), record("Frozen 2")], 1)
            .unwrap();

        assert_eq!(out.accepted.len(), 1);
        assert_eq!(out.rejected[0].resolved_id, Some(330457));
        assert_eq!(
            out.rejected[0].drop_reason.as_ref().unwrap().to_string(),
            "Duplicate ID 330457 for title Frozen 2"
        );
    }

    #[test]
    fn test_rate_limit_then_success() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let provider = MockProvider::new(&[("Toy Story 4", 301528)]).rate_limit_first(1);
        let ingest = ingestor(provider, sleeper.clone());
        let ctx = IngestContext::new(1, DEFAULT_REPORT_INTERVAL);

        let out = ingest.resolve_one(&ctx, &record("Toy Story 4"));
        assert_eq!(out.resolved_id, Some(301528));
        assert!(out.drop_reason.is_none());

        let sleeps = sleeper.sleeps();
        assert_eq!(sleeps.len(), 1);
        assert!(sleeps[0] >= Duration::from_secs(4));

        // The rate-limited attempt left the seen sets as a single success would
        let stats = ctx.stats();
        assert_eq!(stats.titles_seen, 1);
        assert_eq!(stats.ids_seen, 1);
        assert_eq!(stats.errors, 0);
    }

    #[test]
    fn test_too_many_retries() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let provider = MockProvider::new(&[("Joker", 475557)]).rate_limit_first(100);
        let out = ingestor(provider, sleeper.clone())
            .resolve_ids(&[record("Joker")], 1)
            .unwrap();

        assert_eq!(out.rejected.len(), 1);
        assert_eq!(
            out.rejected[0].drop_reason,
            Some(DropReason::TooManyRetries)
        );
        assert_eq!(sleeper.sleeps().len(), 4);
    }

    #[test]
    fn test_not_found_is_lookup_failure() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let out = ingestor(MockProvider::new(&[]), sleeper)
            .resolve_ids(&[record("Nobody Knows")], 1)
            .unwrap();
        assert!(matches!(
            out.rejected[0].drop_reason,
            Some(DropReason::Lookup(_))
        ));
    }

    #[test]
    fn test_sharded_output_keeps_input_order() {
        let titles: Vec<String> = (0..20).map(|i| format!("Movie {i}")).collect();
        let pairs: Vec<(&str, TmdbId)> = titles
            .iter()
            .enumerate()
            .map(|(i, t)| (t.as_str(), i as TmdbId + 1))
            .collect();
        let records: Vec<HistoricalRecord> = titles.iter().map(|t| record(t)).collect();

        let sleeper = Arc::new(RecordingSleeper::new());
        let out = ingestor(MockProvider::new(&pairs), sleeper)
            .resolve_ids(&records, 4)
            .unwrap();

        assert_eq!(out.accepted.len(), 20);
        let ids: Vec<TmdbId> = out.accepted.iter().filter_map(|r| r.resolved_id).collect();
        assert_eq!(ids, (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn test_fetch_partitions_by_normalization() {
        let sleeper = Arc::new(RecordingSleeper::new());
        let ingest = ingestor(MockProvider::new(&[]), sleeper);
        let resolved: Vec<ResolvedRecord> = [(1, "A"), (7, "B"), (404, "C")]
            .into_iter()
            .map(|(id, title)| ResolvedRecord {
                record: record(title),
                resolved_id: Some(id),
                match_kind: Some(MatchKind::Single),
                drop_reason: None,
            })
            .collect();

        let out = ingest.fetch_metadata(&resolved);
        assert_eq!(out.accepted.len(), 1);
        assert_eq!(out.rejected.len(), 2);

        let no_us = &out.rejected[0];
        assert_eq!(no_us.resolved_id, 7);
        assert!(no_us.sample.is_some());
        assert_eq!(
            no_us.drop_reason.as_ref().unwrap().to_string(),
            "No US release for TMDB ID 7"
        );
        assert!(out.rejected[1].sample.is_none());

        // Historical date overrides the provider's release day
        let labeled = out.accepted[0].labeled().unwrap();
        assert_eq!(labeled.sample.day, Some(19));
        assert_eq!(labeled.target, Some(1_000_000.0));
    }

    #[test]
    fn test_drop_reason_display() {
        assert_eq!(DropReason::TooManyRetries.to_string(), "Too many retries");
        assert_eq!(
            DropReason::from(RetryFailure::Failed("boom".into())),
            DropReason::Lookup("boom".into())
        );
    }
}
