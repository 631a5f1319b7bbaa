//! # Sources Crate
//!
//! Everything that talks to the metadata provider: title resolution, the
//! rate-limit aware retry loop, batch acquisition and the TMDB client.
//!
//! ## Components
//!
//! ### Provider contract
//! [`MetadataProvider`] is the seam between acquisition and the network.
//! [`TmdbClient`] implements it over HTTP; tests implement it in memory.
//!
//! ### Batch acquisition
//! Two stages over a historical dataset:
//! 1. **Resolve ids**: title + year to provider id, deduplicated by title and
//!    by id, sharded across workers
//! 2. **Fetch metadata**: full document per id, normalized to a `RawSample`
//!
//! Rate limits are retried after `Retry-After + 1s`; other errors are not
//! retried and become drop reasons.
//!
//! ## Example Usage
//!
//! ```ignore
//! use sources::{BatchIngestor, TmdbClient, TmdbConfig, output};
//! use std::sync::Arc;
//!
//! let client = TmdbClient::new(TmdbConfig::from_env()?)?;
//! let ingestor = BatchIngestor::new(Arc::new(client));
//!
//! let ids = ingestor.resolve_ids(&records, 4)?;
//! output::write_resolved(out_dir, &ids)?;
//!
//! let fetched = ingestor.fetch_metadata(&ids.accepted);
//! output::write_fetched(out_dir, &fetched)?;
//! ```

pub mod ingest;
pub mod output;
pub mod provider;
pub mod resolver;
pub mod retry;
pub mod tmdb;

pub use ingest::{
    BatchIngestor, DropReason, FetchedRecord, IngestConfig, IngestContext, IngestStats,
    Partitioned, ResolvedRecord,
};
pub use provider::{MetadataProvider, ProviderError, SearchCandidate};
pub use resolver::{MatchKind, Resolution, TitleResolver};
pub use retry::{
    Attempt, RecordingSleeper, RetryFailure, RetryPolicy, Sleeper, ThreadSleeper, run_with_retry,
};
pub use tmdb::{Normalized, TmdbClient, TmdbConfig, normalize_movie};
