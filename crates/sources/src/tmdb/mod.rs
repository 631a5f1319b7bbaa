//! TMDB implementation of [`MetadataProvider`](crate::provider::MetadataProvider).
//!
//! - **client**: blocking HTTP client and its configuration
//! - **normalize**: TMDB movie document to `RawSample`

pub mod client;
pub mod normalize;

pub use client::{TmdbClient, TmdbConfig};
pub use normalize::{Normalized, normalize_movie};
