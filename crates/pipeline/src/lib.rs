//! Feature pipeline shared by training and inference.
//!
//! This crate provides:
//! - Encoder trait and the four encoder families (numeric, one-hot,
//!   multi-hot, hashed)
//! - FittedEncoderSet: one named, fitted encoder per movie attribute
//! - FeatureSchema: the persisted, versioned column layout
//! - FeatureAssembler: RawSample to fixed-width feature vector
//! - FeatureScaler / TargetScaler: min-max scaling with inverse
//!
//! ## Architecture
//! Samples flow through the pipeline in stages:
//! 1. `EncoderConfig::fit` learns vocabularies on the training samples
//! 2. `FeatureAssembler` encodes every field in canonical order
//! 3. `FeatureScaler` maps each column onto the training range
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{EncoderConfig, FeatureAssembler, FeatureScaler};
//! use std::sync::Arc;
//!
//! let encoders = EncoderConfig::new().with_hash_width(256).fit(&samples)?;
//! let assembler = FeatureAssembler::new(Arc::new(encoders))?;
//! let rows = assembler.assemble_batch(&samples)?;
//! let scaler = FeatureScaler::fit(&rows)?;
//! let scaled = scaler.transform_batch(&rows)?;
//! ```

pub mod assembler;
pub mod encoder_set;
pub mod encoders;
pub mod error;
pub mod scaler;
pub mod schema;
pub mod traits;

// Re-export main types
pub use assembler::FeatureAssembler;
pub use encoder_set::{EncoderConfig, FittedEncoderSet};
pub use error::{EncodingError, Result};
pub use scaler::{FeatureScaler, TargetScaler};
pub use schema::{
    ColumnGroup, EncodingKind, FeatureField, FeatureSchema, FeatureSegment, SCHEMA_VERSION,
};
pub use traits::Encoder;
