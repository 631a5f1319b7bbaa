//! Feature assembly: RawSample to fixed-width feature vector.
//!
//! The assembler is the single function shared by training and inference. It
//! walks the schema in canonical order and lets each field's encoder append
//! its segment, so a vector built at serving time is laid out exactly like the
//! rows the model was trained on.

use crate::encoder_set::FittedEncoderSet;
use crate::error::{EncodingError, Result};
use crate::schema::FeatureSchema;
use data_loader::RawSample;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Builds feature vectors from samples using a fitted encoder set.
///
/// ## Performance Note
/// Holds no lock and no mutable state. Cloning is an `Arc` bump, and
/// [`assemble_batch`](Self::assemble_batch) encodes rows in parallel with Rayon.
#[derive(Debug, Clone)]
pub struct FeatureAssembler {
    encoders: Arc<FittedEncoderSet>,
    width: usize,
}

impl FeatureAssembler {
    /// Wrap an encoder set, refusing it if its schema no longer matches.
    ///
    /// # Errors
    /// `SchemaMismatch` when the recorded schema and the encoders disagree on
    /// version, order, encoding or width.
    pub fn new(encoders: Arc<FittedEncoderSet>) -> Result<Self> {
        encoders.verify_schema()?;
        let width = encoders.schema().total_width();
        Ok(Self { encoders, width })
    }

    /// Output length of every vector this assembler produces
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.encoders.schema()
    }

    pub fn encoders(&self) -> &Arc<FittedEncoderSet> {
        &self.encoders
    }

    /// Encode one sample.
    ///
    /// Absent fields and unseen categories are absorbed by the encoders;
    /// they never fail and never change the length.
    ///
    /// # Errors
    /// `FeatureMismatch` if an encoder emits a segment of the wrong width.
    pub fn assemble(&self, sample: &RawSample) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(self.width);
        for segment in &self.encoders.schema().segments {
            let start = out.len();
            self.encoders.encode_field(segment.field, sample, &mut out);
            let got = out.len() - start;
            if got != segment.width {
                return Err(EncodingError::FeatureMismatch {
                    expected: segment.width,
                    got,
                });
            }
        }
        debug!("Assembled {} features for sample {}", out.len(), sample.id);
        Ok(out)
    }

    /// Encode many samples in parallel, preserving order
    #[instrument(skip(self, samples), fields(count = samples.len()))]
    pub fn assemble_batch(&self, samples: &[RawSample]) -> Result<Vec<Vec<f64>>> {
        samples
            .par_iter()
            .map(|sample| self.assemble(sample))
            .collect()
    }
}
