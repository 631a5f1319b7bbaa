//! Set-of-N encoder for multi-valued categorical fields.

use crate::schema::EncodingKind;
use crate::traits::Encoder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Multi-hot encoder over the union of values seen at fit time.
///
/// Inputs are pre-filtered against the persisted vocabulary before encoding:
/// unknown values are dropped from the set and the remaining ones set their
/// column to 1.0. The vocabulary never grows after fitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiHotEncoder {
    /// Sorted, distinct classes. Position = output column.
    classes: Vec<String>,
}

impl MultiHotEncoder {
    /// Learn the union of all values across all samples
    pub fn fit<'a, I>(samples: I) -> Self
    where
        I: IntoIterator<Item = &'a [String]>,
    {
        let classes: BTreeSet<&String> = samples.into_iter().flatten().collect();
        Self {
            classes: classes.into_iter().cloned().collect(),
        }
    }

    /// The learned vocabulary in column order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Column indices of the values that are in the vocabulary.
    ///
    /// Unknown values are silently dropped; duplicates collapse.
    pub fn known_positions(&self, values: &[String]) -> BTreeSet<usize> {
        let mut positions = BTreeSet::new();
        for value in values {
            match self.classes.binary_search(value) {
                Ok(idx) => {
                    positions.insert(idx);
                }
                Err(_) => debug!("Ignoring value outside vocabulary: {}", value),
            }
        }
        positions
    }

    /// Map an encoded row back to the set of present classes
    pub fn decode(&self, encoded: &[f64]) -> BTreeSet<String> {
        encoded
            .iter()
            .zip(&self.classes)
            .filter(|(v, _)| **v > 0.5)
            .map(|(_, class)| class.clone())
            .collect()
    }
}

impl Encoder<[String]> for MultiHotEncoder {
    fn kind(&self) -> EncodingKind {
        EncodingKind::MultiHot
    }

    fn width(&self) -> usize {
        self.classes.len()
    }

    fn encode_into(&self, input: &[String], out: &mut Vec<f64>) {
        let start = out.len();
        out.resize(start + self.classes.len(), 0.0);
        for idx in self.known_positions(input) {
            out[start + idx] = 1.0;
        }
    }
}
