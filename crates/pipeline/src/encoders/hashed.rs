//! Fixed-width hashing encoder for open-vocabulary fields.
//!
//! Crew names, companies and keywords have no natural upper bound on
//! cardinality, and new ones show up with every release. Instead of learning a
//! vocabulary, each value is hashed into one of `n_features` buckets and the
//! bucket counts are emitted. Unseen values are never a problem; they simply
//! share a bucket with whatever else hashes there.

use crate::schema::EncodingKind;
use crate::traits::Encoder;
use serde::{Deserialize, Serialize};

/// Default output width for hashed fields
pub const DEFAULT_HASH_WIDTH: usize = 256;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hashing-trick encoder with a fixed output width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedEncoder {
    n_features: usize,
}

impl HashedEncoder {
    /// Create an encoder emitting `n_features` columns (at least 1)
    pub fn new(n_features: usize) -> Self {
        Self {
            n_features: n_features.max(1),
        }
    }

    /// Fitting only fixes the width; there is nothing to learn.
    pub fn fit(n_features: usize) -> Self {
        Self::new(n_features)
    }

    /// Bucket a value lands in
    pub fn bucket(&self, value: &str) -> usize {
        (stable_hash(value) % self.n_features as u64) as usize
    }
}

impl Default for HashedEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_WIDTH)
    }
}

/// 64-bit FNV-1a over the UTF-8 bytes.
///
/// Must stay identical between the process that trained the model and every
/// process that serves it, so std's randomly keyed hasher is not an option.
fn stable_hash(value: &str) -> u64 {
    value.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

impl Encoder<[String]> for HashedEncoder {
    fn kind(&self) -> EncodingKind {
        EncodingKind::Hashed
    }

    fn width(&self) -> usize {
        self.n_features
    }

    fn encode_into(&self, input: &[String], out: &mut Vec<f64>) {
        let start = out.len();
        out.resize(start + self.n_features, 0.0);
        for value in input {
            out[start + self.bucket(value)] += 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_width_is_fixed() {
        let encoder = HashedEncoder::fit(256);
        assert_eq!(encoder.encode(names(&[]).as_slice()).len(), 256);
        assert_eq!(
            encoder
                .encode(names(&["Jon Favreau", "Someone Never Seen Before"]).as_slice())
                .len(),
            256
        );
    }

    #[test]
    fn test_hash_is_stable() {
        // Reference FNV-1a values
        assert_eq!(stable_hash(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(stable_hash("a"), 0xaf63_dc4c_8601_ec8c);
    }

    #[test]
    fn test_collisions_sum() {
        let encoder = HashedEncoder::fit(1);
        let row = encoder.encode(names(&["A", "B", "C"]).as_slice());
        assert_eq!(row, vec![3.0]);
    }

    #[test]
    fn test_each_value_counts_once_in_its_bucket() {
        let encoder = HashedEncoder::fit(64);
        let input = names(&["Kevin Feige", "Kevin Feige"]);
        let row = encoder.encode(input.as_slice());
        assert_eq!(row[encoder.bucket("Kevin Feige")], 2.0);
        assert_eq!(row.iter().sum::<f64>(), 2.0);
    }

    #[test]
    fn test_zero_width_is_clamped() {
        assert_eq!(HashedEncoder::new(0).width(), 1);
    }
}
