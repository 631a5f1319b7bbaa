//! Training corpus: ordered (sample, target) pairs and the deterministic split.

use crate::types::{HistoricalRecord, RawSample, Revenue};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Seed used for the train/test split unless configured otherwise
pub const DEFAULT_SPLIT_SEED: u64 = 42;

/// Fraction of the corpus held out for validation unless configured otherwise
pub const DEFAULT_TEST_FRACTION: f64 = 0.25;

/// One training example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub sample: RawSample,
    /// Actual opening-weekend revenue
    pub target: Option<Revenue>,
}

impl LabeledSample {
    /// Build a labeled sample from a fetched sample and the historical row
    /// it was resolved from.
    ///
    /// The historical release date replaces the provider's month/day. A
    /// missing opening is carried through as a missing target.
    pub fn from_historical(mut sample: RawSample, record: &HistoricalRecord) -> Self {
        sample.set_release(record.date);
        Self {
            sample,
            target: record.opening,
        }
    }

    fn is_usable(&self) -> bool {
        self.sample.is_complete() && self.target.is_some_and(f64::is_finite)
    }
}

/// Ordered collection of labeled samples
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingCorpus {
    entries: Vec<LabeledSample>,
}

/// Train/test partitions produced by [`TrainingCorpus::split`]
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusSplit {
    /// Indices into the corpus, in shuffled order
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl TrainingCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: LabeledSample) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LabeledSample] {
        &self.entries
    }

    /// All samples, in corpus order
    pub fn samples(&self) -> impl Iterator<Item = &RawSample> {
        self.entries.iter().map(|e| &e.sample)
    }

    /// All targets, in corpus order. Absent targets read as NaN.
    pub fn targets(&self) -> Vec<Revenue> {
        self.entries
            .iter()
            .map(|e| e.target.unwrap_or(f64::NAN))
            .collect()
    }

    /// Remove rows with a missing required field or a missing target.
    ///
    /// Returns the number of rows removed.
    pub fn drop_incomplete(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| {
            let keep = entry.is_usable();
            if !keep {
                debug!(
                    "Dropping sample {} (missing: {:?}, target: {:?})",
                    entry.sample.id,
                    entry.sample.missing_required_fields(),
                    entry.target
                );
            }
            keep
        });
        let dropped = before - self.entries.len();
        info!(
            "Dropped {} incomplete rows, {} remain",
            dropped,
            self.entries.len()
        );
        dropped
    }

    /// Deterministically split the corpus into train and test partitions.
    ///
    /// The corpus indices are shuffled with a PCG generator seeded by `seed`,
    /// the first `ceil(len * test_fraction)` go to test and the rest to train.
    /// The same seed on the same corpus always yields the same partitions.
    pub fn split(&self, seed: u64, test_fraction: f64) -> CorpusSplit {
        let n = self.entries.len();
        let fraction = test_fraction.clamp(0.0, 1.0);
        let mut test_len = (n as f64 * fraction).ceil() as usize;
        // Keep at least one training row when there is anything to train on
        if n > 0 && test_len >= n {
            test_len = n - 1;
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = Pcg64Mcg::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let train = indices.split_off(test_len);
        CorpusSplit {
            train,
            test: indices,
        }
    }
}

impl FromIterator<LabeledSample> for TrainingCorpus {
    fn from_iter<I: IntoIterator<Item = LabeledSample>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn sample(id: u64) -> RawSample {
        RawSample {
            id,
            budget: Some(1_000_000 * id),
            runtime: Some(100.0),
            rating: Some("PG".to_string()),
            month: Some(5),
            day: Some(1),
            ..RawSample::default()
        }
    }

    fn corpus(n: u64) -> TrainingCorpus {
        (1..=n)
            .map(|id| LabeledSample {
                sample: sample(id),
                target: Some(id as f64 * 10.0),
            })
            .collect()
    }

    #[test]
    fn test_split_is_deterministic() {
        let corpus = corpus(40);
        let a = corpus.split(DEFAULT_SPLIT_SEED, DEFAULT_TEST_FRACTION);
        let b = corpus.split(DEFAULT_SPLIT_SEED, DEFAULT_TEST_FRACTION);
        assert_eq!(a, b);
    }

    #[test]
    fn test_split_partitions_are_disjoint_and_complete() {
        let corpus = corpus(41);
        let split = corpus.split(7, 0.25);
        assert_eq!(split.test.len(), 11);
        assert_eq!(split.train.len(), 30);

        let train: HashSet<_> = split.train.iter().copied().collect();
        let test: HashSet<_> = split.test.iter().copied().collect();
        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), 41);
    }

    #[test]
    fn test_different_seed_changes_membership() {
        let corpus = corpus(100);
        let a = corpus.split(1, 0.25);
        let b = corpus.split(2, 0.25);
        assert_ne!(a.test, b.test);
    }

    #[test]
    fn test_drop_incomplete() {
        let mut corpus = corpus(3);
        corpus.push(LabeledSample {
            sample: RawSample::new(99),
            target: Some(1.0),
        });
        corpus.push(LabeledSample {
            sample: sample(100),
            target: None,
        });

        let dropped = corpus.drop_incomplete();
        assert_eq!(dropped, 2);
        assert_eq!(corpus.len(), 3);
    }

    #[test]
    fn test_from_historical_uses_box_office_date() {
        let record = HistoricalRecord {
            title: "X".to_string(),
            studio: "Y".to_string(),
            opening: Some(5_000.0),
            theaters: None,
            date: NaiveDate::from_ymd_opt(2001, 11, 16).unwrap(),
        };
        let labeled = LabeledSample::from_historical(sample(1), &record);
        assert_eq!(labeled.sample.month, Some(11));
        assert_eq!(labeled.sample.day, Some(16));
        assert_eq!(labeled.target, Some(5_000.0));
    }

    #[test]
    fn test_missing_opening_is_dropped_before_fitting() {
        let record = HistoricalRecord {
            title: "Cats".to_string(),
            studio: "Uni".to_string(),
            opening: None,
            theaters: Some(3380),
            date: NaiveDate::from_ymd_opt(2019, 12, 20).unwrap(),
        };
        let mut corpus: TrainingCorpus = vec![
            LabeledSample::from_historical(sample(1), &record),
            LabeledSample {
                sample: sample(2),
                target: Some(10.0),
            },
        ]
        .into_iter()
        .collect();
        assert_eq!(corpus.entries()[0].target, None);

        assert_eq!(corpus.drop_incomplete(), 1);
        assert_eq!(corpus.entries()[0].sample.id, 2);
    }
}
