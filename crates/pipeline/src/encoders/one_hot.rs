//! One-of-N encoder for single-valued categorical fields.

use crate::schema::EncodingKind;
use crate::traits::Encoder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One-hot encoder over a vocabulary learned at fit time.
///
/// ## Algorithm
/// - fit: collect the distinct values, sorted, as the column order
/// - transform: 1.0 in the column of the value, 0.0 elsewhere
/// - a value outside the vocabulary (or an absent value) is the all-zero row
///
/// The vocabulary is frozen after fitting; nothing at transform time can add
/// a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotEncoder<T> {
    /// Sorted, distinct categories. Position = output column.
    categories: Vec<T>,
}

impl<T: Ord + Clone> OneHotEncoder<T> {
    /// Learn the vocabulary from the training values
    pub fn fit<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let distinct: BTreeSet<&T> = values.into_iter().collect();
        Self {
            categories: distinct.into_iter().cloned().collect(),
        }
    }

    /// The learned vocabulary in column order
    pub fn categories(&self) -> &[T] {
        &self.categories
    }

    /// Column index of a category, if it was seen during fitting
    pub fn position(&self, value: &T) -> Option<usize> {
        self.categories.binary_search(value).ok()
    }

    /// Map an encoded row back to its category.
    ///
    /// Returns `None` for the all-zero row.
    pub fn decode(&self, encoded: &[f64]) -> Option<&T> {
        encoded
            .iter()
            .position(|v| *v > 0.5)
            .and_then(|idx| self.categories.get(idx))
    }
}

impl<T> Encoder<Option<T>> for OneHotEncoder<T>
where
    T: Ord + Clone + Send + Sync,
{
    fn kind(&self) -> EncodingKind {
        EncodingKind::OneHot
    }

    fn width(&self) -> usize {
        self.categories.len()
    }

    fn encode_into(&self, input: &Option<T>, out: &mut Vec<f64>) {
        let start = out.len();
        out.resize(start + self.categories.len(), 0.0);
        if let Some(idx) = input.as_ref().and_then(|v| self.position(v)) {
            out[start + idx] = 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratings() -> OneHotEncoder<String> {
        let seen = ["R", "PG-13", "PG", "PG-13", "G"].map(String::from);
        OneHotEncoder::fit(seen.iter())
    }

    #[test]
    fn test_vocabulary_is_sorted_and_distinct() {
        let encoder = ratings();
        assert_eq!(encoder.categories(), &["G", "PG", "PG-13", "R"]);
        assert_eq!(encoder.width(), 4);
    }

    #[test]
    fn test_encode_known_value() {
        let encoder = ratings();
        let row = encoder.encode(&Some("PG-13".to_string()));
        assert_eq!(row, vec![0.0, 0.0, 1.0, 0.0]);
        assert_eq!(encoder.decode(&row).map(String::as_str), Some("PG-13"));
    }

    #[test]
    fn test_unseen_and_absent_values_are_all_zero() {
        let encoder = ratings();
        assert_eq!(encoder.encode(&Some("NC-17".to_string())), vec![0.0; 4]);
        assert_eq!(encoder.encode(&None), vec![0.0; 4]);
        assert_eq!(encoder.decode(&[0.0; 4]), None);
    }

    #[test]
    fn test_numeric_categories() {
        let months = [7u32, 12, 7, 1];
        let encoder = OneHotEncoder::fit(months.iter());
        assert_eq!(encoder.categories(), &[1, 7, 12]);
        assert_eq!(encoder.encode(&Some(12)), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_appends_after_existing_columns() {
        let encoder = ratings();
        let mut out = vec![9.0];
        encoder.encode_into(&Some("G".to_string()), &mut out);
        assert_eq!(out, vec![9.0, 1.0, 0.0, 0.0, 0.0]);
    }
}
