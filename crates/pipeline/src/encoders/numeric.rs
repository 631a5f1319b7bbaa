//! Numeric pass-through encoder.

use crate::schema::EncodingKind;
use crate::traits::Encoder;
use serde::{Deserialize, Serialize};

/// Value emitted for an absent numeric field
pub const NUMERIC_SENTINEL: f64 = 0.0;

/// Copies a numeric value as-is; absent values become [`NUMERIC_SENTINEL`].
///
/// Training rows with an absent required numeric are dropped before fitting,
/// so the sentinel only ever shows up at inference time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericEncoder {
    sentinel: f64,
}

impl NumericEncoder {
    pub fn new() -> Self {
        Self {
            sentinel: NUMERIC_SENTINEL,
        }
    }
}

impl Default for NumericEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<Option<f64>> for NumericEncoder {
    fn kind(&self) -> EncodingKind {
        EncodingKind::Numeric
    }

    fn width(&self) -> usize {
        1
    }

    fn encode_into(&self, input: &Option<f64>, out: &mut Vec<f64>) {
        let value = match input {
            Some(v) if v.is_finite() => *v,
            _ => self.sentinel,
        };
        out.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_through_and_sentinel() {
        let encoder = NumericEncoder::new();
        assert_eq!(encoder.encode(&Some(118.5)), vec![118.5]);
        assert_eq!(encoder.encode(&None), vec![NUMERIC_SENTINEL]);
        assert_eq!(encoder.encode(&Some(f64::NAN)), vec![NUMERIC_SENTINEL]);
    }
}
