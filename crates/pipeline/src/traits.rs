//! Core traits for the feature pipeline.
//!
//! This module defines the Encoder trait implemented by every per-attribute
//! transformer in [`crate::encoders`].

use crate::schema::EncodingKind;

/// A fitted, read-only transformer for one attribute.
///
/// `Input` is the attribute type as stored on the sample, e.g.
/// `Option<String>` for a rating or `[String]` for a genre list.
///
/// ## Design Note
/// - Encoders are only ever obtained fitted (from `fit` or deserialization),
///   so there is no "transform before fit" state to guard against
/// - `Send + Sync` lets one encoder set serve concurrent requests
/// - `encode_into` appends to a shared buffer so the assembler can build a
///   whole feature vector without intermediate allocations
pub trait Encoder<Input: ?Sized>: Send + Sync {
    /// The encoding family, recorded in the feature schema
    fn kind(&self) -> EncodingKind;

    /// Number of columns this encoder emits. Constant after fitting.
    fn width(&self) -> usize;

    /// Append exactly `width()` values for `input` to `out`.
    fn encode_into(&self, input: &Input, out: &mut Vec<f64>);

    /// Encode into a fresh vector
    fn encode(&self, input: &Input) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.width());
        self.encode_into(input, &mut out);
        out
    }
}
