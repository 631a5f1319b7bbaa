//! Per-attribute encoders.
//!
//! Each encoder turns one attribute of a [`data_loader::RawSample`] into a
//! fixed number of columns:
//! - [`NumericEncoder`]: budget and runtime, copied as-is
//! - [`OneHotEncoder`]: rating, release month and release day
//! - [`MultiHotEncoder`]: genres
//! - [`HashedEncoder`]: crew, studios, keywords and cast

mod hashed;
mod multi_hot;
mod numeric;
mod one_hot;

pub use hashed::{DEFAULT_HASH_WIDTH, HashedEncoder};
pub use multi_hot::MultiHotEncoder;
pub use numeric::{NUMERIC_SENTINEL, NumericEncoder};
pub use one_hot::OneHotEncoder;
