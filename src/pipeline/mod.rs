//! Normalization pipeline: raw provider listing → canonical property.
//!
//! Every fetch method feeds the same four stages: the [`Extractor`] finds a
//! field through a declarative path table, [`coerce`] converts it, the
//! [`RecordBuilder`] enforces required fields, and the [`Deduplicator`]
//! drops listings already seen in the run.

pub mod builder;
pub mod coerce;
pub mod dedup;
pub mod extractor;

pub use builder::RecordBuilder;
pub use dedup::Deduplicator;
pub use extractor::{Extractor, Field, FieldTable, RawValue};
