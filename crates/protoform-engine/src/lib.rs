//! Dynamic form engine for schema-driven clinical protocols.
//!
//! Given a study type's structure (tabs, groups, fields, dictionaries) the
//! engine materializes one [`FieldBinding`] per field, keeps trigger-hidden
//! and formula fields consistent as values change, flags out-of-range
//! numeric values against gender-specific reference bands, and round-trips
//! the value map through a [`protoform_store::ValueStore`].

pub mod binding;
pub mod codec;
pub mod error;
mod evaluator;
pub mod form;
pub mod formula;
pub mod range;

pub use binding::FieldBinding;
pub use error::{EngineError, Result};
pub use evaluator::TriggerRule;
pub use form::{FormOptions, ProtocolForm, RecordRef};
