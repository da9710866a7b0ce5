//! Engine error types.
//!
//! Only two conditions cross the engine boundary: a study type without a
//! structure (recoverable; the caller renders an empty state) and a value
//! store failure (surfaced once; binding state is preserved so entered data
//! survives a retry). Formula problems never surface — the affected formula
//! field is cleared instead.

use thiserror::Error;

use protoform_model::StudyTypeId;
use protoform_store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no structure defined for study type {0}")]
    SchemaMissing(StudyTypeId),
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
