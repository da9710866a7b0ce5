//! Persistence boundary for the form engine.
//!
//! Two seams: [`StructureSource`] hands out a study type's structure (or
//! `None` when no structure is defined, so callers can render an empty
//! state), and [`ValueStore`] reads and writes the flattened
//! `(field id -> value)` map per protocol. The engine never talks to a
//! database directly; [`MemoryStore`] backs tests and [`JsonStore`] backs
//! the CLI with a single JSON file.

mod error;
mod json;
mod memory;

pub use error::{Result, StoreError};
pub use json::JsonStore;
pub use memory::MemoryStore;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use protoform_model::{FieldId, PatientId, ProtocolId, Structure, StudyTypeId};

/// Identity of the record a new protocol is created for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolHeader {
    pub patient_id: PatientId,
    pub study_type_id: StudyTypeId,
    pub doctor_id: i64,
    pub device_id: Option<i64>,
    pub institution_id: i64,
}

/// One saved protocol row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolRecord {
    pub id: ProtocolId,
    pub patient_id: PatientId,
    pub study_type_id: StudyTypeId,
    pub doctor_id: i64,
    pub device_id: Option<i64>,
    pub institution_id: i64,
    /// Local timestamp, `YYYY-MM-DD HH:MM:SS`.
    pub created_at: String,
    /// Set once the protocol is finalized; a row with `None` is a draft.
    pub finished_at: Option<String>,
}

impl ProtocolRecord {
    pub fn is_draft(&self) -> bool {
        self.finished_at.is_none()
    }
}

/// Where `save_values` writes: an existing protocol or a freshly created one.
#[derive(Debug, Clone)]
pub enum SaveTarget {
    Existing(ProtocolId),
    New(ProtocolHeader),
}

/// Read access to study type structures.
pub trait StructureSource {
    /// Load the structure for a study type, normalized to render order.
    /// `Ok(None)` means no structure is defined; this is not an error.
    fn load_structure(&self, study_type: StudyTypeId) -> Result<Option<Structure>>;
}

/// Keyed read/write access to persisted protocol values.
pub trait ValueStore {
    /// Most recent unfinished protocol for a patient and study type, if any.
    fn draft_protocol(
        &self,
        patient: PatientId,
        study_type: StudyTypeId,
    ) -> Result<Option<ProtocolId>>;

    /// The saved protocol row, if it exists.
    fn protocol(&self, protocol: ProtocolId) -> Result<Option<ProtocolRecord>>;

    /// Persisted values of a protocol; absent entries mean "empty".
    fn load_values(&self, protocol: ProtocolId) -> Result<BTreeMap<FieldId, String>>;

    /// Persist a collected value map, replacing the protocol's previous set.
    /// Values that are blank after trimming are omitted, not stored as empty
    /// strings. `finalize` closes the protocol so it no longer opens as a
    /// draft.
    fn save_values(
        &mut self,
        target: SaveTarget,
        values: &BTreeMap<FieldId, String>,
        finalize: bool,
    ) -> Result<ProtocolId>;

    /// Mark a protocol finished without touching its values.
    fn finalize_protocol(&mut self, protocol: ProtocolId) -> Result<()>;

    /// Close every draft for a patient and study type; returns how many were
    /// closed. Used before starting a fresh protocol of the same kind.
    fn finalize_open_protocols(
        &mut self,
        patient: PatientId,
        study_type: StudyTypeId,
    ) -> Result<usize>;
}

/// Local timestamp in the store's fixed format.
pub(crate) fn now_stamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
