//! Single-file JSON store.
//!
//! Holds the whole state (structures, protocol rows, values) in one JSON
//! document and rewrites it after every mutation. Adequate for the data
//! volumes involved (tens of fields per protocol); anything heavier belongs
//! behind its own [`ValueStore`] implementation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use protoform_model::{FieldId, PatientId, ProtocolId, Structure, StudyTypeId};

use crate::error::{Result, StoreError};
use crate::memory::MemoryStore;
use crate::{ProtocolRecord, SaveTarget, StructureSource, ValueStore};

const FILE_SCHEMA: &str = "protoform.store";
const FILE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    schema: String,
    schema_version: u32,
    #[serde(default)]
    structures: Vec<Structure>,
    #[serde(default)]
    protocols: Vec<ProtocolRecord>,
    #[serde(default)]
    values: Vec<StoredValue>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredValue {
    protocol_id: ProtocolId,
    field_id: FieldId,
    value: String,
}

#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonStore {
    /// Open a store file, creating an empty store if the file is absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let inner = if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(|source| StoreError::Io {
                operation: "read",
                path: path.clone(),
                source,
            })?;
            let file: StoreFile =
                serde_json::from_str(&text).map_err(|source| StoreError::InvalidFormat {
                    path: path.clone(),
                    source,
                })?;
            let mut inner = MemoryStore::new();
            for structure in file.structures {
                inner.insert_structure(structure);
            }
            let mut values: BTreeMap<ProtocolId, BTreeMap<FieldId, String>> = BTreeMap::new();
            for stored in file.values {
                values
                    .entry(stored.protocol_id)
                    .or_default()
                    .insert(stored.field_id, stored.value);
            }
            for record in file.protocols {
                let record_values = values.remove(&record.id).unwrap_or_default();
                inner.restore_protocol(record, record_values);
            }
            inner
        } else {
            MemoryStore::new()
        };
        info!(path = %path.display(), "open json store");
        Ok(Self { path, inner })
    }

    /// Register a structure and persist immediately.
    pub fn insert_structure(&mut self, structure: Structure) -> Result<()> {
        self.inner.insert_structure(structure);
        self.flush()
    }

    /// Study types that have a structure registered.
    pub fn study_types(&self) -> Vec<StudyTypeId> {
        self.inner.study_types()
    }

    /// All saved protocol rows, ordered by id.
    pub fn protocol_records(&self) -> Vec<ProtocolRecord> {
        self.inner.protocol_records()
    }

    fn flush(&self) -> Result<()> {
        let mut values = Vec::new();
        for record in self.inner.protocols() {
            if let Some(map) = self.inner.values_of(record.id) {
                for (field_id, value) in map {
                    values.push(StoredValue {
                        protocol_id: record.id,
                        field_id: *field_id,
                        value: value.clone(),
                    });
                }
            }
        }
        let file = StoreFile {
            schema: FILE_SCHEMA.to_string(),
            schema_version: FILE_SCHEMA_VERSION,
            structures: self.inner.structures().cloned().collect(),
            protocols: self.inner.protocols().cloned().collect(),
            values,
        };
        let json = serde_json::to_string_pretty(&file).map_err(|source| {
            StoreError::InvalidFormat {
                path: self.path.clone(),
                source,
            }
        })?;
        write_atomic(&self.path, &format!("{json}\n"))
    }
}

/// Write via a sibling temp file and rename, so a failed write never
/// truncates the previous store contents.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, contents).map_err(|source| StoreError::Io {
        operation: "write",
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| StoreError::Io {
        operation: "rename",
        path: path.to_path_buf(),
        source,
    })
}

impl StructureSource for JsonStore {
    fn load_structure(&self, study_type: StudyTypeId) -> Result<Option<Structure>> {
        self.inner.load_structure(study_type)
    }
}

impl ValueStore for JsonStore {
    fn draft_protocol(
        &self,
        patient: PatientId,
        study_type: StudyTypeId,
    ) -> Result<Option<ProtocolId>> {
        self.inner.draft_protocol(patient, study_type)
    }

    fn protocol(&self, protocol: ProtocolId) -> Result<Option<ProtocolRecord>> {
        self.inner.protocol(protocol)
    }

    fn load_values(&self, protocol: ProtocolId) -> Result<BTreeMap<FieldId, String>> {
        self.inner.load_values(protocol)
    }

    fn save_values(
        &mut self,
        target: SaveTarget,
        values: &BTreeMap<FieldId, String>,
        finalize: bool,
    ) -> Result<ProtocolId> {
        let id = self.inner.save_values(target, values, finalize)?;
        self.flush()?;
        Ok(id)
    }

    fn finalize_protocol(&mut self, protocol: ProtocolId) -> Result<()> {
        self.inner.finalize_protocol(protocol)?;
        self.flush()
    }

    fn finalize_open_protocols(
        &mut self,
        patient: PatientId,
        study_type: StudyTypeId,
    ) -> Result<usize> {
        let closed = self.inner.finalize_open_protocols(patient, study_type)?;
        self.flush()?;
        Ok(closed)
    }
}
