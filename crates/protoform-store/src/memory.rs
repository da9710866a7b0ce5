//! In-memory store used by tests and as the backing state of [`JsonStore`].

use std::collections::BTreeMap;

use tracing::{debug, info};

use protoform_model::{FieldId, PatientId, ProtocolId, Structure, StudyTypeId};

use crate::error::{Result, StoreError};
use crate::{ProtocolRecord, SaveTarget, StructureSource, ValueStore, now_stamp};

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    structures: BTreeMap<StudyTypeId, Structure>,
    protocols: BTreeMap<ProtocolId, ProtocolRecord>,
    values: BTreeMap<ProtocolId, BTreeMap<FieldId, String>>,
    next_protocol_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_protocol_id: 1,
            ..Self::default()
        }
    }

    /// Register a study type structure. The structure is normalized to
    /// render order on insert.
    pub fn insert_structure(&mut self, mut structure: Structure) {
        structure.normalize();
        self.structures.insert(structure.study_type_id, structure);
    }

    pub(crate) fn structures(&self) -> impl Iterator<Item = &Structure> {
        self.structures.values()
    }

    /// Study types that have a structure registered.
    pub fn study_types(&self) -> Vec<StudyTypeId> {
        self.structures.keys().copied().collect()
    }

    /// All saved protocol rows, ordered by id.
    pub fn protocol_records(&self) -> Vec<ProtocolRecord> {
        self.protocols.values().cloned().collect()
    }

    pub(crate) fn protocols(&self) -> impl Iterator<Item = &ProtocolRecord> {
        self.protocols.values()
    }

    pub(crate) fn values_of(&self, protocol: ProtocolId) -> Option<&BTreeMap<FieldId, String>> {
        self.values.get(&protocol)
    }

    pub(crate) fn restore_protocol(
        &mut self,
        record: ProtocolRecord,
        values: BTreeMap<FieldId, String>,
    ) {
        self.next_protocol_id = self.next_protocol_id.max(record.id.value() + 1);
        self.values.insert(record.id, values);
        self.protocols.insert(record.id, record);
    }

    fn allocate_protocol_id(&mut self) -> ProtocolId {
        let id = ProtocolId(self.next_protocol_id);
        self.next_protocol_id += 1;
        id
    }
}

impl StructureSource for MemoryStore {
    fn load_structure(&self, study_type: StudyTypeId) -> Result<Option<Structure>> {
        let structure = self
            .structures
            .get(&study_type)
            .filter(|structure| !structure.is_empty())
            .cloned();
        debug!(
            study_type = study_type.value(),
            found = structure.is_some(),
            "load structure"
        );
        Ok(structure)
    }
}

impl ValueStore for MemoryStore {
    fn draft_protocol(
        &self,
        patient: PatientId,
        study_type: StudyTypeId,
    ) -> Result<Option<ProtocolId>> {
        let draft = self
            .protocols
            .values()
            .filter(|record| {
                record.patient_id == patient
                    && record.study_type_id == study_type
                    && record.is_draft()
            })
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|record| record.id);
        Ok(draft)
    }

    fn protocol(&self, protocol: ProtocolId) -> Result<Option<ProtocolRecord>> {
        Ok(self.protocols.get(&protocol).cloned())
    }

    fn load_values(&self, protocol: ProtocolId) -> Result<BTreeMap<FieldId, String>> {
        Ok(self.values.get(&protocol).cloned().unwrap_or_default())
    }

    fn save_values(
        &mut self,
        target: SaveTarget,
        values: &BTreeMap<FieldId, String>,
        finalize: bool,
    ) -> Result<ProtocolId> {
        let protocol_id = match target {
            SaveTarget::Existing(id) => {
                let record = self
                    .protocols
                    .get_mut(&id)
                    .ok_or(StoreError::UnknownProtocol(id))?;
                if finalize {
                    record.finished_at = Some(now_stamp());
                }
                id
            }
            SaveTarget::New(header) => {
                let id = self.allocate_protocol_id();
                let now = now_stamp();
                self.protocols.insert(
                    id,
                    ProtocolRecord {
                        id,
                        patient_id: header.patient_id,
                        study_type_id: header.study_type_id,
                        doctor_id: header.doctor_id,
                        device_id: header.device_id,
                        institution_id: header.institution_id,
                        created_at: now.clone(),
                        finished_at: finalize.then_some(now),
                    },
                );
                id
            }
        };

        let stored: BTreeMap<FieldId, String> = values
            .iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(field, value)| (*field, value.clone()))
            .collect();
        info!(
            protocol = protocol_id.value(),
            fields = stored.len(),
            finalize,
            "save protocol values"
        );
        self.values.insert(protocol_id, stored);
        Ok(protocol_id)
    }

    fn finalize_protocol(&mut self, protocol: ProtocolId) -> Result<()> {
        let record = self
            .protocols
            .get_mut(&protocol)
            .ok_or(StoreError::UnknownProtocol(protocol))?;
        record.finished_at = Some(now_stamp());
        Ok(())
    }

    fn finalize_open_protocols(
        &mut self,
        patient: PatientId,
        study_type: StudyTypeId,
    ) -> Result<usize> {
        let now = now_stamp();
        let mut closed = 0;
        for record in self.protocols.values_mut() {
            if record.patient_id == patient
                && record.study_type_id == study_type
                && record.is_draft()
            {
                record.finished_at = Some(now.clone());
                closed += 1;
            }
        }
        Ok(closed)
    }
}
