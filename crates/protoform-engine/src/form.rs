//! The live form: one binding per field of an open record.
//!
//! A `ProtocolForm` is single-threaded and synchronous: every value change
//! is handled to completion (codec normalization, trigger re-evaluation,
//! formula recomputation, range validation) before control returns to the
//! caller. Exactly one form is live per open record; nothing here is shared
//! across editors.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use protoform_model::{FieldId, Gender, PatientId, ProtocolId, Structure, StudyTypeId, TabId};
use protoform_store::{ProtocolHeader, SaveTarget, StructureSource, ValueStore};

use crate::binding::FieldBinding;
use crate::error::{EngineError, Result};
use crate::evaluator::TriggerRule;

/// Identity of the record being opened.
#[derive(Debug, Clone)]
pub struct RecordRef {
    pub patient_id: PatientId,
    pub study_type_id: StudyTypeId,
    /// Open this specific protocol; when `None`, the most recent draft for
    /// the patient and study type is resumed, or a blank form is produced.
    pub protocol_id: Option<ProtocolId>,
    /// Gender used for reference-range lookup.
    pub gender: Gender,
}

/// Engine behavior switches.
#[derive(Debug, Clone, Default)]
pub struct FormOptions {
    pub trigger_rule: TriggerRule,
}

#[derive(Debug)]
pub struct ProtocolForm {
    structure: Structure,
    gender: Gender,
    pub(crate) trigger_rule: TriggerRule,
    pub(crate) bindings: BTreeMap<FieldId, FieldBinding>,
    /// Trigger field -> fields it hides/reveals.
    pub(crate) hidden_by_trigger: BTreeMap<FieldId, Vec<FieldId>>,
    protocol_id: Option<ProtocolId>,
}

impl ProtocolForm {
    /// Load structure and saved values for a record and settle the form.
    /// `SchemaMissing` is recoverable: the caller renders a "no structure
    /// defined" state instead of a form.
    pub fn open<S>(store: &S, record: &RecordRef, options: FormOptions) -> Result<Self>
    where
        S: StructureSource + ValueStore,
    {
        let structure = store
            .load_structure(record.study_type_id)?
            .ok_or(EngineError::SchemaMissing(record.study_type_id))?;
        let mut form = Self::new(structure, record.gender, options);

        form.protocol_id = match record.protocol_id {
            Some(id) => Some(id),
            None => store.draft_protocol(record.patient_id, record.study_type_id)?,
        };
        if let Some(protocol_id) = form.protocol_id {
            let values = store.load_values(protocol_id)?;
            info!(
                protocol = protocol_id.value(),
                fields = values.len(),
                "open existing protocol"
            );
            form.apply_bulk(&values);
        } else {
            info!(
                patient = record.patient_id.value(),
                study_type = record.study_type_id.value(),
                "open blank protocol"
            );
            form.settle();
        }
        Ok(form)
    }

    /// Materialize bindings for a structure without touching any store.
    pub fn new(structure: Structure, gender: Gender, options: FormOptions) -> Self {
        let mut bindings = BTreeMap::new();
        let mut hidden_by_trigger: BTreeMap<FieldId, Vec<FieldId>> = BTreeMap::new();

        for def in structure.fields() {
            let dictionary = structure.dictionary(def.id).to_vec();
            bindings.insert(def.id, FieldBinding::new(def.clone(), dictionary));
        }
        for def in structure.fields() {
            if !def.is_trigger_target() {
                continue;
            }
            let trigger_id = def.trigger_field_id.expect("trigger target has trigger id");
            // A trigger must point at an existing choice-like field;
            // malformed schema data leaves the field always visible.
            let wired = structure
                .field(trigger_id)
                .is_some_and(|source| source.field_type.has_dictionary());
            if wired {
                hidden_by_trigger.entry(trigger_id).or_default().push(def.id);
                if let Some(binding) = bindings.get_mut(&def.id) {
                    binding.set_visible(false);
                }
            } else {
                warn!(
                    field = def.id.value(),
                    trigger = trigger_id.value(),
                    "trigger references a missing or non-choice field; leaving visible"
                );
            }
        }

        Self {
            structure,
            gender,
            trigger_rule: options.trigger_rule,
            bindings,
            hidden_by_trigger,
            protocol_id: None,
        }
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn protocol_id(&self) -> Option<ProtocolId> {
        self.protocol_id
    }

    pub fn binding(&self, field_id: FieldId) -> Option<&FieldBinding> {
        self.bindings.get(&field_id)
    }

    /// Current canonical value of a field.
    pub fn value(&self, field_id: FieldId) -> Option<&str> {
        self.bindings.get(&field_id).map(FieldBinding::value)
    }

    /// Bindings in render order.
    pub fn bindings(&self) -> impl Iterator<Item = &FieldBinding> {
        self.structure
            .fields()
            .filter_map(|def| self.bindings.get(&def.id))
    }

    /// Bindings of one tab, in render order.
    pub fn tab_bindings(&self, tab_id: TabId) -> impl Iterator<Item = &FieldBinding> {
        self.bindings()
            .filter(move |binding| binding.def().tab_id == tab_id)
    }

    /// Apply one edit and run the reactive recompute chain.
    /// Returns whether the canonical value changed.
    pub fn set_value(&mut self, field_id: FieldId, input: &str) -> bool {
        let Some(binding) = self.bindings.get_mut(&field_id) else {
            return false;
        };
        let changed = binding.apply_input(input);
        let field_type = binding.def().field_type;
        if !changed {
            return false;
        }
        debug!(field = field_id.value(), "value changed");

        if self.hidden_by_trigger.contains_key(&field_id) {
            self.refresh_trigger(field_id);
        }
        if field_type.feeds_formulas() {
            self.recalculate_formulas(None);
        }
        if field_type.is_numeric() {
            self.check_reference(field_id);
        }
        true
    }

    /// Seed many values at once, e.g. from the value store. Reactive
    /// recomputation is suspended while the values are applied through the
    /// codec, then the form settles in a single pass — without this,
    /// seeding n values would re-run every formula n times.
    pub fn apply_bulk(&mut self, values: &BTreeMap<FieldId, String>) {
        for (field_id, value) in values {
            if let Some(binding) = self.bindings.get_mut(field_id) {
                binding.apply_input(value);
            }
        }
        self.settle();
    }

    /// The flattened `(field id -> value)` map, skipping fields currently
    /// hidden. This is the single authoritative representation a save
    /// persists; clearing a trigger retracts the hidden fields' data from
    /// the next save.
    pub fn collect_values(&self) -> BTreeMap<FieldId, String> {
        self.bindings()
            .filter(|binding| binding.visible())
            .map(|binding| (binding.def().id, binding.value().to_string()))
            .collect()
    }

    /// Empty every field of one tab and re-evaluate triggers and formulas
    /// scoped to that tab. Other tabs are left untouched.
    pub fn clear_tab(&mut self, tab_id: TabId) {
        let field_ids: Vec<FieldId> = self
            .bindings
            .values()
            .filter(|binding| binding.def().tab_id == tab_id)
            .map(|binding| binding.def().id)
            .collect();
        for field_id in &field_ids {
            if let Some(binding) = self.bindings.get_mut(field_id) {
                binding.set_canonical(String::new());
                binding.set_out_of_range(None);
            }
        }
        info!(tab = tab_id.value(), fields = field_ids.len(), "clear tab");

        let trigger_ids: Vec<FieldId> = self
            .hidden_by_trigger
            .keys()
            .copied()
            .filter(|trigger_id| {
                self.structure
                    .field(*trigger_id)
                    .is_some_and(|def| def.tab_id == tab_id)
            })
            .collect();
        for trigger_id in trigger_ids {
            self.refresh_trigger(trigger_id);
        }
        self.recalculate_formulas(Some(tab_id));
    }

    /// Names of currently-visible required fields that are empty, in render
    /// order. The caller blocks the save with a message; this is never an
    /// error condition.
    pub fn validate_required(&self) -> Vec<String> {
        self.bindings()
            .filter(|binding| binding.def().required && binding.visible() && binding.is_blank())
            .map(|binding| binding.def().name.clone())
            .collect()
    }

    /// Persist the collected values. A form without a protocol id creates a
    /// new protocol from `header`; on failure the in-memory state is left
    /// untouched so the operator can retry without losing entered data.
    pub fn save(
        &mut self,
        store: &mut impl ValueStore,
        header: &ProtocolHeader,
        finalize: bool,
    ) -> Result<ProtocolId> {
        let values = self.collect_values();
        let target = match self.protocol_id {
            Some(id) => SaveTarget::Existing(id),
            None => SaveTarget::New(header.clone()),
        };
        let protocol_id = store.save_values(target, &values, finalize)?;
        self.protocol_id = Some(protocol_id);
        Ok(protocol_id)
    }
}
