//! Form/store integration: drafts, saves, retraction of hidden values, and
//! failure recovery.

use std::collections::BTreeMap;

use protoform_engine::{EngineError, FormOptions, ProtocolForm, RecordRef};
use protoform_model::{
    FieldDef, FieldId, FieldType, Gender, Group, GroupId, Structure, StudyTypeId, Tab, TabId,
};
use protoform_store::{MemoryStore, ProtocolHeader, SaveTarget, ValueStore};

const WEIGHT: FieldId = FieldId(1);
const CONTRAST: FieldId = FieldId(2);
const CONTRAST_DOSE: FieldId = FieldId(3);

fn fixture() -> Structure {
    let tab = TabId(1);
    let group = GroupId(1);
    let field = |id: FieldId, name: &str, ty: FieldType| FieldDef {
        id,
        group_id: group,
        tab_id: tab,
        name: name.to_string(),
        field_type: ty,
        column_slot: 1,
        display_order: id.value() as u32,
        precision: Some(1),
        ref_male_min: None,
        ref_male_max: None,
        ref_female_min: None,
        ref_female_max: None,
        formula: None,
        required: false,
        height: 1,
        width: 20,
        hidden_by_default: false,
        trigger_field_id: None,
        trigger_value: None,
    };

    let weight = field(WEIGHT, "Weight", FieldType::Number);
    let contrast = field(CONTRAST, "Contrast", FieldType::Choice);
    let mut dose = field(CONTRAST_DOSE, "Contrast dose", FieldType::Number);
    dose.hidden_by_default = true;
    dose.trigger_field_id = Some(CONTRAST);

    Structure {
        study_type_id: StudyTypeId(7),
        tabs: vec![Tab {
            id: tab,
            name: "Exam".to_string(),
            display_order: 1,
            groups: vec![Group {
                id: group,
                name: "Main".to_string(),
                display_order: 1,
                expanded_by_default: true,
                fields: vec![weight, contrast, dose],
            }],
        }],
        dictionaries: BTreeMap::from([(
            CONTRAST,
            vec!["none".to_string(), "A".to_string(), "B".to_string()],
        )]),
    }
}

fn store_with_fixture() -> MemoryStore {
    let mut store = MemoryStore::new();
    store.insert_structure(fixture());
    store
}

fn record() -> RecordRef {
    RecordRef {
        patient_id: 42.into(),
        study_type_id: StudyTypeId(7),
        protocol_id: None,
        gender: Gender::Male,
    }
}

fn header() -> ProtocolHeader {
    ProtocolHeader {
        patient_id: 42.into(),
        study_type_id: StudyTypeId(7),
        doctor_id: 5,
        device_id: None,
        institution_id: 1,
    }
}

#[test]
fn missing_structure_is_a_recoverable_error() {
    let store = MemoryStore::new();
    let err = ProtocolForm::open(&store, &record(), FormOptions::default()).unwrap_err();
    assert!(matches!(err, EngineError::SchemaMissing(StudyTypeId(7))));
}

#[test]
fn first_save_creates_a_draft_that_reopens() {
    let mut store = store_with_fixture();
    let mut form = ProtocolForm::open(&store, &record(), FormOptions::default()).unwrap();
    assert_eq!(form.protocol_id(), None);

    form.set_value(WEIGHT, "70,5");
    let protocol_id = form.save(&mut store, &header(), false).unwrap();
    assert_eq!(form.protocol_id(), Some(protocol_id));
    assert!(store.protocol(protocol_id).unwrap().unwrap().is_draft());

    // Opening without a protocol id resumes the draft.
    let reopened = ProtocolForm::open(&store, &record(), FormOptions::default()).unwrap();
    assert_eq!(reopened.protocol_id(), Some(protocol_id));
    assert_eq!(reopened.value(WEIGHT), Some("70,5"));
}

#[test]
fn collected_values_survive_a_save_and_reload() {
    let mut store = store_with_fixture();
    let mut form = ProtocolForm::open(&store, &record(), FormOptions::default()).unwrap();
    form.set_value(WEIGHT, "70,5");
    form.set_value(CONTRAST, "A");
    form.set_value(CONTRAST_DOSE, "12");
    let collected = form.collect_values();
    form.save(&mut store, &header(), false).unwrap();

    let reopened = ProtocolForm::open(&store, &record(), FormOptions::default()).unwrap();
    assert_eq!(reopened.collect_values(), collected);
}

#[test]
fn rehidden_values_are_retracted_by_the_next_save() {
    let mut store = store_with_fixture();
    let mut form = ProtocolForm::open(&store, &record(), FormOptions::default()).unwrap();
    form.set_value(CONTRAST, "A");
    form.set_value(CONTRAST_DOSE, "12");
    let protocol_id = form.save(&mut store, &header(), false).unwrap();
    assert!(
        store
            .load_values(protocol_id)
            .unwrap()
            .contains_key(&CONTRAST_DOSE)
    );

    // Flipping the trigger back hides the dose; the save drops it.
    form.set_value(CONTRAST, "none");
    form.save(&mut store, &header(), false).unwrap();
    assert!(
        !store
            .load_values(protocol_id)
            .unwrap()
            .contains_key(&CONTRAST_DOSE)
    );

    // After a reload the retracted value is gone even once visible again.
    let mut reopened = ProtocolForm::open(&store, &record(), FormOptions::default()).unwrap();
    reopened.set_value(CONTRAST, "B");
    assert_eq!(reopened.value(CONTRAST_DOSE), Some(""));
}

#[test]
fn finalized_protocols_do_not_reopen_as_drafts() {
    let mut store = store_with_fixture();
    let mut form = ProtocolForm::open(&store, &record(), FormOptions::default()).unwrap();
    form.set_value(WEIGHT, "70,5");
    let protocol_id = form.save(&mut store, &header(), true).unwrap();
    assert!(!store.protocol(protocol_id).unwrap().unwrap().is_draft());

    let fresh = ProtocolForm::open(&store, &record(), FormOptions::default()).unwrap();
    assert_eq!(fresh.protocol_id(), None);
    assert_eq!(fresh.value(WEIGHT), Some(""));
}

/// Store whose writes always fail; reads delegate to an inner store.
struct FailingStore(MemoryStore);

impl ValueStore for FailingStore {
    fn draft_protocol(
        &self,
        patient: protoform_model::PatientId,
        study_type: StudyTypeId,
    ) -> protoform_store::Result<Option<protoform_model::ProtocolId>> {
        self.0.draft_protocol(patient, study_type)
    }

    fn protocol(
        &self,
        protocol: protoform_model::ProtocolId,
    ) -> protoform_store::Result<Option<protoform_store::ProtocolRecord>> {
        self.0.protocol(protocol)
    }

    fn load_values(
        &self,
        protocol: protoform_model::ProtocolId,
    ) -> protoform_store::Result<BTreeMap<FieldId, String>> {
        self.0.load_values(protocol)
    }

    fn save_values(
        &mut self,
        _target: SaveTarget,
        _values: &BTreeMap<FieldId, String>,
        _finalize: bool,
    ) -> protoform_store::Result<protoform_model::ProtocolId> {
        Err(protoform_store::StoreError::Message(
            "write refused".to_string(),
        ))
    }

    fn finalize_protocol(
        &mut self,
        _protocol: protoform_model::ProtocolId,
    ) -> protoform_store::Result<()> {
        Err(protoform_store::StoreError::Message(
            "write refused".to_string(),
        ))
    }

    fn finalize_open_protocols(
        &mut self,
        _patient: protoform_model::PatientId,
        _study_type: StudyTypeId,
    ) -> protoform_store::Result<usize> {
        Err(protoform_store::StoreError::Message(
            "write refused".to_string(),
        ))
    }
}

#[test]
fn failed_save_keeps_entered_data_for_a_retry() {
    let mut good = store_with_fixture();
    let mut form = ProtocolForm::open(&good, &record(), FormOptions::default()).unwrap();
    form.set_value(WEIGHT, "70,5");

    let mut failing = FailingStore(MemoryStore::new());
    let err = form.save(&mut failing, &header(), false).unwrap_err();
    assert!(matches!(err, EngineError::Persistence(_)));
    assert_eq!(form.protocol_id(), None);
    assert_eq!(form.value(WEIGHT), Some("70,5"));

    // Retrying against a working store succeeds with the same data.
    let protocol_id = form.save(&mut good, &header(), false).unwrap();
    assert_eq!(
        good.load_values(protocol_id).unwrap().get(&WEIGHT),
        Some(&"70,5".to_string())
    );
}
