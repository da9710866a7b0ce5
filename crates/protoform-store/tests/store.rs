//! Integration tests for the memory and JSON stores.

use std::collections::BTreeMap;

use protoform_model::{
    FieldDef, FieldId, FieldType, Group, GroupId, PatientId, ProtocolId, Structure, StudyTypeId,
    Tab, TabId,
};
use protoform_store::{
    JsonStore, MemoryStore, ProtocolHeader, SaveTarget, StructureSource, ValueStore,
};

fn make_field(id: i64, name: &str) -> FieldDef {
    FieldDef {
        id: FieldId(id),
        group_id: GroupId(1),
        tab_id: TabId(1),
        name: name.to_string(),
        field_type: FieldType::String,
        column_slot: 1,
        display_order: id as u32,
        precision: None,
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
    }
}

fn make_structure() -> Structure {
    Structure {
        study_type_id: StudyTypeId(10),
        tabs: vec![Tab {
            id: TabId(1),
            name: "Main".to_string(),
            display_order: 1,
            groups: vec![Group {
                id: GroupId(1),
                name: "Data".to_string(),
                display_order: 1,
                expanded_by_default: true,
                fields: vec![make_field(1, "A"), make_field(2, "B")],
            }],
        }],
        dictionaries: BTreeMap::new(),
    }
}

fn header() -> ProtocolHeader {
    ProtocolHeader {
        patient_id: PatientId(5),
        study_type_id: StudyTypeId(10),
        doctor_id: 1,
        device_id: None,
        institution_id: 1,
    }
}

#[test]
fn missing_structure_is_none_not_error() {
    let store = MemoryStore::new();
    assert!(
        store
            .load_structure(StudyTypeId(99))
            .expect("load")
            .is_none()
    );
}

#[test]
fn empty_structure_reported_as_none() {
    let mut store = MemoryStore::new();
    store.insert_structure(Structure {
        study_type_id: StudyTypeId(3),
        tabs: vec![],
        dictionaries: BTreeMap::new(),
    });
    assert!(store.load_structure(StudyTypeId(3)).expect("load").is_none());
}

#[test]
fn blank_values_are_omitted_on_save() {
    let mut store = MemoryStore::new();
    let values = BTreeMap::from([
        (FieldId(1), "hello".to_string()),
        (FieldId(2), "   ".to_string()),
    ]);
    let id = store
        .save_values(SaveTarget::New(header()), &values, false)
        .expect("save");
    let loaded = store.load_values(id).expect("load");
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded.get(&FieldId(1)).map(String::as_str), Some("hello"));
}

#[test]
fn save_replaces_previous_value_set() {
    let mut store = MemoryStore::new();
    let first = BTreeMap::from([
        (FieldId(1), "kept".to_string()),
        (FieldId(2), "dropped".to_string()),
    ]);
    let id = store
        .save_values(SaveTarget::New(header()), &first, false)
        .expect("save");

    // Field 2 disappeared from the collected map (e.g. its trigger hid it).
    let second = BTreeMap::from([(FieldId(1), "kept".to_string())]);
    store
        .save_values(SaveTarget::Existing(id), &second, false)
        .expect("save again");

    let loaded = store.load_values(id).expect("load");
    assert!(loaded.contains_key(&FieldId(1)));
    assert!(!loaded.contains_key(&FieldId(2)));
}

#[test]
fn draft_lookup_skips_finalized_protocols() {
    let mut store = MemoryStore::new();
    let values = BTreeMap::from([(FieldId(1), "x".to_string())]);
    let first = store
        .save_values(SaveTarget::New(header()), &values, false)
        .expect("save");
    assert_eq!(
        store
            .draft_protocol(PatientId(5), StudyTypeId(10))
            .expect("draft"),
        Some(first)
    );

    store.finalize_protocol(first).expect("finalize");
    assert_eq!(
        store
            .draft_protocol(PatientId(5), StudyTypeId(10))
            .expect("draft"),
        None
    );
}

#[test]
fn save_with_finalize_creates_closed_protocol() {
    let mut store = MemoryStore::new();
    let values = BTreeMap::from([(FieldId(1), "x".to_string())]);
    let id = store
        .save_values(SaveTarget::New(header()), &values, true)
        .expect("save");
    let record = store.protocol(id).expect("lookup").expect("record");
    assert!(!record.is_draft());
}

#[test]
fn finalize_open_protocols_counts_closed_drafts() {
    let mut store = MemoryStore::new();
    let values = BTreeMap::from([(FieldId(1), "x".to_string())]);
    store
        .save_values(SaveTarget::New(header()), &values, false)
        .expect("save");
    store
        .save_values(SaveTarget::New(header()), &values, false)
        .expect("save");
    let closed = store
        .finalize_open_protocols(PatientId(5), StudyTypeId(10))
        .expect("finalize all");
    assert_eq!(closed, 2);
    assert_eq!(
        store
            .draft_protocol(PatientId(5), StudyTypeId(10))
            .expect("draft"),
        None
    );
}

#[test]
fn unknown_protocol_save_is_an_error() {
    let mut store = MemoryStore::new();
    let values = BTreeMap::new();
    let result = store.save_values(SaveTarget::Existing(ProtocolId(42)), &values, false);
    assert!(result.is_err());
}

#[test]
fn json_store_round_trips_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("store.json");

    let saved_id;
    {
        let mut store = JsonStore::open(&path).expect("open");
        store.insert_structure(make_structure()).expect("insert");
        let values = BTreeMap::from([(FieldId(1), "70,5".to_string())]);
        saved_id = store
            .save_values(SaveTarget::New(header()), &values, false)
            .expect("save");
    }

    let reopened = JsonStore::open(&path).expect("reopen");
    let structure = reopened
        .load_structure(StudyTypeId(10))
        .expect("load structure")
        .expect("structure present");
    assert_eq!(structure.tabs.len(), 1);
    let values = reopened.load_values(saved_id).expect("load values");
    assert_eq!(values.get(&FieldId(1)).map(String::as_str), Some("70,5"));
    assert_eq!(
        reopened
            .draft_protocol(PatientId(5), StudyTypeId(10))
            .expect("draft"),
        Some(saved_id)
    );
}

#[test]
fn json_store_allocates_fresh_ids_after_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("store.json");

    let first;
    {
        let mut store = JsonStore::open(&path).expect("open");
        let values = BTreeMap::from([(FieldId(1), "a".to_string())]);
        first = store
            .save_values(SaveTarget::New(header()), &values, true)
            .expect("save");
    }

    let mut reopened = JsonStore::open(&path).expect("reopen");
    let values = BTreeMap::from([(FieldId(1), "b".to_string())]);
    let second = reopened
        .save_values(SaveTarget::New(header()), &values, false)
        .expect("save");
    assert_ne!(first, second);
}
