pub mod field;
pub mod ids;
pub mod structure;

pub use field::{FieldDef, FieldType, Gender, UnknownFieldType};
pub use ids::{FieldId, GroupId, PatientId, ProtocolId, StudyTypeId, TabId};
pub use structure::{Group, Structure, Tab};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn structure_serializes() {
        let structure = Structure {
            study_type_id: StudyTypeId(7),
            tabs: vec![],
            dictionaries: BTreeMap::from([(
                FieldId(3),
                vec!["none".to_string(), "mild".to_string()],
            )]),
        };
        let json = serde_json::to_string(&structure).expect("serialize structure");
        let round: Structure = serde_json::from_str(&json).expect("deserialize structure");
        assert_eq!(round.study_type_id, StudyTypeId(7));
        assert_eq!(round.dictionary(FieldId(3)), ["none", "mild"]);
        assert!(round.is_empty());
    }
}
