//! Tab/group/field hierarchy of one study type, plus the path index used by
//! formula references.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::field::FieldDef;
use crate::ids::{FieldId, GroupId, StudyTypeId, TabId};

/// A group of fields rendered together inside a tab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub display_order: u32,
    /// Rendering hint; a tab with a single group renders expanded regardless.
    #[serde(default)]
    pub expanded_by_default: bool,
    pub fields: Vec<FieldDef>,
}

/// One tab of the form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    pub name: String,
    #[serde(default)]
    pub display_order: u32,
    pub groups: Vec<Group>,
}

/// Immutable structure of a study type: ordered tabs, groups, fields, and
/// the dictionary (allowed-value) lists for choice-like fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Structure {
    pub study_type_id: StudyTypeId,
    pub tabs: Vec<Tab>,
    /// Ordered allowed values per choice/template-choice field.
    #[serde(default)]
    pub dictionaries: BTreeMap<FieldId, Vec<String>>,
}

impl Structure {
    /// Sort tabs and groups by display order and fields by
    /// (column slot, display order), the order the form renders them in.
    pub fn normalize(&mut self) {
        self.tabs.sort_by_key(|tab| tab.display_order);
        for tab in &mut self.tabs {
            tab.groups.sort_by_key(|group| group.display_order);
            for group in &mut tab.groups {
                group
                    .fields
                    .sort_by_key(|field| (field.column_slot, field.display_order));
            }
        }
    }

    /// True when no tabs are defined; callers render an empty state.
    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    /// Iterate all fields in render order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.tabs
            .iter()
            .flat_map(|tab| tab.groups.iter())
            .flat_map(|group| group.fields.iter())
    }

    pub fn field(&self, id: FieldId) -> Option<&FieldDef> {
        self.fields().find(|field| field.id == id)
    }

    pub fn tab(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.id == id)
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.tabs
            .iter()
            .flat_map(|tab| tab.groups.iter())
            .find(|group| group.id == id)
    }

    /// Ordered dictionary values for a choice/template-choice field.
    /// Fields without a dictionary yield an empty slice.
    pub fn dictionary(&self, field_id: FieldId) -> &[String] {
        self.dictionaries
            .get(&field_id)
            .map(|values| values.as_slice())
            .unwrap_or(&[])
    }

    /// The conventional default/placeholder entry of a dictionary: its first
    /// value.
    pub fn first_dictionary_value(&self, field_id: FieldId) -> Option<&str> {
        self.dictionary(field_id).first().map(|s| s.as_str())
    }

    /// Map from `tab.group.field` path to field id, the addressing scheme
    /// formulas use. Segments are stored trimmed.
    pub fn path_index(&self) -> BTreeMap<String, FieldId> {
        let mut index = BTreeMap::new();
        for tab in &self.tabs {
            for group in &tab.groups {
                for field in &group.fields {
                    index.insert(
                        field_path(&tab.name, &group.name, &field.name),
                        field.id,
                    );
                }
            }
        }
        index
    }

    /// Resolve a dotted `Tab.Group.Field` reference by full path.
    pub fn resolve_path(&self, tab: &str, group: &str, field: &str) -> Option<FieldId> {
        let tab = self
            .tabs
            .iter()
            .find(|candidate| candidate.name.trim() == tab.trim())?;
        let group = tab
            .groups
            .iter()
            .find(|candidate| candidate.name.trim() == group.trim())?;
        group
            .fields
            .iter()
            .find(|candidate| candidate.name.trim() == field.trim())
            .map(|candidate| candidate.id)
    }

    /// Resolve by bare field name anywhere in the structure. Legacy fallback
    /// for formulas authored before paths were unique; first match in render
    /// order wins.
    pub fn resolve_name(&self, field: &str) -> Option<FieldId> {
        self.fields()
            .find(|candidate| candidate.name.trim() == field.trim())
            .map(|candidate| candidate.id)
    }

    /// Full dotted path of a field, for display and diagnostics.
    pub fn path_of(&self, field_id: FieldId) -> Option<String> {
        for tab in &self.tabs {
            for group in &tab.groups {
                for field in &group.fields {
                    if field.id == field_id {
                        return Some(field_path(&tab.name, &group.name, &field.name));
                    }
                }
            }
        }
        None
    }
}

fn field_path(tab: &str, group: &str, field: &str) -> String {
    format!("{}.{}.{}", tab.trim(), group.trim(), field.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldType;

    fn field(id: i64, group: i64, tab: i64, name: &str, order: u32) -> FieldDef {
        FieldDef {
            id: FieldId(id),
            group_id: GroupId(group),
            tab_id: TabId(tab),
            name: name.to_string(),
            field_type: FieldType::String,
            column_slot: 1,
            display_order: order,
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

    fn two_tab_structure() -> Structure {
        Structure {
            study_type_id: StudyTypeId(1),
            tabs: vec![
                Tab {
                    id: TabId(2),
                    name: "Measurements".to_string(),
                    display_order: 2,
                    groups: vec![Group {
                        id: GroupId(21),
                        name: "Basic".to_string(),
                        display_order: 1,
                        expanded_by_default: true,
                        fields: vec![
                            field(211, 21, 2, "Weight", 2),
                            field(212, 21, 2, "Height", 1),
                        ],
                    }],
                },
                Tab {
                    id: TabId(1),
                    name: "General".to_string(),
                    display_order: 1,
                    groups: vec![Group {
                        id: GroupId(11),
                        name: "Info".to_string(),
                        display_order: 1,
                        expanded_by_default: true,
                        fields: vec![field(111, 11, 1, "Complaint", 1)],
                    }],
                },
            ],
            dictionaries: BTreeMap::new(),
        }
    }

    #[test]
    fn normalize_orders_tabs_and_fields() {
        let mut structure = two_tab_structure();
        structure.normalize();
        assert_eq!(structure.tabs[0].name, "General");
        let names: Vec<&str> = structure.tabs[1].groups[0]
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, ["Height", "Weight"]);
    }

    #[test]
    fn path_resolution_prefers_full_path() {
        let structure = two_tab_structure();
        assert_eq!(
            structure.resolve_path("Measurements", "Basic", "Weight"),
            Some(FieldId(211))
        );
        assert_eq!(structure.resolve_path("General", "Basic", "Weight"), None);
        assert_eq!(structure.resolve_name("Weight"), Some(FieldId(211)));
        assert_eq!(structure.resolve_name("Missing"), None);
    }

    #[test]
    fn path_index_covers_every_field() {
        let structure = two_tab_structure();
        let index = structure.path_index();
        assert_eq!(index.len(), 3);
        assert_eq!(
            index.get("Measurements.Basic.Height"),
            Some(&FieldId(212))
        );
    }
}
