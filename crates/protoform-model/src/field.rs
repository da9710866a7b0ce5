use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{FieldId, GroupId, TabId};

/// Closed set of field kinds a structure may declare.
///
/// The kind selects codec, evaluation, and validation behavior at runtime;
/// rendering is a presentation-layer concern and is not modeled here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    /// Single-line free text.
    String,
    /// Multi-line free text.
    LongText,
    /// Decimal number entered with a comma separator.
    Number,
    /// Calendar date, displayed as `dd.mm.yyyy`.
    Date,
    /// Time of day, displayed as `HH:MM`.
    Time,
    /// Single selection from an ordered dictionary of values.
    Choice,
    /// Multi-selection from an ordered dictionary, joined by `" | "`.
    TemplateChoice,
    /// Placeholder field with no entry behavior of its own.
    HiddenMarker,
    /// Read-only value computed from other fields via an arithmetic formula.
    Formula,
}

impl FieldType {
    /// Canonical name as stored in structure definitions.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::LongText => "longtext",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::Choice => "choice",
            FieldType::TemplateChoice => "template-choice",
            FieldType::HiddenMarker => "hidden-marker",
            FieldType::Formula => "formula",
        }
    }

    /// True for kinds backed by an ordered dictionary of allowed values.
    pub fn has_dictionary(&self) -> bool {
        matches!(self, FieldType::Choice | FieldType::TemplateChoice)
    }

    /// True for kinds whose value is checked against a reference range.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Number | FieldType::Formula)
    }

    /// True for kinds whose edits re-run formula recomputation.
    /// Formulas may reference any raw-entry field, so every change to one
    /// of these re-evaluates all formula fields.
    pub fn feeds_formulas(&self) -> bool {
        matches!(
            self,
            FieldType::Number | FieldType::String | FieldType::Choice
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field type name not in the closed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown field type `{0}`")]
pub struct UnknownFieldType(pub String);

impl FromStr for FieldType {
    type Err = UnknownFieldType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "string" => Ok(FieldType::String),
            "longtext" => Ok(FieldType::LongText),
            "number" => Ok(FieldType::Number),
            "date" => Ok(FieldType::Date),
            "time" => Ok(FieldType::Time),
            "choice" => Ok(FieldType::Choice),
            "template-choice" => Ok(FieldType::TemplateChoice),
            "hidden-marker" => Ok(FieldType::HiddenMarker),
            "formula" => Ok(FieldType::Formula),
            _ => Err(UnknownFieldType(s.trim().to_string())),
        }
    }
}

/// Reference gender used for range lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// Immutable definition of one field inside a study type's structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub id: FieldId,
    pub group_id: GroupId,
    pub tab_id: TabId,
    pub name: String,
    pub field_type: FieldType,
    /// Layout column within the group (1-based). Not semantically relevant
    /// to evaluation; kept for the rendering shell.
    #[serde(default = "default_column_slot")]
    pub column_slot: u32,
    #[serde(default)]
    pub display_order: u32,
    /// Decimal places for number/formula values.
    pub precision: Option<u32>,
    pub ref_male_min: Option<f64>,
    pub ref_male_max: Option<f64>,
    pub ref_female_min: Option<f64>,
    pub ref_female_max: Option<f64>,
    /// Arithmetic expression over `Tab.Group.Field` references.
    pub formula: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Layout height hint in rows (long text fields).
    #[serde(default = "default_height")]
    pub height: u32,
    /// Layout width hint in characters.
    #[serde(default = "default_width")]
    pub width: u32,
    /// Hidden until revealed by its trigger field.
    #[serde(default)]
    pub hidden_by_default: bool,
    pub trigger_field_id: Option<FieldId>,
    /// Legacy explicit reveal value; consulted when the trigger field has no
    /// dictionary, or when the form runs under the explicit-value rule.
    pub trigger_value: Option<String>,
}

fn default_column_slot() -> u32 {
    1
}

fn default_height() -> u32 {
    1
}

fn default_width() -> u32 {
    20
}

impl FieldDef {
    /// Active reference range for the given gender, or None unless both
    /// bounds are present.
    pub fn reference_range(&self, gender: Gender) -> Option<(f64, f64)> {
        let (min, max) = match gender {
            Gender::Male => (self.ref_male_min, self.ref_male_max),
            Gender::Female => (self.ref_female_min, self.ref_female_max),
        };
        Some((min?, max?))
    }

    /// True when this field participates in trigger-driven visibility.
    pub fn is_trigger_target(&self) -> bool {
        self.hidden_by_default && self.trigger_field_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_type_round_trips_through_names() {
        for ty in [
            FieldType::String,
            FieldType::LongText,
            FieldType::Number,
            FieldType::Date,
            FieldType::Time,
            FieldType::Choice,
            FieldType::TemplateChoice,
            FieldType::HiddenMarker,
            FieldType::Formula,
        ] {
            assert_eq!(ty.as_str().parse::<FieldType>(), Ok(ty));
        }
    }

    #[test]
    fn reference_range_requires_both_bounds() {
        let mut field = FieldDef {
            id: FieldId(1),
            group_id: GroupId(1),
            tab_id: TabId(1),
            name: "Hemoglobin".to_string(),
            field_type: FieldType::Number,
            column_slot: 1,
            display_order: 0,
            precision: Some(1),
            ref_male_min: Some(130.0),
            ref_male_max: None,
            ref_female_min: Some(120.0),
            ref_female_max: Some(150.0),
            formula: None,
            required: false,
            height: 1,
            width: 20,
            hidden_by_default: false,
            trigger_field_id: None,
            trigger_value: None,
        };
        assert_eq!(field.reference_range(Gender::Male), None);
        assert_eq!(field.reference_range(Gender::Female), Some((120.0, 150.0)));
        field.ref_male_max = Some(170.0);
        assert_eq!(field.reference_range(Gender::Male), Some((130.0, 170.0)));
    }
}
