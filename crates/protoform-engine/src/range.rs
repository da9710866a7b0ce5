//! Reference-range validation.

use protoform_model::{FieldDef, Gender};

use crate::codec;

/// Compare a field's current value against its gender-appropriate reference
/// range. `None` means the flag does not apply: the field is not numeric,
/// the value is blank or unparseable, or the range has a missing bound.
/// `Some(true)` marks a value strictly outside `[min, max]`. The flag is
/// presentation only and never blocks a save.
pub fn range_flag(def: &FieldDef, gender: Gender, value: &str) -> Option<bool> {
    if !def.field_type.is_numeric() {
        return None;
    }
    let parsed = codec::parse_decimal(value)?;
    let (min, max) = def.reference_range(gender)?;
    Some(parsed < min || parsed > max)
}
