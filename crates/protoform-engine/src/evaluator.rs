//! Dependency evaluation: visibility triggers and formula recomputation.
//!
//! Two independent relations are re-evaluated reactively. Triggers are
//! single-level (a trigger field is never itself trigger-hidden), and each
//! one is evaluated from its source field's raw current value, never from
//! another trigger's derived visibility, so malformed chains cannot loop.
//! Formula recomputation deliberately re-runs every formula field on each
//! relevant change instead of maintaining an incremental dataflow graph:
//! evaluation is cheap, side-effect-free, and bounded by the size of one
//! structure.

use tracing::debug;

use protoform_model::{FieldId, FieldType, TabId};

use crate::codec;
use crate::formula::{self, FieldRef};
use crate::form::ProtocolForm;
use crate::range;

/// How a trigger field's value decides a dependent field's visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerRule {
    /// The trigger's first dictionary entry is the hidden-state sentinel:
    /// the dependent field shows iff the trigger value is non-empty and
    /// differs from it. Falls back to [`TriggerRule::ExplicitValue`] when
    /// the trigger field has no dictionary entries.
    #[default]
    FirstChoiceSentinel,
    /// Legacy rule: the dependent field shows iff the trigger value equals
    /// the `trigger_value` stored on the field definition.
    ExplicitValue,
}

impl ProtocolForm {
    /// Re-run the whole evaluator: all triggers, all formulas, all range
    /// flags. Called once after bulk loads; calling it again without an
    /// intervening edit changes nothing.
    pub fn settle(&mut self) {
        self.refresh_all_triggers();
        self.recalculate_formulas(None);
        let numeric_ids: Vec<FieldId> = self
            .bindings
            .values()
            .filter(|binding| binding.def().field_type == FieldType::Number)
            .map(|binding| binding.def().id)
            .collect();
        for field_id in numeric_ids {
            self.check_reference(field_id);
        }
    }

    pub(crate) fn refresh_all_triggers(&mut self) {
        let trigger_ids: Vec<FieldId> = self.hidden_by_trigger.keys().copied().collect();
        for trigger_id in trigger_ids {
            self.refresh_trigger(trigger_id);
        }
    }

    /// Recompute visibility of every field hidden behind one trigger.
    /// Hiding a field does not clear its value: the data comes back if the
    /// trigger flips again, and exclusion from collect() is what retracts
    /// it from the next save.
    pub(crate) fn refresh_trigger(&mut self, trigger_id: FieldId) {
        let Some(targets) = self.hidden_by_trigger.get(&trigger_id).cloned() else {
            return;
        };
        let Some(source) = self.bindings.get(&trigger_id) else {
            return;
        };
        let value = source.value().trim().to_string();
        let first_choice = source.options().first().map(|s| s.trim().to_string());
        let gender = self.gender();

        for target_id in targets {
            let Some(binding) = self.bindings.get_mut(&target_id) else {
                continue;
            };
            let use_sentinel =
                self.trigger_rule == TriggerRule::FirstChoiceSentinel && first_choice.is_some();
            let show = if use_sentinel {
                // For template-choice triggers a single selection equal to
                // the first option serializes as exactly that option, so
                // the same comparison covers both choice kinds.
                !value.is_empty() && Some(&value) != first_choice.as_ref()
            } else {
                match binding.def().trigger_value.as_deref() {
                    Some(expected) if !expected.trim().is_empty() => value == expected.trim(),
                    _ => false,
                }
            };
            if show != binding.visible() {
                debug!(field = target_id.value(), visible = show, "trigger flip");
            }
            binding.set_visible(show);
            // Hidden fields are excluded from validation.
            let flag = if show {
                range::range_flag(binding.def(), gender, binding.value())
            } else {
                None
            };
            binding.set_out_of_range(flag);
        }
    }

    /// Recompute formula fields, optionally restricted to one tab. A
    /// formula whose inputs are missing, whose expression is unsafe, or
    /// whose result is non-finite clears its field instead of surfacing an
    /// error.
    pub(crate) fn recalculate_formulas(&mut self, scope: Option<TabId>) {
        let formula_ids: Vec<FieldId> = self
            .bindings
            .values()
            .filter(|binding| {
                binding.def().field_type == FieldType::Formula
                    && binding.def().formula.is_some()
                    && scope.is_none_or(|tab_id| binding.def().tab_id == tab_id)
            })
            .map(|binding| binding.def().id)
            .collect();

        for field_id in formula_ids {
            let Some(binding) = self.bindings.get(&field_id) else {
                continue;
            };
            let expression = binding.def().formula.clone().unwrap_or_default();
            let precision = binding.def().precision;

            let result =
                formula::evaluate(&expression, |reference| self.resolve_reference(reference));
            let rendered = match result {
                Some(value) => codec::format_decimal(value, precision),
                None => String::new(),
            };
            if let Some(binding) = self.bindings.get_mut(&field_id) {
                binding.set_canonical(rendered);
            }
            self.check_reference(field_id);
        }
    }

    /// Resolve one formula reference to the referenced field's current
    /// numeric value. Full path first; bare field name anywhere in the
    /// structure as a fallback for legacy formulas authored before paths
    /// were unique. Formula fields are not valid inputs (no formula may
    /// feed another), and empty or non-numeric values make the reference
    /// unresolvable.
    fn resolve_reference(&self, reference: &FieldRef) -> Option<f64> {
        let field_id = self
            .structure()
            .resolve_path(&reference.tab, &reference.group, &reference.field)
            .or_else(|| self.structure().resolve_name(&reference.field))?;
        let binding = self.bindings.get(&field_id)?;
        if binding.def().field_type == FieldType::Formula {
            return None;
        }
        codec::parse_decimal(binding.value())
    }

    /// Re-check one field's value against its reference range.
    pub(crate) fn check_reference(&mut self, field_id: FieldId) {
        let gender = self.gender();
        let Some(binding) = self.bindings.get_mut(&field_id) else {
            return;
        };
        let flag = if binding.visible() {
            range::range_flag(binding.def(), gender, binding.value())
        } else {
            None
        };
        binding.set_out_of_range(flag);
    }
}
