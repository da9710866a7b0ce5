//! Mutable runtime counterpart of one field definition.

use protoform_model::FieldDef;

use crate::codec;

/// Current state of one field in an open form: canonical value, visibility,
/// and the out-of-range flag. Created fresh each time a record is opened
/// and discarded when the form closes; only the collected value map is ever
/// persisted.
#[derive(Debug, Clone)]
pub struct FieldBinding {
    def: FieldDef,
    /// Dictionary values for choice-like fields; empty otherwise.
    options: Vec<String>,
    value: String,
    visible: bool,
    /// `None` when not applicable (non-numeric field, blank value, hidden
    /// field, or no active range).
    out_of_range: Option<bool>,
}

impl FieldBinding {
    pub(crate) fn new(def: FieldDef, options: Vec<String>) -> Self {
        Self {
            def,
            options,
            value: String::new(),
            visible: true,
            out_of_range: None,
        }
    }

    pub fn def(&self) -> &FieldDef {
        &self.def
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn out_of_range(&self) -> Option<bool> {
        self.out_of_range
    }

    /// Selected options of a template-choice value, in dictionary order.
    pub fn selected_options(&self) -> Vec<String> {
        codec::split_template_value(&self.value)
    }

    /// Run an edit through the codec. Returns whether the canonical value
    /// changed.
    pub(crate) fn apply_input(&mut self, input: &str) -> bool {
        let next = codec::apply(&self.def, &self.options, &self.value, input);
        if next == self.value {
            return false;
        }
        self.value = next;
        true
    }

    /// Overwrite with an already-canonical value (formula results, clears).
    pub(crate) fn set_canonical(&mut self, value: String) {
        self.value = value;
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub(crate) fn set_out_of_range(&mut self, flag: Option<bool>) {
        self.out_of_range = flag;
    }
}
