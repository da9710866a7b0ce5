use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, ContentArrangement, Table};
use serde::Serialize;

use protoform_model::{ProtocolId, Structure, StudyTypeId};
use protoform_store::ProtocolRecord;

pub fn print_study_types(study_types: &[StudyTypeId]) {
    if study_types.is_empty() {
        println!("no study type structures in this store");
        return;
    }
    println!("Study types with a structure:");
    for study_type in study_types {
        println!("- {study_type}");
    }
}

pub fn print_schema(structure: &Structure) {
    println!("Study type: {}", structure.study_type_id);
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Tab"),
        header_cell("Group"),
        header_cell("Field"),
        header_cell("Id"),
        header_cell("Type"),
        header_cell("Req"),
        header_cell("Range (m / f)"),
        header_cell("Logic"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Right);
    align_column(&mut table, 5, CellAlignment::Center);

    for tab in &structure.tabs {
        for group in &tab.groups {
            for field in &group.fields {
                table.add_row(vec![
                    Cell::new(&tab.name),
                    Cell::new(&group.name),
                    Cell::new(&field.name),
                    Cell::new(field.id.value()),
                    Cell::new(field.field_type.as_str()),
                    if field.required {
                        Cell::new("✓")
                    } else {
                        dim_cell("-")
                    },
                    Cell::new(range_label(field)),
                    Cell::new(logic_label(structure, field)),
                ]);
            }
        }
    }
    println!("{table}");
}

pub fn print_protocols(records: &[ProtocolRecord]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Id"),
        header_cell("Patient"),
        header_cell("Study type"),
        header_cell("Doctor"),
        header_cell("Created"),
        header_cell("Status"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    align_column(&mut table, 1, CellAlignment::Right);

    for record in records {
        table.add_row(vec![
            Cell::new(record.id.value()),
            Cell::new(record.patient_id.value()),
            Cell::new(record.study_type_id.value()),
            Cell::new(record.doctor_id),
            Cell::new(&record.created_at),
            if record.is_draft() {
                Cell::new("draft").add_attribute(Attribute::Bold)
            } else {
                dim_cell("final")
            },
        ]);
    }
    println!("{table}");
}

pub struct ValueRow {
    pub field: String,
    pub value: String,
}

pub fn print_values(record: &ProtocolRecord, rows: &[ValueRow]) {
    println!(
        "Protocol {} (patient {}, study type {}, {})",
        record.id.value(),
        record.patient_id.value(),
        record.study_type_id.value(),
        if record.is_draft() { "draft" } else { "final" },
    );
    let mut table = Table::new();
    table.set_header(vec![header_cell("Field"), header_cell("Value")]);
    apply_table_style(&mut table);
    for row in rows {
        table.add_row(vec![Cell::new(&row.field), Cell::new(&row.value)]);
    }
    println!("{table}");
}

/// One out-of-range value found by `check`.
#[derive(Serialize)]
pub struct RangeFinding {
    pub field: String,
    pub value: String,
    pub range: String,
}

#[derive(Serialize)]
pub struct CheckReport {
    pub protocol_id: ProtocolId,
    pub draft: bool,
    pub visible_fields: usize,
    pub filled_fields: usize,
    pub missing_required: Vec<String>,
    pub out_of_range: Vec<RangeFinding>,
}

impl CheckReport {
    pub fn has_findings(&self) -> bool {
        !self.missing_required.is_empty() || !self.out_of_range.is_empty()
    }
}

pub fn print_check(report: &CheckReport) {
    println!("{}", render_check_report(report));
}

pub fn render_check_report(report: &CheckReport) -> String {
    let mut lines = vec![
        format!(
            "Protocol {} ({})",
            report.protocol_id.value(),
            if report.draft { "draft" } else { "final" },
        ),
        format!(
            "{} visible field(s), {} filled",
            report.visible_fields, report.filled_fields
        ),
    ];
    if !report.missing_required.is_empty() {
        lines.push(format!(
            "Missing required: {}",
            report.missing_required.join(", ")
        ));
    }
    if !report.out_of_range.is_empty() {
        lines.push("Out of range:".to_string());
        for finding in &report.out_of_range {
            lines.push(format!(
                "  {} = {} (range {})",
                finding.field, finding.value, finding.range
            ));
        }
    }
    if !report.has_findings() {
        lines.push("No findings".to_string());
    }
    lines.join("\n")
}

fn range_label(field: &protoform_model::FieldDef) -> String {
    let band = |min: Option<f64>, max: Option<f64>| match (min, max) {
        (Some(min), Some(max)) => format!("{min}..{max}"),
        _ => "-".to_string(),
    };
    let male = band(field.ref_male_min, field.ref_male_max);
    let female = band(field.ref_female_min, field.ref_female_max);
    if male == "-" && female == "-" {
        "-".to_string()
    } else {
        format!("{male} / {female}")
    }
}

fn logic_label(structure: &Structure, field: &protoform_model::FieldDef) -> String {
    if let Some(formula) = &field.formula {
        return format!("= {formula}");
    }
    if let Some(trigger_id) = field.trigger_field_id {
        let trigger = structure
            .field(trigger_id)
            .map(|def| def.name.clone())
            .unwrap_or_else(|| format!("field {}", trigger_id.value()));
        return format!("shown by {trigger}");
    }
    "-".to_string()
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(140);
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(comfy_table::Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(comfy_table::Color::DarkGrey)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_report_lists_findings() {
        let report = CheckReport {
            protocol_id: ProtocolId(7),
            draft: true,
            visible_fields: 5,
            filled_fields: 3,
            missing_required: vec!["Comment".to_string(), "Contrast dose".to_string()],
            out_of_range: vec![RangeFinding {
                field: "Lab.Blood.Potassium".to_string(),
                value: "6,0".to_string(),
                range: "3 .. 5".to_string(),
            }],
        };
        insta::assert_snapshot!(render_check_report(&report), @r"
        Protocol 7 (draft)
        5 visible field(s), 3 filled
        Missing required: Comment, Contrast dose
        Out of range:
          Lab.Blood.Potassium = 6,0 (range 3 .. 5)
        ");
    }

    #[test]
    fn clean_check_report_has_no_findings() {
        let report = CheckReport {
            protocol_id: ProtocolId(3),
            draft: false,
            visible_fields: 4,
            filled_fields: 4,
            missing_required: vec![],
            out_of_range: vec![],
        };
        insta::assert_snapshot!(render_check_report(&report), @r"
        Protocol 3 (final)
        4 visible field(s), 4 filled
        No findings
        ");
    }
}
