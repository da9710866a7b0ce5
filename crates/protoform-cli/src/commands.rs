use anyhow::{Context, Result, anyhow, bail};
use tracing::info;

use protoform_engine::{FormOptions, ProtocolForm, RecordRef, TriggerRule};
use protoform_model::{FieldId, Gender, ProtocolId, StudyTypeId};
use protoform_store::{JsonStore, ProtocolHeader, StructureSource, ValueStore};

use crate::cli::{
    CheckArgs, FinalizeArgs, GenderArg, ProtocolsArgs, RecordArgs, SchemaArgs, ShowArgs,
};
use crate::summary::{
    CheckReport, RangeFinding, ValueRow, print_check, print_protocols, print_schema,
    print_study_types, print_values,
};

pub fn run_schema(args: &SchemaArgs) -> Result<()> {
    let store = JsonStore::open(&args.store)?;
    let Some(study_type) = args.study_type else {
        print_study_types(&store.study_types());
        return Ok(());
    };
    let study_type = StudyTypeId(study_type);
    let structure = store
        .load_structure(study_type)?
        .ok_or_else(|| anyhow!("no structure defined for study type {study_type}"))?;
    print_schema(&structure);
    Ok(())
}

pub fn run_protocols(args: &ProtocolsArgs) -> Result<()> {
    let store = JsonStore::open(&args.store)?;
    let records: Vec<_> = store
        .protocol_records()
        .into_iter()
        .filter(|record| {
            args.patient
                .is_none_or(|patient| record.patient_id.value() == patient)
        })
        .collect();
    print_protocols(&records);
    Ok(())
}

pub fn run_show(args: &ShowArgs) -> Result<()> {
    let store = JsonStore::open(&args.store)?;
    let protocol_id = ProtocolId(args.protocol);
    let record = store
        .protocol(protocol_id)?
        .ok_or_else(|| anyhow!("protocol {protocol_id} not found"))?;
    let structure = store.load_structure(record.study_type_id)?;
    let values = store.load_values(protocol_id)?;

    let rows: Vec<ValueRow> = values
        .iter()
        .map(|(field_id, value)| ValueRow {
            field: structure
                .as_ref()
                .and_then(|s| s.path_of(*field_id))
                .unwrap_or_else(|| format!("field {field_id}")),
            value: value.clone(),
        })
        .collect();
    print_values(&record, &rows);
    Ok(())
}

pub fn run_record(args: &RecordArgs) -> Result<ProtocolId> {
    let mut store = JsonStore::open(&args.store)?;
    let patient = args.patient.into();
    let study_type = StudyTypeId(args.study_type);

    if args.new {
        let closed = store.finalize_open_protocols(patient, study_type)?;
        if closed > 0 {
            info!(closed, "closed open drafts before starting fresh");
        }
    }

    let record = RecordRef {
        patient_id: patient,
        study_type_id: study_type,
        protocol_id: None,
        gender: gender_of(args.gender),
    };
    let mut form = ProtocolForm::open(&store, &record, form_options(args.legacy_triggers))?;

    for assignment in &args.set {
        let (field_id, value) = parse_assignment(&form, assignment)?;
        form.set_value(field_id, &value);
    }

    if args.finalize {
        let missing = form.validate_required();
        if !missing.is_empty() {
            bail!("cannot finalize, required fields are empty: {}", missing.join(", "));
        }
    }

    let header = ProtocolHeader {
        patient_id: patient,
        study_type_id: study_type,
        doctor_id: args.doctor,
        device_id: args.device,
        institution_id: args.institution,
    };
    let protocol_id = form.save(&mut store, &header, args.finalize)?;
    Ok(protocol_id)
}

pub fn run_check(args: &CheckArgs) -> Result<CheckReport> {
    let store = JsonStore::open(&args.store)?;
    let protocol_id = ProtocolId(args.protocol);
    let saved = store
        .protocol(protocol_id)?
        .ok_or_else(|| anyhow!("protocol {protocol_id} not found"))?;

    let record = RecordRef {
        patient_id: saved.patient_id,
        study_type_id: saved.study_type_id,
        protocol_id: Some(protocol_id),
        gender: gender_of(args.gender),
    };
    let form = ProtocolForm::open(&store, &record, form_options(args.legacy_triggers))?;

    let mut filled = 0usize;
    let mut visible = 0usize;
    let mut out_of_range = Vec::new();
    for binding in form.bindings() {
        if !binding.visible() {
            continue;
        }
        visible += 1;
        if !binding.is_blank() {
            filled += 1;
        }
        if binding.out_of_range() == Some(true) {
            out_of_range.push(RangeFinding {
                field: form
                    .structure()
                    .path_of(binding.def().id)
                    .unwrap_or_else(|| binding.def().name.clone()),
                value: binding.value().to_string(),
                range: binding
                    .def()
                    .reference_range(form.gender())
                    .map(|(min, max)| format!("{min} .. {max}"))
                    .unwrap_or_default(),
            });
        }
    }

    let report = CheckReport {
        protocol_id,
        draft: saved.is_draft(),
        visible_fields: visible,
        filled_fields: filled,
        missing_required: form.validate_required(),
        out_of_range,
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_check(&report);
    }
    Ok(report)
}

pub fn run_finalize(args: &FinalizeArgs) -> Result<usize> {
    let mut store = JsonStore::open(&args.store)?;
    let closed = store.finalize_open_protocols(args.patient.into(), StudyTypeId(args.study_type))?;
    println!("closed {closed} draft protocol(s)");
    Ok(closed)
}

fn form_options(legacy_triggers: bool) -> FormOptions {
    FormOptions {
        trigger_rule: if legacy_triggers {
            TriggerRule::ExplicitValue
        } else {
            TriggerRule::FirstChoiceSentinel
        },
    }
}

fn gender_of(arg: GenderArg) -> Gender {
    match arg {
        GenderArg::Male => Gender::Male,
        GenderArg::Female => Gender::Female,
    }
}

/// Parse one `--set` assignment. The key is either a numeric field id or a
/// full `Tab.Group.Field` path.
fn parse_assignment(form: &ProtocolForm, assignment: &str) -> Result<(FieldId, String)> {
    let (key, value) = assignment
        .split_once('=')
        .with_context(|| format!("expected FIELD=VALUE, got `{assignment}`"))?;
    let key = key.trim();

    let field_id = if let Ok(raw) = key.parse::<i64>() {
        let id = FieldId(raw);
        if form.binding(id).is_none() {
            bail!("no field with id {raw} in this structure");
        }
        id
    } else {
        let mut segments = key.splitn(3, '.');
        match (segments.next(), segments.next(), segments.next()) {
            (Some(tab), Some(group), Some(field)) => form
                .structure()
                .resolve_path(tab, group, field)
                .with_context(|| format!("no field at path `{key}`"))?,
            _ => bail!("field key `{key}` is neither an id nor a Tab.Group.Field path"),
        }
    };
    Ok((field_id, value.to_string()))
}
