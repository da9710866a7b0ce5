//! CLI argument definitions for the protocol form tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "protoform",
    version,
    about = "Schema-driven clinical protocol forms",
    long_about = "Inspect study type structures, enter protocol values through the\n\
                  form engine (triggers, formulas, reference ranges), and review\n\
                  saved protocols in a JSON value store."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the form structure of a study type.
    Schema(SchemaArgs),

    /// List saved protocols.
    Protocols(ProtocolsArgs),

    /// Show the saved values of one protocol.
    Show(ShowArgs),

    /// Enter values into a protocol through the form engine and save.
    Record(RecordArgs),

    /// Open a protocol and report missing required fields and out-of-range
    /// values.
    Check(CheckArgs),

    /// Close every open draft for a patient and study type.
    Finalize(FinalizeArgs),
}

#[derive(Parser)]
pub struct SchemaArgs {
    /// Path to the JSON store file.
    #[arg(value_name = "STORE")]
    pub store: PathBuf,

    /// Study type to show; when omitted, lists available study types.
    #[arg(long = "study-type", value_name = "ID")]
    pub study_type: Option<i64>,
}

#[derive(Parser)]
pub struct ProtocolsArgs {
    /// Path to the JSON store file.
    #[arg(value_name = "STORE")]
    pub store: PathBuf,

    /// Only protocols of this patient.
    #[arg(long = "patient", value_name = "ID")]
    pub patient: Option<i64>,
}

#[derive(Parser)]
pub struct ShowArgs {
    /// Path to the JSON store file.
    #[arg(value_name = "STORE")]
    pub store: PathBuf,

    /// Protocol to show.
    #[arg(long = "protocol", value_name = "ID")]
    pub protocol: i64,
}

#[derive(Parser)]
pub struct RecordArgs {
    /// Path to the JSON store file.
    #[arg(value_name = "STORE")]
    pub store: PathBuf,

    /// Patient the protocol belongs to.
    #[arg(long = "patient", value_name = "ID")]
    pub patient: i64,

    /// Study type of the protocol.
    #[arg(long = "study-type", value_name = "ID")]
    pub study_type: i64,

    /// Patient gender, selects the reference range band.
    #[arg(long = "gender", value_enum)]
    pub gender: GenderArg,

    /// Doctor recorded on a newly created protocol.
    #[arg(long = "doctor", value_name = "ID", default_value_t = 0)]
    pub doctor: i64,

    /// Device recorded on a newly created protocol.
    #[arg(long = "device", value_name = "ID")]
    pub device: Option<i64>,

    /// Institution recorded on a newly created protocol.
    #[arg(long = "institution", value_name = "ID", default_value_t = 0)]
    pub institution: i64,

    /// Field assignment, `Tab.Group.Field=value` or `<field id>=value`.
    /// Repeatable.
    #[arg(long = "set", value_name = "FIELD=VALUE")]
    pub set: Vec<String>,

    /// Start a fresh protocol instead of resuming the open draft.
    #[arg(long = "new")]
    pub new: bool,

    /// Finalize the protocol after saving. Refused while required fields
    /// are empty.
    #[arg(long = "finalize")]
    pub finalize: bool,

    /// Use the stored trigger value instead of the first-choice rule for
    /// field visibility.
    #[arg(long = "legacy-triggers")]
    pub legacy_triggers: bool,
}

#[derive(Parser)]
pub struct CheckArgs {
    /// Path to the JSON store file.
    #[arg(value_name = "STORE")]
    pub store: PathBuf,

    /// Protocol to check.
    #[arg(long = "protocol", value_name = "ID")]
    pub protocol: i64,

    /// Patient gender, selects the reference range band.
    #[arg(long = "gender", value_enum)]
    pub gender: GenderArg,

    /// Use the stored trigger value instead of the first-choice rule for
    /// field visibility.
    #[arg(long = "legacy-triggers")]
    pub legacy_triggers: bool,

    /// Emit the report as JSON instead of text.
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Parser)]
pub struct FinalizeArgs {
    /// Path to the JSON store file.
    #[arg(value_name = "STORE")]
    pub store: PathBuf,

    /// Patient whose drafts are closed.
    #[arg(long = "patient", value_name = "ID")]
    pub patient: i64,

    /// Study type whose drafts are closed.
    #[arg(long = "study-type", value_name = "ID")]
    pub study_type: i64,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum GenderArg {
    Male,
    Female,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
