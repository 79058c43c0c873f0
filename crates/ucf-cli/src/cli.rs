//! Argument definitions for the `ucf` tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "ucf",
    version,
    about = "Staged configuration editing over a JSON config dump",
    long_about = "Edit a hierarchical configuration dump through the staged\n\
                  edit engine: reads and writes go through the same client,\n\
                  overlay and store layers used against a live device."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the JSON config dump to operate on.
    #[arg(
        short = 'f',
        long = "file",
        value_name = "PATH",
        default_value = "config.json",
        global = true
    )]
    pub file: PathBuf,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Log output format.
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
    /// Print the resolved sections of a config namespace.
    Show(ShowArgs),

    /// Read one option value, or a section's type tag.
    Get(GetArgs),

    /// Write one option value.
    Set(SetArgs),

    /// Create a section; prints the assigned id.
    Add(AddArgs),

    /// Delete a section or one of its options.
    Delete(DeleteArgs),

    /// Reorder the sections of a config namespace.
    Order(OrderArgs),

    /// List staged changes, for one config or all of them.
    Changes(ChangesArgs),

    /// Make staged changes durable.
    Commit(ChangesArgs),

    /// Compile a datatype expression and validate a value against it.
    Check(CheckArgs),
}

#[derive(Parser)]
pub struct ShowArgs {
    /// Config namespace, e.g. `network`.
    pub config: String,

    /// Restrict output to sections of this type.
    #[arg(long = "type", value_name = "TYPE")]
    pub section_type: Option<String>,
}

#[derive(Parser)]
pub struct GetArgs {
    pub config: String,
    pub section: String,
    /// Omit to read the section's type tag.
    pub option: Option<String>,
}

#[derive(Parser)]
pub struct SetArgs {
    pub config: String,
    pub section: String,
    pub option: String,
    /// Values with spaces are stored as lists of tokens.
    pub value: String,

    /// Store the value as a list, split on whitespace.
    #[arg(long = "list")]
    pub list: bool,
}

#[derive(Parser)]
pub struct AddArgs {
    pub config: String,
    /// Section type tag, e.g. `interface`.
    #[arg(value_name = "TYPE")]
    pub section_type: String,

    /// Name the section instead of creating it anonymously.
    #[arg(long = "name", value_name = "NAME")]
    pub name: Option<String>,
}

#[derive(Parser)]
pub struct DeleteArgs {
    pub config: String,
    pub section: String,
    /// Omit to delete the whole section.
    pub option: Option<String>,
}

#[derive(Parser)]
pub struct OrderArgs {
    pub config: String,
    /// Section ids in the desired order.
    #[arg(required = true)]
    pub sections: Vec<String>,
}

#[derive(Parser)]
pub struct ChangesArgs {
    /// Omit to cover every config namespace.
    pub config: Option<String>,
}

#[derive(Parser)]
pub struct CheckArgs {
    /// Datatype expression, e.g. `or(range(1,10),'auto')`.
    pub datatype: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
