//! `ucf` command line entry point.

use std::io::{self, IsTerminal};

use clap::{ColorChoice, Parser};

use ucf_cli::logging::{LogConfig, LogFormat, init_logging};

mod cli;
mod commands;

use crate::cli::{Cli, Command, LogFormatArg};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    if let Command::Check(args) = &cli.command {
        return commands::run_check(args);
    }

    let workspace = commands::Workspace::open(&cli.file)?;
    match cli.command {
        Command::Show(args) => commands::run_show(&workspace, &args).await?,
        Command::Get(args) => commands::run_get(&workspace, &args).await?,
        Command::Set(args) => commands::run_set(&workspace, &args).await?,
        Command::Add(args) => commands::run_add(&workspace, &args).await?,
        Command::Delete(args) => commands::run_delete(&workspace, &args).await?,
        Command::Order(args) => commands::run_order(&workspace, &args).await?,
        Command::Changes(args) => commands::run_changes(&workspace, &args).await?,
        Command::Commit(args) => commands::run_commit(&workspace, &args).await?,
        Command::Check(_) => unreachable!("handled above"),
    }
    Ok(0)
}

fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !cli.verbosity.is_present();
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone();
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
