//! MediAnalyze Pro CLI.

use std::io::{self, IsTerminal};

use anyhow::Result;
use clap::{ColorChoice, Parser};
use serde::Serialize;
use tracing::level_filters::LevelFilter;

use medi_cli::cli::{
    Cli, Command, ImageCommand, LogFormatArg, LogLevelArg, PatientsCommand, SignalCommand,
};
use medi_cli::commands::{
    AppContext, run_correlate, run_export, run_image_delete, run_image_list, run_image_register,
    run_import, run_init_db, run_matrix, run_patient_delete, run_patient_list, run_patient_show,
    run_signal_generate, run_signal_list, run_signal_register, run_spectrum, run_stats, run_trend,
    run_validate,
};
use medi_cli::config::Config;
use medi_cli::logging::{LogConfig, LogFormat, init_logging};
use medi_cli::summary;

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let exit_code = match run(&cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: &Cli) -> Result<i32> {
    let config = Config::load(cli.config.as_deref())?;
    let ctx = AppContext::new(config, cli.database.as_deref());
    let json = cli.json;
    match &cli.command {
        Command::InitDb => emit(json, &run_init_db(&ctx)?, summary::print_init_db),
        Command::Validate(args) => {
            let report = run_validate(&ctx, args)?;
            emit(json, &report, |r| summary::print_validation(r, args.show))?;
            Ok(i32::from(report.has_rejections()))
        }
        Command::Import(args) => {
            let report = run_import(&ctx, args, !json)?;
            emit(json, &report, summary::print_import)?;
            Ok(i32::from(report.has_failures()))
        }
        Command::Export(args) => emit(json, &run_export(&ctx, args)?, summary::print_export),
        Command::Patients(PatientsCommand::List(args)) => {
            emit(json, &run_patient_list(&ctx, args)?, |p| summary::print_patients(p))
        }
        Command::Patients(PatientsCommand::Show { patient_id }) => emit(
            json,
            &run_patient_show(&ctx, *patient_id)?,
            summary::print_patient,
        ),
        Command::Patients(PatientsCommand::Delete { patient_id }) => emit(
            json,
            &run_patient_delete(&ctx, *patient_id)?,
            summary::print_deleted_patient,
        ),
        Command::Stats(args) => emit(json, &run_stats(&ctx, args)?, summary::print_stats),
        Command::Correlate(args) => {
            emit(json, &run_correlate(&ctx, args)?, summary::print_correlation)
        }
        Command::CorrelationMatrix(args) => {
            emit(json, &run_matrix(&ctx, args)?, summary::print_matrix)
        }
        Command::Trend(args) => emit(json, &run_trend(&ctx, args)?, summary::print_trend),
        Command::Spectrum(args) => emit(json, &run_spectrum(&ctx, args)?, summary::print_spectrum),
        Command::Signal(SignalCommand::Register(args)) => emit(
            json,
            &run_signal_register(&ctx, args)?,
            summary::print_registered_signal,
        ),
        Command::Signal(SignalCommand::Generate(args)) => emit(
            json,
            &run_signal_generate(&ctx, args)?,
            summary::print_generated_signal,
        ),
        Command::Signal(SignalCommand::List {
            patient,
            signal_type,
        }) => emit(
            json,
            &run_signal_list(&ctx, *patient, signal_type.as_deref())?,
            |s| summary::print_signals(s),
        ),
        Command::Image(ImageCommand::Register(args)) => {
            let image = run_image_register(&ctx, args)?;
            emit(json, &image, |i| summary::print_images(std::slice::from_ref(i)))
        }
        Command::Image(ImageCommand::List { patient }) => emit(
            json,
            &run_image_list(&ctx, *patient)?,
            |i| summary::print_images(i),
        ),
        Command::Image(ImageCommand::Delete { image_id }) => {
            let deleted = run_image_delete(&ctx, *image_id)?;
            emit(json, &deleted, |id| println!("Deleted image {id}"))
        }
    }
}

/// Print `value` as JSON or through its table printer.
fn emit<T: Serialize>(json: bool, value: &T, print: impl FnOnce(&T)) -> Result<i32> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print(value);
    }
    Ok(0)
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone();
    config.log_data = cli.log_data;
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
