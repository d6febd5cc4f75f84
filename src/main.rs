//! Office Relay - supervised office-suite conversions with live output relay.

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use office_relay::config::{AppConfig, ConfigLoader};
use office_relay::display;
use office_relay::office::{
    interpreter_hints, wait_for_acceptor, ConversionRequest, ConverterLauncher, LauncherError,
};
use office_relay::process::{HandlerError, LaunchError, LaunchSpec, RelayedLine, RunResult};
use office_relay::registry::{
    build_report, read_merged, ComponentTable, ReportOptions, FILTER_TABLE, TYPE_TABLE,
};
use office_relay::retry::RetryPolicy;

/// Exit code when the executable could not be found or started.
const EXIT_LAUNCH_FAILED: u8 = 127;

/// Exit code when the executable exists but may not be executed.
const EXIT_NOT_EXECUTABLE: u8 = 126;

/// Exit code after Ctrl-C cancelled the run.
const EXIT_CANCELLED: u8 = 130;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReportFormat {
    Csv,
    Json,
}

#[derive(Parser)]
#[command(
    name = "office-relay",
    about = "Supervised office-suite conversions with live output relay",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a config file (defaults to .office-relay.toml, then the user config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch a program and relay its output live.
    Supervise {
        /// Program to run followed by its arguments, passed through unchanged.
        #[arg(
            value_name = "COMMAND",
            trailing_var_arg = true,
            allow_hyphen_values = true,
            required = true
        )]
        command: Vec<String>,
    },
    /// Convert a presentation with the office suite's interpreter and conversion script.
    Convert {
        /// Presentation to convert.
        input: PathBuf,
        /// Where to write the PowerPoint 2007+ file.
        output: PathBuf,
        /// Password of the input document.
        password: Option<String>,
        /// Interpreter bundled with the office suite.
        #[arg(long)]
        python: Option<PathBuf>,
        /// Conversion script to run.
        #[arg(long)]
        script: Option<PathBuf>,
        /// Wait for an office listener at host:port before converting.
        #[arg(long)]
        acceptor: Option<String>,
    },
    /// List import/export filters from registry files.
    Filters {
        /// Registry files (.xcd / .xcu) to read.
        files: Vec<PathBuf>,
        /// Write the report here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Filter fields to show, comma separated.
        #[arg(long, value_delimiter = ',')]
        fields: Option<Vec<String>>,
        /// Flags to keep in the Flags column, comma separated.
        #[arg(long, value_delimiter = ',')]
        flags: Option<Vec<String>>,
        /// Show every filter field.
        #[arg(long)]
        all_fields: bool,
        /// Show every flag.
        #[arg(long)]
        all_flags: bool,
        /// Column to sort rows by.
        #[arg(long)]
        key_field: Option<String>,
        /// Join type fields onto each filter.
        #[arg(long)]
        show_type_fields: bool,
        /// Type fields to show, comma separated.
        #[arg(long, value_delimiter = ',')]
        type_fields: Option<Vec<String>>,
        /// Show every type field.
        #[arg(long)]
        all_type_fields: bool,
        /// Output format.
        #[arg(long, value_enum, default_value_t = ReportFormat::Csv)]
        format: ReportFormat,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Map a child exit code onto the 0-255 range of our own exit status.
fn exit_status(result: &RunResult) -> ExitCode {
    if result.cancelled {
        return ExitCode::from(EXIT_CANCELLED);
    }
    ExitCode::from(u8::try_from(result.exit_code.rem_euclid(256)).unwrap_or(1))
}

fn launch_failure(err: &LaunchError) -> ExitCode {
    display::print_error(&err.to_string());
    match err {
        LaunchError::PermissionDenied { .. } => ExitCode::from(EXIT_NOT_EXECUTABLE),
        LaunchError::Wait { .. } => ExitCode::FAILURE,
        LaunchError::NotFound { .. } | LaunchError::Io { .. } => {
            ExitCode::from(EXIT_LAUNCH_FAILED)
        }
    }
}

/// Token cancelled on the first Ctrl-C.
fn ctrl_c_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling run");
            token.cancel();
        }
    });
    cancel
}

async fn supervise(config: &AppConfig, command: Vec<String>) -> ExitCode {
    let mut command = command.into_iter();
    let Some(executable) = command.next() else {
        display::print_error("no command given");
        return ExitCode::FAILURE;
    };
    let spec = LaunchSpec::new(executable).args(command);
    let supervisor = config.relay.supervisor().with_cancellation(ctrl_c_token());

    let mut handler = |line: &RelayedLine| -> Result<(), HandlerError> {
        display::relay_line(line).map_err(Into::into)
    };

    match supervisor.run(spec, &mut handler).await {
        Ok(result) => exit_status(&result),
        Err(e) => launch_failure(&e),
    }
}

async fn convert(
    config: &AppConfig,
    request: ConversionRequest,
    python: Option<PathBuf>,
    script: Option<PathBuf>,
    acceptor: Option<String>,
) -> ExitCode {
    let mut office = config.office.clone();
    if let Some(python) = python {
        office.python = python;
    }
    if let Some(script) = script {
        office.script = script;
    }
    if acceptor.is_some() {
        office.acceptor = acceptor;
    }

    let launcher = ConverterLauncher::from_config(&office);
    if let Err(e) = launcher.check(&request) {
        display::print_error(&e.to_string());
        if matches!(e, LauncherError::InterpreterNotFound { .. }) {
            display::print_hints("Common paths:", interpreter_hints());
        }
        return ExitCode::FAILURE;
    }

    if let Some(endpoint) = office.acceptor.as_deref() {
        display::print_waiting(endpoint);
        let policy = RetryPolicy::from(config.retry);
        if let Err(e) = wait_for_acceptor(endpoint, &policy).await {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    }

    display::print_command(&launcher.display_command(&request));
    display::print_section("Script Output");

    let supervisor = config.relay.supervisor().with_cancellation(ctrl_c_token());
    let mut handler = |line: &RelayedLine| -> Result<(), HandlerError> {
        display::relay_line_highlighted(line).map_err(Into::into)
    };

    match supervisor.run(launcher.launch_spec(&request), &mut handler).await {
        Ok(result) => {
            display::print_run_summary(&result);
            exit_status(&result)
        }
        Err(e) => launch_failure(&e),
    }
}

fn filters(
    files: &[PathBuf],
    options: &ReportOptions,
    out: Option<PathBuf>,
    format: ReportFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter_table = read_merged(files, FILTER_TABLE)?;
    let type_table = if options.show_type_fields {
        read_merged(files, TYPE_TABLE)?
    } else {
        ComponentTable::new()
    };
    tracing::info!(
        filters = filter_table.len(),
        types = type_table.len(),
        "Registry loaded"
    );

    let report = build_report(&filter_table, &type_table, options);
    let writer: Box<dyn io::Write> = match out {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };

    match format {
        ReportFormat::Csv => report.write_csv(writer)?,
        ReportFormat::Json => report.write_json(writer)?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = cli
        .config
        .map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let config = match loader.load() {
        Ok(config) => config,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Supervise { command } => supervise(&config, command).await,
        Commands::Convert {
            input,
            output,
            password,
            python,
            script,
            acceptor,
        } => {
            let mut request = ConversionRequest::new(input, output);
            request.password = password;
            convert(&config, request, python, script, acceptor).await
        }
        Commands::Filters {
            files,
            out,
            fields,
            flags,
            all_fields,
            all_flags,
            key_field,
            show_type_fields,
            type_fields,
            all_type_fields,
            format,
        } => {
            let mut options = config.registry.clone();
            if let Some(fields) = fields {
                options.fields = fields;
            }
            if let Some(flags) = flags {
                options.flags = flags;
            }
            if let Some(key_field) = key_field {
                options.key_field = key_field;
            }
            if let Some(type_fields) = type_fields {
                options.type_fields = type_fields;
            }
            options.all_fields |= all_fields;
            options.all_flags |= all_flags;
            options.show_type_fields |= show_type_fields;
            options.all_type_fields |= all_type_fields;

            match filters(&files, &options, out, format) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    display::print_error(&e.to_string());
                    ExitCode::FAILURE
                }
            }
        }
    }
}
