//! Colored CLI display utilities for supervised runs.
//!
//! Relayed child output is written verbatim to the matching stream; banners
//! and summaries are decorated.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::process::{RelayedLine, RunResult, StreamOrigin};

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Write a relayed line to the stream it came from, unmodified.
///
/// # Errors
///
/// Returns an error if the terminal stream is closed.
pub fn relay_line(line: &RelayedLine) -> io::Result<()> {
    match line.origin {
        StreamOrigin::Stdout => {
            let mut out = io::stdout().lock();
            out.write_all(line.text.as_bytes())?;
            out.flush()
        }
        StreamOrigin::Stderr => {
            let mut err = io::stderr().lock();
            err.write_all(line.text.as_bytes())?;
            err.flush()
        }
    }
}

/// Write a relayed line, highlighting stderr lines.
///
/// # Errors
///
/// Returns an error if the terminal stream is closed.
pub fn relay_line_highlighted(line: &RelayedLine) -> io::Result<()> {
    match line.origin {
        StreamOrigin::Stdout => relay_line(line),
        StreamOrigin::Stderr => {
            let mut err = io::stderr().lock();
            writeln!(err, "{} {}", "[stderr]".red().bold(), line.content().red())?;
            err.flush()
        }
    }
}

/// Print the command about to be run.
pub fn print_command(command_line: &str) {
    println!(
        "{} {} Running command: {}",
        timestamp().dimmed(),
        "[RUN]".blue().bold(),
        command_line.cyan()
    );
    let _ = io::stdout().flush();
}

/// Print a section header.
pub fn print_section(title: &str) {
    println!("\n{}", format!("--- {title} ---").bold());
    let _ = io::stdout().flush();
}

/// Print the outcome of a supervised run.
pub fn print_run_summary(result: &RunResult) {
    let ts = timestamp();
    if result.cancelled {
        println!(
            "{} {} Cancelled, process exited with code {}",
            ts.dimmed(),
            "[EXIT]".yellow().bold(),
            result.exit_code
        );
    } else if result.exit_code == 0 {
        println!(
            "{} {} Finished with return code: {}",
            ts.dimmed(),
            "[EXIT]".green().bold(),
            result.exit_code
        );
    } else {
        println!(
            "{} {} Failed with return code: {}",
            ts.dimmed(),
            "[EXIT]".red().bold(),
            result.exit_code
        );
    }
    if result.handler_failures > 0 {
        println!(
            "{} {} {} line(s) could not be relayed",
            ts.dimmed(),
            "[WARN]".yellow().bold(),
            result.handler_failures
        );
    }
    let _ = io::stdout().flush();
}

/// Print a waiting notice for the office listener.
pub fn print_waiting(endpoint: &str) {
    println!(
        "{} {} Waiting for office listener at {}",
        timestamp().dimmed(),
        "[CONNECT]".magenta().bold(),
        endpoint.cyan()
    );
    let _ = io::stdout().flush();
}

/// Print an error message to stderr.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
    let _ = io::stderr().flush();
}

/// Print a list of hint lines under a heading to stderr.
pub fn print_hints(heading: &str, hints: &[&str]) {
    eprintln!("{}", heading.dimmed());
    for hint in hints {
        eprintln!("  {hint}");
    }
    let _ = io::stderr().flush();
}
