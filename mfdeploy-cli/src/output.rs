//! Colored status lines for the terminal.
//!
//! Operator-facing progress goes to stdout with a local timestamp;
//! failures go to stderr. Diagnostics stay on `tracing`.

use colored::Colorize;

const TIME_FORMAT: &str = "%Y-%m-%d %I:%M:%S %p";

fn timestamp() -> String {
    chrono::Local::now().format(TIME_FORMAT).to_string()
}

/// A step that is starting.
pub fn step(message: &str) {
    println!("{} {} {}", "→".cyan().bold(), timestamp().dimmed(), message);
}

/// A step or command that finished.
pub fn success(message: &str) {
    println!("{} {} {}", "✓".green().bold(), timestamp().dimmed(), message);
}

/// Something worth attention that does not stop the command.
pub fn warning(message: &str) {
    println!("{} {} {}", "⚠".yellow().bold(), timestamp().dimmed(), message);
}

/// A failure; the process will exit non-zero.
pub fn failure(message: &str) {
    eprintln!("{} {} {}", "✗".red().bold(), timestamp().dimmed(), message);
}
