//! Log formatting and console output with ANSI colors
//!
//! Handles:
//! - Colorized console output with tag and level formatting
//! - Multi-line messages aligned under the prefix
//! - Broken pipe handling for piped commands

use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

/// Log format widths for alignment
const TAG_WIDTH: usize = 12;
const LEVEL_WIDTH: usize = 7;

/// Format and output a log message
pub fn format_and_log(tag: LogTag, level: LogLevel, message: &str) {
    let time = Local::now().format("%H:%M:%S").to_string();
    let prefix = format!(
        "{} [{}] [{}] ",
        time.dimmed(),
        format_tag(&tag),
        format_level(level)
    );

    let mut lines = message.split('\n');
    let first = lines.next().unwrap_or_default();
    print_stdout_safe(&format!("{}{}", prefix, first));

    // Continuation lines are indented under the message column
    let indent = " ".repeat(time.len() + TAG_WIDTH + LEVEL_WIDTH + 7);
    for line in lines {
        print_stdout_safe(&format!("{}{}", indent, line));
    }
}

/// Format a tag with appropriate color
fn format_tag(tag: &LogTag) -> ColoredString {
    let label = format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH);
    match tag {
        LogTag::System => label.bright_yellow().bold(),
        LogTag::Config => label.yellow(),
        LogTag::Events => label.bright_magenta().bold(),
        LogTag::Stats => label.bright_green().bold(),
        LogTag::Cache => label.bright_blue().bold(),
        LogTag::Coordinator => label.bright_cyan().bold(),
        LogTag::Registry => label.cyan(),
        LogTag::Protocol => label.blue(),
        LogTag::Webserver => label.green(),
    }
}

/// Format the level column
fn format_level(level: LogLevel) -> ColoredString {
    let label = format!("{:<width$}", level.as_str(), width = LEVEL_WIDTH);
    match level {
        LogLevel::Error => label.bright_red().bold(),
        LogLevel::Warning => label.yellow().bold(),
        LogLevel::Info => label.normal(),
        LogLevel::Debug => label.dimmed(),
        LogLevel::Verbose => label.dimmed().italic(),
    }
}

/// Print to stdout, silently ignoring broken pipes
fn print_stdout_safe(line: &str) {
    let mut out = stdout().lock();
    if let Err(e) = writeln!(out, "{}", line) {
        if e.kind() != ErrorKind::BrokenPipe {
            eprintln!("{}", line);
        }
    }
}
