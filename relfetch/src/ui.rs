use chrono::{DateTime, Local};
use colored::*;
use relfetch_lib::logging::UI_TARGET;

// Info lines go to stdout, warnings and errors to stderr.

pub fn success(msg: &str) {
    tracing::info!(target: UI_TARGET, "{} {}", "✓".green(), msg.green());
}

pub fn error(msg: &str) {
    tracing::error!(target: UI_TARGET, "{} {}", "Error:".red().bold(), msg.red());
}

pub fn warning(msg: &str) {
    tracing::warn!(target: UI_TARGET, "{} {}", "Warning:".yellow().bold(), msg.yellow());
}

pub fn info(msg: &str) {
    tracing::info!(target: UI_TARGET, "{msg}");
}

pub fn tip(msg: &str) {
    tracing::info!(target: UI_TARGET, "{} {}", "Tip:".dimmed(), msg.dimmed());
}

pub fn blank_line() {
    info("");
}

/// Renders an API timestamp as a local date with its age, or verbatim when it
/// is not RFC 3339.
pub fn format_created_at(created_at: &str) -> String {
    format_created_at_relative_to(created_at, Local::now())
}

fn format_created_at_relative_to(created_at: &str, now: DateTime<Local>) -> String {
    match DateTime::parse_from_rfc3339(created_at) {
        Ok(timestamp) => {
            let local = timestamp.with_timezone(&Local);
            let days_ago = now.signed_duration_since(local).num_days().max(0);
            let age = match days_ago {
                0 => "today".to_string(),
                1 => "1 day ago".to_string(),
                n => format!("{n} days ago"),
            };
            format!("{} ({})", local.format("%Y-%m-%d %H:%M"), age)
        }
        Err(_) => created_at.to_string(),
    }
}
