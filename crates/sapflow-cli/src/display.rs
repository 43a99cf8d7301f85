//! Display utilities for CLI output formatting
//!
//! Renders task cards, the detail view and inbox statistics.

use std::fmt::Write;

use chrono::Local;
use colored::{ColoredString, Colorize};

use sapflow_common::{TaskStats, TaskStatus, WorkflowTask};

/// Shown when a task date is missing or unparseable.
pub const INVALID_DATE: &str = "Invalid Date";

/// Status badge colored by lifecycle state.
pub fn status_badge(status: &TaskStatus) -> ColoredString {
    let label = format!("[{status}]");
    match status {
        TaskStatus::Ready => label.green().bold(),
        TaskStatus::InProgress => label.yellow().bold(),
        TaskStatus::Completed => label.dimmed(),
        _ => label.cyan(),
    }
}

/// Formats a raw SAP timestamp in local time.
///
/// Falls back to [`INVALID_DATE`] when the timestamp does not parse or
/// `format` contains an unknown specifier.
pub fn format_date(raw: Option<&str>, format: &str) -> String {
    let Some(dt) = raw.and_then(sapflow_common::parse_sap_timestamp) else {
        return INVALID_DATE.to_string();
    };

    let mut out = String::new();
    match write!(out, "{}", dt.with_timezone(&Local).format(format)) {
        Ok(()) => out,
        Err(_) => INVALID_DATE.to_string(),
    }
}

/// Renders the compact card used by `list`.
pub fn render_card(task: &WorkflowTask, date_format: &str) -> String {
    let mut lines = vec![
        format!(
            "{} {} {}",
            status_badge(&task.status),
            format!("#{}", task.instance_id).bright_black(),
            task.display_title().bold()
        ),
        format!(
            "  {} {}  {} {}",
            "by".dimmed(),
            task.display_creator(),
            "on".dimmed(),
            format_date(task.created_on.as_deref(), date_format)
        ),
    ];

    if let Some(details) = task.clean_details() {
        lines.push(format!("  {}", truncate(&details, 160)));
    }
    if let Some(url) = &task.inbox_url {
        lines.push(format!("  {}", url.underline().blue()));
    }

    lines.join("\n")
}

/// Renders every field of a task for `show`.
pub fn render_detail(task: &WorkflowTask, date_format: &str) -> String {
    let field = |name: &str, value: &str| format!("{:>12}  {value}", name.bold());
    let created_on = format_date(task.created_on.as_deref(), date_format);

    let mut lines = vec![
        field("Instance", &task.instance_id),
        field("Title", task.display_title()),
        field("Status", &status_badge(&task.status).to_string()),
        field("Created by", task.display_creator()),
        field("Created on", &created_on),
    ];
    if let Some(url) = &task.inbox_url {
        lines.push(field("Inbox", url));
    }
    if let Some(details) = task.clean_details() {
        lines.push(String::new());
        lines.push(details);
    }

    lines.join("\n")
}

/// Renders the inbox counters for `stats`.
pub fn render_stats(stats: &TaskStats) -> String {
    format!(
        "{} {}   {} {}   {} {}   {} {}",
        "Total".bold(),
        stats.total,
        "Ready".green(),
        stats.ready,
        "In progress".yellow(),
        stats.in_progress,
        "Completed".dimmed(),
        stats.completed
    )
}

/// Prints a list of task cards, or a notice when there are none.
pub fn print_task_list(tasks: &[WorkflowTask], date_format: &str) {
    if tasks.is_empty() {
        println!("{}", "No tasks found".dimmed());
        return;
    }

    for task in tasks {
        println!("{}\n", render_card(task, date_format));
    }
    println!("{}", render_stats(&TaskStats::from_tasks(tasks)));
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncate_idx = text
        .char_indices()
        .take(max_chars)
        .last()
        .map_or(0, |(idx, ch)| idx + ch.len_utf8());
    format!("{}...", &text[..truncate_idx])
}
