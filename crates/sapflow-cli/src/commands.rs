//! Subcommand implementations.

use std::future::Future;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use log::warn;

use sapflow_client::{ClientError, WorkflowApi};
use sapflow_common::{Decision, TaskStats, TaskStatus, WorkflowTask};

use crate::config::Settings;
use crate::display;

/// Runs `op`, and runs it once more if it failed with an expired token.
///
/// The client has already discarded the cached token at that point, so
/// the second attempt authenticates afresh.
pub async fn with_auth_retry<T, F, Fut>(retry: bool, mut op: F) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    match op().await {
        Err(e) if retry && e.is_authentication_error() => {
            warn!("Token rejected by server; retrying with a fresh token");
            op().await
        }
        other => other,
    }
}

async fn fetch_tasks(client: &dyn WorkflowApi, settings: &Settings) -> Result<Vec<WorkflowTask>> {
    with_auth_retry(settings.retry_on_auth_expired, move || client.list_tasks())
        .await
        .context("Failed to fetch tasks")
}

/// Keeps tasks whose status matches `status`, if given.
pub fn filter_by_status(
    tasks: Vec<WorkflowTask>,
    status: Option<&TaskStatus>,
) -> Vec<WorkflowTask> {
    match status {
        Some(status) => tasks.into_iter().filter(|t| &t.status == status).collect(),
        None => tasks,
    }
}

/// `sapflow list`
pub async fn list(
    client: &dyn WorkflowApi,
    settings: &Settings,
    status: Option<&str>,
) -> Result<()> {
    let status = status.map(parse_status);
    let tasks = filter_by_status(fetch_tasks(client, settings).await?, status.as_ref());
    display::print_task_list(&tasks, &settings.date_format);
    Ok(())
}

/// `sapflow stats`
pub async fn stats(client: &dyn WorkflowApi, settings: &Settings) -> Result<()> {
    let tasks = fetch_tasks(client, settings).await?;
    println!("{}", display::render_stats(&TaskStats::from_tasks(&tasks)));
    Ok(())
}

/// `sapflow show <id>`
pub async fn show(client: &dyn WorkflowApi, settings: &Settings, instance_id: &str) -> Result<()> {
    let tasks = fetch_tasks(client, settings).await?;
    let Some(task) = find_task(&tasks, instance_id) else {
        bail!("Task {instance_id} not found");
    };
    println!("{}", display::render_detail(task, &settings.date_format));
    Ok(())
}

/// `sapflow approve|reject <id>`
pub async fn decide(
    client: &dyn WorkflowApi,
    settings: &Settings,
    instance_id: &str,
    decision: Decision,
    comment: Option<&str>,
    refresh: bool,
) -> Result<()> {
    let status = with_auth_retry(settings.retry_on_auth_expired, move || {
        client.decide(instance_id, decision, comment)
    })
    .await
    .with_context(|| format!("Failed to {decision} task {instance_id}"))?;

    println!(
        "{} Task {instance_id} {} ({status})",
        "✓".green().bold(),
        decision.past_tense()
    );

    if refresh && settings.refresh_after_decision {
        println!();
        let tasks = fetch_tasks(client, settings).await?;
        display::print_task_list(&tasks, &settings.date_format);
    }
    Ok(())
}

fn find_task<'a>(tasks: &'a [WorkflowTask], instance_id: &str) -> Option<&'a WorkflowTask> {
    tasks.iter().find(|t| t.instance_id == instance_id)
}

/// Reads a `--status` value. Case, spaces and dashes are not significant.
fn parse_status(raw: &str) -> TaskStatus {
    let normalized = raw.trim().to_ascii_uppercase().replace([' ', '-'], "_");
    if normalized == "UNKNOWN" {
        return TaskStatus::Unknown;
    }
    let Ok(status) = normalized.parse::<TaskStatus>();
    status
}
