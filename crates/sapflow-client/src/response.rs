//! Normalization of SAP workflow responses.
//!
//! The list endpoint is not consistent about its envelope: it may return
//! `{"TaskCollection": {"Task": {...}}}` for a single task,
//! `{"TaskCollection": {"Task": [...]}}` for several, or a bare array when
//! a proxy has already unwrapped it. All of these become a flat
//! `Vec<WorkflowTask>`; any other shape becomes an empty list.
//!
//! The decision endpoint answers either XML (`<Task><Status>..</Status></Task>`)
//! or JSON with a loosely cased `status` member.

use log::{debug, warn};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde_json::Value;

use sapflow_common::{FieldResolver, WorkflowTask};

use crate::error::ClientError;

/// Status reported for a successfully decided task.
pub const COMPLETED: &str = "COMPLETED";

/// Parses a list response body into tasks.
///
/// Never fails: bodies that are not JSON, or JSON of an unexpected shape,
/// yield an empty list and a warning.
#[must_use]
pub fn parse_task_list(body: &str) -> Vec<WorkflowTask> {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => tasks_from_value(&value),
        Err(e) => {
            warn!("Task list response is not JSON ({e}); treating as empty");
            Vec::new()
        }
    }
}

/// Flattens any known task list envelope.
#[must_use]
pub fn tasks_from_value(value: &Value) -> Vec<WorkflowTask> {
    if let Value::Array(items) = value {
        return tasks_from_items(items);
    }

    let task = FieldResolver::from_value(value)
        .and_then(|root| root.get("TaskCollection"))
        .and_then(FieldResolver::from_value)
        .and_then(|collection| collection.get("Task"));

    match task {
        Some(Value::Array(items)) => tasks_from_items(items),
        Some(single @ Value::Object(_)) => WorkflowTask::from_json(single).into_iter().collect(),
        _ => {
            warn!("Unexpected task list format; treating as empty");
            debug!("Unexpected task list payload: {value}");
            Vec::new()
        }
    }
}

fn tasks_from_items(items: &[Value]) -> Vec<WorkflowTask> {
    let tasks: Vec<WorkflowTask> = items.iter().filter_map(WorkflowTask::from_json).collect();
    if tasks.len() != items.len() {
        warn!(
            "Skipped {} non-object entries in task list",
            items.len() - tasks.len()
        );
    }
    tasks
}

/// Returns true if a decision response should be read as XML.
#[must_use]
pub fn is_xml(content_type: Option<&str>, body: &str) -> bool {
    content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("xml"))
        || body.trim_start().starts_with('<')
}

/// Extracts the text of the first `Status` element that is a direct child
/// of a `Task` element. Namespace prefixes are ignored.
///
/// Returns `None` when no such element exists, it is empty, or the
/// document is malformed before one is found.
#[must_use]
pub fn xml_task_status(body: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut status: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name().as_ref().to_vec();
                if status.is_none() && is_task_status(&stack, &name) {
                    status = Some(String::new());
                }
                stack.push(name);
            }
            Ok(Event::Text(e)) => {
                if let Some(text) = status.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(_)) => {
                if status.is_some() {
                    break;
                }
                stack.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warn!("Malformed XML in decision response: {e}");
                break;
            }
            Ok(_) => {}
        }
    }

    status
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn is_task_status(stack: &[Vec<u8>], name: &[u8]) -> bool {
    let parent = stack.last().map(Vec::as_slice);
    name == b"Status" && parent == Some(b"Task".as_slice())
}

/// Reads the status from a JSON decision response.
///
/// The key is matched case-insensitively. Missing status, non-object
/// payloads and unparseable bodies all default to `COMPLETED`.
#[must_use]
pub fn json_status(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(FieldResolver::from_value)
        .and_then(|fields| fields.text("Status"))
        .unwrap_or_else(|| COMPLETED.to_string())
}

/// Interprets a successful decision response.
///
/// # Errors
///
/// Returns [`ClientError::DecisionRejected`] when an XML response does not
/// report `COMPLETED`.
pub fn decision_status(
    instance_id: &str,
    content_type: Option<&str>,
    body: &str,
) -> Result<String, ClientError> {
    if !is_xml(content_type, body) {
        return Ok(json_status(body));
    }

    match xml_task_status(body) {
        Some(status) if status == COMPLETED => Ok(status),
        status => Err(ClientError::DecisionRejected {
            instance_id: instance_id.to_string(),
            status,
        }),
    }
}
