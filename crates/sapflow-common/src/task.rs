//! Workflow task types.
//!
//! A [`WorkflowTask`] is a read-only projection of what the SAP workflow
//! endpoint returns. Tasks are never mutated locally: decisions are sent
//! to the server and the list is fetched again afterwards.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use typed_builder::TypedBuilder;

use crate::fields::FieldResolver;

/// Marker SAP inserts between fragments of `TaskDetails`.
const DETAILS_SEPARATOR: &str = "# $#";

/// Lifecycle state of a workflow task.
///
/// Unknown states are preserved verbatim in [`TaskStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TaskStatus {
    /// The task is waiting for a decision.
    Ready,
    /// Someone has claimed the task.
    InProgress,
    /// The task has been decided.
    Completed,
    /// Any other status reported by the server.
    Other(String),
    /// No status was reported.
    #[default]
    Unknown,
}

impl TaskStatus {
    /// Returns the wire representation of this status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ready => "READY",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Other(raw) => raw,
            Self::Unknown => "",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "UNKNOWN"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "" => Self::Unknown,
            "READY" => Self::Ready,
            "IN_PROGRESS" => Self::InProgress,
            "COMPLETED" => Self::Completed,
            other => Self::Other(other.to_string()),
        })
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_default())
    }
}

/// A unit of approval work originating from the SAP system.
///
/// # Examples
///
/// ```
/// use sapflow_common::{TaskStatus, WorkflowTask};
///
/// let task = WorkflowTask::builder()
///     .instance_id("000000123")
///     .title(Some("Purchase order 4711".to_string()))
///     .status(TaskStatus::Ready)
///     .build();
///
/// assert_eq!(task.display_title(), "Purchase order 4711");
/// assert_eq!(task.display_creator(), "Unknown");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct WorkflowTask {
    /// SAP workflow instance identifier (`InstanceID`).
    #[builder(setter(into))]
    pub instance_id: String,
    /// Task title (`TaskTitle`).
    #[builder(default)]
    pub title: Option<String>,
    /// Current status (`Status`).
    #[builder(default)]
    pub status: TaskStatus,
    /// Display name of the creator (`CreatedByName`).
    #[builder(default)]
    pub created_by: Option<String>,
    /// Creation timestamp as sent by the server (`CreatedOn`).
    #[builder(default)]
    pub created_on: Option<String>,
    /// Free-text details (`TaskDetails`).
    #[builder(default)]
    pub details: Option<String>,
    /// Link to the SAP inbox for this task (`InboxURL`).
    #[builder(default)]
    pub inbox_url: Option<String>,
}

impl WorkflowTask {
    /// Builds a task from one entry of the SAP task collection.
    ///
    /// Keys are resolved case-insensitively. Returns `None` when the value
    /// is not an object.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        FieldResolver::from_value(value).map(Self::from_fields)
    }

    fn from_fields(fields: FieldResolver<'_>) -> Self {
        Self {
            instance_id: fields.text("InstanceID").unwrap_or_default(),
            title: fields.text("TaskTitle"),
            status: fields
                .text("Status")
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            created_by: fields.text("CreatedByName"),
            created_on: fields.text("CreatedOn"),
            details: fields.text("TaskDetails"),
            inbox_url: fields.text("InboxURL"),
        }
    }

    /// Title for display, `Untitled` when absent.
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }

    /// Creator for display, `Unknown` when absent.
    #[must_use]
    pub fn display_creator(&self) -> &str {
        self.created_by.as_deref().unwrap_or("Unknown")
    }

    /// Details with SAP separator markers removed.
    ///
    /// Returns `None` when there are no details or nothing is left after
    /// cleaning.
    #[must_use]
    pub fn clean_details(&self) -> Option<String> {
        let details = self.details.as_deref()?;
        let cleaned = details.replace(DETAILS_SEPARATOR, "");
        let cleaned = cleaned.trim();
        (!cleaned.is_empty()).then(|| cleaned.to_string())
    }

    /// Parses `created_on` into a UTC timestamp.
    ///
    /// Accepts RFC 3339, naive ISO 8601 (interpreted as UTC), and the
    /// OData `/Date(<millis>)/` form.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_sap_timestamp(self.created_on.as_deref()?)
    }
}

/// Parses the timestamp formats SAP gateways emit.
#[must_use]
pub fn parse_sap_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    let inner = raw.strip_prefix("/Date(")?.strip_suffix(")/")?;
    let (sign, digits) = match inner.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, inner.strip_prefix('+').unwrap_or(inner)),
    };
    // A trailing `+0100` is a display offset; the millis are already UTC.
    let millis = digits.split(['+', '-']).next()?.parse::<i64>().ok()?;
    DateTime::from_timestamp_millis(sign * millis)
}

/// Aggregate counters over a task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TaskStats {
    /// Number of tasks.
    pub total: usize,
    /// Tasks in `READY`.
    pub ready: usize,
    /// Tasks in `IN_PROGRESS`.
    pub in_progress: usize,
    /// Tasks in `COMPLETED`.
    pub completed: usize,
}

impl TaskStats {
    /// Counts tasks by status.
    #[must_use]
    pub fn from_tasks(tasks: &[WorkflowTask]) -> Self {
        let mut stats = Self {
            total: tasks.len(),
            ..Self::default()
        };
        for task in tasks {
            match task.status {
                TaskStatus::Ready => stats.ready += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Other(_) | TaskStatus::Unknown => {}
            }
        }
        stats
    }
}
