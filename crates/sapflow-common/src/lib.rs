//! # sapflow-common
//!
//! Common types shared by the SAP workflow client and its front ends:
//! - Workflow tasks and their statuses
//! - Approve / reject decisions and their SAP decision codes
//! - Client configuration
//! - Case-insensitive field resolution for loosely shaped payloads
//!
//! ## Example
//!
//! ```
//! use sapflow_common::{Decision, TaskStats, WorkflowTask};
//! use serde_json::json;
//!
//! let task = WorkflowTask::from_json(&json!({"InstanceID": "1", "status": "READY"}))
//!     .unwrap_or_else(|| WorkflowTask::builder().instance_id("1").build());
//!
//! let stats = TaskStats::from_tasks(&[task]);
//! assert_eq!(stats.ready, 1);
//! assert_eq!(Decision::Approve.code(), "0001");
//! ```

/// Client configuration.
pub mod client;
/// Approval decisions.
pub mod decision;
/// Case-insensitive JSON field lookup.
pub mod fields;
/// Workflow task types.
pub mod task;

pub use client::Config;
pub use decision::Decision;
pub use fields::FieldResolver;
pub use task::{TaskStats, TaskStatus, WorkflowTask, parse_sap_timestamp};
