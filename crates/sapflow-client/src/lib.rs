//! # sapflow-client
//!
//! Client library for the SAP workflow approval API.
//!
//! This crate provides:
//! - An OAuth2 client-credentials token source with an explicit, shareable
//!   token cache
//! - A resource client that lists workflow tasks and sends approve / reject
//!   decisions
//! - Normalization of the inconsistent list and decision response formats
//!
//! ## Example
//!
//! ```no_run
//! use sapflow_client::{WorkflowApi, WorkflowClient};
//! use sapflow_common::Config;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::new("https://proxy.example.com/api", "https://auth.example.com")
//!     .with_client_credentials("my-client", "my-secret");
//!
//! let client = WorkflowClient::new(config)?;
//!
//! for task in client.list_tasks().await? {
//!     println!("{} {}", task.instance_id, task.display_title());
//! }
//!
//! let status = client.approve("000001234567").await?;
//! println!("Decision status: {status}");
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use sapflow_common::{Decision, WorkflowTask};

pub mod clock;
pub mod credentials;
pub mod error;
pub mod response;
pub mod token;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use clock::{Clock, SystemClock};
pub use credentials::ClientCredentials;
pub use error::ClientError;
pub use token::{CachedToken, TokenCache, TokenGrant, TokenProvider, TokenSource};
pub use workflow::WorkflowClient;

/// Operations offered by the workflow resource endpoints.
///
/// Implementations must be thread-safe (Send + Sync).
#[must_use = "WorkflowApi must be used to make requests"]
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// Fetch the current task inbox.
    ///
    /// Unexpected payload shapes yield an empty list rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an error if no token can be obtained, the endpoint answers
    /// 401 ([`ClientError::AuthExpired`]), no response is received, or the
    /// endpoint answers any other non-success status.
    async fn list_tasks(&self) -> Result<Vec<WorkflowTask>, ClientError>;

    /// Send a decision for a task and return the status the server reports.
    ///
    /// `comment` defaults to the decision's standard comment.
    ///
    /// # Errors
    ///
    /// As for [`WorkflowApi::list_tasks`], plus
    /// [`ClientError::DecisionRejected`] when an XML response reports a
    /// status other than `COMPLETED`.
    async fn decide(
        &self,
        instance_id: &str,
        decision: Decision,
        comment: Option<&str>,
    ) -> Result<String, ClientError>;

    /// Approve a task with the default comment.
    ///
    /// # Errors
    ///
    /// See [`WorkflowApi::decide`].
    async fn approve(&self, instance_id: &str) -> Result<String, ClientError> {
        self.decide(instance_id, Decision::Approve, None).await
    }

    /// Reject a task with the default comment.
    ///
    /// # Errors
    ///
    /// See [`WorkflowApi::decide`].
    async fn reject(&self, instance_id: &str) -> Result<String, ClientError> {
        self.decide(instance_id, Decision::Reject, None).await
    }
}
