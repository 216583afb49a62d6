//! Platform operations the dispatch engine and handlers depend on.
//!
//! Every call is a single request with no internal retries.

use async_trait::async_trait;
use serde_json::Value;

use crate::ticket::TicketRef;
use servicedesk_sdk::{ApiError, Comment, CommentAuthor};

/// Errors raised by [`ServiceDesk`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceDeskError {
    #[error("Service Desk API call failed: {0}")]
    Api(#[from] ApiError),

    #[error("Service Desk is unavailable: {message}")]
    Unavailable { message: String },
}

impl ServiceDeskError {
    /// Check if error is transient and the call could succeed later
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api(e) => e.is_transient(),
            Self::Unavailable { .. } => true,
        }
    }
}

/// Ticket operations on the platform.
#[async_trait]
pub trait ServiceDesk: Send + Sync {
    /// Add a comment; `public` makes it visible to the customer.
    async fn post_comment(
        &self,
        ticket: &TicketRef,
        body: &str,
        public: bool,
    ) -> Result<(), ServiceDeskError>;

    /// Most recent comment on the ticket.
    async fn latest_comment(&self, ticket: &TicketRef)
        -> Result<Option<Comment>, ServiceDeskError>;

    /// Attach a text file, accompanied by a comment.
    async fn attach_file(
        &self,
        ticket: &TicketRef,
        filename: &str,
        content: String,
        comment: &str,
        public: bool,
    ) -> Result<(), ServiceDeskError>;

    async fn assign_issue(&self, ticket: &TicketRef, account: &str)
        -> Result<(), ServiceDeskError>;

    /// Move the ticket to the named status.
    async fn transition_issue(
        &self,
        ticket: &TicketRef,
        status: &str,
    ) -> Result<(), ServiceDeskError>;

    /// Fetch the current issue document.
    async fn fetch_ticket(&self, ticket: &TicketRef) -> Result<Value, ServiceDeskError>;

    /// Whether `author` is the account the automation itself acts as.
    fn is_automation_account(&self, author: &CommentAuthor) -> bool;
}
