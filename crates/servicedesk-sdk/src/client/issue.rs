//! Issue, comment, assignment and transition operations.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{check_status, SiteClient};
use crate::error::ApiError;

/// Author of an issue comment.
///
/// Server deployments identify users by `name`/`key`, cloud deployments by
/// `accountId`; every identifier is therefore optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentAuthor {
    /// Login name (server)
    #[serde(default)]
    pub name: Option<String>,

    /// User key (server)
    #[serde(default)]
    pub key: Option<String>,

    /// Account identifier (cloud)
    #[serde(default)]
    pub account_id: Option<String>,

    /// Email address, when visible to the automation account
    #[serde(default)]
    pub email_address: Option<String>,

    /// Human-readable name
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Comment on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Comment identifier
    #[serde(default)]
    pub id: Option<String>,

    /// Comment body
    #[serde(default)]
    pub body: String,

    /// User who wrote the comment
    #[serde(default)]
    pub author: CommentAuthor,
}

#[derive(Debug, Deserialize)]
struct CommentPage {
    #[serde(default)]
    comments: Vec<Comment>,
}

/// Workflow transition available on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Transition {
    /// Transition identifier
    pub id: String,

    /// Transition name as shown on the issue
    pub name: String,

    /// Status the transition leads to
    #[serde(default)]
    pub to: Option<TransitionTarget>,
}

/// Target status of a workflow transition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransitionTarget {
    /// Status name
    pub name: String,
}

impl Transition {
    /// Check whether this transition moves the issue to `status`.
    ///
    /// Matches either the target status name or the transition name,
    /// ignoring case.
    pub fn leads_to(&self, status: &str) -> bool {
        self.to
            .as_ref()
            .map(|target| target.name.eq_ignore_ascii_case(status))
            .unwrap_or(false)
            || self.name.eq_ignore_ascii_case(status)
    }
}

#[derive(Debug, Deserialize)]
struct TransitionList {
    #[serde(default)]
    transitions: Vec<Transition>,
}

#[derive(Debug, Serialize)]
struct CreateCommentRequest<'a> {
    body: &'a str,
    public: bool,
}

impl SiteClient {
    /// Fetch the full issue document.
    pub async fn get_issue(&self, issue_key: &str) -> Result<serde_json::Value, ApiError> {
        let path = format!("/rest/api/2/issue/{}", issue_key);
        let response = check_status(self.get(&path).await?).await?;
        Ok(response.json().await?)
    }

    /// Add a comment to a Service Desk request.
    ///
    /// `public` controls whether the customer can see the comment.
    pub async fn post_comment(
        &self,
        issue_key: &str,
        body: &str,
        public: bool,
    ) -> Result<(), ApiError> {
        let path = format!("/rest/servicedeskapi/request/{}/comment", issue_key);
        let request = CreateCommentRequest { body, public };
        check_status(self.post(&path, &request).await?).await?;

        debug!(issue = %issue_key, public = public, "Posted comment");
        Ok(())
    }

    /// Return the most recent comment on an issue, if any.
    pub async fn latest_comment(&self, issue_key: &str) -> Result<Option<Comment>, ApiError> {
        let path = format!("/rest/api/2/issue/{}/comment", issue_key);
        let response = check_status(self.get(&path).await?).await?;
        let page: CommentPage = response.json().await?;
        Ok(page.comments.into_iter().last())
    }

    /// Assign an issue to the named account.
    pub async fn assign_issue(&self, issue_key: &str, account: &str) -> Result<(), ApiError> {
        let path = format!("/rest/api/2/issue/{}/assignee", issue_key);
        let body = serde_json::json!({ "name": account });
        check_status(self.put(&path, &body).await?).await?;

        debug!(issue = %issue_key, assignee = %account, "Assigned issue");
        Ok(())
    }

    /// List the workflow transitions currently available on an issue.
    pub async fn transitions(&self, issue_key: &str) -> Result<Vec<Transition>, ApiError> {
        let path = format!("/rest/api/2/issue/{}/transitions", issue_key);
        let response = check_status(self.get(&path).await?).await?;
        let list: TransitionList = response.json().await?;
        Ok(list.transitions)
    }

    /// Move an issue to the given status.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::TransitionUnavailable` if no available transition
    /// leads to `status`.
    pub async fn transition_issue(&self, issue_key: &str, status: &str) -> Result<(), ApiError> {
        let transition = self
            .transitions(issue_key)
            .await?
            .into_iter()
            .find(|t| t.leads_to(status))
            .ok_or_else(|| ApiError::TransitionUnavailable {
                issue_key: issue_key.to_string(),
                status: status.to_string(),
            })?;

        let path = format!("/rest/api/2/issue/{}/transitions", issue_key);
        let body = serde_json::json!({ "transition": { "id": transition.id } });
        check_status(self.post(&path, &body).await?).await?;

        debug!(issue = %issue_key, status = %status, "Transitioned issue");
        Ok(())
    }
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;
