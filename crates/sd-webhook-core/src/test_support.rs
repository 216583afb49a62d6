//! Test doubles shared by the unit tests of this crate.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

use crate::service_desk::{ServiceDesk, ServiceDeskError};
use crate::ticket::TicketRef;
use servicedesk_sdk::{Comment, CommentAuthor};

pub const BOT_NAME: &str = "automation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Comment {
        ticket: String,
        body: String,
        public: bool,
    },
    Attach {
        ticket: String,
        filename: String,
        comment: String,
        public: bool,
    },
    Assign {
        ticket: String,
        account: String,
    },
    Transition {
        ticket: String,
        status: String,
    },
    LatestComment {
        ticket: String,
    },
}

/// Records every call and answers from canned state.
#[derive(Default)]
pub struct RecordingServiceDesk {
    calls: Mutex<Vec<Call>>,
    latest_comment: Mutex<Option<Comment>>,
    fail_comments: bool,
    fail_attachments: bool,
}

impl RecordingServiceDesk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_comments() -> Self {
        Self {
            fail_comments: true,
            ..Self::default()
        }
    }

    pub fn failing_attachments() -> Self {
        Self {
            fail_attachments: true,
            ..Self::default()
        }
    }

    pub fn with_latest_comment(self, author: &str, body: &str) -> Self {
        *self.latest_comment.lock().unwrap() = Some(comment_by(author, body));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn comments(&self) -> Vec<(String, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Comment { body, public, .. } => Some((body, public)),
                _ => None,
            })
            .collect()
    }

    pub fn attachments(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Attach { filename, .. } => Some(filename),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn comment_by(author: &str, body: &str) -> Comment {
    Comment {
        id: None,
        body: body.to_string(),
        author: CommentAuthor {
            name: Some(author.to_string()),
            ..CommentAuthor::default()
        },
    }
}

fn unavailable() -> ServiceDeskError {
    ServiceDeskError::Unavailable {
        message: "service desk is down".to_string(),
    }
}

#[async_trait]
impl ServiceDesk for RecordingServiceDesk {
    async fn post_comment(
        &self,
        ticket: &TicketRef,
        body: &str,
        public: bool,
    ) -> Result<(), ServiceDeskError> {
        self.record(Call::Comment {
            ticket: ticket.key.clone(),
            body: body.to_string(),
            public,
        });
        if self.fail_comments {
            return Err(unavailable());
        }
        Ok(())
    }

    async fn latest_comment(
        &self,
        ticket: &TicketRef,
    ) -> Result<Option<Comment>, ServiceDeskError> {
        self.record(Call::LatestComment {
            ticket: ticket.key.clone(),
        });
        Ok(self.latest_comment.lock().unwrap().clone())
    }

    async fn attach_file(
        &self,
        ticket: &TicketRef,
        filename: &str,
        _content: String,
        comment: &str,
        public: bool,
    ) -> Result<(), ServiceDeskError> {
        self.record(Call::Attach {
            ticket: ticket.key.clone(),
            filename: filename.to_string(),
            comment: comment.to_string(),
            public,
        });
        if self.fail_attachments {
            return Err(unavailable());
        }
        Ok(())
    }

    async fn assign_issue(&self, ticket: &TicketRef, account: &str) -> Result<(), ServiceDeskError> {
        self.record(Call::Assign {
            ticket: ticket.key.clone(),
            account: account.to_string(),
        });
        Ok(())
    }

    async fn transition_issue(
        &self,
        ticket: &TicketRef,
        status: &str,
    ) -> Result<(), ServiceDeskError> {
        self.record(Call::Transition {
            ticket: ticket.key.clone(),
            status: status.to_string(),
        });
        Ok(())
    }

    async fn fetch_ticket(&self, ticket: &TicketRef) -> Result<Value, ServiceDeskError> {
        Ok(serde_json::json!({ "key": ticket.key }))
    }

    fn is_automation_account(&self, author: &CommentAuthor) -> bool {
        author.name.as_deref() == Some(BOT_NAME)
    }
}

pub fn ticket_ref() -> TicketRef {
    TicketRef {
        key: "ITS-1".to_string(),
        project: "ITS".to_string(),
        root_url: "https://servicedesk.example.com".to_string(),
    }
}

/// Custom field source knowing only the request type field.
pub struct RequestTypeField;

pub const REQUEST_TYPE_FIELD_ID: &str = "10010";

#[async_trait]
impl crate::custom_fields::CustomFieldSource for RequestTypeField {
    async fn lookup_custom_field_id(
        &self,
        _root_url: &str,
        name: &str,
    ) -> Result<Option<String>, ServiceDeskError> {
        Ok((name == "Customer Request Type").then(|| REQUEST_TYPE_FIELD_ID.to_string()))
    }
}

/// Service Desk wrapped delivery for a ticket of `request_type`.
///
/// `None` leaves the request type field `null`.
pub fn delivery(request_type: Option<&str>) -> Value {
    let request_type = match request_type {
        Some(id) => serde_json::json!({ "requestType": { "id": id } }),
        None => Value::Null,
    };
    serde_json::json!({
        "issue": {
            "self": "https://servicedesk.example.com/rest/api/2/issue/10001",
            "key": "ITS-1",
            "fields": {
                "project": { "key": "ITS" },
                "status": { "name": "In Progress" },
                "reporter": { "name": "alice", "emailAddress": "alice@example.com" },
                "customfield_10010": request_type
            }
        }
    })
}

/// Platform `issue_updated` delivery with the given changelog items.
pub fn platform_update(request_type: &str, items: Value) -> Value {
    let mut body = delivery(Some(request_type))["issue"].clone();
    body["webhookEvent"] = serde_json::json!("jira:issue_updated");
    body["issue_event_type_name"] = serde_json::json!("issue_generic");
    body["changelog"] = serde_json::json!({ "id": "1", "items": items });
    body
}
