//! Normalised view of an inbound webhook delivery.
//!
//! Service Desk sends `{ "issue": { ... } }` while the platform's own
//! webhooks send the issue document at the top level. Both shapes are
//! collapsed into one [`TicketView`] as soon as the body is parsed.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

use crate::trigger::{parse_changelog, ChangelogItem};
use servicedesk_sdk::Comment;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while normalising a delivery body.
#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("Malformed issue: missing '{field}'")]
    Malformed { field: String },

    #[error("Malformed issue: {message}")]
    Invalid { message: String },

    #[error("Request body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl TicketError {
    pub(crate) fn missing(field: &str) -> Self {
        Self::Malformed {
            field: field.to_string(),
        }
    }
}

// ============================================================================
// Event kind
// ============================================================================

/// Which webhook route a delivery arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `POST /create`
    Created,
    /// `POST /comment`
    Commented,
    /// `POST /org-change`
    OrgChanged,
    /// `POST /transition`, fired by Service Desk automation rules
    TransitionedByAutomation,
    /// `POST /jira-hook`, fired by the platform for any issue update
    GenericPlatformHook,
}

impl EventKind {
    /// All event kinds in route order.
    pub const ALL: [EventKind; 5] = [
        EventKind::Created,
        EventKind::Commented,
        EventKind::OrgChanged,
        EventKind::TransitionedByAutomation,
        EventKind::GenericPlatformHook,
    ];

    /// HTTP path the kind is delivered on.
    pub fn route(&self) -> &'static str {
        match self {
            Self::Created => "/create",
            Self::Commented => "/comment",
            Self::OrgChanged => "/org-change",
            Self::TransitionedByAutomation => "/transition",
            Self::GenericPlatformHook => "/jira-hook",
        }
    }

    /// Map an HTTP path back to its event kind.
    pub fn from_route(route: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.route() == route)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.route())
    }
}

// ============================================================================
// Ticket reference
// ============================================================================

/// Everything needed to address a ticket on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketRef {
    /// Issue key, e.g. `ITS-42`
    pub key: String,
    /// Project key, e.g. `ITS`
    pub project: String,
    /// Scheme and host of the site that sent the delivery
    pub root_url: String,
}

impl fmt::Display for TicketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Reporter of a ticket as carried in `fields.reporter`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reporter {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Reporter {
    /// Whether the reporter can be identified at all.
    ///
    /// Cloud deliveries omit the email address but still carry an account ID.
    pub fn is_identified(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        present(&self.email_address) || present(&self.account_id)
    }
}

// ============================================================================
// Ticket view
// ============================================================================

/// Canonical, shape-independent view of the ticket a delivery concerns.
#[derive(Debug, Clone)]
pub struct TicketView {
    reference: TicketRef,
    issue: Value,
    reporter: Option<Reporter>,
    comment: Option<Comment>,
}

impl TicketView {
    /// Normalise a delivery body.
    ///
    /// # Errors
    ///
    /// Returns `TicketError::Malformed` naming the first required piece that
    /// is missing: `self`, `key`, `fields`, `fields.project` or
    /// `fields.project.key`.
    pub fn from_payload(payload: &Value) -> Result<Self, TicketError> {
        if !payload.is_object() {
            return Err(TicketError::Invalid {
                message: "body is not a JSON object".to_string(),
            });
        }

        let issue = payload.get("issue").unwrap_or(payload);

        let self_url = issue
            .get("self")
            .and_then(Value::as_str)
            .ok_or_else(|| TicketError::missing("self"))?;
        let key = issue
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| TicketError::missing("key"))?;
        let fields = issue
            .get("fields")
            .and_then(Value::as_object)
            .ok_or_else(|| TicketError::missing("fields"))?;
        let project = fields
            .get("project")
            .ok_or_else(|| TicketError::missing("fields.project"))?
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| TicketError::missing("fields.project.key"))?;

        let reporter = fields
            .get("reporter")
            .filter(|r| r.is_object())
            .and_then(|r| serde_json::from_value(r.clone()).ok());

        // Service Desk comment deliveries carry the new comment next to the issue.
        let comment = payload
            .get("comment")
            .filter(|c| c.is_object())
            .and_then(|c| serde_json::from_value(c.clone()).ok());

        Ok(Self {
            reference: TicketRef {
                key: key.to_string(),
                project: project.to_string(),
                root_url: root_url(self_url)?,
            },
            issue: issue.clone(),
            reporter,
            comment,
        })
    }

    pub fn reference(&self) -> &TicketRef {
        &self.reference
    }

    pub fn key(&self) -> &str {
        &self.reference.key
    }

    pub fn project(&self) -> &str {
        &self.reference.project
    }

    pub fn root_url(&self) -> &str {
        &self.reference.root_url
    }

    /// The issue document with any Service Desk wrapper removed.
    pub fn issue(&self) -> &Value {
        &self.issue
    }

    /// The issue's `fields` object.
    pub fn fields(&self) -> Option<&Map<String, Value>> {
        self.issue.get("fields").and_then(Value::as_object)
    }

    /// Look up a single entry of `fields`.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields().and_then(|fields| fields.get(name))
    }

    /// Current status name from `fields.status.name`.
    pub fn status_name(&self) -> Option<&str> {
        self.field("status")
            .and_then(|status| status.get("name"))
            .and_then(Value::as_str)
    }

    pub fn reporter(&self) -> Option<&Reporter> {
        self.reporter.as_ref()
    }

    /// Comment carried by the delivery itself, if any.
    pub fn comment(&self) -> Option<&Comment> {
        self.comment.as_ref()
    }

    /// True when the ticket was raised without an identifiable reporter.
    pub fn is_anonymous(&self) -> bool {
        !self.reporter.as_ref().is_some_and(Reporter::is_identified)
    }
}

/// Reduce an issue `self` link to `scheme://host`.
fn root_url(self_url: &str) -> Result<String, TicketError> {
    let mut parts = self_url.splitn(4, '/');
    let scheme = parts.next().unwrap_or_default();
    let _empty = parts.next();
    let host = parts.next().unwrap_or_default();

    if !scheme.ends_with(':') || host.is_empty() {
        return Err(TicketError::Invalid {
            message: format!("cannot derive site URL from '{self_url}'"),
        });
    }
    Ok(format!("{scheme}//{host}"))
}

// ============================================================================
// Ticket event
// ============================================================================

/// One inbound delivery, built once per request and dropped at its end.
#[derive(Debug, Clone)]
pub struct TicketEvent {
    pub kind: EventKind,
    /// Delivery body exactly as received
    pub raw_payload: Value,
    /// Changelog items, for generic platform deliveries only
    pub changelog: Option<Vec<ChangelogItem>>,
    pub ticket: TicketView,
}

impl TicketEvent {
    /// Build an event from a parsed body.
    pub fn new(kind: EventKind, raw_payload: Value) -> Result<Self, TicketError> {
        let ticket = TicketView::from_payload(&raw_payload)?;
        let changelog = match kind {
            EventKind::GenericPlatformHook => parse_changelog(&raw_payload),
            _ => None,
        };

        Ok(Self {
            kind,
            raw_payload,
            changelog,
            ticket,
        })
    }

    /// Build an event from the raw request body.
    pub fn from_slice(kind: EventKind, body: &[u8]) -> Result<Self, TicketError> {
        let raw_payload: Value = serde_json::from_slice(body)?;
        Self::new(kind, raw_payload)
    }
}

#[cfg(test)]
#[path = "ticket_tests.rs"]
mod tests;
