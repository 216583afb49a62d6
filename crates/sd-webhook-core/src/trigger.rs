//! Trigger classification for generic platform deliveries.
//!
//! The platform fires `issue_updated` for every kind of change, including
//! comments. The changelog attached to the delivery says what actually
//! changed; this module turns it into a [`DispatchDecision`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::ticket::TicketError;

const UPDATED_EVENT: &str = "issue_updated";
const USABLE_EVENT_TYPES: [&str; 2] = ["issue_assigned", "issue_generic"];
const PLATFORM_FIELD_TYPE: &str = "jira";

// ============================================================================
// Changelog
// ============================================================================

/// One field-level change record from a delivery's changelog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChangelogItem {
    pub field: String,

    #[serde(rename = "fieldtype", alias = "fieldType", default)]
    pub field_type: String,

    /// Raw previous value, e.g. a status ID or user key
    #[serde(default, deserialize_with = "scalar_string")]
    pub from: Option<String>,

    /// Human-readable previous value
    #[serde(rename = "fromString", default, deserialize_with = "scalar_string")]
    pub from_text: Option<String>,

    #[serde(default, deserialize_with = "scalar_string")]
    pub to: Option<String>,

    #[serde(rename = "toString", default, deserialize_with = "scalar_string")]
    pub to_text: Option<String>,
}

impl ChangelogItem {
    /// Previous value, preferring the human-readable form.
    pub fn from_value(&self) -> Option<&str> {
        self.from_text.as_deref().or(self.from.as_deref())
    }

    /// New value, preferring the human-readable form.
    pub fn to_value(&self) -> Option<&str> {
        self.to_text.as_deref().or(self.to.as_deref())
    }

    fn is_platform_field(&self, name: &str) -> bool {
        self.field == name && self.field_type == PLATFORM_FIELD_TYPE
    }

    fn change(&self) -> FieldChange {
        FieldChange {
            from: self.from_value().map(str::to_string),
            to: self.to_value().map(str::to_string),
        }
    }
}

fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Extract `changelog.items` from a delivery, skipping unreadable entries.
pub(crate) fn parse_changelog(payload: &Value) -> Option<Vec<ChangelogItem>> {
    let items = payload.get("changelog")?.get("items")?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect(),
    )
}

// ============================================================================
// Decision
// ============================================================================

/// A before/after pair for one field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// What a delivery turned out to be.
///
/// Transition and assignment can both be set when the platform reports
/// several simultaneous field changes. `generic_hook` is never set by
/// [`classify`]; it depends on the handler's capabilities and is decided
/// during dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchDecision {
    pub transition: Option<FieldChange>,
    pub assignment: Option<FieldChange>,
    pub generic_hook: bool,
}

impl DispatchDecision {
    pub fn is_transition(&self) -> bool {
        self.transition.is_some()
    }

    pub fn is_assignment(&self) -> bool {
        self.assignment.is_some()
    }

    /// True when neither a transition nor an assignment was found.
    pub fn is_unclassified(&self) -> bool {
        !self.is_transition() && !self.is_assignment()
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Whether a delivery is an issue update the classifier understands.
///
/// The platform prefixes its event names with `jira:`; the prefix is ignored.
pub fn is_usable(payload: &Value) -> bool {
    let event = payload.get("webhookEvent").and_then(Value::as_str);
    let event = event.map(|e| e.strip_prefix("jira:").unwrap_or(e));
    if event != Some(UPDATED_EVENT) {
        return false;
    }

    payload
        .get("issue_event_type_name")
        .and_then(Value::as_str)
        .is_some_and(|name| USABLE_EVENT_TYPES.contains(&name))
}

/// Classify a raw delivery body.
///
/// Deliveries that are not usable issue updates yield an empty decision.
/// For usable deliveries the first `status` item and the first `assignee`
/// item of type `jira` win, in delivery order.
///
/// # Errors
///
/// Returns `TicketError::Malformed` when a usable delivery has no
/// `changelog` or no `changelog.items`.
pub fn classify(payload: &Value) -> Result<DispatchDecision, TicketError> {
    let mut decision = DispatchDecision::default();
    if !is_usable(payload) {
        return Ok(decision);
    }

    let changelog = payload
        .get("changelog")
        .ok_or_else(|| TicketError::missing("changelog"))?;
    let items = changelog
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| TicketError::missing("changelog.items"))?;

    for raw in items {
        let item: ChangelogItem = match serde_json::from_value(raw.clone()) {
            Ok(item) => item,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable changelog item");
                continue;
            }
        };

        if decision.transition.is_none() && item.is_platform_field("status") {
            decision.transition = Some(item.change());
        } else if decision.assignment.is_none() && item.is_platform_field("assignee") {
            decision.assignment = Some(item.change());
        }
    }

    Ok(decision)
}

#[cfg(test)]
#[path = "trigger_tests.rs"]
mod tests;
