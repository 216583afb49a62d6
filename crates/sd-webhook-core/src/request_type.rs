//! Request type resolution.
//!
//! A ticket's request type lives in a custom field whose ID differs between
//! sites. The field is found by name through the [`CustomFieldCache`].

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::custom_fields::CustomFieldCache;
use crate::ticket::TicketView;

/// Field names tried in order; later schemas renamed the field.
pub const DEFAULT_REQUEST_TYPE_FIELDS: [&str; 2] = ["Customer Request Type", "Request Type"];

/// Opaque request type identifier, usually a number rendered as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestTypeId(String);

impl RequestTypeId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestTypeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Errors raised while resolving a request type.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// None of the candidate custom fields exists on the site.
    #[error("Failed to find '{}'", .field_names.join("' or '"))]
    CustomFieldLookupFailure { field_names: Vec<String> },

    /// The ticket does not carry the field in the expected shape.
    #[error("Failed to find '{field_key}' in issue fields")]
    Malformed { field_key: String },
}

/// Turn a custom field ID into the key used in `fields`.
///
/// Cloud sites return IDs that already carry the `customfield_` prefix.
pub fn field_key(field_id: &str) -> String {
    if field_id.starts_with("customfield_") {
        field_id.to_string()
    } else {
        format!("customfield_{field_id}")
    }
}

/// Resolves the request type of a ticket.
pub struct RequestTypeResolver {
    cache: Arc<CustomFieldCache>,
    field_names: Vec<String>,
}

impl RequestTypeResolver {
    pub fn new(cache: Arc<CustomFieldCache>) -> Self {
        Self {
            cache,
            field_names: DEFAULT_REQUEST_TYPE_FIELDS
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }

    /// Replace the candidate field names.
    pub fn with_field_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn cache(&self) -> &Arc<CustomFieldCache> {
        &self.cache
    }

    /// Resolve the request type of `ticket`.
    ///
    /// Returns `Ok(None)` when the field is present but `null`, which is how
    /// plain platform issues that are not Service Desk requests look.
    ///
    /// # Errors
    ///
    /// * `CustomFieldLookupFailure` if no candidate field exists.
    /// * `Malformed` if the field is missing from the ticket or its value has
    ///   no `requestType.id`.
    pub async fn resolve(&self, ticket: &TicketView) -> Result<Option<RequestTypeId>, ResolveError> {
        let field_id = self.field_id(ticket.root_url()).await?;
        let key = field_key(&field_id);

        let value = ticket
            .field(&key)
            .ok_or_else(|| ResolveError::Malformed {
                field_key: key.clone(),
            })?;
        if value.is_null() {
            debug!(ticket = %ticket.key(), field = %key, "Ticket has no request type");
            return Ok(None);
        }

        let id = value
            .get("requestType")
            .and_then(|request_type| request_type.get("id"))
            .and_then(|id| match id {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| ResolveError::Malformed {
                field_key: format!("{key}.requestType.id"),
            })?;

        Ok(Some(RequestTypeId(id)))
    }

    async fn field_id(&self, root_url: &str) -> Result<String, ResolveError> {
        for name in &self.field_names {
            if let Some(id) = self.cache.get(root_url, name).await {
                return Ok(id);
            }
        }
        Err(ResolveError::CustomFieldLookupFailure {
            field_names: self.field_names.clone(),
        })
    }
}

#[cfg(test)]
#[path = "request_type_tests.rs"]
mod tests;
