//! Custom field name to ID lookup.
//!
//! Custom field IDs differ between instances, so they are looked up by their
//! human-readable name. Server deployments need the Customfield Editor
//! plugin to enumerate fields; cloud deployments use the standard field API.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::client::SiteClient;
use crate::error::ApiError;

/// Which API is used to enumerate custom fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomFieldApi {
    /// Customfield Editor plugin on a self-hosted server
    Server,
    /// Standard `/rest/api/2/field` endpoint on cloud
    Cloud,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PluginField {
    field_id: Value,
    field_name: String,
}

#[derive(Debug, Deserialize)]
struct CloudField {
    id: String,
    name: String,
}

/// Render a JSON scalar as an ID string.
fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl SiteClient {
    /// Look up the ID of the custom field called `field_name`.
    ///
    /// Returns `Ok(None)` when the field does not exist.
    pub async fn custom_field_id(
        &self,
        api: CustomFieldApi,
        field_name: &str,
    ) -> Result<Option<String>, ApiError> {
        let path = match api {
            CustomFieldApi::Server => "/rest/jiracustomfieldeditorplugin/1/admin/customfields",
            CustomFieldApi::Cloud => "/rest/api/2/field",
        };

        let response = self.get(path).await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!(
                status = status.as_u16(),
                field = %field_name,
                "Custom field enumeration failed"
            );
            return Err(ApiError::from_status(status.as_u16(), message));
        }

        let id = match api {
            CustomFieldApi::Server => {
                let fields: Vec<PluginField> = response.json().await?;
                fields
                    .iter()
                    .find(|f| f.field_name == field_name)
                    .and_then(|f| id_to_string(&f.field_id))
            }
            CustomFieldApi::Cloud => {
                let fields: Vec<CloudField> = response.json().await?;
                fields
                    .into_iter()
                    .find(|f| f.name == field_name)
                    .map(|f| f.id)
            }
        };

        Ok(id)
    }
}

#[cfg(test)]
#[path = "field_tests.rs"]
mod tests;
