//! Attachment upload to Service Desk requests.
//!
//! Uploading is a three step dance: find the service desk that owns the
//! project, upload the file as a temporary attachment, then attach the
//! temporary file to the request together with a comment.

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::client::{check_status, SiteClient};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceDesk {
    id: String,
    project_key: String,
}

#[derive(Debug, Deserialize)]
struct ServiceDeskPage {
    #[serde(default)]
    values: Vec<ServiceDesk>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemporaryAttachment {
    temporary_attachment_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemporaryAttachments {
    #[serde(default)]
    temporary_attachments: Vec<TemporaryAttachment>,
}

impl SiteClient {
    /// Find the service desk ID for a project key.
    pub async fn service_desk_id(&self, project_key: &str) -> Result<String, ApiError> {
        let response = check_status(self.get("/rest/servicedeskapi/servicedesk").await?).await?;
        let page: ServiceDeskPage = response.json().await?;

        page.values
            .into_iter()
            .find(|desk| desk.project_key == project_key)
            .map(|desk| desk.id)
            .ok_or_else(|| ApiError::ServiceDeskNotFound {
                project_key: project_key.to_string(),
            })
    }

    /// Attach a text file to a request.
    ///
    /// The attachment is accompanied by `comment`; `public` controls whether
    /// the customer can see both.
    pub async fn attach_text_file(
        &self,
        issue_key: &str,
        project_key: &str,
        filename: &str,
        content: String,
        comment: &str,
        public: bool,
    ) -> Result<(), ApiError> {
        let desk_id = self.service_desk_id(project_key).await?;

        let part = reqwest::multipart::Part::text(content)
            .file_name(filename.to_string())
            .mime_str("text/plain")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let upload_path = format!(
            "/rest/servicedeskapi/servicedesk/{}/attachTemporaryFile",
            desk_id
        );
        let response = check_status(self.post_multipart(&upload_path, form).await?).await?;
        let uploaded: TemporaryAttachments = response.json().await?;
        let temporary_id = uploaded
            .temporary_attachments
            .into_iter()
            .next()
            .map(|a| a.temporary_attachment_id)
            .ok_or_else(|| ApiError::InvalidRequest {
                message: "upload returned no temporary attachment".to_string(),
            })?;

        let attach_path = format!("/rest/servicedeskapi/request/{}/attachment", issue_key);
        let body = json!({
            "temporaryAttachmentIds": [temporary_id],
            "public": public,
            "additionalComment": { "body": comment },
        });
        check_status(self.post(&attach_path, &body).await?).await?;

        debug!(issue = %issue_key, filename = %filename, "Attached file");
        Ok(())
    }
}

#[cfg(test)]
#[path = "attachment_tests.rs"]
mod tests;
