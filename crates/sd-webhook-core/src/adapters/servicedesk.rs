//! # Service Desk REST Adapter
//!
//! [`ServiceDesk`] and [`CustomFieldSource`] over the REST client. Each
//! ticket names the site it lives on, so the client is bound to the
//! ticket's root URL per call.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::custom_fields::CustomFieldSource;
use crate::service_desk::{ServiceDesk, ServiceDeskError};
use crate::ticket::TicketRef;
use servicedesk_sdk::{Comment, CommentAuthor, CustomFieldApi, ServiceDeskClient, SiteClient};

/// REST-backed platform operations, acting as the automation account.
///
/// # Examples
///
/// ```no_run
/// use sd_webhook_core::adapters::RestServiceDesk;
/// use servicedesk_sdk::{Credentials, CustomFieldApi, ServiceDeskClient};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ServiceDeskClient::builder(Credentials::new("automation", "secret")).build()?;
/// let desk = RestServiceDesk::new(client, CustomFieldApi::Server);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RestServiceDesk {
    client: ServiceDeskClient,
    custom_field_api: CustomFieldApi,
}

impl RestServiceDesk {
    pub fn new(client: ServiceDeskClient, custom_field_api: CustomFieldApi) -> Self {
        Self {
            client,
            custom_field_api,
        }
    }

    fn site(&self, root_url: &str) -> Result<SiteClient, ServiceDeskError> {
        Ok(self.client.site(root_url)?)
    }
}

#[async_trait]
impl ServiceDesk for RestServiceDesk {
    async fn post_comment(
        &self,
        ticket: &TicketRef,
        body: &str,
        public: bool,
    ) -> Result<(), ServiceDeskError> {
        self.site(&ticket.root_url)?
            .post_comment(&ticket.key, body, public)
            .await?;
        Ok(())
    }

    async fn latest_comment(
        &self,
        ticket: &TicketRef,
    ) -> Result<Option<Comment>, ServiceDeskError> {
        Ok(self.site(&ticket.root_url)?.latest_comment(&ticket.key).await?)
    }

    async fn attach_file(
        &self,
        ticket: &TicketRef,
        filename: &str,
        content: String,
        comment: &str,
        public: bool,
    ) -> Result<(), ServiceDeskError> {
        self.site(&ticket.root_url)?
            .attach_text_file(&ticket.key, &ticket.project, filename, content, comment, public)
            .await?;
        Ok(())
    }

    async fn assign_issue(&self, ticket: &TicketRef, account: &str) -> Result<(), ServiceDeskError> {
        self.site(&ticket.root_url)?
            .assign_issue(&ticket.key, account)
            .await?;
        Ok(())
    }

    async fn transition_issue(
        &self,
        ticket: &TicketRef,
        status: &str,
    ) -> Result<(), ServiceDeskError> {
        self.site(&ticket.root_url)?
            .transition_issue(&ticket.key, status)
            .await?;
        Ok(())
    }

    async fn fetch_ticket(&self, ticket: &TicketRef) -> Result<Value, ServiceDeskError> {
        Ok(self.site(&ticket.root_url)?.get_issue(&ticket.key).await?)
    }

    /// Server deployments identify users by name or key, cloud deployments
    /// by account ID or email; any of them matching the bot account counts.
    fn is_automation_account(&self, author: &CommentAuthor) -> bool {
        let bot = self.client.username();
        [
            &author.name,
            &author.key,
            &author.account_id,
            &author.email_address,
        ]
        .into_iter()
        .any(|id| id.as_deref() == Some(bot))
    }
}

#[async_trait]
impl CustomFieldSource for RestServiceDesk {
    async fn lookup_custom_field_id(
        &self,
        root_url: &str,
        name: &str,
    ) -> Result<Option<String>, ServiceDeskError> {
        let id = self
            .site(root_url)?
            .custom_field_id(self.custom_field_api, name)
            .await?;
        debug!(field = %name, id = ?id, "Looked up custom field");
        Ok(id)
    }
}

#[cfg(test)]
#[path = "servicedesk_tests.rs"]
mod tests;
