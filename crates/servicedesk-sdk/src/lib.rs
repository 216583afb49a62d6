//! # Service Desk SDK
//!
//! REST client for Jira and Jira Service Desk as used by the webhook
//! dispatcher and its handlers.
//!
//! This SDK provides:
//! - Basic-authenticated access to a Service Desk site
//! - Comment, attachment, assignment and transition operations
//! - Custom field name to ID lookup (server plugin and cloud APIs)
//!
//! A single [`ServiceDeskClient`] is created per process. Because the site a
//! webhook refers to is only known from the delivery itself, operations are
//! performed through a [`SiteClient`] bound to a site root URL.
//!
//! # Examples
//!
//! ```rust,no_run
//! use servicedesk_sdk::{ClientConfig, Credentials, ServiceDeskClient};
//!
//! # async fn example() -> Result<(), servicedesk_sdk::ApiError> {
//! let client = ServiceDeskClient::builder(Credentials::new("automation", "secret"))
//!     .config(ClientConfig::default())
//!     .build()?;
//!
//! let site = client.site("https://servicedesk.example.com")?;
//! site.post_comment("ITS-42", "Working on it", true).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;

pub use client::{
    ClientConfig, ClientConfigBuilder, Comment, CommentAuthor, Credentials, CustomFieldApi,
    ServiceDeskClient, ServiceDeskClientBuilder, SiteClient, Transition,
};
pub use error::{ApiError, ValidationError};
