//! Service Desk API client.
//!
//! This module provides the process-wide [`ServiceDeskClient`] and the
//! site-scoped [`SiteClient`] through which all REST operations are made.
//! Authentication is HTTP Basic with the automation account's credentials.

mod attachment;
mod field;
mod issue;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{ApiError, ValidationError};

pub use field::CustomFieldApi;
pub use issue::{Comment, CommentAuthor, Transition};

/// Configuration for Service Desk client behavior.
///
/// # Examples
///
/// ```
/// use servicedesk_sdk::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default().with_timeout(Duration::from_secs(60));
/// assert_eq!(config.timeout, Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// User agent string for API requests
    pub user_agent: String,
    /// Request timeout duration
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("servicedesk-sdk/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Create a new builder for client configuration.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Builder for constructing `ClientConfig` instances.
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new configuration builder with defaults.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Credentials of the automation account.
///
/// The password is wiped from memory on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create credentials for the automation account.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The account name the automation authenticates as.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Check that both parts of the credentials are present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.username.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "username".to_string(),
            });
        }
        if self.password.is_empty() {
            return Err(ValidationError::Required {
                field: "password".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

/// Process-wide Service Desk API client.
///
/// Holds the shared HTTP connection pool and the automation credentials.
/// Cheap to clone.
#[derive(Clone)]
pub struct ServiceDeskClient {
    http_client: reqwest::Client,
    credentials: Arc<Credentials>,
    config: ClientConfig,
}

impl ServiceDeskClient {
    /// Create a new builder for constructing a Service Desk client.
    pub fn builder(credentials: Credentials) -> ServiceDeskClientBuilder {
        ServiceDeskClientBuilder::new(credentials)
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Name of the account the client authenticates as.
    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    /// Bind the client to a Service Desk site.
    ///
    /// `root_url` is the scheme and host of the site, e.g.
    /// `https://servicedesk.example.com`. A trailing slash is ignored.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidSiteUrl` if the URL cannot be parsed or has
    /// no host.
    pub fn site(&self, root_url: &str) -> Result<SiteClient, ApiError> {
        let trimmed = root_url.trim_end_matches('/');
        let parsed = url::Url::parse(trimmed).map_err(|e| ApiError::InvalidSiteUrl {
            url: root_url.to_string(),
            message: e.to_string(),
        })?;
        if parsed.host_str().is_none() {
            return Err(ApiError::InvalidSiteUrl {
                url: root_url.to_string(),
                message: "missing host".to_string(),
            });
        }

        Ok(SiteClient {
            client: self.clone(),
            root_url: trimmed.to_string(),
        })
    }
}

impl fmt::Debug for ServiceDeskClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDeskClient")
            .field("config", &self.config)
            .field("credentials", &self.credentials)
            .finish()
    }
}

/// Builder for constructing `ServiceDeskClient` instances.
pub struct ServiceDeskClientBuilder {
    credentials: Credentials,
    config: Option<ClientConfig>,
}

impl ServiceDeskClientBuilder {
    fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            config: None,
        }
    }

    /// Set the client configuration.
    ///
    /// If not set, uses `ClientConfig::default()`.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the Service Desk client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Configuration` if the credentials are incomplete or
    /// the HTTP client cannot be created.
    pub fn build(self) -> Result<ServiceDeskClient, ApiError> {
        self.credentials
            .validate()
            .map_err(|e| ApiError::Configuration {
                message: e.to_string(),
            })?;

        let config = self.config.unwrap_or_default();

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ApiError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(ServiceDeskClient {
            http_client,
            credentials: Arc::new(self.credentials),
            config,
        })
    }
}

/// Site-scoped Service Desk client.
///
/// All request helpers add Basic authentication and the
/// `X-ExperimentalApi` header the Service Desk API requires.
#[derive(Debug, Clone)]
pub struct SiteClient {
    client: ServiceDeskClient,
    root_url: String,
}

impl SiteClient {
    /// The site root URL this client is bound to.
    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    /// Name of the account the client authenticates as.
    pub fn username(&self) -> &str {
        self.client.username()
    }

    fn url(&self, path: &str) -> String {
        let normalized_path = path.strip_prefix('/').unwrap_or(path);
        format!("{}/{}", self.root_url, normalized_path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let credentials = &self.client.credentials;
        self.client
            .http_client
            .request(method, self.url(path))
            .basic_auth(&credentials.username, Some(&credentials.password))
            .header("X-ExperimentalApi", "true")
    }

    /// Make an authenticated GET request.
    ///
    /// Does NOT return an error for non-2xx status codes; the caller checks
    /// the response status.
    pub async fn get(&self, path: &str) -> Result<reqwest::Response, ApiError> {
        Ok(self
            .request(reqwest::Method::GET, path)
            .header("Accept", "application/json")
            .send()
            .await?)
    }

    /// Make an authenticated POST request with a JSON body.
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, ApiError> {
        Ok(self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await?)
    }

    /// Make an authenticated PUT request with a JSON body.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, ApiError> {
        Ok(self
            .request(reqwest::Method::PUT, path)
            .json(body)
            .send()
            .await?)
    }

    /// Make an authenticated multipart POST request.
    ///
    /// Adds the `X-Atlassian-Token: no-check` header needed for uploads.
    pub async fn post_multipart(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<reqwest::Response, ApiError> {
        Ok(self
            .request(reqwest::Method::POST, path)
            .header("X-Atlassian-Token", "no-check")
            .multipart(form)
            .send()
            .await?)
    }
}

/// Convert a non-success response into an `ApiError`.
///
/// Succeeds with the response untouched when the status is 2xx.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ApiError::from_status(status.as_u16(), message))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
