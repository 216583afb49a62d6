//! Handler contract, registry and locator.
//!
//! Handlers are compiled into the service and registered by name once at
//! start-up. Each delivery builds a fresh handler instance through the
//! registered factory, so no handler state outlives its request.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::request_type::RequestTypeId;
use crate::service_desk::ServiceDesk;
use crate::ticket::{TicketRef, TicketView};
use crate::trigger::ChangelogItem;

/// Prefix of convention-named handlers: `rt<request type>`.
pub const CONVENTION_PREFIX: &str = "rt";

/// Handler table key matching every request type.
pub const WILDCARD: &str = "*";

// ============================================================================
// Capabilities
// ============================================================================

/// Event kinds a handler can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    Create,
    Comment,
    Assignment,
    Transition,
    OrgChange,
    JiraHook,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::Create,
        Capability::Comment,
        Capability::Assignment,
        Capability::Transition,
        Capability::OrgChange,
        Capability::JiraHook,
    ];

    /// Wire token, e.g. `ORGCHANGE`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Comment => "COMMENT",
            Self::Assignment => "ASSIGNMENT",
            Self::Transition => "TRANSITION",
            Self::OrgChange => "ORGCHANGE",
            Self::JiraHook => "JIRAHOOK",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a capability token is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown capability '{token}'")]
pub struct CapabilityParseError {
    pub token: String,
}

impl FromStr for Capability {
    type Err = CapabilityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CapabilityParseError {
                token: s.to_string(),
            })
    }
}

/// The set of capabilities a handler declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a list of wire tokens.
    pub fn parse<I, S>(tokens: I) -> Result<Self, CapabilityParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tokens
            .into_iter()
            .map(|token| token.as_ref().parse::<Capability>())
            .collect()
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.0.insert(capability);
        self
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<&str> = self.iter().map(|c| c.as_str()).collect();
        write!(f, "[{}]", tokens.join(", "))
    }
}

// ============================================================================
// Handler contract
// ============================================================================

/// What a handler gets to work with during one delivery.
#[derive(Clone)]
pub struct HandlerContext {
    service_desk: Arc<dyn ServiceDesk>,
    ticket: TicketRef,
    request_type: Option<RequestTypeId>,
}

impl HandlerContext {
    pub fn new(
        service_desk: Arc<dyn ServiceDesk>,
        ticket: TicketRef,
        request_type: Option<RequestTypeId>,
    ) -> Self {
        Self {
            service_desk,
            ticket,
            request_type,
        }
    }

    /// Platform operations, acting as the automation account.
    pub fn service_desk(&self) -> &dyn ServiceDesk {
        self.service_desk.as_ref()
    }

    pub fn ticket(&self) -> &TicketRef {
        &self.ticket
    }

    pub fn request_type(&self) -> Option<&RequestTypeId> {
        self.request_type.as_ref()
    }

    /// Post a comment on the ticket being handled.
    pub async fn comment(&self, body: &str, public: bool) -> anyhow::Result<()> {
        self.service_desk
            .post_comment(&self.ticket, body, public)
            .await?;
        Ok(())
    }
}

impl fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext")
            .field("ticket", &self.ticket)
            .field("request_type", &self.request_type)
            .finish()
    }
}

/// Business logic for one or more request types.
///
/// Only the slots named by [`TicketHandler::capabilities`] are ever called;
/// the rest keep their no-op defaults. `from` and `to` are `None` when the
/// platform did not report that side of the change.
#[async_trait]
pub trait TicketHandler: Send + Sync {
    /// Declared capabilities. `None` means the handler declares nothing and
    /// is refused by the loader.
    fn capabilities(&self) -> Option<CapabilitySet>;

    /// Archive the raw delivery on the ticket before any slot runs.
    fn persist_raw_payload(&self) -> bool {
        false
    }

    async fn create(&self, _ctx: &HandlerContext, _ticket: &TicketView) -> anyhow::Result<()> {
        Ok(())
    }

    async fn comment(&self, _ctx: &HandlerContext, _ticket: &TicketView) -> anyhow::Result<()> {
        Ok(())
    }

    async fn transition(
        &self,
        _ctx: &HandlerContext,
        _from: Option<&str>,
        _to: Option<&str>,
        _ticket: &TicketView,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn assignment(
        &self,
        _ctx: &HandlerContext,
        _from: Option<&str>,
        _to: Option<&str>,
        _ticket: &TicketView,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn org_change(&self, _ctx: &HandlerContext, _ticket: &TicketView) -> anyhow::Result<()> {
        Ok(())
    }

    async fn generic_hook(
        &self,
        _ctx: &HandlerContext,
        _ticket: &TicketView,
        _changelog: Option<&[ChangelogItem]>,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Registry and loader
// ============================================================================

type HandlerFactory = Arc<dyn Fn() -> Box<dyn TicketHandler> + Send + Sync>;

/// Errors raised when loading a located handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("Handler '{name}' is not registered")]
    NotFound { name: String },

    #[error("Handler '{name}' is missing its capability declaration")]
    MissingCapabilities { name: String },
}

/// A freshly built handler together with its validated capabilities.
pub struct LoadedHandler {
    name: String,
    capabilities: CapabilitySet,
    handler: Box<dyn TicketHandler>,
}

impl LoadedHandler {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn handles(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn persist_raw_payload(&self) -> bool {
        self.handler.persist_raw_payload()
    }

    pub fn handler(&self) -> &dyn TicketHandler {
        self.handler.as_ref()
    }
}

impl fmt::Debug for LoadedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedHandler")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

/// Compiled-in handlers by name.
///
/// Built once at start-up and read-only afterwards.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    factories: HashMap<String, HandlerFactory>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler factory under `name`, replacing any earlier one.
    pub fn register<F, H>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> H + Send + Sync + 'static,
        H: TicketHandler + 'static,
    {
        let boxed: HandlerFactory =
            Arc::new(move || -> Box<dyn TicketHandler> { Box::new(factory()) });
        self.factories.insert(name.into(), boxed);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build a fresh instance of the named handler.
    ///
    /// # Errors
    ///
    /// * `NotFound` if nothing is registered under `name`.
    /// * `MissingCapabilities` if the handler declares no capabilities.
    pub fn load(&self, name: &str) -> Result<LoadedHandler, LoadError> {
        let factory = self.factories.get(name).ok_or_else(|| LoadError::NotFound {
            name: name.to_string(),
        })?;

        let handler = factory();
        let capabilities = handler
            .capabilities()
            .ok_or_else(|| LoadError::MissingCapabilities {
                name: name.to_string(),
            })?;

        debug!(handler = %name, capabilities = %capabilities, "Loaded handler");
        Ok(LoadedHandler {
            name: name.to_string(),
            capabilities,
            handler,
        })
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}

// ============================================================================
// Locator
// ============================================================================

/// Maps request types to handler names.
///
/// Priority, first match wins:
/// 1. the operator's handler table,
/// 2. a registered handler named `rt<request type>`,
/// 3. the table's `"*"` entry.
#[derive(Debug, Clone)]
pub struct HandlerLocator {
    table: HashMap<String, String>,
    registry: Arc<HandlerRegistry>,
}

impl HandlerLocator {
    pub fn new(table: HashMap<String, String>, registry: Arc<HandlerRegistry>) -> Self {
        Self { table, registry }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Pick the handler name for `request_type`.
    ///
    /// Without a request type only the wildcard can match.
    pub fn locate(&self, request_type: Option<&RequestTypeId>) -> Option<String> {
        if let Some(request_type) = request_type {
            if let Some(name) = self.table.get(request_type.as_str()) {
                return Some(name.clone());
            }

            let conventional = format!("{CONVENTION_PREFIX}{request_type}");
            if self.registry.contains(&conventional) {
                return Some(conventional);
            }
        }

        self.table.get(WILDCARD).cloned()
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
