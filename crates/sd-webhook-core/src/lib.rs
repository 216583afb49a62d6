//! # Service Desk Webhook Core
//!
//! Classification and capability-based dispatch of Service Desk webhook
//! deliveries.
//!
//! A delivery flows through the crate in a fixed order:
//!
//! 1. [`TicketEvent`] normalises the body into a single [`TicketView`].
//! 2. [`RequestTypeResolver`] reads the ticket's request type through the
//!    process-wide [`CustomFieldCache`].
//! 3. [`HandlerLocator`] picks the owning handler and [`HandlerRegistry`]
//!    builds a fresh instance of it.
//! 4. [`classify`] inspects the changelog of generic platform deliveries.
//! 5. [`Dispatcher`] gates on the handler's [`CapabilitySet`], suppresses
//!    self-triggered comment loops, archives the payload on request and
//!    invokes the handler inside the [`FailureEnvelope`].
//!
//! All remote side effects go through the [`ServiceDesk`] trait so the
//! engine can be driven by test doubles.
//!
//! ## Usage
//!
//! ```rust
//! use sd_webhook_core::{classify, Capability, CapabilitySet};
//! use serde_json::json;
//!
//! let payload = json!({
//!     "webhookEvent": "jira:issue_updated",
//!     "issue_event_type_name": "issue_generic",
//!     "changelog": { "items": [
//!         { "field": "status", "fieldtype": "jira", "fromString": "Open", "toString": "Done" }
//!     ]}
//! });
//!
//! let decision = classify(&payload).unwrap();
//! assert!(decision.is_transition());
//!
//! let caps = CapabilitySet::parse(["TRANSITION", "COMMENT"]).unwrap();
//! assert!(caps.contains(Capability::Transition));
//! ```

pub mod adapters;
pub mod custom_fields;
pub mod dispatch;
pub mod envelope;
pub mod handler;
pub mod request_type;
pub mod service_desk;
pub mod ticket;
pub mod trigger;

#[cfg(test)]
mod test_support;

pub use custom_fields::{CustomFieldCache, CustomFieldSource};
pub use dispatch::{DispatchOutcome, DispatchSettings, Dispatcher};
pub use envelope::{FailureEnvelope, HandlerFault};
pub use handler::{
    Capability, CapabilityParseError, CapabilitySet, HandlerContext, HandlerLocator,
    HandlerRegistry, LoadError, LoadedHandler, TicketHandler,
};
pub use request_type::{RequestTypeId, RequestTypeResolver, ResolveError};
pub use service_desk::{ServiceDesk, ServiceDeskError};
pub use ticket::{EventKind, Reporter, TicketError, TicketEvent, TicketRef, TicketView};
pub use trigger::{classify, ChangelogItem, DispatchDecision, FieldChange};

// Comment types are shared with the REST client.
pub use servicedesk_sdk::{Comment, CommentAuthor};
