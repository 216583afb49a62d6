//! Per-delivery dispatch.
//!
//! Each delivery runs through one short-lived state machine:
//!
//! ```text
//! Init -> Resolved -> Classified -> Gated -> Invoking -> Done
//!   \________\____________\___________\________________-> Aborted
//! ```
//!
//! * **Init**: normalise the body; decline anonymous tickets.
//! * **Resolved**: resolve the request type, locate and load the handler.
//! * **Classified**: work out which sub-events occurred. Only the generic
//!   platform route needs the [`classify`] pass; every other route names its
//!   capability directly.
//! * **Gated**: keep the sub-events the handler declared; suppress comments
//!   the automation posted itself.
//! * **Invoking**: archive the payload if the handler asked for it, then call
//!   the handler slots in order: transition, assignment, generic hook.
//!
//! Nothing in here fails the HTTP request. Every outcome is reported as a
//! [`DispatchOutcome`] for logging and tests.

use chrono::Local;
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::envelope::FailureEnvelope;
use crate::handler::{Capability, HandlerContext, HandlerLocator, LoadedHandler, TicketHandler};
use crate::request_type::RequestTypeResolver;
use crate::service_desk::{ServiceDesk, ServiceDeskError};
use crate::ticket::{EventKind, TicketEvent};
use crate::trigger::{classify, FieldChange};
use servicedesk_sdk::Comment;

/// Public comment posted when an anonymous ticket is declined.
pub const ANONYMOUS_MESSAGE: &str = "It is not possible to action this request. It has been \
     submitted anonymously. Please sign in to Service Desk and try again.";

/// Comment accompanying an archived delivery.
pub const PAYLOAD_ATTACHMENT_COMMENT: &str = "Request payload for ticket creation";

/// Behaviour switches for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Decline tickets whose reporter cannot be identified
    pub decline_anonymous: bool,
    /// Status anonymous tickets are moved to
    pub decline_status: String,
    /// Public comment explaining the decline
    pub anonymous_message: String,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            decline_anonymous: true,
            decline_status: "Declined".to_string(),
            anonymous_message: ANONYMOUS_MESSAGE.to_string(),
        }
    }
}

/// How a delivery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No handler owns the ticket's request type.
    NoHandler,
    /// A handler exists but declared none of the sub-events that occurred.
    NotApplicable,
    /// The delivery was caused by the automation's own comment.
    Suppressed,
    /// The ticket was submitted anonymously and has been declined.
    Declined,
    /// Dispatch stopped before any handler ran.
    Aborted { reason: String },
    /// Every planned handler slot completed.
    Completed { invoked: Vec<Capability> },
    /// A handler slot failed; later slots were skipped.
    Failed { capability: Capability },
}

/// One handler slot to call.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Invocation {
    Create,
    Comment,
    OrgChange,
    Transition(FieldChange),
    Assignment(FieldChange),
    GenericHook,
}

impl Invocation {
    fn capability(&self) -> Capability {
        match self {
            Self::Create => Capability::Create,
            Self::Comment => Capability::Comment,
            Self::OrgChange => Capability::OrgChange,
            Self::Transition(_) => Capability::Transition,
            Self::Assignment(_) => Capability::Assignment,
            Self::GenericHook => Capability::JiraHook,
        }
    }

    fn call<'a>(
        &'a self,
        handler: &'a dyn TicketHandler,
        ctx: &'a HandlerContext,
        event: &'a TicketEvent,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        let ticket = &event.ticket;
        match self {
            Self::Create => handler.create(ctx, ticket),
            Self::Comment => handler.comment(ctx, ticket),
            Self::OrgChange => handler.org_change(ctx, ticket),
            Self::Transition(change) => {
                handler.transition(ctx, change.from.as_deref(), change.to.as_deref(), ticket)
            }
            Self::Assignment(change) => {
                handler.assignment(ctx, change.from.as_deref(), change.to.as_deref(), ticket)
            }
            Self::GenericHook => handler.generic_hook(ctx, ticket, event.changelog.as_deref()),
        }
    }
}

/// Routes deliveries to handlers.
pub struct Dispatcher {
    service_desk: Arc<dyn ServiceDesk>,
    resolver: Arc<RequestTypeResolver>,
    locator: HandlerLocator,
    envelope: FailureEnvelope,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        service_desk: Arc<dyn ServiceDesk>,
        resolver: Arc<RequestTypeResolver>,
        locator: HandlerLocator,
    ) -> Self {
        Self {
            envelope: FailureEnvelope::new(service_desk.clone()),
            service_desk,
            resolver,
            locator,
            settings: DispatchSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: DispatchSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn locator(&self) -> &HandlerLocator {
        &self.locator
    }

    /// Dispatch a raw request body received on the route for `kind`.
    #[instrument(skip(self, body), fields(route = %kind))]
    pub async fn dispatch(&self, kind: EventKind, body: &[u8]) -> DispatchOutcome {
        match TicketEvent::from_slice(kind, body) {
            Ok(event) => self.dispatch_event(&event).await,
            Err(e) => {
                warn!(error = %e, "Ignoring delivery without a usable ticket");
                DispatchOutcome::Aborted {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Dispatch an already normalised delivery.
    #[instrument(skip(self, event), fields(route = %event.kind, ticket = %event.ticket.key()))]
    pub async fn dispatch_event(&self, event: &TicketEvent) -> DispatchOutcome {
        let ticket = event.ticket.reference();

        if self.settings.decline_anonymous && event.ticket.is_anonymous() {
            return self.decline_anonymous(event).await;
        }

        // Init -> Resolved
        let request_type = match self.resolver.resolve(&event.ticket).await {
            Ok(Some(request_type)) => request_type,
            Ok(None) => {
                info!("Unable to determine request type");
                return DispatchOutcome::NoHandler;
            }
            Err(e) => {
                self.envelope.report_dispatch_error(ticket, &e).await;
                return DispatchOutcome::Aborted {
                    reason: e.to_string(),
                };
            }
        };

        let Some(name) = self.locator.locate(Some(&request_type)) else {
            info!(request_type = %request_type, "No handler found for request type");
            return DispatchOutcome::NoHandler;
        };
        let handler = match self.locator.registry().load(&name) {
            Ok(handler) => handler,
            Err(e) => {
                warn!(
                    request_type = %request_type,
                    error = %e,
                    "Handler configuration defect, treating as no handler"
                );
                return DispatchOutcome::NoHandler;
            }
        };
        info!(
            request_type = %request_type,
            handler = %handler.name(),
            capabilities = %handler.capabilities(),
            "Resolved handler"
        );

        // Resolved -> Classified -> Gated
        let plan = match self.plan(event, &handler).await {
            Ok(plan) => plan,
            Err(outcome) => return outcome,
        };
        if plan.is_empty() {
            info!(handler = %handler.name(), "Handler does not handle this delivery");
            return DispatchOutcome::NotApplicable;
        }

        // Gated -> Invoking
        if handler.persist_raw_payload() {
            self.persist_payload(event).await;
        }

        let ctx = HandlerContext::new(
            self.service_desk.clone(),
            ticket.clone(),
            Some(request_type),
        );
        let mut invoked = Vec::with_capacity(plan.len());
        for invocation in &plan {
            let capability = invocation.capability();
            info!(handler = %handler.name(), capability = %capability, "Calling handler");

            let call = invocation.call(handler.handler(), &ctx, event);
            if let Err(fault) = self.envelope.invoke(ticket, capability, call).await {
                return DispatchOutcome::Failed {
                    capability: fault.capability(),
                };
            }
            invoked.push(capability);
        }

        DispatchOutcome::Completed { invoked }
    }

    /// Work out which handler slots apply to this delivery.
    async fn plan(
        &self,
        event: &TicketEvent,
        handler: &LoadedHandler,
    ) -> Result<Vec<Invocation>, DispatchOutcome> {
        let mut plan = Vec::new();

        match event.kind {
            EventKind::Created => {
                if handler.handles(Capability::Create) {
                    plan.push(Invocation::Create);
                }
            }
            EventKind::Commented => {
                if handler.handles(Capability::Comment) {
                    match self.is_self_comment(event).await {
                        Ok(true) => {
                            warn!("Ignoring comment posted by the automation account");
                            return Err(DispatchOutcome::Suppressed);
                        }
                        Ok(false) => plan.push(Invocation::Comment),
                        Err(e) => {
                            error!(error = %e, "Cannot tell who wrote the latest comment");
                            return Err(DispatchOutcome::Aborted {
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }
            EventKind::OrgChanged => {
                if handler.handles(Capability::OrgChange) {
                    plan.push(Invocation::OrgChange);
                }
            }
            EventKind::TransitionedByAutomation => {
                // The automation rule only reports the status it moved to.
                if handler.handles(Capability::Transition) {
                    plan.push(Invocation::Transition(FieldChange {
                        from: None,
                        to: event.ticket.status_name().map(str::to_string),
                    }));
                }
            }
            EventKind::GenericPlatformHook => {
                let mut decision = match classify(&event.raw_payload) {
                    Ok(decision) => decision,
                    Err(e) => {
                        self.envelope
                            .report_dispatch_error(event.ticket.reference(), &e)
                            .await;
                        return Err(DispatchOutcome::Aborted {
                            reason: e.to_string(),
                        });
                    }
                };
                decision.generic_hook =
                    handler.handles(Capability::JiraHook) && decision.is_unclassified();
                debug!(?decision, "Classified delivery");

                if let Some(change) = decision.transition {
                    if handler.handles(Capability::Transition) {
                        plan.push(Invocation::Transition(change));
                    }
                }
                if let Some(change) = decision.assignment {
                    if handler.handles(Capability::Assignment) {
                        plan.push(Invocation::Assignment(change));
                    }
                }
                if decision.generic_hook {
                    plan.push(Invocation::GenericHook);
                }
            }
        }

        Ok(plan)
    }

    /// Latest comment: the one carried by the delivery, else the platform's.
    async fn latest_comment(&self, event: &TicketEvent) -> Result<Option<Comment>, ServiceDeskError> {
        if let Some(comment) = event.ticket.comment() {
            return Ok(Some(comment.clone()));
        }
        self.service_desk
            .latest_comment(event.ticket.reference())
            .await
    }

    async fn is_self_comment(&self, event: &TicketEvent) -> Result<bool, ServiceDeskError> {
        Ok(self
            .latest_comment(event)
            .await?
            .is_some_and(|comment| self.service_desk.is_automation_account(&comment.author)))
    }

    async fn decline_anonymous(&self, event: &TicketEvent) -> DispatchOutcome {
        let ticket = event.ticket.reference();

        if event
            .ticket
            .status_name()
            .is_some_and(|status| status.eq_ignore_ascii_case(&self.settings.decline_status))
        {
            info!(status = %self.settings.decline_status, "Anonymous ticket already declined");
            return DispatchOutcome::Suppressed;
        }

        // Declining posts a comment, which comes back on both the comment
        // route and the platform hook.
        if event.kind == EventKind::Commented || event.ticket.comment().is_some() {
            match self.is_self_comment(event).await {
                Ok(true) => {
                    info!("Anonymous ticket, ignoring comment posted by the automation account");
                    return DispatchOutcome::Suppressed;
                }
                Ok(false) => {}
                Err(e) => {
                    error!(error = %e, "Cannot tell who wrote the latest comment");
                    return DispatchOutcome::Aborted {
                        reason: e.to_string(),
                    };
                }
            }
        }

        info!("Ticket was submitted anonymously, declining");
        if let Err(e) = self
            .service_desk
            .post_comment(ticket, &self.settings.anonymous_message, true)
            .await
        {
            error!(error = %e, "Failed to post anonymous submission comment");
        }
        if let Err(e) = self
            .service_desk
            .transition_issue(ticket, &self.settings.decline_status)
            .await
        {
            error!(
                status = %self.settings.decline_status,
                error = %e,
                "Failed to decline anonymous ticket"
            );
        }

        DispatchOutcome::Declined
    }

    /// Archive the delivery on the ticket.
    ///
    /// Skipped when the delivery carries a comment the automation posted, as
    /// the attachment would trigger yet another delivery.
    async fn persist_payload(&self, event: &TicketEvent) {
        if let Some(comment) = event.ticket.comment() {
            if self.service_desk.is_automation_account(&comment.author) {
                debug!("Not archiving delivery caused by the automation account");
                return;
            }
        }

        let filename = payload_filename(Local::now());
        let result = self
            .service_desk
            .attach_file(
                event.ticket.reference(),
                &filename,
                event.raw_payload.to_string(),
                PAYLOAD_ATTACHMENT_COMMENT,
                false,
            )
            .await;

        match result {
            Ok(()) => debug!(filename = %filename, "Archived delivery payload"),
            Err(e) => error!(filename = %filename, error = %e, "Failed to archive delivery payload"),
        }
    }
}

/// Attachment name for an archived delivery, e.g. `5Oct-1412.json`.
pub fn payload_filename<Tz>(now: chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    now.format("%e%b-%H%M.json").to_string().trim_start().to_string()
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
