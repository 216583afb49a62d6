//! Failure envelope around handler invocations.
//!
//! Handler errors and panics never reach the HTTP layer. Each one is
//! reported once as a private comment on the ticket, which is the main
//! diagnostic channel operators have. Failing to post that comment is only
//! logged.

use futures::FutureExt;
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};
use tracing::{error, warn};

use crate::handler::Capability;
use crate::service_desk::ServiceDesk;
use crate::ticket::TicketRef;

/// Prefix of the diagnostic comment posted when a handler fails.
pub const UNEXPECTED_ERROR_PREFIX: &str = "An unexpected error occurred in the automation:\n";

/// Suffix of the comment posted when dispatch cannot start.
pub const CONFIGURATION_HINT: &str = ". Please check the configuration and logs.";

/// A handler invocation that did not complete normally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerFault {
    #[error("{capability} handler failed: {detail}")]
    Error {
        capability: Capability,
        detail: String,
        trace: String,
    },

    #[error("{capability} handler panicked: {message}")]
    Panic {
        capability: Capability,
        message: String,
        trace: String,
    },
}

impl HandlerFault {
    pub fn capability(&self) -> Capability {
        match self {
            Self::Error { capability, .. } | Self::Panic { capability, .. } => *capability,
        }
    }

    /// Stack trace captured where the fault happened.
    pub fn trace(&self) -> &str {
        match self {
            Self::Error { trace, .. } | Self::Panic { trace, .. } => trace,
        }
    }

    fn diagnostic(&self) -> String {
        let summary = match self {
            Self::Error { detail, .. } => detail.clone(),
            Self::Panic { message, .. } => format!("handler panicked: {message}"),
        };
        format!(
            "{UNEXPECTED_ERROR_PREFIX}{summary}\n\nStack trace:\n{}",
            self.trace()
        )
    }
}

/// Runs handler calls and reports their failures to the ticket.
#[derive(Clone)]
pub struct FailureEnvelope {
    service_desk: Arc<dyn ServiceDesk>,
}

impl FailureEnvelope {
    pub fn new(service_desk: Arc<dyn ServiceDesk>) -> Self {
        install_panic_hook();
        Self { service_desk }
    }

    /// Run one handler call.
    ///
    /// On error or panic exactly one private diagnostic comment is posted to
    /// `ticket` and the fault is returned for the caller's bookkeeping.
    pub async fn invoke<F>(
        &self,
        ticket: &TicketRef,
        capability: Capability,
        call: F,
    ) -> Result<(), HandlerFault>
    where
        F: Future<Output = anyhow::Result<()>> + Send,
    {
        let fault = match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => HandlerFault::Error {
                capability,
                detail: format!("{err:#}"),
                trace: error_trace(&err),
            },
            // The hook ran on this thread while unwinding.
            Err(payload) => HandlerFault::Panic {
                capability,
                message: panic_message(payload.as_ref()),
                trace: PANIC_TRACE
                    .with(|slot| slot.borrow_mut().take())
                    .unwrap_or_else(|| Backtrace::force_capture().to_string()),
            },
        };

        error!(
            ticket = %ticket,
            capability = %capability,
            error = %fault,
            "Handler invocation failed"
        );
        self.post_private(ticket, &fault.diagnostic()).await;
        Err(fault)
    }

    /// Report an error that stopped dispatch before any handler ran.
    pub async fn report_dispatch_error(
        &self,
        ticket: &TicketRef,
        err: &(dyn fmt::Display + Sync),
    ) {
        warn!(ticket = %ticket, error = %err, "Dispatch aborted");
        self.post_private(ticket, &format!("{err}{CONFIGURATION_HINT}"))
            .await;
    }

    async fn post_private(&self, ticket: &TicketRef, body: &str) {
        if let Err(e) = self.service_desk.post_comment(ticket, body, false).await {
            error!(
                ticket = %ticket,
                error = %e,
                "Failed to post diagnostic comment"
            );
        }
    }
}

impl fmt::Debug for FailureEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureEnvelope").finish_non_exhaustive()
    }
}

thread_local! {
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Record the location and stack of every panic for the envelope to pick up.
///
/// The previously installed hook still runs afterwards.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map_or_else(|| "unknown location".to_string(), ToString::to_string);
            let trace = format!("at {location}\n{}", Backtrace::force_capture());
            PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

/// Backtrace of the error's origin, or of the envelope when none was captured.
fn error_trace(err: &anyhow::Error) -> String {
    let origin = err.backtrace();
    if origin.status() == BacktraceStatus::Captured {
        origin.to_string()
    } else {
        Backtrace::force_capture().to_string()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
