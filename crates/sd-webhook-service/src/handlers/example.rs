//! Example handler for a test request type.

use async_trait::async_trait;
use sd_webhook_core::{Capability, CapabilitySet, HandlerContext, TicketHandler, TicketView};
use tracing::info;

/// Logs every ticket event it declares and archives the raw payload.
#[derive(Debug, Default)]
pub struct ExampleHandler;

#[async_trait]
impl TicketHandler for ExampleHandler {
    fn capabilities(&self) -> Option<CapabilitySet> {
        Some(
            CapabilitySet::new()
                .with(Capability::Create)
                .with(Capability::Comment)
                .with(Capability::Assignment)
                .with(Capability::Transition),
        )
    }

    fn persist_raw_payload(&self) -> bool {
        true
    }

    async fn create(&self, _ctx: &HandlerContext, ticket: &TicketView) -> anyhow::Result<()> {
        info!(ticket = %ticket.key(), "Create function has been called");
        Ok(())
    }

    async fn comment(&self, _ctx: &HandlerContext, ticket: &TicketView) -> anyhow::Result<()> {
        let body = ticket.comment().map(|c| c.body.as_str()).unwrap_or_default();
        info!(ticket = %ticket.key(), comment = %body, "Comment function has been called");
        Ok(())
    }

    async fn transition(
        &self,
        _ctx: &HandlerContext,
        from: Option<&str>,
        to: Option<&str>,
        ticket: &TicketView,
    ) -> anyhow::Result<()> {
        info!(ticket = %ticket.key(), from = ?from, to = ?to, "Transition");
        Ok(())
    }

    async fn assignment(
        &self,
        _ctx: &HandlerContext,
        from: Option<&str>,
        to: Option<&str>,
        ticket: &TicketView,
    ) -> anyhow::Result<()> {
        info!(ticket = %ticket.key(), from = ?from, to = ?to, "Assigned");
        Ok(())
    }
}
