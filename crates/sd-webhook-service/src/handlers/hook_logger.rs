//! Logs generic platform updates that are neither transitions nor
//! assignments.

use async_trait::async_trait;
use sd_webhook_core::{
    Capability, CapabilitySet, ChangelogItem, HandlerContext, TicketHandler, TicketView,
};
use tracing::info;

#[derive(Debug, Default)]
pub struct HookLogger;

#[async_trait]
impl TicketHandler for HookLogger {
    fn capabilities(&self) -> Option<CapabilitySet> {
        Some(CapabilitySet::new().with(Capability::JiraHook))
    }

    async fn generic_hook(
        &self,
        _ctx: &HandlerContext,
        ticket: &TicketView,
        changelog: Option<&[ChangelogItem]>,
    ) -> anyhow::Result<()> {
        let fields: Vec<&str> = changelog
            .unwrap_or_default()
            .iter()
            .map(|item| item.field.as_str())
            .collect();
        info!(ticket = %ticket.key(), fields = ?fields, "Issue updated");
        Ok(())
    }
}
