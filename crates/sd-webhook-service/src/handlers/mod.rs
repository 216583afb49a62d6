//! Compiled-in ticket handlers.
//!
//! Handlers are located by name: an explicit entry in the `handlers` table
//! of the configuration, then `rt<request type id>`, then `*`.

mod example;
mod hook_logger;

pub use example::ExampleHandler;
pub use hook_logger::HookLogger;

use sd_webhook_core::HandlerRegistry;

/// Name of the example handler, usable for request type 206 by convention.
pub const EXAMPLE: &str = "rt206";

/// Name of the generic platform hook logger.
pub const HOOK_LOGGER: &str = "hook_logger";

/// Registry of every handler shipped with the service.
pub fn registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry
        .register(EXAMPLE, || ExampleHandler)
        .register(HOOK_LOGGER, || HookLogger);
    registry
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
