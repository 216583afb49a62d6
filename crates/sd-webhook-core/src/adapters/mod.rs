//! Implementations of the core traits over external systems.

mod servicedesk;

pub use servicedesk::RestServiceDesk;
