//! Coordination events.
//!
//! Every protocol decision emits an event consumed by the owning session
//! or supervisor. Events are observational — components never block on
//! them and publishing with zero subscribers is not an error.

pub mod bus;
pub mod types;

pub use bus::{EventBus, SharedEventBus};
pub use types::CoordinationEvent;
