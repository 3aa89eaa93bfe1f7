//! Progress events for orchestration sessions
//!
//! Typed event union, envelope and a broadcast bus that sequences what it sends.
//! Subscribers receive events for a session in the order they were emitted.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::*;
