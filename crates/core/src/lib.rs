//! Domain types shared by the orchestrator and the HTTP surface.

pub mod domain;
pub mod error;

pub use domain::*;
pub use error::{CoreError, Result};
