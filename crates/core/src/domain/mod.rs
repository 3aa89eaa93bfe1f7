mod phase;
mod session;
mod worker;

pub use phase::*;
pub use session::*;
pub use worker::*;
