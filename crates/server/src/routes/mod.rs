mod agent;
mod agents;
mod health;
mod kingmode;
mod orchestrate;
pub mod sse;
mod tasks;

pub use agent::*;
pub use agents::*;
pub use health::*;
pub use kingmode::*;
pub use orchestrate::*;
pub use tasks::*;

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

pub async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
