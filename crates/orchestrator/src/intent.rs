//! Intent classification and intent → worker routing.

use std::collections::HashMap;
use std::sync::Arc;

use hub_core::WorkerRequest;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::client::{CallOptions, WorkerCaller};
use crate::error::{CallError, OrchestratorError, Result};

pub const DEFAULT_CLASSIFIER: &str = "nlu";
pub const DEFAULT_FALLBACK_WORKER: &str = "reasoning";
pub const GENERAL_INTENT: &str = "general";

/// Fixed intent → worker table with a fallback for anything unmapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentTable {
    routes: HashMap<String, String>,
    fallback: String,
}

impl IntentTable {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            routes: HashMap::new(),
            fallback: fallback.into(),
        }
    }

    pub fn standard() -> Self {
        Self::new(DEFAULT_FALLBACK_WORKER)
            .with_route("code", "codegen")
            .with_route("research", "research")
            .with_route("security", "security")
            .with_route("deploy", "deploy")
            .with_route("validate", "validation")
            .with_route("data", "data")
            .with_route("reason", "reasoning")
            .with_route(GENERAL_INTENT, "reasoning")
    }

    pub fn with_route(mut self, intent: impl Into<String>, worker: impl Into<String>) -> Self {
        self.routes.insert(intent.into(), worker.into());
        self
    }

    pub fn resolve(&self, intent: &str) -> &str {
        self.routes
            .get(intent)
            .map(String::as_str)
            .unwrap_or(&self.fallback)
    }

    /// `(intent, worker)` pairs, fallback excluded.
    pub fn routes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.routes
            .iter()
            .map(|(intent, worker)| (intent.as_str(), worker.as_str()))
    }
}

impl Default for IntentTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// What the classifier said about an input.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub intent: String,
    /// The classifier's `result` object, or its whole body when it has none.
    pub raw: Value,
    pub correlation_id: Uuid,
}

/// Asks the classification worker for an intent, then maps it to a worker.
///
/// A failed classification is surfaced as-is; the fallback worker only
/// applies once an intent has actually been returned.
#[derive(Clone)]
pub struct IntentRouter {
    caller: Arc<dyn WorkerCaller>,
    classifier: String,
    table: IntentTable,
    options: CallOptions,
}

impl IntentRouter {
    pub fn new(caller: Arc<dyn WorkerCaller>) -> Self {
        Self {
            caller,
            classifier: DEFAULT_CLASSIFIER.to_string(),
            table: IntentTable::standard(),
            options: CallOptions::read(),
        }
    }

    pub fn with_classifier(mut self, worker: impl Into<String>) -> Self {
        self.classifier = worker.into();
        self
    }

    pub fn with_table(mut self, table: IntentTable) -> Self {
        self.table = table;
        self
    }

    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn classify(&self, payload: &Value) -> Result<Classification> {
        let request = WorkerRequest::new(
            format!("nlu_{}", Uuid::new_v4().simple()),
            classification_input(payload),
        );

        let response = self
            .caller
            .call(&self.classifier, &request, &self.options)
            .await
            .map_err(|e| match e {
                CallError::UnknownWorker { worker } => OrchestratorError::UnknownWorker(worker),
                other => OrchestratorError::ClassificationFailure(other),
            })?;

        let raw = match response.result {
            Value::Object(mut body) if body.contains_key("result") => {
                body.remove("result").unwrap_or(Value::Null)
            }
            other => other,
        };
        let intent = raw
            .get("intent")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(GENERAL_INTENT)
            .to_string();

        info!(
            task_id = %request.task_id,
            correlation_id = %response.correlation_id,
            intent = %intent,
            "Classified input"
        );

        Ok(Classification {
            intent,
            raw,
            correlation_id: response.correlation_id,
        })
    }

    pub fn route(&self, intent: &str) -> &str {
        let worker = self.table.resolve(intent);
        debug!(intent = %intent, worker = %worker, "Routed intent");
        worker
    }
}

/// The classifier sees the prompt text when there is one, the whole payload
/// otherwise.
fn classification_input(payload: &Value) -> Value {
    ["prompt", "message"]
        .iter()
        .find_map(|key| payload.get(*key).filter(|v| !v.is_null()).cloned())
        .unwrap_or_else(|| payload.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::CallOptions;
    use async_trait::async_trait;
    use hub_core::WorkerResponse;
    use serde_json::json;
    use std::sync::Mutex;

    struct CannedClassifier {
        reply: std::result::Result<Value, u16>,
        seen: Mutex<Vec<WorkerRequest>>,
    }

    #[async_trait]
    impl WorkerCaller for CannedClassifier {
        async fn call(
            &self,
            worker: &str,
            request: &WorkerRequest,
            _options: &CallOptions,
        ) -> std::result::Result<WorkerResponse, CallError> {
            self.seen.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(body) => Ok(WorkerResponse {
                    worker: worker.to_string(),
                    task_id: request.task_id.clone(),
                    correlation_id: Uuid::new_v4(),
                    status: 200,
                    attempts: 1,
                    result: body.clone(),
                }),
                Err(status) => Err(CallError::Status {
                    worker: worker.to_string(),
                    correlation_id: Uuid::new_v4(),
                    attempts: 2,
                    status: *status,
                    body: "classifier down".to_string(),
                }),
            }
        }
    }

    fn router(reply: std::result::Result<Value, u16>) -> (IntentRouter, Arc<CannedClassifier>) {
        let caller = Arc::new(CannedClassifier {
            reply,
            seen: Mutex::new(Vec::new()),
        });
        (IntentRouter::new(caller.clone()), caller)
    }

    #[test]
    fn test_standard_table() {
        let table = IntentTable::standard();
        assert_eq!(table.resolve("code"), "codegen");
        assert_eq!(table.resolve("validate"), "validation");
        assert_eq!(table.resolve(GENERAL_INTENT), "reasoning");
        assert_eq!(table.resolve("poetry"), DEFAULT_FALLBACK_WORKER);
    }

    #[test]
    fn test_custom_fallback() {
        let table = IntentTable::new("hitl").with_route("code", "codegen");
        assert_eq!(table.resolve("anything"), "hitl");
        assert!(table.routes().all(|(_, w)| w != "hitl"));
    }

    #[tokio::test]
    async fn test_classify_reads_nested_intent() {
        let (router, caller) = router(Ok(json!({"result": {"intent": "code", "confidence": 0.9}})));

        let classification = router
            .classify(&json!({"prompt": "write a parser"}))
            .await
            .unwrap();

        assert_eq!(classification.intent, "code");
        assert_eq!(classification.raw["confidence"], 0.9);
        assert_eq!(router.route(&classification.intent), "codegen");

        let seen = caller.seen.lock().unwrap();
        assert_eq!(seen[0].input, json!("write a parser"));
        assert!(seen[0].task_id.starts_with("nlu_"));
    }

    #[tokio::test]
    async fn test_classify_uses_message_and_defaults_to_general() {
        let (router, caller) = router(Ok(json!({"result": {}})));

        let classification = router.classify(&json!({"message": "hi"})).await.unwrap();

        assert_eq!(classification.intent, GENERAL_INTENT);
        assert_eq!(caller.seen.lock().unwrap()[0].input, json!("hi"));
    }

    #[tokio::test]
    async fn test_classify_failure_is_not_guessed() {
        let (router, _) = router(Err(503));

        let err = router.classify(&json!({"prompt": "x"})).await.unwrap_err();
        match err {
            OrchestratorError::ClassificationFailure(call) => {
                assert_eq!(call.status(), Some(503));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_classification_input_falls_back_to_payload() {
        let payload = json!({"task": "deploy it"});
        assert_eq!(classification_input(&payload), payload);
    }
}
