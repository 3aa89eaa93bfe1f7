use axum::http::StatusCode;
use axum_test::TestServer;
use orchestrator::registry::DEFAULT_WORKERS;
use serde_json::{json, Value};
use server::config::{HubConfig, RetryConfig};
use server::{create_router, state::AppState};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(workers: &MockServer) -> HubConfig {
    HubConfig {
        workers: DEFAULT_WORKERS
            .iter()
            .map(|name| (name.to_string(), format!("{}/{}", workers.uri(), name)))
            .collect(),
        retry: RetryConfig {
            max_attempts: 1,
            read_max_attempts: 1,
            ..RetryConfig::default()
        },
        ..HubConfig::default()
    }
}

async fn setup_test_server() -> (TestServer, MockServer) {
    let workers = MockServer::start().await;
    let config = config_for(&workers);
    config.validate().expect("Test config should be valid");

    let app = create_router(AppState::new(&config));
    let server = TestServer::new(app).expect("Failed to create test server");

    (server, workers)
}

async fn every_worker_replies(workers: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path_regex(r"^/[a-z]+/process$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(workers)
        .await;
}

async fn worker_replies(workers: &MockServer, worker: &str, template: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(format!("/{}/process", worker)))
        .respond_with(template)
        .with_priority(1)
        .mount(workers)
        .await;
}

mod health {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint() {
        let (server, _workers) = setup_test_server().await;

        let response = server.get("/health").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["service"], "acheevy-hub");
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["agents"], 19);
        assert_eq!(body["activeTasks"], 0);
        assert!(body["version"].is_string());
        assert!(body["environment"].is_string());
    }

    #[tokio::test]
    async fn test_root_aliases_health() {
        let (server, _workers) = setup_test_server().await;

        let response = server.get("/").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (server, _workers) = setup_test_server().await;

        let response = server.get("/api/v2/nothing").await;

        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["error"], "Not found");
    }

    #[tokio::test]
    async fn test_openapi_document() {
        let (server, _workers) = setup_test_server().await;

        let response = server.get("/api/openapi.json").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert!(body["paths"]["/api/v1/kingmode"].is_object());
        assert!(body["paths"]["/api/v1/agent/{worker_name}"].is_object());
    }
}

mod registries {
    use super::*;

    #[tokio::test]
    async fn test_list_agents() {
        let (server, _workers) = setup_test_server().await;

        let response = server.get("/api/v1/agents").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["count"], 19);
        let agents: Vec<&str> = body["agents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a.as_str().unwrap())
            .collect();
        assert!(agents.contains(&"codegen"));
        assert!(agents.contains(&"nlu"));
    }

    #[tokio::test]
    async fn test_list_phases() {
        let (server, _workers) = setup_test_server().await;

        let response = server.get("/api/v1/phases").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["plan"], json!(["BRAINSTORM", "FORMING", "AGENT"]));
        assert_eq!(body["phases"][1]["workerNames"], json!(["codegen", "validation", "security"]));
        assert_eq!(body["phases"][2]["maxDurationMs"], 120_000);
    }
}

mod kingmode {
    use super::*;

    #[tokio::test]
    async fn test_runs_every_phase() {
        let (server, workers) = setup_test_server().await;
        every_worker_replies(&workers, json!({"ok": true})).await;

        let response = server
            .post("/api/v1/kingmode")
            .json(&json!({"prompt": "build a todo app"}))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert!(body["sessionId"].as_str().unwrap().starts_with("km_"));
        assert_eq!(body["status"], "completed");
        assert_eq!(body["plan"], json!(["BRAINSTORM", "FORMING", "AGENT"]));
        for phase in ["BRAINSTORM", "FORMING", "AGENT"] {
            let outcomes = body["phaseResults"][phase]["workerOutcomes"]
                .as_array()
                .unwrap();
            assert_eq!(outcomes.len(), 3);
            assert!(outcomes.iter().all(|o| o["status"] == "fulfilled"));
        }

        // 3 phases x 3 workers
        assert_eq!(workers.received_requests().await.unwrap().len(), 9);
    }

    #[tokio::test]
    async fn test_partial_failure_is_still_200() {
        let (server, workers) = setup_test_server().await;
        worker_replies(
            &workers,
            "security",
            ResponseTemplate::new(500).set_body_string("scanner offline"),
        )
        .await;
        every_worker_replies(&workers, json!({"ok": true})).await;

        let response = server
            .post("/api/v1/kingmode")
            .json(&json!({"prompt": "harden it"}))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "completed");
        let security = &body["phaseResults"]["FORMING"]["workerOutcomes"][2];
        assert_eq!(security["workerName"], "security");
        assert_eq!(security["status"], "rejected");
        assert!(security["errorMessage"]
            .as_str()
            .unwrap()
            .contains("scanner offline"));
    }

    #[tokio::test]
    async fn test_custom_plan() {
        let (server, workers) = setup_test_server().await;
        every_worker_replies(&workers, json!({})).await;

        let response = server
            .post("/api/v1/kingmode")
            .json(&json!({"prompt": "just think", "plan": ["BRAINSTORM"]}))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["plan"], json!(["BRAINSTORM"]));
        assert!(body["phaseResults"]["FORMING"].is_null());

        let sent: Value = workers.received_requests().await.unwrap()[0]
            .body_json()
            .unwrap();
        assert!(sent["input"].get("plan").is_none());
    }

    #[tokio::test]
    async fn test_unknown_phase_is_400() {
        let (server, workers) = setup_test_server().await;

        let response = server
            .post("/api/v1/kingmode")
            .json(&json!({"prompt": "x", "plan": ["BRAINSTORM", "REVIEW"]}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["kind"], "unknown_phase");
        assert!(body["error"].as_str().unwrap().contains("REVIEW"));
        assert!(workers.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_phase_is_400() {
        let (server, workers) = setup_test_server().await;

        let response = server
            .post("/api/v1/kingmode")
            .json(&json!({"prompt": "x", "plan": ["BRAINSTORM", "BRAINSTORM"]}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["kind"], "bad_request");
        assert!(workers.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_body_must_be_an_object() {
        let (server, _workers) = setup_test_server().await;

        let response = server.post("/api/v1/kingmode").json(&json!(["x"])).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server.post("/api/v1/kingmode").text("not json").await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["kind"], "bad_request");
    }
}

mod direct {
    use super::*;

    #[tokio::test]
    async fn test_direct_call() {
        let (server, workers) = setup_test_server().await;
        worker_replies(
            &workers,
            "codegen",
            ResponseTemplate::new(200).set_body_json(json!({"code": "fn main() {}"})),
        )
        .await;

        let response = server
            .post("/api/v1/agent/codegen")
            .json(&json!({"taskId": "t-42", "prompt": "hello world"}))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["worker"], "codegen");
        assert_eq!(body["taskId"], "t-42");
        assert_eq!(body["attempts"], 1);
        assert_eq!(body["result"]["code"], "fn main() {}");
        assert!(body["correlationId"].is_string());

        let history: Value = server.get("/api/v1/tasks/history").await.json();
        assert_eq!(history["count"], 1);
        assert_eq!(history["tasks"][0]["taskId"], "t-42");
        assert_eq!(history["tasks"][0]["status"], "succeeded");

        let active: Value = server.get("/api/v1/tasks/active").await.json();
        assert_eq!(active["count"], 0);
    }

    #[tokio::test]
    async fn test_unknown_worker_is_404() {
        let (server, workers) = setup_test_server().await;

        let response = server.post("/api/v1/agent/ghost").json(&json!({})).await;

        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["kind"], "unknown_worker");
        assert!(body["error"].as_str().unwrap().contains("ghost"));
        assert!(workers.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_worker_failure_is_502() {
        let (server, workers) = setup_test_server().await;
        worker_replies(
            &workers,
            "deploy",
            ResponseTemplate::new(503).set_body_string("cluster busy"),
        )
        .await;

        let response = server.post("/api/v1/agent/deploy").json(&json!({})).await;

        response.assert_status(StatusCode::BAD_GATEWAY);
        let body: Value = response.json();
        assert_eq!(body["kind"], "upstream_error");
        assert!(body["error"].as_str().unwrap().contains("cluster busy"));
        assert!(body["correlationId"].is_string());

        let history: Value = server.get("/api/v1/tasks/history").await.json();
        assert_eq!(history["tasks"][0]["status"], "failed");
    }
}

mod orchestrate {
    use super::*;

    #[tokio::test]
    async fn test_routes_by_intent() {
        let (server, workers) = setup_test_server().await;
        worker_replies(
            &workers,
            "nlu",
            ResponseTemplate::new(200).set_body_json(json!({"result": {"intent": "security"}})),
        )
        .await;
        worker_replies(
            &workers,
            "security",
            ResponseTemplate::new(200).set_body_json(json!({"findings": []})),
        )
        .await;

        let response = server
            .post("/api/v1/orchestrate")
            .json(&json!({"message": "audit my login flow"}))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["intent"], "security");
        assert_eq!(body["worker"], "security");
        assert_eq!(body["nluResult"], json!({"intent": "security"}));
        assert_eq!(body["result"]["result"]["findings"], json!([]));
    }

    #[tokio::test]
    async fn test_unmapped_intent_goes_to_reasoning() {
        let (server, workers) = setup_test_server().await;
        worker_replies(
            &workers,
            "nlu",
            ResponseTemplate::new(200).set_body_json(json!({"result": {"intent": "smalltalk"}})),
        )
        .await;
        worker_replies(
            &workers,
            "reasoning",
            ResponseTemplate::new(200).set_body_json(json!({"reply": "hi"})),
        )
        .await;

        let response = server
            .post("/api/v1/orchestrate")
            .json(&json!({"prompt": "hello there"}))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["worker"], "reasoning");
    }

    #[tokio::test]
    async fn test_classification_failure_is_502() {
        let (server, workers) = setup_test_server().await;
        worker_replies(&workers, "nlu", ResponseTemplate::new(500)).await;

        let response = server
            .post("/api/v1/orchestrate")
            .json(&json!({"prompt": "anything"}))
            .await;

        response.assert_status(StatusCode::BAD_GATEWAY);
        let body: Value = response.json();
        assert_eq!(body["kind"], "classification_failure");
    }
}
