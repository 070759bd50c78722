use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::json;

use atlaserp_ai::ScriptedCompletion;
use atlaserp_api::app::build_app;
use atlaserp_api::context::AppContext;
use atlaserp_orchestrator::{Orchestrator, OrchestratorConfig};

struct TestServer {
    base_url: String,
    orchestrator: Arc<Orchestrator>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(true).await
    }

    async fn spawn_with(initialize: bool) -> Self {
        let completion = ScriptedCompletion::new().with_fallback("scripted answer");
        let orchestrator = Orchestrator::builder()
            .with_config(
                OrchestratorConfig::default()
                    .with_agent_timeout(Duration::from_secs(2))
                    .with_error_pause(Duration::ZERO),
            )
            .with_completion(Arc::new(completion))
            .build()
            .expect("orchestrator builds");
        let orchestrator = Arc::new(orchestrator);
        if initialize {
            orchestrator.initialize().await.expect("orchestrator initializes");
        }

        // Same router as prod, bound to an ephemeral port.
        let app = build_app(AppContext::new(orchestrator.clone()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            orchestrator,
            handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn stats_eventually(client: &reqwest::Client, base_url: &str, processed: u64) -> serde_json::Value {
    // Delivery is asynchronous; poll until the drain loop catches up.
    for _ in 0..100 {
        let stats: serde_json::Value = client
            .get(format!("{}/ai/messages/stats", base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if stats["messages_processed"].as_u64() == Some(processed) {
            return stats;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("drain loop did not process {processed} messages in time");
}

#[tokio::test]
async fn health_reports_orchestrator_state() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["orchestrator"], "ready");
    assert_eq!(body["agents"], 10);
}

#[tokio::test]
async fn chat_routes_invoice_to_accounting() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/ai/chat", srv.base_url))
        .header("x-user-id", "u-7")
        .json(&json!({"message": "Show me the latest invoice"}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["agent"], "accounting");
    assert_eq!(body["response"], "scripted answer");
    assert_eq!(body["data"]["user_id"], "u-7");
}

#[tokio::test]
async fn chat_without_domain_uses_general() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let body: serde_json::Value = client
        .post(format!("{}/ai/chat", srv.base_url))
        .json(&json!({"message": "What's the weather", "context": {"page": "dashboard"}}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "success");
    assert_eq!(body["agent"], "general");
}

#[tokio::test]
async fn empty_chat_message_is_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/ai/chat", srv.base_url))
        .json(&json!({"message": "   "}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn uninitialized_orchestrator_is_unavailable() {
    let srv = TestServer::spawn_with(false).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/ai/chat", srv.base_url))
        .json(&json!({"message": "Show me the latest invoice"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let res = client
        .post(format!("{}/ai/messages", srv.base_url))
        .json(&json!({"message_type": "event", "target": "broadcast"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_initialized");
}

#[tokio::test]
async fn agent_status_and_capabilities() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let all: serde_json::Value = client
        .get(format!("{}/ai/agents/status", srv.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.as_object().unwrap().len(), 10);
    assert_eq!(all["crm"], "idle");

    let unknown: serde_json::Value = client
        .get(format!("{}/ai/agents/status/payroll-bot", srv.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unknown["payroll-bot"], "offline");

    let caps: serde_json::Value = client
        .get(format!("{}/ai/agents/capabilities/purchase", srv.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        caps["purchase"],
        json!(["purchase_orders", "vendor_comparison", "rfq_drafting"])
    );

    let none: serde_json::Value = client
        .get(format!("{}/ai/agents/capabilities/ghost", srv.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(none["ghost"], json!([]));
}

#[tokio::test]
async fn broadcast_message_is_accepted_and_drained() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/ai/messages", srv.base_url))
        .json(&json!({
            "message_type": "event",
            "source": "accounting",
            "target": "broadcast",
            "payload": {"event": "period_closed"},
            "priority": "high"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "queued");
    assert!(body["message_id"].is_string());

    let stats = stats_eventually(&client, &srv.base_url, 1).await;
    assert_eq!(stats["deliveries_succeeded"], 9);
    assert_eq!(stats["deliveries_failed"], 0);
    assert_eq!(stats["running"], true);
}

#[tokio::test]
async fn invalid_message_addresses_are_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/ai/messages", srv.base_url))
        .json(&json!({"message_type": "request", "target": "Not A Name"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_target");

    let res = client
        .post(format!("{}/ai/messages", srv.base_url))
        .json(&json!({"message_type": "event", "source": "general", "target": "crm"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_target_is_accepted_then_dropped() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/ai/messages", srv.base_url))
        .json(&json!({"message_type": "request", "target": "ghost", "payload": {"query": "hi"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);

    let stats = stats_eventually(&client, &srv.base_url, 1).await;
    assert_eq!(stats["messages_dropped"], 1);

    srv.orchestrator.cleanup().await;
    assert!(!srv.orchestrator.is_initialized());
}
