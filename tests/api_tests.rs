mod common;

use std::sync::Arc;

use econ_dashboard::routers::create_routes;
use econ_dashboard::*;
use regex::Regex;
use reqwest::StatusCode;
use serde_json::{json, Value};
use wiremock::matchers::{any, body_partial_json};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::sample_analysis;

struct TestApp {
    address: String,
    state: AppState,
    client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    async fn trigger(&self, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/analysis/trigger"))
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

async fn spawn_app(webhook_url: &str) -> TestApp {
    let config = AppConfig::with_webhook(webhook_url);
    let state = AppState {
        webhook: WebhookClient::new(&config).unwrap(),
        history: AnalysisHistoryHolder::open(Arc::new(MemorySlotStorage::new())).await,
    };

    let app = create_routes(state.clone());
    let server = axum::Server::bind(&"127.0.0.1:0".parse().unwrap()).serve(app.into_make_service());
    let address = format!("http://{}", server.local_addr());
    tokio::spawn(server);

    TestApp {
        address,
        state,
        client: reqwest::Client::new(),
    }
}

fn trigger_body(country: &str, indicator: &str) -> Value {
    json!({
        "country": country,
        "indicator": indicator,
        "startDate": "2020-01-01",
        "endDate": "2024-12-31"
    })
}

#[tokio::test]
async fn test_trigger_rejects_reversed_dates_without_calling_webhook() {
    let webhook = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&webhook)
        .await;
    let app = spawn_app(&webhook.uri()).await;

    let response = app
        .trigger(json!({
            "country": "US",
            "indicator": "GDP",
            "startDate": "2020-01-01",
            "endDate": "2019-01-01"
        }))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("startDate must be before endDate"));
}

#[tokio::test]
async fn test_trigger_rejects_missing_fields_and_bad_json() {
    let webhook = MockServer::start().await;
    let app = spawn_app(&webhook.uri()).await;

    let response = app.trigger(json!({ "country": "US" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Missing required fields: indicator, startDate, endDate");

    let response = app
        .client
        .post(app.url("/api/analysis/trigger"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_trigger_upserts_history() {
    let webhook = MockServer::start().await;
    Mock::given(body_partial_json(json!({ "action": "trigger_analysis", "country": "US" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_analysis("GDP", "US")))
        .mount(&webhook)
        .await;
    Mock::given(body_partial_json(json!({ "action": "trigger_analysis", "country": "DE" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_analysis("GDP", "DE")))
        .mount(&webhook)
        .await;
    let app = spawn_app(&webhook.uri()).await;

    let response = app.trigger(trigger_body("US", "GDP")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let record: AnalysisRecord = response.json().await.unwrap();
    assert_eq!(record.indicator(), "GDP");
    assert_eq!(app.state.history.len().await, 1);

    // Повторный запуск заменяет запись, а не добавляет дубликат
    let response = app.trigger(trigger_body("US", "GDP")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.state.history.len().await, 1);

    let response = app.trigger(trigger_body("DE", "GDP")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let history: Vec<HistoryEntry> = app.get("/api/history").await.json().await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].country(), "DE");
    assert_eq!(history[1].country(), "US");

    let filtered: Vec<HistoryEntry> = app.get("/api/history?country=US").await.json().await.unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].id, "GDP");

    let entry = app.get("/api/history/GDP?country=DE").await;
    assert_eq!(entry.status(), StatusCode::OK);
    let missing = app.get("/api/history/IMPORTS").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_trigger_with_unparsable_reply_leaves_history_untouched() {
    let webhook = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_string("Workflow was started"))
        .mount(&webhook)
        .await;
    let app = spawn_app(&webhook.uri()).await;

    let response = app.trigger(trigger_body("US", "GDP")).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Could not parse"));
    assert_eq!(app.state.history.len().await, 0);
}

#[tokio::test]
async fn test_get_analysis_upstream_failure_is_not_found() {
    let webhook = MockServer::start().await;
    Mock::given(body_partial_json(json!({ "action": "get_analysis", "id": "GDP" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": false, "message": "no series found" })),
        )
        .mount(&webhook)
        .await;
    let app = spawn_app(&webhook.uri()).await;

    let response = app.get("/api/analysis/GDP").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "no series found" }));
}

#[tokio::test]
async fn test_get_analysis_returns_canonical_record() {
    let webhook = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([sample_analysis("GDP", "US")])))
        .mount(&webhook)
        .await;
    let app = spawn_app(&webhook.uri()).await;

    let response = app.get("/api/analysis/GDP").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["indicator"], "GDP");
    assert_eq!(body["data"]["country"], "US");
    assert_eq!(body["full_analysis"]["forecast"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_get_analysis_empty_reply_is_not_found() {
    let webhook = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .mount(&webhook)
        .await;
    let app = spawn_app(&webhook.uri()).await;

    let response = app.get("/api/analysis/GDP").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Analysis not found");
}

#[tokio::test]
async fn test_download_csv_and_json() {
    let webhook = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_analysis("GDP", "US")))
        .mount(&webhook)
        .await;
    let app = spawn_app(&webhook.uri()).await;

    let response = app.get("/api/analysis/GDP/download").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/csv; charset=utf-8"
    );
    let disposition = response.headers()["content-disposition"].to_str().unwrap().to_string();
    let filename = Regex::new(r#"^attachment; filename="analysis-GDP-\d+\.csv"$"#).unwrap();
    assert!(filename.is_match(&disposition), "{}", disposition);

    let text = response.text().await.unwrap();
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    assert_eq!(reader.records().count(), 1 + 3 + 1);

    let response = app.get("/api/analysis/GDP/download?format=json").await;
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()["content-disposition"].to_str().unwrap().to_string();
    assert!(disposition.ends_with(".json\""));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["country"], "US");

    let response = app.get("/api/analysis/GDP/download?format=xml").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_analyses_shapes() {
    let webhook = MockServer::start().await;
    Mock::given(body_partial_json(json!({ "country": "US" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_analysis("GDP", "US")))
        .mount(&webhook)
        .await;
    Mock::given(body_partial_json(json!({ "country": "FR" })))
        .respond_with(ResponseTemplate::new(200))
        .mount(&webhook)
        .await;
    let app = spawn_app(&webhook.uri()).await;

    let list: Vec<AnalysisSummary> = app
        .get("/api/analysis/list?country=US")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].id, "GDP");
    assert_eq!(list[0].status, AnalysisStatus::Completed);
    assert_eq!(list[0].start_date, "2020-01-01");

    let empty: Vec<AnalysisSummary> = app
        .get("/api/analysis/list?country=FR")
        .await
        .json()
        .await
        .unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_upstream_errors_map_to_gateway_statuses() {
    let webhook = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "workflow crashed" })))
        .mount(&webhook)
        .await;
    let app = spawn_app(&webhook.uri()).await;

    let response = app.get("/api/analysis/list").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "workflow crashed");

    let offline = spawn_app("http://127.0.0.1:1/webhook").await;
    let response = offline.get("/api/analysis/GDP").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_service_endpoints() {
    let webhook = MockServer::start().await;
    let app = spawn_app(&webhook.uri()).await;

    let health: Value = app.get("/").await.json().await.unwrap();
    assert_eq!(health["status"], "healthy");

    let status: Value = app.get("/status").await.json().await.unwrap();
    assert_eq!(status["history_entries"], 0);
    assert_eq!(status["history_available"], true);

    let catalog: Value = app.get("/api/catalog").await.json().await.unwrap();
    assert_eq!(catalog["countries"].as_array().unwrap().len(), 8);
    assert_eq!(catalog["indicators"][0]["value"], "GDP");
}
