//! HTTP tests driving the full router: roll intake, sheets, statistics and
//! the relay hand-off.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use rollstats_core::{relay, RelaySink, RelayTarget, RenderedMessage};
use rollstats_server::{
    app,
    config::{CampaignConfig, Config},
    state::AppState,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

fn test_state(temp_dir: &TempDir) -> Arc<AppState> {
    let config = Config::with_root(temp_dir.path());
    Arc::new(AppState::new(config, None).expect("Failed to create AppState"))
}

fn create_test_app() -> (Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let app = app(test_state(&temp_dir));
    (app, temp_dir)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn post_form(app: &Router, uri: &str, form: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn get_json(app: &Router, uri: &str) -> Value {
    let (status, body) = get(app, uri).await;
    assert_eq!(status, StatusCode::OK, "{uri}: {body}");
    serde_json::from_str(&body).unwrap()
}

fn roll_form(name: &str, timestamp: &str, margin: i64, reason: &str) -> String {
    format!(
        "name={name}&timestamp={timestamp}&threshold=9&margin={margin}&reason={reason}\
         &critical_success=false&critical_failure=false&base_dices=3%2C4\
         &formula_elements=agility%2Cperception&invested_energies=optional-power"
    )
}

#[tokio::test]
async fn test_health() {
    let (app, _dir) = create_test_app();
    let health = get_json(&app, "/api/health").await;
    assert_eq!(health["status"], "ok");
}

#[tokio::test]
async fn test_submit_roll() {
    let (app, _dir) = create_test_app();

    let (status, body) = post_form(&app, "/roll/camp1", &roll_form("Ana", "t1", 2, "Stealth")).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let outcome: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(outcome["status"], "stored");
    assert_eq!(outcome["replaced"], false);

    let players = get_json(&app, "/api/campaigns/camp1/players").await;
    assert_eq!(players, serde_json::json!(["Ana"]));
    let other = get_json(&app, "/api/campaigns/camp2/players").await;
    assert_eq!(other, serde_json::json!([]));
}

#[tokio::test]
async fn test_resubmission_replaces_roll() {
    let (app, _dir) = create_test_app();
    post_form(&app, "/roll/camp1", &roll_form("Ana", "t1", 2, "Stealth")).await;
    let (status, body) = post_form(&app, "/roll/camp1", &roll_form("Ana", "t1", -3, "Stealth")).await;

    assert_eq!(status, StatusCode::CREATED);
    let outcome: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(outcome["replaced"], true);

    let report = get_json(&app, "/api/stats/camp1").await;
    assert_eq!(report["roll_count"]["Ana"], 1);
    assert_eq!(report["success_failure"]["Ana"]["failure_pct"], 100.0);
    assert_eq!(report["tests"][0]["mean_margin"], -3.0);
}

#[tokio::test]
async fn test_incomplete_roll_rejected() {
    let (app, _dir) = create_test_app();
    let (status, body) = post_form(&app, "/roll/camp1", "name=Ana&timestamp=t1&threshold=9").await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let outcome: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(outcome["status"], "rejected");
    assert_eq!(outcome["reason"], "no_base_dice");

    let (status, _) = post_form(&app, "/roll/camp1", "").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_invalid_values_are_bad_requests() {
    let (app, _dir) = create_test_app();

    let (status, body) = post_form(&app, "/roll/camp1", "name=Ana&threshold=high&base_dices=1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("threshold"));

    let (status, _) = post_form(&app, "/roll/camp1", "name=Ana&base_dices=1%2Cx").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let players = get_json(&app, "/api/campaigns/camp1/players").await;
    assert_eq!(players, serde_json::json!([]));
}

#[tokio::test]
async fn test_unknown_fields_are_reported() {
    let (app, _dir) = create_test_app();
    let form = format!("{}&labels=x&mood=grumpy", roll_form("Ana", "t1", 1, "Climb"));
    let (status, body) = post_form(&app, "/roll/camp1", &form).await;

    assert_eq!(status, StatusCode::CREATED);
    let outcome: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(outcome["ignored_fields"], serde_json::json!(["labels"]));
    assert_eq!(outcome["unknown_fields"], serde_json::json!(["mood"]));
}

#[tokio::test]
async fn test_stats_report_with_filters() {
    let (app, _dir) = create_test_app();
    post_form(&app, "/roll/camp1", &roll_form("Ana", "t1", 2, "Stealth")).await;
    post_form(&app, "/roll/camp1", &roll_form("Ana", "t2", 4, "Stealth")).await;
    post_form(&app, "/roll/camp1", &roll_form("Ana", "t3", -1, "Climb")).await;
    post_form(&app, "/roll/camp1", &roll_form("Bo", "t1", 1, "Climb")).await;

    let report = get_json(&app, "/api/stats/camp1").await;
    assert_eq!(report["players"], serde_json::json!(["Ana", "Bo"]));
    assert_eq!(report["streaks"]["Ana"]["success_streak"], 2);
    assert_eq!(report["streaks"]["Ana"]["failure_streak"], 1);
    assert_eq!(report["energy_usage"]["power"], 4);
    assert_eq!(report["formula_usage"]["agility"], 4);

    let tests = report["tests"].as_array().unwrap();
    assert_eq!(tests.len(), 2);
    assert_eq!(tests[0]["test"], "Climb");
    assert_eq!(tests[0]["count"], 2);

    let by_player = get_json(&app, "/api/stats/camp1?player=Bo&test=").await;
    assert_eq!(by_player["filter"]["player"], "Bo");
    assert!(by_player["filter"]["test"].is_null());
    assert_eq!(by_player["roll_count"], serde_json::json!({"Bo": 1}));

    let by_test = get_json(&app, "/api/stats/camp1?test=Stealth").await;
    assert_eq!(by_test["roll_count"], serde_json::json!({"Ana": 2}));
    assert_eq!(by_test["success_failure"]["Ana"]["success_pct"], 100.0);
}

#[tokio::test]
async fn test_distributions() {
    let (app, _dir) = create_test_app();
    post_form(&app, "/roll/camp1", &roll_form("Ana", "t1", 2, "Stealth")).await;
    post_form(&app, "/roll/camp1", "name=Ana&timestamp=t2&threshold=7&base_dices=6%2C6").await;

    let report = get_json(&app, "/api/stats/camp1/distributions").await;

    let base = &report["base_dice"];
    assert!(base["Reference"].is_object());
    assert_eq!(base["Ana"]["bin_edges"].as_array().unwrap().len(), 12);
    assert_eq!(base["Ana"]["heights"][6], 0.5);

    // The roll without a margin keeps Ana's margin curve at one half.
    let margins = &report["margins"]["Ana"];
    assert_eq!(margins["bin_edges"], serde_json::json!([0.0, 2.0]));
    assert_eq!(margins["heights"], serde_json::json!([0.0, 0.5]));

    let thresholds = &report["thresholds"]["Ana"];
    assert_eq!(thresholds["bin_edges"], serde_json::json!([0.0, 7.0, 9.0]));
    assert_eq!(thresholds["heights"], serde_json::json!([0.0, 0.5, 1.0]));
}

#[tokio::test]
async fn test_sheets() {
    let (app, _dir) = create_test_app();

    let (status, body) = get(&app, "/view/camp1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "No such campaign! camp1");

    let (status, body) = post_form(&app, "/push/camp1/ana", "page=%3Ch1%3EAna%3C%2Fh1%3E").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");

    let (status, body) = get(&app, "/view/camp1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<a href=\"/view/camp1/ana\" target=\"_blank\">ana</a>"));

    let (status, body) = get(&app, "/view/camp1/ana").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<h1>Ana</h1>");

    let (status, body) = get(&app, "/view/camp1/bo").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "No such sheet! bo camp1");
}

#[tokio::test]
async fn test_push_without_page_field() {
    let (app, _dir) = create_test_app();
    let (status, _) = post_form(&app, "/push/camp1/ana", "content=x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_campaign_message() {
    let temp_dir = TempDir::new().unwrap();
    let state = test_state(&temp_dir);
    std::fs::create_dir_all(state.config.campaigns_path().join("camp1")).unwrap();
    let app = app(state);

    let (status, body) = get(&app, "/view/camp1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "This campaign is empty. camp1");
}

#[derive(Clone, Default)]
struct RecordingSink {
    sent: Arc<Mutex<Vec<(String, RenderedMessage)>>>,
}

impl RelaySink for RecordingSink {
    async fn send(&self, target: &RelayTarget, message: &RenderedMessage) -> rollstats_core::Result<String> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((target.server_id.clone(), message.clone()));
        Ok(sent.len().to_string())
    }

    async fn edit(
        &self,
        _target: &RelayTarget,
        _message_id: &str,
        _message: &RenderedMessage,
    ) -> rollstats_core::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_stored_rolls_are_relayed() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::with_root(temp_dir.path());
    config.campaigns.insert(
        "camp1".to_string(),
        CampaignConfig {
            server_id: Some("guild".to_string()),
            channel_id: None,
            message_format: Default::default(),
        },
    );
    let (handle, worker) = relay::channel(rollstats_core::RelaySettings {
        poll_interval: Duration::from_millis(5),
        ..Default::default()
    });
    let app = app(Arc::new(AppState::new(config, Some(handle)).unwrap()));

    post_form(&app, "/roll/camp1", &roll_form("Ana", "t1", 2, "Stealth")).await;
    post_form(&app, "/roll/camp2", &roll_form("Bo", "t1", 2, "Stealth")).await;
    post_form(&app, "/roll/camp1", "name=Cy&threshold=9").await;
    drop(app);

    let sink = RecordingSink::default();
    worker.run(sink.clone()).await;

    let sent = sink.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "guild");
    match &sent[0].1 {
        RenderedMessage::Text(text) => assert!(text.starts_with("**@Ana** (Stealth: agility, perception):")),
        other => panic!("unexpected message {other:?}"),
    }
}
