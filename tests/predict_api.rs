use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use lol_live_predict::config::FeedConfig;
use lol_live_predict::features::ExpandedRow;
use lol_live_predict::feed::{Frame, ParticipantFrame, TeamFrame, Window, WindowSource};
use lol_live_predict::model::WinModel;
use lol_live_predict::server::{AppState, PredictResponse, create_router};
use lol_live_predict::{PredictError, Result};

/// Serves one frame per poll: blue gains 1000 gold a minute, red stays flat.
/// Game "dead" never answers.
struct FakeFeed {
    polls: Mutex<Vec<String>>,
}

impl WindowSource for FakeFeed {
    fn fetch_window(&self, game_id: &str, starting_time: DateTime<Utc>) -> Result<Window> {
        self.polls.lock().unwrap().push(game_id.to_string());

        if game_id == "dead" {
            return Err(PredictError::Status {
                url: format!("http://feed/window/{game_id}"),
                status: 503,
            });
        }

        let start: DateTime<Utc> = "2024-03-01T17:00:00Z".parse().unwrap();
        let minute = (starting_time - start).num_minutes() as u32;
        let team = |gold: u32| TeamFrame {
            total_gold: gold,
            participants: vec![ParticipantFrame {
                creep_score: 8 * minute,
                ..Default::default()
            }],
            ..Default::default()
        };

        Ok(Window {
            esports_game_id: Some(game_id.to_string()),
            frames: vec![Frame {
                timestamp: starting_time,
                game_state: Some("in_game".to_string()),
                blue_team: Some(team(2500 + 1000 * minute)),
                red_team: Some(team(2500)),
            }],
        })
    }
}

/// Probability 0.9 when the row knows blue is ahead at 10, 0.5 when unknown.
struct GoldLeadModel;

impl WinModel for GoldLeadModel {
    fn predict(&self, rows: &[ExpandedRow]) -> Result<Vec<f64>> {
        Ok(rows
            .iter()
            .map(|row| match row.get("golddiffat10") {
                Some(diff) if diff > 0.0 => 0.9,
                Some(_) => 0.1,
                None => 0.5,
            })
            .collect())
    }
}

fn app(feed: Arc<FakeFeed>) -> Router {
    create_router(AppState {
        source: feed,
        model: Arc::new(GoldLeadModel),
        feed: Arc::new(FeedConfig::default()),
    })
}

async fn send_json(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, String) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(payload) => builder
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .expect("failed to build json request"),
        None => builder.body(Body::empty()).expect("failed to build empty request"),
    };

    let response = app.clone().oneshot(request).await.expect("router request failed");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");

    (status, String::from_utf8_lossy(&bytes).to_string())
}

#[tokio::test]
async fn predicts_every_game_in_request_order() {
    let feed = Arc::new(FakeFeed {
        polls: Mutex::new(Vec::new()),
    });
    let app = app(feed.clone());

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/predict",
        Some(json!({
            "game_ids": ["g1", "dead"],
            "startingTime": "2024-03-01T17:00:00.000Z"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let response: PredictResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(response.game_ids, vec!["g1", "dead"]);
    assert_eq!(response.start_time, "2024-03-01T17:00:00.000Z");
    assert_eq!(response.predictions.len(), 2);

    // blue@10, red@10, blue@15, red@15, ...
    assert_eq!(
        response.predictions[0],
        vec![0.9, 0.1, 0.9, 0.1, 0.9, 0.1, 0.9, 0.1]
    );
    // A game whose feed never answered still yields 8 rows, all unknown.
    assert_eq!(response.predictions[1], vec![0.5; 8]);

    let polls = feed.polls.lock().unwrap();
    assert_eq!(polls.iter().filter(|g| g.as_str() == "g1").count(), 26);
    assert_eq!(polls.iter().filter(|g| g.as_str() == "dead").count(), 26);
}

#[tokio::test]
async fn malformed_starting_time_is_rejected() {
    let feed = Arc::new(FakeFeed {
        polls: Mutex::new(Vec::new()),
    });
    let app = app(feed.clone());

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/predict",
        Some(json!({
            "game_ids": ["g1"],
            "startingTime": "March 1st, 5pm"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Invalid startingTime"), "{body}");
    assert!(feed.polls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn root_and_health_answer() {
    let app = app(Arc::new(FakeFeed {
        polls: Mutex::new(Vec::new()),
    }));

    let (status, body) = send_json(&app, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"greeting": "LOL"}));

    let (status, body) = send_json(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"status": "ok"}));
}
