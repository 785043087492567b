//! HTTP front of the predictor.
//!
//! `POST /predict` takes a list of game ids and the game start time, runs the
//! timeline pipeline for every game on the blocking pool and answers with one
//! interleaved probability vector per game.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::{FeedConfig, ServerConfig};
use crate::error::PredictError;
use crate::feed::WindowSource;
use crate::model::WinModel;
use crate::pipeline::predict_game;
use crate::timeline::parse_start_time;

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn WindowSource>,
    pub model: Arc<dyn WinModel>,
    pub feed: Arc<FeedConfig>,
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub game_ids: Vec<String>,
    #[serde(rename = "startingTime")]
    pub starting_time: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub game_ids: Vec<String>,
    pub start_time: String,
    pub predictions: Vec<Vec<f64>>,
}

pub struct ApiError(PredictError);

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PredictError::InvalidStartTime(_) => StatusCode::BAD_REQUEST,
            PredictError::SchemaMismatch(_) | PredictError::Model(_) | PredictError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_GATEWAY,
        };

        if status.is_server_error() {
            error!(error = %self.0, "prediction request failed");
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "greeting": "LOL" }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    let start = parse_start_time(&request.starting_time)?;

    info!(
        games = request.game_ids.len(),
        start = %request.starting_time,
        "prediction request"
    );

    // Games are independent: start them all, then collect in request order.
    let handles: Vec<_> = request
        .game_ids
        .iter()
        .map(|game_id| {
            let state = state.clone();
            let game_id = game_id.clone();
            tokio::task::spawn_blocking(move || {
                predict_game(
                    state.source.as_ref(),
                    &state.feed,
                    state.model.as_ref(),
                    &game_id,
                    start,
                )
            })
        })
        .collect();

    let mut predictions = Vec::with_capacity(handles.len());
    for handle in handles {
        let prediction = handle
            .await
            .map_err(|err| PredictError::Task(err.to_string()))??;
        predictions.push(prediction.probabilities);
    }

    Ok(Json(PredictResponse {
        game_ids: request.game_ids,
        start_time: request.starting_time,
        predictions,
    }))
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .with_state(state)
        .layer(cors)
}

pub async fn serve(state: AppState, config: ServerConfig) -> std::io::Result<()> {
    let app = create_router(state);

    let listener = TcpListener::bind(config.bind).await?;
    info!("prediction server listening on http://{}", config.bind);
    axum::serve(listener, app).await
}
