use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;

/// Health response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub mail_server: String,
    pub mail_mode: String,
    pub timestamp: String,
}

/// Health routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// GET /health - Health check endpoint
async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let mailer = &state.mailer;

    let (status, mail_server) = match mailer.server() {
        Some(server) => ("healthy", server.to_string()),
        None => ("unhealthy", "unconfigured".to_string()),
    };

    let mail_mode = if mailer.suppress() {
        "suppressed"
    } else if mailer.use_ssl() {
        "ssl"
    } else if mailer.use_tls() {
        "starttls"
    } else {
        "plain"
    };

    Ok(Json(HealthResponse {
        status: status.to_string(),
        mail_server,
        mail_mode: mail_mode.to_string(),
        timestamp: Utc::now().to_rfc3339(),
    }))
}
