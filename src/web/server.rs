use super::state::AppState;
use crate::backup::BatchReport;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    data: T,
}

pub async fn start_server(state: Arc<AppState>, port: u16) {
    let app = Router::new()
        .route("/trigger-backup", get(trigger_handler))
        .route("/api/status", get(status_handler))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    info!("Starting trigger endpoint on http://localhost:{}", port);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!("Web server error: {}", e);
    }
}

fn check_auth(headers: &HeaderMap, state: &AppState) -> bool {
    if !state.auth_required() {
        return true;
    }

    let auth_header = match headers.get(header::AUTHORIZATION) {
        Some(h) => h,
        None => return false,
    };

    let auth_str = match auth_header.to_str() {
        Ok(s) => s,
        Err(_) => return false,
    };

    if !auth_str.starts_with("Basic ") {
        return false;
    }

    let decoded = match STANDARD.decode(&auth_str[6..]) {
        Ok(d) => d,
        Err(_) => return false,
    };

    let credentials = match String::from_utf8(decoded) {
        Ok(s) => s,
        Err(_) => return false,
    };

    let parts: Vec<&str> = credentials.splitn(2, ':').collect();
    if parts.len() != 2 {
        return false;
    }

    state.check_credentials(parts[0], parts[1])
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"MySQL Drive Backup\"")],
        "Unauthorized",
    )
        .into_response()
}

/// Fire-and-forget trigger: the batch runs in the background and the caller
/// gets a fixed acknowledgment without per-database results.
async fn trigger_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if !check_auth(&headers, &state) {
        return unauthorized();
    }

    info!("Manual backup trigger received");
    let engine = state.engine.clone();
    tokio::spawn(async move {
        engine.try_run_batch().await;
    });

    "Backup started...".into_response()
}

async fn status_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if !check_auth(&headers, &state) {
        return unauthorized();
    }

    #[derive(Serialize)]
    struct StatusData {
        schedule: String,
        database_count: usize,
        last_run: Option<BatchReport>,
        total_runs: usize,
    }

    let data = StatusData {
        schedule: state.engine.config().schedule.clone(),
        database_count: state.engine.config().databases.len(),
        last_run: state.engine.last_batch().await,
        total_runs: state.engine.history().await.len(),
    };

    Json(ApiResponse {
        success: true,
        data,
    })
    .into_response()
}
