//! HTTP front door: accepts quiz tasks and runs one agent session per task.

use crate::agent::Agent;
use crate::cli::{preflight, Output};
use crate::config::Settings;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Shared application state.
struct AppState {
    secret: String,
    agent: Arc<Agent>,
}

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    preflight::check(&settings)?;

    let secret = settings.server.resolve_secret().ok_or_else(|| {
        anyhow::anyhow!(
            "No quiz secret configured. Set {} or server.secret in the config file.",
            settings.server.secret_env
        )
    })?;

    let state = Arc::new(AppState {
        secret,
        agent: Arc::new(Agent::from_settings(&settings)?),
    });

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Quiz Solver API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /");
    Output::kv("Start quiz", "POST /quiz");
    println!();
    Output::kv("Models", &settings.model.models.join(", "));
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/quiz", post(quiz))
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct QuizRequest {
    email: String,
    secret: String,
    url: String,
}

// === Handlers ===

async fn root() -> impl IntoResponse {
    Json(json!({ "status": "alive", "service": "LLM Quiz Solver" }))
}

async fn quiz(State(state): State<Arc<AppState>>, Json(req): Json<QuizRequest>) -> Response {
    if req.secret != state.secret {
        warn!("Rejected quiz request for {} with a bad secret", req.email);
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "detail": "Invalid secret provided." })),
        )
            .into_response();
    }

    info!("Accepted quiz {} for {}", req.url, req.email);
    spawn_session(state.agent.clone(), req);

    Json(json!({
        "message": "Quiz task accepted. Agent started.",
        "status": "processing",
    }))
    .into_response()
}

/// Run a session in the background. A panic inside it is logged, not propagated.
fn spawn_session(agent: Arc<Agent>, req: QuizRequest) {
    tokio::spawn(async move {
        let url = req.url.clone();
        let session = tokio::spawn(async move { agent.solve(&req.url, &req.email, &req.secret).await });

        match session.await {
            Ok(reason) => info!("Quiz {} finished: {}", url, reason),
            Err(e) => error!("Quiz {} crashed: {}", url, e),
        }
    });
}
