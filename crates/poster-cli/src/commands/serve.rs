//! Serve command - HTTP extraction service.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Args;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use poster_core::models::config::{CapabilityConfig, ProviderKind};
use poster_core::{
    CapabilityError, ExtractionOptions, InitialRoute, LanguageModel, Pipeline, PosterError,
};

use super::{load_config, load_engine};

/// Multipart framing allowance on top of the image size limit.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Bind host (default from config)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (default from config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Model directory for the recognition engine
    #[arg(short, long)]
    model_dir: Option<PathBuf>,
}

/// Application state shared across handlers
struct AppState {
    pipeline: Pipeline,
    /// Provider built from the config at startup, when it has a usable key.
    default_model: Option<Arc<LanguageModel>>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    recognition: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
}

/// Form fields of one extraction request.
#[derive(Default)]
struct ExtractForm {
    file: Option<Vec<u8>>,
    force_route: Option<String>,
    timezone: Option<String>,
    api_key: Option<String>,
    provider: Option<String>,
}

pub async fn run(args: ServeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = args.model_dir {
        config.models.model_dir = dir;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let default_model = match LanguageModel::from_config(&config.capability, None) {
        Ok(model) => Some(Arc::new(model)),
        Err(e) => {
            warn!("No default capability provider ({}); requests must supply api_key", e);
            None
        }
    };

    info!("Initializing recognition engine...");
    let engine = load_engine(&config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;
    let body_limit = config.limits.max_file_size + MULTIPART_OVERHEAD;

    let state = Arc::new(AppState {
        pipeline: Pipeline::new(config, engine),
        default_model,
    });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/extract", post(extract_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Server listening on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /health          - Health check");
    info!("  POST /api/v1/extract  - Poster extraction (multipart)");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        recognition: state.pipeline.has_recognition(),
    })
}

async fn extract_handler(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let start = Instant::now();

    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err((status, message)) => {
            warn!(request_id = %request_id, %message, "Rejected upload");
            return error_response(status, message, &request_id);
        }
    };

    let Some(file) = form.file else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "missing multipart field: file".to_string(),
            &request_id,
        );
    };

    let force_route = match form.force_route.as_deref().map(str::parse::<InitialRoute>) {
        None => None,
        Some(Ok(route)) => Some(route),
        Some(Err(e)) => return error_response(StatusCode::BAD_REQUEST, e, &request_id),
    };

    let model = match select_model(&state, form.api_key.as_deref(), form.provider.as_deref()) {
        Ok(model) => model,
        Err((status, message)) => return error_response(status, message, &request_id),
    };

    info!(request_id = %request_id, bytes = file.len(), provider = model.name(), "Processing extraction request");

    let options = ExtractionOptions {
        force_route,
        timezone: form.timezone,
        include_raw: None,
        request_id: Some(request_id.clone()),
    };

    match state.pipeline.process(&file, &options, model.as_ref()).await {
        Ok(result) => {
            info!(
                request_id = %request_id,
                route = %result.route(),
                total_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Extraction completed"
            );
            (StatusCode::OK, Json(result)).into_response()
        }
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Extraction failed");
            error_response(status_for(&e), e.to_string(), &request_id)
        }
    }
}

async fn read_form(mut multipart: Multipart) -> Result<ExtractForm, (StatusCode, String)> {
    let mut form = ExtractForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.status(), e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let bytes = field.bytes().await.map_err(|e| (e.status(), e.body_text()))?;
            form.file = Some(bytes.to_vec());
            continue;
        }

        let value = field.text().await.map_err(|e| (e.status(), e.body_text()))?;
        let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
        match name.as_str() {
            "force_route" => form.force_route = value,
            "timezone" => form.timezone = value,
            "api_key" => form.api_key = value,
            "provider" => form.provider = value,
            other => warn!("Ignoring unknown form field: {}", other),
        }
    }

    Ok(form)
}

/// Use the startup provider unless the request overrides key or provider.
fn select_model(
    state: &AppState,
    api_key: Option<&str>,
    provider: Option<&str>,
) -> Result<Arc<LanguageModel>, (StatusCode, String)> {
    if api_key.is_none() && provider.is_none() {
        if let Some(model) = &state.default_model {
            return Ok(Arc::clone(model));
        }
    }

    let mut config: CapabilityConfig = state.pipeline.config().capability.clone();
    if let Some(provider) = provider {
        config.provider = provider
            .parse::<ProviderKind>()
            .map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    }
    LanguageModel::from_config(&config, api_key)
        .map(Arc::new)
        .map_err(|e| match e {
            CapabilityError::Auth(_) => (StatusCode::UNAUTHORIZED, e.to_string()),
            other => (StatusCode::BAD_REQUEST, other.to_string()),
        })
}

/// HTTP status for a failed request.
fn status_for(err: &PosterError) -> StatusCode {
    match err {
        PosterError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        PosterError::Capability(CapabilityError::Auth(_)) => StatusCode::UNAUTHORIZED,
        PosterError::Capability(CapabilityError::Transport(_)) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, message: String, request_id: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message,
            request_id: Some(request_id.to_string()),
        }),
    )
        .into_response()
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
