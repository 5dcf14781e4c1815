//! HTTP surface.
//!
//! Two POST endpoints taking a multipart form (`fasta` text field and/or
//! `file` upload), plus the route names the first version of the service used.

pub mod error;

use std::sync::Arc;

use axum::Router;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderValue, Method, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::{AllowedOrigins, ServerConfig};
use crate::gateway::SearchMode;
use crate::search::{SearchService, Submission};

pub use error::{ApiError, ErrorResponse};

const TEXT_FIELD: &str = "fasta";
const FILE_FIELD: &str = "file";

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SearchService>,
}

/// Router construction errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An allowed origin is not a valid header value.
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] axum::http::header::InvalidHeaderValue),
}

/// Build the router with CORS, tracing, and a body limit derived from the
/// query size ceiling.
///
/// # Errors
///
/// Returns an error if an allowed origin is not a valid header value.
pub fn create_router(service: Arc<SearchService>, config: &ServerConfig) -> Result<Router, Error> {
    let cors = cors_layer(&config.allowed_origins)?;
    let body_limit = service.config().body_limit_bytes();
    info!(origins = ?config.allowed_origins, body_limit, "creating router");

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/api/primary-search", post(primary_search))
        .route("/api/translated-search", post(translated_search))
        .route("/api/blastp", post(primary_search))
        .route("/api/blastx", post(translated_search))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service });

    Ok(router)
}

fn cors_layer(origins: &AllowedOrigins) -> Result<CorsLayer, Error> {
    let allow_origin = match origins {
        AllowedOrigins::Any => AllowOrigin::from(Any),
        AllowedOrigins::List(list) => {
            let values = list
                .iter()
                .map(|o| o.parse::<HeaderValue>())
                .collect::<Result<Vec<_>, _>>()?;
            AllowOrigin::list(values)
        }
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(false))
}

async fn health_check() -> &'static str {
    "OK"
}

async fn primary_search(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    run_search(&state, SearchMode::Primary, multipart?).await
}

async fn translated_search(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    run_search(&state, SearchMode::Translated, multipart?).await
}

async fn run_search(
    state: &AppState,
    mode: SearchMode,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let submission = read_submission(&mut multipart).await?;
    let output = state.service.search(mode, submission).await?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], output).into_response())
}

/// Pull the `fasta` and `file` fields out of the form; anything else is ignored.
/// A file input left blank by a browser (no filename, no bytes) counts as absent.
async fn read_submission(multipart: &mut Multipart) -> Result<Submission, ApiError> {
    let mut submission = Submission::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(TEXT_FIELD) => {
                submission.fasta = Some(field.text().await?);
            }
            Some(FILE_FIELD) => {
                let named = field.file_name().is_some_and(|n| !n.is_empty());
                let bytes = field.bytes().await?;
                if named || !bytes.is_empty() {
                    submission.file = Some(bytes.to_vec());
                }
            }
            other => debug!(field = ?other, "ignoring form field"),
        }
    }

    Ok(submission)
}
