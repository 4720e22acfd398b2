use axum::{Router, extract::FromRef, http::HeaderName};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;

pub mod routes;
use routes::{public, users};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{PostgresRepository, RepositoryState};
#[cfg(feature = "test-support")]
pub use repository::MemoryRepository;

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and schema into the OpenAPI
/// document served at `/api-docs/openapi.json`. Paths are documented under the
/// default `/api/v1` prefix.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::healthcheck, handlers::get_multiple_users, handlers::get_user,
        handlers::update_user, handlers::delete_user, handlers::create_superuser
    ),
    components(
        schemas(
            models::User, models::UserUpdate, models::SuperuserCreate,
            models::DeleteResponse, models::HealthResponse, error::ErrorResponse,
        )
    ),
    tags(
        (name = "users", description = "User management API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single, cloneable container of process-wide resources: the storage
/// repository (which owns the pool) and the immutable configuration.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: hands out per-request sessions over the PgPool.
    pub repo: RepositoryState,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Extractors pull only the component they need from the shared state.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing table, the observability layers and the permissive
/// CORS policy, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    // All origins, methods and headers.
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");
    let prefix = state.config.api_prefix.clone();

    // 2. Routing Table
    // Docs and the healthcheck are unprefixed; user routes sit under the prefix.
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(users::user_routes(&prefix))
        .with_state(state);

    // 3. Observability Layers (outermost first)
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: generated when absent.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: one span per request, response logged at INFO.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation onto the response.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS (outermost layer)
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, uri and the request id, so every log
/// line of one request correlates.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
