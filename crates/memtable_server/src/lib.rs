//! HTTP server wiring for memtable (API, handlers, and shared state).

/// HTTP error mapping for API handlers.
pub mod error;
/// HTTP handlers for sheet and edit-batch endpoints.
pub mod handlers;
/// Per-sheet mutation guards.
pub mod locks;
/// Request and response payloads.
pub mod models;

pub use locks::{SheetLockError, SheetLockManager, SheetMutationGuard};
pub use memtable_core::{config, db, AppError, BatchGate, Config, Database};

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; frame-ancestors 'none'; base-uri 'self'; form-action 'self'";

/// Shared state passed to HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<Config>,
    /// Admits one edit batch at a time.
    pub gate: Arc<BatchGate>,
    /// Serializes load-edit-save cycles per sheet.
    pub locks: Arc<SheetLockManager>,
}

impl AppState {
    /// Construct shared application state.
    ///
    /// # Arguments
    /// - `config`: Loaded configuration.
    /// - `db`: Open database handle.
    ///
    /// # Returns
    /// A new [`AppState`].
    pub fn new(config: Config, db: Database) -> Self {
        Self::with_gate(config, db, Arc::new(BatchGate::new()))
    }

    /// Construct shared application state around an existing batch gate.
    pub fn with_gate(config: Config, db: Database, gate: Arc<BatchGate>) -> Self {
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
            gate,
            locks: Arc::new(SheetLockManager::default()),
        }
    }

    /// Replace the per-sheet lock manager with a shared one.
    pub fn with_locks(mut self, locks: Arc<SheetLockManager>) -> Self {
        self.locks = locks;
        self
    }
}

/// Create the application router with all routes and middleware.
///
/// # Arguments
/// - `state`: Shared application state.
/// - `allow_public_access`: Whether to allow cross-origin requests from any origin.
///
/// # Returns
/// Configured `axum::Router`.
pub fn create_app(state: AppState, allow_public_access: bool) -> Router {
    let cors_port = state.config.port;
    create_app_with_cors_port(state, allow_public_access, cors_port)
}

/// Resolve the listener address from env var overrides and security policy.
///
/// # Arguments
/// - `config`: Server configuration containing the configured `port`.
/// - `allow_public_access`: Whether non-loopback bind targets are permitted.
///
/// # Returns
/// A validated socket address that enforces loopback when public access is disabled.
pub fn resolve_bind_address(config: &Config, allow_public_access: bool) -> SocketAddr {
    let default_bind = SocketAddr::from(([127, 0, 0, 1], config.port));
    let requested = match std::env::var("BIND") {
        Ok(value) => match value.trim().parse::<SocketAddr>() {
            Ok(addr) => addr,
            Err(err) => {
                tracing::warn!(
                    "Invalid BIND='{}': {}. Falling back to {}",
                    value,
                    err,
                    default_bind
                );
                default_bind
            }
        },
        Err(_) => default_bind,
    };

    if allow_public_access || requested.ip().is_loopback() {
        return requested;
    }

    tracing::warn!(
        "Non-loopback bind {} requested without ALLOW_PUBLIC_ACCESS; forcing 127.0.0.1",
        requested
    );
    SocketAddr::from(([127, 0, 0, 1], requested.port()))
}

fn cors_layer(allow_public_access: bool, cors_port: u16) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
    ];
    if allow_public_access {
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any);
    }
    let origins = ["localhost", "127.0.0.1"]
        .iter()
        .filter_map(|host| HeaderValue::from_str(&format!("http://{}:{}", host, cors_port)).ok())
        .collect::<Vec<_>>();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}

fn create_app_with_cors_port(state: AppState, allow_public_access: bool, cors_port: u16) -> Router {
    let body_limit = state.config.max_edit_text_size;
    let sheet_path = "/api/sheets/:uid/turns/:turn";

    Router::new()
        .route(
            "/api/sheets",
            get(handlers::sheet::list_sheets).post(handlers::sheet::create_sheet),
        )
        .route("/api/sheets/:uid", delete(handlers::sheet::delete_sheet))
        .route("/api/sheets/:uid/diff", get(handlers::sheet::sheet_diff))
        .route(
            sheet_path,
            get(handlers::sheet::get_sheet).patch(handlers::sheet::update_sheet),
        )
        .route(
            &format!("{sheet_path}/prompt"),
            get(handlers::sheet::sheet_prompt),
        )
        .route(
            &format!("{sheet_path}/cells/:row/:col"),
            put(handlers::sheet::edit_cell),
        )
        .route(
            &format!("{sheet_path}/cells/:row/:col/restore"),
            post(handlers::sheet::restore_cell),
        )
        .route(
            &format!("{sheet_path}/cells/:row/:col/history"),
            get(handlers::sheet::cell_history),
        )
        .route(
            &format!("{sheet_path}/rows"),
            post(handlers::sheet::insert_row),
        )
        .route(
            &format!("{sheet_path}/rows/:row"),
            delete(handlers::sheet::delete_row),
        )
        .route(
            &format!("{sheet_path}/rows/:row/lock"),
            put(handlers::sheet::lock_row),
        )
        .route(
            &format!("{sheet_path}/columns"),
            post(handlers::sheet::insert_column),
        )
        .route(
            &format!("{sheet_path}/columns/:col"),
            delete(handlers::sheet::delete_column),
        )
        .route("/api/turns/:turn/edits", post(handlers::edits::apply_edits))
        .with_state(state)
        .layer(
            tower::ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors_layer(allow_public_access, cors_port))
                .layer(SetResponseHeaderLayer::overriding(
                    header::CONTENT_SECURITY_POLICY,
                    HeaderValue::from_static(CONTENT_SECURITY_POLICY),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                )),
        )
}

fn listener_cors_port(listener: &tokio::net::TcpListener, fallback_port: u16) -> u16 {
    listener
        .local_addr()
        .map(|addr| addr.port())
        .unwrap_or(fallback_port)
}

/// Run the Axum server with graceful shutdown support.
///
/// # Arguments
/// - `listener`: Bound TCP listener for the server.
/// - `state`: Shared application state.
/// - `allow_public_access`: Whether to allow cross-origin requests from any origin.
/// - `shutdown_signal`: Future that resolves when shutdown should start.
///
/// # Errors
/// Returns any I/O error produced by `axum::serve`.
pub async fn serve_router(
    listener: tokio::net::TcpListener,
    state: AppState,
    allow_public_access: bool,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let cors_port = listener_cors_port(&listener, state.config.port);
    let app = create_app_with_cors_port(state, allow_public_access, cors_port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
}
