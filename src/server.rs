//! Local development server: serves the content root and exposes the
//! authoring endpoints to the local author only.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::commands::{authoring, content};
use crate::error::{NotesError, Result};
use crate::filesystem::ContentRoot;
use crate::index::IndexBuilder;
use crate::models::Config;

/// Host names a local development origin is served from
const LOCAL_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "[::1]"];

/// State shared by all request handlers.
pub struct AppState {
    pub config: Config,
    pub content: ContentRoot,
    pub index: IndexBuilder,
    /// Serializes index regenerations
    pub regenerate_lock: Mutex<()>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Prepares the content root described by `config`, creating it if needed.
    pub fn new(config: Config) -> Result<SharedState> {
        let content = ContentRoot::new_with_base(&config.content_root, &config.index_file);
        content.ensure_directories()?;
        let index = IndexBuilder::new(&config.content_root, &config.index_file);

        Ok(Arc::new(Self {
            config,
            content,
            index,
            regenerate_lock: Mutex::new(()),
        }))
    }
}

/// Whether a `Host` header value names a local development host.
pub fn is_local_host(host: &str) -> bool {
    let host = host.trim().to_ascii_lowercase();
    let name = if host.starts_with('[') {
        match host.find(']') {
            Some(end) => &host[..=end],
            None => return false,
        }
    } else {
        host.split(':').next().unwrap_or("")
    };
    LOCAL_HOSTS.contains(&name)
}

/// First gate: authoring is enabled and the request targets a local origin.
pub fn check_local_origin(authoring_enabled: bool, host: Option<&str>) -> Result<()> {
    if !authoring_enabled {
        return Err(NotesError::Forbidden("authoring is disabled".to_string()));
    }
    match host {
        Some(host) if is_local_host(host) => Ok(()),
        Some(host) => Err(NotesError::Forbidden(format!("origin host '{}'", host))),
        None => Err(NotesError::Forbidden("missing Host header".to_string())),
    }
}

/// Second gate: the connection comes from a loopback address.
pub fn check_loopback_peer(peer: Option<SocketAddr>) -> Result<()> {
    match peer {
        Some(addr) if addr.ip().to_canonical().is_loopback() => Ok(()),
        Some(addr) => Err(NotesError::Forbidden(format!("peer {}", addr.ip()))),
        None => Err(NotesError::Forbidden("unknown peer address".to_string())),
    }
}

/// Rejects authoring requests failing either gate before any handler runs.
async fn require_local(State(state): State<SharedState>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok());

    let verdict = check_local_origin(state.config.authoring_enabled, host)
        .and_then(|()| check_loopback_peer(peer));
    if let Err(e) = verdict {
        log::warn!("Refused {} {}: {}", request.method(), request.uri().path(), e);
        return authoring::respond(Err(e)).into_response();
    }

    next.run(request).await
}

/// Builds the application router.
///
/// Control endpoints live under `/__notes/` and `<mount>/__notes/`; every
/// other path is served from the content root.
pub fn router(state: SharedState) -> Router {
    let control = Router::new()
        .route(
            "/refresh",
            get(authoring::regenerate_index).post(authoring::regenerate_index),
        )
        .route(
            "/regenerate-index",
            get(authoring::regenerate_index).post(authoring::regenerate_index),
        )
        .route("/mkdir", post(authoring::make_directory))
        .route("/write", post(authoring::write_file))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_local));

    let mut app = Router::new().nest("/__notes", control.clone());
    let mount = state.config.base_path.trim_end_matches('/');
    if !mount.is_empty() {
        app = app.nest(&format!("{}/__notes", mount), control);
    }

    app.fallback(content::serve_content).with_state(state)
}

/// Binds `host:port` from the config and serves until the task is dropped.
pub async fn serve(state: SharedState) -> std::io::Result<()> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = TcpListener::bind(&addr).await?;
    log::info!(
        "Serving {} at http://{}{}",
        state.config.content_root.display(),
        listener.local_addr()?,
        state.config.base_path
    );
    serve_on(listener, state).await
}

/// Serves on an already bound listener.
pub async fn serve_on(listener: TcpListener, state: SharedState) -> std::io::Result<()> {
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}
