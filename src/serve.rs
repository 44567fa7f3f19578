//! Purpose: Provide the HTTP/JSON demo server around the strict body decoder.
//! Exports: `ServeConfig`, `serve`, `validate_config`.
//! Role: Axum-based server with a small in-memory movie catalogue.
//! Invariants: Every error body is a `{"error": ...}` envelope; decode failures are 400s.
//! Invariants: Loopback-only unless explicitly allowed.
//! Notes: Unknown routes answer 404 and known routes with the wrong method answer 405.

use axum::Router;
use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::Response;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use tokio::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use bodyguard::api::{
    Envelope, Error, ErrorKind, RequestInfo, bad_request_response, method_not_allowed_response,
    not_found_response, read_json, server_error_response, write_json,
};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub max_body_bytes: u64,
    pub allow_non_loopback: bool,
}

struct AppState {
    max_body_bytes: u64,
    movies: Mutex<MovieStore>,
}

#[derive(Default)]
struct MovieStore {
    last_id: u64,
    movies: BTreeMap<u64, Movie>,
}

#[derive(Debug, Deserialize)]
struct CreateMovieRequest {
    title: String,
    year: i32,
    runtime: u32,
    #[serde(default)]
    genres: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct Movie {
    id: u64,
    title: String,
    year: i32,
    runtime: u32,
    genres: Vec<String>,
    version: u32,
}

impl AppState {
    fn new(max_body_bytes: u64) -> Self {
        Self {
            max_body_bytes,
            movies: Mutex::new(MovieStore::default()),
        }
    }

    fn insert_movie(&self, input: CreateMovieRequest) -> Result<Movie, Error> {
        let mut store = self.movies.lock().map_err(|_| store_poisoned())?;
        store.last_id += 1;
        let movie = Movie {
            id: store.last_id,
            title: input.title,
            year: input.year,
            runtime: input.runtime,
            genres: input.genres,
            version: 1,
        };
        store.movies.insert(movie.id, movie.clone());
        Ok(movie)
    }

    fn movie(&self, id: u64) -> Result<Option<Movie>, Error> {
        let store = self.movies.lock().map_err(|_| store_poisoned())?;
        Ok(store.movies.get(&id).cloned())
    }
}

fn store_poisoned() -> Error {
    Error::new(ErrorKind::Internal).with_message("movie store lock poisoned")
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    init_tracing();

    let app = router(Arc::new(AppState::new(config.max_body_bytes)));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;
    tracing::info!(bind = %config.bind, max_body_bytes = config.max_body_bytes, "listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/v1/healthcheck",
            get(healthcheck).fallback(method_not_allowed),
        )
        .route("/v1/movies", post(create_movie).fallback(method_not_allowed))
        .route("/v1/movies/:id", get(show_movie).fallback(method_not_allowed))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

pub fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }

    if config.max_body_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes must be greater than zero")
            .with_hint("Use a positive value like 1048576."));
    }

    if config.max_body_bytes > usize::MAX as u64 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes exceeds platform limits")
            .with_hint("Use a smaller value that fits in memory."));
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

async fn healthcheck(method: Method, uri: Uri) -> Response {
    let request = RequestInfo::new(method, uri);
    let health = json!({
        "status": "available",
        "version": env!("CARGO_PKG_VERSION"),
    });
    match write_json(StatusCode::OK, &Envelope::new("health", health), HeaderMap::new()) {
        Ok(response) => response,
        Err(err) => server_error_response(&request, &err),
    }
}

async fn create_movie(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    body: Body,
) -> Response {
    let request = RequestInfo::new(method, uri);
    let input: CreateMovieRequest = match read_json(body, state.max_body_bytes).await {
        Ok(input) => input,
        Err(err) => {
            tracing::debug!(kind = err.kind(), uri = %request.uri(), "rejected request body");
            return bad_request_response(&request, &err);
        }
    };

    let movie = match state.insert_movie(input) {
        Ok(movie) => movie,
        Err(err) => return server_error_response(&request, &err),
    };

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/v1/movies/{}", movie.id)) {
        headers.insert(header::LOCATION, location);
    }
    match write_json(StatusCode::CREATED, &Envelope::new("movie", &movie), headers) {
        Ok(response) => response,
        Err(err) => server_error_response(&request, &err),
    }
}

async fn show_movie(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    AxumPath(id): AxumPath<String>,
) -> Response {
    let request = RequestInfo::new(method, uri);
    let Some(id) = parse_id(&id) else {
        return not_found_response(&request);
    };
    match state.movie(id) {
        Ok(Some(movie)) => {
            match write_json(StatusCode::OK, &Envelope::new("movie", &movie), HeaderMap::new()) {
                Ok(response) => response,
                Err(err) => server_error_response(&request, &err),
            }
        }
        Ok(None) => not_found_response(&request),
        Err(err) => server_error_response(&request, &err),
    }
}

fn parse_id(raw: &str) -> Option<u64> {
    raw.parse::<u64>().ok().filter(|id| *id >= 1)
}

async fn not_found(method: Method, uri: Uri) -> Response {
    not_found_response(&RequestInfo::new(method, uri))
}

async fn method_not_allowed(method: Method, uri: Uri) -> Response {
    method_not_allowed_response(&RequestInfo::new(method, uri))
}
