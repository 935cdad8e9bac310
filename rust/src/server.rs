use anyhow::{anyhow, Context, Result};
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::backend::ProposalBackend;
use crate::controller::{ProposalController, UiUpdate};
use crate::main_ui_html::build_main_ui_html;
use crate::proposal::ProductForm;

pub struct AppState<B> {
    pub controller: ProposalController<B>,
    pub server_port: AtomicU16,
}

impl<B: ProposalBackend> AppState<B> {
    pub fn new(controller: ProposalController<B>) -> Self {
        Self {
            controller,
            server_port: AtomicU16::new(0),
        }
    }
}

type ApiResponse = (StatusCode, Json<Value>);

/// UI server running on its own thread with a single-threaded runtime.
/// Dropping it shuts the server down.
pub struct AppServer {
    port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl AppServer {
    pub fn start<B: ProposalBackend>(state: Arc<AppState<B>>, preferred_port: u16) -> Result<Self> {
        let listener = bind_listener(preferred_port)?;
        let port = listener
            .local_addr()
            .context("failed to inspect server local address")?
            .port();
        listener
            .set_nonblocking(true)
            .context("failed to set listener non-blocking")?;

        state.server_port.store(port, Ordering::Relaxed);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let thread_handle = thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build();
            let runtime = match runtime {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!(error = %err, "failed to build server runtime");
                    return;
                }
            };

            runtime.block_on(async move {
                let listener = match tokio::net::TcpListener::from_std(listener) {
                    Ok(listener) => listener,
                    Err(err) => {
                        error!(error = %err, "failed to adopt server listener");
                        return;
                    }
                };

                let app = build_router(state);
                let server = axum::serve(listener, app).with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                });
                if let Err(err) = server.await {
                    error!(error = %err, "server stopped with an error");
                }
            });
        });

        info!(port, "ui server started");
        Ok(Self {
            port,
            shutdown_tx: Some(shutdown_tx),
            thread_handle: Some(thread_handle),
        })
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            info!(port = self.port, "ui server stopped");
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for AppServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Deserialize)]
struct SearchReq {
    #[serde(default)]
    product_name: String,
}

#[derive(Debug, Deserialize)]
struct SelectReq {
    index: usize,
}

#[derive(Debug, Deserialize)]
struct GenerateReq {
    #[serde(flatten)]
    form: ProductForm,
    #[serde(default)]
    viewport_width: Option<u32>,
}

pub fn build_router<B: ProposalBackend>(state: Arc<AppState<B>>) -> Router {
    let port = state.server_port.load(Ordering::Relaxed);
    let mut origins = Vec::new();
    for host in ["127.0.0.1", "localhost"] {
        if let Ok(origin) = HeaderValue::from_str(&format!("http://{host}:{port}")) {
            origins.push(origin);
        }
    }

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(get_main_page))
        .route("/ping", get(get_ping))
        .route("/app/init", get(get_app_init::<B>))
        .route("/app/search", post(post_app_search::<B>))
        .route("/app/select", post(post_app_select::<B>))
        .route("/app/generate", post(post_app_generate::<B>))
        .route("/app/export", get(get_app_export::<B>))
        .layer(cors)
        .with_state(state)
}

async fn get_main_page() -> Html<String> {
    Html(build_main_ui_html())
}

async fn get_ping() -> ApiResponse {
    ok_json(json!({}))
}

async fn get_app_init<B: ProposalBackend>(State(state): State<Arc<AppState<B>>>) -> ApiResponse {
    ok_update(state.controller.init())
}

async fn post_app_search<B: ProposalBackend>(
    State(state): State<Arc<AppState<B>>>,
    Json(payload): Json<SearchReq>,
) -> ApiResponse {
    ok_update(state.controller.search(&payload.product_name).await)
}

async fn post_app_select<B: ProposalBackend>(
    State(state): State<Arc<AppState<B>>>,
    Json(payload): Json<SelectReq>,
) -> ApiResponse {
    ok_update(state.controller.select(payload.index))
}

async fn post_app_generate<B: ProposalBackend>(
    State(state): State<Arc<AppState<B>>>,
    Json(payload): Json<GenerateReq>,
) -> ApiResponse {
    ok_update(
        state
            .controller
            .generate(payload.form, payload.viewport_width)
            .await,
    )
}

async fn get_app_export<B: ProposalBackend>(State(state): State<Arc<AppState<B>>>) -> Response {
    let Some(document) = state.controller.export() else {
        return err_json(StatusCode::NOT_FOUND, "no proposal has been generated").into_response();
    };

    let disposition = format!(
        "inline; filename=\"proposal.html\"; filename*=UTF-8''{}",
        percent_encode(&document.file_name)
    );
    match HeaderValue::from_str(&disposition) {
        Ok(value) => ([(header::CONTENT_DISPOSITION, value)], Html(document.html)).into_response(),
        Err(_) => Html(document.html).into_response(),
    }
}

fn ok_json(payload: Value) -> ApiResponse {
    let mut body = serde_json::Map::new();
    body.insert("ok".to_string(), Value::Bool(true));

    if let Some(obj) = payload.as_object() {
        for (key, value) in obj {
            body.insert(key.clone(), value.clone());
        }
    } else if !payload.is_null() {
        body.insert("data".to_string(), payload);
    }

    (StatusCode::OK, Json(Value::Object(body)))
}

fn ok_update(update: UiUpdate) -> ApiResponse {
    match serde_json::to_value(update) {
        Ok(value) => ok_json(value),
        Err(err) => err_json(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("serialize error: {err}"),
        ),
    }
}

fn err_json(status: StatusCode, message: &str) -> ApiResponse {
    (
        status,
        Json(json!({
            "ok": false,
            "error": message,
        })),
    )
}

/// RFC 5987 encoding for the `filename*` parameter.
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn bind_listener(preferred_port: u16) -> Result<TcpListener> {
    for offset in 0..200u16 {
        let port = preferred_port.saturating_add(offset);
        if port == 0 {
            continue;
        }

        if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
            return Ok(listener);
        }
    }

    Err(anyhow!("failed to bind server port"))
}
