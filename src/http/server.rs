//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with the dispatch handler
//! - Wire up middleware (timeout, request ID, tracing)
//! - Resolve every request against the published route table
//! - Turn match results and filter outcomes into responses
//! - Swap in rebuilt tables on config reload
//!
//! # Responses
//! ```text
//! matched, filters pass      → 200 {target, route_key, params, locale}
//! filter blocked             → 303 Location: redirect target
//! no match, 404 fallback     → 404 {target, route_key, params, locale}
//! no match, no fallback      → 303 Location: invalid request page
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{AppConfig, ConfigUpdate};
use crate::context::{LocaleStore, RequestContext, RequestLocale};
use crate::filters::FilterOutcome;
use crate::http::context::HttpRequestContext;
use crate::http::request::{request_id, UuidRequestId};
use crate::routing::{LookupEnv, MatchResult, RouteTable};
use crate::store::RouteStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Published route table, replaced atomically on reload.
    pub table: Arc<ArcSwap<RouteTable>>,
    pub store: Arc<dyn RouteStore>,
    pub default_locale: Arc<str>,
}

impl AppState {
    pub fn new(table: Arc<RouteTable>, store: Arc<dyn RouteStore>, default_locale: &str) -> Self {
        Self {
            table: Arc::new(ArcSwap::from(table)),
            store,
            default_locale: Arc::from(default_locale),
        }
    }
}

/// Hand-off to the application's dispatch layer.
#[derive(Debug, Serialize)]
struct DispatchBody {
    target: String,
    route_key: String,
    params: Vec<String>,
    locale: String,
}

impl From<MatchResult> for DispatchBody {
    fn from(result: MatchResult) -> Self {
        Self {
            target: result.resolved_target,
            route_key: result.route_key,
            params: result.captured_parameters,
            locale: result.locale,
        }
    }
}

/// HTTP front end for a route table.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: AppConfig,
}

impl HttpServer {
    /// Create a new HTTP server serving `state`.
    pub fn new(config: &AppConfig, state: AppState) -> Self {
        let router = Self::build_router(config, state.clone());
        Self {
            router,
            state,
            config: config.clone(),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        Router::new()
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// The router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Apply reloaded tables until the update channel closes.
    pub fn spawn_reloader(&self, mut updates: mpsc::UnboundedReceiver<ConfigUpdate>) -> tokio::task::JoinHandle<()> {
        let table = self.state.table.clone();
        let running = self.config.clone();
        tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                let pending = update.restart_required(&running);
                if !pending.is_empty() {
                    tracing::warn!(fields = ?pending, "Reloaded settings take effect after restart");
                }

                let routes = update.table.len();
                table.store(update.table);
                tracing::info!(
                    routes,
                    pattern_mode = ?update.config.routing.pattern_mode,
                    "Route table swapped"
                );
            }
        })
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Resolve, filter and answer one request.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request_id(&request).to_string();
    let context = HttpRequestContext::from_request(&request);

    let table = state.table.load_full();
    let store = state.store.clone();
    let default_locale = state.default_locale.clone();

    // Segment lookups may block on the store.
    let joined = tokio::task::spawn_blocking(move || {
        let locale = RequestLocale::new(&*default_locale);
        let env = LookupEnv::new(store.as_ref(), &locale);
        let path = context.active_uri();

        let result = match table.resolve(path, &env) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(path = %path, error = %e, "Segment store failed, treating as no match");
                table.fallback(path, locale.current_locale())
            }
        };
        let outcome = table.apply_filters(&result, &context);
        (result, outcome)
    })
    .await;

    let (result, outcome) = match joined {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Resolution task failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let FilterOutcome::Redirect { kind, target } = outcome {
        tracing::debug!(request_id = %request_id, kind = %kind, target = %target, "Redirecting blocked request");
        return Redirect::to(&target).into_response();
    }

    if result.invalid_request {
        return Redirect::to(&result.resolved_target).into_response();
    }

    let status = if result.used_fallback_404 {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    };

    tracing::debug!(
        request_id = %request_id,
        status = status.as_u16(),
        target = %result.resolved_target,
        "Dispatching"
    );
    (status, Json(DispatchBody::from(result))).into_response()
}
