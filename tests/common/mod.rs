//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use route_gate::config::{build_route_table, parse_config, AppConfig};
use route_gate::http::{AppState, HttpServer};
use route_gate::lifecycle::Shutdown;
use route_gate::store::MemoryStore;

/// Configuration exercising every routing feature.
pub const SITE_CONFIG: &str = r#"
[routing]
open_controller = "home"
show404 = "errors/notfound"

[[routing.change_uri]]
pattern = "about"
target = "pages/about"

[[routing.routes]]
pattern = "user/:numeric/:action"
target = "profile/show"

[[routing.routes]]
pattern = "user/save"
target = "user/save"
filters = [
    { kind = "method", methods = ["post"] },
    { kind = "csrf" },
    { kind = "redirect", target = "/login" },
]

[[routing.routes]]
pattern = "product/[products:slug,json]"
target = "product/view"

[[routing.containers]]
filters = [{ kind = "restore", ips = ["10.9.9.9"], uri = "/maintenance" }]
routes = [
    { pattern = "admin/dashboard", target = "admin/dashboard" },
    { pattern = "manage/:id", target = "admin/users" },
]

[[routing.routes]]
pattern = "feed"
target = "feed/list"
filters = [{ kind = "ajax" }]

[security.url_change_chars]
"<script[^>]*>" = ""

[store.tables]
products = [
    { slug = '{"en":"red-shoe","tr":"kirmizi-ayakkabi"}' },
    { slug = '{"en":"handbag","tr":"çanta"}' },
]
"#;

pub fn site_config() -> AppConfig {
    parse_config(SITE_CONFIG).expect("site config is valid")
}

/// Build server state for `config`.
pub fn state_for(config: &AppConfig) -> AppState {
    let table = Arc::new(build_route_table(config).expect("route table builds"));
    let store = Arc::new(MemoryStore::from_tables(&config.store.tables));
    AppState::new(table, store, &config.routing.default_locale)
}

/// Start a live server on `addr`. Trigger the returned coordinator to stop it.
pub async fn start_server(addr: SocketAddr, config: AppConfig) -> Shutdown {
    let server = HttpServer::new(&config, state_for(&config));
    let listener = TcpListener::bind(addr).await.expect("bind test listener");
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown
}

/// HTTP client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("client builds")
}
