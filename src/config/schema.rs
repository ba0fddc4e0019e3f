//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the route
//! gate. All types derive Serde traits for deserialization from TOML.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::filters::INVALID_REQUEST_PAGE;
use crate::routing::PatternMode;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,

    /// Route declarations and resolution policy.
    pub routing: RoutingConfig,

    /// Request path cleaning.
    pub security: SecurityConfig,

    /// Seed rows for the in-memory segment store.
    pub store: StoreConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Pattern syntax, fixed for the whole process.
    pub pattern_mode: PatternMode,

    /// Action appended to targets without one.
    pub default_action: String,

    /// Controller served for the empty path and the bare locale path.
    pub open_controller: Option<String>,

    /// Fallback target when no route matches.
    pub show404: Option<String>,

    /// Redirect target when nothing matches and no fallback exists, and the
    /// last resort for blocked requests.
    pub invalid_request_page: String,

    /// Redirect target for blocked requests without a route redirect.
    pub request_methods_page: Option<String>,

    /// Locale a request starts with.
    pub default_locale: String,

    /// Static pattern → target rewrites, merged behind declared routes.
    pub change_uri: Vec<ChangeUri>,

    /// Declared routes, in match order.
    pub routes: Vec<RouteSpec>,

    /// Route groups sharing filters.
    pub containers: Vec<ContainerSpec>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            pattern_mode: PatternMode::Special,
            default_action: "main".to_string(),
            open_controller: None,
            show404: None,
            invalid_request_page: INVALID_REQUEST_PAGE.to_string(),
            request_methods_page: None,
            default_locale: "en".to_string(),
            change_uri: Vec::new(),
            routes: Vec::new(),
            containers: Vec::new(),
        }
    }
}

/// Static rewrite entry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ChangeUri {
    pub pattern: String,
    pub target: String,
}

/// A declared route with its filters.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteSpec {
    pub pattern: String,
    pub target: String,

    #[serde(default)]
    pub filters: Vec<FilterSpec>,
}

/// Routes declared inside one container scope.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct ContainerSpec {
    /// Filters applied to every route of the container.
    #[serde(default)]
    pub filters: Vec<FilterSpec>,

    #[serde(default)]
    pub routes: Vec<RouteSpec>,
}

/// Filter declaration. Which fields apply depends on `kind`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct FilterSpec {
    /// One of restore, usable, csrf, ajax, method, redirect.
    pub kind: String,

    /// `method`: allowed methods.
    #[serde(default)]
    pub methods: Vec<String>,

    /// `restore`: allowed client IPs.
    #[serde(default)]
    pub ips: Vec<String>,

    /// `restore` / `csrf`: kind-specific redirect target.
    #[serde(default)]
    pub uri: Option<String>,

    /// `usable`: whether the route accepts traffic.
    #[serde(default)]
    pub enabled: Option<bool>,

    /// `redirect`: general redirect target.
    #[serde(default)]
    pub target: Option<String>,
}

/// Request path cleaning.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    /// Regex → replacement, applied case-insensitively in key order.
    pub url_change_chars: BTreeMap<String, String>,
}

/// Seed data for the in-memory store.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Table name → rows of column → value.
    pub tables: HashMap<String, Vec<HashMap<String, String>>>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
