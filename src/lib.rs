//! Declarative URI routing and request filtering.

pub mod config;
pub mod context;
pub mod filters;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod store;

pub use config::AppConfig;
pub use filters::{FilterBuilder, FilterKind, FilterOutcome};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{MatchResult, RouteError, RouteTable, Router};
