//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → routes.rs (declare routes + filters → RouteTable)
//!     → shared via Arc<ArcSwap<RouteTable>> to the HTTP layer
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → routes.rs rebuilds the table
//!     → atomic swap of the published table
//! ```
//!
//! # Design Decisions
//! - Route table is immutable once built; changes require a full rebuild
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A failed reload keeps the current table

pub mod loader;
pub mod routes;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use routes::build_route_table;
pub use schema::{AppConfig, FilterSpec, RouteSpec, RoutingConfig};
pub use watcher::{ConfigUpdate, ConfigWatcher};
