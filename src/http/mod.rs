//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → context.rs (method, path, client IP, XHR flag, CSRF check)
//!     → [blocking task] RouteTable::resolve + apply_filters
//!     → server.rs (200 / 303 / 404)
//! ```

pub mod context;
pub mod request;
pub mod server;

pub use context::HttpRequestContext;
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
