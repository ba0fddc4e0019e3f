//! Request-scoped collaborators.
//!
//! # Responsibilities
//! - `request.rs`: the HTTP capability filters evaluate against
//! - `locale.rs`: the localization capability segment lookups may switch
//!
//! Both are traits so the routing core never depends on a concrete HTTP
//! stack or translation store; `http::context` adapts axum requests.

pub mod locale;
pub mod request;

pub use locale::{LocaleStore, RequestLocale};
pub use request::{RequestContext, StaticRequest};
