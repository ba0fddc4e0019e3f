//! Pre-dispatch request filters.
//!
//! # Data Flow
//! ```text
//! Declaration (startup):
//!     builder.method(..).redirect(..)   → working state
//!     router.uri(target)                → bind to lowercase route key
//!     container(..) exit                → working state cleared
//!
//! Request:
//!     MatchResult.route_key
//!     → dispatcher.rs (declarations in first-declared order)
//!     → handlers.rs (one handler per kind)
//!     → Continue | Redirect(target)
//! ```
//!
//! # Design Decisions
//! - Closed `FilterKind` enum, handlers chosen from a registration table
//! - One declaration per (route key, kind); later ones overwrite in place
//! - Missing handlers fail at startup, never at request time

pub mod dispatcher;
pub mod handlers;
pub mod set;

pub use dispatcher::{FilterDispatcher, FilterOutcome, INVALID_REQUEST_PAGE};
pub use handlers::{FilterHandler, Verdict};
pub use set::{CallbackFn, FilterBuilder, FilterConfig, FilterDeclaration, FilterKind, FilterSet};
