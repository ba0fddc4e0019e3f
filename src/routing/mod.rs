//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Declaration (at startup):
//!     builder.rs   change(pattern) → uri(target) → all() → finish()
//!     pattern.rs   compile matcher + `$n` template (special or classic syntax)
//!     dynamic.rs   validate `[table:column]` markers, keep them for request time
//!     → table.rs   immutable RouteTable
//!
//! Incoming request (path):
//!     → table.rs (clean path, open controller, scan entries in order)
//!     → dynamic.rs + decode.rs (resolve markers via RouteStore, maybe switch locale)
//!     → MatchResult, or the 404 / invalid request fallback
//!     → filters (run for the matched route key)
//! ```
//!
//! # Design Decisions
//! - Tables are built once and immutable at runtime
//! - Deterministic: same path and store contents yield the same result
//! - First match wins, in merge order
//! - Malformed patterns fail at declaration time, lookup misses never fail

pub mod builder;
pub mod decode;
pub mod dynamic;
pub mod pattern;
pub mod table;
pub mod types;

pub use builder::{Router, RouterOptions, NOT_FOUND_PATTERN};
pub use decode::Directive;
pub use dynamic::{DynamicSegmentResolver, ResolvedPattern, SegmentMarker};
pub use pattern::{CompiledRoute, Matcher, PatternCompiler, PatternMode, PatternSyntax};
pub use table::{LookupEnv, MatchResult, RouteEntry, RouteSettings, RouteSummary, RouteTable};
pub use types::{RouteError, RouteResult, Target};
