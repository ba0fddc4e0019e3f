//! The effective, request-visible route table.
//!
//! # Responsibilities
//! - Hold compiled routes in merge order
//! - Resolve an inbound path to a target (first match wins)
//! - Apply the 404 / invalid request fallback policy
//! - Run the filters of the matched route
//!
//! # Design Decisions
//! - Immutable once built; shared behind `Arc` and swapped on reload
//! - Dynamic entries keep their raw pattern and are resolved per request
//! - A dynamic lookup miss skips the entry, so the path can still match later entries

use regex::Regex;
use serde::Serialize;

use crate::context::{LocaleStore, RequestContext};
use crate::filters::{FilterDispatcher, FilterOutcome, FilterSet, INVALID_REQUEST_PAGE};
use crate::observability::metrics;
use crate::store::{RouteStore, StoreError};

use super::dynamic::{DynamicSegmentResolver, SegmentMarker};
use super::pattern::{CompiledRoute, PatternCompiler};
use super::types::Target;

/// A route whose pattern needs store lookups before it can be compiled.
#[derive(Debug, Clone)]
pub struct DynamicRoute {
    /// Slash-trimmed pattern, markers included.
    pub key: String,
    pub markers: Vec<SegmentMarker>,
    pub target: Target,
}

#[derive(Debug, Clone)]
pub enum RouteEntry {
    Static(CompiledRoute),
    Dynamic(DynamicRoute),
}

impl RouteEntry {
    pub fn key(&self) -> &str {
        match self {
            RouteEntry::Static(route) => &route.key,
            RouteEntry::Dynamic(route) => &route.key,
        }
    }

    pub fn target(&self) -> &Target {
        match self {
            RouteEntry::Static(route) => &route.target,
            RouteEntry::Dynamic(route) => &route.target,
        }
    }
}

/// Table-wide resolution settings.
#[derive(Debug, Clone)]
pub struct RouteSettings {
    /// Action appended to targets that name only a controller.
    pub default_action: String,
    /// Target for the empty path and for a path naming the current locale.
    pub open_controller: Option<Target>,
    /// Fallback target when nothing matches.
    pub show404: Option<Target>,
    pub invalid_request_page: String,
    pub request_methods_page: Option<String>,
    /// Case-insensitive replacements applied to the path before matching.
    pub url_change_chars: Vec<(Regex, String)>,
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self {
            default_action: "main".to_string(),
            open_controller: None,
            show404: None,
            invalid_request_page: INVALID_REQUEST_PAGE.to_string(),
            request_methods_page: None,
            url_change_chars: Vec::new(),
        }
    }
}

/// Request-scoped collaborators used while resolving.
#[derive(Clone, Copy)]
pub struct LookupEnv<'a> {
    pub store: &'a dyn RouteStore,
    pub locale: &'a dyn LocaleStore,
}

impl<'a> LookupEnv<'a> {
    pub fn new(store: &'a dyn RouteStore, locale: &'a dyn LocaleStore) -> Self {
        Self { store, locale }
    }
}

/// Outcome of resolving one request path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    /// Key of the matched table entry; `None` for fallbacks and the open controller.
    pub matched_pattern: Option<String>,
    /// Target with captured parameters substituted.
    pub resolved_target: String,
    /// Lowercase `controller/action` the route's filters are keyed by.
    pub route_key: String,
    pub captured_parameters: Vec<String>,
    pub used_fallback_404: bool,
    /// Nothing matched and no fallback is configured.
    pub invalid_request: bool,
    /// Locale active after resolution.
    pub locale: String,
}

/// One line of [`RouteTable::describe`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSummary {
    pub pattern: String,
    pub target: String,
    pub template: Option<String>,
    pub dynamic: bool,
    pub filters: Vec<String>,
}

/// Immutable route table produced by [`super::Router::finish`].
#[derive(Debug, Clone)]
pub struct RouteTable {
    pub(crate) entries: Vec<RouteEntry>,
    pub(crate) filters: FilterSet,
    pub(crate) dispatcher: FilterDispatcher,
    pub(crate) compiler: PatternCompiler,
    pub(crate) settings: RouteSettings,
}

impl RouteTable {
    /// Resolve `path`. Only store failures are returned as errors; callers
    /// treat them like a lookup miss.
    pub fn resolve(&self, path: &str, env: &LookupEnv<'_>) -> Result<MatchResult, StoreError> {
        let result = self.resolve_inner(path, env);
        let outcome = match &result {
            Ok(m) if m.invalid_request => "invalid",
            Ok(m) if m.used_fallback_404 => "fallback_404",
            Ok(_) => "matched",
            Err(_) => "error",
        };
        metrics::record_resolution(outcome);
        result
    }

    fn resolve_inner(&self, path: &str, env: &LookupEnv<'_>) -> Result<MatchResult, StoreError> {
        let path = self.normalize(path);

        if let Some(open) = &self.settings.open_controller {
            let current = env.locale.current_locale();
            if path.is_empty() || path.eq_ignore_ascii_case(&current) {
                tracing::debug!(path = %path, target = %open, "Open controller");
                return Ok(MatchResult {
                    matched_pattern: None,
                    resolved_target: open.path(),
                    route_key: open.route_key(),
                    captured_parameters: Vec::new(),
                    used_fallback_404: false,
                    invalid_request: false,
                    locale: current,
                });
            }
        }

        let segments: Vec<&str> = path.split('/').collect();
        let resolver = DynamicSegmentResolver::new(env.store, env.locale);

        for entry in &self.entries {
            let hit = match entry {
                RouteEntry::Static(route) => route.matcher.captures(&path).map(|caps| matched(route, caps)),
                RouteEntry::Dynamic(route) => {
                    let Some(resolved) = resolver.resolve_markers(&route.key, &route.markers, &segments)? else {
                        continue;
                    };
                    match self.compiler.compile(&resolved.pattern, &route.target) {
                        Ok(Some(compiled)) => compiled.matcher.captures(&path).map(|caps| {
                            let mut result = matched(&compiled, caps);
                            result.matched_pattern = Some(route.key.clone());
                            result
                        }),
                        Ok(None) => None,
                        Err(e) => {
                            tracing::warn!(pattern = %route.key, error = %e, "Resolved pattern failed to compile");
                            None
                        }
                    }
                }
            };

            if let Some(mut result) = hit {
                result.locale = env.locale.current_locale();
                tracing::debug!(
                    path = %path,
                    pattern = ?result.matched_pattern,
                    target = %result.resolved_target,
                    "Route matched"
                );
                return Ok(result);
            }
        }

        Ok(self.fallback(&path, env.locale.current_locale()))
    }

    /// The no-match result: the 404 fallback, or the invalid request page
    /// when none is configured.
    pub fn fallback(&self, path: &str, locale: String) -> MatchResult {
        match &self.settings.show404 {
            Some(target) => {
                tracing::info!(path = %path, fallback = %target, "No route matched, using 404 fallback");
                MatchResult {
                    matched_pattern: None,
                    resolved_target: target.path(),
                    route_key: target.route_key(),
                    captured_parameters: Vec::new(),
                    used_fallback_404: true,
                    invalid_request: false,
                    locale,
                }
            }
            None => {
                tracing::warn!(
                    path = %path,
                    page = %self.settings.invalid_request_page,
                    "No route matched and no 404 fallback configured"
                );
                MatchResult {
                    matched_pattern: None,
                    resolved_target: self.settings.invalid_request_page.clone(),
                    route_key: String::new(),
                    captured_parameters: Vec::new(),
                    used_fallback_404: false,
                    invalid_request: true,
                    locale,
                }
            }
        }
    }

    /// Trim slashes and apply the configured injection replacements.
    fn normalize(&self, path: &str) -> String {
        let mut path = path.trim().trim_matches('/').to_string();
        for (pattern, replacement) in &self.settings.url_change_chars {
            if pattern.is_match(&path) {
                path = pattern.replace_all(&path, replacement.as_str()).into_owned();
            }
        }
        path.trim_matches('/').to_string()
    }

    /// Run the filters declared for the matched route.
    pub fn apply_filters(&self, result: &MatchResult, request: &dyn RequestContext) -> FilterOutcome {
        if result.invalid_request {
            return FilterOutcome::Continue;
        }
        self.dispatcher.run(&result.route_key, &self.filters, request)
    }

    /// Entry keys in match order.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(RouteEntry::key).collect()
    }

    pub fn describe(&self) -> Vec<RouteSummary> {
        self.entries
            .iter()
            .map(|entry| {
                let target = entry.target();
                let (template, dynamic) = match entry {
                    RouteEntry::Static(route) => (Some(route.template.clone()), false),
                    RouteEntry::Dynamic(_) => (None, true),
                };
                RouteSummary {
                    pattern: entry.key().to_string(),
                    target: target.path(),
                    template,
                    dynamic,
                    filters: self
                        .filters
                        .for_route(&target.route_key())
                        .map(|d| d.kind().to_string())
                        .collect(),
                }
            })
            .collect()
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn settings(&self) -> &RouteSettings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn matched(route: &CompiledRoute, captures: Vec<String>) -> MatchResult {
    MatchResult {
        matched_pattern: Some(route.key.clone()),
        resolved_target: route.substitute(&captures),
        route_key: route.target.route_key(),
        captured_parameters: captures,
        used_fallback_404: false,
        invalid_request: false,
        locale: String::new(),
    }
}
