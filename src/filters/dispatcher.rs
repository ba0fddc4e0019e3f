//! Filter dispatch for the currently matched route.
//!
//! # Responsibilities
//! - Hold the kind → handler registration table
//! - Verify at startup that every declared kind has a handler
//! - Run a route's filters in first-declared order, stopping at the first block
//! - Pick the redirect target of a block
//!
//! # Redirect precedence
//! ```text
//! kind-specific target (restore uri, csrf target)
//!     → route `redirect` declaration
//!     → configured request-methods page
//!     → invalid request page
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::observability::metrics;
use crate::routing::{RouteError, RouteResult};

use super::handlers::{
    AjaxFilter, CallbackFilter, CsrfFilter, FilterHandler, MethodFilter, RedirectFilter, RestoreFilter,
    UsableFilter, Verdict,
};
use super::set::{FilterConfig, FilterKind, FilterSet};

/// Default invalid request page.
pub const INVALID_REQUEST_PAGE: &str = "/invalid-request";

/// What the dispatch layer must do after filters ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    Continue,
    Redirect { kind: FilterKind, target: String },
}

impl FilterOutcome {
    pub fn is_blocked(&self) -> bool {
        matches!(self, FilterOutcome::Redirect { .. })
    }
}

/// Kind → handler table plus the redirect fallbacks.
#[derive(Clone)]
pub struct FilterDispatcher {
    handlers: HashMap<FilterKind, Arc<dyn FilterHandler>>,
    request_methods_page: Option<String>,
    invalid_request_page: String,
}

impl FilterDispatcher {
    /// Dispatcher with every built-in handler registered.
    pub fn new() -> Self {
        let mut dispatcher = Self::empty();
        dispatcher.register(FilterKind::Restore, RestoreFilter);
        dispatcher.register(FilterKind::Usable, UsableFilter);
        dispatcher.register(FilterKind::Csrf, CsrfFilter);
        dispatcher.register(FilterKind::Ajax, AjaxFilter);
        dispatcher.register(FilterKind::Callback, CallbackFilter);
        dispatcher.register(FilterKind::Method, MethodFilter);
        dispatcher.register(FilterKind::Redirect, RedirectFilter);
        dispatcher
    }

    /// Dispatcher with no handlers; register each kind explicitly.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
            request_methods_page: None,
            invalid_request_page: INVALID_REQUEST_PAGE.to_string(),
        }
    }

    /// Register (or replace) the handler for `kind`.
    pub fn register<H>(&mut self, kind: FilterKind, handler: H) -> &mut Self
    where
        H: FilterHandler + 'static,
    {
        self.handlers.insert(kind, Arc::new(handler));
        self
    }

    pub fn with_request_methods_page(mut self, page: Option<String>) -> Self {
        self.request_methods_page = page;
        self
    }

    pub fn with_invalid_request_page(mut self, page: impl Into<String>) -> Self {
        self.invalid_request_page = page.into();
        self
    }

    pub fn invalid_request_page(&self) -> &str {
        &self.invalid_request_page
    }

    /// Fail if any declared kind has no registered handler.
    pub fn verify(&self, filters: &FilterSet) -> RouteResult<()> {
        match filters
            .declarations()
            .iter()
            .find(|d| !self.handlers.contains_key(&d.kind()))
        {
            Some(missing) => Err(RouteError::UnknownFilterKind(missing.kind().to_string())),
            None => Ok(()),
        }
    }

    /// Run the filters declared for `route_key`.
    pub fn run(&self, route_key: &str, filters: &FilterSet, request: &dyn RequestContext) -> FilterOutcome {
        for declaration in filters.for_route(route_key) {
            let kind = declaration.kind();
            let Some(handler) = self.handlers.get(&kind) else {
                // verify() rejects this at startup.
                tracing::error!(route_key = %route_key, kind = %kind, "No handler registered for filter");
                continue;
            };

            if let Verdict::Block { redirect } = handler.evaluate(&declaration.config, request) {
                let target = redirect
                    .or_else(|| self.route_redirect(route_key, filters))
                    .or_else(|| self.request_methods_page.clone())
                    .unwrap_or_else(|| self.invalid_request_page.clone());

                tracing::info!(
                    route_key = %route_key,
                    kind = %kind,
                    method = %request.method(),
                    target = %target,
                    "Request blocked by filter"
                );
                metrics::record_filter_block(kind.as_str());
                return FilterOutcome::Redirect { kind, target };
            }
        }

        FilterOutcome::Continue
    }

    fn route_redirect(&self, route_key: &str, filters: &FilterSet) -> Option<String> {
        match filters.get(route_key, FilterKind::Redirect) {
            Some(FilterConfig::Redirect(target)) => Some(target.clone()),
            _ => None,
        }
    }
}

impl Default for FilterDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FilterDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterDispatcher")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .field("request_methods_page", &self.request_methods_page)
            .field("invalid_request_page", &self.invalid_request_page)
            .finish()
    }
}
