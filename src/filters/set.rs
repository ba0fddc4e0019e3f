//! Filter declarations and the fluent builder that accumulates them.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::routing::RouteError;

/// Closed set of filter kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Restore,
    Usable,
    Csrf,
    Ajax,
    Callback,
    Method,
    Redirect,
}

impl FilterKind {
    pub const ALL: [FilterKind; 7] = [
        FilterKind::Restore,
        FilterKind::Usable,
        FilterKind::Csrf,
        FilterKind::Ajax,
        FilterKind::Callback,
        FilterKind::Method,
        FilterKind::Redirect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Restore => "restore",
            FilterKind::Usable => "usable",
            FilterKind::Csrf => "csrf",
            FilterKind::Ajax => "ajax",
            FilterKind::Callback => "callback",
            FilterKind::Method => "method",
            FilterKind::Redirect => "redirect",
        }
    }
}

impl FromStr for FilterKind {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        FilterKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| RouteError::UnknownFilterKind(s.to_string()))
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicate for `callback` filters. Returning false blocks the request.
pub type CallbackFn = Arc<dyn Fn(&dyn RequestContext) -> bool + Send + Sync>;

/// Kind-specific filter payload.
#[derive(Clone)]
pub enum FilterConfig {
    Restore { ips: Vec<String>, uri: Option<String> },
    Usable(bool),
    Csrf { target: Option<String> },
    Ajax,
    Callback(CallbackFn),
    Method(Vec<String>),
    Redirect(String),
}

impl FilterConfig {
    pub fn kind(&self) -> FilterKind {
        match self {
            FilterConfig::Restore { .. } => FilterKind::Restore,
            FilterConfig::Usable(_) => FilterKind::Usable,
            FilterConfig::Csrf { .. } => FilterKind::Csrf,
            FilterConfig::Ajax => FilterKind::Ajax,
            FilterConfig::Callback(_) => FilterKind::Callback,
            FilterConfig::Method(_) => FilterKind::Method,
            FilterConfig::Redirect(_) => FilterKind::Redirect,
        }
    }
}

impl fmt::Debug for FilterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterConfig::Restore { ips, uri } => f
                .debug_struct("Restore")
                .field("ips", ips)
                .field("uri", uri)
                .finish(),
            FilterConfig::Usable(enabled) => f.debug_tuple("Usable").field(enabled).finish(),
            FilterConfig::Csrf { target } => f.debug_struct("Csrf").field("target", target).finish(),
            FilterConfig::Ajax => f.write_str("Ajax"),
            FilterConfig::Callback(_) => f.write_str("Callback(..)"),
            FilterConfig::Method(methods) => f.debug_tuple("Method").field(methods).finish(),
            FilterConfig::Redirect(target) => f.debug_tuple("Redirect").field(target).finish(),
        }
    }
}

/// A filter bound to a route key.
#[derive(Debug, Clone)]
pub struct FilterDeclaration {
    pub route_key: String,
    pub config: FilterConfig,
}

impl FilterDeclaration {
    pub fn kind(&self) -> FilterKind {
        self.config.kind()
    }
}

/// Working filter state plus every declaration bound so far.
///
/// At most one declaration exists per `(route_key, kind)`; a later one
/// replaces the earlier one in place, so kinds keep their first-declared order.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    working: Vec<FilterConfig>,
    declarations: Vec<FilterDeclaration>,
    container_depth: usize,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_working(&mut self, config: FilterConfig) {
        let kind = config.kind();
        match self.working.iter_mut().find(|c| c.kind() == kind) {
            Some(slot) => *slot = config,
            None => self.working.push(config),
        }
    }

    /// Bind the working filters to `route_key`. Outside a container the
    /// working state is cleared afterwards.
    pub(crate) fn bind(&mut self, route_key: &str) {
        for config in &self.working {
            let kind = config.kind();
            let existing = self
                .declarations
                .iter_mut()
                .find(|d| d.route_key == route_key && d.kind() == kind);
            match existing {
                Some(slot) => slot.config = config.clone(),
                None => self.declarations.push(FilterDeclaration {
                    route_key: route_key.to_string(),
                    config: config.clone(),
                }),
            }
        }

        if !self.working.is_empty() {
            tracing::debug!(
                route_key = %route_key,
                kinds = ?self.working.iter().map(FilterConfig::kind).collect::<Vec<_>>(),
                "Filters bound"
            );
        }

        if self.container_depth == 0 {
            self.working.clear();
        }
    }

    pub(crate) fn enter_container(&mut self) {
        self.container_depth += 1;
    }

    /// Leaving the outermost container resets the working state.
    pub(crate) fn exit_container(&mut self) {
        self.container_depth = self.container_depth.saturating_sub(1);
        if self.container_depth == 0 {
            self.working.clear();
        }
    }

    pub fn in_container(&self) -> bool {
        self.container_depth > 0
    }

    /// Declarations for `route_key`, in first-declared kind order.
    pub fn for_route<'a, 'k>(&'a self, route_key: &'k str) -> impl Iterator<Item = &'a FilterDeclaration> + 'k
    where
        'a: 'k,
    {
        self.declarations.iter().filter(move |d| d.route_key == route_key)
    }

    /// The declaration of `kind` for `route_key`, if any.
    pub fn get(&self, route_key: &str, kind: FilterKind) -> Option<&FilterConfig> {
        self.declarations
            .iter()
            .find(|d| d.route_key == route_key && d.kind() == kind)
            .map(|d| &d.config)
    }

    /// Every bound declaration.
    pub fn declarations(&self) -> &[FilterDeclaration] {
        &self.declarations
    }

    /// Kinds waiting to be bound by the next route.
    pub fn pending_kinds(&self) -> Vec<FilterKind> {
        self.working.iter().map(FilterConfig::kind).collect()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

/// Fluent filter declaration, shared by [`FilterSet`] and the route builder.
pub trait FilterBuilder {
    fn filter_set(&mut self) -> &mut FilterSet;

    /// Allow only the listed client IPs; others are redirected to `uri`.
    fn restore<S: AsRef<str>>(&mut self, ips: &[S], uri: Option<&str>) -> &mut Self {
        let ips = ips.iter().map(|ip| ip.as_ref().trim().to_string()).collect();
        self.filter_set().set_working(FilterConfig::Restore {
            ips,
            uri: uri.map(str::to_string),
        });
        self
    }

    /// Whether the endpoint accepts traffic at all.
    fn usable(&mut self, enabled: bool) -> &mut Self {
        self.filter_set().set_working(FilterConfig::Usable(enabled));
        self
    }

    /// Require a valid CSRF token on state-changing requests.
    fn csrf(&mut self, target: Option<&str>) -> &mut Self {
        self.filter_set().set_working(FilterConfig::Csrf {
            target: target.map(str::to_string),
        });
        self
    }

    /// Accept only asynchronous requests.
    fn ajax(&mut self) -> &mut Self {
        self.filter_set().set_working(FilterConfig::Ajax);
        self
    }

    /// Restrict the allowed HTTP methods (case-insensitive).
    fn method<S: AsRef<str>>(&mut self, methods: &[S]) -> &mut Self {
        let methods = methods.iter().map(|m| m.as_ref().trim().to_lowercase()).collect();
        self.filter_set().set_working(FilterConfig::Method(methods));
        self
    }

    /// Arbitrary predicate; `false` blocks dispatch.
    fn callback<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn(&dyn RequestContext) -> bool + Send + Sync + 'static,
    {
        self.filter_set().set_working(FilterConfig::Callback(Arc::new(predicate)));
        self
    }

    /// Redirect target used when a filter blocks without a more specific one.
    fn redirect(&mut self, target: &str) -> &mut Self {
        self.filter_set().set_working(FilterConfig::Redirect(target.to_string()));
        self
    }
}

impl FilterBuilder for FilterSet {
    fn filter_set(&mut self) -> &mut FilterSet {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse() {
        assert_eq!("CSRF".parse::<FilterKind>().unwrap(), FilterKind::Csrf);
        assert_eq!(" method ".parse::<FilterKind>().unwrap(), FilterKind::Method);
        assert!(matches!(
            "throttle".parse::<FilterKind>(),
            Err(RouteError::UnknownFilterKind(name)) if name == "throttle"
        ));
    }

    #[test]
    fn test_bind_clears_working_state() {
        let mut set = FilterSet::new();
        set.method(&["POST"]).ajax();
        assert_eq!(set.pending_kinds(), vec![FilterKind::Method, FilterKind::Ajax]);

        set.bind("user/save");
        assert!(set.pending_kinds().is_empty());
        assert_eq!(set.len(), 2);

        set.bind("user/other");
        assert_eq!(set.for_route("user/other").count(), 0);
    }

    #[test]
    fn test_later_declaration_overwrites_in_place() {
        let mut set = FilterSet::new();
        set.method(&["get"]).ajax().method(&["post", "put"]);
        set.bind("user/save");

        let kinds: Vec<_> = set.for_route("user/save").map(FilterDeclaration::kind).collect();
        assert_eq!(kinds, vec![FilterKind::Method, FilterKind::Ajax]);
        assert!(matches!(
            set.get("user/save", FilterKind::Method),
            Some(FilterConfig::Method(m)) if m == &vec!["post".to_string(), "put".to_string()]
        ));

        set.redirect("/login");
        set.bind("user/save");
        set.usable(false);
        set.bind("user/save");
        assert_eq!(set.for_route("user/save").count(), 4);
    }

    #[test]
    fn test_lookups_outlive_the_route_key() {
        let mut set = FilterSet::new();
        set.ajax().redirect("/login");
        set.bind("feed/main");

        let config = {
            let key = String::from("FEED/MAIN").to_lowercase();
            set.get(&key, FilterKind::Redirect)
        };
        assert!(matches!(config, Some(FilterConfig::Redirect(target)) if target == "/login"));

        let declarations: Vec<&FilterDeclaration> = {
            let key = String::from("feed/main");
            set.for_route(&key).collect()
        };
        assert_eq!(declarations.len(), 2);
        assert!(set.get("feed/main", FilterKind::Csrf).is_none());
    }

    #[test]
    fn test_container_keeps_working_state() {
        let mut set = FilterSet::new();
        set.enter_container();
        set.ajax();
        set.bind("a/main");
        set.bind("b/main");
        set.exit_container();
        set.bind("c/main");

        assert!(set.get("a/main", FilterKind::Ajax).is_some());
        assert!(set.get("b/main", FilterKind::Ajax).is_some());
        assert!(set.get("c/main", FilterKind::Ajax).is_none());
        assert!(!set.in_container());
    }
}
