//! Route declaration session.
//!
//! # Lifecycle
//! ```text
//! Router::new(options)
//!     → [filter builder calls] → change(pattern) → uri(target)   (repeat)
//!     → container(|r| ...)                                       (optional)
//!     → all()            merge pending into effective
//!     → finish()         immutable RouteTable
//! ```
//!
//! `finish()` is the mandatory terminal call. Routes recorded by `uri()` but
//! never merged by `all()` do not reach the table; their paths fall through
//! to the 404 fallback and the loss is logged.

use std::mem;

use crate::filters::{FilterBuilder, FilterDispatcher, FilterSet};

use super::dynamic;
use super::pattern::{PatternCompiler, PatternMode};
use super::table::{DynamicRoute, RouteEntry, RouteSettings, RouteTable};
use super::types::{RouteResult, Target};

/// Pattern of the route registered by [`Router::show404`]. Valid in both
/// pattern syntaxes.
pub const NOT_FOUND_PATTERN: &str = "404";

/// Everything a declaration session is configured with.
#[derive(Debug, Clone, Default)]
pub struct RouterOptions {
    pub pattern_mode: PatternMode,
    pub settings: RouteSettings,
}

/// Builder for a [`RouteTable`].
#[must_use = "call finish() to obtain the route table"]
pub struct Router {
    compiler: PatternCompiler,
    settings: RouteSettings,
    filters: FilterSet,
    dispatcher: FilterDispatcher,
    staged: Option<String>,
    pending: Vec<RouteEntry>,
    effective: Vec<RouteEntry>,
    finished: bool,
}

impl Router {
    pub fn new(options: RouterOptions) -> Self {
        Self {
            compiler: PatternCompiler::new(options.pattern_mode),
            settings: options.settings,
            filters: FilterSet::new(),
            dispatcher: FilterDispatcher::new(),
            staged: None,
            pending: Vec::new(),
            effective: Vec::new(),
            finished: false,
        }
    }

    /// Use a custom pattern compiler for the rest of the session.
    pub fn with_compiler(mut self, compiler: PatternCompiler) -> Self {
        self.compiler = compiler;
        self
    }

    /// Handler registration table used to run filters.
    pub fn dispatcher_mut(&mut self) -> &mut FilterDispatcher {
        &mut self.dispatcher
    }

    /// Add a configured static route directly to the effective table.
    ///
    /// Seeded routes sit behind anything `all()` merges later.
    pub fn seed(&mut self, pattern: &str, target: &str) -> RouteResult<&mut Self> {
        let target = Target::parse(target, &self.settings.default_action)?;
        if let Some(entry) = self.entry(pattern.trim().trim_matches('/'), target)? {
            upsert(&mut self.effective, entry);
        }
        Ok(self)
    }

    /// Stage `pattern` for the next [`Router::uri`] call.
    pub fn change(&mut self, pattern: &str) -> RouteResult<&mut Self> {
        let pattern = pattern.trim().trim_matches('/');
        self.compiler.check(pattern)?;
        if dynamic::has_markers(pattern) {
            dynamic::scan(pattern)?;
        }

        if let Some(previous) = self.staged.replace(pattern.to_string()) {
            tracing::warn!(previous = %previous, pattern = %pattern, "Staged pattern replaced before uri()");
        }
        Ok(self)
    }

    /// Record the staged pattern as a route to `target`.
    ///
    /// Working filters are bound to the target's route key even when nothing
    /// is staged.
    pub fn uri(&mut self, target: &str) -> RouteResult<&mut Self> {
        let target = Target::parse(target, &self.settings.default_action)?;
        self.filters.bind(&target.route_key());

        let Some(pattern) = self.staged.take() else {
            tracing::debug!(target = %target, "uri() without a staged pattern");
            return Ok(self);
        };

        match self.entry(&pattern, target)? {
            Some(entry) => {
                tracing::debug!(pattern = %entry.key(), target = %entry.target(), "Route recorded");
                upsert(&mut self.pending, entry);
            }
            None => tracing::info!(pattern = %pattern, "Root-equivalent route ignored"),
        }
        Ok(self)
    }

    /// Merge pending routes into the effective table. Pending entries come
    /// first and replace effective entries with the same key.
    pub fn all(&mut self) -> &mut Self {
        if let Some(staged) = self.staged.take() {
            tracing::warn!(pattern = %staged, "Staged pattern never recorded by uri()");
        }

        let pending = mem::take(&mut self.pending);
        if pending.is_empty() {
            return self;
        }

        let keys: Vec<String> = pending.iter().map(|p| p.key().to_string()).collect();
        let mut merged = pending;
        merged.extend(
            mem::take(&mut self.effective)
                .into_iter()
                .filter(|existing| !keys.iter().any(|k| k == existing.key())),
        );
        self.effective = merged;

        tracing::info!(merged = keys.len(), routes = self.effective.len(), "Routes merged");
        self
    }

    /// Declare the fallback target used when nothing matches, and route the
    /// `404` path to it.
    pub fn show404(&mut self, target: &str) -> RouteResult<&mut Self> {
        self.settings.show404 = Some(Target::parse(target, &self.settings.default_action)?);
        self.change(NOT_FOUND_PATTERN)?.uri(target)
    }

    /// Declare routes that share the filters declared inside `declare`.
    pub fn container<F>(&mut self, declare: F) -> RouteResult<&mut Self>
    where
        F: FnOnce(&mut Self) -> RouteResult<()>,
    {
        self.filters.enter_container();
        let result = declare(self);
        self.filters.exit_container();
        result.map(|()| self)
    }

    /// Close the session and build the table.
    pub fn finish(mut self) -> RouteResult<RouteTable> {
        self.finished = true;

        if !self.pending.is_empty() {
            tracing::error!(
                routes = ?self.pending.iter().map(RouteEntry::key).collect::<Vec<_>>(),
                "Routes declared but never merged by all(); they resolve to the 404 fallback"
            );
        }
        if let Some(staged) = &self.staged {
            tracing::warn!(pattern = %staged, "Staged pattern never recorded by uri()");
        }

        let dispatcher = mem::take(&mut self.dispatcher)
            .with_request_methods_page(self.settings.request_methods_page.clone())
            .with_invalid_request_page(self.settings.invalid_request_page.clone());
        dispatcher.verify(&self.filters)?;

        let table = RouteTable {
            entries: mem::take(&mut self.effective),
            filters: mem::take(&mut self.filters),
            dispatcher,
            compiler: self.compiler.clone(),
            settings: mem::take(&mut self.settings),
        };

        tracing::info!(routes = table.len(), filters = table.filters.len(), "Route table built");
        Ok(table)
    }

    fn entry(&self, pattern: &str, target: Target) -> RouteResult<Option<RouteEntry>> {
        if dynamic::has_markers(pattern) {
            let markers = dynamic::scan(pattern)?;
            return Ok(Some(RouteEntry::Dynamic(DynamicRoute {
                key: pattern.to_string(),
                markers,
                target,
            })));
        }
        Ok(self.compiler.compile(pattern, &target)?.map(RouteEntry::Static))
    }
}

fn upsert(entries: &mut Vec<RouteEntry>, entry: RouteEntry) {
    match entries.iter_mut().find(|e| e.key() == entry.key()) {
        Some(slot) => *slot = entry,
        None => entries.push(entry),
    }
}

impl FilterBuilder for Router {
    fn filter_set(&mut self) -> &mut FilterSet {
        &mut self.filters
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        if !self.finished && (!self.pending.is_empty() || self.staged.is_some()) {
            tracing::error!(
                pending = self.pending.len(),
                staged = ?self.staged,
                "Router dropped without finish(); declared routes were never published"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{LocaleStore, RequestLocale, StaticRequest};
    use crate::filters::{FilterKind, FilterOutcome};
    use crate::routing::table::LookupEnv;
    use crate::routing::RouteError;
    use crate::store::MemoryStore;
    use std::collections::HashMap;

    fn router() -> Router {
        Router::new(RouterOptions::default())
    }

    fn resolve(table: &RouteTable, path: &str) -> crate::routing::MatchResult {
        let store = MemoryStore::new();
        let locale = RequestLocale::new("en");
        table.resolve(path, &LookupEnv::new(&store, &locale)).unwrap()
    }

    #[test]
    fn test_named_marker_round_trip() {
        let mut r = router();
        r.change("/user/:id/:action").unwrap().uri("profile/show").unwrap();
        r.all();
        let table = r.finish().unwrap();

        let result = resolve(&table, "/user/42/edit");
        assert_eq!(result.captured_parameters, vec!["42", "edit"]);
        assert_eq!(result.resolved_target, "profile/show/42/edit");
        assert_eq!(result.route_key, "profile/show");
        assert!(!result.used_fallback_404);
    }

    #[test]
    fn test_first_match_wins() {
        let mut r = router();
        r.change("user/:id").unwrap().uri("first/page").unwrap();
        r.change("user/:numeric").unwrap().uri("second/page").unwrap();
        r.all();
        let table = r.finish().unwrap();

        assert_eq!(resolve(&table, "user/5").resolved_target, "first/page/5");
    }

    #[test]
    fn test_root_pattern_rejected() {
        let mut r = router();
        r.change("/").unwrap().uri("home").unwrap();
        r.all();
        let table = r.finish().unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_default_action_appended() {
        let mut r = router();
        r.change("about").unwrap().uri("pages").unwrap();
        r.all();
        let table = r.finish().unwrap();
        assert_eq!(resolve(&table, "about").resolved_target, "pages/main");
    }

    #[test]
    fn test_dynamic_segment_miss_is_404() {
        let mut r = router();
        r.change("product/[products:slug]").unwrap().uri("product/view").unwrap();
        r.show404("errors/notfound").unwrap();
        r.all();
        let table = r.finish().unwrap();

        let store = MemoryStore::new();
        store.insert_row("products", HashMap::from([("slug".to_string(), "red-shoe".to_string())]));
        let locale = RequestLocale::new("en");
        let env = LookupEnv::new(&store, &locale);

        let miss = table.resolve("product/unknown", &env).unwrap();
        assert!(miss.used_fallback_404);
        assert_eq!(miss.resolved_target, "errors/notfound");

        let hit = table.resolve("product/red-shoe", &env).unwrap();
        assert_eq!(hit.resolved_target, "product/view/red-shoe");
        assert_eq!(hit.matched_pattern.as_deref(), Some("product/[products:slug]"));
    }

    #[test]
    fn test_dynamic_segment_switches_locale() {
        let mut r = router();
        r.change("product/[products:slug,json]").unwrap().uri("product/view").unwrap();
        r.all();
        let table = r.finish().unwrap();

        let store = MemoryStore::new();
        store.insert_row(
            "products",
            HashMap::from([(
                "slug".to_string(),
                r#"{"en":"red-shoe","tr":"kirmizi-ayakkabi"}"#.to_string(),
            )]),
        );
        let locale = RequestLocale::new("en");
        let result = table
            .resolve("product/kirmizi-ayakkabi", &LookupEnv::new(&store, &locale))
            .unwrap();

        assert_eq!(result.resolved_target, "product/view/kirmizi-ayakkabi");
        assert_eq!(result.locale, "tr");
        assert_eq!(locale.current_locale(), "tr");
    }

    #[test]
    fn test_non_ascii_projection_with_anchor() {
        let mut r = router();
        r.change("[pages:slug,json]/{end}").unwrap().uri("pages/contact").unwrap();
        r.show404("errors/notfound").unwrap();
        r.all();
        let table = r.finish().unwrap();

        let store = MemoryStore::new();
        store.insert_row(
            "pages",
            HashMap::from([(
                "slug".to_string(),
                r#"{"en":"contact-us","tr":"İletişim"}"#.to_string(),
            )]),
        );

        let locale = RequestLocale::new("tr");
        let env = LookupEnv::new(&store, &locale);
        assert!(table.resolve("contact", &env).unwrap().used_fallback_404);

        let result = table.resolve("İletişim", &env).unwrap();
        assert!(!result.used_fallback_404);
        assert_eq!(result.resolved_target, "pages/contact");
    }

    #[test]
    fn test_method_filter_short_circuits() {
        let mut r = router();
        r.method(&["post"]).redirect("/login");
        r.change("user/save").unwrap().uri("user/save").unwrap();
        r.all();
        let table = r.finish().unwrap();

        let result = resolve(&table, "user/save");
        let outcome = table.apply_filters(&result, &StaticRequest::new("GET", "/user/save"));
        assert_eq!(
            outcome,
            FilterOutcome::Redirect {
                kind: FilterKind::Method,
                target: "/login".into()
            }
        );
        assert_eq!(
            table.apply_filters(&result, &StaticRequest::new("POST", "/user/save")),
            FilterOutcome::Continue
        );
    }

    #[test]
    fn test_container_scope_isolation() {
        let mut r = router();
        r.container(|r| {
            r.ajax();
            r.change("a")?.uri("a/main")?;
            r.change("b")?.uri("b/main")?;
            Ok(())
        })
        .unwrap();
        r.change("c").unwrap().uri("c/main").unwrap();
        r.all();
        let table = r.finish().unwrap();

        assert!(table.filters().get("a/main", FilterKind::Ajax).is_some());
        assert!(table.filters().get("b/main", FilterKind::Ajax).is_some());
        assert!(table.filters().get("c/main", FilterKind::Ajax).is_none());
    }

    #[test]
    fn test_all_is_idempotent() {
        let mut r = router();
        r.seed("home", "static/page").unwrap();
        r.change("home").unwrap().uri("declared/page").unwrap();
        r.change("blog/:id").unwrap().uri("blog/show").unwrap();
        r.all();
        let once: Vec<String> = r.effective.iter().map(|e| e.key().to_string()).collect();
        r.all();
        let twice: Vec<String> = r.effective.iter().map(|e| e.key().to_string()).collect();
        assert_eq!(once, twice);
        assert_eq!(once, vec!["home", "blog/:id"]);

        let table = r.finish().unwrap();
        assert_eq!(resolve(&table, "home").resolved_target, "declared/page");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let mut r = router();
        r.change("post/:seo").unwrap().uri("blog/read").unwrap();
        r.all();
        let table = r.finish().unwrap();
        assert_eq!(resolve(&table, "post/hello-world"), resolve(&table, "post/hello-world"));
    }

    #[test]
    fn test_unmerged_routes_fall_through() {
        let mut r = router();
        r.change("late").unwrap().uri("late/page").unwrap();
        let table = r.finish().unwrap();

        let result = resolve(&table, "late");
        assert!(result.invalid_request);
        assert_eq!(result.resolved_target, crate::filters::INVALID_REQUEST_PAGE);
    }

    #[test]
    fn test_show404_registers_route() {
        let mut r = router();
        r.show404("errors/notfound").unwrap();
        r.all();
        let table = r.finish().unwrap();

        let direct = resolve(&table, "404");
        assert_eq!(direct.resolved_target, "errors/notfound");
        assert!(!direct.used_fallback_404);
        assert!(resolve(&table, "missing").used_fallback_404);
    }

    #[test]
    fn test_open_controller() {
        let options = RouterOptions {
            settings: RouteSettings {
                open_controller: Some(Target::parse("home", "main").unwrap()),
                ..RouteSettings::default()
            },
            ..RouterOptions::default()
        };
        let mut r = Router::new(options);
        r.all();
        let table = r.finish().unwrap();

        assert_eq!(resolve(&table, "/").resolved_target, "home/main");
        assert_eq!(resolve(&table, "en").resolved_target, "home/main");
    }

    #[test]
    fn test_malformed_pattern_fails_fast() {
        let mut r = router();
        assert!(matches!(r.change("user/:"), Err(RouteError::InvalidPattern { .. })));
        assert!(matches!(
            r.change("shop/[products:slug"),
            Err(RouteError::InvalidPattern { .. })
        ));
        r.all();
        let _ = r.finish().unwrap();
    }

    #[test]
    fn test_unregistered_handler_fails_finish() {
        let mut r = router();
        *r.dispatcher_mut() = FilterDispatcher::empty();
        r.csrf(None);
        r.change("form").unwrap().uri("form/send").unwrap();
        r.all();
        assert!(matches!(r.finish(), Err(RouteError::UnknownFilterKind(kind)) if kind == "csrf"));
    }
}
