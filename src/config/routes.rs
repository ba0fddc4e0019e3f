//! Route table construction from configuration.
//!
//! ```text
//! [[routing.change_uri]]   → Router::seed       (effective table, lowest precedence)
//! [[routing.routes]]       → filters + change/uri
//! [[routing.containers]]   → Router::container
//! routing.show404          → Router::show404
//!                          → all() → finish()
//! ```

use regex::RegexBuilder;

use crate::config::schema::{AppConfig, FilterSpec, RouteSpec};
use crate::filters::{FilterBuilder, FilterKind};
use crate::routing::{RouteError, RouteResult, RouteSettings, RouteTable, Router, RouterOptions, Target};

/// Build the immutable route table described by `config`.
pub fn build_route_table(config: &AppConfig) -> RouteResult<RouteTable> {
    let routing = &config.routing;

    let open_controller = routing
        .open_controller
        .as_deref()
        .map(|raw| Target::parse(raw, &routing.default_action))
        .transpose()?;

    let url_change_chars = config
        .security
        .url_change_chars
        .iter()
        .map(|(pattern, replacement)| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map(|re| (re, replacement.clone()))
                .map_err(|e| RouteError::pattern(pattern, e.to_string()))
        })
        .collect::<RouteResult<Vec<_>>>()?;

    let settings = RouteSettings {
        default_action: routing.default_action.clone(),
        open_controller,
        show404: None,
        invalid_request_page: routing.invalid_request_page.clone(),
        request_methods_page: routing.request_methods_page.clone(),
        url_change_chars,
    };

    let mut router = Router::new(RouterOptions {
        pattern_mode: routing.pattern_mode,
        settings,
    });

    for change in &routing.change_uri {
        router.seed(&change.pattern, &change.target)?;
    }

    for route in &routing.routes {
        declare_route(&mut router, route)?;
    }

    for container in &routing.containers {
        router.container(|r| {
            for filter in &container.filters {
                declare_filter(r, filter)?;
            }
            for route in &container.routes {
                declare_route(r, route)?;
            }
            Ok(())
        })?;
    }

    if let Some(target) = &routing.show404 {
        router.show404(target)?;
    }

    router.all();
    router.finish()
}

fn declare_route(router: &mut Router, route: &RouteSpec) -> RouteResult<()> {
    for filter in &route.filters {
        declare_filter(router, filter)?;
    }
    router.change(&route.pattern)?.uri(&route.target)?;
    Ok(())
}

/// Apply one configured filter to the builder's working state.
pub fn declare_filter<B: FilterBuilder>(builder: &mut B, spec: &FilterSpec) -> RouteResult<()> {
    let kind: FilterKind = spec.kind.parse()?;

    match kind {
        FilterKind::Restore => {
            builder.restore(&spec.ips, spec.uri.as_deref());
        }
        FilterKind::Usable => {
            builder.usable(spec.enabled.unwrap_or(true));
        }
        FilterKind::Csrf => {
            builder.csrf(spec.uri.as_deref().or(spec.target.as_deref()));
        }
        FilterKind::Ajax => {
            builder.ajax();
        }
        FilterKind::Method => {
            builder.method(&spec.methods);
        }
        FilterKind::Redirect => {
            let target = spec.target.as_deref().ok_or_else(|| RouteError::InvalidFilter {
                kind,
                reason: "missing target".to_string(),
            })?;
            builder.redirect(target);
        }
        FilterKind::Callback => {
            return Err(RouteError::InvalidFilter {
                kind,
                reason: "callbacks can only be declared in code".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_config;
    use crate::context::{RequestLocale, StaticRequest};
    use crate::filters::FilterOutcome;
    use crate::routing::LookupEnv;
    use crate::store::MemoryStore;

    const CONFIG: &str = r#"
        [routing]
        open_controller = "home"
        show404 = "errors/notfound"
        request_methods_page = "/bad-request"

        [[routing.change_uri]]
        pattern = "about"
        target = "pages/about"

        [[routing.routes]]
        pattern = "user/:id/:action"
        target = "profile/show"
        filters = [{ kind = "method", methods = ["post"] }]

        [[routing.routes]]
        pattern = "product/[products:slug]"
        target = "product/view"

        [[routing.containers]]
        filters = [{ kind = "ajax" }]
        routes = [
            { pattern = "api/items", target = "api/items" },
            { pattern = "api/tags", target = "api/tags" },
        ]

        [security.url_change_chars]
        "<script>" = ""

        [store.tables]
        products = [{ slug = "red-shoe" }]
    "#;

    #[test]
    fn test_build_from_config() {
        let config = parse_config(CONFIG).unwrap();
        let table = build_route_table(&config).unwrap();
        let store = MemoryStore::from_tables(&config.store.tables);
        let locale = RequestLocale::new(config.routing.default_locale.as_str());
        let env = LookupEnv::new(&store, &locale);

        assert_eq!(
            table.keys(),
            vec!["user/:id/:action", "product/[products:slug]", "api/items", "api/tags", "404", "about"]
        );

        assert_eq!(table.resolve("about", &env).unwrap().resolved_target, "pages/about");
        assert_eq!(table.resolve("/", &env).unwrap().resolved_target, "home/main");
        assert_eq!(
            table.resolve("product/red-shoe", &env).unwrap().resolved_target,
            "product/view/red-shoe"
        );
        assert!(table.resolve("product/blue-shoe", &env).unwrap().used_fallback_404);
        assert_eq!(
            table.resolve("<script>about", &env).unwrap().resolved_target,
            "pages/about"
        );
    }

    #[test]
    fn test_configured_filters_apply() {
        let config = parse_config(CONFIG).unwrap();
        let table = build_route_table(&config).unwrap();
        let store = MemoryStore::new();
        let locale = RequestLocale::new("en");
        let env = LookupEnv::new(&store, &locale);

        let user = table.resolve("user/7/edit", &env).unwrap();
        assert_eq!(
            table.apply_filters(&user, &StaticRequest::new("GET", "/user/7/edit")),
            FilterOutcome::Redirect {
                kind: FilterKind::Method,
                target: "/bad-request".into()
            }
        );

        let items = table.resolve("api/tags", &env).unwrap();
        assert!(table
            .apply_filters(&items, &StaticRequest::new("GET", "/api/tags"))
            .is_blocked());
        assert_eq!(
            table.apply_filters(&items, &StaticRequest::new("GET", "/api/tags").with_ajax(true)),
            FilterOutcome::Continue
        );

        let about = table.resolve("about", &env).unwrap();
        assert_eq!(
            table.apply_filters(&about, &StaticRequest::new("DELETE", "/about")),
            FilterOutcome::Continue
        );
    }

    #[test]
    fn test_callback_rejected_from_config() {
        let mut set = crate::filters::FilterSet::new();
        let spec = FilterSpec {
            kind: "callback".into(),
            ..FilterSpec::default()
        };
        assert!(matches!(
            declare_filter(&mut set, &spec),
            Err(RouteError::InvalidFilter { kind: FilterKind::Callback, .. })
        ));
    }
}
