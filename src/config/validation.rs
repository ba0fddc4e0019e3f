//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check every declared pattern against the configured syntax
//! - Check filter declarations (known kinds, valid IPs and methods)
//! - Validate addresses and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use regex::RegexBuilder;

use crate::config::schema::{AppConfig, FilterSpec, RouteSpec};
use crate::filters::FilterKind;
use crate::routing::PatternCompiler;

const METHODS: [&str; 9] = ["get", "post", "put", "patch", "delete", "head", "options", "connect", "trace"];
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate `config`, collecting every error.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("server.bind_address", "must be a socket address"));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be greater than 0"));
    }

    let obs = &config.observability;
    if !LOG_LEVELS.contains(&obs.log_level.to_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", obs.log_level),
        ));
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("observability.metrics_address", "must be a socket address"));
    }

    let routing = &config.routing;
    let action = routing.default_action.trim();
    if action.is_empty() || action.contains('/') {
        errors.push(ValidationError::new("routing.default_action", "must be a single non-empty name"));
    }
    if routing.invalid_request_page.trim().is_empty() {
        errors.push(ValidationError::new("routing.invalid_request_page", "must not be empty"));
    }
    if routing.default_locale.trim().is_empty() {
        errors.push(ValidationError::new("routing.default_locale", "must not be empty"));
    }
    for (field, value) in [
        ("routing.open_controller", &routing.open_controller),
        ("routing.show404", &routing.show404),
    ] {
        if value.as_deref().is_some_and(|t| t.trim().trim_matches('/').is_empty()) {
            errors.push(ValidationError::new(field, "must name a controller"));
        }
    }

    let compiler = PatternCompiler::new(routing.pattern_mode);

    for (i, change) in routing.change_uri.iter().enumerate() {
        let field = format!("routing.change_uri[{i}]");
        check_pattern(&compiler, &field, &change.pattern, &mut errors);
        check_target(&field, &change.target, &mut errors);
    }

    for (i, route) in routing.routes.iter().enumerate() {
        check_route(&compiler, &format!("routing.routes[{i}]"), route, &mut errors);
    }

    for (c, container) in routing.containers.iter().enumerate() {
        let field = format!("routing.containers[{c}]");
        if container.routes.is_empty() {
            errors.push(ValidationError::new(format!("{field}.routes"), "container declares no routes"));
        }
        for (f, filter) in container.filters.iter().enumerate() {
            check_filter(&format!("{field}.filters[{f}]"), filter, &mut errors);
        }
        for (i, route) in container.routes.iter().enumerate() {
            check_route(&compiler, &format!("{field}.routes[{i}]"), route, &mut errors);
        }
    }

    for pattern in config.security.url_change_chars.keys() {
        if let Err(e) = RegexBuilder::new(pattern).case_insensitive(true).build() {
            errors.push(ValidationError::new(
                format!("security.url_change_chars.{pattern}"),
                e.to_string(),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_route(compiler: &PatternCompiler, field: &str, route: &RouteSpec, errors: &mut Vec<ValidationError>) {
    check_pattern(compiler, field, &route.pattern, errors);
    check_target(field, &route.target, errors);
    for (f, filter) in route.filters.iter().enumerate() {
        check_filter(&format!("{field}.filters[{f}]"), filter, errors);
    }
}

fn check_pattern(compiler: &PatternCompiler, field: &str, pattern: &str, errors: &mut Vec<ValidationError>) {
    if pattern.trim().trim_matches('/').is_empty() {
        errors.push(ValidationError::new(format!("{field}.pattern"), "must not be empty or root"));
        return;
    }
    if let Err(e) = compiler.check(pattern) {
        errors.push(ValidationError::new(format!("{field}.pattern"), e.to_string()));
    }
}

fn check_target(field: &str, target: &str, errors: &mut Vec<ValidationError>) {
    if target.trim().trim_matches('/').is_empty() {
        errors.push(ValidationError::new(format!("{field}.target"), "must not be empty"));
    }
}

fn check_filter(field: &str, filter: &FilterSpec, errors: &mut Vec<ValidationError>) {
    let kind = match filter.kind.parse::<FilterKind>() {
        Ok(kind) => kind,
        Err(e) => {
            errors.push(ValidationError::new(format!("{field}.kind"), e.to_string()));
            return;
        }
    };

    match kind {
        FilterKind::Restore => {
            if filter.ips.is_empty() {
                errors.push(ValidationError::new(format!("{field}.ips"), "restore needs at least one IP"));
            }
            for ip in &filter.ips {
                if ip.trim().parse::<IpAddr>().is_err() {
                    errors.push(ValidationError::new(format!("{field}.ips"), format!("invalid IP '{ip}'")));
                }
            }
        }
        FilterKind::Method => {
            if filter.methods.is_empty() {
                errors.push(ValidationError::new(format!("{field}.methods"), "method needs at least one method"));
            }
            for method in &filter.methods {
                if !METHODS.contains(&method.trim().to_lowercase().as_str()) {
                    errors.push(ValidationError::new(
                        format!("{field}.methods"),
                        format!("unknown method '{method}'"),
                    ));
                }
            }
        }
        FilterKind::Redirect => {
            if !filter.target.as_deref().is_some_and(|t| !t.trim().is_empty()) {
                errors.push(ValidationError::new(format!("{field}.target"), "redirect needs a target"));
            }
        }
        FilterKind::Callback => {
            errors.push(ValidationError::new(
                format!("{field}.kind"),
                "callback filters can only be declared in code",
            ));
        }
        FilterKind::Usable | FilterKind::Csrf | FilterKind::Ajax => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ContainerSpec, RouteSpec};

    fn route(pattern: &str, target: &str, filters: Vec<FilterSpec>) -> RouteSpec {
        RouteSpec {
            pattern: pattern.into(),
            target: target.into(),
            filters,
        }
    }

    fn filter(kind: &str) -> FilterSpec {
        FilterSpec {
            kind: kind.into(),
            ..FilterSpec::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = AppConfig::default();
        config.server.bind_address = "not-an-address".into();
        config.routing.routes = vec![
            route("/", "home", vec![]),
            route("user/:", "user/show", vec![filter("throttle")]),
        ];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "server.bind_address",
                "routing.routes[0].pattern",
                "routing.routes[1].pattern",
                "routing.routes[1].filters[0].kind",
            ]
        );
    }

    #[test]
    fn test_filter_payloads_checked() {
        let mut config = AppConfig::default();
        let mut restore = filter("restore");
        restore.ips = vec!["10.0.0.1".into(), "10.0.0.999".into()];
        let mut method = filter("method");
        method.methods = vec!["POST".into(), "FETCH".into()];

        config.routing.containers = vec![ContainerSpec {
            filters: vec![restore, method, filter("redirect"), filter("callback")],
            routes: vec![route("admin", "admin/main", vec![])],
        }];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors[0].message.contains("10.0.0.999"));
        assert!(errors[1].message.contains("FETCH"));
        assert_eq!(errors[2].field, "routing.containers[0].filters[2].target");
        assert!(errors[3].message.contains("callback"));
    }

    #[test]
    fn test_url_change_chars_must_compile() {
        let mut config = AppConfig::default();
        config.security.url_change_chars.insert("(unclosed".into(), "".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].field.starts_with("security.url_change_chars"));
    }
}
