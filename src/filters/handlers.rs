//! Built-in filter handlers, one per kind.

use std::net::IpAddr;

use crate::context::RequestContext;

use super::set::FilterConfig;

/// Result of evaluating one filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    /// Stop dispatch; `redirect` is the kind-specific target, if any.
    Block { redirect: Option<String> },
}

impl Verdict {
    fn block(redirect: Option<&String>) -> Self {
        Verdict::Block {
            redirect: redirect.cloned(),
        }
    }
}

/// Evaluates the declaration of one filter kind.
pub trait FilterHandler: Send + Sync {
    fn evaluate(&self, config: &FilterConfig, request: &dyn RequestContext) -> Verdict;
}

/// Client IP allow-list.
#[derive(Debug, Default)]
pub struct RestoreFilter;

impl FilterHandler for RestoreFilter {
    fn evaluate(&self, config: &FilterConfig, request: &dyn RequestContext) -> Verdict {
        let FilterConfig::Restore { ips, uri } = config else {
            return Verdict::Continue;
        };

        let allowed = request
            .client_ip()
            .is_some_and(|ip| ips.iter().any(|listed| listed.parse::<IpAddr>().is_ok_and(|l| l == ip)));

        if allowed {
            Verdict::Continue
        } else {
            Verdict::block(uri.as_ref())
        }
    }
}

/// `usable(false)` closes the endpoint.
#[derive(Debug, Default)]
pub struct UsableFilter;

impl FilterHandler for UsableFilter {
    fn evaluate(&self, config: &FilterConfig, _request: &dyn RequestContext) -> Verdict {
        match config {
            FilterConfig::Usable(false) => Verdict::block(None),
            _ => Verdict::Continue,
        }
    }
}

/// CSRF token check on state-changing methods.
#[derive(Debug, Default)]
pub struct CsrfFilter;

impl CsrfFilter {
    const STATE_CHANGING: [&'static str; 4] = ["post", "put", "patch", "delete"];
}

impl FilterHandler for CsrfFilter {
    fn evaluate(&self, config: &FilterConfig, request: &dyn RequestContext) -> Verdict {
        let FilterConfig::Csrf { target } = config else {
            return Verdict::Continue;
        };

        let method = request.method().to_lowercase();
        if Self::STATE_CHANGING.contains(&method.as_str()) && !request.csrf_token_valid() {
            Verdict::block(target.as_ref())
        } else {
            Verdict::Continue
        }
    }
}

/// Only asynchronous requests.
#[derive(Debug, Default)]
pub struct AjaxFilter;

impl FilterHandler for AjaxFilter {
    fn evaluate(&self, _config: &FilterConfig, request: &dyn RequestContext) -> Verdict {
        if request.is_ajax() {
            Verdict::Continue
        } else {
            Verdict::block(None)
        }
    }
}

#[derive(Debug, Default)]
pub struct CallbackFilter;

impl FilterHandler for CallbackFilter {
    fn evaluate(&self, config: &FilterConfig, request: &dyn RequestContext) -> Verdict {
        match config {
            FilterConfig::Callback(predicate) if !predicate(request) => Verdict::block(None),
            _ => Verdict::Continue,
        }
    }
}

/// Allowed HTTP methods.
#[derive(Debug, Default)]
pub struct MethodFilter;

impl FilterHandler for MethodFilter {
    fn evaluate(&self, config: &FilterConfig, request: &dyn RequestContext) -> Verdict {
        let FilterConfig::Method(methods) = config else {
            return Verdict::Continue;
        };

        let current = request.method();
        if methods.iter().any(|m| m.eq_ignore_ascii_case(current)) {
            Verdict::Continue
        } else {
            Verdict::block(None)
        }
    }
}

/// Carries the route's general redirect target; never blocks.
#[derive(Debug, Default)]
pub struct RedirectFilter;

impl FilterHandler for RedirectFilter {
    fn evaluate(&self, _config: &FilterConfig, _request: &dyn RequestContext) -> Verdict {
        Verdict::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StaticRequest;
    use std::sync::Arc;

    #[test]
    fn test_restore() {
        let config = FilterConfig::Restore {
            ips: vec!["10.0.0.1".into(), "::1".into()],
            uri: Some("/maintenance".into()),
        };
        let inside = StaticRequest::new("GET", "/admin").with_ip("10.0.0.1".parse().unwrap());
        let v6 = StaticRequest::new("GET", "/admin").with_ip("::1".parse().unwrap());
        let outside = StaticRequest::new("GET", "/admin").with_ip("10.0.0.2".parse().unwrap());
        let unknown = StaticRequest::new("GET", "/admin");

        assert_eq!(RestoreFilter.evaluate(&config, &inside), Verdict::Continue);
        assert_eq!(RestoreFilter.evaluate(&config, &v6), Verdict::Continue);
        assert_eq!(
            RestoreFilter.evaluate(&config, &outside),
            Verdict::Block { redirect: Some("/maintenance".into()) }
        );
        assert!(matches!(RestoreFilter.evaluate(&config, &unknown), Verdict::Block { .. }));
    }

    #[test]
    fn test_csrf_only_checks_state_changing_methods() {
        let config = FilterConfig::Csrf { target: None };
        let get = StaticRequest::new("GET", "/form");
        let post = StaticRequest::new("POST", "/form");
        let signed = StaticRequest::new("post", "/form").with_csrf(true);

        assert_eq!(CsrfFilter.evaluate(&config, &get), Verdict::Continue);
        assert_eq!(CsrfFilter.evaluate(&config, &post), Verdict::Block { redirect: None });
        assert_eq!(CsrfFilter.evaluate(&config, &signed), Verdict::Continue);
    }

    #[test]
    fn test_method_is_case_insensitive() {
        let config = FilterConfig::Method(vec!["post".into()]);
        assert_eq!(MethodFilter.evaluate(&config, &StaticRequest::new("POST", "/")), Verdict::Continue);
        assert!(matches!(
            MethodFilter.evaluate(&config, &StaticRequest::new("GET", "/")),
            Verdict::Block { .. }
        ));
    }

    #[test]
    fn test_ajax_usable_callback() {
        let request = StaticRequest::new("GET", "/");
        assert!(matches!(AjaxFilter.evaluate(&FilterConfig::Ajax, &request), Verdict::Block { .. }));
        assert_eq!(
            AjaxFilter.evaluate(&FilterConfig::Ajax, &request.clone().with_ajax(true)),
            Verdict::Continue
        );

        assert_eq!(UsableFilter.evaluate(&FilterConfig::Usable(true), &request), Verdict::Continue);
        assert!(matches!(UsableFilter.evaluate(&FilterConfig::Usable(false), &request), Verdict::Block { .. }));

        let deny = FilterConfig::Callback(Arc::new(|req: &dyn RequestContext| req.method() == "PUT"));
        assert!(matches!(CallbackFilter.evaluate(&deny, &request), Verdict::Block { .. }));
        assert_eq!(RedirectFilter.evaluate(&FilterConfig::Redirect("/x".into()), &request), Verdict::Continue);
    }
}
