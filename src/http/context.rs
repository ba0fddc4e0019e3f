//! Adapts an axum request to the [`RequestContext`] filters evaluate.

use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, Request};
use percent_encoding::percent_decode_str;

use crate::context::RequestContext;

/// Header carrying the submitted CSRF token.
pub const CSRF_HEADER: &str = "x-csrf-token";
/// Cookie carrying the session's CSRF token.
pub const CSRF_COOKIE: &str = "csrf_token";

/// Request facts captured before resolution moves to a blocking task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequestContext {
    method: String,
    path: String,
    client_ip: Option<IpAddr>,
    ajax: bool,
    csrf_valid: bool,
}

impl HttpRequestContext {
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let headers = request.headers();
        let client_ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Self {
            method: request.method().as_str().to_string(),
            path: decode_path(request.uri().path()),
            client_ip,
            ajax: is_xhr(headers),
            csrf_valid: csrf_matches(headers),
        }
    }
}

/// Percent-decode each segment. A segment that is not valid UTF-8 once
/// decoded, or that would decode to a `/`, is kept as sent.
fn decode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| match percent_decode_str(segment).decode_utf8() {
            Ok(decoded) if !decoded.contains('/') => decoded.into_owned(),
            _ => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_xhr(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
}

/// Double-submit check: the header token must equal the cookie token.
fn csrf_matches(headers: &HeaderMap) -> bool {
    let Some(submitted) = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    if submitted.is_empty() {
        return false;
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .any(|(name, value)| name == CSRF_COOKIE && value == submitted)
}

impl RequestContext for HttpRequestContext {
    fn method(&self) -> &str {
        &self.method
    }

    fn active_uri(&self) -> &str {
        &self.path
    }

    fn client_ip(&self) -> Option<IpAddr> {
        self.client_ip
    }

    fn is_ajax(&self) -> bool {
        self.ajax
    }

    fn csrf_token_valid(&self) -> bool {
        self.csrf_valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_captures_request_facts() {
        let mut request = Request::builder()
            .method("POST")
            .uri("/user/save?x=1")
            .header("X-Requested-With", "xmlhttprequest")
            .header(CSRF_HEADER, "tok")
            .header(header::COOKIE, "theme=dark; csrf_token=tok")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo("10.0.0.5:4000".parse::<SocketAddr>().unwrap()));

        let context = HttpRequestContext::from_request(&request);
        assert_eq!(context.method(), "POST");
        assert_eq!(context.active_uri(), "/user/save");
        assert_eq!(context.client_ip(), Some("10.0.0.5".parse().unwrap()));
        assert!(context.is_ajax());
        assert!(context.csrf_token_valid());
    }

    #[test]
    fn test_path_is_percent_decoded_per_segment() {
        let request = Request::builder()
            .uri("/product/%C3%A7anta/%3Cscript%3E")
            .body(Body::empty())
            .unwrap();
        assert_eq!(HttpRequestContext::from_request(&request).active_uri(), "/product/çanta/<script>");

        assert_eq!(decode_path("/docs/a%2Fb"), "/docs/a%2Fb");
        assert_eq!(decode_path("/bad/%FF%FE"), "/bad/%FF%FE");
        assert_eq!(decode_path("/plain/path"), "/plain/path");
    }

    #[test]
    fn test_csrf_mismatch() {
        let request = Request::builder()
            .header(CSRF_HEADER, "forged")
            .header(header::COOKIE, "csrf_token=real")
            .body(Body::empty())
            .unwrap();
        let context = HttpRequestContext::from_request(&request);
        assert!(!context.csrf_token_valid());
        assert_eq!(context.client_ip(), None);

        let missing = Request::builder()
            .header(header::COOKIE, "csrf_token=real")
            .body(Body::empty())
            .unwrap();
        assert!(!HttpRequestContext::from_request(&missing).csrf_token_valid());
    }
}
