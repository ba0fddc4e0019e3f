//! HTTP request capability consumed by filters.

use std::net::IpAddr;

/// What filters may ask about the request being dispatched.
pub trait RequestContext: Send + Sync {
    /// Request method, as sent (e.g. `GET`).
    fn method(&self) -> &str;

    /// Active request path.
    fn active_uri(&self) -> &str;

    /// Client address, if known.
    fn client_ip(&self) -> Option<IpAddr>;

    /// True for asynchronous (XHR-style) requests.
    fn is_ajax(&self) -> bool;

    /// True when the request carries a CSRF token matching the session's.
    fn csrf_token_valid(&self) -> bool;
}

/// A fixed request description, used by the CLI and in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticRequest {
    pub method: String,
    pub uri: String,
    pub ip: Option<IpAddr>,
    pub ajax: bool,
    pub csrf_valid: bool,
}

impl StaticRequest {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            ip: None,
            ajax: false,
            csrf_valid: false,
        }
    }

    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    pub fn with_ajax(mut self, ajax: bool) -> Self {
        self.ajax = ajax;
        self
    }

    pub fn with_csrf(mut self, valid: bool) -> Self {
        self.csrf_valid = valid;
        self
    }
}

impl RequestContext for StaticRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn active_uri(&self) -> &str {
        &self.uri
    }

    fn client_ip(&self) -> Option<IpAddr> {
        self.ip
    }

    fn is_ajax(&self) -> bool {
        self.ajax
    }

    fn csrf_token_valid(&self) -> bool {
        self.csrf_valid
    }
}
