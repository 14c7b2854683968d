//! Incoming HTTP request snapshot.
//!
//! A [`Request`] is immutable once built; everything mutable during a
//! request's life (path parameters, response state, the per-request value
//! store) lives on the [`Context`](crate::Context) instead. The body is a
//! [`bytes::Bytes`], so cloning a request is cheap — the context hands out
//! clones freely.

use std::net::IpAddr;
use std::str::FromStr;

use bytes::Bytes;

use crate::method::Method;

/// An incoming HTTP request.
#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    path: String,
    query: String,
    host: String,
    headers: Vec<(String, String)>,
    body: Bytes,
    remote_ip: Option<IpAddr>,
}

impl Request {
    /// Builds a request from a method and a request target
    /// (`"/users/42?active=true"`). Mostly useful in tests and embedded
    /// dispatch; the server builds requests from the wire itself.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p.to_owned(), q.to_owned()),
            None => (target.to_owned(), String::new()),
        };

        Self {
            method,
            path,
            query,
            host: String::new(),
            headers: Vec::new(),
            body: Bytes::new(),
            remote_ip: None,
        }
    }

    /// Shorthand for `Request::new(Method::Get, target)`.
    pub fn get(target: &str) -> Self {
        Self::new(Method::Get, target)
    }

    /// Shorthand for `Request::new(Method::Post, target)`.
    pub fn post(target: &str) -> Self {
        Self::new(Method::Post, target)
    }

    /// Sets the `Host` the request was addressed to (port already stripped).
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Appends a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the peer address.
    pub fn with_remote_ip(mut self, ip: IpAddr) -> Self {
        self.remote_ip = Some(ip);
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// The decoded path component, query excluded.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw query string, `""` when absent.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The `Host` the request was addressed to, port stripped, `""` when
    /// the client sent none.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn remote_ip(&self) -> Option<IpAddr> {
        self.remote_ip
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The `content-type` header, parameters (`; charset=...`) stripped.
    pub fn content_type(&self) -> &str {
        let ct = self.header("content-type").unwrap_or("");
        ct.split(';').next().unwrap_or("").trim()
    }

    /// Builds a request from hyper's parsed representation. Fails when the
    /// method string is not a known RFC 9110 method.
    pub(crate) fn from_http(
        parts: &http::request::Parts,
        body: Bytes,
        remote_ip: Option<IpAddr>,
    ) -> Result<Self, ()> {
        let method = Method::from_str(parts.method.as_str())?;

        let headers = parts
            .headers
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_owned(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect::<Vec<_>>();

        let host = parts
            .headers
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(strip_port)
            .unwrap_or_default()
            .to_owned();

        let mut request = Self::new(method, parts.uri.path());
        if let Some(q) = parts.uri.query() {
            request.query = q.to_owned();
        }
        request.host = host;
        request.headers = headers;
        request.body = body;
        request.remote_ip = remote_ip;
        Ok(request)
    }
}

/// `"example.com:8080"` → `"example.com"`. IPv6 literals keep their
/// brackets so the colon scan cannot eat the address itself.
fn strip_port(host: &str) -> &str {
    if let Some(end) = host.strip_prefix('[').and_then(|h| h.find(']')) {
        return &host[..end + 2];
    }
    host.split(':').next().unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_splits_path_and_query() {
        let req = Request::get("/users/42?active=true");
        assert_eq!(req.path(), "/users/42");
        assert_eq!(req.query(), "active=true");

        let req = Request::get("/users");
        assert_eq!(req.query(), "");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let req = Request::get("/").with_header("Content-Type", "application/json; charset=utf-8");
        assert_eq!(
            req.header("content-type"),
            Some("application/json; charset=utf-8")
        );
        assert_eq!(req.content_type(), "application/json");
    }

    #[test]
    fn strip_port_handles_hostnames_and_v6() {
        assert_eq!(strip_port("example.com:8080"), "example.com");
        assert_eq!(strip_port("example.com"), "example.com");
        assert_eq!(strip_port("[::1]:3000"), "[::1]");
    }
}
