//! Per-request context.
//!
//! A [`Context`] is a cheap-clone handle (`Arc<Mutex<_>>`) over everything
//! mutable in one request's life: the path-parameter store filled by the
//! trie walk, a string-keyed value store, a per-request dependency map
//! consumed by payload bindings, and the accumulated response. The request
//! itself is an immutable snapshot.
//!
//! Cloning the handle is how the dependency injector passes "the context"
//! into bound handlers — every clone refers to the same request state.
//! Contexts are never shared across requests.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::de::DeserializeOwned;

use crate::error::InvokeError;
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

// ── Params ───────────────────────────────────────────────────────────────────

/// The per-request path-parameter store, filled by the trie walk in route
/// order. Pre-sized once from the maximum parameter count discovered at
/// build time, so the hot path never reallocates.
#[derive(Clone, Debug, Default)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    pub(crate) fn with_capacity(cap: usize) -> Self {
        Self { entries: Vec::with_capacity(cap) }
    }

    pub(crate) fn push(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_owned(), value.to_owned()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Named lookup, raw string value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Positional lookup, raw string value.
    pub fn raw(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|(_, v)| v.as_str())
    }

    /// Named lookup parsed as `i32`, `0` when absent or unparsable.
    pub fn int(&self, name: &str) -> i32 {
        self.get(name).and_then(|v| v.parse().ok()).unwrap_or(0)
    }

    /// Named lookup parsed as `i64`, `0` when absent or unparsable.
    pub fn int64(&self, name: &str) -> i64 {
        self.get(name).and_then(|v| v.parse().ok()).unwrap_or(0)
    }

    /// Named lookup parsed as `bool`, `false` when absent or unparsable.
    pub fn bool(&self, name: &str) -> bool {
        self.get(name).and_then(|v| v.parse().ok()).unwrap_or(false)
    }

    /// Named lookup as an owned string, `""` when absent.
    pub fn string(&self, name: &str) -> String {
        self.get(name).unwrap_or("").to_owned()
    }
}

// ── Context ──────────────────────────────────────────────────────────────────

/// The per-request context handle. See the module docs.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    request: Request,
    params: Params,
    values: HashMap<String, Arc<dyn Any + Send + Sync>>,
    deps: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    stopped: bool,
}

impl Context {
    /// Wraps a request in a fresh context. Useful for tests and embedded
    /// dispatch; the server does this per request.
    pub fn new(request: Request) -> Self {
        Self::with_params_capacity(request, 0)
    }

    pub(crate) fn with_params_capacity(request: Request, cap: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                request,
                params: Params::with_capacity(cap),
                values: HashMap::new(),
                deps: HashMap::new(),
                status: Status::Ok.into(),
                headers: Vec::new(),
                body: Vec::new(),
                stopped: false,
            })),
        }
    }

    /// A context bound to no request. Static dependency providers are
    /// evaluated against one of these exactly once, at boot; a static
    /// provider by definition never reads it.
    pub(crate) fn detached() -> Self {
        Self::new(Request::get("/"))
    }

    fn locked(&self) -> MutexGuard<'_, Inner> {
        // a poisoned lock only means a handler panicked mid-request;
        // the state is still coherent for error reporting
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Request side ─────────────────────────────────────────────────────────

    /// A snapshot of the request (cheap: the body is `Bytes`).
    pub fn request(&self) -> Request {
        self.locked().request.clone()
    }

    pub fn method(&self) -> Method {
        self.locked().request.method()
    }

    pub fn path(&self) -> String {
        self.locked().request.path().to_owned()
    }

    pub fn host(&self) -> String {
        self.locked().request.host().to_owned()
    }

    /// Case-insensitive request-header lookup.
    pub fn header(&self, name: &str) -> Option<String> {
        self.locked().request.header(name).map(str::to_owned)
    }

    pub fn request_headers(&self) -> Vec<(String, String)> {
        self.locked().request.headers().to_vec()
    }

    /// The peer address, `0.0.0.0` when unknown (embedded dispatch).
    pub fn remote_ip(&self) -> IpAddr {
        self.locked()
            .request
            .remote_ip()
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }

    // ── Path parameters ──────────────────────────────────────────────────────

    /// A snapshot of the path-parameter store.
    pub fn params(&self) -> Params {
        self.locked().params.clone()
    }

    /// Named path-parameter lookup.
    pub fn param(&self, name: &str) -> Option<String> {
        self.locked().params.get(name).map(str::to_owned)
    }

    pub(crate) fn set_params(&self, params: Params) {
        self.locked().params = params;
    }

    // ── Value store / per-request dependencies ───────────────────────────────

    /// Stores an arbitrary per-request value under a string key.
    pub fn set_value<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.locked().values.insert(key.into(), Arc::new(value));
    }

    /// Retrieves a previously stored value, `None` on a missing key or a
    /// type mismatch.
    pub fn value<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let guard = self.locked();
        let v = guard.values.get(key)?.clone();
        drop(guard);
        v.downcast::<T>().ok()
    }

    /// Registers a request-scoped dependency by type. Payload bindings
    /// consult this map before decoding the request body, so middleware can
    /// hand a decoded value straight to the terminal handler.
    pub fn register_dependency<T: Any + Send + Sync>(&self, value: T) {
        self.locked().deps.insert(TypeId::of::<T>(), Arc::new(value));
    }

    pub(crate) fn raw_dependency(&self, id: TypeId) -> Option<Arc<dyn Any + Send + Sync>> {
        self.locked().deps.get(&id).cloned()
    }

    // ── Response side ────────────────────────────────────────────────────────

    pub fn status_code(&self, status: Status) {
        self.locked().status = status.into();
    }

    pub fn get_status(&self) -> u16 {
        self.locked().status
    }

    /// Appends a response header.
    pub fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.locked().headers.push((name.into(), value.into()));
    }

    pub fn content_type(&self, value: &str) {
        self.set_header("content-type", value);
    }

    pub fn write(&self, bytes: &[u8]) {
        self.locked().body.extend_from_slice(bytes);
    }

    pub fn write_string(&self, s: &str) {
        self.write(s.as_bytes());
    }

    /// Serializes `value` as the JSON response body.
    pub fn json<T: serde::Serialize>(&self, value: &T) -> Result<(), InvokeError> {
        let bytes = serde_json::to_vec(value).map_err(InvokeError::other)?;
        self.content_type("application/json");
        self.write(&bytes);
        Ok(())
    }

    /// Sets the redirect status and `location` header. The caller decides
    /// whether a notice body follows.
    pub fn redirect(&self, url: &str, status: Status) {
        self.status_code(status);
        self.set_header("location", url);
    }

    /// Marks the handler chain as finished; remaining chain handlers are
    /// skipped.
    pub fn stop_execution(&self) {
        self.locked().stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.locked().stopped
    }

    /// Merges a returned [`Response`] into the accumulated state. An empty
    /// response (from a `()`-returning handler) leaves everything as the
    /// handler wrote it.
    pub(crate) fn respond(&self, response: Response) {
        if response.is_none() {
            return;
        }
        let mut inner = self.locked();
        if response.status != 0 {
            inner.status = response.status;
        }
        inner.headers.extend(response.headers);
        inner.body.extend(response.body);
    }

    /// Consumes the accumulated response state.
    pub(crate) fn take_response(&self) -> Response {
        let mut inner = self.locked();
        Response {
            status: inner.status,
            headers: std::mem::take(&mut inner.headers),
            body: std::mem::take(&mut inner.body),
        }
    }

    // ── Payload reading ──────────────────────────────────────────────────────

    /// Decodes the request payload into `T` based on the content type:
    /// `application/json` from the body, form-urlencoded from the body,
    /// otherwise the query string when present, otherwise a JSON attempt.
    pub fn read_body<T: DeserializeOwned>(&self) -> Result<T, InvokeError> {
        let request = self.request();
        let ct = request.content_type();
        let body = request.body();

        if ct.contains("json") {
            return serde_json::from_slice(body).map_err(InvokeError::other);
        }
        if ct.contains("x-www-form-urlencoded") {
            return decode_pairs(body);
        }
        if !request.query().is_empty() {
            return decode_pairs(request.query().as_bytes());
        }
        if !body.is_empty() {
            return serde_json::from_slice(body).map_err(InvokeError::other);
        }

        Err(InvokeError::Message(format!(
            "cannot decode request payload into {}: empty body",
            std::any::type_name::<T>()
        )))
    }
}

/// Decodes `a=1&b=x` pairs into `T` through a JSON map. Scalar-looking
/// values (ints, floats, bools) are coerced before deserialization so
/// numeric struct fields round-trip from form bodies.
fn decode_pairs<T: DeserializeOwned>(raw: &[u8]) -> Result<T, InvokeError> {
    let mut map = serde_json::Map::new();
    for (k, v) in url::form_urlencoded::parse(raw) {
        map.insert(k.into_owned(), coerce_scalar(&v));
    }
    serde_json::from_value(serde_json::Value::Object(map)).map_err(InvokeError::other)
}

fn coerce_scalar(v: &str) -> serde_json::Value {
    if let Ok(n) = v.parse::<i64>() {
        return serde_json::Value::from(n);
    }
    if let Ok(f) = v.parse::<f64>() {
        return serde_json::Value::from(f);
    }
    if let Ok(b) = v.parse::<bool>() {
        return serde_json::Value::from(b);
    }
    serde_json::Value::from(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn params_typed_accessors_default() {
        let mut p = Params::with_capacity(2);
        p.push("id", "42");
        p.push("active", "true");

        assert_eq!(p.int("id"), 42);
        assert_eq!(p.int64("id"), 42);
        assert!(p.bool("active"));
        assert_eq!(p.string("id"), "42");

        // absent or garbage fall back to zero values
        assert_eq!(p.int("missing"), 0);
        assert!(!p.bool("missing"));
        assert_eq!(p.string("missing"), "");
        assert_eq!(p.raw(0), Some("42"));
        assert_eq!(p.raw(5), None);
    }

    #[test]
    fn value_store_roundtrip() {
        let ctx = Context::new(Request::get("/"));
        ctx.set_value("user", "alice".to_owned());
        assert_eq!(*ctx.value::<String>("user").unwrap(), "alice");
        assert!(ctx.value::<i32>("user").is_none());
        assert!(ctx.value::<String>("nope").is_none());
    }

    #[derive(Deserialize, PartialEq, Debug)]
    struct Filter {
        name: String,
        limit: i64,
    }

    #[test]
    fn read_body_json() {
        let ctx = Context::new(
            Request::post("/")
                .with_header("content-type", "application/json")
                .with_body(&br#"{"name":"x","limit":10}"#[..]),
        );
        let f: Filter = ctx.read_body().unwrap();
        assert_eq!(f, Filter { name: "x".into(), limit: 10 });
    }

    #[test]
    fn read_body_form_coerces_numbers() {
        let ctx = Context::new(
            Request::post("/")
                .with_header("content-type", "application/x-www-form-urlencoded")
                .with_body(&b"name=form&limit=3"[..]),
        );
        let f: Filter = ctx.read_body().unwrap();
        assert_eq!(f, Filter { name: "form".into(), limit: 3 });
    }

    #[test]
    fn read_body_query_fallback() {
        let ctx = Context::new(Request::get("/search?name=q&limit=7"));
        let f: Filter = ctx.read_body().unwrap();
        assert_eq!(f, Filter { name: "q".into(), limit: 7 });
    }

    #[test]
    fn respond_merges_and_none_is_noop() {
        let ctx = Context::new(Request::get("/"));
        ctx.status_code(Status::Created);
        ctx.write_string("partial");
        ctx.respond(Response::none());

        let r = ctx.take_response();
        assert_eq!(r.status, 201);
        assert_eq!(r.body, b"partial");
    }
}
