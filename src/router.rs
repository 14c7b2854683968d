//! Radix-tree request router.
//!
//! One tree per `(method, subdomain)` pair. O(path-length) lookup. You
//! register routes on a [`Router`], call [`Router::build`] once, and the
//! resulting [`BuiltRouter`] dispatches every request from then on —
//! read-only, shared freely across connections.
//!
//! Dispatch order for a request that reaches no handler: trailing-slash
//! redirect (unless path correction is disabled), then `405 Method Not
//! Allowed` with an `Allow` header (when enabled), then `404`.

use std::sync::Arc;

use crate::context::{Context, Params};
use crate::error::RouteError;
use crate::method::Method;
use crate::status::Status;
use crate::tree::Node;

/// A request handler. Handlers run in registration order until one calls
/// [`Context::stop_execution`].
pub type Handler = Arc<dyn Fn(&Context) + Send + Sync>;

/// The handler chain attached to one registered path.
pub(crate) type Chain = Arc<Vec<Handler>>;

/// Wraps a closure into a shareable [`Handler`].
pub fn handler(f: impl Fn(&Context) + Send + Sync + 'static) -> Handler {
    Arc::new(f)
}

/// One registration: method + optional subdomain + path + handler chain.
///
/// Built either directly and fed to [`Router::route`], or implicitly by
/// [`Router::on`]. The main handler sits last in the chain; middleware
/// registered with [`Route::middleware`] runs before it.
pub struct Route {
    method: Method,
    subdomain: String,
    path: String,
    handlers: Vec<Handler>,
    cors: bool,
}

impl Route {
    pub fn new(method: Method, path: &str, f: impl Fn(&Context) + Send + Sync + 'static) -> Self {
        Self {
            method,
            subdomain: String::new(),
            path: path.to_owned(),
            handlers: vec![handler(f)],
            cors: false,
        }
    }

    pub(crate) fn with_chain(method: Method, path: &str, handlers: Vec<Handler>) -> Self {
        Self {
            method,
            subdomain: String::new(),
            path: path.to_owned(),
            handlers,
            cors: false,
        }
    }

    /// Restricts the route to a subdomain. `"admin"` and `"admin."` are
    /// equivalent; `"*"` matches any subdomain.
    pub fn subdomain(mut self, subdomain: &str) -> Self {
        let mut s = subdomain.to_owned();
        if !s.is_empty() && !s.ends_with('.') {
            s.push('.');
        }
        self.subdomain = s;
        self
    }

    /// Adds a middleware handler in front of the main one. Multiple calls
    /// keep their order.
    pub fn middleware(mut self, f: impl Fn(&Context) + Send + Sync + 'static) -> Self {
        let main = self.handlers.len() - 1;
        self.handlers.insert(main, handler(f));
        self
    }

    /// Marks the route as CORS-enabled: its tree then also answers
    /// preflight `OPTIONS` requests.
    pub fn cors(mut self) -> Self {
        self.cors = true;
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn subdomain_str(&self) -> &str {
        &self.subdomain
    }
}

/// The application router, in its registration phase.
///
/// Each mutating call returns `self` so registrations chain naturally.
/// Nothing is validated until [`Router::build`], which turns the
/// accumulated routes into the read-only tree set.
pub struct Router {
    routes: Vec<Route>,
    wrappers: Vec<Handler>,
    vhost: Option<String>,
    path_correction: bool,
    fire_method_not_allowed: bool,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            wrappers: Vec::new(),
            vhost: None,
            path_correction: true,
            fire_method_not_allowed: false,
        }
    }

    /// Registers a handler for a method + path pair.
    ///
    /// Path parameters use `:name` syntax, catch-alls `*name`:
    ///
    /// ```rust,no_run
    /// # use arbor::{Method, Router};
    /// Router::new()
    ///     .on(Method::Get, "/users/:id", |ctx| {
    ///         let id = ctx.params().int("id");
    ///         ctx.write_string(&format!("user {id}"));
    ///     })
    ///     .on(Method::Get, "/files/*file", |ctx| {
    ///         ctx.write_string(&ctx.params().string("file"));
    ///     });
    /// ```
    pub fn on(
        self,
        method: Method,
        path: &str,
        f: impl Fn(&Context) + Send + Sync + 'static,
    ) -> Self {
        self.route(Route::new(method, path, f))
    }

    /// Registers a fully-configured [`Route`].
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Adds a global middleware handler, run before every route's own
    /// chain.
    pub fn wrap(mut self, f: impl Fn(&Context) + Send + Sync + 'static) -> Self {
        self.wrappers.push(handler(f));
        self
    }

    /// Sets the apex domain used for subdomain matching. With vhost
    /// `"example.com"`, a request to `admin.example.com` carries the
    /// subdomain `admin.`. Without it, the first host label is treated as
    /// the subdomain whenever at least two more labels follow.
    pub fn vhost(mut self, domain: &str) -> Self {
        self.vhost = Some(domain.to_owned());
        self
    }

    /// Disables the automatic trailing-slash redirect.
    pub fn disable_path_correction(mut self) -> Self {
        self.path_correction = false;
        self
    }

    /// Answers `405` with an `Allow` header instead of `404` when the
    /// path exists under another method.
    pub fn fire_method_not_allowed(mut self) -> Self {
        self.fire_method_not_allowed = true;
        self
    }

    /// Validates every registration and freezes the router. The first
    /// invalid route aborts the build.
    pub fn build(self) -> Result<BuiltRouter, RouteError> {
        let mut trees: Vec<MuxTree> = Vec::new();
        let mut max_params = 0usize;
        let mut hosts = false;
        let mut cors = false;

        for route in self.routes {
            if !route.path.starts_with('/') {
                tracing::error!(path = %route.path, "route path must begin with '/'");
                return Err(RouteError::MissingLeadingSlash(route.path));
            }
            if !route.subdomain.is_empty() {
                hosts = true;
            }
            if route.cors {
                cors = true;
            }

            let mut chain = Vec::with_capacity(self.wrappers.len() + route.handlers.len());
            chain.extend(self.wrappers.iter().cloned());
            chain.extend(route.handlers);

            let pos = trees
                .iter()
                .position(|t| t.method == route.method && t.subdomain == route.subdomain);
            let tree = match pos {
                Some(i) => &mut trees[i],
                None => {
                    trees.push(MuxTree {
                        method: route.method,
                        subdomain: route.subdomain.clone(),
                        root: Node::default(),
                    });
                    trees.last_mut().expect("tree just pushed")
                }
            };

            if let Err(e) = tree.root.add_route(&route.path, Arc::new(chain)) {
                tracing::error!(error = %e, method = %route.method, path = %route.path,
                    "route registration failed");
                return Err(e);
            }
            max_params = max_params.max(tree.root.max_params() as usize);

            tracing::debug!(method = %route.method, subdomain = %route.subdomain,
                path = %route.path, "route registered");
        }

        tracing::info!(trees = trees.len(), "route table built");
        Ok(BuiltRouter {
            trees,
            max_params,
            cors,
            hosts,
            vhost: self.vhost,
            path_correction: self.path_correction,
            fire_method_not_allowed: self.fire_method_not_allowed,
        })
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

struct MuxTree {
    method: Method,
    subdomain: String,
    root: Node,
}

/// The frozen router produced by [`Router::build`]. Immutable; dispatch
/// never takes a lock on it.
pub struct BuiltRouter {
    trees: Vec<MuxTree>,
    max_params: usize,
    /// Any CORS-enabled route makes every tree answer `OPTIONS` preflights.
    cors: bool,
    hosts: bool,
    vhost: Option<String>,
    path_correction: bool,
    fire_method_not_allowed: bool,
}

impl BuiltRouter {
    /// Largest parameter count across all routes; sizes the per-request
    /// parameter store.
    pub(crate) fn max_params(&self) -> usize {
        self.max_params
    }

    /// Routes a request to its handler chain, writing the response into
    /// the context. Falls back to trailing-slash redirect, `405`, then
    /// `404`.
    pub fn dispatch(&self, ctx: &Context) {
        let method = ctx.method();
        let path = ctx.path();
        let subdomain = if self.hosts {
            self.request_subdomain(&ctx.host())
        } else {
            String::new()
        };

        for tree in &self.trees {
            if tree.method != method && !(self.cors && method == Method::Options) {
                continue;
            }
            if self.hosts && !tree.matches_subdomain(&subdomain) {
                continue;
            }

            let mut params = Params::with_capacity(self.max_params);
            let (chain, tsr) = tree.root.get_value(&path, &mut params);

            if let Some(chain) = chain {
                ctx.set_params(params);
                for h in chain.iter() {
                    h(ctx);
                    if ctx.is_stopped() {
                        break;
                    }
                }
                return;
            }

            if tsr && self.path_correction && path != "/" {
                redirect_trailing_slash(ctx, &path);
                return;
            }
        }

        if self.fire_method_not_allowed {
            let mut allow: Vec<&'static str> = Vec::new();
            for tree in &self.trees {
                if tree.method == method {
                    continue;
                }
                if self.hosts && !tree.matches_subdomain(&subdomain) {
                    continue;
                }
                let mut params = Params::with_capacity(self.max_params);
                if tree.root.get_value(&path, &mut params).0.is_some()
                    && !allow.contains(&tree.method.as_str())
                {
                    allow.push(tree.method.as_str());
                }
            }
            if !allow.is_empty() {
                ctx.set_header("allow", allow.join(", "));
                ctx.status_code(Status::MethodNotAllowed);
                ctx.write_string("Method Not Allowed");
                return;
            }
        }

        ctx.status_code(Status::NotFound);
        ctx.write_string("Not Found");
    }

    /// Extracts the subdomain (with trailing dot) of a request host, or
    /// `""` for the apex.
    fn request_subdomain(&self, host: &str) -> String {
        if let Some(vhost) = &self.vhost {
            if host == vhost {
                return String::new();
            }
            if let Some(rest) = host.strip_suffix(vhost) {
                if let Some(sub) = rest.strip_suffix('.') {
                    return format!("{sub}.");
                }
            }
            return String::new();
        }

        // no vhost configured: "admin.example.com" yields "admin.",
        // "example.com" and "localhost" yield ""
        match host.split_once('.') {
            Some((first, rest)) if rest.contains('.') => format!("{first}."),
            _ => String::new(),
        }
    }
}

impl MuxTree {
    fn matches_subdomain(&self, subdomain: &str) -> bool {
        // a tree without a subdomain serves requests from any host
        if self.subdomain.is_empty() {
            true
        } else if self.subdomain == "*." {
            !subdomain.is_empty()
        } else {
            self.subdomain == subdomain
        }
    }
}

fn redirect_trailing_slash(ctx: &Context, path: &str) {
    let target = if path.len() > 1 && path.ends_with('/') {
        path[..path.len() - 1].to_owned()
    } else {
        format!("{path}/")
    };

    let query = ctx.request().query().to_owned();
    let location = if query.is_empty() {
        target
    } else {
        format!("{target}?{query}")
    };

    let status = ctx.method().redirect_status();
    ctx.redirect(&location, status);

    // body only for GET, mirroring what browsers expect from a redirect
    if ctx.method() == Method::Get {
        let text = match status {
            Status::TemporaryRedirect => "Temporary Redirect",
            _ => "Moved Permanently",
        };
        ctx.content_type("text/html; charset=utf-8");
        ctx.write_string(&format!("<a href=\"{}\">{text}</a>.\n", html_escape(&location)));
    }

    tracing::debug!(from = %path, to = %location, "trailing-slash redirect");
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use crate::response::Response;

    fn run(router: &BuiltRouter, request: Request) -> Response {
        let ctx = Context::new(request);
        router.dispatch(&ctx);
        ctx.take_response()
    }

    #[test]
    fn static_and_param_routes_dispatch() {
        let router = Router::new()
            .on(Method::Get, "/", |ctx| ctx.write_string("root"))
            .on(Method::Get, "/users/:id", |ctx| {
                ctx.write_string(&format!("user {}", ctx.params().string("id")));
            })
            .on(Method::Get, "/users/:id/messages/:mid", |ctx| {
                let p = ctx.params();
                ctx.write_string(&format!("{}/{}", p.string("id"), p.string("mid")));
            })
            .build()
            .unwrap();

        let res = run(&router, Request::get("/"));
        assert_eq!(res.body, b"root");

        let res = run(&router, Request::get("/users/42"));
        assert_eq!(res.body, b"user 42");

        let res = run(&router, Request::get("/users/42/messages/7"));
        assert_eq!(res.body, b"42/7");
    }

    #[test]
    fn unmatched_path_is_404() {
        let router = Router::new()
            .on(Method::Get, "/hello", |ctx| ctx.write_string("hi"))
            .build()
            .unwrap();

        let res = run(&router, Request::get("/nope"));
        assert_eq!(res.status, 404);
    }

    #[test]
    fn method_mismatch_is_404_by_default() {
        let router = Router::new()
            .on(Method::Get, "/x", |ctx| ctx.write_string("x"))
            .build()
            .unwrap();

        let res = run(&router, Request::new(Method::Delete, "/x"));
        assert_eq!(res.status, 404);
    }

    #[test]
    fn method_not_allowed_lists_alternatives() {
        let router = Router::new()
            .on(Method::Get, "/x", |ctx| ctx.write_string("x"))
            .on(Method::Post, "/x", |ctx| ctx.write_string("x"))
            .fire_method_not_allowed()
            .build()
            .unwrap();

        let res = run(&router, Request::new(Method::Delete, "/x"));
        assert_eq!(res.status, 405);
        let allow = res
            .headers
            .iter()
            .find(|(k, _)| k == "allow")
            .map(|(_, v)| v.as_str());
        assert_eq!(allow, Some("GET, POST"));
    }

    #[test]
    fn trailing_slash_redirects_by_method() {
        let router = Router::new()
            .on(Method::Get, "/about/", |ctx| ctx.write_string("about"))
            .on(Method::Post, "/submit", |ctx| ctx.write_string("ok"))
            .build()
            .unwrap();

        // GET gets a 301 and an HTML notice body
        let res = run(&router, Request::get("/about"));
        assert_eq!(res.status, 301);
        let location = res
            .headers
            .iter()
            .find(|(k, _)| k == "location")
            .map(|(_, v)| v.as_str());
        assert_eq!(location, Some("/about/"));
        assert!(String::from_utf8(res.body).unwrap().contains("/about/"));

        // POST gets a 307 and no body
        let res = run(&router, Request::post("/submit/"));
        assert_eq!(res.status, 307);
        assert!(res.body.is_empty());
    }

    #[test]
    fn trailing_slash_redirect_preserves_query() {
        let router = Router::new()
            .on(Method::Get, "/search/", |ctx| ctx.write_string("s"))
            .build()
            .unwrap();

        let res = run(&router, Request::get("/search?q=1"));
        let location = res
            .headers
            .iter()
            .find(|(k, _)| k == "location")
            .map(|(_, v)| v.as_str());
        assert_eq!(location, Some("/search/?q=1"));
    }

    #[test]
    fn path_correction_can_be_disabled() {
        let router = Router::new()
            .on(Method::Get, "/about/", |ctx| ctx.write_string("about"))
            .disable_path_correction()
            .build()
            .unwrap();

        let res = run(&router, Request::get("/about"));
        assert_eq!(res.status, 404);
    }

    #[test]
    fn subdomain_routing() {
        let router = Router::new()
            .route(
                Route::new(Method::Get, "/", |ctx| ctx.write_string("admin"))
                    .subdomain("admin"),
            )
            .route(
                Route::new(Method::Get, "/", |ctx| ctx.write_string("wild")).subdomain("*"),
            )
            .on(Method::Get, "/", |ctx| ctx.write_string("apex"))
            .vhost("example.com")
            .build()
            .unwrap();

        let res = run(&router, Request::get("/").with_host("admin.example.com"));
        assert_eq!(res.body, b"admin");

        let res = run(&router, Request::get("/").with_host("blog.example.com"));
        assert_eq!(res.body, b"wild");

        let res = run(&router, Request::get("/").with_host("example.com"));
        assert_eq!(res.body, b"apex");
    }

    #[test]
    fn default_routes_serve_any_host() {
        let router = Router::new()
            .on(Method::Get, "/x", |ctx| ctx.write_string("x"))
            .route(
                Route::new(Method::Get, "/admin-only", |ctx| ctx.write_string("admin"))
                    .subdomain("admin"),
            )
            .vhost("example.com")
            .build()
            .unwrap();

        // a route without a subdomain stays reachable from every host
        let res = run(&router, Request::get("/x").with_host("admin.example.com"));
        assert_eq!(res.body, b"x");

        let res = run(&router, Request::get("/admin-only").with_host("example.com"));
        assert_eq!(res.status, 404);
    }

    #[test]
    fn cors_route_accepts_options() {
        let router = Router::new()
            .route(Route::new(Method::Post, "/api", |ctx| ctx.write_string("posted")).cors())
            .build()
            .unwrap();

        let res = run(&router, Request::new(Method::Options, "/api"));
        assert_eq!(res.body, b"posted");
    }

    #[test]
    fn any_cors_route_opens_options_everywhere() {
        let router = Router::new()
            .on(Method::Get, "/plain", |ctx| ctx.write_string("plain"))
            .route(Route::new(Method::Post, "/api", |ctx| ctx.write_string("posted")).cors())
            .build()
            .unwrap();

        // one CORS route switches the method comparison for the whole table
        let res = run(&router, Request::new(Method::Options, "/plain"));
        assert_eq!(res.body, b"plain");
    }

    #[test]
    fn middleware_runs_in_order_and_stop_halts() {
        let router = Router::new()
            .wrap(|ctx| ctx.write_string("g."))
            .route(
                Route::new(Method::Get, "/a", |ctx| ctx.write_string("main"))
                    .middleware(|ctx| ctx.write_string("m1."))
                    .middleware(|ctx| ctx.write_string("m2.")),
            )
            .route(
                Route::new(Method::Get, "/halt", |ctx| ctx.write_string("unreached"))
                    .middleware(|ctx| {
                        ctx.write_string("gate.");
                        ctx.stop_execution();
                    }),
            )
            .build()
            .unwrap();

        let res = run(&router, Request::get("/a"));
        assert_eq!(res.body, b"g.m1.m2.main");

        let res = run(&router, Request::get("/halt"));
        assert_eq!(res.body, b"g.gate.");
    }

    #[test]
    fn bad_registration_surfaces_at_build() {
        let err = Router::new()
            .on(Method::Get, "no-slash", |_| {})
            .build()
            .err()
            .expect("must fail");
        assert_eq!(err, RouteError::MissingLeadingSlash("no-slash".to_owned()));

        let err = Router::new()
            .on(Method::Get, "/u/:id", |_| {})
            .on(Method::Get, "/u/:id", |_| {})
            .build()
            .err()
            .expect("must fail");
        assert_eq!(err, RouteError::DuplicatePath("/u/:id".to_owned()));
    }
}
