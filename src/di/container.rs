//! The dependency container: registered providers plus the factory that
//! turns typed functions into route handlers.

use std::any::type_name;
use std::sync::Arc;
use std::time::SystemTime;

use crate::context::Context;
use crate::di::binding::bindings_for_fn;
use crate::di::dependency::{Dependency, IntoDependencyValue};
use crate::di::handler::{dependency_from_typed_fn, make_handler, ErrorHandler, TypedFn};
use crate::di::injectable::{downcast_value, Code, Headers, Injectable, Input, RemoteIp};
use crate::error::{BindError, InvokeError};
use crate::method::Method;
use crate::response::IntoResponse;
use crate::router::{Handler, Route};
use crate::status::Status;
use crate::tree::count_params;

/// Holds dependencies and builds handlers bound to them.
///
/// Registration methods chain by value, like [`Router`](crate::Router).
/// All resolution happens inside [`Container::handler`] and friends — a
/// handler that cannot be fully bound is rejected there, at boot, never
/// at request time.
pub struct Container {
    dependencies: Vec<Dependency>,
    disable_payload_auto_binding: bool,
    error_handler: ErrorHandler,
}

/// Builtins available to every handler without registration. All
/// explicit, so they bind by exact type and never shadow user values.
fn builtin_dependencies() -> Vec<Dependency> {
    vec![
        Dependency::from_fn(|ctx: &Context| ctx.clone()).explicitly(),
        Dependency::from_fn(|ctx: &Context| ctx.request()).explicitly(),
        Dependency::from_fn(|ctx: &Context| ctx.method()).explicitly(),
        Dependency::from_fn(|_: &Context| SystemTime::now()).explicitly(),
        Dependency::from_fn(|ctx: &Context| Headers(ctx.request_headers())).explicitly(),
        Dependency::from_fn(|ctx: &Context| RemoteIp(ctx.remote_ip())).explicitly(),
        Dependency::from_fn(|ctx: &Context| Code(ctx.get_status())).explicitly(),
    ]
}

fn default_error_handler() -> ErrorHandler {
    Arc::new(|ctx: &Context, err: &InvokeError| {
        ctx.status_code(Status::BadRequest);
        if let InvokeError::Message(msg) = err {
            ctx.content_type("text/plain; charset=utf-8");
            ctx.write_string(msg);
        }
        ctx.stop_execution();
    })
}

impl Container {
    pub fn new() -> Self {
        Self {
            dependencies: builtin_dependencies(),
            disable_payload_auto_binding: false,
            error_handler: default_error_handler(),
        }
    }

    /// Adds a dependency entry. Destless (caller-selecting) providers go
    /// to the front so typed entries are always tried before them.
    pub fn register(mut self, dependency: Dependency) -> Self {
        tracing::debug!(dependency = ?dependency, "dependency registered");
        if dependency.dest.is_none() {
            self.dependencies.insert(0, dependency);
        } else {
            self.dependencies.push(dependency);
        }
        self
    }

    /// Registers a fixed value.
    pub fn register_value<T: Injectable>(self, value: T) -> Self {
        self.register(Dependency::from_value(value))
    }

    /// Registers a per-request provider.
    pub fn register_fn<T, F>(self, f: F) -> Self
    where
        T: Injectable,
        F: Fn(&Context) -> T + Send + Sync + 'static,
    {
        self.register(Dependency::from_fn(f))
    }

    /// Registers a fallible per-request provider.
    pub fn register_try_fn<T, F>(self, f: F) -> Self
    where
        T: Injectable,
        F: Fn(&Context) -> Result<T, InvokeError> + Send + Sync + 'static,
    {
        self.register(Dependency::from_try_fn(f))
    }

    /// Registers a dependency built from previously registered ones. The
    /// function's own arguments resolve against the current entries;
    /// path-parameter binding is not available to them.
    pub fn register_dependent<Args, F>(self, f: F) -> Result<Self, BindError>
    where
        F: TypedFn<Args>,
        F::Output: IntoDependencyValue,
    {
        let inputs = F::inputs();
        let bindings = bindings_for_fn(
            type_name::<F>(),
            &inputs,
            &self.dependencies,
            self.disable_payload_auto_binding,
            None,
        )?;
        Ok(self.register(dependency_from_typed_fn(f, bindings)))
    }

    /// Turns off decoding unresolved payload-capable inputs from the
    /// request body.
    pub fn disable_payload_auto_binding(mut self) -> Self {
        self.disable_payload_auto_binding = true;
        self
    }

    /// Replaces the error handler invoked on binding and invocation
    /// failures.
    pub fn error_handler(
        mut self,
        f: impl Fn(&Context, &InvokeError) + Send + Sync + 'static,
    ) -> Self {
        self.error_handler = Arc::new(f);
        self
    }

    /// Builds a route handler from a typed function, for paths without
    /// parameters.
    pub fn handler<Args, F>(&self, f: F) -> Result<Handler, BindError>
    where
        F: TypedFn<Args>,
        F::Output: IntoResponse,
    {
        self.handler_with_params(f, 0)
    }

    /// Like [`Container::handler`] with an explicit path-parameter
    /// count. Trailing parameter slots are assigned to trailing
    /// param-capable arguments.
    pub fn handler_with_params<Args, F>(
        &self,
        f: F,
        params_count: usize,
    ) -> Result<Handler, BindError>
    where
        F: TypedFn<Args>,
        F::Output: IntoResponse,
    {
        let inputs = F::inputs();
        let bindings = bindings_for_fn(
            type_name::<F>(),
            &inputs,
            &self.dependencies,
            self.disable_payload_auto_binding,
            Some(params_count),
        )?;
        Ok(make_handler(f, bindings, self.error_handler.clone()))
    }

    /// Builds a [`Route`] from a typed function, deriving the parameter
    /// count from the path itself.
    pub fn route<Args, F>(&self, method: Method, path: &str, f: F) -> Result<Route, BindError>
    where
        F: TypedFn<Args>,
        F::Output: IntoResponse,
    {
        let params_count = count_params(path) as usize;
        let handler = self.handler_with_params(f, params_count)?;
        Ok(Route::with_chain(method, path, vec![handler]))
    }

    pub(crate) fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub(crate) fn payload_auto_binding_disabled(&self) -> bool {
        self.disable_payload_auto_binding
    }

    /// Resolves a static dependency outside of request handling, e.g.
    /// for wiring at startup. Request-bound dependencies are skipped.
    pub fn inject<T: Injectable>(&self) -> Result<T, BindError> {
        let input = Input::of::<T>(0);
        let ctx = Context::detached();

        for d in self.dependencies.iter().rev() {
            if !d.is_static || !d.matches(&input) {
                continue;
            }
            if let Ok(v) = (d.handle)(&ctx, &input) {
                if let Some(v) = downcast_value::<T>(&v) {
                    return Ok(v);
                }
            }
        }

        Err(BindError::MissingDependency(type_name::<T>()))
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use crate::response::Response;
    use crate::router::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Debug, PartialEq)]
    struct Service(&'static str);

    #[derive(Clone, Debug, PartialEq)]
    struct Derived(String);

    crate::injectable!(Service, Derived);

    fn run(handler: &Handler, request: Request) -> Response {
        let ctx = Context::new(request);
        handler(&ctx);
        ctx.take_response()
    }

    #[test]
    fn handler_receives_registered_value() {
        let c = Container::new().register_value(Service("db"));
        let h = c.handler(|s: Service| s.0).unwrap();

        let res = run(&h, Request::get("/"));
        assert_eq!(res.body, b"db");
    }

    #[test]
    fn last_registration_wins() {
        let c = Container::new()
            .register_value(Service("old"))
            .register_value(Service("new"));
        let h = c.handler(|s: Service| s.0).unwrap();

        let res = run(&h, Request::get("/"));
        assert_eq!(res.body, b"new");
    }

    #[test]
    fn builtins_bind_by_exact_type() {
        let c = Container::new();
        let h = c
            .handler(|ctx: Context, m: Method| {
                ctx.set_header("x-method", m.as_str());
                "ok"
            })
            .unwrap();

        let res = run(&h, Request::post("/"));
        assert!(res.headers.iter().any(|(k, v)| k == "x-method" && v == "POST"));
        assert_eq!(res.body, b"ok");
    }

    #[test]
    fn dependent_dependency_over_static_values_runs_once() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let c = Container::new()
            .register_value(Service("base"))
            .register_dependent(|s: Service| {
                CALLS.fetch_add(1, Ordering::SeqCst);
                Derived(format!("from {}", s.0))
            })
            .unwrap();

        let h = c.handler(|d: Derived| d.0).unwrap();

        let res = run(&h, Request::get("/"));
        assert_eq!(res.body, b"from base");
        let res = run(&h, Request::get("/"));
        assert_eq!(res.body, b"from base");

        // all inputs static, so the dependent value was precomputed
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dependent_on_request_dependency_runs_per_request() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let c = Container::new()
            .register_fn(|ctx: &Context| Service(if ctx.path() == "/" { "root" } else { "other" }))
            .register_dependent(|s: Service| {
                CALLS.fetch_add(1, Ordering::SeqCst);
                Derived(s.0.to_owned())
            })
            .unwrap();

        let h = c.handler(|d: Derived| d.0).unwrap();

        run(&h, Request::get("/"));
        run(&h, Request::get("/"));
        assert_eq!(CALLS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn path_parameters_bind_with_conversion() {
        let c = Container::new();
        let router = Router::new()
            .route(
                c.route(Method::Get, "/users/:id", |id: u64| format!("user {id}"))
                    .unwrap(),
            )
            .build()
            .unwrap();

        let ctx = Context::new(Request::get("/users/42"));
        router.dispatch(&ctx);
        assert_eq!(ctx.take_response().body, b"user 42");
    }

    #[test]
    fn multiple_path_parameters_bind_in_order() {
        let c = Container::new();
        let router = Router::new()
            .route(
                c.route(
                    Method::Get,
                    "/profile/:firstname/:lastname",
                    |first: String, last: String| format!("{first} {last}"),
                )
                .unwrap(),
            )
            .build()
            .unwrap();

        let ctx = Context::new(Request::get("/profile/ada/lovelace"));
        router.dispatch(&ctx);
        assert_eq!(ctx.take_response().body, b"ada lovelace");
    }

    #[test]
    fn payload_auto_binding_decodes_the_body() {
        #[derive(Clone, Debug, PartialEq, serde::Deserialize)]
        struct CreateUser {
            name: String,
        }
        crate::payload!(CreateUser);

        let c = Container::new();
        let h = c.handler(|u: CreateUser| format!("created {}", u.name)).unwrap();

        let res = run(
            &h,
            Request::post("/users")
                .with_header("content-type", "application/json")
                .with_body(&br#"{"name":"ada"}"#[..]),
        );
        assert_eq!(res.body, b"created ada");
    }

    #[test]
    fn unresolvable_handler_is_rejected_at_boot() {
        #[derive(Clone, Debug)]
        struct Missing;
        crate::injectable!(Missing);

        let c = Container::new();
        let err = c.handler(|_: Missing| "never").err().expect("must fail");
        assert!(matches!(err, BindError::UnresolvedInputs { .. }), "{err}");
    }

    #[test]
    fn provider_error_reaches_the_error_handler() {
        let c = Container::new().register_try_fn(|_: &Context| -> Result<Service, _> {
            Err(InvokeError::other("database unreachable"))
        });
        let h = c.handler(|s: Service| s.0).unwrap();

        let res = run(&h, Request::get("/"));
        assert_eq!(res.status, 400);
        assert_eq!(res.body, b"database unreachable");
    }

    #[test]
    fn stop_execution_halts_without_response_override() {
        let c = Container::new().register_try_fn(|_: &Context| -> Result<Service, _> {
            Err(InvokeError::StopExecution)
        });
        let h = c.handler(|s: Service| s.0).unwrap();

        let ctx = Context::new(Request::get("/"));
        h(&ctx);
        assert!(ctx.is_stopped());
        assert_eq!(ctx.take_response().status, 200);
    }

    #[test]
    fn inject_resolves_static_dependencies() {
        let c = Container::new()
            .register_value(Service("a"))
            .register_value(Service("b"));

        assert_eq!(c.inject::<Service>().unwrap(), Service("b"));
        assert!(matches!(
            c.inject::<Derived>(),
            Err(BindError::MissingDependency(_))
        ));
    }
}
