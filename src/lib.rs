//! # arbor
//!
//! A radix-tree HTTP framework with boot-time dependency injection.
//!
//! ## The contract
//!
//! Everything that can be decided at startup is decided at startup.
//! Routes compile into one radix tree per `(method, subdomain)` pair, so
//! a lookup costs O(path length) no matter how many routes exist.
//! Handler arguments resolve against registered dependencies when the
//! handler is registered — a handler that cannot be fully bound is
//! rejected before the server ever binds a socket, and request handling
//! runs no type lookup at all.
//!
//! Two ways to write a handler:
//!
//! - **Plain**: `Fn(&Context)`, registered with [`Router::on`]. You read
//!   parameters and write the response through the [`Context`].
//! - **Typed**: any function over [`Injectable`](di::Injectable) argument
//!   types, turned into a route by [`Container::route`]. Arguments come
//!   from dependencies, path parameters, or the decoded request body;
//!   the return value becomes the response via [`IntoResponse`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use arbor::{Container, Method, Router, Server};
//! use serde::Deserialize;
//!
//! #[derive(Clone)]
//! struct Greeting(&'static str);
//! arbor::injectable!(Greeting);
//!
//! #[derive(Clone, Deserialize)]
//! struct CreateUser { name: String }
//! arbor::payload!(CreateUser);
//!
//! #[tokio::main]
//! async fn main() {
//!     let deps = Container::new().register_value(Greeting("hello"));
//!
//!     let app = Router::new()
//!         .on(Method::Get, "/health", |ctx| ctx.write_string("ok"))
//!         .route(deps.route(Method::Get, "/greet/:name", greet).unwrap())
//!         .route(deps.route(Method::Post, "/users", create_user).unwrap())
//!         .fire_method_not_allowed()
//!         .build()
//!         .unwrap();
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! fn greet(g: Greeting, name: String) -> String {
//!     format!("{} {name}", g.0)
//! }
//!
//! fn create_user(u: CreateUser) -> (arbor::Status, String) {
//!     (arbor::Status::Created, format!("created {}", u.name))
//! }
//! ```

mod context;
pub mod di;
mod error;
mod method;
mod request;
mod response;
mod router;
mod server;
mod status;
mod tree;

pub use context::{Context, Params};
pub use di::Container;
pub use error::{BindError, InvokeError, RouteError, ServeError};
pub use method::Method;
pub use request::Request;
pub use response::{ContentType, IntoResponse, Json, Response, ResponseBuilder};
pub use router::{handler, BuiltRouter, Handler, Route, Router};
pub use server::Server;
pub use status::Status;
