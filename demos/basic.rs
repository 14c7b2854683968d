//! Minimal arbor example — typed handlers over a dependency container.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl http://localhost:3000/users/42/friends/7
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl http://localhost:3000/users          # 405 with `Allow: POST`
//!   curl http://localhost:3000/files/a/b/c

use arbor::{Container, Context, Json, Method, Router, Server, Status};
use serde::{Deserialize, Serialize};

#[derive(Clone)]
struct UserStore {
    greeting: &'static str,
}
arbor::injectable!(UserStore);

#[derive(Clone, Deserialize)]
struct CreateUser {
    name: String,
}
arbor::payload!(CreateUser);

#[derive(Serialize)]
struct User {
    id: u64,
    name: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let deps = Container::new().register_value(UserStore { greeting: "hello" });

    let app = Router::new()
        .on(Method::Get, "/healthz", |ctx| ctx.write_string("ok"))
        .on(Method::Get, "/files/*file", serve_file)
        .route(deps.route(Method::Get, "/users/:id", get_user).unwrap())
        .route(deps.route(Method::Get, "/users/:id/friends/:fid", get_friend).unwrap())
        .route(deps.route(Method::Post, "/users", create_user).unwrap())
        .fire_method_not_allowed()
        .build()
        .expect("route table");

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

// GET /users/:id — the u64 argument binds to the path parameter.
fn get_user(store: UserStore, id: u64) -> Json<User> {
    Json(User { id, name: format!("{} user", store.greeting) })
}

// GET /users/:id/friends/:fid — trailing parameters bind in order.
fn get_friend(id: u64, fid: u64) -> String {
    format!("user {id}, friend {fid}")
}

// POST /users — the payload argument decodes from the JSON body.
fn create_user(input: CreateUser) -> (Status, Json<User>) {
    (Status::Created, Json(User { id: 99, name: input.name }))
}

// Plain handlers work too; the catch-all captures the rest of the path.
fn serve_file(ctx: &Context) {
    ctx.write_string(&format!("would serve {}", ctx.params().string("file")));
}
