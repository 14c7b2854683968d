//! HTTP server: the bridge between hyper connections and the router.
//!
//! The server owns nothing but a socket address. [`Server::serve`] binds
//! it, then accepts connections forever; each connection gets its own
//! task and each request a fresh [`Context`], dispatched synchronously
//! through the shared [`BuiltRouter`].

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::context::Context;
use crate::error::ServeError;
use crate::request::Request;
use crate::router::BuiltRouter;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use arbor::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr }
    }

    /// Starts accepting connections and dispatching them through
    /// `router`. Runs until the listener fails.
    pub async fn serve(self, router: BuiltRouter) -> Result<(), ServeError> {
        let listener = TcpListener::bind(self.addr).await?;
        let router = Arc::new(router);

        info!(addr = %self.addr, "arbor listening");

        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(v) => v,
                Err(e) => {
                    error!("accept error: {e}");
                    continue;
                }
            };

            let router = Arc::clone(&router);
            let io = TokioIo::new(stream);

            tokio::spawn(async move {
                // called once per request on the connection, not once
                // per connection
                let svc = service_fn(move |req| {
                    let router = Arc::clone(&router);
                    async move { dispatch(router, req, remote_addr).await }
                });

                // auto::Builder handles both HTTP/1.1 and HTTP/2,
                // whatever the client negotiates
                if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                    .serve_connection(io, svc)
                    .await
                {
                    debug!(peer = %remote_addr, "connection error: {e}");
                }
            });
        }
    }
}

/// Core hot path: routes one request and produces one response.
///
/// The error type is [`Infallible`](std::convert::Infallible) — every
/// failure turns into a status response so hyper never sees an error.
async fn dispatch(
    router: Arc<BuiltRouter>,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<bytes::Bytes>>, std::convert::Infallible> {
    let (parts, body) = req.into_parts();

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!(peer = %remote_addr, "failed to read request body: {e}");
            return Ok(plain_status(400));
        }
    };

    let request = match Request::from_http(&parts, body, Some(remote_addr.ip())) {
        Ok(r) => r,
        // a method outside the routable set cannot match any tree
        Err(()) => return Ok(plain_status(405)),
    };

    let ctx = Context::with_params_capacity(request, router.max_params());
    router.dispatch(&ctx);

    Ok(ctx.take_response().into_http())
}

fn plain_status(status: u16) -> http::Response<Full<bytes::Bytes>> {
    http::Response::builder()
        .status(status)
        .body(Full::default())
        .unwrap_or_default()
}
