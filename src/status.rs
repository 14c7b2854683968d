//! HTTP status codes as a typed enum.
//!
//! Use [`Status`] anywhere a status code is accepted — `Response::status()`,
//! `Response::builder().status()`, `Context::status_code()`, or as a bare
//! handler return value.
//!
//! ```rust
//! use arbor::{Response, Status};
//!
//! // status-only, no body
//! Response::status(Status::NoContent);
//!
//! Response::builder()
//!     .status(Status::Created)
//!     .header("location", "/users/42")
//!     .json(br#"{"id":42}"#.to_vec());
//! ```

/// The status codes the framework and its handlers emit.
///
/// The discriminant is the wire code; `Status::Ok as u16 == 200`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u16)]
pub enum Status {
    // ── 2xx Success ───────────────────────────────────────────────────────────
    Ok                   = 200,
    Created              = 201,
    Accepted             = 202,
    NoContent            = 204,

    // ── 3xx Redirection ───────────────────────────────────────────────────────
    MovedPermanently     = 301,
    Found                = 302,
    SeeOther             = 303,
    NotModified          = 304,
    TemporaryRedirect    = 307,
    PermanentRedirect    = 308,

    // ── 4xx Client errors ─────────────────────────────────────────────────────
    BadRequest           = 400,
    Unauthorized         = 401,
    Forbidden            = 403,
    NotFound             = 404,
    MethodNotAllowed     = 405,
    Conflict             = 409,
    Gone                 = 410,
    UnsupportedMediaType = 415,
    UnprocessableContent = 422,
    TooManyRequests      = 429,

    // ── 5xx Server errors ─────────────────────────────────────────────────────
    InternalServerError  = 500,
    NotImplemented       = 501,
    BadGateway           = 502,
    ServiceUnavailable   = 503,
}

impl Status {
    /// The numeric wire code.
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl From<Status> for u16 {
    fn from(s: Status) -> u16 {
        s.code()
    }
}
