//! Error taxonomy.
//!
//! Three families, three fates:
//!
//! - [`RouteError`] and [`BindError`] are **boot-time** errors. A malformed
//!   route table or an unsatisfiable handler signature is a programmer
//!   error; the application must fail before it serves a single request.
//! - [`InvokeError`] is a **request-time** error from a dependency
//!   provider. It is recovered locally by the invocation loop and surfaced
//!   to the client (default: `400` plus the error text). Two of its
//!   variants are control-flow sentinels, not failures.
//! - [`ServeError`] surfaces infrastructure failures: binding a port,
//!   accepting a connection.
//!
//! Routing mismatches (404/405) are not errors at all — they are ordinary
//! responses produced by the dispatch loop.

use thiserror::Error;

/// Route-tree construction failures. Returned by `Router::build`; the
/// first one aborts the whole build.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("path '{0}' must begin with '/'")]
    MissingLeadingSlash(String),

    #[error("a handler is already registered for path '{0}'")]
    DuplicatePath(String),

    #[error(
        "'{segment}' in new path '{path}' conflicts with existing wildcard '{existing}' in prefix '{prefix}'"
    )]
    WildcardConflict {
        segment: String,
        path: String,
        existing: String,
        prefix: String,
    },

    #[error("only one wildcard per path segment is allowed, have '{segment}' in path '{path}'")]
    MultipleWildcards { segment: String, path: String },

    #[error("wildcard segment '{segment}' conflicts with existing children in path '{path}'")]
    WildcardConflictsChildren { segment: String, path: String },

    #[error("wildcards must be named with a non-empty name in path '{0}'")]
    UnnamedWildcard(String),

    #[error("catch-all routes are only allowed at the end of the path, in path '{0}'")]
    CatchAllNotLast(String),

    #[error("catch-all conflicts with the existing handler for the path segment root in path '{0}'")]
    CatchAllRootConflict(String),

    #[error("no '/' before catch-all in path '{0}'")]
    CatchAllMissingSlash(String),
}

/// Binding-resolution failures. Produced when a handler (or struct target)
/// declares an input no dependency, path parameter or payload decoder can
/// satisfy. Checked at boot, never at request time.
#[derive(Debug, Error)]
pub enum BindError {
    #[error(
        "expected {expected} bindings (input parameters) but got {got}\n\
         target:\n  - {target}\n\
         expected:{expected_inputs}\n\
         missing:{missing_inputs}"
    )]
    UnresolvedInputs {
        target: String,
        expected: usize,
        got: usize,
        expected_inputs: String,
        missing_inputs: String,
    },

    #[error("missing dependency for type {0}")]
    MissingDependency(&'static str),
}

/// Request-time outcome of a single dependency provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvokeError {
    /// Sentinel: skip this binding silently and let the next source in the
    /// fallback chain try (e.g. a path-parameter wrapper falling through to
    /// the wrapped dependency).
    #[error("see other")]
    SeeOther,

    /// Sentinel: the provider fully handled the response (a redirect, say).
    /// Halts argument resolution without invoking the error path.
    #[error("stop execution")]
    StopExecution,

    /// A real failure, written to the client by the container's error
    /// handler.
    #[error("{0}")]
    Message(String),
}

impl InvokeError {
    /// Wraps any displayable error as a binding failure.
    pub fn other(err: impl std::fmt::Display) -> Self {
        Self::Message(err.to_string())
    }
}

/// Server infrastructure failures.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
