//! Boot-time dependency injection.
//!
//! Handlers are plain functions over [`Injectable`] argument types. A
//! [`Container`] maps every argument to a source — a registered
//! dependency, a positional path parameter, or the request payload — when
//! the handler is registered, and rejects anything unresolvable right
//! there. Request handling then just runs the precomputed bindings; no
//! type lookup happens on the hot path.

mod binding;
mod container;
mod dependency;
mod handler;
mod injectable;
mod target;

pub use container::Container;
pub use dependency::{Dependency, DependencyHandler, IntoDependencyValue};
pub use handler::{ErrorHandler, TypedFn};
pub use injectable::{Code, DynValue, Headers, Injectable, Input, RemoteIp, TypeInfo};
pub use target::{BindTarget, Field, StructBinder};
