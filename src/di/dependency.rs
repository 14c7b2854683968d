//! Registered dependencies: the design-time description of how one input
//! value gets produced at serve time.

use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::di::injectable::{DynValue, Injectable, Input, TypeInfo};
use crate::error::InvokeError;

/// Produces one injected value for one input slot.
pub type DependencyHandler =
    Arc<dyn Fn(&Context, &Input) -> Result<DynValue, InvokeError> + Send + Sync>;

/// A dependency entry of a [`Container`](crate::di::Container).
///
/// `dest` is the concrete type the dependency produces, or `None` for a
/// caller-selecting provider that answers any input. A *static*
/// dependency needs no request and is evaluated once, when the handler is
/// built. An *explicit* dependency binds only to inputs of its exact type
/// and may serve several of them.
#[derive(Clone)]
pub struct Dependency {
    pub(crate) handle: DependencyHandler,
    pub(crate) dest: Option<TypeInfo>,
    pub(crate) is_static: bool,
    pub(crate) explicit: bool,
    pub(crate) debug: String,
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("dest", &self.dest.map(|t| t.name))
            .field("is_static", &self.is_static)
            .field("explicit", &self.explicit)
            .field("source", &self.debug)
            .finish()
    }
}

impl Dependency {
    /// A fixed value, shared with every request.
    pub fn from_value<T: Injectable>(value: T) -> Self {
        let value: DynValue = Arc::new(value);
        Self {
            handle: Arc::new(move |_, _| Ok(value.clone())),
            dest: Some(TypeInfo::of::<T>()),
            is_static: true,
            explicit: false,
            debug: format!("value<{}>", std::any::type_name::<T>()),
        }
    }

    /// A per-request provider.
    pub fn from_fn<T, F>(f: F) -> Self
    where
        T: Injectable,
        F: Fn(&Context) -> T + Send + Sync + 'static,
    {
        Self {
            handle: Arc::new(move |ctx, _| Ok(Arc::new(f(ctx)) as DynValue)),
            dest: Some(TypeInfo::of::<T>()),
            is_static: false,
            explicit: false,
            debug: format!("fn<{}>", std::any::type_name::<T>()),
        }
    }

    /// A fallible per-request provider. An `Err` reaches the container's
    /// error handler unless it is one of the flow sentinels.
    pub fn from_try_fn<T, F>(f: F) -> Self
    where
        T: Injectable,
        F: Fn(&Context) -> Result<T, InvokeError> + Send + Sync + 'static,
    {
        Self {
            handle: Arc::new(move |ctx, _| f(ctx).map(|v| Arc::new(v) as DynValue)),
            dest: Some(TypeInfo::of::<T>()),
            is_static: false,
            explicit: false,
            debug: format!("try_fn<{}>", std::any::type_name::<T>()),
        }
    }

    /// A caller-selecting provider with no fixed destination type: it is
    /// tried for any input no other dependency claimed.
    pub fn from_provider<F>(f: F) -> Self
    where
        F: Fn(&Context, &Input) -> Result<DynValue, InvokeError> + Send + Sync + 'static,
    {
        Self {
            handle: Arc::new(f),
            dest: None,
            is_static: false,
            explicit: false,
            debug: "provider".to_owned(),
        }
    }

    /// Restricts the dependency to inputs of its exact type. Explicit
    /// dependencies are reusable across inputs.
    pub fn explicitly(mut self) -> Self {
        self.explicit = true;
        self
    }

    pub(crate) fn matches(&self, input: &Input) -> bool {
        match &self.dest {
            Some(t) => t.id == input.type_id,
            // a destless provider answers anything, unless explicit
            None => !self.explicit,
        }
    }
}

/// Conversion of a dependency function's return value into an injected
/// value. Lets dependent dependencies return either `T` or
/// `Result<T, E>`.
pub trait IntoDependencyValue {
    fn into_dependency_value(self) -> Result<DynValue, InvokeError>;

    fn dest_type() -> TypeInfo;
}

impl<T: Injectable> IntoDependencyValue for T {
    fn into_dependency_value(self) -> Result<DynValue, InvokeError> {
        Ok(Arc::new(self) as DynValue)
    }

    fn dest_type() -> TypeInfo {
        TypeInfo::of::<T>()
    }
}

impl<T: Injectable, E: fmt::Display> IntoDependencyValue for Result<T, E> {
    fn into_dependency_value(self) -> Result<DynValue, InvokeError> {
        match self {
            Ok(v) => Ok(Arc::new(v) as DynValue),
            Err(e) => Err(InvokeError::other(e)),
        }
    }

    fn dest_type() -> TypeInfo {
        TypeInfo::of::<T>()
    }
}
