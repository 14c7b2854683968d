//! Types a handler argument can take, and how values of those types are
//! produced.
//!
//! Every handler input must implement [`Injectable`]. The trait carries
//! two compile-time capabilities: whether the type can be parsed out of a
//! path parameter, and whether it can be decoded from a request payload.
//! Resolution itself is decided once, at registration, from these flags
//! plus the registered dependencies — never per request.

use std::any::{self, Any, TypeId};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::SystemTime;

use crate::context::Context;
use crate::error::InvokeError;
use crate::method::Method;
use crate::request::Request;

/// A dynamically-typed injected value.
pub type DynValue = Arc<dyn Any + Send + Sync>;

/// Runtime identity of an injectable type; the name is kept for boot-time
/// error messages only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeInfo {
    pub id: TypeId,
    pub name: &'static str,
}

impl TypeInfo {
    pub fn of<T: 'static>() -> Self {
        Self { id: TypeId::of::<T>(), name: any::type_name::<T>() }
    }
}

/// A type that can appear as a handler (or dependency function) input.
///
/// The defaults make a type resolvable from registered dependencies only.
/// Scalars override `FROM_PARAM`; payload structs get `FROM_PAYLOAD`
/// through the [`payload!`](crate::payload) macro.
pub trait Injectable: Any + Clone + Send + Sync + Sized {
    /// The type can be parsed from a path parameter value.
    const FROM_PARAM: bool = false;
    /// The type can be decoded from the request body.
    const FROM_PAYLOAD: bool = false;

    fn from_param(_raw: &str) -> Option<Self> {
        None
    }

    fn from_payload(_ctx: &Context) -> Option<Result<Self, InvokeError>> {
        None
    }
}

/// One input slot of a handler function: its position, identity, and the
/// capability thunks captured from the [`Injectable`] impl.
#[derive(Clone, Copy)]
pub struct Input {
    pub index: usize,
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub(crate) param: Option<fn(&str) -> Option<DynValue>>,
    pub(crate) payload: Option<fn(&Context) -> Result<DynValue, InvokeError>>,
}

impl Input {
    pub fn of<T: Injectable>(index: usize) -> Self {
        Self {
            index,
            type_id: TypeId::of::<T>(),
            type_name: any::type_name::<T>(),
            param: if T::FROM_PARAM {
                Some(|raw| T::from_param(raw).map(|v| Arc::new(v) as DynValue))
            } else {
                None
            },
            payload: if T::FROM_PAYLOAD {
                Some(|ctx| match T::from_payload(ctx) {
                    Some(result) => result.map(|v| Arc::new(v) as DynValue),
                    None => Err(InvokeError::SeeOther),
                })
            } else {
                None
            },
        }
    }
}

pub(crate) fn downcast_value<T: Injectable>(value: &DynValue) -> Option<T> {
    value.downcast_ref::<T>().cloned()
}

// ── scalar param types ──────────────────────────────────────────────────

impl Injectable for String {
    const FROM_PARAM: bool = true;

    fn from_param(raw: &str) -> Option<Self> {
        Some(raw.to_owned())
    }
}

macro_rules! numeric_injectable {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Injectable for $ty {
                const FROM_PARAM: bool = true;

                // unparseable values fall back to the type's zero, the
                // same contract as Params::int
                fn from_param(raw: &str) -> Option<Self> {
                    Some(raw.parse().unwrap_or_default())
                }
            }
        )+
    };
}

numeric_injectable!(i32, i64, u32, u64, f64);

impl Injectable for bool {
    const FROM_PARAM: bool = true;

    fn from_param(raw: &str) -> Option<Self> {
        Some(raw.parse().unwrap_or(false))
    }
}

// ── framework types, resolvable through the builtin dependencies ────────

impl Injectable for Context {}
impl Injectable for Request {}
impl Injectable for Method {}
impl Injectable for SystemTime {}

/// The request headers as an injectable value.
#[derive(Clone, Debug)]
pub struct Headers(pub Vec<(String, String)>);

/// The client address as an injectable value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoteIp(pub IpAddr);

/// The response status code at injection time. A distinct type so it
/// never competes with integer path parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Code(pub u16);

impl Injectable for Headers {}
impl Injectable for RemoteIp {}
impl Injectable for Code {}

/// Marks plain service types as handler inputs, resolvable from
/// registered dependencies.
///
/// ```rust
/// # #[derive(Clone)] struct Database;
/// # #[derive(Clone)] struct Mailer;
/// arbor::injectable!(Database, Mailer);
/// ```
#[macro_export]
macro_rules! injectable {
    ($($ty:ty),+ $(,)?) => {
        $( impl $crate::di::Injectable for $ty {} )+
    };
}

/// Marks deserializable types as request payloads: when no dependency or
/// path parameter covers them, they are decoded from the request body by
/// content type.
///
/// ```rust
/// # use serde::Deserialize;
/// #[derive(Clone, Deserialize)]
/// struct CreateUser { name: String }
///
/// arbor::payload!(CreateUser);
/// ```
#[macro_export]
macro_rules! payload {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::di::Injectable for $ty {
                const FROM_PAYLOAD: bool = true;

                fn from_payload(
                    ctx: &$crate::Context,
                ) -> Option<Result<Self, $crate::InvokeError>> {
                    Some(ctx.read_body::<Self>())
                }
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_params_parse_with_zero_defaults() {
        assert_eq!(i32::from_param("42"), Some(42));
        assert_eq!(i32::from_param("nope"), Some(0));
        assert_eq!(bool::from_param("true"), Some(true));
        assert_eq!(bool::from_param("maybe"), Some(false));
        assert_eq!(String::from_param("x"), Some("x".to_owned()));
    }

    #[test]
    fn input_captures_capabilities() {
        let input = Input::of::<i32>(0);
        assert!(input.param.is_some());
        assert!(input.payload.is_none());

        let input = Input::of::<Code>(1);
        assert!(input.param.is_none());
        assert!(input.payload.is_none());
        assert_eq!(input.type_id, TypeId::of::<Code>());
    }

    #[test]
    fn downcast_recovers_the_value() {
        let v: DynValue = Arc::new(7i64);
        assert_eq!(downcast_value::<i64>(&v), Some(7));
        assert_eq!(downcast_value::<i32>(&v), None);
    }
}
