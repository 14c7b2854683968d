//! Binding whole structs instead of argument lists.
//!
//! A service struct declares its injectable fields through
//! [`bind_target!`](crate::bind_target); the container then resolves
//! those fields exactly like function inputs. Fields already holding a
//! non-default value are kept as-is and take no binding. When every
//! resolved field is static the bound value is computed once and shared.

use crate::context::Context;
use crate::di::binding::{bindings_for, Binding};
use crate::di::container::Container;
use crate::di::injectable::{DynValue, Injectable, Input};
use crate::error::InvokeError;

/// A struct whose fields can be filled from a [`Container`].
///
/// Implemented through the [`bind_target!`](crate::bind_target) macro.
pub trait BindTarget: Injectable + Default + PartialEq {
    fn fields() -> Vec<Field<Self>>;
}

/// One injectable field of a [`BindTarget`].
pub struct Field<S> {
    pub name: &'static str,
    pub input: Input,
    pub is_filled: fn(&S) -> bool,
    pub assign: fn(&mut S, DynValue),
}

/// Declares the injectable fields of a struct.
///
/// Field types must be [`Injectable`] and the struct itself
/// `Default + PartialEq + Clone`:
///
/// ```rust
/// # #[derive(Clone, Default, PartialEq)] struct Database;
/// # arbor::injectable!(Database);
/// #[derive(Clone, Default, PartialEq)]
/// struct UserService {
///     db: Database,
///     prefix: String,
/// }
///
/// arbor::injectable!(UserService);
/// arbor::bind_target!(UserService { db: Database, prefix: String });
/// ```
#[macro_export]
macro_rules! bind_target {
    ($ty:ty { $($field:ident: $fty:ty),+ $(,)? }) => {
        impl $crate::di::BindTarget for $ty {
            fn fields() -> Vec<$crate::di::Field<Self>> {
                let mut fields = Vec::new();
                let mut index = 0usize;
                $(
                    fields.push($crate::di::Field {
                        name: stringify!($field),
                        input: $crate::di::Input::of::<$fty>(index),
                        is_filled: |s: &Self| s.$field != <$fty as Default>::default(),
                        assign: |s: &mut Self, v: $crate::di::DynValue| {
                            if let Some(v) = v.downcast_ref::<$fty>() {
                                s.$field = v.clone();
                            }
                        },
                    });
                    index += 1;
                )+
                let _ = index;
                fields
            }
        }
    };
}

/// The resolved field bindings of one [`BindTarget`], produced by
/// [`Container::bind_struct`].
pub struct StructBinder<S: BindTarget> {
    prototype: S,
    fields: Vec<Field<S>>,
    bindings: Vec<Binding>,
    singleton: Option<S>,
}

impl<S: BindTarget> StructBinder<S> {
    /// Produces a filled value for this request. Unresolvable fields
    /// keep their prototype values.
    pub fn acquire(&self, ctx: &Context) -> Result<S, InvokeError> {
        if let Some(s) = &self.singleton {
            return Ok(s.clone());
        }
        fill(self.prototype.clone(), &self.fields, &self.bindings, ctx)
    }

    /// Whether every bound field is static and the value is shared.
    pub fn is_singleton(&self) -> bool {
        self.singleton.is_some()
    }
}

fn fill<S: BindTarget>(
    mut value: S,
    fields: &[Field<S>],
    bindings: &[Binding],
    ctx: &Context,
) -> Result<S, InvokeError> {
    for b in bindings {
        match (b.handle)(ctx, &b.input) {
            Ok(v) => (fields[b.input.index].assign)(&mut value, v),
            Err(InvokeError::SeeOther) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(value)
}

impl Container {
    /// Resolves the open fields of `prototype` against the registered
    /// dependencies. Fields with non-default values are excluded from
    /// binding and survive untouched.
    pub fn bind_struct<S: BindTarget>(
        &self,
        prototype: S,
        params_count: usize,
    ) -> Result<StructBinder<S>, InvokeError> {
        let (prefilled, open): (Vec<_>, Vec<_>) = S::fields()
            .into_iter()
            .partition(|f| (f.is_filled)(&prototype));

        tracing::debug!(
            target_type = std::any::type_name::<S>(),
            prefilled = prefilled.len(),
            open = open.len(),
            "binding struct fields"
        );

        // re-index over the open fields only; prefilled ones own no slot
        let inputs: Vec<Input> = open
            .iter()
            .enumerate()
            .map(|(i, f)| Input { index: i, ..f.input })
            .collect();

        // a route without parameters must not param-wrap scalar fields,
        // or every one of them would lose its static binding
        let params = if params_count == 0 { None } else { Some(params_count) };
        let bindings = bindings_for(
            &inputs,
            self.dependencies(),
            self.payload_auto_binding_disabled(),
            params,
        );

        let singleton = if !bindings.is_empty() && bindings.iter().all(|b| b.is_static) {
            Some(fill(prototype.clone(), &open, &bindings, &Context::detached())?)
        } else {
            None
        };

        Ok(StructBinder { prototype, fields: open, bindings, singleton })
    }
}
