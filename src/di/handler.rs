//! Typed handler functions and their conversion into route handlers.
//!
//! # How typed handlers are stored
//!
//! A route handler is `Fn(&Context)`, but users write plain functions
//! over their own argument types. [`TypedFn`] bridges the two: it is
//! implemented for every function of up to eight [`Injectable`]
//! arguments, exposes the argument list as [`Input`] descriptors for the
//! binder, and knows how to call the function from a resolved argument
//! vector. Monomorphization does the work reflection would otherwise do —
//! each handler signature gets its own `inputs`/`invoke` pair at compile
//! time, and dispatch costs one vtable call.
//!
//! Static bindings are evaluated once here, when the handler is built;
//! per-request bindings run in slot order with the flow sentinels
//! ([`InvokeError::SeeOther`], [`InvokeError::StopExecution`]) honored
//! between them.

use std::sync::Arc;

use crate::context::Context;
use crate::di::binding::Binding;
use crate::di::dependency::{Dependency, DependencyHandler, IntoDependencyValue};
use crate::di::injectable::{downcast_value, DynValue, Injectable, Input};
use crate::error::InvokeError;
use crate::response::IntoResponse;
use crate::router::{handler, Handler};

/// Handles a binding or invocation failure. The default writes a `400`
/// with the error text and stops the chain.
pub type ErrorHandler = Arc<dyn Fn(&Context, &InvokeError) + Send + Sync>;

/// Implemented for every plain function whose arguments are all
/// [`Injectable`], up to eight of them.
///
/// You never implement this yourself; the blanket impls below cover all
/// eligible functions, and the private `Sealed` supertrait keeps it that
/// way.
pub trait TypedFn<Args>: private::Sealed<Args> + Send + Sync + 'static {
    type Output;

    #[doc(hidden)]
    fn inputs() -> Vec<Input>;

    #[doc(hidden)]
    fn invoke(&self, args: Vec<DynValue>) -> Self::Output;
}

mod private {
    pub trait Sealed<Args> {}
}

fn take_arg<T: Injectable>(args: &[DynValue], index: usize) -> T {
    // the binder resolved this slot against TypeId::of::<T>() at
    // registration; a mismatch here is a bug, not a request condition
    downcast_value(&args[index]).expect("binding produced a value of the wrong type")
}

macro_rules! typed_fn {
    ($($ty:ident $idx:tt),*) => {
        impl<F, R, $($ty,)*> private::Sealed<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> R + Send + Sync + 'static,
            R: 'static,
            $($ty: Injectable,)*
        {
        }

        impl<F, R, $($ty,)*> TypedFn<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> R + Send + Sync + 'static,
            R: 'static,
            $($ty: Injectable,)*
        {
            type Output = R;

            fn inputs() -> Vec<Input> {
                vec![$(Input::of::<$ty>($idx),)*]
            }

            #[allow(unused_variables)]
            fn invoke(&self, args: Vec<DynValue>) -> R {
                (self)($(take_arg::<$ty>(&args, $idx),)*)
            }
        }
    };
}

typed_fn!();
typed_fn!(A1 0);
typed_fn!(A1 0, A2 1);
typed_fn!(A1 0, A2 1, A3 2);
typed_fn!(A1 0, A2 1, A3 2, A4 3);
typed_fn!(A1 0, A2 1, A3 2, A4 3, A5 4);
typed_fn!(A1 0, A2 1, A3 2, A4 3, A5 4, A6 5);
typed_fn!(A1 0, A2 1, A3 2, A4 3, A5 4, A6 5, A7 6);
typed_fn!(A1 0, A2 1, A3 2, A4 3, A5 4, A6 5, A7 6, A8 7);

/// Builds the route handler for `f` from its resolved bindings.
pub(crate) fn make_handler<Args, F>(
    f: F,
    bindings: Vec<Binding>,
    error_handler: ErrorHandler,
) -> Handler
where
    F: TypedFn<Args>,
    F::Output: IntoResponse,
{
    let arity = bindings.len();

    // static slots are produced once, against a request-free context
    let boot = Context::detached();
    let static_values: Vec<Option<DynValue>> = bindings
        .iter()
        .map(|b| b.is_static.then(|| (b.handle)(&boot, &b.input).ok()).flatten())
        .collect();

    handler(move |ctx| {
        let mut args: Vec<Option<DynValue>> = vec![None; arity];

        for (b, precomputed) in bindings.iter().zip(&static_values) {
            let value = match precomputed {
                Some(v) => v.clone(),
                None => match (b.handle)(ctx, &b.input) {
                    Ok(v) => v,
                    Err(InvokeError::SeeOther) => continue,
                    Err(InvokeError::StopExecution) => {
                        ctx.stop_execution();
                        return;
                    }
                    Err(err) => {
                        error_handler(ctx, &err);
                        return;
                    }
                },
            };
            args[b.input.index] = Some(value);
        }

        let mut filled = Vec::with_capacity(arity);
        for (i, slot) in args.into_iter().enumerate() {
            match slot {
                Some(v) => filled.push(v),
                None => {
                    // a skipped slot cannot reach the function
                    error_handler(
                        ctx,
                        &InvokeError::Message(format!("unresolved input at position {i}")),
                    );
                    return;
                }
            }
        }

        let out = f.invoke(filled);
        ctx.respond(out.into_response());
    })
}

/// Builds a dependency out of a function over previously registered
/// dependencies. Static iff everything it consumes is static.
pub(crate) fn dependency_from_typed_fn<Args, F>(
    f: F,
    bindings: Vec<Binding>,
) -> Dependency
where
    F: TypedFn<Args>,
    F::Output: IntoDependencyValue,
{
    let is_static = bindings.iter().all(|b| b.is_static);
    let dest = <F::Output as IntoDependencyValue>::dest_type();

    let handle: DependencyHandler = Arc::new(move |ctx: &Context, _: &Input| {
        let mut args = Vec::with_capacity(bindings.len());
        for b in &bindings {
            args.push((b.handle)(ctx, &b.input)?);
        }
        f.invoke(args).into_dependency_value()
    });

    Dependency {
        handle,
        dest: Some(dest),
        is_static,
        explicit: false,
        debug: format!("dependent_fn<{}>", dest.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_follow_argument_order() {
        let inputs = <fn(String, i64, bool) as TypedFn<(String, i64, bool)>>::inputs();
        assert_eq!(inputs.len(), 3);
        assert_eq!(inputs[0].index, 0);
        assert!(inputs[0].type_name.contains("String"));
        assert_eq!(inputs[2].index, 2);
        assert!(inputs[2].type_name.contains("bool"));
    }

    #[test]
    fn invoke_passes_resolved_values() {
        let f = |a: i64, b: String| format!("{a}-{b}");
        let args: Vec<DynValue> = vec![Arc::new(7i64), Arc::new(String::from("x"))];
        assert_eq!(f.invoke(args), "7-x");
    }
}
