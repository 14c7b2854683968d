//! Resolution of handler inputs against registered dependencies,
//! computed once at registration.
//!
//! The rules, in order, per input:
//!
//! 1. the most recently registered matching dependency wins; non-explicit
//!    dependencies serve a single input each,
//! 2. a param-capable input on a route with path parameters prefers the
//!    parameter slot, falling back to a matched dependency when the
//!    request carries no value for it,
//! 3. a payload-capable input with no match decodes the request body
//!    (first consulting per-request dependencies registered on the
//!    context),
//! 4. anything left unresolved fails the registration.
//!
//! Parameter slots are positional. When a handler expects fewer
//! parameters than the route declares, the trailing slots are assigned —
//! `/users/:id/friends/:fid` with `fn(fid: u64)` binds `fid`, not `id`.

use std::collections::HashSet;
use std::sync::Arc;

use crate::context::Context;
use crate::di::dependency::{Dependency, DependencyHandler};
use crate::di::injectable::{DynValue, Input};
use crate::error::{BindError, InvokeError};

/// One resolved input slot: the input plus the handler that fills it.
#[derive(Clone)]
pub(crate) struct Binding {
    pub(crate) input: Input,
    pub(crate) handle: DependencyHandler,
    pub(crate) is_static: bool,
}

/// Resolves `inputs` against `deps`. Unresolvable inputs are simply
/// absent from the result; callers that require completeness go through
/// [`bindings_for_fn`].
///
/// `params_count` is the number of path parameters of the route, or
/// `None` when parameter binding is out of scope (dependent dependency
/// functions).
pub(crate) fn bindings_for(
    inputs: &[Input],
    deps: &[Dependency],
    disable_payload: bool,
    params_count: Option<usize>,
) -> Vec<Binding> {
    // trailing-slot reservation: count the inputs that could take a path
    // parameter, then start assigning from the end of the declared list
    let param_capable = match params_count {
        Some(_) => inputs.iter().filter(|i| i.param.is_some()).count(),
        None => 0,
    };
    let mut next_param_slot = params_count
        .unwrap_or(0)
        .saturating_sub(param_capable);

    let mut take_param_slot = || {
        let slot = next_param_slot;
        next_param_slot += 1;
        slot
    };

    let mut consumed: HashSet<usize> = HashSet::new();
    let mut bindings = Vec::with_capacity(inputs.len());

    for input in inputs {
        let param_parse = if params_count.is_some() { input.param } else { None };

        let matched = deps
            .iter()
            .enumerate()
            .rev()
            .find(|(j, d)| (d.explicit || !consumed.contains(j)) && d.matches(input));

        if let Some((j, dep)) = matched {
            if !dep.explicit {
                consumed.insert(j);
            }

            let (handle, is_static) = match param_parse {
                // parameter first, dependency as the fallback
                Some(parse) => (param_or(take_param_slot(), parse, dep.handle.clone()), false),
                None => (dep.handle.clone(), dep.is_static),
            };

            bindings.push(Binding { input: *input, handle, is_static });
            continue;
        }

        if let Some(parse) = param_parse {
            bindings.push(Binding {
                input: *input,
                handle: param_handler(take_param_slot(), parse),
                is_static: false,
            });
            continue;
        }

        if !disable_payload && input.payload.is_some() {
            bindings.push(Binding {
                input: *input,
                handle: payload_handler(),
                is_static: false,
            });
        }
    }

    bindings
}

/// Like [`bindings_for`], but every input must resolve; reports the
/// missing ones otherwise.
pub(crate) fn bindings_for_fn(
    target: &str,
    inputs: &[Input],
    deps: &[Dependency],
    disable_payload: bool,
    params_count: Option<usize>,
) -> Result<Vec<Binding>, BindError> {
    let bindings = bindings_for(inputs, deps, disable_payload, params_count);
    if bindings.len() == inputs.len() {
        return Ok(bindings);
    }

    let expected_inputs = inputs
        .iter()
        .map(|i| format!("[{}] {}", i.index + 1, i.type_name))
        .collect::<Vec<_>>()
        .join(", ");
    let missing_inputs = inputs
        .iter()
        .filter(|i| !bindings.iter().any(|b| b.input.index == i.index))
        .map(|i| format!("[{}] {}", i.index + 1, i.type_name))
        .collect::<Vec<_>>()
        .join(", ");

    Err(BindError::UnresolvedInputs {
        target: target.to_owned(),
        expected: inputs.len(),
        got: bindings.len(),
        expected_inputs,
        missing_inputs,
    })
}

/// Reads the positional path parameter `slot`; a request without that
/// slot defers to whatever comes next.
fn param_handler(slot: usize, parse: fn(&str) -> Option<DynValue>) -> DependencyHandler {
    Arc::new(move |ctx: &Context, _: &Input| {
        let params = ctx.params();
        match params.raw(slot) {
            Some(raw) => parse(raw).ok_or(InvokeError::SeeOther),
            None => Err(InvokeError::SeeOther),
        }
    })
}

fn param_or(
    slot: usize,
    parse: fn(&str) -> Option<DynValue>,
    fallback: DependencyHandler,
) -> DependencyHandler {
    let primary = param_handler(slot, parse);
    Arc::new(move |ctx: &Context, input: &Input| match primary(ctx, input) {
        Ok(v) => Ok(v),
        Err(_) => fallback(ctx, input),
    })
}

/// Decodes the input from the request: a context-registered per-request
/// dependency of the exact type first, then the body by content type.
fn payload_handler() -> DependencyHandler {
    Arc::new(|ctx: &Context, input: &Input| {
        if let Some(v) = ctx.raw_dependency(input.type_id) {
            return Ok(v);
        }

        let decode = input.payload.ok_or(InvokeError::SeeOther)?;
        decode(ctx)
    })
}
