// Method dispatch: linearized lookup, arity and keyword matching, generic
// unification through a per-call-site constraint, and the error triple
// (does-not-exist / arity / argument type).

use crate::SpannedError;
use log::trace;
use sable_core::types::{
    instantiate, is_subtype_under, join, replace_self_type, result_type_as_seen_from,
};
use sable_core::{
    DiagnosticCode, GlobalState, SymbolRef, Type, TypeConstraint,
};
use sable_syntax::Span;

#[derive(Debug, Clone)]
pub struct CallArg {
    pub keyword: Option<String>,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub return_type: Type,
    pub resolved: Option<SymbolRef>,
}

impl DispatchResult {
    fn untyped() -> DispatchResult {
        DispatchResult {
            return_type: Type::Untyped,
            resolved: None,
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn dispatch_send(
    gs: &GlobalState,
    recv_ty: &Type,
    method: &str,
    args: &[CallArg],
    is_private_ok: bool,
    span: Span,
    name_span: Span,
    errors: &mut Vec<SpannedError>,
) -> DispatchResult {
    match recv_ty {
        // The dynamic escape hatch: failed lookups upstream already
        // produced untyped, and calls on it succeed with untyped.
        Type::Untyped => DispatchResult::untyped(),
        // Calls on provably-unreachable values contribute nothing.
        Type::Bottom => DispatchResult {
            return_type: Type::Bottom,
            resolved: None,
        },
        Type::Alias(_) => dispatch_send(
            gs,
            &recv_ty.dealias(gs),
            method,
            args,
            is_private_ok,
            span,
            name_span,
            errors,
        ),
        // Union receiver: dispatch on every component, join the results.
        Type::Or(..) => {
            let mut result: Option<Type> = None;
            let mut resolved = None;
            for comp in recv_ty.or_components() {
                let r = dispatch_send(
                    gs,
                    &comp,
                    method,
                    args,
                    is_private_ok,
                    span,
                    name_span,
                    errors,
                );
                resolved = resolved.or(r.resolved);
                result = Some(match result {
                    Some(acc) => join(gs, &acc, &r.return_type),
                    None => r.return_type,
                });
            }
            DispatchResult {
                return_type: result.unwrap_or(Type::Untyped),
                resolved,
            }
        }
        // Intersection receiver: the first component that dispatches
        // cleanly wins.
        Type::And(..) => {
            let comps = recv_ty.and_components();
            for comp in &comps {
                let mut scratch = Vec::new();
                let r = dispatch_send(
                    gs,
                    comp,
                    method,
                    args,
                    is_private_ok,
                    span,
                    name_span,
                    &mut scratch,
                );
                if scratch.is_empty() {
                    return r;
                }
            }
            dispatch_send(
                gs,
                &comps[0],
                method,
                args,
                is_private_ok,
                span,
                name_span,
                errors,
            )
        }
        // `Foo.new` produces an instance; everything else on a class
        // object goes through the class hierarchy.
        Type::MetaType(inner) if method == "new" => DispatchResult {
            return_type: (**inner).clone(),
            resolved: None,
        },
        Type::MetaType(_) | Type::Literal(_) | Type::Tuple(_) | Type::Shape { .. } => {
            let underlying = recv_ty.underlying(gs);
            dispatch_send(
                gs,
                &underlying,
                method,
                args,
                is_private_ok,
                span,
                name_span,
                errors,
            )
        }
        Type::Class(class) => dispatch_on_class(
            gs,
            recv_ty,
            *class,
            &[],
            method,
            args,
            is_private_ok,
            span,
            name_span,
            errors,
        ),
        Type::Applied { class, args: targs } => {
            let targs = targs.clone();
            dispatch_on_class(
                gs,
                recv_ty,
                *class,
                &targs,
                method,
                args,
                is_private_ok,
                span,
                name_span,
                errors,
            )
        }
        // Out-of-scope shapes behave gradually rather than erroring.
        Type::Top | Type::SelfType | Type::TypeVar(_) => DispatchResult::untyped(),
    }
}

#[allow(clippy::too_many_arguments)]
fn dispatch_on_class(
    gs: &GlobalState,
    recv_ty: &Type,
    class: SymbolRef,
    targs: &[Type],
    method: &str,
    args: &[CallArg],
    is_private_ok: bool,
    _span: Span,
    name_span: Span,
    errors: &mut Vec<SpannedError>,
) -> DispatchResult {
    let found = lookup_method(gs, class, method);
    let (defining_class, method_sym) = match found {
        Some(pair) => pair,
        None => {
            errors.push(SpannedError::new(
                DiagnosticCode::SBE04001,
                format!(
                    "method `{}` does not exist on `{}`",
                    method,
                    recv_ty.show(gs)
                ),
                name_span,
            ));
            return DispatchResult::untyped();
        }
    };
    trace!(
        "dispatch {}#{} -> {}",
        recv_ty.show(gs),
        method,
        gs.symbol_name_str(defining_class)
    );
    let sym = gs.symbol(method_sym);

    if sym.is_private() && !is_private_ok {
        errors.push(SpannedError::new(
            DiagnosticCode::SBE04007,
            format!(
                "non-private call to private method `{}` on `{}`",
                method,
                recv_ty.show(gs)
            ),
            name_span,
        ));
    }

    // Fresh constraint per call site, over the method's type parameters.
    let domain: Vec<_> = sym
        .type_arguments
        .iter()
        .filter_map(|&ta| gs.symbol(ta).type_var)
        .collect();
    let is_generic = !domain.is_empty();
    let mut constraint = TypeConstraint::new(domain);

    let seen_from = |t: &Type| -> Type {
        let t = if gs.symbol(defining_class).type_members.is_empty() || targs.is_empty() {
            t.clone()
        } else {
            result_type_as_seen_from(gs, t, defining_class, targs)
        };
        replace_self_type(gs, &t, recv_ty)
    };

    // Positional arity.
    let positional_params: Vec<_> = sym.positional_args().cloned().collect();
    let required = positional_params
        .iter()
        .filter(|p| !p.flags.optional)
        .count();
    let positional_args: Vec<&CallArg> =
        args.iter().filter(|a| a.keyword.is_none()).collect();
    if positional_args.len() < required || positional_args.len() > positional_params.len() {
        let expected = if required == positional_params.len() {
            format!("{}", required)
        } else {
            format!("{}..{}", required, positional_params.len())
        };
        errors.push(SpannedError::new(
            DiagnosticCode::SBE04002,
            format!(
                "wrong number of arguments to `{}`: expected {}, got {}",
                method,
                expected,
                positional_args.len()
            ),
            name_span,
        ));
        return DispatchResult {
            return_type: Type::Untyped,
            resolved: Some(method_sym),
        };
    }

    for (param, arg) in positional_params.iter().zip(positional_args.iter()) {
        check_arg(gs, &seen_from(&param.ty), arg, &mut constraint, errors);
    }

    // Keywords: every declared required keyword must arrive; every arriving
    // keyword must be declared.
    let keyword_params: Vec<_> = sym.keyword_args().cloned().collect();
    for param in &keyword_params {
        let pname = gs.name_str(param.name);
        match args
            .iter()
            .find(|a| a.keyword.as_deref() == Some(pname.as_str()))
        {
            Some(arg) => check_arg(gs, &seen_from(&param.ty), arg, &mut constraint, errors),
            None if !param.flags.optional => {
                errors.push(SpannedError::new(
                    DiagnosticCode::SBE04008,
                    format!("missing required keyword argument `{}` for `{}`", pname, method),
                    name_span,
                ));
            }
            None => {}
        }
    }
    for arg in args.iter().filter(|a| a.keyword.is_some()) {
        let kw = arg.keyword.as_deref().unwrap();
        if !keyword_params
            .iter()
            .any(|p| gs.name_str(p.name) == kw)
        {
            errors.push(SpannedError::new(
                DiagnosticCode::SBE04009,
                format!("unknown keyword argument `{}` for `{}`", kw, method),
                arg.span,
            ));
        }
    }

    let mut return_type = seen_from(&sym.result_type);
    if is_generic {
        constraint.solve(gs);
        return_type = instantiate(gs, &return_type, &constraint);
    }
    DispatchResult {
        return_type,
        resolved: Some(method_sym),
    }
}

fn check_arg(
    gs: &GlobalState,
    param_ty: &Type,
    arg: &CallArg,
    constraint: &mut TypeConstraint,
    errors: &mut Vec<SpannedError>,
) {
    let ok = is_subtype_under(gs, &mut Some(constraint), &arg.ty, param_ty);
    if !ok {
        errors.push(SpannedError::new(
            DiagnosticCode::SBE04003,
            format!(
                "expected `{}`, got `{}`",
                param_ty.show(gs),
                show_widened(gs, &arg.ty)
            ),
            arg.span,
        ));
    }
}

/// Walk the receiver's linearization and return the first concrete
/// definition of `method`.
pub fn lookup_method(
    gs: &GlobalState,
    class: SymbolRef,
    method: &str,
) -> Option<(SymbolRef, SymbolRef)> {
    let raw = gs.lookup_name_utf8(method)?;
    for anc in gs.linearization_of(class) {
        if let Some(&member) = gs.symbol(anc).members.get(&raw) {
            if gs.symbol(member).is_method() {
                return Some((anc, member));
            }
        }
    }
    None
}

/// Literals render as their class in user-facing mismatch messages.
pub fn show_widened(gs: &GlobalState, ty: &Type) -> String {
    match ty {
        Type::Literal(_) => ty.underlying(gs).show(gs),
        other => other.show(gs),
    }
}

