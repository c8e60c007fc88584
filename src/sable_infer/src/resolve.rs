// Constant lookup and surface-type resolution against the symbol table.
// Read-only: callers collect errors and decide where they go.

use sable_core::{
    DiagnosticCode, GlobalState, LiteralValue, Symbols, SymbolRef, Type, TypeVarId,
};
use sable_syntax::TypeExpr;
use std::collections::HashMap;

use crate::SpannedError;

/// Resolve a possibly-qualified constant name lexically: the innermost
/// enclosing class first, then outward to the root.
pub fn lookup_constant(gs: &GlobalState, scope: SymbolRef, name: &str) -> Option<SymbolRef> {
    let mut segments = name.split("::");
    let first = segments.next()?;
    let mut found = None;
    let mut cur = scope;
    loop {
        if let Some(member) = constant_member(gs, cur, first) {
            found = Some(member);
            break;
        }
        if cur == Symbols::ROOT {
            break;
        }
        cur = gs.symbol(cur).owner;
    }
    let mut sym = found?;
    for seg in segments {
        sym = constant_member(gs, sym, seg)?;
    }
    Some(sym)
}

fn constant_member(gs: &GlobalState, owner: SymbolRef, name: &str) -> Option<SymbolRef> {
    let raw = gs.lookup_name_utf8(name)?;
    let cname = gs.lookup_name_constant(raw)?;
    gs.symbol(owner).members.get(&cname).copied()
}

/// Lower a surface type expression to a `Type`. `type_params` maps the
/// enclosing sig's `type_parameters` names to their variables.
pub fn resolve_type_expr(
    gs: &GlobalState,
    scope: SymbolRef,
    texpr: &TypeExpr,
    type_params: &HashMap<String, TypeVarId>,
    errors: &mut Vec<SpannedError>,
) -> Type {
    match texpr {
        TypeExpr::Untyped(_) => Type::Untyped,
        TypeExpr::Anything(_) => Type::Top,
        TypeExpr::NoReturn(_) => Type::Bottom,
        TypeExpr::SelfType(_) => Type::SelfType,
        TypeExpr::Boolean(_) => Type::boolean(),
        TypeExpr::Name(name, span) => match lookup_constant(gs, scope, name) {
            Some(sym) if gs.symbol(sym).is_type_alias() => Type::Alias(sym),
            Some(sym) if gs.symbol(sym).is_class() => Type::Class(sym),
            // A class's own type member, referenced by name in its sigs.
            Some(sym)
                if gs.symbol(sym).flags.has(sable_core::SymbolFlags::TYPE_MEMBER)
                    && gs.symbol(sym).type_var.is_some() =>
            {
                Type::TypeVar(gs.symbol(sym).type_var.unwrap())
            }
            _ => {
                errors.push(SpannedError {
                    code: DiagnosticCode::SBE02001,
                    message: format!("unable to resolve constant `{}`", name),
                    span: *span,
                });
                Type::Untyped
            }
        },
        TypeExpr::Nilable(inner, _) => {
            Type::nilable(resolve_type_expr(gs, scope, inner, type_params, errors))
        }
        TypeExpr::Any(list, _) => Type::any(
            list.iter()
                .map(|t| resolve_type_expr(gs, scope, t, type_params, errors))
                .collect(),
        ),
        TypeExpr::All(list, _) => Type::all(
            list.iter()
                .map(|t| resolve_type_expr(gs, scope, t, type_params, errors))
                .collect(),
        ),
        TypeExpr::ClassOf(inner, _) => Type::MetaType(Box::new(resolve_type_expr(
            gs,
            scope,
            inner,
            type_params,
            errors,
        ))),
        TypeExpr::Tuple(elems, _) => Type::Tuple(
            elems
                .iter()
                .map(|t| resolve_type_expr(gs, scope, t, type_params, errors))
                .collect(),
        ),
        TypeExpr::Shape(fields, _) => {
            let mut keys = Vec::new();
            let mut values = Vec::new();
            for (key, value) in fields {
                // Keys are interned during indexing; a key showing up only
                // on the fast path degrades the shape to its underlying
                // hash rather than growing the frozen name table.
                match gs.lookup_name_utf8(key) {
                    Some(n) => {
                        keys.push(LiteralValue::Sym(n));
                        values.push(resolve_type_expr(gs, scope, value, type_params, errors));
                    }
                    None => {
                        let value = resolve_type_expr(gs, scope, value, type_params, errors);
                        return Type::Applied {
                            class: Symbols::HASH,
                            args: vec![Type::Class(Symbols::SYMBOL), value],
                        };
                    }
                }
            }
            Type::Shape { keys, values }
        }
        TypeExpr::Applied { base, args, span } => {
            let class = match lookup_constant(gs, scope, base) {
                Some(sym) if gs.symbol(sym).is_class() => sym,
                _ => {
                    errors.push(SpannedError {
                        code: DiagnosticCode::SBE02001,
                        message: format!("unable to resolve constant `{}`", base),
                        span: *span,
                    });
                    return Type::Untyped;
                }
            };
            let expected = gs.symbol(class).type_members.len();
            if expected != args.len() {
                errors.push(SpannedError {
                    code: DiagnosticCode::SBE02005,
                    message: format!(
                        "wrong number of type arguments for `{}`: expected {}, got {}",
                        gs.symbol_name_str(class),
                        expected,
                        args.len()
                    ),
                    span: *span,
                });
            }
            Type::Applied {
                class,
                args: args
                    .iter()
                    .map(|t| resolve_type_expr(gs, scope, t, type_params, errors))
                    .collect(),
            }
        }
        TypeExpr::TypeParameter(name, span) => match type_params.get(name) {
            Some(var) => Type::TypeVar(*var),
            None => {
                errors.push(SpannedError {
                    code: DiagnosticCode::SBE02001,
                    message: format!(
                        "`T.type_parameter(:{})` is not declared by `type_parameters`",
                        name
                    ),
                    span: *span,
                });
                Type::Untyped
            }
        },
    }
}
