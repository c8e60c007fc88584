use crate::global_state::GlobalState;
use crate::symbols::SymbolRef;
use crate::types::{Type, TypeConstraint, TypeVarId};

/// Substitute solved type variables by their bounds; unsolved variables
/// are left intact. Idempotent once every variable is solved.
pub fn instantiate(_gs: &GlobalState, ty: &Type, constr: &TypeConstraint) -> Type {
    map_type(ty, &mut |t| match t {
        Type::TypeVar(id) => constr.solution(*id).cloned(),
        _ => None,
    })
    .unwrap_or_else(|| ty.clone())
}

/// Replace the self-type marker with a concrete receiver type.
pub fn replace_self_type(_gs: &GlobalState, ty: &Type, self_ty: &Type) -> Type {
    map_type(ty, &mut |t| match t {
        Type::SelfType => Some(self_ty.clone()),
        _ => None,
    })
    .unwrap_or_else(|| ty.clone())
}

/// Re-express a type declared on `owner` in the coordinate system of an
/// applied use of that class: `owner`'s type members are replaced by the
/// supplied type arguments.
pub fn result_type_as_seen_from(
    gs: &GlobalState,
    ty: &Type,
    owner: SymbolRef,
    targs: &[Type],
) -> Type {
    let members = &gs.symbol(owner).type_members;
    if members.is_empty() || targs.is_empty() {
        return ty.clone();
    }
    let pairs: Vec<(TypeVarId, &Type)> = members
        .iter()
        .zip(targs.iter())
        .filter_map(|(m, arg)| gs.symbol(*m).type_var.map(|v| (v, arg)))
        .collect();
    map_type(ty, &mut |t| match t {
        Type::TypeVar(id) => pairs
            .iter()
            .find(|(v, _)| v == id)
            .map(|(_, arg)| (*arg).clone()),
        _ => None,
    })
    .unwrap_or_else(|| ty.clone())
}

/// Bottom-up structural rewrite. `f` returns `Some(replacement)` for nodes
/// it wants to substitute; returns `None` when nothing changed.
fn map_type(ty: &Type, f: &mut impl FnMut(&Type) -> Option<Type>) -> Option<Type> {
    if let Some(replaced) = f(ty) {
        return Some(replaced);
    }
    match ty {
        Type::Applied { class, args } => {
            let mapped: Vec<Option<Type>> = args.iter().map(|a| map_type(a, f)).collect();
            if mapped.iter().all(Option::is_none) {
                None
            } else {
                let args = args
                    .iter()
                    .zip(mapped)
                    .map(|(orig, m)| m.unwrap_or_else(|| orig.clone()))
                    .collect();
                Some(Type::Applied {
                    class: *class,
                    args,
                })
            }
        }
        Type::Tuple(elems) => {
            let mapped: Vec<Option<Type>> = elems.iter().map(|e| map_type(e, f)).collect();
            if mapped.iter().all(Option::is_none) {
                None
            } else {
                Some(Type::Tuple(
                    elems
                        .iter()
                        .zip(mapped)
                        .map(|(orig, m)| m.unwrap_or_else(|| orig.clone()))
                        .collect(),
                ))
            }
        }
        Type::Shape { keys, values } => {
            let mapped: Vec<Option<Type>> = values.iter().map(|v| map_type(v, f)).collect();
            if mapped.iter().all(Option::is_none) {
                None
            } else {
                Some(Type::Shape {
                    keys: keys.clone(),
                    values: values
                        .iter()
                        .zip(mapped)
                        .map(|(orig, m)| m.unwrap_or_else(|| orig.clone()))
                        .collect(),
                })
            }
        }
        Type::Or(l, r) => {
            let ml = map_type(l, f);
            let mr = map_type(r, f);
            if ml.is_none() && mr.is_none() {
                None
            } else {
                Some(Type::any(vec![
                    ml.unwrap_or_else(|| (**l).clone()),
                    mr.unwrap_or_else(|| (**r).clone()),
                ]))
            }
        }
        Type::And(l, r) => {
            let ml = map_type(l, f);
            let mr = map_type(r, f);
            if ml.is_none() && mr.is_none() {
                None
            } else {
                Some(Type::all(vec![
                    ml.unwrap_or_else(|| (**l).clone()),
                    mr.unwrap_or_else(|| (**r).clone()),
                ]))
            }
        }
        Type::MetaType(inner) => map_type(inner, f).map(|t| Type::MetaType(Box::new(t))),
        _ => None,
    }
}
