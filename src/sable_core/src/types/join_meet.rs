use crate::global_state::GlobalState;
use crate::symbols::SymbolRef;
use crate::types::subtyping::is_subtype;
use crate::types::Type;

/// Least upper bound. Commutative, associative, idempotent; absorbs
/// `Untyped`; class pairs reduce to their nearest common ancestor.
pub fn join(gs: &GlobalState, a: &Type, b: &Type) -> Type {
    if a.is_untyped() || b.is_untyped() {
        return Type::Untyped;
    }
    if is_subtype(gs, a, b) {
        return b.clone();
    }
    if is_subtype(gs, b, a) {
        return a.clone();
    }

    let a = a.dealias(gs);
    let b = b.dealias(gs);

    // Unions distribute: join with each side flattened, then re-normalize.
    if matches!(a, Type::Or(..)) || matches!(b, Type::Or(..)) {
        let mut comps = a.or_components();
        for c in b.or_components() {
            if let Some(existing) = comps.iter_mut().find(|x| joinable(gs, x, &c)) {
                *existing = join(gs, existing, &c);
            } else {
                comps.push(c);
            }
        }
        return absorb(gs, comps);
    }

    match (&a, &b) {
        // nil and the boolean singletons keep their identity in joins:
        // collapsing `NilClass | Integer` to `Object` would erase exactly
        // the distinction the refinement rules rely on.
        (Type::Class(x), Type::Class(y)) => {
            if keeps_union_identity(*x) || keeps_union_identity(*y) {
                Type::any(vec![a.clone(), b.clone()])
            } else {
                Type::Class(lca(gs, *x, *y))
            }
        }
        (Type::Literal(x), Type::Literal(y)) => {
            let cx = x.underlying_class();
            let cy = y.underlying_class();
            if cx == cy {
                Type::Class(cx)
            } else {
                join(gs, &Type::Class(cx), &Type::Class(cy))
            }
        }
        (Type::Tuple(xs), Type::Tuple(ys)) if xs.len() == ys.len() => Type::Tuple(
            xs.iter()
                .zip(ys.iter())
                .map(|(x, y)| join(gs, x, y))
                .collect(),
        ),
        (
            Type::Shape { keys: ka, values: va },
            Type::Shape { keys: kb, values: vb },
        ) if same_key_set(ka, kb) => Type::Shape {
            keys: ka.clone(),
            values: ka
                .iter()
                .zip(va.iter())
                .map(|(k, v)| {
                    let i = kb.iter().position(|x| x == k).unwrap();
                    join(gs, v, &vb[i])
                })
                .collect(),
        },
        (
            Type::Applied { class: c1, args: a1 },
            Type::Applied { class: c2, args: a2 },
        ) if c1 == c2 && a1.len() == a2.len() => Type::Applied {
            class: *c1,
            args: a1
                .iter()
                .zip(a2.iter())
                .map(|(x, y)| join(gs, x, y))
                .collect(),
        },
        // Proxies against something else: retry through the underlying
        // class before giving up on a shared shape.
        (p, _) if p.is_proxy() => join(gs, &p.underlying(gs), &b),
        (_, p) if p.is_proxy() => join(gs, &a, &p.underlying(gs)),
        _ => Type::any(vec![a.clone(), b.clone()]),
    }
}

/// Greatest lower bound, dual to `join`. Comparable classes keep the
/// more-derived side; incomparable classes bottom out.
pub fn meet(gs: &GlobalState, a: &Type, b: &Type) -> Type {
    if a.is_untyped() || b.is_untyped() {
        return Type::Untyped;
    }
    if is_subtype(gs, a, b) {
        return a.clone();
    }
    if is_subtype(gs, b, a) {
        return b.clone();
    }

    let a = a.dealias(gs);
    let b = b.dealias(gs);

    // Meet distributes over unions on either side.
    if matches!(a, Type::Or(..)) {
        let comps = a
            .or_components()
            .into_iter()
            .map(|c| meet(gs, &c, &b))
            .collect();
        return Type::any(comps);
    }
    if matches!(b, Type::Or(..)) {
        let comps = b
            .or_components()
            .into_iter()
            .map(|c| meet(gs, &a, &c))
            .collect();
        return Type::any(comps);
    }

    match (&a, &b) {
        // The subtype short-circuit above already handled comparable
        // classes; what remains shares no ancestry order.
        (Type::Class(_), Type::Class(_)) => Type::Bottom,
        (Type::Literal(_), Type::Literal(_)) => Type::Bottom,
        (Type::Tuple(xs), Type::Tuple(ys)) if xs.len() == ys.len() => {
            let elems: Vec<Type> = xs
                .iter()
                .zip(ys.iter())
                .map(|(x, y)| meet(gs, x, y))
                .collect();
            if elems.iter().any(|t| t.is_bottom()) {
                Type::Bottom
            } else {
                Type::Tuple(elems)
            }
        }
        (
            Type::Applied { class: c1, args: a1 },
            Type::Applied { class: c2, args: a2 },
        ) if c1 == c2 && a1.len() == a2.len() => {
            let args: Vec<Type> = a1
                .iter()
                .zip(a2.iter())
                .map(|(x, y)| meet(gs, x, y))
                .collect();
            Type::Applied { class: *c1, args }
        }
        _ => Type::all(vec![a.clone(), b.clone()]),
    }
}

fn keeps_union_identity(class: SymbolRef) -> bool {
    use crate::symbols::Symbols;
    class == Symbols::NIL_CLASS
        || class == Symbols::TRUE_CLASS
        || class == Symbols::FALSE_CLASS
}

/// Nearest common ancestor in linearization order: the first entry of
/// `a`'s ancestry that `b` also derives from.
fn lca(gs: &GlobalState, a: SymbolRef, b: SymbolRef) -> SymbolRef {
    for anc in gs.linearization_of(a) {
        if gs.derives(b, anc) {
            return anc;
        }
    }
    crate::symbols::Symbols::OBJECT
}

/// Whether two union components collapse into one primitive join (same
/// shape family) rather than staying separate.
fn joinable(gs: &GlobalState, a: &Type, b: &Type) -> bool {
    is_subtype(gs, a, b) || is_subtype(gs, b, a)
}

fn absorb(gs: &GlobalState, comps: Vec<Type>) -> Type {
    let mut kept: Vec<Type> = Vec::new();
    for c in comps {
        if kept.iter().any(|k| is_subtype(gs, &c, k)) {
            continue;
        }
        kept.retain(|k| !is_subtype(gs, k, &c));
        kept.push(c);
    }
    Type::any(kept)
}

fn same_key_set(a: &[crate::types::LiteralValue], b: &[crate::types::LiteralValue]) -> bool {
    a.len() == b.len() && a.iter().all(|k| b.contains(k))
}
