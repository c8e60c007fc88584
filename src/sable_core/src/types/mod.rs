// The type lattice. Construction keeps `Or`/`And` in canonical right-spine
// form so the subtype procedure never needs to re-normalize.

mod constraint;
mod instantiate;
mod join_meet;
mod show;
mod subtyping;

pub use constraint::TypeConstraint;
pub use instantiate::{instantiate, replace_self_type, result_type_as_seen_from};
pub use join_meet::{join, meet};
pub use subtyping::{is_subtype, is_subtype_under};

use crate::global_state::GlobalState;
use crate::names::NameRef;
use crate::symbols::{SymbolRef, Symbols};
use serde::{Deserialize, Serialize};

/// Id of a type variable, allocated from the global state when a type
/// member or generic-method type argument is declared.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TypeVarId(pub u32);

/// A primitive value used as a type. Floats are stored as bit patterns so
/// the whole tree stays `Eq` and hashable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiteralValue {
    Integer(i64),
    Float(u64),
    Str(NameRef),
    Sym(NameRef),
    Bool(bool),
}

impl LiteralValue {
    /// The class this literal belongs to.
    pub fn underlying_class(&self) -> SymbolRef {
        match self {
            LiteralValue::Integer(_) => Symbols::INTEGER,
            LiteralValue::Float(_) => Symbols::FLOAT,
            LiteralValue::Str(_) => Symbols::STRING,
            LiteralValue::Sym(_) => Symbols::SYMBOL,
            LiteralValue::Bool(true) => Symbols::TRUE_CLASS,
            LiteralValue::Bool(false) => Symbols::FALSE_CLASS,
        }
    }
}

/// The sealed sum of type shapes. Structural equality; `Untyped` is the
/// gradual escape hatch that is both a subtype and a supertype of
/// everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Untyped,
    Top,
    Bottom,
    Class(SymbolRef),
    Applied {
        class: SymbolRef,
        args: Vec<Type>,
    },
    Literal(LiteralValue),
    Tuple(Vec<Type>),
    Shape {
        keys: Vec<LiteralValue>,
        values: Vec<Type>,
    },
    /// Union; the left operand may be another `Or`, the right never is.
    Or(Box<Type>, Box<Type>),
    /// Intersection; normalized like `Or`.
    And(Box<Type>, Box<Type>),
    SelfType,
    TypeVar(TypeVarId),
    MetaType(Box<Type>),
    /// Reference to a `T.type_alias` static field; transparent to all
    /// operations after `dealias`.
    Alias(SymbolRef),
}

impl Type {
    pub fn nil() -> Type {
        Type::Class(Symbols::NIL_CLASS)
    }

    pub fn void() -> Type {
        Type::Class(Symbols::VOID)
    }

    pub fn boolean() -> Type {
        Type::any(vec![
            Type::Class(Symbols::TRUE_CLASS),
            Type::Class(Symbols::FALSE_CLASS),
        ])
    }

    pub fn nilable(ty: Type) -> Type {
        Type::any(vec![ty, Type::nil()])
    }

    pub fn is_untyped(&self) -> bool {
        matches!(self, Type::Untyped)
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, Type::Bottom)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Class(s) if *s == Symbols::VOID)
    }

    /// Normalized union of the given components: flattens nested `Or`s,
    /// dedups, drops `Bottom`, and folds into a right-spine.
    pub fn any(components: Vec<Type>) -> Type {
        let mut flat = Vec::new();
        for c in components {
            flatten_or(c, &mut flat);
        }
        flat.retain(|t| !t.is_bottom());
        dedup_stable(&mut flat);
        if flat.iter().any(|t| t.is_untyped()) {
            return Type::Untyped;
        }
        if flat.iter().any(|t| matches!(t, Type::Top)) {
            return Type::Top;
        }
        build_spine(flat, Type::Bottom, |l, r| Type::Or(Box::new(l), Box::new(r)))
    }

    /// Normalized intersection, dual to `any`.
    pub fn all(components: Vec<Type>) -> Type {
        let mut flat = Vec::new();
        for c in components {
            flatten_and(c, &mut flat);
        }
        flat.retain(|t| !matches!(t, Type::Top));
        dedup_stable(&mut flat);
        if flat.iter().any(|t| t.is_untyped()) {
            return Type::Untyped;
        }
        if flat.iter().any(|t| t.is_bottom()) {
            return Type::Bottom;
        }
        build_spine(flat, Type::Top, |l, r| Type::And(Box::new(l), Box::new(r)))
    }

    /// Components of a union, or the type itself when not a union.
    pub fn or_components(&self) -> Vec<Type> {
        let mut out = Vec::new();
        flatten_or(self.clone(), &mut out);
        out
    }

    pub fn and_components(&self) -> Vec<Type> {
        let mut out = Vec::new();
        flatten_and(self.clone(), &mut out);
        out
    }

    /// Resolve `Alias` links. Cycles cannot occur: alias symbols only refer
    /// to types built from earlier definitions.
    pub fn dealias(&self, gs: &GlobalState) -> Type {
        let mut t = self.clone();
        let mut fuel = 64;
        while let Type::Alias(sym) = t {
            t = gs.symbol(sym).result_type.clone();
            fuel -= 1;
            if fuel == 0 {
                return Type::Untyped;
            }
        }
        t
    }

    /// The coarser type a proxy shape (literal/tuple/shape) falls back to.
    /// Non-proxy types return themselves.
    pub fn underlying(&self, gs: &GlobalState) -> Type {
        match self {
            Type::Literal(lit) => Type::Class(lit.underlying_class()),
            Type::Tuple(elems) => {
                let elem = elems
                    .iter()
                    .fold(Type::Bottom, |acc, t| join(gs, &acc, t));
                Type::Applied {
                    class: Symbols::ARRAY,
                    args: vec![elem],
                }
            }
            Type::Shape { values, .. } => {
                let value = values
                    .iter()
                    .fold(Type::Bottom, |acc, t| join(gs, &acc, t));
                Type::Applied {
                    class: Symbols::HASH,
                    args: vec![Type::Class(Symbols::SYMBOL), value],
                }
            }
            Type::MetaType(_) => Type::Class(Symbols::CLASS),
            other => other.clone(),
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(
            self,
            Type::Literal(_) | Type::Tuple(_) | Type::Shape { .. } | Type::MetaType(_)
        )
    }

    /// Render the type for diagnostics and hover.
    pub fn show(&self, gs: &GlobalState) -> String {
        show::show(self, gs)
    }
}

fn flatten_or(t: Type, out: &mut Vec<Type>) {
    match t {
        Type::Or(l, r) => {
            flatten_or(*l, out);
            flatten_or(*r, out);
        }
        other => out.push(other),
    }
}

fn flatten_and(t: Type, out: &mut Vec<Type>) {
    match t {
        Type::And(l, r) => {
            flatten_and(*l, out);
            flatten_and(*r, out);
        }
        other => out.push(other),
    }
}

fn dedup_stable(items: &mut Vec<Type>) {
    let mut seen = Vec::new();
    items.retain(|t| {
        if seen.contains(t) {
            false
        } else {
            seen.push(t.clone());
            true
        }
    });
}

fn build_spine(mut flat: Vec<Type>, empty: Type, make: impl Fn(Type, Type) -> Type) -> Type {
    match flat.len() {
        0 => empty,
        1 => flat.pop().unwrap(),
        _ => {
            let mut iter = flat.into_iter();
            let first = iter.next().unwrap();
            iter.fold(first, make)
        }
    }
}
