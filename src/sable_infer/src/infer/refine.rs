// Flow-sensitive refinements. The condition variable's defining
// instruction inside the branching block decides what each edge learns;
// the merge after the branches is untouched.

use crate::cfg::{BasicBlock, Instruction, LocalRef};
use crate::infer::Env;
use sable_core::types::{is_subtype, meet};
use sable_core::{GlobalState, Symbols, Type};

pub type Facts = Vec<(LocalRef, Type)>;

/// What the then- and else-edges of a conditional learn about locals.
pub fn branch_refinements(
    gs: &GlobalState,
    block: &BasicBlock,
    cond: LocalRef,
    env: &Env,
) -> (Facts, Facts) {
    let origin = trace_origin(block, cond);
    match defining_instruction(block, origin) {
        Some(Instruction::Send {
            recv,
            method,
            args,
            ..
        }) => {
            let target = trace_origin(block, recv.variable);
            let current = match env.get(&target) {
                Some(t) => t.clone(),
                None => return (Vec::new(), Vec::new()),
            };
            match method.as_str() {
                "nil?" if args.is_empty() => {
                    let nil = Type::nil();
                    (
                        vec![(target, meet(gs, &current, &nil))],
                        vec![(target, subtract(gs, &current, &nil))],
                    )
                }
                "is_a?" | "kind_of?" if args.len() == 1 => {
                    let test = trace_origin(block, args[0].site.variable);
                    match defining_instruction(block, test) {
                        Some(Instruction::Alias(sym)) if gs.symbol(*sym).is_class() => {
                            let class_ty = Type::Class(*sym);
                            (
                                vec![(target, meet(gs, &current, &class_ty))],
                                vec![(target, subtract(gs, &current, &class_ty))],
                            )
                        }
                        _ => (Vec::new(), Vec::new()),
                    }
                }
                "==" if args.len() == 1 => {
                    let test = trace_origin(block, args[0].site.variable);
                    match defining_instruction(block, test) {
                        Some(Instruction::Literal(lit @ Type::Literal(_))) => {
                            let then_ty = if is_subtype(gs, lit, &current) {
                                lit.clone()
                            } else {
                                current.clone()
                            };
                            (
                                vec![(target, then_ty)],
                                vec![(target, subtract_exact(&current, lit))],
                            )
                        }
                        _ => (Vec::new(), Vec::new()),
                    }
                }
                _ => (Vec::new(), Vec::new()),
            }
        }
        // A plain truthiness test on a local: true rules out nil and
        // false; false leaves exactly those.
        _ => match env.get(&origin) {
            Some(current) => {
                let falsy = Type::any(vec![
                    Type::nil(),
                    Type::Class(Symbols::FALSE_CLASS),
                ]);
                (
                    vec![(origin, subtract(gs, current, &falsy))],
                    vec![(origin, meet(gs, current, &falsy))],
                )
            }
            None => (Vec::new(), Vec::new()),
        },
    }
}

/// Follow copy instructions within the block back to the local they read.
fn trace_origin(block: &BasicBlock, mut var: LocalRef) -> LocalRef {
    let mut fuel = block.bindings.len() + 1;
    loop {
        fuel -= 1;
        if fuel == 0 {
            return var;
        }
        match defining_instruction(block, var) {
            Some(Instruction::Ident(r)) => var = *r,
            _ => return var,
        }
    }
}

fn defining_instruction(block: &BasicBlock, var: LocalRef) -> Option<&Instruction> {
    block
        .bindings
        .iter()
        .rev()
        .find(|b| b.target == var)
        .map(|b| &b.instr)
}

/// Remove everything flowing into `what` from `from`. A union drops the
/// matching components; a type wholly inside `what` bottoms out.
pub fn subtract(gs: &GlobalState, from: &Type, what: &Type) -> Type {
    if from.is_untyped() {
        return Type::Untyped;
    }
    let comps = from.or_components();
    if comps.len() == 1 {
        return if is_subtype(gs, from, what) {
            Type::Bottom
        } else {
            from.clone()
        };
    }
    Type::any(
        comps
            .into_iter()
            .filter(|c| !is_subtype(gs, c, what))
            .collect(),
    )
}

/// Remove only the exact component (used for literal equality, where the
/// false edge rules out just that value).
fn subtract_exact(from: &Type, what: &Type) -> Type {
    let comps = from.or_components();
    if comps.len() <= 1 {
        return from.clone();
    }
    Type::any(comps.into_iter().filter(|c| c != what).collect())
}
