use crate::global_state::GlobalState;
use crate::types::join_meet::{join, meet};
use crate::types::subtyping::is_subtype;
use crate::types::{Type, TypeVarId};
use std::collections::HashMap;

/// Transient lower/upper bounds on a call site's type variables. Created
/// per dispatch, solved, and discarded.
#[derive(Debug, Clone, Default)]
pub struct TypeConstraint {
    domain: Vec<TypeVarId>,
    uppers: HashMap<TypeVarId, Vec<Type>>,
    lowers: HashMap<TypeVarId, Vec<Type>>,
    solutions: HashMap<TypeVarId, Type>,
}

impl TypeConstraint {
    pub fn new(domain: Vec<TypeVarId>) -> TypeConstraint {
        TypeConstraint {
            domain,
            ..Default::default()
        }
    }

    pub fn empty() -> TypeConstraint {
        TypeConstraint::default()
    }

    pub fn in_domain(&self, id: TypeVarId) -> bool {
        self.domain.contains(&id)
    }

    pub fn add_upper(&mut self, id: TypeVarId, bound: Type) {
        self.uppers.entry(id).or_default().push(bound);
    }

    pub fn add_lower(&mut self, id: TypeVarId, bound: Type) {
        self.lowers.entry(id).or_default().push(bound);
    }

    /// Substitute each variable with the meet of its upper bounds, or the
    /// join of its lower bounds when only lowers exist. Returns false when
    /// some lower bound does not flow into the chosen solution.
    pub fn solve(&mut self, gs: &GlobalState) -> bool {
        let mut ok = true;
        for &id in &self.domain {
            let uppers = self.uppers.get(&id).cloned().unwrap_or_default();
            let lowers = self.lowers.get(&id).cloned().unwrap_or_default();
            let solution = if !uppers.is_empty() {
                uppers
                    .iter()
                    .skip(1)
                    .fold(uppers[0].clone(), |acc, t| meet(gs, &acc, t))
            } else if !lowers.is_empty() {
                lowers
                    .iter()
                    .skip(1)
                    .fold(lowers[0].clone(), |acc, t| join(gs, &acc, t))
            } else {
                Type::Untyped
            };
            for lo in &lowers {
                if !is_subtype(gs, lo, &solution) {
                    ok = false;
                }
            }
            self.solutions.insert(id, solution);
        }
        ok
    }

    pub fn is_solved(&self) -> bool {
        self.domain.iter().all(|id| self.solutions.contains_key(id))
    }

    pub fn solution(&self, id: TypeVarId) -> Option<&Type> {
        self.solutions.get(&id)
    }
}
