// Per-method control-flow graph: basic blocks of three-address bindings in
// SSA form, with phi semantics encoded as explicit copies in predecessors.

pub mod builder;

use sable_core::{SymbolRef, Type};
use sable_syntax::Span;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

/// Id of a CFG-local slot. Every slot is the target of exactly one binding,
/// except merge slots, which take one copy per predecessor edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalRef(pub u32);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalData {
    /// Source variable name, or a synthetic marker for temporaries.
    pub name: String,
    pub version: u32,
    pub is_temp: bool,
    /// Merge slots are assigned once per predecessor of their join block.
    pub is_merge: bool,
}

/// One read of a local, annotated with the type inference computed for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableUseSite {
    pub variable: LocalRef,
    pub ty: Type,
    pub span: Span,
}

impl VariableUseSite {
    pub fn new(variable: LocalRef, span: Span) -> VariableUseSite {
        VariableUseSite {
            variable,
            ty: Type::Untyped,
            span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendArg {
    pub keyword: Option<String>,
    pub site: VariableUseSite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CastKind {
    Let,
    Cast,
    AssertType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    /// Copy of another local.
    Ident(LocalRef),
    /// Reference to an interned symbol (constant read).
    Alias(SymbolRef),
    Literal(Type),
    Send {
        recv: VariableUseSite,
        method: String,
        args: Vec<SendArg>,
        /// Block-literal region attached to this call, if any.
        link: Option<u32>,
        is_private_ok: bool,
        name_span: Span,
    },
    Return(VariableUseSite),
    BlockReturn {
        link: u32,
        value: VariableUseSite,
    },
    LoadSelf,
    LoadArg {
        index: usize,
    },
    LoadYieldParams {
        link: u32,
    },
    /// Completed result of the linked send once its block region closed.
    SolveConstraint {
        link: u32,
    },
    Cast {
        value: VariableUseSite,
        ty: Type,
        kind: CastKind,
    },
    TAbsurd(VariableUseSite),
    Unanalyzable,
    NotSupported(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub target: LocalRef,
    pub instr: Instruction,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Terminator {
    Jump(BlockId),
    Cond {
        var: LocalRef,
        then_block: BlockId,
        else_block: BlockId,
    },
    /// Only the exit block carries this.
    Exit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    pub bindings: Vec<Binding>,
    pub terminator: Terminator,
}

impl BasicBlock {
    pub fn successors(&self) -> Vec<BlockId> {
        match self.terminator {
            Terminator::Jump(t) => vec![t],
            Terminator::Cond {
                then_block,
                else_block,
                ..
            } => vec![then_block, else_block],
            Terminator::Exit => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cfg {
    /// The enclosing class, for self-type and constant scope.
    pub owner: SymbolRef,
    pub method: SymbolRef,
    pub blocks: Vec<BasicBlock>,
    pub locals: Vec<LocalData>,
    pub entry: BlockId,
    pub exit: BlockId,
}

impl Cfg {
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0 as usize]
    }

    pub fn local(&self, r: LocalRef) -> &LocalData {
        &self.locals[r.0 as usize]
    }

    pub fn predecessors(&self, id: BlockId) -> Vec<BlockId> {
        self.blocks
            .iter()
            .filter(|b| b.successors().contains(&id))
            .map(|b| b.id)
            .collect()
    }

    /// Blocks reachable from entry, in id order.
    pub fn reachable(&self) -> Vec<BlockId> {
        let mut seen = vec![false; self.blocks.len()];
        let mut stack = vec![self.entry];
        while let Some(b) = stack.pop() {
            if seen[b.0 as usize] {
                continue;
            }
            seen[b.0 as usize] = true;
            for s in self.block(b).successors() {
                stack.push(s);
            }
        }
        seen.iter()
            .enumerate()
            .filter(|(_, s)| **s)
            .map(|(i, _)| BlockId(i as u32))
            .collect()
    }

    /// Structural well-formedness: one entry, one exit, every block
    /// reachable, every local assigned exactly once (merge slots once per
    /// predecessor edge of a single join block). Panics on violation;
    /// builder bugs are internal errors.
    pub fn validate(&self) {
        assert!(matches!(
            self.block(self.exit).terminator,
            Terminator::Exit
        ));
        for b in &self.blocks {
            if b.id != self.exit {
                assert!(
                    !matches!(b.terminator, Terminator::Exit),
                    "non-exit block with exit terminator"
                );
            }
        }
        let reachable = self.reachable();
        assert_eq!(
            reachable.len(),
            self.blocks.len(),
            "unreachable blocks survived finalization"
        );
        let mut def_counts = vec![0usize; self.locals.len()];
        for b in &self.blocks {
            for binding in &b.bindings {
                def_counts[binding.target.0 as usize] += 1;
            }
        }
        for (i, count) in def_counts.iter().enumerate() {
            let local = &self.locals[i];
            if local.is_merge {
                assert!(*count >= 1, "merge local {} never assigned", local.name);
            } else {
                assert!(
                    *count <= 1,
                    "local {}@{} assigned {} times",
                    local.name,
                    local.version,
                    count
                );
            }
        }
    }
}
