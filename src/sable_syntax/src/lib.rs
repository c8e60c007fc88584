// Syntax crate: the desugared tree the checker consumes, plus spans and
// declared signatures. The front end produces these; nothing here depends
// on the global state.

pub mod ast;
pub mod sig;
pub mod span;

pub use ast::{
    Arg, BlockLit, ClassDef, Def, Expr, MethodDef, ParamDecl, ParamKind, Rescue, SourceFile, Stmt,
    TypeAliasDef, WhenClause,
};
pub use sig::{SigFlags, SigParam, Signature, TypeExpr};
pub use span::Span;

use serde::{Deserialize, Serialize};

/// Surface form of the `# typed:` magic comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypedSigil {
    Ignore,
    False,
    True,
    Strict,
    Strong,
}

impl TypedSigil {
    pub fn parse(word: &str) -> Option<TypedSigil> {
        match word {
            "ignore" => Some(TypedSigil::Ignore),
            "false" => Some(TypedSigil::False),
            "true" => Some(TypedSigil::True),
            "strict" => Some(TypedSigil::Strict),
            "strong" => Some(TypedSigil::Strong),
            _ => None,
        }
    }
}
