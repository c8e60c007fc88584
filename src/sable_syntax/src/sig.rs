use crate::span::Span;
use serde::{Deserialize, Serialize};

/// Surface type expression as written inside `sig` blocks, `T.let`, and
/// friends. Resolution against the symbol table happens later; here the
/// names are still raw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeExpr {
    Name(String, Span),
    Untyped(Span),
    Anything(Span),
    NoReturn(Span),
    SelfType(Span),
    Boolean(Span),
    Nilable(Box<TypeExpr>, Span),
    Any(Vec<TypeExpr>, Span),
    All(Vec<TypeExpr>, Span),
    ClassOf(Box<TypeExpr>, Span),
    Tuple(Vec<TypeExpr>, Span),
    Shape(Vec<(String, TypeExpr)>, Span),
    Applied {
        base: String,
        args: Vec<TypeExpr>,
        span: Span,
    },
    /// `T.type_parameter(:U)` inside a generic method's sig.
    TypeParameter(String, Span),
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Name(_, s)
            | TypeExpr::Untyped(s)
            | TypeExpr::Anything(s)
            | TypeExpr::NoReturn(s)
            | TypeExpr::SelfType(s)
            | TypeExpr::Boolean(s)
            | TypeExpr::Nilable(_, s)
            | TypeExpr::Any(_, s)
            | TypeExpr::All(_, s)
            | TypeExpr::ClassOf(_, s)
            | TypeExpr::Tuple(_, s)
            | TypeExpr::Shape(_, s)
            | TypeExpr::TypeParameter(_, s) => *s,
            TypeExpr::Applied { span, .. } => *span,
        }
    }
}

/// Output contract of the sig-builder DSL: an ordered parameter list, a
/// return type (`None` means `void`), and modifier flags. Attached to the
/// method definition that follows the `sig` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<SigParam>,
    pub return_type: Option<TypeExpr>,
    pub type_parameters: Vec<String>,
    pub flags: SigFlags,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigParam {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SigFlags {
    pub is_abstract: bool,
    pub is_override: bool,
    pub is_overridable: bool,
    pub is_final: bool,
}
