use crate::sig::Signature;
use crate::span::Span;
use crate::TypedSigil;
use serde::{Deserialize, Serialize};

/// One parsed source file after desugaring. `unless`/`until` have already
/// been folded into their positive forms; `case` survives to the CFG
/// builder, which lowers it to class-predicate tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub sigil: Option<TypedSigil>,
    pub defs: Vec<Def>,
    /// Statements outside any class or method body, checked as the body of
    /// a synthetic top-level method.
    pub top_stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Def {
    Class(Box<ClassDef>),
    Method(Box<MethodDef>),
    TypeAlias(Box<TypeAliasDef>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeAliasDef {
    pub name: String,
    pub ty: crate::sig::TypeExpr,
    pub span: Span,
    pub name_span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    pub superclass: Option<String>,
    pub body: Vec<Def>,
    pub span: Span,
    pub name_span: Span,
    pub superclass_span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub sig: Option<Signature>,
    pub body: Vec<Stmt>,
    pub is_private: bool,
    pub span: Span,
    pub name_span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    Positional,
    OptionalPositional,
    Keyword,
    OptionalKeyword,
    Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Expr(Expr),
    Assign {
        target: String,
        value: Expr,
        target_span: Span,
        span: Span,
    },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
        span: Span,
    },
    Case {
        scrutinee: Expr,
        whens: Vec<WhenClause>,
        else_body: Vec<Stmt>,
        span: Span,
    },
    Begin {
        body: Vec<Stmt>,
        rescues: Vec<Rescue>,
        ensure_body: Vec<Stmt>,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
}

/// One `when` arm. Patterns are either class constants (lowered to
/// `is_a?` tests) or literal expressions (lowered to `==` tests).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhenClause {
    pub patterns: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rescue {
    pub classes: Vec<(String, Span)>,
    pub binder: Option<(String, Span)>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Nil(Span),
    True(Span),
    False(Span),
    SelfRef(Span),
    Integer(i64, Span),
    /// Bit pattern, so the tree stays `Eq`-comparable and hashable.
    Float(u64, Span),
    Str(String, Span),
    Sym(String, Span),
    Local(String, Span),
    Const(String, Span),
    Send {
        recv: Option<Box<Expr>>,
        name: String,
        args: Vec<Arg>,
        block: Option<Box<BlockLit>>,
        safe: bool,
        span: Span,
        name_span: Span,
    },
    /// Short-circuit `&&`; lowered to control flow by the CFG builder.
    AndAnd(Box<Expr>, Box<Expr>, Span),
    /// Short-circuit `||`.
    OrOr(Box<Expr>, Box<Expr>, Span),
    /// `T.let(value, Type)`
    Let {
        value: Box<Expr>,
        ty: crate::sig::TypeExpr,
        span: Span,
    },
    /// `T.cast(value, Type)`
    Cast {
        value: Box<Expr>,
        ty: crate::sig::TypeExpr,
        span: Span,
    },
    /// `T.assert_type!(value, Type)`
    AssertType {
        value: Box<Expr>,
        ty: crate::sig::TypeExpr,
        span: Span,
    },
    /// `T.absurd(value)`
    Absurd {
        value: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Nil(s)
            | Expr::True(s)
            | Expr::False(s)
            | Expr::SelfRef(s)
            | Expr::Integer(_, s)
            | Expr::Float(_, s)
            | Expr::Str(_, s)
            | Expr::Sym(_, s)
            | Expr::Local(_, s)
            | Expr::Const(_, s)
            | Expr::AndAnd(_, _, s)
            | Expr::OrOr(_, _, s) => *s,
            Expr::Send { span, .. }
            | Expr::Let { span, .. }
            | Expr::Cast { span, .. }
            | Expr::AssertType { span, .. }
            | Expr::Absurd { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arg {
    pub keyword: Option<String>,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockLit {
    pub params: Vec<(String, Span)>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr(e) => e.span(),
            Stmt::Assign { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::Case { span, .. }
            | Stmt::Begin { span, .. }
            | Stmt::Return { span, .. } => *span,
        }
    }
}
