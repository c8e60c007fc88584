// Definition indexing: walk a parsed file and enter classes, methods, and
// type aliases into the global state, then (in a second phase, once every
// file is in) resolve superclasses and lower sigs onto method symbols.

use crate::resolve::resolve_type_expr;
use crate::SpannedError;
use log::trace;
use sable_core::{
    ArgFlags, ArgInfo, Diagnostic, DiagnosticCode, FileRef, GlobalState, Loc, NameRef,
    StrictnessLevel, SymbolFlags, SymbolRef, Symbols, Type, UniqueNameKind,
};
use sable_syntax::{
    ClassDef, Def, Expr, MethodDef, ParamKind, SourceFile, Span, Stmt, TypeExpr,
};
use std::collections::HashMap;

/// What indexing one file produced; consumed by the resolution phase and
/// by typechecking.
#[derive(Debug, Clone)]
pub struct FileIndex {
    pub file: FileRef,
    pub classes: Vec<IndexedClass>,
    pub methods: Vec<IndexedMethod>,
    pub aliases: Vec<IndexedAlias>,
}

#[derive(Debug, Clone)]
pub struct IndexedClass {
    pub sym: SymbolRef,
    pub superclass: Option<(String, Span)>,
}

#[derive(Debug, Clone)]
pub struct IndexedMethod {
    pub sym: SymbolRef,
    pub owner: SymbolRef,
    pub def: MethodDef,
}

#[derive(Debug, Clone)]
pub struct IndexedAlias {
    pub sym: SymbolRef,
    pub ty: TypeExpr,
    pub span: Span,
}

/// Phase one: enter definitions. Requires unfrozen name/symbol tables.
pub fn index_file(gs: &mut GlobalState, file: FileRef, tree: &SourceFile) -> FileIndex {
    trace!("indexing file {:?}", file);
    let mut index = FileIndex {
        file,
        classes: Vec::new(),
        methods: Vec::new(),
        aliases: Vec::new(),
    };
    index_defs(gs, file, Symbols::ROOT, &tree.defs, &mut index);

    if !tree.top_stmts.is_empty() {
        let span = tree
            .top_stmts
            .first()
            .map(|s| s.span())
            .unwrap_or(Span::zero());
        let init_name = format!("<static-init:{}>", gs.file(file).path);
        let name = gs.enter_name_utf8(&init_name);
        let sym = gs.enter_method_symbol(loc(file, span), Symbols::OBJECT, name);
        let def = MethodDef {
            name: init_name,
            params: Vec::new(),
            sig: None,
            body: tree.top_stmts.clone(),
            is_private: true,
            span,
            name_span: span,
        };
        intern_body_names(gs, &def.body);
        index.methods.push(IndexedMethod {
            sym,
            owner: Symbols::OBJECT,
            def,
        });
    }
    index
}

fn index_defs(
    gs: &mut GlobalState,
    file: FileRef,
    owner: SymbolRef,
    defs: &[Def],
    index: &mut FileIndex,
) {
    for def in defs {
        match def {
            Def::Class(class) => index_class(gs, file, owner, class, index),
            Def::Method(method) => index_method(gs, file, owner, method, index),
            Def::TypeAlias(alias) => {
                let name = constant_name(gs, &alias.name);
                let sym =
                    gs.enter_static_field_symbol(loc(file, alias.name_span), owner, name);
                let flags = gs.symbol(sym).flags.with(SymbolFlags::TYPE_ALIAS);
                gs.symbol_mut(sym).flags = flags;
                index.aliases.push(IndexedAlias {
                    sym,
                    ty: alias.ty.clone(),
                    span: alias.span,
                });
            }
        }
    }
}

fn index_class(
    gs: &mut GlobalState,
    file: FileRef,
    owner: SymbolRef,
    class: &ClassDef,
    index: &mut FileIndex,
) {
    // `class A::B` enters each intermediate namespace as a class.
    let mut cur = owner;
    let segments: Vec<&str> = class.name.split("::").collect();
    for seg in &segments[..segments.len() - 1] {
        let name = constant_name(gs, seg);
        cur = gs.enter_class_symbol(loc(file, class.name_span), cur, name);
        ensure_superclass_default(gs, cur);
    }
    let name = constant_name(gs, segments[segments.len() - 1]);
    let sym = gs.enter_class_symbol(loc(file, class.name_span), cur, name);
    ensure_superclass_default(gs, sym);
    index.classes.push(IndexedClass {
        sym,
        superclass: class
            .superclass
            .clone()
            .map(|s| (s, class.superclass_span.unwrap_or(class.name_span))),
    });
    index_defs(gs, file, sym, &class.body, index);
}

fn ensure_superclass_default(gs: &mut GlobalState, sym: SymbolRef) {
    if gs.symbol(sym).superclass.is_none() && sym != Symbols::BASIC_OBJECT {
        gs.symbol_mut(sym).superclass = Some(Symbols::OBJECT);
    }
}

fn index_method(
    gs: &mut GlobalState,
    file: FileRef,
    owner: SymbolRef,
    method: &MethodDef,
    index: &mut FileIndex,
) {
    let name = gs.enter_name_utf8(&method.name);

    // A redefinition with a different parameter count is worth flagging
    // before the old symbol is pushed aside under a mangled name.
    if let Some(&existing) = gs.symbol(owner).members.get(&name) {
        let previous = {
            let old = gs.symbol(existing);
            old.is_method().then(|| old.arguments.len())
        };
        if let Some(old_arity) = previous {
            if old_arity != method.params.len() {
                gs.push_error(Diagnostic::new(
                    DiagnosticCode::SBE02002,
                    format!(
                        "method `{}` redefined with {} parameters (previously {})",
                        method.name,
                        method.params.len(),
                        old_arity
                    ),
                    loc(file, method.name_span),
                ));
            }
        }
    }

    let sym = gs.enter_method_symbol(loc(file, method.name_span), owner, name);
    if method.is_private {
        let flags = gs.symbol(sym).flags.with(SymbolFlags::PRIVATE);
        gs.symbol_mut(sym).flags = flags;
    }
    intern_body_names(gs, &method.body);
    index.methods.push(IndexedMethod {
        sym,
        owner,
        def: method.clone(),
    });

    // Optional parameters get a synthetic checker method for their default
    // expression, so `def f(x = "oops")` under `params(x: Integer)` is
    // caught where the default is written.
    for param in &method.params {
        if let Some(default) = &param.default {
            let param_name = gs.enter_name_utf8(&param.name);
            let unique = gs.fresh_name_unique(UniqueNameKind::DefaultArg, param_name);
            let dsym = gs.enter_method_symbol(loc(file, param.span), owner, unique);
            let body = vec![Stmt::Return {
                value: Some(default.clone()),
                span: default.span(),
            }];
            intern_body_names(gs, &body);
            index.methods.push(IndexedMethod {
                sym: dsym,
                owner,
                def: MethodDef {
                    name: format!("{}<default>", param.name),
                    params: Vec::new(),
                    sig: None,
                    body,
                    is_private: true,
                    span: param.span,
                    name_span: param.span,
                },
            });
        }
    }
}

/// Phase two, after every file is indexed: wire superclasses, resolve
/// alias and sig types onto symbols, and apply the strictness nudges.
pub fn resolve_file_index(gs: &mut GlobalState, index: &FileIndex) {
    let file = index.file;
    let strictness = gs.file(file).strictness;

    for class in &index.classes {
        if let Some((name, span)) = &class.superclass {
            let scope = gs.symbol(class.sym).owner;
            match crate::resolve::lookup_constant(gs, scope, name) {
                Some(sup) if gs.symbol(sup).is_class() => {
                    gs.symbol_mut(class.sym).superclass = Some(sup);
                }
                _ => {
                    gs.push_error(Diagnostic::new(
                        DiagnosticCode::SBE02001,
                        format!("unable to resolve constant `{}`", name),
                        loc(file, *span),
                    ));
                }
            }
        }
    }

    for alias in &index.aliases {
        let scope = gs.symbol(alias.sym).owner;
        let mut errors = Vec::new();
        let ty = resolve_type_expr(gs, scope, &alias.ty, &HashMap::new(), &mut errors);
        push_spanned(gs, file, errors);
        gs.symbol_mut(alias.sym).result_type = ty;
    }

    for method in &index.methods {
        resolve_method_sig(gs, file, strictness, method);
    }
}

fn resolve_method_sig(
    gs: &mut GlobalState,
    file: FileRef,
    strictness: StrictnessLevel,
    method: &IndexedMethod,
) {
    let def = &method.def;
    let sym = method.sym;
    let owner = method.owner;

    // Synthetic bodies (static init, default-arg checkers) have no sig by
    // construction and are exempt from the strictness nudge.
    let synthetic = def.name.starts_with('<') || def.name.ends_with("<default>");

    let mut type_params: HashMap<String, sable_core::TypeVarId> = HashMap::new();
    if let Some(sig) = &def.sig {
        for pname in &sig.type_parameters {
            let n = gs.enter_name_utf8(pname);
            let ta = gs.enter_type_argument(loc(file, sig.span), sym, n);
            if let Some(var) = gs.symbol(ta).type_var {
                type_params.insert(pname.clone(), var);
            }
        }
    }

    let mut errors = Vec::new();
    let mut arguments = Vec::new();
    for param in &def.params {
        let pname = gs.enter_name_utf8(&param.name);
        let declared = def
            .sig
            .as_ref()
            .and_then(|sig| sig.params.iter().find(|p| p.name == param.name));
        let ty = match declared {
            Some(p) => resolve_type_expr(gs, owner, &p.ty, &type_params, &mut errors),
            None => Type::Untyped,
        };
        arguments.push(ArgInfo {
            name: pname,
            ty,
            flags: ArgFlags {
                keyword: matches!(
                    param.kind,
                    ParamKind::Keyword | ParamKind::OptionalKeyword
                ),
                optional: matches!(
                    param.kind,
                    ParamKind::OptionalPositional | ParamKind::OptionalKeyword
                ),
                block: matches!(param.kind, ParamKind::Block),
            },
            loc: loc(file, param.span),
        });
    }

    let mut result_type = Type::Untyped;
    let mut has_sig = false;
    if let Some(sig) = &def.sig {
        has_sig = true;
        // Every sig param must name a real parameter.
        for p in &sig.params {
            if !def.params.iter().any(|d| d.name == p.name) {
                errors.push(SpannedError::new(
                    DiagnosticCode::SBE02003,
                    format!("`sig` declares `{}`, which is not a parameter", p.name),
                    p.span,
                ));
            }
        }
        for d in &def.params {
            if !matches!(d.kind, ParamKind::Block)
                && !sig.params.iter().any(|p| p.name == d.name)
            {
                errors.push(SpannedError::new(
                    DiagnosticCode::SBE02003,
                    format!("parameter `{}` is missing from the `sig`", d.name),
                    d.span,
                ));
            }
        }
        result_type = match &sig.return_type {
            Some(t) => resolve_type_expr(gs, owner, t, &type_params, &mut errors),
            None => Type::void(),
        };
        let mut flags = gs.symbol(sym).flags;
        if sig.flags.is_abstract {
            flags = flags.with(SymbolFlags::ABSTRACT);
        }
        if sig.flags.is_override {
            flags = flags.with(SymbolFlags::OVERRIDE);
        }
        if sig.flags.is_overridable {
            flags = flags.with(SymbolFlags::OVERRIDABLE);
        }
        if sig.flags.is_final {
            flags = flags.with(SymbolFlags::FINAL);
        }
        gs.symbol_mut(sym).flags = flags;
    } else if !synthetic && strictness >= StrictnessLevel::Strict {
        errors.push(SpannedError::new(
            DiagnosticCode::SBE02006,
            format!("method `{}` is missing a signature", def.name),
            def.name_span,
        ));
    }

    // Default-arg checker methods inherit the declared type of the
    // parameter they guard, through the parent's sig; left untyped here
    // and tightened in `attach_default_arg_types`.
    push_spanned(gs, file, errors);
    let s = gs.symbol_mut(sym);
    s.arguments = arguments;
    s.result_type = result_type;
    s.has_sig = has_sig;
}

/// Give each default-arg checker the declared type of its parameter as its
/// return type, so the default expression is checked against it.
pub fn attach_default_arg_types(gs: &mut GlobalState, index: &FileIndex) {
    for method in &index.methods {
        let def = &method.def;
        if def.sig.is_none() {
            continue;
        }
        let params = def.params.clone();
        for param in params.iter().filter(|p| p.default.is_some()) {
            let declared = gs
                .symbol(method.sym)
                .arguments
                .iter()
                .find(|a| gs.name_str(a.name) == param.name)
                .map(|a| a.ty.clone());
            if let Some(ty) = declared {
                if ty.is_untyped() {
                    continue;
                }
                let checker_name = format!("{}<default>", param.name);
                if let Some(checker) = index
                    .methods
                    .iter()
                    .find(|m| m.owner == method.owner && m.def.name == checker_name)
                {
                    gs.symbol_mut(checker.sym).result_type = ty;
                }
            }
        }
    }
}

fn constant_name(gs: &mut GlobalState, raw: &str) -> NameRef {
    let inner = gs.enter_name_utf8(raw);
    gs.enter_name_constant(inner)
}

fn loc(file: FileRef, span: Span) -> Loc {
    Loc::new(file, span.start, span.end)
}

fn push_spanned(gs: &mut GlobalState, file: FileRef, errors: Vec<SpannedError>) {
    for e in errors {
        gs.push_error(e.into_diagnostic(file));
    }
}

/// Intern every name a method body can mention as a literal, so the
/// read-only typecheck phase finds them in the table.
fn intern_body_names(gs: &mut GlobalState, stmts: &[Stmt]) {
    for stmt in stmts {
        intern_stmt(gs, stmt);
    }
}

fn intern_stmt(gs: &mut GlobalState, stmt: &Stmt) {
    match stmt {
        Stmt::Expr(e) => intern_expr(gs, e),
        Stmt::Assign { value, .. } => intern_expr(gs, value),
        Stmt::If {
            cond,
            then_body,
            else_body,
            ..
        } => {
            intern_expr(gs, cond);
            intern_body_names(gs, then_body);
            intern_body_names(gs, else_body);
        }
        Stmt::While { cond, body, .. } => {
            intern_expr(gs, cond);
            intern_body_names(gs, body);
        }
        Stmt::Case {
            scrutinee,
            whens,
            else_body,
            ..
        } => {
            intern_expr(gs, scrutinee);
            for w in whens {
                for p in &w.patterns {
                    intern_expr(gs, p);
                }
                intern_body_names(gs, &w.body);
            }
            intern_body_names(gs, else_body);
        }
        Stmt::Begin {
            body,
            rescues,
            ensure_body,
            ..
        } => {
            intern_body_names(gs, body);
            for r in rescues {
                intern_body_names(gs, &r.body);
            }
            intern_body_names(gs, ensure_body);
        }
        Stmt::Return { value, .. } => {
            if let Some(v) = value {
                intern_expr(gs, v);
            }
        }
    }
}

fn intern_expr(gs: &mut GlobalState, expr: &Expr) {
    match expr {
        Expr::Str(s, _) | Expr::Sym(s, _) => {
            gs.enter_name_utf8(s);
        }
        Expr::Send {
            recv, args, block, ..
        } => {
            if let Some(r) = recv {
                intern_expr(gs, r);
            }
            for a in args {
                intern_expr(gs, &a.value);
            }
            if let Some(b) = block {
                intern_body_names(gs, &b.body);
            }
        }
        Expr::AndAnd(l, r, _) | Expr::OrOr(l, r, _) => {
            intern_expr(gs, l);
            intern_expr(gs, r);
        }
        Expr::Let { value, ty, .. }
        | Expr::Cast { value, ty, .. }
        | Expr::AssertType { value, ty, .. } => {
            intern_expr(gs, value);
            intern_type_expr(gs, ty);
        }
        Expr::Absurd { value, .. } => intern_expr(gs, value),
        _ => {}
    }
}

fn intern_type_expr(gs: &mut GlobalState, texpr: &TypeExpr) {
    match texpr {
        TypeExpr::Nilable(inner, _) | TypeExpr::ClassOf(inner, _) => intern_type_expr(gs, inner),
        TypeExpr::Any(list, _) | TypeExpr::All(list, _) | TypeExpr::Tuple(list, _) => {
            for t in list {
                intern_type_expr(gs, t);
            }
        }
        TypeExpr::Shape(fields, _) => {
            for (key, value) in fields {
                gs.enter_name_utf8(key);
                intern_type_expr(gs, value);
            }
        }
        TypeExpr::Applied { args, .. } => {
            for t in args {
                intern_type_expr(gs, t);
            }
        }
        _ => {}
    }
}
