// Class/method definitions, the sig-builder recognizer, and the top-level
// program loop with per-item recovery.

use crate::expr::{paren_type, parse_expr, parse_type_expr};
use crate::stmt::{parse_body, parse_stmt};
use crate::{
    blank, const_name, ident, inline_ws, keyword, nom_error, offset, peek_keyword, skip_blank,
    skip_to_next_line, span_of, ws, Input, PResult, ParseDiagnostic,
};
use log::trace;
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::char as nom_char;
use nom::combinator::{map, not, opt};
use nom::multi::{separated_list0, separated_list1};
use nom::sequence::{delimited, preceded, separated_pair, terminated};
use nom::Parser;
use sable_syntax::{
    ClassDef, Def, MethodDef, ParamDecl, ParamKind, SigFlags, SigParam, Signature, Span, Stmt,
    TypeAliasDef, TypeExpr,
};

/// Top-level loop: definitions and bare statements, with recovery. A
/// region that fails to parse becomes one diagnostic and is skipped to the
/// next line.
pub(crate) fn parse_program(
    mut i: Input,
    diagnostics: &mut Vec<ParseDiagnostic>,
) -> (Vec<Def>, Vec<Stmt>) {
    let mut defs = Vec::new();
    let mut top_stmts = Vec::new();
    loop {
        i = skip_blank(i);
        if i.fragment().is_empty() {
            return (defs, top_stmts);
        }
        match parse_top_item(i) {
            Ok((rest, TopItem::Def(d))) => {
                defs.push(d);
                i = rest;
            }
            Ok((rest, TopItem::Stmt(s))) => {
                top_stmts.push(s);
                i = rest;
            }
            Err(_) => {
                i = recover(i, diagnostics);
            }
        }
    }
}

enum TopItem {
    Def(Def),
    Stmt(Stmt),
}

fn parse_top_item(i: Input) -> PResult<TopItem> {
    if peek_keyword(i, "class") {
        let (rest, c) = parse_class(i)?;
        return Ok((rest, TopItem::Def(Def::Class(Box::new(c)))));
    }
    if peek_keyword(i, "sig") || peek_keyword(i, "def") || peek_keyword(i, "private") {
        let (rest, m) = parse_sig_and_method(i, false)?;
        return Ok((rest, TopItem::Def(Def::Method(Box::new(m)))));
    }
    if let Ok((rest, alias)) = parse_type_alias(i) {
        return Ok((rest, TopItem::Def(Def::TypeAlias(Box::new(alias)))));
    }
    let (rest, s) = parse_stmt(i)?;
    Ok((rest, TopItem::Stmt(s)))
}

fn recover<'a>(i: Input<'a>, diagnostics: &mut Vec<ParseDiagnostic>) -> Input<'a> {
    let start = offset(&i);
    let line_len = i
        .fragment()
        .find('\n')
        .unwrap_or(i.fragment().len())
        .max(1);
    let snippet: String = i.fragment().chars().take(24).collect();
    let snippet = snippet.trim_end().to_string();
    diagnostics.push(ParseDiagnostic {
        message: format!("unexpected `{}`", snippet),
        span: Span::new(start, start + line_len as u32),
    });
    trace!("recovering at offset {}", start);
    skip_to_next_line(i)
}

fn parse_class(i: Input) -> PResult<ClassDef> {
    let start = offset(&i);
    let (i, _) = keyword(i, "class")?;
    let (i, (name, name_span)) = preceded(inline_ws, const_name).parse(i)?;
    let (i, superclass) = opt(preceded(
        preceded(inline_ws, terminated(nom_char('<'), not(nom_char('<')))),
        preceded(inline_ws, const_name),
    ))
    .parse(i)?;
    let (superclass, superclass_span) = match superclass {
        Some((sup, span)) => (Some(sup), Some(span)),
        None => (None, None),
    };
    let (i, body) = parse_class_body(i)?;
    let (i, end_span) = keyword(skip_blank(i), "end")?;
    Ok((
        i,
        ClassDef {
            name,
            superclass,
            body,
            span: Span::new(start, end_span.end),
            name_span,
            superclass_span,
        },
    ))
}

fn parse_class_body(mut i: Input) -> PResult<Vec<Def>> {
    let mut defs = Vec::new();
    let mut default_private = false;
    loop {
        i = skip_blank(i);
        if i.fragment().is_empty() || peek_keyword(i, "end") {
            return Ok((i, defs));
        }
        if peek_keyword(i, "class") {
            let (rest, c) = parse_class(i)?;
            defs.push(Def::Class(Box::new(c)));
            i = rest;
            continue;
        }
        // Standalone `private` flips the default for the rest of the body.
        if peek_keyword(i, "private") {
            let (rest, _) = keyword(i, "private")?;
            let probe = ws(rest);
            if !peek_keyword(probe, "def") && !peek_keyword(probe, "sig") {
                default_private = true;
                i = rest;
                continue;
            }
        }
        if peek_keyword(i, "sig") || peek_keyword(i, "def") || peek_keyword(i, "private") {
            let (rest, m) = parse_sig_and_method(i, default_private)?;
            defs.push(Def::Method(Box::new(m)));
            i = rest;
            continue;
        }
        if let Ok((rest, alias)) = parse_type_alias(i) {
            defs.push(Def::TypeAlias(Box::new(alias)));
            i = rest;
            continue;
        }
        return Err(nom_error(i));
    }
}

fn parse_sig_and_method(i: Input, default_private: bool) -> PResult<MethodDef> {
    let (i, sig) = if peek_keyword(i, "sig") {
        let (rest, sig) = parse_sig(i)?;
        (skip_blank(rest), Some(sig))
    } else {
        (i, None)
    };
    let (i, is_private) = if peek_keyword(i, "private") {
        let (rest, _) = keyword(i, "private")?;
        (ws(rest), true)
    } else {
        (i, default_private)
    };
    let (i, mut m) = parse_method(i)?;
    m.sig = sig;
    m.is_private = m.is_private || is_private;
    Ok((i, m))
}

fn parse_method(i: Input) -> PResult<MethodDef> {
    let start = offset(&i);
    let (i, _) = keyword(i, "def")?;
    let (i, (name, name_span)) = preceded(inline_ws, method_name).parse(i)?;
    let (i, params) = map(
        opt(preceded(inline_ws, def_params)),
        Option::unwrap_or_default,
    )
    .parse(i)?;
    let (i, body) = parse_body(i, &["end"])?;
    let (i, end_span) = keyword(skip_blank(i), "end")?;
    Ok((
        i,
        MethodDef {
            name,
            params,
            sig: None,
            body,
            is_private: false,
            span: Span::new(start, end_span.end),
            name_span,
        },
    ))
}

fn method_name(i: Input) -> PResult<(String, Span)> {
    alt((ident, operator_method_name)).parse(i)
}

/// Operator definitions are legal method names in the core library.
fn operator_method_name(i: Input) -> PResult<(String, Span)> {
    map(
        alt((
            tag("<=>"),
            tag("=="),
            tag("!="),
            tag("<="),
            tag(">="),
            tag("<<"),
            tag("[]"),
            tag("-@"),
            tag("+"),
            tag("-"),
            tag("*"),
            tag("/"),
            tag("%"),
            tag("<"),
            tag(">"),
            tag("!"),
        )),
        |m: Input| (m.fragment().to_string(), span_of(&m)),
    )
    .parse(i)
}

fn def_params(i: Input) -> PResult<Vec<ParamDecl>> {
    delimited(
        nom_char('('),
        separated_list0(preceded(blank, nom_char(',')), preceded(blank, parse_param)),
        preceded(blank, nom_char(')')),
    )
    .parse(i)
}

fn parse_param(i: Input) -> PResult<ParamDecl> {
    alt((
        block_param,
        keyword_param,
        optional_positional_param,
        positional_param,
    ))
    .parse(i)
}

fn block_param(i: Input) -> PResult<ParamDecl> {
    let start = offset(&i);
    let (rest, (name, span)) = preceded(nom_char('&'), ident).parse(i)?;
    Ok((
        rest,
        ParamDecl {
            name,
            kind: ParamKind::Block,
            default: None,
            span: Span::new(start, span.end),
        },
    ))
}

/// `name:` keyword parameter, optional when a default follows.
fn keyword_param(i: Input) -> PResult<ParamDecl> {
    let start = offset(&i);
    let (rest, (name, name_span)) = terminated(
        ident,
        terminated(nom_char(':'), not(nom_char(':'))),
    )
    .parse(i)?;
    let (rest, default) = opt(preceded(inline_ws, parse_expr)).parse(rest)?;
    let (kind, span) = match &default {
        Some(d) => (ParamKind::OptionalKeyword, Span::new(start, d.span().end)),
        None => (ParamKind::Keyword, Span::new(start, name_span.end + 1)),
    };
    Ok((
        rest,
        ParamDecl {
            name,
            kind,
            default,
            span,
        },
    ))
}

fn optional_positional_param(i: Input) -> PResult<ParamDecl> {
    let start = offset(&i);
    let (rest, (name, _)) = ident(i)?;
    let (rest, _) =
        preceded(inline_ws, terminated(nom_char('='), not(nom_char('=')))).parse(rest)?;
    let (rest, default) = preceded(inline_ws, parse_expr).parse(rest)?;
    let span = Span::new(start, default.span().end);
    Ok((
        rest,
        ParamDecl {
            name,
            kind: ParamKind::OptionalPositional,
            default: Some(default),
            span,
        },
    ))
}

fn positional_param(i: Input) -> PResult<ParamDecl> {
    map(ident, |(name, span)| ParamDecl {
        name,
        kind: ParamKind::Positional,
        default: None,
        span,
    })
    .parse(i)
}

/// One builder call in a `sig { … }` chain.
enum SigBuilderCall {
    Params(Vec<SigParam>),
    Returns(TypeExpr),
    Void,
    Abstract,
    Override,
    Overridable,
    Final,
    Bind,
    TypeParameters(Vec<String>),
}

/// `sig { params(x: T).returns(R) }` and friends: a dot-chain of builder
/// calls folded into one `Signature`.
fn parse_sig(i: Input) -> PResult<Signature> {
    let start = offset(&i);
    let (i, _) = keyword(i, "sig")?;
    let (i, _) = preceded(inline_ws, nom_char('{')).parse(i)?;
    let (i, builders) = separated_list1(
        preceded(blank, nom_char('.')),
        preceded(blank, sig_builder),
    )
    .parse(i)?;
    let (i, _) = preceded(blank, nom_char('}')).parse(i)?;

    let mut sig = Signature {
        params: Vec::new(),
        return_type: None,
        type_parameters: Vec::new(),
        flags: SigFlags::default(),
        span: Span::new(start, offset(&i)),
    };
    let mut saw_void = false;
    for call in builders {
        match call {
            SigBuilderCall::Params(params) => sig.params = params,
            SigBuilderCall::Returns(ty) => sig.return_type = Some(ty),
            SigBuilderCall::Void => saw_void = true,
            SigBuilderCall::Abstract => sig.flags.is_abstract = true,
            SigBuilderCall::Override => sig.flags.is_override = true,
            SigBuilderCall::Overridable => sig.flags.is_overridable = true,
            SigBuilderCall::Final => sig.flags.is_final = true,
            // Recognized and checked syntactically; the binding itself
            // only matters inside blocks, which are not inferred.
            SigBuilderCall::Bind => {}
            SigBuilderCall::TypeParameters(names) => sig.type_parameters = names,
        }
    }
    if saw_void {
        sig.return_type = None;
    }
    Ok((i, sig))
}

fn sig_builder(i: Input) -> PResult<SigBuilderCall> {
    let (rest, (builder, _)) = ident(i)?;
    match builder.as_str() {
        "params" => map(sig_params, SigBuilderCall::Params).parse(rest),
        "returns" => map(paren_type, SigBuilderCall::Returns).parse(rest),
        "void" => Ok((rest, SigBuilderCall::Void)),
        "abstract" => Ok((rest, SigBuilderCall::Abstract)),
        "override" => Ok((rest, SigBuilderCall::Override)),
        "overridable" => Ok((rest, SigBuilderCall::Overridable)),
        "final" => Ok((rest, SigBuilderCall::Final)),
        "bind" => map(paren_type, |_| SigBuilderCall::Bind).parse(rest),
        "type_parameters" => {
            map(sig_type_parameters, SigBuilderCall::TypeParameters).parse(rest)
        }
        _ => Err(nom_error(i)),
    }
}

fn sig_params(i: Input) -> PResult<Vec<SigParam>> {
    delimited(
        preceded(inline_ws, nom_char('(')),
        separated_list0(preceded(blank, nom_char(',')), preceded(blank, sig_param)),
        preceded(blank, nom_char(')')),
    )
    .parse(i)
}

fn sig_param(i: Input) -> PResult<SigParam> {
    let start = offset(&i);
    let (rest, ((name, _), ty)) =
        separated_pair(ident, nom_char(':'), preceded(blank, parse_type_expr)).parse(i)?;
    let span = Span::new(start, ty.span().end);
    Ok((rest, SigParam { name, ty, span }))
}

fn sig_type_parameters(i: Input) -> PResult<Vec<String>> {
    delimited(
        preceded(inline_ws, nom_char('(')),
        separated_list0(
            preceded(blank, nom_char(',')),
            preceded(
                blank,
                map(preceded(nom_char(':'), ident), |(name, _)| name),
            ),
        ),
        preceded(blank, nom_char(')')),
    )
    .parse(i)
}

/// `Name = T.type_alias { Type }`
fn parse_type_alias(i: Input) -> PResult<TypeAliasDef> {
    let start = offset(&i);
    let (rest, (name, name_span)) = const_name(i)?;
    let (rest, _) = preceded(inline_ws, nom_char('=')).parse(rest)?;
    let (rest, _) = preceded(inline_ws, tag("T.type_alias")).parse(rest)?;
    let (rest, ty) = delimited(
        preceded(inline_ws, nom_char('{')),
        preceded(blank, parse_type_expr),
        preceded(blank, nom_char('}')),
    )
    .parse(rest)?;
    Ok((
        rest,
        TypeAliasDef {
            name,
            ty,
            span: Span::new(start, offset(&rest)),
            name_span,
        },
    ))
}
