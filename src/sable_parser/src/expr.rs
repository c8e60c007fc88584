// Expression grammar: precedence climbing over nom combinators. Operator
// uses lower to ordinary sends; `&&`/`||` keep their own nodes so the CFG
// builder can short-circuit them.

use crate::stmt::parse_body;
use crate::{
    blank, const_name, ident, inline_ws, keyword, kw, nom_error, offset, skip_blank, span_of,
    Input, PResult,
};
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::{char as nom_char, satisfy};
use nom::combinator::{map, map_res, not, opt, peek, recognize, value};
use nom::multi::{many0, separated_list0};
use nom::sequence::{delimited, pair, preceded, separated_pair, terminated};
use nom::Parser;
use sable_syntax::{Arg, BlockLit, Expr, Span, TypeExpr};

pub(crate) fn parse_expr(i: Input) -> PResult<Expr> {
    parse_or(i)
}

fn parse_or(i: Input) -> PResult<Expr> {
    let (i, first) = parse_and(i)?;
    let (i, tail) = many0(preceded(
        preceded(inline_ws, tag("||")),
        preceded(inline_ws, parse_and),
    ))
    .parse(i)?;
    let folded = tail.into_iter().fold(first, |lhs, rhs| {
        let span = Span::new(lhs.span().start, rhs.span().end);
        Expr::OrOr(Box::new(lhs), Box::new(rhs), span)
    });
    Ok((i, folded))
}

fn parse_and(i: Input) -> PResult<Expr> {
    let (i, first) = parse_equality(i)?;
    let (i, tail) = many0(preceded(
        preceded(inline_ws, tag("&&")),
        preceded(inline_ws, parse_equality),
    ))
    .parse(i)?;
    let folded = tail.into_iter().fold(first, |lhs, rhs| {
        let span = Span::new(lhs.span().start, rhs.span().end);
        Expr::AndAnd(Box::new(lhs), Box::new(rhs), span)
    });
    Ok((i, folded))
}

fn parse_equality(i: Input) -> PResult<Expr> {
    binop_chain(i, equality_op, parse_comparison)
}

fn parse_comparison(i: Input) -> PResult<Expr> {
    binop_chain(i, comparison_op, parse_additive)
}

fn parse_additive(i: Input) -> PResult<Expr> {
    binop_chain(i, additive_op, parse_multiplicative)
}

fn parse_multiplicative(i: Input) -> PResult<Expr> {
    binop_chain(i, multiplicative_op, parse_unary)
}

fn equality_op(i: Input) -> PResult<Input> {
    alt((tag("=="), tag("!="))).parse(i)
}

fn comparison_op(i: Input) -> PResult<Input> {
    alt((
        tag("<="),
        tag(">="),
        // `<` must not bite into `<<`.
        terminated(tag("<"), not(nom_char('<'))),
        tag(">"),
    ))
    .parse(i)
}

fn additive_op(i: Input) -> PResult<Input> {
    alt((tag("+"), tag("-"))).parse(i)
}

fn multiplicative_op(i: Input) -> PResult<Input> {
    alt((tag("*"), tag("/"), tag("%"))).parse(i)
}

/// Left-fold one precedence level of binary operators into receiver sends.
fn binop_chain<'a>(
    i: Input<'a>,
    op: fn(Input<'a>) -> PResult<'a, Input<'a>>,
    next: fn(Input<'a>) -> PResult<'a, Expr>,
) -> PResult<'a, Expr> {
    let (i, first) = next(i)?;
    let (i, tail) = many0(pair(preceded(inline_ws, op), preceded(inline_ws, next))).parse(i)?;
    let folded = tail.into_iter().fold(first, |lhs, (op_text, rhs)| {
        let span = Span::new(lhs.span().start, rhs.span().end);
        Expr::Send {
            recv: Some(Box::new(lhs)),
            name: op_text.fragment().to_string(),
            args: vec![Arg {
                keyword: None,
                span: rhs.span(),
                value: rhs,
            }],
            block: None,
            safe: false,
            span,
            name_span: span_of(&op_text),
        }
    });
    Ok((i, folded))
}

fn parse_unary(i: Input) -> PResult<Expr> {
    alt((parse_not, parse_negation, parse_postfix)).parse(i)
}

fn parse_not(i: Input) -> PResult<Expr> {
    let (rest, bang) = terminated(tag("!"), not(nom_char('='))).parse(i)?;
    let (rest, operand) = preceded(inline_ws, parse_unary).parse(rest)?;
    let name_span = span_of(&bang);
    let span = Span::new(name_span.start, operand.span().end);
    Ok((
        rest,
        Expr::Send {
            recv: Some(Box::new(operand)),
            name: "!".to_string(),
            args: Vec::new(),
            block: None,
            safe: false,
            span,
            name_span,
        },
    ))
}

fn parse_negation(i: Input) -> PResult<Expr> {
    let (rest, dash) = terminated(
        tag("-"),
        peek(satisfy(|c: char| {
            c.is_ascii_alphabetic() || c == '(' || c == '_'
        })),
    )
    .parse(i)?;
    let (rest, operand) = parse_unary(rest)?;
    let name_span = span_of(&dash);
    let span = Span::new(name_span.start, operand.span().end);
    Ok((
        rest,
        Expr::Send {
            recv: Some(Box::new(operand)),
            name: "-@".to_string(),
            args: Vec::new(),
            block: None,
            safe: false,
            span,
            name_span,
        },
    ))
}

struct PostfixCall {
    safe: bool,
    name: String,
    name_span: Span,
    args: Vec<Arg>,
    block: Option<BlockLit>,
    end: u32,
}

fn parse_postfix(i: Input) -> PResult<Expr> {
    let (i, recv) = parse_primary(i)?;
    let (i, calls) = many0(postfix_call).parse(i)?;
    let folded = calls.into_iter().fold(recv, |recv, call| {
        let span = Span::new(recv.span().start, call.end);
        Expr::Send {
            recv: Some(Box::new(recv)),
            name: call.name,
            args: call.args,
            block: call.block.map(Box::new),
            safe: call.safe,
            span,
            name_span: call.name_span,
        }
    });
    Ok((i, folded))
}

fn postfix_call(i: Input) -> PResult<PostfixCall> {
    let (i, safe) = preceded(
        inline_ws,
        alt((value(true, tag("&.")), value(false, nom_char('.')))),
    )
    .parse(i)?;
    let (i, (name, name_span)) = ident(i)?;
    let (i, args) = opt_call_args(i)?;
    let (i, block) = opt_block(i)?;
    Ok((
        i,
        PostfixCall {
            safe,
            name,
            name_span,
            args,
            block,
            end: offset(&i),
        },
    ))
}

/// `(arg, ...)` directly after the callee; a bare send has no list.
pub(crate) fn opt_call_args(i: Input) -> PResult<Vec<Arg>> {
    map(opt(call_args), Option::unwrap_or_default).parse(i)
}

fn call_args(i: Input) -> PResult<Vec<Arg>> {
    delimited(
        nom_char('('),
        separated_list0(preceded(blank, nom_char(',')), preceded(blank, parse_arg)),
        preceded(blank, nom_char(')')),
    )
    .parse(i)
}

fn parse_arg(i: Input) -> PResult<Arg> {
    alt((keyword_arg, positional_arg)).parse(i)
}

/// `label: value`, with the colon glued to the label.
fn keyword_arg(i: Input) -> PResult<Arg> {
    let start = offset(&i);
    let (rest, (label, _)) = terminated(
        ident,
        terminated(nom_char(':'), not(nom_char(':'))),
    )
    .parse(i)?;
    let (rest, value_expr) = preceded(inline_ws, parse_expr).parse(rest)?;
    let span = Span::new(start, value_expr.span().end);
    Ok((
        rest,
        Arg {
            keyword: Some(label),
            span,
            value: value_expr,
        },
    ))
}

fn positional_arg(i: Input) -> PResult<Arg> {
    map(parse_expr, |value| Arg {
        keyword: None,
        span: value.span(),
        value,
    })
    .parse(i)
}

fn opt_block(i: Input) -> PResult<Option<BlockLit>> {
    opt(preceded(inline_ws, alt((do_block, brace_block)))).parse(i)
}

fn do_block(i: Input) -> PResult<BlockLit> {
    let start = offset(&i);
    let (i, _) = kw("do").parse(i)?;
    let (i, params) = map(
        opt(preceded(inline_ws, block_params)),
        Option::unwrap_or_default,
    )
    .parse(i)?;
    let (i, body) = parse_body(i, &["end"])?;
    let (i, end_span) = keyword(skip_blank(i), "end")?;
    Ok((
        i,
        BlockLit {
            params,
            body,
            span: Span::new(start, end_span.end),
        },
    ))
}

/// Brace blocks require a `|params|` header, keeping them apart from
/// shape-literal braces.
fn brace_block(i: Input) -> PResult<BlockLit> {
    let start = offset(&i);
    let (i, _) = nom_char('{').parse(i)?;
    let (i, params) = preceded(inline_ws, block_params).parse(i)?;
    let (i, body) = parse_body(i, &["}"])?;
    let (i, _) = preceded(blank, nom_char('}')).parse(i)?;
    Ok((
        i,
        BlockLit {
            params,
            body,
            span: Span::new(start, offset(&i)),
        },
    ))
}

fn block_params(i: Input) -> PResult<Vec<(String, Span)>> {
    delimited(
        nom_char('|'),
        separated_list0(preceded(inline_ws, nom_char(',')), preceded(inline_ws, ident)),
        preceded(inline_ws, nom_char('|')),
    )
    .parse(i)
}

fn parse_primary(i: Input) -> PResult<Expr> {
    alt((
        parse_paren,
        map(kw("nil"), Expr::Nil),
        map(kw("true"), Expr::True),
        map(kw("false"), Expr::False),
        map(kw("self"), Expr::SelfRef),
        parse_string,
        parse_symbol,
        parse_number,
        parse_t_call,
        map(const_name, |(name, span)| Expr::Const(name, span)),
        parse_ident_or_self_send,
    ))
    .parse(i)
}

fn parse_paren(i: Input) -> PResult<Expr> {
    delimited(
        nom_char('('),
        preceded(blank, parse_expr),
        preceded(blank, nom_char(')')),
    )
    .parse(i)
}

fn parse_string(i: Input) -> PResult<Expr> {
    let start = offset(&i);
    let (rest, text) = alt((double_quoted, single_quoted)).parse(i)?;
    Ok((rest, Expr::Str(text, Span::new(start, offset(&rest)))))
}

fn double_quoted(i: Input) -> PResult<String> {
    let chunk = alt((
        map(
            take_while1(|c: char| c != '"' && c != '\\'),
            |m: Input| m.fragment().to_string(),
        ),
        map(preceded(nom_char('\\'), satisfy(|_| true)), |c| {
            unescape(c).to_string()
        }),
    ));
    delimited(
        nom_char('"'),
        map(many0(chunk), |parts| parts.concat()),
        nom_char('"'),
    )
    .parse(i)
}

fn single_quoted(i: Input) -> PResult<String> {
    delimited(
        nom_char('\''),
        map(take_while(|c: char| c != '\''), |m: Input| {
            m.fragment().to_string()
        }),
        nom_char('\''),
    )
    .parse(i)
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        other => other,
    }
}

fn parse_symbol(i: Input) -> PResult<Expr> {
    let start = offset(&i);
    let (rest, (name, span)) = preceded(
        terminated(nom_char(':'), not(nom_char(':'))),
        alt((ident, const_name)),
    )
    .parse(i)?;
    Ok((rest, Expr::Sym(name, Span::new(start, span.end))))
}

fn number_literal(i: Input) -> PResult<Input> {
    recognize((
        satisfy(|c: char| c.is_ascii_digit()),
        take_while(|c: char| c.is_ascii_digit() || c == '_'),
        opt(pair(
            nom_char('.'),
            recognize(pair(
                satisfy(|c: char| c.is_ascii_digit()),
                take_while(|c: char| c.is_ascii_digit() || c == '_'),
            )),
        )),
    ))
    .parse(i)
}

fn parse_number(i: Input) -> PResult<Expr> {
    map_res(number_literal, |m: Input| -> Result<Expr, ()> {
        let span = span_of(&m);
        let text: String = m.fragment().chars().filter(|c| *c != '_').collect();
        if text.contains('.') {
            text.parse::<f64>()
                .map(|v| Expr::Float(v.to_bits(), span))
                .map_err(|_| ())
        } else {
            text.parse::<i64>()
                .map(|v| Expr::Integer(v, span))
                .map_err(|_| ())
        }
    })
    .parse(i)
}

/// The `T.` builtins the checker understands specially. Anything else
/// after `T.` falls back to a plain constant send and fails dispatch.
fn parse_t_call(i: Input) -> PResult<Expr> {
    let start = offset(&i);
    let (rest, (name, _)) = preceded(tag("T."), ident).parse(i)?;
    match name.as_str() {
        "let" | "cast" | "assert_type!" => {
            let (rest, (value_expr, ty)) = delimited(
                preceded(inline_ws, nom_char('(')),
                separated_pair(
                    preceded(blank, parse_expr),
                    preceded(blank, nom_char(',')),
                    preceded(blank, parse_type_expr),
                ),
                preceded(blank, nom_char(')')),
            )
            .parse(rest)?;
            let span = Span::new(start, offset(&rest));
            let value = Box::new(value_expr);
            let e = match name.as_str() {
                "let" => Expr::Let { value, ty, span },
                "cast" => Expr::Cast { value, ty, span },
                _ => Expr::AssertType { value, ty, span },
            };
            Ok((rest, e))
        }
        "absurd" => {
            let (rest, value_expr) = delimited(
                preceded(inline_ws, nom_char('(')),
                preceded(blank, parse_expr),
                preceded(blank, nom_char(')')),
            )
            .parse(rest)?;
            Ok((
                rest,
                Expr::Absurd {
                    value: Box::new(value_expr),
                    span: Span::new(start, offset(&rest)),
                },
            ))
        }
        _ => Err(nom_error(i)),
    }
}

fn parse_ident_or_self_send(i: Input) -> PResult<Expr> {
    let start = offset(&i);
    let (rest, (name, name_span)) = ident(i)?;
    let (rest, args) = opt_call_args(rest)?;
    let (rest, block) = opt_block(rest)?;
    if args.is_empty() && block.is_none() {
        return Ok((rest, Expr::Local(name, name_span)));
    }
    Ok((
        rest,
        Expr::Send {
            recv: None,
            name,
            args,
            block: block.map(Box::new),
            safe: false,
            span: Span::new(start, offset(&rest)),
            name_span,
        },
    ))
}

// ---- type expressions ----------------------------------------------------

/// Surface types: used by sigs, `T.let`/`T.cast`, and type aliases.
pub(crate) fn parse_type_expr(i: Input) -> PResult<TypeExpr> {
    alt((
        parse_t_type,
        parse_boolean_type,
        parse_tuple_type,
        parse_shape_type,
        parse_named_type,
    ))
    .parse(i)
}

fn parse_t_type(i: Input) -> PResult<TypeExpr> {
    let start = offset(&i);
    let (rest, (name, name_span)) = preceded(tag("T."), ident).parse(i)?;
    match name.as_str() {
        "untyped" => Ok((rest, TypeExpr::Untyped(Span::new(start, name_span.end)))),
        "anything" => Ok((rest, TypeExpr::Anything(Span::new(start, name_span.end)))),
        "noreturn" => Ok((rest, TypeExpr::NoReturn(Span::new(start, name_span.end)))),
        "self_type" => Ok((rest, TypeExpr::SelfType(Span::new(start, name_span.end)))),
        "nilable" => {
            let (rest, inner) = paren_type(rest)?;
            Ok((
                rest,
                TypeExpr::Nilable(Box::new(inner), Span::new(start, offset(&rest))),
            ))
        }
        "class_of" => {
            let (rest, inner) = paren_type(rest)?;
            Ok((
                rest,
                TypeExpr::ClassOf(Box::new(inner), Span::new(start, offset(&rest))),
            ))
        }
        "any" => {
            let (rest, list) = paren_type_list(rest)?;
            Ok((rest, TypeExpr::Any(list, Span::new(start, offset(&rest)))))
        }
        "all" => {
            let (rest, list) = paren_type_list(rest)?;
            Ok((rest, TypeExpr::All(list, Span::new(start, offset(&rest)))))
        }
        "type_parameter" => {
            let (rest, (param, _)) = delimited(
                preceded(inline_ws, nom_char('(')),
                preceded(blank, preceded(nom_char(':'), ident)),
                preceded(blank, nom_char(')')),
            )
            .parse(rest)?;
            Ok((
                rest,
                TypeExpr::TypeParameter(param, Span::new(start, offset(&rest))),
            ))
        }
        _ => Err(nom_error(i)),
    }
}

fn parse_boolean_type(i: Input) -> PResult<TypeExpr> {
    map(
        terminated(tag("T::Boolean"), not(satisfy(crate::is_ident_char))),
        |m: Input| TypeExpr::Boolean(span_of(&m)),
    )
    .parse(i)
}

/// `(Type)` after a `T.` builder.
pub(crate) fn paren_type(i: Input) -> PResult<TypeExpr> {
    delimited(
        preceded(inline_ws, nom_char('(')),
        preceded(blank, parse_type_expr),
        preceded(blank, nom_char(')')),
    )
    .parse(i)
}

pub(crate) fn paren_type_list(i: Input) -> PResult<Vec<TypeExpr>> {
    delimited(
        preceded(inline_ws, nom_char('(')),
        separated_list0(
            preceded(blank, nom_char(',')),
            preceded(blank, parse_type_expr),
        ),
        preceded(blank, nom_char(')')),
    )
    .parse(i)
}

fn parse_tuple_type(i: Input) -> PResult<TypeExpr> {
    let start = offset(&i);
    let (rest, elems) = delimited(
        nom_char('['),
        separated_list0(
            preceded(blank, nom_char(',')),
            preceded(blank, parse_type_expr),
        ),
        preceded(blank, nom_char(']')),
    )
    .parse(i)?;
    Ok((rest, TypeExpr::Tuple(elems, Span::new(start, offset(&rest)))))
}

fn parse_shape_type(i: Input) -> PResult<TypeExpr> {
    let start = offset(&i);
    let (rest, fields) = delimited(
        nom_char('{'),
        separated_list0(preceded(blank, nom_char(',')), preceded(blank, shape_field)),
        preceded(blank, nom_char('}')),
    )
    .parse(i)?;
    Ok((rest, TypeExpr::Shape(fields, Span::new(start, offset(&rest)))))
}

fn shape_field(i: Input) -> PResult<(String, TypeExpr)> {
    map(
        separated_pair(ident, nom_char(':'), preceded(blank, parse_type_expr)),
        |((name, _), ty)| (name, ty),
    )
    .parse(i)
}

/// Constant, possibly applied: `Array[Integer]`.
fn parse_named_type(i: Input) -> PResult<TypeExpr> {
    let start = offset(&i);
    let (rest, (name, name_span)) = const_name(i)?;
    let (rest, args) = opt(bracket_type_args).parse(rest)?;
    match args {
        Some(args) => Ok((
            rest,
            TypeExpr::Applied {
                base: name,
                args,
                span: Span::new(start, offset(&rest)),
            },
        )),
        None => Ok((rest, TypeExpr::Name(name, name_span))),
    }
}

fn bracket_type_args(i: Input) -> PResult<Vec<TypeExpr>> {
    delimited(
        nom_char('['),
        separated_list0(
            preceded(blank, nom_char(',')),
            preceded(blank, parse_type_expr),
        ),
        preceded(blank, nom_char(']')),
    )
    .parse(i)
}
