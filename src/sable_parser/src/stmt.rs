// Statement grammar. `unless` and `until` fold into `if`/`while` here;
// `case` survives as its own node for the CFG builder.

use crate::expr::parse_expr;
use crate::{
    const_name, ident, inline_ws, keyword, kw, nom_error, offset, peek_keyword, seps, ws, Input,
    PResult,
};
use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::char as nom_char;
use nom::combinator::{eof, map, not, opt, peek, value};
use nom::multi::{separated_list0, separated_list1};
use nom::sequence::{preceded, terminated};
use nom::Parser;
use sable_syntax::{Expr, Rescue, Span, Stmt, WhenClause};

/// Parse statements until one of `stops` appears at statement position.
/// The stop keyword itself is not consumed.
pub(crate) fn parse_body<'a>(i: Input<'a>, stops: &[&'static str]) -> PResult<'a, Vec<Stmt>> {
    let mut stmts = Vec::new();
    let mut i = i;
    loop {
        let (rest, _) = seps(i);
        i = rest;
        if i.fragment().is_empty() || at_stop(i, stops) {
            return Ok((i, stmts));
        }
        let (rest, stmt) = parse_stmt(i)?;
        stmts.push(stmt);
        let (rest, had_sep) = seps(rest);
        if !had_sep && !rest.fragment().is_empty() && !at_stop(rest, stops) {
            return Err(nom_error(rest));
        }
        i = rest;
    }
}

fn at_stop(i: Input, stops: &[&'static str]) -> bool {
    stops.iter().any(|s| {
        if *s == "}" {
            peek_char(i, '}')
        } else {
            peek_keyword(i, s)
        }
    })
}

fn peek_char(i: Input, c: char) -> bool {
    let result: PResult<char> = peek(nom_char(c)).parse(i);
    result.is_ok()
}

pub(crate) fn parse_stmt(i: Input) -> PResult<Stmt> {
    if peek_keyword(i, "if") {
        return parse_if(i);
    }
    if peek_keyword(i, "unless") {
        return parse_unless(i);
    }
    if peek_keyword(i, "while") {
        return parse_while(i, false);
    }
    if peek_keyword(i, "until") {
        return parse_while(i, true);
    }
    if peek_keyword(i, "case") {
        return parse_case(i);
    }
    if peek_keyword(i, "begin") {
        return parse_begin(i);
    }
    if peek_keyword(i, "return") {
        return parse_return(i);
    }
    alt((parse_assign, map(parse_expr, Stmt::Expr))).parse(i)
}

/// `name = expr` with a single `=`; everything else is an expression.
fn parse_assign(i: Input) -> PResult<Stmt> {
    let start = offset(&i);
    let (rest, (target, target_span)) = ident(i)?;
    let (rest, _) = preceded(inline_ws, terminated(nom_char('='), not(nom_char('=')))).parse(rest)?;
    let (rest, value_expr) = preceded(inline_ws, parse_expr).parse(rest)?;
    let span = Span::new(start, value_expr.span().end);
    Ok((
        rest,
        Stmt::Assign {
            target,
            value: value_expr,
            target_span,
            span,
        },
    ))
}

fn parse_if(i: Input) -> PResult<Stmt> {
    let start = offset(&i);
    let (i, _) = keyword(i, "if")?;
    parse_if_tail(i, start, false)
}

fn parse_unless(i: Input) -> PResult<Stmt> {
    let start = offset(&i);
    let (i, _) = keyword(i, "unless")?;
    // `unless c … else …` is `if c` with the branches swapped.
    let (i, cond) = preceded(inline_ws, parse_expr).parse(i)?;
    let (i, then_body) = parse_body(i, &["else", "end"])?;
    let (i, else_body) = if peek_keyword(i, "else") {
        let (i, _) = keyword(i, "else")?;
        parse_body(i, &["end"])?
    } else {
        (i, Vec::new())
    };
    let (i, end_span) = keyword(i, "end")?;
    Ok((
        i,
        Stmt::If {
            cond,
            then_body: else_body,
            else_body: then_body,
            span: Span::new(start, end_span.end),
        },
    ))
}

/// Shared tail for `if` and `elsif` chains. An `elsif` becomes a nested
/// `if` in the else branch; only the outermost consumes `end`.
fn parse_if_tail(i: Input, start: u32, nested: bool) -> PResult<Stmt> {
    let (i, cond) = preceded(inline_ws, parse_expr).parse(i)?;
    let (i, _) = opt_then(i);
    let (i, then_body) = parse_body(i, &["elsif", "else", "end"])?;
    if peek_keyword(i, "elsif") {
        let inner_start = offset(&i);
        let (i, _) = keyword(i, "elsif")?;
        let (i, nested_if) = parse_if_tail(i, inner_start, true)?;
        let end = nested_if.span().end;
        let stmt = Stmt::If {
            cond,
            then_body,
            else_body: vec![nested_if],
            span: Span::new(start, end),
        };
        return finish_if(i, stmt, nested);
    }
    let (i, else_body) = if peek_keyword(i, "else") {
        let (i, _) = keyword(i, "else")?;
        parse_body(i, &["end"])?
    } else {
        (i, Vec::new())
    };
    if nested {
        // The enclosing chain owns the `end`.
        let end = else_body
            .last()
            .map(|s| s.span().end)
            .or_else(|| then_body.last().map(|s| s.span().end))
            .unwrap_or(cond.span().end);
        return Ok((
            i,
            Stmt::If {
                cond,
                then_body,
                else_body,
                span: Span::new(start, end),
            },
        ));
    }
    let (i, end_span) = keyword(i, "end")?;
    Ok((
        i,
        Stmt::If {
            cond,
            then_body,
            else_body,
            span: Span::new(start, end_span.end),
        },
    ))
}

fn finish_if<'a>(i: Input<'a>, stmt: Stmt, nested: bool) -> PResult<'a, Stmt> {
    if nested {
        return Ok((i, stmt));
    }
    let (i, end_span) = keyword(i, "end")?;
    match stmt {
        Stmt::If {
            cond,
            then_body,
            else_body,
            span,
        } => Ok((
            i,
            Stmt::If {
                cond,
                then_body,
                else_body,
                span: Span::new(span.start, end_span.end),
            },
        )),
        other => Ok((i, other)),
    }
}

fn opt_then(i: Input) -> (Input, bool) {
    match preceded(inline_ws, kw("then")).parse(i) {
        Ok((rest, _)) => (rest, true),
        Err(_) => (i, false),
    }
}

fn opt_do(i: Input) -> (Input, bool) {
    match preceded(inline_ws, kw("do")).parse(i) {
        Ok((rest, _)) => (rest, true),
        Err(_) => (i, false),
    }
}

fn parse_while(i: Input, negated: bool) -> PResult<Stmt> {
    let start = offset(&i);
    let (i, _) = keyword(i, if negated { "until" } else { "while" })?;
    let (i, cond) = preceded(inline_ws, parse_expr).parse(i)?;
    let cond = if negated {
        let span = cond.span();
        Expr::Send {
            recv: Some(Box::new(cond)),
            name: "!".to_string(),
            args: Vec::new(),
            block: None,
            safe: false,
            span,
            name_span: span,
        }
    } else {
        cond
    };
    let (i, _) = opt_do(i);
    let (i, body) = parse_body(i, &["end"])?;
    let (i, end_span) = keyword(i, "end")?;
    Ok((
        i,
        Stmt::While {
            cond,
            body,
            span: Span::new(start, end_span.end),
        },
    ))
}

fn parse_case(i: Input) -> PResult<Stmt> {
    let start = offset(&i);
    let (i, _) = keyword(i, "case")?;
    let (i, scrutinee) = preceded(inline_ws, parse_expr).parse(i)?;
    let (mut i, _) = seps(i);
    let mut whens = Vec::new();
    while peek_keyword(i, "when") {
        let when_start = offset(&i);
        let (rest, _) = keyword(i, "when")?;
        let (rest, patterns) = separated_list1(
            preceded(inline_ws, nom_char(',')),
            preceded(inline_ws, parse_expr),
        )
        .parse(rest)?;
        let (rest, _) = opt_then(rest);
        let (rest, body) = parse_body(rest, &["when", "else", "end"])?;
        let end = body
            .last()
            .map(|s| s.span().end)
            .unwrap_or_else(|| offset(&rest));
        whens.push(WhenClause {
            patterns,
            body,
            span: Span::new(when_start, end),
        });
        i = rest;
    }
    let (i, else_body) = if peek_keyword(i, "else") {
        let (i, _) = keyword(i, "else")?;
        parse_body(i, &["end"])?
    } else {
        (i, Vec::new())
    };
    let (i, end_span) = keyword(i, "end")?;
    Ok((
        i,
        Stmt::Case {
            scrutinee,
            whens,
            else_body,
            span: Span::new(start, end_span.end),
        },
    ))
}

fn parse_begin(i: Input) -> PResult<Stmt> {
    let start = offset(&i);
    let (i, _) = keyword(i, "begin")?;
    let (i, body) = parse_body(i, &["rescue", "ensure", "end"])?;
    let mut rescues = Vec::new();
    let mut i = i;
    while peek_keyword(i, "rescue") {
        let rescue_start = offset(&i);
        let (rest, _) = keyword(i, "rescue")?;
        let (rest, classes) = separated_list0(
            preceded(inline_ws, nom_char(',')),
            preceded(inline_ws, const_name),
        )
        .parse(rest)?;
        let (rest, binder) = opt(preceded(
            preceded(inline_ws, tag("=>")),
            preceded(inline_ws, ident),
        ))
        .parse(rest)?;
        let (rest, body) = parse_body(rest, &["rescue", "ensure", "end"])?;
        let end = body
            .last()
            .map(|s| s.span().end)
            .unwrap_or_else(|| offset(&rest));
        rescues.push(Rescue {
            classes,
            binder,
            body,
            span: Span::new(rescue_start, end),
        });
        i = rest;
    }
    let (i, ensure_body) = if peek_keyword(i, "ensure") {
        let (i, _) = keyword(i, "ensure")?;
        parse_body(i, &["end"])?
    } else {
        (i, Vec::new())
    };
    let (i, end_span) = keyword(i, "end")?;
    Ok((
        i,
        Stmt::Begin {
            body,
            rescues,
            ensure_body,
            span: Span::new(start, end_span.end),
        },
    ))
}

/// A separator, comment, or end of input: nothing left on this line.
fn line_terminator(i: Input) -> PResult<()> {
    alt((
        value((), nom_char('\n')),
        value((), nom_char(';')),
        value((), nom_char('#')),
        value((), eof),
    ))
    .parse(i)
}

fn parse_return(i: Input) -> PResult<Stmt> {
    let start = offset(&i);
    let (i, kw_span) = keyword(i, "return")?;
    // A value is present when something other than a separator or closing
    // keyword follows on the same line.
    let probe = ws(i);
    let has_value = line_terminator(probe).is_err()
        && !at_stop(probe, &["end", "else", "elsif", "when", "rescue", "ensure"]);
    if has_value {
        let (rest, value_expr) = parse_expr(probe)?;
        let span = Span::new(start, value_expr.span().end);
        return Ok((
            rest,
            Stmt::Return {
                value: Some(value_expr),
                span,
            },
        ));
    }
    Ok((
        i,
        Stmt::Return {
            value: None,
            span: Span::new(start, kw_span.end),
        },
    ))
}
