// Front end for the checker. nom-based, line-oriented, with statement-level
// recovery: a failed region is reported as a syntax-error diagnostic and
// parsing resumes on the next line, so the pipeline always gets a tree.

mod defs;
mod expr;
mod stmt;

use log::trace;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_till, take_while};
use nom::character::complete::{char as nom_char, satisfy};
use nom::combinator::{map, not, opt, recognize, value};
use nom::multi::{many0, many1};
use nom::sequence::{pair, preceded, terminated};
use nom::Parser;
use sable_syntax::{SourceFile, Span, TypedSigil};

pub type Input<'a> = nom_locate::LocatedSpan<&'a str>;
pub type PResult<'a, T> = nom::IResult<Input<'a>, T>;

/// Syntax error with a source span, before it becomes a core diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseDiagnostic {
    pub message: String,
    pub span: Span,
}

/// Parse one file. Always returns a tree; errors are collected alongside.
pub fn parse_source(source: &str) -> (SourceFile, Vec<ParseDiagnostic>) {
    trace!("parsing {} bytes", source.len());
    let sigil = scan_typed_sigil(source);
    let mut diagnostics = Vec::new();
    let (defs, top_stmts) = defs::parse_program(Input::new(source), &mut diagnostics);
    (
        SourceFile {
            sigil,
            defs,
            top_stmts,
        },
        diagnostics,
    )
}

/// The `# typed:` magic comment, from the leading comment block only.
fn scan_typed_sigil(source: &str) -> Option<TypedSigil> {
    for line in source.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !trimmed.starts_with('#') {
            return None;
        }
        let rest = trimmed.trim_start_matches('#').trim();
        if let Some(word) = rest.strip_prefix("typed:") {
            return TypedSigil::parse(word.trim());
        }
    }
    None
}

// ---- shared lexical combinators -----------------------------------------

pub(crate) fn offset(i: &Input) -> u32 {
    i.location_offset() as u32
}

/// Span of a matched fragment.
pub(crate) fn span_of(m: &Input) -> Span {
    let start = m.location_offset() as u32;
    Span::new(start, start + m.fragment().len() as u32)
}

/// Inline whitespace: spaces, tabs, carriage returns. Newlines separate
/// statements and belong to `seps`.
pub(crate) fn inline_ws(i: Input) -> PResult<Input> {
    take_while(|c: char| c == ' ' || c == '\t' || c == '\r').parse(i)
}

/// `inline_ws` collapsed to its remainder, for the imperative drivers.
pub(crate) fn ws(i: Input) -> Input {
    inline_ws(i).map(|(rest, _)| rest).unwrap_or(i)
}

/// `#` comment running to the end of the line; the newline stays.
pub(crate) fn comment(i: Input) -> PResult<Input> {
    recognize(pair(nom_char('#'), take_till(|c| c == '\n'))).parse(i)
}

/// One statement separator: trivia, then a newline or `;`.
fn separator(i: Input) -> PResult<()> {
    value(
        (),
        (inline_ws, opt(comment), alt((nom_char('\n'), nom_char(';')))),
    )
    .parse(i)
}

/// Consume one or more statement separators with surrounding trivia.
/// Returns whether any separator was present; leading inline whitespace is
/// eaten either way.
pub(crate) fn seps(i: Input) -> (Input, bool) {
    let (i, any) = match many1(separator).parse(i) {
        Ok((rest, _)) => (rest, true),
        Err(_) => (i, false),
    };
    // Trailing spaces, plus a final comment with no newline behind it.
    match (inline_ws, opt(comment)).parse(i) {
        Ok((rest, _)) => (rest, any),
        Err(_) => (i, any),
    }
}

/// Skip any run of separators and trivia.
pub(crate) fn skip_blank(i: Input) -> Input {
    seps(i).0
}

/// `skip_blank` as a parser, for `preceded`/`delimited` positions.
pub(crate) fn blank(i: Input) -> PResult<()> {
    Ok((skip_blank(i), ()))
}

pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_ascii_lowercase() || c == '_'
}

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Lowercase identifier; a trailing `?` or `!` belongs to method names.
pub(crate) fn ident(i: Input) -> PResult<(String, Span)> {
    map(
        recognize((
            satisfy(is_ident_start),
            take_while(is_ident_char),
            opt(alt((nom_char('?'), nom_char('!')))),
        )),
        |m: Input| (m.fragment().to_string(), span_of(&m)),
    )
    .parse(i)
}

fn const_segment(i: Input) -> PResult<Input> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_uppercase()),
        take_while(is_ident_char),
    ))
    .parse(i)
}

/// Uppercase constant name, possibly qualified with `::`.
pub(crate) fn const_name(i: Input) -> PResult<(String, Span)> {
    map(
        recognize(pair(
            const_segment,
            many0(preceded(tag("::"), const_segment)),
        )),
        |m: Input| (m.fragment().to_string(), span_of(&m)),
    )
    .parse(i)
}

/// Match a keyword with a word boundary after it.
pub(crate) fn keyword<'a>(i: Input<'a>, word: &'static str) -> PResult<'a, Span> {
    map(
        terminated(tag(word), not(satisfy(is_ident_char))),
        |m: Input| span_of(&m),
    )
    .parse(i)
}

/// `keyword` as a parser factory, for `alt`/`map` positions.
pub(crate) fn kw<'a>(word: &'static str) -> impl FnMut(Input<'a>) -> PResult<'a, Span> {
    move |i| keyword(i, word)
}

pub(crate) fn peek_keyword(i: Input, word: &'static str) -> bool {
    keyword(i, word).is_ok()
}

pub(crate) fn nom_error(i: Input) -> nom::Err<nom::error::Error<Input>> {
    nom::Err::Error(nom::error::Error::new(i, nom::error::ErrorKind::Fail))
}

/// Everything up to and including the next newline, for recovery.
fn line_remainder(i: Input) -> PResult<()> {
    value((), pair(take_till(|c| c == '\n'), opt(nom_char('\n')))).parse(i)
}

/// Skip to the start of the next line, for recovery after a syntax error.
pub(crate) fn skip_to_next_line(i: Input) -> Input {
    line_remainder(i).map(|(rest, _)| rest).unwrap_or(i)
}
