// Read-only queries against the most recently committed state. None of
// these mutate anything; they only look at cached pipeline artifacts.

pub mod completion;
pub mod hover;
pub mod navigation;
pub mod references;
pub mod signature_help;
pub mod symbols;

use crate::state::CheckerState;
use lsp_types::{Position, Range};
use sable_core::{FileRef, Loc};

/// LSP position (0-based) to byte offset in a file.
pub(crate) fn position_to_offset(
    state: &CheckerState,
    file: FileRef,
    position: Position,
) -> u32 {
    state
        .gs
        .file(file)
        .position_to_offset(position.line + 1, position.character + 1)
}

/// Byte range to an LSP range.
pub(crate) fn loc_to_range(state: &CheckerState, loc: Loc) -> Range {
    let file = state.gs.file(loc.file);
    let begin = file.offset_to_position(loc.begin);
    let end = file.offset_to_position(loc.end);
    Range {
        start: Position {
            line: begin.line - 1,
            character: begin.column - 1,
        },
        end: Position {
            line: end.line - 1,
            character: end.column - 1,
        },
    }
}

pub(crate) fn span_to_range(
    state: &CheckerState,
    file: FileRef,
    span: sable_syntax::Span,
) -> Range {
    loc_to_range(state, Loc::new(file, span.start, span.end))
}

/// The identifier-ish word around an offset, for completion prefixes and
/// symbol lookups.
pub(crate) fn word_at(source: &str, offset: u32) -> Option<(String, u32)> {
    let bytes = source.as_bytes();
    let mut start = (offset as usize).min(bytes.len());
    while start > 0 {
        let c = bytes[start - 1] as char;
        if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
            start -= 1;
        } else {
            break;
        }
    }
    let mut end = (offset as usize).min(bytes.len());
    while end < bytes.len() {
        let c = bytes[end] as char;
        if c.is_ascii_alphanumeric() || c == '_' || c == '?' || c == '!' {
            end += 1;
        } else {
            break;
        }
    }
    if start == end {
        return None;
    }
    Some((source[start..end].to_string(), start as u32))
}
