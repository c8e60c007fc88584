use crate::queries::navigation::symbol_locations;
use crate::queries::span_to_range;
use crate::state::CheckerState;
use lsp_types::{DocumentSymbol, SymbolInformation, SymbolKind};
use sable_syntax::Def;

/// Class/method outline of one file, from its parsed tree.
pub fn document_symbols(state: &CheckerState, uri: &str) -> Vec<DocumentSymbol> {
    let open = match state.files.get(uri) {
        Some(f) => f,
        None => return Vec::new(),
    };
    let file = open.record.file;
    walk(state, file, &open.record.tree.defs)
}

#[allow(deprecated)]
fn walk(
    state: &CheckerState,
    file: sable_core::FileRef,
    defs: &[Def],
) -> Vec<DocumentSymbol> {
    let mut out = Vec::new();
    for def in defs {
        match def {
            Def::Class(c) => out.push(DocumentSymbol {
                name: c.name.clone(),
                detail: c.superclass.as_ref().map(|s| format!("< {}", s)),
                kind: SymbolKind::CLASS,
                tags: None,
                deprecated: None,
                range: span_to_range(state, file, c.span),
                selection_range: span_to_range(state, file, c.name_span),
                children: Some(walk(state, file, &c.body)),
            }),
            Def::Method(m) => out.push(DocumentSymbol {
                name: m.name.clone(),
                detail: None,
                kind: SymbolKind::METHOD,
                tags: None,
                deprecated: None,
                range: span_to_range(state, file, m.span),
                selection_range: span_to_range(state, file, m.name_span),
                children: None,
            }),
            Def::TypeAlias(a) => out.push(DocumentSymbol {
                name: a.name.clone(),
                detail: None,
                kind: SymbolKind::TYPE_PARAMETER,
                tags: None,
                deprecated: None,
                range: span_to_range(state, file, a.span),
                selection_range: span_to_range(state, file, a.name_span),
                children: None,
            }),
        }
    }
    out
}

/// Case-insensitive substring search over user-defined classes and
/// methods.
#[allow(deprecated)]
pub fn workspace_symbols(state: &CheckerState, query: &str) -> Vec<SymbolInformation> {
    let needle = query.to_lowercase();
    let mut out = Vec::new();
    for (sym, data) in state.gs.symbols_iter() {
        if !data.is_class() && !data.is_method() {
            continue;
        }
        let name = state.gs.symbol_name_str(sym);
        if name.starts_with('<') {
            continue;
        }
        if !needle.is_empty() && !name.to_lowercase().contains(&needle) {
            continue;
        }
        for location in symbol_locations(state, sym) {
            out.push(SymbolInformation {
                name: name.clone(),
                kind: if data.is_class() {
                    SymbolKind::CLASS
                } else {
                    SymbolKind::METHOD
                },
                tags: None,
                deprecated: None,
                location,
                container_name: Some(state.gs.symbol_name_str(data.owner)),
            });
        }
    }
    out
}
