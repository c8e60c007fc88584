use crate::queries::{loc_to_range, position_to_offset};
use crate::state::CheckerState;
use lsp_types::{Location, Position, Url};
use sable_core::SymbolRef;

/// The symbol referenced at a position, if inference recorded one there.
pub fn symbol_at(state: &CheckerState, uri: &str, position: Position) -> Option<SymbolRef> {
    let open = state.files.get(uri)?;
    let offset = position_to_offset(state, open.record.file, position);
    let mut best: Option<(sable_syntax::Span, SymbolRef)> = None;
    for result in &open.results {
        for (span, sym) in &result.refs {
            if span.contains(offset) {
                let better = match best {
                    Some((b, _)) => span.len() < b.len(),
                    None => true,
                };
                if better {
                    best = Some((*span, *sym));
                }
            }
        }
    }
    if best.is_none() {
        // The cursor may be on a definition itself.
        for (sym, data) in state.gs.symbols_iter() {
            for loc in &data.locs {
                if loc.exists()
                    && loc.file == open.record.file
                    && loc.contains_offset(offset)
                {
                    return Some(sym);
                }
            }
        }
    }
    best.map(|(_, sym)| sym)
}

/// All declaration sites of a symbol as editor locations.
pub fn symbol_locations(state: &CheckerState, sym: SymbolRef) -> Vec<Location> {
    let mut out = Vec::new();
    for loc in &state.gs.symbol(sym).locs {
        if !loc.exists() {
            continue;
        }
        let path = &state.gs.file(loc.file).path;
        if let Ok(url) = Url::parse(path).or_else(|_| Url::parse(&format!("file://{}", path))) {
            out.push(Location {
                uri: url,
                range: loc_to_range(state, *loc),
            });
        }
    }
    out
}

pub fn definition(state: &CheckerState, uri: &str, position: Position) -> Vec<Location> {
    match symbol_at(state, uri, position) {
        Some(sym) => symbol_locations(state, sym),
        None => Vec::new(),
    }
}
