use crate::queries::navigation::{symbol_at, symbol_locations};
use crate::queries::span_to_range;
use crate::state::CheckerState;
use lsp_types::{Location, Position, Url};

/// Every recorded use of the symbol under the cursor, across all files,
/// optionally including its declarations.
pub fn references(
    state: &CheckerState,
    uri: &str,
    position: Position,
    include_declaration: bool,
) -> Vec<Location> {
    let sym = match symbol_at(state, uri, position) {
        Some(sym) => sym,
        None => return Vec::new(),
    };
    let mut out = Vec::new();
    if include_declaration {
        out.extend(symbol_locations(state, sym));
    }
    let mut paths: Vec<&String> = state.files.keys().collect();
    paths.sort();
    for path in paths {
        let open = &state.files[path];
        let url = match Url::parse(path).or_else(|_| Url::parse(&format!("file://{}", path))) {
            Ok(u) => u,
            Err(_) => continue,
        };
        for result in &open.results {
            for (span, target) in &result.refs {
                if *target == sym {
                    out.push(Location {
                        uri: url.clone(),
                        range: span_to_range(state, open.record.file, *span),
                    });
                }
            }
        }
    }
    out
}
