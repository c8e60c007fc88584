use crate::queries::{position_to_offset, word_at};
use crate::state::CheckerState;
use lsp_types::{CompletionItem, CompletionItemKind, Position};
use sable_core::Name;

/// Prefix completion. After a `.` the candidates are method names; at a
/// constant prefix, class names; otherwise both methods and keywords.
pub fn completion(state: &CheckerState, uri: &str, position: Position) -> Vec<CompletionItem> {
    let open = match state.files.get(uri) {
        Some(f) => f,
        None => return Vec::new(),
    };
    let source = &state.gs.file(open.record.file).source;
    let offset = position_to_offset(state, open.record.file, position);
    let (prefix, word_start) = word_at(source, offset).unwrap_or((String::new(), offset));
    let after_dot = source[..word_start as usize].trim_end().ends_with('.');
    let constant_prefix = prefix.chars().next().map(|c| c.is_ascii_uppercase());

    let mut items: Vec<CompletionItem> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for (_, sym) in state.gs.symbols_iter() {
        let name = match state.gs.name(sym.name) {
            Name::Utf8(s) => s.clone(),
            Name::Constant(inner) => state.gs.name_str(*inner),
            Name::Unique { .. } => continue,
        };
        if name.starts_with('<') || !name.starts_with(prefix.as_str()) {
            continue;
        }
        let (keep, kind) = if sym.is_method() {
            (!matches!(constant_prefix, Some(true)), CompletionItemKind::METHOD)
        } else if sym.is_class() {
            (!after_dot, CompletionItemKind::CLASS)
        } else {
            (false, CompletionItemKind::VALUE)
        };
        if !keep || seen.contains(&name) {
            continue;
        }
        seen.push(name.clone());
        items.push(CompletionItem {
            label: name,
            kind: Some(kind),
            ..CompletionItem::default()
        });
    }
    items.sort_by(|a, b| a.label.cmp(&b.label));
    items
}
