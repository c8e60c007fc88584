use crate::queries::{position_to_offset, span_to_range};
use crate::state::CheckerState;
use lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position};

/// The type of the smallest inferred span covering the position.
pub fn hover(state: &CheckerState, uri: &str, position: Position) -> Option<Hover> {
    let open = state.files.get(uri)?;
    let file = open.record.file;
    let offset = position_to_offset(state, file, position);

    let mut best: Option<(sable_syntax::Span, &sable_core::Type)> = None;
    for result in &open.results {
        for (span, ty) in &result.hover {
            if span.contains(offset) {
                let better = match best {
                    Some((b, _)) => span.len() < b.len(),
                    None => true,
                };
                if better {
                    best = Some((*span, ty));
                }
            }
        }
    }
    let (span, ty) = best?;
    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: format!("```\n{}\n```", ty.show(&state.gs)),
        }),
        range: Some(span_to_range(state, file, span)),
    })
}
