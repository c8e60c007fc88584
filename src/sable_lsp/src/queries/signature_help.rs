use crate::queries::{position_to_offset, word_at};
use crate::state::CheckerState;
use lsp_types::{
    ParameterInformation, ParameterLabel, Position, SignatureHelp, SignatureInformation,
};
use sable_core::Symbol;

/// Signature of the call whose argument list encloses the position: scan
/// back to the unbalanced `(`, take the word before it, and show every
/// method of that name.
pub fn signature_help(
    state: &CheckerState,
    uri: &str,
    position: Position,
) -> Option<SignatureHelp> {
    let open = state.files.get(uri)?;
    let source = &state.gs.file(open.record.file).source;
    let offset = position_to_offset(state, open.record.file, position) as usize;

    let bytes = source.as_bytes();
    let mut depth = 0i32;
    let mut call_open = None;
    for i in (0..offset.min(bytes.len())).rev() {
        match bytes[i] as char {
            ')' => depth += 1,
            '(' => {
                if depth == 0 {
                    call_open = Some(i);
                    break;
                }
                depth -= 1;
            }
            '\n' if depth == 0 => break,
            _ => {}
        }
    }
    let call_open = call_open?;
    let (name, _) = word_at(source, call_open.saturating_sub(1) as u32)?;

    let mut signatures = Vec::new();
    for (_, sym) in state.gs.symbols_iter() {
        if !sym.is_method() || state.gs.name_str(sym.name) != name {
            continue;
        }
        signatures.push(signature_info(state, &name, sym));
    }
    if signatures.is_empty() {
        return None;
    }
    Some(SignatureHelp {
        signatures,
        active_signature: Some(0),
        active_parameter: None,
    })
}

fn signature_info(state: &CheckerState, name: &str, sym: &Symbol) -> SignatureInformation {
    let params: Vec<String> = sym
        .arguments
        .iter()
        .map(|a| {
            format!(
                "{}: {}",
                state.gs.name_str(a.name),
                a.ty.show(&state.gs)
            )
        })
        .collect();
    let label = format!(
        "{}({}) -> {}",
        name,
        params.join(", "),
        sym.result_type.show(&state.gs)
    );
    SignatureInformation {
        label,
        documentation: None,
        parameters: Some(
            params
                .into_iter()
                .map(|p| ParameterInformation {
                    label: ParameterLabel::Simple(p),
                    documentation: None,
                })
                .collect(),
        ),
        active_parameter: None,
    }
}
