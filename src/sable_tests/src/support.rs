// Shared helpers for the test modules.

use sable_core::{Diagnostic, GlobalState};
use sable_infer::pipeline::{Phase, Pipeline};

/// Run one in-memory file through the whole pipeline.
pub fn check(source: &str) -> (GlobalState, Vec<Diagnostic>) {
    let (gs, _records, diagnostics) =
        Pipeline::run(vec![("test.sable".to_string(), source.to_string())], Phase::Infer);
    (gs, diagnostics)
}

pub fn codes(diagnostics: &[Diagnostic]) -> Vec<&'static str> {
    diagnostics.iter().map(|d| d.code.as_str()).collect()
}

/// Resolve a top-level class by name.
pub fn class(gs: &GlobalState, name: &str) -> sable_core::SymbolRef {
    sable_infer::resolve::lookup_constant(gs, sable_core::Symbols::ROOT, name)
        .unwrap_or_else(|| panic!("class {} not found", name))
}
