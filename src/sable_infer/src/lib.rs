// Inference crate: definition indexing, per-method control-flow graphs,
// and the typed dataflow pass, tied together by the file pipeline.

pub mod cfg;
pub mod index;
pub mod infer;
pub mod pipeline;
pub mod resolve;
mod stdlib;

pub use cfg::{BasicBlock, BlockId, Binding, Cfg, Instruction, LocalRef, Terminator};
pub use infer::{infer_cfg, InferResult};
pub use pipeline::{FileRecord, MethodCheck, Phase, Pipeline};

use sable_core::{Diagnostic, DiagnosticCode, FileRef, Loc};
use sable_syntax::Span;

/// A diagnostic-to-be that only knows its span; the pipeline attaches the
/// file when it queues them.
#[derive(Debug, Clone)]
pub struct SpannedError {
    pub code: DiagnosticCode,
    pub message: String,
    pub span: Span,
}

impl SpannedError {
    pub fn new(code: DiagnosticCode, message: impl Into<String>, span: Span) -> SpannedError {
        SpannedError {
            code,
            message: message.into(),
            span,
        }
    }

    pub fn into_diagnostic(self, file: FileRef) -> Diagnostic {
        Diagnostic::new(
            self.code,
            self.message,
            Loc::new(file, self.span.start, self.span.end),
        )
    }
}
