// Diagnostic types and the per-GS error queue.

mod code;

pub use code::{DiagnosticCode, Severity};

use crate::files::StrictnessLevel;
use crate::loc::Loc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub loc: Loc,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>, loc: Loc) -> Diagnostic {
        Diagnostic {
            code,
            severity: code.severity(),
            message: message.into(),
            loc,
        }
    }
}

/// Flat collection of diagnostics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticCollection {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollection {
    pub fn new() -> DiagnosticCollection {
        DiagnosticCollection::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, other: DiagnosticCollection) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d.severity, Severity::Error))
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Buffered diagnostics, drained at phase boundaries. Draining applies the
/// per-file strictness gate and sorts per file by position, then code, so
/// repeated runs over identical inputs produce identical output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorQueue {
    buffered: Vec<Diagnostic>,
}

impl ErrorQueue {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.buffered.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.buffered.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffered.len()
    }

    /// Drain everything, filtering by each diagnostic's minimum strictness
    /// against its file's level.
    pub fn drain(
        &mut self,
        strictness_of: impl Fn(crate::files::FileRef) -> StrictnessLevel,
    ) -> Vec<Diagnostic> {
        let mut out: Vec<Diagnostic> = self
            .buffered
            .drain(..)
            .filter(|d| {
                let level = if d.loc.exists() {
                    strictness_of(d.loc.file)
                } else {
                    StrictnessLevel::True
                };
                level != StrictnessLevel::Ignore && level >= d.code.min_strictness()
            })
            .collect();
        out.sort_by(|a, b| {
            (a.loc.file, a.loc.begin, a.loc.end, a.code)
                .cmp(&(b.loc.file, b.loc.begin, b.loc.end, b.code))
        });
        out
    }
}
