// Core crate: the interned global state every pipeline stage reads from,
// plus the type algebra and the machinery for migrating names between
// cloned states. Arena tables + integer ids throughout; no pointer graphs.

pub mod diagnostics;
pub mod files;
pub mod global_state;
pub mod loc;
pub mod names;
pub mod payload;
pub mod substitution;
pub mod symbols;
pub mod types;

pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticCollection, ErrorQueue, Severity};
pub use files::{File, FileRef, SourceType, StrictnessLevel};
pub use global_state::{GlobalState, TableMask};
pub use loc::Loc;
pub use names::{Name, NameRef, UniqueNameKind};
pub use substitution::GlobalSubstitution;
pub use symbols::{ArgFlags, ArgInfo, Symbol, SymbolFlags, SymbolRef, Symbols, Variance};
pub use types::{LiteralValue, Type, TypeConstraint, TypeVarId};
