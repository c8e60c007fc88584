use crate::files::FileRef;
use crate::global_state::GlobalState;
use serde::{Deserialize, Serialize};

/// Byte offset marking "no location".
pub const LOC_SENTINEL: u32 = u32::MAX;

/// A source range: file id plus begin/end byte offsets. `begin <= end`
/// always holds for locations that exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Loc {
    pub file: FileRef,
    pub begin: u32,
    pub end: u32,
}

/// 1-based line/column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Loc {
    pub fn new(file: FileRef, begin: u32, end: u32) -> Loc {
        debug_assert!(begin <= end);
        Loc { file, begin, end }
    }

    pub fn none() -> Loc {
        Loc {
            file: FileRef::none(),
            begin: LOC_SENTINEL,
            end: LOC_SENTINEL,
        }
    }

    pub fn exists(&self) -> bool {
        self.begin != LOC_SENTINEL
    }

    /// Interval union. Both locations must be in the same file.
    pub fn join(&self, other: Loc) -> Loc {
        if !self.exists() {
            return other;
        }
        if !other.exists() {
            return *self;
        }
        debug_assert_eq!(self.file, other.file);
        Loc {
            file: self.file,
            begin: self.begin.min(other.begin),
            end: self.end.max(other.end),
        }
    }

    pub fn contains_offset(&self, offset: u32) -> bool {
        self.exists() && self.begin <= offset && offset <= self.end
    }

    /// Begin/end positions against the owning file's contents.
    pub fn position(&self, gs: &GlobalState) -> Option<(Position, Position)> {
        if !self.exists() {
            return None;
        }
        let file = gs.file(self.file);
        Some((
            file.offset_to_position(self.begin),
            file.offset_to_position(self.end),
        ))
    }

    /// The source text this location covers.
    pub fn source<'gs>(&self, gs: &'gs GlobalState) -> Option<&'gs str> {
        if !self.exists() {
            return None;
        }
        let file = gs.file(self.file);
        file.source.get(self.begin as usize..self.end as usize)
    }
}
