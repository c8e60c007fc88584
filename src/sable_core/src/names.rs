use serde::{Deserialize, Serialize};

/// Id of an interned name. Equality and hashing are by id; the data lives
/// in the global state's name table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NameRef(pub u32);

impl NameRef {
    pub fn id(self) -> u32 {
        self.0
    }
}

/// What a `Unique` name was minted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UniqueNameKind {
    /// Compiler temporary.
    Temp,
    /// Synthesized default-argument helper.
    DefaultArg,
    /// Old definition pushed aside by a redefinition.
    MangleRename,
}

/// A name is either raw UTF-8, a constant wrapper around another name, or
/// a freshly minted unique derived from an original.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Name {
    Utf8(String),
    Constant(NameRef),
    Unique {
        original: NameRef,
        kind: UniqueNameKind,
        num: u32,
    },
}

impl Name {
    pub fn is_constant(&self) -> bool {
        matches!(self, Name::Constant(_))
    }

    pub fn is_unique(&self) -> bool {
        matches!(self, Name::Unique { .. })
    }
}
