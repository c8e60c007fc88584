use crate::loc::Loc;
use crate::names::NameRef;
use crate::types::{Type, TypeVarId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Id of an interned symbol. Symbol ids are identical across cloned global
/// states; only name ids may differ.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SymbolRef(pub u32);

impl SymbolRef {
    pub fn id(self) -> u32 {
        self.0
    }
}

/// Well-known symbols, fixed by seeding order in `GlobalState::new`.
pub struct Symbols;

impl Symbols {
    pub const ROOT: SymbolRef = SymbolRef(0);
    pub const BASIC_OBJECT: SymbolRef = SymbolRef(1);
    pub const OBJECT: SymbolRef = SymbolRef(2);
    pub const KERNEL: SymbolRef = SymbolRef(3);
    pub const INTEGER: SymbolRef = SymbolRef(4);
    pub const FLOAT: SymbolRef = SymbolRef(5);
    pub const STRING: SymbolRef = SymbolRef(6);
    pub const SYMBOL: SymbolRef = SymbolRef(7);
    pub const NIL_CLASS: SymbolRef = SymbolRef(8);
    pub const TRUE_CLASS: SymbolRef = SymbolRef(9);
    pub const FALSE_CLASS: SymbolRef = SymbolRef(10);
    pub const ARRAY: SymbolRef = SymbolRef(11);
    pub const HASH: SymbolRef = SymbolRef(12);
    pub const STANDARD_ERROR: SymbolRef = SymbolRef(13);
    pub const MODULE: SymbolRef = SymbolRef(14);
    pub const CLASS: SymbolRef = SymbolRef(15);
    /// Hidden return marker for `sig { void }`.
    pub const VOID: SymbolRef = SymbolRef(16);
    pub const ARRAY_ELEM: SymbolRef = SymbolRef(17);
    pub const HASH_KEY: SymbolRef = SymbolRef(18);
    pub const HASH_VALUE: SymbolRef = SymbolRef(19);
    /// First id free for user symbols; used by sanity checks.
    pub const LAST_WELL_KNOWN: SymbolRef = Self::HASH_VALUE;
}

/// Bit set describing what a symbol is and how it was declared.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
pub struct SymbolFlags(pub u16);

impl SymbolFlags {
    pub const CLASS: SymbolFlags = SymbolFlags(1 << 0);
    pub const METHOD: SymbolFlags = SymbolFlags(1 << 1);
    pub const FIELD: SymbolFlags = SymbolFlags(1 << 2);
    pub const STATIC_FIELD: SymbolFlags = SymbolFlags(1 << 3);
    pub const TYPE_MEMBER: SymbolFlags = SymbolFlags(1 << 4);
    pub const TYPE_ARGUMENT: SymbolFlags = SymbolFlags(1 << 5);
    pub const ABSTRACT: SymbolFlags = SymbolFlags(1 << 6);
    pub const FINAL: SymbolFlags = SymbolFlags(1 << 7);
    pub const PRIVATE: SymbolFlags = SymbolFlags(1 << 8);
    pub const PROTECTED: SymbolFlags = SymbolFlags(1 << 9);
    pub const OVERRIDE: SymbolFlags = SymbolFlags(1 << 10);
    pub const OVERRIDABLE: SymbolFlags = SymbolFlags(1 << 11);
    /// Static field that aliases a type rather than holding a value.
    pub const TYPE_ALIAS: SymbolFlags = SymbolFlags(1 << 12);

    pub fn has(self, other: SymbolFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn with(self, other: SymbolFlags) -> SymbolFlags {
        SymbolFlags(self.0 | other.0)
    }
}

/// Variance of a class type member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variance {
    Invariant,
    Covariant,
    Contravariant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArgFlags {
    pub keyword: bool,
    pub optional: bool,
    pub block: bool,
}

/// Declared method parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgInfo {
    pub name: NameRef,
    pub ty: Type,
    pub flags: ArgFlags,
    pub loc: Loc,
}

/// An interned entity: class, method, field, static field, type member, or
/// type argument. Methods own their argument symbols' data inline as
/// `ArgInfo`s; classes own their members through the member map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub owner: SymbolRef,
    pub name: NameRef,
    pub flags: SymbolFlags,
    /// All declaration sites; more than one when a class is reopened.
    pub locs: Vec<Loc>,
    pub superclass: Option<SymbolRef>,
    pub mixins: Vec<SymbolRef>,
    #[serde(with = "member_map")]
    pub members: BTreeMap<NameRef, SymbolRef>,
    pub arguments: Vec<ArgInfo>,
    /// Declared return type for methods, aliased type for type aliases,
    /// `Untyped` elsewhere.
    pub result_type: Type,
    /// Generic classes: their type member symbols, in declaration order.
    pub type_members: Vec<SymbolRef>,
    /// Generic methods: their type argument symbols, in declaration order.
    pub type_arguments: Vec<SymbolRef>,
    /// Type members/arguments: the variable this symbol binds.
    pub type_var: Option<TypeVarId>,
    pub variance: Variance,
    /// Whether an explicit `sig` was attached (methods).
    pub has_sig: bool,
    /// Flattened ancestry, most-specific first. Computed once by
    /// `GlobalState::finalize_ancestors` and frozen afterwards; empty until
    /// then.
    pub linearization: Vec<SymbolRef>,
}

impl Symbol {
    pub fn new(owner: SymbolRef, name: NameRef, flags: SymbolFlags) -> Symbol {
        Symbol {
            owner,
            name,
            flags,
            locs: Vec::new(),
            superclass: None,
            mixins: Vec::new(),
            members: BTreeMap::new(),
            arguments: Vec::new(),
            result_type: Type::Untyped,
            type_members: Vec::new(),
            type_arguments: Vec::new(),
            type_var: None,
            variance: Variance::Invariant,
            has_sig: false,
            linearization: Vec::new(),
        }
    }

    pub fn is_class(&self) -> bool {
        self.flags.has(SymbolFlags::CLASS)
    }

    pub fn is_method(&self) -> bool {
        self.flags.has(SymbolFlags::METHOD)
    }

    pub fn is_type_alias(&self) -> bool {
        self.flags.has(SymbolFlags::TYPE_ALIAS)
    }

    pub fn is_private(&self) -> bool {
        self.flags.has(SymbolFlags::PRIVATE)
    }

    pub fn loc(&self) -> Loc {
        self.locs.first().copied().unwrap_or_else(Loc::none)
    }

    pub fn add_loc(&mut self, loc: Loc) {
        if loc.exists() {
            self.locs.push(loc);
        }
    }

    /// Declared positional parameters (non-keyword, non-block).
    pub fn positional_args(&self) -> impl Iterator<Item = &ArgInfo> {
        self.arguments
            .iter()
            .filter(|a| !a.flags.keyword && !a.flags.block)
    }

    pub fn keyword_args(&self) -> impl Iterator<Item = &ArgInfo> {
        self.arguments.iter().filter(|a| a.flags.keyword)
    }
}

/// JSON object keys must be strings, so the member map rides through the
/// payload as a pair list.
mod member_map {
    use super::{NameRef, SymbolRef};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<NameRef, SymbolRef>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let pairs: Vec<(NameRef, SymbolRef)> = map.iter().map(|(k, v)| (*k, *v)).collect();
        pairs.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<NameRef, SymbolRef>, D::Error> {
        let pairs: Vec<(NameRef, SymbolRef)> = Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}
