use crate::diagnostics::{Diagnostic, ErrorQueue};
use crate::files::{File, FileRef, SourceType};
use crate::loc::Loc;
use crate::names::{Name, NameRef, UniqueNameKind};
use crate::symbols::{Symbol, SymbolFlags, SymbolRef, Symbols, Variance};
use crate::types::TypeVarId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_GS_ID: AtomicU32 = AtomicU32::new(1);

fn fresh_gs_id() -> u32 {
    NEXT_GS_ID.fetch_add(1, Ordering::Relaxed)
}

/// Which interning tables a scoped unfreeze opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableMask {
    pub names: bool,
    pub symbols: bool,
    pub files: bool,
}

impl TableMask {
    pub const NAMES: TableMask = TableMask {
        names: true,
        symbols: false,
        files: false,
    };
    pub const SYMBOLS: TableMask = TableMask {
        names: false,
        symbols: true,
        files: false,
    };
    pub const FILES: TableMask = TableMask {
        names: false,
        symbols: false,
        files: true,
    };
    pub const ALL: TableMask = TableMask {
        names: true,
        symbols: true,
        files: true,
    };
}

/// Recorded identity of the state this one was cloned from, used by the
/// substitution fast path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentFingerprint {
    pub id: u32,
    pub version: u64,
}

/// The single source of truth for names, symbols, and files. All
/// cross-references are integer ids stable for the lifetime of the state;
/// cloning preserves symbol ids exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    #[serde(skip, default = "fresh_gs_id")]
    id: u32,
    /// Bumped on every name or file table write; drives the substitution
    /// fast-path discriminator.
    #[serde(skip)]
    version: u64,
    #[serde(skip)]
    parent: Option<ParentFingerprint>,

    names: Vec<Name>,
    #[serde(skip)]
    names_by_value: HashMap<Name, NameRef>,
    symbols: Vec<Symbol>,
    files: Vec<File>,
    #[serde(skip)]
    files_by_path: HashMap<String, FileRef>,
    type_var_names: Vec<NameRef>,
    unique_counter: u32,

    #[serde(skip)]
    pub errors: ErrorQueue,

    #[serde(skip)]
    frozen_names: bool,
    #[serde(skip)]
    frozen_symbols: bool,
    #[serde(skip)]
    frozen_files: bool,
}

impl GlobalState {
    pub fn new() -> GlobalState {
        let mut gs = GlobalState {
            id: fresh_gs_id(),
            version: 0,
            parent: None,
            names: Vec::new(),
            names_by_value: HashMap::new(),
            symbols: Vec::new(),
            files: Vec::new(),
            files_by_path: HashMap::new(),
            type_var_names: Vec::new(),
            unique_counter: 0,
            errors: ErrorQueue::default(),
            frozen_names: false,
            frozen_symbols: false,
            frozen_files: false,
        };
        gs.seed_well_known();
        gs.frozen_names = true;
        gs.frozen_symbols = true;
        gs.frozen_files = true;
        gs
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn parent(&self) -> Option<ParentFingerprint> {
        self.parent
    }

    // ---- scoped unfreeze ------------------------------------------------

    /// Run `f` with the given tables unfrozen; previous freeze state is
    /// restored on return. Violations inside other scopes stay hard
    /// errors.
    pub fn with_unfrozen<R>(
        &mut self,
        mask: TableMask,
        f: impl FnOnce(&mut GlobalState) -> R,
    ) -> R {
        let saved = (self.frozen_names, self.frozen_symbols, self.frozen_files);
        if mask.names {
            self.frozen_names = false;
        }
        if mask.symbols {
            self.frozen_symbols = false;
        }
        if mask.files {
            self.frozen_files = false;
        }
        let out = f(self);
        self.frozen_names = saved.0;
        self.frozen_symbols = saved.1;
        self.frozen_files = saved.2;
        out
    }

    // ---- names ----------------------------------------------------------

    pub fn name(&self, r: NameRef) -> &Name {
        &self.names[r.0 as usize]
    }

    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    /// Raw text of a name; unique and constant names render through their
    /// base name.
    pub fn name_str(&self, r: NameRef) -> String {
        match self.name(r) {
            Name::Utf8(s) => s.clone(),
            Name::Constant(inner) => self.name_str(*inner),
            Name::Unique { original, num, .. } => {
                format!("{}${}", self.name_str(*original), num)
            }
        }
    }

    /// Intern-or-lookup. Interning never fails; growth requires the name
    /// table to be unfrozen.
    pub fn enter_name_utf8(&mut self, raw: &str) -> NameRef {
        self.enter_name(Name::Utf8(raw.to_string()))
    }

    pub fn enter_name_constant(&mut self, inner: NameRef) -> NameRef {
        self.enter_name(Name::Constant(inner))
    }

    /// Mint a fresh unique name. Always creates; the counter is monotonic
    /// per global state.
    pub fn fresh_name_unique(&mut self, kind: UniqueNameKind, original: NameRef) -> NameRef {
        assert!(!self.frozen_names, "name table is frozen");
        self.unique_counter += 1;
        let name = Name::Unique {
            original,
            kind,
            num: self.unique_counter,
        };
        let r = NameRef(self.names.len() as u32);
        self.names_by_value.insert(name.clone(), r);
        self.names.push(name);
        self.version += 1;
        r
    }

    pub fn lookup_name_utf8(&self, raw: &str) -> Option<NameRef> {
        self.names_by_value.get(&Name::Utf8(raw.to_string())).copied()
    }

    pub fn lookup_name_constant(&self, inner: NameRef) -> Option<NameRef> {
        self.names_by_value.get(&Name::Constant(inner)).copied()
    }

    fn enter_name(&mut self, name: Name) -> NameRef {
        if let Some(existing) = self.names_by_value.get(&name) {
            return *existing;
        }
        assert!(!self.frozen_names, "name table is frozen");
        let r = NameRef(self.names.len() as u32);
        self.names_by_value.insert(name.clone(), r);
        self.names.push(name);
        self.version += 1;
        r
    }

    // ---- symbols --------------------------------------------------------

    pub fn symbol(&self, r: SymbolRef) -> &Symbol {
        &self.symbols[r.0 as usize]
    }

    /// Mutable access; only legal inside a symbol-table unfreeze scope.
    pub fn symbol_mut(&mut self, r: SymbolRef) -> &mut Symbol {
        assert!(!self.frozen_symbols, "symbol table is frozen");
        &mut self.symbols[r.0 as usize]
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn symbols_iter(&self) -> impl Iterator<Item = (SymbolRef, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (SymbolRef(i as u32), s))
    }

    pub fn symbol_name_str(&self, r: SymbolRef) -> String {
        self.name_str(self.symbol(r).name)
    }

    /// Create or reopen a class under `owner`.
    pub fn enter_class_symbol(&mut self, loc: Loc, owner: SymbolRef, name: NameRef) -> SymbolRef {
        if let Some(&existing) = self.symbol(owner).members.get(&name) {
            if self.symbol(existing).is_class() {
                self.symbol_mut(existing).add_loc(loc);
                return existing;
            }
        }
        self.create_symbol(loc, owner, name, SymbolFlags::CLASS)
    }

    /// Create a method under `owner`. A live same-named method is pushed
    /// aside under a mangled unique name so the new definition wins.
    pub fn enter_method_symbol(&mut self, loc: Loc, owner: SymbolRef, name: NameRef) -> SymbolRef {
        if let Some(&existing) = self.symbol(owner).members.get(&name) {
            if self.symbol(existing).is_method() {
                let mangled = self.fresh_name_unique(UniqueNameKind::MangleRename, name);
                self.symbol_mut(existing).name = mangled;
                let moved = existing;
                self.symbol_mut(owner).members.remove(&name);
                self.symbol_mut(owner).members.insert(mangled, moved);
            }
        }
        self.create_symbol(loc, owner, name, SymbolFlags::METHOD)
    }

    pub fn enter_field_symbol(&mut self, loc: Loc, owner: SymbolRef, name: NameRef) -> SymbolRef {
        if let Some(&existing) = self.symbol(owner).members.get(&name) {
            self.symbol_mut(existing).add_loc(loc);
            return existing;
        }
        self.create_symbol(loc, owner, name, SymbolFlags::FIELD)
    }

    pub fn enter_static_field_symbol(
        &mut self,
        loc: Loc,
        owner: SymbolRef,
        name: NameRef,
    ) -> SymbolRef {
        if let Some(&existing) = self.symbol(owner).members.get(&name) {
            self.symbol_mut(existing).add_loc(loc);
            return existing;
        }
        self.create_symbol(loc, owner, name, SymbolFlags::STATIC_FIELD)
    }

    pub fn enter_type_member(
        &mut self,
        loc: Loc,
        owner: SymbolRef,
        name: NameRef,
        variance: Variance,
    ) -> SymbolRef {
        if let Some(&existing) = self.symbol(owner).members.get(&name) {
            return existing;
        }
        let r = self.create_symbol(loc, owner, name, SymbolFlags::TYPE_MEMBER);
        let var = self.allocate_type_var(name);
        self.symbol_mut(r).type_var = Some(var);
        self.symbol_mut(r).variance = variance;
        self.symbol_mut(owner).type_members.push(r);
        r
    }

    pub fn enter_type_argument(
        &mut self,
        loc: Loc,
        method: SymbolRef,
        name: NameRef,
    ) -> SymbolRef {
        if let Some(&existing) = self.symbol(method).members.get(&name) {
            return existing;
        }
        let r = self.create_symbol(loc, method, name, SymbolFlags::TYPE_ARGUMENT);
        let var = self.allocate_type_var(name);
        self.symbol_mut(r).type_var = Some(var);
        self.symbol_mut(method).type_arguments.push(r);
        r
    }

    fn create_symbol(
        &mut self,
        loc: Loc,
        owner: SymbolRef,
        name: NameRef,
        flags: SymbolFlags,
    ) -> SymbolRef {
        assert!(!self.frozen_symbols, "symbol table is frozen");
        let r = SymbolRef(self.symbols.len() as u32);
        let mut sym = Symbol::new(owner, name, flags);
        sym.add_loc(loc);
        self.symbols.push(sym);
        self.symbol_mut(owner).members.insert(name, r);
        r
    }

    // ---- ancestry -------------------------------------------------------

    /// `a` derives from `b`: `b` appears in `a`'s linearization.
    pub fn derives(&self, a: SymbolRef, b: SymbolRef) -> bool {
        if a == b {
            return true;
        }
        self.linearization_of(a).contains(&b)
    }

    /// The flattened ancestry of `a`, most-specific first. Uses the frozen
    /// copy when `finalize_ancestors` has run, otherwise computes afresh.
    pub fn linearization_of(&self, a: SymbolRef) -> Vec<SymbolRef> {
        let sym = self.symbol(a);
        if !sym.linearization.is_empty() {
            return sym.linearization.clone();
        }
        let mut out = Vec::new();
        self.compute_linearization(a, &mut out, &mut Vec::new());
        out
    }

    fn compute_linearization(
        &self,
        a: SymbolRef,
        out: &mut Vec<SymbolRef>,
        visiting: &mut Vec<SymbolRef>,
    ) {
        if out.contains(&a) || visiting.contains(&a) {
            return;
        }
        visiting.push(a);
        out.push(a);
        let sym = self.symbol(a);
        for &mixin in sym.mixins.iter().rev() {
            self.compute_linearization(mixin, out, visiting);
        }
        if let Some(superclass) = sym.superclass {
            self.compute_linearization(superclass, out, visiting);
        }
        visiting.pop();
    }

    /// Compute and freeze every class's linearization. Called once after
    /// definition indexing; emits a diagnostic and breaks the chain at
    /// `Object` when a superclass cycle is found.
    pub fn finalize_ancestors(&mut self) {
        // Cycle detection first, over the raw superclass chains.
        let mut cyclic: Vec<SymbolRef> = Vec::new();
        for (r, sym) in self.symbols.iter().enumerate().map(|(i, s)| (SymbolRef(i as u32), s)) {
            if !sym.is_class() {
                continue;
            }
            let mut seen = vec![r];
            let mut cur = sym.superclass;
            while let Some(s) = cur {
                if seen.contains(&s) {
                    cyclic.push(r);
                    break;
                }
                seen.push(s);
                cur = self.symbol(s).superclass;
            }
        }
        self.with_unfrozen(TableMask::SYMBOLS, |gs| {
            for r in &cyclic {
                let loc = gs.symbol(*r).loc();
                let name = gs.symbol_name_str(*r);
                gs.symbol_mut(*r).superclass = Some(Symbols::OBJECT);
                gs.errors.push(Diagnostic::new(
                    crate::diagnostics::DiagnosticCode::SBE02004,
                    format!("circular superclass chain involving `{}`", name),
                    loc,
                ));
            }
            for i in 0..gs.symbols.len() {
                let r = SymbolRef(i as u32);
                if !gs.symbol(r).is_class() {
                    continue;
                }
                let mut lin = Vec::new();
                gs.compute_linearization(r, &mut lin, &mut Vec::new());
                gs.symbol_mut(r).linearization = lin;
            }
        });
    }

    // ---- type variables -------------------------------------------------

    pub fn allocate_type_var(&mut self, name: NameRef) -> TypeVarId {
        let id = TypeVarId(self.type_var_names.len() as u32);
        self.type_var_names.push(name);
        id
    }

    pub fn type_var_name_str(&self, id: TypeVarId) -> String {
        self.type_var_names
            .get(id.0 as usize)
            .map(|n| self.name_str(*n))
            .unwrap_or_else(|| format!("var{}", id.0))
    }

    // ---- files ----------------------------------------------------------

    pub fn file(&self, r: FileRef) -> &File {
        &self.files[r.0 as usize]
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn files_iter(&self) -> impl Iterator<Item = (FileRef, &File)> {
        self.files
            .iter()
            .enumerate()
            .map(|(i, f)| (FileRef(i as u32), f))
    }

    pub fn find_file_by_path(&self, path: &str) -> Option<FileRef> {
        self.files_by_path.get(path).copied()
    }

    /// Register or replace a file. Replacing reuses the id; tombstoned
    /// entries come back to life the same way.
    pub fn enter_file(&mut self, path: &str, source: String, source_type: SourceType) -> FileRef {
        assert!(!self.frozen_files, "file table is frozen");
        self.version += 1;
        if let Some(&existing) = self.files_by_path.get(path) {
            let f = &mut self.files[existing.0 as usize];
            f.update_source(source);
            f.source_type = source_type;
            return existing;
        }
        let r = FileRef(self.files.len() as u32);
        self.files
            .push(File::new(path.to_string(), source, source_type));
        self.files_by_path.insert(path.to_string(), r);
        r
    }

    /// Mark a file dead. Its id stays allocated; the path leaves the live
    /// set.
    pub fn tombstone_file(&mut self, r: FileRef) {
        assert!(!self.frozen_files, "file table is frozen");
        self.version += 1;
        let path = {
            let f = &mut self.files[r.0 as usize];
            f.source_type = SourceType::TombStone;
            f.path.clone()
        };
        self.files_by_path.remove(&path);
    }

    // ---- errors ---------------------------------------------------------

    pub fn push_error(&mut self, diagnostic: Diagnostic) {
        self.errors.push(diagnostic);
    }

    /// Drain buffered diagnostics with strictness gating and per-file
    /// ordering applied.
    pub fn drain_errors(&mut self) -> Vec<Diagnostic> {
        let mut queue = std::mem::take(&mut self.errors);
        let out = queue.drain(|f| self.file(f).strictness);
        self.errors = queue;
        out
    }

    // ---- cloning and checking -------------------------------------------

    /// Structural clone with identical symbol ids. The copy records this
    /// state as its parent for the substitution fast path.
    pub fn deep_copy(&self) -> GlobalState {
        let mut copy = self.clone();
        copy.id = fresh_gs_id();
        copy.parent = Some(ParentFingerprint {
            id: self.id,
            version: self.version,
        });
        copy
    }

    /// Verify table invariants; panics on violation. Called at snapshot
    /// boundaries.
    pub fn sanity_check(&self) {
        assert!(!self.symbols.is_empty(), "symbol table not seeded");
        let root = self.symbol(Symbols::ROOT);
        assert_eq!(root.owner, Symbols::ROOT, "root symbol must own itself");
        for (name, r) in self.names_by_value.iter() {
            assert_eq!(self.name(*r), name, "name index out of sync");
        }
        for (i, sym) in self.symbols.iter().enumerate() {
            assert!(
                (sym.owner.0 as usize) < self.symbols.len(),
                "symbol {} has dangling owner",
                i
            );
            for (&name, &member) in sym.members.iter() {
                let child = self.symbol(member);
                assert_eq!(
                    child.name, name,
                    "member map key does not match member name"
                );
                assert_eq!(
                    child.owner,
                    SymbolRef(i as u32),
                    "member owner back-reference broken"
                );
            }
        }
        for (path, r) in self.files_by_path.iter() {
            let f = self.file(*r);
            assert_eq!(&f.path, path, "file index out of sync");
            assert!(!f.is_tombstone(), "tombstone present in live file set");
        }
    }

    /// Rebuild skipped lookup tables after deserialization.
    pub fn rebuild_indexes(&mut self) {
        self.names_by_value = self
            .names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), NameRef(i as u32)))
            .collect();
        self.files_by_path = self
            .files
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.is_tombstone())
            .map(|(i, f)| (f.path.clone(), FileRef(i as u32)))
            .collect();
        self.frozen_names = true;
        self.frozen_symbols = true;
        self.frozen_files = true;
    }

    // ---- seeding --------------------------------------------------------

    fn seed_well_known(&mut self) {
        let root_name = self.enter_name_utf8("<root>");
        let mut root = Symbol::new(Symbols::ROOT, root_name, SymbolFlags::CLASS);
        root.add_loc(Loc::none());
        self.symbols.push(root);

        let classes: [(&str, Option<SymbolRef>); 15] = [
            ("BasicObject", None),
            ("Object", Some(Symbols::BASIC_OBJECT)),
            ("Kernel", Some(Symbols::BASIC_OBJECT)),
            ("Integer", Some(Symbols::OBJECT)),
            ("Float", Some(Symbols::OBJECT)),
            ("String", Some(Symbols::OBJECT)),
            ("Symbol", Some(Symbols::OBJECT)),
            ("NilClass", Some(Symbols::OBJECT)),
            ("TrueClass", Some(Symbols::OBJECT)),
            ("FalseClass", Some(Symbols::OBJECT)),
            ("Array", Some(Symbols::OBJECT)),
            ("Hash", Some(Symbols::OBJECT)),
            ("StandardError", Some(Symbols::OBJECT)),
            ("Module", Some(Symbols::OBJECT)),
            ("Class", Some(Symbols::MODULE)),
        ];
        for (name, superclass) in classes {
            let raw = self.enter_name_utf8(name);
            let n = self.enter_name_constant(raw);
            let r = self.create_symbol(Loc::none(), Symbols::ROOT, n, SymbolFlags::CLASS);
            self.symbol_mut(r).superclass = superclass;
        }

        let void_name = self.enter_name_utf8("<void>");
        let void = self.create_symbol(Loc::none(), Symbols::ROOT, void_name, SymbolFlags::CLASS);
        self.symbol_mut(void).superclass = Some(Symbols::OBJECT);
        debug_assert_eq!(void, Symbols::VOID);

        self.symbol_mut(Symbols::OBJECT).mixins.push(Symbols::KERNEL);

        let raw = self.enter_name_utf8("Elem");
        let elem = self.enter_name_constant(raw);
        let r = self.enter_type_member(Loc::none(), Symbols::ARRAY, elem, Variance::Covariant);
        debug_assert_eq!(r, Symbols::ARRAY_ELEM);
        let raw = self.enter_name_utf8("K");
        let k = self.enter_name_constant(raw);
        let r = self.enter_type_member(Loc::none(), Symbols::HASH, k, Variance::Covariant);
        debug_assert_eq!(r, Symbols::HASH_KEY);
        let raw = self.enter_name_utf8("V");
        let v = self.enter_name_constant(raw);
        let r = self.enter_type_member(Loc::none(), Symbols::HASH, v, Variance::Covariant);
        debug_assert_eq!(r, Symbols::HASH_VALUE);

        debug_assert!(self.symbols.len() > Symbols::LAST_WELL_KNOWN.0 as usize);
    }
}

impl Default for GlobalState {
    fn default() -> Self {
        GlobalState::new()
    }
}
