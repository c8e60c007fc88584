use crate::files::SourceType;
use crate::global_state::{GlobalState, TableMask};
use crate::names::{Name, NameRef};
use log::trace;

/// Migrates `NameRef`s minted in one global state into another. Symbol ids
/// are required to be identical across the two states; only names (and
/// files) may differ.
#[derive(Debug)]
pub struct GlobalSubstitution {
    name_map: Vec<NameRef>,
    fast_path: bool,
}

impl GlobalSubstitution {
    /// Build a substitution from `source` into `target`. Copies over any
    /// file the target has not read yet, then maps the source's name table
    /// unless the fast-path discriminator proves both states identical on
    /// names and files.
    pub fn new(source: &GlobalState, target: &mut GlobalState) -> GlobalSubstitution {
        assert_eq!(
            source.symbol_count(),
            target.symbol_count(),
            "substitution requires identical symbol tables"
        );

        if shares_unchanged_parent(source, target) {
            trace!("substitution: fast path, name map elided");
            return GlobalSubstitution {
                name_map: Vec::new(),
                fast_path: true,
            };
        }

        target.with_unfrozen(TableMask { names: true, symbols: false, files: true }, |tgt| {
            // Adopt files the target has never seen.
            for (_, file) in source.files_iter() {
                if file.is_tombstone() {
                    continue;
                }
                let absent = match tgt.find_file_by_path(&file.path) {
                    None => true,
                    Some(existing) => {
                        matches!(tgt.file(existing).source_type, SourceType::NotYetRead)
                    }
                };
                if absent {
                    tgt.enter_file(&file.path, file.source.clone(), file.source_type);
                }
            }

            // Names reference only earlier names, so a single in-order walk
            // can translate constant and unique wrappers through the map
            // built so far.
            let mut name_map = Vec::with_capacity(source.name_count());
            for id in 0..source.name_count() {
                let mapped = match source.name(NameRef(id as u32)) {
                    Name::Utf8(raw) => tgt.enter_name_utf8(raw),
                    Name::Constant(inner) => {
                        let inner = name_map[inner.0 as usize];
                        tgt.enter_name_constant(inner)
                    }
                    Name::Unique {
                        original,
                        kind,
                        ..
                    } => {
                        let original = name_map[original.0 as usize];
                        tgt.fresh_name_unique(*kind, original)
                    }
                };
                name_map.push(mapped);
            }
            trace!("substitution: slow path over {} names", name_map.len());
            GlobalSubstitution {
                name_map,
                fast_path: false,
            }
        })
    }

    pub fn use_fast_path(&self) -> bool {
        self.fast_path
    }

    /// Total after construction: identity on the fast path, table lookup
    /// otherwise.
    pub fn substitute(&self, name: NameRef) -> NameRef {
        if self.fast_path {
            return name;
        }
        self.name_map[name.0 as usize]
    }
}

/// Both states record the same common parent and neither has written its
/// name or file tables since the clone.
fn shares_unchanged_parent(source: &GlobalState, target: &GlobalState) -> bool {
    let unchanged = |gs: &GlobalState, recorded_version: u64| gs.version() == recorded_version;
    match (source.parent(), target.parent()) {
        (Some(sp), Some(tp)) if sp.id == tp.id && sp.version == tp.version => {
            unchanged(source, sp.version) && unchanged(target, tp.version)
        }
        (Some(sp), _) if sp.id == target.id() => {
            unchanged(source, sp.version) && unchanged(target, sp.version)
        }
        (_, Some(tp)) if tp.id == source.id() => {
            unchanged(source, tp.version) && unchanged(target, tp.version)
        }
        _ => false,
    }
}
