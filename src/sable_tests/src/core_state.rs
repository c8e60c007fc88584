// Interned state: naming, freezing, cloning, substitution, payload.

use sable_core::{payload, GlobalState, GlobalSubstitution, TableMask, UniqueNameKind};
use sable_infer::pipeline::Pipeline;

#[test]
fn interning_round_trips() {
    let mut gs = GlobalState::new();
    let (a, b, text) = gs.with_unfrozen(TableMask::NAMES, |gs| {
        let a = gs.enter_name_utf8("payload_width");
        let b = gs.enter_name_utf8("payload_width");
        (a, b, gs.name_str(a))
    });
    assert_eq!(a, b);
    assert_eq!(text, "payload_width");
}

#[test]
fn unique_names_always_create() {
    let mut gs = GlobalState::new();
    gs.with_unfrozen(TableMask::NAMES, |gs| {
        let base = gs.enter_name_utf8("tmp");
        let u1 = gs.fresh_name_unique(UniqueNameKind::Temp, base);
        let u2 = gs.fresh_name_unique(UniqueNameKind::Temp, base);
        assert_ne!(u1, u2);
        assert_ne!(gs.name_str(u1), gs.name_str(u2));
    });
}

#[test]
#[should_panic(expected = "name table is frozen")]
fn entering_names_while_frozen_panics() {
    let mut gs = GlobalState::new();
    gs.enter_name_utf8("nope");
}

#[test]
fn unfreeze_scope_restores_flags() {
    let mut gs = GlobalState::new();
    gs.with_unfrozen(TableMask::NAMES, |gs| {
        gs.enter_name_utf8("fine");
    });
    // Frozen again outside the scope.
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        gs.enter_name_utf8("nope");
    }));
    assert!(result.is_err());
}

#[test]
fn deep_copy_preserves_symbol_ids() {
    let gs = Pipeline::initial_global_state();
    let copy = gs.deep_copy();
    assert_eq!(gs.symbol_count(), copy.symbol_count());
    assert_eq!(gs.name_count(), copy.name_count());
    for i in 0..gs.symbol_count() {
        let r = sable_core::SymbolRef(i as u32);
        assert_eq!(gs.symbol(r).name, copy.symbol(r).name);
        assert_eq!(gs.symbol(r).owner, copy.symbol(r).owner);
    }
    copy.sanity_check();
}

#[test]
fn substitution_takes_fast_path_on_untouched_clone() {
    let gs = Pipeline::initial_global_state();
    let mut child = gs.deep_copy();
    let sub = GlobalSubstitution::new(&gs, &mut child);
    assert!(sub.use_fast_path());
    let n = gs.lookup_name_utf8("Integer").expect("stdlib name");
    assert_eq!(sub.substitute(n), n);
}

#[test]
fn substitution_slow_path_preserves_name_text() {
    let gs = Pipeline::initial_global_state();
    let mut child = gs.deep_copy();
    child.with_unfrozen(TableMask::NAMES, |gs| {
        gs.enter_name_utf8("grew_after_clone");
    });
    let sub = GlobalSubstitution::new(&gs, &mut child);
    assert!(!sub.use_fast_path());
    for raw in ["Integer", "String", "is_a?", "+"] {
        let n = gs.lookup_name_utf8(raw).expect("stdlib name");
        let mapped = sub.substitute(n);
        assert_eq!(child.name_str(mapped), gs.name_str(n));
    }
}

#[test]
fn payload_round_trips() {
    let gs = Pipeline::initial_global_state();
    let bytes = payload::serialize(&gs).expect("serialize");
    let restored = payload::deserialize(&bytes).expect("deserialize");
    assert_eq!(restored.symbol_count(), gs.symbol_count());
    assert_eq!(restored.name_count(), gs.name_count());
    assert!(restored.lookup_name_utf8("Integer").is_some());
    restored.sanity_check();
}

#[test]
fn payload_rejects_other_versions() {
    let gs = Pipeline::initial_global_state();
    let bytes = payload::serialize(&gs).expect("serialize");
    let text = String::from_utf8(bytes).expect("payload is json");
    let bumped = text.replacen("{\"version\":1,", "{\"version\":999,", 1);
    assert_ne!(text, bumped, "version field not where expected");
    let err = payload::deserialize(bumped.as_bytes());
    assert!(matches!(
        err,
        Err(payload::PayloadError::VersionMismatch { found: 999, .. })
    ));
}

#[test]
fn tombstoned_files_keep_their_id() {
    let mut gs = GlobalState::new();
    let file = gs.with_unfrozen(TableMask::FILES, |gs| {
        let f = gs.enter_file("a.sable", "# typed: true\n".to_string(), sable_core::SourceType::Normal);
        gs.tombstone_file(f);
        f
    });
    assert!(gs.file(file).is_tombstone());
    assert!(gs.find_file_by_path("a.sable").is_none());
    gs.sanity_check();
}

#[test]
fn fields_and_members_wire_up_ownership() {
    let mut gs = GlobalState::new();
    let (class, field, static_field) = gs.with_unfrozen(TableMask::ALL, |gs| {
        let raw = gs.enter_name_utf8("Widget");
        let cname = gs.enter_name_constant(raw);
        let class = gs.enter_class_symbol(
            sable_core::Loc::none(),
            sable_core::Symbols::ROOT,
            cname,
        );
        let f = gs.enter_name_utf8("@count");
        let field = gs.enter_field_symbol(sable_core::Loc::none(), class, f);
        let sf = gs.enter_name_utf8("@@total");
        let static_field = gs.enter_static_field_symbol(sable_core::Loc::none(), class, sf);
        (class, field, static_field)
    });
    assert_eq!(gs.symbol(field).owner, class);
    assert_eq!(gs.symbol(static_field).owner, class);
    assert!(gs.symbol(class).members.len() >= 2);
    gs.sanity_check();
}

#[test]
fn locations_join_and_convert_to_positions() {
    use sable_core::Loc;
    let mut gs = GlobalState::new();
    let file = gs.with_unfrozen(TableMask::FILES, |gs| {
        gs.enter_file(
            "pos.sable",
            "class A\n  def go\n  end\nend\n".to_string(),
            sable_core::SourceType::Normal,
        )
    });
    let a = Loc::new(file, 10, 13);
    let b = Loc::new(file, 16, 19);
    let joined = a.join(b);
    assert_eq!((joined.begin, joined.end), (10, 19));
    assert!(Loc::none().join(a) == a);

    let (begin, _) = a.position(&gs).expect("position");
    assert_eq!((begin.line, begin.column), (2, 3));
    let f = gs.file(file);
    assert_eq!(f.position_to_offset(2, 3), 10);
    assert_eq!(f.offset_to_position(0).line, 1);
}

#[test]
fn strictness_sigil_parsing() {
    use sable_core::StrictnessLevel;
    assert_eq!(
        StrictnessLevel::from_source("# typed: strict\nclass A\nend\n"),
        StrictnessLevel::Strict
    );
    assert_eq!(
        StrictnessLevel::from_source("#  typed: ignore\n"),
        StrictnessLevel::Ignore
    );
    assert_eq!(
        StrictnessLevel::from_source("class A\nend\n"),
        StrictnessLevel::False
    );
    // The sigil only counts in the leading comment block.
    assert_eq!(
        StrictnessLevel::from_source("x = 1\n# typed: strict\n"),
        StrictnessLevel::False
    );
}
