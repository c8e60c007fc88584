// CFG construction and the dataflow pass, end to end.

use crate::support::{check, codes};
use sable_core::{Severity, TableMask};
use sable_infer::cfg::builder::build_cfg;
use sable_infer::cfg::Terminator;
use sable_infer::pipeline::{Phase, Pipeline};

#[test]
fn cfg_has_one_entry_one_exit_and_full_reachability() {
    let source = "# typed: true\nclass A\n  sig { params(x: Integer).returns(Integer) }\n  def f(x)\n    if x > 0\n      x = x + 1\n    else\n      x = x - 1\n    end\n    while x > 10\n      x = x - 2\n    end\n    x\n  end\nend\n";
    let mut gs = Pipeline::initial_global_state();
    let records = Pipeline::ingest_files(
        &mut gs,
        &[("test.sable".to_string(), source.to_string())],
    );
    Pipeline::finalize(&mut gs);
    let method = records[0]
        .methods
        .iter()
        .find(|m| m.name == "f")
        .expect("method f");
    let mut errors = Vec::new();
    let output = build_cfg(&gs, method.owner, method.sym, &method.def, &mut errors);
    let cfg = output.cfg;
    assert!(errors.is_empty(), "builder errors: {:?}", errors);

    // validate() ran inside build_cfg; spot-check the shape anyway.
    let exits = cfg
        .blocks
        .iter()
        .filter(|b| matches!(b.terminator, Terminator::Exit))
        .count();
    assert_eq!(exits, 1);
    assert_eq!(cfg.reachable().len(), cfg.blocks.len());

    // Non-merge locals are assigned at most once.
    let mut defs = vec![0usize; cfg.locals.len()];
    for block in &cfg.blocks {
        for binding in &block.bindings {
            defs[binding.target.0 as usize] += 1;
        }
    }
    for (i, count) in defs.iter().enumerate() {
        if !cfg.locals[i].is_merge {
            assert!(*count <= 1, "local {:?} assigned {} times", cfg.locals[i], count);
        }
    }

    // The loop produced a back edge: some block jumps to an earlier one.
    let has_back_edge = cfg
        .blocks
        .iter()
        .any(|b| b.successors().iter().any(|s| s.0 <= b.id.0));
    assert!(has_back_edge);
}

#[test]
fn unreachable_code_after_return_is_flagged() {
    let (_, diags) = check(
        "# typed: true\nclass A\n  sig { returns(Integer) }\n  def f\n    return 1\n    2\n  end\nend\n",
    );
    assert_eq!(codes(&diags), vec!["SBW03002"]);
    assert_eq!(diags[0].severity, Severity::Warning);
}

#[test]
fn integer_plus_string_reports_argument_mismatch() {
    // Scenario: 1 + 'hello' under strict typing.
    let source = "# typed: true\n1 + 'hello'\n";
    let (gs, diags) = check(source);
    assert_eq!(codes(&diags), vec!["SBE04003"]);
    assert_eq!(diags[0].message, "expected `Integer`, got `String`");
    // The span points at the string literal.
    let reported = diags[0].loc.source(&gs).expect("span resolves");
    assert_eq!(reported, "'hello'");
}

#[test]
fn return_type_mismatch_points_at_the_return_expression() {
    // Scenario: returns(String) with body `return 42`.
    let source = "# typed: true\nclass A\n  sig { returns(String) }\n  def f\n    return 42\n  end\nend\n";
    let (gs, diags) = check(source);
    assert_eq!(codes(&diags), vec!["SBE04004"]);
    assert_eq!(diags[0].message, "expected `String`, got `Integer`");
    assert_eq!(diags[0].loc.source(&gs), Some("42"));
}

#[test]
fn exhaustive_case_passes_absurd() {
    let source = "# typed: true\nclass A\n  sig { params(x: T.any(Integer, String)).returns(Integer) }\n  def f(x)\n    case x\n    when Integer\n      1\n    when String\n      2\n    else\n      T.absurd(x)\n    end\n  end\nend\n";
    let (_, diags) = check(source);
    assert!(diags.is_empty(), "unexpected: {:?}", codes(&diags));
}

#[test]
fn non_exhaustive_case_reports_absurd() {
    let source = "# typed: true\nclass A\n  sig { params(x: T.any(Integer, String, Float)).returns(Integer) }\n  def f(x)\n    case x\n    when Integer\n      1\n    when String\n      2\n    else\n      T.absurd(x)\n    end\n  end\nend\n";
    let (_, diags) = check(source);
    assert_eq!(codes(&diags), vec!["SBE04006"]);
    assert!(diags[0].message.contains("Float"));
}

#[test]
fn nil_check_refines_both_branches() {
    let source = "# typed: true\nclass A\n  sig { params(x: T.nilable(Integer)).returns(Integer) }\n  def f(x)\n    if x.nil?\n      0\n    else\n      x + 1\n    end\n  end\nend\n";
    let (_, diags) = check(source);
    assert!(diags.is_empty(), "unexpected: {:?}", codes(&diags));
}

#[test]
fn missing_nil_check_reports_mismatch() {
    let source = "# typed: true\nclass A\n  sig { params(x: T.nilable(Integer)).returns(Integer) }\n  def f(x)\n    x + 1\n  end\nend\n";
    let (_, diags) = check(source);
    // NilClass has no `+`; the union dispatch reports the missing side.
    assert!(codes(&diags).contains(&"SBE04001"), "got {:?}", codes(&diags));
}

#[test]
fn is_a_refinement_narrows_unions() {
    let source = "# typed: true\nclass A\n  sig { params(x: T.any(Integer, String)).returns(Integer) }\n  def f(x)\n    if x.is_a?(Integer)\n      x + 1\n    else\n      x.length\n    end\n  end\nend\n";
    let (_, diags) = check(source);
    assert!(diags.is_empty(), "unexpected: {:?}", codes(&diags));
}

#[test]
fn truthiness_narrows_nil_away() {
    let source = "# typed: true\nclass A\n  sig { params(x: T.nilable(Integer)).returns(Integer) }\n  def f(x)\n    if x\n      x + 1\n    else\n      0\n    end\n  end\nend\n";
    let (_, diags) = check(source);
    assert!(diags.is_empty(), "unexpected: {:?}", codes(&diags));
}

#[test]
fn early_return_narrows_the_fallthrough() {
    let source = "# typed: true\nclass A\n  sig { params(x: T.nilable(Integer)).returns(Integer) }\n  def f(x)\n    if x.nil?\n      return 0\n    end\n    x + 1\n  end\nend\n";
    let (_, diags) = check(source);
    assert!(diags.is_empty(), "unexpected: {:?}", codes(&diags));
}

#[test]
fn void_methods_accept_but_flag_returned_values() {
    let source = "# typed: true\nclass A\n  sig { void }\n  def f\n    return 42\n  end\nend\n";
    let (_, diags) = check(source);
    assert_eq!(codes(&diags), vec!["SBW03003"]);
    assert_eq!(diags[0].severity, Severity::Warning);
}

#[test]
fn loops_converge_and_diagnostics_are_deterministic() {
    let source = "# typed: true\nclass A\n  sig { params(n: Integer).returns(Integer) }\n  def f(n)\n    total = 0\n    while n > 0\n      total = total + n\n      n = n - 1\n    end\n    total\n  end\nend\n";
    let (_, first) = check(source);
    assert!(first.is_empty(), "unexpected: {:?}", codes(&first));
    // Re-running over identical input yields identical diagnostics.
    let bad = "# typed: true\nclass A\n  sig { returns(String) }\n  def f\n    return 42\n  end\n  sig { returns(String) }\n  def g\n    return 43\n  end\nend\n";
    let (_, once) = check(bad);
    let (_, twice) = check(bad);
    assert_eq!(once, twice);
    assert_eq!(once.len(), 2);
}

#[test]
fn begin_rescue_merges_binder_and_body_state() {
    let source = "# typed: true\nclass A\n  sig { params(x: Integer).returns(Integer) }\n  def f(x)\n    begin\n      x + 1\n    rescue StandardError => e\n      0\n    ensure\n      x\n    end\n  end\nend\n";
    let (_, diags) = check(source);
    assert!(diags.is_empty(), "unexpected: {:?}", codes(&diags));
}

#[test]
fn safe_send_narrows_the_receiver() {
    let source = "# typed: true\nclass A\n  sig { params(x: T.nilable(String)).returns(T.nilable(Integer)) }\n  def f(x)\n    x&.length\n  end\nend\n";
    let (_, diags) = check(source);
    assert!(diags.is_empty(), "unexpected: {:?}", codes(&diags));
}

#[test]
fn default_argument_is_checked_against_the_declared_type() {
    let source = "# typed: true\nclass A\n  sig { params(x: Integer).returns(Integer) }\n  def f(x = 'oops')\n    x\n  end\nend\n";
    let (_, diags) = check(source);
    assert!(codes(&diags).contains(&"SBE04004"), "got {:?}", codes(&diags));
}

#[test]
fn applied_generics_project_member_types() {
    let source = "# typed: true\nclass A\n  sig { params(a: Array[Integer]).returns(T.nilable(Integer)) }\n  def f(a)\n    a.first\n  end\nend\n";
    let (_, diags) = check(source);
    assert!(diags.is_empty(), "unexpected: {:?}", codes(&diags));
}

#[test]
fn generic_methods_unify_at_the_call_site() {
    let clean = "# typed: true\nclass Box\n  sig { type_parameters(:u).params(value: T.type_parameter(:u)).returns(T.type_parameter(:u)) }\n  def echo(value)\n    value\n  end\nend\nclass A\n  sig { params(b: Box).returns(Integer) }\n  def use(b)\n    b.echo(1) + 1\n  end\nend\n";
    let (_, diags) = check(clean);
    assert!(diags.is_empty(), "unexpected: {:?}", codes(&diags));

    let bad = "# typed: true\nclass Box\n  sig { type_parameters(:u).params(value: T.type_parameter(:u)).returns(T.type_parameter(:u)) }\n  def echo(value)\n    value\n  end\nend\nclass A\n  sig { params(b: Box, s: String).returns(String) }\n  def use(b, s)\n    b.echo(s) + 1\n  end\nend\n";
    let (_, diags) = check(bad);
    assert_eq!(codes(&diags), vec!["SBE04003"]);
    assert!(diags[0].message.contains("expected `String`"));
}

#[test]
fn constructors_type_as_instances() {
    let source = "# typed: true\nclass Point\n  sig { returns(Integer) }\n  def norm\n    0\n  end\nend\nclass A\n  sig { returns(Integer) }\n  def go\n    Point.new.norm\n  end\nend\n";
    let (_, diags) = check(source);
    assert!(diags.is_empty(), "unexpected: {:?}", codes(&diags));
}

#[test]
fn private_methods_gate_on_the_call_shape() {
    let source = "# typed: true\nclass A\n  sig { returns(Integer) }\n  def outside\n    helper\n  end\n\n  sig { returns(Integer) }\n  private def helper\n    1\n  end\nend\nclass B\n  sig { params(a: A).returns(Integer) }\n  def poke(a)\n    a.helper\n  end\nend\n";
    let (_, diags) = check(source);
    assert_eq!(codes(&diags), vec!["SBE04007"]);
}

#[test]
fn keyword_arguments_are_matched_by_name() {
    let source = "# typed: true\nclass A\n  sig { params(x: Integer, label: String).returns(Integer) }\n  def tag(x, label:)\n    x\n  end\n\n  sig { returns(Integer) }\n  def ok\n    tag(1, label: 'x')\n  end\n\n  sig { returns(Integer) }\n  def missing\n    tag(1)\n  end\n\n  sig { returns(Integer) }\n  def unknown\n    tag(1, label: 'x', extra: 2)\n  end\nend\n";
    let (_, diags) = check(source);
    let codes = codes(&diags);
    assert!(codes.contains(&"SBE04008"), "missing kw: {:?}", codes);
    assert!(codes.contains(&"SBE04009"), "unknown kw: {:?}", codes);
    assert_eq!(codes.iter().filter(|c| **c == "SBE04008").count(), 1);
}

#[test]
fn freeze_violation_outside_scopes_is_fatal() {
    let mut gs = Pipeline::initial_global_state();
    gs.with_unfrozen(TableMask::NAMES, |gs| {
        gs.enter_name_utf8("inside is fine");
    });
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        gs.enter_name_utf8("outside is not");
    }));
    assert!(result.is_err());
}
