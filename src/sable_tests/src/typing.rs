// The type algebra: subtyping, join/meet, and the end-to-end subtype
// scenarios over user classes.

use crate::support::{check, class, codes};
use sable_core::types::{instantiate, is_subtype, join, meet};
use sable_core::{LiteralValue, Symbols, Type, TypeConstraint};

fn sample_types() -> Vec<Type> {
    vec![
        Type::Untyped,
        Type::Top,
        Type::Bottom,
        Type::Class(Symbols::INTEGER),
        Type::Class(Symbols::STRING),
        Type::Class(Symbols::OBJECT),
        Type::Class(Symbols::NIL_CLASS),
        Type::Literal(LiteralValue::Integer(42)),
        Type::Literal(LiteralValue::Bool(true)),
        Type::nilable(Type::Class(Symbols::INTEGER)),
        Type::any(vec![
            Type::Class(Symbols::INTEGER),
            Type::Class(Symbols::STRING),
        ]),
        Type::Tuple(vec![
            Type::Class(Symbols::INTEGER),
            Type::Class(Symbols::STRING),
        ]),
        Type::Applied {
            class: Symbols::ARRAY,
            args: vec![Type::Class(Symbols::INTEGER)],
        },
        Type::boolean(),
    ]
}

#[test]
fn subtype_is_reflexive() {
    let (gs, _) = check("# typed: true\n");
    for t in sample_types() {
        assert!(is_subtype(&gs, &t, &t), "not reflexive: {}", t.show(&gs));
    }
}

#[test]
fn subtype_is_transitive_on_samples() {
    let (gs, _) = check("# typed: true\n");
    let samples = sample_types();
    for a in &samples {
        for b in &samples {
            for c in &samples {
                if is_subtype(&gs, a, b) && is_subtype(&gs, b, c) {
                    assert!(
                        is_subtype(&gs, a, c),
                        "transitivity broke: {} <= {} <= {}",
                        a.show(&gs),
                        b.show(&gs),
                        c.show(&gs)
                    );
                }
            }
        }
    }
}

#[test]
fn join_bounds_both_sides_and_meet_dually() {
    let (gs, _) = check("# typed: true\n");
    let samples = sample_types();
    for a in &samples {
        for b in &samples {
            let lub = join(&gs, a, b);
            assert!(is_subtype(&gs, a, &lub), "a !<= join(a,b)");
            assert!(is_subtype(&gs, b, &lub), "b !<= join(a,b)");
            let glb = meet(&gs, a, b);
            assert!(is_subtype(&gs, &glb, a), "meet(a,b) !<= a");
            assert!(is_subtype(&gs, &glb, b), "meet(a,b) !<= b");
        }
    }
}

#[test]
fn untyped_absorbs_in_both_directions() {
    let (gs, _) = check("# typed: true\n");
    for t in sample_types() {
        assert!(is_subtype(&gs, &Type::Untyped, &t));
        assert!(is_subtype(&gs, &t, &Type::Untyped));
    }
}

#[test]
fn subclass_is_subtype_of_superclass() {
    // Scenario: class Bar; class Foo < Bar.
    let (gs, diags) = check("# typed: true\nclass Bar\nend\nclass Foo < Bar\nend\n");
    assert!(diags.is_empty(), "unexpected: {:?}", codes(&diags));
    let foo = Type::Class(class(&gs, "Foo"));
    let bar = Type::Class(class(&gs, "Bar"));
    assert!(is_subtype(&gs, &foo, &bar));
    assert!(!is_subtype(&gs, &bar, &foo));
}

#[test]
fn siblings_join_to_parent_and_meet_to_bottom() {
    let (gs, diags) = check(
        "# typed: true\nclass Bar\nend\nclass Foo1 < Bar\nend\nclass Foo2 < Bar\nend\n",
    );
    assert!(diags.is_empty(), "unexpected: {:?}", codes(&diags));
    let foo1 = Type::Class(class(&gs, "Foo1"));
    let foo2 = Type::Class(class(&gs, "Foo2"));
    let bar = Type::Class(class(&gs, "Bar"));
    assert_eq!(join(&gs, &foo1, &foo2), bar);
    assert_eq!(meet(&gs, &foo1, &foo2), Type::Bottom);
}

#[test]
fn literals_are_subtypes_of_their_class_only() {
    let (gs, _) = check("# typed: true\n");
    let one = Type::Literal(LiteralValue::Integer(1));
    let two = Type::Literal(LiteralValue::Integer(2));
    assert!(is_subtype(&gs, &one, &Type::Class(Symbols::INTEGER)));
    assert!(is_subtype(&gs, &one, &Type::Class(Symbols::OBJECT)));
    assert!(!is_subtype(&gs, &one, &two));
    assert!(!is_subtype(&gs, &Type::Class(Symbols::INTEGER), &one));
}

#[test]
fn tuples_subtype_pointwise() {
    let (gs, _) = check("# typed: true\n");
    let narrow = Type::Tuple(vec![
        Type::Literal(LiteralValue::Integer(1)),
        Type::Class(Symbols::STRING),
    ]);
    let wide = Type::Tuple(vec![
        Type::Class(Symbols::INTEGER),
        Type::Class(Symbols::OBJECT),
    ]);
    assert!(is_subtype(&gs, &narrow, &wide));
    assert!(!is_subtype(&gs, &wide, &narrow));
    let short = Type::Tuple(vec![Type::Class(Symbols::INTEGER)]);
    assert!(!is_subtype(&gs, &short, &wide));
    // A tuple erases to an array of its element join.
    assert!(is_subtype(
        &gs,
        &narrow,
        &Type::Applied {
            class: Symbols::ARRAY,
            args: vec![Type::Class(Symbols::OBJECT)],
        }
    ));
}

#[test]
fn unions_decompose_on_both_sides() {
    let (gs, _) = check("# typed: true\n");
    let int_or_str = Type::any(vec![
        Type::Class(Symbols::INTEGER),
        Type::Class(Symbols::STRING),
    ]);
    assert!(is_subtype(&gs, &Type::Class(Symbols::INTEGER), &int_or_str));
    assert!(is_subtype(&gs, &int_or_str, &Type::Class(Symbols::OBJECT)));
    assert!(!is_subtype(&gs, &int_or_str, &Type::Class(Symbols::INTEGER)));
}

#[test]
fn intersections_decompose_on_both_sides() {
    let (gs, _) = check("# typed: true\n");
    let both = Type::all(vec![
        Type::Class(Symbols::INTEGER),
        Type::Class(Symbols::STRING),
    ]);
    assert!(is_subtype(&gs, &both, &Type::Class(Symbols::INTEGER)));
    assert!(is_subtype(&gs, &both, &Type::Class(Symbols::STRING)));
    assert!(!is_subtype(&gs, &Type::Class(Symbols::INTEGER), &both));
}

#[test]
fn normalization_flattens_and_dedups() {
    let a = Type::any(vec![
        Type::Class(Symbols::INTEGER),
        Type::any(vec![
            Type::Class(Symbols::INTEGER),
            Type::Class(Symbols::STRING),
        ]),
    ]);
    assert_eq!(a.or_components().len(), 2);
    // The right spine never holds another union.
    if let Type::Or(_, r) = &a {
        assert!(!matches!(**r, Type::Or(..)));
    }
    assert_eq!(Type::any(vec![Type::Class(Symbols::INTEGER)]), Type::Class(Symbols::INTEGER));
    assert_eq!(Type::any(vec![]), Type::Bottom);
    assert_eq!(Type::all(vec![]), Type::Top);
}

#[test]
fn nilable_renders_and_absorbs() {
    let (gs, _) = check("# typed: true\n");
    let t = Type::nilable(Type::Class(Symbols::INTEGER));
    assert_eq!(t.show(&gs), "T.nilable(Integer)");
    assert!(is_subtype(&gs, &Type::nil(), &t));
    assert!(is_subtype(&gs, &Type::Class(Symbols::INTEGER), &t));
}

#[test]
fn instantiate_substitutes_solved_variables() {
    let (mut gs, _) = check("# typed: true\n");
    let var = gs.with_unfrozen(sable_core::TableMask::NAMES, |gs| {
        let n = gs.enter_name_utf8("u");
        gs.allocate_type_var(n)
    });
    let mut constraint = TypeConstraint::new(vec![var]);
    constraint.add_lower(var, Type::Class(Symbols::INTEGER));
    assert!(constraint.solve(&gs));
    let solved = instantiate(&gs, &Type::TypeVar(var), &constraint);
    assert_eq!(solved, Type::Class(Symbols::INTEGER));
    // Idempotent on fully-solved input.
    assert_eq!(instantiate(&gs, &solved, &constraint), solved);
}

#[test]
fn type_alias_is_transparent_to_subtyping() {
    let (gs, diags) = check(
        "# typed: true\nIntOrString = T.type_alias { T.any(Integer, String) }\nclass User\n  sig { params(x: IntOrString).returns(Integer) }\n  def go(x)\n    0\n  end\nend\n",
    );
    assert!(diags.is_empty(), "unexpected: {:?}", codes(&diags));
    let alias_sym = class(&gs, "IntOrString");
    let alias = Type::Alias(alias_sym);
    assert!(is_subtype(&gs, &Type::Class(Symbols::INTEGER), &alias));
    assert!(is_subtype(&gs, &alias, &Type::Class(Symbols::OBJECT)));
}
