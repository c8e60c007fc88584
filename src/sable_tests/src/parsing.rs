// Front-end coverage: the supported surface, recovery, and the sigil.

use sable_parser::parse_source;
use sable_syntax::{Def, Expr, ParamKind, Stmt, TypeExpr, TypedSigil};

#[test]
fn class_with_superclass_and_methods() {
    let (tree, errors) = parse_source(
        "# typed: true\nclass Foo < Bar\n  sig { params(x: Integer).returns(String) }\n  def go(x)\n    x.to_s\n  end\nend\n",
    );
    assert!(errors.is_empty(), "errors: {:?}", errors);
    assert_eq!(tree.sigil, Some(TypedSigil::True));
    assert_eq!(tree.defs.len(), 1);
    let class = match &tree.defs[0] {
        Def::Class(c) => c,
        other => panic!("expected class, got {:?}", other),
    };
    assert_eq!(class.name, "Foo");
    assert_eq!(class.superclass.as_deref(), Some("Bar"));
    let method = match &class.body[0] {
        Def::Method(m) => m,
        other => panic!("expected method, got {:?}", other),
    };
    assert_eq!(method.name, "go");
    assert_eq!(method.params.len(), 1);
    let sig = method.sig.as_ref().expect("sig attached");
    assert_eq!(sig.params.len(), 1);
    assert!(matches!(sig.return_type, Some(TypeExpr::Name(ref n, _)) if n == "String"));
}

#[test]
fn sig_builders_fold_into_flags() {
    let (tree, errors) = parse_source(
        "class A\n  sig { abstract.params(x: T.untyped).void }\n  def go(x)\n  end\nend\n",
    );
    assert!(errors.is_empty(), "errors: {:?}", errors);
    let class = match &tree.defs[0] {
        Def::Class(c) => c,
        _ => panic!(),
    };
    let method = match &class.body[0] {
        Def::Method(m) => m,
        _ => panic!(),
    };
    let sig = method.sig.as_ref().unwrap();
    assert!(sig.flags.is_abstract);
    assert!(sig.return_type.is_none(), "void leaves no return type");
}

#[test]
fn operators_lower_to_sends() {
    let (tree, errors) = parse_source("x = 1 + 2 * 3\n");
    assert!(errors.is_empty());
    let assign = &tree.top_stmts[0];
    let value = match assign {
        Stmt::Assign { value, .. } => value,
        other => panic!("expected assign, got {:?}", other),
    };
    // Precedence: 1 + (2 * 3).
    match value {
        Expr::Send { name, args, .. } => {
            assert_eq!(name, "+");
            assert!(matches!(args[0].value, Expr::Send { ref name, .. } if name == "*"));
        }
        other => panic!("expected send, got {:?}", other),
    }
}

#[test]
fn keyword_params_and_arguments() {
    let (tree, errors) = parse_source(
        "class A\n  def go(a, b:, c: 3)\n    go(1, b: 2)\n  end\nend\n",
    );
    assert!(errors.is_empty(), "errors: {:?}", errors);
    let class = match &tree.defs[0] {
        Def::Class(c) => c,
        _ => panic!(),
    };
    let method = match &class.body[0] {
        Def::Method(m) => m,
        _ => panic!(),
    };
    assert_eq!(method.params[0].kind, ParamKind::Positional);
    assert_eq!(method.params[1].kind, ParamKind::Keyword);
    assert_eq!(method.params[2].kind, ParamKind::OptionalKeyword);
    let call = match &method.body[0] {
        Stmt::Expr(e) => e,
        other => panic!("expected expr, got {:?}", other),
    };
    match call {
        Expr::Send { args, .. } => {
            assert_eq!(args.len(), 2);
            assert_eq!(args[0].keyword, None);
            assert_eq!(args[1].keyword.as_deref(), Some("b"));
        }
        other => panic!("expected send, got {:?}", other),
    }
}

#[test]
fn case_and_begin_survive_to_the_tree() {
    let (tree, errors) = parse_source(
        "def go(x)\n  case x\n  when Integer then 1\n  when String\n    2\n  else\n    3\n  end\n  begin\n    x\n  rescue Foo, Bar => e\n    e\n  ensure\n    nil\n  end\nend\n",
    );
    assert!(errors.is_empty(), "errors: {:?}", errors);
    let method = match &tree.defs[0] {
        Def::Method(m) => m,
        other => panic!("expected method, got {:?}", other),
    };
    match &method.body[0] {
        Stmt::Case { whens, else_body, .. } => {
            assert_eq!(whens.len(), 2);
            assert_eq!(else_body.len(), 1);
        }
        other => panic!("expected case, got {:?}", other),
    }
    match &method.body[1] {
        Stmt::Begin { rescues, ensure_body, .. } => {
            assert_eq!(rescues.len(), 1);
            assert_eq!(rescues[0].classes.len(), 2);
            assert!(rescues[0].binder.is_some());
            assert_eq!(ensure_body.len(), 1);
        }
        other => panic!("expected begin, got {:?}", other),
    }
}

#[test]
fn unless_and_until_fold_into_positive_forms() {
    let (tree, errors) = parse_source("unless ready\n  1\nelse\n  2\nend\nuntil done\n  3\nend\n");
    assert!(errors.is_empty(), "errors: {:?}", errors);
    match &tree.top_stmts[0] {
        Stmt::If {
            then_body,
            else_body,
            ..
        } => {
            // Branches swapped: the `unless` body is the else branch.
            assert!(matches!(then_body[0], Stmt::Expr(Expr::Integer(2, _))));
            assert!(matches!(else_body[0], Stmt::Expr(Expr::Integer(1, _))));
        }
        other => panic!("expected if, got {:?}", other),
    }
    match &tree.top_stmts[1] {
        Stmt::While { cond, .. } => {
            assert!(matches!(cond, Expr::Send { name, .. } if name == "!"));
        }
        other => panic!("expected while, got {:?}", other),
    }
}

#[test]
fn type_expressions_cover_the_surface() {
    let (tree, errors) = parse_source(
        "class A\n  sig { params(a: T.nilable(Integer), b: T.any(Integer, String), c: [Integer, String], d: {name: String}, e: Array[Integer], f: T.untyped, g: T::Boolean).returns(T.self_type) }\n  def go(a, b, c, d, e, f, g)\n    self\n  end\nend\n",
    );
    assert!(errors.is_empty(), "errors: {:?}", errors);
    let class = match &tree.defs[0] {
        Def::Class(c) => c,
        _ => panic!(),
    };
    let method = match &class.body[0] {
        Def::Method(m) => m,
        _ => panic!(),
    };
    let sig = method.sig.as_ref().unwrap();
    assert!(matches!(sig.params[0].ty, TypeExpr::Nilable(..)));
    assert!(matches!(sig.params[1].ty, TypeExpr::Any(..)));
    assert!(matches!(sig.params[2].ty, TypeExpr::Tuple(..)));
    assert!(matches!(sig.params[3].ty, TypeExpr::Shape(..)));
    assert!(matches!(sig.params[4].ty, TypeExpr::Applied { .. }));
    assert!(matches!(sig.params[5].ty, TypeExpr::Untyped(..)));
    assert!(matches!(sig.params[6].ty, TypeExpr::Boolean(..)));
    assert!(matches!(sig.return_type, Some(TypeExpr::SelfType(..))));
}

#[test]
fn recovery_reports_and_continues() {
    let (tree, errors) = parse_source("@@@ not sable\nclass Ok\nend\n");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.starts_with("unexpected"));
    assert_eq!(tree.defs.len(), 1);
    assert!(matches!(&tree.defs[0], Def::Class(c) if c.name == "Ok"));
}

#[test]
fn blocks_parse_with_params() {
    let (tree, errors) = parse_source("items.each do |item|\n  item\nend\n");
    assert!(errors.is_empty(), "errors: {:?}", errors);
    match &tree.top_stmts[0] {
        Stmt::Expr(Expr::Send { name, block, .. }) => {
            assert_eq!(name, "each");
            let block = block.as_ref().expect("block attached");
            assert_eq!(block.params.len(), 1);
        }
        other => panic!("expected send with block, got {:?}", other),
    }
}

#[test]
fn type_alias_definition() {
    let (tree, errors) = parse_source("JsonKey = T.type_alias { T.any(String, Symbol) }\n");
    assert!(errors.is_empty(), "errors: {:?}", errors);
    assert!(matches!(&tree.defs[0], Def::TypeAlias(a) if a.name == "JsonKey"));
}
