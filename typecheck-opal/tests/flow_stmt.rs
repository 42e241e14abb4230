mod common;

use ast_opal::StmtKind;
use common::*;
use ir_opal::Op;

#[test]
fn shadowing_a_parameter_is_rejected() {
  let mut asm = new_assembly();
  asm.register_function(func(
    "Main",
    "f",
    vec![param("x", named("Int"))],
    named("Int"),
    block_body(vec![let_var("x", named("Int"), int(1)), ret(var("x"))]),
  ));
  let (_, diags) = check(&asm);
  assert!(has_code(&diags, "OP0010"));
}

#[test]
fn assigning_a_const_is_rejected() {
  let mut asm = new_assembly();
  asm.register_function(func(
    "Main",
    "f",
    vec![],
    named("Int"),
    block_body(vec![
      s(StmtKind::VarDecl {
        name: "x".to_string(),
        is_const: true,
        sig: named("Int"),
        init: Some(int(1)),
      }),
      s(StmtKind::VarAssign {
        name: "x".to_string(),
        value: int(2),
      }),
      ret(var("x")),
    ]),
  ));
  let (_, diags) = check(&asm);
  assert!(has_code(&diags, "OP0011"));
}

#[test]
fn declared_type_must_admit_the_initializer() {
  let mut asm = new_assembly();
  asm.register_function(func(
    "Main",
    "f",
    vec![],
    named("Int"),
    block_body(vec![let_var("x", named("Bool"), int(1)), ret(int(0))]),
  ));
  let (_, diags) = check(&asm);
  assert!(has_code(&diags, "OP0001"));
}

#[test]
fn statements_after_return_are_unreachable() {
  let mut asm = new_assembly();
  asm.register_function(func(
    "Main",
    "f",
    vec![],
    named("Int"),
    block_body(vec![ret(int(1)), ret(int(2))]),
  ));
  let (_, diags) = check(&asm);
  assert!(has_code(&diags, "OP0009"));
}

#[test]
fn body_must_return_on_every_path() {
  let mut asm = new_assembly();
  asm.register_function(func(
    "Main",
    "f",
    vec![param("p", named("Bool"))],
    named("Int"),
    block_body(vec![s(StmtKind::If {
      branches: vec![ast_opal::CondBranch {
        cond: var("p"),
        block: block(vec![ret(int(1))]),
      }],
      else_block: None,
    })]),
  ));
  let (_, diags) = check(&asm);
  assert!(has_code(&diags, "OP0018"));
}

#[test]
fn branch_flow_types_union_at_the_merge() {
  let mut asm = new_assembly();
  asm.register_function(func(
    "Main",
    "f",
    vec![param("p", named("Bool"))],
    union_sig(vec![named("Int"), named("Bool")]),
    block_body(vec![
      s(StmtKind::VarDecl {
        name: "x".to_string(),
        is_const: false,
        sig: union_sig(vec![named("Int"), named("Bool")]),
        init: Some(int(0)),
      }),
      s(StmtKind::If {
        branches: vec![ast_opal::CondBranch {
          cond: var("p"),
          block: block(vec![s(StmtKind::VarAssign {
            name: "x".to_string(),
            value: boolean(true),
          })]),
        }],
        else_block: Some(block(vec![s(StmtKind::VarAssign {
          name: "x".to_string(),
          value: int(2),
        })])),
      }),
      ret(var("x")),
    ]),
  ));
  let (_, diags) = check(&asm);
  assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
}

#[test]
fn assert_propagates_the_true_flow() {
  let mut asm = new_assembly();
  asm.register_function(func(
    "Main",
    "f",
    vec![param("x", union_sig(vec![named("Int"), named("None")]))],
    named("Int"),
    block_body(vec![
      s(StmtKind::Assert(postfix(
        var("x"),
        vec![op(invoke("isSome", vec![], vec![]))],
      ))),
      ret(add(var("x"), int(1))),
    ]),
  ));
  let (ir, diags) = check(&asm);
  assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
  let body = registered_body(&ir, "Main::f");
  assert!(body_ops(body).iter().any(|op| matches!(op, Op::Assert { .. })));
}

#[test]
fn locals_get_lifetime_markers_on_exit_paths() {
  let mut asm = new_assembly();
  asm.register_function(func(
    "Main",
    "f",
    vec![],
    named("Int"),
    block_body(vec![let_var("x", named("Int"), int(1)), ret(var("x"))]),
  ));
  let (ir, diags) = check(&asm);
  assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
  let body = registered_body(&ir, "Main::f");
  let ops = body_ops(body);
  let starts = ops
    .iter()
    .filter(|op| matches!(op, Op::LocalLifetimeStart { .. }))
    .count();
  let ends = ops
    .iter()
    .filter(|op| matches!(op, Op::LocalLifetimeEnd { .. }))
    .count();
  assert_eq!(starts, 1);
  assert_eq!(ends, 1, "the return path closes the local's lifetime");
}

#[test]
fn use_before_definite_assignment_is_rejected() {
  let mut asm = new_assembly();
  asm.register_function(func(
    "Main",
    "f",
    vec![],
    named("Int"),
    block_body(vec![
      s(StmtKind::VarDecl {
        name: "x".to_string(),
        is_const: false,
        sig: named("Int"),
        init: None,
      }),
      ret(var("x")),
    ]),
  ));
  let (_, diags) = check(&asm);
  assert!(has_code(&diags, "OP0012"));
}
