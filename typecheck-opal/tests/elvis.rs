mod common;

use common::*;
use ir_opal::Op;

fn recd_or_none() -> ast_opal::TypeSig {
  union_sig(vec![
    record_sig(vec![("f", named("Int"), false)], false),
    named("None"),
  ])
}

#[test]
fn elvis_on_non_optional_reports_redundant_check() {
  let mut asm = new_assembly();
  asm.register_function(func(
    "Main",
    "f",
    vec![param("x", named("Int"))],
    named("Int"),
    expr_body(postfix(
      var("x"),
      vec![elvis(invoke("bar", vec![], vec![]))],
    )),
  ));
  let (ir, diags) = check(&asm);
  assert!(has_code(&diags, "OP0005"));
  assert!(message_containing(&diags, "None value is not possible"));
  assert!(ir.body("Main::f").is_none(), "failed body must be abandoned");
}

#[test]
fn elvis_on_always_none_reports_redundant_check() {
  let mut asm = new_assembly();
  asm.register_function(func(
    "Main",
    "f",
    vec![param("x", named("None"))],
    named("None"),
    expr_body(postfix(
      var("x"),
      vec![elvis(ast_opal::PostfixOpKind::AccessName("f".to_string()))],
    )),
  ));
  let (_, diags) = check(&asm);
  assert!(has_code(&diags, "OP0005"));
  assert!(message_containing(&diags, "value is always None"));
}

#[test]
fn elvis_chain_merges_through_a_shared_none_block() {
  let mut asm = new_assembly();
  asm.register_function(func(
    "Main",
    "f",
    vec![param("x", recd_or_none())],
    union_sig(vec![named("Int"), named("None")]),
    expr_body(postfix(
      var("x"),
      vec![elvis(ast_opal::PostfixOpKind::AccessName("f".to_string()))],
    )),
  ));
  let (ir, diags) = check(&asm);
  assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
  let body = registered_body(&ir, "Main::f");
  let ops = body_ops(body);
  assert!(ops.iter().any(|op| matches!(op, Op::NoneJump { .. })));
  assert!(ops.iter().any(|op| matches!(op, Op::LoadProperty { .. })));
  // The none path loads None into the final target.
  assert!(ops.iter().any(|op| matches!(op, Op::LoadConstNone { .. })));
}

#[test]
fn plain_chain_needs_no_extra_blocks() {
  let mut asm = new_assembly();
  asm.register_function(func(
    "Main",
    "f",
    vec![param("x", record_sig(vec![("f", named("Int"), false)], false))],
    named("Int"),
    expr_body(postfix(
      var("x"),
      vec![op(ast_opal::PostfixOpKind::AccessName("f".to_string()))],
    )),
  ));
  let (ir, diags) = check(&asm);
  assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
  let body = registered_body(&ir, "Main::f");
  assert_eq!(body.blocks.len(), 2, "entry and exit only");
}
