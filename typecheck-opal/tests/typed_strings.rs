mod common;

use ast_opal::{ExprKind, StaticFnDecl};
use common::*;
use ir_opal::Op;

fn typed_string(sig: ast_opal::TypeSig, value: &str, constructor: bool) -> ast_opal::Expression {
  e(ExprKind::LiteralTypedString {
    sig,
    value: value.to_string(),
    constructor,
  })
}

fn parsable_entity() -> ast_opal::OoDecl {
  let mut decl = entity("Main", "Zip", vec![field("code", named("Int"), None)]);
  decl.provides.push(named("Parsable"));
  decl.statics.push(StaticFnDecl {
    file: FILE,
    span: sp(),
    name: "tryParse".to_string(),
    attributes: Vec::new(),
    type_params: Vec::new(),
    params: vec![param("s", named("String"))],
    rest: None,
    result: union_sig(vec![named("Zip"), named("None")]),
    body: expr_body(none()),
  });
  decl
}

#[test]
fn literal_form_yields_string_of() {
  let mut asm = new_assembly();
  asm.register_oo(parsable_entity());
  asm.register_function(func(
    "Main",
    "f",
    vec![],
    named_with("StringOf", vec![named("Zip")]),
    expr_body(typed_string(named("Zip"), "12345", false)),
  ));
  let (ir, diags) = check(&asm);
  assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
  let body = registered_body(&ir, "Main::f");
  assert!(body_ops(body)
    .iter()
    .any(|op| matches!(op, Op::LoadConstTypedString { .. })));
}

#[test]
fn constructor_form_calls_try_parse() {
  let mut asm = new_assembly();
  asm.register_oo(parsable_entity());
  asm.register_function(func(
    "Main",
    "f",
    vec![],
    union_sig(vec![named("Zip"), named("None")]),
    expr_body(typed_string(named("Zip"), "12345", true)),
  ));
  let (ir, diags) = check(&asm);
  assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
  let body = registered_body(&ir, "Main::f");
  assert!(body_ops(body)
    .iter()
    .any(|op| matches!(op, Op::CallStaticFunction { .. })));
}

#[test]
fn non_parsable_target_is_rejected() {
  let mut asm = new_assembly();
  asm.register_oo(entity("Main", "Raw", vec![]));
  asm.register_function(func(
    "Main",
    "f",
    vec![],
    named("Raw"),
    expr_body(typed_string(named("Raw"), "x", false)),
  ));
  let (_, diags) = check(&asm);
  assert!(has_code(&diags, "OP0015"));
}

#[test]
fn record_property_may_not_mask_universal_methods() {
  let mut asm = new_assembly();
  asm.register_function(func(
    "Main",
    "f",
    vec![],
    named("Int"),
    expr_body(record(vec![("is", int(1))])),
  ));
  let (_, diags) = check(&asm);
  assert!(has_code(&diags, "OP0014"));
}

#[test]
fn optional_before_required_parameter_is_rejected() {
  let mut asm = new_assembly();
  let mut bad = param("a", named("Int"));
  bad.optional = true;
  asm.register_function(func(
    "Main",
    "f",
    vec![bad, param("b", named("Int"))],
    named("Int"),
    expr_body(int(0)),
  ));
  let (_, diags) = check(&asm);
  assert!(has_code(&diags, "OP0013"));
}
