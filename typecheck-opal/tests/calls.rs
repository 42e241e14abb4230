mod common;

use ast_opal::{Arg, ExprKind, LambdaDecl, LambdaParam, PostfixOpKind};
use common::*;
use ir_opal::Op;

fn shape_world() -> types_opal::Assembly {
  let mut asm = new_assembly();
  let shape = concept(
    "Main",
    "Shape",
    vec![method("area", vec![], named("Int"), None)],
  );
  asm.register_oo(shape);
  let mut circle = entity("Main", "Circle", vec![field("r", named("Int"), None)]);
  circle.provides.push(named("Shape"));
  circle.methods.push(method(
    "area",
    vec![],
    named("Int"),
    Some(expr_body(int(9))),
  ));
  asm.register_oo(circle);
  asm
}

#[test]
fn known_target_dispatch_on_unique_entity() {
  let mut asm = shape_world();
  asm.register_function(func(
    "Main",
    "f",
    vec![param("c", named("Circle"))],
    named("Int"),
    expr_body(postfix(var("c"), vec![op(invoke("area", vec![], vec![]))])),
  ));
  let (ir, diags) = check(&asm);
  assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
  let body = registered_body(&ir, "Main::f");
  assert!(body_ops(body)
    .iter()
    .any(|op| matches!(op, Op::CallKnownTarget { .. })));
}

#[test]
fn virtual_dispatch_through_concept_receiver() {
  let mut asm = shape_world();
  asm.register_function(func(
    "Main",
    "f",
    vec![param("s", named("Shape"))],
    named("Int"),
    expr_body(postfix(var("s"), vec![op(invoke("area", vec![], vec![]))])),
  ));
  let (ir, diags) = check(&asm);
  assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
  let body = registered_body(&ir, "Main::f");
  assert!(body_ops(body)
    .iter()
    .any(|op| matches!(op, Op::CallVirtualTarget { .. })));
}

#[test]
fn unknown_method_is_reported() {
  let mut asm = shape_world();
  asm.register_function(func(
    "Main",
    "f",
    vec![param("c", named("Circle"))],
    named("Int"),
    expr_body(postfix(var("c"), vec![op(invoke("perimeter", vec![], vec![]))])),
  ));
  let (_, diags) = check(&asm);
  assert!(has_code(&diags, "OP0002"));
}

#[test]
fn record_property_lambda_is_callable() {
  let mut asm = new_assembly();
  let fn_sig = ast_opal::TypeSig::new(
    sp(),
    ast_opal::TypeSigKind::Function {
      params: vec![ast_opal::ParamSig {
        name: "n".to_string(),
        sig: named("Int"),
        optional: false,
      }],
      rest: None,
      result: Box::new(named("Int")),
    },
  );
  asm.register_function(func(
    "Main",
    "f",
    vec![param("r", record_sig(vec![("op", fn_sig, false)], false))],
    named("Int"),
    expr_body(postfix(
      var("r"),
      vec![op(invoke("op", vec![], vec![Arg::plain(int(3))]))],
    )),
  ));
  let (ir, diags) = check(&asm);
  assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
  let body = registered_body(&ir, "Main::f");
  let ops = body_ops(body);
  assert!(ops.iter().any(|op| matches!(op, Op::LoadProperty { .. })));
  assert!(ops.iter().any(|op| matches!(op, Op::CallLambda { .. })));
}

#[test]
fn lambda_signature_infers_from_declared_variable() {
  let mut asm = new_assembly();
  let fn_sig = ast_opal::TypeSig::new(
    sp(),
    ast_opal::TypeSigKind::Function {
      params: vec![ast_opal::ParamSig {
        name: "n".to_string(),
        sig: named("Int"),
        optional: false,
      }],
      rest: None,
      result: Box::new(named("Int")),
    },
  );
  let lambda = e(ExprKind::ConstructorLambda(Box::new(LambdaDecl {
    span: sp(),
    params: vec![LambdaParam {
      name: "n".to_string(),
      sig: auto(),
      optional: false,
    }],
    result: auto(),
    captured: vec![],
    body: expr_body(add(var("n"), int(1))),
  })));
  asm.register_function(func(
    "Main",
    "f",
    vec![],
    named("Int"),
    block_body(vec![
      let_var("g", fn_sig, lambda),
      ret(postfix(
        var("g"),
        vec![op(PostfixOpKind::CallLambda {
          args: vec![Arg::plain(int(1))],
        })],
      )),
    ]),
  ));
  let (ir, diags) = check(&asm);
  assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
  let body = registered_body(&ir, "Main::f");
  assert!(body_ops(body)
    .iter()
    .any(|op| matches!(op, Op::ConstructorLambda { .. })));
  // The lambda body was compiled and registered under its own key.
  assert_eq!(ir.lambdas().count(), 1);
  assert!(ir.lambdas().all(|l| l.key.contains("$lambda@")));
}

#[test]
fn lambda_without_hint_or_annotation_is_an_error() {
  let mut asm = new_assembly();
  let lambda = e(ExprKind::ConstructorLambda(Box::new(LambdaDecl {
    span: sp(),
    params: vec![LambdaParam {
      name: "n".to_string(),
      sig: auto(),
      optional: false,
    }],
    result: auto(),
    captured: vec![],
    body: expr_body(var("n")),
  })));
  asm.register_function(func(
    "Main",
    "f",
    vec![],
    named("Int"),
    block_body(vec![let_var("g", auto(), lambda), ret(int(0))]),
  ));
  let (_, diags) = check(&asm);
  assert!(has_code(&diags, "OP0001"));
}

#[test]
fn captured_variables_flow_into_the_lambda() {
  let mut asm = new_assembly();
  let fn_sig = ast_opal::TypeSig::new(
    sp(),
    ast_opal::TypeSigKind::Function {
      params: vec![],
      rest: None,
      result: Box::new(named("Int")),
    },
  );
  let lambda = e(ExprKind::ConstructorLambda(Box::new(LambdaDecl {
    span: sp(),
    params: vec![],
    result: named("Int"),
    captured: vec!["base".to_string()],
    body: expr_body(add(var("base"), int(1))),
  })));
  asm.register_function(func(
    "Main",
    "f",
    vec![param("base", named("Int"))],
    fn_sig,
    expr_body(lambda),
  ));
  let (ir, diags) = check(&asm);
  assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
  let body = registered_body(&ir, "Main::f");
  let captured = body_ops(body)
    .iter()
    .find_map(|op| match op {
      Op::ConstructorLambda { captured, .. } => Some(captured.len()),
      _ => None,
    })
    .expect("lambda constructor emitted");
  assert_eq!(captured, 1);
}
