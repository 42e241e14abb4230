mod common;

use ast_opal::Arg;
use common::*;
use ir_opal::{Op, Register};

fn point_assembly() -> types_opal::Assembly {
  let mut asm = new_assembly();
  asm.register_oo(entity(
    "Main",
    "Point",
    vec![
      field("x", named("Int"), None),
      field("y", named("Int"), None),
      field("z", named("Int"), Some(int(0))),
    ],
  ));
  asm
}

fn abc_function() -> ast_opal::FunctionDecl {
  func(
    "Main",
    "f",
    vec![
      param("a", named("Int")),
      param("b", named("Int")),
      param_defaulted("c", named("Int"), int(0)),
    ],
    named("Int"),
    expr_body(var("a")),
  )
}

fn first_call_args(body: &ir_opal::IrBody) -> Vec<Register> {
  body_ops(body)
    .iter()
    .find_map(|op| match op {
      Op::CallNamespaceFunction { args, .. } => Some(args.clone()),
      _ => None,
    })
    .expect("call op emitted")
}

fn const_int_reg(body: &ir_opal::IrBody, value: i64) -> Register {
  body_ops(body)
    .iter()
    .find_map(|op| match op {
      Op::LoadConstInt { trgt, value: v } if *v == value => Some(*trgt),
      _ => None,
    })
    .expect("constant loaded")
}

#[test]
fn record_expando_fills_entity_fields_and_defaults() {
  let mut asm = point_assembly();
  asm.register_function(func(
    "Main",
    "mk",
    vec![],
    named("Point"),
    expr_body(ctor(
      named("Point"),
      vec![Arg::spread(record(vec![("x", int(1)), ("y", int(2))]))],
    )),
  ));
  let (ir, diags) = check(&asm);
  assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
  let body = registered_body(&ir, "Main::mk");
  let ctor_args = body_ops(body)
    .iter()
    .find_map(|op| match op {
      Op::ConstructorPrimary { args, .. } => Some(args.len()),
      _ => None,
    })
    .expect("constructor emitted");
  assert_eq!(ctor_args, 3, "x, y, and defaulted z");
}

#[test]
fn record_expando_missing_required_field_is_an_error() {
  let mut asm = point_assembly();
  asm.register_function(func(
    "Main",
    "mk",
    vec![],
    named("Point"),
    expr_body(ctor(
      named("Point"),
      vec![Arg::spread(record(vec![("x", int(1))]))],
    )),
  ));
  let (_, diags) = check(&asm);
  assert!(has_code(&diags, "OP0004"));
  assert!(message_containing(&diags, "y"));
}

#[test]
fn tuple_spread_binds_positionally_and_defaults_the_tail() {
  let mut asm = new_assembly();
  asm.register_function(abc_function());
  asm.register_function(func(
    "Main",
    "g",
    vec![],
    named("Int"),
    expr_body(call_fn(
      "Main",
      "f",
      vec![Arg::spread(tuple(vec![int(1), int(2)]))],
    )),
  ));
  let (ir, diags) = check(&asm);
  assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
  let body = registered_body(&ir, "Main::g");
  assert_eq!(first_call_args(body).len(), 3, "a=1, b=2, defaulted c");
}

#[test]
fn tuple_spread_missing_required_is_an_error() {
  let mut asm = new_assembly();
  asm.register_function(abc_function());
  asm.register_function(func(
    "Main",
    "g",
    vec![],
    named("Int"),
    expr_body(call_fn("Main", "f", vec![Arg::spread(tuple(vec![int(1)]))])),
  ));
  let (_, diags) = check(&asm);
  assert!(has_code(&diags, "OP0004"));
  assert!(message_containing(&diags, "b"));
}

#[test]
fn named_argument_permutation_keeps_slot_assignment() {
  for flipped in [false, true] {
    let mut asm = new_assembly();
    asm.register_function(abc_function());
    let args = if flipped {
      vec![Arg::named("b", int(2)), Arg::named("a", int(1))]
    } else {
      vec![Arg::named("a", int(1)), Arg::named("b", int(2))]
    };
    asm.register_function(func(
      "Main",
      "g",
      vec![],
      named("Int"),
      expr_body(call_fn("Main", "f", args)),
    ));
    let (ir, diags) = check(&asm);
    assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
    let body = registered_body(&ir, "Main::g");
    let call_args = first_call_args(body);
    assert_eq!(call_args[0], const_int_reg(body, 1), "slot a holds 1");
    assert_eq!(call_args[1], const_int_reg(body, 2), "slot b holds 2");
  }
}

#[test]
fn duplicate_named_argument_is_an_error() {
  let mut asm = new_assembly();
  asm.register_function(abc_function());
  asm.register_function(func(
    "Main",
    "g",
    vec![],
    named("Int"),
    expr_body(call_fn(
      "Main",
      "f",
      vec![
        Arg::named("a", int(1)),
        Arg::named("a", int(2)),
        Arg::named("b", int(3)),
      ],
    )),
  ));
  let (_, diags) = check(&asm);
  assert!(has_code(&diags, "OP0003"));
}

#[test]
fn unknown_named_argument_is_an_error() {
  let mut asm = new_assembly();
  asm.register_function(abc_function());
  asm.register_function(func(
    "Main",
    "g",
    vec![],
    named("Int"),
    expr_body(call_fn(
      "Main",
      "f",
      vec![Arg::named("a", int(1)), Arg::named("nope", int(2))],
    )),
  ));
  let (_, diags) = check(&asm);
  assert!(has_code(&diags, "OP0002"));
}

#[test]
fn argument_type_mismatch_is_an_error() {
  let mut asm = new_assembly();
  asm.register_function(abc_function());
  asm.register_function(func(
    "Main",
    "g",
    vec![],
    named("Int"),
    expr_body(call_fn(
      "Main",
      "f",
      vec![Arg::plain(boolean(true)), Arg::plain(int(2))],
    )),
  ));
  let (_, diags) = check(&asm);
  assert!(has_code(&diags, "OP0001"));
}

#[test]
fn too_many_positional_arguments_is_an_error() {
  let mut asm = new_assembly();
  asm.register_function(abc_function());
  asm.register_function(func(
    "Main",
    "g",
    vec![],
    named("Int"),
    expr_body(call_fn(
      "Main",
      "f",
      vec![
        Arg::plain(int(1)),
        Arg::plain(int(2)),
        Arg::plain(int(3)),
        Arg::plain(int(4)),
      ],
    )),
  ));
  let (_, diags) = check(&asm);
  assert!(has_code(&diags, "OP0001"));
}

#[test]
fn collection_constructor_selects_singleton_opcode() {
  let mut asm = new_assembly();
  asm.register_function(func(
    "Main",
    "mk",
    vec![],
    named_with("List", vec![named("Int")]),
    expr_body(ctor(
      named_with("List", vec![named("Int")]),
      vec![Arg::plain(int(1)), Arg::plain(int(2))],
    )),
  ));
  let (ir, diags) = check(&asm);
  assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
  let body = registered_body(&ir, "Main::mk");
  assert!(body_ops(body)
    .iter()
    .any(|op| matches!(op, Op::ConstructorPrimaryCollectionSingletons { .. })));
}

#[test]
fn collection_constructor_rejects_named_arguments() {
  let mut asm = new_assembly();
  asm.register_function(func(
    "Main",
    "mk",
    vec![],
    named_with("List", vec![named("Int")]),
    expr_body(ctor(
      named_with("List", vec![named("Int")]),
      vec![Arg::named("x", int(1))],
    )),
  ));
  let (_, diags) = check(&asm);
  assert!(has_code(&diags, "OP0016"));
}

#[test]
fn empty_tuple_constructs_arity_zero() {
  let mut asm = new_assembly();
  asm.register_function(func(
    "Main",
    "unit",
    vec![],
    tuple_sig(vec![], false),
    expr_body(tuple(vec![])),
  ));
  let (ir, diags) = check(&asm);
  assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
  let body = registered_body(&ir, "Main::unit");
  assert!(body_ops(body)
    .iter()
    .any(|op| matches!(op, Op::ConstructorTuple { args, .. } if args.is_empty())));
}
