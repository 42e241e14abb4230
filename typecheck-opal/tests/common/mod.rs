#![allow(dead_code)]

use std::sync::Arc;

use ast_opal::{
  Arg, BlockStatement, Body, BodyKind, CondBranch, ExprKind, Expression, FieldDecl, FunctionDecl,
  MethodDecl, OoDecl, OoDeclKind, ParamDecl, PostfixOp, PostfixOpKind, RecordEntryInit,
  RecordSigEntry, SpecialDeclKind, Statement, StmtKind, TupleSigEntry, TypeSig, TypeSigKind,
};
use diagnostics::{Diagnostic, FileId, TextRange};
use ir_opal::{IrAssembly, IrBody, Op};
use types_opal::{Assembly, TypeStore};

pub const FILE: FileId = FileId(0);

pub fn sp() -> TextRange {
  TextRange::empty(0)
}

// Signature builders.

pub fn named(name: &str) -> TypeSig {
  TypeSig::new(
    sp(),
    TypeSigKind::Named {
      name: name.to_string(),
      terms: Vec::new(),
    },
  )
}

pub fn named_with(name: &str, terms: Vec<TypeSig>) -> TypeSig {
  TypeSig::new(
    sp(),
    TypeSigKind::Named {
      name: name.to_string(),
      terms,
    },
  )
}

pub fn auto() -> TypeSig {
  TypeSig::auto(sp())
}

pub fn union_sig(options: Vec<TypeSig>) -> TypeSig {
  TypeSig::new(sp(), TypeSigKind::Union(options))
}

pub fn tuple_sig(entries: Vec<(TypeSig, bool)>, open: bool) -> TypeSig {
  TypeSig::new(
    sp(),
    TypeSigKind::Tuple {
      entries: entries
        .into_iter()
        .map(|(sig, optional)| TupleSigEntry { sig, optional })
        .collect(),
      open,
    },
  )
}

pub fn record_sig(entries: Vec<(&str, TypeSig, bool)>, open: bool) -> TypeSig {
  TypeSig::new(
    sp(),
    TypeSigKind::Record {
      entries: entries
        .into_iter()
        .map(|(name, sig, optional)| RecordSigEntry {
          name: name.to_string(),
          sig,
          optional,
        })
        .collect(),
      open,
    },
  )
}

// Expression builders.

pub fn e(kind: ExprKind) -> Expression {
  Expression::new(sp(), kind)
}

pub fn int(value: i64) -> Expression {
  e(ExprKind::LiteralInt(value))
}

pub fn boolean(value: bool) -> Expression {
  e(ExprKind::LiteralBool(value))
}

pub fn none() -> Expression {
  e(ExprKind::LiteralNone)
}

pub fn string(value: &str) -> Expression {
  e(ExprKind::LiteralString(value.to_string()))
}

pub fn var(name: &str) -> Expression {
  e(ExprKind::AccessVariable {
    name: name.to_string(),
  })
}

pub fn tuple(args: Vec<Expression>) -> Expression {
  e(ExprKind::ConstructorTuple { args })
}

pub fn record(entries: Vec<(&str, Expression)>) -> Expression {
  e(ExprKind::ConstructorRecord {
    entries: entries
      .into_iter()
      .map(|(name, value)| RecordEntryInit {
        name: name.to_string(),
        value,
      })
      .collect(),
  })
}

pub fn add(lhs: Expression, rhs: Expression) -> Expression {
  e(ExprKind::BinArith {
    op: ast_opal::ArithOp::Add,
    lhs: Box::new(lhs),
    rhs: Box::new(rhs),
  })
}

pub fn eq(lhs: Expression, rhs: Expression) -> Expression {
  e(ExprKind::BinEq {
    negated: false,
    lhs: Box::new(lhs),
    rhs: Box::new(rhs),
  })
}

pub fn coalesce(lhs: Expression, rhs: Expression) -> Expression {
  e(ExprKind::Coalesce {
    lhs: Box::new(lhs),
    rhs: Box::new(rhs),
  })
}

pub fn nonecheck(lhs: Expression, rhs: Expression) -> Expression {
  e(ExprKind::NoneCheck {
    lhs: Box::new(lhs),
    rhs: Box::new(rhs),
  })
}

pub fn logic(op: ast_opal::LogicOp, lhs: Expression, rhs: Expression) -> Expression {
  e(ExprKind::BinLogic {
    op,
    lhs: Box::new(lhs),
    rhs: Box::new(rhs),
  })
}

pub fn postfix(root: Expression, ops: Vec<PostfixOp>) -> Expression {
  e(ExprKind::Postfix {
    root: Box::new(root),
    ops,
  })
}

pub fn op(kind: PostfixOpKind) -> PostfixOp {
  PostfixOp {
    span: sp(),
    is_elvis: false,
    kind,
  }
}

pub fn elvis(kind: PostfixOpKind) -> PostfixOp {
  PostfixOp {
    span: sp(),
    is_elvis: true,
    kind,
  }
}

pub fn invoke(name: &str, terms: Vec<TypeSig>, args: Vec<Arg>) -> PostfixOpKind {
  PostfixOpKind::Invoke {
    name: name.to_string(),
    terms,
    args,
  }
}

pub fn ctor(sig: TypeSig, args: Vec<Arg>) -> Expression {
  e(ExprKind::ConstructorPrimary {
    sig,
    factory: None,
    args,
  })
}

pub fn call_fn(ns: &str, name: &str, args: Vec<Arg>) -> Expression {
  e(ExprKind::CallNamespaceFunction {
    ns: ns.to_string(),
    name: name.to_string(),
    terms: Vec::new(),
    args,
  })
}

// Statement and body builders.

pub fn s(kind: StmtKind) -> Statement {
  Statement::new(sp(), kind)
}

pub fn let_var(name: &str, sig: TypeSig, init: Expression) -> Statement {
  s(StmtKind::VarDecl {
    name: name.to_string(),
    is_const: false,
    sig,
    init: Some(init),
  })
}

pub fn ret(value: Expression) -> Statement {
  s(StmtKind::Return(value))
}

pub fn if_else(cond: Expression, then: Vec<Statement>, els: Vec<Statement>) -> Statement {
  s(StmtKind::If {
    branches: vec![CondBranch {
      cond,
      block: block(then),
    }],
    else_block: Some(block(els)),
  })
}

pub fn block(stmts: Vec<Statement>) -> BlockStatement {
  BlockStatement { span: sp(), stmts }
}

pub fn expr_body(value: Expression) -> Body {
  Body {
    file: FILE,
    span: sp(),
    kind: BodyKind::Expression(Box::new(value)),
  }
}

pub fn block_body(stmts: Vec<Statement>) -> Body {
  Body {
    file: FILE,
    span: sp(),
    kind: BodyKind::Block(block(stmts)),
  }
}

// Declaration builders.

pub fn param(name: &str, sig: TypeSig) -> ParamDecl {
  ParamDecl {
    span: sp(),
    name: name.to_string(),
    sig,
    optional: false,
    default: None,
  }
}

pub fn param_defaulted(name: &str, sig: TypeSig, default: Expression) -> ParamDecl {
  ParamDecl {
    span: sp(),
    name: name.to_string(),
    sig,
    optional: false,
    default: Some(default),
  }
}

pub fn func(ns: &str, name: &str, params: Vec<ParamDecl>, result: TypeSig, body: Body) -> FunctionDecl {
  FunctionDecl {
    file: FILE,
    span: sp(),
    ns: ns.to_string(),
    name: name.to_string(),
    type_params: Vec::new(),
    params,
    rest: None,
    result,
    preconds: Vec::new(),
    postconds: Vec::new(),
    body,
  }
}

pub fn field(name: &str, sig: TypeSig, default: Option<Expression>) -> FieldDecl {
  FieldDecl {
    span: sp(),
    name: name.to_string(),
    sig,
    default,
  }
}

pub fn entity(ns: &str, name: &str, fields: Vec<FieldDecl>) -> OoDecl {
  OoDecl {
    file: FILE,
    span: sp(),
    ns: ns.to_string(),
    name: name.to_string(),
    kind: OoDeclKind::Entity,
    special: SpecialDeclKind::Normal,
    attributes: Vec::new(),
    type_params: Vec::new(),
    provides: Vec::new(),
    fields,
    methods: Vec::new(),
    statics: Vec::new(),
    consts: Vec::new(),
    invariants: Vec::new(),
  }
}

pub fn concept(ns: &str, name: &str, methods: Vec<MethodDecl>) -> OoDecl {
  OoDecl {
    file: FILE,
    span: sp(),
    ns: ns.to_string(),
    name: name.to_string(),
    kind: OoDeclKind::Concept,
    special: SpecialDeclKind::Normal,
    attributes: Vec::new(),
    type_params: Vec::new(),
    provides: Vec::new(),
    fields: Vec::new(),
    methods,
    statics: Vec::new(),
    consts: Vec::new(),
    invariants: Vec::new(),
  }
}

pub fn method(name: &str, params: Vec<ParamDecl>, result: TypeSig, body: Option<Body>) -> MethodDecl {
  MethodDecl {
    file: FILE,
    span: sp(),
    name: name.to_string(),
    attributes: Vec::new(),
    type_params: Vec::new(),
    params,
    rest: None,
    result,
    preconds: Vec::new(),
    postconds: Vec::new(),
    body,
  }
}

// Session helpers.

pub fn new_assembly() -> Assembly {
  Assembly::new(TypeStore::new())
}

pub fn check(asm: &Assembly) -> (IrAssembly, Vec<Diagnostic>) {
  typecheck_opal::check_assembly(asm)
}

pub fn has_code(diags: &[Diagnostic], code: &str) -> bool {
  diags.iter().any(|d| d.code == code)
}

pub fn message_containing(diags: &[Diagnostic], needle: &str) -> bool {
  diags.iter().any(|d| d.message.contains(needle))
}

pub fn body_ops(body: &IrBody) -> Vec<&Op> {
  body.blocks.iter().flat_map(|b| b.ops.iter()).collect()
}

pub fn registered_body<'a>(ir: &'a IrAssembly, key: &str) -> &'a IrBody {
  ir.body(key)
    .unwrap_or_else(|| panic!("body `{}` was not registered", key))
}

pub fn store_of(asm: &Assembly) -> &Arc<TypeStore> {
  asm.store()
}
