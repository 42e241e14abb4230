//! Expression forms.

use diagnostics::TextRange;

use crate::sig::TypeSig;
use crate::stmt::Body;

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
  pub span: TextRange,
  pub kind: ExprKind,
}

impl Expression {
  pub fn new(span: TextRange, kind: ExprKind) -> Self {
    Self { span, kind }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
  LiteralNone,
  LiteralBool(bool),
  LiteralInt(i64),
  LiteralString(String),
  /// `T'...'` (literal form) or `T@'...'` (constructor form calling
  /// `T::tryParse`).
  LiteralTypedString {
    sig: TypeSig,
    value: String,
    constructor: bool,
  },
  AccessVariable {
    name: String,
  },
  AccessNamespaceConst {
    ns: String,
    name: String,
  },
  AccessStaticConst {
    sig: TypeSig,
    name: String,
  },
  ConstructorTuple {
    args: Vec<Expression>,
  },
  ConstructorRecord {
    entries: Vec<RecordEntryInit>,
  },
  /// `T@{...}` primary constructor, or `T@factory{...}` which routes the
  /// arguments through the named factory static first.
  ConstructorPrimary {
    sig: TypeSig,
    factory: Option<String>,
    args: Vec<Arg>,
  },
  ConstructorLambda(Box<LambdaDecl>),
  CallNamespaceFunction {
    ns: String,
    name: String,
    terms: Vec<TypeSig>,
    args: Vec<Arg>,
  },
  CallStaticFunction {
    sig: TypeSig,
    name: String,
    terms: Vec<TypeSig>,
    args: Vec<Arg>,
  },
  PrefixOp {
    op: PrefixOp,
    arg: Box<Expression>,
  },
  BinArith {
    op: ArithOp,
    lhs: Box<Expression>,
    rhs: Box<Expression>,
  },
  BinEq {
    negated: bool,
    lhs: Box<Expression>,
    rhs: Box<Expression>,
  },
  BinCmp {
    op: CmpOp,
    lhs: Box<Expression>,
    rhs: Box<Expression>,
  },
  BinLogic {
    op: LogicOp,
    lhs: Box<Expression>,
    rhs: Box<Expression>,
  },
  /// `a ?& b`: `None` when the left side is `None`, else the right side.
  NoneCheck {
    lhs: Box<Expression>,
    rhs: Box<Expression>,
  },
  /// `a ?| b`: the left side when it is not `None`, else the right side.
  Coalesce {
    lhs: Box<Expression>,
    rhs: Box<Expression>,
  },
  Select {
    test: Box<Expression>,
    if_true: Box<Expression>,
    if_false: Box<Expression>,
  },
  Postfix {
    root: Box<Expression>,
    ops: Vec<PostfixOp>,
  },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordEntryInit {
  pub name: String,
  pub value: Expression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
  Plus,
  Negate,
  Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
  Add,
  Sub,
  Mul,
  Div,
  Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
  Lt,
  LtEq,
  Gt,
  GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
  And,
  Or,
  Imply,
}

/// A call-site argument with its passing modifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
  pub span: TextRange,
  pub modifier: ArgModifier,
  pub value: Expression,
}

impl Arg {
  pub fn plain(value: Expression) -> Self {
    Self {
      span: value.span,
      modifier: ArgModifier::Plain,
      value,
    }
  }

  pub fn named(name: impl Into<String>, value: Expression) -> Self {
    Self {
      span: value.span,
      modifier: ArgModifier::Named(name.into()),
      value,
    }
  }

  pub fn spread(value: Expression) -> Self {
    Self {
      span: value.span,
      modifier: ArgModifier::Spread,
      value,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgModifier {
  Plain,
  Named(String),
  Spread,
}

/// One step of a postfix chain. `is_elvis` marks the `?.` form that
/// short-circuits the rest of the chain to `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct PostfixOp {
  pub span: TextRange,
  pub is_elvis: bool,
  pub kind: PostfixOpKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PostfixOpKind {
  AccessIndex(i64),
  AccessName(String),
  ProjectIndices(Vec<i64>),
  ProjectNames(Vec<String>),
  ProjectType(TypeSig),
  ModifyIndices(Vec<(i64, Expression)>),
  ModifyNames(Vec<(String, Expression)>),
  /// `.extend(e)`: append a tuple or merge a record into the base.
  Extend(Box<Expression>),
  Invoke {
    name: String,
    terms: Vec<TypeSig>,
    args: Vec<Arg>,
  },
  CallLambda {
    args: Vec<Arg>,
  },
}

/// A lambda literal. The capture set is computed during parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaDecl {
  pub span: TextRange,
  pub params: Vec<LambdaParam>,
  pub result: TypeSig,
  pub captured: Vec<String>,
  pub body: Body,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LambdaParam {
  pub name: String,
  pub sig: TypeSig,
  pub optional: bool,
}
