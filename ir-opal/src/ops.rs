//! Opcode set for the straight-line IR.
//!
//! Every value-producing op writes a target register. Jump ops are block
//! terminators; the emitter treats anything after one in the same block as
//! unreachable output and the checker never produces that shape.

use ast_opal::{ArithOp, CmpOp, PrefixOp};
use std::fmt;

use types_opal::{NameId, TypeId};

/// A virtual register. Fresh temporaries are handed out sequentially by the
/// body emitter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Register(pub u32);

/// Identifier for a basic block inside one body.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct BlockId(pub u32);

#[derive(Clone, Debug, PartialEq)]
pub enum Op {
  LoadConstNone {
    trgt: Register,
  },
  LoadConstBool {
    trgt: Register,
    value: bool,
  },
  LoadConstInt {
    trgt: Register,
    value: i64,
  },
  LoadConstString {
    trgt: Register,
    value: String,
  },
  LoadConstTypedString {
    trgt: Register,
    value: String,
    ty: TypeId,
  },
  LoadTupleIndex {
    trgt: Register,
    src: Register,
    index: usize,
  },
  LoadProperty {
    trgt: Register,
    src: Register,
    name: NameId,
  },
  LoadField {
    trgt: Register,
    src: Register,
    field_key: String,
  },
  AccessNamespaceConst {
    trgt: Register,
    const_key: String,
  },
  AccessConst {
    trgt: Register,
    const_key: String,
  },
  AccessLocal {
    trgt: Register,
    name: String,
  },
  AccessArg {
    trgt: Register,
    name: String,
  },
  AccessCaptured {
    trgt: Register,
    name: String,
  },
  ConstructorTuple {
    trgt: Register,
    args: Vec<Register>,
  },
  ConstructorRecord {
    trgt: Register,
    entries: Vec<(NameId, Register)>,
  },
  ConstructorLambda {
    trgt: Register,
    lambda_key: String,
    captured: Vec<(String, Register)>,
  },
  ConstructorPrimary {
    trgt: Register,
    type_key: String,
    args: Vec<Register>,
  },
  ConstructorPrimaryCollectionEmpty {
    trgt: Register,
    type_key: String,
  },
  ConstructorPrimaryCollectionSingletons {
    trgt: Register,
    type_key: String,
    args: Vec<Register>,
  },
  ConstructorPrimaryCollectionCopies {
    trgt: Register,
    type_key: String,
    args: Vec<Register>,
  },
  ConstructorPrimaryCollectionMixed {
    trgt: Register,
    type_key: String,
    /// `(is_copy, value)` per argument, preserving call order.
    args: Vec<(bool, Register)>,
  },
  CallNamespaceFunction {
    trgt: Register,
    func_key: String,
    args: Vec<Register>,
  },
  CallStaticFunction {
    trgt: Register,
    func_key: String,
    args: Vec<Register>,
  },
  CallLambda {
    trgt: Register,
    func: Register,
    args: Vec<Register>,
  },
  CallKnownTarget {
    trgt: Register,
    method_key: String,
    this: Register,
    args: Vec<Register>,
  },
  CallVirtualTarget {
    trgt: Register,
    vmethod_key: String,
    this: Register,
    args: Vec<Register>,
  },
  ProjectTupleIndices {
    trgt: Register,
    src: Register,
    indices: Vec<usize>,
  },
  ProjectRecordNames {
    trgt: Register,
    src: Register,
    names: Vec<NameId>,
  },
  ProjectType {
    trgt: Register,
    src: Register,
    ty: TypeId,
  },
  ModifyWithIndices {
    trgt: Register,
    src: Register,
    updates: Vec<(usize, Register)>,
  },
  ModifyWithNames {
    trgt: Register,
    src: Register,
    updates: Vec<(NameId, Register)>,
  },
  StructuredExtendTuple {
    trgt: Register,
    src: Register,
    ext: Register,
  },
  StructuredExtendRecord {
    trgt: Register,
    src: Register,
    ext: Register,
  },
  StructuredExtendObject {
    trgt: Register,
    src: Register,
    ext: Register,
  },
  PrefixOp {
    trgt: Register,
    op: PrefixOp,
    arg: Register,
  },
  BinOp {
    trgt: Register,
    op: ArithOp,
    lhs: Register,
    rhs: Register,
  },
  BinEq {
    trgt: Register,
    negated: bool,
    lhs: Register,
    rhs: Register,
  },
  BinCmp {
    trgt: Register,
    op: CmpOp,
    lhs: Register,
    rhs: Register,
  },
  /// Convert a `Bool | None` value to `Bool`, treating `None` as false.
  TruthyConversion {
    trgt: Register,
    src: Register,
  },
  RegAssign {
    trgt: Register,
    src: Register,
  },
  ReturnAssign {
    src: Register,
  },
  Assert {
    src: Register,
  },
  Check {
    src: Register,
  },
  LocalLifetimeStart {
    name: String,
    ty: TypeId,
  },
  LocalLifetimeEnd {
    name: String,
  },
  BoolJump {
    src: Register,
    true_block: BlockId,
    false_block: BlockId,
  },
  NoneJump {
    src: Register,
    none_block: BlockId,
    some_block: BlockId,
  },
  DirectJump {
    target: BlockId,
  },
}

impl Op {
  /// Successor blocks when this op terminates a block.
  pub fn jump_targets(&self) -> Vec<BlockId> {
    match self {
      Op::BoolJump {
        true_block,
        false_block,
        ..
      } => vec![*true_block, *false_block],
      Op::NoneJump {
        none_block,
        some_block,
        ..
      } => vec![*none_block, *some_block],
      Op::DirectJump { target } => vec![*target],
      _ => Vec::new(),
    }
  }

  pub fn is_jump(&self) -> bool {
    matches!(
      self,
      Op::BoolJump { .. } | Op::NoneJump { .. } | Op::DirectJump { .. }
    )
  }
}

impl fmt::Display for Register {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "%{}", self.0)
  }
}

impl fmt::Display for BlockId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "b{}", self.0)
  }
}
