//! Unresolved type signatures as written in source.

use diagnostics::TextRange;

/// A type annotation before resolution against an assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSig {
  pub span: TextRange,
  pub kind: TypeSigKind,
}

impl TypeSig {
  pub fn new(span: TextRange, kind: TypeSigKind) -> Self {
    Self { span, kind }
  }

  /// Signature for an omitted annotation that must be inferred.
  pub fn auto(span: TextRange) -> Self {
    Self {
      span,
      kind: TypeSigKind::Auto,
    }
  }

  pub fn is_auto(&self) -> bool {
    matches!(self.kind, TypeSigKind::Auto)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeSigKind {
  /// A (possibly `Ns::`-qualified) nominal or template-parameter name with
  /// optional template arguments.
  Named { name: String, terms: Vec<TypeSig> },
  Tuple {
    entries: Vec<TupleSigEntry>,
    open: bool,
  },
  Record {
    entries: Vec<RecordSigEntry>,
    open: bool,
  },
  Union(Vec<TypeSig>),
  /// Conjunction of concept references (`C & D`).
  Conj(Vec<TypeSig>),
  Function {
    params: Vec<ParamSig>,
    rest: Option<Box<TypeSig>>,
    result: Box<TypeSig>,
  },
  /// Placeholder for an annotation the checker must infer from context.
  Auto,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TupleSigEntry {
  pub sig: TypeSig,
  pub optional: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordSigEntry {
  pub name: String,
  pub sig: TypeSig,
  pub optional: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSig {
  pub name: String,
  pub sig: TypeSig,
  pub optional: bool,
}
