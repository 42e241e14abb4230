//! Declaration surface fed to the checker by the resolver.

use diagnostics::{FileId, TextRange};

use crate::expr::Expression;
use crate::sig::TypeSig;
use crate::stmt::Body;

/// A template parameter with an optional subtype bound. `unique` requires the
/// bound template argument to resolve to a single-atom type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeParamDecl {
  pub name: String,
  pub bound: Option<TypeSig>,
  pub unique: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
  pub span: TextRange,
  pub name: String,
  pub sig: TypeSig,
  pub optional: bool,
  pub default: Option<Expression>,
}

/// A rest parameter. Its signature must resolve to a collection entity.
#[derive(Debug, Clone, PartialEq)]
pub struct RestParamDecl {
  pub name: String,
  pub sig: TypeSig,
}

/// A namespace-level function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
  pub file: FileId,
  pub span: TextRange,
  pub ns: String,
  pub name: String,
  pub type_params: Vec<TypeParamDecl>,
  pub params: Vec<ParamDecl>,
  pub rest: Option<RestParamDecl>,
  pub result: TypeSig,
  pub preconds: Vec<Expression>,
  pub postconds: Vec<Expression>,
  pub body: Body,
}

/// A method on an entity or concept declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
  pub file: FileId,
  pub span: TextRange,
  pub name: String,
  pub attributes: Vec<String>,
  pub type_params: Vec<TypeParamDecl>,
  pub params: Vec<ParamDecl>,
  pub rest: Option<RestParamDecl>,
  pub result: TypeSig,
  pub preconds: Vec<Expression>,
  pub postconds: Vec<Expression>,
  /// Absent for abstract methods.
  pub body: Option<Body>,
}

impl MethodDecl {
  pub fn is_abstract(&self) -> bool {
    self.body.is_none()
  }

  pub fn is_override(&self) -> bool {
    self.attributes.iter().any(|a| a == "override")
  }
}

/// A static function on an entity or concept declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticFnDecl {
  pub file: FileId,
  pub span: TextRange,
  pub name: String,
  pub attributes: Vec<String>,
  pub type_params: Vec<TypeParamDecl>,
  pub params: Vec<ParamDecl>,
  pub rest: Option<RestParamDecl>,
  pub result: TypeSig,
  pub body: Body,
}

impl StaticFnDecl {
  pub fn is_factory(&self) -> bool {
    self.attributes.iter().any(|a| a == "factory")
  }
}

/// A constant: namespace-level or static on a type.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstDecl {
  pub file: FileId,
  pub span: TextRange,
  pub name: String,
  pub sig: TypeSig,
  pub value: Expression,
}

/// A namespace-level global with a computed initializer.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDecl {
  pub file: FileId,
  pub span: TextRange,
  pub name: String,
  pub sig: TypeSig,
  pub value: Expression,
}

/// A type invariant checked against `this`.
#[derive(Debug, Clone, PartialEq)]
pub struct InvariantDecl {
  pub file: FileId,
  pub span: TextRange,
  pub exp: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
  pub span: TextRange,
  pub name: String,
  pub sig: TypeSig,
  pub default: Option<Expression>,
}

/// Entity vs concept, plus the core special behaviors the checker keys on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OoDeclKind {
  Entity,
  Concept,
}

/// Special treatment for core declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialDeclKind {
  Normal,
  Enum,
  /// Collection entity whose element type is its first template argument.
  List,
  /// Map entity whose element type is `[K, V]`.
  Map,
}

/// An entity or concept declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct OoDecl {
  pub file: FileId,
  pub span: TextRange,
  pub ns: String,
  pub name: String,
  pub kind: OoDeclKind,
  pub special: SpecialDeclKind,
  pub attributes: Vec<String>,
  pub type_params: Vec<TypeParamDecl>,
  pub provides: Vec<TypeSig>,
  pub fields: Vec<FieldDecl>,
  pub methods: Vec<MethodDecl>,
  pub statics: Vec<StaticFnDecl>,
  pub consts: Vec<ConstDecl>,
  pub invariants: Vec<InvariantDecl>,
}
