//! Registration service collecting everything the checker discovers: type
//! instantiations, call targets, compiled bodies, lambdas, and pending
//! global/const initializers. Keys are stable display strings so output is
//! independent of traversal order.

use std::collections::{BTreeMap, BTreeSet};

use diagnostics::TextRange;
use types_opal::{Assembly, TermMap, TypeDisplay, TypeId};

use crate::emitter::IrBody;

/// A compiled lambda registered under its globally unique key.
#[derive(Clone, Debug, PartialEq)]
pub struct LambdaIr {
  pub key: String,
  pub captured: Vec<String>,
  pub body: IrBody,
}

#[derive(Debug, Default)]
pub struct IrAssembly {
  type_instantiations: BTreeSet<TypeId>,
  type_references: BTreeSet<TypeId>,
  function_calls: BTreeSet<String>,
  static_calls: BTreeSet<String>,
  method_calls: BTreeSet<String>,
  virtual_method_calls: BTreeSet<String>,
  lambdas: BTreeMap<String, LambdaIr>,
  pending_globals: Vec<String>,
  pending_consts: Vec<String>,
  bodies: BTreeMap<String, IrBody>,
}

impl IrAssembly {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register_type_instantiation(&mut self, ty: TypeId) {
    self.type_instantiations.insert(ty);
  }

  pub fn register_resolved_type_reference(&mut self, ty: TypeId) {
    self.type_references.insert(ty);
  }

  pub fn register_function_call(&mut self, key: impl Into<String>) {
    self.function_calls.insert(key.into());
  }

  pub fn register_static_call(&mut self, key: impl Into<String>) {
    self.static_calls.insert(key.into());
  }

  pub fn register_method_call(&mut self, key: impl Into<String>) {
    self.method_calls.insert(key.into());
  }

  pub fn register_virtual_method_call(&mut self, key: impl Into<String>) {
    self.virtual_method_calls.insert(key.into());
  }

  pub fn register_lambda(&mut self, lambda: LambdaIr) {
    self.lambdas.insert(lambda.key.clone(), lambda);
  }

  pub fn register_pending_global_processing(&mut self, key: impl Into<String>) {
    let key = key.into();
    if !self.pending_globals.contains(&key) {
      self.pending_globals.push(key);
    }
  }

  pub fn register_pending_const_processing(&mut self, key: impl Into<String>) {
    let key = key.into();
    if !self.pending_consts.contains(&key) {
      self.pending_consts.push(key);
    }
  }

  pub fn register_body(&mut self, key: impl Into<String>, body: IrBody) {
    self.bodies.insert(key.into(), body);
  }

  pub fn body(&self, key: &str) -> Option<&IrBody> {
    self.bodies.get(key)
  }

  pub fn bodies(&self) -> impl Iterator<Item = (&String, &IrBody)> {
    self.bodies.iter()
  }

  pub fn lambda(&self, key: &str) -> Option<&LambdaIr> {
    self.lambdas.get(key)
  }

  pub fn lambdas(&self) -> impl Iterator<Item = &LambdaIr> {
    self.lambdas.values()
  }

  pub fn function_calls(&self) -> impl Iterator<Item = &String> {
    self.function_calls.iter()
  }

  pub fn virtual_method_calls(&self) -> impl Iterator<Item = &String> {
    self.virtual_method_calls.iter()
  }

  pub fn take_pending_globals(&mut self) -> Vec<String> {
    std::mem::take(&mut self.pending_globals)
  }

  pub fn take_pending_consts(&mut self) -> Vec<String> {
    std::mem::take(&mut self.pending_consts)
  }
}

/// Key builders. All compiled artifacts are addressed by these strings.
impl IrAssembly {
  pub fn type_key(asm: &Assembly, ty: TypeId) -> String {
    TypeDisplay::new(asm, ty).to_string()
  }

  pub fn function_key(ns: &str, name: &str) -> String {
    format!("{}::{}", ns, name)
  }

  pub fn static_key(type_key: &str, name: &str) -> String {
    format!("{}::{}", type_key, name)
  }

  pub fn method_key(type_key: &str, name: &str) -> String {
    format!("{}.{}", type_key, name)
  }

  pub fn virtual_method_key(root_type_key: &str, name: &str) -> String {
    format!("virtual:{}.{}", root_type_key, name)
  }

  pub fn field_key(type_key: &str, name: &str) -> String {
    format!("{}${}", type_key, name)
  }

  pub fn global_key(ns: &str, name: &str) -> String {
    format!("global:{}::{}", ns, name)
  }

  pub fn const_key(owner_key: &str, name: &str) -> String {
    format!("const:{}::{}", owner_key, name)
  }

  /// Fingerprint of the active template bindings, sorted by name.
  pub fn binds_fingerprint(asm: &Assembly, terms: &TermMap) -> String {
    let mut parts: Vec<String> = terms
      .iter()
      .map(|(name, ty)| format!("{}={}", name, TypeDisplay::new(asm, *ty)))
      .collect();
    parts.sort();
    parts.join(";")
  }

  /// Lambda keys combine the enclosing member key, the source position of the
  /// literal, and the bind fingerprint so distinct instantiations never
  /// collide.
  pub fn lambda_key(enclosing: &str, span: TextRange, fingerprint: &str) -> String {
    format!("{}$lambda@{}..{}[{}]", enclosing, span.start, span.end, fingerprint)
  }
}
