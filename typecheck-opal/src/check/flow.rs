//! Flow-sensitive environments for per-body analysis.
//!
//! An [`Env`] is an immutable-by-convention value: every split clones and
//! every merge is the explicit [`Env::join`]. A multi-flow is a non-empty
//! `Vec<Env>` whose members represent alternative post-states of the same
//! program point.

use std::sync::Arc;

use ahash::AHashMap;
use types_opal::{Assembly, TermMap, TypeId};

/// Statically known truthiness attached to an expression result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Truth {
  True,
  False,
  Unknown,
}

impl Truth {
  pub fn negate(self) -> Truth {
    match self {
      Truth::True => Truth::False,
      Truth::False => Truth::True,
      Truth::Unknown => Truth::Unknown,
    }
  }

  /// May this flow take the truthy path?
  pub fn may_be_true(self) -> bool {
    !matches!(self, Truth::False)
  }

  pub fn may_be_false(self) -> bool {
    !matches!(self, Truth::True)
  }
}

/// Where a variable lives, which selects the access opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarStorage {
  Arg,
  Local,
  Captured,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VarInfo {
  pub declared: TypeId,
  /// Always a subtype of `declared`; narrowing only shrinks.
  pub flow: TypeId,
  pub is_const: bool,
  pub must_defined: bool,
  pub storage: VarStorage,
}

/// The current expression result carried by an environment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExprResult {
  pub ty: TypeId,
  pub truth: Truth,
}

#[derive(Clone, Debug, Default)]
struct Scope {
  vars: AHashMap<String, VarInfo>,
  order: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Env {
  pub terms: Arc<TermMap>,
  scopes: Vec<Scope>,
  pub result: Option<ExprResult>,
  pub reachable: bool,
  pub return_type: Option<TypeId>,
}

impl Env {
  pub fn new(terms: TermMap) -> Env {
    Env {
      terms: Arc::new(terms),
      scopes: vec![Scope::default()],
      result: None,
      reachable: true,
      return_type: None,
    }
  }

  pub fn has_var(&self, name: &str) -> bool {
    self.scopes.iter().any(|scope| scope.vars.contains_key(name))
  }

  pub fn lookup_var(&self, name: &str) -> Option<&VarInfo> {
    self
      .scopes
      .iter()
      .rev()
      .find_map(|scope| scope.vars.get(name))
  }

  /// Bind a new variable in the innermost scope. Shadow checks are the
  /// caller's responsibility (names are unique per body).
  pub fn declare_var(&mut self, name: impl Into<String>, info: VarInfo) {
    let name = name.into();
    let scope = self.scopes.last_mut().expect("environment has a scope");
    scope.order.push(name.clone());
    scope.vars.insert(name, info);
  }

  /// Replace a variable's flow type, leaving the declaration intact.
  pub fn narrow_var(&mut self, name: &str, flow: TypeId) {
    for scope in self.scopes.iter_mut().rev() {
      if let Some(info) = scope.vars.get_mut(name) {
        info.flow = flow;
        return;
      }
    }
  }

  /// Record an assignment: the flow type becomes the assigned type and the
  /// variable is definitely defined afterwards.
  pub fn assign_var(&mut self, name: &str, flow: TypeId) {
    for scope in self.scopes.iter_mut().rev() {
      if let Some(info) = scope.vars.get_mut(name) {
        info.flow = flow;
        info.must_defined = true;
        return;
      }
    }
  }

  pub fn push_scope(&mut self) {
    self.scopes.push(Scope::default());
  }

  /// Pop the innermost scope, returning the declaration order of its names.
  pub fn pop_scope(&mut self) -> Vec<String> {
    self.scopes.pop().map(|scope| scope.order).unwrap_or_default()
  }

  /// All bindings currently in scope, outermost first.
  pub fn vars(&self) -> impl Iterator<Item = (&String, &VarInfo)> {
    self
      .scopes
      .iter()
      .flat_map(|scope| scope.order.iter().map(move |name| (name, &scope.vars[name])))
  }

  /// Names of all block-scoped locals currently live, innermost last.
  pub fn live_locals(&self) -> Vec<String> {
    self
      .scopes
      .iter()
      .skip(1)
      .flat_map(|scope| scope.order.iter().cloned())
      .collect()
  }

  pub fn with_result(mut self, ty: TypeId, truth: Truth) -> Env {
    self.result = Some(ExprResult { ty, truth });
    self
  }

  pub fn clear_result(mut self) -> Env {
    self.result = None;
    self
  }

  pub fn result_type(&self) -> Option<TypeId> {
    self.result.map(|r| r.ty)
  }

  pub fn not_reachable(mut self) -> Env {
    self.reachable = false;
    self
  }

  pub fn add_return(&mut self, ty: TypeId, asm: &Assembly) {
    self.return_type = Some(match self.return_type {
      Some(existing) => asm.store().union(vec![existing, ty]),
      None => ty,
    });
  }

  /// Join alternative post-states of the same program point. Variables keep
  /// their declaration and union their flow types; `must_defined` survives
  /// only when every reaching branch defined the variable; reachability is
  /// the disjunction. Unreachable branches contribute only their return
  /// types.
  pub fn join(flows: Vec<Env>, asm: &Assembly) -> Env {
    assert!(!flows.is_empty(), "joining an empty multi-flow");
    let return_type = flows
      .iter()
      .filter_map(|env| env.return_type)
      .reduce(|a, b| asm.store().union(vec![a, b]));

    let mut live: Vec<&Env> = flows.iter().filter(|env| env.reachable).collect();
    if live.is_empty() {
      let mut out = flows[0].clone();
      out.reachable = false;
      out.return_type = return_type;
      out.result = Self::join_results(&flows, asm);
      return out;
    }
    let result = Self::join_results(&flows, asm);
    let first = live.remove(0);
    let mut out = first.clone();
    for other in live {
      debug_assert_eq!(out.terms.as_ref(), other.terms.as_ref());
      for (scope_idx, scope) in out.scopes.iter_mut().enumerate() {
        let other_scope = &other.scopes[scope_idx];
        scope.order.retain(|name| other_scope.vars.contains_key(name));
        let order = scope.order.clone();
        scope.vars.retain(|name, _| order.contains(name));
        for name in &order {
          let mine = scope.vars.get_mut(name).expect("retained name");
          let theirs = &other_scope.vars[name];
          mine.flow = asm.store().union(vec![mine.flow, theirs.flow]);
          mine.must_defined = mine.must_defined && theirs.must_defined;
        }
      }
    }
    out.result = result;
    out.reachable = true;
    out.return_type = return_type;
    out
  }

  fn join_results(flows: &[Env], asm: &Assembly) -> Option<ExprResult> {
    let mut results = flows.iter().filter(|env| env.reachable).map(|env| env.result);
    let first = results.next()??;
    let mut ty = first.ty;
    let mut truth = first.truth;
    for result in results {
      let result = result?;
      ty = asm.store().union(vec![ty, result.ty]);
      if result.truth != truth {
        truth = Truth::Unknown;
      }
    }
    Some(ExprResult { ty, truth })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use types_opal::TypeStore;

  fn test_asm() -> Assembly {
    Assembly::new(TypeStore::new())
  }

  fn var(declared: TypeId) -> VarInfo {
    VarInfo {
      declared,
      flow: declared,
      is_const: false,
      must_defined: true,
      storage: VarStorage::Local,
    }
  }

  #[test]
  fn join_unions_flow_types() {
    let asm = test_asm();
    let specials = asm.specials().clone();
    let mut a = Env::new(TermMap::default());
    a.declare_var("x", var(asm.store().union(vec![specials.int, specials.none])));
    let mut b = a.clone();
    a.narrow_var("x", specials.int);
    b.narrow_var("x", specials.none);
    let joined = Env::join(vec![a, b], &asm);
    assert_eq!(
      joined.lookup_var("x").unwrap().flow,
      asm.store().union(vec![specials.int, specials.none])
    );
  }

  #[test]
  fn join_drops_must_defined_unless_unanimous() {
    let asm = test_asm();
    let specials = asm.specials().clone();
    let mut a = Env::new(TermMap::default());
    a.declare_var("x", var(specials.int));
    let mut b = a.clone();
    b.assign_var("x", specials.int);
    let mut undef = VarInfo {
      must_defined: false,
      ..var(specials.int)
    };
    undef.flow = specials.int;
    let mut c = Env::new(TermMap::default());
    c.declare_var("x", undef);
    let joined = Env::join(vec![b, c], &asm);
    assert!(!joined.lookup_var("x").unwrap().must_defined);
  }

  #[test]
  fn join_ignores_unreachable_vars_but_keeps_returns() {
    let asm = test_asm();
    let specials = asm.specials().clone();
    let mut returned = Env::new(TermMap::default());
    returned.add_return(specials.int, &asm);
    let returned = returned.not_reachable();
    let mut live = Env::new(TermMap::default());
    live.declare_var("y", var(specials.bool_));
    let joined = Env::join(vec![returned, live], &asm);
    assert!(joined.reachable);
    assert_eq!(joined.return_type, Some(specials.int));
    assert!(joined.lookup_var("y").is_some());
  }
}
