//! Subtype relation and flow-narrowing restriction operators.
//!
//! The relation is atom-directed: `a <: b` holds when every atom of `a` is
//! accepted by some atom of `b`. Nominal acceptance walks the provides
//! closure; structural acceptance is pointwise over tuple entries and record
//! properties with optionality respected.

use crate::decls::Assembly;
use crate::ids::TypeId;
use crate::kind::{EntityRef, FunctionType, RecordType, TupleType, TypeKind};

impl Assembly {
  pub fn subtype_of(&self, a: TypeId, b: TypeId) -> bool {
    if a == b {
      return true;
    }
    self
      .store()
      .atoms(a)
      .into_iter()
      .all(|atom| self.atom_subtype(atom, b))
  }

  /// Whether a single atom is accepted by (some atom of) `b`.
  pub fn atom_subtype(&self, atom: TypeId, b: TypeId) -> bool {
    self
      .store()
      .atoms(b)
      .into_iter()
      .any(|batom| self.atom_sub_atom(atom, batom))
  }

  fn atom_sub_atom(&self, a: TypeId, b: TypeId) -> bool {
    if a == b {
      return true;
    }
    let b_kind = self.store().type_kind(b);
    if let TypeKind::Concept(target) = &b_kind {
      return target
        .refs
        .iter()
        .all(|cref| self.atom_satisfies_concept(a, cref));
    }
    match (self.store().type_kind(a), b_kind) {
      (TypeKind::Tuple(t1), TypeKind::Tuple(t2)) => self.tuple_sub(&t1, &t2),
      (TypeKind::Record(r1), TypeKind::Record(r2)) => self.record_sub(&r1, &r2),
      (TypeKind::Function(f1), TypeKind::Function(f2)) => self.function_sub(&f1, &f2),
      // Entities relate only by identity; equal ids were handled above.
      _ => false,
    }
  }

  fn atom_satisfies_concept(&self, atom: TypeId, cref: &EntityRef) -> bool {
    let specials = self.specials();
    if cref.decl == specials.any_decl {
      return true;
    }
    match self.store().type_kind(atom) {
      TypeKind::Entity(eref) => {
        if cref.decl == specials.some_decl {
          return eref.decl != specials.none_decl;
        }
        if cref.decl == specials.object_decl {
          return eref.decl != specials.none_decl;
        }
        self.provides_closure(&eref).contains(cref)
      }
      TypeKind::Concept(concept) => concept
        .refs
        .iter()
        .any(|r| r == cref || self.provides_closure(r).contains(cref)),
      TypeKind::Tuple(_) => {
        cref.decl == specials.some_decl || cref.decl == specials.tuple_decl
      }
      TypeKind::Record(_) => {
        cref.decl == specials.some_decl || cref.decl == specials.record_decl
      }
      TypeKind::Function(_) => {
        cref.decl == specials.some_decl || cref.decl == specials.function_decl
      }
      TypeKind::Union(_) => false,
    }
  }

  fn tuple_sub(&self, t1: &TupleType, t2: &TupleType) -> bool {
    let max_len = t1.entries.len().max(t2.entries.len());
    for i in 0..max_len {
      match (t1.entries.get(i), t2.entries.get(i)) {
        (Some(e1), Some(e2)) => {
          if e1.optional && !e2.optional {
            return false;
          }
          if !self.subtype_of(e1.ty, e2.ty) {
            return false;
          }
        }
        (Some(_), None) => {
          if !t2.open {
            return false;
          }
          break;
        }
        (None, Some(e2)) => {
          if !e2.optional {
            return false;
          }
        }
        (None, None) => unreachable!(),
      }
    }
    !t1.open || t2.open
  }

  fn record_sub(&self, r1: &RecordType, r2: &RecordType) -> bool {
    for e2 in &r2.entries {
      match r1.find(e2.name) {
        Some(e1) => {
          if e1.optional && !e2.optional {
            return false;
          }
          if !self.subtype_of(e1.ty, e2.ty) {
            return false;
          }
        }
        None => {
          if !e2.optional {
            return false;
          }
        }
      }
    }
    for e1 in &r1.entries {
      if r2.find(e1.name).is_none() && !r2.open {
        return false;
      }
    }
    !r1.open || r2.open
  }

  /// `f1 <: f2`: every call shape valid for `f2` must be accepted by `f1`,
  /// with contravariant parameters and a covariant result.
  fn function_sub(&self, f1: &FunctionType, f2: &FunctionType) -> bool {
    if f1.required_params() > f2.required_params() {
      return false;
    }
    for (i, p2) in f2.params.iter().enumerate() {
      match f1.params.get(i) {
        Some(p1) => {
          if p2.optional && !p1.optional {
            return false;
          }
          if !self.subtype_of(p2.ty, p1.ty) {
            return false;
          }
        }
        None => match f1.rest {
          Some(rest1) => {
            let Some(elem1) = self.rest_element_type(rest1) else {
              return false;
            };
            if !self.subtype_of(p2.ty, elem1) {
              return false;
            }
          }
          None => return false,
        },
      }
    }
    if let Some(rest2) = f2.rest {
      match f1.rest {
        Some(rest1) => {
          if !self.subtype_of(rest2, rest1) {
            return false;
          }
        }
        None => return false,
      }
    }
    self.subtype_of(f1.result, f2.result)
  }

  /// Element type of a rest-parameter collection type, if it is one.
  pub fn rest_element_type(&self, rest: TypeId) -> Option<TypeId> {
    match self.store().type_kind(rest) {
      TypeKind::Entity(eref) => self.element_type(&eref),
      _ => None,
    }
  }

  /// Atoms of `ty` that are subtypes of `target`; `None` when no atom
  /// survives (the narrowing is infeasible).
  pub fn restrict_to(&self, ty: TypeId, target: TypeId) -> Option<TypeId> {
    let kept: Vec<TypeId> = self
      .store()
      .atoms(ty)
      .into_iter()
      .filter(|atom| self.atom_subtype(*atom, target))
      .collect();
    if kept.is_empty() {
      None
    } else {
      Some(self.store().union(kept))
    }
  }

  /// Atoms of `ty` that are not subtypes of `target`; `None` when every atom
  /// is removed.
  pub fn restrict_not(&self, ty: TypeId, target: TypeId) -> Option<TypeId> {
    let kept: Vec<TypeId> = self
      .store()
      .atoms(ty)
      .into_iter()
      .filter(|atom| !self.atom_subtype(*atom, target))
      .collect();
    if kept.is_empty() {
      None
    } else {
      Some(self.store().union(kept))
    }
  }
}
