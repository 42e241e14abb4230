use std::sync::Arc;

use parking_lot::RwLock;

use crate::ids::NameId;
use crate::ids::TypeId;
use crate::kind::TypeKind;

#[derive(Default, Debug)]
struct TypeInterner {
  items: Vec<TypeKind>,
  map: ahash::AHashMap<TypeKind, TypeId>,
}

impl TypeInterner {
  fn intern(&mut self, kind: TypeKind) -> TypeId {
    if let Some(id) = self.map.get(&kind) {
      return *id;
    }
    let id = TypeId(self.items.len() as u32);
    self.items.push(kind.clone());
    self.map.insert(kind, id);
    id
  }
}

#[derive(Default, Debug)]
struct NameInterner {
  items: Vec<String>,
  map: ahash::AHashMap<String, NameId>,
}

impl NameInterner {
  fn intern(&mut self, name: impl Into<String>) -> NameId {
    let name = name.into();
    if let Some(id) = self.map.get(&name) {
      return *id;
    }
    let id = NameId(self.items.len() as u32);
    self.items.push(name.clone());
    self.map.insert(name, id);
    id
  }
}

/// Deterministic interner for resolved types and names. Interning
/// canonicalizes unions and record property order so equal types receive
/// equal ids.
#[derive(Debug, Default)]
pub struct TypeStore {
  types: RwLock<TypeInterner>,
  names: RwLock<NameInterner>,
}

impl TypeStore {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn name(&self, id: NameId) -> String {
    self.names.read().items[id.index()].clone()
  }

  pub fn intern_name(&self, name: impl Into<String>) -> NameId {
    self.names.write().intern(name)
  }

  pub fn type_kind(&self, id: TypeId) -> TypeKind {
    self.types.read().items[id.index()].clone()
  }

  pub fn intern_type(&self, kind: TypeKind) -> TypeId {
    match self.canonicalize(kind) {
      TypeKind::Union(members) => self.union(members),
      other => self.types.write().intern(other),
    }
  }

  /// Union of the given types, flattened and deduped. A single surviving
  /// member collapses to itself.
  pub fn union(&self, members: Vec<TypeId>) -> TypeId {
    let mut flat: Vec<TypeId> = Vec::new();
    for member in members {
      match self.type_kind(member) {
        TypeKind::Union(inner) => flat.extend(inner),
        _ => flat.push(member),
      }
    }
    flat.sort();
    flat.dedup();
    assert!(!flat.is_empty(), "union of no types");
    if flat.len() == 1 {
      return flat[0];
    }
    self.types.write().intern(TypeKind::Union(flat))
  }

  /// The atom set of a type: union members, or the type itself.
  pub fn atoms(&self, ty: TypeId) -> Vec<TypeId> {
    match self.type_kind(ty) {
      TypeKind::Union(members) => members,
      _ => vec![ty],
    }
  }

  fn canonicalize(&self, kind: TypeKind) -> TypeKind {
    match kind {
      TypeKind::Record(mut record) => {
        {
          let names = self.names.read();
          record
            .entries
            .sort_by(|a, b| names.items[a.name.index()].cmp(&names.items[b.name.index()]));
        }
        TypeKind::Record(record)
      }
      TypeKind::Concept(mut concept) => {
        concept.refs.sort();
        concept.refs.dedup();
        TypeKind::Concept(concept)
      }
      other => other,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kind::{ConceptType, EntityRef, RecordProp, RecordType};
  use crate::DeclId;

  fn entity(store: &TypeStore, decl: u32) -> TypeId {
    store.intern_type(TypeKind::Entity(EntityRef {
      decl: DeclId(decl),
      binds: Vec::new(),
    }))
  }

  #[test]
  fn union_flattens_and_dedupes() {
    let store = TypeStore::new();
    let a = entity(&store, 0);
    let b = entity(&store, 1);
    let ab = store.union(vec![a, b]);
    let ab2 = store.union(vec![b, store.union(vec![a, b]), a]);
    assert_eq!(ab, ab2);
    assert_eq!(store.atoms(ab), vec![a, b]);
  }

  #[test]
  fn singleton_union_collapses() {
    let store = TypeStore::new();
    let a = entity(&store, 0);
    assert_eq!(store.union(vec![a, a]), a);
  }

  #[test]
  fn record_property_order_is_not_identity() {
    let store = TypeStore::new();
    let a = entity(&store, 0);
    let x = store.intern_name("x");
    let y = store.intern_name("y");
    let r1 = store.intern_type(TypeKind::Record(RecordType {
      entries: vec![
        RecordProp {
          name: x,
          ty: a,
          optional: false,
        },
        RecordProp {
          name: y,
          ty: a,
          optional: false,
        },
      ],
      open: false,
    }));
    let r2 = store.intern_type(TypeKind::Record(RecordType {
      entries: vec![
        RecordProp {
          name: y,
          ty: a,
          optional: false,
        },
        RecordProp {
          name: x,
          ty: a,
          optional: false,
        },
      ],
      open: false,
    }));
    assert_eq!(r1, r2);
  }

  #[test]
  fn concept_refs_dedupe() {
    let store = TypeStore::new();
    let c = EntityRef {
      decl: DeclId(7),
      binds: Vec::new(),
    };
    let t1 = store.intern_type(TypeKind::Concept(ConceptType {
      refs: vec![c.clone(), c.clone()],
    }));
    let t2 = store.intern_type(TypeKind::Concept(ConceptType { refs: vec![c] }));
    assert_eq!(t1, t2);
  }
}
