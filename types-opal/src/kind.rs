use serde::Deserialize;
use serde::Serialize;

use crate::ids::DeclId;
use crate::ids::NameId;
use crate::ids::TypeId;

/// An interned resolved type. Every non-`Union` kind is an atom; a `Union` is
/// the canonical set of its member atoms (flattened, deduped, sorted).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
  Tuple(TupleType),
  Record(RecordType),
  Entity(EntityRef),
  /// Conjunction of concept references, interpreted as intersection.
  Concept(ConceptType),
  Function(FunctionType),
  Union(Vec<TypeId>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TupleEntry {
  pub ty: TypeId,
  pub optional: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TupleType {
  pub entries: Vec<TupleEntry>,
  /// Permits extra trailing entries of type Any.
  pub open: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordProp {
  pub name: NameId,
  pub ty: TypeId,
  pub optional: bool,
}

/// Property order is canonicalized by name at interning; ordering is not part
/// of record identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordType {
  pub entries: Vec<RecordProp>,
  pub open: bool,
}

impl RecordType {
  pub fn find(&self, name: NameId) -> Option<&RecordProp> {
    self.entries.iter().find(|p| p.name == name)
  }
}

/// A nominal reference with resolved template binds, positional over the
/// declaration's template parameters.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
  pub decl: DeclId,
  pub binds: Vec<TypeId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConceptType {
  /// Non-empty, sorted, deduped.
  pub refs: Vec<EntityRef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionParam {
  pub name: NameId,
  pub ty: TypeId,
  pub optional: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionType {
  pub params: Vec<FunctionParam>,
  /// Rest-parameter collection type, when declared.
  pub rest: Option<TypeId>,
  pub result: TypeId,
}

impl FunctionType {
  pub fn required_params(&self) -> usize {
    self.params.iter().filter(|p| !p.optional).count()
  }
}

/// Universal methods defined on every value. Record properties may not shadow
/// these names.
pub const UNIVERSAL_METHODS: [&str; 6] = ["is", "as", "tryAs", "defaultAs", "isNone", "isSome"];

pub fn is_universal_method_name(name: &str) -> bool {
  UNIVERSAL_METHODS.contains(&name)
}

/// A parameter list may not place required parameters after optional ones,
/// nor combine optional parameters with a rest parameter.
pub fn params_well_ordered(optionals: impl Iterator<Item = bool>, has_rest: bool) -> bool {
  let mut seen_optional = false;
  for optional in optionals {
    if optional {
      seen_optional = true;
    } else if seen_optional {
      return false;
    }
  }
  !(seen_optional && has_rest)
}
