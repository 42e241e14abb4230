//! The assembly: resolved declaration database and type oracle.
//!
//! Holds every entity/concept declaration plus namespace members, seeds the
//! core namespace, lowers source signatures to interned types, and answers
//! the member/bind/narrowing queries the checker drives.

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;
use ast_opal::{
  ConstDecl, FieldDecl, FunctionDecl, GlobalDecl, MethodDecl, OoDecl, OoDeclKind, SpecialDeclKind,
  StaticFnDecl, TypeParamDecl, TypeSig, TypeSigKind,
};
use diagnostics::TextRange;
use thiserror::Error;

use crate::ids::{DeclId, NameId, TypeId};
use crate::kind::{
  is_universal_method_name, params_well_ordered, ConceptType, EntityRef, FunctionParam,
  FunctionType, RecordProp, RecordType, TupleEntry, TupleType, TypeKind,
};
use crate::options::TypeOptions;
use crate::store::TypeStore;

/// Template bindings in scope while normalizing a signature.
pub type TermMap = AHashMap<String, TypeId>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
  #[error("unknown type name `{0}`")]
  UnknownTypeName(String),
  #[error("`{name}` expects {expected} template arguments, got {actual}")]
  TemplateArity {
    name: String,
    expected: usize,
    actual: usize,
  },
  #[error("template argument for `{0}` does not satisfy its declared bound")]
  BoundViolation(String),
  #[error("template argument for `{0}` must be a single-atom type")]
  UniquenessViolation(String),
  #[error("record property `{0}` masks a universal method")]
  RecordMasksUniversal(String),
  #[error("optional parameters may not precede required parameters or combine with a rest parameter")]
  BadParameterOrder,
  #[error("`{0}` is not a concept")]
  NotAConcept(String),
  #[error("type cannot be inferred here")]
  AutoNotAllowed,
}

/// Namespace member tables.
#[derive(Debug, Default)]
pub struct Namespace {
  pub functions: AHashMap<String, FunctionDecl>,
  pub consts: AHashMap<String, ConstDecl>,
  pub globals: AHashMap<String, GlobalDecl>,
}

/// Which member table a lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
  Field,
  Method,
  Const,
  Static,
}

/// A member located on a declaration, with the binds active at its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
  pub origin: EntityRef,
  pub index: usize,
}

/// Result of a rooted member lookup over a whole type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberLookup {
  Unique(MemberRef),
  Ambiguous,
  NotFound,
}

/// Interned ids for the core declarations the checker keys on.
#[derive(Debug, Clone)]
pub struct SpecialTypes {
  pub none_decl: DeclId,
  pub bool_decl: DeclId,
  pub int_decl: DeclId,
  pub string_decl: DeclId,
  pub guid_decl: DeclId,
  pub string_of_decl: DeclId,
  pub list_decl: DeclId,
  pub map_decl: DeclId,
  pub any_decl: DeclId,
  pub some_decl: DeclId,
  pub key_type_decl: DeclId,
  pub parsable_decl: DeclId,
  pub tuple_decl: DeclId,
  pub record_decl: DeclId,
  pub object_decl: DeclId,
  pub function_decl: DeclId,
  pub enum_decl: DeclId,

  pub none: TypeId,
  pub bool_: TypeId,
  pub int: TypeId,
  pub string: TypeId,
  pub guid: TypeId,
  pub any: TypeId,
  pub some: TypeId,
  pub key_type: TypeId,
  pub parsable: TypeId,
  pub tuple_concept: TypeId,
  pub record_concept: TypeId,
  pub object_concept: TypeId,
  pub function_concept: TypeId,
}

/// The resolved declaration database.
#[derive(Debug)]
pub struct Assembly {
  store: Arc<TypeStore>,
  options: TypeOptions,
  decls: Vec<OoDecl>,
  decl_index: AHashMap<(String, String), DeclId>,
  namespaces: AHashMap<String, Namespace>,
  specials: SpecialTypes,
}

pub const CORE_NS: &str = "Core";

fn named_sig(name: &str) -> TypeSig {
  TypeSig {
    span: TextRange::empty(0),
    kind: TypeSigKind::Named {
      name: name.to_string(),
      terms: Vec::new(),
    },
  }
}

fn core_decl(
  name: &str,
  kind: OoDeclKind,
  special: SpecialDeclKind,
  type_params: Vec<TypeParamDecl>,
  provides: Vec<TypeSig>,
) -> OoDecl {
  OoDecl {
    file: diagnostics::FileId(0),
    span: TextRange::empty(0),
    ns: CORE_NS.to_string(),
    name: name.to_string(),
    kind,
    special,
    attributes: Vec::new(),
    type_params,
    provides,
    fields: Vec::new(),
    methods: Vec::new(),
    statics: Vec::new(),
    consts: Vec::new(),
    invariants: Vec::new(),
  }
}

fn type_param(name: &str) -> TypeParamDecl {
  TypeParamDecl {
    name: name.to_string(),
    bound: None,
    unique: false,
  }
}

impl Assembly {
  /// Create an assembly with the core namespace seeded.
  pub fn new(store: Arc<TypeStore>) -> Self {
    Self::with_options(store, TypeOptions::default())
  }

  pub fn with_options(store: Arc<TypeStore>, options: TypeOptions) -> Self {
    let mut asm = Assembly {
      store,
      options,
      decls: Vec::new(),
      decl_index: AHashMap::new(),
      namespaces: AHashMap::new(),
      specials: SpecialTypes {
        none_decl: DeclId(0),
        bool_decl: DeclId(0),
        int_decl: DeclId(0),
        string_decl: DeclId(0),
        guid_decl: DeclId(0),
        string_of_decl: DeclId(0),
        list_decl: DeclId(0),
        map_decl: DeclId(0),
        any_decl: DeclId(0),
        some_decl: DeclId(0),
        key_type_decl: DeclId(0),
        parsable_decl: DeclId(0),
        tuple_decl: DeclId(0),
        record_decl: DeclId(0),
        object_decl: DeclId(0),
        function_decl: DeclId(0),
        enum_decl: DeclId(0),
        none: TypeId(0),
        bool_: TypeId(0),
        int: TypeId(0),
        string: TypeId(0),
        guid: TypeId(0),
        any: TypeId(0),
        some: TypeId(0),
        key_type: TypeId(0),
        parsable: TypeId(0),
        tuple_concept: TypeId(0),
        record_concept: TypeId(0),
        object_concept: TypeId(0),
        function_concept: TypeId(0),
      },
    };
    asm.register_namespace(CORE_NS);
    asm.seed_core();
    asm
  }

  fn seed_core(&mut self) {
    use OoDeclKind::{Concept, Entity};
    use SpecialDeclKind::Normal;

    let any = self.register_oo(core_decl("Any", Concept, Normal, vec![], vec![]));
    let some = self.register_oo(core_decl(
      "Some",
      Concept,
      Normal,
      vec![],
      vec![named_sig("Any")],
    ));
    let key_type = self.register_oo(core_decl(
      "KeyType",
      Concept,
      Normal,
      vec![],
      vec![named_sig("Any")],
    ));
    let parsable = self.register_oo(core_decl(
      "Parsable",
      Concept,
      Normal,
      vec![],
      vec![named_sig("Any")],
    ));
    let tuple_c = self.register_oo(core_decl(
      "Tuple",
      Concept,
      Normal,
      vec![],
      vec![named_sig("Some")],
    ));
    let record_c = self.register_oo(core_decl(
      "Record",
      Concept,
      Normal,
      vec![],
      vec![named_sig("Some")],
    ));
    let object_c = self.register_oo(core_decl(
      "Object",
      Concept,
      Normal,
      vec![],
      vec![named_sig("Some")],
    ));
    let function_c = self.register_oo(core_decl(
      "Function",
      Concept,
      Normal,
      vec![],
      vec![named_sig("Some")],
    ));
    let enum_c = self.register_oo(core_decl(
      "Enum",
      Concept,
      Normal,
      vec![],
      vec![named_sig("KeyType")],
    ));

    let none = self.register_oo(core_decl("None", Entity, Normal, vec![], vec![named_sig("Any")]));
    let bool_ = self.register_oo(core_decl(
      "Bool",
      Entity,
      Normal,
      vec![],
      vec![named_sig("Some"), named_sig("KeyType")],
    ));
    let int = self.register_oo(core_decl(
      "Int",
      Entity,
      Normal,
      vec![],
      vec![named_sig("Some"), named_sig("KeyType")],
    ));
    let string = self.register_oo(core_decl(
      "String",
      Entity,
      Normal,
      vec![],
      vec![named_sig("Some"), named_sig("KeyType"), named_sig("Parsable")],
    ));
    let guid = self.register_oo(core_decl(
      "Guid",
      Entity,
      Normal,
      vec![],
      vec![named_sig("Some"), named_sig("KeyType")],
    ));
    let string_of = self.register_oo(core_decl(
      "StringOf",
      Entity,
      Normal,
      vec![type_param("T")],
      vec![named_sig("Some"), named_sig("KeyType")],
    ));
    let list = self.register_oo(core_decl(
      "List",
      Entity,
      SpecialDeclKind::List,
      vec![type_param("T")],
      vec![named_sig("Object")],
    ));
    let map = self.register_oo(core_decl(
      "Map",
      Entity,
      SpecialDeclKind::Map,
      vec![type_param("K"), type_param("V")],
      vec![named_sig("Object")],
    ));

    let store = Arc::clone(&self.store);
    let entity_atom = |decl: DeclId| {
      store.intern_type(TypeKind::Entity(EntityRef {
        decl,
        binds: Vec::new(),
      }))
    };
    let concept_atom = |decl: DeclId| {
      store.intern_type(TypeKind::Concept(ConceptType {
        refs: vec![EntityRef {
          decl,
          binds: Vec::new(),
        }],
      }))
    };

    self.specials = SpecialTypes {
      none_decl: none,
      bool_decl: bool_,
      int_decl: int,
      string_decl: string,
      guid_decl: guid,
      string_of_decl: string_of,
      list_decl: list,
      map_decl: map,
      any_decl: any,
      some_decl: some,
      key_type_decl: key_type,
      parsable_decl: parsable,
      tuple_decl: tuple_c,
      record_decl: record_c,
      object_decl: object_c,
      function_decl: function_c,
      enum_decl: enum_c,
      none: entity_atom(none),
      bool_: entity_atom(bool_),
      int: entity_atom(int),
      string: entity_atom(string),
      guid: entity_atom(guid),
      any: concept_atom(any),
      some: concept_atom(some),
      key_type: concept_atom(key_type),
      parsable: concept_atom(parsable),
      tuple_concept: concept_atom(tuple_c),
      record_concept: concept_atom(record_c),
      object_concept: concept_atom(object_c),
      function_concept: concept_atom(function_c),
    };
  }

  pub fn store(&self) -> &Arc<TypeStore> {
    &self.store
  }

  pub fn options(&self) -> TypeOptions {
    self.options
  }

  pub fn specials(&self) -> &SpecialTypes {
    &self.specials
  }

  /// `Bool | None`, the operand domain of truth-valued positions.
  pub fn bool_or_none(&self) -> TypeId {
    self
      .store
      .union(vec![self.specials.bool_, self.specials.none])
  }

  pub fn register_namespace(&mut self, name: &str) {
    self.namespaces.entry(name.to_string()).or_default();
  }

  pub fn register_oo(&mut self, decl: OoDecl) -> DeclId {
    let id = DeclId(self.decls.len() as u32);
    self
      .decl_index
      .insert((decl.ns.clone(), decl.name.clone()), id);
    self.namespaces.entry(decl.ns.clone()).or_default();
    self.decls.push(decl);
    id
  }

  pub fn register_function(&mut self, decl: FunctionDecl) {
    let ns = self.namespaces.entry(decl.ns.clone()).or_default();
    ns.functions.insert(decl.name.clone(), decl);
  }

  pub fn register_const(&mut self, ns: &str, decl: ConstDecl) {
    let table = self.namespaces.entry(ns.to_string()).or_default();
    table.consts.insert(decl.name.clone(), decl);
  }

  pub fn register_global(&mut self, ns: &str, decl: GlobalDecl) {
    let table = self.namespaces.entry(ns.to_string()).or_default();
    table.globals.insert(decl.name.clone(), decl);
  }

  pub fn has_namespace(&self, ns: &str) -> bool {
    self.namespaces.contains_key(ns)
  }

  pub fn namespaces(&self) -> impl Iterator<Item = (&String, &Namespace)> {
    self.namespaces.iter()
  }

  pub fn namespace(&self, ns: &str) -> Option<&Namespace> {
    self.namespaces.get(ns)
  }

  pub fn decl(&self, id: DeclId) -> &OoDecl {
    &self.decls[id.index()]
  }

  pub fn decl_id(&self, ns: &str, name: &str) -> Option<DeclId> {
    self.decl_index.get(&(ns.to_string(), name.to_string())).copied()
  }

  pub fn decls(&self) -> impl Iterator<Item = (DeclId, &OoDecl)> {
    self
      .decls
      .iter()
      .enumerate()
      .map(|(idx, decl)| (DeclId(idx as u32), decl))
  }

  /// Fully-qualified display name for a declaration.
  pub fn decl_name(&self, id: DeclId) -> String {
    let decl = self.decl(id);
    if decl.ns == CORE_NS {
      decl.name.clone()
    } else {
      format!("{}::{}", decl.ns, decl.name)
    }
  }

  fn lookup_named(&self, name: &str, ns: &str) -> Option<DeclId> {
    if let Some((qual_ns, bare)) = name.rsplit_once("::") {
      return self.decl_id(qual_ns, bare);
    }
    self
      .decl_id(ns, name)
      .or_else(|| self.decl_id(CORE_NS, name))
  }

  /// Lower a source signature to an interned type under the given template
  /// bindings. Bounds and uniqueness markers of referenced declarations are
  /// validated against the supplied template arguments.
  pub fn normalize_type(
    &self,
    sig: &TypeSig,
    ns: &str,
    terms: &TermMap,
  ) -> Result<TypeId, TypeError> {
    match &sig.kind {
      TypeSigKind::Auto => Err(TypeError::AutoNotAllowed),
      TypeSigKind::Named { name, terms: targs } => {
        if targs.is_empty() {
          if let Some(bound) = terms.get(name.as_str()) {
            return Ok(*bound);
          }
        }
        let decl_id = self
          .lookup_named(name, ns)
          .ok_or_else(|| TypeError::UnknownTypeName(name.clone()))?;
        let decl = self.decl(decl_id);
        if decl.type_params.len() != targs.len() {
          return Err(TypeError::TemplateArity {
            name: name.clone(),
            expected: decl.type_params.len(),
            actual: targs.len(),
          });
        }
        let binds = targs
          .iter()
          .map(|arg| self.normalize_type(arg, ns, terms))
          .collect::<Result<Vec<_>, _>>()?;
        self.check_binds(decl_id, &binds, ns)?;
        let eref = EntityRef {
          decl: decl_id,
          binds,
        };
        match decl.kind {
          OoDeclKind::Entity => Ok(self.store.intern_type(TypeKind::Entity(eref))),
          OoDeclKind::Concept => Ok(
            self
              .store
              .intern_type(TypeKind::Concept(ConceptType { refs: vec![eref] })),
          ),
        }
      }
      TypeSigKind::Tuple { entries, open } => {
        let entries = entries
          .iter()
          .map(|entry| {
            Ok(TupleEntry {
              ty: self.normalize_type(&entry.sig, ns, terms)?,
              optional: entry.optional,
            })
          })
          .collect::<Result<Vec<_>, TypeError>>()?;
        Ok(self.store.intern_type(TypeKind::Tuple(TupleType {
          entries,
          open: *open,
        })))
      }
      TypeSigKind::Record { entries, open } => {
        let mut props = Vec::with_capacity(entries.len());
        for entry in entries {
          if is_universal_method_name(&entry.name) {
            return Err(TypeError::RecordMasksUniversal(entry.name.clone()));
          }
          props.push(RecordProp {
            name: self.store.intern_name(&entry.name),
            ty: self.normalize_type(&entry.sig, ns, terms)?,
            optional: entry.optional,
          });
        }
        Ok(self.store.intern_type(TypeKind::Record(RecordType {
          entries: props,
          open: *open,
        })))
      }
      TypeSigKind::Union(options) => {
        let members = options
          .iter()
          .map(|opt| self.normalize_type(opt, ns, terms))
          .collect::<Result<Vec<_>, _>>()?;
        Ok(self.store.union(members))
      }
      TypeSigKind::Conj(parts) => {
        let mut refs = Vec::new();
        for part in parts {
          let ty = self.normalize_type(part, ns, terms)?;
          match self.store.type_kind(ty) {
            TypeKind::Concept(concept) => refs.extend(concept.refs),
            _ => return Err(TypeError::NotAConcept(format!("{:?}", part.kind))),
          }
        }
        Ok(self.store.intern_type(TypeKind::Concept(ConceptType { refs })))
      }
      TypeSigKind::Function {
        params,
        rest,
        result,
      } => {
        if !params_well_ordered(params.iter().map(|p| p.optional), rest.is_some()) {
          return Err(TypeError::BadParameterOrder);
        }
        let params = params
          .iter()
          .map(|param| {
            Ok(FunctionParam {
              name: self.store.intern_name(&param.name),
              ty: self.normalize_type(&param.sig, ns, terms)?,
              optional: param.optional,
            })
          })
          .collect::<Result<Vec<_>, TypeError>>()?;
        let rest = rest
          .as_ref()
          .map(|sig| self.normalize_type(sig, ns, terms))
          .transpose()?;
        let result = self.normalize_type(result, ns, terms)?;
        Ok(self.store.intern_type(TypeKind::Function(FunctionType {
          params,
          rest,
          result,
        })))
      }
    }
  }

  /// Validate template binds against a declaration's parameter bounds and
  /// uniqueness markers.
  pub fn check_binds(&self, decl: DeclId, binds: &[TypeId], ns: &str) -> Result<(), TypeError> {
    let decl = self.decl(decl);
    let mut terms = TermMap::default();
    for (param, bind) in decl.type_params.iter().zip(binds.iter()) {
      terms.insert(param.name.clone(), *bind);
    }
    for (param, bind) in decl.type_params.iter().zip(binds.iter()) {
      if param.unique && self.store.atoms(*bind).len() != 1 {
        return Err(TypeError::UniquenessViolation(param.name.clone()));
      }
      if let Some(bound) = &param.bound {
        let bound_ty = self.normalize_type(bound, ns, &terms)?;
        if !self.subtype_of(*bind, bound_ty) {
          return Err(TypeError::BoundViolation(param.name.clone()));
        }
      }
    }
    Ok(())
  }

  /// Resolve the template bindings for a call: explicit term arguments are
  /// matched against the callee's template parameters and validated.
  pub fn resolve_binds_for_call(
    &self,
    type_params: &[TypeParamDecl],
    term_args: &[TypeId],
    ns: &str,
  ) -> Result<TermMap, TypeError> {
    if type_params.len() != term_args.len() {
      return Err(TypeError::TemplateArity {
        name: "<call>".to_string(),
        expected: type_params.len(),
        actual: term_args.len(),
      });
    }
    let mut terms = TermMap::default();
    for (param, arg) in type_params.iter().zip(term_args.iter()) {
      terms.insert(param.name.clone(), *arg);
    }
    for (param, arg) in type_params.iter().zip(term_args.iter()) {
      if param.unique && self.store.atoms(*arg).len() != 1 {
        return Err(TypeError::UniquenessViolation(param.name.clone()));
      }
      if let Some(bound) = &param.bound {
        let bound_ty = self.normalize_type(bound, ns, &terms)?;
        if !self.subtype_of(*arg, bound_ty) {
          return Err(TypeError::BoundViolation(param.name.clone()));
        }
      }
    }
    Ok(terms)
  }

  /// Template bindings active inside a declaration instantiated as `eref`.
  pub fn binds_of(&self, eref: &EntityRef) -> TermMap {
    let decl = self.decl(eref.decl);
    decl
      .type_params
      .iter()
      .zip(eref.binds.iter())
      .map(|(param, bind)| (param.name.clone(), *bind))
      .collect()
  }

  /// Transitive provides closure of a nominal reference, binds substituted.
  /// The reference itself is not included.
  pub fn provides_closure(&self, eref: &EntityRef) -> Vec<EntityRef> {
    let mut out: Vec<EntityRef> = Vec::new();
    let mut stack = vec![eref.clone()];
    while let Some(current) = stack.pop() {
      let decl = self.decl(current.decl);
      let terms = self.binds_of(&current);
      for provide in &decl.provides {
        let Ok(ty) = self.normalize_type(provide, &decl.ns, &terms) else {
          continue;
        };
        if let TypeKind::Concept(concept) = self.store.type_kind(ty) {
          for cref in concept.refs {
            if !out.contains(&cref) {
              out.push(cref.clone());
              stack.push(cref);
            }
          }
        }
      }
    }
    out
  }

  /// Whether `sub`'s declaration reaches `ancestor` through provides,
  /// including the trivial case.
  pub fn provides_transitively(&self, sub: &EntityRef, ancestor: &EntityRef) -> bool {
    sub == ancestor || self.provides_closure(sub).contains(ancestor)
  }

  fn member_index(decl: &OoDecl, kind: MemberKind, name: &str) -> Option<usize> {
    match kind {
      MemberKind::Field => decl.fields.iter().position(|f| f.name == name),
      MemberKind::Method => decl.methods.iter().position(|m| m.name == name),
      MemberKind::Const => decl.consts.iter().position(|c| c.name == name),
      MemberKind::Static => decl.statics.iter().position(|s| s.name == name),
    }
  }

  /// All declaration sites for a member reachable from a nominal atom.
  pub fn member_options(&self, atom: TypeId, kind: MemberKind, name: &str) -> Vec<MemberRef> {
    let refs: Vec<EntityRef> = match self.store.type_kind(atom) {
      TypeKind::Entity(eref) => {
        let mut refs = vec![eref.clone()];
        refs.extend(self.provides_closure(&eref));
        refs
      }
      TypeKind::Concept(concept) => {
        let mut refs = Vec::new();
        for cref in &concept.refs {
          if !refs.contains(cref) {
            refs.push(cref.clone());
          }
          for sup in self.provides_closure(cref) {
            if !refs.contains(&sup) {
              refs.push(sup);
            }
          }
        }
        refs
      }
      _ => return Vec::new(),
    };
    let mut out = Vec::new();
    for origin in refs {
      if let Some(index) = Self::member_index(self.decl(origin.decl), kind, name) {
        out.push(MemberRef { origin, index });
      }
    }
    out
  }

  /// The most-derived declaration site of a member within a single atom:
  /// the option whose declaration provides every other option's declaration.
  pub fn member_nearest(&self, atom: TypeId, kind: MemberKind, name: &str) -> MemberLookup {
    let options = self.member_options(atom, kind, name);
    if options.is_empty() {
      return MemberLookup::NotFound;
    }
    let nearest = options.iter().find(|candidate| {
      options
        .iter()
        .all(|other| self.provides_transitively(&candidate.origin, &other.origin))
    });
    match nearest {
      Some(nearest) => MemberLookup::Unique(nearest.clone()),
      None => MemberLookup::Ambiguous,
    }
  }

  /// Rooted member lookup over a whole type: every atom must reach the member
  /// and all found sites must share a unique root declaration (one that every
  /// other site's declaration provides).
  pub fn member_root(&self, ty: TypeId, kind: MemberKind, name: &str) -> MemberLookup {
    let mut all: Vec<MemberRef> = Vec::new();
    for atom in self.store.atoms(ty) {
      let options = self.member_options(atom, kind, name);
      if options.is_empty() {
        return MemberLookup::NotFound;
      }
      for option in options {
        if !all.contains(&option) {
          all.push(option);
        }
      }
    }
    if all.is_empty() {
      return MemberLookup::NotFound;
    }
    let root = all.iter().find(|candidate| {
      all
        .iter()
        .all(|other| self.provides_transitively(&other.origin, &candidate.origin))
    });
    match root {
      Some(root) => MemberLookup::Unique(root.clone()),
      None => MemberLookup::Ambiguous,
    }
  }

  pub fn field(&self, mref: &MemberRef) -> &FieldDecl {
    &self.decl(mref.origin.decl).fields[mref.index]
  }

  pub fn method(&self, mref: &MemberRef) -> &MethodDecl {
    &self.decl(mref.origin.decl).methods[mref.index]
  }

  pub fn const_of(&self, mref: &MemberRef) -> &ConstDecl {
    &self.decl(mref.origin.decl).consts[mref.index]
  }

  pub fn static_of(&self, mref: &MemberRef) -> &StaticFnDecl {
    &self.decl(mref.origin.decl).statics[mref.index]
  }

  /// All fields of a declaration, inherited and declared, keyed by name in
  /// lexicographic order. The closest declaration wins a name.
  pub fn all_fields(&self, eref: &EntityRef) -> BTreeMap<String, MemberRef> {
    let mut out: BTreeMap<String, MemberRef> = BTreeMap::new();
    let mut refs = vec![eref.clone()];
    refs.extend(self.provides_closure(eref));
    for origin in refs {
      let decl = self.decl(origin.decl);
      for (index, field) in decl.fields.iter().enumerate() {
        out.entry(field.name.clone()).or_insert(MemberRef {
          origin: origin.clone(),
          index,
        });
      }
    }
    out
  }

  /// The resolved type of a field at its origin binds.
  pub fn field_type(&self, mref: &MemberRef) -> Result<TypeId, TypeError> {
    let decl = self.decl(mref.origin.decl);
    let terms = self.binds_of(&mref.origin);
    self.normalize_type(&decl.fields[mref.index].sig, &decl.ns, &terms)
  }

  /// Element type of a collection entity: `T` for lists, `[K, V]` for maps.
  pub fn element_type(&self, eref: &EntityRef) -> Option<TypeId> {
    match self.decl(eref.decl).special {
      SpecialDeclKind::List => eref.binds.first().copied(),
      SpecialDeclKind::Map => {
        let (k, v) = (*eref.binds.first()?, *eref.binds.get(1)?);
        Some(self.store.intern_type(TypeKind::Tuple(TupleType {
          entries: vec![
            TupleEntry {
              ty: k,
              optional: false,
            },
            TupleEntry {
              ty: v,
              optional: false,
            },
          ],
          open: false,
        })))
      }
      _ => None,
    }
  }

  pub fn is_collection(&self, decl: DeclId) -> bool {
    matches!(
      self.decl(decl).special,
      SpecialDeclKind::List | SpecialDeclKind::Map
    )
  }

  /// Tuple view of an atom: the tuple itself, or the empty open tuple for a
  /// concept conjunction that includes the Tuple concept.
  pub fn tuple_rep(&self, atom: TypeId) -> Option<TupleType> {
    match self.store.type_kind(atom) {
      TypeKind::Tuple(tuple) => Some(tuple),
      TypeKind::Concept(concept)
        if concept
          .refs
          .iter()
          .any(|r| r.decl == self.specials.tuple_decl) =>
      {
        Some(TupleType {
          entries: Vec::new(),
          open: true,
        })
      }
      _ => None,
    }
  }

  /// Record view of an atom, symmetric to [`Assembly::tuple_rep`].
  pub fn record_rep(&self, atom: TypeId) -> Option<RecordType> {
    match self.store.type_kind(atom) {
      TypeKind::Record(record) => Some(record),
      TypeKind::Concept(concept)
        if concept
          .refs
          .iter()
          .any(|r| r.decl == self.specials.record_decl) =>
      {
        Some(RecordType {
          entries: Vec::new(),
          open: true,
        })
      }
      _ => None,
    }
  }

  /// Unify the signatures virtual dispatch sees: all sites must normalize to
  /// the same function type.
  pub fn unified_function_type(&self, options: &[FunctionType]) -> Option<FunctionType> {
    let first = options.first()?;
    if options.iter().all(|o| o == first) {
      Some(first.clone())
    } else {
      None
    }
  }
}
