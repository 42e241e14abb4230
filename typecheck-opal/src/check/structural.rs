//! Structural-type operators over tuples and records: per-atom projection,
//! update, append, merge, and the expansion feasibility predicates used by
//! argument binding.
//!
//! Every operator distributes over the atom set of its input and unions the
//! per-atom results. Failures surface as [`StructError`] values; the caller
//! owns turning them into diagnostics.

use thiserror::Error;
use types_opal::{
  Assembly, MemberKind, MemberLookup, NameId, RecordProp, RecordType, TupleEntry, TupleType,
  TypeId, TypeKind,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StructError {
  #[error("type is not tuple-structured")]
  NotATuple,
  #[error("type is not record-structured")]
  NotARecord,
  #[error("projection pattern is not satisfied: {0}")]
  Projection(String),
  #[error("field `{0}` does not resolve uniquely")]
  AmbiguousField(String),
  #[error("field `{0}` is not present")]
  UnknownField(String),
  #[error("structural extension operand must be a closed record")]
  OpenExtension,
  #[error("value for `{0}` does not conform to the declared field type")]
  FieldMismatch(String),
}

pub type StructResult<T> = Result<T, StructError>;

fn tuple_reps(asm: &Assembly, ty: TypeId) -> StructResult<Vec<TupleType>> {
  asm
    .store()
    .atoms(ty)
    .into_iter()
    .map(|atom| asm.tuple_rep(atom).ok_or(StructError::NotATuple))
    .collect()
}

fn record_reps(asm: &Assembly, ty: TypeId) -> StructResult<Vec<RecordType>> {
  asm
    .store()
    .atoms(ty)
    .into_iter()
    .map(|atom| asm.record_rep(atom).ok_or(StructError::NotARecord))
    .collect()
}

/// Result type of `t[i]`: per atom, the entry type (with None when the entry
/// is optional), Any past the length of an open tuple, and None otherwise.
pub fn load_index_type(asm: &Assembly, ty: TypeId, index: usize) -> StructResult<TypeId> {
  let specials = asm.specials();
  let mut out = Vec::new();
  for rep in tuple_reps(asm, ty)? {
    match rep.entries.get(index) {
      Some(entry) if entry.optional => {
        out.push(asm.store().union(vec![entry.ty, specials.none]));
      }
      Some(entry) => out.push(entry.ty),
      None if rep.open => out.push(specials.any),
      None => out.push(specials.none),
    }
  }
  Ok(asm.store().union(out))
}

/// Result type of `r.f`, symmetric to [`load_index_type`].
pub fn load_name_type(asm: &Assembly, ty: TypeId, name: NameId) -> StructResult<TypeId> {
  let specials = asm.specials();
  let mut out = Vec::new();
  for rep in record_reps(asm, ty)? {
    match rep.find(name) {
      Some(entry) if entry.optional => {
        out.push(asm.store().union(vec![entry.ty, specials.none]));
      }
      Some(entry) => out.push(entry.ty),
      None if rep.open => out.push(specials.any),
      None => out.push(specials.none),
    }
  }
  Ok(asm.store().union(out))
}

/// Project a type through a single-atom pattern: a tuple pattern, a record
/// pattern, or a concept conjunction (which projects the concepts' declared
/// fields as a closed record).
pub fn project_type(asm: &Assembly, ty: TypeId, pattern: TypeId) -> StructResult<TypeId> {
  match asm.store().type_kind(pattern) {
    TypeKind::Tuple(pat) => {
      let mut out = Vec::new();
      for rep in tuple_reps(asm, ty)? {
        out.push(project_tuple(asm, &rep, &pat)?);
      }
      Ok(asm.store().union(out))
    }
    TypeKind::Record(pat) => {
      let mut out = Vec::new();
      for rep in record_reps(asm, ty)? {
        out.push(project_record(asm, &rep, &pat)?);
      }
      Ok(asm.store().union(out))
    }
    TypeKind::Concept(concept) => {
      let mut names: Vec<String> = Vec::new();
      for cref in &concept.refs {
        for name in asm.all_fields(cref).keys() {
          if !names.contains(name) {
            names.push(name.clone());
          }
        }
      }
      names.sort();
      let mut props = Vec::with_capacity(names.len());
      for name in &names {
        let mref = match asm.member_root(ty, MemberKind::Field, name) {
          MemberLookup::Unique(mref) => mref,
          MemberLookup::Ambiguous => return Err(StructError::AmbiguousField(name.clone())),
          MemberLookup::NotFound => return Err(StructError::UnknownField(name.clone())),
        };
        let field_ty = asm
          .field_type(&mref)
          .map_err(|_| StructError::UnknownField(name.clone()))?;
        props.push(RecordProp {
          name: asm.store().intern_name(name),
          ty: field_ty,
          optional: false,
        });
      }
      Ok(asm.store().intern_type(TypeKind::Record(RecordType {
        entries: props,
        open: false,
      })))
    }
    _ => Err(StructError::Projection(
      "pattern must be a tuple, record, or concept".to_string(),
    )),
  }
}

fn project_tuple(asm: &Assembly, src: &TupleType, pat: &TupleType) -> StructResult<TypeId> {
  let mut entries = Vec::new();
  for (idx, pe) in pat.entries.iter().enumerate() {
    let se = src.entries.get(idx);
    if !pe.optional {
      let se = se.ok_or_else(|| StructError::Projection(format!("missing entry {}", idx)))?;
      if se.optional {
        return Err(StructError::Projection(format!(
          "entry {} is not guaranteed present",
          idx
        )));
      }
      if !asm.subtype_of(se.ty, pe.ty) {
        return Err(StructError::Projection(format!(
          "entry {} does not conform to the pattern",
          idx
        )));
      }
      entries.push(TupleEntry {
        ty: se.ty,
        optional: false,
      });
    } else if let Some(se) = se {
      if !asm.subtype_of(se.ty, pe.ty) {
        return Err(StructError::Projection(format!(
          "entry {} does not conform to the pattern",
          idx
        )));
      }
      entries.push(TupleEntry {
        ty: se.ty,
        optional: true,
      });
    }
  }
  if pat.open {
    for se in src.entries.iter().skip(pat.entries.len()) {
      entries.push(se.clone());
    }
  } else if src.open || src.entries.len() > pat.entries.len() {
    return Err(StructError::Projection(
      "source has entries beyond the closed pattern".to_string(),
    ));
  }
  Ok(asm.store().intern_type(TypeKind::Tuple(TupleType {
    entries,
    open: pat.open && src.open,
  })))
}

fn project_record(asm: &Assembly, src: &RecordType, pat: &RecordType) -> StructResult<TypeId> {
  let mut entries = Vec::new();
  for pe in &pat.entries {
    let se = src.find(pe.name);
    let prop_name = asm.store().name(pe.name);
    if !pe.optional {
      let se = se.ok_or_else(|| StructError::UnknownField(prop_name.clone()))?;
      if se.optional {
        return Err(StructError::Projection(format!(
          "property `{}` is not guaranteed present",
          prop_name
        )));
      }
      if !asm.subtype_of(se.ty, pe.ty) {
        return Err(StructError::Projection(format!(
          "property `{}` does not conform to the pattern",
          prop_name
        )));
      }
      entries.push(RecordProp {
        name: pe.name,
        ty: se.ty,
        optional: false,
      });
    } else if let Some(se) = se {
      if !asm.subtype_of(se.ty, pe.ty) {
        return Err(StructError::Projection(format!(
          "property `{}` does not conform to the pattern",
          prop_name
        )));
      }
      entries.push(RecordProp {
        name: pe.name,
        ty: se.ty,
        optional: true,
      });
    }
  }
  if pat.open {
    for se in &src.entries {
      if pat.find(se.name).is_none() {
        entries.push(se.clone());
      }
    }
  } else {
    let extra = src.entries.iter().any(|se| pat.find(se.name).is_none());
    if src.open || extra {
      return Err(StructError::Projection(
        "source has properties beyond the closed pattern".to_string(),
      ));
    }
  }
  Ok(asm.store().intern_type(TypeKind::Record(RecordType {
    entries,
    open: pat.open && src.open,
  })))
}

/// Type of `t` after overwriting the given tuple indices. Writing past the
/// current length extends the sequence, filling intermediate slots with Any
/// (open source) or None (closed source); extension past optional entries or
/// an open tail keeps the result conservatively open.
pub fn update_indices_type(
  asm: &Assembly,
  ty: TypeId,
  updates: &[(usize, TypeId)],
) -> StructResult<TypeId> {
  let specials = asm.specials();
  let mut out = Vec::new();
  for rep in tuple_reps(asm, ty)? {
    let mut entries = rep.entries.clone();
    let mut open = rep.open;
    let max_index = updates.iter().map(|(idx, _)| *idx).max().unwrap_or(0);
    if max_index >= entries.len() {
      let fill = if rep.open { specials.any } else { specials.none };
      if rep.open || rep.entries.iter().any(|e| e.optional) {
        open = true;
      }
      while entries.len() <= max_index {
        entries.push(TupleEntry {
          ty: fill,
          optional: false,
        });
      }
    }
    for (idx, new_ty) in updates {
      entries[*idx] = TupleEntry {
        ty: *new_ty,
        optional: false,
      };
    }
    out.push(
      asm
        .store()
        .intern_type(TypeKind::Tuple(TupleType { entries, open })),
    );
  }
  Ok(asm.store().union(out))
}

/// Type of `r` after overwriting or appending the given properties; updated
/// entries become required.
pub fn update_names_type(
  asm: &Assembly,
  ty: TypeId,
  updates: &[(NameId, TypeId)],
) -> StructResult<TypeId> {
  let mut out = Vec::new();
  for rep in record_reps(asm, ty)? {
    let mut entries = rep.entries.clone();
    for (name, new_ty) in updates {
      match entries.iter_mut().find(|e| e.name == *name) {
        Some(entry) => {
          entry.ty = *new_ty;
          entry.optional = false;
        }
        None => entries.push(RecordProp {
          name: *name,
          ty: *new_ty,
          optional: false,
        }),
      }
    }
    out.push(asm.store().intern_type(TypeKind::Record(RecordType {
      entries,
      open: rep.open,
    })));
  }
  Ok(asm.store().union(out))
}

/// Concatenate tuples. Openness or optional entries on either side make the
/// result conservatively open.
pub fn append_tuple_type(asm: &Assembly, ty: TypeId, ext: TypeId) -> StructResult<TypeId> {
  let mut out = Vec::new();
  for base in tuple_reps(asm, ty)? {
    for incoming in tuple_reps(asm, ext)? {
      let fuzzy = base.open
        || incoming.open
        || base.entries.iter().any(|e| e.optional)
        || incoming.entries.iter().any(|e| e.optional);
      let mut entries = base.entries.clone();
      entries.extend(incoming.entries.iter().cloned());
      out.push(asm.store().intern_type(TypeKind::Tuple(TupleType {
        entries,
        open: fuzzy,
      })));
    }
  }
  Ok(asm.store().union(out))
}

/// Merge records: required incoming entries override, optional ones widen to
/// the union and stay optional, absent names carry over.
pub fn merge_record_type(asm: &Assembly, ty: TypeId, ext: TypeId) -> StructResult<TypeId> {
  let mut out = Vec::new();
  for base in record_reps(asm, ty)? {
    for incoming in record_reps(asm, ext)? {
      let mut entries = base.entries.clone();
      for e in &incoming.entries {
        match entries.iter_mut().find(|existing| existing.name == e.name) {
          Some(existing) if !e.optional => {
            existing.ty = e.ty;
            existing.optional = false;
          }
          Some(existing) => {
            existing.ty = asm.store().union(vec![existing.ty, e.ty]);
            existing.optional = true;
          }
          None => entries.push(e.clone()),
        }
      }
      out.push(asm.store().intern_type(TypeKind::Record(RecordType {
        entries,
        open: base.open || incoming.open,
      })));
    }
  }
  Ok(asm.store().union(out))
}

/// Merge a record into a nominal value. The merge is type-only: the incoming
/// record must be closed and every property must resolve uniquely to a field
/// of the base, with a conforming type. The base type is unchanged.
pub fn merge_object_type(asm: &Assembly, ty: TypeId, ext: TypeId) -> StructResult<TypeId> {
  for incoming in record_reps(asm, ext)? {
    if incoming.open {
      return Err(StructError::OpenExtension);
    }
    for e in &incoming.entries {
      let prop_name = asm.store().name(e.name);
      let mref = match asm.member_root(ty, MemberKind::Field, &prop_name) {
        MemberLookup::Unique(mref) => mref,
        MemberLookup::Ambiguous => return Err(StructError::AmbiguousField(prop_name)),
        MemberLookup::NotFound => return Err(StructError::UnknownField(prop_name)),
      };
      let field_ty = asm
        .field_type(&mref)
        .map_err(|_| StructError::UnknownField(prop_name.clone()))?;
      if !asm.subtype_of(e.ty, field_ty) {
        return Err(StructError::FieldMismatch(prop_name));
      }
    }
  }
  Ok(ty)
}

/// Feasibility of expanding a tuple value into positional arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupleExpando {
  /// False when any atom is open (the expansion length is unbounded).
  pub ok: bool,
  /// Entries guaranteed present in every atom.
  pub req_len: usize,
  /// Longest possible expansion.
  pub max_len: usize,
}

pub fn tuple_expando(asm: &Assembly, ty: TypeId) -> StructResult<TupleExpando> {
  let reps = tuple_reps(asm, ty)?;
  let ok = reps.iter().all(|rep| !rep.open);
  let req_len = reps
    .iter()
    .map(|rep| rep.entries.iter().filter(|e| !e.optional).count())
    .min()
    .unwrap_or(0);
  let max_len = reps.iter().map(|rep| rep.entries.len()).max().unwrap_or(0);
  Ok(TupleExpando {
    ok,
    req_len,
    max_len,
  })
}

/// Feasibility of expanding a record value into named arguments. A name is
/// required iff it is required in every atom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordExpando {
  pub ok: bool,
  pub required: Vec<NameId>,
  pub all: Vec<NameId>,
}

pub fn record_expando(asm: &Assembly, ty: TypeId) -> StructResult<RecordExpando> {
  let reps = record_reps(asm, ty)?;
  let ok = reps.iter().all(|rep| !rep.open);
  let mut all: Vec<NameId> = Vec::new();
  for rep in &reps {
    for e in &rep.entries {
      if !all.contains(&e.name) {
        all.push(e.name);
      }
    }
  }
  let required: Vec<NameId> = all
    .iter()
    .copied()
    .filter(|name| {
      reps
        .iter()
        .all(|rep| rep.find(*name).map(|e| !e.optional).unwrap_or(false))
    })
    .collect();
  let sort_key = |ids: &mut Vec<NameId>| {
    ids.sort_by_key(|id| asm.store().name(*id));
  };
  let mut all = all;
  let mut required = required;
  sort_key(&mut all);
  sort_key(&mut required);
  Ok(RecordExpando { ok, required, all })
}
