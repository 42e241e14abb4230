mod common;

use common::*;
use typecheck_opal::check::structural::{
  self, load_index_type, load_name_type, merge_record_type, project_type, record_expando,
  tuple_expando, update_indices_type, update_names_type,
};
use types_opal::{
  Assembly, NameId, RecordProp, RecordType, TupleEntry, TupleType, TypeId, TypeKind,
};

fn tuple_ty(asm: &Assembly, entries: Vec<(TypeId, bool)>, open: bool) -> TypeId {
  asm.store().intern_type(TypeKind::Tuple(TupleType {
    entries: entries
      .into_iter()
      .map(|(ty, optional)| TupleEntry { ty, optional })
      .collect(),
    open,
  }))
}

fn record_ty(asm: &Assembly, entries: Vec<(&str, TypeId, bool)>, open: bool) -> TypeId {
  let entries = entries
    .into_iter()
    .map(|(name, ty, optional)| RecordProp {
      name: asm.store().intern_name(name),
      ty,
      optional,
    })
    .collect();
  asm
    .store()
    .intern_type(TypeKind::Record(RecordType { entries, open }))
}

fn name(asm: &Assembly, text: &str) -> NameId {
  asm.store().intern_name(text)
}

#[test]
fn load_index_unions_optional_with_none() {
  let asm = new_assembly();
  let sp = asm.specials().clone();
  let t = tuple_ty(&asm, vec![(sp.int, false), (sp.bool_, true)], false);
  assert_eq!(load_index_type(&asm, t, 0).unwrap(), sp.int);
  assert_eq!(
    load_index_type(&asm, t, 1).unwrap(),
    asm.store().union(vec![sp.bool_, sp.none])
  );
  assert_eq!(load_index_type(&asm, t, 5).unwrap(), sp.none);
}

#[test]
fn load_index_past_open_tail_yields_any() {
  let asm = new_assembly();
  let sp = asm.specials().clone();
  let t = tuple_ty(&asm, vec![(sp.int, false)], true);
  assert_eq!(load_index_type(&asm, t, 3).unwrap(), sp.any);
}

#[test]
fn load_name_distributes_over_union_atoms() {
  let asm = new_assembly();
  let sp = asm.specials().clone();
  let a = record_ty(&asm, vec![("f", sp.int, false)], false);
  let b = record_ty(&asm, vec![("f", sp.string, false)], false);
  let t = asm.store().union(vec![a, b]);
  assert_eq!(
    load_name_type(&asm, t, name(&asm, "f")).unwrap(),
    asm.store().union(vec![sp.int, sp.string])
  );
}

#[test]
fn project_keeps_source_types_and_satisfies_pattern() {
  let asm = new_assembly();
  let sp = asm.specials().clone();
  let src = record_ty(
    &asm,
    vec![("x", sp.int, false), ("y", sp.string, false)],
    false,
  );
  let pat = record_ty(&asm, vec![("x", sp.int, false), ("y", sp.any, false)], false);
  let out = project_type(&asm, src, pat).unwrap();
  assert!(asm.subtype_of(out, pat), "projection satisfies the pattern");
  assert_eq!(out, src, "projection keeps the source entry types");
}

#[test]
fn project_rejects_missing_required_entry() {
  let asm = new_assembly();
  let sp = asm.specials().clone();
  let src = tuple_ty(&asm, vec![(sp.int, false)], false);
  let pat = tuple_ty(&asm, vec![(sp.int, false), (sp.int, false)], false);
  assert!(project_type(&asm, src, pat).is_err());
}

#[test]
fn update_composes_with_later_updates_shadowing() {
  let asm = new_assembly();
  let sp = asm.specials().clone();
  let t = record_ty(&asm, vec![("a", sp.int, false), ("b", sp.int, false)], false);
  let a = name(&asm, "a");
  let b = name(&asm, "b");
  let one = update_names_type(&asm, t, &[(a, sp.string)]).unwrap();
  let two = update_names_type(&asm, one, &[(a, sp.bool_), (b, sp.string)]).unwrap();
  let composed = update_names_type(&asm, t, &[(a, sp.bool_), (b, sp.string)]).unwrap();
  assert_eq!(two, composed);
}

#[test]
fn tuple_update_past_length_extends_with_none_fill() {
  let asm = new_assembly();
  let sp = asm.specials().clone();
  let t = tuple_ty(&asm, vec![(sp.int, false)], false);
  let out = update_indices_type(&asm, t, &[(2, sp.string)]).unwrap();
  let expected = tuple_ty(
    &asm,
    vec![(sp.int, false), (sp.none, false), (sp.string, false)],
    false,
  );
  assert_eq!(out, expected);
}

#[test]
fn tuple_update_past_optional_prefix_stays_open() {
  let asm = new_assembly();
  let sp = asm.specials().clone();
  let t = tuple_ty(&asm, vec![(sp.int, false), (sp.int, true)], false);
  let out = update_indices_type(&asm, t, &[(3, sp.string)]).unwrap();
  match asm.store().type_kind(out) {
    TypeKind::Tuple(tuple) => assert!(tuple.open, "conservative extension is open"),
    other => panic!("expected a tuple, got {:?}", other),
  }
}

#[test]
fn merge_record_overrides_required_and_widens_optional() {
  let asm = new_assembly();
  let sp = asm.specials().clone();
  let base = record_ty(&asm, vec![("a", sp.int, false), ("b", sp.int, false)], false);
  let incoming = record_ty(
    &asm,
    vec![("a", sp.string, false), ("b", sp.string, true), ("c", sp.bool_, false)],
    false,
  );
  let out = merge_record_type(&asm, base, incoming).unwrap();
  match asm.store().type_kind(out) {
    TypeKind::Record(record) => {
      let a = record.find(name(&asm, "a")).unwrap();
      assert_eq!(a.ty, sp.string);
      assert!(!a.optional);
      let b = record.find(name(&asm, "b")).unwrap();
      assert_eq!(b.ty, asm.store().union(vec![sp.int, sp.string]));
      assert!(b.optional);
      assert!(record.find(name(&asm, "c")).is_some());
    }
    other => panic!("expected a record, got {:?}", other),
  }
}

#[test]
fn tuple_expando_reports_required_and_max_lengths() {
  let asm = new_assembly();
  let sp = asm.specials().clone();
  let a = tuple_ty(&asm, vec![(sp.int, false), (sp.int, true)], false);
  let b = tuple_ty(&asm, vec![(sp.int, false), (sp.int, false), (sp.int, false)], false);
  let t = asm.store().union(vec![a, b]);
  let ex = tuple_expando(&asm, t).unwrap();
  assert!(ex.ok);
  assert_eq!(ex.req_len, 1, "min over atoms of required entries");
  assert_eq!(ex.max_len, 3, "max over atoms of length");
}

#[test]
fn open_tuple_is_not_expandable() {
  let asm = new_assembly();
  let sp = asm.specials().clone();
  let t = tuple_ty(&asm, vec![(sp.int, false)], true);
  assert!(!tuple_expando(&asm, t).unwrap().ok);
}

#[test]
fn record_expando_requires_name_in_every_atom() {
  let asm = new_assembly();
  let sp = asm.specials().clone();
  let a = record_ty(&asm, vec![("x", sp.int, false), ("y", sp.int, false)], false);
  let b = record_ty(&asm, vec![("x", sp.int, false), ("y", sp.int, true)], false);
  let t = asm.store().union(vec![a, b]);
  let ex = record_expando(&asm, t).unwrap();
  assert!(ex.ok);
  let x = name(&asm, "x");
  let y = name(&asm, "y");
  assert!(ex.required.contains(&x));
  assert!(!ex.required.contains(&y), "y is optional in one atom");
  assert!(ex.all.contains(&y));
}

#[test]
fn structural_errors_name_the_failure() {
  let asm = new_assembly();
  let sp = asm.specials().clone();
  assert!(matches!(
    load_index_type(&asm, sp.int, 0),
    Err(structural::StructError::NotATuple)
  ));
  assert!(matches!(
    load_name_type(&asm, sp.int, name(&asm, "f")),
    Err(structural::StructError::NotARecord)
  ));
}
