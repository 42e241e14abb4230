mod common;

use common::*;
use proptest::prelude::*;
use types_opal::{Assembly, RecordProp, RecordType, TypeId, TypeKind};

fn primitives(asm: &Assembly) -> Vec<TypeId> {
  let sp = asm.specials().clone();
  vec![sp.none, sp.bool_, sp.int, sp.string, sp.guid]
}

proptest! {
  #[test]
  fn union_is_order_independent(order in proptest::collection::vec(0usize..5, 1..10)) {
    let asm = new_assembly();
    let prims = primitives(&asm);
    let members: Vec<TypeId> = order.iter().map(|idx| prims[*idx]).collect();
    let mut sorted = members.clone();
    sorted.sort();
    sorted.dedup();
    let a = asm.store().union(members.clone());
    let b = asm.store().union(sorted);
    prop_assert_eq!(a, b);
    // Idempotence: unioning again changes nothing.
    prop_assert_eq!(asm.store().union(vec![a]), a);
  }

  #[test]
  fn some_and_none_restrictions_partition_the_atoms(order in proptest::collection::vec(0usize..5, 1..6)) {
    let asm = new_assembly();
    let sp = asm.specials().clone();
    let prims = primitives(&asm);
    let members: Vec<TypeId> = order.iter().map(|idx| prims[*idx]).collect();
    let ty = asm.store().union(members);
    let some_side = asm.restrict_to(ty, sp.some);
    let none_side = asm.restrict_to(ty, sp.none);
    let mut rebuilt: Vec<TypeId> = Vec::new();
    rebuilt.extend(some_side);
    rebuilt.extend(none_side);
    prop_assert!(!rebuilt.is_empty());
    prop_assert_eq!(asm.store().union(rebuilt), ty);
  }

  #[test]
  fn record_subtyping_is_reflexive(names in proptest::collection::btree_set("[a-d]", 1..4)) {
    let asm = new_assembly();
    let sp = asm.specials().clone();
    let entries: Vec<RecordProp> = names
      .iter()
      .map(|name| RecordProp {
        name: asm.store().intern_name(name.clone()),
        ty: sp.int,
        optional: false,
      })
      .collect();
    let ty = asm.store().intern_type(TypeKind::Record(RecordType {
      entries,
      open: false,
    }));
    prop_assert!(asm.subtype_of(ty, ty));
  }
}
