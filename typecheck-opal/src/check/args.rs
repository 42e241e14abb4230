//! Argument resolution: binding expanded call-site argument lists to
//! function parameters or constructor fields under positional, named,
//! spread, optional, and rest rules.
//!
//! Resolution runs in phases over a slot vector: evaluate every argument in
//! source order, bind named arguments and record spreads, bind positional
//! arguments and tuple spreads against a cursor, then complete unfilled
//! slots from defaults or None and pack leftovers into a declared rest
//! collection.

use ast_opal::{Arg, ArgModifier, Expression, ParamDecl, RestParamDecl};
use diagnostics::TextRange;
use ir_opal::{IrAssembly, Op, Register};
use types_opal::{
  params_well_ordered, EntityRef, FunctionType, MemberRef, NameId, TermMap, TypeId, TypeKind,
};

use crate::codes;
use crate::error::CheckResult;

use super::expr::Checker;
use super::flow::Env;
use super::structural;

/// A parameter or field position a call argument can bind to.
pub struct Slot<'d> {
  pub name: String,
  pub ty: TypeId,
  pub optional: bool,
  pub default: Option<&'d Expression>,
}

/// A declared rest parameter: the collection type and its element type.
#[derive(Clone, Copy, Debug)]
pub struct RestInfo {
  pub ty: TypeId,
  pub elem: TypeId,
}

#[derive(Clone, Copy)]
struct Fill {
  reg: Register,
  must_def: bool,
}

struct Evaluated<'x> {
  arg: &'x Arg,
  reg: Register,
  ty: TypeId,
}

enum Pending {
  Positional(usize),
  TupleSpread(usize),
  RestCopy(usize),
}

impl<'a> Checker<'a> {
  /// Build slots for a declared parameter list under the callee's bindings.
  pub fn function_slots(
    &mut self,
    params: &'a [ParamDecl],
    rest: Option<&'a RestParamDecl>,
    callee_ns: &str,
    callee_terms: &TermMap,
    span: TextRange,
  ) -> CheckResult<(Vec<Slot<'a>>, Option<RestInfo>)> {
    if !params_well_ordered(params.iter().map(|p| p.optional), rest.is_some()) {
      return self.fail(
        codes::BAD_PARAMETER_ORDER,
        "optional parameters may not precede required ones or combine with a rest parameter",
        span,
      );
    }
    let mut slots = Vec::with_capacity(params.len());
    for param in params {
      let ty = self.normalize_in(&param.sig, callee_ns, callee_terms, param.span)?;
      slots.push(Slot {
        name: param.name.clone(),
        ty,
        optional: param.optional,
        default: param.default.as_ref(),
      });
    }
    let rest = match rest {
      Some(decl) => {
        let ty = self.normalize_in(&decl.sig, callee_ns, callee_terms, span)?;
        let Some(elem) = self.asm.rest_element_type(ty) else {
          return self.fail(
            codes::TYPE_MISMATCH,
            format!("rest parameter type `{}` is not a collection", self.display(ty)),
            span,
          );
        };
        Some(RestInfo { ty, elem })
      }
      None => None,
    };
    Ok((slots, rest))
  }

  /// Slots for calling a structural function value.
  pub fn lambda_slots(&mut self, func: &FunctionType) -> (Vec<Slot<'static>>, Option<RestInfo>) {
    let slots = func
      .params
      .iter()
      .map(|param| Slot {
        name: self.store().name(param.name),
        ty: param.ty,
        optional: param.optional,
        default: None,
      })
      .collect();
    let rest = func.rest.and_then(|ty| {
      self
        .asm
        .rest_element_type(ty)
        .map(|elem| RestInfo { ty, elem })
    });
    (slots, rest)
  }

  fn advance_cursor(
    &mut self,
    slots: &[Slot<'_>],
    filled: &[Option<Fill>],
    mut cursor: usize,
    span: TextRange,
  ) -> CheckResult<usize> {
    while cursor < slots.len() && filled[cursor].is_some() {
      if slots[cursor].optional {
        return self.fail(
          codes::AMBIGUOUS_CALL,
          format!(
            "positional placement past the already-bound optional parameter `{}` is ambiguous",
            slots[cursor].name
          ),
          span,
        );
      }
      cursor += 1;
    }
    Ok(cursor)
  }

  /// Conformance of a bound value against its slot, accounting for optional
  /// slots (which admit None) and only-optionally-present providers backed
  /// by a default.
  fn check_slot_conformance(
    &mut self,
    slot: &Slot<'_>,
    arg_ty: TypeId,
    must_def: bool,
    span: TextRange,
  ) -> CheckResult<()> {
    let specials = self.asm.specials();
    if !must_def && !slot.optional && slot.default.is_none() {
      return self.fail(
        codes::MISSING_REQUIRED,
        format!(
          "`{}` is required but its provider is only optionally present",
          slot.name
        ),
        span,
      );
    }
    let target = if slot.optional {
      self.store().union(vec![slot.ty, specials.none])
    } else {
      slot.ty
    };
    let mut value_ty = arg_ty;
    if !must_def && slot.default.is_some() {
      if let Some(stripped) = self.asm.restrict_not(arg_ty, specials.none) {
        value_ty = stripped;
      }
    }
    self.expect_subtype(value_ty, target, span)
  }

  /// Whether a type can only be expanded structurally one way.
  fn spread_shape(&self, ty: TypeId) -> (bool, bool) {
    let atoms = self.store().atoms(ty);
    let record = atoms.iter().all(|a| self.asm.record_rep(*a).is_some());
    let tuple = atoms.iter().all(|a| self.asm.tuple_rep(*a).is_some());
    (record, tuple)
  }

  fn collection_element(&self, ty: TypeId) -> Option<TypeId> {
    let atoms = self.store().atoms(ty);
    if atoms.len() != 1 {
      return None;
    }
    match self.store().type_kind(atoms[0]) {
      TypeKind::Entity(eref) if self.asm.is_collection(eref.decl) => self.asm.element_type(&eref),
      _ => None,
    }
  }

  /// Bind a call-site argument list against slots, returning the post-state
  /// environment and one register per slot (plus a packed rest register when
  /// a rest parameter is declared).
  pub fn resolve_call_args(
    &mut self,
    env: &Env,
    slots: &[Slot<'_>],
    rest: Option<&RestInfo>,
    args: &[Arg],
    span: TextRange,
  ) -> CheckResult<(Env, Vec<Register>)> {
    let mut cur = env.clone().clear_result();
    let specials = self.asm.specials();

    // Evaluate every argument in source order, biasing plain positionals
    // with the declared type of the parameter they would naively reach.
    let mut evaluated: Vec<Evaluated<'_>> = Vec::with_capacity(args.len());
    let mut positional_seen = 0usize;
    for arg in args {
      let hint = match &arg.modifier {
        ArgModifier::Named(name) => slots.iter().find(|s| &s.name == name).map(|s| s.ty),
        ArgModifier::Plain => {
          let hint = slots.get(positional_seen).map(|s| s.ty);
          positional_seen += 1;
          hint
        }
        ArgModifier::Spread => None,
      };
      let reg = self.emitter.generate_tmp_register();
      cur = self.check_expr_joined(&cur, &arg.value, reg, hint)?;
      evaluated.push(Evaluated {
        arg,
        reg,
        ty: cur.result_type().unwrap_or(specials.any),
      });
    }

    // Named and record-spread pass.
    let mut filled: Vec<Option<Fill>> = slots.iter().map(|_| None).collect();
    let mut pending: Vec<Pending> = Vec::new();
    for (idx, ev) in evaluated.iter().enumerate() {
      match &ev.arg.modifier {
        ArgModifier::Named(name) => {
          let Some(si) = slots.iter().position(|s| &s.name == name) else {
            return self.fail(
              codes::UNKNOWN_NAME,
              format!("no parameter or field named `{}`", name),
              ev.arg.span,
            );
          };
          if filled[si].is_some() {
            return self.fail(
              codes::DUPLICATE_NAME,
              format!("`{}` is bound more than once", name),
              ev.arg.span,
            );
          }
          self.check_slot_conformance(&slots[si], ev.ty, true, ev.arg.span)?;
          filled[si] = Some(Fill {
            reg: ev.reg,
            must_def: true,
          });
        }
        ArgModifier::Spread => {
          let (is_record, is_tuple) = self.spread_shape(ev.ty);
          if is_record {
            let ex = match structural::record_expando(self.asm, ev.ty) {
              Ok(ex) => ex,
              Err(err) => {
                return self.fail(codes::TYPE_MISMATCH, err.to_string(), ev.arg.span)
              }
            };
            if !ex.ok {
              return self.fail(
                codes::TYPE_MISMATCH,
                "an open record cannot be expanded into arguments",
                ev.arg.span,
              );
            }
            for name_id in &ex.all {
              let prop = self.store().name(*name_id);
              let Some(si) = slots.iter().position(|s| s.name == prop) else {
                return self.fail(
                  codes::UNKNOWN_NAME,
                  format!("no parameter or field named `{}`", prop),
                  ev.arg.span,
                );
              };
              if filled[si].is_some() {
                return self.fail(
                  codes::DUPLICATE_NAME,
                  format!("`{}` is bound more than once", prop),
                  ev.arg.span,
                );
              }
              let reg = self.emitter.generate_tmp_register();
              self.emitter.emit(Op::LoadProperty {
                trgt: reg,
                src: ev.reg,
                name: *name_id,
              });
              let must_def = ex.required.contains(name_id);
              let prop_ty = match structural::load_name_type(self.asm, ev.ty, *name_id) {
                Ok(ty) => ty,
                Err(err) => {
                  return self.fail(codes::TYPE_MISMATCH, err.to_string(), ev.arg.span)
                }
              };
              self.check_slot_conformance(&slots[si], prop_ty, must_def, ev.arg.span)?;
              filled[si] = Some(Fill { reg, must_def });
            }
          } else if is_tuple {
            pending.push(Pending::TupleSpread(idx));
          } else if rest.is_some() && self.collection_element(ev.ty).is_some() {
            pending.push(Pending::RestCopy(idx));
          } else {
            return self.fail(
              codes::TYPE_MISMATCH,
              format!("`{}` cannot be expanded into arguments", self.display(ev.ty)),
              ev.arg.span,
            );
          }
        }
        ArgModifier::Plain => pending.push(Pending::Positional(idx)),
      }
    }

    // Positional and tuple-spread pass.
    let mut cursor = 0usize;
    let mut leftover: Vec<(bool, Register, TypeId)> = Vec::new();
    for item in pending {
      match item {
        Pending::Positional(idx) => {
          let ev = &evaluated[idx];
          cursor = self.advance_cursor(slots, &filled, cursor, ev.arg.span)?;
          if cursor < slots.len() {
            let (reg, ty, arg_span) = (ev.reg, ev.ty, ev.arg.span);
            self.check_slot_conformance(&slots[cursor], ty, true, arg_span)?;
            filled[cursor] = Some(Fill {
              reg,
              must_def: true,
            });
            cursor += 1;
          } else if rest.is_some() {
            leftover.push((false, ev.reg, ev.ty));
          } else {
            return self.fail(codes::TYPE_MISMATCH, "too many arguments", ev.arg.span);
          }
        }
        Pending::TupleSpread(idx) => {
          let ev = &evaluated[idx];
          let ex = match structural::tuple_expando(self.asm, ev.ty) {
            Ok(ex) => ex,
            Err(err) => return self.fail(codes::TYPE_MISMATCH, err.to_string(), ev.arg.span),
          };
          if !ex.ok {
            return self.fail(
              codes::TYPE_MISMATCH,
              "an open tuple cannot be expanded into arguments",
              ev.arg.span,
            );
          }
          for index in 0..ex.max_len {
            let elem_reg = self.emitter.generate_tmp_register();
            self.emitter.emit(Op::LoadTupleIndex {
              trgt: elem_reg,
              src: evaluated[idx].reg,
              index,
            });
            let elem_ty = match structural::load_index_type(self.asm, evaluated[idx].ty, index) {
              Ok(ty) => ty,
              Err(err) => {
                return self.fail(codes::TYPE_MISMATCH, err.to_string(), evaluated[idx].arg.span)
              }
            };
            let arg_span = evaluated[idx].arg.span;
            let must_def = index < ex.req_len;
            cursor = self.advance_cursor(slots, &filled, cursor, arg_span)?;
            if cursor < slots.len() {
              self.check_slot_conformance(&slots[cursor], elem_ty, must_def, arg_span)?;
              filled[cursor] = Some(Fill {
                reg: elem_reg,
                must_def,
              });
              cursor += 1;
            } else if rest.is_some() {
              leftover.push((false, elem_reg, elem_ty));
            } else {
              return self.fail(codes::TYPE_MISMATCH, "too many arguments", arg_span);
            }
          }
        }
        Pending::RestCopy(idx) => {
          let ev = &evaluated[idx];
          let arg_span = ev.arg.span;
          cursor = self.advance_cursor(slots, &filled, cursor, arg_span)?;
          if cursor < slots.len() {
            return self.fail(
              codes::TYPE_MISMATCH,
              "a collection spread can only feed a rest parameter",
              arg_span,
            );
          }
          leftover.push((true, ev.reg, ev.ty));
        }
      }
    }

    // Optional/rest completion.
    let mut final_regs = Vec::with_capacity(slots.len() + 1);
    for (si, slot) in slots.iter().enumerate() {
      match filled[si] {
        Some(fill) => final_regs.push(fill.reg),
        None => {
          if let Some(default) = slot.default {
            let reg = self.emitter.generate_tmp_register();
            let denv = Env::new((*cur.terms).clone());
            let denv = self.check_expr_joined(&denv, default, reg, Some(slot.ty))?;
            let dty = denv.result_type().unwrap_or(specials.any);
            self.expect_subtype(dty, slot.ty, default.span)?;
            final_regs.push(reg);
          } else if slot.optional {
            let reg = self.emitter.generate_tmp_register();
            self.emitter.emit(Op::LoadConstNone { trgt: reg });
            final_regs.push(reg);
          } else {
            return self.fail(
              codes::MISSING_REQUIRED,
              format!("missing required `{}`", slot.name),
              span,
            );
          }
        }
      }
    }

    if let Some(rest) = rest {
      let reg = self.pack_rest(rest, &leftover, span)?;
      final_regs.push(reg);
    }

    Ok((cur, final_regs))
  }

  /// Pack leftover positional arguments through the collection constructor
  /// of the rest parameter's type.
  fn pack_rest(
    &mut self,
    rest: &RestInfo,
    leftover: &[(bool, Register, TypeId)],
    span: TextRange,
  ) -> CheckResult<Register> {
    let type_key = IrAssembly::type_key(self.asm, rest.ty);
    for (is_copy, _, ty) in leftover {
      if *is_copy {
        let Some(elem) = self.collection_element(*ty) else {
          return self.fail(
            codes::TYPE_MISMATCH,
            format!("`{}` is not a collection", self.display(*ty)),
            span,
          );
        };
        self.expect_subtype(elem, rest.elem, span)?;
      } else {
        self.expect_subtype(*ty, rest.elem, span)?;
      }
    }
    let reg = self.emitter.generate_tmp_register();
    let op = if leftover.is_empty() {
      Op::ConstructorPrimaryCollectionEmpty {
        trgt: reg,
        type_key,
      }
    } else if leftover.iter().all(|(is_copy, _, _)| !is_copy) {
      Op::ConstructorPrimaryCollectionSingletons {
        trgt: reg,
        type_key,
        args: leftover.iter().map(|(_, r, _)| *r).collect(),
      }
    } else if leftover.iter().all(|(is_copy, _, _)| *is_copy) {
      Op::ConstructorPrimaryCollectionCopies {
        trgt: reg,
        type_key,
        args: leftover.iter().map(|(_, r, _)| *r).collect(),
      }
    } else {
      Op::ConstructorPrimaryCollectionMixed {
        trgt: reg,
        type_key,
        args: leftover.iter().map(|(c, r, _)| (*c, *r)).collect(),
      }
    };
    self.emitter.emit(op);
    Ok(reg)
  }

  /// Constructor for collection entities. Arguments must all be unnamed;
  /// plain arguments conform to the element type, spreads copy from another
  /// collection with a conforming element type.
  pub fn check_collection_ctor(
    &mut self,
    env: &Env,
    eref: &EntityRef,
    elem: TypeId,
    args: &[Arg],
    trgt: Register,
    span: TextRange,
  ) -> CheckResult<Env> {
    let entity_ty = self
      .store()
      .intern_type(TypeKind::Entity(eref.clone()));
    let type_key = IrAssembly::type_key(self.asm, entity_ty);
    let mut cur = env.clone().clear_result();
    let specials = self.asm.specials();
    let mut items: Vec<(bool, Register)> = Vec::with_capacity(args.len());
    for arg in args {
      match &arg.modifier {
        ArgModifier::Named(name) => {
          return self.fail(
            codes::UNSUPPORTED_OP,
            format!("named argument `{}` is not allowed in a collection constructor", name),
            arg.span,
          );
        }
        ArgModifier::Plain => {
          let reg = self.emitter.generate_tmp_register();
          cur = self.check_expr_joined(&cur, &arg.value, reg, Some(elem))?;
          let ty = cur.result_type().unwrap_or(specials.any);
          self.expect_subtype(ty, elem, arg.span)?;
          items.push((false, reg));
        }
        ArgModifier::Spread => {
          let reg = self.emitter.generate_tmp_register();
          cur = self.check_expr_joined(&cur, &arg.value, reg, None)?;
          let ty = cur.result_type().unwrap_or(specials.any);
          let Some(src_elem) = self.collection_element(ty) else {
            return self.fail(
              codes::TYPE_MISMATCH,
              format!("`{}` is not a collection", self.display(ty)),
              arg.span,
            );
          };
          self.expect_subtype(src_elem, elem, arg.span)?;
          items.push((true, reg));
        }
      }
    }
    let op = if items.is_empty() {
      Op::ConstructorPrimaryCollectionEmpty { trgt, type_key }
    } else if items.iter().all(|(copy, _)| !copy) {
      Op::ConstructorPrimaryCollectionSingletons {
        trgt,
        type_key,
        args: items.iter().map(|(_, r)| *r).collect(),
      }
    } else if items.iter().all(|(copy, _)| *copy) {
      Op::ConstructorPrimaryCollectionCopies {
        trgt,
        type_key,
        args: items.iter().map(|(_, r)| *r).collect(),
      }
    } else {
      Op::ConstructorPrimaryCollectionMixed {
        trgt,
        type_key,
        args: items,
      }
    };
    self.emitter.emit(op);
    Ok(cur)
  }

  /// Primary constructor for a non-collection entity: bind arguments against
  /// the sorted list of all fields, inherited and declared.
  pub fn check_entity_ctor(
    &mut self,
    env: &Env,
    eref: &EntityRef,
    args: &[Arg],
    trgt: Register,
    span: TextRange,
  ) -> CheckResult<Env> {
    let fields = self.asm.all_fields(eref);
    let mut slots = Vec::with_capacity(fields.len());
    for (name, mref) in &fields {
      let ty = match self.asm.field_type(mref) {
        Ok(ty) => ty,
        Err(err) => return self.fail(Self::type_error_code(&err), err.to_string(), span),
      };
      slots.push(Slot {
        name: name.clone(),
        ty,
        optional: false,
        default: self.asm.field(mref).default.as_ref(),
      });
    }
    let (cur, regs) = self.resolve_call_args(env, &slots, None, args, span)?;
    let type_key = self.owner_type_key(eref);
    self.emitter.emit(Op::ConstructorPrimary {
      trgt,
      type_key,
      args: regs,
    });
    Ok(cur)
  }

  /// Re-run entity field resolution using a factory's structural result as
  /// an expando record held in `src`.
  pub fn entity_ctor_from_expando(
    &mut self,
    env: Env,
    eref: &EntityRef,
    src: Register,
    src_ty: TypeId,
    trgt: Register,
    span: TextRange,
  ) -> CheckResult<Env> {
    let ex = match structural::record_expando(self.asm, src_ty) {
      Ok(ex) => ex,
      Err(err) => {
        return self.fail(
          codes::TYPE_MISMATCH,
          format!("factory result cannot seed a constructor: {}", err),
          span,
        )
      }
    };
    if !ex.ok {
      return self.fail(
        codes::TYPE_MISMATCH,
        "factory result record must be closed",
        span,
      );
    }
    let fields = self.asm.all_fields(eref);
    for name_id in &ex.all {
      let prop = self.store().name(*name_id);
      if !fields.contains_key(&prop) {
        return self.fail(
          codes::UNKNOWN_NAME,
          format!("no field named `{}`", prop),
          span,
        );
      }
    }
    let specials = self.asm.specials();
    let mut regs = Vec::with_capacity(fields.len());
    for (name, mref) in &fields {
      let name_id = self.store().intern_name(name);
      let field_ty = match self.asm.field_type(mref) {
        Ok(ty) => ty,
        Err(err) => return self.fail(Self::type_error_code(&err), err.to_string(), span),
      };
      let has_default = self.asm.field(mref).default.is_some();
      if ex.all.contains(&name_id) {
        let reg = self.emitter.generate_tmp_register();
        self.emitter.emit(Op::LoadProperty {
          trgt: reg,
          src,
          name: name_id,
        });
        let must_def = ex.required.contains(&name_id);
        if !must_def && !has_default {
          return self.fail(
            codes::MISSING_REQUIRED,
            format!("`{}` is required but only optionally provided", name),
            span,
          );
        }
        let prop_ty = match structural::load_name_type(self.asm, src_ty, name_id) {
          Ok(ty) => ty,
          Err(err) => return self.fail(codes::TYPE_MISMATCH, err.to_string(), span),
        };
        let mut value_ty = prop_ty;
        if !must_def {
          if let Some(stripped) = self.asm.restrict_not(prop_ty, specials.none) {
            value_ty = stripped;
          }
        }
        self.expect_subtype(value_ty, field_ty, span)?;
        regs.push(reg);
      } else if let Some(default) = self.asm.field(mref).default.as_ref() {
        let reg = self.emitter.generate_tmp_register();
        let denv = Env::new((*env.terms).clone());
        let denv = self.check_expr_joined(&denv, default, reg, Some(field_ty))?;
        let dty = denv.result_type().unwrap_or(specials.any);
        self.expect_subtype(dty, field_ty, span)?;
        regs.push(reg);
      } else {
        return self.fail(
          codes::MISSING_REQUIRED,
          format!("missing required field `{}`", name),
          span,
        );
      }
    }
    let type_key = self.owner_type_key(eref);
    self.emitter.emit(Op::ConstructorPrimary {
      trgt,
      type_key,
      args: regs,
    });
    Ok(env)
  }

  /// Resolve and emit a static function call on a nominal receiver.
  pub fn check_static_call(
    &mut self,
    env: &Env,
    mref: &MemberRef,
    targs: &[TypeId],
    args: &[Arg],
    trgt: Register,
    span: TextRange,
  ) -> CheckResult<(Env, TypeId)> {
    let decl = self.asm.decl(mref.origin.decl);
    let sdecl = self.asm.static_of(mref);
    let mut callee_terms = self.asm.binds_of(&mref.origin);
    match self
      .asm
      .resolve_binds_for_call(&sdecl.type_params, targs, &decl.ns)
    {
      Ok(own) => callee_terms.extend(own),
      Err(err) => return self.fail(Self::type_error_code(&err), err.to_string(), span),
    }
    let (slots, rest) =
      self.function_slots(&sdecl.params, sdecl.rest.as_ref(), &decl.ns, &callee_terms, span)?;
    let (cur, regs) = self.resolve_call_args(env, &slots, rest.as_ref(), args, span)?;
    let owner = self.owner_type_key(&mref.origin);
    let key = IrAssembly::static_key(&owner, &sdecl.name);
    self.irasm.register_static_call(key.clone());
    self.emitter.emit(Op::CallStaticFunction {
      trgt,
      func_key: key,
      args: regs,
    });
    let result = self.normalize_in(&sdecl.result, &decl.ns, &callee_terms, span)?;
    Ok((cur, result))
  }
}
