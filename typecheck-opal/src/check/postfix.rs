//! Postfix operator chains: access, projection, modification, structured
//! extension, invocation, and lambda application, with the shared `?.`
//! short-circuit merge and the `is`/`isSome`/`isNone` narrowing shortcut.
//!
//! A chain evaluates its root, then threads a current register and
//! multi-flow through each op. Every elvis-marked op first splits the flow
//! on None, jumping None values to a block shared by the whole chain that
//! loads None into the final target.

use ast_opal::{Arg, ExprKind, Expression, PostfixOp, PostfixOpKind};
use diagnostics::TextRange;
use ir_opal::{IrAssembly, Op, Register};
use types_opal::{
  FunctionParam, FunctionType, MemberKind, MemberLookup, MemberRef, RecordProp, RecordType,
  TupleEntry, TupleType, TypeId, TypeKind,
};

use crate::codes;
use crate::error::CheckResult;

use super::expr::Checker;
use super::flow::{Env, Truth};
use super::structural::{self, StructError};

impl<'a> Checker<'a> {
  pub fn check_postfix(
    &mut self,
    env: &Env,
    root: &Expression,
    ops: &[PostfixOp],
    trgt: Register,
  ) -> CheckResult<Vec<Env>> {
    let mut cur_reg = self.emitter.generate_tmp_register();
    let mut cur_flows = self.check_expression(env, root, cur_reg, None)?;
    if ops.is_empty() {
      self.emitter.emit(Op::RegAssign { trgt, src: cur_reg });
      return Ok(cur_flows);
    }
    let root_var: Option<String> = match &root.kind {
      ExprKind::AccessVariable { name } => Some(name.clone()),
      _ => None,
    };
    let has_elvis = ops.iter().any(|op| op.is_elvis);
    let blocks = if has_elvis {
      let none_block = self.emitter.create_new_block("chain_none");
      let done_block = self.emitter.create_new_block("chain_done");
      Some((none_block, done_block))
    } else {
      None
    };
    let mut short_circuited: Vec<Env> = Vec::new();

    for (idx, op) in ops.iter().enumerate() {
      if op.is_elvis {
        let (some_side, none_side) = self.split_none(&cur_flows, None);
        if none_side.is_empty() {
          return self.fail(
            codes::REDUNDANT_NULL_CHECK,
            "None value is not possible",
            op.span,
          );
        }
        if some_side.is_empty() {
          return self.fail(codes::REDUNDANT_NULL_CHECK, "value is always None", op.span);
        }
        let (none_block, _) = blocks.expect("elvis chain has a none block");
        let cont = self.emitter.create_new_block("chain_step");
        self.emitter.emit(Op::NoneJump {
          src: cur_reg,
          none_block,
          some_block: cont,
        });
        self.emitter.set_active_block(cont);
        short_circuited.extend(none_side);
        cur_flows = some_side;
      }
      let step_env = Env::join(cur_flows, self.asm);
      let new_reg = self.emitter.generate_tmp_register();
      let narrow_var = if idx == 0 { root_var.as_deref() } else { None };
      cur_flows = self.check_postfix_op(&step_env, op, cur_reg, new_reg, narrow_var)?;
      cur_reg = new_reg;
    }

    self.emitter.emit(Op::RegAssign { trgt, src: cur_reg });
    if let Some((none_block, done_block)) = blocks {
      self.emitter.emit(Op::DirectJump { target: done_block });
      self.emitter.set_active_block(none_block);
      self.emitter.emit(Op::LoadConstNone { trgt });
      self.emitter.emit(Op::DirectJump { target: done_block });
      self.emitter.set_active_block(done_block);
    }
    let mut out = cur_flows;
    out.extend(short_circuited);
    Ok(out)
  }

  fn struct_error_code(err: &StructError) -> codes::Code {
    match err {
      StructError::AmbiguousField(_) => codes::AMBIGUOUS_FIELD,
      StructError::UnknownField(_) => codes::UNKNOWN_NAME,
      _ => codes::TYPE_MISMATCH,
    }
  }

  fn check_postfix_op(
    &mut self,
    env: &Env,
    op: &PostfixOp,
    src: Register,
    trgt: Register,
    narrow_var: Option<&str>,
  ) -> CheckResult<Vec<Env>> {
    let specials = self.specials();
    let base_ty = env.result_type().unwrap_or(specials.any);
    let span = op.span;
    match &op.kind {
      PostfixOpKind::AccessIndex(index) => {
        let index = self.tuple_index(*index, span)?;
        let ty = match structural::load_index_type(self.asm, base_ty, index) {
          Ok(ty) => ty,
          Err(err) => return self.fail(Self::struct_error_code(&err), err.to_string(), span),
        };
        self.emitter.emit(Op::LoadTupleIndex { trgt, src, index });
        Ok(vec![env.clone().with_result(ty, Truth::Unknown)])
      }
      PostfixOpKind::AccessName(name) => {
        let record_like = self
          .store()
          .atoms(base_ty)
          .iter()
          .all(|a| self.asm.record_rep(*a).is_some());
        if record_like {
          let name_id = self.store().intern_name(name);
          let ty = match structural::load_name_type(self.asm, base_ty, name_id) {
            Ok(ty) => ty,
            Err(err) => return self.fail(Self::struct_error_code(&err), err.to_string(), span),
          };
          self.emitter.emit(Op::LoadProperty {
            trgt,
            src,
            name: name_id,
          });
          return Ok(vec![env.clone().with_result(ty, Truth::Unknown)]);
        }
        let mref = match self.lookup_member(base_ty, MemberKind::Field, name) {
          MemberLookup::Unique(mref) => mref,
          MemberLookup::Ambiguous => {
            return self.fail(
              codes::AMBIGUOUS_FIELD,
              format!("field `{}` does not resolve uniquely", name),
              span,
            )
          }
          MemberLookup::NotFound => {
            return self.fail(
              codes::UNKNOWN_NAME,
              format!("`{}` has no field `{}`", self.display(base_ty), name),
              span,
            )
          }
        };
        let ty = match self.asm.field_type(&mref) {
          Ok(ty) => ty,
          Err(err) => return self.fail(Self::type_error_code(&err), err.to_string(), span),
        };
        let owner = self.owner_type_key(&mref.origin);
        self.emitter.emit(Op::LoadField {
          trgt,
          src,
          field_key: IrAssembly::field_key(&owner, name),
        });
        Ok(vec![env.clone().with_result(ty, Truth::Unknown)])
      }
      PostfixOpKind::ProjectIndices(indices) => {
        let mut entries = Vec::with_capacity(indices.len());
        let mut idxs = Vec::with_capacity(indices.len());
        for index in indices {
          let index = self.tuple_index(*index, span)?;
          let ty = match structural::load_index_type(self.asm, base_ty, index) {
            Ok(ty) => ty,
            Err(err) => return self.fail(Self::struct_error_code(&err), err.to_string(), span),
          };
          idxs.push(index);
          entries.push(TupleEntry {
            ty,
            optional: false,
          });
        }
        let ty = self.store().intern_type(TypeKind::Tuple(TupleType {
          entries,
          open: false,
        }));
        self.emitter.emit(Op::ProjectTupleIndices {
          trgt,
          src,
          indices: idxs,
        });
        Ok(vec![env.clone().with_result(ty, Truth::Unknown)])
      }
      PostfixOpKind::ProjectNames(names) => {
        let mut props = Vec::with_capacity(names.len());
        let mut ids = Vec::with_capacity(names.len());
        for name in names {
          let name_id = self.store().intern_name(name);
          let ty = match structural::load_name_type(self.asm, base_ty, name_id) {
            Ok(ty) => ty,
            Err(err) => return self.fail(Self::struct_error_code(&err), err.to_string(), span),
          };
          ids.push(name_id);
          props.push(RecordProp {
            name: name_id,
            ty,
            optional: false,
          });
        }
        let ty = self.store().intern_type(TypeKind::Record(RecordType {
          entries: props,
          open: false,
        }));
        self.emitter.emit(Op::ProjectRecordNames {
          trgt,
          src,
          names: ids,
        });
        Ok(vec![env.clone().with_result(ty, Truth::Unknown)])
      }
      PostfixOpKind::ProjectType(sig) => {
        let pattern = self.resolve_sig(sig, sig.span)?;
        if self.store().atoms(pattern).len() != 1 {
          return self.fail(
            codes::TYPE_MISMATCH,
            "projection pattern must be a single atom",
            sig.span,
          );
        }
        let ty = match structural::project_type(self.asm, base_ty, pattern) {
          Ok(ty) => ty,
          Err(err) => return self.fail(Self::struct_error_code(&err), err.to_string(), span),
        };
        self.emitter.emit(Op::ProjectType {
          trgt,
          src,
          ty: pattern,
        });
        Ok(vec![env.clone().with_result(ty, Truth::Unknown)])
      }
      PostfixOpKind::ModifyIndices(updates) => {
        let mut cur = env.clone();
        let mut regs = Vec::with_capacity(updates.len());
        let mut typed = Vec::with_capacity(updates.len());
        for (index, value) in updates {
          let index = self.tuple_index(*index, span)?;
          let reg = self.emitter.generate_tmp_register();
          cur = self.check_expr_joined(&cur, value, reg, None)?;
          let vty = cur.result_type().unwrap_or(specials.any);
          regs.push((index, reg));
          typed.push((index, vty));
        }
        let ty = match structural::update_indices_type(self.asm, base_ty, &typed) {
          Ok(ty) => ty,
          Err(err) => return self.fail(Self::struct_error_code(&err), err.to_string(), span),
        };
        self.emitter.emit(Op::ModifyWithIndices {
          trgt,
          src,
          updates: regs,
        });
        Ok(vec![cur.with_result(ty, Truth::Unknown)])
      }
      PostfixOpKind::ModifyNames(updates) => {
        let mut cur = env.clone();
        let mut regs = Vec::with_capacity(updates.len());
        let mut typed = Vec::with_capacity(updates.len());
        for (name, value) in updates {
          let name_id = self.store().intern_name(name);
          let reg = self.emitter.generate_tmp_register();
          cur = self.check_expr_joined(&cur, value, reg, None)?;
          let vty = cur.result_type().unwrap_or(specials.any);
          regs.push((name_id, reg));
          typed.push((name_id, vty));
        }
        let ty = match structural::update_names_type(self.asm, base_ty, &typed) {
          Ok(ty) => ty,
          Err(err) => return self.fail(Self::struct_error_code(&err), err.to_string(), span),
        };
        self.emitter.emit(Op::ModifyWithNames {
          trgt,
          src,
          updates: regs,
        });
        Ok(vec![cur.with_result(ty, Truth::Unknown)])
      }
      PostfixOpKind::Extend(value) => {
        let ereg = self.emitter.generate_tmp_register();
        let cur = self.check_expr_joined(env, value, ereg, None)?;
        let ext_ty = cur.result_type().unwrap_or(specials.any);
        let atoms = self.store().atoms(base_ty);
        let all_tuple = atoms.iter().all(|a| self.asm.tuple_rep(*a).is_some());
        let all_record = atoms.iter().all(|a| self.asm.record_rep(*a).is_some());
        let all_nominal = atoms.iter().all(|a| {
          matches!(
            self.store().type_kind(*a),
            TypeKind::Entity(_) | TypeKind::Concept(_)
          )
        });
        let (ty, op) = if all_tuple {
          let ty = match structural::append_tuple_type(self.asm, base_ty, ext_ty) {
            Ok(ty) => ty,
            Err(err) => return self.fail(Self::struct_error_code(&err), err.to_string(), span),
          };
          (ty, Op::StructuredExtendTuple { trgt, src, ext: ereg })
        } else if all_record {
          let ty = match structural::merge_record_type(self.asm, base_ty, ext_ty) {
            Ok(ty) => ty,
            Err(err) => return self.fail(Self::struct_error_code(&err), err.to_string(), span),
          };
          (ty, Op::StructuredExtendRecord { trgt, src, ext: ereg })
        } else if all_nominal {
          let ty = match structural::merge_object_type(self.asm, base_ty, ext_ty) {
            Ok(ty) => ty,
            Err(err) => return self.fail(Self::struct_error_code(&err), err.to_string(), span),
          };
          (ty, Op::StructuredExtendObject { trgt, src, ext: ereg })
        } else {
          return self.fail(
            codes::TYPE_MISMATCH,
            format!("`{}` has no structural supertype to extend", self.display(base_ty)),
            span,
          );
        };
        self.emitter.emit(op);
        Ok(vec![cur.with_result(ty, Truth::Unknown)])
      }
      PostfixOpKind::Invoke { name, terms, args } => {
        self.check_invoke(env, base_ty, name, terms, args, src, trgt, narrow_var, span)
      }
      PostfixOpKind::CallLambda { args } => {
        let func = self.unique_function_atom(base_ty, span)?;
        let (slots, rest) = self.lambda_slots(&func);
        let (cur, regs) = self.resolve_call_args(env, &slots, rest.as_ref(), args, span)?;
        self.emitter.emit(Op::CallLambda {
          trgt,
          func: src,
          args: regs,
        });
        Ok(vec![cur.with_result(func.result, Truth::Unknown)])
      }
    }
  }

  fn tuple_index(&mut self, index: i64, span: TextRange) -> CheckResult<usize> {
    if index < 0 {
      return self.fail(codes::UNSUPPORTED_OP, "tuple index must be non-negative", span);
    }
    Ok(index as usize)
  }

  fn unique_function_atom(&mut self, ty: TypeId, span: TextRange) -> CheckResult<FunctionType> {
    let atoms = self.store().atoms(ty);
    if atoms.len() == 1 {
      if let TypeKind::Function(func) = self.store().type_kind(atoms[0]) {
        return Ok(func);
      }
    }
    self.fail(
      codes::TYPE_MISMATCH,
      format!("`{}` is not a callable function value", self.display(ty)),
      span,
    )
  }

  #[allow(clippy::too_many_arguments)]
  fn check_invoke(
    &mut self,
    env: &Env,
    base_ty: TypeId,
    name: &str,
    terms: &[ast_opal::TypeSig],
    args: &[Arg],
    src: Register,
    trgt: Register,
    narrow_var: Option<&str>,
    span: TextRange,
  ) -> CheckResult<Vec<Env>> {
    if matches!(name, "is" | "isNone" | "isSome" | "as" | "tryAs" | "defaultAs") {
      return self.check_universal_invoke(env, base_ty, name, terms, args, src, trgt, narrow_var, span);
    }
    let atoms = self.store().atoms(base_ty);
    let targs = terms
      .iter()
      .map(|t| self.resolve_sig(t, t.span))
      .collect::<CheckResult<Vec<_>>>()?;

    let unique_entity =
      atoms.len() == 1 && matches!(self.store().type_kind(atoms[0]), TypeKind::Entity(_));
    let method_lookup = if unique_entity {
      // Direct dispatch targets the most-derived override.
      self.asm.member_nearest(atoms[0], MemberKind::Method, name)
    } else {
      self.asm.member_root(base_ty, MemberKind::Method, name)
    };
    match method_lookup {
      MemberLookup::Unique(mref) => {
        if unique_entity {
          self.dispatch_known(env, &mref, &targs, args, src, trgt, span)
        } else {
          self.dispatch_virtual(env, base_ty, &mref, &targs, args, src, trgt, span)
        }
      }
      MemberLookup::Ambiguous => self.fail(
        codes::AMBIGUOUS_CALL,
        format!("method `{}` does not resolve to a unique root", name),
        span,
      ),
      MemberLookup::NotFound => {
        // A record property or object field holding a lambda.
        let record_like = atoms.iter().all(|a| self.asm.record_rep(*a).is_some());
        let freg = self.emitter.generate_tmp_register();
        let fty = if record_like {
          let name_id = self.store().intern_name(name);
          let ty = match structural::load_name_type(self.asm, base_ty, name_id) {
            Ok(ty) => ty,
            Err(err) => return self.fail(Self::struct_error_code(&err), err.to_string(), span),
          };
          self.emitter.emit(Op::LoadProperty {
            trgt: freg,
            src,
            name: name_id,
          });
          ty
        } else {
          let mref = match self.lookup_member(base_ty, MemberKind::Field, name) {
            MemberLookup::Unique(mref) => mref,
            MemberLookup::Ambiguous => {
              return self.fail(
                codes::AMBIGUOUS_FIELD,
                format!("field `{}` does not resolve uniquely", name),
                span,
              )
            }
            MemberLookup::NotFound => {
              return self.fail(
                codes::UNKNOWN_NAME,
                format!("`{}` has no method or field `{}`", self.display(base_ty), name),
                span,
              )
            }
          };
          let ty = match self.asm.field_type(&mref) {
            Ok(ty) => ty,
            Err(err) => return self.fail(Self::type_error_code(&err), err.to_string(), span),
          };
          let owner = self.owner_type_key(&mref.origin);
          self.emitter.emit(Op::LoadField {
            trgt: freg,
            src,
            field_key: IrAssembly::field_key(&owner, name),
          });
          ty
        };
        let func = self.unique_function_atom(fty, span)?;
        let (slots, rest) = self.lambda_slots(&func);
        let (cur, regs) = self.resolve_call_args(env, &slots, rest.as_ref(), args, span)?;
        self.emitter.emit(Op::CallLambda {
          trgt,
          func: freg,
          args: regs,
        });
        Ok(vec![cur.with_result(func.result, Truth::Unknown)])
      }
    }
  }

  #[allow(clippy::too_many_arguments)]
  fn check_universal_invoke(
    &mut self,
    env: &Env,
    base_ty: TypeId,
    name: &str,
    terms: &[ast_opal::TypeSig],
    args: &[Arg],
    src: Register,
    trgt: Register,
    narrow_var: Option<&str>,
    span: TextRange,
  ) -> CheckResult<Vec<Env>> {
    let specials = self.specials();
    let target = match name {
      "isNone" => {
        if !terms.is_empty() {
          return self.fail(codes::UNSUPPORTED_OP, "isNone takes no template arguments", span);
        }
        specials.none
      }
      "isSome" => {
        if !terms.is_empty() {
          return self.fail(codes::UNSUPPORTED_OP, "isSome takes no template arguments", span);
        }
        specials.some
      }
      _ => {
        if terms.len() != 1 {
          return self.fail(
            codes::UNSUPPORTED_OP,
            format!("`{}` takes exactly one template argument", name),
            span,
          );
        }
        self.resolve_sig(&terms[0], terms[0].span)?
      }
    };
    let method_key = IrAssembly::method_key("Any", &format!("{}<{}>", name, self.display(target)));
    match name {
      "is" | "isNone" | "isSome" => {
        if !args.is_empty() {
          return self.fail(codes::UNSUPPORTED_OP, "type tests take no arguments", span);
        }
        let t_true = self.asm.restrict_to(base_ty, target);
        let t_false = self.asm.restrict_not(base_ty, target);
        let none_test = target == specials.none || target == specials.some;
        if t_true.is_none() {
          let message = if none_test {
            "value is never None".to_string()
          } else {
            "type test is always false".to_string()
          };
          let code = if none_test {
            codes::REDUNDANT_NULL_CHECK
          } else {
            codes::REDUNDANT_TRUTH
          };
          return self.fail(code, message, span);
        }
        if t_false.is_none() {
          let message = if none_test {
            "value is always None".to_string()
          } else {
            "type test is always true".to_string()
          };
          let code = if none_test {
            codes::REDUNDANT_NULL_CHECK
          } else {
            codes::REDUNDANT_TRUTH
          };
          return self.fail(code, message, span);
        }
        self.irasm.register_method_call(method_key.clone());
        self.emitter.emit(Op::CallKnownTarget {
          trgt,
          method_key,
          this: src,
          args: Vec::new(),
        });
        let mut true_env = env.clone().with_result(specials.bool_, Truth::True);
        let mut false_env = env.clone().with_result(specials.bool_, Truth::False);
        if let Some(var) = narrow_var {
          if let Some(info) = env.lookup_var(var).cloned() {
            if let Some(narrowed) = self.asm.restrict_to(info.flow, target) {
              true_env.narrow_var(var, narrowed);
            }
            if let Some(widened) = self.asm.restrict_not(info.flow, target) {
              false_env.narrow_var(var, widened);
            }
          }
        }
        Ok(vec![true_env, false_env])
      }
      "as" => {
        if !args.is_empty() {
          return self.fail(codes::UNSUPPORTED_OP, "as takes no arguments", span);
        }
        self.irasm.register_method_call(method_key.clone());
        self.emitter.emit(Op::CallKnownTarget {
          trgt,
          method_key,
          this: src,
          args: Vec::new(),
        });
        Ok(vec![env.clone().with_result(target, Truth::Unknown)])
      }
      "tryAs" => {
        if !args.is_empty() {
          return self.fail(codes::UNSUPPORTED_OP, "tryAs takes no arguments", span);
        }
        self.irasm.register_method_call(method_key.clone());
        self.emitter.emit(Op::CallKnownTarget {
          trgt,
          method_key,
          this: src,
          args: Vec::new(),
        });
        let ty = self.store().union(vec![target, specials.none]);
        Ok(vec![env.clone().with_result(ty, Truth::Unknown)])
      }
      "defaultAs" => {
        let [arg] = args else {
          return self.fail(codes::UNSUPPORTED_OP, "defaultAs takes exactly one argument", span);
        };
        if !matches!(arg.modifier, ast_opal::ArgModifier::Plain) {
          return self.fail(codes::UNSUPPORTED_OP, "defaultAs takes a plain argument", span);
        }
        let dreg = self.emitter.generate_tmp_register();
        let cur = self.check_expr_joined(env, &arg.value, dreg, Some(target))?;
        let dty = cur.result_type().unwrap_or(specials.any);
        self.expect_subtype(dty, target, arg.span)?;
        self.irasm.register_method_call(method_key.clone());
        self.emitter.emit(Op::CallKnownTarget {
          trgt,
          method_key,
          this: src,
          args: vec![dreg],
        });
        Ok(vec![cur.with_result(target, Truth::Unknown)])
      }
      _ => unreachable!("universal invoke names are matched above"),
    }
  }

  fn dispatch_known(
    &mut self,
    env: &Env,
    mref: &MemberRef,
    targs: &[TypeId],
    args: &[Arg],
    src: Register,
    trgt: Register,
    span: TextRange,
  ) -> CheckResult<Vec<Env>> {
    let decl = self.asm.decl(mref.origin.decl);
    let mdecl = self.asm.method(mref);
    let mut callee_terms = self.asm.binds_of(&mref.origin);
    match self
      .asm
      .resolve_binds_for_call(&mdecl.type_params, targs, &decl.ns)
    {
      Ok(own) => callee_terms.extend(own),
      Err(err) => return self.fail(Self::type_error_code(&err), err.to_string(), span),
    }
    let (slots, rest) =
      self.function_slots(&mdecl.params, mdecl.rest.as_ref(), &decl.ns, &callee_terms, span)?;
    let (cur, regs) = self.resolve_call_args(env, &slots, rest.as_ref(), args, span)?;
    let owner = self.owner_type_key(&mref.origin);
    let key = IrAssembly::method_key(&owner, &mdecl.name);
    self.irasm.register_method_call(key.clone());
    self.emitter.emit(Op::CallKnownTarget {
      trgt,
      method_key: key,
      this: src,
      args: regs,
    });
    let result = self.normalize_in(&mdecl.result, &decl.ns, &callee_terms, span)?;
    Ok(vec![cur.with_result(result, Truth::Unknown)])
  }

  /// Virtual dispatch: every atom reaches the method through a shared root;
  /// the per-atom signatures must unify to a single function type.
  #[allow(clippy::too_many_arguments)]
  fn dispatch_virtual(
    &mut self,
    env: &Env,
    base_ty: TypeId,
    root: &MemberRef,
    targs: &[TypeId],
    args: &[Arg],
    src: Register,
    trgt: Register,
    span: TextRange,
  ) -> CheckResult<Vec<Env>> {
    let mut per_atom = Vec::new();
    for atom in self.store().atoms(base_ty) {
      let name = self.asm.method(root).name.clone();
      let lookup = self.asm.member_root(atom, MemberKind::Method, &name);
      let mref = match lookup {
        MemberLookup::Unique(mref) => mref,
        _ => {
          return self.fail(
            codes::AMBIGUOUS_CALL,
            format!("method `{}` does not resolve uniquely on every option", name),
            span,
          )
        }
      };
      per_atom.push(self.method_function_type(&mref, targs, span)?);
    }
    if self.asm.unified_function_type(&per_atom).is_none() {
      let name = &self.asm.method(root).name;
      return self.fail(
        codes::AMBIGUOUS_CALL,
        format!("method `{}` has conflicting signatures across options", name),
        span,
      );
    }
    let decl = self.asm.decl(root.origin.decl);
    let mdecl = self.asm.method(root);
    let mut callee_terms = self.asm.binds_of(&root.origin);
    match self
      .asm
      .resolve_binds_for_call(&mdecl.type_params, targs, &decl.ns)
    {
      Ok(own) => callee_terms.extend(own),
      Err(err) => return self.fail(Self::type_error_code(&err), err.to_string(), span),
    }
    let (slots, rest) =
      self.function_slots(&mdecl.params, mdecl.rest.as_ref(), &decl.ns, &callee_terms, span)?;
    let (cur, regs) = self.resolve_call_args(env, &slots, rest.as_ref(), args, span)?;
    let owner = self.owner_type_key(&root.origin);
    let key = IrAssembly::virtual_method_key(&owner, &mdecl.name);
    self.irasm.register_virtual_method_call(key.clone());
    self.emitter.emit(Op::CallVirtualTarget {
      trgt,
      vmethod_key: key,
      this: src,
      args: regs,
    });
    let result = self.normalize_in(&mdecl.result, &decl.ns, &callee_terms, span)?;
    Ok(vec![cur.with_result(result, Truth::Unknown)])
  }

  /// The resolved function type of a method at its origin binds.
  fn method_function_type(
    &mut self,
    mref: &MemberRef,
    targs: &[TypeId],
    span: TextRange,
  ) -> CheckResult<FunctionType> {
    let decl = self.asm.decl(mref.origin.decl);
    let mdecl = self.asm.method(mref);
    let mut callee_terms = self.asm.binds_of(&mref.origin);
    match self
      .asm
      .resolve_binds_for_call(&mdecl.type_params, targs, &decl.ns)
    {
      Ok(own) => callee_terms.extend(own),
      Err(err) => return self.fail(Self::type_error_code(&err), err.to_string(), span),
    }
    let mut params = Vec::with_capacity(mdecl.params.len());
    for param in &mdecl.params {
      let ty = self.normalize_in(&param.sig, &decl.ns, &callee_terms, param.span)?;
      params.push(FunctionParam {
        name: self.store().intern_name(&param.name),
        ty,
        optional: param.optional,
      });
    }
    let rest = match &mdecl.rest {
      Some(rest) => Some(self.normalize_in(&rest.sig, &decl.ns, &callee_terms, span)?),
      None => None,
    };
    let result = self.normalize_in(&mdecl.result, &decl.ns, &callee_terms, span)?;
    Ok(FunctionType {
      params,
      rest,
      result,
    })
  }
}
