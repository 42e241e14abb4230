//! Expression checking and lowering.
//!
//! [`Checker`] walks one declaration body, verifying types under the current
//! flow environment while appending IR to its body emitter. Every expression
//! check returns a non-empty multi-flow: the list of alternative post-state
//! environments, each carrying the expression's result type and statically
//! known truthiness.

use std::sync::Arc;

use ahash::AHashMap;
use ast_opal::{ExprKind, Expression, LambdaDecl, PrefixOp, TypeSig};
use diagnostics::{FileId, Span, TextRange};
use ir_opal::{BodyEmitter, IrAssembly, LambdaIr, Op, Register};
use types_opal::{
  Assembly, EntityRef, FunctionParam, FunctionType, MemberKind, MemberLookup, RecordProp,
  RecordType, SpecialTypes, TermMap, TupleEntry, TupleType, TypeDisplay, TypeError, TypeId,
  TypeKind, TypeStore,
};

use crate::codes::{self, Code};
use crate::error::{Abort, CheckResult};

use super::flow::{Env, Truth, VarInfo, VarStorage};

/// Per-body checker state. The emitter is owned; assembly, IR registry, and
/// the diagnostics sink are shared with the declaration driver.
pub struct Checker<'a> {
  pub asm: &'a Assembly,
  pub irasm: &'a mut IrAssembly,
  pub diags: &'a mut Vec<diagnostics::Diagnostic>,
  pub emitter: BodyEmitter,
  pub file: FileId,
  pub ns: String,
  pub enclosing_key: String,
  pub terms: TermMap,
  pub var_regs: AHashMap<String, Register>,
  /// Declared result type of the body being checked, used as the contextual
  /// hint for return values.
  pub result_hint: Option<TypeId>,
}

impl<'a> Checker<'a> {
  pub fn new(
    asm: &'a Assembly,
    irasm: &'a mut IrAssembly,
    diags: &'a mut Vec<diagnostics::Diagnostic>,
    file: FileId,
    ns: impl Into<String>,
    enclosing_key: impl Into<String>,
    terms: TermMap,
  ) -> Self {
    Checker {
      asm,
      irasm,
      diags,
      emitter: BodyEmitter::new(),
      file,
      ns: ns.into(),
      enclosing_key: enclosing_key.into(),
      terms,
      var_regs: AHashMap::new(),
      result_hint: None,
    }
  }

  pub fn store(&self) -> &Arc<TypeStore> {
    self.asm.store()
  }

  pub fn specials(&self) -> SpecialTypes {
    self.asm.specials().clone()
  }

  pub fn display(&self, ty: TypeId) -> String {
    TypeDisplay::new(self.asm, ty).to_string()
  }

  /// Record a diagnostic and unwind the current declaration.
  pub fn fail<T>(
    &mut self,
    code: Code,
    message: impl Into<String>,
    span: TextRange,
  ) -> CheckResult<T> {
    self
      .diags
      .push(code.error(message, Span::new(self.file, span)));
    Err(Abort)
  }

  pub fn type_error_code(err: &TypeError) -> Code {
    match err {
      TypeError::UnknownTypeName(_) => codes::UNKNOWN_NAME,
      TypeError::RecordMasksUniversal(_) => codes::RECORD_MASKS_ANY_METHOD,
      TypeError::BadParameterOrder => codes::BAD_PARAMETER_ORDER,
      _ => codes::TYPE_MISMATCH,
    }
  }

  /// Resolve a source signature under the current namespace and terms.
  pub fn resolve_sig(&mut self, sig: &TypeSig, span: TextRange) -> CheckResult<TypeId> {
    match self.asm.normalize_type(sig, &self.ns, &self.terms) {
      Ok(ty) => {
        self.irasm.register_resolved_type_reference(ty);
        Ok(ty)
      }
      Err(err) => self.fail(Self::type_error_code(&err), err.to_string(), span),
    }
  }

  /// Resolve a signature in a callee's own namespace and bindings.
  pub fn normalize_in(
    &mut self,
    sig: &TypeSig,
    ns: &str,
    terms: &TermMap,
    span: TextRange,
  ) -> CheckResult<TypeId> {
    match self.asm.normalize_type(sig, ns, terms) {
      Ok(ty) => Ok(ty),
      Err(err) => self.fail(Self::type_error_code(&err), err.to_string(), span),
    }
  }

  pub fn expect_subtype(&mut self, sub: TypeId, sup: TypeId, span: TextRange) -> CheckResult<()> {
    if self.asm.subtype_of(sub, sup) {
      Ok(())
    } else {
      let message = format!(
        "`{}` is not a subtype of `{}`",
        self.display(sub),
        self.display(sup)
      );
      self.fail(codes::TYPE_MISMATCH, message, span)
    }
  }

  /// Check an expression and join its multi-flow for sequential evaluation.
  pub fn check_expr_joined(
    &mut self,
    env: &Env,
    expr: &Expression,
    trgt: Register,
    hint: Option<TypeId>,
  ) -> CheckResult<Env> {
    let flows = self.check_expression(env, expr, trgt, hint)?;
    Ok(Env::join(flows, self.asm))
  }

  /// Partition truth-valued flows into those that may take the truthy path
  /// and those that may take the falsy path. A flow with unknown truth
  /// appears on both sides.
  pub fn split_truth(flows: &[Env]) -> (Vec<Env>, Vec<Env>) {
    let mut trues = Vec::new();
    let mut falses = Vec::new();
    for env in flows {
      let truth = env.result.map(|r| r.truth).unwrap_or(Truth::Unknown);
      if truth.may_be_true() {
        trues.push(env.clone());
      }
      if truth.may_be_false() {
        falses.push(env.clone());
      }
    }
    (trues, falses)
  }

  /// Split flows on None vs Some of the current result, refining `var`'s
  /// flow type on each side when the tested expression was a plain variable
  /// access.
  pub fn split_none(&self, flows: &[Env], var: Option<&str>) -> (Vec<Env>, Vec<Env>) {
    let specials = self.asm.specials();
    let mut some_flows = Vec::new();
    let mut none_flows = Vec::new();
    for env in flows {
      let Some(ty) = env.result_type() else {
        some_flows.push(env.clone());
        continue;
      };
      if let Some(some_ty) = self.asm.restrict_not(ty, specials.none) {
        let mut out = env.clone().with_result(some_ty, Truth::Unknown);
        if let Some(name) = var {
          if let Some(info) = out.lookup_var(name) {
            if let Some(narrowed) = self.asm.restrict_not(info.flow, specials.none) {
              out.narrow_var(name, narrowed);
            }
          }
        }
        some_flows.push(out);
      }
      if self.asm.restrict_to(ty, specials.none).is_some() {
        let mut out = env.clone().with_result(specials.none, Truth::False);
        if let Some(name) = var {
          if out.lookup_var(name).is_some() {
            out.narrow_var(name, specials.none);
          }
        }
        none_flows.push(out);
      }
    }
    (some_flows, none_flows)
  }

  fn plain_var_name(expr: &Expression) -> Option<&str> {
    match &expr.kind {
      ExprKind::AccessVariable { name } => Some(name),
      _ => None,
    }
  }

  fn atom_eq_compatible(&self, a: TypeId, b: TypeId) -> bool {
    let specials = self.asm.specials();
    if a == specials.none || b == specials.none {
      return true;
    }
    if a == b
      && (a == specials.bool_ || a == specials.int || a == specials.string || a == specials.guid)
    {
      return true;
    }
    match (self.store().type_kind(a), self.store().type_kind(b)) {
      (TypeKind::Entity(e1), TypeKind::Entity(e2)) if e1 == e2 => {
        self.asm.subtype_of(a, specials.key_type)
      }
      _ => false,
    }
  }

  fn equality_compatible(&self, a: TypeId, b: TypeId) -> bool {
    let a_atoms = self.store().atoms(a);
    let b_atoms = self.store().atoms(b);
    a_atoms.iter().all(|aa| {
      b_atoms
        .iter()
        .all(|bb| self.atom_eq_compatible(*aa, *bb))
    })
  }

  /// Check `expr`, emitting its value into `trgt`. `hint` is the contextual
  /// type used for lambda signature inference and argument bias; it never
  /// weakens checking.
  pub fn check_expression(
    &mut self,
    env: &Env,
    expr: &Expression,
    trgt: Register,
    hint: Option<TypeId>,
  ) -> CheckResult<Vec<Env>> {
    let specials = self.specials();
    let span = expr.span;
    match &expr.kind {
      ExprKind::LiteralNone => {
        self.emitter.emit(Op::LoadConstNone { trgt });
        Ok(vec![env.clone().with_result(specials.none, Truth::False)])
      }
      ExprKind::LiteralBool(value) => {
        self.emitter.emit(Op::LoadConstBool {
          trgt,
          value: *value,
        });
        let truth = if *value { Truth::True } else { Truth::False };
        Ok(vec![env.clone().with_result(specials.bool_, truth)])
      }
      ExprKind::LiteralInt(value) => {
        self.emitter.emit(Op::LoadConstInt {
          trgt,
          value: *value,
        });
        Ok(vec![env.clone().with_result(specials.int, Truth::Unknown)])
      }
      ExprKind::LiteralString(value) => {
        self.emitter.emit(Op::LoadConstString {
          trgt,
          value: value.clone(),
        });
        Ok(vec![env.clone().with_result(specials.string, Truth::Unknown)])
      }
      ExprKind::LiteralTypedString {
        sig,
        value,
        constructor,
      } => self.check_typed_string(env, sig, value, *constructor, trgt, span),
      ExprKind::AccessVariable { name } => {
        let Some(info) = env.lookup_var(name).cloned() else {
          return self.fail(codes::UNKNOWN_NAME, format!("variable `{}` is not defined", name), span);
        };
        if !info.must_defined {
          return self.fail(
            codes::USE_BEFORE_DEF,
            format!("variable `{}` may be used before it is assigned", name),
            span,
          );
        }
        let op = match info.storage {
          VarStorage::Arg => Op::AccessArg {
            trgt,
            name: name.clone(),
          },
          VarStorage::Local => Op::AccessLocal {
            trgt,
            name: name.clone(),
          },
          VarStorage::Captured => Op::AccessCaptured {
            trgt,
            name: name.clone(),
          },
        };
        self.emitter.emit(op);
        let truth = if info.flow == specials.none {
          Truth::False
        } else {
          Truth::Unknown
        };
        Ok(vec![env.clone().with_result(info.flow, truth)])
      }
      ExprKind::AccessNamespaceConst { ns, name } => {
        let Some(namespace) = self.asm.namespace(ns) else {
          return self.fail(codes::UNKNOWN_NAME, format!("namespace `{}` is not defined", ns), span);
        };
        if let Some(cdecl) = namespace.consts.get(name) {
          let key = IrAssembly::const_key(ns, name);
          self.irasm.register_pending_const_processing(key.clone());
          self.emitter.emit(Op::AccessNamespaceConst {
            trgt,
            const_key: key,
          });
          let ty = self.normalize_in(&cdecl.sig, ns, &TermMap::default(), span)?;
          Ok(vec![env.clone().with_result(ty, Truth::Unknown)])
        } else if let Some(gdecl) = namespace.globals.get(name) {
          let key = IrAssembly::global_key(ns, name);
          self.irasm.register_pending_global_processing(key.clone());
          self.emitter.emit(Op::AccessNamespaceConst {
            trgt,
            const_key: key,
          });
          let ty = self.normalize_in(&gdecl.sig, ns, &TermMap::default(), span)?;
          Ok(vec![env.clone().with_result(ty, Truth::Unknown)])
        } else {
          self.fail(
            codes::UNKNOWN_NAME,
            format!("`{}::{}` is not a const or global", ns, name),
            span,
          )
        }
      }
      ExprKind::AccessStaticConst { sig, name } => {
        let ty = self.resolve_sig(sig, sig.span)?;
        let mref = match self.lookup_member(ty, MemberKind::Const, name) {
          MemberLookup::Unique(mref) => mref,
          MemberLookup::Ambiguous => {
            return self.fail(
              codes::AMBIGUOUS_FIELD,
              format!("const `{}` does not resolve uniquely", name),
              span,
            )
          }
          MemberLookup::NotFound => {
            return self.fail(
              codes::UNKNOWN_NAME,
              format!("const `{}` is not declared on `{}`", name, self.display(ty)),
              span,
            )
          }
        };
        let owner = self.owner_type_key(&mref.origin);
        let key = IrAssembly::const_key(&owner, name);
        self.irasm.register_pending_const_processing(key.clone());
        self.emitter.emit(Op::AccessConst {
          trgt,
          const_key: key,
        });
        let decl = self.asm.decl(mref.origin.decl);
        let sig = self.asm.const_of(&mref).sig.clone();
        let terms = self.asm.binds_of(&mref.origin);
        let ns = decl.ns.clone();
        let ty = self.normalize_in(&sig, &ns, &terms, span)?;
        Ok(vec![env.clone().with_result(ty, Truth::Unknown)])
      }
      ExprKind::ConstructorTuple { args } => {
        let mut cur = env.clone().clear_result();
        let mut regs = Vec::with_capacity(args.len());
        let mut entries = Vec::with_capacity(args.len());
        for arg in args {
          let reg = self.emitter.generate_tmp_register();
          cur = self.check_expr_joined(&cur, arg, reg, None)?;
          regs.push(reg);
          entries.push(TupleEntry {
            ty: cur.result_type().unwrap_or(specials.any),
            optional: false,
          });
        }
        let ty = self.store().intern_type(TypeKind::Tuple(TupleType {
          entries,
          open: false,
        }));
        self.irasm.register_resolved_type_reference(ty);
        self.emitter.emit(Op::ConstructorTuple { trgt, args: regs });
        Ok(vec![cur.with_result(ty, Truth::Unknown)])
      }
      ExprKind::ConstructorRecord { entries } => {
        let mut cur = env.clone().clear_result();
        let mut seen: Vec<&str> = Vec::new();
        let mut regs = Vec::with_capacity(entries.len());
        let mut props = Vec::with_capacity(entries.len());
        for entry in entries {
          if types_opal::is_universal_method_name(&entry.name) {
            return self.fail(
              codes::RECORD_MASKS_ANY_METHOD,
              format!("record property `{}` masks a universal method", entry.name),
              entry.value.span,
            );
          }
          if seen.contains(&entry.name.as_str()) {
            return self.fail(
              codes::DUPLICATE_NAME,
              format!("record property `{}` is defined twice", entry.name),
              entry.value.span,
            );
          }
          seen.push(&entry.name);
          let reg = self.emitter.generate_tmp_register();
          cur = self.check_expr_joined(&cur, &entry.value, reg, None)?;
          let name_id = self.store().intern_name(&entry.name);
          regs.push((name_id, reg));
          props.push(RecordProp {
            name: name_id,
            ty: cur.result_type().unwrap_or(specials.any),
            optional: false,
          });
        }
        let ty = self.store().intern_type(TypeKind::Record(RecordType {
          entries: props,
          open: false,
        }));
        self.irasm.register_resolved_type_reference(ty);
        self.emitter.emit(Op::ConstructorRecord {
          trgt,
          entries: regs,
        });
        Ok(vec![cur.with_result(ty, Truth::Unknown)])
      }
      ExprKind::ConstructorPrimary { sig, factory, args } => {
        self.check_primary_ctor(env, sig, factory.as_deref(), args, trgt, span)
      }
      ExprKind::ConstructorLambda(lambda) => self.check_lambda(env, lambda, trgt, hint),
      ExprKind::CallNamespaceFunction {
        ns,
        name,
        terms,
        args,
      } => {
        let Some(fdecl) = self
          .asm
          .namespace(ns)
          .and_then(|namespace| namespace.functions.get(name))
        else {
          return self.fail(
            codes::UNKNOWN_NAME,
            format!("function `{}::{}` is not defined", ns, name),
            span,
          );
        };
        let targs = terms
          .iter()
          .map(|t| self.resolve_sig(t, t.span))
          .collect::<CheckResult<Vec<_>>>()?;
        let callee_terms =
          match self
            .asm
            .resolve_binds_for_call(&fdecl.type_params, &targs, &fdecl.ns)
          {
            Ok(terms) => terms,
            Err(err) => return self.fail(Self::type_error_code(&err), err.to_string(), span),
          };
        let (slots, rest) =
          self.function_slots(&fdecl.params, fdecl.rest.as_ref(), &fdecl.ns, &callee_terms, span)?;
        let (cur, regs) = self.resolve_call_args(env, &slots, rest.as_ref(), args, span)?;
        let key = IrAssembly::function_key(ns, name);
        self.irasm.register_function_call(key.clone());
        self.emitter.emit(Op::CallNamespaceFunction {
          trgt,
          func_key: key,
          args: regs,
        });
        let result = self.normalize_in(&fdecl.result, &fdecl.ns, &callee_terms, span)?;
        Ok(vec![cur.with_result(result, Truth::Unknown)])
      }
      ExprKind::CallStaticFunction {
        sig,
        name,
        terms,
        args,
      } => {
        let ty = self.resolve_sig(sig, sig.span)?;
        let mref = match self.lookup_member(ty, MemberKind::Static, name) {
          MemberLookup::Unique(mref) => mref,
          MemberLookup::Ambiguous => {
            return self.fail(
              codes::AMBIGUOUS_CALL,
              format!("static `{}` does not resolve uniquely", name),
              span,
            )
          }
          MemberLookup::NotFound => {
            return self.fail(
              codes::UNKNOWN_NAME,
              format!("static `{}` is not declared on `{}`", name, self.display(ty)),
              span,
            )
          }
        };
        let targs = terms
          .iter()
          .map(|t| self.resolve_sig(t, t.span))
          .collect::<CheckResult<Vec<_>>>()?;
        let (cur, result) = self.check_static_call(env, &mref, &targs, args, trgt, span)?;
        Ok(vec![cur.with_result(result, Truth::Unknown)])
      }
      ExprKind::PrefixOp { op, arg } => {
        let areg = self.emitter.generate_tmp_register();
        match op {
          PrefixOp::Plus | PrefixOp::Negate => {
            let cur = self.check_expr_joined(env, arg, areg, Some(specials.int))?;
            let ty = cur.result_type().unwrap_or(specials.any);
            self.expect_subtype(ty, specials.int, arg.span)?;
            self.emitter.emit(Op::PrefixOp {
              trgt,
              op: *op,
              arg: areg,
            });
            Ok(vec![cur.with_result(specials.int, Truth::Unknown)])
          }
          PrefixOp::Not => {
            let flows = self.check_expression(env, arg, areg, None)?;
            let joined = Env::join(flows.clone(), self.asm);
            let ty = joined.result_type().unwrap_or(specials.any);
            let bool_or_none = self.asm.bool_or_none();
            self.expect_subtype(ty, bool_or_none, arg.span)?;
            let conv = self.emitter.generate_tmp_register();
            self.emitter.emit(Op::TruthyConversion { trgt: conv, src: areg });
            self.emitter.emit(Op::PrefixOp {
              trgt,
              op: PrefixOp::Not,
              arg: conv,
            });
            Ok(
              flows
                .into_iter()
                .map(|flow| {
                  let truth = flow.result.map(|r| r.truth).unwrap_or(Truth::Unknown);
                  flow.with_result(specials.bool_, truth.negate())
                })
                .collect(),
            )
          }
        }
      }
      ExprKind::BinArith { op, lhs, rhs } => {
        let lreg = self.emitter.generate_tmp_register();
        let cur = self.check_expr_joined(env, lhs, lreg, Some(specials.int))?;
        self.expect_subtype(cur.result_type().unwrap_or(specials.any), specials.int, lhs.span)?;
        let rreg = self.emitter.generate_tmp_register();
        let cur = self.check_expr_joined(&cur, rhs, rreg, Some(specials.int))?;
        self.expect_subtype(cur.result_type().unwrap_or(specials.any), specials.int, rhs.span)?;
        self.emitter.emit(Op::BinOp {
          trgt,
          op: *op,
          lhs: lreg,
          rhs: rreg,
        });
        Ok(vec![cur.with_result(specials.int, Truth::Unknown)])
      }
      ExprKind::BinEq { negated, lhs, rhs } => {
        self.check_equality(env, *negated, lhs, rhs, trgt, span)
      }
      ExprKind::BinCmp { op, lhs, rhs } => {
        let lreg = self.emitter.generate_tmp_register();
        let cur = self.check_expr_joined(env, lhs, lreg, None)?;
        let lty = cur.result_type().unwrap_or(specials.any);
        let rreg = self.emitter.generate_tmp_register();
        let cur = self.check_expr_joined(&cur, rhs, rreg, None)?;
        let rty = cur.result_type().unwrap_or(specials.any);
        let both_int =
          self.asm.subtype_of(lty, specials.int) && self.asm.subtype_of(rty, specials.int);
        let both_string =
          self.asm.subtype_of(lty, specials.string) && self.asm.subtype_of(rty, specials.string);
        if !both_int && !both_string {
          let message = format!(
            "comparison requires both operands Int or both String, got `{}` and `{}`",
            self.display(lty),
            self.display(rty)
          );
          return self.fail(codes::UNSUPPORTED_OP, message, span);
        }
        self.emitter.emit(Op::BinCmp {
          trgt,
          op: *op,
          lhs: lreg,
          rhs: rreg,
        });
        Ok(vec![cur.with_result(specials.bool_, Truth::Unknown)])
      }
      ExprKind::BinLogic { op, lhs, rhs } => self.check_logic(env, *op, lhs, rhs, trgt, span),
      ExprKind::NoneCheck { lhs, rhs } => {
        let lreg = self.emitter.generate_tmp_register();
        let lflows = self.check_expression(env, lhs, lreg, None)?;
        let var = Self::plain_var_name(lhs);
        let (some_flows, none_flows) = self.split_none(&lflows, var);
        if none_flows.is_empty() {
          return self.fail(codes::REDUNDANT_NULL_CHECK, "None value is not possible", span);
        }
        if some_flows.is_empty() {
          return self.fail(codes::REDUNDANT_NULL_CHECK, "value is always None", span);
        }
        let none_block = self.emitter.create_new_block("nonecheck_none");
        let some_block = self.emitter.create_new_block("nonecheck_some");
        let done_block = self.emitter.create_new_block("nonecheck_done");
        self.emitter.emit(Op::NoneJump {
          src: lreg,
          none_block,
          some_block,
        });
        self.emitter.set_active_block(none_block);
        self.emitter.emit(Op::LoadConstNone { trgt });
        self.emitter.emit(Op::DirectJump { target: done_block });
        self.emitter.set_active_block(some_block);
        let renv = Env::join(some_flows, self.asm);
        let rreg = self.emitter.generate_tmp_register();
        let rflows = self.check_expression(&renv, rhs, rreg, hint)?;
        self.emitter.emit(Op::RegAssign { trgt, src: rreg });
        self.emitter.emit(Op::DirectJump { target: done_block });
        self.emitter.set_active_block(done_block);
        let mut out = none_flows;
        out.extend(rflows);
        Ok(out)
      }
      ExprKind::Coalesce { lhs, rhs } => {
        let lreg = self.emitter.generate_tmp_register();
        let lflows = self.check_expression(env, lhs, lreg, None)?;
        let var = Self::plain_var_name(lhs);
        let (some_flows, none_flows) = self.split_none(&lflows, var);
        if none_flows.is_empty() {
          return self.fail(codes::REDUNDANT_NULL_CHECK, "None value is not possible", span);
        }
        if some_flows.is_empty() {
          return self.fail(codes::REDUNDANT_NULL_CHECK, "value is always None", span);
        }
        let none_block = self.emitter.create_new_block("coalesce_none");
        let some_block = self.emitter.create_new_block("coalesce_some");
        let done_block = self.emitter.create_new_block("coalesce_done");
        self.emitter.emit(Op::NoneJump {
          src: lreg,
          none_block,
          some_block,
        });
        self.emitter.set_active_block(some_block);
        self.emitter.emit(Op::RegAssign { trgt, src: lreg });
        self.emitter.emit(Op::DirectJump { target: done_block });
        self.emitter.set_active_block(none_block);
        let renv = Env::join(none_flows, self.asm);
        let rreg = self.emitter.generate_tmp_register();
        let rflows = self.check_expression(&renv, rhs, rreg, hint)?;
        self.emitter.emit(Op::RegAssign { trgt, src: rreg });
        self.emitter.emit(Op::DirectJump { target: done_block });
        self.emitter.set_active_block(done_block);
        let mut out = some_flows;
        out.extend(rflows);
        Ok(out)
      }
      ExprKind::Select {
        test,
        if_true,
        if_false,
      } => {
        let treg = self.emitter.generate_tmp_register();
        let tflows = self.check_expression(env, test, treg, None)?;
        let joined = Env::join(tflows.clone(), self.asm);
        let bool_or_none = self.asm.bool_or_none();
        self.expect_subtype(
          joined.result_type().unwrap_or(specials.any),
          bool_or_none,
          test.span,
        )?;
        let (trues, falses) = Self::split_truth(&tflows);
        if trues.is_empty() {
          return self.fail(codes::REDUNDANT_TRUTH, "test is never true", test.span);
        }
        if falses.is_empty() {
          return self.fail(codes::REDUNDANT_TRUTH, "test is always true", test.span);
        }
        let conv = self.emitter.generate_tmp_register();
        self.emitter.emit(Op::TruthyConversion { trgt: conv, src: treg });
        let true_block = self.emitter.create_new_block("select_true");
        let false_block = self.emitter.create_new_block("select_false");
        let done_block = self.emitter.create_new_block("select_done");
        self.emitter.emit(Op::BoolJump {
          src: conv,
          true_block,
          false_block,
        });
        self.emitter.set_active_block(true_block);
        let areg = self.emitter.generate_tmp_register();
        let aflows = self.check_expression(&Env::join(trues, self.asm), if_true, areg, hint)?;
        self.emitter.emit(Op::RegAssign { trgt, src: areg });
        self.emitter.emit(Op::DirectJump { target: done_block });
        self.emitter.set_active_block(false_block);
        let breg = self.emitter.generate_tmp_register();
        let bflows = self.check_expression(&Env::join(falses, self.asm), if_false, breg, hint)?;
        self.emitter.emit(Op::RegAssign { trgt, src: breg });
        self.emitter.emit(Op::DirectJump { target: done_block });
        self.emitter.set_active_block(done_block);
        let mut out = aflows;
        out.extend(bflows);
        Ok(out)
      }
      ExprKind::Postfix { root, ops } => self.check_postfix(env, root, ops, trgt),
    }
  }

  fn check_typed_string(
    &mut self,
    env: &Env,
    sig: &TypeSig,
    value: &str,
    constructor: bool,
    trgt: Register,
    span: TextRange,
  ) -> CheckResult<Vec<Env>> {
    let specials = self.specials();
    let ty = self.resolve_sig(sig, span)?;
    let atoms = self.store().atoms(ty);
    let unique_entity = atoms.len() == 1
      && matches!(self.store().type_kind(atoms[0]), TypeKind::Entity(_));
    if !unique_entity {
      return self.fail(
        codes::NOT_PARSABLE,
        format!("`{}` is not a uniquely determined nominal type", self.display(ty)),
        span,
      );
    }
    if !self.asm.subtype_of(ty, specials.parsable) {
      return self.fail(
        codes::NOT_PARSABLE,
        format!("`{}` does not provide Parsable", self.display(ty)),
        span,
      );
    }
    if !constructor {
      let string_of = self.store().intern_type(TypeKind::Entity(EntityRef {
        decl: specials.string_of_decl,
        binds: vec![ty],
      }));
      self.irasm.register_type_instantiation(string_of);
      self.emitter.emit(Op::LoadConstTypedString {
        trgt,
        value: value.to_string(),
        ty,
      });
      return Ok(vec![env.clone().with_result(string_of, Truth::Unknown)]);
    }
    let mref = match self.lookup_member(ty, MemberKind::Static, "tryParse") {
      MemberLookup::Unique(mref) => mref,
      _ => {
        return self.fail(
          codes::NOT_PARSABLE,
          format!("`{}` does not declare tryParse", self.display(ty)),
          span,
        )
      }
    };
    let tmp = self.emitter.generate_tmp_register();
    self.emitter.emit(Op::LoadConstString {
      trgt: tmp,
      value: value.to_string(),
    });
    let owner = self.owner_type_key(&mref.origin);
    let key = IrAssembly::static_key(&owner, "tryParse");
    self.irasm.register_static_call(key.clone());
    self.emitter.emit(Op::CallStaticFunction {
      trgt,
      func_key: key,
      args: vec![tmp],
    });
    let decl = self.asm.decl(mref.origin.decl);
    let result_sig = self.asm.static_of(&mref).result.clone();
    let terms = self.asm.binds_of(&mref.origin);
    let ns = decl.ns.clone();
    let result = self.normalize_in(&result_sig, &ns, &terms, span)?;
    Ok(vec![env.clone().with_result(result, Truth::Unknown)])
  }

  fn check_equality(
    &mut self,
    env: &Env,
    negated: bool,
    lhs: &Expression,
    rhs: &Expression,
    trgt: Register,
    span: TextRange,
  ) -> CheckResult<Vec<Env>> {
    let specials = self.specials();
    let split_var = match (&lhs.kind, &rhs.kind) {
      (ExprKind::LiteralNone, ExprKind::AccessVariable { name }) => Some(name.clone()),
      (ExprKind::AccessVariable { name }, ExprKind::LiteralNone) => Some(name.clone()),
      _ => None,
    };
    let lreg = self.emitter.generate_tmp_register();
    let cur = self.check_expr_joined(env, lhs, lreg, None)?;
    let lty = cur.result_type().unwrap_or(specials.any);
    let rreg = self.emitter.generate_tmp_register();
    let cur = self.check_expr_joined(&cur, rhs, rreg, None)?;
    let rty = cur.result_type().unwrap_or(specials.any);
    if !self.equality_compatible(lty, rty) {
      let message = format!(
        "`{}` and `{}` cannot be compared for equality",
        self.display(lty),
        self.display(rty)
      );
      return self.fail(codes::UNSUPPORTED_OP, message, span);
    }
    self.emitter.emit(Op::BinEq {
      trgt,
      negated,
      lhs: lreg,
      rhs: rreg,
    });
    if let Some(name) = split_var {
      if let Some(info) = cur.lookup_var(&name).cloned() {
        let mut flows = Vec::new();
        if self.asm.restrict_to(info.flow, specials.none).is_some() {
          let mut none_env = cur.clone();
          none_env.narrow_var(&name, specials.none);
          let truth = if negated { Truth::False } else { Truth::True };
          flows.push(none_env.with_result(specials.bool_, truth));
        }
        if let Some(some_ty) = self.asm.restrict_not(info.flow, specials.none) {
          let mut some_env = cur.clone();
          some_env.narrow_var(&name, some_ty);
          let truth = if negated { Truth::True } else { Truth::False };
          flows.push(some_env.with_result(specials.bool_, truth));
        }
        if !flows.is_empty() {
          return Ok(flows);
        }
      }
    }
    Ok(vec![cur.with_result(specials.bool_, Truth::Unknown)])
  }

  fn check_logic(
    &mut self,
    env: &Env,
    op: ast_opal::LogicOp,
    lhs: &Expression,
    rhs: &Expression,
    trgt: Register,
    span: TextRange,
  ) -> CheckResult<Vec<Env>> {
    use ast_opal::LogicOp;
    let specials = self.specials();
    let bool_or_none = self.asm.bool_or_none();
    let lreg = self.emitter.generate_tmp_register();
    let lflows = self.check_expression(env, lhs, lreg, None)?;
    let joined = Env::join(lflows.clone(), self.asm);
    self.expect_subtype(
      joined.result_type().unwrap_or(specials.any),
      bool_or_none,
      lhs.span,
    )?;
    let (trues, falses) = Self::split_truth(&lflows);
    if trues.is_empty() {
      return self.fail(codes::REDUNDANT_TRUTH, "left operand is never true", span);
    }
    if falses.is_empty() {
      return self.fail(codes::REDUNDANT_TRUTH, "left operand is always true", span);
    }
    let (shortcut_value, shortcut_flows, continue_flows) = match op {
      LogicOp::Or => (true, trues, falses),
      LogicOp::And => (false, falses, trues),
      LogicOp::Imply => (true, falses, trues),
    };
    let conv = self.emitter.generate_tmp_register();
    self.emitter.emit(Op::TruthyConversion { trgt: conv, src: lreg });
    let shortcut_block = self.emitter.create_new_block("logic_shortcut");
    let rest_block = self.emitter.create_new_block("logic_rest");
    let done_block = self.emitter.create_new_block("logic_done");
    match op {
      LogicOp::Or => self.emitter.emit(Op::BoolJump {
        src: conv,
        true_block: shortcut_block,
        false_block: rest_block,
      }),
      LogicOp::And | LogicOp::Imply => self.emitter.emit(Op::BoolJump {
        src: conv,
        true_block: rest_block,
        false_block: shortcut_block,
      }),
    }
    self.emitter.set_active_block(shortcut_block);
    self.emitter.emit(Op::LoadConstBool {
      trgt,
      value: shortcut_value,
    });
    self.emitter.emit(Op::DirectJump { target: done_block });
    self.emitter.set_active_block(rest_block);
    let renv = Env::join(continue_flows, self.asm);
    let rreg = self.emitter.generate_tmp_register();
    let rflows = self.check_expression(&renv, rhs, rreg, None)?;
    let rjoined = Env::join(rflows.clone(), self.asm);
    self.expect_subtype(
      rjoined.result_type().unwrap_or(specials.any),
      bool_or_none,
      rhs.span,
    )?;
    self.emitter.emit(Op::TruthyConversion { trgt, src: rreg });
    self.emitter.emit(Op::DirectJump { target: done_block });
    self.emitter.set_active_block(done_block);
    let shortcut_truth = if shortcut_value { Truth::True } else { Truth::False };
    let mut out: Vec<Env> = shortcut_flows
      .into_iter()
      .map(|flow| flow.with_result(specials.bool_, shortcut_truth))
      .collect();
    out.extend(rflows.into_iter().map(|flow| {
      let truth = flow.result.map(|r| r.truth).unwrap_or(Truth::Unknown);
      flow.with_result(specials.bool_, truth)
    }));
    Ok(out)
  }

  fn check_primary_ctor(
    &mut self,
    env: &Env,
    sig: &TypeSig,
    factory: Option<&str>,
    args: &[ast_opal::Arg],
    trgt: Register,
    span: TextRange,
  ) -> CheckResult<Vec<Env>> {
    let ty = self.resolve_sig(sig, span)?;
    let atoms = self.store().atoms(ty);
    let eref = match (atoms.len(), self.store().type_kind(atoms[0])) {
      (1, TypeKind::Entity(eref)) => eref,
      _ => {
        return self.fail(
          codes::TYPE_MISMATCH,
          format!("`{}` is not a constructible entity type", self.display(ty)),
          span,
        )
      }
    };
    self.irasm.register_type_instantiation(ty);
    if self.asm.is_collection(eref.decl) {
      if factory.is_some() {
        return self.fail(
          codes::UNSUPPORTED_OP,
          "collection entities have no factory constructors",
          span,
        );
      }
      let Some(elem) = self.asm.element_type(&eref) else {
        return self.fail(codes::TYPE_MISMATCH, "collection type is missing its element bind", span);
      };
      let cur = self.check_collection_ctor(env, &eref, elem, args, trgt, span)?;
      return Ok(vec![cur.with_result(ty, Truth::Unknown)]);
    }
    if let Some(factory_name) = factory {
      let mref = match self.lookup_member(ty, MemberKind::Static, factory_name) {
        MemberLookup::Unique(mref) => mref,
        MemberLookup::Ambiguous => {
          return self.fail(
            codes::AMBIGUOUS_CALL,
            format!("factory `{}` does not resolve uniquely", factory_name),
            span,
          )
        }
        MemberLookup::NotFound => {
          return self.fail(
            codes::UNKNOWN_NAME,
            format!("factory `{}` is not declared on `{}`", factory_name, self.display(ty)),
            span,
          )
        }
      };
      if !self.asm.static_of(&mref).is_factory() {
        return self.fail(
          codes::UNSUPPORTED_OP,
          format!("static `{}` is not a factory constructor", factory_name),
          span,
        );
      }
      let factory_trgt = self.emitter.generate_tmp_register();
      let (cur, factory_ty) = self.check_static_call(env, &mref, &[], args, factory_trgt, span)?;
      let cur = self.entity_ctor_from_expando(cur, &eref, factory_trgt, factory_ty, trgt, span)?;
      return Ok(vec![cur.with_result(ty, Truth::Unknown)]);
    }
    let cur = self.check_entity_ctor(env, &eref, args, trgt, span)?;
    Ok(vec![cur.with_result(ty, Truth::Unknown)])
  }

  fn check_lambda(
    &mut self,
    env: &Env,
    lambda: &LambdaDecl,
    trgt: Register,
    hint: Option<TypeId>,
  ) -> CheckResult<Vec<Env>> {
    let span = lambda.span;
    let hint_fn = hint.and_then(|ty| {
      let atoms = self.store().atoms(ty);
      if atoms.len() != 1 {
        return None;
      }
      match self.store().type_kind(atoms[0]) {
        TypeKind::Function(func) => Some(func),
        _ => None,
      }
    });
    let mut params = Vec::with_capacity(lambda.params.len());
    for (idx, param) in lambda.params.iter().enumerate() {
      let ty = if param.sig.is_auto() {
        match hint_fn.as_ref().and_then(|f| f.params.get(idx)) {
          Some(expected) => expected.ty,
          None => {
            return self.fail(
              codes::TYPE_MISMATCH,
              format!("cannot infer the type of lambda parameter `{}`", param.name),
              span,
            )
          }
        }
      } else {
        self.resolve_sig(&param.sig, param.sig.span)?
      };
      params.push((param.name.clone(), ty, param.optional));
    }
    let declared_result = if lambda.result.is_auto() {
      hint_fn.as_ref().map(|f| f.result)
    } else {
      Some(self.resolve_sig(&lambda.result, lambda.result.span)?)
    };

    let mut captured = Vec::with_capacity(lambda.captured.len());
    for name in &lambda.captured {
      let Some(info) = env.lookup_var(name).cloned() else {
        return self.fail(
          codes::UNKNOWN_NAME,
          format!("captured variable `{}` is not defined", name),
          span,
        );
      };
      if !info.must_defined {
        return self.fail(
          codes::USE_BEFORE_DEF,
          format!("captured variable `{}` may be used before it is assigned", name),
          span,
        );
      }
      let reg = self.emitter.generate_tmp_register();
      let op = match info.storage {
        VarStorage::Arg => Op::AccessArg {
          trgt: reg,
          name: name.clone(),
        },
        VarStorage::Local => Op::AccessLocal {
          trgt: reg,
          name: name.clone(),
        },
        VarStorage::Captured => Op::AccessCaptured {
          trgt: reg,
          name: name.clone(),
        },
      };
      self.emitter.emit(op);
      captured.push((name.clone(), reg, info.flow));
    }

    let fingerprint = IrAssembly::binds_fingerprint(self.asm, &self.terms);
    let key = IrAssembly::lambda_key(&self.enclosing_key, span, &fingerprint);

    let mut body_env = Env::new((*env.terms).clone());
    let mut sub = Checker::new(
      self.asm,
      &mut *self.irasm,
      &mut *self.diags,
      lambda.body.file,
      self.ns.clone(),
      key.clone(),
      self.terms.clone(),
    );
    for (name, ty, optional) in &params {
      let specials = sub.asm.specials();
      let declared = if *optional {
        sub.asm.store().union(vec![*ty, specials.none])
      } else {
        *ty
      };
      let reg = sub.emitter.register_var(name.clone(), declared);
      sub.var_regs.insert(name.clone(), reg);
      body_env.declare_var(
        name.clone(),
        VarInfo {
          declared,
          flow: declared,
          is_const: true,
          must_defined: true,
          storage: VarStorage::Arg,
        },
      );
    }
    for (name, _, flow) in &captured {
      let reg = sub.emitter.register_var(name.clone(), *flow);
      sub.var_regs.insert(name.clone(), reg);
      body_env.declare_var(
        name.clone(),
        VarInfo {
          declared: *flow,
          flow: *flow,
          is_const: true,
          must_defined: true,
          storage: VarStorage::Captured,
        },
      );
    }
    let result_ty = sub.check_body_returning(body_env, &lambda.body, declared_result)?;
    let body = match sub.emitter.finish() {
      Ok(body) => body,
      Err(err) => {
        return self.fail(codes::UNSUPPORTED_OP, err.to_string(), span);
      }
    };
    self.irasm.register_lambda(LambdaIr {
      key: key.clone(),
      captured: captured.iter().map(|(name, _, _)| name.clone()).collect(),
      body,
    });
    self.emitter.emit(Op::ConstructorLambda {
      trgt,
      lambda_key: key,
      captured: captured
        .iter()
        .map(|(name, reg, _)| (name.clone(), *reg))
        .collect(),
    });
    let func_ty = self.store().intern_type(TypeKind::Function(FunctionType {
      params: params
        .iter()
        .map(|(name, ty, optional)| FunctionParam {
          name: self.store().intern_name(name),
          ty: *ty,
          optional: *optional,
        })
        .collect(),
      rest: None,
      result: result_ty,
    }));
    Ok(vec![env.clone().with_result(func_ty, Truth::Unknown)])
  }

  /// Member lookup that prefers the most-derived site on a unique nominal
  /// receiver and falls back to rooted lookup across unions.
  pub fn lookup_member(&self, ty: TypeId, kind: MemberKind, name: &str) -> MemberLookup {
    let atoms = self.store().atoms(ty);
    if atoms.len() == 1 {
      self.asm.member_nearest(atoms[0], kind, name)
    } else {
      self.asm.member_root(ty, kind, name)
    }
  }

  /// Display key for the nominal type owning a member.
  pub fn owner_type_key(&self, origin: &EntityRef) -> String {
    let mut key = self.asm.decl_name(origin.decl);
    if !origin.binds.is_empty() {
      let binds: Vec<String> = origin.binds.iter().map(|b| self.display(*b)).collect();
      key.push('<');
      key.push_str(&binds.join(", "));
      key.push('>');
    }
    key
  }
}
