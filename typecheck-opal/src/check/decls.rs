//! Per-declaration drivers and the check session.
//!
//! [`CheckSession`] walks the assembly's declaration set in a deterministic
//! order and drives the body checker once per function, method, static,
//! const, global, and invariant. A failed declaration unwinds to its driver,
//! which disables the partial body, counts the failure against the error
//! budget, and moves on; exhausting the budget halts the session with a
//! synthetic fatal diagnostic.

use ast_opal::{
  ConstDecl, Expression, FunctionDecl, GlobalDecl, OoDeclKind, ParamDecl, RestParamDecl,
  TypeParamDecl,
};
use diagnostics::{Diagnostic, FileId, Span};
use ir_opal::{IrAssembly, Op};
use types_opal::{
  params_well_ordered, Assembly, ConceptType, DeclId, EntityRef, TermMap, TypeId, TypeKind,
};

use crate::codes;
use crate::error::{Abort, CheckResult};

use super::expr::Checker;
use super::flow::{Env, VarInfo, VarStorage};

impl<'a> Checker<'a> {
  /// Compile a pre- or post-condition expression as its own body, cloned
  /// from the argument environment. Post-conditions additionally see
  /// `_return_` bound to the declared result type.
  pub fn check_condition_body(
    &mut self,
    env: &Env,
    exp: &Expression,
    key: &str,
    ret_bind: Option<TypeId>,
  ) -> CheckResult<()> {
    let bool_or_none = self.asm.bool_or_none();
    let specials = self.specials();
    let mut sub = Checker::new(
      self.asm,
      &mut *self.irasm,
      &mut *self.diags,
      self.file,
      self.ns.clone(),
      key,
      self.terms.clone(),
    );
    let mut cenv = env.clone().clear_result();
    for (name, info) in env.vars() {
      let reg = sub.emitter.register_var(name.clone(), info.declared);
      sub.var_regs.insert(name.clone(), reg);
    }
    if let Some(ret_ty) = ret_bind {
      let reg = sub.emitter.register_var("_return_", ret_ty);
      sub.var_regs.insert("_return_".to_string(), reg);
      cenv.declare_var(
        "_return_",
        VarInfo {
          declared: ret_ty,
          flow: ret_ty,
          is_const: true,
          must_defined: true,
          storage: VarStorage::Arg,
        },
      );
    }
    let trgt = sub.emitter.generate_tmp_register();
    let out = sub.check_expr_joined(&cenv, exp, trgt, None)?;
    let ty = out.result_type().unwrap_or(specials.any);
    sub.expect_subtype(ty, bool_or_none, exp.span)?;
    sub.emitter.emit(Op::ReturnAssign { src: trgt });
    let exit = sub.emitter.exit_block();
    sub.emitter.emit(Op::DirectJump { target: exit });
    let emitter = sub.emitter;
    match emitter.finish() {
      Ok(body) => {
        self.irasm.register_body(key, body);
        Ok(())
      }
      Err(err) => self.fail(codes::UNSUPPORTED_OP, err.to_string(), exp.span),
    }
  }
}

/// Drives checking over a whole assembly, accumulating IR and diagnostics.
pub struct CheckSession<'a> {
  asm: &'a Assembly,
  irasm: IrAssembly,
  diagnostics: Vec<Diagnostic>,
  errors: usize,
  fatal: bool,
}

impl<'a> CheckSession<'a> {
  pub fn new(asm: &'a Assembly) -> Self {
    CheckSession {
      asm,
      irasm: IrAssembly::new(),
      diagnostics: Vec::new(),
      errors: 0,
      fatal: false,
    }
  }

  pub fn error_count(&self) -> usize {
    self.errors
  }

  pub fn is_fatal(&self) -> bool {
    self.fatal
  }

  /// The fatal condition that halted the session, if any.
  pub fn fatal_error(&self) -> Option<crate::error::FatalError> {
    self
      .fatal
      .then(|| crate::error::FatalError::TooManyErrors(self.errors))
  }

  pub fn diagnostics(&self) -> &[Diagnostic] {
    &self.diagnostics
  }

  /// Consume the session, yielding the collected IR and sorted diagnostics.
  pub fn finish(mut self) -> (IrAssembly, Vec<Diagnostic>) {
    codes::normalize_diagnostics(&mut self.diagnostics);
    (self.irasm, self.diagnostics)
  }

  /// Template bindings used to check a generic declaration once: each
  /// parameter is bound to its declared bound, or Any.
  fn terms_for(&self, base: &TermMap, type_params: &[TypeParamDecl], ns: &str) -> TermMap {
    let mut terms = base.clone();
    for param in type_params {
      let ty = param
        .bound
        .as_ref()
        .and_then(|bound| self.asm.normalize_type(bound, ns, &terms).ok())
        .unwrap_or(self.asm.specials().any);
      terms.insert(param.name.clone(), ty);
    }
    terms
  }

  fn receiver_type(&self, decl_id: DeclId, terms: &TermMap) -> TypeId {
    let decl = self.asm.decl(decl_id);
    let specials = self.asm.specials();
    let binds: Vec<TypeId> = decl
      .type_params
      .iter()
      .map(|p| terms.get(&p.name).copied().unwrap_or(specials.any))
      .collect();
    let eref = EntityRef {
      decl: decl_id,
      binds,
    };
    match decl.kind {
      OoDeclKind::Entity => self.asm.store().intern_type(TypeKind::Entity(eref)),
      OoDeclKind::Concept => self
        .asm
        .store()
        .intern_type(TypeKind::Concept(ConceptType { refs: vec![eref] })),
    }
  }

  fn record_failure(&mut self) {
    self.errors += 1;
    if self.errors > self.asm.options().max_errors && !self.fatal {
      self.fatal = true;
      self.diagnostics.push(codes::TOO_MANY_ERRORS.error(
        format!("aborting after {} errors", self.errors),
        Span::file_start(FileId(0)),
      ));
    }
  }

  /// Run one declaration body to completion or failure. On success the body
  /// is finished and registered under `key`; on failure the partial body is
  /// abandoned and the error budget charged.
  fn run<F>(&mut self, key: String, file: FileId, ns: &str, terms: TermMap, drive: F)
  where
    F: FnOnce(&mut Checker<'_>) -> CheckResult<()>,
  {
    if self.fatal {
      return;
    }
    let (emitter, result) = {
      let mut checker = Checker::new(
        self.asm,
        &mut self.irasm,
        &mut self.diagnostics,
        file,
        ns,
        key.clone(),
        terms,
      );
      let result = drive(&mut checker);
      if result.is_err() {
        checker.emitter.set_enabled(false);
      }
      (checker.emitter, result)
    };
    match result {
      Ok(()) => match emitter.finish() {
        Ok(body) => self.irasm.register_body(key, body),
        Err(err) => {
          self
            .diagnostics
            .push(codes::UNSUPPORTED_OP.error(err.to_string(), Span::file_start(file)));
          self.record_failure();
        }
      },
      Err(Abort) => self.record_failure(),
    }
  }

  fn declare_args(
    checker: &mut Checker<'_>,
    env: &mut Env,
    params: &[ParamDecl],
    rest: Option<&RestParamDecl>,
    ns: &str,
    terms: &TermMap,
    span: diagnostics::TextRange,
  ) -> CheckResult<()> {
    if !params_well_ordered(params.iter().map(|p| p.optional), rest.is_some()) {
      return checker.fail(
        codes::BAD_PARAMETER_ORDER,
        "optional parameters may not precede required ones or combine with a rest parameter",
        span,
      );
    }
    let specials = checker.asm.specials().clone();
    for param in params {
      let ty = checker.normalize_in(&param.sig, ns, terms, param.span)?;
      let declared = if param.optional && param.default.is_none() {
        checker.asm.store().union(vec![ty, specials.none])
      } else {
        ty
      };
      let reg = checker.emitter.register_var(param.name.clone(), declared);
      checker.var_regs.insert(param.name.clone(), reg);
      env.declare_var(
        param.name.clone(),
        VarInfo {
          declared,
          flow: declared,
          is_const: true,
          must_defined: true,
          storage: VarStorage::Arg,
        },
      );
    }
    if let Some(rest) = rest {
      let ty = checker.normalize_in(&rest.sig, ns, terms, span)?;
      if checker.asm.rest_element_type(ty).is_none() {
        return checker.fail(
          codes::TYPE_MISMATCH,
          format!("rest parameter type `{}` is not a collection", checker.display(ty)),
          span,
        );
      }
      let reg = checker.emitter.register_var(rest.name.clone(), ty);
      checker.var_regs.insert(rest.name.clone(), reg);
      env.declare_var(
        rest.name.clone(),
        VarInfo {
          declared: ty,
          flow: ty,
          is_const: true,
          must_defined: true,
          storage: VarStorage::Arg,
        },
      );
    }
    Ok(())
  }

  pub fn check_function(&mut self, fdecl: &'a FunctionDecl) {
    let key = IrAssembly::function_key(&fdecl.ns, &fdecl.name);
    let terms = self.terms_for(&TermMap::default(), &fdecl.type_params, &fdecl.ns);
    let body_terms = terms.clone();
    let cond_key = key.clone();
    self.run(key, fdecl.file, &fdecl.ns.clone(), terms, move |checker| {
      let mut env = Env::new(body_terms.clone());
      Self::declare_args(
        checker,
        &mut env,
        &fdecl.params,
        fdecl.rest.as_ref(),
        &fdecl.ns,
        &body_terms,
        fdecl.span,
      )?;
      let declared = checker.normalize_in(&fdecl.result, &fdecl.ns, &body_terms, fdecl.span)?;
      for (idx, pre) in fdecl.preconds.iter().enumerate() {
        checker.check_condition_body(&env, pre, &format!("{}$pre{}", cond_key, idx), None)?;
      }
      for (idx, post) in fdecl.postconds.iter().enumerate() {
        checker.check_condition_body(
          &env,
          post,
          &format!("{}$post{}", cond_key, idx),
          Some(declared),
        )?;
      }
      checker.check_body_returning(env, &fdecl.body, Some(declared))?;
      Ok(())
    });
  }

  pub fn check_namespace_const(&mut self, ns: &str, cdecl: &'a ConstDecl) {
    let key = IrAssembly::const_key(ns, &cdecl.name);
    self.check_initializer(key, ns, cdecl.file, &cdecl.sig, &cdecl.value, cdecl.span);
  }

  pub fn check_global(&mut self, ns: &str, gdecl: &'a GlobalDecl) {
    let key = IrAssembly::global_key(ns, &gdecl.name);
    self.check_initializer(key, ns, gdecl.file, &gdecl.sig, &gdecl.value, gdecl.span);
  }

  fn check_initializer(
    &mut self,
    key: String,
    ns: &str,
    file: FileId,
    sig: &'a ast_opal::TypeSig,
    value: &'a Expression,
    span: diagnostics::TextRange,
  ) {
    self.check_initializer_with_terms(key, ns, file, TermMap::default(), sig, value, span);
  }

  #[allow(clippy::too_many_arguments)]
  fn check_initializer_with_terms(
    &mut self,
    key: String,
    ns: &str,
    file: FileId,
    terms: TermMap,
    sig: &'a ast_opal::TypeSig,
    value: &'a Expression,
    span: diagnostics::TextRange,
  ) {
    let ns = ns.to_string();
    let body_terms = terms.clone();
    self.run(key, file, &ns.clone(), terms, move |checker| {
      let declared = checker.normalize_in(sig, &ns, &body_terms, span)?;
      let env = Env::new(body_terms.clone());
      let trgt = checker.emitter.generate_tmp_register();
      let out = checker.check_expr_joined(&env, value, trgt, Some(declared))?;
      let specials = checker.specials();
      let ty = out.result_type().unwrap_or(specials.any);
      checker.expect_subtype(ty, declared, value.span)?;
      checker.emitter.emit(Op::ReturnAssign { src: trgt });
      let exit = checker.emitter.exit_block();
      checker.emitter.emit(Op::DirectJump { target: exit });
      Ok(())
    });
  }

  pub fn check_oo_decl(&mut self, decl_id: DeclId) {
    let decl = self.asm.decl(decl_id);
    let terms = self.terms_for(&TermMap::default(), &decl.type_params, &decl.ns);
    let this_ty = self.receiver_type(decl_id, &terms);
    let owner = IrAssembly::type_key(self.asm, this_ty);

    for cdecl in &decl.consts {
      if self.fatal {
        return;
      }
      let key = IrAssembly::const_key(&owner, &cdecl.name);
      self.check_initializer_with_terms(
        key,
        &decl.ns,
        cdecl.file,
        terms.clone(),
        &cdecl.sig,
        &cdecl.value,
        cdecl.span,
      );
    }

    for sdecl in &decl.statics {
      if self.fatal {
        return;
      }
      let key = IrAssembly::static_key(&owner, &sdecl.name);
      let sterms = self.terms_for(&terms, &sdecl.type_params, &decl.ns);
      let body_terms = sterms.clone();
      let ns = decl.ns.clone();
      self.run(key, sdecl.file, &decl.ns.clone(), sterms, move |checker| {
        let mut env = Env::new(body_terms.clone());
        Self::declare_args(
          checker,
          &mut env,
          &sdecl.params,
          sdecl.rest.as_ref(),
          &ns,
          &body_terms,
          sdecl.span,
        )?;
        let declared = checker.normalize_in(&sdecl.result, &ns, &body_terms, sdecl.span)?;
        checker.check_body_returning(env, &sdecl.body, Some(declared))?;
        Ok(())
      });
    }

    for mdecl in &decl.methods {
      if self.fatal {
        return;
      }
      let Some(body) = &mdecl.body else {
        continue;
      };
      let key = IrAssembly::method_key(&owner, &mdecl.name);
      let mterms = self.terms_for(&terms, &mdecl.type_params, &decl.ns);
      let body_terms = mterms.clone();
      let ns = decl.ns.clone();
      let cond_key = key.clone();
      self.run(key, mdecl.file, &decl.ns.clone(), mterms, move |checker| {
        let mut env = Env::new(body_terms.clone());
        let this_reg = checker.emitter.register_var("this", this_ty);
        checker.var_regs.insert("this".to_string(), this_reg);
        env.declare_var(
          "this",
          VarInfo {
            declared: this_ty,
            flow: this_ty,
            is_const: true,
            must_defined: true,
            storage: VarStorage::Arg,
          },
        );
        Self::declare_args(
          checker,
          &mut env,
          &mdecl.params,
          mdecl.rest.as_ref(),
          &ns,
          &body_terms,
          mdecl.span,
        )?;
        let declared = checker.normalize_in(&mdecl.result, &ns, &body_terms, mdecl.span)?;
        for (idx, pre) in mdecl.preconds.iter().enumerate() {
          checker.check_condition_body(&env, pre, &format!("{}$pre{}", cond_key, idx), None)?;
        }
        for (idx, post) in mdecl.postconds.iter().enumerate() {
          checker.check_condition_body(
            &env,
            post,
            &format!("{}$post{}", cond_key, idx),
            Some(declared),
          )?;
        }
        checker.check_body_returning(env, body, Some(declared))?;
        Ok(())
      });
    }

    for (idx, inv) in decl.invariants.iter().enumerate() {
      if self.fatal {
        return;
      }
      let key = format!("{}$invariant{}", owner, idx);
      let body_terms = terms.clone();
      self.run(key, inv.file, &decl.ns.clone(), terms.clone(), move |checker| {
        let specials = checker.specials();
        let mut env = Env::new(body_terms.clone());
        let this_reg = checker.emitter.register_var("this", this_ty);
        checker.var_regs.insert("this".to_string(), this_reg);
        env.declare_var(
          "this",
          VarInfo {
            declared: this_ty,
            flow: this_ty,
            is_const: true,
            must_defined: true,
            storage: VarStorage::Arg,
          },
        );
        let trgt = checker.emitter.generate_tmp_register();
        let out = checker.check_expr_joined(&env, &inv.exp, trgt, Some(specials.bool_))?;
        let ty = out.result_type().unwrap_or(specials.any);
        checker.expect_subtype(ty, specials.bool_, inv.exp.span)?;
        checker.emitter.emit(Op::ReturnAssign { src: trgt });
        let exit = checker.emitter.exit_block();
        checker.emitter.emit(Op::DirectJump { target: exit });
        Ok(())
      });
    }
  }

  /// Walk every declaration in deterministic order: namespaces sorted by
  /// name (consts, then globals, then functions, each sorted), then OO
  /// declarations in id order.
  pub fn check_assembly(&mut self) {
    let mut ns_names: Vec<String> = self.asm.namespaces().map(|(name, _)| name.clone()).collect();
    ns_names.sort();
    for ns in &ns_names {
      let Some(namespace) = self.asm.namespace(ns) else {
        continue;
      };
      let mut consts: Vec<(&String, &ConstDecl)> = namespace.consts.iter().collect();
      consts.sort_by(|a, b| a.0.cmp(b.0));
      for (_, cdecl) in consts {
        if self.fatal {
          return;
        }
        self.check_namespace_const(ns, cdecl);
      }
      let mut globals: Vec<(&String, &GlobalDecl)> = namespace.globals.iter().collect();
      globals.sort_by(|a, b| a.0.cmp(b.0));
      for (_, gdecl) in globals {
        if self.fatal {
          return;
        }
        self.check_global(ns, gdecl);
      }
      let mut functions: Vec<(&String, &FunctionDecl)> = namespace.functions.iter().collect();
      functions.sort_by(|a, b| a.0.cmp(b.0));
      for (_, fdecl) in functions {
        if self.fatal {
          return;
        }
        self.check_function(fdecl);
      }
    }
    let decl_ids: Vec<DeclId> = self.asm.decls().map(|(id, _)| id).collect();
    for decl_id in decl_ids {
      if self.fatal {
        return;
      }
      self.check_oo_decl(decl_id);
    }
  }
}
