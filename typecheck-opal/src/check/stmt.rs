//! Statement checking: declarations, assignment, conditionals, returns,
//! assertions, and blocks, with environment joins at merge points and
//! reachability tracking.

use ast_opal::{BlockStatement, CondBranch, Statement, StmtKind};
use diagnostics::TextRange;
use ir_opal::Op;

use crate::codes;
use crate::error::CheckResult;

use super::expr::Checker;
use super::flow::{Env, VarInfo, VarStorage};

impl<'a> Checker<'a> {
  pub fn check_statement(&mut self, env: &Env, stmt: &Statement) -> CheckResult<Env> {
    let specials = self.specials();
    match &stmt.kind {
      StmtKind::Empty => Ok(env.clone()),
      StmtKind::VarDecl {
        name,
        is_const,
        sig,
        init,
      } => {
        if env.has_var(name) {
          return self.fail(
            codes::ILLEGAL_SHADOWING,
            format!("`{}` shadows a variable already in scope", name),
            stmt.span,
          );
        }
        if *is_const && init.is_none() {
          return self.fail(
            codes::MISSING_REQUIRED,
            format!("const variable `{}` requires an initializer", name),
            stmt.span,
          );
        }
        if sig.is_auto() && init.is_none() {
          return self.fail(
            codes::TYPE_MISMATCH,
            format!("the type of `{}` cannot be inferred without an initializer", name),
            stmt.span,
          );
        }
        match init {
          Some(value) => {
            let declared_hint = if sig.is_auto() {
              None
            } else {
              Some(self.resolve_sig(sig, sig.span)?)
            };
            let reg = self.emitter.generate_tmp_register();
            let mut cur = self.check_expr_joined(env, value, reg, declared_hint)?;
            let ity = cur.result_type().unwrap_or(specials.any);
            let declared = declared_hint.unwrap_or(ity);
            self.expect_subtype(ity, declared, value.span)?;
            let var_reg = self.emitter.register_var(name.clone(), declared);
            self.var_regs.insert(name.clone(), var_reg);
            self.emitter.emit(Op::LocalLifetimeStart {
              name: name.clone(),
              ty: declared,
            });
            self.emitter.emit(Op::RegAssign {
              trgt: var_reg,
              src: reg,
            });
            cur.declare_var(
              name.clone(),
              VarInfo {
                declared,
                flow: ity,
                is_const: *is_const,
                must_defined: true,
                storage: VarStorage::Local,
              },
            );
            Ok(cur.clear_result())
          }
          None => {
            let declared = self.resolve_sig(sig, sig.span)?;
            let var_reg = self.emitter.register_var(name.clone(), declared);
            self.var_regs.insert(name.clone(), var_reg);
            self.emitter.emit(Op::LocalLifetimeStart {
              name: name.clone(),
              ty: declared,
            });
            let mut cur = env.clone();
            cur.declare_var(
              name.clone(),
              VarInfo {
                declared,
                flow: declared,
                is_const: false,
                must_defined: false,
                storage: VarStorage::Local,
              },
            );
            Ok(cur.clear_result())
          }
        }
      }
      StmtKind::VarAssign { name, value } => {
        let Some(info) = env.lookup_var(name).cloned() else {
          return self.fail(
            codes::UNKNOWN_NAME,
            format!("variable `{}` is not declared", name),
            stmt.span,
          );
        };
        if info.is_const {
          return self.fail(
            codes::ASSIGN_TO_CONST,
            format!("`{}` was declared const", name),
            stmt.span,
          );
        }
        let reg = self.emitter.generate_tmp_register();
        let mut cur = self.check_expr_joined(env, value, reg, Some(info.declared))?;
        let vty = cur.result_type().unwrap_or(specials.any);
        self.expect_subtype(vty, info.declared, value.span)?;
        let Some(var_reg) = self.var_regs.get(name).copied() else {
          return self.fail(
            codes::UNSUPPORTED_OP,
            format!("`{}` cannot be assigned in this body", name),
            stmt.span,
          );
        };
        self.emitter.emit(Op::RegAssign {
          trgt: var_reg,
          src: reg,
        });
        cur.assign_var(name, vty);
        Ok(cur.clear_result())
      }
      StmtKind::If {
        branches,
        else_block,
      } => self.check_if(env, branches, else_block.as_ref(), stmt.span),
      StmtKind::Return(value) => {
        let reg = self.emitter.generate_tmp_register();
        let hint = self.result_hint;
        let mut cur = self.check_expr_joined(env, value, reg, hint)?;
        let ty = cur.result_type().unwrap_or(specials.any);
        cur.add_return(ty, self.asm);
        for name in cur.live_locals().iter().rev() {
          self.emitter.emit(Op::LocalLifetimeEnd { name: name.clone() });
        }
        self.emitter.emit(Op::ReturnAssign { src: reg });
        let exit = self.emitter.exit_block();
        self.emitter.emit(Op::DirectJump { target: exit });
        Ok(cur.clear_result().not_reachable())
      }
      StmtKind::Assert(test) => self.check_guard(env, test, stmt.span, true),
      StmtKind::Check(test) => self.check_guard(env, test, stmt.span, false),
      StmtKind::Block(block) => self.check_block(env, block),
    }
  }

  /// `assert`/`check`: the test must be truth-valued with both outcomes
  /// feasible; the true-flow environment propagates.
  fn check_guard(
    &mut self,
    env: &Env,
    test: &ast_opal::Expression,
    span: TextRange,
    is_assert: bool,
  ) -> CheckResult<Env> {
    let specials = self.specials();
    let reg = self.emitter.generate_tmp_register();
    let flows = self.check_expression(env, test, reg, None)?;
    let joined = Env::join(flows.clone(), self.asm);
    let bool_or_none = self.asm.bool_or_none();
    self.expect_subtype(
      joined.result_type().unwrap_or(specials.any),
      bool_or_none,
      test.span,
    )?;
    let (trues, falses) = Self::split_truth(&flows);
    if trues.is_empty() {
      return self.fail(codes::REDUNDANT_TRUTH, "test is never true", span);
    }
    if falses.is_empty() {
      return self.fail(codes::REDUNDANT_TRUTH, "test is always true", span);
    }
    let conv = self.emitter.generate_tmp_register();
    self.emitter.emit(Op::TruthyConversion { trgt: conv, src: reg });
    if is_assert {
      self.emitter.emit(Op::Assert { src: conv });
    } else {
      self.emitter.emit(Op::Check { src: conv });
    }
    Ok(Env::join(trues, self.asm).clear_result())
  }

  fn check_if(
    &mut self,
    env: &Env,
    branches: &[CondBranch],
    else_block: Option<&BlockStatement>,
    span: TextRange,
  ) -> CheckResult<Env> {
    if branches.len() > 1 && else_block.is_none() {
      return self.fail(
        codes::UNSUPPORTED_OP,
        "an elseif chain requires an else block",
        span,
      );
    }
    let specials = self.specials();
    let bool_or_none = self.asm.bool_or_none();
    let mut merge_block = None;
    let mut out_envs: Vec<Env> = Vec::new();
    let mut cur_env = env.clone();
    for branch in branches {
      let treg = self.emitter.generate_tmp_register();
      let tflows = self.check_expression(&cur_env, &branch.cond, treg, None)?;
      let joined = Env::join(tflows.clone(), self.asm);
      self.expect_subtype(
        joined.result_type().unwrap_or(specials.any),
        bool_or_none,
        branch.cond.span,
      )?;
      let (trues, falses) = Self::split_truth(&tflows);
      if trues.is_empty() {
        return self.fail(codes::REDUNDANT_TRUTH, "condition is never true", branch.cond.span);
      }
      if falses.is_empty() {
        return self.fail(codes::REDUNDANT_TRUTH, "condition is always true", branch.cond.span);
      }
      let conv = self.emitter.generate_tmp_register();
      self.emitter.emit(Op::TruthyConversion { trgt: conv, src: treg });
      let then_block = self.emitter.create_new_block("if_true");
      let else_blk = self.emitter.create_new_block("if_else");
      self.emitter.emit(Op::BoolJump {
        src: conv,
        true_block: then_block,
        false_block: else_blk,
      });
      self.emitter.set_active_block(then_block);
      let tenv = Env::join(trues, self.asm).clear_result();
      let out = self.check_block(&tenv, &branch.block)?;
      if out.reachable {
        let merge = *merge_block.get_or_insert_with(|| self.emitter.create_new_block("if_merge"));
        self.emitter.emit(Op::DirectJump { target: merge });
      }
      out_envs.push(out);
      self.emitter.set_active_block(else_blk);
      cur_env = Env::join(falses, self.asm).clear_result();
    }
    match else_block {
      Some(block) => {
        let out = self.check_block(&cur_env, block)?;
        if out.reachable {
          let merge = *merge_block.get_or_insert_with(|| self.emitter.create_new_block("if_merge"));
          self.emitter.emit(Op::DirectJump { target: merge });
        }
        out_envs.push(out);
      }
      None => {
        let merge = *merge_block.get_or_insert_with(|| self.emitter.create_new_block("if_merge"));
        self.emitter.emit(Op::DirectJump { target: merge });
        out_envs.push(cur_env);
      }
    }
    if let Some(merge) = merge_block {
      self.emitter.set_active_block(merge);
    }
    Ok(Env::join(out_envs, self.asm).clear_result())
  }

  /// Check a block: pushes a local scope, stops at the first statement that
  /// clears normal flow (flagging any trailing statements), and closes every
  /// local's lifetime on exit.
  pub fn check_block(&mut self, env: &Env, block: &BlockStatement) -> CheckResult<Env> {
    let mut cur = env.clone();
    cur.push_scope();
    for stmt in &block.stmts {
      if !cur.reachable {
        return self.fail(
          codes::UNREACHABLE_CODE,
          "statement can never execute",
          stmt.span,
        );
      }
      cur = self.check_statement(&cur, stmt)?;
    }
    let names = cur.pop_scope();
    if cur.reachable {
      for name in names.iter().rev() {
        self.emitter.emit(Op::LocalLifetimeEnd { name: name.clone() });
      }
    }
    Ok(cur)
  }
}
