//! Body entry: wraps expression and block bodies, wiring the exit block and
//! verifying return-type conformance.

use ast_opal::{Body, BodyKind};
use ir_opal::Op;
use types_opal::TypeId;

use crate::codes;
use crate::error::CheckResult;

use super::expr::Checker;
use super::flow::Env;

impl<'a> Checker<'a> {
  /// Check a declaration body against its declared result type (when known),
  /// returning the result type the body actually produces.
  pub fn check_body_returning(
    &mut self,
    env: Env,
    body: &Body,
    declared: Option<TypeId>,
  ) -> CheckResult<TypeId> {
    self.result_hint = declared;
    let specials = self.specials();
    let exit = self.emitter.exit_block();
    match &body.kind {
      BodyKind::Raw(_) => {
        // Opaque implementation: nothing to verify or lower.
        self.emitter.emit(Op::DirectJump { target: exit });
        Ok(declared.unwrap_or(specials.any))
      }
      BodyKind::Expression(expr) => {
        let trgt = self.emitter.generate_tmp_register();
        let out = self.check_expr_joined(&env, expr, trgt, declared)?;
        let ty = out.result_type().unwrap_or(specials.any);
        if let Some(declared) = declared {
          self.expect_subtype(ty, declared, expr.span)?;
        }
        self.emitter.emit(Op::ReturnAssign { src: trgt });
        self.emitter.emit(Op::DirectJump { target: exit });
        Ok(declared.unwrap_or(ty))
      }
      BodyKind::Block(block) => {
        let out = self.check_block(&env, block)?;
        if out.reachable {
          return self.fail(
            codes::MISSING_RETURN,
            "a reachable path reaches the end of the body without returning",
            body.span,
          );
        }
        let Some(ret) = out.return_type else {
          return self.fail(codes::MISSING_RETURN, "the body never returns a value", body.span);
        };
        if let Some(declared) = declared {
          self.expect_subtype(ret, declared, body.span)?;
          Ok(declared)
        } else {
          Ok(ret)
        }
      }
    }
  }
}
