//! Flow-sensitive type checker and IR lowerer for Opal.
//!
//! The core is the recursive expression/statement checker: given a typing
//! environment it verifies well-formedness, computes result types under
//! flow-sensitive None/Some and Bool refinements, and emits straight-line IR
//! into a basic-block body builder as it goes. [`check::CheckSession`] drives
//! it across a whole assembly; a failed declaration is charged against the
//! error budget and abandoned without corrupting the IR already produced for
//! other declarations.

pub mod check;
pub mod codes;
mod error;

use diagnostics::Diagnostic;
use ir_opal::IrAssembly;
use types_opal::Assembly;

pub use check::{CheckSession, Checker, Env, ExprResult, Truth, VarInfo, VarStorage};
pub use error::{Abort, CheckResult, FatalError};

/// Check every declaration in the assembly, returning the collected IR and
/// deterministically ordered diagnostics.
pub fn check_assembly(asm: &Assembly) -> (IrAssembly, Vec<Diagnostic>) {
  let mut session = CheckSession::new(asm);
  session.check_assembly();
  session.finish()
}
