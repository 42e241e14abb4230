use thiserror::Error;

/// Token signalling that a diagnostic was already recorded and the current
/// declaration must unwind to its driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abort;

pub type CheckResult<T> = Result<T, Abort>;

/// Fatal, unrecoverable error for the whole check session.
#[derive(Debug, Error)]
pub enum FatalError {
  #[error("too many errors ({0}); aborting check")]
  TooManyErrors(usize),
  #[error("body emission produced a disconnected block graph: {0}")]
  Emit(#[from] ir_opal::EmitError),
}
