//! Backend-neutral straight-line IR for Opal bodies.
//!
//! The checker drives [`BodyEmitter`] while it types a declaration: opcodes
//! append to the active basic block in evaluation order, fresh temporaries
//! come from a sequential counter, and the whole body is either completed via
//! [`BodyEmitter::finish`] or abandoned when its declaration fails to check.
//! [`IrAssembly`] accumulates the cross-declaration artifacts: compiled
//! bodies, lambdas, discovered call targets, and pending initializers.

mod emitter;
mod irasm;
mod ops;

pub use emitter::Block;
pub use emitter::BodyEmitter;
pub use emitter::EmitError;
pub use emitter::IrBody;
pub use emitter::VarSlot;
pub use irasm::IrAssembly;
pub use irasm::LambdaIr;
pub use ops::BlockId;
pub use ops::Op;
pub use ops::Register;
