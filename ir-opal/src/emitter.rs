//! Append-only body builder over basic blocks.

use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

use types_opal::TypeId;

use crate::ops::{BlockId, Op, Register};

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
  pub id: BlockId,
  pub label: String,
  pub ops: Vec<Op>,
}

/// A variable registered with a body and the register that holds it.
#[derive(Clone, Debug, PartialEq)]
pub struct VarSlot {
  pub name: String,
  pub ty: TypeId,
  pub reg: Register,
}

/// A completed body: the block graph plus the variables registered with it.
#[derive(Clone, Debug, PartialEq)]
pub struct IrBody {
  pub entry: BlockId,
  pub exit: BlockId,
  pub blocks: Vec<Block>,
  pub vars: Vec<VarSlot>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmitError {
  #[error("block {0:?} is unreachable from the entry block")]
  UnreachableBlock(BlockId),
}

/// Builds one body. Opcodes append to the active block; `enabled` gates all
/// output so a failed declaration can abandon its partial body without
/// rollback.
#[derive(Debug)]
pub struct BodyEmitter {
  blocks: Vec<Block>,
  entry: BlockId,
  exit: BlockId,
  active: BlockId,
  next_reg: u32,
  enabled: bool,
  vars: Vec<VarSlot>,
}

impl Default for BodyEmitter {
  fn default() -> Self {
    Self::new()
  }
}

impl BodyEmitter {
  pub fn new() -> Self {
    let mut emitter = BodyEmitter {
      blocks: Vec::new(),
      entry: BlockId(0),
      exit: BlockId(0),
      active: BlockId(0),
      next_reg: 0,
      enabled: true,
      vars: Vec::new(),
    };
    emitter.entry = emitter.create_new_block("entry");
    emitter.exit = emitter.create_new_block("exit");
    emitter.active = emitter.entry;
    emitter
  }

  pub fn entry_block(&self) -> BlockId {
    self.entry
  }

  pub fn exit_block(&self) -> BlockId {
    self.exit
  }

  pub fn active_block(&self) -> BlockId {
    self.active
  }

  pub fn generate_tmp_register(&mut self) -> Register {
    let reg = Register(self.next_reg);
    self.next_reg += 1;
    reg
  }

  pub fn create_new_block(&mut self, label: &str) -> BlockId {
    let id = BlockId(self.blocks.len() as u32);
    self.blocks.push(Block {
      id,
      label: label.to_string(),
      ops: Vec::new(),
    });
    id
  }

  pub fn set_active_block(&mut self, block: BlockId) {
    self.active = block;
  }

  pub fn enabled(&self) -> bool {
    self.enabled
  }

  pub fn set_enabled(&mut self, enabled: bool) {
    self.enabled = enabled;
  }

  pub fn emit(&mut self, op: Op) {
    if !self.enabled {
      return;
    }
    self.blocks[self.active.0 as usize].ops.push(op);
  }

  /// Register a named variable, allocating the register that will hold it.
  pub fn register_var(&mut self, name: impl Into<String>, ty: TypeId) -> Register {
    let reg = self.generate_tmp_register();
    self.vars.push(VarSlot {
      name: name.into(),
      ty,
      reg,
    });
    reg
  }

  /// Finish the body, verifying the block graph is connected: every created
  /// block must be reachable from the entry via emitted jumps.
  pub fn finish(self) -> Result<IrBody, EmitError> {
    let mut reachable = vec![false; self.blocks.len()];
    let mut queue = VecDeque::from([self.entry]);
    reachable[self.entry.0 as usize] = true;
    while let Some(block) = queue.pop_front() {
      for op in &self.blocks[block.0 as usize].ops {
        for target in op.jump_targets() {
          if !reachable[target.0 as usize] {
            reachable[target.0 as usize] = true;
            queue.push_back(target);
          }
        }
      }
    }
    if let Some(idx) = reachable.iter().position(|r| !r) {
      return Err(EmitError::UnreachableBlock(BlockId(idx as u32)));
    }
    Ok(IrBody {
      entry: self.entry,
      exit: self.exit,
      blocks: self.blocks,
      vars: self.vars,
    })
  }
}

impl fmt::Display for IrBody {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for block in &self.blocks {
      writeln!(f, "{} ({}):", block.id, block.label)?;
      for op in &block.ops {
        writeln!(f, "  {:?}", op)?;
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fresh_registers_are_sequential() {
    let mut emitter = BodyEmitter::new();
    assert_eq!(emitter.generate_tmp_register(), Register(0));
    assert_eq!(emitter.generate_tmp_register(), Register(1));
  }

  #[test]
  fn disabled_emitter_drops_ops() {
    let mut emitter = BodyEmitter::new();
    emitter.set_enabled(false);
    let reg = emitter.generate_tmp_register();
    emitter.emit(Op::LoadConstNone { trgt: reg });
    emitter.set_enabled(true);
    let exit = emitter.exit_block();
    emitter.emit(Op::DirectJump { target: exit });
    let body = emitter.finish().unwrap();
    assert_eq!(body.blocks[0].ops.len(), 1);
  }

  #[test]
  fn unconnected_block_is_rejected() {
    let mut emitter = BodyEmitter::new();
    let exit = emitter.exit_block();
    emitter.emit(Op::DirectJump { target: exit });
    let orphan = emitter.create_new_block("orphan");
    let err = emitter.finish().unwrap_err();
    assert_eq!(err, EmitError::UnreachableBlock(orphan));
  }
}
