//! Human-readable rendering of resolved types for diagnostics.

use std::fmt;

use crate::decls::Assembly;
use crate::ids::TypeId;
use crate::kind::TypeKind;

/// Borrowing display adapter: `format!("{}", TypeDisplay::new(&asm, ty))`.
pub struct TypeDisplay<'a> {
  asm: &'a Assembly,
  ty: TypeId,
}

impl<'a> TypeDisplay<'a> {
  pub fn new(asm: &'a Assembly, ty: TypeId) -> Self {
    Self { asm, ty }
  }

  fn fmt_type(&self, f: &mut fmt::Formatter<'_>, ty: TypeId) -> fmt::Result {
    let store = self.asm.store();
    match store.type_kind(ty) {
      TypeKind::Union(members) => {
        let limit = self.asm.options().type_display_limit;
        for (idx, member) in members.iter().enumerate() {
          if idx > 0 {
            write!(f, " | ")?;
          }
          if idx >= limit {
            return write!(f, "...");
          }
          self.fmt_type(f, *member)?;
        }
        Ok(())
      }
      TypeKind::Tuple(tuple) => {
        write!(f, "[")?;
        for (idx, entry) in tuple.entries.iter().enumerate() {
          if idx > 0 {
            write!(f, ", ")?;
          }
          self.fmt_type(f, entry.ty)?;
          if entry.optional {
            write!(f, "?")?;
          }
        }
        if tuple.open {
          if !tuple.entries.is_empty() {
            write!(f, ", ")?;
          }
          write!(f, "...")?;
        }
        write!(f, "]")
      }
      TypeKind::Record(record) => {
        write!(f, "{{")?;
        for (idx, entry) in record.entries.iter().enumerate() {
          if idx > 0 {
            write!(f, ", ")?;
          }
          write!(f, "{}", store.name(entry.name))?;
          if entry.optional {
            write!(f, "?")?;
          }
          write!(f, ": ")?;
          self.fmt_type(f, entry.ty)?;
        }
        if record.open {
          if !record.entries.is_empty() {
            write!(f, ", ")?;
          }
          write!(f, "...")?;
        }
        write!(f, "}}")
      }
      TypeKind::Entity(eref) => {
        write!(f, "{}", self.asm.decl_name(eref.decl))?;
        self.fmt_binds(f, &eref.binds)
      }
      TypeKind::Concept(concept) => {
        for (idx, cref) in concept.refs.iter().enumerate() {
          if idx > 0 {
            write!(f, " & ")?;
          }
          write!(f, "{}", self.asm.decl_name(cref.decl))?;
          self.fmt_binds(f, &cref.binds)?;
        }
        Ok(())
      }
      TypeKind::Function(func) => {
        write!(f, "fn(")?;
        for (idx, param) in func.params.iter().enumerate() {
          if idx > 0 {
            write!(f, ", ")?;
          }
          write!(f, "{}", store.name(param.name))?;
          if param.optional {
            write!(f, "?")?;
          }
          write!(f, ": ")?;
          self.fmt_type(f, param.ty)?;
        }
        if let Some(rest) = func.rest {
          if !func.params.is_empty() {
            write!(f, ", ")?;
          }
          write!(f, "...: ")?;
          self.fmt_type(f, rest)?;
        }
        write!(f, ") -> ")?;
        self.fmt_type(f, func.result)
      }
    }
  }

  fn fmt_binds(&self, f: &mut fmt::Formatter<'_>, binds: &[TypeId]) -> fmt::Result {
    if binds.is_empty() {
      return Ok(());
    }
    write!(f, "<")?;
    for (idx, bind) in binds.iter().enumerate() {
      if idx > 0 {
        write!(f, ", ")?;
      }
      self.fmt_type(f, *bind)?;
    }
    write!(f, ">")
  }
}

impl fmt::Display for TypeDisplay<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.fmt_type(f, self.ty)
  }
}
