//! Registry of diagnostic codes emitted by `typecheck-opal`.
//!
//! Each [`Code`] documents the expected shape of diagnostics the checker
//! emits: the short description and where the primary span should point.

use diagnostics::{sort_diagnostics, sort_labels, Diagnostic, Span};

/// Metadata describing a diagnostic code.
#[derive(Clone, Copy, Debug)]
pub struct Code {
  /// Stable string identifier, e.g. `OP0001`.
  pub id: &'static str,
  /// Short description of what the diagnostic reports.
  pub description: &'static str,
  /// Guidance for where the primary span should be anchored.
  pub primary_span: &'static str,
}

impl Code {
  pub const fn new(
    id: &'static str,
    description: &'static str,
    primary_span: &'static str,
  ) -> Self {
    Code {
      id,
      description,
      primary_span,
    }
  }

  pub const fn as_str(&self) -> &'static str {
    self.id
  }

  /// Construct an error diagnostic tagged with this code.
  pub fn error(&self, message: impl Into<String>, primary: Span) -> Diagnostic {
    Diagnostic::error(self.id, message, primary)
  }
}

pub const TYPE_MISMATCH: Code = Code::new(
  "OP0001",
  "value type does not conform to the expected type",
  "the expression with the offending type",
);
pub const UNKNOWN_NAME: Code = Code::new(
  "OP0002",
  "name does not resolve to any declaration, variable, or member",
  "the unresolved name",
);
pub const DUPLICATE_NAME: Code = Code::new(
  "OP0003",
  "name is bound more than once in the same construct",
  "the second binding",
);
pub const MISSING_REQUIRED: Code = Code::new(
  "OP0004",
  "required parameter or field was not provided",
  "the call or constructor",
);
pub const REDUNDANT_NULL_CHECK: Code = Code::new(
  "OP0005",
  "none-test has a statically known outcome",
  "the tested expression",
);
pub const REDUNDANT_TRUTH: Code = Code::new(
  "OP0006",
  "boolean test has a statically known outcome",
  "the tested expression",
);
pub const AMBIGUOUS_CALL: Code = Code::new(
  "OP0007",
  "call target cannot be resolved to a unique root declaration",
  "the invocation name",
);
pub const AMBIGUOUS_FIELD: Code = Code::new(
  "OP0008",
  "field access does not resolve to a unique root declaration",
  "the field name",
);
pub const UNREACHABLE_CODE: Code = Code::new(
  "OP0009",
  "statement can never execute",
  "the first unreachable statement",
);
pub const ILLEGAL_SHADOWING: Code = Code::new(
  "OP0010",
  "declaration shadows a name already in scope",
  "the shadowing declaration",
);
pub const ASSIGN_TO_CONST: Code = Code::new(
  "OP0011",
  "assignment target was declared const",
  "the assignment",
);
pub const USE_BEFORE_DEF: Code = Code::new(
  "OP0012",
  "variable may be used before it is assigned",
  "the variable access",
);
pub const BAD_PARAMETER_ORDER: Code = Code::new(
  "OP0013",
  "optional parameters may not precede required ones or combine with rest",
  "the parameter list",
);
pub const RECORD_MASKS_ANY_METHOD: Code = Code::new(
  "OP0014",
  "record property shadows a universal method",
  "the property name",
);
pub const NOT_PARSABLE: Code = Code::new(
  "OP0015",
  "typed string target does not provide Parsable",
  "the type annotation",
);
pub const UNSUPPORTED_OP: Code = Code::new(
  "OP0016",
  "operation is not supported on the operand types",
  "the operator",
);
pub const TOO_MANY_ERRORS: Code = Code::new(
  "OP0017",
  "error budget exhausted; checking aborted",
  "the start of the file being checked",
);
pub const MISSING_RETURN: Code = Code::new(
  "OP0018",
  "a reachable path reaches the end of the body without returning",
  "the body",
);

/// Sort labels inside each diagnostic and then the diagnostics themselves to
/// keep outputs deterministic regardless of traversal order.
pub fn normalize_diagnostics(diagnostics: &mut Vec<Diagnostic>) {
  for diagnostic in diagnostics.iter_mut() {
    sort_labels(&mut diagnostic.labels);
    diagnostic.notes.sort();
  }
  sort_diagnostics(diagnostics);
}
