//! Plain-text rendering with caret highlighting.

use crate::Diagnostic;
use crate::FileId;
use crate::Label;
use std::fmt::Write;

/// Provides access to source text for rendering diagnostics.
///
/// Returning `None` lets consumers handle missing files gracefully (for
/// example, a file that was never registered with the session).
pub trait SourceProvider {
  fn file_name(&self, file: FileId) -> Option<&str>;
  fn file_text(&self, file: FileId) -> Option<&str>;
}

/// Render a diagnostic into a human-readable string with caret highlighting.
pub fn render_diagnostic(provider: &dyn SourceProvider, diagnostic: &Diagnostic) -> String {
  let mut out = String::new();

  writeln!(
    out,
    "{}[{}]: {}",
    diagnostic.severity, diagnostic.code, diagnostic.message
  )
  .unwrap();

  let name = provider
    .file_name(diagnostic.primary.file)
    .unwrap_or("<unknown>");
  let text = provider.file_text(diagnostic.primary.file);
  let (line, col) = match text {
    Some(text) => line_and_column(text, diagnostic.primary.range.start as usize),
    None => (1, diagnostic.primary.range.start as usize + 1),
  };
  writeln!(out, " --> {}:{}:{}", name, line, col).unwrap();

  let mut labels = vec![Label {
    span: diagnostic.primary,
    message: diagnostic.message.clone(),
    is_primary: true,
  }];
  labels.extend(diagnostic.labels.iter().cloned());
  crate::sort_labels(&mut labels);

  for label in &labels {
    render_label(provider.file_text(label.span.file), &mut out, label);
  }
  for note in &diagnostic.notes {
    writeln!(out, " = note: {}", note).unwrap();
  }
  out
}

fn render_label(text: Option<&str>, out: &mut String, label: &Label) {
  let marker = if label.is_primary { '^' } else { '-' };
  let text = match text {
    Some(text) => text,
    None => {
      writeln!(
        out,
        "  | {} [{}..{}] {}",
        marker, label.span.range.start, label.span.range.end, label.message
      )
      .unwrap();
      return;
    }
  };

  let start = (label.span.range.start as usize).min(text.len());
  let end = (label.span.range.end as usize).min(text.len()).max(start);
  let starts = line_starts(text);
  let line_idx = line_index_at(&starts, start);
  let line_start = starts[line_idx];
  let line_end = starts
    .get(line_idx + 1)
    .map(|next| next - 1)
    .unwrap_or(text.len());

  let shown_end = end.min(line_end).max(start);
  let underline_offset = start - line_start;
  let underline_len = (shown_end - start).max(1);

  writeln!(out, "{:>3} | {}", line_idx + 1, &text[line_start..line_end]).unwrap();
  write!(out, "    | {}", " ".repeat(underline_offset)).unwrap();
  for _ in 0..underline_len {
    out.push(marker);
  }
  if !label.message.is_empty() {
    out.push(' ');
    out.push_str(&label.message);
  }
  out.push('\n');
}

fn line_and_column(text: &str, offset: usize) -> (usize, usize) {
  let starts = line_starts(text);
  let offset = offset.min(text.len());
  let line_idx = line_index_at(&starts, offset);
  (line_idx + 1, offset - starts[line_idx] + 1)
}

fn line_index_at(starts: &[usize], offset: usize) -> usize {
  match starts.binary_search(&offset) {
    Ok(idx) => idx,
    Err(0) => 0,
    Err(idx) => idx - 1,
  }
}

fn line_starts(text: &str) -> Vec<usize> {
  let mut starts = vec![0];
  for (idx, ch) in text.char_indices() {
    if ch == '\n' {
      starts.push(idx + 1);
    }
  }
  starts
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{Span, TextRange};

  struct OneFile {
    name: &'static str,
    text: &'static str,
  }

  impl SourceProvider for OneFile {
    fn file_name(&self, _file: FileId) -> Option<&str> {
      Some(self.name)
    }

    fn file_text(&self, _file: FileId) -> Option<&str> {
      Some(self.text)
    }
  }

  #[test]
  fn renders_single_line_caret() {
    let source = OneFile {
      name: "main.opal",
      text: "var x = 1;",
    };
    let diag = Diagnostic::error(
      "OP0001",
      "type mismatch",
      Span::new(FileId(0), TextRange::new(4, 5)),
    );
    let rendered = render_diagnostic(&source, &diag);
    assert!(rendered.starts_with("error[OP0001]: type mismatch\n"));
    assert!(rendered.contains(" --> main.opal:1:5"));
    assert!(rendered.contains("^ type mismatch"));
  }

  #[test]
  fn renders_without_source_text() {
    struct NoText;
    impl SourceProvider for NoText {
      fn file_name(&self, _file: FileId) -> Option<&str> {
        None
      }

      fn file_text(&self, _file: FileId) -> Option<&str> {
        None
      }
    }
    let diag = Diagnostic::error(
      "OP0002",
      "unknown name",
      Span::new(FileId(3), TextRange::new(7, 9)),
    );
    let rendered = render_diagnostic(&NoText, &diag);
    assert!(rendered.contains("<unknown>"));
    assert!(rendered.contains("[7..9]"));
  }
}
