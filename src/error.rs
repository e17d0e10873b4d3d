//! Shared error utilities used across the compilation pipeline.
//!
//! Diagnostics are kept lightweight on purpose – one line/column pair and
//! a message. The first error aborts the pass; there is no recovery and no
//! multi-error report.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
#[snafu(display("{line}:{col}: {message}"))]
pub struct CompileError {
  pub line: u32,
  pub col: u32,
  pub message: String,
}

impl CompileError {
  /// Construct an error anchored at the lexer's current line and column.
  pub fn at(line: u32, col: u32, message: impl Into<String>) -> Self {
    Self {
      line,
      col,
      message: message.into(),
    }
  }
}
