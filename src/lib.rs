//! Crate root: wires together the compilation pipeline.
//!
//! The compiler makes a single forward pass: bytes in, assembly text out.
//! The stages are intentionally small and composable:
//! - `tokenizer` is a streaming lexer with automatic semicolon insertion.
//! - `parser` owns all syntactic and type knowledge and drives the emitter
//!   rule by rule; no AST is built.
//! - `codegen` lowers each parsed construct to NASM-style Intel-syntax
//!   x86-64 assembly on the spot, and `runtime` holds the fixed prologue
//!   every program starts with.
//! - `symtab` tracks globals, constants, functions, and frame locals.
//! - `error` centralises the line/column diagnostic shared by all stages.

pub mod codegen;
pub mod error;
pub mod parser;
pub mod runtime;
pub mod symtab;
pub mod tokenizer;
pub mod ty;

pub use error::{CompileError, CompileResult};

/// Compile a source file into assembly for a NASM-style assembler.
pub fn compile(source: &[u8]) -> CompileResult<String> {
  let mut parser = parser::Parser::new(source)?;
  parser.source_file()?;
  Ok(parser.finish())
}
