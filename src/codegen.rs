//! Code emission: NASM-style Intel-syntax x86-64 text, produced directly as
//! the parser walks the grammar.
//!
//! The emitter uses a simple stack machine: every expression leaves exactly
//! one value on the machine stack in its full width (8 bytes for int, 16
//! for string, 24 for slice), binary operators pop both operands and push
//! the result, and statements discard leftover values to keep the stack
//! balanced. There is no instruction selection beyond these fixed
//! sequences.

use crate::runtime;
use crate::symtab::Binding;
use crate::tokenizer::TokenKind;
use crate::ty::Type;

/// Stack space reserved for a function's declared locals; declaring more
/// than fits is a compile-time error.
pub const LOCAL_SPACE: i64 = 64;

/// Accumulates output text, the label counter, and the string pool.
pub struct Gen {
  out: String,
  label_num: u32,
  strs: Vec<String>,
}

impl Gen {
  pub fn new() -> Self {
    Self {
      out: String::new(),
      label_num: 0,
      strs: Vec::new(),
    }
  }

  pub fn finish(self) -> String {
    self.out
  }

  fn line(&mut self, s: &str) {
    self.out.push_str(s);
    self.out.push('\n');
  }

  /// Emit the runtime prologue: program entry, syscall shims, string and
  /// slice helpers, and the bump allocator.
  pub fn program_start(&mut self) {
    self.line("global _start");
    self.line("section .text");
    self.line("");
    self.out.push_str(&runtime::start_stub());
    for helper in runtime::HELPERS {
      self.line("");
      self.out.push_str(helper);
    }
    self.line("");
  }

  /// Format a frame-base address for the given byte offset.
  pub fn frame_addr(offset: i64) -> String {
    if offset < 0 {
      format!("rbp{offset}")
    } else {
      format!("rbp+{offset}")
    }
  }

  pub fn const_def(&mut self, name: &str, value: i64) {
    self.line(&format!("{name} equ {value}"));
  }

  pub fn int_lit(&mut self, n: i64) {
    self.line(&format!("push qword {n}"));
  }

  /// Push a string literal: length then address. Identical literals share
  /// one pooled label.
  pub fn str_lit(&mut self, s: &str) {
    let index = match self.strs.iter().position(|pooled| pooled == s) {
      Some(index) => index,
      None => {
        self.strs.push(s.to_string());
        self.strs.len() - 1
      }
    };
    self.line(&format!("push qword {}", s.len()));
    self.line(&format!("push qword str{index}"));
  }

  /// Push the value at `addr` in one, two, or three 8-byte moves.
  fn fetch(&mut self, ty: Type, addr: &str) {
    match ty {
      Type::Void => {}
      Type::Int => self.line(&format!("push qword [{addr}]")),
      Type::Str => {
        self.line(&format!("push qword [{addr}+8]"));
        self.line(&format!("push qword [{addr}]"));
      }
      Type::SliceInt | Type::SliceStr => {
        self.line(&format!("push qword [{addr}+16]"));
        self.line(&format!("push qword [{addr}+8]"));
        self.line(&format!("push qword [{addr}]"));
      }
    }
  }

  /// Pop the top of stack into `addr`, inverse of [`Gen::fetch`].
  fn assign(&mut self, ty: Type, addr: &str) {
    match ty {
      Type::Void => {}
      Type::Int => self.line(&format!("pop qword [{addr}]")),
      Type::Str => {
        self.line(&format!("pop qword [{addr}]"));
        self.line(&format!("pop qword [{addr}+8]"));
      }
      Type::SliceInt | Type::SliceStr => {
        self.line(&format!("pop qword [{addr}]"));
        self.line(&format!("pop qword [{addr}+8]"));
        self.line(&format!("pop qword [{addr}+16]"));
      }
    }
  }

  pub fn local_fetch(&mut self, offset: i64, ty: Type) {
    self.fetch(ty, &Self::frame_addr(offset));
  }

  pub fn global_fetch(&mut self, name: &str, ty: Type) {
    self.fetch(ty, name);
  }

  /// A named constant is an assembler `equ` symbol, pushed by value.
  pub fn const_fetch(&mut self, name: &str) {
    self.line(&format!("push qword {name}"));
  }

  pub fn local_assign(&mut self, offset: i64, ty: Type) {
    self.assign(ty, &Self::frame_addr(offset));
  }

  pub fn global_assign(&mut self, name: &str, ty: Type) {
    self.assign(ty, name);
  }

  /// Store into `base[index]`. Expects the stack to hold the element value
  /// on top of the index; `base_addr` locates the slice header whose first
  /// word is the element array's address.
  pub fn slice_assign(&mut self, ty: Type, base_addr: &str) {
    self.line("pop rax");
    if ty == Type::SliceStr {
      self.line("pop rbx");
      self.line("pop rcx");
      self.line("add rcx, rcx");
    } else {
      self.line("pop rcx");
    }
    self.line(&format!("mov rdx, [{base_addr}]"));
    self.line("mov [rdx+rcx*8], rax");
    if ty == Type::SliceStr {
      self.line("mov [rdx+rcx*8+8], rbx");
    }
  }

  /// Call a function and re-push its register-borne result in stack form.
  pub fn call(&mut self, name: &str, result: Type) {
    self.line(&format!("call {name}"));
    match result {
      Type::Void => {}
      Type::Int => self.line("push rax"),
      Type::Str => {
        self.line("push rbx");
        self.line("push rax");
      }
      Type::SliceInt | Type::SliceStr => {
        self.line("push rcx");
        self.line("push rbx");
        self.line("push rax");
      }
    }
  }

  pub fn func_start(&mut self, name: &str) {
    self.line("");
    self.line(&format!("{name}:"));
    self.line("push rbp");
    self.line("mov rbp, rsp");
    self.line(&format!("sub rsp, {LOCAL_SPACE}"));
  }

  /// Restore the frame and return, popping the argument bytes.
  pub fn func_end(&mut self, args_size: i64) {
    self.line("mov rsp, rbp");
    self.line("pop rbp");
    if args_size > 0 {
      self.line(&format!("ret {args_size}"));
    } else {
      self.line("ret");
    }
  }

  /// Move a return value from the stack into the result registers, then
  /// emit the epilogue.
  pub fn ret(&mut self, ty: Type, args_size: i64) {
    match ty {
      Type::Void => {}
      Type::Int => self.line("pop rax"),
      Type::Str => {
        self.line("pop rax");
        self.line("pop rbx");
      }
      Type::SliceInt | Type::SliceStr => {
        self.line("pop rax");
        self.line("pop rbx");
        self.line("pop rcx");
      }
    }
    self.func_end(args_size);
  }

  pub fn unary(&mut self, op: TokenKind) {
    self.line("pop rax");
    if op == TokenKind::Minus {
      self.line("neg rax");
    } else if op == TokenKind::Not {
      self.line("cmp rax, 0");
      self.line("mov rax, 0");
      self.line("setz al");
    }
    self.line("push rax");
  }

  /// Integer binary operator: rhs in `rbx`, lhs in `rax`, result pushed.
  /// Comparisons materialize 0/1; `&&`/`||` are bitwise over 0/1 values.
  pub fn binary_int(&mut self, op: TokenKind) {
    self.line("pop rbx");
    self.line("pop rax");
    match op {
      TokenKind::Plus => self.line("add rax, rbx"),
      TokenKind::Minus => self.line("sub rax, rbx"),
      TokenKind::Star => self.line("imul rbx"),
      TokenKind::Slash => {
        self.line("cqo");
        self.line("idiv rbx");
      }
      TokenKind::Percent => {
        self.line("cqo");
        self.line("idiv rbx");
        self.line("mov rax, rdx");
      }
      TokenKind::EqEq => self.compare("sete"),
      TokenKind::NotEq => self.compare("setne"),
      TokenKind::Less => self.compare("setl"),
      TokenKind::LessEq => self.compare("setle"),
      TokenKind::Greater => self.compare("setg"),
      TokenKind::GreaterEq => self.compare("setge"),
      TokenKind::AndAnd => self.line("and rax, rbx"),
      TokenKind::OrOr => self.line("or rax, rbx"),
      _ => unreachable!("not an integer operator: {op:?}"),
    }
    self.line("push rax");
  }

  fn compare(&mut self, set: &str) {
    self.line("cmp rax, rbx");
    self.line("mov rax, 0");
    self.line(&format!("{set} al"));
  }

  /// String concatenation via the runtime; result re-pushed in stack form.
  pub fn str_add(&mut self) {
    self.line("call _strAdd");
    self.line("push rbx");
    self.line("push rax");
  }

  pub fn str_eq(&mut self) {
    self.line("call _strEq");
    self.line("push rax");
  }

  pub fn str_not_eq(&mut self) {
    self.line("call _strEq");
    self.line("cmp rax, 0");
    self.line("mov rax, 0");
    self.line("setz al");
    self.line("push rax");
  }

  pub fn new_label(&mut self) -> String {
    self.label_num += 1;
    format!("label{}", self.label_num)
  }

  pub fn jump_if_zero(&mut self, label: &str) {
    self.line("pop rax");
    self.line("cmp rax, 0");
    self.line(&format!("jz {label}"));
  }

  pub fn jump(&mut self, label: &str) {
    self.line(&format!("jmp {label}"));
  }

  pub fn place_label(&mut self, label: &str) {
    self.line("");
    self.line(&format!("{label}:"));
  }

  /// Drop an unused expression-statement value.
  pub fn discard(&mut self, ty: Type) {
    let size = ty.size();
    if size > 0 {
      self.line(&format!("add rsp, {size}"));
    }
  }

  /// Rewrite the top of stack for `s[:max]`: capacity stays, length becomes
  /// `max`, address is unchanged.
  pub fn slice_expr(&mut self) {
    self.line("pop rax");
    self.line("pop rbx");
    self.line("pop rcx");
    self.line("push rax");
    self.line("push rbx");
  }

  /// Indexed fetch from a string or slice; the index sits on top of the
  /// indexed value.
  pub fn slice_fetch(&mut self, ty: Type) {
    match ty {
      Type::Str => {
        self.line("pop rax");
        self.line("pop rbx");
        self.line("pop rcx");
        self.line("xor rdx, rdx");
        self.line("mov dl, [rbx+rax]");
        self.line("push rdx");
      }
      Type::SliceInt => {
        self.line("pop rax");
        self.line("pop rbx");
        self.line("pop rcx");
        self.line("pop rdx");
        self.line("push qword [rbx+rax*8]");
      }
      Type::SliceStr => {
        self.line("pop rax");
        self.line("pop rbx");
        self.line("pop rcx");
        self.line("pop rdx");
        self.line("add rax, rax");
        self.line("push qword [rbx+rax*8+8]");
        self.line("push qword [rbx+rax*8]");
      }
      Type::Void | Type::Int => unreachable!("not indexable: {ty:?}"),
    }
  }

  /// Emit the data section (out-of-memory message, pooled string literals,
  /// zeroed globals) and the BSS heap reservation.
  pub fn data_sections(&mut self, globals: &[Binding]) {
    self.line("");
    self.line("section .data");
    self.line("_strOutOfMem: db `out of memory\\n`");

    for (index, s) in self.strs.clone().iter().enumerate() {
      self.line(&format!("str{index}: db {}", escape(s, '`')));
    }

    self.line("align 8");
    for global in globals {
      match global.ty {
        Type::Int => self.line(&format!("{}: dq 0", global.name)),
        Type::Str => self.line(&format!("{}: dq 0, 0", global.name)),
        _ => self.line(&format!("{}: dq 0, 0, 0", global.name)),
      }
    }

    self.line("");
    self.line("section .bss");
    self.line("_heapPtr: resq 1");
    self.line(&format!("_heap: resb {}", runtime::HEAP_SIZE));
    self.line("_heapEnd:");
  }
}

/// Quote `s` for the assembler using `delim` as the quote character.
fn escape(s: &str, delim: char) -> String {
  let mut quoted = String::with_capacity(s.len() + 2);
  quoted.push(delim);
  for ch in s.chars() {
    match ch {
      '"' => quoted.push_str("\\\""),
      '\\' => quoted.push_str("\\\\"),
      '\t' => quoted.push_str("\\t"),
      '\r' => quoted.push_str("\\r"),
      '\n' => quoted.push_str("\\n"),
      '`' => quoted.push_str("\\`"),
      _ => quoted.push(ch),
    }
  }
  quoted.push(delim);
  quoted
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn string_literals_are_pooled() {
    let mut emit = Gen::new();
    emit.str_lit("abc");
    emit.str_lit("def");
    emit.str_lit("abc");
    let out = emit.finish();
    assert_eq!(out.matches("push qword str0").count(), 2);
    assert_eq!(out.matches("push qword str1").count(), 1);
    assert!(!out.contains("str2"));
  }

  #[test]
  fn pooled_literal_appears_once_in_data_section() {
    let mut emit = Gen::new();
    emit.str_lit("abc");
    emit.str_lit("abc");
    emit.data_sections(&[]);
    let out = emit.finish();
    assert_eq!(out.matches("str0: db `abc`").count(), 1);
  }

  #[test]
  fn labels_increase_monotonically() {
    let mut emit = Gen::new();
    assert_eq!(emit.new_label(), "label1");
    assert_eq!(emit.new_label(), "label2");
    assert_eq!(emit.new_label(), "label3");
  }

  #[test]
  fn frame_addresses() {
    assert_eq!(Gen::frame_addr(16), "rbp+16");
    assert_eq!(Gen::frame_addr(-24), "rbp-24");
  }

  #[test]
  fn escape_quotes_the_full_set() {
    assert_eq!(escape("a\tb", '`'), "`a\\tb`");
    assert_eq!(escape("say \"hi\"\n", '`'), "`say \\\"hi\\\"\\n`");
    assert_eq!(escape("back`tick\\", '`'), "`back\\`tick\\\\`");
  }

  #[test]
  fn discard_matches_type_width() {
    let mut emit = Gen::new();
    emit.discard(Type::Void);
    emit.discard(Type::Int);
    emit.discard(Type::Str);
    emit.discard(Type::SliceStr);
    let out = emit.finish();
    assert_eq!(
      out,
      "add rsp, 8\nadd rsp, 16\nadd rsp, 24\n"
    );
  }

  #[test]
  fn globals_are_zeroed_at_their_width() {
    let mut emit = Gen::new();
    emit.data_sections(&[
      Binding {
        name: "n".to_string(),
        ty: Type::Int,
      },
      Binding {
        name: "s".to_string(),
        ty: Type::Str,
      },
      Binding {
        name: "v".to_string(),
        ty: Type::SliceStr,
      },
    ]);
    let out = emit.finish();
    assert!(out.contains("n: dq 0\n"));
    assert!(out.contains("s: dq 0, 0\n"));
    assert!(out.contains("v: dq 0, 0, 0\n"));
  }
}
