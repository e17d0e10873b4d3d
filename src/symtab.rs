//! Symbol tables: globals, named constants, functions with signatures, and
//! the current function's locals.
//!
//! All tables are ordered and linearly searched; insertion order is
//! observable because it determines frame addressing for locals. Identifier
//! resolution always probes locals, then globals, then constants, then
//! functions – first match wins, so a local shadows a same-named global.

use crate::ty::Type;

/// A named variable (global or local) and its type.
#[derive(Debug, Clone)]
pub struct Binding {
  pub name: String,
  pub ty: Type,
}

/// A function's result type and parameter types, in declaration order.
/// While a `func` header is being parsed the record is patched in place:
/// each parameter pushes its type, and the optional result type overwrites
/// the `Void` placeholder.
#[derive(Debug, Clone)]
pub struct Signature {
  pub result: Type,
  pub params: Vec<Type>,
}

#[derive(Debug, Clone)]
pub struct Func {
  pub name: String,
  pub sig: Signature,
}

/// What an identifier resolved to; the payload is the index into the
/// corresponding table.
#[derive(Debug, Clone, Copy)]
pub enum Resolved {
  Local(usize),
  Global(usize),
  Const(usize),
  Func(usize),
}

pub struct SymTab {
  pub globals: Vec<Binding>,
  pub consts: Vec<String>,
  pub funcs: Vec<Func>,
  /// The current function's arguments (first `params.len()` entries) and
  /// declared locals; cleared when the function body ends.
  pub locals: Vec<Binding>,
  /// Index into `funcs` of the function being compiled, if any.
  pub cur_func: Option<usize>,
}

impl SymTab {
  /// Build the table set with the runtime builtins pre-registered, plus the
  /// `Expression`/`Block` forward references the compiler needs in order to
  /// compile its own mutually recursive source.
  pub fn new() -> Self {
    let mut tab = Self {
      globals: Vec::new(),
      consts: Vec::new(),
      funcs: Vec::new(),
      locals: Vec::new(),
      cur_func: None,
    };
    tab.add_builtin("print", Type::Void, &[Type::Str]);
    tab.add_builtin("log", Type::Void, &[Type::Str]);
    tab.add_builtin("getc", Type::Int, &[]);
    tab.add_builtin("exit", Type::Void, &[Type::Int]);
    tab.add_builtin("char", Type::Str, &[Type::Int]);
    tab.add_builtin("len", Type::Int, &[Type::Str]);
    tab.add_builtin("_lenSlice", Type::Int, &[Type::SliceInt]);
    tab.add_builtin("int", Type::Int, &[Type::Int]);
    tab.add_builtin("append", Type::SliceInt, &[Type::SliceInt, Type::Int]);
    tab.add_builtin("_appendInt", Type::SliceInt, &[Type::SliceInt, Type::Int]);
    tab.add_builtin("_appendString", Type::SliceStr, &[Type::SliceStr, Type::Str]);
    tab.add_builtin("Expression", Type::Int, &[]);
    tab.add_builtin("Block", Type::Void, &[]);
    tab
  }

  fn add_builtin(&mut self, name: &str, result: Type, params: &[Type]) {
    self.funcs.push(Func {
      name: name.to_string(),
      sig: Signature {
        result,
        params: params.to_vec(),
      },
    });
  }

  pub fn find_local(&self, name: &str) -> Option<usize> {
    self.locals.iter().position(|b| b.name == name)
  }

  pub fn find_global(&self, name: &str) -> Option<usize> {
    self.globals.iter().position(|b| b.name == name)
  }

  pub fn find_const(&self, name: &str) -> Option<usize> {
    self.consts.iter().position(|c| c == name)
  }

  pub fn find_func(&self, name: &str) -> Option<usize> {
    self.funcs.iter().position(|f| f.name == name)
  }

  /// Fixed lookup order: locals, globals, constants, functions.
  pub fn resolve(&self, name: &str) -> Option<Resolved> {
    if let Some(i) = self.find_local(name) {
      return Some(Resolved::Local(i));
    }
    if let Some(i) = self.find_global(name) {
      return Some(Resolved::Global(i));
    }
    if let Some(i) = self.find_const(name) {
      return Some(Resolved::Const(i));
    }
    self.find_func(name).map(Resolved::Func)
  }

  pub fn define_local(&mut self, name: String, ty: Type) {
    self.locals.push(Binding { name, ty });
  }

  pub fn define_global(&mut self, name: String, ty: Type) {
    self.globals.push(Binding { name, ty });
  }

  pub fn define_const(&mut self, name: String) {
    self.consts.push(name);
  }

  /// Register a user function with a `Void` result and no parameters yet;
  /// the header parse patches both. Returns the function's index.
  pub fn declare_func(&mut self, name: String) -> usize {
    self.funcs.push(Func {
      name,
      sig: Signature {
        result: Type::Void,
        params: Vec::new(),
      },
    });
    self.funcs.len() - 1
  }

  fn cur_sig(&self) -> &Signature {
    &self.funcs[self.cur_func.expect("no function in scope")].sig
  }

  pub fn add_param(&mut self, ty: Type) {
    let index = self.cur_func.expect("no function in scope");
    self.funcs[index].sig.params.push(ty);
  }

  pub fn set_result(&mut self, ty: Type) {
    let index = self.cur_func.expect("no function in scope");
    self.funcs[index].sig.result = ty;
  }

  /// Offset of a local from the frame base. Arguments sit above the saved
  /// frame pointer and return address (positive offsets; the first argument
  /// was pushed first, so it is deepest), declared locals below (negative).
  pub fn local_offset(&self, index: usize) -> i64 {
    let num_args = self.cur_sig().params.len();
    if index < num_args {
      let mut offset = 16;
      let mut i = num_args - 1;
      while i > index {
        offset += self.locals[i].ty.size();
        i -= 1;
      }
      offset
    } else {
      let mut offset = 0;
      for local in &self.locals[num_args..=index] {
        offset -= local.ty.size();
      }
      offset
    }
  }

  /// Size in bytes of the current function's arguments.
  pub fn args_size(&self) -> i64 {
    self.cur_sig().params.iter().map(|ty| ty.size()).sum()
  }

  /// Size in bytes of the current function's declared locals (excluding
  /// arguments).
  pub fn locals_size(&self) -> i64 {
    let num_args = self.cur_sig().params.len();
    self.locals[num_args..].iter().map(|b| b.ty.size()).sum()
  }

  /// Clear per-function state at the end of a function body.
  pub fn end_func(&mut self) {
    self.locals.clear();
    self.cur_func = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn with_func(params: &[Type]) -> SymTab {
    let mut tab = SymTab::new();
    let index = tab.declare_func("f".to_string());
    tab.cur_func = Some(index);
    for (i, &ty) in params.iter().enumerate() {
      tab.define_local(format!("arg{i}"), ty);
      tab.add_param(ty);
    }
    tab
  }

  #[test]
  fn resolution_prefers_locals_over_globals() {
    let mut tab = with_func(&[]);
    tab.define_global("x".to_string(), Type::Int);
    tab.define_local("x".to_string(), Type::Str);
    match tab.resolve("x") {
      Some(Resolved::Local(i)) => assert_eq!(tab.locals[i].ty, Type::Str),
      other => panic!("expected local, got {other:?}"),
    }
  }

  #[test]
  fn resolution_falls_back_to_funcs() {
    let tab = SymTab::new();
    assert!(matches!(tab.resolve("print"), Some(Resolved::Func(_))));
    assert!(tab.resolve("nope").is_none());
  }

  #[test]
  fn argument_offsets_are_positive_and_first_arg_is_deepest() {
    let tab = with_func(&[Type::Int, Type::Str]);
    // Pushed in source order: the int arg is under the 16-byte string arg.
    assert_eq!(tab.local_offset(1), 16);
    assert_eq!(tab.local_offset(0), 32);
  }

  #[test]
  fn declared_local_offsets_are_negative_and_stack_down() {
    let mut tab = with_func(&[Type::Int]);
    tab.define_local("a".to_string(), Type::Int);
    tab.define_local("s".to_string(), Type::Str);
    tab.define_local("v".to_string(), Type::SliceInt);
    assert_eq!(tab.local_offset(1), -8);
    assert_eq!(tab.local_offset(2), -24);
    assert_eq!(tab.local_offset(3), -48);
  }

  #[test]
  fn args_and_locals_sizes() {
    let mut tab = with_func(&[Type::Int, Type::SliceStr]);
    tab.define_local("a".to_string(), Type::Str);
    assert_eq!(tab.args_size(), 32);
    assert_eq!(tab.locals_size(), 16);
    tab.end_func();
    assert!(tab.locals.is_empty());
    assert!(tab.cur_func.is_none());
  }
}
