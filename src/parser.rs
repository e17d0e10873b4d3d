//! Recursive-descent parser and type checker.
//!
//! The parser mirrors the grammar one function per rule and drives the
//! emitter directly as tokens are consumed – there is no AST. Each rule
//! that produces a value returns its static type, which is how type
//! information propagates upward: binary operators check their two operand
//! types, assignments compare against the symbol table, and call results
//! are discarded by width. The first mismatch aborts the pass.

use crate::codegen::{Gen, LOCAL_SPACE};
use crate::error::{CompileError, CompileResult};
use crate::symtab::{Resolved, SymTab};
use crate::tokenizer::{Lexer, TokenKind};
use crate::ty::Type;

pub struct Parser<'a> {
  lexer: Lexer<'a>,
  symtab: SymTab,
  emit: Gen,
}

impl<'a> Parser<'a> {
  /// Emit the runtime prologue and position the lexer on the first token.
  pub fn new(source: &'a [u8]) -> CompileResult<Self> {
    let mut parser = Self {
      lexer: Lexer::new(source),
      symtab: SymTab::new(),
      emit: Gen::new(),
    };
    parser.emit.program_start();
    parser.lexer.next()?;
    Ok(parser)
  }

  /// Emit the data and BSS sections and hand back the assembly text.
  pub fn finish(mut self) -> String {
    self.emit.data_sections(&self.symtab.globals);
    self.emit.finish()
  }

  fn err(&self, message: impl Into<String>) -> CompileError {
    self.lexer.err(message)
  }

  fn expect(&mut self, expected: TokenKind, msg: &str) -> CompileResult<()> {
    if self.lexer.token != expected {
      return Err(self.err(format!(
        "expected {msg} not {}",
        self.lexer.token.describe()
      )));
    }
    self.lexer.next()
  }

  /// Consume an identifier token and return its name.
  fn ident(&mut self, msg: &str) -> CompileResult<String> {
    let name = self.lexer.token_str.clone();
    self.expect(TokenKind::Ident, msg)?;
    Ok(name)
  }

  // ----- Identifier access -----

  /// Push an identifier's value; for a function name this only reports the
  /// result type. Lookup order is locals, globals, constants, functions.
  fn gen_identifier(&mut self, name: &str) -> CompileResult<Type> {
    match self.symtab.resolve(name) {
      Some(Resolved::Local(index)) => {
        let ty = self.symtab.locals[index].ty;
        let offset = self.symtab.local_offset(index);
        self.emit.local_fetch(offset, ty);
        Ok(ty)
      }
      Some(Resolved::Global(index)) => {
        let ty = self.symtab.globals[index].ty;
        let global = self.symtab.globals[index].name.clone();
        self.emit.global_fetch(&global, ty);
        Ok(ty)
      }
      Some(Resolved::Const(index)) => {
        let konst = self.symtab.consts[index].clone();
        self.emit.const_fetch(&konst);
        Ok(Type::Int)
      }
      Some(Resolved::Func(index)) => Ok(self.symtab.funcs[index].sig.result),
      None => Err(self.err(format!("identifier \"{name}\" not defined"))),
    }
  }

  /// Pop the top of stack into the named local or global.
  fn gen_assign(&mut self, name: &str) -> CompileResult<()> {
    if let Some(index) = self.symtab.find_local(name) {
      let ty = self.symtab.locals[index].ty;
      let offset = self.symtab.local_offset(index);
      self.emit.local_assign(offset, ty);
      return Ok(());
    }
    if let Some(index) = self.symtab.find_global(name) {
      let ty = self.symtab.globals[index].ty;
      let global = self.symtab.globals[index].name.clone();
      self.emit.global_assign(&global, ty);
      return Ok(());
    }
    Err(self.err(format!("identifier \"{name}\" not defined (or not assignable)")))
  }

  /// Type of the named variable (locals shadow globals).
  fn var_type(&self, name: &str) -> CompileResult<Type> {
    if let Some(index) = self.symtab.find_local(name) {
      return Ok(self.symtab.locals[index].ty);
    }
    if let Some(index) = self.symtab.find_global(name) {
      return Ok(self.symtab.globals[index].ty);
    }
    Err(self.err(format!("identifier \"{name}\" not defined")))
  }

  /// Address of the named variable's storage, for indexed stores.
  fn var_addr(&self, name: &str) -> CompileResult<String> {
    if let Some(index) = self.symtab.find_local(name) {
      return Ok(Gen::frame_addr(self.symtab.local_offset(index)));
    }
    if let Some(index) = self.symtab.find_global(name) {
      return Ok(self.symtab.globals[index].name.clone());
    }
    Err(self.err(format!("identifier \"{name}\" not defined")))
  }

  // ----- Expressions -----

  fn literal(&mut self) -> CompileResult<Type> {
    if self.lexer.token == TokenKind::IntLit {
      self.emit.int_lit(self.lexer.token_int);
      self.lexer.next()?;
      Ok(Type::Int)
    } else if self.lexer.token == TokenKind::StrLit {
      let s = self.lexer.token_str.clone();
      self.emit.str_lit(&s);
      self.lexer.next()?;
      Ok(Type::Str)
    } else {
      Err(self.err("expected integer or string literal"))
    }
  }

  fn operand(&mut self) -> CompileResult<Type> {
    match self.lexer.token {
      TokenKind::IntLit | TokenKind::StrLit => self.literal(),
      TokenKind::LParen => {
        self.lexer.next()?;
        let ty = self.expression()?;
        self.expect(TokenKind::RParen, ")")?;
        Ok(ty)
      }
      _ => Err(self.err("expected literal or identifier")),
    }
  }

  /// Comma-separated expressions; the first one's type is reported so
  /// `append`/`len` can be resolved by their leading argument. A single
  /// trailing comma before `)` is accepted.
  fn expression_list(&mut self) -> CompileResult<Type> {
    let first = self.expression()?;
    while self.lexer.token == TokenKind::Comma {
      self.lexer.next()?;
      if self.lexer.token == TokenKind::RParen {
        break;
      }
      self.expression()?;
    }
    Ok(first)
  }

  /// Parse a call's argument list and emit the call. `append` and `len`
  /// are generic over their first argument and rewritten to the concrete
  /// runtime routine once its type is known.
  fn arguments(&mut self, name: &str) -> CompileResult<Type> {
    self.expect(TokenKind::LParen, "(")?;
    let mut arg1 = Type::Void;
    if self.lexer.token != TokenKind::RParen {
      arg1 = self.expression_list()?;
    }
    self.expect(TokenKind::RParen, ")")?;

    let target = if name == "append" {
      match arg1 {
        Type::SliceInt => "_appendInt",
        Type::SliceStr => "_appendString",
        other => return Err(self.err(format!("can't append to {}", other.name()))),
      }
    } else if name == "len" {
      match arg1 {
        Type::Str => "len",
        Type::SliceInt | Type::SliceStr => "_lenSlice",
        other => {
          return Err(self.err(format!("can't get length of {}", other.name())));
        }
      }
    } else {
      name
    };

    let Some(index) = self.symtab.find_func(target) else {
      return Err(self.err(format!("identifier \"{name}\" not defined")));
    };
    let result = self.symtab.funcs[index].sig.result;
    self.emit.call(target, result);
    Ok(result)
  }

  fn index_expr(&mut self) -> CompileResult<()> {
    if self.expression()? != Type::Int {
      return Err(self.err("slice index must be int"));
    }
    Ok(())
  }

  /// Optional `[i]` or `[:n]` suffix on an operand.
  fn index_suffix(&mut self, ty: Type) -> CompileResult<Type> {
    if self.lexer.token != TokenKind::LBracket {
      return Ok(ty);
    }
    self.lexer.next()?;
    if self.lexer.token == TokenKind::Colon {
      if !ty.is_slice() {
        return Err(self.err("slice expression requires slice type"));
      }
      self.lexer.next()?;
      self.index_expr()?;
      self.expect(TokenKind::RBracket, "]")?;
      self.emit.slice_expr();
      return Ok(ty);
    }
    self.index_expr()?;
    self.expect(TokenKind::RBracket, "]")?;
    match ty {
      Type::Str | Type::SliceInt => {
        self.emit.slice_fetch(ty);
        Ok(Type::Int)
      }
      Type::SliceStr => {
        self.emit.slice_fetch(ty);
        Ok(Type::Str)
      }
      other => Err(self.err(format!("invalid slice type {}", other.name()))),
    }
  }

  fn primary_expr(&mut self) -> CompileResult<Type> {
    if self.lexer.token == TokenKind::Ident {
      let name = self.ident("identifier")?;
      if self.lexer.token == TokenKind::LParen {
        return self.arguments(&name);
      }
      let ty = self.gen_identifier(&name)?;
      return self.index_suffix(ty);
    }
    let ty = self.operand()?;
    self.index_suffix(ty)
  }

  fn unary_expr(&mut self) -> CompileResult<Type> {
    match self.lexer.token {
      TokenKind::Plus | TokenKind::Minus | TokenKind::Not => {
        let op = self.lexer.token;
        self.lexer.next()?;
        let ty = self.unary_expr()?;
        if ty != Type::Int {
          return Err(
            self.err(format!("unary operator not allowed on type {}", ty.name())),
          );
        }
        self.emit.unary(op);
        Ok(Type::Int)
      }
      _ => self.primary_expr(),
    }
  }

  /// Emit a binary operator over two already-pushed operands and report
  /// the result type.
  fn binary(&mut self, op: TokenKind, lhs: Type, rhs: Type) -> CompileResult<Type> {
    if lhs != rhs {
      return Err(self.err("binary operands must be the same type"));
    }
    match lhs {
      Type::Str => match op {
        TokenKind::Plus => {
          self.emit.str_add();
          Ok(Type::Str)
        }
        TokenKind::EqEq => {
          self.emit.str_eq();
          Ok(Type::Int)
        }
        TokenKind::NotEq => {
          self.emit.str_not_eq();
          Ok(Type::Int)
        }
        _ => Err(
          self.err(format!("operator {} not allowed on strings", op.describe())),
        ),
      },
      Type::Int => {
        self.emit.binary_int(op);
        Ok(Type::Int)
      }
      other => Err(self.err(format!(
        "operator {} not allowed on {}",
        op.describe(),
        other.name()
      ))),
    }
  }

  fn mul_expr(&mut self) -> CompileResult<Type> {
    let mut ty = self.unary_expr()?;
    while matches!(
      self.lexer.token,
      TokenKind::Star | TokenKind::Slash | TokenKind::Percent
    ) {
      let op = self.lexer.token;
      self.lexer.next()?;
      let rhs = self.unary_expr()?;
      ty = self.binary(op, ty, rhs)?;
    }
    Ok(ty)
  }

  fn add_expr(&mut self) -> CompileResult<Type> {
    let mut ty = self.mul_expr()?;
    while matches!(self.lexer.token, TokenKind::Plus | TokenKind::Minus) {
      let op = self.lexer.token;
      self.lexer.next()?;
      let rhs = self.mul_expr()?;
      ty = self.binary(op, ty, rhs)?;
    }
    Ok(ty)
  }

  fn comparison_expr(&mut self) -> CompileResult<Type> {
    let mut ty = self.add_expr()?;
    while matches!(
      self.lexer.token,
      TokenKind::EqEq
        | TokenKind::NotEq
        | TokenKind::Less
        | TokenKind::LessEq
        | TokenKind::Greater
        | TokenKind::GreaterEq
    ) {
      let op = self.lexer.token;
      self.lexer.next()?;
      let rhs = self.add_expr()?;
      ty = self.binary(op, ty, rhs)?;
    }
    Ok(ty)
  }

  fn and_expr(&mut self) -> CompileResult<Type> {
    let mut ty = self.comparison_expr()?;
    while self.lexer.token == TokenKind::AndAnd {
      self.lexer.next()?;
      let rhs = self.comparison_expr()?;
      ty = self.binary(TokenKind::AndAnd, ty, rhs)?;
    }
    Ok(ty)
  }

  fn or_expr(&mut self) -> CompileResult<Type> {
    let mut ty = self.and_expr()?;
    while self.lexer.token == TokenKind::OrOr {
      self.lexer.next()?;
      let rhs = self.and_expr()?;
      ty = self.binary(TokenKind::OrOr, ty, rhs)?;
    }
    Ok(ty)
  }

  fn expression(&mut self) -> CompileResult<Type> {
    self.or_expr()
  }

  // ----- Statements -----

  /// Assignment, short declaration, call, or indexed assignment – all
  /// start with an identifier, so dispatch happens on the token after it.
  fn simple_stmt(&mut self) -> CompileResult<()> {
    let name = self.lexer.token_str.clone();
    self.expect(TokenKind::Ident, "assignment or call statement")?;
    match self.lexer.token {
      TokenKind::Assign => {
        self.lexer.next()?;
        let lhs = self.var_type(&name)?;
        let rhs = self.expression()?;
        if lhs != rhs {
          return Err(
            self.err(format!("can't assign {} to {}", rhs.name(), lhs.name())),
          );
        }
        self.gen_assign(&name)
      }
      TokenKind::DeclAssign => {
        self.lexer.next()?;
        let ty = self.expression()?;
        self.symtab.define_local(name.clone(), ty);
        self.gen_assign(&name)
      }
      TokenKind::LParen => {
        let ty = self.arguments(&name)?;
        self.emit.discard(ty);
        Ok(())
      }
      TokenKind::LBracket => {
        self.lexer.next()?;
        self.index_expr()?;
        self.expect(TokenKind::RBracket, "]")?;
        self.expect(TokenKind::Assign, "=")?;
        let rhs = self.expression()?;
        let ty = self.var_type(&name)?;
        let elem = match ty {
          Type::SliceInt => Type::Int,
          Type::SliceStr => Type::Str,
          other => {
            return Err(self.err(format!("can't index assign to {}", other.name())));
          }
        };
        if elem != rhs {
          return Err(
            self.err(format!("can't assign {} to {}", rhs.name(), elem.name())),
          );
        }
        let addr = self.var_addr(&name)?;
        self.emit.slice_assign(ty, &addr);
        Ok(())
      }
      other => Err(self.err(format!(
        "expected assignment or call not {}",
        other.describe()
      ))),
    }
  }

  fn return_stmt(&mut self) -> CompileResult<()> {
    self.expect(TokenKind::Return, "\"return\"")?;
    let ty = if self.lexer.token != TokenKind::Semicolon {
      self.expression()?
    } else {
      Type::Void
    };
    self.emit.ret(ty, self.symtab.args_size());
    Ok(())
  }

  /// `if cond { A } else { B }` lowers to a jump-if-zero over A and an
  /// unconditional jump over B; `else if` chains recurse.
  fn if_stmt(&mut self) -> CompileResult<()> {
    self.expect(TokenKind::If, "\"if\"")?;
    self.expression()?;
    let if_label = self.emit.new_label();
    self.emit.jump_if_zero(&if_label);
    self.block()?;
    if self.lexer.token == TokenKind::Else {
      self.lexer.next()?;
      let else_label = self.emit.new_label();
      self.emit.jump(&else_label);
      self.emit.place_label(&if_label);
      if self.lexer.token == TokenKind::If {
        self.if_stmt()?;
      } else {
        self.block()?;
      }
      self.emit.place_label(&else_label);
    } else {
      self.emit.place_label(&if_label);
    }
    Ok(())
  }

  fn for_stmt(&mut self) -> CompileResult<()> {
    self.expect(TokenKind::For, "\"for\"")?;
    let loop_label = self.emit.new_label();
    self.emit.place_label(&loop_label);
    self.expression()?;
    let done_label = self.emit.new_label();
    self.emit.jump_if_zero(&done_label);
    self.block()?;
    self.emit.jump(&loop_label);
    self.emit.place_label(&done_label);
    Ok(())
  }

  fn statement(&mut self) -> CompileResult<()> {
    match self.lexer.token {
      TokenKind::If => self.if_stmt(),
      TokenKind::For => self.for_stmt(),
      TokenKind::Return => self.return_stmt(),
      _ => self.simple_stmt(),
    }
  }

  fn statement_list(&mut self) -> CompileResult<()> {
    while self.lexer.token != TokenKind::RBrace {
      self.statement()?;
      self.expect(TokenKind::Semicolon, ";")?;
    }
    Ok(())
  }

  fn block(&mut self) -> CompileResult<()> {
    self.expect(TokenKind::LBrace, "{")?;
    self.statement_list()?;
    self.expect(TokenKind::RBrace, "}")
  }

  // ----- Declarations -----

  /// A type is a bare name or `[]name`; `bool` is an alias for `int`.
  fn parse_type(&mut self) -> CompileResult<Type> {
    if self.lexer.token == TokenKind::LBracket {
      self.lexer.next()?;
      self.expect(TokenKind::RBracket, "]")?;
      let name = self.ident("\"int\" or \"string\"")?;
      return match name.as_str() {
        "int" | "bool" => Ok(Type::SliceInt),
        "string" => Ok(Type::SliceStr),
        _ => Err(self.err("only []int and []string are supported")),
      };
    }
    let name = self.ident("\"int\" or \"string\"")?;
    match name.as_str() {
      "int" | "bool" => Ok(Type::Int),
      "string" => Ok(Type::Str),
      _ => Err(self.err("only int and string are supported")),
    }
  }

  /// `name Type` – top-level variables are zeroed in the data section, so
  /// initializers are rejected.
  fn var_spec(&mut self) -> CompileResult<()> {
    let name = self.ident("variable identifier")?;
    let ty = self.parse_type()?;
    self.symtab.define_global(name, ty);
    if self.lexer.token == TokenKind::Assign {
      return Err(self.err("assignment not supported for top-level var"));
    }
    Ok(())
  }

  fn var_decl(&mut self) -> CompileResult<()> {
    self.expect(TokenKind::Var, "\"var\"")?;
    self.expect(TokenKind::LParen, "(")?;
    while self.lexer.token != TokenKind::RParen {
      self.var_spec()?;
      self.expect(TokenKind::Semicolon, ";")?;
    }
    self.expect(TokenKind::RParen, ")")
  }

  /// `name int = literal` – constants become assembler `equ` definitions.
  fn const_spec(&mut self) -> CompileResult<()> {
    let name = self.ident("variable identifier")?;
    self.symtab.define_const(name.clone());
    let ty = self.parse_type()?;
    if ty != Type::Int {
      return Err(self.err("constants must be typed int"));
    }
    self.expect(TokenKind::Assign, "=")?;
    let value = self.lexer.token_int;
    self.expect(TokenKind::IntLit, "integer literal")?;
    self.emit.const_def(&name, value);
    Ok(())
  }

  fn const_decl(&mut self) -> CompileResult<()> {
    self.expect(TokenKind::Const, "\"const\"")?;
    self.expect(TokenKind::LParen, "(")?;
    while self.lexer.token != TokenKind::RParen {
      self.const_spec()?;
      self.expect(TokenKind::Semicolon, ";")?;
    }
    self.expect(TokenKind::RParen, ")")
  }

  /// `name Type` parameter: defined as a local and appended to the
  /// function's signature.
  fn parameter_decl(&mut self) -> CompileResult<()> {
    let name = self.ident("parameter name")?;
    let ty = self.parse_type()?;
    self.symtab.define_local(name, ty);
    self.symtab.add_param(ty);
    Ok(())
  }

  /// Parameter list with at most one trailing comma before `)`.
  fn parameter_list(&mut self) -> CompileResult<()> {
    self.parameter_decl()?;
    while self.lexer.token == TokenKind::Comma {
      self.lexer.next()?;
      if self.lexer.token == TokenKind::RParen {
        break;
      }
      self.parameter_decl()?;
    }
    Ok(())
  }

  fn parameters(&mut self) -> CompileResult<()> {
    self.expect(TokenKind::LParen, "(")?;
    if self.lexer.token != TokenKind::RParen {
      self.parameter_list()?;
    }
    self.expect(TokenKind::RParen, ")")
  }

  /// Parameters plus optional result type; the result is present exactly
  /// when the next token is not `{`.
  fn signature(&mut self) -> CompileResult<()> {
    self.parameters()?;
    if self.lexer.token != TokenKind::LBrace {
      let ty = self.parse_type()?;
      self.symtab.set_result(ty);
    }
    Ok(())
  }

  fn func_decl(&mut self) -> CompileResult<()> {
    self.expect(TokenKind::Func, "\"func\"")?;
    let name = self.ident("function name")?;
    self.emit.func_start(&name);
    let index = self.symtab.declare_func(name.clone());
    self.symtab.cur_func = Some(index);
    self.signature()?;
    self.block()?;

    let size = self.symtab.locals_size();
    if size > LOCAL_SPACE {
      return Err(self.err(format!(
        "{name}'s locals too big ({size} > {LOCAL_SPACE})"
      )));
    }
    self.emit.func_end(self.symtab.args_size());
    self.symtab.end_func();
    Ok(())
  }

  fn top_level_decl(&mut self) -> CompileResult<()> {
    match self.lexer.token {
      TokenKind::Var => self.var_decl(),
      TokenKind::Const => self.const_decl(),
      TokenKind::Func => self.func_decl(),
      _ => Err(self.err("expected \"var\", \"const\", or \"func\"")),
    }
  }

  fn package_clause(&mut self) -> CompileResult<()> {
    self.expect(TokenKind::Package, "\"package\"")?;
    self.ident("package identifier")?;
    Ok(())
  }

  /// Whole source file: package clause, then top-level declarations, each
  /// terminated by a (possibly inserted) semicolon.
  pub fn source_file(&mut self) -> CompileResult<()> {
    self.package_clause()?;
    self.expect(TokenKind::Semicolon, ";")?;

    while matches!(
      self.lexer.token,
      TokenKind::Var | TokenKind::Func | TokenKind::Const
    ) {
      self.top_level_decl()?;
      self.expect(TokenKind::Semicolon, ";")?;
    }

    self.expect(TokenKind::Eof, "end of file")
  }
}
