//! Lexical analysis: a one-token-at-a-time cursor over the source bytes.
//!
//! The tokenizer is intentionally tiny – it knows nothing about semantics
//! beyond recognising keywords, literals, and operators. There is no token
//! vector: the parser sees exactly one current token and advances with
//! [`Lexer::next`]. Newlines can synthesize a `;` token (automatic semicolon
//! insertion), so the grammar upstream only ever deals with explicit
//! terminators.

use crate::error::{CompileError, CompileResult};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  // Keywords.
  If,
  Else,
  For,
  Var,
  Const,
  Func,
  Return,
  Package,
  // Literals, identifiers, and EOF. The payload lives in `Lexer::token_int`
  // or `Lexer::token_str`.
  IntLit,
  StrLit,
  Ident,
  Eof,
  // Two-character operators.
  OrOr,
  AndAnd,
  EqEq,
  NotEq,
  LessEq,
  GreaterEq,
  DeclAssign,
  // Single-character operators and punctuation.
  Plus,
  Minus,
  Star,
  Slash,
  Percent,
  Comma,
  Semicolon,
  Colon,
  Assign,
  Not,
  Less,
  Greater,
  LParen,
  RParen,
  LBrace,
  RBrace,
  LBracket,
  RBracket,
}

impl TokenKind {
  /// Human-friendly spelling used in diagnostics.
  pub fn describe(self) -> &'static str {
    match self {
      TokenKind::If => "if",
      TokenKind::Else => "else",
      TokenKind::For => "for",
      TokenKind::Var => "var",
      TokenKind::Const => "const",
      TokenKind::Func => "func",
      TokenKind::Return => "return",
      TokenKind::Package => "package",
      TokenKind::IntLit => "integer",
      TokenKind::StrLit => "string",
      TokenKind::Ident => "identifier",
      TokenKind::Eof => "EOF",
      TokenKind::OrOr => "||",
      TokenKind::AndAnd => "&&",
      TokenKind::EqEq => "==",
      TokenKind::NotEq => "!=",
      TokenKind::LessEq => "<=",
      TokenKind::GreaterEq => ">=",
      TokenKind::DeclAssign => ":=",
      TokenKind::Plus => "+",
      TokenKind::Minus => "-",
      TokenKind::Star => "*",
      TokenKind::Slash => "/",
      TokenKind::Percent => "%",
      TokenKind::Comma => ",",
      TokenKind::Semicolon => ";",
      TokenKind::Colon => ":",
      TokenKind::Assign => "=",
      TokenKind::Not => "!",
      TokenKind::Less => "<",
      TokenKind::Greater => ">",
      TokenKind::LParen => "(",
      TokenKind::RParen => ")",
      TokenKind::LBrace => "{",
      TokenKind::RBrace => "}",
      TokenKind::LBracket => "[",
      TokenKind::RBracket => "]",
    }
  }

  /// True for tokens that may end a statement; a newline directly after one
  /// of these synthesizes a `;` (golang.org/ref/spec#Semicolons).
  fn ends_statement(self) -> bool {
    matches!(
      self,
      TokenKind::Ident
        | TokenKind::IntLit
        | TokenKind::StrLit
        | TokenKind::Return
        | TokenKind::RParen
        | TokenKind::RBracket
        | TokenKind::RBrace
        | TokenKind::Eof
    )
  }
}

/// Streaming tokenizer. Holds the byte cursor, the current token, and its
/// payload. `ch` is the current byte, or -1 once the input is exhausted.
pub struct Lexer<'a> {
  src: &'a [u8],
  pos: usize,
  ch: i32,
  pub line: u32,
  pub col: u32,
  pub token: TokenKind,
  pub token_int: i64,
  pub token_str: String,
}

fn is_digit(ch: i32) -> bool {
  ch >= i32::from(b'0') && ch <= i32::from(b'9')
}

fn is_alpha(ch: i32) -> bool {
  (ch >= i32::from(b'a') && ch <= i32::from(b'z'))
    || (ch >= i32::from(b'A') && ch <= i32::from(b'Z'))
}

/// Render a byte for diagnostics; the EOF sentinel has no character form.
fn char_name(ch: i32) -> String {
  if ch < 0 {
    "EOF".to_string()
  } else {
    char::from(ch as u8).to_string()
  }
}

impl<'a> Lexer<'a> {
  /// Prime the cursor on the first byte. The current token starts out as a
  /// `;` so a leading newline never triggers semicolon insertion.
  pub fn new(src: &'a [u8]) -> Self {
    let mut lexer = Self {
      src,
      pos: 0,
      ch: 0,
      line: 1,
      col: 0,
      token: TokenKind::Semicolon,
      token_int: 0,
      token_str: String::new(),
    };
    lexer.next_char();
    lexer
  }

  pub fn err(&self, message: impl Into<String>) -> CompileError {
    CompileError::at(self.line, self.col, message)
  }

  fn at(&self, b: u8) -> bool {
    self.ch == i32::from(b)
  }

  /// Read one byte, updating line and column.
  fn next_char(&mut self) {
    if self.at(b'\n') {
      self.line += 1;
      self.col = 0;
    }
    self.ch = match self.src.get(self.pos) {
      Some(&b) => i32::from(b),
      None => -1,
    };
    self.pos += 1;
    self.col += 1;
  }

  fn expect_char(&mut self, b: u8) -> CompileResult<()> {
    if !self.at(b) {
      return Err(self.err(format!(
        "expected '{}' not '{}'",
        char::from(b),
        char_name(self.ch)
      )));
    }
    self.next_char();
    Ok(())
  }

  /// Disambiguate a one- or two-character operator on the next byte.
  fn token_choice(&mut self, one_char: TokenKind, second: u8, two_char: TokenKind) {
    self.next_char();
    if self.at(second) {
      self.next_char();
      self.token = two_char;
    } else {
      self.token = one_char;
    }
  }

  /// Advance to the next meaningful token.
  pub fn next(&mut self) -> CompileResult<()> {
    // Skip whitespace and comments, and look for the / operator.
    while self.at(b'/') || self.at(b' ') || self.at(b'\t') || self.at(b'\r') || self.at(b'\n') {
      if self.at(b'/') {
        self.next_char();
        if !self.at(b'/') {
          self.token = TokenKind::Slash;
          return Ok(());
        }
        self.next_char();
        // Comment, skip till end of line.
        while self.ch >= 0 && !self.at(b'\n') {
          self.next_char();
        }
      } else if self.at(b'\n') {
        self.next_char();
        // Semicolon insertion: golang.org/ref/spec#Semicolons
        if self.token.ends_statement() {
          self.token = TokenKind::Semicolon;
          return Ok(());
        }
      } else {
        self.next_char();
      }
    }
    if self.ch < 0 {
      self.token = TokenKind::Eof;
      return Ok(());
    }

    // Integer literal.
    if is_digit(self.ch) {
      self.token_int = i64::from(self.ch - i32::from(b'0'));
      self.next_char();
      while is_digit(self.ch) {
        self.token_int = self
          .token_int
          .wrapping_mul(10)
          .wrapping_add(i64::from(self.ch - i32::from(b'0')));
        self.next_char();
      }
      self.token = TokenKind::IntLit;
      return Ok(());
    }

    // Character literal, which produces an integer token.
    if self.at(b'\'') {
      self.next_char();
      if self.at(b'\n') {
        return Err(self.err("newline not allowed in character literal"));
      }
      if self.at(b'\\') {
        self.next_char();
        if self.at(b'\'') {
          self.token_int = i64::from(b'\'');
        } else if self.at(b'\\') {
          self.token_int = i64::from(b'\\');
        } else if self.at(b't') {
          self.token_int = i64::from(b'\t');
        } else if self.at(b'r') {
          self.token_int = i64::from(b'\r');
        } else if self.at(b'n') {
          self.token_int = i64::from(b'\n');
        } else {
          return Err(self.err(format!("unexpected escape '\\{}'", char_name(self.ch))));
        }
        self.next_char();
      } else {
        self.token_int = i64::from(self.ch);
        self.next_char();
      }
      self.expect_char(b'\'')?;
      self.token = TokenKind::IntLit;
      return Ok(());
    }

    // String literal.
    if self.at(b'"') {
      self.next_char();
      self.token_str.clear();
      while self.ch >= 0 && !self.at(b'"') {
        if self.at(b'\n') {
          return Err(self.err("newline not allowed in string"));
        }
        let mut ch = self.ch;
        if self.at(b'\\') {
          self.next_char();
          if self.at(b'"') {
            ch = i32::from(b'"');
          } else if self.at(b'\\') {
            ch = i32::from(b'\\');
          } else if self.at(b't') {
            ch = i32::from(b'\t');
          } else if self.at(b'r') {
            ch = i32::from(b'\r');
          } else if self.at(b'n') {
            ch = i32::from(b'\n');
          } else {
            return Err(self.err(format!("unexpected escape \"\\{}\"", char_name(self.ch))));
          }
        }
        self.token_str.push(char::from(ch as u8));
        self.next_char();
      }
      self.expect_char(b'"')?;
      self.token = TokenKind::StrLit;
      return Ok(());
    }

    // Keyword or identifier.
    if is_alpha(self.ch) || self.at(b'_') {
      self.token_str.clear();
      while is_alpha(self.ch) || is_digit(self.ch) || self.at(b'_') {
        self.token_str.push(char::from(self.ch as u8));
        self.next_char();
      }
      self.token = match self.token_str.as_str() {
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "for" => TokenKind::For,
        "var" => TokenKind::Var,
        "const" => TokenKind::Const,
        "func" => TokenKind::Func,
        "return" => TokenKind::Return,
        "package" => TokenKind::Package,
        _ => TokenKind::Ident,
      };
      return Ok(());
    }

    // Single-character tokens.
    let single = match u8::try_from(self.ch).ok() {
      Some(b'+') => Some(TokenKind::Plus),
      Some(b'-') => Some(TokenKind::Minus),
      Some(b'*') => Some(TokenKind::Star),
      Some(b'%') => Some(TokenKind::Percent),
      Some(b';') => Some(TokenKind::Semicolon),
      Some(b',') => Some(TokenKind::Comma),
      Some(b'(') => Some(TokenKind::LParen),
      Some(b')') => Some(TokenKind::RParen),
      Some(b'{') => Some(TokenKind::LBrace),
      Some(b'}') => Some(TokenKind::RBrace),
      Some(b'[') => Some(TokenKind::LBracket),
      Some(b']') => Some(TokenKind::RBracket),
      _ => None,
    };
    if let Some(kind) = single {
      self.token = kind;
      self.next_char();
      return Ok(());
    }

    // One- or two-character tokens.
    if self.at(b'=') {
      self.token_choice(TokenKind::Assign, b'=', TokenKind::EqEq);
      return Ok(());
    } else if self.at(b'<') {
      self.token_choice(TokenKind::Less, b'=', TokenKind::LessEq);
      return Ok(());
    } else if self.at(b'>') {
      self.token_choice(TokenKind::Greater, b'=', TokenKind::GreaterEq);
      return Ok(());
    } else if self.at(b'!') {
      self.token_choice(TokenKind::Not, b'=', TokenKind::NotEq);
      return Ok(());
    } else if self.at(b':') {
      self.token_choice(TokenKind::Colon, b'=', TokenKind::DeclAssign);
      return Ok(());
    }

    // Two-character tokens with no one-character form.
    if self.at(b'|') {
      self.next_char();
      self.expect_char(b'|')?;
      self.token = TokenKind::OrOr;
      return Ok(());
    } else if self.at(b'&') {
      self.next_char();
      self.expect_char(b'&')?;
      self.token = TokenKind::AndAnd;
      return Ok(());
    }

    Err(self.err(format!("unexpected '{}'", char_name(self.ch))))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  /// Drain the lexer and return every token kind up to and including EOF.
  fn kinds(source: &str) -> Vec<TokenKind> {
    let mut lexer = Lexer::new(source.as_bytes());
    let mut out = Vec::new();
    loop {
      lexer.next().expect("lex error");
      out.push(lexer.token);
      if lexer.token == TokenKind::Eof {
        return out;
      }
    }
  }

  fn first_err(source: &str) -> String {
    let mut lexer = Lexer::new(source.as_bytes());
    loop {
      match lexer.next() {
        Err(err) => return err.to_string(),
        Ok(()) if lexer.token == TokenKind::Eof => panic!("expected a lex error"),
        Ok(()) => {}
      }
    }
  }

  #[test]
  fn keywords_and_identifiers() {
    assert_eq!(
      kinds("func forx _x9"),
      vec![
        TokenKind::Func,
        TokenKind::Ident,
        TokenKind::Ident,
        TokenKind::Eof
      ]
    );
  }

  #[test]
  fn two_char_operators() {
    assert_eq!(
      kinds(":= == != <= >= || &&"),
      vec![
        TokenKind::DeclAssign,
        TokenKind::EqEq,
        TokenKind::NotEq,
        TokenKind::LessEq,
        TokenKind::GreaterEq,
        TokenKind::OrOr,
        TokenKind::AndAnd,
        TokenKind::Eof
      ]
    );
  }

  #[test]
  fn slash_versus_comment() {
    assert_eq!(
      kinds("a / b // rest is ignored\nc"),
      vec![
        TokenKind::Ident,
        TokenKind::Slash,
        TokenKind::Ident,
        TokenKind::Semicolon,
        TokenKind::Ident,
        TokenKind::Eof
      ]
    );
  }

  #[test]
  fn semicolon_inserted_after_terminating_tokens() {
    // Each of ident, int, string, return, ), ], } gets a synthetic `;`.
    for src in ["x\n", "42\n", "\"s\"\n", "return\n", ")\n", "]\n", "}\n"] {
      let toks = kinds(src);
      assert_eq!(toks[1], TokenKind::Semicolon, "no ASI after {src:?}");
    }
  }

  #[test]
  fn semicolon_not_inserted_after_operators() {
    for src in ["+\n1", "=\n1", ",\nx", "{\nx", "(\nx"] {
      let toks = kinds(src);
      assert_ne!(toks[1], TokenKind::Semicolon, "spurious ASI after {src:?}");
    }
  }

  #[test]
  fn leading_blank_lines_do_not_insert_semicolons() {
    assert_eq!(
      kinds("\n\npackage"),
      vec![TokenKind::Package, TokenKind::Eof]
    );
  }

  #[test]
  fn integer_literal_value() {
    let mut lexer = Lexer::new(b"1234");
    lexer.next().unwrap();
    assert_eq!(lexer.token, TokenKind::IntLit);
    assert_eq!(lexer.token_int, 1234);
  }

  #[test]
  fn char_literal_escapes() {
    for (src, value) in [
      ("'a'", i64::from(b'a')),
      ("'\\n'", 10),
      ("'\\t'", 9),
      ("'\\r'", 13),
      ("'\\\\'", 92),
      ("'\\''", 39),
    ] {
      let mut lexer = Lexer::new(src.as_bytes());
      lexer.next().unwrap();
      assert_eq!(lexer.token, TokenKind::IntLit, "source {src:?}");
      assert_eq!(lexer.token_int, value, "source {src:?}");
    }
  }

  #[test]
  fn string_literal_escapes() {
    let mut lexer = Lexer::new(br#""a\tb\"c\\d\n""#);
    lexer.next().unwrap();
    assert_eq!(lexer.token, TokenKind::StrLit);
    assert_eq!(lexer.token_str, "a\tb\"c\\d\n");
  }

  #[test]
  fn newline_in_string_is_an_error() {
    assert!(first_err("\"abc\ndef\"").contains("newline not allowed in string"));
  }

  #[test]
  fn bad_escape_is_an_error() {
    assert!(first_err("\"\\q\"").contains("unexpected escape"));
    assert!(first_err("'\\q'").contains("unexpected escape"));
  }

  #[test]
  fn unterminated_string_is_an_error() {
    assert!(first_err("\"abc").contains("expected '\"'"));
  }

  #[test]
  fn unexpected_byte_reports_line_and_column() {
    let err = first_err("x\n  #");
    assert!(err.starts_with("2:"), "got {err}");
    assert!(err.contains("unexpected '#'"));
  }
}
