//! Lexical scanner for LaTeX-style mathematical notation.
//!
//! Scans left to right, resolving backslash commands through an explicit
//! `CommandRegistry` (greedy longest-match on the command word). Formatting
//! commands and whitespace are consumed without producing tokens.

use std::collections::HashMap;

use crate::TokenizeError;
use crate::utils::closest_match;

/// A positioned token. `pos` is the char offset into the source string.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
  pub kind: TokenKind,
  pub lexeme: String,
  pub pos: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
  Number(f64),
  Identifier(String),
  /// A named function resolved through the command registry (`\sin`, ...).
  Function(String),
  /// Content of a `\text{...}` fragment.
  Text(String),

  Plus,
  Minus,
  Star,
  Slash,
  Caret,
  Underscore,
  Bang,
  Pipe,
  LParen,
  RParen,
  LBrace,
  RBrace,
  LBracket,
  RBracket,
  Comma,
  Ampersand,
  /// Row separator `\\` inside environments.
  RowSep,

  Equal,
  NotEqual,
  Less,
  LessEqual,
  Greater,
  GreaterEqual,
  And,
  Or,
  /// `\to`, used in limit subscripts.
  Arrow,

  /// `\cdot` and `*`: multiplication (dot product on vectors).
  Cdot,
  /// `\times`: multiplication (cross product on vectors).
  Cross,
  /// `\div`: division.
  DivSign,

  Frac,
  Sqrt,
  Sum,
  Prod,
  Lim,
  Int,
  Binom,
  Partial,
  Begin,
  End,
}

/// What a backslash command resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
  /// A named function; the payload is the canonical function name.
  Function(&'static str),
  /// An identifier the command stands for (`\pi` -> "pi", `\alpha` -> "alpha").
  Symbol(&'static str),
  /// A fixed token (structural keywords and named operators).
  Token(TokenKind),
  /// Consumed without producing a token (`\left`, `\quad`, ...).
  Formatting,
}

const FUNCTION_COMMANDS: &[&str] = &[
  "sin", "cos", "tan", "cot", "sec", "csc", "arcsin", "arccos", "arctan",
  "arccot", "sinh", "cosh", "tanh", "coth", "arsinh", "arcosh", "artanh",
  "ln", "log", "lg", "exp", "min", "max", "gcd", "lcm", "mod", "det",
  "floor", "ceil", "round", "trunc", "sign", "abs", "re", "im", "conj",
  "arg",
];

const SYMBOL_COMMANDS: &[(&str, &str)] = &[
  ("pi", "pi"),
  ("tau", "tau"),
  ("phi", "phi"),
  ("infty", "infty"),
  ("alpha", "alpha"),
  ("beta", "beta"),
  ("gamma", "gamma"),
  ("delta", "delta"),
  ("epsilon", "epsilon"),
  ("varepsilon", "epsilon"),
  ("zeta", "zeta"),
  ("eta", "eta"),
  ("theta", "theta"),
  ("kappa", "kappa"),
  ("lambda", "lambda"),
  ("mu", "mu"),
  ("nu", "nu"),
  ("xi", "xi"),
  ("rho", "rho"),
  ("sigma", "sigma"),
  ("upsilon", "upsilon"),
  ("chi", "chi"),
  ("psi", "psi"),
  ("omega", "omega"),
];

const FORMATTING_COMMANDS: &[&str] = &[
  "left", "right", "quad", "qquad", "mathrm", "mathbf", "mathit",
  "displaystyle", "limits", "big", "Big", "bigg", "Bigg", "dots", "cdots",
];

/// Explicit command table passed into the tokenizer by reference.
///
/// An optional lookup hook is queried before the builtin table, so callers
/// can add or override command names without touching the registry contents.
pub struct CommandRegistry {
  commands: HashMap<&'static str, CommandKind>,
  hook: Option<Box<dyn Fn(&str) -> Option<CommandKind>>>,
}

impl Default for CommandRegistry {
  fn default() -> Self {
    Self::builtin()
  }
}

impl CommandRegistry {
  /// The builtin command table: functions, symbols, structural keywords,
  /// named operators, and ignorable formatting directives.
  pub fn builtin() -> Self {
    let mut commands: HashMap<&'static str, CommandKind> = HashMap::new();
    for &name in FUNCTION_COMMANDS {
      commands.insert(name, CommandKind::Function(name));
    }
    for &(name, symbol) in SYMBOL_COMMANDS {
      commands.insert(name, CommandKind::Symbol(symbol));
    }
    for &name in FORMATTING_COMMANDS {
      commands.insert(name, CommandKind::Formatting);
    }
    commands.insert("frac", CommandKind::Token(TokenKind::Frac));
    commands.insert("dfrac", CommandKind::Token(TokenKind::Frac));
    commands.insert("tfrac", CommandKind::Token(TokenKind::Frac));
    commands.insert("sqrt", CommandKind::Token(TokenKind::Sqrt));
    commands.insert("sum", CommandKind::Token(TokenKind::Sum));
    commands.insert("prod", CommandKind::Token(TokenKind::Prod));
    commands.insert("lim", CommandKind::Token(TokenKind::Lim));
    commands.insert("int", CommandKind::Token(TokenKind::Int));
    commands.insert("binom", CommandKind::Token(TokenKind::Binom));
    commands.insert("partial", CommandKind::Token(TokenKind::Partial));
    commands.insert("begin", CommandKind::Token(TokenKind::Begin));
    commands.insert("end", CommandKind::Token(TokenKind::End));
    commands.insert("to", CommandKind::Token(TokenKind::Arrow));
    commands.insert("rightarrow", CommandKind::Token(TokenKind::Arrow));
    commands.insert("cdot", CommandKind::Token(TokenKind::Cdot));
    commands.insert("times", CommandKind::Token(TokenKind::Cross));
    commands.insert("div", CommandKind::Token(TokenKind::DivSign));
    commands.insert("le", CommandKind::Token(TokenKind::LessEqual));
    commands.insert("leq", CommandKind::Token(TokenKind::LessEqual));
    commands.insert("ge", CommandKind::Token(TokenKind::GreaterEqual));
    commands.insert("geq", CommandKind::Token(TokenKind::GreaterEqual));
    commands.insert("ne", CommandKind::Token(TokenKind::NotEqual));
    commands.insert("neq", CommandKind::Token(TokenKind::NotEqual));
    commands.insert("land", CommandKind::Token(TokenKind::And));
    commands.insert("wedge", CommandKind::Token(TokenKind::And));
    commands.insert("lor", CommandKind::Token(TokenKind::Or));
    commands.insert("vee", CommandKind::Token(TokenKind::Or));
    Self {
      commands,
      hook: None,
    }
  }

  /// Install a lookup hook queried before the builtin table.
  /// Returning `None` from the hook falls through to the builtins.
  pub fn with_hook(
    mut self,
    hook: Box<dyn Fn(&str) -> Option<CommandKind>>,
  ) -> Self {
    self.hook = Some(hook);
    self
  }

  pub fn lookup(&self, name: &str) -> Option<CommandKind> {
    if let Some(hook) = &self.hook {
      if let Some(kind) = hook(name) {
        return Some(kind);
      }
    }
    self.commands.get(name).cloned()
  }

  fn command_names(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.commands.keys().copied()
  }
}

#[derive(Debug, Clone, Copy)]
pub struct TokenizerOptions {
  /// When set, bare alphabetic runs split into single-letter identifiers so
  /// that `xy` reads as `x*y` under the parser's adjacency rule.
  pub implicit_multiplication: bool,
}

impl Default for TokenizerOptions {
  fn default() -> Self {
    Self {
      implicit_multiplication: true,
    }
  }
}

/// Tokenize with the builtin registry and default options.
pub fn tokenize(source: &str) -> Result<Vec<Token>, TokenizeError> {
  tokenize_with(
    source,
    &CommandRegistry::builtin(),
    &TokenizerOptions::default(),
  )
}

/// Tokenize against an explicit registry and options.
pub fn tokenize_with(
  source: &str,
  registry: &CommandRegistry,
  options: &TokenizerOptions,
) -> Result<Vec<Token>, TokenizeError> {
  Scanner {
    chars: source.chars().collect(),
    pos: 0,
    source,
    registry,
    options: *options,
  }
  .run()
}

struct Scanner<'a> {
  chars: Vec<char>,
  pos: usize,
  source: &'a str,
  registry: &'a CommandRegistry,
  options: TokenizerOptions,
}

impl<'a> Scanner<'a> {
  fn run(mut self) -> Result<Vec<Token>, TokenizeError> {
    let mut tokens = Vec::new();
    while self.pos < self.chars.len() {
      let start = self.pos;
      let ch = self.chars[self.pos];

      if ch.is_whitespace() {
        self.pos += 1;
        continue;
      }

      if ch.is_ascii_digit() {
        tokens.push(self.scan_number(start)?);
        continue;
      }

      if ch.is_ascii_alphabetic() {
        self.scan_identifiers(start, &mut tokens);
        continue;
      }

      if ch == '\\' {
        self.scan_command(start, &mut tokens)?;
        continue;
      }

      if let Some(kind) = self.scan_punctuation(ch) {
        let end = self.pos;
        tokens.push(self.make_token(kind, start, end));
        continue;
      }

      return Err(self.error(
        format!("unrecognized character '{}'", ch),
        start,
        None,
      ));
    }
    Ok(tokens)
  }

  fn scan_number(&mut self, start: usize) -> Result<Token, TokenizeError> {
    while self.pos < self.chars.len() && self.chars[self.pos].is_ascii_digit()
    {
      self.pos += 1;
    }
    // Optional fractional part: a dot must be followed by at least one digit.
    if self.pos + 1 < self.chars.len()
      && self.chars[self.pos] == '.'
      && self.chars[self.pos + 1].is_ascii_digit()
    {
      self.pos += 1;
      while self.pos < self.chars.len()
        && self.chars[self.pos].is_ascii_digit()
      {
        self.pos += 1;
      }
    }
    let lexeme: String = self.chars[start..self.pos].iter().collect();
    let value = lexeme.parse::<f64>().map_err(|_| {
      self.error(format!("malformed number literal '{}'", lexeme), start, None)
    })?;
    Ok(Token {
      kind: TokenKind::Number(value),
      lexeme,
      pos: start,
    })
  }

  /// Scan a bare alphabetic run. Under implicit multiplication each letter
  /// is its own identifier; otherwise the whole run is one identifier.
  fn scan_identifiers(&mut self, start: usize, tokens: &mut Vec<Token>) {
    let mut end = self.pos;
    while end < self.chars.len() && self.chars[end].is_ascii_alphabetic() {
      end += 1;
    }
    if self.options.implicit_multiplication {
      for i in start..end {
        let name: String = self.chars[i..i + 1].iter().collect();
        tokens.push(Token {
          kind: TokenKind::Identifier(name.clone()),
          lexeme: name,
          pos: i,
        });
      }
    } else {
      let name: String = self.chars[start..end].iter().collect();
      tokens.push(Token {
        kind: TokenKind::Identifier(name.clone()),
        lexeme: name,
        pos: start,
      });
    }
    self.pos = end;
  }

  fn scan_command(
    &mut self,
    start: usize,
    tokens: &mut Vec<Token>,
  ) -> Result<(), TokenizeError> {
    self.pos += 1; // consume the backslash
    if self.pos >= self.chars.len() {
      return Err(self.error(
        "dangling '\\' at end of input".to_string(),
        start,
        None,
      ));
    }

    let ch = self.chars[self.pos];
    if !ch.is_ascii_alphabetic() {
      // Single-character commands: row separator and spacing.
      self.pos += 1;
      return match ch {
        '\\' => {
          tokens.push(self.make_token(TokenKind::RowSep, start, self.pos));
          Ok(())
        }
        ',' | ';' | ':' | '!' | ' ' => Ok(()), // spacing, no token
        _ => Err(self.error(
          format!("unknown command '\\{}'", ch),
          start,
          None,
        )),
      };
    }

    // Greedy longest-match: take the whole alphabetic run as the command
    // word and resolve it as a unit.
    let word_start = self.pos;
    while self.pos < self.chars.len()
      && self.chars[self.pos].is_ascii_alphabetic()
    {
      self.pos += 1;
    }
    let word: String = self.chars[word_start..self.pos].iter().collect();

    if word == "text" {
      return self.scan_text_fragment(start, tokens);
    }

    match self.registry.lookup(&word) {
      Some(CommandKind::Function(name)) => {
        tokens.push(self.make_token(
          TokenKind::Function(name.to_string()),
          start,
          self.pos,
        ));
        Ok(())
      }
      Some(CommandKind::Symbol(name)) => {
        tokens.push(self.make_token(
          TokenKind::Identifier(name.to_string()),
          start,
          self.pos,
        ));
        Ok(())
      }
      Some(CommandKind::Token(kind)) => {
        tokens.push(self.make_token(kind, start, self.pos));
        Ok(())
      }
      Some(CommandKind::Formatting) => Ok(()),
      None => {
        let suggestion = closest_match(&word, self.registry.command_names())
          .map(|best| format!("\\{}", best));
        Err(self.error(
          format!("unknown command '\\{}'", word),
          start,
          suggestion,
        ))
      }
    }
  }

  /// `\text{...}` carries its braced content as a single text token.
  fn scan_text_fragment(
    &mut self,
    start: usize,
    tokens: &mut Vec<Token>,
  ) -> Result<(), TokenizeError> {
    while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace()
    {
      self.pos += 1;
    }
    if self.pos >= self.chars.len() || self.chars[self.pos] != '{' {
      return Err(self.error(
        "expected '{' after \\text".to_string(),
        start,
        None,
      ));
    }
    self.pos += 1;
    let content_start = self.pos;
    while self.pos < self.chars.len() && self.chars[self.pos] != '}' {
      self.pos += 1;
    }
    if self.pos >= self.chars.len() {
      return Err(self.error(
        "unclosed '{' in \\text fragment".to_string(),
        start,
        Some("insert '}'".to_string()),
      ));
    }
    let content: String =
      self.chars[content_start..self.pos].iter().collect();
    self.pos += 1; // consume '}'
    tokens.push(self.make_token(
      TokenKind::Text(content.trim().to_string()),
      start,
      self.pos,
    ));
    Ok(())
  }

  fn scan_punctuation(&mut self, ch: char) -> Option<TokenKind> {
    // Two-character operators first.
    if self.pos + 1 < self.chars.len() {
      let next = self.chars[self.pos + 1];
      let two = match (ch, next) {
        ('<', '=') => Some(TokenKind::LessEqual),
        ('>', '=') => Some(TokenKind::GreaterEqual),
        ('!', '=') => Some(TokenKind::NotEqual),
        ('&', '&') => Some(TokenKind::And),
        ('|', '|') => Some(TokenKind::Or),
        _ => None,
      };
      if let Some(kind) = two {
        self.pos += 2;
        return Some(kind);
      }
    }
    let kind = match ch {
      '+' => TokenKind::Plus,
      '-' | '\u{2212}' => TokenKind::Minus,
      '*' => TokenKind::Cdot,
      '\u{00b7}' => TokenKind::Cdot,
      '\u{00d7}' => TokenKind::Cross,
      '/' => TokenKind::Slash,
      '^' => TokenKind::Caret,
      '_' => TokenKind::Underscore,
      '!' => TokenKind::Bang,
      '|' => TokenKind::Pipe,
      '(' => TokenKind::LParen,
      ')' => TokenKind::RParen,
      '{' => TokenKind::LBrace,
      '}' => TokenKind::RBrace,
      '[' => TokenKind::LBracket,
      ']' => TokenKind::RBracket,
      ',' => TokenKind::Comma,
      '&' => TokenKind::Ampersand,
      '=' => TokenKind::Equal,
      '<' => TokenKind::Less,
      '>' => TokenKind::Greater,
      '\u{2264}' => TokenKind::LessEqual,
      '\u{2265}' => TokenKind::GreaterEqual,
      '\u{2260}' => TokenKind::NotEqual,
      '\u{03c0}' => TokenKind::Identifier("pi".to_string()),
      '\u{221e}' => TokenKind::Identifier("infty".to_string()),
      _ => return None,
    };
    self.pos += 1;
    Some(kind)
  }

  fn make_token(&self, kind: TokenKind, start: usize, end: usize) -> Token {
    Token {
      lexeme: self.chars[start..end].iter().collect(),
      kind,
      pos: start,
    }
  }

  fn error(
    &self,
    message: String,
    position: usize,
    suggestion: Option<String>,
  ) -> TokenizeError {
    TokenizeError {
      message,
      position,
      source: self.source.to_string(),
      suggestion,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source)
      .unwrap()
      .into_iter()
      .map(|t| t.kind)
      .collect()
  }

  #[test]
  fn splits_adjacent_letters_for_implicit_multiplication() {
    assert_eq!(
      kinds("xy"),
      vec![
        TokenKind::Identifier("x".to_string()),
        TokenKind::Identifier("y".to_string()),
      ]
    );
  }

  #[test]
  fn keeps_whole_identifier_without_implicit_multiplication() {
    let options = TokenizerOptions {
      implicit_multiplication: false,
    };
    let tokens =
      tokenize_with("speed", &CommandRegistry::builtin(), &options).unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, TokenKind::Identifier("speed".to_string()));
  }

  #[test]
  fn greedy_command_match_prefers_longest_name() {
    // `\arcsin` must not lex as `\arc` + `sin`.
    assert_eq!(
      kinds("\\arcsin"),
      vec![TokenKind::Function("arcsin".to_string())]
    );
  }

  #[test]
  fn formatting_commands_produce_no_tokens() {
    assert_eq!(
      kinds("\\left( x \\right)"),
      vec![
        TokenKind::LParen,
        TokenKind::Identifier("x".to_string()),
        TokenKind::RParen,
      ]
    );
  }

  #[test]
  fn unknown_command_suggests_closest_name() {
    let err = tokenize("\\lnn(x)").unwrap_err();
    assert_eq!(err.position, 0);
    assert_eq!(err.suggestion.as_deref(), Some("\\ln"));
  }

  #[test]
  fn unrecognized_character_reports_position() {
    let err = tokenize("1 + #").unwrap_err();
    assert_eq!(err.position, 4);
  }

  #[test]
  fn hook_is_queried_before_builtin_table() {
    let registry = CommandRegistry::builtin().with_hook(Box::new(|name| {
      if name == "sin" {
        Some(CommandKind::Symbol("sin_override"))
      } else {
        None
      }
    }));
    let tokens = tokenize_with(
      "\\sin",
      &registry,
      &TokenizerOptions::default(),
    )
    .unwrap();
    assert_eq!(
      tokens[0].kind,
      TokenKind::Identifier("sin_override".to_string())
    );
  }
}
