//! Recursive-descent parser with operator-precedence climbing.
//!
//! Every descent into a sub-rule threads an explicit depth counter against
//! `ParserOptions::max_recursion_depth`, so deeply nested input fails with a
//! `ParseError` instead of exhausting the stack.

use crate::syntax::{
  BinaryOperator, Expr, PiecewiseCase, RelationOp, UnaryOperator,
};
use crate::tokenizer::{
  tokenize_with, CommandRegistry, Token, TokenKind, TokenizerOptions,
};
use crate::{Error, ParseError};

#[derive(Debug, Clone, Copy)]
pub struct ParserOptions {
  /// Treat two adjacent atoms with no operator between them as a product.
  pub implicit_multiplication: bool,
  /// Ceiling for the explicit depth counter threaded through descent.
  pub max_recursion_depth: usize,
}

impl Default for ParserOptions {
  fn default() -> Self {
    Self {
      implicit_multiplication: true,
      max_recursion_depth: 500,
    }
  }
}

/// Parse a source string with the builtin registry and default options.
pub fn parse(source: &str) -> Result<Expr, Error> {
  parse_with(
    source,
    &CommandRegistry::builtin(),
    &ParserOptions::default(),
  )
}

/// Parse against an explicit command registry and options.
pub fn parse_with(
  source: &str,
  registry: &CommandRegistry,
  options: &ParserOptions,
) -> Result<Expr, Error> {
  let tokenizer_options = TokenizerOptions {
    implicit_multiplication: options.implicit_multiplication,
  };
  let tokens = tokenize_with(source, registry, &tokenizer_options)?;
  let mut parser = Parser::new(tokens, source, *options);
  Ok(parser.parse_toplevel()?)
}

/// Recovery mode: keep going past errors and report everything found.
/// Returns the parsed expression when the first attempt succeeds, `None`
/// otherwise, together with every diagnostic collected along the way.
pub fn parse_with_diagnostics(
  source: &str,
  registry: &CommandRegistry,
  options: &ParserOptions,
) -> (Option<Expr>, Vec<ParseError>) {
  let tokenizer_options = TokenizerOptions {
    implicit_multiplication: options.implicit_multiplication,
  };
  let tokens = match tokenize_with(source, registry, &tokenizer_options) {
    Ok(tokens) => tokens,
    Err(e) => {
      return (
        None,
        vec![ParseError {
          message: e.message,
          position: e.position,
          source: e.source,
          suggestion: e.suggestion,
        }],
      );
    }
  };

  let mut parser = Parser::new(tokens, source, *options);
  match parser.parse_toplevel() {
    Ok(expr) => (Some(expr), Vec::new()),
    Err(first) => {
      let mut diagnostics = vec![first];
      // Skip a token and retry so one pass can surface several problems.
      while diagnostics.len() < 10 && !parser.at_end() {
        let before = parser.pos;
        match parser.parse_or(0) {
          Ok(_) => {
            if parser.at_end() {
              break;
            }
            let message = format!(
              "unexpected token '{}'",
              parser.tokens[parser.pos].lexeme
            );
            diagnostics.push(parser.error_at(parser.pos, message, None));
            parser.pos += 1;
          }
          Err(e) => {
            diagnostics.push(e);
            if parser.pos == before {
              parser.pos += 1;
            }
          }
        }
      }
      (None, diagnostics)
    }
  }
}

struct Parser<'s> {
  tokens: Vec<Token>,
  pos: usize,
  source: &'s str,
  options: ParserOptions,
  /// Number of integrals currently being parsed; the `d<var>` marker only
  /// terminates a factor chain while this is non-zero.
  integral_depth: usize,
}

impl<'s> Parser<'s> {
  fn new(tokens: Vec<Token>, source: &'s str, options: ParserOptions) -> Self {
    Self {
      tokens,
      pos: 0,
      source,
      options,
      integral_depth: 0,
    }
  }

  fn parse_toplevel(&mut self) -> Result<Expr, ParseError> {
    let expr = self.parse_or(0)?;
    // `expr, guard` is sugar for a single guarded case.
    let expr = if self.eat(&TokenKind::Comma) {
      let condition = self.parse_or(0)?;
      Expr::Conditional {
        value: Box::new(expr),
        condition: Box::new(condition),
      }
    } else {
      expr
    };
    if !self.at_end() {
      let message =
        format!("unexpected token '{}'", self.tokens[self.pos].lexeme);
      return Err(self.error_at(self.pos, message, None));
    }
    Ok(expr)
  }

  // ─── Token plumbing ───────────────────────────────────────────────────

  fn at_end(&self) -> bool {
    self.pos >= self.tokens.len()
  }

  fn peek(&self) -> Option<&TokenKind> {
    self.tokens.get(self.pos).map(|t| &t.kind)
  }

  fn peek_at(&self, offset: usize) -> Option<&TokenKind> {
    self.tokens.get(self.pos + offset).map(|t| &t.kind)
  }

  fn eat(&mut self, kind: &TokenKind) -> bool {
    if self.peek() == Some(kind) {
      self.pos += 1;
      true
    } else {
      false
    }
  }

  fn expect(
    &mut self,
    kind: &TokenKind,
    what: &str,
    suggestion: Option<&str>,
  ) -> Result<(), ParseError> {
    if self.eat(kind) {
      Ok(())
    } else {
      Err(self.error_here(
        format!("expected {}", what),
        suggestion.map(|s| s.to_string()),
      ))
    }
  }

  fn error_here(
    &self,
    message: String,
    suggestion: Option<String>,
  ) -> ParseError {
    self.error_at(self.pos, message, suggestion)
  }

  fn error_at(
    &self,
    token_index: usize,
    message: String,
    suggestion: Option<String>,
  ) -> ParseError {
    let position = self
      .tokens
      .get(token_index)
      .map(|t| t.pos)
      .unwrap_or_else(|| self.source.chars().count());
    ParseError {
      message,
      position,
      source: self.source.to_string(),
      suggestion,
    }
  }

  fn check_depth(&self, depth: usize) -> Result<(), ParseError> {
    if depth > self.options.max_recursion_depth {
      Err(self.error_here(
        format!(
          "expression nests deeper than the recursion limit of {}",
          self.options.max_recursion_depth
        ),
        None,
      ))
    } else {
      Ok(())
    }
  }

  // ─── Precedence climbing ──────────────────────────────────────────────

  fn parse_or(&mut self, depth: usize) -> Result<Expr, ParseError> {
    self.check_depth(depth)?;
    let mut left = self.parse_and(depth + 1)?;
    while self.eat(&TokenKind::Or) {
      let right = self.parse_and(depth + 1)?;
      left = Expr::binary(BinaryOperator::Or, left, right);
    }
    Ok(left)
  }

  fn parse_and(&mut self, depth: usize) -> Result<Expr, ParseError> {
    self.check_depth(depth)?;
    let mut left = self.parse_comparison(depth + 1)?;
    while self.eat(&TokenKind::And) {
      let right = self.parse_comparison(depth + 1)?;
      left = Expr::binary(BinaryOperator::And, left, right);
    }
    Ok(left)
  }

  fn relation_op(&self) -> Option<RelationOp> {
    match self.peek() {
      Some(TokenKind::Equal) => Some(RelationOp::Eq),
      Some(TokenKind::NotEqual) => Some(RelationOp::Ne),
      Some(TokenKind::Less) => Some(RelationOp::Lt),
      Some(TokenKind::LessEqual) => Some(RelationOp::Le),
      Some(TokenKind::Greater) => Some(RelationOp::Gt),
      Some(TokenKind::GreaterEqual) => Some(RelationOp::Ge),
      _ => None,
    }
  }

  /// One relation builds a `Comparison`; two or more fold into a
  /// `ChainedComparison` (`-5 < x < 5`).
  fn parse_comparison(&mut self, depth: usize) -> Result<Expr, ParseError> {
    self.check_depth(depth)?;
    let first = self.parse_additive(depth + 1)?;
    let mut terms = vec![first];
    let mut ops = Vec::new();
    while let Some(op) = self.relation_op() {
      self.pos += 1;
      ops.push(op);
      terms.push(self.parse_additive(depth + 1)?);
    }
    Ok(match ops.len() {
      0 => terms.pop().unwrap_or(Expr::num(f64::NAN)),
      1 => {
        let right = terms.pop().unwrap_or(Expr::num(f64::NAN));
        let left = terms.pop().unwrap_or(Expr::num(f64::NAN));
        Expr::Comparison {
          op: ops[0],
          left: Box::new(left),
          right: Box::new(right),
        }
      }
      _ => Expr::ChainedComparison { terms, ops },
    })
  }

  fn parse_additive(&mut self, depth: usize) -> Result<Expr, ParseError> {
    self.check_depth(depth)?;
    let mut left = self.parse_multiplicative(depth + 1)?;
    loop {
      if self.eat(&TokenKind::Plus) {
        let right = self.parse_multiplicative(depth + 1)?;
        left = Expr::add(left, right);
      } else if self.eat(&TokenKind::Minus) {
        let right = self.parse_multiplicative(depth + 1)?;
        left = Expr::sub(left, right);
      } else {
        break;
      }
    }
    Ok(left)
  }

  /// True when the upcoming token may begin a factor, which under implicit
  /// multiplication means "multiply with the factor just parsed".
  fn starts_factor(&self) -> bool {
    matches!(
      self.peek(),
      Some(
        TokenKind::Number(_)
          | TokenKind::Identifier(_)
          | TokenKind::Function(_)
          | TokenKind::LParen
          | TokenKind::LBrace
          | TokenKind::Frac
          | TokenKind::Sqrt
          | TokenKind::Binom
          | TokenKind::Sum
          | TokenKind::Prod
          | TokenKind::Lim
          | TokenKind::Int
          | TokenKind::Begin
      )
    )
  }

  /// Inside an integral, a bare `d` directly followed by an identifier is
  /// the differential marker and ends the integrand.
  fn at_differential_marker(&self) -> bool {
    if self.integral_depth == 0 {
      return false;
    }
    match self.peek() {
      Some(TokenKind::Identifier(d)) if d == "d" => matches!(
        self.peek_at(1),
        Some(TokenKind::Identifier(_))
      ),
      // Without implicit multiplication `dx` stays one identifier.
      Some(TokenKind::Identifier(name)) => {
        !self.options.implicit_multiplication
          && name.len() > 1
          && name.starts_with('d')
      }
      _ => false,
    }
  }

  fn parse_multiplicative(&mut self, depth: usize) -> Result<Expr, ParseError> {
    self.check_depth(depth)?;
    let mut left = self.parse_unary(depth + 1)?;
    loop {
      if self.eat(&TokenKind::Cdot) {
        let right = self.parse_unary(depth + 1)?;
        left = Expr::binary(BinaryOperator::Mul, left, right);
      } else if self.eat(&TokenKind::Cross) {
        let right = self.parse_unary(depth + 1)?;
        left = Expr::binary(BinaryOperator::CrossMul, left, right);
      } else if self.eat(&TokenKind::Slash) || self.eat(&TokenKind::DivSign) {
        let right = self.parse_unary(depth + 1)?;
        left = Expr::binary(BinaryOperator::Div, left, right);
      } else if self.options.implicit_multiplication
        && self.starts_factor()
        && !self.at_differential_marker()
      {
        let right = self.parse_unary(depth + 1)?;
        left = Expr::binary(BinaryOperator::Mul, left, right);
      } else {
        break;
      }
    }
    Ok(left)
  }

  fn parse_unary(&mut self, depth: usize) -> Result<Expr, ParseError> {
    self.check_depth(depth)?;
    if self.eat(&TokenKind::Minus) {
      let operand = self.parse_unary(depth + 1)?;
      return Ok(Expr::neg(operand));
    }
    if self.eat(&TokenKind::Plus) {
      return self.parse_unary(depth + 1);
    }
    self.parse_power(depth + 1)
  }

  fn parse_power(&mut self, depth: usize) -> Result<Expr, ParseError> {
    self.check_depth(depth)?;
    let base = self.parse_postfix(depth + 1)?;
    if self.eat(&TokenKind::Caret) {
      // Exponentiation is right-associative: descending through the unary
      // level re-enters this rule for `a^b^c`.
      let exponent = if self.eat(&TokenKind::LBrace) {
        let inner = self.parse_or(depth + 1)?;
        self.expect(&TokenKind::RBrace, "'}' to close the exponent", None)?;
        inner
      } else {
        self.parse_unary(depth + 1)?
      };
      return Ok(Expr::pow(base, exponent));
    }
    Ok(base)
  }

  fn parse_postfix(&mut self, depth: usize) -> Result<Expr, ParseError> {
    self.check_depth(depth)?;
    let mut expr = self.parse_primary(depth + 1)?;
    loop {
      if self.eat(&TokenKind::Bang) {
        expr = Expr::Unary {
          op: UnaryOperator::Factorial,
          operand: Box::new(expr),
        };
      } else if self.peek() == Some(&TokenKind::Underscore) {
        // Subscripted variable names: `x_1`, `x_{max}`.
        let name = match &expr {
          Expr::Variable(name) => name.clone(),
          _ => {
            return Err(self.error_here(
              "a subscript is only allowed on a variable or function name"
                .to_string(),
              None,
            ));
          }
        };
        self.pos += 1;
        let sub = self.parse_script(depth + 1)?;
        let sub_text = match &sub {
          Expr::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
          Expr::Variable(v) => v.clone(),
          _ => {
            return Err(self.error_here(
              "variable subscripts must be a number or a name".to_string(),
              None,
            ));
          }
        };
        expr = Expr::Variable(format!("{}_{}", name, sub_text));
      } else {
        break;
      }
    }
    Ok(expr)
  }

  /// A script operand: either a braced group or a single tight atom, as in
  /// `\sum_{i = 1}^n` where `n` needs no braces.
  fn parse_script(&mut self, depth: usize) -> Result<Expr, ParseError> {
    self.check_depth(depth)?;
    if self.eat(&TokenKind::LBrace) {
      let inner = self.parse_or(depth + 1)?;
      self.expect(&TokenKind::RBrace, "'}' to close the group", None)?;
      return Ok(inner);
    }
    if self.eat(&TokenKind::Minus) {
      let operand = self.parse_script(depth + 1)?;
      return Ok(Expr::neg(operand));
    }
    match self.peek().cloned() {
      Some(TokenKind::Number(n)) => {
        self.pos += 1;
        Ok(Expr::Number(n))
      }
      Some(TokenKind::Identifier(name)) => {
        self.pos += 1;
        Ok(Expr::Variable(name))
      }
      _ => Err(self.error_here(
        "expected a number, a name, or a braced group".to_string(),
        None,
      )),
    }
  }

  // ─── Primary expressions ──────────────────────────────────────────────

  fn parse_primary(&mut self, depth: usize) -> Result<Expr, ParseError> {
    self.check_depth(depth)?;
    let kind = match self.peek().cloned() {
      Some(kind) => kind,
      None => {
        return Err(
          self.error_here("unexpected end of input".to_string(), None),
        );
      }
    };
    match kind {
      TokenKind::Number(n) => {
        self.pos += 1;
        Ok(Expr::Number(n))
      }
      TokenKind::Identifier(name) => {
        self.pos += 1;
        Ok(Expr::Variable(name))
      }
      TokenKind::LParen => {
        self.pos += 1;
        let inner = self.parse_or(depth + 1)?;
        self.expect(
          &TokenKind::RParen,
          "')' to close the group",
          Some("insert ')'"),
        )?;
        Ok(inner)
      }
      TokenKind::LBrace => {
        self.pos += 1;
        let inner = self.parse_or(depth + 1)?;
        self.expect(
          &TokenKind::RBrace,
          "'}' to close the group",
          Some("insert '}'"),
        )?;
        Ok(inner)
      }
      TokenKind::Pipe => {
        self.pos += 1;
        let inner = self.parse_additive(depth + 1)?;
        self.expect(
          &TokenKind::Pipe,
          "'|' to close the absolute value",
          Some("insert '|'"),
        )?;
        Ok(Expr::Abs(Box::new(inner)))
      }
      TokenKind::Function(name) => {
        self.pos += 1;
        self.parse_function(depth + 1, name)
      }
      TokenKind::Frac => {
        self.pos += 1;
        self.parse_frac(depth + 1)
      }
      TokenKind::Sqrt => {
        self.pos += 1;
        self.parse_sqrt(depth + 1)
      }
      TokenKind::Binom => {
        self.pos += 1;
        let top = self.parse_brace_group(depth + 1)?;
        let bottom = self.parse_brace_group(depth + 1)?;
        Ok(Expr::Binom {
          top: Box::new(top),
          bottom: Box::new(bottom),
        })
      }
      TokenKind::Sum => {
        self.pos += 1;
        self.parse_big_operator(depth + 1, true)
      }
      TokenKind::Prod => {
        self.pos += 1;
        self.parse_big_operator(depth + 1, false)
      }
      TokenKind::Lim => {
        self.pos += 1;
        self.parse_limit(depth + 1)
      }
      TokenKind::Int => {
        self.pos += 1;
        self.parse_integral(depth + 1)
      }
      TokenKind::Begin => {
        self.pos += 1;
        self.parse_environment(depth + 1)
      }
      TokenKind::Text(text) => Err(self.error_here(
        format!("unexpected text fragment '{}'", text),
        None,
      )),
      other => Err(self.error_here(
        format!("unexpected token '{:?}'", other),
        None,
      )),
    }
  }

  fn parse_brace_group(&mut self, depth: usize) -> Result<Expr, ParseError> {
    self.check_depth(depth)?;
    self.expect(&TokenKind::LBrace, "'{' to open a group", None)?;
    let inner = self.parse_or(depth + 1)?;
    self.expect(
      &TokenKind::RBrace,
      "'}' to close the group",
      Some("insert '}'"),
    )?;
    Ok(inner)
  }

  /// Inverse selected by a literal `^{-1}` on a function that has one.
  fn inverse_function(name: &str) -> Option<&'static str> {
    Some(match name {
      "sin" => "arcsin",
      "cos" => "arccos",
      "tan" => "arctan",
      "cot" => "arccot",
      "sinh" => "arsinh",
      "cosh" => "arcosh",
      "tanh" => "artanh",
      _ => return None,
    })
  }

  fn parse_function(
    &mut self,
    depth: usize,
    name: String,
  ) -> Result<Expr, ParseError> {
    self.check_depth(depth)?;
    let subscript = if self.eat(&TokenKind::Underscore) {
      Some(Box::new(self.parse_script(depth + 1)?))
    } else {
      None
    };
    // Function exponent: `\sin^2 x` squares the call, `\sin^{-1}` picks
    // the inverse when one is tabulated.
    let exponent = if self.eat(&TokenKind::Caret) {
      Some(self.parse_script(depth + 1)?)
    } else {
      None
    };

    let args = if self.eat(&TokenKind::LParen) {
      let mut args = vec![self.parse_or(depth + 1)?];
      while self.eat(&TokenKind::Comma) {
        args.push(self.parse_or(depth + 1)?);
      }
      self.expect(
        &TokenKind::RParen,
        "')' to close the argument list",
        Some("insert ')'"),
      )?;
      args
    } else {
      // Tight application: `\sin x`, `\cos 2\theta`.
      vec![self.parse_unary(depth + 1)?]
    };

    let call = Expr::Call {
      name: name.clone(),
      args,
      subscript,
    };
    match exponent {
      None => Ok(call),
      Some(exp) => {
        if exp.as_number() == Some(-1.0) {
          if let Some(inverse) = Self::inverse_function(&name) {
            if let Expr::Call {
              args, subscript, ..
            } = call
            {
              return Ok(Expr::Call {
                name: inverse.to_string(),
                args,
                subscript,
              });
            }
          }
        }
        Ok(Expr::pow(call, exp))
      }
    }
  }

  /// `\frac{..}{..}` is division, unless the numerator is a derivative head
  /// (`\frac{d}{dx}`, `\frac{d^2}{dx^2}`, `\frac{\partial}{\partial x}`),
  /// in which case it differentiates the factor that follows.
  fn parse_frac(&mut self, depth: usize) -> Result<Expr, ParseError> {
    self.check_depth(depth)?;
    if let Some((var, order, partial)) = self.try_derivative_head() {
      let body = self.parse_unary(depth + 1)?;
      return Ok(Expr::Derivative {
        body: Box::new(body),
        var,
        order,
        partial,
      });
    }
    let numerator = self.parse_brace_group(depth + 1)?;
    let denominator = self.parse_brace_group(depth + 1)?;
    Ok(Expr::div(numerator, denominator))
  }

  /// Token-level match of a derivative head; resets the cursor and returns
  /// `None` when the braces hold an ordinary fraction.
  fn try_derivative_head(&mut self) -> Option<(String, u32, bool)> {
    let start = self.pos;
    let result = self.match_derivative_head();
    if result.is_none() {
      self.pos = start;
    }
    result
  }

  fn match_derivative_head(&mut self) -> Option<(String, u32, bool)> {
    if !self.eat(&TokenKind::LBrace) {
      return None;
    }
    let partial = match self.peek() {
      Some(TokenKind::Partial) => {
        self.pos += 1;
        true
      }
      Some(TokenKind::Identifier(d)) if d == "d" => {
        self.pos += 1;
        false
      }
      _ => return None,
    };
    let order = match self.match_number_script() {
      Some(n) => n,
      None => 1,
    };
    if !self.eat(&TokenKind::RBrace) {
      return None;
    }
    if !self.eat(&TokenKind::LBrace) {
      return None;
    }
    let var = match self.peek().cloned() {
      Some(TokenKind::Partial) if partial => {
        self.pos += 1;
        match self.peek().cloned() {
          Some(TokenKind::Identifier(v)) => {
            self.pos += 1;
            v
          }
          _ => return None,
        }
      }
      Some(TokenKind::Identifier(d)) if !partial && d == "d" => {
        self.pos += 1;
        match self.peek().cloned() {
          Some(TokenKind::Identifier(v)) => {
            self.pos += 1;
            v
          }
          _ => return None,
        }
      }
      // Without implicit multiplication `dx` arrives as one identifier.
      Some(TokenKind::Identifier(dv))
        if !partial && dv.len() > 1 && dv.starts_with('d') =>
      {
        self.pos += 1;
        dv[1..].to_string()
      }
      _ => return None,
    };
    let denom_order = match self.match_number_script() {
      Some(n) => n,
      None => 1,
    };
    if denom_order != order {
      return None;
    }
    if !self.eat(&TokenKind::RBrace) {
      return None;
    }
    Some((var, order, partial))
  }

  /// Match `^n` or `^{n}` where n is a positive integer literal.
  fn match_number_script(&mut self) -> Option<u32> {
    if self.peek() != Some(&TokenKind::Caret) {
      return None;
    }
    let start = self.pos;
    self.pos += 1;
    let braced = self.eat(&TokenKind::LBrace);
    let value = match self.peek() {
      Some(TokenKind::Number(n)) if n.fract() == 0.0 && *n >= 1.0 => {
        let v = *n as u32;
        self.pos += 1;
        Some(v)
      }
      _ => None,
    };
    if value.is_some() && braced && !self.eat(&TokenKind::RBrace) {
      self.pos = start;
      return None;
    }
    if value.is_none() {
      self.pos = start;
    }
    value
  }

  fn parse_sqrt(&mut self, depth: usize) -> Result<Expr, ParseError> {
    self.check_depth(depth)?;
    // Optional root index: `\sqrt[3]{x}`.
    let index = if self.eat(&TokenKind::LBracket) {
      let idx = self.parse_or(depth + 1)?;
      self.expect(
        &TokenKind::RBracket,
        "']' to close the root index",
        Some("insert ']'"),
      )?;
      Some(Box::new(idx))
    } else {
      None
    };
    let radicand = if self.peek() == Some(&TokenKind::LBrace) {
      self.parse_brace_group(depth + 1)?
    } else if self.eat(&TokenKind::LParen) {
      let inner = self.parse_or(depth + 1)?;
      self.expect(
        &TokenKind::RParen,
        "')' to close the radicand",
        Some("insert ')'"),
      )?;
      inner
    } else {
      self.parse_script(depth + 1)?
    };
    Ok(Expr::Call {
      name: "sqrt".to_string(),
      args: vec![radicand],
      subscript: index,
    })
  }

  /// `\sum_{i = a}^{b} body` / `\prod_{i = a}^{b} body`. The body binds at
  /// multiplicative tightness: `\sum_{i=1}^{n} i^2 + 3` is `(Σ i^2) + 3`.
  fn parse_big_operator(
    &mut self,
    depth: usize,
    is_sum: bool,
  ) -> Result<Expr, ParseError> {
    self.check_depth(depth)?;
    self.expect(
      &TokenKind::Underscore,
      "'_' with the iteration bounds",
      None,
    )?;
    self.expect(&TokenKind::LBrace, "'{' to open the lower bound", None)?;
    let var = match self.peek().cloned() {
      Some(TokenKind::Identifier(name)) => {
        self.pos += 1;
        name
      }
      _ => {
        return Err(self.error_here(
          "expected an iteration variable name".to_string(),
          None,
        ));
      }
    };
    self.expect(&TokenKind::Equal, "'=' after the iteration variable", None)?;
    let from = self.parse_or(depth + 1)?;
    self.expect(&TokenKind::RBrace, "'}' to close the lower bound", None)?;
    self.expect(&TokenKind::Caret, "'^' with the upper bound", None)?;
    let to = self.parse_script(depth + 1)?;
    let body = self.parse_multiplicative(depth + 1)?;
    Ok(if is_sum {
      Expr::Sum {
        var,
        from: Box::new(from),
        to: Box::new(to),
        body: Box::new(body),
      }
    } else {
      Expr::Product {
        var,
        from: Box::new(from),
        to: Box::new(to),
        body: Box::new(body),
      }
    })
  }

  fn parse_limit(&mut self, depth: usize) -> Result<Expr, ParseError> {
    self.check_depth(depth)?;
    self.expect(&TokenKind::Underscore, "'_' with the limit target", None)?;
    self.expect(&TokenKind::LBrace, "'{' to open the limit target", None)?;
    let var = match self.peek().cloned() {
      Some(TokenKind::Identifier(name)) => {
        self.pos += 1;
        name
      }
      _ => {
        return Err(
          self.error_here("expected a limit variable name".to_string(), None),
        );
      }
    };
    self.expect(&TokenKind::Arrow, "'\\to' after the limit variable", None)?;
    let target = self.parse_or(depth + 1)?;
    self.expect(&TokenKind::RBrace, "'}' to close the limit target", None)?;
    let body = self.parse_multiplicative(depth + 1)?;
    Ok(Expr::Limit {
      var,
      target: Box::new(target),
      body: Box::new(body),
    })
  }

  /// `\int_a^b body d<var>` or the indefinite `\int body d<var>`. The
  /// integrand scans additively until the differential marker.
  fn parse_integral(&mut self, depth: usize) -> Result<Expr, ParseError> {
    self.check_depth(depth)?;
    let lower = if self.eat(&TokenKind::Underscore) {
      Some(self.parse_script(depth + 1)?)
    } else {
      None
    };
    let upper = if self.eat(&TokenKind::Caret) {
      Some(self.parse_script(depth + 1)?)
    } else {
      None
    };
    if lower.is_some() != upper.is_some() {
      return Err(self.error_here(
        "an integral needs both bounds or neither".to_string(),
        None,
      ));
    }

    self.integral_depth += 1;
    let body = self.parse_additive(depth + 1);
    self.integral_depth -= 1;
    let body = body?;

    let var = match self.peek().cloned() {
      Some(TokenKind::Identifier(d)) if d == "d" => {
        self.pos += 1;
        match self.peek().cloned() {
          Some(TokenKind::Identifier(v)) => {
            self.pos += 1;
            v
          }
          _ => {
            return Err(self.error_here(
              "expected a variable after the differential 'd'".to_string(),
              None,
            ));
          }
        }
      }
      Some(TokenKind::Identifier(dv))
        if !self.options.implicit_multiplication
          && dv.len() > 1
          && dv.starts_with('d') =>
      {
        self.pos += 1;
        dv[1..].to_string()
      }
      _ => {
        return Err(self.error_here(
          "expected a differential marker like 'dx' to end the integral"
            .to_string(),
          None,
        ));
      }
    };

    Ok(Expr::Integral {
      var,
      lower: lower.map(Box::new),
      upper: upper.map(Box::new),
      body: Box::new(body),
    })
  }

  /// Environment names arrive letter-by-letter under implicit
  /// multiplication, so collect identifiers up to the closing brace.
  fn parse_environment_name(&mut self) -> Result<String, ParseError> {
    self.expect(
      &TokenKind::LBrace,
      "'{' with the environment name",
      None,
    )?;
    let mut name = String::new();
    loop {
      match self.peek().cloned() {
        Some(TokenKind::Identifier(part)) => {
          self.pos += 1;
          name.push_str(&part);
        }
        Some(TokenKind::RBrace) => {
          self.pos += 1;
          break;
        }
        _ => {
          return Err(self.error_here(
            "expected an environment name".to_string(),
            None,
          ));
        }
      }
    }
    if name.is_empty() {
      return Err(
        self.error_here("empty environment name".to_string(), None),
      );
    }
    Ok(name)
  }

  fn parse_environment(&mut self, depth: usize) -> Result<Expr, ParseError> {
    self.check_depth(depth)?;
    let name = self.parse_environment_name()?;
    let expr = match name.as_str() {
      "matrix" | "pmatrix" | "bmatrix" | "Bmatrix" | "vmatrix"
      | "Vmatrix" => self.parse_matrix_body(depth + 1)?,
      "cases" => self.parse_cases_body(depth + 1)?,
      other => {
        return Err(self.error_here(
          format!("unknown environment '{}'", other),
          None,
        ));
      }
    };
    self.expect(&TokenKind::End, "\\end to close the environment", None)?;
    let closing = self.parse_environment_name()?;
    if closing != name {
      return Err(self.error_here(
        format!(
          "environment '{}' is closed by '\\end{{{}}}'",
          name, closing
        ),
        Some(format!("close the environment with \\end{{{}}}", name)),
      ));
    }
    Ok(expr)
  }

  fn parse_matrix_body(&mut self, depth: usize) -> Result<Expr, ParseError> {
    self.check_depth(depth)?;
    let mut rows: Vec<Vec<Expr>> = Vec::new();
    loop {
      let mut row = vec![self.parse_or(depth + 1)?];
      while self.eat(&TokenKind::Ampersand) {
        row.push(self.parse_or(depth + 1)?);
      }
      rows.push(row);
      if self.eat(&TokenKind::RowSep) {
        // Allow a trailing row separator before \end.
        if self.peek() == Some(&TokenKind::End) {
          break;
        }
        continue;
      }
      break;
    }
    let width = rows[0].len();
    if rows.iter().any(|r| r.len() != width) {
      return Err(self.error_here(
        "matrix rows have unequal lengths".to_string(),
        None,
      ));
    }
    // A column of scalars is a vector literal; everything else stays a
    // matrix.
    if width == 1 && rows.len() > 1 {
      Ok(Expr::Vector(
        rows.into_iter().map(|mut r| r.remove(0)).collect(),
      ))
    } else {
      Ok(Expr::Matrix(rows))
    }
  }

  fn parse_cases_body(&mut self, depth: usize) -> Result<Expr, ParseError> {
    self.check_depth(depth)?;
    let mut cases = Vec::new();
    loop {
      let value = self.parse_or(depth + 1)?;
      let guard = if self.eat(&TokenKind::Ampersand) {
        self.parse_case_guard(depth + 1)?
      } else {
        None
      };
      cases.push(PiecewiseCase { value, guard });
      if self.eat(&TokenKind::RowSep) {
        if self.peek() == Some(&TokenKind::End) {
          break;
        }
        continue;
      }
      break;
    }
    Ok(Expr::Piecewise(cases))
  }

  /// A case guard is a boolean expression, `\text{otherwise}` for the
  /// unconditional case, or an `\text{if}`-prefixed condition.
  fn parse_case_guard(
    &mut self,
    depth: usize,
  ) -> Result<Option<Expr>, ParseError> {
    self.check_depth(depth)?;
    match self.peek().cloned() {
      Some(TokenKind::Text(text)) => {
        let word = text.trim().to_ascii_lowercase();
        if word == "otherwise" {
          self.pos += 1;
          Ok(None)
        } else if word == "if" {
          self.pos += 1;
          Ok(Some(self.parse_or(depth + 1)?))
        } else {
          Err(self.error_here(
            format!("unexpected text '{}' in case guard", text),
            Some("use \\text{otherwise} or a condition".to_string()),
          ))
        }
      }
      _ => Ok(Some(self.parse_or(depth + 1)?)),
    }
  }
}
