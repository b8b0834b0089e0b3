//! texpr — parse LaTeX-style mathematical notation into an expression
//! tree, evaluate it over several numeric domains (real, complex, interval,
//! vector, matrix), and transform it symbolically (differentiation,
//! antiderivatives, rewrite-based simplification, equivalence testing).
//!
//! The pipeline is source → [`tokenize`] → [`parse`] → `Expr`, after which
//! the tree goes to [`evaluate`] for a numeric result or to
//! [`differentiate`]/[`integrate`]/[`simplify`] for tree-to-tree
//! transforms whose outputs feed back into the evaluator.

use thiserror::Error;

pub mod calculus;
pub mod evaluator;
pub mod parser;
pub mod symbolic;
pub mod syntax;
pub mod tokenizer;
pub mod utils;
pub mod value;

pub use calculus::{differentiate, integrate};
pub use evaluator::{evaluate, Bindings, EvalOptions, Evaluator};
pub use parser::{parse, parse_with, parse_with_diagnostics, ParserOptions};
pub use symbolic::{
  are_equivalent, expand, factor, simplify, Assumptions, EquivalenceLevel,
  Property, Simplifier,
};
pub use syntax::{
  BinaryOperator, Expr, PiecewiseCase, RelationOp, UnaryOperator,
};
pub use tokenizer::{
  tokenize, tokenize_with, CommandKind, CommandRegistry, Token, TokenKind,
  TokenizerOptions,
};
pub use value::{Complex, Interval, Matrix, Value};

/// Unrecognized input at the lexical level.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenizeError {
  pub message: String,
  /// Char offset of the offending input.
  pub position: usize,
  /// The source text the error refers to.
  pub source: String,
  pub suggestion: Option<String>,
}

impl std::fmt::Display for TokenizeError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} at position {}", self.message, self.position)
  }
}

impl std::error::Error for TokenizeError {}

/// Malformed grammar, unmatched delimiters or environments, or the
/// recursion-depth guard firing during parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
  pub message: String,
  pub position: usize,
  pub source: String,
  pub suggestion: Option<String>,
}

impl std::fmt::Display for ParseError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} at position {}", self.message, self.position)
  }
}

impl std::error::Error for ParseError {}

/// Anything that goes wrong while evaluating or symbolically transforming
/// a tree: type-combination mismatches, undefined variables, domain
/// violations, exceeded iteration or recursion limits.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct EvalError {
  pub message: String,
  pub suggestion: Option<String>,
}

impl EvalError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      suggestion: None,
    }
  }

  pub fn with_suggestion(
    message: impl Into<String>,
    suggestion: impl Into<String>,
  ) -> Self {
    Self {
      message: message.into(),
      suggestion: Some(suggestion.into()),
    }
  }
}

/// Umbrella over the three pipeline stages. All of these are recoverable
/// by the caller; none is fatal to the process.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
  #[error(transparent)]
  Tokenize(#[from] TokenizeError),
  #[error(transparent)]
  Parse(#[from] ParseError),
  #[error(transparent)]
  Eval(#[from] EvalError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Tokenize,
  Parse,
  Evaluate,
}

impl Stage {
  pub fn name(&self) -> &'static str {
    match self {
      Stage::Tokenize => "tokenize",
      Stage::Parse => "parse",
      Stage::Evaluate => "evaluate",
    }
  }
}

/// One collected problem, for callers that want everything wrong with an
/// input instead of the first failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
  pub stage: Stage,
  pub message: String,
  pub position: Option<usize>,
  pub source: String,
  pub suggestion: Option<String>,
}

/// Parse and evaluate the source in one step with default configuration.
pub fn eval_str(source: &str, vars: &Bindings) -> Result<Value, Error> {
  let expr = parse(source)?;
  Ok(evaluate(&expr, vars)?)
}

/// Render an expression back to parseable LaTeX-style source.
pub fn unparse(expr: &Expr) -> String {
  expr.to_string()
}

/// Run the pipeline in recovery mode and collect every diagnostic instead
/// of stopping at the first error. The evaluation stage only runs when the
/// provided bindings cover the expression's free variables, so a formula
/// with unbound variables still validates cleanly at the parse level.
pub fn validate(source: &str, vars: &Bindings) -> Vec<Diagnostic> {
  let registry = CommandRegistry::builtin();
  let options = ParserOptions::default();
  let (expr, parse_diagnostics) =
    parse_with_diagnostics(source, &registry, &options);

  let mut diagnostics: Vec<Diagnostic> = parse_diagnostics
    .into_iter()
    .map(|e| Diagnostic {
      stage: Stage::Parse,
      message: e.message,
      position: Some(e.position),
      source: e.source,
      suggestion: e.suggestion,
    })
    .collect();

  if let Some(expr) = expr {
    let covered = expr
      .free_variables()
      .iter()
      .all(|name| {
        evaluator::is_reserved_name(name) || vars.contains_key(name)
      });
    if covered {
      if let Err(e) = evaluate(&expr, vars) {
        diagnostics.push(Diagnostic {
          stage: Stage::Evaluate,
          message: e.message,
          position: None,
          source: source.to_string(),
          suggestion: e.suggestion,
        });
      }
    }
  }
  diagnostics
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn eval_str_runs_the_whole_pipeline() {
    let result = eval_str("2 + 3 \\cdot 4", &Bindings::new()).unwrap();
    assert_eq!(result, Value::Real(14.0));
  }

  #[test]
  fn validate_reports_nothing_for_a_clean_formula() {
    assert!(validate("x^2 + 1", &Bindings::new()).is_empty());
  }

  #[test]
  fn validate_collects_parse_problems() {
    let diagnostics = validate("1 + (2", &Bindings::new());
    assert!(!diagnostics.is_empty());
    assert_eq!(diagnostics[0].stage, Stage::Parse);
  }

  #[test]
  fn validate_reports_evaluation_errors_when_bindings_cover() {
    let mut vars = Bindings::new();
    vars.insert("x".to_string(), Value::Real(0.0));
    let diagnostics = validate("\\frac{1}{x}", &vars);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].stage, Stage::Evaluate);
  }
}
