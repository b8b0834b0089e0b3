//! The type-polymorphic evaluator.
//!
//! Traversal is strict post-order: operands are fully evaluated before their
//! operator applies. Binary operations dispatch on the ordered pair of value
//! domains (see `binary_ops`), builtin functions on the call name (see
//! `functions`). Piecewise fall-through and the complex promotions are
//! in-band domain signals, not errors.

pub mod binary_ops;
pub mod functions;

use std::collections::HashMap;

use crate::calculus;
use crate::syntax::{BinaryOperator, Expr, RelationOp, UnaryOperator};
use crate::utils::closest_match;
use crate::value::{Complex, Value};
use crate::EvalError;

pub type Bindings = HashMap<String, Value>;

/// Queried before builtin function dispatch; returning `None` falls through,
/// so any builtin can be overridden.
pub type FunctionHook = Box<dyn Fn(&str, &[Value]) -> Option<Value>>;

/// Resolves a definite integral numerically when no closed form is found.
pub type NumericIntegrator =
  Box<dyn Fn(&Expr, &str, f64, f64, &Bindings) -> Result<f64, EvalError>>;

#[derive(Debug, Clone, Copy)]
pub struct EvalOptions {
  /// Hard cap on `end - start + 1` for summations and products.
  pub iteration_cap: usize,
  /// Ceiling for the explicit depth counter threaded through evaluation.
  pub max_recursion_depth: usize,
}

impl Default for EvalOptions {
  fn default() -> Self {
    Self {
      iteration_cap: 100_000,
      max_recursion_depth: 500,
    }
  }
}

pub struct Evaluator {
  pub options: EvalOptions,
  hook: Option<FunctionHook>,
  integrator: NumericIntegrator,
}

impl Default for Evaluator {
  fn default() -> Self {
    Self {
      options: EvalOptions::default(),
      hook: None,
      integrator: Box::new(calculus::numeric::simpson),
    }
  }
}

/// Evaluate with a default evaluator configuration.
pub fn evaluate(expr: &Expr, vars: &Bindings) -> Result<Value, EvalError> {
  Evaluator::default().evaluate(expr, vars)
}

/// Names bound by the evaluator itself; callers cannot rebind them.
fn reserved_value(name: &str) -> Option<Value> {
  match name {
    "pi" => Some(Value::Real(std::f64::consts::PI)),
    "tau" => Some(Value::Real(std::f64::consts::TAU)),
    "e" => Some(Value::Real(std::f64::consts::E)),
    "phi" => Some(Value::Real(1.618_033_988_749_895)),
    "i" => Some(Value::Complex(Complex::I)),
    "infty" => Some(Value::Real(f64::INFINITY)),
    _ => None,
  }
}

pub fn is_reserved_name(name: &str) -> bool {
  reserved_value(name).is_some()
}

const RESERVED_NAMES: &[&str] = &["pi", "tau", "e", "phi", "i", "infty"];

impl Evaluator {
  pub fn new(options: EvalOptions) -> Self {
    Self {
      options,
      ..Self::default()
    }
  }

  pub fn with_function_hook(mut self, hook: FunctionHook) -> Self {
    self.hook = Some(hook);
    self
  }

  pub fn with_integrator(mut self, integrator: NumericIntegrator) -> Self {
    self.integrator = integrator;
    self
  }

  pub fn evaluate(
    &self,
    expr: &Expr,
    vars: &Bindings,
  ) -> Result<Value, EvalError> {
    self.eval(expr, vars, 0)
  }

  fn check_depth(&self, depth: usize) -> Result<(), EvalError> {
    if depth > self.options.max_recursion_depth {
      Err(EvalError::new(format!(
        "evaluation nests deeper than the recursion limit of {}",
        self.options.max_recursion_depth
      )))
    } else {
      Ok(())
    }
  }

  fn eval(
    &self,
    expr: &Expr,
    vars: &Bindings,
    depth: usize,
  ) -> Result<Value, EvalError> {
    self.check_depth(depth)?;
    match expr {
      Expr::Number(n) => Ok(Value::Real(*n)),
      Expr::Variable(name) => self.lookup(name, vars),
      Expr::Binary { op, left, right } => {
        self.eval_binary(*op, left, right, vars, depth)
      }
      Expr::Unary { op, operand } => {
        let value = self.eval(operand, vars, depth + 1)?;
        match op {
          UnaryOperator::Neg => binary_ops::negate(value),
          UnaryOperator::Factorial => {
            let x = value.as_real()?;
            Ok(Value::Real(functions::factorial(x)?))
          }
        }
      }
      Expr::Abs(inner) => {
        let value = self.eval(inner, vars, depth + 1)?;
        binary_ops::absolute_value(value)
      }
      Expr::Call {
        name,
        args,
        subscript,
      } => {
        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
          arg_values.push(self.eval(arg, vars, depth + 1)?);
        }
        let subscript_value = match subscript {
          Some(sub) => Some(self.eval(sub, vars, depth + 1)?),
          None => None,
        };
        if let Some(hook) = &self.hook {
          if let Some(value) = hook(name, &arg_values) {
            return Ok(value);
          }
        }
        functions::apply_function(name, subscript_value.as_ref(), &arg_values)
      }
      Expr::Matrix(rows) => {
        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
          let mut cells = Vec::with_capacity(row.len());
          for cell in row {
            let value = self.eval(cell, vars, depth + 1)?;
            cells.push(value.as_real().map_err(|_| {
              EvalError::new(
                "matrix entries must evaluate to real numbers",
              )
            })?);
          }
          data.push(cells);
        }
        Ok(Value::Matrix(crate::value::Matrix::from_rows(data)?))
      }
      Expr::Vector(items) => {
        let mut data = Vec::with_capacity(items.len());
        for item in items {
          let value = self.eval(item, vars, depth + 1)?;
          data.push(value.as_real().map_err(|_| {
            EvalError::new(
              "vector entries must evaluate to real numbers",
            )
          })?);
        }
        Ok(Value::Vector(data))
      }
      Expr::Sum {
        var,
        from,
        to,
        body,
      } => self.eval_iteration(var, from, to, body, vars, depth, true),
      Expr::Product {
        var,
        from,
        to,
        body,
      } => self.eval_iteration(var, from, to, body, vars, depth, false),
      Expr::Limit { var, target, body } => {
        self.eval_limit(var, target, body, vars, depth)
      }
      Expr::Integral {
        var,
        lower,
        upper,
        body,
      } => self.eval_integral(var, lower, upper, body, vars, depth),
      Expr::Derivative {
        body,
        var,
        order,
        ..
      } => {
        let derived = calculus::differentiate(body, var, *order)?;
        self.eval(&derived, vars, depth + 1)
      }
      Expr::Binom { top, bottom } => {
        let n = self.eval(top, vars, depth + 1)?.as_real()?;
        let k = self.eval(bottom, vars, depth + 1)?.as_real()?;
        Ok(Value::Real(functions::binomial(n, k)?))
      }
      Expr::Comparison { op, left, right } => {
        let l = self.eval(left, vars, depth + 1)?;
        let r = self.eval(right, vars, depth + 1)?;
        Ok(Value::Boolean(compare_values(*op, &l, &r)?))
      }
      Expr::ChainedComparison { terms, ops } => {
        let mut values = Vec::with_capacity(terms.len());
        for term in terms {
          values.push(self.eval(term, vars, depth + 1)?);
        }
        let mut holds = true;
        for (i, op) in ops.iter().enumerate() {
          holds = holds && compare_values(*op, &values[i], &values[i + 1])?;
        }
        Ok(Value::Boolean(holds))
      }
      Expr::Conditional { value, condition } => {
        let guard = self.eval(condition, vars, depth + 1)?.as_boolean()?;
        if guard {
          self.eval(value, vars, depth + 1)
        } else {
          Ok(Value::Real(f64::NAN))
        }
      }
      Expr::Piecewise(cases) => {
        for case in cases {
          match &case.guard {
            None => return self.eval(&case.value, vars, depth + 1),
            Some(guard) => {
              let holds =
                self.eval(guard, vars, depth + 1)?.as_boolean()?;
              if holds {
                return self.eval(&case.value, vars, depth + 1);
              }
            }
          }
        }
        // No case matched: out of the piecewise domain. This is an in-band
        // signal, not an exception.
        Ok(Value::Real(f64::NAN))
      }
    }
  }

  fn lookup(&self, name: &str, vars: &Bindings) -> Result<Value, EvalError> {
    if let Some(value) = reserved_value(name) {
      if vars.contains_key(name) {
        return Err(EvalError::new(format!(
          "'{}' is a reserved constant and cannot be rebound",
          name
        )));
      }
      return Ok(value);
    }
    match vars.get(name) {
      Some(value) => Ok(value.clone()),
      None => {
        let candidates = vars
          .keys()
          .map(|k| k.as_str())
          .chain(RESERVED_NAMES.iter().copied());
        let suggestion = closest_match(name, candidates)
          .map(|best| format!("did you mean '{}'?", best));
        Err(EvalError {
          message: format!("undefined variable '{}'", name),
          suggestion,
        })
      }
    }
  }

  fn eval_binary(
    &self,
    op: BinaryOperator,
    left: &Expr,
    right: &Expr,
    vars: &Bindings,
    depth: usize,
  ) -> Result<Value, EvalError> {
    let left_value = self.eval(left, vars, depth + 1)?;

    // Matrix exponents look at the exponent syntactically: `M^T` transposes
    // even though `T` is unbound.
    if op == BinaryOperator::Pow {
      if let Value::Matrix(m) = &left_value {
        if matches!(right, Expr::Variable(t) if t == "T") {
          return Ok(Value::Matrix(m.transpose()));
        }
        let exponent = self.eval(right, vars, depth + 1)?.as_real()?;
        return binary_ops::matrix_power(m, exponent);
      }
    }

    let right_value = self.eval(right, vars, depth + 1)?;
    binary_ops::apply_binary(op, left_value, right_value)
  }

  fn eval_iteration(
    &self,
    var: &str,
    from: &Expr,
    to: &Expr,
    body: &Expr,
    vars: &Bindings,
    depth: usize,
    is_sum: bool,
  ) -> Result<Value, EvalError> {
    if is_reserved_name(var) {
      return Err(EvalError::new(format!(
        "'{}' is a reserved constant and cannot be an iteration variable",
        var
      )));
    }
    let start = self.eval(from, vars, depth + 1)?.as_real()?;
    let end = self.eval(to, vars, depth + 1)?.as_real()?;
    if !start.is_finite() || !end.is_finite() {
      return Err(EvalError::new("iteration bounds must be finite"));
    }

    let count = if end < start {
      0
    } else {
      (end - start).floor() as usize + 1
    };
    if count > self.options.iteration_cap {
      return Err(EvalError::new(format!(
        "iteration count {} exceeds the cap of {}",
        count, self.options.iteration_cap
      )));
    }

    let mut local = vars.clone();
    let mut acc = Value::Real(if is_sum { 0.0 } else { 1.0 });
    for i in 0..count {
      local.insert(var.to_string(), Value::Real(start + i as f64));
      let term = self.eval(body, &local, depth + 1)?;
      let op = if is_sum {
        BinaryOperator::Add
      } else {
        BinaryOperator::Mul
      };
      acc = binary_ops::apply_binary(op, acc, term)?;
    }
    Ok(acc)
  }

  /// Finite targets substitute directly. Infinite targets sample an
  /// escalating magnitude ladder and report the last value that stayed
  /// finite and stable; no indeterminate-form resolution is attempted.
  fn eval_limit(
    &self,
    var: &str,
    target: &Expr,
    body: &Expr,
    vars: &Bindings,
    depth: usize,
  ) -> Result<Value, EvalError> {
    let target_value = self.eval(target, vars, depth + 1)?.as_real()?;
    let mut local = vars.clone();
    if target_value.is_finite() {
      local.insert(var.to_string(), Value::Real(target_value));
      return self.eval(body, &local, depth + 1);
    }

    let sign = if target_value > 0.0 { 1.0 } else { -1.0 };
    let mut previous: Option<f64> = None;
    let mut last_finite: Option<f64> = None;
    for exponent in 1..=8 {
      local.insert(
        var.to_string(),
        Value::Real(sign * 10f64.powi(exponent)),
      );
      let sample = match self.eval(body, &local, depth + 1) {
        Ok(value) => value.as_real().unwrap_or(f64::NAN),
        Err(_) => f64::NAN,
      };
      if sample.is_finite() {
        previous = last_finite;
        last_finite = Some(sample);
      }
    }
    match (previous, last_finite) {
      (Some(a), Some(b)) => {
        let stable = (a - b).abs() <= 1e-6 * b.abs().max(1.0);
        Ok(Value::Real(if stable { b } else { f64::NAN }))
      }
      _ => Ok(Value::Real(f64::NAN)),
    }
  }

  fn eval_integral(
    &self,
    var: &str,
    lower: &Option<Box<Expr>>,
    upper: &Option<Box<Expr>>,
    body: &Expr,
    vars: &Bindings,
    depth: usize,
  ) -> Result<Value, EvalError> {
    let (lower, upper) = match (lower, upper) {
      (Some(lo), Some(hi)) => (lo, hi),
      _ => {
        return Err(EvalError::new(
          "an unresolved integral cannot be evaluated without bounds",
        ));
      }
    };
    let lo = self.eval(lower, vars, depth + 1)?.as_real()?;
    let hi = self.eval(upper, vars, depth + 1)?.as_real()?;

    // Closed form first, the numeric collaborator as the fallback.
    if let Some(anti) = calculus::integral::antiderivative(body, var) {
      let mut local = vars.clone();
      local.insert(var.to_string(), Value::Real(hi));
      let at_hi = self.eval(&anti, &local, depth + 1)?;
      local.insert(var.to_string(), Value::Real(lo));
      let at_lo = self.eval(&anti, &local, depth + 1)?;
      return binary_ops::apply_binary(BinaryOperator::Sub, at_hi, at_lo);
    }
    (self.integrator)(body, var, lo, hi, vars).map(Value::Real)
  }
}

/// Ordering relations need real operands; equality also works pairwise on
/// the other domains.
fn compare_values(
  op: RelationOp,
  left: &Value,
  right: &Value,
) -> Result<bool, EvalError> {
  match (left, right) {
    (Value::Real(a), Value::Real(b)) => Ok(op.holds(*a, *b)),
    _ => match op {
      RelationOp::Eq => Ok(left == right),
      RelationOp::Ne => Ok(left != right),
      _ => Err(EvalError::new(format!(
        "cannot order {} and {} values",
        left.kind_name(),
        right.kind_name()
      ))),
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::parse;

  fn eval_source(source: &str) -> Result<Value, EvalError> {
    let expr = parse(source).expect("parse failure");
    evaluate(&expr, &Bindings::new())
  }

  #[test]
  fn undefined_variable_suggests_similar_binding() {
    let expr = parse("\\alpha_x").unwrap();
    let mut vars = Bindings::new();
    vars.insert("alpha_y".to_string(), Value::Real(1.0));
    let err = evaluate(&expr, &vars).unwrap_err();
    assert!(err.suggestion.unwrap().contains("alpha_y"));
  }

  #[test]
  fn reserved_constants_cannot_be_rebound() {
    let expr = parse("\\pi").unwrap();
    let mut vars = Bindings::new();
    vars.insert("pi".to_string(), Value::Real(3.0));
    assert!(evaluate(&expr, &vars).is_err());
  }

  #[test]
  fn division_by_exact_zero_is_an_error() {
    assert!(eval_source("1 / 0").is_err());
  }

  #[test]
  fn summation_cap_is_enforced() {
    let err = eval_source("\\sum_{i=1}^{200000} i").unwrap_err();
    assert!(err.to_string().contains("cap"));
  }

  #[test]
  fn empty_summation_is_zero() {
    assert_eq!(
      eval_source("\\sum_{i=5}^{1} i").unwrap(),
      Value::Real(0.0)
    );
  }

  #[test]
  fn limit_at_infinity_samples_the_ladder() {
    let value = eval_source("\\lim_{x \\to \\infty} \\frac{1}{x}")
      .unwrap()
      .as_real()
      .unwrap();
    assert!(value.abs() < 1e-6);
  }
}
