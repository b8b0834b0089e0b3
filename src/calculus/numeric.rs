//! Fixed-step Simpson's-rule integrator.
//!
//! This is the default collaborator behind the evaluator's integrator slot;
//! it only runs for definite integrals whose integrand has no closed-form
//! antiderivative.

use crate::evaluator::{Bindings, Evaluator};
use crate::syntax::Expr;
use crate::value::Value;
use crate::EvalError;

const STEPS: usize = 1000; // even by construction

pub fn simpson(
  body: &Expr,
  var: &str,
  lower: f64,
  upper: f64,
  vars: &Bindings,
) -> Result<f64, EvalError> {
  if !lower.is_finite() || !upper.is_finite() {
    return Err(EvalError::new(
      "numeric integration needs finite bounds",
    ));
  }
  if lower == upper {
    return Ok(0.0);
  }

  let evaluator = Evaluator::default();
  let mut local = vars.clone();
  let mut sample = |x: f64| -> Result<f64, EvalError> {
    local.insert(var.to_string(), Value::Real(x));
    evaluator.evaluate(body, &local)?.as_real()
  };

  let h = (upper - lower) / STEPS as f64;
  let mut acc = sample(lower)? + sample(upper)?;
  for i in 1..STEPS {
    let x = lower + h * i as f64;
    let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
    acc += weight * sample(x)?;
  }
  Ok(acc * h / 3.0)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::parse;

  #[test]
  fn integrates_a_smooth_function_accurately() {
    // ∫_0^π sin x dx = 2, checked against the quadrature directly.
    let body = parse("\\sin(x)").unwrap();
    let result =
      simpson(&body, "x", 0.0, std::f64::consts::PI, &Bindings::new())
        .unwrap();
    assert!((result - 2.0).abs() < 1e-8);
  }

  #[test]
  fn infinite_bounds_are_rejected() {
    let body = parse("x").unwrap();
    let err =
      simpson(&body, "x", 0.0, f64::INFINITY, &Bindings::new()).unwrap_err();
    assert!(err.to_string().contains("finite"));
  }
}
