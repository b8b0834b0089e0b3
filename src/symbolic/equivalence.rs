//! Three-level equivalence testing.
//!
//! Structural equality, structural equality after normalization plus
//! simplification, and sampled numeric agreement. The levels are monotonic:
//! structural equality implies the other two. Numeric equivalence can
//! return false positives when two genuinely different expressions happen
//! to agree at every sampled point; callers pick the level with that
//! trade-off in mind.

use std::collections::BTreeSet;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::evaluator::{Bindings, Evaluator};
use crate::symbolic::normalize::normalize;
use crate::symbolic::Simplifier;
use crate::syntax::Expr;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquivalenceLevel {
  Structural,
  Algebraic,
  Numeric,
}

const SAMPLE_SEED: u64 = 0x5EED;
const RANDOM_ASSIGNMENTS: usize = 16;
const FIXED_PROBES: &[f64] = &[-2.5, -1.0, -0.5, 0.5, 1.0, 2.5];
const MIN_COMPARABLE_SAMPLES: usize = 4;
const RELATIVE_TOLERANCE: f64 = 1e-8;
const ABSOLUTE_TOLERANCE: f64 = 1e-9;

pub fn are_equivalent(
  simplifier: &Simplifier,
  a: &Expr,
  b: &Expr,
  level: EquivalenceLevel,
) -> bool {
  match level {
    EquivalenceLevel::Structural => a == b,
    EquivalenceLevel::Algebraic => {
      a == b
        || normalize(&simplifier.simplify(a))
          == normalize(&simplifier.simplify(b))
    }
    EquivalenceLevel::Numeric => a == b || sampled_agreement(a, b),
  }
}

fn sampled_agreement(a: &Expr, b: &Expr) -> bool {
  let mut vars: BTreeSet<String> = a.free_variables();
  vars.extend(b.free_variables());
  vars.retain(|name| !crate::evaluator::is_reserved_name(name));

  let evaluator = Evaluator::default();
  let mut rng = ChaCha8Rng::seed_from_u64(SAMPLE_SEED);
  let mut comparable = 0usize;

  let mut assignments: Vec<Bindings> = Vec::new();
  for probe in FIXED_PROBES {
    let mut bindings = Bindings::new();
    for var in &vars {
      bindings.insert(var.clone(), Value::Real(*probe));
    }
    assignments.push(bindings);
  }
  for _ in 0..RANDOM_ASSIGNMENTS {
    let mut bindings = Bindings::new();
    for var in &vars {
      bindings.insert(var.clone(), Value::Real(rng.gen_range(-6.0..6.0)));
    }
    assignments.push(bindings);
  }

  for bindings in &assignments {
    let va = evaluator.evaluate(a, bindings);
    let vb = evaluator.evaluate(b, bindings);
    match (va, vb) {
      (Ok(va), Ok(vb)) => {
        if !values_agree(&va, &vb) {
          return false;
        }
        comparable += 1;
      }
      // One side failing where the other evaluates is tolerated only as a
      // skipped sample; domains need not match exactly.
      _ => continue,
    }
  }
  comparable >= MIN_COMPARABLE_SAMPLES
}

fn reals_agree(a: f64, b: f64) -> bool {
  if a.is_nan() && b.is_nan() {
    return true;
  }
  if a.is_infinite() || b.is_infinite() {
    return a == b;
  }
  let scale = a.abs().max(b.abs());
  (a - b).abs() <= ABSOLUTE_TOLERANCE + RELATIVE_TOLERANCE * scale
}

fn values_agree(a: &Value, b: &Value) -> bool {
  match (a, b) {
    (Value::Real(x), Value::Real(y)) => reals_agree(*x, *y),
    (Value::Boolean(x), Value::Boolean(y)) => x == y,
    (Value::Vector(x), Value::Vector(y)) => {
      x.len() == y.len()
        && x.iter().zip(y.iter()).all(|(p, q)| reals_agree(*p, *q))
    }
    (Value::Interval(x), Value::Interval(y)) => {
      reals_agree(x.lo, y.lo) && reals_agree(x.hi, y.hi)
    }
    (Value::Matrix(x), Value::Matrix(y)) => {
      if x.rows() != y.rows() || x.cols() != y.cols() {
        return false;
      }
      for r in 0..x.rows() {
        for c in 0..x.cols() {
          if !reals_agree(x.get(r, c), y.get(r, c)) {
            return false;
          }
        }
      }
      true
    }
    (a, b) => match (a.as_complex(), b.as_complex()) {
      (Ok(x), Ok(y)) => {
        reals_agree(x.re, y.re) && reals_agree(x.im, y.im)
      }
      _ => false,
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::parse;

  fn equivalent(a: &str, b: &str, level: EquivalenceLevel) -> bool {
    let simplifier = Simplifier::new();
    are_equivalent(
      &simplifier,
      &parse(a).unwrap(),
      &parse(b).unwrap(),
      level,
    )
  }

  #[test]
  fn structural_requires_identical_trees() {
    assert!(equivalent("x + 1", "x + 1", EquivalenceLevel::Structural));
    assert!(!equivalent("x + 1", "1 + x", EquivalenceLevel::Structural));
  }

  #[test]
  fn algebraic_absorbs_commutative_reordering() {
    assert!(equivalent("x + 1", "1 + x", EquivalenceLevel::Algebraic));
    assert!(!equivalent("x + 1", "x + 2", EquivalenceLevel::Algebraic));
  }

  #[test]
  fn numeric_catches_the_pythagorean_identity() {
    assert!(equivalent(
      "\\sin(x)^2 + \\cos(x)^2",
      "1",
      EquivalenceLevel::Numeric
    ));
  }

  #[test]
  fn numeric_distinguishes_different_functions() {
    assert!(!equivalent("x^2", "x^3", EquivalenceLevel::Numeric));
  }

  #[test]
  fn levels_are_monotonic() {
    for (a, b) in [("x + 1", "x + 1"), ("2 x", "2 \\cdot x")] {
      if equivalent(a, b, EquivalenceLevel::Structural) {
        assert!(equivalent(a, b, EquivalenceLevel::Algebraic));
        assert!(equivalent(a, b, EquivalenceLevel::Numeric));
      }
    }
  }
}
