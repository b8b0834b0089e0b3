//! The two polynomial operations: binomial expansion and simple factoring.

use crate::evaluator::functions::binomial;
use crate::symbolic::rules::{
  build_sum, cleanup, collect_additive_terms,
};
use crate::syntax::{map_children, BinaryOperator, Expr};

const MAX_BINOMIAL_POWER: u32 = 10;
const MAX_EXPAND_PASSES: usize = 25;

/// Multiply out products over sums, expand `(a ± b)^n` binomially for
/// integer `n <= 10`, and split logarithms of products and powers.
pub fn expand(expr: &Expr) -> Expr {
  let mut current = expr.clone();
  for _ in 0..MAX_EXPAND_PASSES {
    let next = cleanup(&expand_walk(&current));
    if next == current {
      break;
    }
    current = next;
  }
  current
}

fn expand_walk(expr: &Expr) -> Expr {
  let node = map_children(expr, &mut |child| expand_walk(child));
  expand_node(&node).unwrap_or(node)
}

fn expand_node(expr: &Expr) -> Option<Expr> {
  match expr {
    Expr::Binary {
      op: BinaryOperator::Mul,
      left,
      right,
    } => {
      // (a + b) c => a c + b c, and symmetrically.
      if let Some((a, b)) = additive_parts(left) {
        return Some(Expr::add(
          Expr::mul(a, right.as_ref().clone()),
          Expr::mul(b, right.as_ref().clone()),
        ));
      }
      if let Some((a, b)) = additive_parts(right) {
        return Some(Expr::add(
          Expr::mul(left.as_ref().clone(), a),
          Expr::mul(left.as_ref().clone(), b),
        ));
      }
      None
    }
    Expr::Binary {
      op: BinaryOperator::Pow,
      left,
      right,
    } => {
      let n = right.as_number()?;
      if n.fract() != 0.0 || n < 2.0 || n > MAX_BINOMIAL_POWER as f64 {
        return None;
      }
      let (a, b) = binomial_parts(left)?;
      Some(expand_binomial(&a, &b, n as u32))
    }
    Expr::Call {
      name,
      args,
      subscript: None,
    } if name == "ln" && args.len() == 1 => {
      match &args[0] {
        // ln(a b) => ln a + ln b
        Expr::Binary {
          op: BinaryOperator::Mul,
          left,
          right,
        } => Some(Expr::add(
          Expr::call("ln", vec![left.as_ref().clone()]),
          Expr::call("ln", vec![right.as_ref().clone()]),
        )),
        // ln(a^n) => n ln a
        Expr::Binary {
          op: BinaryOperator::Pow,
          left,
          right,
        } => Some(Expr::mul(
          right.as_ref().clone(),
          Expr::call("ln", vec![left.as_ref().clone()]),
        )),
        _ => None,
      }
    }
    _ => None,
  }
}

fn additive_parts(expr: &Expr) -> Option<(Expr, Expr)> {
  match expr {
    Expr::Binary {
      op: BinaryOperator::Add,
      left,
      right,
    } => Some((left.as_ref().clone(), right.as_ref().clone())),
    Expr::Binary {
      op: BinaryOperator::Sub,
      left,
      right,
    } => Some((
      left.as_ref().clone(),
      Expr::neg(right.as_ref().clone()),
    )),
    _ => None,
  }
}

fn binomial_parts(expr: &Expr) -> Option<(Expr, Expr)> {
  additive_parts(expr)
}

/// `(a + b)^n = Σ C(n,k) a^(n-k) b^k`.
fn expand_binomial(a: &Expr, b: &Expr, n: u32) -> Expr {
  let mut terms = Vec::with_capacity(n as usize + 1);
  for k in 0..=n {
    let coefficient =
      binomial(n as f64, k as f64).unwrap_or(f64::NAN);
    let mut term = Expr::num(coefficient);
    if n - k > 0 {
      term = Expr::mul(
        term,
        Expr::pow(a.clone(), Expr::num((n - k) as f64)),
      );
    }
    if k > 0 {
      term = Expr::mul(
        term,
        Expr::pow(b.clone(), Expr::num(k as f64)),
      );
    }
    terms.push(term);
  }
  build_sum(terms)
}

/// Difference of squares, monic quadratics with integer roots, and common
/// numeric factor extraction.
pub fn factor(expr: &Expr) -> Expr {
  let node = map_children(expr, &mut |child| factor(child));
  if let Some(factored) = factor_node(&node) {
    return cleanup(&factored);
  }
  node
}

fn factor_node(expr: &Expr) -> Option<Expr> {
  if let Some(factored) = difference_of_squares(expr) {
    return Some(factored);
  }
  if let Some(factored) = quadratic_with_integer_roots(expr) {
    return Some(factored);
  }
  common_numeric_factor(expr)
}

/// `a^2 - b^2 => (a - b)(a + b)`, literal squares included.
fn difference_of_squares(expr: &Expr) -> Option<Expr> {
  let (left, right) = match expr {
    Expr::Binary {
      op: BinaryOperator::Sub,
      left,
      right,
    } => (left.as_ref(), right.as_ref()),
    _ => return None,
  };
  let a = square_root_of(left)?;
  let b = square_root_of(right)?;
  Some(Expr::mul(
    Expr::sub(a.clone(), b.clone()),
    Expr::add(a, b),
  ))
}

fn square_root_of(expr: &Expr) -> Option<Expr> {
  match expr {
    Expr::Binary {
      op: BinaryOperator::Pow,
      left,
      right,
    } if right.as_number() == Some(2.0) => Some(left.as_ref().clone()),
    Expr::Number(n) if *n >= 0.0 => {
      let root = n.sqrt();
      if root.fract() == 0.0 {
        Some(Expr::num(root))
      } else {
        None
      }
    }
    _ => None,
  }
}

/// `x^2 + b x + c => (x + p)(x + q)` when integers `p + q = b`, `p q = c`
/// exist.
fn quadratic_with_integer_roots(expr: &Expr) -> Option<Expr> {
  let mut terms = Vec::new();
  collect_additive_terms(expr, &mut terms);
  if terms.len() < 2 || terms.len() > 3 {
    return None;
  }

  let mut variable: Option<Expr> = None;
  let mut quadratic = 0.0;
  let mut linear = 0.0;
  let mut constant = 0.0;
  for term in &terms {
    let (coefficient, core) = split_coefficient(term);
    match &core {
      Expr::Number(n) => constant += coefficient * n,
      Expr::Variable(_) => {
        if *variable.get_or_insert(core.clone()) != core {
          return None;
        }
        linear += coefficient;
      }
      Expr::Binary {
        op: BinaryOperator::Pow,
        left,
        right,
      } if right.as_number() == Some(2.0)
        && matches!(left.as_ref(), Expr::Variable(_)) =>
      {
        let base = left.as_ref().clone();
        if *variable.get_or_insert(base.clone()) != base {
          return None;
        }
        quadratic += coefficient;
      }
      _ => return None,
    }
  }

  let x = variable?;
  if quadratic != 1.0 || linear.fract() != 0.0 || constant.fract() != 0.0 {
    return None;
  }
  let b = linear as i64;
  let c = constant as i64;
  if c == 0 {
    return None;
  }
  // Search divisor pairs of c for p + q = b.
  let limit = c.abs();
  for p in -limit..=limit {
    if p == 0 || c % p != 0 {
      continue;
    }
    let q = c / p;
    if p + q == b {
      return Some(Expr::mul(
        Expr::add(x.clone(), Expr::num(p as f64)),
        Expr::add(x, Expr::num(q as f64)),
      ));
    }
  }
  None
}

fn split_coefficient(term: &Expr) -> (f64, Expr) {
  match term {
    Expr::Unary {
      op: crate::syntax::UnaryOperator::Neg,
      operand,
    } => {
      let (c, core) = split_coefficient(operand);
      (-c, core)
    }
    Expr::Binary {
      op: BinaryOperator::Mul,
      left,
      right,
    } => {
      if let Expr::Number(c) = left.as_ref() {
        return (*c, right.as_ref().clone());
      }
      if let Expr::Number(c) = right.as_ref() {
        return (*c, left.as_ref().clone());
      }
      (1.0, term.clone())
    }
    other => (1.0, other.clone()),
  }
}

/// `6x + 9y => 3 (2x + 3y)` when every term carries a common integer
/// factor.
fn common_numeric_factor(expr: &Expr) -> Option<Expr> {
  if !matches!(
    expr,
    Expr::Binary {
      op: BinaryOperator::Add | BinaryOperator::Sub,
      ..
    }
  ) {
    return None;
  }
  let mut terms = Vec::new();
  collect_additive_terms(expr, &mut terms);

  let mut divisor = 0i64;
  for term in &terms {
    let (coefficient, _) = split_coefficient(term);
    if coefficient.fract() != 0.0 {
      return None;
    }
    divisor = gcd(divisor, coefficient as i64);
  }
  if divisor.abs() <= 1 {
    return None;
  }

  let scaled: Vec<Expr> = terms
    .iter()
    .map(|term| {
      let (coefficient, core) = split_coefficient(term);
      let reduced = coefficient / divisor as f64;
      if let Expr::Number(n) = core {
        Expr::num(reduced * n)
      } else if reduced == 1.0 {
        core
      } else {
        Expr::mul(Expr::num(reduced), core)
      }
    })
    .collect();
  Some(Expr::mul(
    Expr::num(divisor as f64),
    build_sum(scaled),
  ))
}

fn gcd(a: i64, b: i64) -> i64 {
  let mut a = a.abs();
  let mut b = b.abs();
  while b != 0 {
    let t = b;
    b = a % b;
    a = t;
  }
  a
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::parse;
  use crate::symbolic::are_equivalent;
  use crate::symbolic::EquivalenceLevel;

  #[test]
  fn squared_binomial_expands_to_three_terms() {
    let expanded = expand(&parse("(a + b)^2").unwrap());
    let expected = parse("a^2 + 2 a b + b^2").unwrap();
    assert!(are_equivalent(
      &expanded,
      &expected,
      EquivalenceLevel::Numeric
    ));
  }

  #[test]
  fn difference_of_squares_factors() {
    let factored = factor(&parse("x^2 - 9").unwrap());
    let expected = parse("(x - 3)(x + 3)").unwrap();
    assert!(are_equivalent(
      &factored,
      &expected,
      EquivalenceLevel::Numeric
    ));
  }

  #[test]
  fn monic_quadratic_with_integer_roots_factors() {
    let factored = factor(&parse("x^2 + 5x + 6").unwrap());
    let expected = parse("(x + 2)(x + 3)").unwrap();
    assert!(are_equivalent(
      &factored,
      &expected,
      EquivalenceLevel::Numeric
    ));
  }

  #[test]
  fn eleventh_power_stays_unexpanded() {
    let source = "(a + b)^{11}";
    let expanded = expand(&parse(source).unwrap());
    assert_eq!(expanded, parse(source).unwrap());
  }
}
