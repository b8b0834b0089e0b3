//! Type-combination dispatch for binary operations.
//!
//! The match arms run in a fixed specificity order: matrix pairs, then
//! vector pairs, then complex, then interval, then plain real. A complex
//! scalar times a matrix therefore reaches the matrix rules (which reject
//! it) instead of silently landing in the complex rules. A combination with
//! no rule is an error.

#[allow(unused_imports)]
use super::*;

use crate::syntax::BinaryOperator;
use crate::value::{Complex, Interval, Matrix, Value};
use crate::EvalError;

fn no_rule(
  op: BinaryOperator,
  left: &Value,
  right: &Value,
) -> EvalError {
  EvalError::new(format!(
    "no rule for {:?} on {} and {} operands",
    op,
    left.kind_name(),
    right.kind_name()
  ))
}

pub fn apply_binary(
  op: BinaryOperator,
  left: Value,
  right: Value,
) -> Result<Value, EvalError> {
  match (&left, &right) {
    // Matrix rules come first.
    (Value::Matrix(a), Value::Matrix(b)) => matrix_matrix(op, a, b),
    (Value::Matrix(m), Value::Real(s)) => matrix_scalar(op, m, *s),
    (Value::Real(s), Value::Matrix(m)) => scalar_matrix(op, *s, m),
    (Value::Matrix(_), _) | (_, Value::Matrix(_)) => {
      Err(no_rule(op, &left, &right))
    }

    // Vector rules.
    (Value::Vector(a), Value::Vector(b)) => vector_vector(op, a, b),
    (Value::Vector(v), Value::Real(s)) => vector_scalar(op, v, *s),
    (Value::Real(s), Value::Vector(v)) => scalar_vector(op, *s, v),
    (Value::Vector(_), _) | (_, Value::Vector(_)) => {
      Err(no_rule(op, &left, &right))
    }

    // Complex rules; reals promote to complex here.
    (Value::Complex(a), Value::Complex(b)) => complex_complex(op, *a, *b),
    (Value::Complex(a), Value::Real(b)) => {
      complex_complex(op, *a, Complex::from_real(*b))
    }
    (Value::Real(a), Value::Complex(b)) => {
      complex_complex(op, Complex::from_real(*a), *b)
    }
    (Value::Complex(_), _) | (_, Value::Complex(_)) => {
      Err(no_rule(op, &left, &right))
    }

    // Interval rules; reals promote to point intervals.
    (Value::Interval(a), Value::Interval(b)) => interval_interval(op, *a, *b),
    (Value::Interval(a), Value::Real(b)) => {
      interval_interval(op, *a, Interval::point(*b))
    }
    (Value::Real(a), Value::Interval(b)) => {
      interval_interval(op, Interval::point(*a), *b)
    }
    (Value::Interval(_), _) | (_, Value::Interval(_)) => {
      Err(no_rule(op, &left, &right))
    }

    // Plain reals.
    (Value::Real(a), Value::Real(b)) => real_real(op, *a, *b),

    // Logical operators on booleans.
    (Value::Boolean(a), Value::Boolean(b)) => match op {
      BinaryOperator::And => Ok(Value::Boolean(*a && *b)),
      BinaryOperator::Or => Ok(Value::Boolean(*a || *b)),
      _ => Err(no_rule(op, &left, &right)),
    },
    _ => Err(no_rule(op, &left, &right)),
  }
}

fn real_real(op: BinaryOperator, a: f64, b: f64) -> Result<Value, EvalError> {
  match op {
    BinaryOperator::Add => Ok(Value::Real(a + b)),
    BinaryOperator::Sub => Ok(Value::Real(a - b)),
    BinaryOperator::Mul | BinaryOperator::CrossMul => Ok(Value::Real(a * b)),
    BinaryOperator::Div => {
      // Exact zero is an error; infinities from underflowing divisors are
      // ordinary IEEE results and pass through.
      if b == 0.0 {
        Err(EvalError::new("division by zero"))
      } else {
        Ok(Value::Real(a / b))
      }
    }
    BinaryOperator::Pow => {
      let result = a.powf(b);
      if result.is_nan() && a < 0.0 && b.fract() != 0.0 {
        // Negative base with fractional exponent: promote to the complex
        // principal value instead of failing.
        let c = Complex::from_real(a).pow(Complex::from_real(b));
        return Ok(Value::Complex(c).demote_complex());
      }
      Ok(Value::Real(result))
    }
    BinaryOperator::And | BinaryOperator::Or => Err(EvalError::new(
      "logical operators need boolean operands",
    )),
  }
}

fn complex_complex(
  op: BinaryOperator,
  a: Complex,
  b: Complex,
) -> Result<Value, EvalError> {
  let result = match op {
    BinaryOperator::Add => a + b,
    BinaryOperator::Sub => a - b,
    BinaryOperator::Mul | BinaryOperator::CrossMul => a * b,
    BinaryOperator::Div => {
      if b.re == 0.0 && b.im == 0.0 {
        return Err(EvalError::new("division by zero"));
      }
      a / b
    }
    BinaryOperator::Pow => {
      // Small integer exponents multiply out exactly; the polar form is
      // reserved for everything else.
      if b.im == 0.0 && b.re.fract() == 0.0 && b.re.abs() <= 64.0 {
        complex_powi(a, b.re as i64)?
      } else {
        a.pow(b)
      }
    }
    BinaryOperator::And | BinaryOperator::Or => {
      return Err(EvalError::new(
        "logical operators need boolean operands",
      ));
    }
  };
  Ok(Value::Complex(result).demote_complex())
}

fn complex_powi(base: Complex, n: i64) -> Result<Complex, EvalError> {
  let mut acc = Complex::from_real(1.0);
  for _ in 0..n.unsigned_abs() {
    acc = acc * base;
  }
  if n < 0 {
    if base.re == 0.0 && base.im == 0.0 {
      return Err(EvalError::new("division by zero"));
    }
    acc = Complex::from_real(1.0) / acc;
  }
  Ok(acc)
}

fn interval_interval(
  op: BinaryOperator,
  a: Interval,
  b: Interval,
) -> Result<Value, EvalError> {
  match op {
    BinaryOperator::Add => Ok(Value::Interval(a + b)),
    BinaryOperator::Sub => Ok(Value::Interval(a - b)),
    BinaryOperator::Mul | BinaryOperator::CrossMul => {
      Ok(Value::Interval(a * b))
    }
    BinaryOperator::Div => a.checked_div(b).map(Value::Interval).ok_or_else(
      || EvalError::new("division by an interval containing zero"),
    ),
    BinaryOperator::Pow => {
      if b.width() == 0.0 && b.lo.fract() == 0.0 {
        Ok(Value::Interval(a.powi(b.lo as i32)))
      } else {
        Err(EvalError::new(
          "interval exponents must be integer constants",
        ))
      }
    }
    BinaryOperator::And | BinaryOperator::Or => Err(EvalError::new(
      "logical operators need boolean operands",
    )),
  }
}

fn vector_vector(
  op: BinaryOperator,
  a: &[f64],
  b: &[f64],
) -> Result<Value, EvalError> {
  match op {
    BinaryOperator::Add | BinaryOperator::Sub => {
      if a.len() != b.len() {
        return Err(EvalError::new(format!(
          "vector lengths {} and {} do not match",
          a.len(),
          b.len()
        )));
      }
      let combined = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
          if op == BinaryOperator::Add {
            x + y
          } else {
            x - y
          }
        })
        .collect();
      Ok(Value::Vector(combined))
    }
    // The surface operator decides the product: `*`/`\cdot` is the dot
    // product, `\times` the cross product.
    BinaryOperator::Mul => {
      if a.len() != b.len() {
        return Err(EvalError::new(format!(
          "vector lengths {} and {} do not match",
          a.len(),
          b.len()
        )));
      }
      Ok(Value::Real(
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum(),
      ))
    }
    BinaryOperator::CrossMul => {
      if a.len() != 3 || b.len() != 3 {
        return Err(EvalError::new(
          "the cross product is only defined for 3-dimensional vectors",
        ));
      }
      Ok(Value::Vector(vec![
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
      ]))
    }
    _ => Err(EvalError::new(format!(
      "no rule for {:?} on vector operands",
      op
    ))),
  }
}

fn vector_scalar(
  op: BinaryOperator,
  v: &[f64],
  s: f64,
) -> Result<Value, EvalError> {
  match op {
    BinaryOperator::Mul | BinaryOperator::CrossMul => {
      Ok(Value::Vector(v.iter().map(|x| x * s).collect()))
    }
    BinaryOperator::Div => {
      if s == 0.0 {
        Err(EvalError::new("division by zero"))
      } else {
        Ok(Value::Vector(v.iter().map(|x| x / s).collect()))
      }
    }
    _ => Err(EvalError::new(format!(
      "no rule for {:?} on vector and real operands",
      op
    ))),
  }
}

fn scalar_vector(
  op: BinaryOperator,
  s: f64,
  v: &[f64],
) -> Result<Value, EvalError> {
  match op {
    BinaryOperator::Mul | BinaryOperator::CrossMul => {
      Ok(Value::Vector(v.iter().map(|x| s * x).collect()))
    }
    _ => Err(EvalError::new(format!(
      "no rule for {:?} on real and vector operands",
      op
    ))),
  }
}

fn matrix_matrix(
  op: BinaryOperator,
  a: &Matrix,
  b: &Matrix,
) -> Result<Value, EvalError> {
  match op {
    BinaryOperator::Add => Ok(Value::Matrix(a.elementwise(b, |x, y| x + y)?)),
    BinaryOperator::Sub => Ok(Value::Matrix(a.elementwise(b, |x, y| x - y)?)),
    BinaryOperator::Mul | BinaryOperator::CrossMul => {
      Ok(Value::Matrix(a.matmul(b)?))
    }
    BinaryOperator::Div => Err(EvalError::new(
      "matrix division is not defined; multiply by an inverse instead",
    )),
    _ => Err(EvalError::new(format!(
      "no rule for {:?} on matrix operands",
      op
    ))),
  }
}

fn matrix_scalar(
  op: BinaryOperator,
  m: &Matrix,
  s: f64,
) -> Result<Value, EvalError> {
  match op {
    BinaryOperator::Mul | BinaryOperator::CrossMul => {
      Ok(Value::Matrix(m.map(|x| x * s)))
    }
    BinaryOperator::Div => {
      if s == 0.0 {
        Err(EvalError::new("division by zero"))
      } else {
        Ok(Value::Matrix(m.map(|x| x / s)))
      }
    }
    _ => Err(EvalError::new(format!(
      "no rule for {:?} on matrix and real operands",
      op
    ))),
  }
}

fn scalar_matrix(
  op: BinaryOperator,
  s: f64,
  m: &Matrix,
) -> Result<Value, EvalError> {
  match op {
    BinaryOperator::Mul | BinaryOperator::CrossMul => {
      Ok(Value::Matrix(m.map(|x| s * x)))
    }
    _ => Err(EvalError::new(format!(
      "no rule for {:?} on real and matrix operands",
      op
    ))),
  }
}

/// Matrix exponents: `-1` inverts, positive integers repeat multiplication.
/// (`^T` transposition is routed before evaluation, on the syntax.)
pub fn matrix_power(m: &Matrix, exponent: f64) -> Result<Value, EvalError> {
  if exponent == -1.0 {
    return match m.inverse()? {
      Some(inverse) => Ok(Value::Matrix(inverse)),
      None => Err(EvalError::new("the matrix is singular")),
    };
  }
  if exponent >= 0.0 && exponent.fract() == 0.0 {
    return Ok(Value::Matrix(m.pow(exponent as u32)?));
  }
  Err(EvalError::new(format!(
    "unsupported matrix exponent {}",
    exponent
  )))
}

/// Negation across the value domains.
pub fn negate(value: Value) -> Result<Value, EvalError> {
  match value {
    Value::Real(x) => Ok(Value::Real(-x)),
    Value::Complex(c) => Ok(Value::Complex(-c)),
    Value::Interval(i) => Ok(Value::Interval(-i)),
    Value::Vector(v) => Ok(Value::Vector(v.iter().map(|x| -x).collect())),
    Value::Matrix(m) => Ok(Value::Matrix(m.map(|x| -x))),
    Value::Boolean(_) => {
      Err(EvalError::new("cannot negate a boolean value"))
    }
  }
}

/// `|x|` across the value domains: magnitude for scalars and intervals, the
/// Euclidean norm for vectors, the determinant for matrices.
pub fn absolute_value(value: Value) -> Result<Value, EvalError> {
  match value {
    Value::Real(x) => Ok(Value::Real(x.abs())),
    Value::Complex(c) => Ok(Value::Real(c.modulus())),
    Value::Interval(i) => Ok(Value::Interval(i.magnitude())),
    Value::Vector(v) => Ok(Value::Real(
      v.iter().map(|x| x * x).sum::<f64>().sqrt(),
    )),
    Value::Matrix(m) => Ok(Value::Real(m.determinant()?)),
    Value::Boolean(_) => Err(EvalError::new(
      "absolute value is not defined for booleans",
    )),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn surface_operator_selects_dot_or_cross() {
    let a = Value::Vector(vec![1.0, 0.0, 0.0]);
    let b = Value::Vector(vec![0.0, 1.0, 0.0]);
    let dot = apply_binary(BinaryOperator::Mul, a.clone(), b.clone()).unwrap();
    assert_eq!(dot, Value::Real(0.0));
    let cross = apply_binary(BinaryOperator::CrossMul, a, b).unwrap();
    assert_eq!(cross, Value::Vector(vec![0.0, 0.0, 1.0]));
  }

  #[test]
  fn complex_times_matrix_reaches_the_matrix_rules() {
    let m = Matrix::from_rows(vec![vec![1.0, 2.0]]).unwrap();
    let err = apply_binary(
      BinaryOperator::Mul,
      Value::Complex(Complex::new(0.0, 1.0)),
      Value::Matrix(m),
    )
    .unwrap_err();
    assert!(err.to_string().contains("matrix"));
  }

  #[test]
  fn i_squared_folds_back_to_a_real() {
    let i = Value::Complex(Complex::I);
    let squared =
      apply_binary(BinaryOperator::Mul, i.clone(), i).unwrap();
    assert_eq!(squared, Value::Real(-1.0));
  }

  #[test]
  fn nonzero_division_may_overflow_to_infinity() {
    let result =
      apply_binary(BinaryOperator::Div, Value::Real(1e308), Value::Real(1e-308))
        .unwrap();
    assert_eq!(result, Value::Real(f64::INFINITY));
  }
}
