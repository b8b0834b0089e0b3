//! Builtin function dispatch.
//!
//! Each function validates its own domain and raises an `EvalError` on a
//! violation unless a complex-promotion rule applies (negative square roots
//! and logarithms return complex results instead of failing).

#[allow(unused_imports)]
use super::*;

use crate::utils::closest_match;
use crate::value::{Complex, Value};
use crate::EvalError;

const BUILTIN_NAMES: &[&str] = &[
  "sin", "cos", "tan", "cot", "sec", "csc", "arcsin", "arccos", "arctan",
  "arccot", "sinh", "cosh", "tanh", "coth", "arsinh", "arcosh", "artanh",
  "ln", "log", "lg", "exp", "sqrt", "floor", "ceil", "round", "trunc",
  "sign", "abs", "min", "max", "gcd", "lcm", "mod", "re", "im", "conj",
  "arg", "det",
];

fn expect_arity(
  name: &str,
  args: &[Value],
  arity: usize,
) -> Result<(), EvalError> {
  if args.len() == arity {
    Ok(())
  } else {
    Err(EvalError::new(format!(
      "{} expects {} argument{}, got {}",
      name,
      arity,
      if arity == 1 { "" } else { "s" },
      args.len()
    )))
  }
}

fn single_real(name: &str, args: &[Value]) -> Result<f64, EvalError> {
  expect_arity(name, args, 1)?;
  args[0].as_real()
}

fn variadic_reals(
  name: &str,
  args: &[Value],
) -> Result<Vec<f64>, EvalError> {
  if args.len() < 2 {
    return Err(EvalError::new(format!(
      "{} expects at least 2 arguments",
      name
    )));
  }
  args.iter().map(|v| v.as_real()).collect()
}

fn integer_arg(name: &str, value: f64) -> Result<i64, EvalError> {
  if value.fract() != 0.0 || !value.is_finite() {
    return Err(EvalError::new(format!(
      "{} requires integer arguments",
      name
    )));
  }
  Ok(value as i64)
}

pub fn apply_function(
  name: &str,
  subscript: Option<&Value>,
  args: &[Value],
) -> Result<Value, EvalError> {
  if subscript.is_some() && !matches!(name, "log" | "sqrt") {
    return Err(EvalError::new(format!(
      "{} does not take a subscript parameter",
      name
    )));
  }
  match name {
    "sin" => Ok(Value::Real(single_real(name, args)?.sin())),
    "cos" => Ok(Value::Real(single_real(name, args)?.cos())),
    "tan" => Ok(Value::Real(single_real(name, args)?.tan())),
    "cot" => Ok(Value::Real(1.0 / single_real(name, args)?.tan())),
    "sec" => Ok(Value::Real(1.0 / single_real(name, args)?.cos())),
    "csc" => Ok(Value::Real(1.0 / single_real(name, args)?.sin())),

    "arcsin" => {
      let x = single_real(name, args)?;
      if !(-1.0..=1.0).contains(&x) {
        return Err(EvalError::new(
          "arcsin requires an argument in [-1, 1]",
        ));
      }
      Ok(Value::Real(x.asin()))
    }
    "arccos" => {
      let x = single_real(name, args)?;
      if !(-1.0..=1.0).contains(&x) {
        return Err(EvalError::new(
          "arccos requires an argument in [-1, 1]",
        ));
      }
      Ok(Value::Real(x.acos()))
    }
    "arctan" => Ok(Value::Real(single_real(name, args)?.atan())),
    "arccot" => {
      let x = single_real(name, args)?;
      Ok(Value::Real(std::f64::consts::FRAC_PI_2 - x.atan()))
    }

    "sinh" => Ok(Value::Real(single_real(name, args)?.sinh())),
    "cosh" => Ok(Value::Real(single_real(name, args)?.cosh())),
    "tanh" => Ok(Value::Real(single_real(name, args)?.tanh())),
    "coth" => {
      let x = single_real(name, args)?;
      Ok(Value::Real(1.0 / x.tanh()))
    }
    "arsinh" => Ok(Value::Real(single_real(name, args)?.asinh())),
    "arcosh" => {
      let x = single_real(name, args)?;
      if x < 1.0 {
        return Err(EvalError::new(
          "arcosh requires an argument >= 1",
        ));
      }
      Ok(Value::Real(x.acosh()))
    }
    "artanh" => {
      let x = single_real(name, args)?;
      if x <= -1.0 || x >= 1.0 {
        return Err(EvalError::new(
          "artanh requires an argument in (-1, 1)",
        ));
      }
      Ok(Value::Real(x.atanh()))
    }

    "ln" => {
      expect_arity(name, args, 1)?;
      logarithm(&args[0], std::f64::consts::E)
    }
    "log" => {
      expect_arity(name, args, 1)?;
      let base = match subscript {
        Some(value) => {
          let b = value.as_real()?;
          if b <= 0.0 || b == 1.0 {
            return Err(EvalError::new(
              "a logarithm base must be positive and not 1",
            ));
          }
          b
        }
        None => 10.0,
      };
      logarithm(&args[0], base)
    }
    "lg" => {
      expect_arity(name, args, 1)?;
      logarithm(&args[0], 2.0)
    }
    "exp" => {
      expect_arity(name, args, 1)?;
      match &args[0] {
        Value::Complex(c) => {
          Ok(Value::Complex(c.exp()).demote_complex())
        }
        other => Ok(Value::Real(other.as_real()?.exp())),
      }
    }
    "sqrt" => {
      expect_arity(name, args, 1)?;
      let index = match subscript {
        Some(value) => {
          let n = value.as_real()?;
          integer_arg("a root index", n)?
        }
        None => 2,
      };
      root(&args[0], index)
    }

    "floor" => Ok(Value::Real(single_real(name, args)?.floor())),
    "ceil" => Ok(Value::Real(single_real(name, args)?.ceil())),
    "round" => Ok(Value::Real(single_real(name, args)?.round())),
    "trunc" => Ok(Value::Real(single_real(name, args)?.trunc())),
    "sign" => Ok(Value::Real({
      let x = single_real(name, args)?;
      if x > 0.0 {
        1.0
      } else if x < 0.0 {
        -1.0
      } else {
        0.0
      }
    })),
    "abs" => {
      expect_arity(name, args, 1)?;
      super::binary_ops::absolute_value(args[0].clone())
    }

    "min" => {
      let values = variadic_reals(name, args)?;
      Ok(Value::Real(values.into_iter().fold(f64::INFINITY, f64::min)))
    }
    "max" => {
      let values = variadic_reals(name, args)?;
      Ok(Value::Real(
        values.into_iter().fold(f64::NEG_INFINITY, f64::max),
      ))
    }
    "gcd" => {
      let values = variadic_reals(name, args)?;
      let mut acc = 0i64;
      for v in values {
        acc = gcd(acc, integer_arg(name, v)?.abs());
      }
      Ok(Value::Real(acc as f64))
    }
    "lcm" => {
      let values = variadic_reals(name, args)?;
      let mut acc = 1i64;
      for v in values {
        let n = integer_arg(name, v)?.abs();
        if n == 0 {
          return Ok(Value::Real(0.0));
        }
        acc = acc / gcd(acc, n) * n;
      }
      Ok(Value::Real(acc as f64))
    }
    "mod" => {
      expect_arity(name, args, 2)?;
      let a = args[0].as_real()?;
      let b = args[1].as_real()?;
      if b == 0.0 {
        return Err(EvalError::new("mod by zero"));
      }
      Ok(Value::Real(a.rem_euclid(b)))
    }

    "re" => {
      expect_arity(name, args, 1)?;
      Ok(Value::Real(args[0].as_complex()?.re))
    }
    "im" => {
      expect_arity(name, args, 1)?;
      Ok(Value::Real(args[0].as_complex()?.im))
    }
    "conj" => {
      expect_arity(name, args, 1)?;
      Ok(Value::Complex(args[0].as_complex()?.conjugate()).demote_complex())
    }
    "arg" => {
      expect_arity(name, args, 1)?;
      Ok(Value::Real(args[0].as_complex()?.argument()))
    }
    "det" => {
      expect_arity(name, args, 1)?;
      Ok(Value::Real(args[0].as_matrix()?.determinant()?))
    }

    _ => {
      let suggestion = closest_match(name, BUILTIN_NAMES.iter().copied())
        .map(|best| format!("did you mean '\\{}'?", best));
      Err(EvalError {
        message: format!("unknown function '{}'", name),
        suggestion,
      })
    }
  }
}

/// Logarithm with complex promotion: a negative real argument yields the
/// principal complex value instead of an error. Zero stays an error.
fn logarithm(value: &Value, base: f64) -> Result<Value, EvalError> {
  let base_ln = base.ln();
  match value {
    Value::Complex(c) => {
      let log = Complex::new(c.ln().re / base_ln, c.ln().im / base_ln);
      Ok(Value::Complex(log).demote_complex())
    }
    other => {
      let x = other.as_real()?;
      if x == 0.0 {
        return Err(EvalError::new("logarithm of zero"));
      }
      if x < 0.0 {
        let log = Complex::new(
          x.abs().ln() / base_ln,
          std::f64::consts::PI / base_ln,
        );
        return Ok(Value::Complex(log));
      }
      Ok(Value::Real(x.ln() / base_ln))
    }
  }
}

/// `\sqrt[n]{x}`. Even roots of negative reals promote to complex; odd
/// roots stay real with the sign of the radicand.
fn root(value: &Value, index: i64) -> Result<Value, EvalError> {
  if index < 2 {
    return Err(EvalError::new("a root index must be at least 2"));
  }
  match value {
    Value::Complex(c) => {
      let result = c.pow(Complex::from_real(1.0 / index as f64));
      Ok(Value::Complex(result).demote_complex())
    }
    other => {
      let x = other.as_real()?;
      if x >= 0.0 {
        return Ok(Value::Real(x.powf(1.0 / index as f64)));
      }
      if index % 2 == 1 {
        return Ok(Value::Real(-((-x).powf(1.0 / index as f64))));
      }
      if index == 2 {
        return Ok(Value::Complex(Complex::new(0.0, (-x).sqrt())));
      }
      let result =
        Complex::from_real(x).pow(Complex::from_real(1.0 / index as f64));
      Ok(Value::Complex(result))
    }
  }
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

/// Factorial of a non-negative integer real. Values above 170 overflow an
/// f64 and return infinity without iterating.
pub fn factorial(x: f64) -> Result<f64, EvalError> {
  if x < 0.0 || x.fract() != 0.0 {
    return Err(EvalError::new(
      "factorial is only defined for non-negative integers",
    ));
  }
  if x > 170.0 {
    return Ok(f64::INFINITY);
  }
  let mut acc = 1.0;
  let mut i = 2.0;
  while i <= x {
    acc *= i;
    i += 1.0;
  }
  Ok(acc)
}

/// Binomial coefficient over non-negative integers with `k <= n`.
pub fn binomial(n: f64, k: f64) -> Result<f64, EvalError> {
  if n.fract() != 0.0 || k.fract() != 0.0 || n < 0.0 || k < 0.0 || k > n {
    return Err(EvalError::new(
      "binomial coefficients need integers with 0 <= k <= n",
    ));
  }
  let k = k.min(n - k);
  let mut acc = 1.0;
  for i in 0..(k as u64) {
    acc = acc * (n - i as f64) / (i as f64 + 1.0);
  }
  Ok(acc.round())
}
