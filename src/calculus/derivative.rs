//! Symbolic differentiation.
//!
//! Standard rules applied recursively, with each builtin's derivative
//! tabulated for the chain rule. Results pass through the arithmetic
//! cleanup so `1*x + 0` noise does not accumulate; that pass is for
//! readability only and is not the general simplifier.

use crate::calculus::is_constant_wrt;
use crate::symbolic::rules::cleanup;
use crate::syntax::{
  BinaryOperator, Expr, PiecewiseCase, UnaryOperator,
};
use crate::EvalError;

const MAX_ORDER: u32 = 10;
const MAX_DEPTH: usize = 500;

/// Differentiate `expr` with respect to `var`, `order` times (at most 10).
pub fn differentiate(
  expr: &Expr,
  var: &str,
  order: u32,
) -> Result<Expr, EvalError> {
  if order > MAX_ORDER {
    return Err(EvalError::new(format!(
      "derivative order {} exceeds the maximum of {}",
      order, MAX_ORDER
    )));
  }
  let mut result = expr.clone();
  for _ in 0..order {
    result = cleanup(&differentiate_once(&result, var, 0)?);
  }
  Ok(result)
}

fn differentiate_once(
  expr: &Expr,
  var: &str,
  depth: usize,
) -> Result<Expr, EvalError> {
  if depth > MAX_DEPTH {
    return Err(EvalError::new(format!(
      "differentiation nests deeper than the recursion limit of {}",
      MAX_DEPTH
    )));
  }
  match expr {
    Expr::Number(_) => Ok(Expr::num(0.0)),
    Expr::Variable(name) => {
      Ok(Expr::num(if name == var { 1.0 } else { 0.0 }))
    }

    Expr::Binary { op, left, right } => {
      use BinaryOperator::*;
      match op {
        // d/dx[a ± b] = a' ± b'
        Add | Sub => {
          let da = differentiate_once(left, var, depth + 1)?;
          let db = differentiate_once(right, var, depth + 1)?;
          Ok(Expr::binary(*op, da, db))
        }
        // Product rule: d/dx[a b] = a' b + a b'
        Mul | CrossMul => {
          let da = differentiate_once(left, var, depth + 1)?;
          let db = differentiate_once(right, var, depth + 1)?;
          Ok(Expr::add(
            Expr::mul(da, right.as_ref().clone()),
            Expr::mul(left.as_ref().clone(), db),
          ))
        }
        // Quotient rule: d/dx[a / b] = (a' b - a b') / b^2
        Div => {
          let da = differentiate_once(left, var, depth + 1)?;
          let db = differentiate_once(right, var, depth + 1)?;
          Ok(Expr::div(
            Expr::sub(
              Expr::mul(da, right.as_ref().clone()),
              Expr::mul(left.as_ref().clone(), db),
            ),
            Expr::pow(right.as_ref().clone(), Expr::num(2.0)),
          ))
        }
        Pow => differentiate_power(expr, left, right, var, depth),
        And | Or => Err(EvalError::new(
          "cannot differentiate a boolean expression",
        )),
      }
    }

    Expr::Unary { op, operand } => match op {
      UnaryOperator::Neg => {
        let d = differentiate_once(operand, var, depth + 1)?;
        Ok(Expr::neg(d))
      }
      UnaryOperator::Factorial => {
        if is_constant_wrt(expr, var) {
          Ok(Expr::num(0.0))
        } else {
          Err(EvalError::new("cannot differentiate a factorial"))
        }
      }
    },

    // d/dx|f| = f' * sign(f)
    Expr::Abs(inner) => {
      let d = differentiate_once(inner, var, depth + 1)?;
      Ok(Expr::mul(
        d,
        Expr::call("sign", vec![inner.as_ref().clone()]),
      ))
    }

    Expr::Call {
      name,
      args,
      subscript,
    } => {
      if is_constant_wrt(expr, var) {
        return Ok(Expr::num(0.0));
      }
      if args.len() != 1 {
        return Err(EvalError::new(format!(
          "no differentiation rule for {}-argument {}",
          args.len(),
          name
        )));
      }
      let u = &args[0];
      let outer = builtin_derivative(name, subscript.as_deref(), u)
        .ok_or_else(|| {
          EvalError::new(format!(
            "no differentiation rule for function '{}'",
            name
          ))
        })?;
      // Chain rule: d/dx f(u) = f'(u) * u'
      let du = differentiate_once(u, var, depth + 1)?;
      Ok(Expr::mul(outer, du))
    }

    // Each case differentiates in place; its guard is untouched.
    Expr::Conditional { value, condition } => Ok(Expr::Conditional {
      value: Box::new(differentiate_once(value, var, depth + 1)?),
      condition: condition.clone(),
    }),
    Expr::Piecewise(cases) => {
      let mut derived = Vec::with_capacity(cases.len());
      for case in cases {
        derived.push(PiecewiseCase {
          value: differentiate_once(&case.value, var, depth + 1)?,
          guard: case.guard.clone(),
        });
      }
      Ok(Expr::Piecewise(derived))
    }

    // A nested derivative expands first, then differentiates again.
    Expr::Derivative {
      body,
      var: inner_var,
      order,
      ..
    } => {
      let inner = differentiate(body, inner_var, *order)?;
      differentiate_once(&inner, var, depth + 1)
    }

    Expr::Binom { .. } => {
      if is_constant_wrt(expr, var) {
        Ok(Expr::num(0.0))
      } else {
        Err(EvalError::new(
          "cannot differentiate a binomial coefficient",
        ))
      }
    }

    other => {
      if is_constant_wrt(other, var) {
        Ok(Expr::num(0.0))
      } else {
        Err(EvalError::new(format!(
          "no differentiation rule for this expression: {}",
          other
        )))
      }
    }
  }
}

/// General power rule, selecting among the pure-power, pure-exponential,
/// and mixed `f^g` forms based on where the variable occurs.
fn differentiate_power(
  expr: &Expr,
  base: &Expr,
  exponent: &Expr,
  var: &str,
  depth: usize,
) -> Result<Expr, EvalError> {
  let base_const = is_constant_wrt(base, var);
  let exponent_const = is_constant_wrt(exponent, var);
  if base_const && exponent_const {
    return Ok(Expr::num(0.0));
  }

  if exponent_const {
    // d/dx[f^n] = n * f^(n-1) * f'
    let df = differentiate_once(base, var, depth + 1)?;
    return Ok(Expr::mul(
      Expr::mul(
        exponent.clone(),
        Expr::pow(
          base.clone(),
          Expr::sub(exponent.clone(), Expr::num(1.0)),
        ),
      ),
      df,
    ));
  }

  if base_const {
    let dg = differentiate_once(exponent, var, depth + 1)?;
    if matches!(base, Expr::Variable(name) if name == "e") {
      // d/dx[e^g] = e^g * g'
      return Ok(Expr::mul(expr.clone(), dg));
    }
    // d/dx[a^g] = a^g * ln(a) * g'
    return Ok(Expr::mul(
      Expr::mul(expr.clone(), Expr::call("ln", vec![base.clone()])),
      dg,
    ));
  }

  // Mixed form: d/dx[f^g] = f^g * (g' ln f + g f'/f)
  let df = differentiate_once(base, var, depth + 1)?;
  let dg = differentiate_once(exponent, var, depth + 1)?;
  Ok(Expr::mul(
    expr.clone(),
    Expr::add(
      Expr::mul(dg, Expr::call("ln", vec![base.clone()])),
      Expr::mul(
        exponent.clone(),
        Expr::div(df, base.clone()),
      ),
    ),
  ))
}

/// Tabulated derivative of each builtin with respect to its argument.
fn builtin_derivative(
  name: &str,
  subscript: Option<&Expr>,
  u: &Expr,
) -> Option<Expr> {
  let u = u.clone();
  Some(match name {
    "sin" => Expr::call("cos", vec![u]),
    "cos" => Expr::neg(Expr::call("sin", vec![u])),
    "tan" => Expr::pow(Expr::call("sec", vec![u]), Expr::num(2.0)),
    "cot" => {
      Expr::neg(Expr::pow(Expr::call("csc", vec![u]), Expr::num(2.0)))
    }
    "sec" => Expr::mul(
      Expr::call("sec", vec![u.clone()]),
      Expr::call("tan", vec![u]),
    ),
    "csc" => Expr::neg(Expr::mul(
      Expr::call("csc", vec![u.clone()]),
      Expr::call("cot", vec![u]),
    )),

    "arcsin" => Expr::div(
      Expr::num(1.0),
      Expr::call(
        "sqrt",
        vec![Expr::sub(
          Expr::num(1.0),
          Expr::pow(u, Expr::num(2.0)),
        )],
      ),
    ),
    "arccos" => Expr::neg(Expr::div(
      Expr::num(1.0),
      Expr::call(
        "sqrt",
        vec![Expr::sub(
          Expr::num(1.0),
          Expr::pow(u, Expr::num(2.0)),
        )],
      ),
    )),
    "arctan" => Expr::div(
      Expr::num(1.0),
      Expr::add(Expr::num(1.0), Expr::pow(u, Expr::num(2.0))),
    ),
    "arccot" => Expr::neg(Expr::div(
      Expr::num(1.0),
      Expr::add(Expr::num(1.0), Expr::pow(u, Expr::num(2.0))),
    )),

    "sinh" => Expr::call("cosh", vec![u]),
    "cosh" => Expr::call("sinh", vec![u]),
    "tanh" => Expr::div(
      Expr::num(1.0),
      Expr::pow(Expr::call("cosh", vec![u]), Expr::num(2.0)),
    ),
    "coth" => Expr::neg(Expr::div(
      Expr::num(1.0),
      Expr::pow(Expr::call("sinh", vec![u]), Expr::num(2.0)),
    )),
    "arsinh" => Expr::div(
      Expr::num(1.0),
      Expr::call(
        "sqrt",
        vec![Expr::add(
          Expr::pow(u, Expr::num(2.0)),
          Expr::num(1.0),
        )],
      ),
    ),
    "arcosh" => Expr::div(
      Expr::num(1.0),
      Expr::call(
        "sqrt",
        vec![Expr::sub(
          Expr::pow(u, Expr::num(2.0)),
          Expr::num(1.0),
        )],
      ),
    ),
    "artanh" => Expr::div(
      Expr::num(1.0),
      Expr::sub(Expr::num(1.0), Expr::pow(u, Expr::num(2.0))),
    ),

    "ln" => Expr::div(Expr::num(1.0), u),
    "log" => {
      let base = match subscript {
        Some(base) => base.clone(),
        None => Expr::num(10.0),
      };
      Expr::div(
        Expr::num(1.0),
        Expr::mul(u, Expr::call("ln", vec![base])),
      )
    }
    "lg" => Expr::div(
      Expr::num(1.0),
      Expr::mul(u, Expr::call("ln", vec![Expr::num(2.0)])),
    ),
    "exp" => Expr::call("exp", vec![u]),
    "sqrt" => match subscript {
      // \sqrt[n]{u} is u^(1/n): derivative (1/n) u^(1/n - 1)
      Some(index) => {
        let n = index.as_number()?;
        Expr::mul(
          Expr::num(1.0 / n),
          Expr::pow(u, Expr::num(1.0 / n - 1.0)),
        )
      }
      None => Expr::div(
        Expr::num(1.0),
        Expr::mul(Expr::num(2.0), Expr::call("sqrt", vec![u])),
      ),
    },

    "abs" => Expr::call("sign", vec![u]),
    // Piecewise-constant builtins differentiate to zero almost everywhere.
    "sign" | "floor" | "ceil" | "round" | "trunc" => Expr::num(0.0),
    _ => return None,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::parse;

  fn diff(source: &str) -> Expr {
    differentiate(&parse(source).unwrap(), "x", 1).unwrap()
  }

  #[test]
  fn power_rule_on_cubes() {
    assert_eq!(
      diff("x^3"),
      Expr::mul(
        Expr::num(3.0),
        Expr::pow(Expr::var("x"), Expr::num(2.0))
      )
    );
  }

  #[test]
  fn other_variables_are_constants() {
    assert_eq!(diff("y"), Expr::num(0.0));
    assert_eq!(diff("\\pi"), Expr::num(0.0));
  }

  #[test]
  fn order_above_ten_is_rejected() {
    let expr = parse("x^2").unwrap();
    assert!(differentiate(&expr, "x", 11).is_err());
  }

  #[test]
  fn piecewise_guards_survive_differentiation() {
    let expr = parse(
      "\\begin{cases} x^2 & x \\ge 0 \\\\ -x & \\text{otherwise} \\end{cases}",
    )
    .unwrap();
    let derived = differentiate(&expr, "x", 1).unwrap();
    match derived {
      Expr::Piecewise(cases) => {
        assert_eq!(cases.len(), 2);
        assert!(cases[0].guard.is_some());
        assert!(cases[1].guard.is_none());
      }
      other => panic!("expected piecewise, got {:?}", other),
    }
  }

  #[test]
  fn unsupported_node_is_an_error() {
    let expr = parse("\\sum_{i=1}^{x} i").unwrap();
    assert!(differentiate(&expr, "x", 1).is_err());
  }
}
