//! Antiderivative construction.
//!
//! Linearity and constant-factor extraction come first, then the pattern
//! rules: pure powers (with `n = -1` routed to `ln|x|`), the `e^x` base
//! case, and linear-argument trigonometric/exponential forms. Anything
//! without a rule becomes an explicit unresolved-integral node; turning
//! that node into a number is the numeric collaborator's job.

use crate::calculus::{is_constant_wrt, match_linear};
use crate::symbolic::rules::cleanup;
use crate::syntax::{BinaryOperator, Expr, PiecewiseCase, UnaryOperator};

/// Integrate `expr` with respect to `var`. Always returns an expression:
/// either a closed-form antiderivative or an unresolved `Integral` node
/// wrapping the input.
pub fn integrate(expr: &Expr, var: &str) -> Expr {
  match antiderivative(expr, var) {
    Some(anti) => cleanup(&anti),
    None => Expr::Integral {
      var: var.to_string(),
      lower: None,
      upper: None,
      body: Box::new(expr.clone()),
    },
  }
}

/// The rule-based core: `Some(F)` with `F' = expr`, or `None` when no
/// rule matches.
pub fn antiderivative(expr: &Expr, var: &str) -> Option<Expr> {
  let x = || Expr::var(var);
  match expr {
    // ∫ c dx = c*x
    Expr::Number(n) => Some(Expr::mul(Expr::num(*n), x())),
    Expr::Variable(name) => {
      if name == var {
        // ∫ x dx = x^2/2
        Some(Expr::div(
          Expr::pow(x(), Expr::num(2.0)),
          Expr::num(2.0),
        ))
      } else {
        Some(Expr::mul(Expr::var(name), x()))
      }
    }

    Expr::Unary {
      op: UnaryOperator::Neg,
      operand,
    } => Some(Expr::neg(antiderivative(operand, var)?)),

    Expr::Binary { op, left, right } => {
      use BinaryOperator::*;
      match op {
        // Linearity: ∫ (a ± b) = ∫a ± ∫b
        Add | Sub => {
          let ia = antiderivative(left, var)?;
          let ib = antiderivative(right, var)?;
          Some(Expr::binary(*op, ia, ib))
        }
        // Constant-factor extraction.
        Mul | CrossMul => {
          if is_constant_wrt(left, var) {
            let ib = antiderivative(right, var)?;
            return Some(Expr::mul(left.as_ref().clone(), ib));
          }
          if is_constant_wrt(right, var) {
            let ia = antiderivative(left, var)?;
            return Some(Expr::mul(ia, right.as_ref().clone()));
          }
          None
        }
        Div => {
          // ∫ f/c = (∫f)/c
          if is_constant_wrt(right, var) {
            let ia = antiderivative(left, var)?;
            return Some(Expr::div(ia, right.as_ref().clone()));
          }
          // ∫ c/(ax+b) = (c/a) ln|ax+b|
          if is_constant_wrt(left, var) {
            let a = match_linear(right, var)?;
            return Some(Expr::mul(
              Expr::div(left.as_ref().clone(), a),
              Expr::call(
                "ln",
                vec![Expr::Abs(Box::new(right.as_ref().clone()))],
              ),
            ));
          }
          None
        }
        Pow => antiderivative_power(left, right, var),
        And | Or => None,
      }
    }

    // Linear-argument forms via coefficient extraction.
    Expr::Call {
      name,
      args,
      subscript: None,
    } if args.len() == 1 => {
      let a = match_linear(&args[0], var)?;
      let u = args[0].clone();
      match name.as_str() {
        // ∫ sin(ax+b) = -cos(ax+b)/a
        "sin" => Some(Expr::div(
          Expr::neg(Expr::call("cos", vec![u])),
          a,
        )),
        // ∫ cos(ax+b) = sin(ax+b)/a
        "cos" => Some(Expr::div(Expr::call("sin", vec![u]), a)),
        // ∫ e^(ax+b) = e^(ax+b)/a
        "exp" => Some(Expr::div(Expr::call("exp", vec![u]), a)),
        _ => None,
      }
    }

    // Case-wise with guards preserved.
    Expr::Conditional { value, condition } => Some(Expr::Conditional {
      value: Box::new(antiderivative(value, var)?),
      condition: condition.clone(),
    }),
    Expr::Piecewise(cases) => {
      let mut integrated = Vec::with_capacity(cases.len());
      for case in cases {
        integrated.push(PiecewiseCase {
          value: antiderivative(&case.value, var)?,
          guard: case.guard.clone(),
        });
      }
      Some(Expr::Piecewise(integrated))
    }

    _ => None,
  }
}

fn antiderivative_power(
  base: &Expr,
  exponent: &Expr,
  var: &str,
) -> Option<Expr> {
  // e^(ax+b) written with the `e` constant.
  if matches!(base, Expr::Variable(name) if name == "e") {
    let a = match_linear(exponent, var)?;
    return Some(Expr::div(
      Expr::pow(Expr::var("e"), exponent.clone()),
      a,
    ));
  }

  // Pure powers of the variable itself.
  if matches!(base, Expr::Variable(name) if name == var) {
    let n = exponent.as_number()?;
    if n == -1.0 {
      // ∫ x^-1 = ln|x|
      return Some(Expr::call(
        "ln",
        vec![Expr::Abs(Box::new(Expr::var(var)))],
      ));
    }
    // ∫ x^n = x^(n+1)/(n+1)
    return Some(Expr::div(
      Expr::pow(Expr::var(var), Expr::num(n + 1.0)),
      Expr::num(n + 1.0),
    ));
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::parse;

  fn integ(source: &str) -> Expr {
    integrate(&parse(source).unwrap(), "x")
  }

  #[test]
  fn power_rule_with_shifted_exponent() {
    assert_eq!(
      integ("x^2"),
      Expr::div(
        Expr::pow(Expr::var("x"), Expr::num(3.0)),
        Expr::num(3.0)
      )
    );
  }

  #[test]
  fn reciprocal_routes_to_log_of_absolute_value() {
    assert_eq!(
      integ("x^{-1}"),
      Expr::call("ln", vec![Expr::Abs(Box::new(Expr::var("x")))])
    );
  }

  #[test]
  fn sine_of_linear_argument_divides_by_the_coefficient() {
    let result = integ("\\sin(2x)");
    // -cos(2x)/2
    assert_eq!(
      result,
      Expr::div(
        Expr::neg(Expr::call(
          "cos",
          vec![Expr::mul(Expr::num(2.0), Expr::var("x"))]
        )),
        Expr::num(2.0)
      )
    );
  }

  #[test]
  fn unmatched_integrand_becomes_an_unresolved_node() {
    let result = integ("\\sin(x^2)");
    match result {
      Expr::Integral {
        lower, upper, var, ..
      } => {
        assert!(lower.is_none());
        assert!(upper.is_none());
        assert_eq!(var, "x");
      }
      other => panic!("expected unresolved integral, got {:?}", other),
    }
  }
}
