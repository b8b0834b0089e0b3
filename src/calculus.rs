//! Symbolic calculus: differentiation, antiderivatives, and the numeric
//! fallback integrator.

pub mod derivative;
pub mod integral;
pub mod numeric;

pub use derivative::differentiate;
pub use integral::integrate;

use crate::syntax::Expr;

/// Constant with respect to `var`: the variable does not occur free.
pub fn is_constant_wrt(expr: &Expr, var: &str) -> bool {
  !expr.contains_variable(var)
}

/// Match `a*x + b` in `var`, returning the coefficient `a`. Plain `x`
/// matches with coefficient 1; the offset `b` is not needed by callers.
pub fn match_linear(expr: &Expr, var: &str) -> Option<Expr> {
  match expr {
    Expr::Variable(name) if name == var => Some(Expr::num(1.0)),
    Expr::Unary {
      op: crate::syntax::UnaryOperator::Neg,
      operand,
    } => match_linear(operand, var).map(Expr::neg),
    Expr::Binary { op, left, right } => {
      use crate::syntax::BinaryOperator::*;
      match op {
        Mul => {
          if is_constant_wrt(left, var) {
            if matches!(right.as_ref(), Expr::Variable(n) if n == var) {
              return Some(left.as_ref().clone());
            }
          }
          if is_constant_wrt(right, var) {
            if matches!(left.as_ref(), Expr::Variable(n) if n == var) {
              return Some(right.as_ref().clone());
            }
          }
          None
        }
        Add | Sub => {
          if is_constant_wrt(right, var) {
            return match_linear(left, var);
          }
          if is_constant_wrt(left, var) {
            let a = match_linear(right, var)?;
            return Some(if *op == Sub { Expr::neg(a) } else { a });
          }
          None
        }
        _ => None,
      }
    }
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn linear_match_extracts_the_coefficient() {
    let expr = Expr::add(
      Expr::mul(Expr::num(3.0), Expr::var("x")),
      Expr::num(2.0),
    );
    assert_eq!(match_linear(&expr, "x"), Some(Expr::num(3.0)));
    assert_eq!(match_linear(&Expr::var("x"), "x"), Some(Expr::num(1.0)));
    assert_eq!(match_linear(&Expr::var("y"), "x"), None);
  }
}
