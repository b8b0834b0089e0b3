use texpr::{
  are_equivalent, expand, factor, parse, simplify, EquivalenceLevel,
  Expr, Property, Simplifier,
};

fn parsed(source: &str) -> Expr {
  parse(source).unwrap()
}

mod simplification {
  use super::*;

  #[test]
  fn arithmetic_identities() {
    assert_eq!(simplify(&parsed("x + 0")), Expr::var("x"));
    assert_eq!(simplify(&parsed("1 \\cdot x")), Expr::var("x"));
    assert_eq!(simplify(&parsed("x^1")), Expr::var("x"));
    assert_eq!(simplify(&parsed("x^0")), Expr::num(1.0));
  }

  #[test]
  fn cancellation_is_structural() {
    assert_eq!(simplify(&parsed("x - x")), Expr::num(0.0));
    assert_eq!(
      simplify(&parsed("\\frac{\\sin(x)}{\\sin(x)}")),
      Expr::num(1.0)
    );
    // x/y does not cancel: the subtrees differ.
    assert_ne!(simplify(&parsed("\\frac{x}{y}")), Expr::num(1.0));
  }

  #[test]
  fn constant_folding_reaches_a_number() {
    assert_eq!(simplify(&parsed("2 + 3 \\cdot 4")), Expr::num(14.0));
    assert_eq!(simplify(&parsed("2^3 - 8")), Expr::num(0.0));
  }

  #[test]
  fn powers_combine() {
    assert_eq!(
      simplify(&parsed("x^2 \\cdot x^3")),
      Expr::pow(Expr::var("x"), Expr::num(5.0))
    );
    assert_eq!(
      simplify(&parsed("x \\cdot x")),
      Expr::pow(Expr::var("x"), Expr::num(2.0))
    );
  }

  #[test]
  fn pythagorean_identity() {
    assert_eq!(
      simplify(&parsed("\\sin(x)^2 + \\cos(x)^2")),
      Expr::num(1.0)
    );
    // Scaled pairs collapse to the shared coefficient.
    assert_eq!(
      simplify(&parsed("3\\sin(x)^2 + 3\\cos(x)^2")),
      Expr::num(3.0)
    );
  }

  #[test]
  fn double_angle_identity() {
    assert_eq!(
      simplify(&parsed("2 \\sin(x) \\cos(x)")),
      Expr::call("sin", vec![Expr::mul(Expr::num(2.0), Expr::var("x"))])
    );
  }

  #[test]
  fn logarithmic_identities() {
    assert_eq!(simplify(&parsed("\\ln(1)")), Expr::num(0.0));
    assert_eq!(simplify(&parsed("\\ln(e)")), Expr::num(1.0));
    assert_eq!(simplify(&parsed("\\ln(e^x)")), Expr::var("x"));
    assert_eq!(simplify(&parsed("e^{\\ln(x)}")), Expr::var("x"));
  }

  #[test]
  fn simplification_terminates_on_rule_churn() {
    // ln a + ln b <-> ln(ab) could ping-pong with an expansion rule; the
    // pass cap guarantees this returns.
    let expr = parsed("\\ln(x) + \\ln(y) + \\ln(z)");
    let _ = simplify(&expr);
  }
}

mod assumptions {
  use super::*;

  #[test]
  fn sqrt_of_square_defaults_to_absolute_value() {
    assert_eq!(
      simplify(&parsed("\\sqrt{x^2}")),
      Expr::Abs(Box::new(Expr::var("x")))
    );
  }

  #[test]
  fn nonnegative_assumption_drops_the_bars() {
    let mut simplifier = Simplifier::new();
    simplifier.assume("x", Property::NonNegative);
    assert_eq!(
      simplifier.simplify(&parsed("\\sqrt{x^2}")),
      Expr::var("x")
    );
    assert_eq!(simplifier.simplify(&parsed("|x|")), Expr::var("x"));
  }
}

mod polynomial_operations {
  use super::*;

  #[test]
  fn binomial_square_expands() {
    let expanded = expand(&parsed("(a + b)^2"));
    assert!(are_equivalent(
      &expanded,
      &parsed("a^2 + 2ab + b^2"),
      EquivalenceLevel::Numeric
    ));
  }

  #[test]
  fn binomial_cube_with_subtraction() {
    let expanded = expand(&parsed("(a - b)^3"));
    assert!(are_equivalent(
      &expanded,
      &parsed("a^3 - 3a^2 b + 3ab^2 - b^3"),
      EquivalenceLevel::Numeric
    ));
  }

  #[test]
  fn distribution_over_sums() {
    let expanded = expand(&parsed("x(y + z)"));
    assert!(are_equivalent(
      &expanded,
      &parsed("xy + xz"),
      EquivalenceLevel::Numeric
    ));
  }

  #[test]
  fn difference_of_squares_factors() {
    let factored = factor(&parsed("x^2 - 16"));
    assert!(are_equivalent(
      &factored,
      &parsed("(x - 4)(x + 4)"),
      EquivalenceLevel::Numeric
    ));
  }

  #[test]
  fn quadratic_with_integer_roots_factors() {
    let factored = factor(&parsed("x^2 - x - 6"));
    assert!(are_equivalent(
      &factored,
      &parsed("(x - 3)(x + 2)"),
      EquivalenceLevel::Numeric
    ));
  }
}

mod equivalence_levels {
  use super::*;

  #[test]
  fn structural_is_exact_tree_equality() {
    assert!(are_equivalent(
      &parsed("x + y"),
      &parsed("x + y"),
      EquivalenceLevel::Structural
    ));
    assert!(!are_equivalent(
      &parsed("x + y"),
      &parsed("y + x"),
      EquivalenceLevel::Structural
    ));
  }

  #[test]
  fn algebraic_normalizes_commutativity() {
    assert!(are_equivalent(
      &parsed("x + y"),
      &parsed("y + x"),
      EquivalenceLevel::Algebraic
    ));
    assert!(are_equivalent(
      &parsed("2 \\cdot x \\cdot 3"),
      &parsed("6x"),
      EquivalenceLevel::Algebraic
    ));
  }

  #[test]
  fn numeric_identities_from_the_textbook() {
    assert!(are_equivalent(
      &parsed("\\sin(2x)"),
      &parsed("2\\sin(x)\\cos(x)"),
      EquivalenceLevel::Numeric
    ));
    assert!(are_equivalent(
      &parsed("(a + b)^2"),
      &parsed("a^2 + 2ab + b^2"),
      EquivalenceLevel::Numeric
    ));
  }

  #[test]
  fn numeric_rejects_genuinely_different_expressions() {
    assert!(!are_equivalent(
      &parsed("\\sin(x)"),
      &parsed("\\cos(x)"),
      EquivalenceLevel::Numeric
    ));
  }

  #[test]
  fn levels_are_monotonic() {
    let pairs = [
      ("x + 1", "x + 1"),
      ("x \\cdot y", "y \\cdot x"),
      ("\\sin(x)^2 + \\cos(x)^2", "1"),
    ];
    for (a, b) in pairs {
      let a = parsed(a);
      let b = parsed(b);
      if are_equivalent(&a, &b, EquivalenceLevel::Structural) {
        assert!(are_equivalent(&a, &b, EquivalenceLevel::Algebraic));
      }
      if are_equivalent(&a, &b, EquivalenceLevel::Algebraic) {
        assert!(are_equivalent(&a, &b, EquivalenceLevel::Numeric));
      }
    }
  }
}
