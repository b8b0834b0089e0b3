use texpr::{
  differentiate, evaluate, integrate, parse, unparse, Bindings, Expr, Value,
};

fn eval_at(expr: &Expr, var: &str, x: f64) -> f64 {
  let mut vars = Bindings::new();
  vars.insert(var.to_string(), Value::Real(x));
  evaluate(expr, &vars).unwrap().as_real().unwrap()
}

mod derivatives {
  use super::*;

  /// d/dx at a point must match the central finite difference of the
  /// original function within 1e-5.
  fn check_against_finite_difference(source: &str, at: f64) {
    let f = parse(source).unwrap();
    let df = differentiate(&f, "x", 1).unwrap();
    let h = 1e-6;
    let numeric =
      (eval_at(&f, "x", at + h) - eval_at(&f, "x", at - h)) / (2.0 * h);
    let symbolic = eval_at(&df, "x", at);
    assert!(
      (numeric - symbolic).abs() < 1e-5,
      "{} at {}: finite difference {} vs derivative {}",
      source,
      at,
      numeric,
      symbolic
    );
  }

  #[test]
  fn cube_at_two_is_twelve() {
    let df = differentiate(&parse("x^3").unwrap(), "x", 1).unwrap();
    assert!((eval_at(&df, "x", 2.0) - 12.0).abs() < 1e-12);
  }

  #[test]
  fn smooth_functions_match_finite_differences() {
    check_against_finite_difference("x^3", 2.0);
    check_against_finite_difference("\\sin(x)", 0.7);
    check_against_finite_difference("\\cos(2x)", 1.3);
    check_against_finite_difference("e^x", 0.5);
    check_against_finite_difference("\\ln(x)", 3.0);
    check_against_finite_difference("\\frac{x}{x^2 + 1}", 0.4);
    check_against_finite_difference("x \\cdot \\sin(x)", 1.1);
    check_against_finite_difference("\\sqrt{x^2 + 1}", 0.9);
    check_against_finite_difference("2^x", 1.5);
    check_against_finite_difference("x^x", 1.2);
    check_against_finite_difference("\\tanh(x)", 0.3);
    check_against_finite_difference("\\arctan(x)", 0.8);
  }

  #[test]
  fn reference_scenario_derivative_at_zero() {
    // d/dx(x^3 + sin x) at 0 = 1
    let expr = parse("\\frac{d}{dx}(x^3 + \\sin(x))").unwrap();
    let mut vars = Bindings::new();
    vars.insert("x".to_string(), Value::Real(0.0));
    assert_eq!(evaluate(&expr, &vars).unwrap(), Value::Real(1.0));
  }

  #[test]
  fn higher_order_via_the_frac_head() {
    // d^2/dx^2 (x^4) = 12 x^2
    let expr = parse("\\frac{d^2}{dx^2}(x^4)").unwrap();
    let mut vars = Bindings::new();
    vars.insert("x".to_string(), Value::Real(1.0));
    assert_eq!(evaluate(&expr, &vars).unwrap(), Value::Real(12.0));
  }

  #[test]
  fn absolute_value_differentiates_through_sign() {
    let df = differentiate(&parse("|x|").unwrap(), "x", 1).unwrap();
    assert_eq!(eval_at(&df, "x", 3.0), 1.0);
    assert_eq!(eval_at(&df, "x", -3.0), -1.0);
  }

  #[test]
  fn product_rule() {
    let df =
      differentiate(&parse("x^2 \\sin(x)").unwrap(), "x", 1).unwrap();
    // 2x sin x + x^2 cos x at x=1
    let expected = 2.0 * 1.0_f64.sin() + 1.0_f64.cos();
    assert!((eval_at(&df, "x", 1.0) - expected).abs() < 1e-12);
  }

  #[test]
  fn quotient_rule() {
    let df =
      differentiate(&parse("\\frac{1}{x}").unwrap(), "x", 1).unwrap();
    assert!((eval_at(&df, "x", 2.0) + 0.25).abs() < 1e-12);
  }

  #[test]
  fn piecewise_differentiates_casewise() {
    let f = parse(
      "\\begin{cases} x^2 & x \\ge 0 \\\\ -x^2 & \\text{otherwise} \\end{cases}",
    )
    .unwrap();
    let df = differentiate(&f, "x", 1).unwrap();
    assert!((eval_at(&df, "x", 2.0) - 4.0).abs() < 1e-12);
    assert!((eval_at(&df, "x", -2.0) - 4.0).abs() < 1e-12);
  }

  #[test]
  fn order_is_bounded_at_ten() {
    assert!(differentiate(&parse("x^2").unwrap(), "x", 11).is_err());
  }

  #[test]
  fn unsupported_nodes_raise() {
    let sum = parse("\\sum_{i = 1}^{x} i").unwrap();
    assert!(differentiate(&sum, "x", 1).is_err());
  }

  #[test]
  fn cleanup_keeps_results_readable() {
    let df = differentiate(&parse("x + 0 \\cdot x").unwrap(), "x", 1)
      .unwrap();
    assert_eq!(df, Expr::num(1.0));
  }
}

mod integrals {
  use super::*;

  fn antiderivative_matches(source: &str, lo: f64, hi: f64, expected: f64) {
    let f = parse(source).unwrap();
    let anti = integrate(&f, "x");
    assert!(
      !matches!(anti, Expr::Integral { .. }),
      "{} unexpectedly unresolved",
      source
    );
    let value = eval_at(&anti, "x", hi) - eval_at(&anti, "x", lo);
    assert!(
      (value - expected).abs() < 1e-9,
      "{}: got {}, expected {}",
      source,
      value,
      expected
    );
  }

  #[test]
  fn power_rule_family() {
    antiderivative_matches("x^2", 0.0, 1.0, 1.0 / 3.0);
    antiderivative_matches("x", 0.0, 2.0, 2.0);
    antiderivative_matches("7", 0.0, 3.0, 21.0);
  }

  #[test]
  fn reciprocal_gives_log_of_absolute_value() {
    // Also valid on the negative axis thanks to ln|x|.
    antiderivative_matches("x^{-1}", -4.0, -2.0, (2.0_f64 / 4.0).ln());
    let anti = integrate(&parse("x^{-1}").unwrap(), "x");
    assert_eq!(unparse(&anti), "\\ln(|x|)");
  }

  #[test]
  fn linear_argument_forms() {
    antiderivative_matches(
      "\\sin(2x)",
      0.0,
      std::f64::consts::PI / 2.0,
      1.0,
    );
    antiderivative_matches("e^{3x}", 0.0, 1.0, (3.0_f64.exp() - 1.0) / 3.0);
    antiderivative_matches(
      "\\cos(3x + 1)",
      0.0,
      0.5,
      ((2.5_f64).sin() - (1.0_f64).sin()) / 3.0,
    );
  }

  #[test]
  fn linearity_distributes_over_sums() {
    antiderivative_matches("x^2 + \\sin(x)", 0.0, 1.0, {
      1.0 / 3.0 + (1.0 - (1.0_f64).cos())
    });
  }

  #[test]
  fn constant_factors_extract() {
    antiderivative_matches("5 \\cos(x)", 0.0, 1.0, 5.0 * (1.0_f64).sin());
  }

  #[test]
  fn piecewise_integrates_casewise() {
    let f = parse(
      "\\begin{cases} x & x \\ge 0 \\\\ 0 & \\text{otherwise} \\end{cases}",
    )
    .unwrap();
    let anti = integrate(&f, "x");
    match anti {
      Expr::Piecewise(cases) => assert_eq!(cases.len(), 2),
      other => panic!("expected piecewise antiderivative, got {:?}", other),
    }
  }

  #[test]
  fn derivative_of_antiderivative_is_the_integrand() {
    for source in ["x^3", "\\cos(2x)", "e^x"] {
      let f = parse(source).unwrap();
      let anti = integrate(&f, "x");
      let back = differentiate(&anti, "x", 1).unwrap();
      for x in [0.5, 1.0, 2.3] {
        assert!(
          (eval_at(&back, "x", x) - eval_at(&f, "x", x)).abs() < 1e-9,
          "{} at {}",
          source,
          x
        );
      }
    }
  }

  #[test]
  fn unmatched_integrands_stay_symbolic() {
    let f = parse("\\sin(x) \\cos(x^3)").unwrap();
    assert!(matches!(integrate(&f, "x"), Expr::Integral { .. }));
  }
}
