use texpr::{eval_str, parse, Bindings, Complex, Value};

fn eval(source: &str) -> Value {
  eval_str(source, &Bindings::new()).unwrap()
}

fn eval_at(source: &str, var: &str, x: f64) -> Value {
  let mut vars = Bindings::new();
  vars.insert(var.to_string(), Value::Real(x));
  eval_str(source, &vars).unwrap()
}

fn real(value: &Value) -> f64 {
  value.as_real().unwrap()
}

mod arithmetic {
  use super::*;

  #[test]
  fn the_reference_scenario() {
    assert_eq!(eval("2 + 3 * 4"), Value::Real(14.0));
  }

  #[test]
  fn exponentiation_is_right_associative() {
    // 2^3^2 = 2^9
    assert_eq!(eval("2^3^2"), Value::Real(512.0));
  }

  #[test]
  fn constants_are_bound() {
    assert!((real(&eval("\\pi")) - std::f64::consts::PI).abs() < 1e-15);
    assert!((real(&eval("e")) - std::f64::consts::E).abs() < 1e-15);
  }

  #[test]
  fn factorial_postfix() {
    assert_eq!(eval("5!"), Value::Real(120.0));
  }

  #[test]
  fn binomial_coefficient() {
    assert_eq!(eval("\\binom{5}{2}"), Value::Real(10.0));
  }

  #[test]
  fn division_by_exact_zero_raises() {
    assert!(eval_str("1 / 0", &Bindings::new()).is_err());
  }

  #[test]
  fn overflow_to_infinity_is_not_an_error() {
    assert_eq!(
      eval("10^{400}"),
      Value::Real(f64::INFINITY)
    );
  }
}

mod complex_domain {
  use super::*;

  #[test]
  fn sqrt_of_negative_real_promotes() {
    assert_eq!(eval("\\sqrt{-4}"), Value::Complex(Complex::new(0.0, 2.0)));
  }

  #[test]
  fn ln_of_negative_real_promotes() {
    match eval("\\ln(-1)") {
      Value::Complex(c) => {
        assert!(c.re.abs() < 1e-12);
        assert!((c.im - std::f64::consts::PI).abs() < 1e-12);
      }
      other => panic!("expected complex, got {:?}", other),
    }
  }

  #[test]
  fn i_squared_is_minus_one() {
    assert_eq!(eval("i^2"), Value::Real(-1.0));
  }

  #[test]
  fn complex_arithmetic_mixes_with_reals() {
    // (3 + 2i) * i = -2 + 3i
    match eval("(3 + 2i) \\cdot i") {
      Value::Complex(c) => {
        assert!((c.re + 2.0).abs() < 1e-12);
        assert!((c.im - 3.0).abs() < 1e-12);
      }
      other => panic!("expected complex, got {:?}", other),
    }
  }

  #[test]
  fn complex_accessors() {
    assert_eq!(eval("\\re(3 + 2i)"), Value::Real(3.0));
    assert_eq!(eval("\\im(3 + 2i)"), Value::Real(2.0));
  }
}

mod vector_domain {
  use super::*;

  const U: &str = "\\begin{pmatrix} 1 \\\\ 2 \\\\ 3 \\end{pmatrix}";
  const V: &str = "\\begin{pmatrix} 4 \\\\ 5 \\\\ 6 \\end{pmatrix}";

  #[test]
  fn star_is_the_dot_product() {
    assert_eq!(
      eval(&format!("{} \\cdot {}", U, V)),
      Value::Real(32.0)
    );
  }

  #[test]
  fn times_is_the_cross_product() {
    assert_eq!(
      eval(&format!("{} \\times {}", U, V)),
      Value::Vector(vec![-3.0, 6.0, -3.0])
    );
  }

  #[test]
  fn bars_take_the_euclidean_norm() {
    assert_eq!(
      eval("|\\begin{pmatrix} 3 \\\\ 4 \\end{pmatrix}|"),
      Value::Real(5.0)
    );
  }

  #[test]
  fn scalar_scales_componentwise() {
    assert_eq!(
      eval("2 \\cdot \\begin{pmatrix} 1 \\\\ 2 \\end{pmatrix}"),
      Value::Vector(vec![2.0, 4.0])
    );
  }
}

mod matrix_domain {
  use super::*;

  const M: &str = "\\begin{bmatrix} 4 & 7 \\\\ 2 & 6 \\end{bmatrix}";

  #[test]
  fn determinant_function() {
    assert_eq!(eval(&format!("\\det({})", M)), Value::Real(10.0));
  }

  #[test]
  fn transpose_by_t_exponent() {
    assert_eq!(
      eval("\\begin{bmatrix} 1 & 2 \\\\ 3 & 4 \\end{bmatrix}^T"),
      eval("\\begin{bmatrix} 1 & 3 \\\\ 2 & 4 \\end{bmatrix}")
    );
  }

  #[test]
  fn negative_one_exponent_inverts() {
    let product = eval(&format!("{} \\cdot {}^{{-1}}", M, M));
    let product = product.as_matrix().unwrap().clone();
    for r in 0..2 {
      for c in 0..2 {
        let expected = if r == c { 1.0 } else { 0.0 };
        assert!((product.get(r, c) - expected).abs() < 1e-12);
      }
    }
  }

  #[test]
  fn positive_integer_exponent_repeats_multiplication() {
    assert_eq!(
      eval("\\begin{bmatrix} 1 & 1 \\\\ 0 & 1 \\end{bmatrix}^3"),
      eval("\\begin{bmatrix} 1 & 3 \\\\ 0 & 1 \\end{bmatrix}")
    );
  }

  #[test]
  fn singular_matrix_inverse_raises() {
    assert!(eval_str(
      "\\begin{bmatrix} 1 & 2 \\\\ 2 & 4 \\end{bmatrix}^{-1}",
      &Bindings::new()
    )
    .is_err());
  }

  #[test]
  fn shape_mismatch_raises() {
    assert!(eval_str(
      "\\begin{bmatrix} 1 & 2 \\end{bmatrix} + \\begin{bmatrix} 1 & 2 & 3 \\end{bmatrix}",
      &Bindings::new()
    )
    .is_err());
  }
}

mod interval_domain {
  use super::*;

  #[test]
  fn interval_arithmetic_through_the_hook() {
    // Intervals reach the evaluator through bindings; there is no literal
    // surface syntax for them.
    let mut vars = Bindings::new();
    vars.insert(
      "a".to_string(),
      Value::Interval(texpr::Interval::new(1.0, 2.0)),
    );
    vars.insert(
      "b".to_string(),
      Value::Interval(texpr::Interval::new(3.0, 5.0)),
    );
    assert_eq!(
      eval_str("a + b", &vars).unwrap(),
      Value::Interval(texpr::Interval::new(4.0, 7.0))
    );
    assert_eq!(
      eval_str("a \\cdot b", &vars).unwrap(),
      Value::Interval(texpr::Interval::new(3.0, 10.0))
    );
  }

  #[test]
  fn division_by_interval_containing_zero_raises() {
    let mut vars = Bindings::new();
    vars.insert(
      "a".to_string(),
      Value::Interval(texpr::Interval::new(-1.0, 1.0)),
    );
    assert!(eval_str("2 / a", &vars).is_err());
  }
}

mod piecewise {
  use super::*;

  const GUARDED_STRICT: &str = "x^2, -5 < x < 5";
  const GUARDED_INCLUSIVE: &str = "x^2, -5 \\le x \\le 5";

  #[test]
  fn value_inside_the_domain() {
    assert_eq!(eval_at(GUARDED_STRICT, "x", 2.0), Value::Real(4.0));
  }

  #[test]
  fn outside_the_domain_is_nan_not_an_error() {
    let value = real(&eval_at(GUARDED_STRICT, "x", 10.0));
    assert!(value.is_nan());
  }

  #[test]
  fn strict_guard_excludes_the_boundary() {
    let value = real(&eval_at(GUARDED_STRICT, "x", -5.0));
    assert!(value.is_nan());
  }

  #[test]
  fn inclusive_guard_includes_the_boundary() {
    assert_eq!(eval_at(GUARDED_INCLUSIVE, "x", -5.0), Value::Real(25.0));
  }

  #[test]
  fn cases_resolve_in_listed_order() {
    let source = "\\begin{cases} 1 & x > 0 \\\\ 2 & x > 1 \\\\ 3 & \\text{otherwise} \\end{cases}";
    assert_eq!(eval_at(source, "x", 5.0), Value::Real(1.0));
    assert_eq!(eval_at(source, "x", -1.0), Value::Real(3.0));
  }

  #[test]
  fn no_matching_case_without_otherwise_is_nan() {
    let source = "\\begin{cases} 1 & x > 0 \\end{cases}";
    assert!(real(&eval_at(source, "x", -1.0)).is_nan());
  }
}

mod builtins {
  use super::*;

  #[test]
  fn trigonometry_round_numbers() {
    assert!((real(&eval("\\sin(\\pi)"))).abs() < 1e-12);
    assert!((real(&eval("\\cos(0)")) - 1.0).abs() < 1e-15);
  }

  #[test]
  fn log_with_subscript_base() {
    assert!((real(&eval("\\log_2(8)")) - 3.0).abs() < 1e-12);
  }

  #[test]
  fn nth_root_with_index() {
    assert!((real(&eval("\\sqrt[3]{27}")) - 3.0).abs() < 1e-12);
  }

  #[test]
  fn gcd_and_lcm_are_variadic() {
    assert_eq!(eval("\\gcd(12, 18, 24)"), Value::Real(6.0));
    assert_eq!(eval("\\lcm(4, 6)"), Value::Real(12.0));
  }

  #[test]
  fn min_max_mod() {
    assert_eq!(eval("\\min(3, 1, 2)"), Value::Real(1.0));
    assert_eq!(eval("\\max(3, 1, 2)"), Value::Real(3.0));
    assert_eq!(eval("\\mod(7, 3)"), Value::Real(1.0));
  }

  #[test]
  fn tight_application_without_parentheses() {
    assert!((real(&eval("\\sin \\pi"))).abs() < 1e-12);
  }

  #[test]
  fn inverse_by_exponent_notation() {
    // \sin^{-1} selects arcsin rather than 1/sin.
    assert!(
      (real(&eval("\\sin^{-1}(1)")) - std::f64::consts::FRAC_PI_2).abs()
        < 1e-12
    );
  }

  #[test]
  fn arcsin_domain_violation_raises() {
    assert!(eval_str("\\arcsin(2)", &Bindings::new()).is_err());
  }
}

mod iteration_forms {
  use super::*;

  #[test]
  fn summation_of_squares() {
    assert_eq!(eval("\\sum_{i = 1}^{10} i^2"), Value::Real(385.0));
  }

  #[test]
  fn product_of_first_factorial_terms() {
    assert_eq!(eval("\\prod_{k = 1}^{5} k"), Value::Real(120.0));
  }

  #[test]
  fn iteration_cap_raises() {
    let err = eval_str("\\sum_{i = 1}^{200000} i", &Bindings::new())
      .unwrap_err();
    assert!(err.to_string().contains("cap"));
  }

  #[test]
  fn summation_body_binds_multiplicatively() {
    // \sum i^2 + 3 = (Σ i^2) + 3
    assert_eq!(eval("\\sum_{i = 1}^{3} i^2 + 3"), Value::Real(17.0));
  }

  #[test]
  fn limit_by_direct_substitution() {
    assert_eq!(
      eval("\\lim_{x \\to 4} \\sqrt{x}"),
      Value::Real(2.0)
    );
  }

  #[test]
  fn limit_at_infinity_stabilizes() {
    let value = real(&eval(
      "\\lim_{x \\to \\infty} \\frac{2x + 1}{x}",
    ));
    assert!((value - 2.0).abs() < 1e-5);
  }

  #[test]
  fn definite_integral_with_closed_form() {
    let value = real(&eval("\\int_0^1 x^2 \\, dx"));
    assert!((value - 1.0 / 3.0).abs() < 1e-12);
  }

  #[test]
  fn definite_integral_falls_back_to_quadrature() {
    // No rule matches sin(x^2); Simpson's rule resolves it numerically.
    let value = real(&eval("\\int_0^1 \\sin(x^2) \\, dx"));
    assert!((value - 0.310268).abs() < 1e-4);
  }
}

mod diagnostics {
  use super::*;

  #[test]
  fn undefined_variable_names_itself() {
    let err = eval_str("y + 1", &Bindings::new()).unwrap_err();
    assert!(err.to_string().contains("y"));
  }

  #[test]
  fn boolean_and_arithmetic_do_not_mix() {
    assert!(eval_str("(1 < 2) + 3", &Bindings::new()).is_err());
  }

  #[test]
  fn evaluation_order_is_post_order() {
    // The left operand's error surfaces even though the right operand
    // would also fail: operands evaluate before the operator.
    let err = eval_str("\\arcsin(2) + \\ln(0)", &Bindings::new())
      .unwrap_err();
    assert!(err.to_string().contains("arcsin"));
  }

  #[test]
  fn function_hook_overrides_builtins() {
    let evaluator = texpr::Evaluator::default().with_function_hook(
      Box::new(|name, args| {
        if name == "sin" && args.len() == 1 {
          Some(Value::Real(42.0))
        } else {
          None
        }
      }),
    );
    let expr = parse("\\sin(0) + \\cos(0)").unwrap();
    let result = evaluator.evaluate(&expr, &Bindings::new()).unwrap();
    // sin overridden, cos falls through to the builtin.
    assert_eq!(result, Value::Real(43.0));
  }
}
