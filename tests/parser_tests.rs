use texpr::{
  parse, parse_with, parse_with_diagnostics, tokenize, unparse, Bindings,
  CommandRegistry, Expr, ParserOptions, Value,
};

mod tokenizer {
  use super::*;

  #[test]
  fn positions_are_char_offsets() {
    let tokens = tokenize("1 + x").unwrap();
    let positions: Vec<usize> = tokens.iter().map(|t| t.pos).collect();
    assert_eq!(positions, vec![0, 2, 4]);
  }

  #[test]
  fn unrecognized_character_is_a_tokenize_error() {
    let err = tokenize("2 @ 3").unwrap_err();
    assert_eq!(err.position, 2);
    assert!(err.message.contains("unrecognized"));
  }

  #[test]
  fn unknown_command_carries_a_suggestion() {
    let err = tokenize("\\coss(x)").unwrap_err();
    assert_eq!(err.suggestion.as_deref(), Some("\\cos"));
  }

  #[test]
  fn spacing_commands_are_consumed_silently() {
    let tokens = tokenize("1 \\, \\; \\quad 2").unwrap();
    assert_eq!(tokens.len(), 2);
  }
}

mod precedence {
  use super::*;

  #[test]
  fn multiplication_binds_tighter_than_addition() {
    assert_eq!(
      parse("2 + 3 \\cdot 4").unwrap(),
      Expr::add(
        Expr::num(2.0),
        Expr::mul(Expr::num(3.0), Expr::num(4.0))
      )
    );
  }

  #[test]
  fn unary_minus_binds_tighter_than_subtraction() {
    assert_eq!(
      parse("1 - -x").unwrap(),
      Expr::sub(Expr::num(1.0), Expr::neg(Expr::var("x")))
    );
  }

  #[test]
  fn implicit_multiplication_chains() {
    // 2xy = 2 * x * y
    assert_eq!(
      parse("2xy").unwrap(),
      Expr::mul(
        Expr::mul(Expr::num(2.0), Expr::var("x")),
        Expr::var("y")
      )
    );
  }

  #[test]
  fn implicit_multiplication_can_be_disabled() {
    let options = ParserOptions {
      implicit_multiplication: false,
      ..ParserOptions::default()
    };
    let expr =
      parse_with("speed", &CommandRegistry::builtin(), &options).unwrap();
    assert_eq!(expr, Expr::var("speed"));
  }

  #[test]
  fn absolute_value_bars_group() {
    assert_eq!(
      parse("|x - 3|").unwrap(),
      Expr::Abs(Box::new(Expr::sub(Expr::var("x"), Expr::num(3.0))))
    );
  }
}

mod environments {
  use super::*;

  #[test]
  fn matrix_environment_parses_rectangular_rows() {
    let expr =
      parse("\\begin{bmatrix} 1 & 2 \\\\ 3 & 4 \\end{bmatrix}").unwrap();
    match expr {
      Expr::Matrix(rows) => {
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 2);
      }
      other => panic!("expected matrix, got {:?}", other),
    }
  }

  #[test]
  fn single_column_matrix_is_a_vector_literal() {
    let expr =
      parse("\\begin{pmatrix} 1 \\\\ 2 \\\\ 3 \\end{pmatrix}").unwrap();
    match expr {
      Expr::Vector(items) => assert_eq!(items.len(), 3),
      other => panic!("expected vector, got {:?}", other),
    }
  }

  #[test]
  fn ragged_matrix_rows_are_rejected() {
    let err =
      parse("\\begin{bmatrix} 1 & 2 \\\\ 3 \\end{bmatrix}").unwrap_err();
    assert!(err.to_string().contains("unequal"));
  }

  #[test]
  fn environment_names_must_match() {
    let err =
      parse("\\begin{pmatrix} 1 \\end{bmatrix}").unwrap_err();
    assert!(err.to_string().contains("pmatrix"));
  }

  #[test]
  fn cases_guard_order_is_preserved() {
    let expr = parse(
      "\\begin{cases} 1 & x < 0 \\\\ 2 & \\text{otherwise} \\end{cases}",
    )
    .unwrap();
    match expr {
      Expr::Piecewise(cases) => {
        assert_eq!(cases.len(), 2);
        assert!(cases[0].guard.is_some());
        assert!(cases[1].guard.is_none());
      }
      other => panic!("expected piecewise, got {:?}", other),
    }
  }

  #[test]
  fn comma_condition_is_a_single_guarded_case() {
    let expr = parse("x^2, x > 0").unwrap();
    assert!(matches!(expr, Expr::Conditional { .. }));
  }
}

mod resource_bounds {
  use super::*;

  #[test]
  fn deeply_nested_exponents_hit_the_depth_guard() {
    let mut source = String::new();
    for _ in 0..700 {
      source.push_str("a^(");
    }
    source.push('b');
    for _ in 0..700 {
      source.push(')');
    }
    let err = parse(&source).unwrap_err();
    assert!(err.to_string().contains("recursion"));
  }

  #[test]
  fn a_lower_limit_can_be_configured() {
    let options = ParserOptions {
      max_recursion_depth: 30,
      ..ParserOptions::default()
    };
    let err = parse_with(
      "((((((((((x))))))))))",
      &CommandRegistry::builtin(),
      &options,
    )
    .unwrap_err();
    assert!(err.to_string().contains("recursion"));
  }
}

mod recovery {
  use super::*;

  #[test]
  fn recovery_mode_reports_more_than_one_problem() {
    let (expr, diagnostics) = parse_with_diagnostics(
      "] 1 + ] 2",
      &CommandRegistry::builtin(),
      &ParserOptions::default(),
    );
    assert!(expr.is_none());
    assert!(diagnostics.len() >= 2);
  }

  #[test]
  fn unclosed_group_suggests_the_closing_delimiter() {
    let err = parse("(1 + 2").unwrap_err();
    let text = format!("{:?}", err);
    assert!(text.contains("insert ')'"), "got: {}", text);
  }
}

mod round_trip {
  use super::*;

  fn bindings(x: f64) -> Bindings {
    let mut vars = Bindings::new();
    vars.insert("x".to_string(), Value::Real(x));
    vars
  }

  // parse(unparse(parse(s))) must evaluate identically to parse(s).
  #[test]
  fn rendering_and_reparsing_preserves_evaluation() {
    let sources = [
      "2 + 3 \\cdot 4",
      "x^2 + 2x + 1",
      "\\frac{x}{x + 1}",
      "\\sin(x) \\cos(x)",
      "|x - 3|",
      "\\sum_{i = 1}^{10} i^2",
      "\\sqrt{x^2 + 1}",
      "x^2, -5 < x < 5",
    ];
    for source in sources {
      let parsed = parse(source).unwrap();
      let reparsed = parse(&unparse(&parsed)).unwrap();
      for x in [-4.0, -0.5, 0.0, 1.0, 3.7] {
        let vars = bindings(x);
        let a = texpr::evaluate(&parsed, &vars).unwrap();
        let b = texpr::evaluate(&reparsed, &vars).unwrap();
        match (a, b) {
          (Value::Real(a), Value::Real(b)) => {
            assert!(
              (a.is_nan() && b.is_nan()) || (a - b).abs() < 1e-9,
              "{} diverged at x={}: {} vs {}",
              source,
              x,
              a,
              b
            );
          }
          (a, b) => assert_eq!(a, b, "{} diverged at x={}", source, x),
        }
      }
    }
  }
}
