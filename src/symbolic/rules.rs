//! The rewrite rules.
//!
//! Rules are pure functions from an expression (plus the assumption store)
//! to an optional replacement. They are registered grouped by category, and
//! both the category sequence and the registration order within a category
//! are the application order.

use crate::symbolic::assumptions::Assumptions;
use crate::syntax::{map_children, BinaryOperator, Expr, UnaryOperator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleCategory {
  Arithmetic,
  Cancellation,
  Powers,
  Trig,
  Log,
  Roots,
}

pub struct RewriteRule {
  pub name: &'static str,
  pub category: RuleCategory,
  pub apply: fn(&Expr, &Assumptions) -> Option<Expr>,
}

pub struct RuleSet {
  rules: Vec<RewriteRule>,
}

impl Default for RuleSet {
  fn default() -> Self {
    Self::standard()
  }
}

impl RuleSet {
  pub fn standard() -> Self {
    use RuleCategory::*;
    let mut rules = Vec::new();
    let mut rule =
      |name: &'static str,
       category: RuleCategory,
       apply: fn(&Expr, &Assumptions) -> Option<Expr>| {
        rules.push(RewriteRule {
          name,
          category,
          apply,
        });
      };

    rule("fold-constants", Arithmetic, fold_constants);
    rule("fold-constant-chains", Arithmetic, fold_constant_chains);
    rule("add-zero", Arithmetic, add_zero);
    rule("sub-zero", Arithmetic, sub_zero);
    rule("mul-one", Arithmetic, mul_one);
    rule("mul-zero", Arithmetic, mul_zero);
    rule("div-one", Arithmetic, div_one);
    rule("zero-div", Arithmetic, zero_div);
    rule("pow-one", Arithmetic, pow_one);
    rule("pow-zero", Arithmetic, pow_zero);
    rule("one-pow", Arithmetic, one_pow);
    rule("double-negation", Arithmetic, double_negation);

    rule("sub-self", Cancellation, sub_self);
    rule("add-opposite", Cancellation, add_opposite);
    rule("div-self", Cancellation, div_self);
    rule("combine-like-terms", Cancellation, combine_like_terms);

    rule("mul-same-base", Powers, mul_same_base);
    rule("div-same-base", Powers, div_same_base);
    rule("pow-of-pow", Powers, pow_of_pow);

    rule("trig-at-zero", Trig, trig_at_zero);
    rule("trig-parity", Trig, trig_parity);
    rule("pythagorean", Trig, pythagorean);
    rule("double-angle", Trig, double_angle);

    rule("log-of-one", Log, log_of_one);
    rule("ln-of-e", Log, ln_of_e);
    rule("log-base-same", Log, log_base_same);
    rule("ln-exp-inverse", Log, ln_exp_inverse);
    rule("exp-ln-inverse", Log, exp_ln_inverse);
    rule("combine-logs", Log, combine_logs);

    rule("sqrt-of-square", Roots, sqrt_of_square);
    rule("abs-nonnegative", Roots, abs_nonnegative);
    rule("even-power-of-abs", Roots, even_power_of_abs);

    Self { rules }
  }

  pub fn rules(&self) -> &[RewriteRule] {
    &self.rules
  }
}

/// The readability pass used by the calculus engines: only the arithmetic
/// identities, applied bottom-up to a local fixed point. Deliberately not
/// the general simplifier.
pub fn cleanup(expr: &Expr) -> Expr {
  let rules = RuleSet::standard();
  let assumptions = Assumptions::new();
  let mut current = expr.clone();
  for _ in 0..10 {
    let next = cleanup_walk(&current, &rules, &assumptions);
    if next == current {
      break;
    }
    current = next;
  }
  current
}

fn cleanup_walk(
  expr: &Expr,
  rules: &RuleSet,
  assumptions: &Assumptions,
) -> Expr {
  let mut node =
    map_children(expr, &mut |child| cleanup_walk(child, rules, assumptions));
  for _ in 0..8 {
    let mut applied = false;
    for rule in rules.rules() {
      if rule.category != RuleCategory::Arithmetic {
        continue;
      }
      if let Some(next) = (rule.apply)(&node, assumptions) {
        node = next;
        applied = true;
        break;
      }
    }
    if !applied {
      break;
    }
  }
  node
}

// ─── Shared helpers ─────────────────────────────────────────────────────────

fn binary<'e>(
  expr: &'e Expr,
  op: BinaryOperator,
) -> Option<(&'e Expr, &'e Expr)> {
  match expr {
    Expr::Binary {
      op: node_op,
      left,
      right,
    } if *node_op == op => Some((left.as_ref(), right.as_ref())),
    _ => None,
  }
}

fn call1<'e>(expr: &'e Expr, name: &str) -> Option<&'e Expr> {
  match expr {
    Expr::Call {
      name: call_name,
      args,
      subscript: None,
    } if call_name == name && args.len() == 1 => Some(&args[0]),
    _ => None,
  }
}

fn negated(expr: &Expr) -> Option<Expr> {
  match expr {
    Expr::Unary {
      op: UnaryOperator::Neg,
      operand,
    } => Some(operand.as_ref().clone()),
    Expr::Binary {
      op: BinaryOperator::Mul,
      left,
      right,
    } if left.as_number() == Some(-1.0) => Some(right.as_ref().clone()),
    _ => None,
  }
}

/// Additive terms of a `+`/`-` chain, subtraction contributing negated
/// terms.
pub(crate) fn collect_additive_terms(expr: &Expr, terms: &mut Vec<Expr>) {
  match expr {
    Expr::Binary {
      op: BinaryOperator::Add,
      left,
      right,
    } => {
      collect_additive_terms(left, terms);
      collect_additive_terms(right, terms);
    }
    Expr::Binary {
      op: BinaryOperator::Sub,
      left,
      right,
    } => {
      collect_additive_terms(left, terms);
      terms.push(Expr::neg(right.as_ref().clone()));
    }
    other => terms.push(other.clone()),
  }
}

pub(crate) fn build_sum(mut terms: Vec<Expr>) -> Expr {
  let last = match terms.pop() {
    Some(last) => last,
    None => return Expr::num(0.0),
  };
  terms
    .into_iter()
    .rev()
    .fold(last, |acc, term| Expr::add(term, acc))
}

pub(crate) fn collect_factors(expr: &Expr, factors: &mut Vec<Expr>) {
  match expr {
    Expr::Binary {
      op: BinaryOperator::Mul,
      left,
      right,
    } => {
      collect_factors(left, factors);
      collect_factors(right, factors);
    }
    other => factors.push(other.clone()),
  }
}

pub(crate) fn build_product(mut factors: Vec<Expr>) -> Expr {
  let last = match factors.pop() {
    Some(last) => last,
    None => return Expr::num(1.0),
  };
  factors
    .into_iter()
    .rev()
    .fold(last, |acc, factor| Expr::mul(factor, acc))
}

// ─── Arithmetic ─────────────────────────────────────────────────────────────

fn fold_constants(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  match expr {
    Expr::Binary { op, left, right } => {
      let a = match left.as_ref() {
        Expr::Number(a) => *a,
        _ => return None,
      };
      let b = match right.as_ref() {
        Expr::Number(b) => *b,
        _ => return None,
      };
      let folded = match op {
        BinaryOperator::Add => a + b,
        BinaryOperator::Sub => a - b,
        BinaryOperator::Mul | BinaryOperator::CrossMul => a * b,
        // Division by an exact literal zero stays symbolic: it is the
        // evaluator's error to raise, not ours to hide.
        BinaryOperator::Div => {
          if b == 0.0 {
            return None;
          }
          a / b
        }
        BinaryOperator::Pow => a.powf(b),
        _ => return None,
      };
      if folded.is_nan() {
        return None;
      }
      Some(Expr::num(folded))
    }
    Expr::Unary {
      op: UnaryOperator::Neg,
      operand,
    } => match operand.as_ref() {
      Expr::Number(n) => Some(Expr::num(-n)),
      _ => None,
    },
    Expr::Abs(inner) => match inner.as_ref() {
      Expr::Number(n) => Some(Expr::num(n.abs())),
      _ => None,
    },
    _ => None,
  }
}

/// `c1 + (c2 + rest)` and `c1 * (c2 * rest)` fold their constants, which is
/// how literals meet across right-associated chains.
fn fold_constant_chains(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  for op in [BinaryOperator::Add, BinaryOperator::Mul] {
    if let Some((left, right)) = binary(expr, op) {
      if let Expr::Number(a) = left {
        if let Some((inner_left, rest)) = binary(right, op) {
          if let Expr::Number(b) = inner_left {
            let folded = match op {
              BinaryOperator::Add => a + b,
              _ => a * b,
            };
            return Some(Expr::binary(
              op,
              Expr::num(folded),
              rest.clone(),
            ));
          }
        }
      }
    }
  }
  None
}

fn add_zero(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  let (left, right) = binary(expr, BinaryOperator::Add)?;
  if left.is_zero() {
    return Some(right.clone());
  }
  if right.is_zero() {
    return Some(left.clone());
  }
  None
}

fn sub_zero(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  let (left, right) = binary(expr, BinaryOperator::Sub)?;
  if right.is_zero() {
    return Some(left.clone());
  }
  if left.is_zero() {
    return Some(Expr::neg(right.clone()));
  }
  None
}

fn mul_one(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  let (left, right) = binary(expr, BinaryOperator::Mul)?;
  if left.is_one() {
    return Some(right.clone());
  }
  if right.is_one() {
    return Some(left.clone());
  }
  None
}

fn mul_zero(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  let (left, right) = binary(expr, BinaryOperator::Mul)?;
  if left.is_zero() || right.is_zero() {
    return Some(Expr::num(0.0));
  }
  None
}

fn div_one(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  let (left, right) = binary(expr, BinaryOperator::Div)?;
  if right.is_one() {
    return Some(left.clone());
  }
  None
}

fn zero_div(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  let (left, right) = binary(expr, BinaryOperator::Div)?;
  if left.is_zero() {
    if let Expr::Number(n) = right {
      if *n != 0.0 {
        return Some(Expr::num(0.0));
      }
    }
  }
  None
}

fn pow_one(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  let (left, right) = binary(expr, BinaryOperator::Pow)?;
  if right.is_one() {
    return Some(left.clone());
  }
  None
}

fn pow_zero(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  let (_, right) = binary(expr, BinaryOperator::Pow)?;
  if right.is_zero() {
    return Some(Expr::num(1.0));
  }
  None
}

fn one_pow(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  let (left, _) = binary(expr, BinaryOperator::Pow)?;
  if left.is_one() {
    return Some(Expr::num(1.0));
  }
  None
}

fn double_negation(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  match expr {
    Expr::Unary {
      op: UnaryOperator::Neg,
      operand,
    } => match operand.as_ref() {
      Expr::Unary {
        op: UnaryOperator::Neg,
        operand: inner,
      } => Some(inner.as_ref().clone()),
      _ => None,
    },
    _ => None,
  }
}

// ─── Cancellation (structural equality, not value equality) ─────────────────

fn sub_self(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  let (left, right) = binary(expr, BinaryOperator::Sub)?;
  if left == right {
    Some(Expr::num(0.0))
  } else {
    None
  }
}

fn add_opposite(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  let (left, right) = binary(expr, BinaryOperator::Add)?;
  if let Some(positive) = negated(right) {
    if positive == *left {
      return Some(Expr::num(0.0));
    }
    // Chain form: x + (-x + rest) => rest
    if let Some((inner_left, rest)) = binary(right, BinaryOperator::Add) {
      if let Some(positive) = negated(inner_left) {
        if positive == *left {
          return Some(rest.clone());
        }
      }
    }
  }
  if let Some(positive) = negated(left) {
    if positive == *right {
      return Some(Expr::num(0.0));
    }
  }
  None
}

fn div_self(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  let (left, right) = binary(expr, BinaryOperator::Div)?;
  if left == right && !left.is_zero() {
    Some(Expr::num(1.0))
  } else {
    None
  }
}

/// `(c1 x) + (c2 x) => (c1+c2) x`, including the bare and chained forms.
fn combine_like_terms(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  let (left, right) = binary(expr, BinaryOperator::Add)?;
  if let Some(combined) = combine_pair(left, right) {
    return Some(combined);
  }
  // Chain form: a + (b + rest)
  if let Some((inner_left, rest)) = binary(right, BinaryOperator::Add) {
    if let Some(combined) = combine_pair(left, inner_left) {
      return Some(Expr::add(combined, rest.clone()));
    }
  }
  None
}

fn term_coefficient(expr: &Expr) -> (f64, Expr) {
  if let Some((left, right)) = binary(expr, BinaryOperator::Mul) {
    if let Expr::Number(c) = left {
      return (*c, right.clone());
    }
    if let Expr::Number(c) = right {
      return (*c, left.clone());
    }
  }
  if let Some(positive) = negated(expr) {
    let (c, core) = term_coefficient(&positive);
    return (-c, core);
  }
  (1.0, expr.clone())
}

fn combine_pair(a: &Expr, b: &Expr) -> Option<Expr> {
  let (ca, core_a) = term_coefficient(a);
  let (cb, core_b) = term_coefficient(b);
  if matches!(core_a, Expr::Number(_)) || core_a != core_b {
    return None;
  }
  let coefficient = ca + cb;
  Some(if coefficient == 0.0 {
    Expr::num(0.0)
  } else if coefficient == 1.0 {
    core_a
  } else {
    Expr::mul(Expr::num(coefficient), core_a)
  })
}

// ─── Powers ─────────────────────────────────────────────────────────────────

fn power_parts(expr: &Expr) -> (Expr, Expr) {
  match binary(expr, BinaryOperator::Pow) {
    Some((base, exponent)) => (base.clone(), exponent.clone()),
    None => (expr.clone(), Expr::num(1.0)),
  }
}

fn combine_base_pair(a: &Expr, b: &Expr) -> Option<Expr> {
  // Plain numbers are left to constant folding.
  if matches!(a, Expr::Number(_)) || matches!(b, Expr::Number(_)) {
    return None;
  }
  let (base_a, exp_a) = power_parts(a);
  let (base_b, exp_b) = power_parts(b);
  if base_a != base_b {
    return None;
  }
  Some(Expr::pow(base_a, cleanup(&Expr::add(exp_a, exp_b))))
}

fn mul_same_base(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  let (left, right) = binary(expr, BinaryOperator::Mul)?;
  if let Some(combined) = combine_base_pair(left, right) {
    return Some(combined);
  }
  // Chain form: a * (b * rest)
  if let Some((inner_left, rest)) = binary(right, BinaryOperator::Mul) {
    if let Some(combined) = combine_base_pair(left, inner_left) {
      return Some(Expr::mul(combined, rest.clone()));
    }
  }
  None
}

fn div_same_base(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  let (left, right) = binary(expr, BinaryOperator::Div)?;
  if matches!(left, Expr::Number(_)) || matches!(right, Expr::Number(_)) {
    return None;
  }
  let (base_l, exp_l) = power_parts(left);
  let (base_r, exp_r) = power_parts(right);
  if base_l != base_r {
    return None;
  }
  Some(Expr::pow(base_l, cleanup(&Expr::sub(exp_l, exp_r))))
}

fn pow_of_pow(expr: &Expr, assumptions: &Assumptions) -> Option<Expr> {
  let (base, outer) = binary(expr, BinaryOperator::Pow)?;
  let (inner_base, inner) = binary(base, BinaryOperator::Pow)?;
  // `(x^a)^b = x^(a b)` needs an integer outer exponent or a base with a
  // known sign; `(x^2)^0.5` is |x|, not x.
  let outer_integer = matches!(outer.as_number(), Some(n) if n.fract() == 0.0);
  if !outer_integer && !assumptions.is_nonnegative(inner_base) {
    return None;
  }
  Some(Expr::pow(
    inner_base.clone(),
    cleanup(&Expr::mul(inner.clone(), outer.clone())),
  ))
}

// ─── Trigonometric identities ───────────────────────────────────────────────

fn trig_at_zero(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  for (name, at_zero) in
    [("sin", 0.0), ("cos", 1.0), ("tan", 0.0)]
  {
    if let Some(arg) = call1(expr, name) {
      if arg.is_zero() {
        return Some(Expr::num(at_zero));
      }
    }
  }
  None
}

fn trig_parity(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  // sin and tan are odd, cos is even.
  for name in ["sin", "tan"] {
    if let Some(arg) = call1(expr, name) {
      if let Some(positive) = negated(arg) {
        return Some(Expr::neg(Expr::call(name, vec![positive])));
      }
    }
  }
  if let Some(arg) = call1(expr, "cos") {
    if let Some(positive) = negated(arg) {
      return Some(Expr::call("cos", vec![positive]));
    }
  }
  None
}

/// `sin(u)^2`/`cos(u)^2`, possibly scaled, extracted from one additive
/// term.
fn extract_trig_squared(term: &Expr) -> Option<(Expr, Expr, bool)> {
  if let Some((name, arg)) = match_trig_squared(term) {
    return Some((Expr::num(1.0), arg, name == "sin"));
  }
  let mut factors = Vec::new();
  collect_factors(term, &mut factors);
  if factors.len() < 2 {
    return None;
  }
  for (idx, factor) in factors.iter().enumerate() {
    if let Some((name, arg)) = match_trig_squared(factor) {
      let mut rest: Vec<Expr> = Vec::new();
      for (j, other) in factors.iter().enumerate() {
        if j != idx {
          rest.push(other.clone());
        }
      }
      let coefficient = if rest.len() == 1 {
        rest.remove(0)
      } else {
        build_product(rest)
      };
      return Some((coefficient, arg, name == "sin"));
    }
  }
  None
}

fn match_trig_squared(expr: &Expr) -> Option<(&'static str, Expr)> {
  let (base, exponent) = binary(expr, BinaryOperator::Pow)?;
  if exponent.as_number() != Some(2.0) {
    return None;
  }
  for name in ["sin", "cos"] {
    if let Some(arg) = call1(base, name) {
      return Some((name, arg.clone()));
    }
  }
  None
}

/// `c sin(u)^2 + c cos(u)^2 => c`, scanning every pair of additive terms.
fn pythagorean(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  if binary(expr, BinaryOperator::Add).is_none() {
    return None;
  }
  let mut terms = Vec::new();
  collect_additive_terms(expr, &mut terms);
  if terms.len() < 2 {
    return None;
  }

  let mut used = vec![false; terms.len()];
  let mut result: Vec<Expr> = Vec::new();
  let mut rewrote = false;
  for i in 0..terms.len() {
    if used[i] {
      continue;
    }
    if let Some((coeff_i, arg_i, is_sin_i)) = extract_trig_squared(&terms[i])
    {
      let mut matched = false;
      for j in (i + 1)..terms.len() {
        if used[j] {
          continue;
        }
        if let Some((coeff_j, arg_j, is_sin_j)) =
          extract_trig_squared(&terms[j])
        {
          if is_sin_i != is_sin_j && arg_i == arg_j && coeff_i == coeff_j {
            result.push(coeff_i.clone());
            used[i] = true;
            used[j] = true;
            matched = true;
            rewrote = true;
            break;
          }
        }
      }
      if matched {
        continue;
      }
    }
    result.push(terms[i].clone());
    used[i] = true;
  }

  if rewrote {
    Some(build_sum(result))
  } else {
    None
  }
}

/// `sin(u) cos(u)` inside a product becomes `sin(2u)/2`; with a factor 2
/// present, constant folding finishes the job.
fn double_angle(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  if binary(expr, BinaryOperator::Mul).is_none() {
    return None;
  }
  let mut factors = Vec::new();
  collect_factors(expr, &mut factors);
  if factors.len() < 2 {
    return None;
  }

  let mut sin_at: Option<(usize, Expr)> = None;
  let mut cos_at: Option<(usize, Expr)> = None;
  for (idx, factor) in factors.iter().enumerate() {
    if sin_at.is_none() {
      if let Some(arg) = call1(factor, "sin") {
        sin_at = Some((idx, arg.clone()));
        continue;
      }
    }
    if cos_at.is_none() {
      if let Some(arg) = call1(factor, "cos") {
        cos_at = Some((idx, arg.clone()));
      }
    }
  }
  let (sin_idx, sin_arg) = sin_at?;
  let (cos_idx, cos_arg) = cos_at?;
  if sin_arg != cos_arg {
    return None;
  }

  let doubled = Expr::call(
    "sin",
    vec![cleanup(&Expr::mul(Expr::num(2.0), sin_arg))],
  );
  let mut rest: Vec<Expr> = vec![Expr::num(0.5), doubled];
  for (idx, factor) in factors.iter().enumerate() {
    if idx != sin_idx && idx != cos_idx {
      rest.push(factor.clone());
    }
  }
  Some(build_product(rest))
}

// ─── Logarithmic identities ─────────────────────────────────────────────────

fn log_of_one(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  for name in ["ln", "log", "lg"] {
    if let Some(arg) = call1(expr, name) {
      if arg.is_one() {
        return Some(Expr::num(0.0));
      }
    }
  }
  None
}

fn ln_of_e(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  let arg = call1(expr, "ln")?;
  if matches!(arg, Expr::Variable(name) if name == "e") {
    Some(Expr::num(1.0))
  } else {
    None
  }
}

fn log_base_same(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  match expr {
    Expr::Call {
      name,
      args,
      subscript: Some(base),
    } if name == "log" && args.len() == 1 => {
      if args[0] == *base.as_ref() {
        Some(Expr::num(1.0))
      } else {
        None
      }
    }
    _ => None,
  }
}

fn ln_exp_inverse(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  let arg = call1(expr, "ln")?;
  if let Some(inner) = call1(arg, "exp") {
    return Some(inner.clone());
  }
  if let Some((base, exponent)) = binary(arg, BinaryOperator::Pow) {
    if matches!(base, Expr::Variable(name) if name == "e") {
      return Some(exponent.clone());
    }
  }
  None
}

fn exp_ln_inverse(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  if let Some(arg) = call1(expr, "exp") {
    if let Some(inner) = call1(arg, "ln") {
      return Some(inner.clone());
    }
  }
  if let Some((base, exponent)) = binary(expr, BinaryOperator::Pow) {
    if matches!(base, Expr::Variable(name) if name == "e") {
      if let Some(inner) = call1(exponent, "ln") {
        return Some(inner.clone());
      }
    }
  }
  None
}

fn combine_logs(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  let (left, right) = binary(expr, BinaryOperator::Add)?;
  if let (Some(a), Some(b)) = (call1(left, "ln"), call1(right, "ln")) {
    return Some(Expr::call(
      "ln",
      vec![Expr::mul(a.clone(), b.clone())],
    ));
  }
  // Chain form: ln a + (ln b + rest)
  if let Some((inner_left, rest)) = binary(right, BinaryOperator::Add) {
    if let (Some(a), Some(b)) = (call1(left, "ln"), call1(inner_left, "ln"))
    {
      return Some(Expr::add(
        Expr::call("ln", vec![Expr::mul(a.clone(), b.clone())]),
        rest.clone(),
      ));
    }
  }
  None
}

// ─── Assumption-guarded root rules ──────────────────────────────────────────

fn sqrt_of_square(
  expr: &Expr,
  assumptions: &Assumptions,
) -> Option<Expr> {
  let arg = call1(expr, "sqrt")?;
  if let Expr::Number(n) = arg {
    let root = n.sqrt();
    if *n >= 0.0 && root.fract() == 0.0 {
      return Some(Expr::num(root));
    }
    return None;
  }
  let (base, exponent) = binary(arg, BinaryOperator::Pow)?;
  if exponent.as_number() != Some(2.0) {
    return None;
  }
  if assumptions.is_nonnegative(base) {
    Some(base.clone())
  } else {
    Some(Expr::Abs(Box::new(base.clone())))
  }
}

fn abs_nonnegative(
  expr: &Expr,
  assumptions: &Assumptions,
) -> Option<Expr> {
  match expr {
    Expr::Abs(inner) if assumptions.is_nonnegative(inner) => {
      Some(inner.as_ref().clone())
    }
    _ => None,
  }
}

fn even_power_of_abs(expr: &Expr, _: &Assumptions) -> Option<Expr> {
  let (base, exponent) = binary(expr, BinaryOperator::Pow)?;
  let n = exponent.as_number()?;
  if n.fract() != 0.0 || (n as i64) % 2 != 0 {
    return None;
  }
  match base {
    Expr::Abs(inner) => {
      Some(Expr::pow(inner.as_ref().clone(), exponent.clone()))
    }
    _ => None,
  }
}
