//! The symbolic rule engine: fixed-point simplification, polynomial
//! expansion and factoring, and multi-level equivalence testing.

pub mod assumptions;
pub mod equivalence;
pub mod normalize;
pub mod polynomial;
pub mod rules;

pub use assumptions::{Assumptions, Property};
pub use equivalence::EquivalenceLevel;

use crate::syntax::{map_children, Expr};
use normalize::{normalize, prettify};
use rules::RuleSet;

/// Passes are capped because some rule combinations could otherwise churn
/// between equivalent shapes without ever converging.
const MAX_PASSES: usize = 100;
const MAX_LOCAL_APPLICATIONS: usize = 8;

pub struct Simplifier {
  rules: RuleSet,
  assumptions: Assumptions,
  max_passes: usize,
}

impl Default for Simplifier {
  fn default() -> Self {
    Self {
      rules: RuleSet::standard(),
      assumptions: Assumptions::new(),
      max_passes: MAX_PASSES,
    }
  }
}

impl Simplifier {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_rules(mut self, rules: RuleSet) -> Self {
    self.rules = rules;
    self
  }

  /// Declare a property for a variable, feeding the assumption-guarded
  /// rules (`sqrt(x^2) -> x` only when `x` is known non-negative).
  pub fn assume(&mut self, var: &str, property: Property) {
    self.assumptions.assume(var, property);
  }

  pub fn assumptions(&self) -> &Assumptions {
    &self.assumptions
  }

  /// Apply the rule set to every subtree, bottom-up, until a fixed point
  /// or the pass cap is reached.
  pub fn simplify(&self, expr: &Expr) -> Expr {
    let mut current = normalize(expr);
    for _ in 0..self.max_passes {
      let next = normalize(&self.rewrite_walk(&current));
      if next == current {
        break;
      }
      current = next;
    }
    prettify(&current)
  }

  fn rewrite_walk(&self, expr: &Expr) -> Expr {
    let mut node =
      map_children(expr, &mut |child| self.rewrite_walk(child));
    for _ in 0..MAX_LOCAL_APPLICATIONS {
      let mut applied = false;
      for rule in self.rules.rules() {
        if let Some(next) = (rule.apply)(&node, &self.assumptions) {
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

  pub fn expand(&self, expr: &Expr) -> Expr {
    polynomial::expand(expr)
  }

  pub fn factor(&self, expr: &Expr) -> Expr {
    polynomial::factor(expr)
  }

  pub fn are_equivalent(
    &self,
    a: &Expr,
    b: &Expr,
    level: EquivalenceLevel,
  ) -> bool {
    equivalence::are_equivalent(self, a, b, level)
  }
}

/// Simplify with the standard rule set and no assumptions.
pub fn simplify(expr: &Expr) -> Expr {
  Simplifier::new().simplify(expr)
}

pub fn expand(expr: &Expr) -> Expr {
  Simplifier::new().expand(expr)
}

pub fn factor(expr: &Expr) -> Expr {
  Simplifier::new().factor(expr)
}

pub fn are_equivalent(a: &Expr, b: &Expr, level: EquivalenceLevel) -> bool {
  Simplifier::new().are_equivalent(a, b, level)
}
