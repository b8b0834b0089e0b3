//! The expression tree.
//!
//! `Expr` is a closed sum type: every construct the parser can produce is a
//! variant here, and the symbolic engines allocate new subtrees instead of
//! editing existing ones. Once built, an `Expr` and all of its descendants
//! are never mutated.

use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
  Add,
  Sub,
  /// `*` / `\cdot`: plain multiplication, dot product on vectors.
  Mul,
  /// `\times`: plain multiplication, cross product on vectors.
  CrossMul,
  Div,
  Pow,
  And,
  Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
  Neg,
  Factorial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationOp {
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

impl RelationOp {
  pub fn holds(&self, left: f64, right: f64) -> bool {
    match self {
      RelationOp::Eq => left == right,
      RelationOp::Ne => left != right,
      RelationOp::Lt => left < right,
      RelationOp::Le => left <= right,
      RelationOp::Gt => left > right,
      RelationOp::Ge => left >= right,
    }
  }
}

/// One arm of a piecewise expression: a value and an optional guard.
/// A `None` guard is the unconditional ("otherwise") case.
#[derive(Debug, Clone, PartialEq)]
pub struct PiecewiseCase {
  pub value: Expr,
  pub guard: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Number(f64),
  Variable(String),
  Binary {
    op: BinaryOperator,
    left: Box<Expr>,
    right: Box<Expr>,
  },
  Unary {
    op: UnaryOperator,
    operand: Box<Expr>,
  },
  Abs(Box<Expr>),
  Call {
    name: String,
    args: Vec<Expr>,
    /// Subscript parameter, e.g. the base of `\log_2`.
    subscript: Option<Box<Expr>>,
  },
  Matrix(Vec<Vec<Expr>>),
  Vector(Vec<Expr>),
  Sum {
    var: String,
    from: Box<Expr>,
    to: Box<Expr>,
    body: Box<Expr>,
  },
  Product {
    var: String,
    from: Box<Expr>,
    to: Box<Expr>,
    body: Box<Expr>,
  },
  Limit {
    var: String,
    target: Box<Expr>,
    body: Box<Expr>,
  },
  /// Definite when both bounds are present; an unbounded `Integral` is the
  /// unresolved-antiderivative placeholder emitted by the integration engine.
  Integral {
    var: String,
    lower: Option<Box<Expr>>,
    upper: Option<Box<Expr>>,
    body: Box<Expr>,
  },
  Derivative {
    body: Box<Expr>,
    var: String,
    order: u32,
    partial: bool,
  },
  Binom {
    top: Box<Expr>,
    bottom: Box<Expr>,
  },
  Comparison {
    op: RelationOp,
    left: Box<Expr>,
    right: Box<Expr>,
  },
  /// `a < b < c`: terms.len() == ops.len() + 1.
  ChainedComparison {
    terms: Vec<Expr>,
    ops: Vec<RelationOp>,
  },
  /// `expr, guard` comma-conditional sugar.
  Conditional {
    value: Box<Expr>,
    condition: Box<Expr>,
  },
  Piecewise(Vec<PiecewiseCase>),
}

impl Expr {
  pub fn num(value: f64) -> Expr {
    Expr::Number(value)
  }

  pub fn var(name: &str) -> Expr {
    Expr::Variable(name.to_string())
  }

  pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
      op,
      left: Box::new(left),
      right: Box::new(right),
    }
  }

  pub fn add(left: Expr, right: Expr) -> Expr {
    Expr::binary(BinaryOperator::Add, left, right)
  }

  pub fn sub(left: Expr, right: Expr) -> Expr {
    Expr::binary(BinaryOperator::Sub, left, right)
  }

  pub fn mul(left: Expr, right: Expr) -> Expr {
    Expr::binary(BinaryOperator::Mul, left, right)
  }

  pub fn div(left: Expr, right: Expr) -> Expr {
    Expr::binary(BinaryOperator::Div, left, right)
  }

  pub fn pow(left: Expr, right: Expr) -> Expr {
    Expr::binary(BinaryOperator::Pow, left, right)
  }

  pub fn neg(operand: Expr) -> Expr {
    Expr::Unary {
      op: UnaryOperator::Neg,
      operand: Box::new(operand),
    }
  }

  pub fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
      name: name.to_string(),
      args,
      subscript: None,
    }
  }

  pub fn as_number(&self) -> Option<f64> {
    match self {
      Expr::Number(n) => Some(*n),
      Expr::Unary {
        op: UnaryOperator::Neg,
        operand,
      } => operand.as_number().map(|n| -n),
      _ => None,
    }
  }

  /// True for `Number(0.0)` (and its negation).
  pub fn is_zero(&self) -> bool {
    self.as_number() == Some(0.0)
  }

  pub fn is_one(&self) -> bool {
    self.as_number() == Some(1.0)
  }

  /// Free variables of the expression; iteration-bound variables are
  /// excluded within their body.
  pub fn free_variables(&self) -> BTreeSet<String> {
    let mut vars = BTreeSet::new();
    collect_free(self, &mut vars);
    vars
  }

  pub fn contains_variable(&self, name: &str) -> bool {
    self.free_variables().contains(name)
  }
}

fn collect_free(expr: &Expr, vars: &mut BTreeSet<String>) {
  match expr {
    Expr::Number(_) => {}
    Expr::Variable(name) => {
      vars.insert(name.clone());
    }
    Expr::Binary { left, right, .. } => {
      collect_free(left, vars);
      collect_free(right, vars);
    }
    Expr::Unary { operand, .. } => collect_free(operand, vars),
    Expr::Abs(inner) => collect_free(inner, vars),
    Expr::Call {
      args, subscript, ..
    } => {
      for arg in args {
        collect_free(arg, vars);
      }
      if let Some(sub) = subscript {
        collect_free(sub, vars);
      }
    }
    Expr::Matrix(rows) => {
      for row in rows {
        for cell in row {
          collect_free(cell, vars);
        }
      }
    }
    Expr::Vector(items) => {
      for item in items {
        collect_free(item, vars);
      }
    }
    Expr::Sum {
      var,
      from,
      to,
      body,
    }
    | Expr::Product {
      var,
      from,
      to,
      body,
    } => {
      collect_free(from, vars);
      collect_free(to, vars);
      let mut inner = BTreeSet::new();
      collect_free(body, &mut inner);
      inner.remove(var);
      vars.extend(inner);
    }
    Expr::Limit { var, target, body } => {
      collect_free(target, vars);
      let mut inner = BTreeSet::new();
      collect_free(body, &mut inner);
      inner.remove(var);
      vars.extend(inner);
    }
    Expr::Integral {
      var,
      lower,
      upper,
      body,
    } => {
      if let Some(lo) = lower {
        collect_free(lo, vars);
      }
      if let Some(hi) = upper {
        collect_free(hi, vars);
      }
      let mut inner = BTreeSet::new();
      collect_free(body, &mut inner);
      inner.remove(var);
      vars.extend(inner);
    }
    Expr::Derivative { body, .. } => collect_free(body, vars),
    Expr::Binom { top, bottom } => {
      collect_free(top, vars);
      collect_free(bottom, vars);
    }
    Expr::Comparison { left, right, .. } => {
      collect_free(left, vars);
      collect_free(right, vars);
    }
    Expr::ChainedComparison { terms, .. } => {
      for term in terms {
        collect_free(term, vars);
      }
    }
    Expr::Conditional { value, condition } => {
      collect_free(value, vars);
      collect_free(condition, vars);
    }
    Expr::Piecewise(cases) => {
      for case in cases {
        collect_free(&case.value, vars);
        if let Some(guard) = &case.guard {
          collect_free(guard, vars);
        }
      }
    }
  }
}

/// Replace every free occurrence of `var` with `replacement`, allocating a
/// new tree. Iteration constructs that rebind `var` shadow it in their body.
pub fn substitute_variable(expr: &Expr, var: &str, replacement: &Expr) -> Expr {
  match expr {
    Expr::Number(_) => expr.clone(),
    Expr::Variable(name) => {
      if name == var {
        replacement.clone()
      } else {
        expr.clone()
      }
    }
    Expr::Binary { op, left, right } => Expr::Binary {
      op: *op,
      left: Box::new(substitute_variable(left, var, replacement)),
      right: Box::new(substitute_variable(right, var, replacement)),
    },
    Expr::Unary { op, operand } => Expr::Unary {
      op: *op,
      operand: Box::new(substitute_variable(operand, var, replacement)),
    },
    Expr::Abs(inner) => {
      Expr::Abs(Box::new(substitute_variable(inner, var, replacement)))
    }
    Expr::Call {
      name,
      args,
      subscript,
    } => Expr::Call {
      name: name.clone(),
      args: args
        .iter()
        .map(|a| substitute_variable(a, var, replacement))
        .collect(),
      subscript: subscript
        .as_ref()
        .map(|s| Box::new(substitute_variable(s, var, replacement))),
    },
    Expr::Matrix(rows) => Expr::Matrix(
      rows
        .iter()
        .map(|row| {
          row
            .iter()
            .map(|cell| substitute_variable(cell, var, replacement))
            .collect()
        })
        .collect(),
    ),
    Expr::Vector(items) => Expr::Vector(
      items
        .iter()
        .map(|item| substitute_variable(item, var, replacement))
        .collect(),
    ),
    Expr::Sum {
      var: bound,
      from,
      to,
      body,
    } => {
      let body = if bound == var {
        body.clone()
      } else {
        Box::new(substitute_variable(body, var, replacement))
      };
      Expr::Sum {
        var: bound.clone(),
        from: Box::new(substitute_variable(from, var, replacement)),
        to: Box::new(substitute_variable(to, var, replacement)),
        body,
      }
    }
    Expr::Product {
      var: bound,
      from,
      to,
      body,
    } => {
      let body = if bound == var {
        body.clone()
      } else {
        Box::new(substitute_variable(body, var, replacement))
      };
      Expr::Product {
        var: bound.clone(),
        from: Box::new(substitute_variable(from, var, replacement)),
        to: Box::new(substitute_variable(to, var, replacement)),
        body,
      }
    }
    Expr::Limit {
      var: bound,
      target,
      body,
    } => {
      let body = if bound == var {
        body.clone()
      } else {
        Box::new(substitute_variable(body, var, replacement))
      };
      Expr::Limit {
        var: bound.clone(),
        target: Box::new(substitute_variable(target, var, replacement)),
        body,
      }
    }
    Expr::Integral {
      var: bound,
      lower,
      upper,
      body,
    } => {
      let body = if bound == var {
        body.clone()
      } else {
        Box::new(substitute_variable(body, var, replacement))
      };
      Expr::Integral {
        var: bound.clone(),
        lower: lower
          .as_ref()
          .map(|lo| Box::new(substitute_variable(lo, var, replacement))),
        upper: upper
          .as_ref()
          .map(|hi| Box::new(substitute_variable(hi, var, replacement))),
        body,
      }
    }
    Expr::Derivative {
      body,
      var: dvar,
      order,
      partial,
    } => Expr::Derivative {
      body: Box::new(substitute_variable(body, var, replacement)),
      var: dvar.clone(),
      order: *order,
      partial: *partial,
    },
    Expr::Binom { top, bottom } => Expr::Binom {
      top: Box::new(substitute_variable(top, var, replacement)),
      bottom: Box::new(substitute_variable(bottom, var, replacement)),
    },
    Expr::Comparison { op, left, right } => Expr::Comparison {
      op: *op,
      left: Box::new(substitute_variable(left, var, replacement)),
      right: Box::new(substitute_variable(right, var, replacement)),
    },
    Expr::ChainedComparison { terms, ops } => Expr::ChainedComparison {
      terms: terms
        .iter()
        .map(|t| substitute_variable(t, var, replacement))
        .collect(),
      ops: ops.clone(),
    },
    Expr::Conditional { value, condition } => Expr::Conditional {
      value: Box::new(substitute_variable(value, var, replacement)),
      condition: Box::new(substitute_variable(condition, var, replacement)),
    },
    Expr::Piecewise(cases) => Expr::Piecewise(
      cases
        .iter()
        .map(|case| PiecewiseCase {
          value: substitute_variable(&case.value, var, replacement),
          guard: case
            .guard
            .as_ref()
            .map(|g| substitute_variable(g, var, replacement)),
        })
        .collect(),
    ),
  }
}

/// Rebuild a node with every direct child passed through `f`. Shared by the
/// rewrite engine and the normalizer for their bottom-up walks.
pub fn map_children(
  expr: &Expr,
  f: &mut dyn FnMut(&Expr) -> Expr,
) -> Expr {
  match expr {
    Expr::Number(_) | Expr::Variable(_) => expr.clone(),
    Expr::Binary { op, left, right } => Expr::Binary {
      op: *op,
      left: Box::new(f(left)),
      right: Box::new(f(right)),
    },
    Expr::Unary { op, operand } => Expr::Unary {
      op: *op,
      operand: Box::new(f(operand)),
    },
    Expr::Abs(inner) => Expr::Abs(Box::new(f(inner))),
    Expr::Call {
      name,
      args,
      subscript,
    } => Expr::Call {
      name: name.clone(),
      args: args.iter().map(|a| f(a)).collect(),
      subscript: subscript.as_ref().map(|s| Box::new(f(s))),
    },
    Expr::Matrix(rows) => Expr::Matrix(
      rows
        .iter()
        .map(|row| row.iter().map(|cell| f(cell)).collect())
        .collect(),
    ),
    Expr::Vector(items) => {
      Expr::Vector(items.iter().map(|item| f(item)).collect())
    }
    Expr::Sum {
      var,
      from,
      to,
      body,
    } => Expr::Sum {
      var: var.clone(),
      from: Box::new(f(from)),
      to: Box::new(f(to)),
      body: Box::new(f(body)),
    },
    Expr::Product {
      var,
      from,
      to,
      body,
    } => Expr::Product {
      var: var.clone(),
      from: Box::new(f(from)),
      to: Box::new(f(to)),
      body: Box::new(f(body)),
    },
    Expr::Limit { var, target, body } => Expr::Limit {
      var: var.clone(),
      target: Box::new(f(target)),
      body: Box::new(f(body)),
    },
    Expr::Integral {
      var,
      lower,
      upper,
      body,
    } => Expr::Integral {
      var: var.clone(),
      lower: lower.as_ref().map(|lo| Box::new(f(lo))),
      upper: upper.as_ref().map(|hi| Box::new(f(hi))),
      body: Box::new(f(body)),
    },
    Expr::Derivative {
      body,
      var,
      order,
      partial,
    } => Expr::Derivative {
      body: Box::new(f(body)),
      var: var.clone(),
      order: *order,
      partial: *partial,
    },
    Expr::Binom { top, bottom } => Expr::Binom {
      top: Box::new(f(top)),
      bottom: Box::new(f(bottom)),
    },
    Expr::Comparison { op, left, right } => Expr::Comparison {
      op: *op,
      left: Box::new(f(left)),
      right: Box::new(f(right)),
    },
    Expr::ChainedComparison { terms, ops } => Expr::ChainedComparison {
      terms: terms.iter().map(|t| f(t)).collect(),
      ops: ops.clone(),
    },
    Expr::Conditional { value, condition } => Expr::Conditional {
      value: Box::new(f(value)),
      condition: Box::new(f(condition)),
    },
    Expr::Piecewise(cases) => Expr::Piecewise(
      cases
        .iter()
        .map(|case| PiecewiseCase {
          value: f(&case.value),
          guard: case.guard.as_ref().map(|g| f(g)),
        })
        .collect(),
    ),
  }
}

// ─── LaTeX re-rendering ─────────────────────────────────────────────────────

// Precedence levels used when deciding where parentheses are needed.
const PREC_OR: u8 = 1;
const PREC_AND: u8 = 2;
const PREC_CMP: u8 = 3;
const PREC_ADD: u8 = 4;
const PREC_MUL: u8 = 5;
const PREC_UNARY: u8 = 6;
const PREC_POW: u8 = 7;
const PREC_POSTFIX: u8 = 8;
const PREC_ATOM: u8 = 9;

/// Names that render with a leading backslash so they survive re-tokenizing
/// under implicit multiplication.
const COMMAND_NAMES: &[&str] = &[
  "pi", "tau", "phi", "infty", "alpha", "beta", "gamma", "delta", "epsilon",
  "zeta", "eta", "theta", "kappa", "lambda", "mu", "nu", "xi", "rho",
  "sigma", "upsilon", "chi", "psi", "omega",
];

fn precedence(expr: &Expr) -> u8 {
  match expr {
    Expr::Binary { op, .. } => match op {
      BinaryOperator::Or => PREC_OR,
      BinaryOperator::And => PREC_AND,
      BinaryOperator::Add | BinaryOperator::Sub => PREC_ADD,
      BinaryOperator::Mul | BinaryOperator::CrossMul => PREC_MUL,
      BinaryOperator::Div => PREC_ATOM, // rendered as \frac{..}{..}
      BinaryOperator::Pow => PREC_POW,
    },
    Expr::Unary {
      op: UnaryOperator::Neg,
      ..
    } => PREC_UNARY,
    Expr::Unary {
      op: UnaryOperator::Factorial,
      ..
    } => PREC_POSTFIX,
    Expr::Comparison { .. } | Expr::ChainedComparison { .. } => PREC_CMP,
    Expr::Conditional { .. } => PREC_OR,
    Expr::Sum { .. }
    | Expr::Product { .. }
    | Expr::Limit { .. }
    | Expr::Integral { .. } => PREC_MUL,
    _ => PREC_ATOM,
  }
}

fn relation_symbol(op: RelationOp) -> &'static str {
  match op {
    RelationOp::Eq => "=",
    RelationOp::Ne => "\\ne",
    RelationOp::Lt => "<",
    RelationOp::Le => "\\le",
    RelationOp::Gt => ">",
    RelationOp::Ge => "\\ge",
  }
}

fn fmt_variable(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
  if COMMAND_NAMES.contains(&name) {
    write!(f, "\\{}", name)
  } else if let Some((base, sub)) = name.split_once('_') {
    if COMMAND_NAMES.contains(&base) {
      write!(f, "\\{}_{{{}}}", base, sub)
    } else {
      write!(f, "{}_{{{}}}", base, sub)
    }
  } else {
    write!(f, "{}", name)
  }
}

fn fmt_prec(
  f: &mut fmt::Formatter<'_>,
  expr: &Expr,
  min_prec: u8,
) -> fmt::Result {
  if precedence(expr) < min_prec {
    write!(f, "(")?;
    fmt_expr(f, expr)?;
    write!(f, ")")
  } else {
    fmt_expr(f, expr)
  }
}

fn fmt_expr(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
  match expr {
    Expr::Number(n) => {
      if n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", *n as i64)
      } else {
        write!(f, "{}", n)
      }
    }
    Expr::Variable(name) => fmt_variable(f, name),
    Expr::Binary { op, left, right } => match op {
      BinaryOperator::Add => {
        fmt_prec(f, left, PREC_ADD)?;
        write!(f, " + ")?;
        fmt_prec(f, right, PREC_ADD + 1)
      }
      BinaryOperator::Sub => {
        fmt_prec(f, left, PREC_ADD)?;
        write!(f, " - ")?;
        fmt_prec(f, right, PREC_ADD + 1)
      }
      BinaryOperator::Mul => {
        fmt_prec(f, left, PREC_MUL)?;
        write!(f, " \\cdot ")?;
        fmt_prec(f, right, PREC_MUL + 1)
      }
      BinaryOperator::CrossMul => {
        fmt_prec(f, left, PREC_MUL)?;
        write!(f, " \\times ")?;
        fmt_prec(f, right, PREC_MUL + 1)
      }
      BinaryOperator::Div => {
        write!(f, "\\frac{{")?;
        fmt_expr(f, left)?;
        write!(f, "}}{{")?;
        fmt_expr(f, right)?;
        write!(f, "}}")
      }
      BinaryOperator::Pow => {
        fmt_prec(f, left, PREC_POSTFIX)?;
        write!(f, "^{{")?;
        fmt_expr(f, right)?;
        write!(f, "}}")
      }
      BinaryOperator::And => {
        fmt_prec(f, left, PREC_AND)?;
        write!(f, " \\land ")?;
        fmt_prec(f, right, PREC_AND + 1)
      }
      BinaryOperator::Or => {
        fmt_prec(f, left, PREC_OR)?;
        write!(f, " \\lor ")?;
        fmt_prec(f, right, PREC_OR + 1)
      }
    },
    Expr::Unary { op, operand } => match op {
      UnaryOperator::Neg => {
        write!(f, "-")?;
        fmt_prec(f, operand, PREC_UNARY)
      }
      UnaryOperator::Factorial => {
        fmt_prec(f, operand, PREC_ATOM)?;
        write!(f, "!")
      }
    },
    Expr::Abs(inner) => {
      write!(f, "|")?;
      fmt_expr(f, inner)?;
      write!(f, "|")
    }
    Expr::Call {
      name,
      args,
      subscript,
    } => {
      // \sqrt takes its radicand in braces, with the root index in
      // brackets; every other function call is parenthesized.
      if name == "sqrt" && args.len() == 1 {
        write!(f, "\\sqrt")?;
        if let Some(index) = subscript {
          write!(f, "[")?;
          fmt_expr(f, index)?;
          write!(f, "]")?;
        }
        write!(f, "{{")?;
        fmt_expr(f, &args[0])?;
        return write!(f, "}}");
      }
      write!(f, "\\{}", name)?;
      if let Some(sub) = subscript {
        write!(f, "_{{")?;
        fmt_expr(f, sub)?;
        write!(f, "}}")?;
      }
      write!(f, "(")?;
      for (i, arg) in args.iter().enumerate() {
        if i > 0 {
          write!(f, ", ")?;
        }
        fmt_expr(f, arg)?;
      }
      write!(f, ")")
    }
    Expr::Matrix(rows) => {
      write!(f, "\\begin{{bmatrix}} ")?;
      for (i, row) in rows.iter().enumerate() {
        if i > 0 {
          write!(f, " \\\\ ")?;
        }
        for (j, cell) in row.iter().enumerate() {
          if j > 0 {
            write!(f, " & ")?;
          }
          fmt_expr(f, cell)?;
        }
      }
      write!(f, " \\end{{bmatrix}}")
    }
    Expr::Vector(items) => {
      write!(f, "\\begin{{bmatrix}} ")?;
      for (i, item) in items.iter().enumerate() {
        if i > 0 {
          write!(f, " \\\\ ")?;
        }
        fmt_expr(f, item)?;
      }
      write!(f, " \\end{{bmatrix}}")
    }
    Expr::Sum {
      var,
      from,
      to,
      body,
    } => {
      write!(f, "\\sum_{{{} = ", var)?;
      fmt_expr(f, from)?;
      write!(f, "}}^{{")?;
      fmt_expr(f, to)?;
      write!(f, "}} ")?;
      fmt_prec(f, body, PREC_MUL + 1)
    }
    Expr::Product {
      var,
      from,
      to,
      body,
    } => {
      write!(f, "\\prod_{{{} = ", var)?;
      fmt_expr(f, from)?;
      write!(f, "}}^{{")?;
      fmt_expr(f, to)?;
      write!(f, "}} ")?;
      fmt_prec(f, body, PREC_MUL + 1)
    }
    Expr::Limit { var, target, body } => {
      write!(f, "\\lim_{{{} \\to ", var)?;
      fmt_expr(f, target)?;
      write!(f, "}} ")?;
      fmt_prec(f, body, PREC_MUL + 1)
    }
    Expr::Integral {
      var,
      lower,
      upper,
      body,
    } => {
      write!(f, "\\int")?;
      if let Some(lo) = lower {
        write!(f, "_{{")?;
        fmt_expr(f, lo)?;
        write!(f, "}}")?;
      }
      if let Some(hi) = upper {
        write!(f, "^{{")?;
        fmt_expr(f, hi)?;
        write!(f, "}}")?;
      }
      write!(f, " ")?;
      fmt_prec(f, body, PREC_ADD)?;
      write!(f, " \\, d {}", var)
    }
    Expr::Derivative {
      body,
      var,
      order,
      partial,
    } => {
      let d = if *partial { "\\partial" } else { "d" };
      if *order == 1 {
        write!(f, "\\frac{{{}}}{{{} {}}}(", d, d, var)?;
      } else {
        write!(f, "\\frac{{{}^{{{}}}}}{{{} {}^{{{}}}}}(", d, order, d, var, order)?;
      }
      fmt_expr(f, body)?;
      write!(f, ")")
    }
    Expr::Binom { top, bottom } => {
      write!(f, "\\binom{{")?;
      fmt_expr(f, top)?;
      write!(f, "}}{{")?;
      fmt_expr(f, bottom)?;
      write!(f, "}}")
    }
    Expr::Comparison { op, left, right } => {
      fmt_prec(f, left, PREC_CMP + 1)?;
      write!(f, " {} ", relation_symbol(*op))?;
      fmt_prec(f, right, PREC_CMP + 1)
    }
    Expr::ChainedComparison { terms, ops } => {
      for (i, term) in terms.iter().enumerate() {
        if i > 0 {
          write!(f, " {} ", relation_symbol(ops[i - 1]))?;
        }
        fmt_prec(f, term, PREC_CMP + 1)?;
      }
      Ok(())
    }
    Expr::Conditional { value, condition } => {
      // Re-rendered as a one-case environment: the comma form is only
      // recognized at the top level of a source string.
      write!(f, "\\begin{{cases}} ")?;
      fmt_expr(f, value)?;
      write!(f, " & ")?;
      fmt_expr(f, condition)?;
      write!(f, " \\end{{cases}}")
    }
    Expr::Piecewise(cases) => {
      write!(f, "\\begin{{cases}} ")?;
      for (i, case) in cases.iter().enumerate() {
        if i > 0 {
          write!(f, " \\\\ ")?;
        }
        fmt_expr(f, &case.value)?;
        write!(f, " & ")?;
        match &case.guard {
          Some(guard) => fmt_expr(f, guard)?,
          None => write!(f, "\\text{{otherwise}}")?,
        }
      }
      write!(f, " \\end{{cases}}")
    }
  }
}

impl fmt::Display for Expr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt_expr(f, self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn free_variables_exclude_iteration_bindings() {
    let sum = Expr::Sum {
      var: "i".to_string(),
      from: Box::new(Expr::num(1.0)),
      to: Box::new(Expr::var("n")),
      body: Box::new(Expr::mul(Expr::var("i"), Expr::var("x"))),
    };
    let vars = sum.free_variables();
    assert!(vars.contains("n"));
    assert!(vars.contains("x"));
    assert!(!vars.contains("i"));
  }

  #[test]
  fn substitute_respects_shadowing() {
    let sum = Expr::Sum {
      var: "i".to_string(),
      from: Box::new(Expr::num(1.0)),
      to: Box::new(Expr::var("i")),
      body: Box::new(Expr::var("i")),
    };
    let out = substitute_variable(&sum, "i", &Expr::num(3.0));
    match out {
      Expr::Sum { to, body, .. } => {
        assert_eq!(*to, Expr::num(3.0));
        assert_eq!(*body, Expr::var("i"));
      }
      other => panic!("expected Sum, got {:?}", other),
    }
  }

  #[test]
  fn rendering_parenthesizes_by_precedence() {
    let expr = Expr::mul(
      Expr::add(Expr::var("a"), Expr::var("b")),
      Expr::var("c"),
    );
    assert_eq!(expr.to_string(), "(a + b) \\cdot c");
  }

  #[test]
  fn greek_names_render_as_commands() {
    assert_eq!(Expr::var("pi").to_string(), "\\pi");
    assert_eq!(Expr::var("x").to_string(), "x");
  }
}
