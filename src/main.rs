use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;

use texpr::{
  differentiate, eval_str, integrate, parse, unparse, validate, Bindings,
  EquivalenceLevel, Simplifier, Value,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Evaluate an expression numerically
  Eval {
    /// The expression to evaluate
    expression: String,
    /// Variable bindings, e.g. -v x=2 -v y=0.5
    #[arg(short = 'v', long = "var")]
    vars: Vec<String>,
  },
  /// Parse an expression and print the tree
  Parse {
    expression: String,
  },
  /// Differentiate an expression
  Diff {
    expression: String,
    /// Variable to differentiate by
    #[arg(default_value = "x")]
    variable: String,
    /// Derivative order (at most 10)
    #[arg(short, long, default_value_t = 1)]
    order: u32,
  },
  /// Build an antiderivative where a rule matches
  Integrate {
    expression: String,
    #[arg(default_value = "x")]
    variable: String,
  },
  /// Simplify an expression to a fixed point of the rule set
  Simplify {
    expression: String,
  },
  /// Expand products and small binomial powers
  Expand {
    expression: String,
  },
  /// Factor differences of squares and simple quadratics
  Factor {
    expression: String,
  },
  /// Test whether two expressions are equivalent
  Check {
    first: String,
    second: String,
    #[arg(long, value_enum, default_value_t = LevelArg::Numeric)]
    level: LevelArg,
  },
  /// Collect every diagnostic for an input instead of the first error
  Validate {
    expression: String,
    /// Emit the diagnostics as JSON
    #[arg(long)]
    json: bool,
  },
}

#[derive(Clone, Copy, ValueEnum)]
enum LevelArg {
  Structural,
  Algebraic,
  Numeric,
}

impl From<LevelArg> for EquivalenceLevel {
  fn from(level: LevelArg) -> Self {
    match level {
      LevelArg::Structural => EquivalenceLevel::Structural,
      LevelArg::Algebraic => EquivalenceLevel::Algebraic,
      LevelArg::Numeric => EquivalenceLevel::Numeric,
    }
  }
}

fn parse_bindings(pairs: &[String]) -> Result<Bindings> {
  let mut vars = Bindings::new();
  for pair in pairs {
    let (name, value) = pair
      .split_once('=')
      .ok_or_else(|| anyhow!("binding '{}' is not name=value", pair))?;
    let value: f64 = value
      .parse()
      .with_context(|| format!("binding '{}' has a non-numeric value", pair))?;
    vars.insert(name.trim().to_string(), Value::Real(value));
  }
  Ok(vars)
}

fn main() -> Result<()> {
  let cli = Cli::parse();
  match cli.command {
    Commands::Eval { expression, vars } => {
      let vars = parse_bindings(&vars)?;
      let result = eval_str(&expression, &vars)?;
      println!("{result}");
    }
    Commands::Parse { expression } => {
      let expr = parse(&expression)?;
      println!("{:#?}", expr);
      println!("{}", unparse(&expr));
    }
    Commands::Diff {
      expression,
      variable,
      order,
    } => {
      let expr = parse(&expression)?;
      let derived = differentiate(&expr, &variable, order)?;
      println!("{}", unparse(&derived));
    }
    Commands::Integrate {
      expression,
      variable,
    } => {
      let expr = parse(&expression)?;
      println!("{}", unparse(&integrate(&expr, &variable)));
    }
    Commands::Simplify { expression } => {
      let expr = parse(&expression)?;
      println!("{}", unparse(&Simplifier::new().simplify(&expr)));
    }
    Commands::Expand { expression } => {
      let expr = parse(&expression)?;
      println!("{}", unparse(&Simplifier::new().expand(&expr)));
    }
    Commands::Factor { expression } => {
      let expr = parse(&expression)?;
      println!("{}", unparse(&Simplifier::new().factor(&expr)));
    }
    Commands::Check {
      first,
      second,
      level,
    } => {
      let a = parse(&first)?;
      let b = parse(&second)?;
      let equivalent =
        Simplifier::new().are_equivalent(&a, &b, level.into());
      println!("{equivalent}");
      if !equivalent {
        std::process::exit(1);
      }
    }
    Commands::Validate { expression, json } => {
      let diagnostics = validate(&expression, &Bindings::new());
      if json {
        let entries: Vec<_> = diagnostics
          .iter()
          .map(|d| {
            json!({
              "stage": d.stage.name(),
              "message": d.message,
              "position": d.position,
              "source": d.source,
              "suggestion": d.suggestion,
            })
          })
          .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
      } else if diagnostics.is_empty() {
        println!("ok");
      } else {
        for d in &diagnostics {
          match d.position {
            Some(pos) => {
              println!("{}: {} (at position {})", d.stage.name(), d.message, pos)
            }
            None => println!("{}: {}", d.stage.name(), d.message),
          }
          if let Some(suggestion) = &d.suggestion {
            println!("  suggestion: {}", suggestion);
          }
        }
        std::process::exit(1);
      }
    }
  }
  Ok(())
}
