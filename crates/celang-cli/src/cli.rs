//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    pub fn should_colorize(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        }
    }
}

#[derive(Parser)]
#[command(name = "celang", bin_name = "celang")]
#[command(about = "Common Expression Language compiler and evaluator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Parse an expression and dump its AST as JSON
    #[command(after_help = r#"EXAMPLES:
  celang parse "1 + 2 * 3"
  celang parse "[1, 2].map(x, x * x)" --pretty"#)]
    Parse {
        #[command(flatten)]
        expr: ExprArgs,

        /// Pretty-print the AST JSON
        #[arg(long)]
        pretty: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Type-check an expression and report its result type
    #[command(after_help = r#"EXAMPLES:
  celang check "1 < 2 && 'a'.startsWith('b')"
  celang check "name == 'x'" --bindings '{"name": "x"}'
  celang check "x + 1" --container my.pkg"#)]
    Check {
        #[command(flatten)]
        expr: ExprArgs,

        #[command(flatten)]
        env: EnvArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Evaluate an expression against JSON bindings
    #[command(after_help = r#"EXAMPLES:
  celang eval "1 + 2"
  celang eval "name.startsWith('/admin')" --bindings '{"name": "/admin/x"}'
  celang eval "items.filter(i, i > 2)" --bindings-file input.json --json"#)]
    Eval {
        #[command(flatten)]
        expr: ExprArgs,

        #[command(flatten)]
        env: EnvArgs,

        /// Print the result as JSON instead of CEL syntax
        #[arg(long)]
        json: bool,

        /// Missing variables are errors instead of unknowns
        #[arg(long)]
        strict_vars: bool,

        /// Duplicate map keys take last-write-wins instead of erroring
        #[arg(long)]
        last_wins_map_keys: bool,

        /// Comprehension iteration budget (-1 disables)
        #[arg(long, value_name = "N", default_value_t = 1000)]
        max_iterations: i64,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
pub struct ExprArgs {
    /// The CEL expression
    #[arg(value_name = "EXPR")]
    pub expr: String,
}

#[derive(Args)]
pub struct EnvArgs {
    /// Inline JSON object of variable bindings
    #[arg(long, value_name = "JSON", conflicts_with = "bindings_file")]
    pub bindings: Option<String>,

    /// File with a JSON object of variable bindings
    #[arg(long, value_name = "FILE")]
    pub bindings_file: Option<PathBuf>,

    /// Container namespace for identifier resolution
    #[arg(long, value_name = "NAME")]
    pub container: Option<String>,
}

#[derive(Args)]
pub struct OutputArgs {
    /// Color output control
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,
}
