mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;

use cli::{Cli, Command};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Parse {
            expr,
            pretty,
            output,
        } => commands::parse(&expr.expr, pretty, &output),
        Command::Check { expr, env, output } => commands::check(&expr.expr, &env, &output),
        Command::Eval {
            expr,
            env,
            json,
            strict_vars,
            last_wins_map_keys,
            max_iterations,
            output,
        } => commands::eval(
            &expr.expr,
            &env,
            json,
            strict_vars,
            last_wins_map_keys,
            max_iterations,
            &output,
        ),
    }
}
