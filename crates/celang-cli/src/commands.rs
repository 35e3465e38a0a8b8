//! Command implementations.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use celang_lib::{adapt, CelType, Compiler, MapActivation, Runtime, ValidationResult};

use crate::cli::{EnvArgs, OutputArgs};

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("cannot read bindings file '{path}': {source}")]
    BindingsFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("bindings must be a JSON object: {0}")]
    BindingsShape(String),

    #[error(transparent)]
    Compile(#[from] celang_lib::CompileError),

    #[error(transparent)]
    Eval(#[from] celang_lib::EvalError),

    #[error("{0}")]
    Serialize(String),
}

pub fn parse(expr: &str, pretty: bool, output: &OutputArgs) -> ExitCode {
    let run = || -> Result<ExitCode, CommandError> {
        let compiler = Compiler::standard();
        let result = compiler.parse(expr);
        if report_diagnostics(&result, output) {
            return Ok(ExitCode::FAILURE);
        }
        let ast = result.parsed_ast()?;
        let json = celang_lib::wire::parsed_to_json(ast)
            .map_err(|e| CommandError::Serialize(e.to_string()))?;
        if pretty {
            let value: serde_json::Value = serde_json::from_str(&json)
                .map_err(|e| CommandError::Serialize(e.to_string()))?;
            let rendered = serde_json::to_string_pretty(&value)
                .map_err(|e| CommandError::Serialize(e.to_string()))?;
            println!("{rendered}");
        } else {
            println!("{json}");
        }
        Ok(ExitCode::SUCCESS)
    };
    finish(run())
}

pub fn check(expr: &str, env: &EnvArgs, output: &OutputArgs) -> ExitCode {
    let run = || -> Result<ExitCode, CommandError> {
        let bindings = load_bindings(env)?;
        let compiler = build_compiler(env, &bindings)?;
        let result = compiler.compile(expr);
        if report_diagnostics(&result, output) {
            return Ok(ExitCode::FAILURE);
        }
        let checked = result.checked_ast()?;
        println!("{}", checked.result_type());
        Ok(ExitCode::SUCCESS)
    };
    finish(run())
}

pub fn eval(
    expr: &str,
    env: &EnvArgs,
    json: bool,
    strict_vars: bool,
    last_wins_map_keys: bool,
    max_iterations: i64,
    output: &OutputArgs,
) -> ExitCode {
    let run = || -> Result<ExitCode, CommandError> {
        let bindings = load_bindings(env)?;
        let compiler = build_compiler(env, &bindings)?;
        let result = compiler.compile(expr);
        if report_diagnostics(&result, output) {
            return Ok(ExitCode::FAILURE);
        }
        let checked = result.into_checked_ast()?;

        let runtime = Runtime::builder()
            .strict_variables(strict_vars)
            .last_wins_map_keys(last_wins_map_keys)
            .comprehension_max_iterations(max_iterations)
            .build();
        let mut activation = MapActivation::new();
        for (name, value) in bindings {
            activation = activation.bind(name, adapt::from_json(value));
        }
        let value = runtime.program(checked).eval(&activation)?;

        if json {
            let rendered =
                adapt::to_json(&value).map_err(|e| CommandError::Serialize(e.to_string()))?;
            println!("{rendered}");
        } else {
            println!("{value}");
        }
        Ok(ExitCode::SUCCESS)
    };
    finish(run())
}

fn load_bindings(env: &EnvArgs) -> Result<BTreeMap<String, serde_json::Value>, CommandError> {
    let text = if let Some(inline) = &env.bindings {
        inline.clone()
    } else if let Some(path) = &env.bindings_file {
        std::fs::read_to_string(path).map_err(|source| CommandError::BindingsFile {
            path: path.clone(),
            source,
        })?
    } else {
        return Ok(BTreeMap::new());
    };
    serde_json::from_str(&text).map_err(|e| CommandError::BindingsShape(e.to_string()))
}

/// Bindings enter the type environment as `dyn` variables; the checker
/// then dispatches their uses by runtime kind.
fn build_compiler(
    env: &EnvArgs,
    bindings: &BTreeMap<String, serde_json::Value>,
) -> Result<Compiler, CommandError> {
    let mut builder = Compiler::builder();
    if let Some(container) = &env.container {
        builder = builder.container(container.clone());
    }
    for name in bindings.keys() {
        builder = builder.add_var(name.clone(), CelType::Dyn);
    }
    Ok(builder.build()?)
}

/// Print diagnostics when present; true when any was an error.
fn report_diagnostics(result: &ValidationResult, output: &OutputArgs) -> bool {
    if !result.diagnostics().is_empty() {
        eprintln!(
            "{}",
            result
                .printer()
                .colored(output.color.should_colorize())
                .render()
        );
    }
    result.has_error()
}

fn finish(outcome: Result<ExitCode, CommandError>) -> ExitCode {
    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
