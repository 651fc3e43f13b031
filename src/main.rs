//! symcalc CLI
//!
//! Usage:
//!   symcalc eval "2 * (3 + x) - 1" --var x=4
//!   symcalc calc divide 5 4
//!   symcalc diff "x^3 + 2*x" --wrt x
//!   symcalc matrix mul "[[1,2],[3,4]]" "[5,6]" --json
//!   symcalc solve --coefficients "[[2,1],[1,3]]" --constants "[5,7]" --names x,y

use clap::{Parser as ClapParser, Subcommand, ValueEnum};
use colored::Colorize;
use log::LevelFilter;
use serde::Serialize;
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};
use std::fmt::Display;

use symcalc::{
    Engine, EngineConfig, EquationSystem, MathError, MathResult, Matrix, MatrixInput, Operation,
    Response, Scope, Value,
};

#[derive(ClapParser, Debug)]
#[command(name = "symcalc")]
#[command(author = "Symcalc Team")]
#[command(version = "0.1.0")]
#[command(about = "Evaluates, differentiates and simplifies expressions; solves linear systems")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output the result envelope as JSON
    #[arg(short = 'j', long = "json", global = true)]
    json_output: bool,

    /// Engine configuration file (JSON)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<String>,

    /// Override the maximum expression depth
    #[arg(long = "max-depth", global = true)]
    max_depth: Option<usize>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate an expression
    #[command(visible_alias = "calculate-expression")]
    Eval {
        #[arg(value_name = "EXPR")]
        expression: String,

        /// Variable binding (e.g., "x=2")
        #[arg(long = "var", value_parser = parse_binding)]
        vars: Vec<(String, f64)>,
    },

    /// Apply one arithmetic operation to two numbers
    Calc {
        #[arg(value_enum)]
        op: CalcOp,

        #[arg(allow_negative_numbers = true)]
        a: f64,

        #[arg(allow_negative_numbers = true)]
        b: f64,
    },

    /// Parse and print the canonical rendering
    Parse {
        #[arg(value_name = "EXPR")]
        expression: String,
    },

    /// Differentiate an expression
    Diff {
        #[arg(value_name = "EXPR")]
        expression: String,

        /// Variable to differentiate with respect to
        #[arg(short = 'w', long = "wrt", default_value = "x")]
        variable: String,
    },

    /// Simplify; with bindings the expression is evaluated instead
    Simplify {
        #[arg(value_name = "EXPR")]
        expression: String,

        #[arg(long = "var", value_parser = parse_binding)]
        vars: Vec<(String, f64)>,
    },

    /// Rewrite as a single fraction
    Rationalize {
        #[arg(value_name = "EXPR")]
        expression: String,
    },

    /// Matrix arithmetic on JSON arrays
    Matrix {
        #[arg(value_enum)]
        op: MatrixOp,

        #[arg(value_name = "A", value_parser = parse_operand)]
        a: Value,

        #[arg(value_name = "B", value_parser = parse_operand)]
        b: Value,
    },

    /// Solve A x = b
    Solve {
        #[arg(long = "coefficients", value_parser = parse_grid)]
        coefficients: Matrix,

        #[arg(long = "constants", value_parser = parse_constants)]
        constants: Constants,

        /// Comma-separated variable names (e.g., "x,y,z")
        #[arg(long = "names", value_delimiter = ',')]
        names: Vec<String>,
    },

    /// Solve an equation system given as JSON
    System {
        #[arg(value_name = "SYSTEM", value_parser = parse_json::<EquationSystem>)]
        system: EquationSystem,

        #[arg(long = "names", value_delimiter = ',')]
        names: Vec<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CalcOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl From<CalcOp> for Operation {
    fn from(op: CalcOp) -> Self {
        match op {
            CalcOp::Add => Operation::Add,
            CalcOp::Subtract => Operation::Subtract,
            CalcOp::Multiply => Operation::Multiply,
            CalcOp::Divide => Operation::Divide,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MatrixOp {
    Add,
    Mul,
}

/// Right-hand side of `solve`, given as a JSON array
#[derive(Clone, Debug)]
struct Constants(Vec<f64>);

fn parse_binding(s: &str) -> Result<(String, f64), String> {
    let parts: Vec<&str> = s.split('=').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid binding format: {}", s));
    }

    let name = parts[0].trim().to_string();
    let value = parts[1]
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("Invalid value for {}: {}", name, parts[1]))?;

    Ok((name, value))
}

fn parse_json<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, String> {
    serde_json::from_str(s).map_err(|e| format!("Invalid JSON: {}", e))
}

fn parse_grid(s: &str) -> Result<Matrix, String> {
    let rows: Vec<Vec<f64>> = parse_json(s)?;
    Matrix::from_rows(rows).map_err(|e| e.to_string())
}

fn parse_constants(s: &str) -> Result<Constants, String> {
    parse_json(s).map(Constants)
}

/// A number, a flat vector or a nested grid
fn parse_operand(s: &str) -> Result<Value, String> {
    if let Ok(x) = s.trim().parse::<f64>() {
        return Ok(Value::Scalar(x));
    }
    let input: MatrixInput = parse_json(s)?;
    Matrix::from_input(input)
        .map(Value::Matrix)
        .map_err(|e| e.to_string())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // only fails when a logger is already installed
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

fn load_config(args: &Args) -> MathResult<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(depth) = args.max_depth {
        config = config.with_max_depth(depth);
    }
    config.validate()?;
    Ok(config)
}

fn fail(error: &MathError) -> ! {
    eprintln!("{}: {}", error.kind().red(), error);
    std::process::exit(1);
}

/// Print a result in the requested format, exiting non-zero on failure
fn report<T: Serialize + Display>(json_output: bool, label: &str, result: MathResult<T>) {
    if json_output {
        let failed = result.is_err();
        let response = Response::from_result(label, result);
        match response.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("{}: Failed to serialize to JSON: {}", "Error".red(), e);
                std::process::exit(1);
            }
        }
        if failed {
            std::process::exit(1);
        }
        return;
    }

    match result {
        Ok(value) => println!("{}: {}", label.cyan(), value.to_string().bold()),
        Err(e) => fail(&e),
    }
}

fn names_option(names: &[String]) -> Option<&[String]> {
    (!names.is_empty()).then_some(names)
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => fail(&e),
    };
    let engine = Engine::new(config);
    let json = args.json_output;

    match &args.command {
        Command::Eval { expression, vars } => {
            let scope: Scope = vars.iter().cloned().collect();
            report(json, "Result", engine.evaluate(expression, &scope));
        }
        Command::Calc { op, a, b } => {
            report(json, "Result", engine.calculate((*op).into(), *a, *b));
        }
        Command::Parse { expression } => {
            report(json, "Parsed", engine.parse(expression).map(|e| e.to_string()));
        }
        Command::Diff {
            expression,
            variable,
        } => {
            let label = format!("d/d{}", variable);
            let result = engine
                .differentiate(expression, variable)
                .map(|e| e.to_string());
            report(json, &label, result);
        }
        Command::Simplify { expression, vars } => {
            let scope: Scope = vars.iter().cloned().collect();
            let result = engine.simplify(expression, &scope).map(|s| s.to_string());
            report(json, "Simplified", result);
        }
        Command::Rationalize { expression } => {
            let result = engine.rationalize(expression).map(|e| e.to_string());
            report(json, "Rationalized", result);
        }
        Command::Matrix { op, a, b } => {
            let result = match op {
                MatrixOp::Add => engine.matrix_add(a, b),
                MatrixOp::Mul => engine.matrix_multiply(a, b),
            };
            report(json, "Result", result);
        }
        Command::Solve {
            coefficients,
            constants,
            names,
        } => {
            let result = engine.solve_linear_system(coefficients, &constants.0, names_option(names));
            report(json, "Solution", result);
        }
        Command::System { system, names } => {
            let result = engine.solve_equation_system(system, names_option(names));
            report(json, "Solution", result);
        }
    }
}
