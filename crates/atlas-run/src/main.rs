use std::collections::HashMap;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use atlas_core::error::AtlasError;
use atlas_core::interpreter::{ExecStatus, Interpreter};
use atlas_core::parser;
use atlas_core::semantics::validate_semantics;
use atlas_core::validate::SyntaxValidator;
use atlas_core::value::Value;

/// Run and check Atlas automation scripts.
#[derive(Parser)]
#[command(name = "atlas")]
#[command(about = "Run and check Atlas automation scripts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a script
    Run {
        /// Path to the script file (reads stdin if omitted)
        script: Option<PathBuf>,
        /// Resolve and log every command without invoking handlers
        #[arg(long, env = "ATLAS_DRY_RUN")]
        dry_run: bool,
        /// Parameter override as name=value (repeatable)
        #[arg(short, long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
        /// Print the execution result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a script without executing it
    Check {
        /// Path to the script file (reads stdin if omitted)
        script: Option<PathBuf>,
        /// Apply the known-typo table and print the corrected script
        #[arg(long)]
        fix: bool,
        /// Also run the semantic lint pass
        #[arg(long)]
        semantic: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run {
            script,
            dry_run,
            params,
            json,
        } => run_script(script, dry_run, &params, json).await,
        Command::Check {
            script,
            fix,
            semantic,
        } => check_script(script, fix, semantic),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn read_source(script_path: Option<&PathBuf>) -> Result<String, AtlasError> {
    match script_path {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            use std::io::Read;
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

/// `name=value` pairs from the command line, parsed with the same literal
/// rules the script language itself uses.
fn parse_overrides(params: &[String]) -> Result<HashMap<String, Value>, AtlasError> {
    let mut overrides = HashMap::new();
    for param in params {
        let Some((name, raw)) = param.split_once('=') else {
            return Err(AtlasError::Execution {
                message: format!("malformed --param '{}': expected name=value", param),
                line: 0,
            });
        };
        overrides.insert(name.trim().to_string(), Value::parse_literal(raw.trim()));
    }
    Ok(overrides)
}

async fn run_script(
    script_path: Option<PathBuf>,
    dry_run: bool,
    params: &[String],
    json: bool,
) -> Result<(), AtlasError> {
    let source = read_source(script_path.as_ref())?;
    let overrides = parse_overrides(params)?;

    let script = parser::parse(&source);
    for warning in &script.warnings {
        warn!(%warning, "parse warning");
    }
    if !script.is_executable() {
        for error in &script.errors {
            eprintln!("{}", error);
        }
        process::exit(2);
    }

    info!(
        blocks = script.metadata.total_blocks,
        variables = script.metadata.variable_count,
        dry_run,
        "running script"
    );

    let interpreter = Interpreter::with_defaults();
    let result = interpreter.execute(&script, &overrides, dry_run).await;

    if json {
        let report = serde_json::json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "result": result,
        });
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Error: could not serialize result: {}", e),
        }
    } else {
        if let Some(data) = &result.data {
            for entry in &data.execution_log {
                println!("{}", entry);
            }
        }
        match result.status {
            ExecStatus::Success => println!(
                "{} in {:.2}s",
                result.message,
                result.execution_time.as_secs_f64()
            ),
            ExecStatus::Failed => eprintln!("{}", result.message),
        }
    }

    if result.status == ExecStatus::Failed {
        process::exit(1);
    }
    Ok(())
}

fn check_script(
    script_path: Option<PathBuf>,
    fix: bool,
    semantic: bool,
) -> Result<(), AtlasError> {
    let source = read_source(script_path.as_ref())?;

    let validator = SyntaxValidator::new();
    let report = validator.validate(&source, fix);

    for fixed in &report.fixes_applied {
        eprintln!("fixed {}", fixed);
    }
    for error in &report.errors {
        eprintln!("{}", error);
    }
    for warning in &report.warnings {
        eprintln!("warning: {}", warning);
    }
    for suggestion in &report.suggestions {
        eprintln!("hint: {}", suggestion);
    }

    // Block structure is the parser's to judge; the token-level validator
    // does not track nesting.
    let checked_source = report.fixed_text.as_deref().unwrap_or(&source);
    let parsed = parser::parse(checked_source);
    for error in &parsed.errors {
        eprintln!("{}", error);
    }
    for warning in &parsed.warnings {
        eprintln!("warning: {}", warning);
    }

    if semantic {
        let sem = validate_semantics(checked_source, None);
        for issue in sem
            .timing_issues
            .iter()
            .chain(&sem.logic_issues)
            .chain(&sem.resource_issues)
            .chain(&sem.warnings)
        {
            eprintln!("semantic: {}", issue);
        }
        for suggestion in &sem.suggestions {
            eprintln!("hint: {}", suggestion);
        }
    }

    if !report.is_valid || !parsed.is_executable() {
        process::exit(2);
    }

    // With --fix the corrected script goes to stdout so it can be piped;
    // otherwise a plain confirmation.
    match report.fixed_text {
        Some(fixed_text) if fix => println!("{}", fixed_text),
        _ => println!("ok"),
    }
    Ok(())
}
