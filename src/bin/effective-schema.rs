//! Effective Schema CLI
//!
//! Command-line interface for preprocessing schemas, computing effective
//! schemas against data, and checking documents for resolution problems.

use std::path::{Path as FsPath, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use effective_schema::{
    diagnose, load_schema, preprocess, EngineOptions, Path, PreprocessedSchema, Selections,
    SessionMode, Severity,
};

#[derive(Parser)]
#[command(name = "effective-schema")]
#[command(about = "Resolve JSON Schemas and compute effective schemas for data")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct EngineArgs {
    /// Log resolution details (same as RUST_LOG=debug)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Session mode: file-editor, schema-editor or settings
    #[arg(long, global = true, default_value = "file-editor")]
    mode: String,

    /// Fixpoint cap for data-dependent keywords
    #[arg(long, global = true)]
    max_iterations: Option<usize>,

    /// Normalize the document first (titles, const to enum, enum types)
    #[arg(long, global = true)]
    normalize: bool,

    /// JSON file with engine options
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the preprocessed schema at a path
    Preprocess {
        /// Schema file
        schema: PathBuf,

        /// JSON Pointer into the data (default: root)
        #[arg(long, default_value = "")]
        path: String,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the effective schema at a path for a data file
    Effective {
        /// Schema file
        schema: PathBuf,

        /// Data file the schema is evaluated against
        #[arg(long)]
        data: PathBuf,

        /// JSON Pointer into the data (default: root)
        #[arg(long, default_value = "")]
        path: String,

        /// Select a oneOf branch at a path, as POINTER=INDEX (repeatable)
        #[arg(long = "select", value_name = "POINTER=INDEX")]
        selections: Vec<String>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Check a schema for dangling references and empty unions
    Check {
        /// Schema file
        schema: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.engine.verbose);

    let result = engine_options(&cli.engine).and_then(|(mode, options)| match cli.command {
        Commands::Preprocess {
            schema,
            path,
            output,
            pretty,
        } => run_preprocess(&schema, mode, &options, &path, output, pretty),

        Commands::Effective {
            schema,
            data,
            path,
            selections,
            output,
            pretty,
        } => run_effective(EffectiveArgs {
            schema,
            data,
            path,
            selections,
            output,
            pretty,
            mode,
            options,
        }),

        Commands::Check {
            schema,
            format,
            strict,
        } => run_check(&schema, &format, strict),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

/// Merge `--config` file options with command-line flags. Flags win.
fn engine_options(args: &EngineArgs) -> Result<(SessionMode, EngineOptions), u8> {
    let mode = SessionMode::parse(&args.mode).ok_or_else(|| {
        eprintln!(
            "Error: unknown mode '{}' (expected file-editor, schema-editor or settings)",
            args.mode
        );
        2u8
    })?;

    let mut options = match &args.config {
        Some(path) => {
            let value = load_schema(path).map_err(|e| {
                eprintln!("Error: {}", e);
                e.exit_code() as u8
            })?;
            serde_json::from_value::<EngineOptions>(value).map_err(|e| {
                eprintln!("Error: invalid config {}: {}", path.display(), e);
                2u8
            })?
        }
        None => EngineOptions::default(),
    };
    if let Some(max_iterations) = args.max_iterations {
        options = options.max_iterations(max_iterations);
    }
    if args.normalize {
        options = options.normalize(true);
    }
    Ok((mode, options))
}

fn load_document(
    schema_path: &FsPath,
    mode: SessionMode,
    options: &EngineOptions,
) -> Result<PreprocessedSchema, u8> {
    let raw = load_schema(schema_path).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    preprocess(&raw, mode, options).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn run_preprocess(
    schema_path: &FsPath,
    mode: SessionMode,
    options: &EngineOptions,
    path: &str,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let document = load_document(schema_path, mode, options)?;
    let node = document.schema_at(&Path::parse(path));
    write_json(&node.into_value(), output, pretty)
}

struct EffectiveArgs {
    schema: PathBuf,
    data: PathBuf,
    path: String,
    selections: Vec<String>,
    output: Option<PathBuf>,
    pretty: bool,
    mode: SessionMode,
    options: EngineOptions,
}

fn run_effective(args: EffectiveArgs) -> Result<(), u8> {
    let EffectiveArgs {
        schema,
        data: data_path,
        path,
        selections,
        output,
        pretty,
        mode,
        options,
    } = args;

    let selections = parse_selections(&selections)?;
    let document = load_document(&schema, mode, &options)?;
    let data = load_schema(&data_path).map_err(|e| {
        eprintln!("Error: loading data: {}", e);
        e.exit_code() as u8
    })?;

    let effective = document.effective_schema_selecting(&data, &Path::parse(&path), &selections);
    write_json(&effective.schema.into_value(), output, pretty)
}

/// Parse `POINTER=INDEX` pairs.
fn parse_selections(raw: &[String]) -> Result<Selections, u8> {
    raw.iter()
        .map(|entry| {
            let parsed = entry
                .rsplit_once('=')
                .and_then(|(pointer, index)| Some((Path::parse(pointer), index.parse::<usize>().ok()?)));
            parsed.ok_or_else(|| {
                eprintln!("Error: invalid selection '{}' (expected POINTER=INDEX)", entry);
                2u8
            })
        })
        .collect()
}

fn run_check(schema_path: &FsPath, format: &str, strict: bool) -> Result<(), u8> {
    let raw = load_schema(schema_path).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    let result = diagnose(&raw);
    let passed = result.is_ok() && (!strict || result.warnings == 0);

    if format == "json" {
        let json = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", json);
    } else {
        for diag in &result.diagnostics {
            let (color, label) = match diag.severity {
                Severity::Error => ("\x1b[31m", "error"),
                Severity::Warning => ("\x1b[33m", "warning"),
            };
            println!(
                "  {}{}[{}]\x1b[0m: {} - {}",
                color, label, diag.code, diag.path, diag.message
            );
        }
        if passed {
            println!(
                "\x1b[32m✓ {} passed ({} warnings)\x1b[0m",
                schema_path.display(),
                result.warnings
            );
        } else {
            println!(
                "\x1b[31m✗ {} failed ({} errors, {} warnings)\x1b[0m",
                schema_path.display(),
                result.errors,
                result.warnings
            );
        }
    }

    if passed {
        Ok(())
    } else {
        Err(1)
    }
}

fn write_json(value: &Value, output: Option<PathBuf>, pretty: bool) -> Result<(), u8> {
    let json_output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}
