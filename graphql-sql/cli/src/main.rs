use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::anyhow;
use anyhow::bail;
use apollo_compiler::ExecutableDocument;
use apollo_compiler::Schema;
use clap::Parser;
use graphql_sql::BindingsDocument;
use graphql_sql::Compiler;
use graphql_sql::Variables;
use tracing_subscriber::EnvFilter;

/// CLI arguments. See <https://docs.rs/clap/latest/clap/_derive/index.html>
#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Compiles every root field of an operation and prints the SQL as JSON
    Compile {
        /// The path to the schema, or `-` for stdin
        #[arg(long)]
        schema: PathBuf,
        /// The path to the YAML bindings document, or `-` for stdin
        #[arg(long)]
        bindings: PathBuf,
        /// The path to the executable document, or `-` for stdin
        #[arg(long)]
        query: PathBuf,
        /// The path to a JSON object of variable values
        #[arg(long)]
        variables: Option<PathBuf>,
        /// The operation to compile when the document has several
        #[arg(long)]
        operation: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Compile {
            schema,
            bindings,
            query,
            variables,
            operation,
        } => compile(
            &schema,
            &bindings,
            &query,
            variables.as_deref(),
            operation.as_deref(),
        ),
    }
}

fn compile(
    schema_path: &Path,
    bindings_path: &Path,
    query_path: &Path,
    variables_path: Option<&Path>,
    operation_name: Option<&str>,
) -> anyhow::Result<()> {
    let stdin_inputs = [Some(schema_path), Some(bindings_path), Some(query_path), variables_path]
        .into_iter()
        .flatten()
        .filter(|path| is_stdin(path))
        .count();
    if stdin_inputs > 1 {
        bail!("at most one input can be read from stdin");
    }

    let schema = Schema::parse_and_validate(read_input(schema_path)?, schema_path)
        .map_err(|invalid| anyhow!("invalid schema:\n{}", invalid.errors))?;
    let document = BindingsDocument::from_yaml(&read_input(bindings_path)?)
        .with_context(|| format!("invalid bindings in {}", bindings_path.display()))?;
    let query = ExecutableDocument::parse_and_validate(&schema, read_input(query_path)?, query_path)
        .map_err(|invalid| anyhow!("invalid query:\n{}", invalid.errors))?;
    let variables: Variables = match variables_path {
        Some(path) => serde_json::from_str(&read_input(path)?)
            .with_context(|| format!("variables in {} must be a JSON object", path.display()))?,
        None => Variables::new(),
    };

    let bindings = document.to_bindings();
    let compiled = Compiler::new(&schema, &bindings)
        .with_config(document.compiler)
        .compile_operation(&query, operation_name, &variables)?;
    println!("{}", serde_json::to_string_pretty(&compiled)?);
    Ok(())
}

fn is_stdin(path: &Path) -> bool {
    path == Path::new("-")
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if is_stdin(path) {
        io::read_to_string(io::stdin()).context("failed to read stdin")
    } else {
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
    }
}
