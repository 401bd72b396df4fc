///
/// rowmap CLI - inspect and run query templates
///
/// - rowmap expand <template>: print the rewritten SQL and flattened arguments
/// - rowmap query --db <file> <template>: run a query and print rows as JSON
/// - rowmap exec --db <file> <template>: run a statement and print its effect
///
/// Arguments are given as a JSON array. A nested array is an IN list:
/// `--args '[7, [1, 2, 3]]'`.
///

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value as Json};
use tracing_subscriber::EnvFilter;

use rowmap::scan::ValueSink;
use rowmap::{join_close, substitute_columns, Arg, Error, Executor, Mapper, MapperConfig, Result, Rows, Value};
use rowmap_sqlite::SqliteExecutor;

#[derive(Parser)]
#[command(name = "rowmap")]
#[command(author, version, about = "Expand and run rowmap query templates", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite a template without running it
    Expand {
        /// The query template
        template: String,

        /// Positional arguments as a JSON array
        #[arg(long, default_value = "[]")]
        args: String,

        /// Comma-separated columns substituted for the column marker
        #[arg(long)]
        columns: Option<String>,

        /// Mapper configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run a row-producing template against a SQLite database
    Query {
        /// Database file
        #[arg(long)]
        db: PathBuf,

        /// The query template
        template: String,

        /// Positional arguments as a JSON array
        #[arg(long, default_value = "[]")]
        args: String,

        /// Mapper configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run a statement against a SQLite database
    Exec {
        /// Database file
        #[arg(long)]
        db: PathBuf,

        /// The statement template
        template: String,

        /// Positional arguments as a JSON array
        #[arg(long, default_value = "[]")]
        args: String,

        /// Mapper configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Expand {
            template,
            args,
            columns,
            config,
        } => load_mapper(config.as_deref())
            .and_then(|mapper| expand_template(&mapper, &template, &args, columns.as_deref())),
        Commands::Query {
            db,
            template,
            args,
            config,
        } => load_mapper(config.as_deref()).and_then(|mapper| {
            let executor = SqliteExecutor::open(&db)?;
            query_rows(&mapper, &executor, &template, &args)
        }),
        Commands::Exec {
            db,
            template,
            args,
            config,
        } => load_mapper(config.as_deref()).and_then(|mapper| {
            let executor = SqliteExecutor::open(&db)?;
            exec_statement(&mapper, &executor, &template, &args)
        }),
    };

    match result {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn load_mapper(config: Option<&Path>) -> Result<Mapper> {
    match config {
        Some(path) => {
            let config = MapperConfig::from_path(path)?;
            tracing::debug!(path = %path.display(), naming = ?config.naming, "loaded mapper configuration");
            Mapper::from_config(config)
        }
        None => Ok(Mapper::new()),
    }
}

fn expand_template(mapper: &Mapper, template: &str, args: &str, columns: Option<&str>) -> Result<Json> {
    let args = parse_args(args)?;
    let template = match columns {
        Some(list) => {
            let list = list
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            substitute_columns(template, &mapper.config().column_marker, &list)
        }
        None => template.to_string(),
    };
    let expanded = mapper.expand(&template, args)?;
    Ok(json!({
        "sql": expanded.sql,
        "args": expanded.args,
    }))
}

fn query_rows<E: Executor>(mapper: &Mapper, executor: &E, template: &str, args: &str) -> Result<Json> {
    let expanded = mapper.expand(template, parse_args(args)?)?;
    let mut rows = executor.query(&expanded.sql, &expanded.args)?;
    let result = collect_objects(&mut rows);
    join_close(result, rows.close()).map(Json::Array)
}

fn collect_objects<R: Rows>(rows: &mut R) -> Result<Vec<Json>> {
    let columns = rows.columns()?;
    let mut out = Vec::new();
    while rows.next()? {
        let mut sink = ValueSink::new(columns.len());
        rows.scan(&mut sink)?;
        let object: Map<String, Json> = columns
            .iter()
            .cloned()
            .zip(sink.into_values().into_iter().map(to_json))
            .collect();
        out.push(Json::Object(object));
    }
    Ok(out)
}

fn exec_statement<E: Executor>(mapper: &Mapper, executor: &E, template: &str, args: &str) -> Result<Json> {
    let result = mapper.exec(executor, template, parse_args(args)?)?;
    Ok(json!({
        "rows_affected": result.rows_affected,
        "last_insert_id": result.last_insert_id,
    }))
}

/// A top-level JSON array; nested arrays become IN lists.
fn parse_args(text: &str) -> Result<Vec<Arg>> {
    let parsed: Json = serde_json::from_str(text)
        .map_err(|e| Error::usage(format!("--args is not valid JSON: {}", e)))?;
    let Json::Array(items) = parsed else {
        return Err(Error::usage("--args must be a JSON array"));
    };

    items
        .iter()
        .map(|item| match item {
            Json::Array(list) => list.iter().map(from_json).collect::<Result<Vec<_>>>().map(Arg::List),
            scalar => from_json(scalar).map(Arg::Scalar),
        })
        .collect()
}

fn from_json(value: &Json) -> Result<Value> {
    match value {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::from(*b)),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Integer(i)),
            None => n
                .as_f64()
                .map(Value::Real)
                .ok_or_else(|| Error::usage(format!("number {} is out of range", n))),
        },
        Json::String(s) => Ok(Value::Text(s.clone())),
        other => Err(Error::usage(format!("unsupported argument {}", other))),
    }
}

fn to_json(value: Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Integer(i) => json!(i),
        Value::Real(f) => json!(f),
        Value::Text(s) => Json::String(s),
        Value::Blob(b) => json!(b),
    }
}
