//! litemodel: browse, inspect and dump SQLite model databases.
//!
//! # Usage
//!
//! ```bash
//! # Serve a database over HTTP
//! litemodel serve -d reviews.db --html
//!
//! # Print rows
//! litemodel show -d reviews.db reviews --where "rating>=3" --limit 10
//!
//! # Dump as SQL
//! litemodel export -d reviews.db -o reviews.sql
//! ```

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use litemodel::browse::BrowseServer;
use litemodel::config::{CONFIG_ENV, Config, ResponseFormat};
use litemodel::paths;
use litemodel::prelude::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "litemodel")]
#[command(version)]
#[command(about = "Browse, inspect and dump SQLite model databases", long_about = None)]
#[command(after_help = "EXAMPLES:
    litemodel serve -d reviews.db -p 8080 --html
    litemodel tables -d /srv/db/reviews.db
    litemodel show -d reviews.db reviews -w \"rating>=3,rid=1..10\"
    litemodel export -d reviews.db --schema-only")]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: <config dir>/litemodel/config.toml)
    #[arg(long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DbArgs {
    /// Database file name or path
    #[arg(short, long)]
    database: Option<String>,

    /// Directory holding the database file
    #[arg(short, long)]
    location: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve table contents over HTTP
    Serve {
        #[command(flatten)]
        db: DbArgs,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long)]
        bind: Option<String>,

        /// Respond with HTML pages
        #[arg(short = 'x', long, conflicts_with = "json")]
        html: bool,

        /// Respond with JSON
        #[arg(short, long)]
        json: bool,

        /// Row cap for requests without ?limit=
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Dump the database as SQL
    Export {
        #[command(flatten)]
        db: DbArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only CREATE statements, no rows
        #[arg(long)]
        schema_only: bool,
    },
    /// List tables
    Tables {
        #[command(flatten)]
        db: DbArgs,

        /// Also print each table's columns
        #[arg(long)]
        schema: bool,
    },
    /// Print the rows of a table
    Show {
        #[command(flatten)]
        db: DbArgs,

        /// Table name
        table: String,

        /// Filter expression, e.g. "rating>=3,header='good'"
        #[arg(short = 'w', long = "where")]
        filter: Option<String>,

        /// Maximum number of rows
        #[arg(long)]
        limit: Option<u64>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).context("loading config")?;
    init_tracing(cli.verbose, config.log_level.as_deref());

    match cli.command {
        Commands::Serve {
            db,
            port,
            bind,
            html,
            json,
            limit,
        } => {
            let path = db_path(&db, &config)?;
            let mut server = config.server.clone();
            if let Some(port) = port {
                server.port = port;
            }
            if let Some(bind) = bind {
                server.bind = bind;
            }
            if html {
                server.format = ResponseFormat::Html;
            } else if json {
                server.format = ResponseFormat::Json;
            }
            if limit.is_some() {
                server.row_limit = limit;
            }

            BrowseServer::open(&path, server).await?.serve().await?;
        }
        Commands::Export {
            db,
            output,
            schema_only,
        } => {
            let catalog = open_catalog(&db, &config).await?;
            let dump = catalog.export(schema_only).await?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, dump)
                        .await
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("{} Wrote dump to {}", "✓".green(), path.display().to_string().cyan());
                }
                None => print!("{}", dump),
            }
            catalog.close().await;
        }
        Commands::Tables { db, schema } => {
            let catalog = open_catalog(&db, &config).await?;
            let tables = catalog.table_names().await?;
            if tables.is_empty() {
                println!("{}", "(no tables)".dimmed());
            }
            for table in &tables {
                println!("{}", table.white().bold());
                if schema {
                    let described = catalog.describe(table).await?;
                    for column in described.columns() {
                        let ty = described
                            .column_type(column)
                            .map(|t| t.declared().to_string())
                            .unwrap_or_default();
                        let key = if described.is_primary_key(column) { " PK" } else { "" };
                        println!("  {} {}{}", column, ty.dimmed(), key.yellow());
                    }
                }
            }
            catalog.close().await;
        }
        Commands::Show {
            db,
            table,
            filter,
            limit,
            format,
        } => {
            let catalog = open_catalog(&db, &config).await?;
            let mut filter = parse_filter(filter.as_deref().unwrap_or(""))?;
            if let Some(limit) = limit {
                filter = filter.limit(limit);
            }
            let rows = catalog.fetch_rows(&table, &filter).await?;
            format_output(&rows, format)?;
            catalog.close().await;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, configured: Option<&str>) {
    let level = if verbose {
        "debug"
    } else {
        configured.unwrap_or("info")
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn db_path(db: &DbArgs, config: &Config) -> Result<PathBuf> {
    let Some(name) = db.database.as_deref().or(config.database.as_deref()) else {
        bail!("no database given; pass -d <db> or set `database` in the config file");
    };
    let location = db.location.as_deref().or(config.location.as_deref());
    Ok(paths::resolve_from_env(name, location))
}

async fn open_catalog(db: &DbArgs, config: &Config) -> Result<Catalog> {
    let path = db_path(db, config)?;
    tracing::debug!(db = %path.display(), "opening database");
    Ok(Catalog::open(&path).await?)
}

fn format_output(rows: &TableRows, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(rows)?);
        }
        OutputFormat::Table => {
            if rows.rows.is_empty() {
                println!("{}", "(no results)".dimmed());
                return Ok(());
            }

            let cells: Vec<Vec<String>> = rows
                .rows
                .iter()
                .map(|row| row.iter().map(ToString::to_string).collect())
                .collect();

            // Calculate column widths
            let mut widths: Vec<usize> = rows.columns.iter().map(|c| c.chars().count()).collect();
            for row in &cells {
                for (w, cell) in widths.iter_mut().zip(row) {
                    *w = (*w).max(cell.chars().count());
                }
            }

            let header: Vec<String> = rows
                .columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:width$}", c, width = w))
                .collect();
            println!("{}", header.join(" │ ").white().bold());

            let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            println!("{}", sep.join("─┼─").dimmed());

            for row in &cells {
                let line: Vec<String> = row
                    .iter()
                    .zip(&widths)
                    .map(|(v, w)| format!("{:width$}", v, width = w))
                    .collect();
                println!("{}", line.join(" │ "));
            }

            println!();
            println!("{} row(s) returned", rows.count.to_string().cyan());
        }
    }
    Ok(())
}
