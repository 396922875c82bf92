//! Schema dump utility
//!
//! Lists the tables of one schema and writes every column to a delimited
//! file (`TABNAME,COLNAME,TYPENAME,COLNO,NULLS`).
//!
//! **Usage:**
//! ```bash
//! schema-dump [--schema IEPLANE] [--output database_schema.csv] [--delimiter ,]
//! ```

mod export;

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use common::config::{load_dotenv, DbConfig};
use data_access::DatabasePool;
use tracing::info;

/// Database schema export
#[derive(Parser, Debug)]
#[command(name = "schema-dump")]
#[command(about = "Export the tables and columns of a database schema")]
struct Args {
    /// Schema to export (defaults to the connection's schema)
    #[arg(long, env = "DB_SCHEMA")]
    schema: Option<String>,

    /// Output file
    #[arg(long, short, value_name = "FILE", default_value = "database_schema.csv")]
    output: PathBuf,

    /// Field delimiter
    #[arg(long, default_value_t = ',')]
    delimiter: char,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = DbConfig::from_env().context("reading database configuration")?;
    let schema = args.schema.unwrap_or_else(|| config.schema.clone());

    let pool = DatabasePool::connect(&config)
        .await
        .with_context(|| format!("connecting to {}", config.display_target()))?;

    let tables = pool
        .list_tables(&schema, None)
        .await
        .with_context(|| format!("listing tables in schema '{schema}'"))?;
    let columns = pool
        .schema_columns(&schema)
        .await
        .with_context(|| format!("reading columns of schema '{schema}'"))?;
    pool.close().await;

    info!(schema = %schema, tables = tables.len(), columns = columns.len(), "schema loaded");
    for table in &tables {
        let count = columns.iter().filter(|c| c.table == table.name).count();
        info!(table = %table.name, kind = ?table.kind, columns = count, "table");
    }

    let file = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    export::write_columns(BufWriter::new(file), &columns, args.delimiter)
        .with_context(|| format!("writing {}", args.output.display()))?;

    info!(path = %args.output.display(), rows = columns.len(), "schema exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["schema-dump", "--schema", "IEPLANE"]).unwrap();
        assert_eq!(args.schema.as_deref(), Some("IEPLANE"));
        assert_eq!(args.output, PathBuf::from("database_schema.csv"));
        assert_eq!(args.delimiter, ',');
    }

    #[test]
    fn test_args_custom_delimiter() {
        let args =
            Args::try_parse_from(["schema-dump", "-o", "out.tsv", "--delimiter", ";"]).unwrap();
        assert_eq!(args.output, PathBuf::from("out.tsv"));
        assert_eq!(args.delimiter, ';');
    }
}
