//! dbpane - run SQL against MySQL, MariaDB, SQLite, Oracle or PostgreSQL.

use dbpane::cli::Cli;
use dbpane::config::Config;
use dbpane::db::Value;
use dbpane::error::{DbError, Result};
use dbpane::output::{self, OutputFormat};
use dbpane::{logging, ConnectionManager};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse_args();

    if cli.log_file {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    if let Err(e) = run(cli).await {
        eprintln!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let (backend, settings) = cli.resolve_connection(&config)?.ok_or_else(|| {
        DbError::config("No database connection configured. Use --help for usage information.")
    })?;

    let mut manager = ConnectionManager::new();
    manager.connect(backend, &settings).await?;
    println!(
        "{}",
        output::connected_message(backend.display_name(), &settings.display_string())
    );

    let params = cli.bind_params();
    let outcome = match &cli.execute {
        Some(sql) => run_statement(&mut manager, sql, &params, cli.format).await,
        None => run_repl(&mut manager, cli.format).await,
    };

    manager.close().await?;
    outcome
}

async fn run_statement(
    manager: &mut ConnectionManager,
    sql: &str,
    params: &[Value],
    format: OutputFormat,
) -> Result<()> {
    let result = manager.execute(sql, params).await?;
    let rendered = output::render(&result, format)?;
    if !rendered.is_empty() {
        println!("{rendered}");
    }
    Ok(())
}

/// Reads statements from stdin, one per line, on the same session.
///
/// Statements run without bind parameters. A failed statement is reported
/// and the loop continues.
async fn run_repl(manager: &mut ConnectionManager, format: OutputFormat) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| DbError::internal(format!("Failed to read stdin: {e}")))?
    {
        let sql = line.trim();
        if sql.is_empty() {
            continue;
        }
        if let Err(e) = run_statement(manager, sql, &[], format).await {
            eprintln!("{}: {}", e.category(), e);
        }
    }

    Ok(())
}
