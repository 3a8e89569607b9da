//! Query Runner - run parameterized SQL templates against PostgreSQL.

use db_query_runner::cli::Cli;
use db_query_runner::config::{Config, ConnectionConfig};
use db_query_runner::db::PostgresConnector;
use db_query_runner::error::{Result, RunnerError};
use db_query_runner::logging;
use db_query_runner::prompt::ConsolePrompter;
use db_query_runner::runner::QueryRunner;
use std::io::Write;
use tracing::{debug, info};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // PG* variables may come from a local .env file
    dotenvy::dotenv().ok();
    logging::init_stderr_logging();

    if let Err(e) = run().await {
        report_startup_error(&e, &mut std::io::stderr());
        std::process::exit(1);
    }
}

/// Writes a startup failure to `out` as a single line.
fn report_startup_error(e: &RunnerError, out: &mut impl Write) {
    debug!("Startup failed ({})", e.category());
    let _ = writeln!(out, "{e}");
}

async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let connection = resolve_connection(&cli, &config)?;
    let template = cli.load_template(&config)?;
    let format = cli.output_format()?;

    let prompter = ConsolePrompter::stdio();
    let mut runner = QueryRunner::new(PostgresConnector, prompter, std::io::stdout())
        .with_values(cli.param_values())
        .with_format(format);

    // Failures inside the run are reported on stdout; the process still exits normally.
    let outcome = runner.run(&template, &connection).await;
    info!("Run finished: {:?}", outcome);

    Ok(())
}

/// Resolves the final connection configuration from CLI args, config file, and environment.
///
/// Precedence, highest first: CLI arguments, the named connection (`-c`) or the
/// `default` connection from the config file, then `PG*` environment variables.
fn resolve_connection(cli: &Cli, config: &Config) -> Result<ConnectionConfig> {
    let mut connection = match cli.connection_name() {
        Some(name) => config.get_connection(Some(name)).cloned().ok_or_else(|| {
            RunnerError::config(format!("Connection '{name}' not found in config file"))
        })?,
        None => config.get_connection(None).cloned().unwrap_or_default(),
    };

    if let Some(overrides) = cli.to_connection_config()? {
        connection.merge(&overrides);
    }

    connection.apply_env_defaults();
    info!("Connection: {}", connection.display_string());

    Ok(connection)
}
