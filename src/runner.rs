//! The query runner: prompt, bind, execute, report.
//!
//! A run never returns an error to its caller. Database failures and anything
//! else that goes wrong are written to the output and surface as
//! [`RunOutcome::Failed`]. Once a connection has been opened it is closed
//! before `run` returns, whatever happened in between.

use crate::config::ConnectionConfig;
use crate::db::{Connector, QueryResult};
use crate::error::{Result, RunnerError};
use crate::prompt::Prompter;
use crate::report::{self, OutputFormat};
use crate::template::{BoundStatement, QueryTemplate};
use std::collections::HashMap;
use std::io::Write;
use tracing::{debug, info, warn};

const PARAMS_HEADER: &str =
    "--- Por favor, ingrese los valores para los siguientes parámetros ---";
const CONNECTING: &str = "\nConectando a la base de datos y ejecutando la consulta...";
const NO_RESULTS: &str = "\nLa consulta se ejecutó correctamente, pero no arrojó resultados.";
const RESULTS_HEADER: &str = "\n--- Resultados de la Consulta ---";
const CONNECTION_CLOSED: &str = "\nConexión a la base de datos cerrada.";

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Rows were returned and rendered.
    Rows(usize),
    /// The statement returned no rows but changed this many.
    Affected(u64),
    /// Nothing returned, nothing affected.
    NoResults,
    /// The run was aborted; the error has already been reported.
    Failed(RunnerError),
}

impl RunOutcome {
    /// Returns true unless the run was aborted.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Runs query templates against a database, one at a time.
pub struct QueryRunner<C, P, W> {
    connector: C,
    prompter: P,
    out: W,
    preset: HashMap<String, String>,
    format: OutputFormat,
}

impl<C: Connector, P: Prompter, W: Write> QueryRunner<C, P, W> {
    /// Creates a runner writing status messages and results to `out`.
    pub fn new(connector: C, prompter: P, out: W) -> Self {
        Self {
            connector,
            prompter,
            out,
            preset: HashMap::new(),
            format: OutputFormat::default(),
        }
    }

    /// Supplies values up front; those names are not prompted for.
    pub fn with_values(mut self, values: HashMap<String, String>) -> Self {
        self.preset = values;
        self
    }

    /// Sets the result output format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Collects placeholder values, executes the template and reports the result.
    pub async fn run(&mut self, template: &str, config: &ConnectionConfig) -> RunOutcome {
        let template = QueryTemplate::parse(template);
        info!(
            "Running template with {} placeholder(s), {} unique",
            template.placeholders().len(),
            template.unique_names().len()
        );

        let statement = match self
            .collect_values(&template)
            .and_then(|values| template.bind(&values))
        {
            Ok(statement) => statement,
            Err(e) => return self.fail(e),
        };
        debug!(
            "Bound statement with {} parameter(s): {}",
            statement.params.len(),
            statement.sql
        );

        self.execute(&statement, config).await
    }

    /// Asks once per distinct name, in alphabetical order.
    fn collect_values(&mut self, template: &QueryTemplate) -> Result<HashMap<String, String>> {
        let names = template.unique_names();
        let needs_input = names.iter().any(|name| !self.preset.contains_key(*name));
        if needs_input {
            self.status(PARAMS_HEADER);
        }

        let mut values = HashMap::with_capacity(names.len());
        for name in names {
            let value = match self.preset.get(name) {
                Some(value) => value.clone(),
                None => self.prompter.ask(name)?,
            };
            values.insert(name.to_string(), value);
        }
        Ok(values)
    }

    async fn execute(&mut self, statement: &BoundStatement, config: &ConnectionConfig) -> RunOutcome {
        self.status(CONNECTING);
        info!("Connecting to {}", config.display_string());

        let mut client = match self.connector.connect(config).await {
            Ok(client) => client,
            Err(e) => return self.fail(e),
        };

        let outcome = match client.execute(statement).await {
            Ok(result) => self.present(&result),
            Err(e) => self.fail(e),
        };

        if let Err(e) = client.close().await {
            warn!("Failed to close connection cleanly: {}", e);
        }
        self.status(CONNECTION_CLOSED);

        outcome
    }

    fn present(&mut self, result: &QueryResult) -> RunOutcome {
        if result.is_empty() {
            self.status(NO_RESULTS);
            return RunOutcome::NoResults;
        }

        if !result.has_rows() {
            let affected = result.rows_affected;
            self.status(&format!(
                "\nLa consulta se ejecutó correctamente. {} fila{} afectada{}.",
                affected,
                if affected == 1 { "" } else { "s" },
                if affected == 1 { "" } else { "s" },
            ));
            return RunOutcome::Affected(affected);
        }

        self.status(RESULTS_HEADER);
        let rendered = report::render(result, self.format);
        match writeln!(self.out, "{rendered}").and_then(|_| self.out.flush()) {
            Ok(()) => RunOutcome::Rows(result.row_count()),
            Err(e) => self.fail(e.into()),
        }
    }

    fn fail(&mut self, error: RunnerError) -> RunOutcome {
        warn!("{}: {}", error.category(), error.message());
        let message = match &error {
            RunnerError::Database(msg) => {
                format!("\nOcurrió un error de base de datos: {msg}")
            }
            other => format!("\nOcurrió un error inesperado: {}", other.message()),
        };
        self.status(&message);
        RunOutcome::Failed(error)
    }

    fn status(&mut self, message: &str) {
        if let Err(e) = writeln!(self.out, "{message}").and_then(|_| self.out.flush()) {
            warn!("Failed to write status message: {}", e);
        }
    }
}
