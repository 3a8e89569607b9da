//! End-to-end runner tests against the mock database.

use db_query_runner::config::ConnectionConfig;
use db_query_runner::db::{ColumnInfo, MockConnector, QueryResult, Value};
use db_query_runner::prompt::ConsolePrompter;
use db_query_runner::report::OutputFormat;
use db_query_runner::runner::{QueryRunner, RunOutcome};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::io::Cursor;

type TestRunner = QueryRunner<MockConnector, ConsolePrompter<Cursor<Vec<u8>>, Vec<u8>>, Vec<u8>>;

fn runner(connector: MockConnector, input: &str) -> TestRunner {
    let prompter = ConsolePrompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new());
    QueryRunner::new(connector, prompter, Vec::new())
}

fn output(runner: &TestRunner) -> String {
    String::from_utf8(runner.output().clone()).unwrap()
}

fn one_row() -> QueryResult {
    QueryResult::with_data(
        vec![ColumnInfo::new("id", "INT4"), ColumnInfo::new("name", "TEXT")],
        vec![vec![Value::Int(1), Value::String("Alice".to_string())]],
    )
}

#[tokio::test]
async fn test_duplicate_placeholder_prompted_once_bound_twice() {
    let mut runner = runner(MockConnector::returning(one_row()), "1,2,3\n");

    let outcome = runner
        .run(
            "SELECT * FROM t WHERE id IN (&ids) AND id2 IN (&ids)",
            &ConnectionConfig::default(),
        )
        .await;

    assert!(matches!(outcome, RunOutcome::Rows(1)));

    let log = runner.connector().log();
    assert_eq!(log.executed.len(), 1);
    assert_eq!(
        log.executed[0].sql,
        "SELECT * FROM t WHERE id IN ($1) AND id2 IN ($2)"
    );
    assert_eq!(log.executed[0].params, vec!["1,2,3", "1,2,3"]);

    let out = output(&runner);
    assert!(out.contains("--- Por favor, ingrese los valores para los siguientes parámetros ---"));
}

#[tokio::test]
async fn test_prompts_in_alphabetical_order() {
    let connector = MockConnector::returning(one_row());
    let prompter = ConsolePrompter::new(Cursor::new(b"va\nvb\nvc\n".to_vec()), Vec::new());
    let mut runner = QueryRunner::new(connector, prompter, Vec::new());

    runner
        .run("SELECT &c, &a, &b, &a", &ConnectionConfig::default())
        .await;

    let log = runner.connector().log();
    // a <- va, b <- vb, c <- vc, bound in template order
    assert_eq!(log.executed[0].params, vec!["vc", "va", "vb", "va"]);
    assert_eq!(log.executed[0].sql, "SELECT $1, $2, $3, $4");
}

#[tokio::test]
async fn test_static_template_runs_without_prompts() {
    // Empty input: any prompt would hit end of input and fail the run.
    let mut runner = runner(MockConnector::returning(one_row()), "");

    let outcome = runner.run("SELECT 1", &ConnectionConfig::default()).await;

    assert!(matches!(outcome, RunOutcome::Rows(1)));
    let out = output(&runner);
    assert!(!out.contains("Por favor"));
    assert_eq!(runner.connector().log().executed[0].params.len(), 0);
}

#[tokio::test]
async fn test_rows_rendered_as_table() {
    let mut runner = runner(MockConnector::returning(one_row()), "");

    runner.run("SELECT id, name FROM users", &ConnectionConfig::default()).await;

    let out = output(&runner);
    let expected = "
Conectando a la base de datos y ejecutando la consulta...

--- Resultados de la Consulta ---
┌──────┬───────┐
│ id   │ name  │
├──────┼───────┤
│    1 │ Alice │
└──────┴───────┘
1 fila (0 ms)

Conexión a la base de datos cerrada.
";
    assert_eq!(out, expected);
}

#[tokio::test]
async fn test_json_format() {
    let mut runner = runner(MockConnector::returning(one_row()), "").with_format(OutputFormat::Json);

    runner.run("SELECT id, name FROM users", &ConnectionConfig::default()).await;

    let out = output(&runner);
    assert!(out.contains("\"name\": \"Alice\""));
    assert!(!out.contains('┌'));
}

#[tokio::test]
async fn test_zero_rows_reports_no_results() {
    let mut runner = runner(MockConnector::returning(QueryResult::new()), "7\n");

    let outcome = runner
        .run("SELECT * FROM t WHERE id = &id", &ConnectionConfig::default())
        .await;

    assert!(matches!(outcome, RunOutcome::NoResults));
    let out = output(&runner);
    assert!(out.contains("La consulta se ejecutó correctamente, pero no arrojó resultados."));
    assert!(!out.contains("Resultados de la Consulta"));
    assert!(out.ends_with("Conexión a la base de datos cerrada.\n"));
    assert_eq!(runner.connector().log().closes, 1);
}

#[tokio::test]
async fn test_affected_rows_without_result_set() {
    let mut runner = runner(MockConnector::returning(QueryResult::affected(3)), "x\n");

    let outcome = runner
        .run("UPDATE t SET flag = true WHERE code = &code", &ConnectionConfig::default())
        .await;

    assert!(matches!(outcome, RunOutcome::Affected(3)));
    assert!(output(&runner).contains("3 filas afectadas."));
}

#[tokio::test]
async fn test_database_error_reported_and_connection_closed() {
    let connector = MockConnector::failing_query("ERROR: relation \"t\" does not exist");
    let mut runner = runner(connector, "1\n");

    let outcome = runner
        .run("SELECT * FROM t WHERE id = &id", &ConnectionConfig::default())
        .await;

    match outcome {
        RunOutcome::Failed(e) => assert!(e.is_database()),
        other => panic!("Expected failure, got {:?}", other),
    }

    let out = output(&runner);
    let error_at = out
        .find("Ocurrió un error de base de datos: ERROR: relation \"t\" does not exist")
        .expect("database error reported");
    let closed_at = out
        .find("Conexión a la base de datos cerrada.")
        .expect("close reported");
    assert!(error_at < closed_at);

    let log = runner.connector().log();
    assert_eq!(log.connects, 1);
    assert_eq!(log.closes, 1);
}

#[tokio::test]
async fn test_connection_refused_has_nothing_to_close() {
    let mut runner = runner(MockConnector::refusing("Cannot connect to localhost:5432."), "");

    let outcome = runner.run("SELECT 1", &ConnectionConfig::default()).await;

    assert!(matches!(outcome, RunOutcome::Failed(_)));
    let out = output(&runner);
    assert!(out.contains("Ocurrió un error de base de datos: Cannot connect to localhost:5432."));
    assert!(!out.contains("cerrada"));
    assert_eq!(runner.connector().log().closes, 0);
}

#[tokio::test]
async fn test_closed_input_is_unexpected_error() {
    let mut runner = runner(MockConnector::echo(), "");

    let outcome = runner
        .run("SELECT * FROM t WHERE id = &id", &ConnectionConfig::default())
        .await;

    match outcome {
        RunOutcome::Failed(e) => assert!(!e.is_database()),
        other => panic!("Expected failure, got {:?}", other),
    }
    assert!(output(&runner).contains("Ocurrió un error inesperado"));

    // Nothing was executed and no connection was opened.
    let log = runner.connector().log();
    assert_eq!(log.connects, 0);
    assert!(log.executed.is_empty());
}

#[tokio::test]
async fn test_preset_values_skip_prompts() {
    let values: HashMap<String, String> = [("b".to_string(), "preset".to_string())].into();
    let mut runner = runner(MockConnector::returning(one_row()), "typed\n").with_values(values);

    runner
        .run("SELECT &a, &b, &a", &ConnectionConfig::default())
        .await;

    let log = runner.connector().log();
    assert_eq!(log.executed[0].params, vec!["typed", "preset", "typed"]);
}

#[tokio::test]
async fn test_all_values_preset_prints_no_header() {
    let values: HashMap<String, String> = [("id".to_string(), "5".to_string())].into();
    let mut runner = runner(MockConnector::returning(one_row()), "").with_values(values);

    let outcome = runner
        .run("SELECT * FROM t WHERE id = &id", &ConnectionConfig::default())
        .await;

    assert!(outcome.is_success());
    assert!(!output(&runner).contains("Por favor"));
}
