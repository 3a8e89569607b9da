//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient` trait
//! for PostgreSQL databases using sqlx. Each client holds a single connection;
//! there is no pool, no retry and no statement timeout.

use crate::config::ConnectionConfig;
use crate::db::{ColumnInfo, Connector, DatabaseClient, QueryResult, Row, Value};
use crate::error::{Result, RunnerError};
use crate::template::BoundStatement;
use async_trait::async_trait;
use futures::TryStreamExt;
use rust_decimal::Decimal;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, Postgres};
use sqlx::{
    Column as SqlxColumn, Connection, Either, Executor, Row as SqlxRow, Statement as _, TypeInfo,
    ValueRef,
};
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// Resolves the SQL spelling of each inferred parameter type, in parameter order.
const FORMAT_TYPES_SQL: &str = "SELECT format_type(NULLIF(t, 0)::oid, NULL) \
     FROM unnest($1::int8[]) WITH ORDINALITY AS p(t, n) ORDER BY n";

/// PostgreSQL database client.
#[derive(Debug)]
pub struct PostgresClient {
    conn: Option<PgConnection>,
}

/// Connector that opens real PostgreSQL connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresConnector;

impl PostgresClient {
    /// Opens a single connection described by `config`.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        debug!("Connecting to {}", config.display_string());

        let conn = PgConnection::connect_with(&connect_options(config))
            .await
            .map_err(|e| map_connection_error(e, config))?;

        debug!("Successfully connected to database");
        Ok(Self { conn: Some(conn) })
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
        let client = PostgresClient::connect(config).await?;
        Ok(Box::new(client))
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn execute(&mut self, statement: &BoundStatement) -> Result<QueryResult> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| RunnerError::unexpected("Connection is already closed"))?;

        let sql = typed_sql(conn, statement).await;
        let start = Instant::now();

        // Values go over the wire as text parameters, never spliced into the SQL.
        let mut query = sqlx::query::<Postgres>(&sql);
        for param in &statement.params {
            query = query.bind(param.as_str());
        }

        let mut pg_rows: Vec<PgRow> = Vec::new();
        let mut rows_affected = 0;
        {
            let mut results = (&mut *conn).fetch_many(query);
            while let Some(item) = results
                .try_next()
                .await
                .map_err(|e| RunnerError::database(format_query_error(e)))?
            {
                match item {
                    Either::Left(done) => rows_affected += done.rows_affected(),
                    Either::Right(row) => pg_rows.push(row),
                }
            }
        }

        let execution_time = start.elapsed();
        debug!(
            "Statement returned {} rows ({} affected) in {:?}",
            pg_rows.len(),
            rows_affected,
            execution_time
        );

        let columns: Vec<ColumnInfo> = pg_rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();

        let rows: Vec<Row> = pg_rows.iter().map(convert_row).collect();

        Ok(QueryResult {
            columns,
            rows,
            rows_affected,
            execution_time,
        })
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .await
                .map_err(|e| RunnerError::database(e.to_string()))?;
        }
        Ok(())
    }
}

/// Wraps each marker in a cast to the type the server infers for it.
///
/// Parameters are always bound as `text`, so `int_col = $1` would otherwise
/// fail with `operator does not exist: integer = text`. Markers inferred as
/// `text`, or whose type the server cannot infer, are left bare.
async fn typed_sql(conn: &mut PgConnection, statement: &BoundStatement) -> String {
    if statement.params.is_empty() {
        return statement.sql.clone();
    }

    let types = match infer_parameter_types(conn, &statement.sql).await {
        Ok(types) => types,
        Err(e) => {
            debug!("Could not infer parameter types, binding as text: {}", e);
            return statement.sql.clone();
        }
    };

    statement.render_markers(|index| match types.get(index) {
        Some(Some(ty)) if ty != "text" && ty != "unknown" => {
            format!("CAST(${}::text AS {})", index + 1, ty)
        }
        _ => format!("${}", index + 1),
    })
}

/// Prepares `sql` without declared parameter types and returns the SQL name
/// of each type the server inferred.
async fn infer_parameter_types(
    conn: &mut PgConnection,
    sql: &str,
) -> std::result::Result<Vec<Option<String>>, sqlx::Error> {
    let prepared = (&mut *conn).prepare(sql).await?;
    let oids: Vec<i64> = match prepared.parameters() {
        Some(Either::Left(types)) => types
            .iter()
            .map(|ty| ty.oid().map(|oid| i64::from(oid.0)).unwrap_or(0))
            .collect(),
        _ => return Ok(Vec::new()),
    };

    let names = sqlx::query_scalar::<Postgres, Option<String>>(FORMAT_TYPES_SQL)
        .bind(oids)
        .fetch_all(&mut *conn)
        .await?;
    debug!("Inferred parameter types: {:?}", names);
    Ok(names)
}

/// Builds sqlx connect options from the connection config.
fn connect_options(config: &ConnectionConfig) -> PgConnectOptions {
    let mut options = PgConnectOptions::new()
        .host(config.host.as_deref().unwrap_or("localhost"))
        .port(config.port());

    if let Some(database) = &config.database {
        options = options.database(database);
    }
    if let Some(user) = &config.user {
        options = options.username(user);
    }
    if let Some(password) = &config.password {
        options = options.password(password);
    }

    options
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INT2" | "SMALLINT" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT4" | "INT" | "INTEGER" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "FLOAT4" | "REAL" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "FLOAT8" | "DOUBLE PRECISION" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "NUMERIC" => match row.try_get::<Option<Decimal>, _>(index) {
            Ok(Some(v)) => Value::Decimal(v.to_string()),
            Ok(None) => Value::Null,
            Err(_) if is_null_at(row, index) => Value::Null,
            // NaN, infinities and values beyond 28 significant digits
            Err(_) => unsupported(type_name),
        },

        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),

        "TIME" => row
            .try_get::<Option<chrono::NaiveTime>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),

        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),

        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_rfc3339()))
            .unwrap_or(Value::Null),

        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        "UUID" => row
            .try_get::<Option<Uuid>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),

        "JSON" | "JSONB" => row
            .try_get::<Option<serde_json::Value>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),

        // For all other types, try to get as string
        _ => match row.try_get::<Option<String>, _>(index) {
            Ok(Some(s)) => Value::String(s),
            Ok(None) => Value::Null,
            Err(_) if is_null_at(row, index) => Value::Null,
            Err(_) => unsupported(type_name),
        },
    }
}

fn is_null_at(row: &PgRow, index: usize) -> bool {
    row.try_get_raw(index)
        .map(|value| value.is_null())
        .unwrap_or(false)
}

fn unsupported(type_name: &str) -> Value {
    debug!("No decoder for column type {}", type_name);
    Value::String(format!("<{}>", type_name.to_lowercase()))
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> RunnerError {
    let host = config.host.as_deref().unwrap_or("localhost");
    let port = config.port();
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        RunnerError::database(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        RunnerError::database(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        RunnerError::database(format!("Database '{database}' does not exist."))
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        RunnerError::database("Server requires SSL. Add '?sslmode=require' to connection string.")
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        RunnerError::database(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        RunnerError::database(error.to_string())
    }
}

/// Formats a query error with the server's DETAIL/HINT fields when present.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        let fields = [
            ("DETAIL", pg_error.detail()),
            ("HINT", pg_error.hint()),
            ("TABLE", pg_error.table()),
            ("COLUMN", pg_error.column()),
            ("CONSTRAINT", pg_error.constraint()),
        ];
        for (label, value) in fields {
            if let Some(value) = value {
                result.push_str("\n  ");
                result.push_str(label);
                result.push_str(": ");
                result.push_str(value);
            }
        }
    }

    result
}
