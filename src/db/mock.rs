//! Mock database client for testing.
//!
//! Provides scripted, in-memory connections that record what the runner did
//! with them so tests can check binding and connection release.

use super::{ColumnInfo, Connector, DatabaseClient, QueryResult, Value};
use crate::config::ConnectionConfig;
use crate::error::{Result, RunnerError};
use crate::template::BoundStatement;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Everything the mock observed, shared between a connector and its clients.
#[derive(Debug, Clone, Default)]
pub struct MockLog {
    /// Number of successful connection attempts.
    pub connects: usize,
    /// Statements passed to `execute`, in order.
    pub executed: Vec<BoundStatement>,
    /// Number of `close` calls.
    pub closes: usize,
}

#[derive(Debug, Clone)]
enum MockResponse {
    /// SELECT returns one row echoing the SQL; anything else returns nothing.
    Echo,
    Result(QueryResult),
    Fail(String),
}

type SharedLog = Arc<Mutex<MockLog>>;

fn lock(log: &SharedLog) -> MutexGuard<'_, MockLog> {
    log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A mock database client that returns predefined results.
pub struct MockDatabaseClient {
    response: MockResponse,
    log: SharedLog,
}

impl MockDatabaseClient {
    /// Creates a new mock client that echoes SELECT statements.
    pub fn new() -> Self {
        Self {
            response: MockResponse::Echo,
            log: SharedLog::default(),
        }
    }

    /// Creates a mock client that always returns `result`.
    pub fn with_result(result: QueryResult) -> Self {
        Self {
            response: MockResponse::Result(result),
            log: SharedLog::default(),
        }
    }

    /// Returns a snapshot of what this client has seen.
    pub fn log(&self) -> MockLog {
        lock(&self.log).clone()
    }
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn execute(&mut self, statement: &BoundStatement) -> Result<QueryResult> {
        lock(&self.log).executed.push(statement.clone());

        match &self.response {
            MockResponse::Result(result) => Ok(result.clone()),
            MockResponse::Fail(message) => Err(RunnerError::database(message.clone())),
            MockResponse::Echo => {
                if statement.sql.trim_start().to_uppercase().starts_with("SELECT") {
                    let columns = vec![ColumnInfo::new("result", "TEXT")];
                    let rows = vec![vec![Value::String(format!(
                        "Mock result for: {}",
                        statement.sql
                    ))]];
                    Ok(QueryResult::with_data(columns, rows)
                        .with_execution_time(Duration::from_millis(1)))
                } else {
                    Ok(QueryResult::new().with_execution_time(Duration::from_millis(1)))
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        lock(&self.log).closes += 1;
        Ok(())
    }
}

/// Connector handing out mock clients that share one log.
pub struct MockConnector {
    response: MockResponse,
    refuse: Option<String>,
    log: SharedLog,
}

impl MockConnector {
    fn with_response(response: MockResponse) -> Self {
        Self {
            response,
            refuse: None,
            log: SharedLog::default(),
        }
    }

    /// Clients echo SELECT statements.
    pub fn echo() -> Self {
        Self::with_response(MockResponse::Echo)
    }

    /// Clients return `result` for every statement.
    pub fn returning(result: QueryResult) -> Self {
        Self::with_response(MockResponse::Result(result))
    }

    /// Clients fail every statement with a database error.
    pub fn failing_query(message: impl Into<String>) -> Self {
        Self::with_response(MockResponse::Fail(message.into()))
    }

    /// Connection attempts fail with a database error.
    pub fn refusing(message: impl Into<String>) -> Self {
        Self {
            refuse: Some(message.into()),
            ..Self::echo()
        }
    }

    /// Returns a snapshot of what the connector and its clients have seen.
    pub fn log(&self) -> MockLog {
        lock(&self.log).clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>> {
        if let Some(message) = &self.refuse {
            return Err(RunnerError::database(message.clone()));
        }

        lock(&self.log).connects += 1;
        Ok(Box::new(MockDatabaseClient {
            response: self.response.clone(),
            log: Arc::clone(&self.log),
        }))
    }
}
