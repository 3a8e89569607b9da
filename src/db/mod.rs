//! Database abstraction layer.
//!
//! Provides a trait-based interface for database operations so the query
//! runner can be driven against PostgreSQL or an in-memory mock.

mod mock;
mod postgres;
mod types;

pub use mock::{MockConnector, MockDatabaseClient, MockLog};
pub use postgres::{PostgresClient, PostgresConnector};
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::ConnectionConfig;
use crate::error::Result;
use crate::template::BoundStatement;
use async_trait::async_trait;

/// Trait defining the interface for database clients.
///
/// A client owns exactly one connection for its whole lifetime.
#[async_trait]
pub trait DatabaseClient: Send {
    /// Executes a bound statement and returns the fully materialized result.
    async fn execute(&mut self, statement: &BoundStatement) -> Result<QueryResult>;

    /// Closes the database connection. Calling it twice is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Opens database connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a new connection using the given configuration.
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DatabaseClient>>;
}
