//! Query Runner - run parameterized SQL templates against PostgreSQL.
//!
//! A template marks run-time values with `&name` placeholders. The runner asks
//! the operator for each distinct name, binds the values as positional
//! parameters, executes the statement and prints the result set as a table.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod prompt;
pub mod report;
pub mod runner;
pub mod template;
