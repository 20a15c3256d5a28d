pub mod embedded;
pub mod mysql;
pub mod result;

#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::info;

pub use result::{QueryOutput, ResultSet};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Invalid connection parameters: {0}")]
    InvalidParams(String),
    #[error("{0}")]
    Connection(String),
    #[error("{0}")]
    Query(String),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    Mysql,
    Duckdb,
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Driver::Mysql => write!(f, "mysql"),
            Driver::Duckdb => write!(f, "duckdb"),
        }
    }
}

/// What the connection form submits. For DuckDB `database` is a file path
/// (or `:memory:`) and the network fields are ignored.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub driver: Driver,
    pub host: String,
    pub port: String,
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    pub database: String,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"********")
            .field("database", &self.database)
            .finish()
    }
}

impl From<&crate::config::DatabaseConfig> for ConnectionParams {
    fn from(config: &crate::config::DatabaseConfig) -> Self {
        Self {
            driver: config.driver,
            host: config.host.clone(),
            port: config.port.clone(),
            username: config.username.clone(),
            password: String::new(),
            database: config.database.clone(),
        }
    }
}

/// A live handle on one database.
#[async_trait]
pub trait Database: Send + Sync {
    /// Dialect name given to the LLM when it writes SQL.
    fn dialect(&self) -> &'static str;

    /// DDL of every table plus a few sample rows.
    async fn table_info(&self) -> Result<String, DbError>;

    async fn execute(&self, sql: &str) -> Result<QueryOutput, DbError>;
}

pub async fn connect(
    params: &ConnectionParams,
    sample_rows: usize,
) -> Result<Box<dyn Database>, DbError> {
    info!("Connecting to {} database '{}'", params.driver, params.database);

    let database: Box<dyn Database> = match params.driver {
        Driver::Mysql => Box::new(mysql::MySqlDatabase::connect(params, sample_rows).await?),
        Driver::Duckdb => Box::new(embedded::DuckDbDatabase::open(params, sample_rows).await?),
    };

    Ok(database)
}

const ROW_RETURNING_KEYWORDS: [&str; 8] = [
    "select", "with", "show", "describe", "desc", "explain", "values", "pragma",
];

/// Whether a statement produces a result set rather than an affected-row count.
pub fn returns_rows(sql: &str) -> bool {
    let keyword = sql
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();

    ROW_RETURNING_KEYWORDS.contains(&keyword.as_str())
}

/// Formats one table for the schema description: its DDL followed by a
/// comment block holding sample rows.
pub fn describe_table(ddl: &str, table: &str, sample: Option<&ResultSet>) -> String {
    let mut description = ddl.trim_end().to_string();

    if let Some(sample) = sample {
        description.push_str(&format!(
            "\n\n/*\n{} rows from {} table:\n{}*/",
            sample.rows.len(),
            table,
            sample.tab_separated()
        ));
    }

    description
}
