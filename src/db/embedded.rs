use arrow::datatypes::Schema;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use async_trait::async_trait;
use duckdb::Connection;
use r2d2::{ManageConnection, Pool};
use std::time::Duration;
use tracing::{debug, info};

use super::{describe_table, returns_rows, ConnectionParams, Database, DbError, QueryOutput, ResultSet};

pub struct DuckDbConnectionManager {
    path: String,
}

impl DuckDbConnectionManager {
    pub fn new(path: String) -> Self {
        Self { path }
    }
}

impl ManageConnection for DuckDbConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        if self.path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(&self.path)
        }
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute("SELECT 1", [])?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        DbError::Query(err.to_string())
    }
}

impl From<ArrowError> for DbError {
    fn from(err: ArrowError) -> Self {
        DbError::Query(err.to_string())
    }
}

/// How long opening a file may take before the connect attempt is reported
/// as failed. r2d2 keeps retrying a broken path until then.
const OPEN_TIMEOUT: Duration = Duration::from_secs(3);

/// An embedded DuckDB file. The pool holds exactly one long-lived
/// connection, so an in-memory database survives between statements.
pub struct DuckDbDatabase {
    pool: Pool<DuckDbConnectionManager>,
    sample_rows: usize,
}

impl DuckDbDatabase {
    pub async fn open(params: &ConnectionParams, sample_rows: usize) -> Result<Self, DbError> {
        let path = params.database.trim().to_string();
        if path.is_empty() {
            return Err(DbError::InvalidParams(
                "a DuckDB database file path is required".to_string(),
            ));
        }

        info!("Opening DuckDB database at {}", path);
        let manager = DuckDbConnectionManager::new(path);

        // Pool construction blocks until the connection is open
        let pool = tokio::task::spawn_blocking(move || {
            Pool::builder()
                .max_size(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connection_timeout(OPEN_TIMEOUT)
                .build(manager)
        })
        .await
        .map_err(|e| DbError::Connection(format!("Database task execution failed: {}", e)))?
        .map_err(|e| DbError::Connection(e.to_string()))?;

        Ok(Self { pool, sample_rows })
    }

    async fn with_connection<T, F>(&self, work: F) -> Result<T, DbError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, DbError> + Send + 'static,
    {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            work(&*conn)
        })
        .await
        .map_err(|e| DbError::Query(format!("Database task execution failed: {}", e)))?
    }
}

fn query_rows(conn: &Connection, sql: &str) -> Result<ResultSet, DbError> {
    let mut stmt = conn.prepare(sql)?;
    let arrow_batch = stmt.query_arrow([])?;
    let schema = arrow_batch.get_schema();
    let record_batches: Vec<RecordBatch> = arrow_batch.collect();

    Ok(to_result_set(&schema, &record_batches)?)
}

fn to_result_set(schema: &Schema, batches: &[RecordBatch]) -> Result<ResultSet, ArrowError> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .collect();

    let options = FormatOptions::default().with_null("NULL");
    let mut rows = Vec::new();

    for batch in batches {
        let formatters = batch
            .columns()
            .iter()
            .map(|column| ArrayFormatter::try_new(column.as_ref(), &options))
            .collect::<Result<Vec<_>, _>>()?;

        for row in 0..batch.num_rows() {
            rows.push(formatters.iter().map(|f| f.value(row).to_string()).collect());
        }
    }

    Ok(ResultSet { columns, rows })
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn table_ddl(conn: &Connection, table: &str) -> Result<String, DbError> {
    let mut columns_stmt = conn.prepare(
        "SELECT column_name, data_type, is_nullable
         FROM information_schema.columns
         WHERE table_schema = 'main' AND table_name = ?
         ORDER BY ordinal_position",
    )?;

    let columns: Vec<(String, String, bool)> = columns_stmt
        .query_map([table], |row| {
            Ok((
                row.get::<_, String>(0)?,          // column_name
                row.get::<_, String>(1)?,          // data_type
                row.get::<_, String>(2)? == "YES", // is_nullable
            ))
        })?
        .filter_map(Result::ok)
        .collect();

    let definitions: Vec<String> = columns
        .iter()
        .map(|(name, data_type, nullable)| {
            let null_str = if *nullable { "" } else { " NOT NULL" };
            format!("    {} {}{}", quote_identifier(name), data_type, null_str)
        })
        .collect();

    Ok(format!(
        "CREATE TABLE {} (\n{}\n);",
        quote_identifier(table),
        definitions.join(",\n")
    ))
}

#[async_trait]
impl Database for DuckDbDatabase {
    fn dialect(&self) -> &'static str {
        "DuckDB"
    }

    async fn table_info(&self) -> Result<String, DbError> {
        let sample_rows = self.sample_rows;

        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT table_name FROM information_schema.tables
                 WHERE table_schema = 'main' ORDER BY table_name",
            )?;
            let tables: Vec<String> = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .filter_map(Result::ok)
                .collect();

            let mut descriptions = Vec::with_capacity(tables.len());
            for table in &tables {
                let ddl = table_ddl(conn, table)?;
                let sample = if sample_rows > 0 {
                    let sql = format!("SELECT * FROM {} LIMIT {}", quote_identifier(table), sample_rows);
                    Some(query_rows(conn, &sql)?)
                } else {
                    None
                };
                descriptions.push(describe_table(&ddl, table, sample.as_ref()));
            }

            debug!("Described {} DuckDB tables", descriptions.len());
            Ok(descriptions.join("\n\n"))
        })
        .await
    }

    async fn execute(&self, sql: &str) -> Result<QueryOutput, DbError> {
        let sql = sql.to_string();

        self.with_connection(move |conn| {
            if returns_rows(&sql) {
                Ok(QueryOutput::Rows(query_rows(conn, &sql)?))
            } else {
                let affected = conn.execute(&sql, [])?;
                Ok(QueryOutput::Affected {
                    rows: affected as u64,
                })
            }
        })
        .await
    }
}
