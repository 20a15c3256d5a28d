use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column, Connection, Executor, Row};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::{describe_table, returns_rows, ConnectionParams, Database, DbError, QueryOutput, ResultSet};

/// A single MySQL connection. Statements are sent over the text protocol so
/// every value arrives already rendered as text.
pub struct MySqlDatabase {
    conn: Mutex<MySqlConnection>,
    sample_rows: usize,
}

impl MySqlDatabase {
    pub async fn connect(params: &ConnectionParams, sample_rows: usize) -> Result<Self, DbError> {
        let options = connect_options(params)?;

        let conn = MySqlConnection::connect_with(&options).await.map_err(|e| {
            error!("Failed to connect to MySQL at {}:{}: {}", params.host, params.port, e);
            DbError::Connection(e.to_string())
        })?;

        info!("Connected to MySQL at {}:{}", params.host, params.port);

        Ok(Self {
            conn: Mutex::new(conn),
            sample_rows,
        })
    }

    async fn fetch(&self, sql: &str) -> Result<ResultSet, DbError> {
        let mut conn = self.conn.lock().await;
        let rows = conn
            .fetch_all(sqlx::raw_sql(sql))
            .await
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(convert_rows(&rows))
    }
}

fn connect_options(params: &ConnectionParams) -> Result<MySqlConnectOptions, DbError> {
    let port: u16 = params.port.trim().parse().map_err(|_| {
        DbError::InvalidParams(format!("port must be a number, got '{}'", params.port))
    })?;

    let mut options = MySqlConnectOptions::new()
        .host(params.host.trim())
        .port(port)
        .username(&params.username)
        .password(&params.password);

    if !params.database.trim().is_empty() {
        options = options.database(params.database.trim());
    }

    Ok(options)
}

fn convert_rows(rows: &[MySqlRow]) -> ResultSet {
    let columns = rows
        .first()
        .map(|row| row.columns().iter().map(|col| col.name().to_string()).collect())
        .unwrap_or_default();

    let rows = rows
        .iter()
        .map(|row| (0..row.len()).map(|i| text_value(row, i)).collect())
        .collect();

    ResultSet { columns, rows }
}

/// Reads a text-protocol value without type checking. Binary columns that
/// are not valid UTF-8 are rendered lossily.
fn text_value(row: &MySqlRow, index: usize) -> String {
    match row.try_get_unchecked::<Option<String>, _>(index) {
        Ok(value) => render_text(value),
        Err(_) => render_bytes(row.try_get_unchecked::<Option<Vec<u8>>, _>(index).ok().flatten()),
    }
}

fn render_text(value: Option<String>) -> String {
    value.unwrap_or_else(|| "NULL".to_string())
}

fn render_bytes(value: Option<Vec<u8>>) -> String {
    match value {
        Some(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        None => "NULL".to_string(),
    }
}

fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[async_trait]
impl Database for MySqlDatabase {
    fn dialect(&self) -> &'static str {
        "MySQL"
    }

    async fn table_info(&self) -> Result<String, DbError> {
        let tables = self.fetch("SHOW TABLES").await?;
        let mut descriptions = Vec::new();

        for table in tables.rows.iter().filter_map(|row| row.first()) {
            let quoted = quote_identifier(table);

            let create = self.fetch(&format!("SHOW CREATE TABLE {}", quoted)).await?;
            let ddl = create
                .rows
                .first()
                .and_then(|row| row.get(1))
                .cloned()
                .unwrap_or_default();

            let sample = if self.sample_rows > 0 {
                let mut sample = self
                    .fetch(&format!("SELECT * FROM {} LIMIT {}", quoted, self.sample_rows))
                    .await?;
                if sample.columns.is_empty() {
                    // No rows came back, so take the header from the table itself
                    let columns = self.fetch(&format!("SHOW COLUMNS FROM {}", quoted)).await?;
                    sample.columns = columns.rows.into_iter().filter_map(|row| row.into_iter().next()).collect();
                }
                Some(sample)
            } else {
                None
            };

            descriptions.push(describe_table(&ddl, table, sample.as_ref()));
        }

        debug!("Described {} MySQL tables", descriptions.len());
        Ok(descriptions.join("\n\n"))
    }

    async fn execute(&self, sql: &str) -> Result<QueryOutput, DbError> {
        if returns_rows(sql) {
            return Ok(QueryOutput::Rows(self.fetch(sql).await?));
        }

        let mut conn = self.conn.lock().await;
        let result = conn
            .execute(sqlx::raw_sql(sql))
            .await
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(QueryOutput::Affected {
            rows: result.rows_affected(),
        })
    }
}
