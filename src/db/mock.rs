//! In-memory database double for tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{Database, DbError, QueryOutput};

/// Returns canned results in order and logs every executed statement.
#[derive(Debug, Default)]
pub struct MockDatabase {
    schema: String,
    results: Mutex<VecDeque<Result<QueryOutput, String>>>,
    executed: Arc<Mutex<Vec<String>>>,
}

impl MockDatabase {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            ..Default::default()
        }
    }

    pub fn with_result(self, output: QueryOutput) -> Self {
        self.results.lock().unwrap().push_back(Ok(output));
        self
    }

    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.results.lock().unwrap().push_back(Err(message.into()));
        self
    }

    /// Shared view of executed statements, usable after the mock is boxed.
    pub fn executed(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.executed)
    }
}

#[async_trait]
impl Database for MockDatabase {
    fn dialect(&self) -> &'static str {
        "MySQL"
    }

    async fn table_info(&self) -> Result<String, DbError> {
        Ok(self.schema.clone())
    }

    async fn execute(&self, sql: &str) -> Result<QueryOutput, DbError> {
        self.executed.lock().unwrap().push(sql.to_string());
        match self.results.lock().unwrap().pop_front() {
            Some(Ok(output)) => Ok(output),
            Some(Err(message)) => Err(DbError::Query(message)),
            None => Ok(QueryOutput::Affected { rows: 0 }),
        }
    }
}
