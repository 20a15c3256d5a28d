use std::sync::Arc;
use tracing::{info, warn};

use super::generator::generate_sql;
use super::mode::choose_mode;
use super::sanitize::GeneratedSql;
use super::summarizer::{chat_reply, summarize};
use super::{Intent, RoutingMode, Transcript, TranscriptEntry};
use crate::db::{self, ConnectionParams, Database, DbError};
use crate::llm::prompts::NO_DATABASE_SCHEMA;
use crate::llm::{LlmError, TextCompletion};

pub const NOT_CONNECTED_REPLY: &str = "Please connect to the database first.";
pub const NO_SQL_REPLY: &str = "❌ I could not generate SQL for this question.";
pub const INVALID_SQL_REPLY: &str = "❌ I couldn't generate a valid SQL query for your question.";

/// Everything one chat user owns: the completion client, the database handle
/// and the transcript.
pub struct ChatSession {
    llm: Arc<dyn TextCompletion>,
    routing: RoutingMode,
    database: Option<Box<dyn Database>>,
    connection: Option<ConnectionParams>,
    transcript: Transcript,
    sample_rows: usize,
}

impl ChatSession {
    pub fn new(llm: Arc<dyn TextCompletion>, routing: RoutingMode, sample_rows: usize) -> Self {
        Self {
            llm,
            routing,
            database: None,
            connection: None,
            transcript: Transcript::default(),
            sample_rows,
        }
    }

    /// Opens a new handle. The previous handle is only replaced once the new
    /// one is open.
    pub async fn connect(&mut self, params: ConnectionParams) -> Result<&'static str, DbError> {
        let database = db::connect(&params, self.sample_rows).await?;
        let dialect = database.dialect();
        self.attach(params, database);
        Ok(dialect)
    }

    pub fn attach(&mut self, params: ConnectionParams, database: Box<dyn Database>) {
        if self.database.is_some() {
            info!("Replacing existing database handle");
        }
        self.database = Some(database);
        self.connection = Some(params);
    }

    /// Drops the database handle; returns whether one was open.
    pub fn disconnect(&mut self) -> bool {
        self.connection = None;
        self.database.take().is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.database.is_some()
    }

    pub fn connection(&self) -> Option<&ConnectionParams> {
        self.connection.as_ref()
    }

    pub fn dialect(&self) -> Option<&'static str> {
        self.database.as_ref().map(|db| db.dialect())
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    pub fn set_llm(&mut self, llm: Arc<dyn TextCompletion>) {
        self.llm = llm;
    }

    pub fn routing(&self) -> RoutingMode {
        self.routing
    }

    pub fn set_routing(&mut self, routing: RoutingMode) {
        self.routing = routing;
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Schema description of the connected database, if any.
    pub async fn schema(&self) -> Option<Result<String, DbError>> {
        match &self.database {
            Some(database) => Some(database.table_info().await),
            None => None,
        }
    }

    /// Runs one turn: records the message, produces a reply and records it.
    /// Failures become the reply text; the session stays usable.
    pub async fn submit(&mut self, message: &str) -> &TranscriptEntry {
        self.transcript.push(TranscriptEntry::user(message));

        let reply = match self.respond(message).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Completion service failed: {}", e);
                TranscriptEntry::assistant(format!("❌ LLM error: {}", e))
            }
        };

        self.transcript.push(reply)
    }

    async fn respond(&self, message: &str) -> Result<TranscriptEntry, LlmError> {
        let database = self.database.as_deref();

        match self.routing {
            RoutingMode::AlwaysSql => {
                let Some(database) = database else {
                    return Ok(TranscriptEntry::assistant(NOT_CONNECTED_REPLY));
                };
                let schema = match database.table_info().await {
                    Ok(schema) => schema,
                    Err(e) => return Ok(schema_failure(e)),
                };
                self.sql_turn(database, message, &schema).await
            }
            RoutingMode::Classify => {
                let schema = match database {
                    Some(database) => match database.table_info().await {
                        Ok(schema) => schema,
                        Err(e) => return Ok(schema_failure(e)),
                    },
                    None => NO_DATABASE_SCHEMA.to_string(),
                };

                let intent = choose_mode(self.llm.as_ref(), message, &schema).await?;
                match (intent, database) {
                    (Intent::Sql, Some(database)) => self.sql_turn(database, message, &schema).await,
                    _ => Ok(TranscriptEntry::assistant(
                        chat_reply(self.llm.as_ref(), message).await?,
                    )),
                }
            }
        }
    }

    async fn sql_turn(
        &self,
        database: &dyn Database,
        question: &str,
        schema: &str,
    ) -> Result<TranscriptEntry, LlmError> {
        let llm = self.llm.as_ref();

        let sql = match generate_sql(llm, question, schema, database.dialect()).await? {
            GeneratedSql::Query(sql) => sql,
            GeneratedSql::NoSql => return Ok(TranscriptEntry::assistant(NO_SQL_REPLY)),
            GeneratedSql::Unusable(raw) => {
                warn!("Completion is not usable SQL: {}", raw);
                return Ok(TranscriptEntry::assistant(format!(
                    "{}\n\n**LLM responded:**\n```\n{}\n```",
                    INVALID_SQL_REPLY, raw
                )));
            }
        };

        info!("Executing generated SQL: {}", sql);
        let output = match database.execute(&sql).await {
            Ok(output) => output.to_string(),
            Err(e) => {
                warn!("SQL execution failed: {}", e);
                let message = format!(
                    "❌ SQL Error:\n```\n{}\n```\n\n**Generated SQL was:**\n```sql\n{}\n```",
                    e, sql
                );
                return Ok(TranscriptEntry::assistant_with_sql(message, sql));
            }
        };

        let summary = match summarize(llm, question, &output).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Summary failed: {}", e);
                format!("❌ LLM error: {}", e)
            }
        };

        Ok(TranscriptEntry::assistant_with_sql(
            format!("### Result\n```\n{}\n```\n\n### Summary\n{}", output, summary),
            sql,
        ))
    }
}

fn schema_failure(err: DbError) -> TranscriptEntry {
    warn!("Failed to read the database schema: {}", err);
    TranscriptEntry::assistant(format!("❌ Failed to read the database schema: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Speaker;
    use crate::db::mock::MockDatabase;
    use crate::db::{Driver, QueryOutput, ResultSet};
    use crate::llm::mock::ScriptedCompletion;
    use pretty_assertions::assert_eq;

    fn params() -> ConnectionParams {
        ConnectionParams {
            driver: Driver::Mysql,
            host: "localhost".to_string(),
            port: "3306".to_string(),
            username: "root".to_string(),
            password: String::new(),
            database: "shop".to_string(),
        }
    }

    fn session(llm: &Arc<ScriptedCompletion>, routing: RoutingMode) -> ChatSession {
        ChatSession::new(llm.clone(), routing, 3)
    }

    fn count_result(n: &str) -> QueryOutput {
        QueryOutput::Rows(ResultSet {
            columns: vec!["COUNT(*)".to_string()],
            rows: vec![vec![n.to_string()]],
        })
    }

    #[tokio::test]
    async fn chat_without_database() {
        let llm = Arc::new(ScriptedCompletion::new(["CHAT", "Hello! How can I help?"]));
        let mut session = session(&llm, RoutingMode::Classify);

        let reply = session.submit("hello").await.clone();

        assert_eq!(reply, TranscriptEntry::assistant("Hello! How can I help?"));
        let prompts = llm.prompts();
        assert!(prompts[0].contains(NO_DATABASE_SCHEMA));
        assert_eq!(prompts[1], "hello");
    }

    #[tokio::test]
    async fn sql_intent_without_database_still_chats() {
        let llm = Arc::new(ScriptedCompletion::new(["SQL", "I need a database for that."]));
        let mut session = session(&llm, RoutingMode::Classify);

        let reply = session.submit("how many orders?").await;

        assert_eq!(reply.message, "I need a database for that.");
        assert_eq!(reply.sql, None);
    }

    #[tokio::test]
    async fn answers_database_question_with_summary() {
        let sql = "SELECT COUNT(*) FROM orders WHERE date = CURRENT_DATE";
        let llm = Arc::new(ScriptedCompletion::new(["SQL", sql, "There are 7 orders today."]));
        let database = MockDatabase::new("CREATE TABLE orders (id INT, date DATE)")
            .with_result(count_result("7"));
        let executed = database.executed();

        let mut session = session(&llm, RoutingMode::Classify);
        session.attach(params(), Box::new(database));

        let reply = session.submit("how many orders today?").await.clone();

        assert_eq!(executed.lock().unwrap().clone(), vec![sql.to_string()]);
        assert_eq!(reply.sql.as_deref(), Some(sql));
        assert_eq!(
            reply.message,
            "### Result\n```\n| COUNT(*) |\n| --- |\n| 7 |\n```\n\n### Summary\nThere are 7 orders today."
        );

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[1].contains("CREATE TABLE orders"));
        assert!(prompts[2].contains("| 7 |"));
    }

    #[tokio::test]
    async fn no_sql_sentinel_skips_execution() {
        let llm = Arc::new(ScriptedCompletion::new(["SQL", "NO_SQL"]));
        let database = MockDatabase::new("CREATE TABLE orders (id INT)");
        let executed = database.executed();

        let mut session = session(&llm, RoutingMode::Classify);
        session.attach(params(), Box::new(database));

        let reply = session.submit("what is the meaning of life?").await.clone();

        assert_eq!(reply, TranscriptEntry::assistant(NO_SQL_REPLY));
        assert!(executed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unusable_completion_shows_raw_text() {
        let llm = Arc::new(ScriptedCompletion::new(["I would write DROP TABLE orders"]));
        let database = MockDatabase::new("CREATE TABLE orders (id INT)");
        let executed = database.executed();

        let mut session = session(&llm, RoutingMode::AlwaysSql);
        session.attach(params(), Box::new(database));

        let reply = session.submit("drop everything").await;

        assert!(reply.message.starts_with(INVALID_SQL_REPLY));
        assert!(reply.message.contains("I would write DROP TABLE orders"));
        assert!(executed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn execution_error_reports_sql_and_advances_transcript() {
        let llm = Arc::new(ScriptedCompletion::new(["SQL", "```sql\nSELECT * FORM orders\n```"]));
        let database = MockDatabase::new("CREATE TABLE orders (id INT)")
            .with_error("You have an error in your SQL syntax near 'FORM orders'");

        let mut session = session(&llm, RoutingMode::Classify);
        session.attach(params(), Box::new(database));

        let reply = session.submit("list orders").await.clone();

        assert_eq!(reply.sql.as_deref(), Some("SELECT * FORM orders"));
        assert!(reply.message.starts_with("❌ SQL Error:"));
        assert!(reply.message.contains("near 'FORM orders'"));
        assert!(reply.message.contains("```sql\nSELECT * FORM orders\n```"));
        assert_eq!(session.transcript().entries().len(), 2);
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn always_sql_requires_database() {
        let llm = Arc::new(ScriptedCompletion::new(Vec::<String>::new()));
        let mut session = session(&llm, RoutingMode::AlwaysSql);

        let reply = session.submit("how many orders?").await.clone();

        assert_eq!(reply, TranscriptEntry::assistant(NOT_CONNECTED_REPLY));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn always_sql_skips_classification() {
        let llm = Arc::new(ScriptedCompletion::new(["DELETE FROM orders WHERE id = 3", "One order was removed."]));
        let database = MockDatabase::new("CREATE TABLE orders (id INT)")
            .with_result(QueryOutput::Affected { rows: 1 });

        let mut session = session(&llm, RoutingMode::AlwaysSql);
        session.attach(params(), Box::new(database));

        let reply = session.submit("remove order 3").await;

        assert!(reply.message.contains("1 row(s) affected"));
        assert!(reply.message.ends_with("One order was removed."));
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn llm_failure_becomes_an_error_turn() {
        let llm = Arc::new(ScriptedCompletion::new(Vec::<String>::new()).then_fail("connection refused"));
        let mut session = session(&llm, RoutingMode::Classify);

        session.submit("hello").await;
        let reply = session.submit("still there?").await;

        assert!(reply.message.starts_with("❌ LLM error:"));
        let speakers: Vec<Speaker> = session.transcript().entries().iter().map(|e| e.speaker).collect();
        assert_eq!(
            speakers,
            vec![Speaker::User, Speaker::Assistant, Speaker::User, Speaker::Assistant]
        );
    }

    #[tokio::test]
    async fn summary_failure_keeps_the_result() {
        let llm = Arc::new(ScriptedCompletion::new(["SELECT COUNT(*) FROM orders"]).then_fail("timeout"));
        let database = MockDatabase::new("").with_result(count_result("2"));

        let mut session = session(&llm, RoutingMode::AlwaysSql);
        session.attach(params(), Box::new(database));

        let reply = session.submit("count orders").await;

        assert!(reply.message.contains("| 2 |"));
        assert!(reply.message.contains("### Summary\n❌ LLM error:"));
    }

    #[tokio::test]
    async fn failed_reconnect_keeps_previous_handle() {
        let llm = Arc::new(ScriptedCompletion::new(Vec::<String>::new()));
        let mut session = session(&llm, RoutingMode::Classify);
        session.attach(params(), Box::new(MockDatabase::new("")));

        let bad = ConnectionParams {
            port: "not-a-port".to_string(),
            ..params()
        };
        let err = session.connect(bad).await.unwrap_err();

        assert!(matches!(err, DbError::InvalidParams(_)));
        assert!(session.is_connected());
        assert_eq!(session.connection().map(|c| c.port.as_str()), Some("3306"));

        assert!(session.disconnect());
        assert!(!session.is_connected());
        assert!(!session.disconnect());
    }
}
