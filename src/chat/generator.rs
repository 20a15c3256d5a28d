use tracing::debug;

use super::sanitize::{classify_sql, GeneratedSql};
use crate::llm::{prompts, LlmError, TextCompletion};

/// Asks the model for a single query answering `question` and sanitizes it.
pub async fn generate_sql(
    llm: &dyn TextCompletion,
    question: &str,
    schema: &str,
    dialect: &str,
) -> Result<GeneratedSql, LlmError> {
    let prompt = prompts::sql_prompt(question, schema, dialect);
    let completion = llm.complete(&prompt).await?;
    debug!("Raw SQL completion: {}", completion);

    Ok(classify_sql(&completion))
}
