//! Prompt text sent to the completion service.

/// Schema stand-in used when the session has no database.
pub const NO_DATABASE_SCHEMA: &str = "NO DATABASE";

/// Sentinel the model is told to answer with when no query fits.
pub const NO_SQL_SENTINEL: &str = "NO_SQL";

pub fn mode_prompt(message: &str, schema: &str) -> String {
    format!(
        r#"
You decide whether the user message requires SQL.

DATABASE SCHEMA:
{schema}

USER MESSAGE:
{message}

Return ONLY one word:
SQL -> if database query / analytics / tables / filtering
CHAT -> if general conversation
"#
    )
}

pub fn sql_prompt(question: &str, schema: &str, dialect: &str) -> String {
    format!(
        r#"
You MUST output ONLY a valid {dialect} SQL query.

STRICT RULES:
- Output ONLY the SQL.
- Do NOT include backticks.
- Do NOT include ```sql.
- Do NOT explain.
- Do NOT add words like: SQL:, Query:, Here is, The SQL is, etc.
- If unsure, output ONLY: {NO_SQL_SENTINEL}

DATABASE SCHEMA:
{schema}

USER QUESTION:
{question}

SQL:
"#
    )
}

pub fn summary_prompt(question: &str, result: &str) -> String {
    format!(
        "You are an AI assistant. The user's question was:\n{question}\n\
         The SQL answer result was:\n{result}\n\
         Summarize this SQL result for the user in 1-2 sentences."
    )
}
