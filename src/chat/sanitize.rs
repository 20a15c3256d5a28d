//! Normalization of raw completions into something that might be SQL.
//!
//! Everything here is pure string handling. The verb allowlist is the only
//! gate between the completion service and the database.

use crate::llm::prompts::NO_SQL_SENTINEL;

/// Labels models like to put in front of a query, tried in this order.
const LABEL_PREFIXES: [&str; 3] = ["sql ", "sql:", "query:"];

/// Statements allowed through to execution.
pub const ALLOWED_VERBS: [&str; 4] = ["select", "insert", "update", "delete"];

/// What the generator made of a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedSql {
    /// Cleaned SQL, safe to forward unchanged.
    Query(String),
    /// The model answered with the `NO_SQL` sentinel.
    NoSql,
    /// Anything else; carries the raw completion for display.
    Unusable(String),
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}

/// Strips code fences, label prefixes and a bare leading `sql` token.
pub fn clean_sql(raw: &str) -> String {
    let unfenced = raw.trim().replace("```sql", "").replace("```", "");
    let mut sql = unfenced.trim();

    for prefix in LABEL_PREFIXES {
        while let Some(rest) = strip_prefix_ignore_case(sql, prefix) {
            sql = rest.trim();
        }
    }

    if let Some(rest) = strip_prefix_ignore_case(sql, "sql") {
        sql = rest.trim();
    }

    sql.to_string()
}

/// True for `NO_SQL` in any case, with stray whitespace or a trailing `.`/`;`.
pub fn is_no_sql(text: &str) -> bool {
    let squashed: String = text.split_whitespace().collect();
    squashed
        .trim_end_matches(['.', ';'])
        .eq_ignore_ascii_case(NO_SQL_SENTINEL)
}

pub fn starts_with_allowed_verb(sql: &str) -> bool {
    ALLOWED_VERBS
        .iter()
        .any(|verb| strip_prefix_ignore_case(sql, verb).is_some())
}

pub fn classify_sql(raw: &str) -> GeneratedSql {
    let cleaned = clean_sql(raw);

    if is_no_sql(&cleaned) {
        GeneratedSql::NoSql
    } else if starts_with_allowed_verb(&cleaned) {
        GeneratedSql::Query(cleaned)
    } else {
        GeneratedSql::Unusable(raw.trim().to_string())
    }
}
