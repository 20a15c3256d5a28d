use serde::Serialize;
use std::fmt;

/// Rows rendered to text, column by column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultSet {
    pub fn tab_separated(&self) -> String {
        let mut out = String::new();
        for line in std::iter::once(&self.columns).chain(self.rows.iter()) {
            out.push_str(&line.join("\t"));
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.columns.is_empty() {
            writeln!(f, "| {} |", self.columns.join(" | "))?;
            writeln!(f, "|{}", " --- |".repeat(self.columns.len()))?;
        }

        if self.rows.is_empty() {
            return write!(f, "(no rows)");
        }

        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "| {} |", row.join(" | "))?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryOutput {
    Rows(ResultSet),
    Affected { rows: u64 },
}

impl fmt::Display for QueryOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOutput::Rows(result) => fmt::Display::fmt(result, f),
            QueryOutput::Affected { rows } => write!(f, "{} row(s) affected", rows),
        }
    }
}
