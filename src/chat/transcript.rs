use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub message: String,
    /// SQL issued for this reply, shown above it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}

impl TranscriptEntry {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            message: message.into(),
            sql: None,
        }
    }

    pub fn assistant(message: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            message: message.into(),
            sql: None,
        }
    }

    pub fn assistant_with_sql(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            sql: Some(sql.into()),
            ..Self::assistant(message)
        }
    }
}

/// Append-only chat history in display order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn push(&mut self, entry: TranscriptEntry) -> &TranscriptEntry {
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }
}
