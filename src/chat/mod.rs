//! Natural-language chat over a database: routing, SQL generation,
//! execution and summaries for one session.

pub mod generator;
pub mod mode;
pub mod sanitize;
pub mod session;
pub mod summarizer;
pub mod transcript;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use session::ChatSession;
pub use transcript::{Speaker, Transcript, TranscriptEntry};

/// How a session decides whether a message needs SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum RoutingMode {
    /// Every message is a database question.
    AlwaysSql,
    /// Ask the LLM first whether the message needs SQL.
    Classify,
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingMode::AlwaysSql => write!(f, "always_sql"),
            RoutingMode::Classify => write!(f, "classify"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Sql,
    Chat,
}
