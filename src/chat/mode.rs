use tracing::debug;

use super::Intent;
use crate::llm::{prompts, LlmError, TextCompletion};

/// `Sql` when the answer mentions SQL anywhere, `Chat` for everything else.
pub fn parse_intent(answer: &str) -> Intent {
    if answer.trim().to_uppercase().contains("SQL") {
        Intent::Sql
    } else {
        Intent::Chat
    }
}

/// One round trip asking the model whether the message needs the database.
pub async fn choose_mode(
    llm: &dyn TextCompletion,
    message: &str,
    schema: &str,
) -> Result<Intent, LlmError> {
    let answer = llm.complete(&prompts::mode_prompt(message, schema)).await?;
    let intent = parse_intent(&answer);
    debug!("Mode decision {:?} from answer {:?}", intent, answer.trim());
    Ok(intent)
}
