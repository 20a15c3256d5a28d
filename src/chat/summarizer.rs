use crate::llm::{prompts, LlmError, TextCompletion};

/// One or two sentences describing a query result.
pub async fn summarize(
    llm: &dyn TextCompletion,
    question: &str,
    result: &str,
) -> Result<String, LlmError> {
    let summary = llm.complete(&prompts::summary_prompt(question, result)).await?;
    Ok(summary.trim().to_string())
}

/// Plain conversation: the message itself is the prompt.
pub async fn chat_reply(llm: &dyn TextCompletion, message: &str) -> Result<String, LlmError> {
    let reply = llm.complete(message).await?;
    Ok(reply.trim().to_string())
}
