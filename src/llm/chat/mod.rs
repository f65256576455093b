pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use std::error::Error as StdError;
use std::sync::Arc;

use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;
use super::{ LlmConfig, LlmType };

/// External reasoning collaborator. Given the formatted prior-conversation
/// context and the current question, produce an answer. The caller only
/// distinguishes "succeeded with text" from "failed".
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    async fn ask(
        &self,
        context: &str,
        question: &str
    ) -> Result<String, Box<dyn StdError + Send + Sync>>;
}

/// Single prompt handed to backends that take one text input. Embeds the
/// transcript so the model answers with the whole exchange in view.
pub fn compose_prompt(context: &str, question: &str) -> String {
    format!(
        "Previous conversation:\n{}\n\nCurrent question: {}\n\nPlease consider all previous context when responding.",
        context,
        question
    )
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn ReasoningClient>, Box<dyn StdError + Send + Sync>> {
    let client: Arc<dyn ReasoningClient> = match config.llm_type {
        LlmType::Ollama => {
            let specific_client = OllamaClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}
