use thiserror::Error;

/// Failures the service distinguishes at the API boundary. Absence of a
/// conversation is a normal outcome surfaced as 404; a reasoning failure is
/// only visible to callers when the propagate policy is configured.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("Reasoning call failed: {0}")]
    Model(String),
}
