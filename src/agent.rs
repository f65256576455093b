use crate::cli::Args;
use crate::error::AgentError;
use crate::history::ConversationStore;
use crate::llm::chat::{ new_client, ReasoningClient };
use crate::llm::{ LlmConfig, LlmType };
use crate::models::chat::{ ChatMessage, Conversation, Role };

use log::{ error, info, warn };
use std::error::Error;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// How much of the transcript feeds the reasoning call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    Full,
    Recent,
}

impl FromStr for HistoryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(HistoryMode::Full),
            "recent" => Ok(HistoryMode::Recent),
            _ => Err(format!("Invalid history mode: '{}' (expected 'full' or 'recent')", s)),
        }
    }
}

/// What a failed reasoning call turns into. `Apologize` keeps the turn
/// success-shaped with a synthetic answer; `Propagate` surfaces the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelErrorPolicy {
    Apologize,
    Propagate,
}

impl FromStr for ModelErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "apologize" => Ok(ModelErrorPolicy::Apologize),
            "propagate" => Ok(ModelErrorPolicy::Propagate),
            _ =>
                Err(
                    format!("Invalid model error policy: '{}' (expected 'apologize' or 'propagate')", s)
                ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub history_mode: HistoryMode,
    pub history_recent_limit: usize,
    pub on_model_error: ModelErrorPolicy,
    pub max_concurrent_calls: usize,
    pub reasoning_timeout: Duration,
}

impl AgentConfig {
    pub fn from_args(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(Self {
            history_mode: args.history_mode.parse()?,
            history_recent_limit: args.history_recent_limit,
            on_model_error: args.on_model_error.parse()?,
            max_concurrent_calls: args.max_concurrent_calls,
            reasoning_timeout: Duration::from_secs(args.reasoning_timeout_secs),
        })
    }
}

/// Outcome of one chat turn. `model_failed` records an apologized-over
/// reasoning failure; it never reaches the wire payload.
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub conversation_id: String,
    pub response: String,
    pub history: Vec<ChatMessage>,
    pub model_failed: bool,
}

pub struct ChatAgent {
    reasoning_client: Arc<dyn ReasoningClient>,
    store: Arc<ConversationStore>,
    config: AgentConfig,
    call_permits: Arc<Semaphore>,
}

impl ChatAgent {
    pub fn new(
        config: AgentConfig,
        reasoning_client: Arc<dyn ReasoningClient>,
        store: Arc<ConversationStore>
    ) -> Self {
        let call_permits = Arc::new(Semaphore::new(config.max_concurrent_calls.max(1)));
        Self {
            reasoning_client,
            store,
            config,
            call_permits,
        }
    }

    pub fn from_args(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let llm_type: LlmType = args.chat_llm_type.parse()?;
        let api_key = if !args.chat_api_key.is_empty() {
            Some(args.chat_api_key.clone())
        } else {
            None
        };
        let llm_config = LlmConfig {
            llm_type,
            api_key,
            completion_model: args.chat_model.clone(),
            base_url: args.chat_base_url.clone(),
        };
        let reasoning_client = new_client(&llm_config)?;
        info!(
            "Reasoning client configured: Type={}, Model={:?}, BaseURL={:?}",
            args.chat_llm_type,
            llm_config.completion_model.as_deref().unwrap_or("adapter default"),
            llm_config.base_url.as_deref().unwrap_or("adapter default")
        );

        let config = AgentConfig::from_args(args)?;
        Ok(Self::new(config, reasoning_client, Arc::new(ConversationStore::new())))
    }

    /// One chat turn end-to-end: resolve or create the conversation, append
    /// the user message, run the reasoning call on the transcript, append the
    /// assistant reply, return the full snapshot.
    pub async fn handle_turn(
        &self,
        conversation_id: Option<&str>,
        user_text: &str
    ) -> Result<TurnResult, AgentError> {
        let conversation = match conversation_id {
            Some(id) => {
                let existing = self.store
                    .get(id).await
                    .ok_or_else(|| AgentError::ConversationNotFound(id.to_string()))?;
                info!("Resolved existing conversation: {}", existing.id);
                existing
            }
            None => {
                let created = self.store.create().await;
                info!("Created new conversation: {}", created.id);
                created
            }
        };
        let id = conversation.id;

        self.store
            .append_message(&id, Role::User, user_text).await
            .ok_or_else(|| AgentError::ConversationNotFound(id.clone()))?;

        let snapshot = self.store
            .get(&id).await
            .ok_or_else(|| AgentError::ConversationNotFound(id.clone()))?;
        let context = self.build_context(&snapshot.messages);

        let (response, model_failed) = match self.ask_with_limits(&context, user_text).await {
            Ok(answer) => (answer, false),
            Err(e) => {
                error!("Reasoning call failed for conversation {}: {}", id, e);
                match self.config.on_model_error {
                    ModelErrorPolicy::Apologize => {
                        (format!("I apologize, but I encountered an error: {}", e), true)
                    }
                    ModelErrorPolicy::Propagate => {
                        return Err(AgentError::Model(e.to_string()));
                    }
                }
            }
        };

        self.store
            .append_message(&id, Role::Assistant, &response).await
            .ok_or_else(|| AgentError::ConversationNotFound(id.clone()))?;

        let final_snapshot = self.store
            .get(&id).await
            .ok_or_else(|| AgentError::ConversationNotFound(id.clone()))?;

        Ok(TurnResult {
            conversation_id: id,
            response,
            history: final_snapshot.messages,
            model_failed,
        })
    }

    pub async fn get_conversation(
        &self,
        conversation_id: &str
    ) -> Result<Conversation, AgentError> {
        self.store
            .get(conversation_id).await
            .ok_or_else(|| AgentError::ConversationNotFound(conversation_id.to_string()))
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<(), AgentError> {
        if self.store.delete(conversation_id).await {
            info!("Deleted conversation: {}", conversation_id);
            Ok(())
        } else {
            warn!("Conversation not found for deletion: {}", conversation_id);
            Err(AgentError::ConversationNotFound(conversation_id.to_string()))
        }
    }

    /// Reasoning call bounded by the concurrency cap and the configured
    /// timeout. No store lock is held here; the agent works on snapshots.
    async fn ask_with_limits(
        &self,
        context: &str,
        question: &str
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let _permit = self.call_permits
            .acquire().await
            .map_err(|e| Box::new(e) as Box<dyn Error + Send + Sync>)?;

        match
            tokio::time::timeout(
                self.config.reasoning_timeout,
                self.reasoning_client.ask(context, question)
            ).await
        {
            Ok(result) => result,
            Err(_) =>
                Err(
                    format!(
                        "reasoning call timed out after {}s",
                        self.config.reasoning_timeout.as_secs()
                    ).into()
                ),
        }
    }

    /// Transcript formatted as "role: content" lines. Under recent mode only
    /// the newest N messages are included, still in original order.
    pub(crate) fn build_context(&self, messages: &[ChatMessage]) -> String {
        let window: &[ChatMessage] = match self.config.history_mode {
            HistoryMode::Full => messages,
            HistoryMode::Recent => {
                let start = messages.len().saturating_sub(self.config.history_recent_limit);
                &messages[start..]
            }
        };

        window
            .iter()
            .map(|msg| format!("{}: {}", msg.role, msg.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedClient {
        answer: String,
        contexts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                contexts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ReasoningClient for ScriptedClient {
        async fn ask(
            &self,
            context: &str,
            _question: &str
        ) -> Result<String, Box<dyn Error + Send + Sync>> {
            self.contexts.lock().unwrap().push(context.to_string());
            Ok(self.answer.clone())
        }
    }

    struct FailingClient;

    #[async_trait]
    impl ReasoningClient for FailingClient {
        async fn ask(
            &self,
            _context: &str,
            _question: &str
        ) -> Result<String, Box<dyn Error + Send + Sync>> {
            Err("backend unavailable".into())
        }
    }

    struct SlowClient;

    #[async_trait]
    impl ReasoningClient for SlowClient {
        async fn ask(
            &self,
            _context: &str,
            _question: &str
        ) -> Result<String, Box<dyn Error + Send + Sync>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
        }
    }

    fn test_config() -> AgentConfig {
        AgentConfig {
            history_mode: HistoryMode::Full,
            history_recent_limit: 5,
            on_model_error: ModelErrorPolicy::Apologize,
            max_concurrent_calls: 4,
            reasoning_timeout: Duration::from_secs(5),
        }
    }

    fn agent_with(
        config: AgentConfig,
        client: Arc<dyn ReasoningClient>
    ) -> (ChatAgent, Arc<ConversationStore>) {
        let store = Arc::new(ConversationStore::new());
        (ChatAgent::new(config, client, store.clone()), store)
    }

    #[tokio::test]
    async fn turn_without_id_creates_one_conversation() {
        let (agent, store) = agent_with(test_config(), Arc::new(ScriptedClient::new("hi there")));

        let result = agent.handle_turn(None, "hello").await.unwrap();
        assert_eq!(result.response, "hi there");
        assert!(!result.model_failed);
        assert_eq!(result.history.len(), 2);
        assert_eq!(result.history[0].role, Role::User);
        assert_eq!(result.history[0].content, "hello");
        assert_eq!(result.history[1].role, Role::Assistant);
        assert_eq!(result.history[1].content, "hi there");

        let stored = store.get(&result.conversation_id).await.unwrap();
        assert_eq!(stored.messages.len(), 2);
    }

    #[tokio::test]
    async fn consecutive_turns_interleave_roles_in_order() {
        let (agent, _store) = agent_with(test_config(), Arc::new(ScriptedClient::new("answer")));

        let first = agent.handle_turn(None, "one").await.unwrap();
        let second = agent.handle_turn(Some(&first.conversation_id), "two").await.unwrap();

        assert_eq!(second.conversation_id, first.conversation_id);
        let roles: Vec<Role> = second.history
            .iter()
            .map(|m| m.role)
            .collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(second.history[2].content, "two");
    }

    #[tokio::test]
    async fn unknown_id_fails_without_mutation() {
        let (agent, store) = agent_with(test_config(), Arc::new(ScriptedClient::new("answer")));

        let result = agent.handle_turn(Some("missing"), "hello").await;
        assert!(matches!(result, Err(AgentError::ConversationNotFound(_))));

        // No orphan conversation may appear under the requested id.
        assert!(store.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn recent_mode_limits_context_to_newest_messages() {
        let config = AgentConfig {
            history_mode: HistoryMode::Recent,
            ..test_config()
        };
        let client = Arc::new(ScriptedClient::new("answer"));
        let store = Arc::new(ConversationStore::new());
        let agent = ChatAgent::new(config, client.clone(), store.clone());

        let conversation = store.create().await;
        for i in 1..=8 {
            let role = if i % 2 == 1 { Role::User } else { Role::Assistant };
            store.append_message(&conversation.id, role, &format!("m{}", i)).await.unwrap();
        }

        agent.handle_turn(Some(&conversation.id), "current").await.unwrap();

        let contexts = client.contexts.lock().unwrap();
        let lines: Vec<&str> = contexts[0].lines().collect();
        assert_eq!(
            lines,
            vec!["user: m5", "assistant: m6", "user: m7", "assistant: m8", "user: current"]
        );
    }

    #[tokio::test]
    async fn full_mode_keeps_entire_transcript_in_context() {
        let (agent, _store) = agent_with(test_config(), Arc::new(ScriptedClient::new("answer")));

        let prior = vec![
            ChatMessage { role: Role::User, content: "a".into(), timestamp: 0 },
            ChatMessage { role: Role::Assistant, content: "b".into(), timestamp: 0 },
            ChatMessage { role: Role::User, content: "c".into(), timestamp: 0 }
        ];
        assert_eq!(agent.build_context(&prior), "user: a\nassistant: b\nuser: c");
    }

    #[tokio::test]
    async fn apologize_policy_turns_failure_into_reply() {
        let (agent, store) = agent_with(test_config(), Arc::new(FailingClient));

        let result = agent.handle_turn(None, "hello").await.unwrap();
        assert!(result.model_failed);
        assert!(result.response.starts_with("I apologize, but I encountered an error:"));
        assert!(result.response.contains("backend unavailable"));

        // The apology still lands in the transcript as an assistant message.
        let stored = store.get(&result.conversation_id).await.unwrap();
        assert_eq!(stored.messages.len(), 2);
        assert_eq!(stored.messages[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn propagate_policy_surfaces_model_error() {
        let config = AgentConfig {
            on_model_error: ModelErrorPolicy::Propagate,
            ..test_config()
        };
        let (agent, _store) = agent_with(config, Arc::new(FailingClient));

        let result = agent.handle_turn(None, "hello").await;
        assert!(matches!(result, Err(AgentError::Model(_))));
    }

    #[tokio::test]
    async fn timeout_is_treated_as_model_error() {
        let config = AgentConfig {
            reasoning_timeout: Duration::from_millis(50),
            ..test_config()
        };
        let (agent, _store) = agent_with(config, Arc::new(SlowClient));

        let result = agent.handle_turn(None, "hello").await.unwrap();
        assert!(result.model_failed);
        assert!(result.response.contains("timed out"));
    }

    #[tokio::test]
    async fn delete_then_get_reports_not_found() {
        let (agent, _store) = agent_with(test_config(), Arc::new(ScriptedClient::new("answer")));

        let result = agent.handle_turn(None, "hello").await.unwrap();
        agent.delete_conversation(&result.conversation_id).await.unwrap();

        let lookup = agent.get_conversation(&result.conversation_id).await;
        assert!(matches!(lookup, Err(AgentError::ConversationNotFound(_))));
    }
}
