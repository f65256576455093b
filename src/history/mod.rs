use crate::models::chat::{ ChatMessage, Conversation, Role };
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// In-memory conversation storage. The map is guarded by an async mutex which
/// is taken per operation and never held across an await outside this module,
/// so reasoning calls in flight cannot block store access.
pub struct ConversationStore {
    conversations: Mutex<HashMap<String, Conversation>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            conversations: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a new empty conversation with a fresh id and register it.
    pub async fn create(&self) -> Conversation {
        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            messages: Vec::new(),
        };
        let mut map = self.conversations.lock().await;
        map.insert(conversation.id.clone(), conversation.clone());
        conversation
    }

    /// Snapshot of a conversation. Absence is a normal outcome, not a fault.
    pub async fn get(&self, conversation_id: &str) -> Option<Conversation> {
        let map = self.conversations.lock().await;
        map.get(conversation_id).cloned()
    }

    /// Append a message stamped with the current time. Returns `None` when
    /// the conversation does not exist; no message is constructed in that
    /// case.
    pub async fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str
    ) -> Option<ChatMessage> {
        let mut map = self.conversations.lock().await;
        let conversation = map.get_mut(conversation_id)?;
        let message = ChatMessage {
            role,
            content: content.to_string(),
            timestamp: Utc::now().timestamp(),
        };
        conversation.messages.push(message.clone());
        Some(message)
    }

    /// Remove a conversation. Returns whether something was removed.
    pub async fn delete(&self, conversation_id: &str) -> bool {
        let mut map = self.conversations.lock().await;
        map.remove(conversation_id).is_some()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}
