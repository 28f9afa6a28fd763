//! Conversation Store
//!
//! The durable record of conversations and messages. Services only see the
//! [`ConversationStore`] trait; the server uses the Postgres implementation.

use async_trait::async_trait;
use itinera_core::domain::conversation::Conversation;
use itinera_core::domain::message::{Message, NewMessage};
use itinera_core::dto::conversation::ConversationSummary;
use sqlx::PgPool;
use uuid::Uuid;

use crate::repository::{conversation_repository, message_repository};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_conversation(&self, title: &str) -> Result<Conversation, sqlx::Error>;

    /// Most recently active first
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, sqlx::Error>;

    async fn find_conversation(&self, id: Uuid) -> Result<Option<Conversation>, sqlx::Error>;

    async fn delete_conversation(&self, id: Uuid) -> Result<bool, sqlx::Error>;

    async fn rename_conversation(&self, id: Uuid, title: &str) -> Result<bool, sqlx::Error>;

    async fn touch_conversation(&self, id: Uuid) -> Result<bool, sqlx::Error>;

    async fn append_message(
        &self,
        conversation_id: Uuid,
        message: NewMessage,
    ) -> Result<Message, sqlx::Error>;

    /// Messages of a conversation in the order they were written
    async fn load_context(&self, conversation_id: Uuid) -> Result<Vec<Message>, sqlx::Error>;
}

/// Postgres-backed store
#[derive(Debug, Clone)]
pub struct PgConversationStore {
    pool: PgPool,
}

impl PgConversationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationStore for PgConversationStore {
    async fn create_conversation(&self, title: &str) -> Result<Conversation, sqlx::Error> {
        conversation_repository::create(&self.pool, title).await
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, sqlx::Error> {
        conversation_repository::list_summaries(&self.pool).await
    }

    async fn find_conversation(&self, id: Uuid) -> Result<Option<Conversation>, sqlx::Error> {
        conversation_repository::find_by_id(&self.pool, id).await
    }

    async fn delete_conversation(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        conversation_repository::delete(&self.pool, id).await
    }

    async fn rename_conversation(&self, id: Uuid, title: &str) -> Result<bool, sqlx::Error> {
        conversation_repository::rename(&self.pool, id, title).await
    }

    async fn touch_conversation(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        conversation_repository::touch(&self.pool, id).await
    }

    async fn append_message(
        &self,
        conversation_id: Uuid,
        message: NewMessage,
    ) -> Result<Message, sqlx::Error> {
        message_repository::create(&self.pool, conversation_id, message).await
    }

    async fn load_context(&self, conversation_id: Uuid) -> Result<Vec<Message>, sqlx::Error> {
        message_repository::list_by_conversation(&self.pool, conversation_id).await
    }
}

#[cfg(test)]
pub mod memory {
    //! In-memory store for tests

    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryStore {
        conversations: Mutex<Vec<Conversation>>,
        messages: Mutex<Vec<Message>>,
        /// When set, every message append fails
        pub fail_appends: std::sync::atomic::AtomicBool,
        /// When set, every rename fails
        pub fail_renames: std::sync::atomic::AtomicBool,
    }

    impl MemoryStore {
        pub fn messages_of(&self, conversation_id: Uuid) -> Vec<Message> {
            self.messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.conversation_id == conversation_id)
                .cloned()
                .collect()
        }

        pub fn conversation(&self, id: Uuid) -> Option<Conversation> {
            self.conversations
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.id == id)
                .cloned()
        }

        fn update(&self, id: Uuid, f: impl FnOnce(&mut Conversation)) -> bool {
            let mut conversations = self.conversations.lock().unwrap();
            match conversations.iter_mut().find(|c| c.id == id) {
                Some(conversation) => {
                    f(conversation);
                    true
                }
                None => false,
            }
        }
    }

    #[async_trait]
    impl ConversationStore for MemoryStore {
        async fn create_conversation(&self, title: &str) -> Result<Conversation, sqlx::Error> {
            let now = Utc::now();
            let conversation = Conversation {
                id: Uuid::new_v4(),
                title: title.to_string(),
                created_at: now,
                updated_at: now,
            };
            self.conversations
                .lock()
                .unwrap()
                .push(conversation.clone());
            Ok(conversation)
        }

        async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, sqlx::Error> {
            let messages = self.messages.lock().unwrap();
            let mut summaries: Vec<_> = self
                .conversations
                .lock()
                .unwrap()
                .iter()
                .map(|c| ConversationSummary {
                    id: c.id,
                    title: c.title.clone(),
                    created_at: c.created_at,
                    updated_at: c.updated_at,
                    message_count: messages.iter().filter(|m| m.conversation_id == c.id).count()
                        as i64,
                })
                .collect();
            summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(summaries)
        }

        async fn find_conversation(&self, id: Uuid) -> Result<Option<Conversation>, sqlx::Error> {
            Ok(self.conversation(id))
        }

        async fn delete_conversation(&self, id: Uuid) -> Result<bool, sqlx::Error> {
            let deleted = {
                let mut conversations = self.conversations.lock().unwrap();
                let before = conversations.len();
                conversations.retain(|c| c.id != id);
                conversations.len() < before
            };
            if deleted {
                self.messages
                    .lock()
                    .unwrap()
                    .retain(|m| m.conversation_id != id);
            }
            Ok(deleted)
        }

        async fn rename_conversation(&self, id: Uuid, title: &str) -> Result<bool, sqlx::Error> {
            if self
                .fail_renames
                .load(std::sync::atomic::Ordering::SeqCst)
            {
                return Err(sqlx::Error::PoolTimedOut);
            }
            Ok(self.update(id, |c| {
                c.title = title.to_string();
                c.updated_at = Utc::now();
            }))
        }

        async fn touch_conversation(&self, id: Uuid) -> Result<bool, sqlx::Error> {
            Ok(self.update(id, |c| c.updated_at = Utc::now()))
        }

        async fn append_message(
            &self,
            conversation_id: Uuid,
            message: NewMessage,
        ) -> Result<Message, sqlx::Error> {
            if self
                .fail_appends
                .load(std::sync::atomic::Ordering::SeqCst)
            {
                return Err(sqlx::Error::PoolTimedOut);
            }

            let message = Message {
                id: Uuid::new_v4(),
                conversation_id,
                role: message.role,
                author_name: message.author_name,
                content: message.content,
                step_number: message.step_number,
                created_at: Utc::now(),
            };
            self.messages.lock().unwrap().push(message.clone());
            Ok(message)
        }

        async fn load_context(&self, conversation_id: Uuid) -> Result<Vec<Message>, sqlx::Error> {
            Ok(self.messages_of(conversation_id))
        }
    }
}
