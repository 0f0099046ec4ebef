//! Repository for message thread documents

use crate::error::StoreError;
use crate::models::{ChatMessage, MessageThread, ThreadKind};
use crate::store::{DocumentStore, StoreResult, Versioned};
use std::sync::Arc;

/// Bounded retries for compare-and-swap replacement
const CAS_RETRIES: usize = 5;

pub struct ThreadRepository {
    store: Arc<dyn DocumentStore>,
}

impl ThreadRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Fetch a thread if present
    pub async fn try_get(&self, thread_id: &str) -> StoreResult<Option<MessageThread>> {
        Ok(self
            .store
            .get_thread(thread_id)
            .await?
            .map(|versioned| versioned.doc))
    }

    /// All threads, ordered by thread id
    pub async fn list_all(&self) -> StoreResult<Vec<MessageThread>> {
        self.store.list_threads().await
    }

    /// Append a message, creating the thread on first use.
    ///
    /// Loses to a concurrent creator at most once per attempt; the loser
    /// falls back to appending onto the winner's document.
    pub async fn append_message(
        &self,
        thread_id: &str,
        thread_type: ThreadKind,
        participants: &[String],
        message: &ChatMessage,
    ) -> StoreResult<MessageThread> {
        for _ in 0..CAS_RETRIES {
            match self.store.get_thread(thread_id).await? {
                Some(Versioned { mut doc, version }) => {
                    for participant in participants {
                        doc.add_participant(participant);
                    }
                    doc.append(message.clone());
                    match self.store.replace_thread(&doc, version).await {
                        Ok(_) => return Ok(doc),
                        Err(StoreError::VersionConflict { .. }) => continue,
                        Err(err) => return Err(err),
                    }
                }
                None => {
                    let mut doc =
                        MessageThread::new(thread_id, thread_type, participants.to_vec());
                    doc.append(message.clone());
                    match self.store.insert_thread(&doc).await {
                        Ok(_) => return Ok(doc),
                        // Lost the create race; retry against the winner
                        Err(StoreError::Duplicate(_)) => continue,
                        Err(err) => return Err(err),
                    }
                }
            }
        }
        Err(StoreError::VersionConflict {
            collection: "threads".to_string(),
            key: thread_id.to_string(),
        })
    }
}
