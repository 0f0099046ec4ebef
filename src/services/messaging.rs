//! Messaging: durable thread storage first, best-effort fan-out second.
//!
//! A message is accepted once it is in the thread document. Delivery to
//! live sockets happens after that and is allowed to fail silently; the
//! recipient sees the message on their next history fetch.

use crate::error::{AppError, AppResult};
use crate::models::{
    class_target, class_teacher, thread_id_for, ChatMessage, MessageThread, ThreadKind,
};
use crate::presence::PresenceRouter;
use crate::repositories::{ProfileRepository, ThreadRepository};
use crate::websocket::WsEvent;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

pub struct MessagingService {
    profiles: Arc<ProfileRepository>,
    threads: Arc<ThreadRepository>,
    router: Arc<PresenceRouter>,
}

impl MessagingService {
    pub fn new(
        profiles: Arc<ProfileRepository>,
        threads: Arc<ThreadRepository>,
        router: Arc<PresenceRouter>,
    ) -> Self {
        Self {
            profiles,
            threads,
            router,
        }
    }

    /// Append a message to its thread, then fan it out to whoever is live.
    ///
    /// Class posts resolve the roster at send time, so only currently
    /// enrolled students are addressed. Returns the thread id and the
    /// stored message.
    pub async fn post_message(
        &self,
        sender_id: &str,
        recipient_id: &str,
        content: &str,
    ) -> AppResult<(String, ChatMessage)> {
        if sender_id.trim().is_empty() || recipient_id.trim().is_empty() {
            return Err(AppError::Validation(
                "senderId and recipientId are required".to_string(),
            ));
        }
        if content.trim().is_empty() {
            return Err(AppError::Validation(
                "messageContent must not be empty".to_string(),
            ));
        }

        let (thread_id, thread_type) = thread_id_for(sender_id, recipient_id);
        let participants = match thread_type {
            ThreadKind::Private => vec![sender_id.to_string(), recipient_id.to_string()],
            ThreadKind::Class => {
                let mut participants = vec![sender_id.to_string()];
                if let Some(teacher) = class_teacher(recipient_id) {
                    if teacher != sender_id {
                        participants.push(teacher.to_string());
                    }
                }
                participants
            }
        };

        let message = ChatMessage::new(sender_id, content, Utc::now());
        self.threads
            .append_message(&thread_id, thread_type, &participants, &message)
            .await?;

        // Durable from here on; delivery is best effort
        self.fan_out(&thread_id, thread_type, recipient_id, sender_id, &message)
            .await;

        Ok((thread_id, message))
    }

    async fn fan_out(
        &self,
        thread_id: &str,
        thread_type: ThreadKind,
        recipient_id: &str,
        sender_id: &str,
        message: &ChatMessage,
    ) {
        let event = WsEvent::NewMessage {
            thread_id: thread_id.to_string(),
            thread_type,
            message: message.clone(),
        };

        match thread_type {
            ThreadKind::Private => {
                for identity in [recipient_id, sender_id] {
                    if !self.router.send_to(identity, event.clone()).await {
                        debug!("'{}' not live for message delivery", identity);
                    }
                }
            }
            ThreadKind::Class => {
                let Some(teacher) = class_teacher(recipient_id) else {
                    return;
                };
                let mut targets: Vec<String> = match self.profiles.students_of(teacher).await {
                    Ok(roster) => roster.into_iter().map(|p| p.member_name).collect(),
                    Err(e) => {
                        debug!("Roster lookup for '{}' failed: {}", teacher, e);
                        Vec::new()
                    }
                };
                targets.push(teacher.to_string());
                targets.push(sender_id.to_string());
                targets.sort();
                targets.dedup();
                for identity in targets {
                    if !self.router.send_to(&identity, event.clone()).await {
                        debug!("'{}' not live for class message delivery", identity);
                    }
                }
            }
        }
    }

    /// Every thread the member participates in, most recent activity first.
    ///
    /// A student is implicitly a participant of their class thread even if
    /// they have never posted to it.
    pub async fn threads_for(&self, member_name: &str) -> AppResult<Vec<MessageThread>> {
        let own_class_thread = self
            .profiles
            .try_get(member_name)
            .await?
            .map(|profile| class_target(&profile.teacher));

        let mut threads: Vec<MessageThread> = self
            .threads
            .list_all()
            .await?
            .into_iter()
            .filter(|thread| {
                if thread.involves(member_name) {
                    return true;
                }
                match thread.thread_type {
                    ThreadKind::Class => {
                        own_class_thread.as_deref() == Some(thread.thread_id.as_str())
                            || class_teacher(&thread.thread_id) == Some(member_name)
                    }
                    ThreadKind::Private => false,
                }
            })
            .collect();

        threads.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(threads)
    }
}
