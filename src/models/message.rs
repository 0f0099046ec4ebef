//! Message threads and chat messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Recipient ids with this prefix address a teacher's whole class
pub const CLASS_TARGET_PREFIX: &str = "class-";

/// Thread flavors: one-to-one or class-wide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadKind {
    #[serde(rename = "private")]
    Private,
    #[serde(rename = "class")]
    Class,
}

impl ThreadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Class => "class",
        }
    }
}

/// Derive the stable thread id for a sender/recipient pair.
///
/// Class targets are their own thread id, so every post addressed to the
/// class lands in one shared thread. Private pairs sort their two ids so
/// both directions resolve to the same thread.
pub fn thread_id_for(sender_id: &str, recipient_id: &str) -> (String, ThreadKind) {
    if recipient_id.starts_with(CLASS_TARGET_PREFIX) {
        (recipient_id.to_string(), ThreadKind::Class)
    } else {
        let (first, second) = if sender_id <= recipient_id {
            (sender_id, recipient_id)
        } else {
            (recipient_id, sender_id)
        };
        (format!("{}-{}", first, second), ThreadKind::Private)
    }
}

/// Extract the teacher name from a class target id
pub fn class_teacher(target: &str) -> Option<&str> {
    target.strip_prefix(CLASS_TARGET_PREFIX)
}

/// Build the class target id for a teacher
pub fn class_target(teacher: &str) -> String {
    format!("{}{}", CLASS_TARGET_PREFIX, teacher)
}

/// One message inside a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub message_id: Uuid,
    pub sender_id: String,
    pub message_content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender_id: &str, message_content: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            sender_id: sender_id.to_string(),
            message_content: message_content.to_string(),
            timestamp,
        }
    }
}

/// A durable conversation document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageThread {
    pub thread_id: String,
    pub thread_type: ThreadKind,
    pub participants: Vec<String>,
    pub messages: Vec<ChatMessage>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl MessageThread {
    pub fn new(thread_id: &str, thread_type: ThreadKind, participants: Vec<String>) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            thread_type,
            participants,
            messages: Vec::new(),
            last_message_at: None,
        }
    }

    /// Append a message and advance the activity timestamp
    pub fn append(&mut self, message: ChatMessage) {
        self.last_message_at = Some(message.timestamp);
        self.messages.push(message);
    }

    /// Record a participant if not already present
    pub fn add_participant(&mut self, member_name: &str) {
        if !self.participants.iter().any(|p| p == member_name) {
            self.participants.push(member_name.to_string());
        }
    }

    pub fn involves(&self, member_name: &str) -> bool {
        self.participants.iter().any(|p| p == member_name)
    }
}
