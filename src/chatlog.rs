//! Chat log and human-review queue store.
//!
//! The caller layer records every answered turn and queues unresolved
//! ones for human review. The store is an explicit interface injected by
//! the caller — process-wide lifetime, reset on restart — rather than a
//! module-level global.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;

use crate::language::Language;
use crate::models::{Category, ChatTurn};

/// One answered chat turn, as recorded by the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ChatLogEntry {
    pub user_id: Option<String>,
    pub session_id: String,
    pub message: String,
    pub response: String,
    pub language: Language,
    pub category: Category,
    pub confidence: f32,
    pub resolved: bool,
    pub timestamp: DateTime<Utc>,
}

impl ChatLogEntry {
    pub fn from_turn(turn: &ChatTurn, user_id: Option<&str>, session_id: &str) -> Self {
        Self {
            user_id: user_id.map(str::to_string),
            session_id: session_id.to_string(),
            message: turn.message.clone(),
            response: turn.response.clone(),
            language: turn.language,
            category: turn.category,
            confidence: turn.confidence,
            resolved: turn.resolved,
            timestamp: Utc::now(),
        }
    }
}

/// An unresolved turn awaiting human review.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewTicket {
    pub chat_id: String,
    pub user_id: Option<String>,
    pub session_id: String,
    pub message: String,
    pub response: String,
    pub category: Category,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

pub trait ChatStore: Send + Sync {
    fn append(&self, entry: ChatLogEntry);
    fn by_session(&self, session_id: &str) -> Vec<ChatLogEntry>;
    fn queue_ticket(&self, ticket: ReviewTicket);
    fn pending_tickets(&self) -> Vec<ReviewTicket>;
}

/// In-memory store; contents live for the process and vanish on restart.
#[derive(Default)]
pub struct MemoryChatStore {
    logs: Mutex<Vec<ChatLogEntry>>,
    queue: Mutex<Vec<ReviewTicket>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a turn and, when unresolved, queue it for review.
    pub fn record_turn(&self, turn: &ChatTurn, user_id: Option<&str>, session_id: &str) {
        let entry = ChatLogEntry::from_turn(turn, user_id, session_id);
        if !entry.resolved {
            let position = self.logs.lock().unwrap().len() + 1;
            self.queue_ticket(ReviewTicket {
                chat_id: format!("{}_{}", session_id, position),
                user_id: entry.user_id.clone(),
                session_id: session_id.to_string(),
                message: entry.message.clone(),
                response: entry.response.clone(),
                category: entry.category,
                confidence: entry.confidence,
                timestamp: entry.timestamp,
            });
        }
        self.append(entry);
    }
}

impl ChatStore for MemoryChatStore {
    fn append(&self, entry: ChatLogEntry) {
        self.logs.lock().unwrap().push(entry);
    }

    fn by_session(&self, session_id: &str) -> Vec<ChatLogEntry> {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.session_id == session_id)
            .cloned()
            .collect()
    }

    fn queue_ticket(&self, ticket: ReviewTicket) {
        self.queue.lock().unwrap().push(ticket);
    }

    fn pending_tickets(&self) -> Vec<ReviewTicket> {
        self.queue.lock().unwrap().clone()
    }
}
