//! Server-side transcripts for embedded widget sessions.
//!
//! Everything lives in process memory and is gone after a restart.

use async_trait::async_trait;
use log::{ debug, info };
use std::collections::{ HashMap, HashSet, VecDeque };
use std::sync::{ Arc, Mutex as SyncMutex };
use tokio::sync::Mutex;

use crate::models::chat::{ ChatMessage, Conversation };

pub const MAX_TURNS_PER_SESSION: usize = 50;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Replaces the stored transcript for `session_id`, keeping only the newest turns.
    async fn save_conversation(&self, session_id: &str, messages: &[ChatMessage]);

    async fn get_conversation(&self, session_id: &str) -> Option<Conversation>;

    async fn session_count(&self) -> usize;
}

#[derive(Default)]
struct Sessions {
    transcripts: HashMap<String, Vec<ChatMessage>>,
    /// Least recently written first.
    order: VecDeque<String>,
}

impl Sessions {
    fn touch(&mut self, session_id: &str) {
        if let Some(pos) = self.order.iter().position(|id| id == session_id) {
            self.order.remove(pos);
        }
        self.order.push_back(session_id.to_string());
    }
}

pub struct MemoryHistoryStore {
    sessions: Mutex<Sessions>,
    max_sessions: usize,
    max_turns: usize,
}

impl MemoryHistoryStore {
    pub fn new(max_sessions: usize) -> Self {
        Self::with_limits(max_sessions, MAX_TURNS_PER_SESSION)
    }

    pub fn with_limits(max_sessions: usize, max_turns: usize) -> Self {
        info!("Widget sessions kept in memory (max {} sessions, {} turns each)", max_sessions, max_turns);
        Self {
            sessions: Mutex::new(Sessions::default()),
            max_sessions: max_sessions.max(1),
            max_turns: max_turns.max(1),
        }
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn save_conversation(&self, session_id: &str, messages: &[ChatMessage]) {
        let start = messages.len().saturating_sub(self.max_turns);
        let kept = messages[start..].to_vec();

        let mut sessions = self.sessions.lock().await;
        sessions.transcripts.insert(session_id.to_string(), kept);
        sessions.touch(session_id);

        while sessions.transcripts.len() > self.max_sessions {
            let Some(oldest) = sessions.order.pop_front() else {
                break;
            };
            sessions.transcripts.remove(&oldest);
            debug!("Evicted widget session {}", oldest);
        }
    }

    async fn get_conversation(&self, session_id: &str) -> Option<Conversation> {
        let sessions = self.sessions.lock().await;
        sessions.transcripts.get(session_id).map(|messages| Conversation {
            id: session_id.to_string(),
            messages: messages.clone(),
        })
    }

    async fn session_count(&self) -> usize {
        self.sessions.lock().await.transcripts.len()
    }
}

/// Sessions with a reply in flight. A session holds at most one `PendingTurn` at a time,
/// so a transcript is never read and rewritten by two requests at once.
#[derive(Clone, Default)]
pub struct PendingTurns {
    sessions: Arc<SyncMutex<HashSet<String>>>,
}

impl PendingTurns {
    /// Claims `session_id`, or `None` while another turn for it is still running.
    pub fn begin(&self, session_id: &str) -> Option<PendingTurn> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if !sessions.insert(session_id.to_string()) {
            return None;
        }
        Some(PendingTurn { sessions: Arc::clone(&self.sessions), session_id: session_id.to_string() })
    }

    pub fn is_pending(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(session_id)
    }
}

/// Releases the session on drop, whichever way the turn ended.
pub struct PendingTurn {
    sessions: Arc<SyncMutex<HashSet<String>>>,
    session_id: String,
}

impl Drop for PendingTurn {
    fn drop(&mut self) {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.session_id);
    }
}
