//! Bounded conversation history
//!
//! Completed exchanges are stored as adjacent user/assistant pairs and evicted
//! a pair at a time. A user turn waits in a pending slot until its reply
//! arrives; a newer user turn replaces it, and a reply with no pending user
//! turn is dropped.
//!
//! Properties:
//! - `len() <= 2 * capacity_pairs()` after every push
//! - eviction removes exactly the two oldest entries
//! - [`TurnHistory::snapshot`] only returns whole pairs, oldest first

use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person talking to the device
    User,
    /// The assistant's reply
    Assistant,
}

impl Role {
    /// Wire name used by chat completion APIs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role-tagged message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    /// Create a turn, returning `None` when the content is blank
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Option<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return None;
        }
        Some(Self { role, content })
    }
}

/// Ring of the most recent conversation turns
#[derive(Debug, Clone)]
pub struct TurnHistory {
    /// Completed pairs, always user then assistant
    turns: VecDeque<ConversationTurn>,
    pending: Option<ConversationTurn>,
    max_pairs: NonZeroUsize,
}

impl TurnHistory {
    /// Create an empty history holding at most `max_pairs` exchanges
    #[must_use]
    pub fn new(max_pairs: NonZeroUsize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_pairs.get() * 2),
            pending: None,
            max_pairs,
        }
    }

    /// Append one turn, evicting the oldest pair first if full
    ///
    /// Blank content is ignored. A user turn replaces any user turn still
    /// waiting for a reply; an assistant turn with nothing to answer is
    /// dropped.
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        let Some(turn) = ConversationTurn::new(role, content) else {
            tracing::debug!(%role, "ignoring blank turn");
            return;
        };

        match role {
            Role::User => {
                if let Some(replaced) = self.pending.replace(turn) {
                    tracing::debug!(
                        chars = replaced.content.len(),
                        "replaced unanswered user turn"
                    );
                } else if self.turns.len() + 1 > self.max_entries() {
                    self.evict_oldest_pair();
                }
            }
            Role::Assistant => {
                let Some(user) = self.pending.take() else {
                    tracing::debug!("ignoring reply without a user turn");
                    return;
                };
                if self.turns.len() + 2 > self.max_entries() {
                    self.evict_oldest_pair();
                }
                self.turns.push_back(user);
                self.turns.push_back(turn);
            }
        }
    }

    /// Append a completed user/assistant exchange
    pub fn push_exchange(&mut self, user: &str, assistant: &str) {
        if user.trim().is_empty() || assistant.trim().is_empty() {
            tracing::debug!("ignoring incomplete exchange");
            return;
        }
        self.push(Role::User, user);
        self.push(Role::Assistant, assistant);
    }

    /// Most recent `max_pairs` complete pairs in chronological order
    #[must_use]
    pub fn snapshot(&self, max_pairs: usize) -> Vec<ConversationTurn> {
        let pairs = self.pairs();
        let take = max_pairs.min(pairs);
        let start = (pairs - take) * 2;

        self.turns.range(start..).cloned().collect()
    }

    /// Drop everything; used on explicit session reset
    pub fn clear(&mut self) {
        self.turns.clear();
        self.pending = None;
    }

    /// Number of stored turns, including an unanswered user turn
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len() + usize::from(self.pending.is_some())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of complete pairs currently stored
    #[must_use]
    pub fn pairs(&self) -> usize {
        self.turns.len() / 2
    }

    /// Configured pair capacity
    #[must_use]
    pub const fn capacity_pairs(&self) -> usize {
        self.max_pairs.get()
    }

    /// Iterate over all stored turns, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter().chain(self.pending.as_ref())
    }

    const fn max_entries(&self) -> usize {
        self.max_pairs.get() * 2
    }

    fn evict_oldest_pair(&mut self) {
        self.turns.pop_front();
        self.turns.pop_front();
        tracing::trace!(remaining = self.turns.len(), "evicted oldest pair");
    }
}
