//! Bounded conversation history.

use std::collections::VecDeque;

use crate::message::ChatMessage;

/// Upper bound on the turns preallocated up front; larger windows grow on demand.
const PREALLOCATED_TURNS: usize = 64;

/// Sliding window over the most recent chat turns of one agent.
///
/// Sized by `AI_CONTEXT_WINDOW`. When full, the oldest turn is evicted.
/// A window of `0` keeps nothing.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    window: usize,
    turns: VecDeque<ChatMessage>,
}

impl ConversationMemory {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            turns: VecDeque::with_capacity(window.min(PREALLOCATED_TURNS)),
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        if self.window == 0 {
            return;
        }
        while self.turns.len() >= self.window {
            self.turns.pop_front();
        }
        self.turns.push_back(message);
    }

    /// Oldest first.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.turns.iter().cloned().collect()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
