//! # Outbound message queue

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::cmp::Reverse;

use super::msg::Message;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Unordered set of messages waiting to be sent, from which the highest priority message can be
/// selected.
///
/// Messages of equal priority are selected in the order they were pushed.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    next_seq: u64,

    entries: Vec<(u64, Message)>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: Message) {
        self.entries.push((self.next_seq, msg));
        self.next_seq += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the message which should be sent next.
    pub fn select(&self) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .max_by_key(|(_, (seq, msg))| (msg.priority, Reverse(*seq)))
            .map(|(i, _)| i)
    }

    /// Get the message at the index returned by [`OutboundQueue::select`].
    pub fn get(&self, index: usize) -> Option<&Message> {
        self.entries.get(index).map(|(_, m)| m)
    }

    /// Remove the message at the index returned by [`OutboundQueue::select`].
    pub fn remove(&mut self, index: usize) -> Message {
        self.entries.swap_remove(index).1
    }

    /// Remove and return the message which should be sent next.
    pub fn pop(&mut self) -> Option<Message> {
        self.select().map(|i| self.remove(i))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
