//! Client-side snapshot caches threaded through a scenario.
//!
//! Every entry is a point-in-time observation. The broker may have moved the
//! message on by the time it is read back, so these sets are only used for
//! reporting and as sequence-number sources. They are cleared between phases.

use crate::message::ReceivedMessage;
use crate::queue::SubQueue;
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(test)]
#[path = "caches_tests.rs"]
mod tests;

/// Peeked, received and peeked-dead-letter snapshots of one scenario phase
#[derive(Debug, Clone, Default)]
pub struct LocalCaches {
    peeked: Vec<ReceivedMessage>,
    received: Vec<ReceivedMessage>,
    peeked_dead_letter: Vec<ReceivedMessage>,
}

impl LocalCaches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append peeked snapshots to the set matching the sub-queue they came from
    pub fn record_peeked(
        &mut self,
        sub_queue: SubQueue,
        messages: impl IntoIterator<Item = ReceivedMessage>,
    ) {
        match sub_queue {
            SubQueue::None => self.peeked.extend(messages),
            SubQueue::DeadLetter => self.peeked_dead_letter.extend(messages),
        }
    }

    pub fn record_received(&mut self, messages: impl IntoIterator<Item = ReceivedMessage>) {
        self.received.extend(messages);
    }

    pub fn peeked(&self) -> &[ReceivedMessage] {
        &self.peeked
    }

    pub fn received(&self) -> &[ReceivedMessage] {
        &self.received
    }

    pub fn peeked_dead_letter(&self) -> &[ReceivedMessage] {
        &self.peeked_dead_letter
    }

    /// Peeked snapshots taken from `sub_queue`
    pub fn peeked_from(&self, sub_queue: SubQueue) -> &[ReceivedMessage] {
        match sub_queue {
            SubQueue::None => &self.peeked,
            SubQueue::DeadLetter => &self.peeked_dead_letter,
        }
    }

    /// Drop every snapshot
    pub fn clear(&mut self) {
        self.peeked.clear();
        self.received.clear();
        self.peeked_dead_letter.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.peeked.is_empty() && self.received.is_empty() && self.peeked_dead_letter.is_empty()
    }

    pub fn summary(&self) -> CacheSummary {
        CacheSummary {
            peeked: self.peeked.len(),
            received: self.received.len(),
            peeked_dead_letter: self.peeked_dead_letter.len(),
        }
    }

    /// Snapshots a phase report shows: received messages first, then
    /// dead-letter peeks, then plain peeks.
    pub fn printable(&self) -> &[ReceivedMessage] {
        if !self.received.is_empty() {
            &self.received
        } else if !self.peeked_dead_letter.is_empty() {
            &self.peeked_dead_letter
        } else {
            &self.peeked
        }
    }
}

/// Cache sizes printed as a scenario's state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSummary {
    pub peeked: usize,
    pub received: usize,
    pub peeked_dead_letter: usize,
}

impl fmt::Display for CacheSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Peeked msgs count: {}", self.peeked)?;
        writeln!(f, "Received msgs count: {}", self.received)?;
        write!(f, "Peeked Dead letter msgs count: {}", self.peeked_dead_letter)
    }
}
