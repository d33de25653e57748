// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide message fan-out.
//!
//! A single bounded broadcast channel delivers every [`Message`] to every
//! subscriber. A subscriber that falls more than the channel capacity
//! behind skips ahead (drop-oldest); the publisher never blocks.

use crate::message::Message;
use tokio::sync::broadcast;

/// Default channel capacity per subscriber.
const CHANNEL_CAPACITY: usize = 1024;

/// Cloneable handle to the process-wide broadcast channel.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<Message>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all messages published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.tx.subscribe()
    }

    /// Publish a message to every current subscriber.
    ///
    /// Publishing with no subscribers is not an error; the message is
    /// simply dropped.
    pub fn publish(&self, message: Message) {
        let _ = self.tx.send(message);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
