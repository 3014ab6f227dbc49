// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Log broadcast bus: fans one deploy's output out to every SSE subscriber.
//!
//! Frames are encoded once as `data: <json>\n\n` and pushed to each
//! subscriber's channel. A subscriber whose channel is gone is dropped on
//! the spot; there is no buffering and no server-side reconnect.

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

pub struct LogBus {
    subscribers: Mutex<Vec<UnboundedSender<String>>>,
}

impl LogBus {
    pub fn new() -> Self {
        Self { subscribers: Mutex::new(Vec::new()) }
    }

    /// Register a subscriber and hand back its frame stream.
    pub fn subscribe(&self) -> UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn client_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Broadcast one log line.
    pub fn line(&self, line: &str) {
        self.broadcast(serde_json::json!({ "type": "log", "line": line }));
    }

    /// Broadcast the terminal completion event.
    pub fn complete(&self, success: bool, error: Option<&str>) {
        let frame = match error {
            Some(error) => {
                serde_json::json!({ "type": "complete", "success": success, "error": error })
            }
            None => serde_json::json!({ "type": "complete", "success": success }),
        };
        self.broadcast(frame);
    }

    fn broadcast(&self, value: serde_json::Value) {
        let frame = format!("data: {}\n\n", value);
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|tx| tx.send(frame.clone()).is_ok());
        if subscribers.len() < before {
            debug!(dropped = before - subscribers.len(), "removed dead log subscribers");
        }
    }
}

impl Default for LogBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
