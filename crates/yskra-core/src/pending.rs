//! Waiters for request/response commands
//!
//! Replies carry no correlation id, only the command name, so every waiter
//! registered under a name is resolved by the first reply with that name.

use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Outstanding request/response commands keyed by command name
#[derive(Debug, Default)]
pub struct PendingCommands {
    next_id: u64,
    waiters: HashMap<String, Vec<(u64, oneshot::Sender<Value>)>>,
}

impl PendingCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for the next reply to `command`
    pub fn register(&mut self, command: &str) -> (u64, oneshot::Receiver<Value>) {
        let id = self.next_id;
        self.next_id += 1;
        let (tx, rx) = oneshot::channel();
        self.waiters
            .entry(command.to_string())
            .or_default()
            .push((id, tx));
        (id, rx)
    }

    /// Resolve every waiter for `command`, returning how many were still listening
    pub fn resolve(&mut self, command: &str, answer: &Value) -> usize {
        let Some(waiters) = self.waiters.remove(command) else {
            return 0;
        };
        waiters
            .into_iter()
            .filter_map(|(_, tx)| tx.send(answer.clone()).ok())
            .count()
    }

    /// Drop one waiter, e.g. after it timed out
    pub fn remove(&mut self, command: &str, id: u64) {
        if let Some(waiters) = self.waiters.get_mut(command) {
            waiters.retain(|(wid, _)| *wid != id);
            if waiters.is_empty() {
                self.waiters.remove(command);
            }
        }
    }

    /// Drop every waiter; their receivers observe a closed channel
    pub fn cancel_all(&mut self) -> usize {
        let count = self.len();
        self.waiters.clear();
        count
    }

    /// Number of outstanding waiters
    pub fn len(&self) -> usize {
        self.waiters.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Whether anyone waits for a reply to `command`
    pub fn is_waiting(&self, command: &str) -> bool {
        self.waiters.contains_key(command)
    }
}
