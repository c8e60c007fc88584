// The shared request queue: one mutex around the pending deque and
// counters, one condvar for the single suspension point of the main
// thread.

use crate::message::Incoming;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

#[derive(Debug)]
struct QueueState {
    pending: VecDeque<Entry>,
    terminate: bool,
    paused: bool,
}

#[derive(Debug)]
pub struct Entry {
    pub message: Incoming,
    pub cancelled: bool,
}

#[derive(Debug)]
pub struct MessageQueue {
    state: Mutex<QueueState>,
    wakeup: Condvar,
}

impl Default for MessageQueue {
    fn default() -> Self {
        MessageQueue::new()
    }
}

impl MessageQueue {
    pub fn new() -> MessageQueue {
        MessageQueue {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                terminate: false,
                paused: false,
            }),
            wakeup: Condvar::new(),
        }
    }

    pub fn push(&self, message: Incoming) {
        let mut state = self.state.lock().expect("queue poisoned");
        state.pending.push_back(Entry {
            message,
            cancelled: false,
        });
        drop(state);
        self.wakeup.notify_one();
    }

    /// Mark a queued-but-unstarted request cancelled. A cancellation that
    /// finds no matching entry arrived too late and is dropped silently.
    pub fn cancel(&self, id: &Value) {
        let mut state = self.state.lock().expect("queue poisoned");
        for entry in state.pending.iter_mut() {
            if let Incoming::Request(r) = &entry.message {
                if &r.id == id {
                    entry.cancelled = true;
                    return;
                }
            }
        }
    }

    pub fn set_terminate(&self) {
        self.state.lock().expect("queue poisoned").terminate = true;
        self.wakeup.notify_all();
    }

    pub fn set_paused(&self, paused: bool) {
        self.state.lock().expect("queue poisoned").paused = paused;
        self.wakeup.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("queue poisoned").pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The main thread's only blocking wait: `terminate || (!paused &&
    /// non-empty)`. Returns the whole mergeable front of the queue: either
    /// one non-edit message, or a run of edits with any delayable
    /// messages that sat between them (in order, after the edits).
    pub fn next_batch(&self) -> Option<Vec<Entry>> {
        let mut state = self.state.lock().expect("queue poisoned");
        loop {
            if state.terminate {
                return None;
            }
            if !state.paused && !state.pending.is_empty() {
                break;
            }
            state = self.wakeup.wait(state).expect("queue poisoned");
        }

        let first = state.pending.pop_front().expect("checked non-empty");
        if first.cancelled || !first.message.is_edit() {
            return Some(vec![first]);
        }
        let mut edits = vec![first];
        let mut delayed = Vec::new();
        while let Some(front) = state.pending.front() {
            if front.cancelled {
                break;
            }
            if front.message.is_edit() {
                edits.push(state.pending.pop_front().unwrap());
            } else if front.message.is_delayable() {
                delayed.push(state.pending.pop_front().unwrap());
            } else {
                break;
            }
        }
        // Delayables that separated the edits run after the fused edit.
        edits.extend(delayed);
        Some(edits)
    }
}
