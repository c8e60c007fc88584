// Already-parsed client messages, as the core consumes them.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct RequestMessage {
    pub id: Value,
    pub method: String,
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessage {
    pub method: String,
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Request(RequestMessage),
    Notification(NotificationMessage),
}

impl Incoming {
    /// Decode a raw JSON-RPC envelope. Responses from the client (to
    /// server-initiated requests) and malformed envelopes yield `None`.
    pub fn parse(value: Value) -> Option<Incoming> {
        let obj = value.as_object()?;
        let method = obj.get("method")?.as_str()?.to_string();
        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        match obj.get("id") {
            Some(id) => Some(Incoming::Request(RequestMessage {
                id: id.clone(),
                method,
                params,
            })),
            None => Some(Incoming::Notification(NotificationMessage { method, params })),
        }
    }

    pub fn method(&self) -> &str {
        match self {
            Incoming::Request(r) => &r.method,
            Incoming::Notification(n) => &n.method,
        }
    }

    /// Edits mutate the workspace: document lifecycle plus watcher events.
    pub fn is_edit(&self) -> bool {
        matches!(
            self.method(),
            "textDocument/didOpen"
                | "textDocument/didChange"
                | "textDocument/didClose"
                | "workspace/didChangeWatchedFiles"
        )
    }

    /// Delayable messages observe no workspace state, so they may be
    /// reordered past edits during merging.
    pub fn is_delayable(&self) -> bool {
        matches!(
            self.method(),
            "initialized" | "$/setTrace" | "$/logTrace" | "telemetry/event"
        )
    }
}
