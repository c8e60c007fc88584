// Edit coalescing: a run of contiguous edit messages fuses into one
// workspace edit with the final per-file contents and a running count per
// edit kind.

use crate::message::Incoming;
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditCounts {
    pub opens: usize,
    pub changes: usize,
    pub closes: usize,
    pub watcher: usize,
}

#[derive(Debug, Clone, Default)]
pub struct WorkspaceEdit {
    /// Final contents per file; `None` means the document was closed (its
    /// buffer no longer overrides the disk state).
    pub files: Vec<(String, Option<String>)>,
    pub counts: EditCounts,
}

impl WorkspaceEdit {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn record(&mut self, uri: String, contents: Option<String>) {
        if let Some(slot) = self.files.iter_mut().find(|(u, _)| *u == uri) {
            slot.1 = contents;
        } else {
            self.files.push((uri, contents));
        }
    }
}

/// Fuse a run of edit messages. Later edits to the same file win; the
/// aggregate preserves the final effect of applying them in order.
pub fn merge_edits<'a>(edits: impl Iterator<Item = &'a Incoming>) -> WorkspaceEdit {
    let mut merged = WorkspaceEdit::default();
    for edit in edits {
        let params = match edit {
            Incoming::Notification(n) => &n.params,
            Incoming::Request(_) => continue,
        };
        match edit.method() {
            "textDocument/didOpen" => {
                merged.counts.opens += 1;
                if let (Some(uri), Some(text)) = (
                    pointer_str(params, "/textDocument/uri"),
                    pointer_str(params, "/textDocument/text"),
                ) {
                    merged.record(uri.to_string(), Some(text.to_string()));
                }
            }
            "textDocument/didChange" => {
                merged.counts.changes += 1;
                let uri = pointer_str(params, "/textDocument/uri");
                // Full-document sync: the last change entry carries the
                // complete text.
                let text = params
                    .pointer("/contentChanges")
                    .and_then(Value::as_array)
                    .and_then(|changes| changes.last())
                    .and_then(|c| c.get("text"))
                    .and_then(Value::as_str);
                if let (Some(uri), Some(text)) = (uri, text) {
                    merged.record(uri.to_string(), Some(text.to_string()));
                }
            }
            "textDocument/didClose" => {
                merged.counts.closes += 1;
                if let Some(uri) = pointer_str(params, "/textDocument/uri") {
                    merged.record(uri.to_string(), None);
                }
            }
            "workspace/didChangeWatchedFiles" => {
                merged.counts.watcher += 1;
                if let Some(changes) = params.get("changes").and_then(Value::as_array) {
                    for change in changes {
                        if let Some(uri) = change.get("uri").and_then(Value::as_str) {
                            // Watcher events carry no contents; the driver
                            // re-reads from disk (deleted files read as
                            // closed).
                            let path = uri.strip_prefix("file://").unwrap_or(uri);
                            let contents = std::fs::read_to_string(path).ok();
                            merged.record(uri.to_string(), contents);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    merged
}

fn pointer_str<'v>(value: &'v Value, pointer: &str) -> Option<&'v str> {
    value.pointer(pointer).and_then(Value::as_str)
}
