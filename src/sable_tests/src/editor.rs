// Coordinator-side behavior: framing, merging, the queue, and the
// fast/slow-path selector.

use sable_lsp::merge::merge_edits;
use sable_lsp::message::Incoming;
use sable_lsp::queue::MessageQueue;
use sable_lsp::state::CheckerState;
use sable_lsp::transport;
use sable_lsp::WorkspaceEdit;
use serde_json::json;
use std::io::Cursor;

fn notification(method: &str, params: serde_json::Value) -> Incoming {
    Incoming::parse(json!({ "jsonrpc": "2.0", "method": method, "params": params })).unwrap()
}

fn request(id: i64, method: &str, params: serde_json::Value) -> Incoming {
    Incoming::parse(json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
        .unwrap()
}

fn did_open(uri: &str, text: &str) -> Incoming {
    notification(
        "textDocument/didOpen",
        json!({ "textDocument": { "uri": uri, "text": text, "languageId": "sable", "version": 1 } }),
    )
}

fn did_change(uri: &str, text: &str) -> Incoming {
    notification(
        "textDocument/didChange",
        json!({ "textDocument": { "uri": uri, "version": 2 }, "contentChanges": [{ "text": text }] }),
    )
}

#[test]
fn transport_round_trips() {
    let mut wire = Vec::new();
    let message = json!({ "jsonrpc": "2.0", "method": "initialized", "params": {} });
    transport::write_message(&mut wire, &message).expect("write");
    let mut reader = Cursor::new(wire);
    let read = transport::read_message(&mut reader).expect("read");
    assert_eq!(read, Some(message));
    // Clean end of stream afterwards.
    assert_eq!(transport::read_message(&mut reader).expect("eof"), None);
}

#[test]
fn transport_requires_content_length() {
    let mut reader = Cursor::new(b"X-Other: 1\r\n\r\n{}".to_vec());
    let err = transport::read_message(&mut reader);
    assert!(matches!(
        err,
        Err(transport::TransportError::MissingContentLength)
    ));
}

#[test]
fn merging_keeps_the_final_contents_and_counts() {
    let edits = vec![
        did_open("file:///a.sable", "one"),
        did_change("file:///a.sable", "two"),
        did_change("file:///a.sable", "three"),
        did_open("file:///b.sable", "bee"),
    ];
    let merged = merge_edits(edits.iter());
    assert_eq!(merged.counts.opens, 2);
    assert_eq!(merged.counts.changes, 2);
    assert_eq!(merged.files.len(), 2);
    let a = merged
        .files
        .iter()
        .find(|(uri, _)| uri == "file:///a.sable")
        .unwrap();
    assert_eq!(a.1.as_deref(), Some("three"));
}

#[test]
fn queue_fuses_contiguous_edits_and_delays_delayables() {
    let queue = MessageQueue::new();
    queue.push(did_open("file:///a.sable", "one"));
    queue.push(notification("$/setTrace", json!({ "value": "off" })));
    queue.push(did_change("file:///a.sable", "two"));
    queue.push(request(1, "textDocument/hover", json!({})));

    let batch = queue.next_batch().expect("batch");
    // Two edits fused, the delayable trailing them; the query stays queued.
    assert_eq!(batch.len(), 3);
    assert!(batch[0].message.is_edit());
    assert!(batch[1].message.is_edit());
    assert!(batch[2].message.is_delayable());
    assert_eq!(queue.len(), 1);

    let rest = queue.next_batch().expect("batch");
    assert_eq!(rest.len(), 1);
    assert!(matches!(rest[0].message, Incoming::Request(_)));
}

#[test]
fn paused_queue_blocks_until_resumed() {
    use std::sync::Arc;
    let queue = Arc::new(MessageQueue::new());
    queue.push(request(1, "textDocument/hover", json!({})));
    queue.set_paused(true);
    let waiter = Arc::clone(&queue);
    let handle = std::thread::spawn(move || waiter.next_batch());
    // The main thread must still be parked on the condvar.
    std::thread::sleep(std::time::Duration::from_millis(50));
    assert!(!handle.is_finished());
    queue.set_paused(false);
    let batch = handle.join().expect("join").expect("batch");
    assert_eq!(batch.len(), 1);
}

#[test]
fn cancellation_marks_queued_requests_only() {
    let queue = MessageQueue::new();
    queue.push(request(7, "textDocument/hover", json!({})));
    queue.cancel(&json!(7));
    // Late cancellation for something never queued dissolves silently.
    queue.cancel(&json!(99));
    let batch = queue.next_batch().expect("batch");
    assert!(batch[0].cancelled);
}

fn open_edit(files: &[(&str, &str)]) -> WorkspaceEdit {
    let mut edit = WorkspaceEdit::default();
    for (uri, text) in files {
        edit.files.push((uri.to_string(), Some(text.to_string())));
        edit.counts.opens += 1;
    }
    edit
}

const FILE_A: &str = "# typed: true\nclass A\n  sig { params(x: Integer).returns(String) }\n  def bad(x)\n    return 42\n  end\nend\n";
const FILE_B: &str = "# typed: true\nclass B\n  sig { params(x: Integer).returns(Integer) }\n  def go(x)\n    x + 1\n  end\nend\n";
const FILE_B_BODY_EDIT: &str = "# typed: true\nclass B\n  sig { params(x: Integer).returns(Integer) }\n  def go(x)\n    x + 2\n  end\nend\n";
const FILE_B_SIG_EDIT: &str = "# typed: true\nclass B\n  sig { params(x: String).returns(Integer) }\n  def go(x)\n    x + 2\n  end\nend\n";

#[test]
fn body_edit_takes_the_fast_path_and_leaves_other_files_alone() {
    let mut state = CheckerState::new(1);
    let run = state.apply_edit(&open_edit(&[
        ("file:///a.sable", FILE_A),
        ("file:///b.sable", FILE_B),
    ]));
    assert!(!run.took_fast_path, "first ingest is the slow path");
    let a_before = state.diagnostics_for("file:///a.sable").to_vec();
    assert_eq!(a_before.len(), 1, "A carries its return mismatch");
    assert!(state.diagnostics_for("file:///b.sable").is_empty());

    let run = state.apply_edit(&open_edit(&[("file:///b.sable", FILE_B_BODY_EDIT)]));
    assert!(run.took_fast_path);
    assert_eq!(run.retypechecked_methods, 1, "only the edited body re-runs");
    assert_eq!(run.affected_files, vec!["file:///b.sable".to_string()]);
    assert_eq!(
        state.diagnostics_for("file:///a.sable"),
        a_before.as_slice(),
        "untouched files keep their diagnostics"
    );
    assert!(state.diagnostics_for("file:///b.sable").is_empty());
}

#[test]
fn signature_edit_forces_the_slow_path() {
    let mut state = CheckerState::new(1);
    state.apply_edit(&open_edit(&[("file:///b.sable", FILE_B)]));
    let run = state.apply_edit(&open_edit(&[("file:///b.sable", FILE_B_SIG_EDIT)]));
    assert!(!run.took_fast_path, "a changed sig restructures dispatch");
    // And the new world reports the now-wrong body.
    assert!(!state.diagnostics_for("file:///b.sable").is_empty());
}

#[test]
fn fast_path_reuses_cached_results_for_unchanged_methods() {
    let two_methods = "# typed: true\nclass C\n  sig { params(x: Integer).returns(Integer) }\n  def one(x)\n    x + 1\n  end\n\n  sig { params(x: Integer).returns(Integer) }\n  def two(x)\n    x + 2\n  end\nend\n";
    let edited = "# typed: true\nclass C\n  sig { params(x: Integer).returns(Integer) }\n  def one(x)\n    x + 1\n  end\n\n  sig { params(x: Integer).returns(Integer) }\n  def two(x)\n    x + 3\n  end\nend\n";
    let mut state = CheckerState::new(1);
    state.apply_edit(&open_edit(&[("file:///c.sable", two_methods)]));
    let run = state.apply_edit(&open_edit(&[("file:///c.sable", edited)]));
    assert!(run.took_fast_path);
    assert_eq!(run.retypechecked_methods, 1);
}

#[test]
fn strictness_gates_published_diagnostics() {
    let lax = "class A\n  sig { params(x: Integer).returns(String) }\n  def bad(x)\n    return 42\n  end\nend\n";
    let mut state = CheckerState::new(1);
    state.apply_edit(&open_edit(&[("file:///lax.sable", lax)]));
    // No sigil means `typed: false`: inference findings are suppressed.
    assert!(state.diagnostics_for("file:///lax.sable").is_empty());
}
