// The coordinator proper: one main thread draining the queue, one sidecar
// reader thread feeding it. Queries are handled synchronously against the
// committed state; edits go through the fast/slow-path driver.

use crate::merge::merge_edits;
use crate::message::{Incoming, RequestMessage};
use crate::progress::OperationGuard;
use crate::queries;
use crate::queue::{Entry, MessageQueue};
use crate::state::CheckerState;
use crate::transport;
use log::{debug, info, warn};
use lsp_types as lsp;
use serde_json::{json, Value};
use std::sync::Arc;

const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const REQUEST_CANCELLED: i64 = -32800;

pub struct Coordinator {
    pub state: CheckerState,
    shutdown_requested: bool,
}

impl Coordinator {
    pub fn new(max_threads: usize) -> Coordinator {
        Coordinator {
            state: CheckerState::new(max_threads),
            shutdown_requested: false,
        }
    }

    /// Handle one queue batch. Returns the outgoing messages and whether
    /// the loop should keep running.
    pub fn handle_batch(&mut self, batch: Vec<Entry>) -> (Vec<Value>, bool) {
        let mut out = Vec::new();
        let mut keep_going = true;

        // A batch either starts with a run of edits (to be fused) or is a
        // single non-edit message.
        let edit_count = batch
            .iter()
            .take_while(|e| !e.cancelled && e.message.is_edit())
            .count();
        if edit_count > 0 {
            let fused = merge_edits(batch[..edit_count].iter().map(|e| &e.message));
            debug!(
                "fused {} edit messages over {} files (opens {}, changes {}, closes {}, watcher {})",
                edit_count,
                fused.files.len(),
                fused.counts.opens,
                fused.counts.changes,
                fused.counts.closes,
                fused.counts.watcher
            );
            let run = if self.state.fast_eligible(&fused) {
                self.state.apply_edit(&fused)
            } else {
                let guard = OperationGuard::begin(&mut out, "SlowPathTypecheck");
                let run = self.state.apply_edit(&fused);
                drop(guard);
                run
            };
            for uri in &run.affected_files {
                out.push(self.publish_diagnostics(uri));
            }
        }
        for entry in batch.into_iter().skip(edit_count) {
            if !self.handle_message(entry, &mut out) {
                keep_going = false;
            }
        }
        (out, keep_going)
    }

    fn handle_message(&mut self, entry: Entry, out: &mut Vec<Value>) -> bool {
        match entry.message {
            Incoming::Request(request) => {
                if entry.cancelled {
                    out.push(error_response(
                        &request.id,
                        REQUEST_CANCELLED,
                        "request cancelled",
                    ));
                    return true;
                }
                let response = self.handle_request(&request);
                out.push(response);
                true
            }
            Incoming::Notification(n) => match n.method.as_str() {
                "exit" => false,
                "initialized" => {
                    out.push(json!({
                        "jsonrpc": "2.0",
                        "method": "window/showMessage",
                        "params": {
                            "type": lsp::MessageType::INFO,
                            "message": "sable-lsp ready",
                        },
                    }));
                    true
                }
                "$/setTrace" | "$/logTrace" | "telemetry/event" => true,
                "$/cancelRequest" => true,
                other => {
                    debug!("ignoring notification {}", other);
                    true
                }
            },
        }
    }

    fn handle_request(&mut self, request: &RequestMessage) -> Value {
        if self.shutdown_requested && request.method != "shutdown" {
            return error_response(
                &request.id,
                INVALID_REQUEST,
                "server is shutting down",
            );
        }
        match request.method.as_str() {
            "initialize" => {
                info!("initialize received");
                result_response(&request.id, initialize_result())
            }
            "shutdown" => {
                self.shutdown_requested = true;
                result_response(&request.id, Value::Null)
            }
            "textDocument/hover" => self.positional(request, |state, uri, pos| {
                serde_json::to_value(queries::hover::hover(state, uri, pos)).unwrap_or(Value::Null)
            }),
            "textDocument/definition" => self.positional(request, |state, uri, pos| {
                serde_json::to_value(queries::navigation::definition(state, uri, pos))
                    .unwrap_or(Value::Null)
            }),
            "textDocument/references" => {
                let include = request
                    .params
                    .pointer("/context/includeDeclaration")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                self.positional(request, move |state, uri, pos| {
                    serde_json::to_value(queries::references::references(
                        state, uri, pos, include,
                    ))
                    .unwrap_or(Value::Null)
                })
            }
            "textDocument/completion" => self.positional(request, |state, uri, pos| {
                serde_json::to_value(queries::completion::completion(state, uri, pos))
                    .unwrap_or(Value::Null)
            }),
            "textDocument/signatureHelp" => self.positional(request, |state, uri, pos| {
                serde_json::to_value(queries::signature_help::signature_help(state, uri, pos))
                    .unwrap_or(Value::Null)
            }),
            "textDocument/documentSymbol" => {
                match request
                    .params
                    .pointer("/textDocument/uri")
                    .and_then(Value::as_str)
                {
                    Some(uri) => result_response(
                        &request.id,
                        serde_json::to_value(queries::symbols::document_symbols(
                            &self.state,
                            uri,
                        ))
                        .unwrap_or(Value::Null),
                    ),
                    None => invalid_params(&request.id),
                }
            }
            "workspace/symbol" => {
                match request.params.get("query").and_then(Value::as_str) {
                    Some(query) => result_response(
                        &request.id,
                        serde_json::to_value(queries::symbols::workspace_symbols(
                            &self.state,
                            query,
                        ))
                        .unwrap_or(Value::Null),
                    ),
                    None => invalid_params(&request.id),
                }
            }
            // Recognized but no actions are offered yet; a well-formed
            // empty response keeps clients quiet.
            "textDocument/codeAction" => result_response(&request.id, json!([])),
            other => {
                warn!("unknown request method {}", other);
                error_response(
                    &request.id,
                    METHOD_NOT_FOUND,
                    &format!("method not found: {}", other),
                )
            }
        }
    }

    /// Shared plumbing for requests addressed by (document, position).
    fn positional(
        &mut self,
        request: &RequestMessage,
        f: impl FnOnce(&CheckerState, &str, lsp::Position) -> Value,
    ) -> Value {
        let uri = request
            .params
            .pointer("/textDocument/uri")
            .and_then(Value::as_str);
        let position: Option<lsp::Position> = request
            .params
            .get("position")
            .and_then(|p| serde_json::from_value(p.clone()).ok());
        match (uri, position) {
            (Some(uri), Some(position)) => {
                result_response(&request.id, f(&self.state, uri, position))
            }
            _ => invalid_params(&request.id),
        }
    }

    fn publish_diagnostics(&self, uri: &str) -> Value {
        let diagnostics: Vec<lsp::Diagnostic> = self
            .state
            .diagnostics_for(uri)
            .iter()
            .map(|d| lsp::Diagnostic {
                range: if d.loc.exists() {
                    queries::loc_to_range(&self.state, d.loc)
                } else {
                    lsp::Range::default()
                },
                severity: Some(match d.severity {
                    sable_core::Severity::Error => lsp::DiagnosticSeverity::ERROR,
                    sable_core::Severity::Warning => lsp::DiagnosticSeverity::WARNING,
                    sable_core::Severity::Info => lsp::DiagnosticSeverity::INFORMATION,
                    sable_core::Severity::Hint => lsp::DiagnosticSeverity::HINT,
                }),
                code: Some(lsp::NumberOrString::String(d.code.as_str().to_string())),
                source: Some("sable".to_string()),
                message: d.message.clone(),
                ..lsp::Diagnostic::default()
            })
            .collect();
        json!({
            "jsonrpc": "2.0",
            "method": "textDocument/publishDiagnostics",
            "params": {
                "uri": uri,
                "diagnostics": diagnostics,
            },
        })
    }
}

fn initialize_result() -> Value {
    let capabilities = lsp::ServerCapabilities {
        text_document_sync: Some(lsp::TextDocumentSyncCapability::Kind(
            lsp::TextDocumentSyncKind::FULL,
        )),
        hover_provider: Some(lsp::HoverProviderCapability::Simple(true)),
        definition_provider: Some(lsp::OneOf::Left(true)),
        references_provider: Some(lsp::OneOf::Left(true)),
        completion_provider: Some(lsp::CompletionOptions {
            trigger_characters: Some(vec![".".to_string()]),
            ..lsp::CompletionOptions::default()
        }),
        signature_help_provider: Some(lsp::SignatureHelpOptions {
            trigger_characters: Some(vec!["(".to_string(), ",".to_string()]),
            ..lsp::SignatureHelpOptions::default()
        }),
        document_symbol_provider: Some(lsp::OneOf::Left(true)),
        workspace_symbol_provider: Some(lsp::OneOf::Left(true)),
        code_action_provider: Some(lsp::CodeActionProviderCapability::Simple(true)),
        ..lsp::ServerCapabilities::default()
    };
    json!({
        "capabilities": capabilities,
        "serverInfo": { "name": "sable-lsp", "version": env!("CARGO_PKG_VERSION") },
    })
}

fn result_response(id: &Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn error_response(id: &Value, code: i64, message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
}

fn invalid_params(id: &Value) -> Value {
    error_response(id, INVALID_PARAMS, "invalid params")
}

/// Wire the coordinator to stdio: reader thread decoding frames into the
/// queue, main thread servicing it.
pub fn run_stdio(max_threads: usize) -> Result<(), transport::TransportError> {
    let queue = Arc::new(MessageQueue::new());
    let reader_queue = Arc::clone(&queue);
    let reader = std::thread::spawn(move || {
        let mut stdin = std::io::stdin().lock();
        loop {
            match transport::read_message(&mut stdin) {
                Ok(Some(value)) => {
                    let message = match Incoming::parse(value) {
                        Some(m) => m,
                        None => continue,
                    };
                    // Cancellations act on the queue immediately; arriving
                    // too late they dissolve.
                    if message.method() == "$/cancelRequest" {
                        if let Incoming::Notification(n) = &message {
                            if let Some(id) = n.params.get("id") {
                                reader_queue.cancel(id);
                            }
                        }
                        continue;
                    }
                    let is_exit = message.method() == "exit";
                    reader_queue.push(message);
                    if is_exit {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("reader thread stopping: {}", e);
                    break;
                }
            }
        }
        reader_queue.set_terminate();
    });

    let mut coordinator = Coordinator::new(max_threads);
    let stdout = std::io::stdout();
    while let Some(batch) = queue.next_batch() {
        let (out, keep_going) = coordinator.handle_batch(batch);
        {
            let mut writer = stdout.lock();
            for message in &out {
                transport::write_message(&mut writer, message)?;
            }
        }
        if !keep_going {
            break;
        }
    }
    queue.set_terminate();
    let _ = reader.join();
    info!("coordinator loop ended");
    Ok(())
}
