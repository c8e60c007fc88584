// The per-file pipeline: parse, index, resolve, typecheck, in that order,
// with the hashes the incremental driver uses to pick its path.

use crate::cfg::builder::build_cfg;
use crate::index::{
    attach_default_arg_types, index_file, resolve_file_index, FileIndex, IndexedMethod,
};
use crate::infer::infer_cfg;
use crate::stdlib::STDLIB_SOURCE;
use log::{debug, warn};
use sable_core::{
    Diagnostic, DiagnosticCode, FileRef, GlobalState, Loc, SourceType, SymbolRef, TableMask, Type,
};
use sable_parser::parse_source;
use sable_syntax::{Def, MethodDef, SourceFile, Span};
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Pipeline stages, for `--stop-after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Parse,
    Index,
    Cfg,
    Infer,
}

impl std::str::FromStr for Phase {
    type Err = String;
    fn from_str(s: &str) -> Result<Phase, String> {
        match s {
            "parse" => Ok(Phase::Parse),
            "index" => Ok(Phase::Index),
            "cfg" => Ok(Phase::Cfg),
            "infer" => Ok(Phase::Infer),
            other => Err(format!("unknown phase `{}`", other)),
        }
    }
}

/// One method to typecheck: symbol, body, and the hash the fast path
/// compares.
#[derive(Debug, Clone)]
pub struct MethodCheck {
    pub sym: SymbolRef,
    pub owner: SymbolRef,
    pub name: String,
    pub body_hash: u64,
    pub def: MethodDef,
}

/// Parsed-and-indexed state of one file.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub file: FileRef,
    pub path: String,
    pub tree: SourceFile,
    /// Hash over names, arities, sigs, superclasses; body changes leave it
    /// alone, so it discriminates fast-path from slow-path edits.
    pub def_hash: u64,
    pub methods: Vec<MethodCheck>,
}

/// Result of typechecking one method, file-located and cacheable by body
/// hash.
#[derive(Debug, Clone)]
pub struct MethodResult {
    pub sym: SymbolRef,
    pub name: String,
    pub body_hash: u64,
    pub diagnostics: Vec<Diagnostic>,
    pub hover: Vec<(Span, Type)>,
    pub refs: Vec<(Span, SymbolRef)>,
}

pub struct Pipeline;

impl Pipeline {
    /// A fresh global state with the embedded stdlib payload ingested.
    pub fn initial_global_state() -> GlobalState {
        let mut gs = GlobalState::new();
        let record = gs.with_unfrozen(TableMask::ALL, |gs| {
            let file = gs.enter_file("<payload:stdlib>", STDLIB_SOURCE.to_string(), SourceType::Payload);
            let (tree, parse_errors) = parse_source(STDLIB_SOURCE);
            debug_assert!(parse_errors.is_empty(), "stdlib payload must parse clean");
            let index = index_file(gs, file, &tree);
            resolve_file_index(gs, &index);
            attach_default_arg_types(gs, &index);
            Self::record_from_index(gs, file, "<payload:stdlib>", tree, &index)
        });
        gs.finalize_ancestors();
        gs.sanity_check();

        // The payload must typecheck against itself; anything else is a
        // bug in the embedded source.
        for method in &record.methods {
            let result = Self::typecheck_method(&gs, record.file, method, Phase::Infer);
            for d in &result.diagnostics {
                warn!("stdlib payload diagnostic: {} {}", d.code.as_str(), d.message);
            }
        }
        gs
    }

    /// Register, parse, and index a batch of files. Parse errors are
    /// queued as diagnostics; indexing proceeds on the best-effort tree.
    pub fn ingest_files(
        gs: &mut GlobalState,
        files: &[(String, String)],
    ) -> Vec<FileRecord> {
        let parsed: Vec<(String, String, SourceFile, Vec<sable_parser::ParseDiagnostic>)> = files
            .iter()
            .map(|(path, source)| {
                let (tree, errors) = parse_source(source);
                (path.clone(), source.clone(), tree, errors)
            })
            .collect();
        gs.with_unfrozen(TableMask::ALL, |gs| {
            parsed
                .into_iter()
                .map(|(path, source, tree, errors)| {
                    Self::ingest_parsed(gs, &path, source, tree, errors)
                })
                .collect()
        })
    }

    /// Index one pre-parsed file into an (unfrozen) global state. The
    /// parse itself is pure, so callers may fan it out to workers and feed
    /// the trees in here sequentially.
    pub fn ingest_parsed(
        gs: &mut GlobalState,
        path: &str,
        source: String,
        tree: SourceFile,
        parse_errors: Vec<sable_parser::ParseDiagnostic>,
    ) -> FileRecord {
        let file = gs.enter_file(path, source, SourceType::Normal);
        for e in parse_errors {
            gs.push_error(Diagnostic::new(
                DiagnosticCode::SBE01001,
                e.message,
                Loc::new(file, e.span.start, e.span.end),
            ));
        }
        let index = index_file(gs, file, &tree);
        resolve_file_index(gs, &index);
        attach_default_arg_types(gs, &index);
        Self::record_from_index(gs, file, path, tree, &index)
    }

    /// Freeze-time step after all files are ingested: compute and freeze
    /// every linearization.
    pub fn finalize(gs: &mut GlobalState) {
        gs.finalize_ancestors();
    }

    /// Typecheck one method against a read-only global state. Safe to fan
    /// out across a worker pool.
    pub fn typecheck_method(
        gs: &GlobalState,
        file: FileRef,
        method: &MethodCheck,
        stop_after: Phase,
    ) -> MethodResult {
        let mut spanned = Vec::new();
        let output = build_cfg(gs, method.owner, method.sym, &method.def, &mut spanned);
        let mut cfg = output.cfg;
        let mut hover = Vec::new();
        let mut refs: Vec<(Span, SymbolRef)> = output.constant_refs;
        if stop_after >= Phase::Infer {
            let inferred = infer_cfg(gs, &mut cfg);
            spanned.extend(inferred.errors);
            hover = inferred.hover;
            refs.extend(inferred.refs);
        }
        MethodResult {
            sym: method.sym,
            name: method.name.clone(),
            body_hash: method.body_hash,
            diagnostics: spanned
                .into_iter()
                .map(|e| e.into_diagnostic(file))
                .collect(),
            hover,
            refs,
        }
    }

    /// Typecheck every method of a file record sequentially.
    pub fn typecheck_file(
        gs: &GlobalState,
        record: &FileRecord,
        stop_after: Phase,
    ) -> Vec<MethodResult> {
        record
            .methods
            .iter()
            .map(|m| Self::typecheck_method(gs, record.file, m, stop_after))
            .collect()
    }

    /// Whole-batch convenience driver used by the CLI and tests: returns
    /// the state and the drained, gated, per-file-sorted diagnostics.
    pub fn run(
        files: Vec<(String, String)>,
        stop_after: Phase,
    ) -> (GlobalState, Vec<FileRecord>, Vec<Diagnostic>) {
        let mut gs = Self::initial_global_state();
        if stop_after == Phase::Parse {
            let records = gs.with_unfrozen(TableMask::ALL, |gs| {
                files
                    .iter()
                    .map(|(path, source)| {
                        let file = gs.enter_file(path, source.clone(), SourceType::Normal);
                        let (tree, parse_errors) = parse_source(source);
                        for e in parse_errors {
                            gs.push_error(Diagnostic::new(
                                DiagnosticCode::SBE01001,
                                e.message,
                                Loc::new(file, e.span.start, e.span.end),
                            ));
                        }
                        let def_hash = Self::def_hash(&tree);
                        FileRecord {
                            file,
                            path: path.clone(),
                            tree,
                            def_hash,
                            methods: Vec::new(),
                        }
                    })
                    .collect()
            });
            let diagnostics = gs.drain_errors();
            return (gs, records, diagnostics);
        }

        let records = Self::ingest_files(&mut gs, &files);
        Self::finalize(&mut gs);
        if stop_after >= Phase::Cfg {
            let mut results = Vec::new();
            for record in &records {
                results.extend(Self::typecheck_file(&gs, record, stop_after));
            }
            for result in results {
                for d in result.diagnostics {
                    gs.push_error(d);
                }
            }
        }
        let diagnostics = gs.drain_errors();
        debug!(
            "pipeline run: {} files, {} diagnostics",
            records.len(),
            diagnostics.len()
        );
        (gs, records, diagnostics)
    }

    fn record_from_index(
        gs: &GlobalState,
        file: FileRef,
        path: &str,
        tree: SourceFile,
        index: &FileIndex,
    ) -> FileRecord {
        let methods = index
            .methods
            .iter()
            .map(|m: &IndexedMethod| MethodCheck {
                sym: m.sym,
                owner: m.owner,
                name: gs.symbol_name_str(m.sym),
                body_hash: Self::body_hash(&m.def),
                def: m.def.clone(),
            })
            .collect();
        let def_hash = Self::def_hash(&tree);
        FileRecord {
            file,
            path: path.to_string(),
            tree,
            def_hash,
            methods,
        }
    }

    /// The method bodies of a tree in exactly the order `index_file`
    /// enters them (including the synthetic static-init and default-arg
    /// checkers). The fast path pairs these positionally with the
    /// previous record's method symbols, which is sound because the
    /// definition hash already matched.
    pub fn collect_method_defs(tree: &SourceFile, path: &str) -> Vec<MethodDef> {
        fn walk(defs: &[Def], out: &mut Vec<MethodDef>) {
            for def in defs {
                match def {
                    Def::Class(c) => walk(&c.body, out),
                    Def::Method(m) => {
                        out.push((**m).clone());
                        for param in &m.params {
                            if let Some(default) = &param.default {
                                out.push(MethodDef {
                                    name: format!("{}<default>", param.name),
                                    params: Vec::new(),
                                    sig: None,
                                    body: vec![sable_syntax::Stmt::Return {
                                        value: Some(default.clone()),
                                        span: default.span(),
                                    }],
                                    is_private: true,
                                    span: param.span,
                                    name_span: param.span,
                                });
                            }
                        }
                    }
                    Def::TypeAlias(_) => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(&tree.defs, &mut out);
        if !tree.top_stmts.is_empty() {
            let span = tree
                .top_stmts
                .first()
                .map(|s| s.span())
                .unwrap_or(Span::zero());
            out.push(MethodDef {
                name: format!("<static-init:{}>", path),
                params: Vec::new(),
                sig: None,
                body: tree.top_stmts.clone(),
                is_private: true,
                span,
                name_span: span,
            });
        }
        out
    }

    /// Hash of everything dispatch can observe about a file: class names
    /// and superclasses, method names, parameter shapes, sigs, aliases.
    /// Bodies and source positions are excluded.
    pub fn def_hash(tree: &SourceFile) -> u64 {
        let mut parts: Vec<Value> = Vec::new();
        fn walk(defs: &[Def], prefix: &str, parts: &mut Vec<Value>) {
            for def in defs {
                match def {
                    Def::Class(c) => {
                        parts.push(serde_json::json!({
                            "class": format!("{}{}", prefix, c.name),
                            "superclass": c.superclass,
                        }));
                        walk(&c.body, &format!("{}{}::", prefix, c.name), parts);
                    }
                    Def::Method(m) => {
                        let params: Vec<Value> = m
                            .params
                            .iter()
                            .map(|p| {
                                serde_json::json!({
                                    "name": p.name,
                                    "kind": strip_spans(
                                        serde_json::to_value(p.kind).unwrap_or(Value::Null)
                                    ),
                                })
                            })
                            .collect();
                        parts.push(serde_json::json!({
                            "def": format!("{}{}", prefix, m.name),
                            "private": m.is_private,
                            "params": params,
                            "sig": strip_spans(
                                serde_json::to_value(&m.sig).unwrap_or(Value::Null)
                            ),
                        }));
                    }
                    Def::TypeAlias(a) => {
                        parts.push(serde_json::json!({
                            "alias": format!("{}{}", prefix, a.name),
                            "type": strip_spans(
                                serde_json::to_value(&a.ty).unwrap_or(Value::Null)
                            ),
                        }));
                    }
                }
            }
        }
        walk(&tree.defs, "", &mut parts);
        parts.push(serde_json::json!({ "sigil": tree.sigil }));
        hash_value(&Value::Array(parts))
    }

    /// Hash of one method's body region: parameters with defaults plus the
    /// statement tree, positions stripped.
    pub fn body_hash(def: &MethodDef) -> u64 {
        let body = strip_spans(serde_json::to_value(&def.body).unwrap_or(Value::Null));
        let params = strip_spans(serde_json::to_value(&def.params).unwrap_or(Value::Null));
        hash_value(&serde_json::json!({ "params": params, "body": body }))
    }
}

/// Drop every span so hashes ignore pure position shifts: both named
/// `*span*` fields and the `{start, end}` objects tuple variants carry.
fn strip_spans(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            if map.len() == 2
                && map.get("start").map(Value::is_u64).unwrap_or(false)
                && map.get("end").map(Value::is_u64).unwrap_or(false)
            {
                return Value::Null;
            }
            Value::Object(
                map.into_iter()
                    .filter(|(k, _)| !k.contains("span"))
                    .map(|(k, v)| (k, strip_spans(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(strip_spans).collect()),
        other => other,
    }
}

fn hash_value(value: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.to_string().hash(&mut hasher);
    hasher.finish()
}
