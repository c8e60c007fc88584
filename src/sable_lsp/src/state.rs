// The coordinator's view of the world: the committed global state, the
// per-file pipeline artifacts, and the fast/slow-path selector.

use crate::merge::WorkspaceEdit;
use log::{debug, info};
use rayon::ThreadPool;
use sable_core::{Diagnostic, GlobalState, GlobalSubstitution, LiteralValue, TableMask, Type};
use sable_infer::pipeline::{FileRecord, MethodCheck, MethodResult, Phase, Pipeline};
use sable_parser::parse_source;
use std::collections::HashMap;

/// One open (or watched) file with its pipeline artifacts.
#[derive(Debug)]
pub struct OpenFile {
    pub record: FileRecord,
    pub results: Vec<MethodResult>,
    /// Parse/definition/resolution diagnostics, captured at the last slow
    /// path; they outlive body-only edits.
    pub file_diags: Vec<Diagnostic>,
}

/// Outcome of servicing one workspace edit.
#[derive(Debug, Clone, Default)]
pub struct TypecheckRun {
    pub took_fast_path: bool,
    pub retypechecked_methods: usize,
    /// Files whose diagnostics changed and must be (re)published.
    pub affected_files: Vec<String>,
}

pub struct CheckerState {
    /// Pristine payload-only state; slow paths clone from here.
    template: GlobalState,
    /// The most recently committed state; queries run against this.
    pub gs: GlobalState,
    pub files: HashMap<String, OpenFile>,
    pub diagnostics: HashMap<String, Vec<Diagnostic>>,
    pool: ThreadPool,
}

impl CheckerState {
    /// `max_threads` of 0 lets the pool size itself.
    pub fn new(max_threads: usize) -> CheckerState {
        let template = Pipeline::initial_global_state();
        let gs = template.deep_copy();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(max_threads)
            .build()
            .expect("worker pool construction");
        CheckerState {
            template,
            gs,
            files: HashMap::new(),
            diagnostics: HashMap::new(),
            pool,
        }
    }

    /// An edit may take the fast path when every touched file is already
    /// known, parses clean, and keeps its definition hash: only method
    /// body regions moved.
    pub fn fast_eligible(&self, edit: &WorkspaceEdit) -> bool {
        edit.files.iter().all(|(uri, contents)| {
            match (self.files.get(uri), contents) {
                (Some(open), Some(source)) => {
                    let (tree, errors) = parse_source(source);
                    errors.is_empty() && Pipeline::def_hash(&tree) == open.record.def_hash
                }
                // Opens of unseen files and closes restructure the world.
                _ => false,
            }
        })
    }

    /// Service a fused edit: pick the fast path when every touched file
    /// keeps its definition hash, else re-run the world.
    pub fn apply_edit(&mut self, edit: &WorkspaceEdit) -> TypecheckRun {
        if edit.is_empty() {
            return TypecheckRun::default();
        }
        if self.fast_eligible(edit) {
            self.fast_path(edit)
        } else {
            self.slow_path(edit)
        }
    }

    /// Fast path: per changed file, swap in the reparsed tree and re-infer
    /// only the methods whose body hash moved; unchanged methods keep
    /// their cached results, migrated onto the new state.
    fn fast_path(&mut self, edit: &WorkspaceEdit) -> TypecheckRun {
        let mut scratch = self.gs.deep_copy();
        let substitution = GlobalSubstitution::new(&self.gs, &mut scratch);
        let mut run = TypecheckRun {
            took_fast_path: true,
            ..Default::default()
        };

        for (uri, contents) in &edit.files {
            let source = contents.clone().expect("fast path implies live contents");
            let open = self.files.get_mut(uri).expect("fast path implies known file");
            let (tree, _) = parse_source(&source);

            scratch.with_unfrozen(TableMask::FILES, |gs| {
                gs.enter_file(uri, source.clone(), sable_core::SourceType::Normal);
            });

            let new_defs = Pipeline::collect_method_defs(&tree, uri);
            debug_assert_eq!(
                new_defs.len(),
                open.record.methods.len(),
                "definition hash matched but method shape diverged"
            );

            let mut new_methods = Vec::new();
            let mut new_results = Vec::new();
            for (old, def) in open.record.methods.iter().zip(new_defs) {
                let body_hash = Pipeline::body_hash(&def);
                let check = MethodCheck {
                    sym: old.sym,
                    owner: old.owner,
                    name: old.name.clone(),
                    body_hash,
                    def,
                };
                if body_hash == old.body_hash {
                    // Unchanged body: reuse the cached result, with its
                    // name references migrated into the new state.
                    let cached = open
                        .results
                        .iter()
                        .find(|r| r.sym == old.sym)
                        .cloned();
                    if let Some(mut result) = cached {
                        migrate_result(&substitution, &mut result);
                        new_results.push(result);
                        new_methods.push(check);
                        continue;
                    }
                }
                run.retypechecked_methods += 1;
                new_results.push(Pipeline::typecheck_method(
                    &scratch,
                    open.record.file,
                    &check,
                    Phase::Infer,
                ));
                new_methods.push(check);
            }

            open.record.tree = tree;
            open.record.methods = new_methods;
            open.results = new_results;
            run.affected_files.push(uri.clone());
        }

        self.gs = scratch;
        for uri in &run.affected_files {
            self.republish_file(uri);
        }
        info!(
            "fast path: {} methods re-inferred across {} files",
            run.retypechecked_methods,
            run.affected_files.len()
        );
        run
    }

    /// Slow path: rebuild from the payload template, re-index every live
    /// file (parsing fanned out to the pool), resolve, then typecheck the
    /// world on the pool.
    fn slow_path(&mut self, edit: &WorkspaceEdit) -> TypecheckRun {
        // Fold the edit into the live file set first.
        let mut sources: HashMap<String, String> = self
            .files
            .iter()
            .map(|(uri, f)| {
                (
                    uri.clone(),
                    self.gs.file(f.record.file).source.clone(),
                )
            })
            .collect();
        for (uri, contents) in &edit.files {
            match contents {
                Some(text) => {
                    sources.insert(uri.clone(), text.clone());
                }
                None => {
                    sources.remove(uri);
                }
            }
        }
        let mut ordered: Vec<(String, String)> = sources.into_iter().collect();
        ordered.sort_by(|a, b| a.0.cmp(&b.0));

        let mut gs = self.template.deep_copy();

        // Parsing is pure; fan it out. Indexing mutates the state and
        // stays on this thread.
        let parsed: Vec<_> = self.pool.install(|| {
            use rayon::prelude::*;
            ordered
                .par_iter()
                .map(|(uri, source)| {
                    let (tree, errors) = parse_source(source);
                    (uri.clone(), source.clone(), tree, errors)
                })
                .collect()
        });

        let records: Vec<FileRecord> = gs.with_unfrozen(TableMask::ALL, |gs| {
            parsed
                .into_iter()
                .map(|(uri, source, tree, errors)| {
                    Pipeline::ingest_parsed(gs, &uri, source, tree, errors)
                })
                .collect()
        });
        Pipeline::finalize(&mut gs);

        // Typecheck the world on the pool against the immutable new state.
        let all_results: Vec<Vec<MethodResult>> = self.pool.install(|| {
            use rayon::prelude::*;
            records
                .par_iter()
                .map(|record| Pipeline::typecheck_file(&gs, record, Phase::Infer))
                .collect()
        });

        let mut run = TypecheckRun {
            took_fast_path: false,
            ..Default::default()
        };
        // Everything queued so far is file-level (parse, definitions,
        // resolution); drain once, gated and sorted, and keep it per file.
        let mut file_diags: HashMap<u32, Vec<Diagnostic>> = HashMap::new();
        for d in gs.drain_errors() {
            if d.loc.exists() {
                file_diags.entry(d.loc.file.id()).or_default().push(d);
            }
        }
        let previously_known: Vec<String> = self.files.keys().cloned().collect();
        self.files.clear();
        for (record, results) in records.into_iter().zip(all_results) {
            run.retypechecked_methods += results.len();
            run.affected_files.push(record.path.clone());
            let diags = file_diags.remove(&record.file.id()).unwrap_or_default();
            self.files.insert(
                record.path.clone(),
                OpenFile {
                    record,
                    results,
                    file_diags: diags,
                },
            );
        }
        self.gs = gs;

        for uri in previously_known {
            if !self.files.contains_key(&uri) {
                // Closed or deleted: retract its diagnostics.
                self.diagnostics.insert(uri.clone(), Vec::new());
                if !run.affected_files.contains(&uri) {
                    run.affected_files.push(uri);
                }
            }
        }
        for uri in run.affected_files.clone() {
            if self.files.contains_key(&uri) {
                self.republish_file(&uri);
            }
        }
        info!(
            "slow path: {} methods typechecked across {} files",
            run.retypechecked_methods,
            run.affected_files.len()
        );
        run
    }

    /// Recompute the published diagnostic set for one file: the cached
    /// file-level errors plus the per-method results, gated by the file's
    /// strictness and sorted like the error queue sorts.
    fn republish_file(&mut self, uri: &str) {
        let open = match self.files.get(uri) {
            Some(f) => f,
            None => return,
        };
        let strictness = self.gs.file(open.record.file).strictness;
        let mut mine: Vec<Diagnostic> = open.file_diags.clone();
        for result in &open.results {
            for d in &result.diagnostics {
                if strictness != sable_core::StrictnessLevel::Ignore
                    && strictness >= d.code.min_strictness()
                {
                    mine.push(d.clone());
                }
            }
        }
        mine.sort_by(|a, b| {
            (a.loc.begin, a.loc.end, a.code).cmp(&(b.loc.begin, b.loc.end, b.code))
        });
        mine.dedup();
        debug!("publishing {} diagnostics for {}", mine.len(), uri);
        self.diagnostics.insert(uri.to_string(), mine);
    }

    /// Diagnostics currently published for a file.
    pub fn diagnostics_for(&self, uri: &str) -> &[Diagnostic] {
        self.diagnostics.get(uri).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// Rewrite the name references inside a cached result through a
/// substitution, so artifacts computed against the previous state stay
/// valid in its successor.
fn migrate_result(sub: &GlobalSubstitution, result: &mut MethodResult) {
    if sub.use_fast_path() {
        return;
    }
    for (_, ty) in result.hover.iter_mut() {
        *ty = migrate_type(sub, ty);
    }
}

fn migrate_type(sub: &GlobalSubstitution, ty: &Type) -> Type {
    match ty {
        Type::Literal(LiteralValue::Str(n)) => {
            Type::Literal(LiteralValue::Str(sub.substitute(*n)))
        }
        Type::Literal(LiteralValue::Sym(n)) => {
            Type::Literal(LiteralValue::Sym(sub.substitute(*n)))
        }
        Type::Applied { class, args } => Type::Applied {
            class: *class,
            args: args.iter().map(|a| migrate_type(sub, a)).collect(),
        },
        Type::Tuple(elems) => Type::Tuple(elems.iter().map(|e| migrate_type(sub, e)).collect()),
        Type::Shape { keys, values } => Type::Shape {
            keys: keys
                .iter()
                .map(|k| match k {
                    LiteralValue::Str(n) => LiteralValue::Str(sub.substitute(*n)),
                    LiteralValue::Sym(n) => LiteralValue::Sym(sub.substitute(*n)),
                    other => *other,
                })
                .collect(),
            values: values.iter().map(|v| migrate_type(sub, v)).collect(),
        },
        Type::Or(l, r) => Type::Or(
            Box::new(migrate_type(sub, l)),
            Box::new(migrate_type(sub, r)),
        ),
        Type::And(l, r) => Type::And(
            Box::new(migrate_type(sub, l)),
            Box::new(migrate_type(sub, r)),
        ),
        Type::MetaType(inner) => Type::MetaType(Box::new(migrate_type(sub, inner))),
        other => other.clone(),
    }
}
