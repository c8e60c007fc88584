use crate::errors::CliError;
use anyhow::Context;
use clap::Args;
use log::debug;
use sable_core::{Diagnostic, DiagnosticCollection, Severity};
use sable_infer::pipeline::{Phase, Pipeline};
use std::path::PathBuf;

#[derive(Args)]
pub struct CheckArgs {
    /// Source files to check
    pub files: Vec<PathBuf>,

    /// Last pipeline stage to run (parse, index, cfg, infer)
    #[arg(long, default_value = "infer")]
    pub stop_after: String,

    /// Worker pool cap for typechecking (0 = one per core)
    #[arg(long, default_value_t = 0)]
    pub max_threads: usize,

    /// Typecheck an inline expression instead of files
    #[arg(short = 'e', value_name = "EXPR")]
    pub expr: Option<String>,

    /// Emit diagnostics as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: CheckArgs) -> anyhow::Result<i32> {
    let stop_after: Phase = args
        .stop_after
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let mut inputs: Vec<(String, String)> = Vec::new();
    if let Some(expr) = &args.expr {
        inputs.push(("-e".to_string(), format!("# typed: true\n{}\n", expr)));
    }
    for path in &args.files {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        inputs.push((path.display().to_string(), source));
    }
    if inputs.is_empty() {
        eprintln!("no input files");
        return Err(CliError::EarlyReturn(64).into());
    }

    let (gs, records, drained) = if args.max_threads == 1 {
        Pipeline::run(inputs, stop_after)
    } else {
        run_pooled(inputs, stop_after, args.max_threads)
    };
    debug!("checked {} files", records.len());
    let mut diagnostics = DiagnosticCollection::new();
    for d in drained {
        diagnostics.add(d);
    }

    if args.json {
        let rendered: Vec<serde_json::Value> = diagnostics
            .diagnostics
            .iter()
            .map(|d| render_json(&gs, d))
            .collect();
        println!("{}", serde_json::to_string_pretty(&rendered)?);
    } else {
        for d in &diagnostics.diagnostics {
            println!("{}", render_text(&gs, d));
        }
        if !diagnostics.is_empty() {
            println!(
                "{} diagnostic(s), {} error(s)",
                diagnostics.len(),
                diagnostics.errors().count()
            );
        }
    }

    Ok(if diagnostics.has_errors() { 1 } else { 0 })
}

/// Same pipeline as `Pipeline::run`, with method typechecking fanned out
/// over a bounded pool.
fn run_pooled(
    inputs: Vec<(String, String)>,
    stop_after: Phase,
    max_threads: usize,
) -> (
    sable_core::GlobalState,
    Vec<sable_infer::pipeline::FileRecord>,
    Vec<Diagnostic>,
) {
    use rayon::prelude::*;
    if stop_after < Phase::Cfg {
        return Pipeline::run(inputs, stop_after);
    }
    let mut gs = Pipeline::initial_global_state();
    let records = Pipeline::ingest_files(&mut gs, &inputs);
    Pipeline::finalize(&mut gs);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(max_threads)
        .build()
        .expect("worker pool construction");
    let results: Vec<Vec<_>> = pool.install(|| {
        records
            .par_iter()
            .map(|record| Pipeline::typecheck_file(&gs, record, stop_after))
            .collect()
    });
    for per_file in results {
        for result in per_file {
            for d in result.diagnostics {
                gs.push_error(d);
            }
        }
    }
    let diagnostics = gs.drain_errors();
    (gs, records, diagnostics)
}

fn render_text(gs: &sable_core::GlobalState, d: &Diagnostic) -> String {
    let sev = match d.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "info",
        Severity::Hint => "hint",
    };
    match d.loc.position(gs) {
        Some((begin, _)) => format!(
            "{}:{}:{}: {}: {} [{}]",
            gs.file(d.loc.file).path,
            begin.line,
            begin.column,
            sev,
            d.message,
            d.code.as_str()
        ),
        None => format!("{}: {} [{}]", sev, d.message, d.code.as_str()),
    }
}

fn render_json(gs: &sable_core::GlobalState, d: &Diagnostic) -> serde_json::Value {
    let (line, column) = d
        .loc
        .position(gs)
        .map(|(b, _)| (b.line, b.column))
        .unwrap_or((0, 0));
    serde_json::json!({
        "file": if d.loc.exists() { gs.file(d.loc.file).path.clone() } else { String::new() },
        "line": line,
        "column": column,
        "severity": format!("{:?}", d.severity),
        "code": d.code.as_str(),
        "message": d.message,
    })
}
