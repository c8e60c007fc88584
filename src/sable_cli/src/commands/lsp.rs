use clap::Args;
use log::info;

#[derive(Args)]
pub struct LspArgs {
    /// Worker pool cap for slow-path typechecking (0 = one per core)
    #[arg(long, default_value_t = 0)]
    pub max_threads: usize,
}

pub fn execute(args: LspArgs) -> anyhow::Result<i32> {
    info!("starting editor-protocol server on stdio");
    sable_lsp::server::run_stdio(args.max_threads)?;
    Ok(0)
}
