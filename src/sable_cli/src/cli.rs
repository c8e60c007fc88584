use crate::commands::check::CheckArgs;
use crate::commands::lsp::LspArgs;
use crate::commands::{check, lsp};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sable")]
#[command(about = "Gradual type checker for the Sable language", version, author)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Typecheck files (or an inline expression) and print diagnostics
    Check(Box<CheckArgs>),

    /// Run the editor-protocol server over stdio
    Lsp(Box<LspArgs>),
}

pub fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Check(args) => check::execute(*args),
        Commands::Lsp(args) => lsp::execute(*args),
    }
}
