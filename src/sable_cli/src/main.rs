mod cli;
pub mod commands;
pub mod errors;

use env_logger::Env;
use errors::CliError;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let code = match cli::run() {
        Ok(code) => code,
        Err(e) => match e.downcast_ref::<CliError>() {
            Some(CliError::EarlyReturn(code)) => *code,
            _ => {
                eprintln!("error: {:#}", e);
                1
            }
        },
    };
    std::process::exit(code);
}
