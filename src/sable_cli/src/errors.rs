use thiserror::Error;

/// Typed early exit propagated from initialization failures; the driver
/// turns it into the process exit code instead of unwinding for control
/// flow.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("early return with exit code {0}")]
    EarlyReturn(i32),
}
