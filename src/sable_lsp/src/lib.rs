// Editor-service coordinator: a single-threaded cooperative main loop over
// a mutex+condvar request queue fed by a sidecar reader thread, with a
// bounded worker pool for slow-path fan-out.

pub mod merge;
pub mod message;
pub mod progress;
pub mod queries;
pub mod queue;
pub mod server;
pub mod state;
pub mod transport;

pub use merge::{merge_edits, EditCounts, WorkspaceEdit};
pub use message::{Incoming, NotificationMessage, RequestMessage};
pub use queue::MessageQueue;
pub use server::Coordinator;
pub use state::{CheckerState, TypecheckRun};
