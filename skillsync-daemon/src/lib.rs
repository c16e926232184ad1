//! Long-running skill sync daemon: socket intake + sequential sync processor.

mod error;
pub mod paths;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use protocol::{
    request_status, request_stop, request_sync, send_request, DaemonRequest, DaemonResponse,
};
pub use runtime::{init_tracing, run, run_with, start_blocking, SyncSummary};
