//! Job runners for storage-transfer.
//!
//! - `HttpJobRunner` hands jobs to a remote worker (e.g. a serverless function)
//! - `LocalJobRunner` copies bytes in-process with a bounded queue and worker pool

mod copy;
mod http;
mod local;

pub use copy::copy_between;
pub use http::HttpJobRunner;
pub use local::{LocalJobRunner, LocalRunnerConfig};
