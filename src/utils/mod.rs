//! Utility modules for siumai-arena

pub mod cancel;
pub mod redact;

pub use cancel::{CancelHandle, make_cancellable_stream, run_cancellable};
