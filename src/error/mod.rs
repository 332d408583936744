//! Error Handling Module
//!
//! This module provides the error types shared by every layer of the runtime:
//! - Core error type (`LlmError`) and its `ErrorCategory`
//! - Aggregate arena failures (`ArenaFailure`, `ParticipantFailure`)
//! - Small helpers for classification (retryable, cancelled)
//!
//! # Example
//!
//! ```rust,ignore
//! use siumai_arena::error::{LlmError, ErrorCategory};
//!
//! let error = LlmError::api_error(503, "Service unavailable");
//! assert_eq!(error.category(), ErrorCategory::Server);
//! assert!(error.is_retryable());
//! ```

mod helpers;
pub mod types;

pub use types::*;
