//! lumen-util - shared error and diagnostics plumbing for the Lumen runtime
//!
//! Everything in this crate is used by both `lumen-gc` and `lumen-runtime`: the
//! internal (non-user-throwable) error type, and a thin helper for turning on
//! `env_logger` in binaries and test harnesses that embed the runtime.

pub mod error;
pub mod logging;

pub use error::{LumenError, Result};
