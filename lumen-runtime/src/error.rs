//! Internal error type for this crate's `Result`-returning APIs.
//!
//! This is not how a thrown script-level error travels - that is
//! [`crate::control`]'s job, and it moves a [`crate::value::TaggedValue`]
//! through a `panic_any`/`catch_unwind` pair, not a `Result`. `RuntimeError`
//! covers embedding-level misuse: building a runtime with an invalid
//! configuration, or a collector allocation failure bubbling up before the
//! point where it would be turned into a thrown `RangeError`/`OutOfMemory`
//! value.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Alloc(#[from] lumen_util::LumenError),

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;
