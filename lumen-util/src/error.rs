//! Internal error type shared by the allocator and the runtime.
//!
//! `LumenError` covers failures that are bugs or resource exhaustion in the
//! embedding process itself - out-of-memory, a malformed configuration, a
//! violated allocator invariant. It is distinct from a value thrown by running
//! script code, which travels as a `TaggedValue` through the control-transfer
//! machinery in `lumen-runtime`, not as a `Result::Err`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LumenError {
    #[error("out of memory: requested {requested} bytes, heap limit {limit} bytes")]
    OutOfMemory { requested: usize, limit: usize },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: expected {expected}, found {actual}")]
    InvalidState { expected: String, actual: String },

    #[error("bounds check failed: index {index} out of bounds for length {length}")]
    BoundsCheckFailed { index: usize, length: usize },

    #[error("internal error: {0}")]
    Internal(String),
}

impl LumenError {
    /// Whether the embedder can plausibly retry (e.g. after freeing memory
    /// elsewhere), as opposed to an error that indicates a bug in the runtime.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LumenError::OutOfMemory { .. })
    }

    pub fn is_bug(&self) -> bool {
        matches!(
            self,
            LumenError::InvalidState { .. }
                | LumenError::BoundsCheckFailed { .. }
                | LumenError::Internal(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LumenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_memory_is_recoverable() {
        let err = LumenError::OutOfMemory {
            requested: 64,
            limit: 32,
        };
        assert!(err.is_recoverable());
        assert!(!err.is_bug());
    }

    #[test]
    fn invalid_state_is_a_bug() {
        let err = LumenError::InvalidState {
            expected: "marking".into(),
            actual: "idle".into(),
        };
        assert!(err.is_bug());
        assert!(!err.is_recoverable());
    }
}
