//! Collector tuning.
//!
//! Trimmed from the ancestor collector's `GcConfig`: no generational, region,
//! TLAB or NUMA knobs survive, since this collector is single-threaded,
//! non-moving and has exactly one generation. What remains is the handful of
//! parameters a stop-the-world mark-sweep actually has: how big the heap
//! starts, how fast it grows, and whether verbose diagnostics are on by
//! default before `LUMEN_TRACE` is consulted.

use lumen_util::LumenError;

/// Tuning parameters for [`crate::GarbageCollector`].
///
/// # Examples
///
/// ```
/// use lumen_gc::GcConfig;
///
/// let config = GcConfig::default();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct GcConfig {
    /// Bytes allocated before the first collection is considered.
    ///
    /// Default: 1 MiB.
    pub initial_threshold: usize,

    /// Hard ceiling on total allocated bytes. Exceeding it after a collection
    /// has already run raises [`LumenError::OutOfMemory`].
    ///
    /// Default: 1 GiB.
    pub max_heap_size: usize,

    /// Verbose GC event logging, equivalent to the `HEAP_GC_VERBOSE`
    /// diagnostics flag being set from process start rather than via
    /// `LUMEN_TRACE`.
    ///
    /// Default: false.
    pub verbose: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        GcConfig {
            initial_threshold: 1024 * 1024,
            max_heap_size: 1024 * 1024 * 1024,
            verbose: false,
        }
    }
}

impl GcConfig {
    /// Validate that the configuration is internally consistent.
    pub fn validate(&self) -> Result<(), LumenError> {
        if self.initial_threshold == 0 {
            return Err(LumenError::Configuration(
                "initial_threshold must be > 0".to_string(),
            ));
        }
        if self.max_heap_size < self.initial_threshold {
            return Err(LumenError::Configuration(
                "max_heap_size must be >= initial_threshold".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(GcConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let config = GcConfig {
            initial_threshold: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn max_below_initial_is_rejected() {
        let config = GcConfig {
            initial_threshold: 100,
            max_heap_size: 50,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
