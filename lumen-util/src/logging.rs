//! Logging bootstrap.
//!
//! The runtime never calls `eprintln!` directly for its diagnostics; allocation
//! and collection events are emitted through the `log` facade (see
//! `lumen_gc::collector` and `lumen_runtime::runtime::diag`), gated by the
//! typed flags parsed from `LUMEN_TRACE`. This module only wires up a `log`
//! backend for binaries and tests that want to see the output; library code
//! embedding the runtime is free to install any other `log::Log` implementation
//! instead.

use std::sync::Once;

static INIT: Once = Once::new();

/// Install `env_logger` as the global logger, once per process.
///
/// Safe to call multiple times (and from multiple test functions running in
/// parallel): only the first call takes effect.
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder()
            .format_timestamp_millis()
            .is_test(cfg!(test))
            .try_init();
    });
}
