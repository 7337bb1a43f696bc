//! Graceful shutdown support via atomic flag

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

static FLAG: LazyLock<Arc<AtomicBool>> = LazyLock::new(|| Arc::new(AtomicBool::new(false)));

/// Global shutdown flag - set by SIGTERM/SIGINT handler
pub fn shutdown_flag() -> &'static Arc<AtomicBool> {
    &FLAG
}

/// Check if shutdown was requested
pub fn is_shutdown_requested() -> bool {
    shutdown_flag().load(Ordering::Relaxed)
}

/// Request shutdown (for signal handlers and tests)
pub fn request_shutdown() {
    shutdown_flag().store(true, Ordering::Relaxed);
}

/// Route SIGINT/SIGTERM to the shutdown flag.
///
/// The collector checks the flag between pages, so an interrupt stops the
/// run at a checkpoint boundary instead of killing it mid-write.
pub fn install_signal_handlers() -> std::io::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};

    for sig in [SIGINT, SIGTERM] {
        signal_hook::flag::register(sig, Arc::clone(shutdown_flag()))?;
    }
    Ok(())
}
