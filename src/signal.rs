//! Ctrl+C handling for graceful shutdown.
//!
//! Interruption is a single shared `AtomicBool`. The walker and the
//! dispatch loop poll it between items, so the file in flight always
//! finishes (or times out) and has its outcome persisted before the run
//! winds down with exit code 130. Rerunning the same command resumes.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("Failed to install signal handler: {0}")]
    Install(#[from] ctrlc::Error),
}

static INSTALLED: OnceLock<Arc<AtomicBool>> = OnceLock::new();

/// Install the process-wide Ctrl+C hook and return its shutdown flag.
///
/// `ctrlc` accepts one handler per process, so repeated calls hand back
/// the flag installed first, cleared for the new run.
pub fn install_handler() -> Result<Arc<AtomicBool>, SignalError> {
    if let Some(flag) = INSTALLED.get() {
        flag.store(false, Ordering::SeqCst);
        return Ok(Arc::clone(flag));
    }

    let flag = Arc::new(AtomicBool::new(false));
    let hook_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        hook_flag.store(true, Ordering::SeqCst);
        let _ = writeln!(
            std::io::stderr(),
            "\nInterrupted. Finishing the current file..."
        );
        let _ = std::io::stderr().flush();
    })?;

    let _ = INSTALLED.set(Arc::clone(&flag));
    Ok(flag)
}

/// A shutdown flag with no signal hook attached, for callers that manage
/// interruption themselves.
#[must_use]
pub fn detached_flag() -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_flag_starts_clear() {
        assert!(!detached_flag().load(Ordering::SeqCst));
    }

    #[test]
    fn test_installed_flag_is_shared_and_cleared_on_reinstall() {
        let first = install_handler().unwrap();
        first.store(true, Ordering::SeqCst);

        let second = install_handler().unwrap();
        assert!(!second.load(Ordering::SeqCst), "reinstall clears the flag");

        second.store(true, Ordering::SeqCst);
        assert!(first.load(Ordering::SeqCst), "both handles share one flag");
    }
}
