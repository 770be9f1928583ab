//! Ctrl-C handling.
//!
//! The handler only raises a flag. The engine polls it between lines and while a
//! child runs, kills the child, and reports the run as interrupted.

use std::sync::atomic::AtomicBool;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// The process-wide interrupt flag set by [`install`]'s handler.
#[must_use]
pub fn flag() -> &'static AtomicBool {
    &INTERRUPTED
}

#[cfg(unix)]
#[allow(unsafe_code)]
mod unix {
    use super::INTERRUPTED;
    use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
    use std::sync::atomic::Ordering;

    extern "C" fn on_interrupt(_: nix::libc::c_int) {
        INTERRUPTED.store(true, Ordering::SeqCst);
    }

    pub(super) fn install() -> std::io::Result<()> {
        let action = SigAction::new(
            SigHandler::Handler(on_interrupt),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        // SAFETY: the handler only performs an atomic store, which is
        // async-signal-safe.
        unsafe { signal::sigaction(Signal::SIGINT, &action) }?;
        Ok(())
    }
}

/// Route SIGINT to the interrupt flag instead of terminating the process.
///
/// Children share the terminal's process group and receive the signal
/// themselves. On non-Unix platforms this does nothing.
///
/// # Errors
///
/// Returns the OS error if the handler cannot be installed.
#[cfg(unix)]
pub fn install() -> std::io::Result<()> {
    unix::install()
}

#[cfg(not(unix))]
pub fn install() -> std::io::Result<()> {
    Ok(())
}
