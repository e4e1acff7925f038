use std::sync::atomic::{AtomicBool, Ordering};

use console::Term;

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Whether Ctrl+C has been pressed.
#[inline]
pub(crate) fn is_shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Acquire)
}

#[inline]
fn request_shutdown() {
    SHUTDOWN_REQUESTED.store(true, Ordering::Release);
}

/// Install the Ctrl+C handler.
///
/// The first Ctrl+C sets the shutdown flag so long-running commands stop
/// pulling more work. A second one exits immediately.
pub(crate) fn setup_shutdown_handler() {
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("Could not install Ctrl+C handler");
            return;
        }

        if Term::stderr().is_term() {
            eprintln!("\nShutdown requested, stopping after the current request...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Shutdown requested, stopping after the current request");
        }
        request_shutdown();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}
