use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Once;
use std::time::{SystemTime, UNIX_EPOCH};

/// Exit status used when the user interrupts the dispatcher itself.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// An interrupt arriving this soon after a child exits belongs to that child.
const CHILD_EXIT_GRACE_MS: u64 = 1_000;

static RUNNING_CHILDREN: AtomicUsize = AtomicUsize::new(0);
static LAST_CHILD_EXIT_MS: AtomicU64 = AtomicU64::new(0);
static INSTALL: Once = Once::new();

/// Held while a child process owns the terminal. The child receives the
/// interrupt on its own; the dispatcher stays alive to report its status.
#[derive(Debug)]
pub(crate) struct ChildGuard {
    _private: (),
}

impl ChildGuard {
    pub(crate) fn enter() -> Self {
        install_handler();
        RUNNING_CHILDREN.fetch_add(1, Ordering::SeqCst);
        Self { _private: () }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        LAST_CHILD_EXIT_MS.store(now_ms(), Ordering::SeqCst);
        RUNNING_CHILDREN.fetch_sub(1, Ordering::SeqCst);
    }
}

fn install_handler() {
    INSTALL.call_once(|| {
        if let Err(err) = ctrlc::set_handler(on_interrupt) {
            tracing::warn!(error = %err, "failed to install interrupt handler");
        }
    });
}

fn on_interrupt() {
    let running = RUNNING_CHILDREN.load(Ordering::SeqCst);
    let last_exit = LAST_CHILD_EXIT_MS.load(Ordering::SeqCst);
    if defers_to_child(running, last_exit, now_ms()) {
        tracing::debug!(running, "interrupt left to the running command");
        return;
    }
    std::process::exit(INTERRUPTED_EXIT_CODE);
}

/// Whether an interrupt should be left to a child instead of ending the
/// dispatcher.
pub(crate) fn defers_to_child(running: usize, last_child_exit_ms: u64, now_ms: u64) -> bool {
    running > 0
        || (last_child_exit_ms > 0
            && now_ms.saturating_sub(last_child_exit_ms) < CHILD_EXIT_GRACE_MS)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
