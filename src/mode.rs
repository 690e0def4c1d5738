//! Process-wide serving mode.
//!
//! Dev mode relaxes security defaults, most visibly by permitting insecure
//! cookies for plain `http://localhost` development. Because a live service
//! must never drift into that posture, the flag is writable only until the
//! dispatcher serves its first request: [`Mux::serve`] freezes the gate, and
//! any later [`set_dev_mode`] call is a usage error that aborts instead of
//! being silently ignored.
//!
//! [`Mux::serve`]: crate::routing::Mux::serve
use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};

/// One-way freezeable dev-mode flag.
///
/// Lifecycle: created mutable, toggled any number of times, frozen exactly
/// once, read-only forever after. Reads through [`get`] stay lock-free so the
/// per-request hot path never contends on the transition lock.
///
/// [`get`]: ModeGate::get
#[derive(Debug)]
pub struct ModeGate {
    inner: Mutex<Inner>,
    /// Mirror of `Inner::dev`, updated under the lock.
    dev: AtomicBool,
}

#[derive(Debug)]
struct Inner {
    dev: bool,
    frozen: bool,
}

impl ModeGate {
    /// Create a gate in the mutable state with dev mode off.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Inner { dev: false, frozen: false }),
            dev: AtomicBool::new(false),
        }
    }

    /// Set dev mode. The last value set before the freeze wins.
    ///
    /// # Panics
    ///
    /// Panics if the gate is already frozen. Changing the security posture of
    /// a serving process is a structural misuse, not a runtime condition, so
    /// it is deliberately unrecoverable.
    pub fn set(&self, dev: bool) {
        let mut inner = self.lock();
        if inner.frozen {
            drop(inner);
            panic!("dev mode cannot change once the dispatcher has started serving");
        }
        inner.dev = dev;
        self.dev.store(dev, Ordering::Release);
    }

    /// Freeze the gate. Idempotent.
    pub fn freeze(&self) {
        self.lock().frozen = true;
    }

    /// Whether the gate has frozen.
    pub fn is_frozen(&self) -> bool {
        self.lock().frozen
    }

    /// Read the dev-mode flag. Callable from any state, lock-free.
    pub fn get(&self) -> bool {
        self.dev.load(Ordering::Acquire)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // set() panics only after releasing the guard, so poisoning can only
        // come from a foreign unwind; the state is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ModeGate {
    fn default() -> Self {
        Self::new()
    }
}

// ===== Process gate =====

static GATE: ModeGate = ModeGate::new();

/// Enable or disable dev mode for this process.
///
/// Must be called, if at all, strictly before the first request is served.
///
/// # Panics
///
/// Panics if the dispatcher has already served a request.
pub fn set_dev_mode(enabled: bool) {
    GATE.set(enabled);
}

/// Whether this process runs in dev mode.
pub fn is_dev_mode() -> bool {
    GATE.get()
}

pub(crate) fn freeze() {
    GATE.freeze();
}
