use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared "all work is done" flag.
///
/// Any marker may raise it, any number of times; once raised it stays
/// raised. Markers check it at the top of every loop iteration and can also
/// await it to cut idle sleeps short.
#[derive(Debug, Clone, Default)]
pub struct TerminationSignal {
    token: CancellationToken,
    raised: Arc<AtomicBool>,
}

impl TerminationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Returns `true` only for the call that raised it
    /// first.
    pub fn raise(&self) -> bool {
        let first = !self.raised.swap(true, Ordering::AcqRel);
        self.token.cancel();
        first
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Resolves once the signal has been raised.
    pub async fn raised(&self) {
        self.token.cancelled().await
    }

    /// Token cancelled together with the signal.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}
