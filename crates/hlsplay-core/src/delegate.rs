//! Delegate interface for session events
//!
//! A session holds at most one delegate, and only weakly: dropping the
//! delegate silently stops notifications. All callbacks arrive on the engine's
//! callback context and must not block.

use parking_lot::RwLock;
use std::sync::Weak;

/// Receiver of playback session events
pub trait PlaybackDelegate: Send + Sync {
    /// The item became playable
    fn ready_to_play(&self);

    /// Total duration of the item in seconds, NaN when indefinite (live)
    fn total_time(&self, seconds: f64);

    /// Periodic progress, floored to whole seconds
    fn update_time(&self, seconds: f64);

    /// Position changed from a remote command, floored to whole seconds
    fn change_playback_position(&self, seconds: f64);

    /// The engine gave up on the item
    fn playback_failed(&self, _reason: &str) {}
}

/// Optional weak reference to the registered delegate
#[derive(Default)]
pub(crate) struct DelegateSlot {
    inner: RwLock<Option<Weak<dyn PlaybackDelegate>>>,
}

impl DelegateSlot {
    pub(crate) fn set(&self, delegate: Weak<dyn PlaybackDelegate>) {
        *self.inner.write() = Some(delegate);
    }

    pub(crate) fn clear(&self) {
        *self.inner.write() = None;
    }

    /// Run `f` against the delegate if it is still alive
    ///
    /// The strong reference only lives for the duration of the call.
    pub(crate) fn with<F: FnOnce(&dyn PlaybackDelegate)>(&self, f: F) {
        let delegate = self.inner.read().as_ref().and_then(Weak::upgrade);
        if let Some(delegate) = delegate {
            f(delegate.as_ref());
        }
    }

    #[cfg(test)]
    fn is_set(&self) -> bool {
        self.inner
            .read()
            .as_ref()
            .is_some_and(|d| d.strong_count() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counter {
        ready: AtomicU32,
    }

    impl PlaybackDelegate for Counter {
        fn ready_to_play(&self) {
            self.ready.fetch_add(1, Ordering::SeqCst);
        }
        fn total_time(&self, _seconds: f64) {}
        fn update_time(&self, _seconds: f64) {}
        fn change_playback_position(&self, _seconds: f64) {}
    }

    #[test]
    fn test_slot_does_not_keep_delegate_alive() {
        let slot = DelegateSlot::default();
        let delegate = Arc::new(Counter::default());
        let weak = Arc::downgrade(&delegate);
        slot.set(weak);

        slot.with(|d| d.ready_to_play());
        assert_eq!(delegate.ready.load(Ordering::SeqCst), 1);
        assert!(slot.is_set());

        drop(delegate);
        assert!(!slot.is_set());
        // No delegate, nothing happens
        slot.with(|d| d.ready_to_play());
    }

    #[test]
    fn test_cleared_slot_skips_calls() {
        let slot = DelegateSlot::default();
        let delegate = Arc::new(Counter::default());
        let weak = Arc::downgrade(&delegate);
        slot.set(weak);
        slot.clear();

        slot.with(|d| d.ready_to_play());
        assert_eq!(delegate.ready.load(Ordering::SeqCst), 0);
    }
}
