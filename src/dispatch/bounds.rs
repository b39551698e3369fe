use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

use crate::foundation::geometry::Size;

/// Subscriber end of a size observation. Dropping it unsubscribes.
pub struct SizeSubscription {
    rx: Receiver<Size>,
    active: Arc<AtomicBool>,
}

/// Observer end that publishes sizes to one [`SizeSubscription`].
#[derive(Clone)]
pub struct SizeReporter {
    tx: Sender<Size>,
    active: Arc<AtomicBool>,
}

/// Connected reporter/subscription pair.
pub fn size_channel() -> (SizeReporter, SizeSubscription) {
    let (tx, rx) = mpsc::channel();
    let active = Arc::new(AtomicBool::new(true));
    (
        SizeReporter {
            tx,
            active: Arc::clone(&active),
        },
        SizeSubscription { rx, active },
    )
}

impl SizeSubscription {
    /// Next observed size, if one is queued.
    pub fn try_next(&self) -> Option<Size> {
        self.rx.try_recv().ok()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn unsubscribe(self) {}
}

impl Drop for SizeSubscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

impl SizeReporter {
    /// Publish `size`; returns `false` once the subscriber is gone.
    pub fn report(&self, size: Size) -> bool {
        self.is_active() && self.tx.send(size).is_ok()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Source of host bounding-size observations.
pub trait BoundsObserver {
    fn subscribe(&mut self) -> SizeSubscription;
}

/// [`BoundsObserver`] fed explicitly by the host.
#[derive(Clone, Default)]
pub struct ChannelBounds {
    reporters: Vec<SizeReporter>,
}

impl ChannelBounds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `size` to every live subscriber, forgetting the ones that left.
    pub fn report(&mut self, size: Size) {
        self.reporters.retain(|r| r.report(size));
    }

    pub fn subscriber_count(&self) -> usize {
        self.reporters.iter().filter(|r| r.is_active()).count()
    }
}

impl BoundsObserver for ChannelBounds {
    fn subscribe(&mut self) -> SizeSubscription {
        let (reporter, subscription) = size_channel();
        self.reporters.push(reporter);
        subscription
    }
}

#[cfg(test)]
#[path = "../../tests/unit/dispatch/bounds.rs"]
mod tests;
