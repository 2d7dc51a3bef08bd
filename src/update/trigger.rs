// Edge-triggered "check for update now" flag shared between the card and the updater task

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    raised: AtomicBool,
    notify: Notify,
}

/// Cloneable handle to the update trigger.
///
/// Each raise is consumed by at most one `wait`. Raises that happen while nobody is
/// waiting are kept until the next `wait`; several of them coalesce into one.
#[derive(Debug, Clone, Default)]
pub struct UpdateTrigger {
    inner: Arc<Inner>,
}

impl UpdateTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.inner.raised.store(true, Ordering::Release);
        self.inner.notify.notify_one();
    }

    /// Consume a pending raise without waiting.
    pub fn take(&self) -> bool {
        self.inner.raised.swap(false, Ordering::AcqRel)
    }

    /// Resolve once the trigger has been raised, clearing it.
    pub async fn wait(&self) {
        loop {
            if self.take() {
                return;
            }
            self.inner.notify.notified().await;
        }
    }
}
