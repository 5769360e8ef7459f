// Reformat tracking
//
// Layout code marks windows stale through a cloneable `ReformatHandle`; the
// poll loop sees the pending flag and asks the queue to flush once per cycle.

use crate::bridge::LayoutSubsystem;
use crate::models::WindowId;
use indexmap::IndexSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Shared {
    pending: AtomicBool,
    windows: Mutex<IndexSet<WindowId>>,
}

/// Cloneable handle for code that invalidates layout.
#[derive(Debug, Clone)]
pub struct ReformatHandle {
    shared: Arc<Shared>,
}

impl ReformatHandle {
    /// Mark `window` as needing a reformat.
    pub fn request(&self, window: WindowId) {
        self.shared
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(window);
        self.shared.pending.store(true, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.shared.pending.load(Ordering::Acquire)
    }
}

/// The reformat-pending flag plus the windows waiting on it.
///
/// `R` performs the actual reformat of one window.
pub struct ReformatQueue<R: FnMut(WindowId)> {
    shared: Arc<Shared>,
    reformat: R,
}

impl<R: FnMut(WindowId)> ReformatQueue<R> {
    pub fn new(reformat: R) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            reformat,
        }
    }

    pub fn handle(&self) -> ReformatHandle {
        ReformatHandle {
            shared: self.shared.clone(),
        }
    }

    /// Windows currently waiting, in request order.
    pub fn pending_windows(&self) -> Vec<WindowId> {
        self.shared
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .copied()
            .collect()
    }
}

impl<R: FnMut(WindowId)> LayoutSubsystem for ReformatQueue<R> {
    fn is_reformat_pending(&self) -> bool {
        self.shared.pending.load(Ordering::Acquire)
    }

    fn flush_reformats(&mut self) {
        // Clear the flag before draining so requests made by a reformat
        // callback are picked up on the next cycle.
        if !self.shared.pending.swap(false, Ordering::AcqRel) {
            return;
        }

        let windows: Vec<WindowId> = {
            let mut guard = self
                .shared
                .windows
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.drain(..).collect()
        };

        tracing::debug!("Flushing reformats for {} windows", windows.len());
        for window in windows {
            (self.reformat)(window);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_flush_without_requests_is_noop() {
        let calls = Rc::new(RefCell::new(0));
        let counter = calls.clone();
        let mut queue = ReformatQueue::new(move |_| *counter.borrow_mut() += 1);

        assert!(!queue.is_reformat_pending());
        queue.flush_reformats();
        queue.flush_reformats();
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn test_requests_are_deduplicated_and_ordered() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let mut queue = ReformatQueue::new(move |w| log.borrow_mut().push(w));
        let handle = queue.handle();

        handle.request(WindowId(2));
        handle.request(WindowId(1));
        handle.request(WindowId(2));
        assert!(queue.is_reformat_pending());
        assert_eq!(queue.pending_windows(), vec![WindowId(2), WindowId(1)]);

        queue.flush_reformats();
        assert_eq!(*seen.borrow(), vec![WindowId(2), WindowId(1)]);
        assert!(!queue.is_reformat_pending());
        assert!(queue.pending_windows().is_empty());
    }

    #[test]
    fn test_handle_usable_from_other_thread() {
        let mut queue = ReformatQueue::new(|_| {});
        let handle = queue.handle();

        std::thread::spawn(move || handle.request(WindowId(9)))
            .join()
            .unwrap();

        assert!(queue.is_reformat_pending());
        queue.flush_reformats();
        assert!(!queue.is_reformat_pending());
    }
}
