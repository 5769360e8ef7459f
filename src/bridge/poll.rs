use super::{
    CallbackRegistry, EnvelopeReceiver, LayoutSubsystem, MessageRouter, Poller, SysPoller,
    TransferEngine, WaitSet, WaitTimeout, compute_timeout,
};
use crate::metrics::BridgeMetrics;
use std::io::ErrorKind;
use std::thread::{self, ThreadId};
use std::time::Instant;

/// Everything the poll loop consults, owned by the host application and
/// passed explicitly into every [`EventBridge::poll`] call.
pub struct PollContext<T, C, L, R> {
    transfers: T,
    timers: C,
    layout: L,
    router: R,
}

impl<T, C, L, R> PollContext<T, C, L, R>
where
    T: TransferEngine,
    C: CallbackRegistry,
    L: LayoutSubsystem,
    R: MessageRouter,
{
    pub fn new(transfers: T, timers: C, layout: L, router: R) -> Self {
        Self {
            transfers,
            timers,
            layout,
            router,
        }
    }

    pub fn transfers(&self) -> &T {
        &self.transfers
    }

    pub fn transfers_mut(&mut self) -> &mut T {
        &mut self.transfers
    }

    pub fn timers(&self) -> &C {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut C {
        &mut self.timers
    }

    pub fn layout(&self) -> &L {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut L {
        &mut self.layout
    }

    pub fn router(&self) -> &R {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut R {
        &mut self.router
    }

    pub fn into_parts(self) -> (T, C, L, R) {
        (self.transfers, self.timers, self.layout, self.router)
    }
}

/// What happened during one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Callbacks run before the wait
    pub early_callbacks: usize,
    /// Timeout the wait was given
    pub timeout: WaitTimeout,
    /// Ready descriptors reported by the wait (0 on failure)
    pub ready: usize,
    /// Whether an envelope reached the router
    pub dispatched: bool,
    /// Callbacks run after the wait
    pub late_callbacks: usize,
    /// Whether pending reformats were flushed
    pub flushed: bool,
}

/// The main-thread side of the bridge: the envelope receiver plus the waiter.
///
/// Bound to the thread that created it; polling from any other thread panics.
pub struct EventBridge<P: Poller = SysPoller> {
    receiver: EnvelopeReceiver,
    poller: P,
    owner: ThreadId,
    metrics: BridgeMetrics,
}

impl EventBridge<SysPoller> {
    pub fn new(receiver: EnvelopeReceiver) -> Self {
        Self::with_poller(receiver, SysPoller)
    }
}

impl<P: Poller> EventBridge<P> {
    pub fn with_poller(receiver: EnvelopeReceiver, poller: P) -> Self {
        Self {
            receiver,
            poller,
            owner: thread::current().id(),
            metrics: BridgeMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &BridgeMetrics {
        &self.metrics
    }

    pub fn poller(&self) -> &P {
        &self.poller
    }

    /// Run one wait-and-dispatch cycle.
    ///
    /// `active` says whether any transfer is in flight; when false the
    /// transfer engine is not consulted.
    ///
    /// # Panics
    ///
    /// - if called from a thread other than the one that built the bridge
    /// - if `active` is true and the transfer engine cannot report its
    ///   descriptor sets
    pub fn poll<T, C, L, R>(&mut self, active: bool, ctx: &mut PollContext<T, C, L, R>) -> CycleReport
    where
        T: TransferEngine,
        C: CallbackRegistry,
        L: LayoutSubsystem,
        R: MessageRouter,
    {
        assert_eq!(
            thread::current().id(),
            self.owner,
            "EventBridge polled from a thread other than its owner"
        );

        // Early deadlines
        let early_callbacks = ctx.timers.run_due();

        let mut set = WaitSet::new();
        if active {
            match ctx.transfers.descriptor_sets() {
                Ok(sets) => set.merge(&sets),
                Err(e) => panic!("transfer engine out of sync with poll loop: {}", e),
            }
        }
        let notify_fd = self.receiver.notify_fd();
        set.add_readable(notify_fd);

        let reformat_pending = ctx.layout.is_reformat_pending();
        let next_deadline = ctx.timers.next_deadline();
        let timeout = compute_timeout(reformat_pending, next_deadline, Instant::now());

        tracing::trace!(
            "poll: active={}, reformat_pending={}, deadline={:?}, timeout={:?}, fds={}",
            active,
            reformat_pending,
            next_deadline,
            timeout,
            set.len()
        );

        match timeout {
            WaitTimeout::Zero => self.metrics.record_zero_timeout(),
            WaitTimeout::Bounded(_) => self.metrics.record_bounded_wait(),
            WaitTimeout::Indefinite => {}
        }

        let mut ready = 0;
        let mut dispatched = false;
        match self.poller.wait(&mut set, timeout) {
            Ok(count) => {
                ready = count;
                if count > 0 && set.is_readable(notify_fd) {
                    if let Some(envelope) = self.receiver.recv_one() {
                        tracing::debug!("Dispatching {:?} envelope", envelope.kind());
                        ctx.router.dispatch(envelope);
                        self.metrics.record_dispatch();
                        dispatched = true;
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {
                tracing::debug!("poll: wait interrupted");
                self.metrics.record_failed_wait();
            }
            Err(e) => {
                tracing::warn!("poll: wait failed: {}", e);
                self.metrics.record_failed_wait();
            }
        }

        // The wait may have crossed further deadlines
        let late_callbacks = ctx.timers.run_due();
        self.metrics
            .record_timer_callbacks(early_callbacks + late_callbacks);

        let mut flushed = false;
        if ctx.layout.is_reformat_pending() {
            ctx.layout.flush_reformats();
            self.metrics.record_flush();
            flushed = true;
        }

        self.metrics.record_cycle();

        CycleReport {
            early_callbacks,
            timeout,
            ready,
            dispatched,
            late_callbacks,
            flushed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{
        DescriptorSets, MockCallbackRegistry, MockLayoutSubsystem, MockMessageRouter,
        MockTransferEngine, TransferError, envelope_channel,
    };
    use crate::models::{Envelope, Message};
    use std::io;
    use std::time::Duration;

    /// Poller that never touches the OS: reports the notification descriptor
    /// readable when asked to, and records the timeouts it was given.
    struct ScriptedPoller {
        notify_fd: Option<i32>,
        fail_with: Option<ErrorKind>,
        timeouts: Vec<WaitTimeout>,
        set_sizes: Vec<usize>,
    }

    impl ScriptedPoller {
        fn idle() -> Self {
            Self {
                notify_fd: None,
                fail_with: None,
                timeouts: Vec::new(),
                set_sizes: Vec::new(),
            }
        }
    }

    impl Poller for ScriptedPoller {
        fn wait(&mut self, set: &mut WaitSet, timeout: WaitTimeout) -> io::Result<usize> {
            self.timeouts.push(timeout);
            self.set_sizes.push(set.len());
            if let Some(kind) = self.fail_with {
                return Err(io::Error::from(kind));
            }
            match self.notify_fd {
                Some(fd) => {
                    set.set_readable(fd);
                    Ok(1)
                }
                None => Ok(0),
            }
        }
    }

    fn quiet_timers() -> MockCallbackRegistry {
        let mut timers = MockCallbackRegistry::new();
        timers.expect_run_due().returning(|| 0);
        timers.expect_next_deadline().returning(|| None);
        timers
    }

    fn idle_layout() -> MockLayoutSubsystem {
        let mut layout = MockLayoutSubsystem::new();
        layout.expect_is_reformat_pending().returning(|| false);
        layout.expect_flush_reformats().never();
        layout
    }

    #[test]
    fn test_inactive_skips_transfer_engine() {
        let (_tx, rx) = envelope_channel(4).unwrap();
        let mut bridge = EventBridge::with_poller(rx, ScriptedPoller::idle());

        let mut transfers = MockTransferEngine::new();
        transfers.expect_descriptor_sets().never();
        let mut router = MockMessageRouter::new();
        router.expect_dispatch().never();

        let mut ctx = PollContext::new(transfers, quiet_timers(), idle_layout(), router);
        let report = bridge.poll(false, &mut ctx);

        assert!(!report.dispatched);
        assert_eq!(bridge.poller().set_sizes, vec![1]);
    }

    #[test]
    fn test_active_merges_transfer_descriptors() {
        let (_tx, rx) = envelope_channel(4).unwrap();
        let mut bridge = EventBridge::with_poller(rx, ScriptedPoller::idle());

        let mut transfers = MockTransferEngine::new();
        transfers.expect_descriptor_sets().times(1).returning(|| {
            Ok(DescriptorSets {
                read: vec![100, 101],
                write: vec![101],
                exceptional: vec![],
            })
        });

        let mut ctx = PollContext::new(
            transfers,
            quiet_timers(),
            idle_layout(),
            MockMessageRouter::new(),
        );
        bridge.poll(true, &mut ctx);

        // 100, 101 and the notification descriptor
        assert_eq!(bridge.poller().set_sizes, vec![3]);
    }

    #[test]
    #[should_panic(expected = "transfer engine out of sync")]
    fn test_transfer_failure_while_active_is_fatal() {
        let (_tx, rx) = envelope_channel(4).unwrap();
        let mut bridge = EventBridge::with_poller(rx, ScriptedPoller::idle());

        let mut transfers = MockTransferEngine::new();
        transfers
            .expect_descriptor_sets()
            .returning(|| Err(TransferError("multi handle gone".into())));

        let mut ctx = PollContext::new(
            transfers,
            quiet_timers(),
            idle_layout(),
            MockMessageRouter::new(),
        );
        bridge.poll(true, &mut ctx);
    }

    #[test]
    fn test_timers_checked_before_and_after_wait() {
        let (_tx, rx) = envelope_channel(4).unwrap();
        let mut bridge = EventBridge::with_poller(rx, ScriptedPoller::idle());

        let mut timers = MockCallbackRegistry::new();
        let mut seq = mockall::Sequence::new();
        timers
            .expect_run_due()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| 2);
        timers
            .expect_next_deadline()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Some(Instant::now()));
        timers
            .expect_run_due()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| 1);

        let mut ctx = PollContext::new(
            MockTransferEngine::new(),
            timers,
            idle_layout(),
            MockMessageRouter::new(),
        );
        let report = bridge.poll(false, &mut ctx);

        assert_eq!(report.early_callbacks, 2);
        assert_eq!(report.late_callbacks, 1);
        assert_eq!(report.timeout, WaitTimeout::Zero);
    }

    #[test]
    fn test_reformat_pending_forces_zero_timeout_and_flush() {
        let (_tx, rx) = envelope_channel(4).unwrap();
        let mut bridge = EventBridge::with_poller(rx, ScriptedPoller::idle());

        let mut timers = MockCallbackRegistry::new();
        timers.expect_run_due().returning(|| 0);
        timers
            .expect_next_deadline()
            .returning(|| Some(Instant::now() + Duration::from_secs(600)));

        let mut layout = MockLayoutSubsystem::new();
        layout.expect_is_reformat_pending().returning(|| true);
        layout.expect_flush_reformats().times(1).return_const(());

        let mut ctx = PollContext::new(
            MockTransferEngine::new(),
            timers,
            layout,
            MockMessageRouter::new(),
        );
        let report = bridge.poll(false, &mut ctx);

        assert_eq!(report.timeout, WaitTimeout::Zero);
        assert!(report.flushed);
        assert_eq!(bridge.poller().timeouts, vec![WaitTimeout::Zero]);
    }

    #[test]
    fn test_dispatches_one_envelope_per_cycle() {
        let (tx, rx) = envelope_channel(4).unwrap();
        let notify_fd = rx.notify_fd();
        let mut poller = ScriptedPoller::idle();
        poller.notify_fd = Some(notify_fd);
        let mut bridge = EventBridge::with_poller(rx, poller);

        tx.send(Envelope::new(Message::OpenUrl("first".into())))
            .unwrap();
        tx.send(Envelope::new(Message::OpenUrl("second".into())))
            .unwrap();

        let mut router = MockMessageRouter::new();
        let mut seq = mockall::Sequence::new();
        router
            .expect_dispatch()
            .withf(|env| env.message == Message::OpenUrl("first".into()))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        router
            .expect_dispatch()
            .withf(|env| env.message == Message::OpenUrl("second".into()))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let mut ctx = PollContext::new(
            MockTransferEngine::new(),
            quiet_timers(),
            idle_layout(),
            router,
        );

        assert!(bridge.poll(false, &mut ctx).dispatched);
        assert!(bridge.poll(false, &mut ctx).dispatched);
        // Readable but drained: nothing left to dispatch
        assert!(!bridge.poll(false, &mut ctx).dispatched);
    }

    #[test]
    fn test_interrupted_wait_counts_as_idle() {
        let (tx, rx) = envelope_channel(4).unwrap();
        let mut poller = ScriptedPoller::idle();
        poller.fail_with = Some(ErrorKind::Interrupted);
        let mut bridge = EventBridge::with_poller(rx, poller);
        tx.send(Envelope::new(Message::AboutRequested)).unwrap();

        let mut router = MockMessageRouter::new();
        router.expect_dispatch().never();

        let mut timers = MockCallbackRegistry::new();
        timers.expect_run_due().times(2).returning(|| 0);
        timers.expect_next_deadline().returning(|| None);

        let mut ctx = PollContext::new(MockTransferEngine::new(), timers, idle_layout(), router);
        let report = bridge.poll(false, &mut ctx);

        assert_eq!(report.ready, 0);
        assert!(!report.dispatched);
        assert_eq!(
            bridge
                .metrics()
                .failed_waits
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[test]
    fn test_poll_from_foreign_thread_panics() {
        let (_tx, rx) = envelope_channel(4).unwrap();
        let bridge = EventBridge::with_poller(rx, ScriptedPoller::idle());

        let handle = std::thread::spawn(move || {
            let mut bridge = bridge;
            let mut ctx = PollContext::new(
                MockTransferEngine::new(),
                quiet_timers(),
                idle_layout(),
                MockMessageRouter::new(),
            );
            bridge.poll(false, &mut ctx);
        });

        assert!(handle.join().is_err());
    }
}
