//! Exporter lifecycle: `Active -> ShuttingDown -> Shutdown`.
//!
//! Transitions are monotonic. Every export holds an [`InFlightGuard`] for as
//! long as it may use the transport; shutdown completes only once all guards
//! are gone.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Notify};

/// The state of an exporter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ExporterState {
    /// Accepting exports.
    Active = 0,
    /// Shutdown was requested; exports are refused and in-flight calls are
    /// being cancelled.
    ShuttingDown = 1,
    /// All in-flight calls are resolved and the transport is released.
    Shutdown = 2,
}

impl ExporterState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ExporterState::Active,
            1 => ExporterState::ShuttingDown,
            _ => ExporterState::Shutdown,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: AtomicU8,
    in_flight: AtomicUsize,
    idle: Notify,
    shutdown_tx: watch::Sender<bool>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Lifecycle {
            state: AtomicU8::new(ExporterState::Active as u8),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
            shutdown_tx,
        }
    }

    pub(crate) fn state(&self) -> ExporterState {
        ExporterState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Admit one export, or `None` once shutdown has begun.
    ///
    /// The slot is taken before the state is checked, so a shutdown that
    /// starts afterwards always waits for it.
    pub(crate) fn try_enter(self: &Arc<Self>) -> Option<InFlightGuard> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlightGuard {
            lifecycle: Arc::clone(self),
        };

        (self.state() == ExporterState::Active).then_some(guard)
    }

    /// Move `Active -> ShuttingDown` and cancel in-flight calls.
    ///
    /// Returns `false` if shutdown had already begun.
    pub(crate) fn begin_shutdown(&self) -> bool {
        let won = self
            .state
            .compare_exchange(
                ExporterState::Active as u8,
                ExporterState::ShuttingDown as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();

        if won {
            self.shutdown_tx.send_replace(true);
        }
        won
    }

    /// Resolves once no export holds a slot.
    pub(crate) async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    pub(crate) fn finish_shutdown(&self) {
        self.state
            .store(ExporterState::Shutdown as u8, Ordering::SeqCst);
    }

    pub(crate) fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.shutdown_tx.subscribe(),
        }
    }

    fn leave(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// One admitted export. Dropping it releases the slot.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    lifecycle: Arc<Lifecycle>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.lifecycle.leave();
    }
}

/// Fires when shutdown begins.
#[derive(Debug)]
pub(crate) struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolves once shutdown has begun, immediately if it already has.
    pub(crate) async fn recv(&mut self) {
        // A closed channel means the exporter is gone, which also ends the call.
        let _ = self.rx.wait_for(|shutting_down| *shutting_down).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn shutdown_is_won_once() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), ExporterState::Active);

        assert!(lifecycle.begin_shutdown());
        assert!(!lifecycle.begin_shutdown());
        assert_eq!(lifecycle.state(), ExporterState::ShuttingDown);

        lifecycle.finish_shutdown();
        assert!(!lifecycle.begin_shutdown());
        assert_eq!(lifecycle.state(), ExporterState::Shutdown);
    }

    #[test]
    fn no_admission_after_shutdown_begins() {
        let lifecycle = Arc::new(Lifecycle::new());
        let guard = lifecycle.try_enter();
        assert!(guard.is_some());

        lifecycle.begin_shutdown();
        assert!(lifecycle.try_enter().is_none());
        assert_eq!(lifecycle.in_flight.load(Ordering::SeqCst), 1);

        drop(guard);
        assert_eq!(lifecycle.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn wait_idle_waits_for_guards() {
        let lifecycle = Arc::new(Lifecycle::new());
        let guard = lifecycle.try_enter();
        lifecycle.begin_shutdown();

        let waiter = {
            let lifecycle = Arc::clone(&lifecycle);
            tokio::spawn(async move { lifecycle.wait_idle().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("wait_idle did not return")
            .unwrap();
    }

    #[tokio::test]
    async fn signal_fires_for_late_subscribers() {
        let lifecycle = Lifecycle::new();
        let mut early = lifecycle.shutdown_signal();

        lifecycle.begin_shutdown();
        let mut late = lifecycle.shutdown_signal();

        tokio::time::timeout(Duration::from_secs(5), async {
            early.recv().await;
            late.recv().await;
        })
        .await
        .expect("shutdown signal not delivered");
    }
}
