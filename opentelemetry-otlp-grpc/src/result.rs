//! Outcomes of export and shutdown calls and the handles that deliver them.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;

/// Why an export did not succeed.
///
/// This is for programmatic checks only; the diagnostic text goes to the log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureReason {
    /// The exporter was shut down before or while the call ran. No log record.
    AlreadyShutdown,
    /// The collector reported (or the channel detected) `UNAVAILABLE`.
    Unavailable,
    /// The collector does not serve the signal's RPC path.
    Unimplemented,
    /// No response within the call's deadline.
    DeadlineExceeded,
    /// Any other non-OK status code.
    Status(i32),
    /// The batch could not be encoded.
    Encoding,
    /// The task producing the outcome went away without reporting one.
    Abandoned,
    /// A bounded wait on the handle elapsed first.
    Incomplete,
}

/// The outcome of a single export or shutdown call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The call completed successfully.
    Success,
    /// The call failed.
    Failure(FailureReason),
}

impl ExportOutcome {
    /// Whether the call succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, ExportOutcome::Success)
    }

    /// The failure reason, if the call failed.
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            ExportOutcome::Success => None,
            ExportOutcome::Failure(reason) => Some(*reason),
        }
    }
}

/// Resolves exactly once with the [`ExportOutcome`] of the call that produced it.
///
/// Await it directly or bound the wait with [`CompletionHandle::join`].
/// Dropping the handle does not cancel the call.
#[derive(Debug)]
#[must_use = "the outcome of the call is only observable through the handle"]
pub struct CompletionHandle {
    rx: oneshot::Receiver<ExportOutcome>,
}

/// Producing side of a [`CompletionHandle`].
#[derive(Debug)]
pub(crate) struct Completer {
    tx: oneshot::Sender<ExportOutcome>,
}

impl CompletionHandle {
    pub(crate) fn pending() -> (CompletionHandle, Completer) {
        let (tx, rx) = oneshot::channel();
        (CompletionHandle { rx }, Completer { tx })
    }

    /// A handle that is already resolved.
    pub(crate) fn ready(outcome: ExportOutcome) -> CompletionHandle {
        let (handle, completer) = CompletionHandle::pending();
        completer.complete(outcome);
        handle
    }

    /// Wait at most `timeout` for the outcome.
    ///
    /// Yields `Failure(Incomplete)` if the call has not finished in time; the
    /// call itself keeps running.
    pub async fn join(self, timeout: Duration) -> ExportOutcome {
        tokio::time::timeout(timeout, self)
            .await
            .unwrap_or(ExportOutcome::Failure(FailureReason::Incomplete))
    }

    /// The outcome if it is already available.
    pub fn try_outcome(&mut self) -> Option<ExportOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                Some(ExportOutcome::Failure(FailureReason::Abandoned))
            }
        }
    }
}

impl Future for CompletionHandle {
    type Output = ExportOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(ExportOutcome::Failure(FailureReason::Abandoned)))
    }
}

impl Completer {
    /// Deliver the outcome. Consuming `self` makes a second delivery impossible.
    pub(crate) fn complete(self, outcome: ExportOutcome) {
        // The receiver may have been dropped; nobody is waiting then.
        let _ = self.tx.send(outcome);
    }
}
