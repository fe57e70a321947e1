use crate::download_client::DownloadClient;
use crate::error::TransferError;
use crate::release::Asset;
use crate::transfer::{
    ProgressSnapshot, TransferJob, TransferOutcome, TransferReport, remove_partial, spawn_download,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The user's "stop this download" input, polled by the supervisor.
pub trait CancelSignal {
    fn is_cancelled(&self) -> bool;
}

impl CancelSignal for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

impl<T: CancelSignal + ?Sized> CancelSignal for Arc<T> {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

impl<T: CancelSignal + ?Sized> CancelSignal for &T {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

/// Where the supervisor publishes what a transfer is doing.
pub trait ProgressReporter {
    fn on_state(&mut self, _state: SupervisorState, _job: &TransferJob) {}

    /// Called on every poll and once more after the engine has finished.
    fn on_progress(&mut self, snapshot: ProgressSnapshot);
}

impl ProgressReporter for () {
    fn on_progress(&mut self, _snapshot: ProgressSnapshot) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Starting,
    Running,
    Finished(TransferOutcome),
}

/// Result of a supervised transfer as presented to the user.
#[derive(Debug)]
pub struct TransferSummary {
    pub outcome: TransferOutcome,
    pub asset: Asset,
    pub destination: PathBuf,
    pub progress: ProgressSnapshot,
    /// Why the engine failed, when it did.
    pub error: Option<TransferError>,
}

/// Drives one asset download from start to a terminal outcome.
///
/// The engine runs on its own task while the supervisor polls, relays the
/// user's cancel request and reports progress. The supervisor never returns
/// before that task has finished.
pub struct TransferSupervisor<D> {
    client: D,
    destination_root: PathBuf,
    poll_interval: Duration,
    state: SupervisorState,
}

impl<D> TransferSupervisor<D>
where
    D: DownloadClient + Clone + 'static,
{
    pub fn new(client: D, destination_root: &Path) -> Self {
        Self {
            client,
            destination_root: destination_root.to_path_buf(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            state: SupervisorState::Idle,
        }
    }

    pub fn with_poll_interval(self, poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            ..self
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Downloads `asset` into the destination root.
    ///
    /// A cancel observed at any point before the engine finishes yields
    /// `Cancelled`. Otherwise the transfer only counts as `Succeeded` when the
    /// server announced a size and every announced byte arrived. No output
    /// file is left behind for any other outcome.
    pub async fn run<C, R>(
        mut self,
        asset: &Asset,
        credential: &str,
        cancel: &C,
        reporter: &mut R,
    ) -> TransferSummary
    where
        C: CancelSignal + ?Sized,
        R: ProgressReporter + ?Sized,
    {
        let job = TransferJob::new(asset.clone(), &self.destination_root);
        self.transition(SupervisorState::Starting, &job, reporter);

        let mut user_cancelled = false;
        if cancel.is_cancelled() {
            user_cancelled = true;
            job.progress().request_cancel();
        }

        let mut handle = spawn_download(self.client.clone(), &job, credential);
        self.transition(SupervisorState::Running, &job, reporter);

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let joined = loop {
            tokio::select! {
                joined = &mut handle => break joined,
                _ = ticker.tick() => {
                    if !user_cancelled && cancel.is_cancelled() {
                        tracing::debug!("cancel requested by user");
                        user_cancelled = true;
                        job.progress().request_cancel();
                    }
                    reporter.on_progress(job.progress().snapshot());
                }
            }
        };

        // A cancel that raced the engine's last tick still counts.
        user_cancelled |= cancel.is_cancelled();

        let report = joined.unwrap_or_else(|e| {
            tracing::error!("Download task for {} ended abnormally: {}", asset.name(), e);
            TransferReport {
                outcome: TransferOutcome::Failed,
                error: None,
            }
        });

        let snapshot = job.progress().snapshot();
        let outcome = classify(user_cancelled, report.outcome, snapshot);

        // The engine keeps whatever it completed; anything not reported as a
        // success must not stay on disk.
        if outcome != TransferOutcome::Succeeded {
            remove_partial(&job.destination).await;
        }

        reporter.on_progress(snapshot);
        self.transition(SupervisorState::Finished(outcome), &job, reporter);

        TransferSummary {
            outcome,
            asset: job.asset.clone(),
            destination: job.destination.clone(),
            progress: snapshot,
            error: report.error,
        }
    }

    fn transition<R>(&mut self, next: SupervisorState, job: &TransferJob, reporter: &mut R)
    where
        R: ProgressReporter + ?Sized,
    {
        tracing::debug!(from = ?self.state, to = ?next, "transfer state");
        self.state = next;
        reporter.on_state(next, job);
    }
}

/// User cancel wins over everything; a success additionally needs a sized,
/// fully received body. A completed transfer of unknown size is `Failed`.
pub fn classify(
    user_cancelled: bool,
    engine_outcome: TransferOutcome,
    snapshot: ProgressSnapshot,
) -> TransferOutcome {
    if user_cancelled {
        TransferOutcome::Cancelled
    } else if engine_outcome == TransferOutcome::Succeeded && snapshot.is_complete() {
        TransferOutcome::Succeeded
    } else {
        TransferOutcome::Failed
    }
}
