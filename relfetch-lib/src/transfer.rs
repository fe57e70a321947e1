use crate::download_client::DownloadClient;
use crate::error::TransferError;
use crate::release::Asset;
use crate::source_url::{destination_path, resolve_source_url};
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::instrument;

/// Final classification of one transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Succeeded,
    Cancelled,
    Failed,
}

impl TransferOutcome {
    fn to_u8(self) -> u8 {
        match self {
            TransferOutcome::Succeeded => 1,
            TransferOutcome::Cancelled => 2,
            TransferOutcome::Failed => 3,
        }
    }

    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(TransferOutcome::Succeeded),
            2 => Some(TransferOutcome::Cancelled),
            3 => Some(TransferOutcome::Failed),
            _ => None,
        }
    }
}

const IN_PROGRESS: u8 = 0;

/// State shared between a running transfer and whoever supervises it.
///
/// Each field has exactly one writer: the engine owns the byte counters and
/// the outcome, the supervisor owns the cancel flag.
#[derive(Debug, Default)]
pub struct TransferProgress {
    bytes_total: AtomicU64,
    bytes_transferred: AtomicU64,
    cancel_requested: AtomicBool,
    outcome: AtomicU8,
}

/// Point-in-time copy of the byte counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub bytes_total: u64,
    pub bytes_transferred: u64,
}

impl ProgressSnapshot {
    /// Fraction of the body received, `None` while the size is unknown.
    pub fn ratio(&self) -> Option<f64> {
        if self.bytes_total == 0 {
            return None;
        }
        Some(self.bytes_transferred as f64 / self.bytes_total as f64)
    }

    /// True only for a sized body whose every announced byte arrived.
    pub fn is_complete(&self) -> bool {
        self.bytes_total > 0 && self.bytes_transferred == self.bytes_total
    }
}

impl TransferProgress {
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            bytes_total: self.bytes_total.load(Ordering::Acquire),
            bytes_transferred: self.bytes_transferred.load(Ordering::Acquire),
        }
    }

    /// Asks the engine to stop at its next progress tick. Idempotent.
    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::Release);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }

    /// `None` while the transfer is still in progress.
    pub fn outcome(&self) -> Option<TransferOutcome> {
        TransferOutcome::from_u8(self.outcome.load(Ordering::Acquire))
    }

    fn record_total(&self, total: u64) {
        self.bytes_total.fetch_max(total, Ordering::AcqRel);
    }

    fn record_transferred(&self, transferred: u64) {
        self.bytes_transferred.fetch_max(transferred, Ordering::AcqRel);
    }

    /// Moves to a terminal outcome. Only the first call has any effect.
    fn finish(&self, outcome: TransferOutcome) -> bool {
        self.outcome
            .compare_exchange(
                IN_PROGRESS,
                outcome.to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// Runtime record of one asset download.
#[derive(Debug)]
pub struct TransferJob {
    pub asset: Asset,
    /// URL actually requested, after job artifact rewriting.
    pub source_url: String,
    pub destination: PathBuf,
    progress: Arc<TransferProgress>,
}

impl TransferJob {
    pub fn new(asset: Asset, destination_root: &Path) -> Self {
        let source_url = resolve_source_url(asset.url());
        let destination = destination_path(destination_root, &source_url, asset.name());
        Self {
            asset,
            source_url,
            destination,
            progress: Arc::new(TransferProgress::default()),
        }
    }

    pub fn progress(&self) -> &TransferProgress {
        &self.progress
    }
}

/// What the engine ended with, plus the failure that caused a `Failed` outcome.
#[derive(Debug)]
pub struct TransferReport {
    pub outcome: TransferOutcome,
    pub error: Option<TransferError>,
}

enum Completion {
    Finished,
    Aborted,
}

/// Starts the download of `job` on its own task.
///
/// The task only holds the shared progress state, never the job itself.
pub fn spawn_download<D>(
    client: D,
    job: &TransferJob,
    credential: &str,
) -> JoinHandle<TransferReport>
where
    D: DownloadClient + 'static,
{
    let source_url = job.source_url.clone();
    let destination = job.destination.clone();
    let credential = credential.to_string();
    let progress = Arc::clone(&job.progress);

    tokio::spawn(async move {
        download(&client, &source_url, &destination, &credential, &progress).await
    })
}

/// Streams `source_url` into `destination`, updating `progress` on every chunk.
///
/// Stops early once `progress` carries a cancel request. Whenever the outcome
/// is not `Succeeded`, the output file is removed before returning.
#[instrument(level = "debug", skip_all, fields(file = %destination.display()))]
pub async fn download<D: DownloadClient>(
    client: &D,
    source_url: &str,
    destination: &Path,
    credential: &str,
    progress: &TransferProgress,
) -> TransferReport {
    tracing::debug!(source_url, "starting transfer");

    let result = transfer(client, source_url, destination, credential, progress).await;
    let (outcome, error) = match result {
        Ok(Completion::Finished) => (TransferOutcome::Succeeded, None),
        Ok(Completion::Aborted) => (TransferOutcome::Cancelled, None),
        Err(e) => {
            tracing::debug!("transfer failed: {e}");
            (TransferOutcome::Failed, Some(e))
        }
    };

    progress.finish(outcome);
    tracing::debug!(?outcome, "transfer finished");
    TransferReport { outcome, error }
}

async fn transfer<D: DownloadClient>(
    client: &D,
    source_url: &str,
    destination: &Path,
    credential: &str,
    progress: &TransferProgress,
) -> Result<Completion, TransferError> {
    if progress.is_cancel_requested() {
        return Ok(Completion::Aborted);
    }

    ensure_parent_dir(destination).await;

    let mut file = File::create(destination)
        .await
        .map_err(|e| TransferError::file_system(destination, e))?;

    let result = write_body(client, source_url, credential, &mut file, destination, progress).await;
    drop(file);

    if !matches!(result, Ok(Completion::Finished)) {
        remove_partial(destination).await;
    }
    result
}

async fn write_body<D: DownloadClient>(
    client: &D,
    source_url: &str,
    credential: &str,
    file: &mut File,
    destination: &Path,
    progress: &TransferProgress,
) -> Result<Completion, TransferError> {
    let mut response = client.open_stream(source_url, credential).await?;

    progress.record_total(response.content_length);
    if progress.is_cancel_requested() {
        return Ok(Completion::Aborted);
    }

    let mut transferred = 0u64;
    while let Some(chunk) = response.chunks.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| TransferError::file_system(destination, e))?;
        transferred += chunk.len() as u64;
        progress.record_transferred(transferred);

        if progress.is_cancel_requested() {
            return Ok(Completion::Aborted);
        }
    }

    file.flush()
        .await
        .map_err(|e| TransferError::file_system(destination, e))?;

    // A cancel that lands after the last chunk still wins.
    if progress.is_cancel_requested() {
        return Ok(Completion::Aborted);
    }
    Ok(Completion::Finished)
}

/// A directory that cannot be created is only logged: opening the output
/// file is what decides whether the transfer can go on.
async fn ensure_parent_dir(destination: &Path) {
    if let Some(parent) = destination.parent()
        && let Err(e) = tokio::fs::create_dir_all(parent).await
    {
        tracing::warn!("Failed to create download directory {}: {}", parent.display(), e);
    }
}

pub(crate) async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::test_helpers::mock_download_client::MockDownloadClient;
    use std::time::Duration;
    use tempfile::TempDir;

    fn asset(url: &str) -> Asset {
        Asset::new("game.zip", url).unwrap()
    }

    async fn wait_for_bytes(progress: &TransferProgress, bytes: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while progress.snapshot().bytes_transferred < bytes {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("engine never reported progress");
    }

    #[test]
    fn test_job_resolves_url_and_destination() {
        let job = TransferJob::new(
            asset("https://gl.example.com/grp/proj/-/jobs/9/artifacts/raw/dist/game.zip?inline=false"),
            Path::new("/downloads"),
        );
        assert_eq!(
            job.source_url,
            "https://gl.example.com/api/v4/projects/grp%2Fproj/jobs/9/artifacts/dist/game.zip?inline=false"
        );
        assert_eq!(job.destination, Path::new("/downloads/game.zip"));
        assert_eq!(job.progress().outcome(), None);
    }

    #[test]
    fn test_snapshot_ratio() {
        let unknown = ProgressSnapshot {
            bytes_total: 0,
            bytes_transferred: 10,
        };
        assert_eq!(unknown.ratio(), None);
        assert!(!unknown.is_complete());

        let half = ProgressSnapshot {
            bytes_total: 200,
            bytes_transferred: 100,
        };
        assert_eq!(half.ratio(), Some(0.5));
        assert!(!half.is_complete());
    }

    #[test]
    fn test_outcome_is_write_once() {
        let progress = TransferProgress::default();
        assert!(progress.finish(TransferOutcome::Cancelled));
        assert!(!progress.finish(TransferOutcome::Succeeded));
        assert_eq!(progress.outcome(), Some(TransferOutcome::Cancelled));
    }

    #[tokio::test]
    async fn test_download_writes_file() -> anyhow::Result<()> {
        let tmp_dir = TempDir::new()?;
        let root = tmp_dir.path().join("downloads");
        let client = MockDownloadClient::with_chunks(10, &[b"hello", b"world"]);
        let job = TransferJob::new(asset("https://h/d/game.zip?x=1"), &root);

        let report = spawn_download(client.clone(), &job, "secret").await?;

        assert_eq!(report.outcome, TransferOutcome::Succeeded);
        assert!(report.error.is_none());
        assert_eq!(std::fs::read(root.join("game.zip"))?, b"helloworld");
        assert_eq!(
            job.progress().snapshot(),
            ProgressSnapshot {
                bytes_total: 10,
                bytes_transferred: 10,
            }
        );
        assert_eq!(job.progress().outcome(), Some(TransferOutcome::Succeeded));
        assert_eq!(client.requests(), vec!["https://h/d/game.zip?x=1".to_string()]);
        assert_eq!(client.credentials(), vec!["secret".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_download_requests_rewritten_url() -> anyhow::Result<()> {
        let tmp_dir = TempDir::new()?;
        let client = MockDownloadClient::with_chunks(3, &[b"abc"]);
        let job = TransferJob::new(
            asset("https://gl.example.com/grp/proj/-/jobs/9/artifacts/raw/game.zip"),
            tmp_dir.path(),
        );

        spawn_download(client.clone(), &job, "").await?;

        assert_eq!(
            client.requests(),
            vec!["https://gl.example.com/api/v4/projects/grp%2Fproj/jobs/9/artifacts/game.zip".to_string()]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_unsized_body_is_kept_by_engine() -> anyhow::Result<()> {
        let tmp_dir = TempDir::new()?;
        let client = MockDownloadClient::with_chunks(0, &[]);
        let job = TransferJob::new(asset("https://h/d/empty.bin"), tmp_dir.path());

        let report = spawn_download(client, &job, "").await?;

        assert_eq!(report.outcome, TransferOutcome::Succeeded);
        assert_eq!(std::fs::read(tmp_dir.path().join("empty.bin"))?, b"");
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_removes_file() -> anyhow::Result<()> {
        let tmp_dir = TempDir::new()?;
        let (client, sender) = MockDownloadClient::scripted(12);
        let job = TransferJob::new(asset("https://h/d/game.zip"), tmp_dir.path());

        let handle = spawn_download(client, &job, "");
        sender.send(b"abcd");
        wait_for_bytes(job.progress(), 4).await;
        assert!(job.destination.exists());

        job.progress().request_cancel();
        sender.send(b"efgh");
        let report = handle.await?;

        assert_eq!(report.outcome, TransferOutcome::Cancelled);
        assert!(!job.destination.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_before_start_skips_request() -> anyhow::Result<()> {
        let tmp_dir = TempDir::new()?;
        let client = MockDownloadClient::with_chunks(3, &[b"abc"]);
        let job = TransferJob::new(asset("https://h/d/game.zip"), tmp_dir.path());
        job.progress().request_cancel();

        let report = spawn_download(client.clone(), &job, "").await?;

        assert_eq!(report.outcome, TransferOutcome::Cancelled);
        assert!(client.requests().is_empty());
        assert!(!job.destination.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_after_last_chunk_still_cancels() -> anyhow::Result<()> {
        let tmp_dir = TempDir::new()?;
        let (client, sender) = MockDownloadClient::scripted(4);
        let job = TransferJob::new(asset("https://h/d/game.zip"), tmp_dir.path());

        let handle = spawn_download(client, &job, "");
        sender.send(b"abcd");
        wait_for_bytes(job.progress(), 4).await;
        job.progress().request_cancel();
        drop(sender);

        let report = handle.await?;
        assert_eq!(report.outcome, TransferOutcome::Cancelled);
        assert!(!job.destination.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_http_error_fails_without_file() -> anyhow::Result<()> {
        let tmp_dir = TempDir::new()?;
        let client = MockDownloadClient::failing(TransportError::Status(403));
        let job = TransferJob::new(asset("https://h/d/game.zip"), tmp_dir.path());

        let report = spawn_download(client, &job, "").await?;

        assert_eq!(report.outcome, TransferOutcome::Failed);
        assert!(matches!(
            report.error,
            Some(TransferError::Transport(TransportError::Status(403)))
        ));
        assert!(!job.destination.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_stream_error_removes_partial_file() -> anyhow::Result<()> {
        let tmp_dir = TempDir::new()?;
        let client = MockDownloadClient::with_stream_items(
            100,
            vec![
                Ok(b"partial".to_vec()),
                Err(TransportError::Connection("connection reset".to_string())),
            ],
        );
        let job = TransferJob::new(asset("https://h/d/game.zip"), tmp_dir.path());

        let report = spawn_download(client, &job, "").await?;

        assert_eq!(report.outcome, TransferOutcome::Failed);
        assert!(!job.destination.exists());
        assert_eq!(job.progress().snapshot().bytes_transferred, 7);
        Ok(())
    }

    #[tokio::test]
    async fn test_unwritable_destination_fails() -> anyhow::Result<()> {
        let tmp_dir = TempDir::new()?;
        // A regular file where the download directory should be.
        let root = tmp_dir.path().join("downloads");
        std::fs::write(&root, b"not a directory")?;
        let client = MockDownloadClient::with_chunks(3, &[b"abc"]);
        let job = TransferJob::new(asset("https://h/d/game.zip"), &root);

        let report = spawn_download(client.clone(), &job, "").await?;

        assert_eq!(report.outcome, TransferOutcome::Failed);
        assert!(matches!(report.error, Some(TransferError::FileSystem { .. })));
        assert!(client.requests().is_empty());
        assert!(root.is_file());
        Ok(())
    }

    #[tokio::test]
    async fn test_retry_starts_from_scratch() -> anyhow::Result<()> {
        let tmp_dir = TempDir::new()?;
        std::fs::write(tmp_dir.path().join("game.zip"), b"stale contents from before")?;
        let client = MockDownloadClient::with_chunks(3, &[b"new"]);
        let job = TransferJob::new(asset("https://h/d/game.zip"), tmp_dir.path());

        spawn_download(client, &job, "").await?;

        assert_eq!(std::fs::read(&job.destination)?, b"new");
        Ok(())
    }
}
