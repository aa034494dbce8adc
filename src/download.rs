use crate::cancel::{backoff_delay, CancelToken};
use crate::config::{DownloadConfig, OverwritePolicy};
use crate::http::{redact_url_for_log, HttpTransport, TransportError};
use crate::journal::Journal;
use crate::media::{
    extension_for_content_type, is_stream_manifest_url, MediaDescriptor, IMAGE_EXTS, VIDEO_EXTS,
};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const CHUNK_BYTES: usize = 64 * 1024;
const SNIFF_BYTES: usize = 512;
const ASSET_ACCEPT: &str = "image/avif,image/webp,image/*,video/*;q=0.9,*/*;q=0.8";
const ASSET_REFERER: &str = "https://www.pinterest.com/";
const BINARY_CONTENT_TYPES: &[&str] = &["application/octet-stream", "application/mp4"];
const TEXT_CONTENT_MARKERS: &[&str] = &["html", "json", "xml", "javascript", "mpegurl"];
const TEXT_SIGNATURES: &[&str] = &["<!doctype html", "<html", "<?xml", "#extm3u", "{", "["];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    InProgress,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub descriptor: MediaDescriptor,
    pub target_path: PathBuf,
    pub attempt_count: u32,
    pub state: TaskState,
}

impl DownloadTask {
    pub fn new(descriptor: MediaDescriptor, destination: &Path) -> Self {
        let target_path = destination.join(&descriptor.suggested_filename);
        Self {
            descriptor,
            target_path,
            attempt_count: 0,
            state: TaskState::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    Succeeded {
        path: PathBuf,
        bytes: u64,
        reused: bool,
    },
    Failed {
        reason: String,
        attempts: u32,
    },
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadOutcome::Succeeded { .. })
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            DownloadOutcome::Succeeded { path, .. } => Some(path.as_path()),
            DownloadOutcome::Failed { .. } => None,
        }
    }

    fn state(&self) -> TaskState {
        if self.is_success() {
            TaskState::Succeeded
        } else {
            TaskState::Failed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub index: usize,
    pub total: usize,
    // items with a final outcome so far
    pub completed: usize,
    pub state: TaskState,
    pub current_item: String,
}

enum WorkerMessage {
    Started(usize),
    Finished(usize, DownloadOutcome),
}

enum AttemptError {
    Retryable(String),
    Fatal(String),
}

pub fn download_all<F>(
    descriptors: &[MediaDescriptor],
    destination: &Path,
    config: &DownloadConfig,
    transport: &dyn HttpTransport,
    cancel: &CancelToken,
    progress: F,
) -> Vec<DownloadOutcome>
where
    F: FnMut(&ProgressEvent),
{
    download_all_logged(
        descriptors,
        destination,
        config,
        transport,
        cancel,
        &Journal::disabled(),
        progress,
    )
}

pub fn download_all_logged<F>(
    descriptors: &[MediaDescriptor],
    destination: &Path,
    config: &DownloadConfig,
    transport: &dyn HttpTransport,
    cancel: &CancelToken,
    journal: &Journal,
    mut progress: F,
) -> Vec<DownloadOutcome>
where
    F: FnMut(&ProgressEvent),
{
    let total = descriptors.len();
    if total == 0 {
        return Vec::new();
    }
    if let Err(err) = std::fs::create_dir_all(destination) {
        let reason = format!(
            "failed to create destination {}: {err}",
            destination.to_string_lossy()
        );
        return descriptors
            .iter()
            .map(|_| DownloadOutcome::Failed {
                reason: reason.clone(),
                attempts: 0,
            })
            .collect();
    }

    let workers = config.concurrency.max(1).min(total);
    let next_index = AtomicUsize::new(0);
    let mut outcomes: Vec<Option<DownloadOutcome>> = vec![None; total];
    let (tx, rx) = mpsc::channel::<WorkerMessage>();

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next_index = &next_index;
            scope.spawn(move || loop {
                let index = next_index.fetch_add(1, Ordering::SeqCst);
                let Some(descriptor) = descriptors.get(index) else {
                    break;
                };
                if tx.send(WorkerMessage::Started(index)).is_err() {
                    break;
                }
                let mut task = DownloadTask::new(descriptor.clone(), destination);
                let outcome = run_task(&mut task, config, transport, cancel, journal);
                if tx.send(WorkerMessage::Finished(index, outcome)).is_err() {
                    break;
                }
            });
        }
        drop(tx);

        let mut completed = 0_usize;
        for message in rx {
            let (index, state) = match message {
                WorkerMessage::Started(index) => (index, TaskState::InProgress),
                WorkerMessage::Finished(index, outcome) => {
                    completed += 1;
                    let state = outcome.state();
                    outcomes[index] = Some(outcome);
                    (index, state)
                }
            };
            progress(&ProgressEvent {
                index,
                total,
                completed,
                state,
                current_item: descriptors[index].source_url.clone(),
            });
        }
    });

    outcomes
        .into_iter()
        .map(|outcome| {
            outcome.unwrap_or_else(|| DownloadOutcome::Failed {
                reason: "worker exited before finishing".to_string(),
                attempts: 0,
            })
        })
        .collect()
}

fn run_task(
    task: &mut DownloadTask,
    config: &DownloadConfig,
    transport: &dyn HttpTransport,
    cancel: &CancelToken,
    journal: &Journal,
) -> DownloadOutcome {
    task.state = TaskState::InProgress;

    if config.overwrite == OverwritePolicy::Skip {
        if let Some((path, bytes)) = existing_target(&task.target_path) {
            task.state = TaskState::Succeeded;
            let outcome = DownloadOutcome::Succeeded {
                path,
                bytes,
                reused: true,
            };
            return finish(task, journal, outcome);
        }
    }

    if is_stream_manifest_url(&task.descriptor.source_url) {
        task.state = TaskState::Failed;
        let outcome = DownloadOutcome::Failed {
            reason: "stream playlists are not direct media".to_string(),
            attempts: 0,
        };
        return finish(task, journal, outcome);
    }

    let timeout = Duration::from_secs(config.per_item_timeout_secs.max(1));
    let max_attempts = config.max_retries_per_item.saturating_add(1);
    loop {
        if cancel.is_cancelled() {
            task.state = TaskState::Failed;
            let outcome = DownloadOutcome::Failed {
                reason: "cancelled".to_string(),
                attempts: task.attempt_count,
            };
            return finish(task, journal, outcome);
        }
        task.attempt_count += 1;

        let reason = match fetch_to_file(task, transport, cancel, timeout) {
            Ok((path, bytes)) => {
                task.state = TaskState::Succeeded;
                let outcome = DownloadOutcome::Succeeded {
                    path,
                    bytes,
                    reused: false,
                };
                return finish(task, journal, outcome);
            }
            Err(AttemptError::Fatal(reason)) => reason,
            Err(AttemptError::Retryable(reason)) if task.attempt_count < max_attempts => {
                let delay = backoff_delay(config.retry_backoff_base_ms, task.attempt_count - 1);
                journal.warn(
                    "download_retry",
                    serde_json::json!({
                        "url": redact_url_for_log(&task.descriptor.source_url),
                        "attempt": task.attempt_count,
                        "delay_ms": delay.as_millis() as u64,
                        "reason": reason,
                    }),
                );
                if cancel.sleep(delay) {
                    continue;
                }
                "cancelled".to_string()
            }
            Err(AttemptError::Retryable(reason)) => reason,
        };

        task.state = TaskState::Failed;
        let attempts = task.attempt_count;
        return finish(task, journal, DownloadOutcome::Failed { reason, attempts });
    }
}

fn finish(task: &DownloadTask, journal: &Journal, outcome: DownloadOutcome) -> DownloadOutcome {
    let level = if outcome.is_success() { "info" } else { "warn" };
    journal.log(
        level,
        "download_finished",
        serde_json::json!({
            "url": redact_url_for_log(&task.descriptor.source_url),
            "file": task.descriptor.suggested_filename,
            "attempts": task.attempt_count,
            "outcome": outcome,
        }),
    );
    outcome
}

// A `.bin` target also matches its stem under any media extension, since the name may
// have been corrected on an earlier run.
fn existing_target(target: &Path) -> Option<(PathBuf, u64)> {
    let non_empty = |path: &Path| {
        std::fs::metadata(path)
            .ok()
            .filter(|m| m.is_file() && m.len() > 0)
            .map(|m| (path.to_path_buf(), m.len()))
    };
    if let Some(found) = non_empty(target) {
        return Some(found);
    }
    if target.extension().and_then(|e| e.to_str()) != Some("bin") {
        return None;
    }
    IMAGE_EXTS
        .iter()
        .chain(VIDEO_EXTS.iter())
        .find_map(|ext| non_empty(&target.with_extension(ext.trim_start_matches('.'))))
}

fn fetch_to_file(
    task: &DownloadTask,
    transport: &dyn HttpTransport,
    cancel: &CancelToken,
    timeout: Duration,
) -> Result<(PathBuf, u64), AttemptError> {
    let url = task.descriptor.source_url.as_str();
    let started = Instant::now();
    let timed_out = || {
        AttemptError::Retryable(format!(
            "timed out after {}s for {}",
            timeout.as_secs(),
            redact_url_for_log(url)
        ))
    };

    let headers = [("Accept", ASSET_ACCEPT), ("Referer", ASSET_REFERER)];
    let response = transport
        .get_within(url, &headers, timeout)
        .map_err(|err| match err {
            TransportError::Timeout(_) => timed_out(),
            TransportError::Network(msg) => AttemptError::Retryable(format!(
                "request failed for {}: {msg}",
                redact_url_for_log(url)
            )),
        })?;
    if started.elapsed() > timeout {
        return Err(timed_out());
    }

    if !response.is_success() {
        let reason = format!("http {} for {}", response.status, redact_url_for_log(url));
        return Err(if response.is_transient_failure() {
            AttemptError::Retryable(reason)
        } else {
            AttemptError::Fatal(reason)
        });
    }

    let final_path = corrected_target(&task.target_path, &response.content_type);
    let temp_path = part_path(&final_path);
    let _ = std::fs::remove_file(&temp_path);

    let cleanup = |err: AttemptError| {
        let _ = std::fs::remove_file(&temp_path);
        err
    };

    let mut output = std::fs::File::create(&temp_path).map_err(|e| {
        AttemptError::Fatal(format!(
            "failed to create {}: {e}",
            temp_path.to_string_lossy()
        ))
    })?;
    let mut body = response.body;
    let mut buf = vec![0_u8; CHUNK_BYTES];
    let mut sniff_prefix = Vec::with_capacity(SNIFF_BYTES);
    let mut bytes_written: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(cleanup(AttemptError::Fatal("cancelled".to_string())));
        }
        if started.elapsed() > timeout {
            return Err(cleanup(timed_out()));
        }
        let read = match body.read(&mut buf) {
            Ok(read) => read,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(cleanup(AttemptError::Retryable(format!(
                    "failed reading response body for {}: {e}",
                    redact_url_for_log(url)
                ))))
            }
        };
        if read == 0 {
            break;
        }
        if sniff_prefix.len() < SNIFF_BYTES {
            let take = (SNIFF_BYTES - sniff_prefix.len()).min(read);
            sniff_prefix.extend_from_slice(&buf[..take]);
        }
        if let Err(e) = output.write_all(&buf[..read]) {
            let reason = format!("failed writing media file: {e}");
            return Err(cleanup(AttemptError::Fatal(reason)));
        }
        bytes_written = bytes_written.saturating_add(read as u64);
    }
    if let Err(e) = output.flush() {
        let reason = format!("failed writing media file: {e}");
        return Err(cleanup(AttemptError::Fatal(reason)));
    }
    drop(output);

    if bytes_written == 0 {
        return Err(cleanup(AttemptError::Retryable(format!(
            "downloaded file is empty for {}",
            redact_url_for_log(url)
        ))));
    }
    if is_non_media_response(&response.content_type, &sniff_prefix) {
        return Err(cleanup(AttemptError::Fatal(format!(
            "URL did not resolve to a media file: {}",
            redact_url_for_log(url)
        ))));
    }

    if final_path.exists() {
        let _ = std::fs::remove_file(&final_path);
    }
    std::fs::rename(&temp_path, &final_path).map_err(|e| {
        cleanup(AttemptError::Fatal(format!(
            "failed to finalize download: {e}"
        )))
    })?;
    Ok((final_path, bytes_written))
}

fn corrected_target(target: &Path, content_type: &str) -> PathBuf {
    if target.extension().and_then(|e| e.to_str()) != Some("bin") {
        return target.to_path_buf();
    }
    match extension_for_content_type(content_type) {
        Some(ext) => target.with_extension(ext.trim_start_matches('.')),
        None => target.to_path_buf(),
    }
}

fn part_path(final_path: &Path) -> PathBuf {
    let name = final_path
        .file_name()
        .and_then(|v| v.to_str())
        .unwrap_or("download.bin");
    final_path.with_file_name(format!("{name}.part"))
}

fn is_non_media_response(content_type: &str, sniff_prefix: &[u8]) -> bool {
    let ctype = content_type.trim().to_ascii_lowercase();
    let binary = ctype.starts_with("image/")
        || ctype.starts_with("video/")
        || BINARY_CONTENT_TYPES.iter().any(|t| ctype.contains(t));
    if binary {
        return false;
    }
    if ctype.starts_with("text/") || TEXT_CONTENT_MARKERS.iter().any(|m| ctype.contains(m)) {
        return true;
    }
    starts_like_text(sniff_prefix)
}

fn starts_like_text(prefix: &[u8]) -> bool {
    let head = String::from_utf8_lossy(prefix);
    let head = head.trim_start().to_ascii_lowercase();
    !head.is_empty() && TEXT_SIGNATURES.iter().any(|sig| head.starts_with(sig))
}
