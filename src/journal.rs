use crate::paths::GrabPaths;
use crate::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

const LOG_ROTATE_BYTES: u64 = 10 * 1024 * 1024;
const LOG_MAX_BACKUPS: usize = 3;

// Each line is `{ts_ms, session_id, level, event, data}`. Write failures are swallowed:
// a broken log never fails a discovery or a download.
#[derive(Debug, Clone)]
pub struct Journal {
    inner: Option<Arc<JournalInner>>,
}

#[derive(Debug)]
struct JournalInner {
    session_id: String,
    path: PathBuf,
    lock: Mutex<()>,
}

impl Journal {
    pub fn open(paths: &GrabPaths) -> Result<Self> {
        let session_id = Uuid::new_v4().to_string();
        std::fs::create_dir_all(paths.logs_dir())?;
        Ok(Self::at_path(session_id.clone(), paths.session_log_path(&session_id)))
    }

    pub fn at_path(session_id: String, path: PathBuf) -> Self {
        Self {
            inner: Some(Arc::new(JournalInner {
                session_id,
                path,
                lock: Mutex::new(()),
            })),
        }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.inner.as_ref().map(|inner| inner.session_id.as_str())
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.as_ref().map(|inner| inner.path.as_path())
    }

    pub fn info(&self, event: &str, data: serde_json::Value) {
        self.log("info", event, data);
    }

    pub fn warn(&self, event: &str, data: serde_json::Value) {
        self.log("warn", event, data);
    }

    pub fn log(&self, level: &str, event: &str, data: serde_json::Value) {
        let Some(inner) = &self.inner else {
            return;
        };
        let line = serde_json::json!({
            "ts_ms": now_ms(),
            "session_id": inner.session_id,
            "level": level,
            "event": event,
            "data": data
        })
        .to_string();

        let Ok(_guard) = inner.lock.lock() else {
            return;
        };
        let _ = append_line(&inner.path, &line);
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    rotate_if_oversized(path, LOG_ROTATE_BYTES)?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?
        .write_all(format!("{line}\n").as_bytes())
}

// `session.jsonl` -> `session.jsonl.1` -> ... -> `session.jsonl.N`; the oldest is dropped.
fn rotate_if_oversized(path: &Path, limit: u64) -> std::io::Result<()> {
    let oversized = std::fs::metadata(path)
        .map(|m| m.len() >= limit)
        .unwrap_or(false);
    if !oversized {
        return Ok(());
    }
    let _ = std::fs::remove_file(backup_path(path, LOG_MAX_BACKUPS));
    for generation in (1..LOG_MAX_BACKUPS).rev() {
        let older = backup_path(path, generation);
        if older.exists() {
            std::fs::rename(&older, backup_path(path, generation + 1))?;
        }
    }
    std::fs::rename(path, backup_path(path, 1))
}

fn backup_path(path: &Path, generation: usize) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{generation}"));
    PathBuf::from(name)
}

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
