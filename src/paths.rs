use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct GrabPaths {
    pub base_dir: PathBuf,
}

impl GrabPaths {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn config_dir(&self) -> PathBuf {
        self.base_dir.join("config")
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir().join("pingrab.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    pub fn session_log_path(&self, session_id: &str) -> PathBuf {
        self.logs_dir().join(format!("{session_id}.jsonl"))
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.base_dir.join("downloads")
    }

    pub fn download_dir_for(&self, kind: &str, label: &str) -> PathBuf {
        let mut name = format!("{kind}_{}", sanitize_dir_component(label));
        if name.len() > 96 {
            name.truncate(96);
        }
        self.downloads_dir().join(name)
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.config_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        std::fs::create_dir_all(self.downloads_dir())?;
        Ok(())
    }

    pub fn default_base_dir() -> Option<PathBuf> {
        if let Ok(dir) = std::env::var("PINGRAB_HOME") {
            if !dir.trim().is_empty() {
                return Some(PathBuf::from(dir));
            }
        }
        let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"))?;
        Some(Path::new(&home).join(".pingrab"))
    }
}

fn sanitize_dir_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.trim().chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_').to_string();
    if trimmed.is_empty() {
        "media".to_string()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_dir_for_sanitizes_label() {
        let paths = GrabPaths::new(PathBuf::from("/tmp/base"));
        let dir = paths.download_dir_for("board", "/someone/Recipes & More/");
        assert_eq!(
            dir,
            PathBuf::from("/tmp/base/downloads/board_someone_recipes___more")
        );
    }

    #[test]
    fn ensure_dirs_creates_layout() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = GrabPaths::new(tmp.path().to_path_buf());
        paths.ensure_dirs().expect("ensure");
        assert!(paths.config_dir().is_dir());
        assert!(paths.logs_dir().is_dir());
        assert!(paths.downloads_dir().is_dir());
    }
}
