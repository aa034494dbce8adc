use crate::{GrabError, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveSummary {
    pub zip_path: PathBuf,
    pub entries: usize,
    pub missing: usize,
    pub file_bytes: u64,
}

// The archive is written to `<zip>.part` first, so a failure leaves either the previous
// archive or nothing at `zip_path`.
pub fn bundle_archive(paths: &[PathBuf], zip_path: &Path) -> Result<ArchiveSummary> {
    let present: Vec<&PathBuf> = paths.iter().filter(|p| p.is_file()).collect();
    let missing = paths.len() - present.len();
    if present.is_empty() {
        return Err(GrabError::Archive(format!(
            "no files to bundle ({missing} missing)"
        )));
    }

    if let Some(parent) = zip_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let temp_path = part_path(zip_path);
    let _ = std::fs::remove_file(&temp_path);

    match write_entries(&present, &temp_path) {
        Ok(entries) => {
            if zip_path.exists() {
                let _ = std::fs::remove_file(zip_path);
            }
            std::fs::rename(&temp_path, zip_path)?;
            let file_bytes = std::fs::metadata(zip_path).map(|m| m.len()).unwrap_or(0);
            Ok(ArchiveSummary {
                zip_path: zip_path.to_path_buf(),
                entries,
                missing,
                file_bytes,
            })
        }
        Err(err) => {
            let _ = std::fs::remove_file(&temp_path);
            Err(GrabError::Archive(format!(
                "failed to write {}: {err}",
                zip_path.to_string_lossy()
            )))
        }
    }
}

fn write_entries(files: &[&PathBuf], temp_path: &Path) -> std::io::Result<usize> {
    let file = std::fs::File::create(temp_path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let mut used_names: HashSet<String> = HashSet::new();
    for path in files {
        let name = unique_entry_name(path, &mut used_names);
        zip.start_file(name, options).map_err(zip_err_to_io)?;
        let mut source = std::fs::File::open(path)?;
        std::io::copy(&mut source, &mut zip)?;
    }
    let mut inner = zip.finish().map_err(zip_err_to_io)?;
    inner.flush()?;
    Ok(files.len())
}

fn unique_entry_name(path: &Path, used: &mut HashSet<String>) -> String {
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    if used.insert(base.clone()) {
        return base;
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut n = 1_usize;
    loop {
        let candidate = format!("{stem}_{n}{ext}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn part_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "archive.zip".to_string());
    path.with_file_name(format!("{name}.part"))
}

fn zip_err_to_io(err: zip::result::ZipError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, err)
}
