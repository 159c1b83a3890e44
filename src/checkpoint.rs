// 📸 Roster checkpoints - snapshot the roster before applying a change batch
//
// <stem>_<label|checkpoint>_<YYYYmmdd_HHMMSS><ext>  + sibling .json metadata

use crate::error::{OverlapError, Result};
use crate::report::sha256_hex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub checkpoint_name: String,
    pub original_file: String,
    pub created_at: DateTime<Utc>,
    pub label: Option<String>,
    pub file_size: u64,
    pub sha256: String,
}

pub fn create_checkpoint(
    roster_file: &Path,
    checkpoint_dir: &Path,
    label: Option<&str>,
) -> Result<CheckpointMetadata> {
    let bytes = std::fs::read(roster_file)?;
    std::fs::create_dir_all(checkpoint_dir)?;

    let created_at = Utc::now();
    let stem = roster_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "roster".to_string());
    let ext = roster_file
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let base = format!(
        "{}_{}_{}",
        stem,
        label.unwrap_or("checkpoint"),
        created_at.format("%Y%m%d_%H%M%S")
    );
    let checkpoint_name = format!("{}{}", base, ext);

    std::fs::write(checkpoint_dir.join(&checkpoint_name), &bytes)?;

    let metadata = CheckpointMetadata {
        checkpoint_name,
        original_file: roster_file.display().to_string(),
        created_at,
        label: label.map(str::to_string),
        file_size: bytes.len() as u64,
        sha256: sha256_hex(&bytes),
    };
    std::fs::write(
        checkpoint_dir.join(format!("{}.json", base)),
        serde_json::to_string_pretty(&metadata)?,
    )?;

    log::info!("created roster checkpoint {}", metadata.checkpoint_name);
    Ok(metadata)
}

/// All checkpoints in `checkpoint_dir`, newest first. Missing dir → empty.
pub fn list_checkpoints(checkpoint_dir: &Path) -> Result<Vec<CheckpointMetadata>> {
    if !checkpoint_dir.exists() {
        return Ok(Vec::new());
    }

    let mut checkpoints = Vec::new();
    for entry in std::fs::read_dir(checkpoint_dir)? {
        let path = entry?.path();
        if path.extension().map_or(false, |e| e == "json") {
            let text = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<CheckpointMetadata>(&text) {
                Ok(metadata) => checkpoints.push(metadata),
                Err(e) => log::warn!("skipping unreadable checkpoint metadata {}: {}", path.display(), e),
            }
        }
    }

    checkpoints.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.checkpoint_name.cmp(&a.checkpoint_name))
    });
    Ok(checkpoints)
}

/// Copy a checkpoint back out. `name` is a path or a substring of a
/// checkpoint file name; the newest match wins.
pub fn restore_checkpoint(name: &str, checkpoint_dir: &Path, output: &Path) -> Result<PathBuf> {
    let direct = Path::new(name);
    let source = if direct.is_file() {
        direct.to_path_buf()
    } else {
        list_checkpoints(checkpoint_dir)?
            .into_iter()
            .find(|cp| cp.checkpoint_name.contains(name))
            .map(|cp| checkpoint_dir.join(cp.checkpoint_name))
            .filter(|p| p.is_file())
            .ok_or_else(|| OverlapError::CheckpointNotFound(name.to_string()))?
    };

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::copy(&source, output)?;

    log::info!("restored {} to {}", source.display(), output.display());
    Ok(source)
}
