//! Persists a [`HarvestReport`] to disk.
//!
//! Layout: `<output_dir>/<channel name>/<file id>_<file name>`, every path
//! component sanitised so Slack names cannot escape the output directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, error, info};

use crate::error::{HarvestError, Result};
use crate::harvest::{HarvestReport, HarvestedFile};

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex is valid"))
}

/// Reduce an arbitrary Slack name to a single safe path component.
pub fn sanitize_component(raw: &str) -> String {
    let replaced = unsafe_chars().replace_all(raw, "_");
    let trimmed = replaced.trim_matches(|c| c == '_' || c == '.');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Relative path of a harvested file below the output directory.
pub fn relative_path(file: &HarvestedFile) -> PathBuf {
    let label = file
        .file
        .name
        .as_deref()
        .or(file.file.title.as_deref())
        .unwrap_or("file");
    let file_name = format!(
        "{}_{}",
        sanitize_component(&file.file.id),
        sanitize_component(label)
    );
    Path::new(&sanitize_component(&file.channel_name)).join(file_name)
}

/// Write every harvested file below `output_dir`, returning the written
/// paths in report order. Existing files are overwritten.
///
/// Files are first written to a staging directory next to `output_dir` and
/// only moved into place once every write succeeded, so a failed call leaves
/// no harvested file behind.
pub fn write_report(output_dir: &Path, report: &HarvestReport) -> Result<Vec<PathBuf>> {
    let parent = match output_dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| {
        error!(error = ?e, path = %parent.display(), "Failed to create output parent directory");
        HarvestError::io(parent, e)
    })?;

    // Removed on drop, whichever way this function returns.
    let staging = tempfile::Builder::new()
        .prefix(".harvest-staging-")
        .tempdir_in(parent)
        .map_err(|e| {
            error!(error = ?e, path = %parent.display(), "Failed to create staging directory");
            HarvestError::io(parent, e)
        })?;

    let relative: Vec<PathBuf> = report.files.iter().map(relative_path).collect();
    for (rel, harvested) in relative.iter().zip(&report.files) {
        let staged = staging.path().join(rel);
        if let Some(dir) = staged.parent() {
            fs::create_dir_all(dir).map_err(|e| HarvestError::io(dir, e))?;
        }
        fs::write(&staged, &harvested.content).map_err(|e| {
            error!(error = ?e, path = %staged.display(), "Failed to stage harvested file");
            HarvestError::io(&staged, e)
        })?;
        debug!(path = %staged.display(), bytes = harvested.content.len(), "Staged harvested file");
    }

    let written: Vec<PathBuf> = relative.iter().map(|rel| output_dir.join(rel)).collect();

    if !output_dir.exists() {
        fs::rename(staging.path(), output_dir).map_err(|e| {
            error!(
                error = ?e,
                path = %output_dir.display(),
                "Failed to move staging directory into place"
            );
            HarvestError::io(output_dir, e)
        })?;
    } else {
        check_targets(output_dir, &written)?;
        for (rel, target) in relative.iter().zip(&written) {
            if let Some(dir) = target.parent() {
                fs::create_dir_all(dir).map_err(|e| HarvestError::io(dir, e))?;
            }
            fs::rename(staging.path().join(rel), target).map_err(|e| {
                error!(error = ?e, path = %target.display(), "Failed to move harvested file");
                HarvestError::io(target, e)
            })?;
        }
    }

    info!(
        output_dir = %output_dir.display(),
        files = written.len(),
        "Harvest written to disk"
    );
    Ok(written)
}

/// Every target, and the channel directory holding it, must be free to take
/// a regular file before anything is moved into `output_dir`.
fn check_targets(output_dir: &Path, targets: &[PathBuf]) -> Result<()> {
    for target in targets {
        let blocked = if target.is_dir() {
            Some(target.as_path())
        } else {
            target
                .parent()
                .filter(|dir| *dir != output_dir && dir.exists() && !dir.is_dir())
        };
        if let Some(path) = blocked {
            error!(path = %path.display(), "Harvest target is occupied");
            return Err(HarvestError::io(
                path,
                std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "path is occupied by an entry of the wrong type",
                ),
            ));
        }
    }
    Ok(())
}
