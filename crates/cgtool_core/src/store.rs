use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::group::ConversionGroup;
use crate::merge::MergedArtifact;

/// File name for one stored group: the last segment of its source title,
/// falling back to the group name for titles without one.
pub fn group_file_name(group: &ConversionGroup) -> String {
    let stem = group
        .path
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or(group.name.as_str());
    format!("{stem}.json")
}

/// Writes one group as an indented JSON object (keys `name`, `description`,
/// `path`, `rules`), non-ASCII left unescaped.
pub fn write_group(dir: &Path, group: &ConversionGroup) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(group_file_name(group));
    let payload = serde_json::to_string_pretty(group)
        .with_context(|| format!("failed to serialize group {}", group.name))?;
    fs::write(&path, payload).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Loads every `*.json` group file in a directory, sorted by file name for a
/// deterministic merge input order. An empty or missing directory is fatal:
/// there is nothing to merge.
pub fn load_groups(dir: &Path) -> Result<Vec<ConversionGroup>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read groups directory {}", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut groups = Vec::new();
    for path in paths {
        let payload = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let group: ConversionGroup = serde_json::from_str(&payload)
            .with_context(|| format!("malformed group file {}", path.display()))?;
        groups.push(group);
    }

    if groups.is_empty() {
        bail!("no group files found in {}", dir.display());
    }
    Ok(groups)
}

/// Writes the merged artifact: `{"timestamp": <f64>, "data": {...}}`,
/// indented, non-ASCII unescaped.
pub fn write_artifact(path: &Path, artifact: &MergedArtifact) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let payload =
        serde_json::to_string_pretty(artifact).context("failed to serialize merged artifact")?;
    fs::write(path, payload).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
