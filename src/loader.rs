//! Load corpus documents from files and directories.
//!
//! Each `--docs` argument is either a file, loaded as-is, or a directory,
//! walked with the `[loader]` include/exclude globs. The result is sorted by
//! path so that `doc_N` sources are stable across runs.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use ragloop_core::Metadata;

use crate::config::LoaderConfig;

/// A loaded document body and its metadata (`path`, `title`).
pub type LoadedDocument = (String, Metadata);

pub fn load_documents(paths: &[PathBuf], config: &LoaderConfig) -> Result<Vec<LoadedDocument>> {
    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files: Vec<PathBuf> = Vec::new();
    for root in paths {
        if !root.exists() {
            bail!("Document path does not exist: {}", root.display());
        }
        if root.is_file() {
            files.push(root.clone());
            continue;
        }

        let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            // Apply exclude patterns
            if exclude_set.is_match(&rel_str) {
                continue;
            }

            // Apply include patterns
            if !include_set.is_match(&rel_str) {
                continue;
            }

            files.push(path.to_path_buf());
        }
    }

    // Sort for deterministic ordering
    files.sort();
    files.dedup();

    let mut documents = Vec::with_capacity(files.len());
    for path in &files {
        match read_document(path) {
            Ok(doc) => documents.push(doc),
            Err(e) if !paths.contains(path) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file");
            }
            Err(e) => return Err(e),
        }
    }

    debug!(files = documents.len(), "loaded documents");
    Ok(documents)
}

fn read_document(path: &Path) -> Result<LoadedDocument> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document: {}", path.display()))?;

    let title = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut metadata = Metadata::new();
    metadata.insert("path".to_string(), path.display().to_string());
    metadata.insert("title".to_string(), title);
    Ok((body, metadata))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
