//! Discovery and parsing of normalized input files.
//!
//! Chat input is a directory tree of JSON files, each an array of
//! `{role, content, name, timestamp}` records as written by the export
//! parsers. Journal input is any text file; every non-empty line is one
//! record. Files are visited in relative-path order so output is stable.

use anyhow::{bail, Context, Result};
use chatprep_core::models::ChatMessage;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::LoaderConfig;

/// A parsed chat export for one conversation.
#[derive(Debug, Clone)]
pub struct ChatFile {
    /// Path relative to the scanned root.
    pub source_id: String,
    pub messages: Vec<ChatMessage>,
}

/// A journal file split into records.
#[derive(Debug, Clone)]
pub struct TextFile {
    pub source_id: String,
    pub lines: Vec<String>,
}

/// Files that matched the globs but could not be read.
#[derive(Debug, Clone)]
pub struct Skipped {
    pub source_id: String,
    pub reason: String,
}

#[derive(Debug)]
pub struct Loaded<T> {
    pub files: Vec<T>,
    pub skipped: Vec<Skipped>,
}

impl<T> Default for Loaded<T> {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

pub fn scan_chat_dir(root: &Path, loader: &LoaderConfig) -> Result<Loaded<ChatFile>> {
    let mut loaded = Loaded::default();
    for (path, source_id) in discover(root, &loader.include_globs, loader)? {
        match read_chat_file(&path) {
            Ok(messages) => {
                debug!(file = %source_id, messages = messages.len(), "loaded chat file");
                loaded.files.push(ChatFile {
                    source_id,
                    messages,
                });
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                warn!(file = %source_id, error = %reason, "skipping chat file");
                loaded.skipped.push(Skipped { source_id, reason });
            }
        }
    }
    Ok(loaded)
}

pub fn scan_text_dir(root: &Path, loader: &LoaderConfig) -> Result<Loaded<TextFile>> {
    let mut loaded = Loaded::default();
    for (path, source_id) in discover(root, &loader.text_globs, loader)? {
        match std::fs::read_to_string(&path) {
            Ok(body) => loaded.files.push(TextFile {
                lines: journal_lines(&body),
                source_id,
            }),
            Err(e) => {
                warn!(file = %source_id, error = %e, "skipping text file");
                loaded.skipped.push(Skipped {
                    source_id,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(loaded)
}

pub fn read_chat_file(path: &Path) -> Result<Vec<ChatMessage>> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let messages: Vec<ChatMessage> =
        serde_json::from_str(&body).with_context(|| "Expected a JSON array of messages")?;
    for (i, msg) in messages.iter().enumerate() {
        msg.check_normalized()
            .with_context(|| format!("message {}", i))?;
    }
    Ok(messages)
}

/// Non-empty, trimmed lines of a journal file.
pub fn journal_lines(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn discover(
    root: &Path,
    include_globs: &[String],
    loader: &LoaderConfig,
) -> Result<Vec<(PathBuf, String)>> {
    if !root.exists() {
        bail!("Input directory does not exist: {}", root.display());
    }

    let include_set = build_globset(include_globs)?;
    let mut excludes = vec!["**/.*".to_string()];
    excludes.extend(loader.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut found = Vec::new();
    for entry in WalkDir::new(root).follow_links(loader.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        found.push((path.to_path_buf(), rel_str));
    }

    found.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(found)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
