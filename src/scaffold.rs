//! Data directory scaffolding for `chatprep init`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Directories created under the data root, relative to it.
pub const DATA_LAYOUT: &[&str] = &[
    "0-raw/chat",
    "0-raw/email",
    "0-raw/text",
    "1-normalized/chat",
    "1-normalized/email",
    "1-normalized/text",
    "2-staging/chat",
    "2-staging/text",
    "3-training",
];

/// Create the data tree. Returns the directories that did not exist yet.
pub fn create_layout(root: &Path) -> Result<Vec<PathBuf>> {
    let mut created = Vec::new();
    for rel in DATA_LAYOUT {
        let dir = root.join(rel);
        if !dir.is_dir() {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            created.push(dir);
        }
    }
    Ok(created)
}

pub fn run_init(root: &Path) -> Result<()> {
    let created = create_layout(root)?;
    for dir in &created {
        println!("created {}", dir.display());
    }
    println!(
        "Data directory initialized at {} ({} new).",
        root.display(),
        created.len()
    );
    Ok(())
}
