//! Staging statistics.
//!
//! Provides a quick summary of what a staging run produced: block and turn
//! counts per file and how the text volume divides between user and
//! assistant. Used by `chatprep stats` to sanity-check a dataset before
//! training.

use anyhow::Result;
use chatprep_core::models::{Role, StagedChat};
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::config::Config;

/// Per-file breakdown for a chat staging file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileStats {
    pub file: String,
    pub blocks: usize,
    pub turns: usize,
    pub user_chars: usize,
    pub assistant_chars: usize,
    pub malformed: usize,
}

impl FileStats {
    pub fn avg_turns(&self) -> f64 {
        if self.blocks == 0 {
            0.0
        } else {
            self.turns as f64 / self.blocks as f64
        }
    }
}

pub fn chat_file_stats(path: &Path) -> Result<FileStats> {
    let body = fs::read_to_string(path)?;
    let mut stats = FileStats {
        file: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        ..FileStats::default()
    };

    for line in body.lines().filter(|l| !l.trim().is_empty()) {
        let staged: StagedChat = match serde_json::from_str(line) {
            Ok(s) => s,
            Err(_) => {
                stats.malformed += 1;
                continue;
            }
        };
        stats.blocks += 1;
        stats.turns += staged.messages.len();
        for turn in &staged.messages {
            let chars = turn.content.chars().count();
            match turn.role {
                Role::User => stats.user_chars += chars,
                Role::Assistant => stats.assistant_chars += chars,
                Role::System => {}
            }
        }
    }
    Ok(stats)
}

fn jsonl_files(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}

/// Run the stats command: scan staging output and print a summary.
pub fn run_stats(config: &Config) -> Result<()> {
    let chat_dir = config.paths.staging_chat();
    let text_dir = config.paths.staging_text();

    println!("chatprep — Staging Stats");
    println!("========================");
    println!();
    println!("  Root:        {}", config.paths.root.display());
    println!();

    let chat_files = jsonl_files(&chat_dir);
    if chat_files.is_empty() {
        println!("  Chat:        no staging files in {}", chat_dir.display());
    } else {
        println!("  Chat:");
        println!(
            "  {:<16} {:>8} {:>8} {:>9} {:>12} {:>12}",
            "FILE", "BLOCKS", "TURNS", "AVG", "USER CHARS", "ASST CHARS"
        );
        println!("  {}", "-".repeat(70));
        for path in &chat_files {
            let s = match chat_file_stats(path) {
                Ok(s) => s,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "could not read staging file");
                    continue;
                }
            };
            println!(
                "  {:<16} {:>8} {:>8} {:>9.1} {:>12} {:>12}",
                s.file,
                s.blocks,
                s.turns,
                s.avg_turns(),
                s.user_chars,
                s.assistant_chars
            );
            if s.malformed > 0 {
                println!("  {:<16} {} malformed line(s)", "", s.malformed);
            }
        }
    }

    println!();
    let text_files = jsonl_files(&text_dir);
    if text_files.is_empty() {
        println!("  Text:        no staging files in {}", text_dir.display());
    } else {
        println!("  Text:");
        for path in &text_files {
            let lines = fs::read_to_string(path)
                .map(|b| b.lines().filter(|l| !l.trim().is_empty()).count())
                .unwrap_or(0);
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            println!("  {:<16} {:>8} records", name, lines);
        }
    }
    println!();

    Ok(())
}
