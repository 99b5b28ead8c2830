//! Staging pipeline orchestration.
//!
//! `stage chat` loads normalized chat files, groups each file into
//! conversation blocks, and writes `train.jsonl` / `valid.jsonl` into the
//! staging chat directory. `stage text` does the same for journal lines.
//! Existing staging output is truncated on every run.

use anyhow::{Context, Result};
use chatprep_core::group::group_messages;
use chatprep_core::models::{StagedChat, TextRecord};
use chatprep_core::split::{EverySplit, Split};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::Config;
use crate::loader;
use crate::progress::{ProgressEvent, ProgressReporter};

pub const TRAIN_FILE: &str = "train.jsonl";
pub const VALID_FILE: &str = "valid.jsonl";

/// Counts reported at the end of a staging run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StageSummary {
    pub files: usize,
    pub skipped_files: usize,
    pub records_in: usize,
    pub blocks: usize,
    pub discarded_groups: usize,
    pub train: usize,
    pub valid: usize,
}

/// Writes JSON lines into a train/valid pair, or only counts in dry-run mode.
pub struct SplitWriter {
    split: EverySplit,
    sinks: Option<(BufWriter<File>, BufWriter<File>)>,
    train: usize,
    valid: usize,
}

impl SplitWriter {
    pub fn create(dir: &Path, valid_every: usize) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
        let train = File::create(dir.join(TRAIN_FILE))?;
        let valid = File::create(dir.join(VALID_FILE))?;
        Ok(Self {
            split: EverySplit::new(valid_every),
            sinks: Some((BufWriter::new(train), BufWriter::new(valid))),
            train: 0,
            valid: 0,
        })
    }

    pub fn counting(valid_every: usize) -> Self {
        Self {
            split: EverySplit::new(valid_every),
            sinks: None,
            train: 0,
            valid: 0,
        }
    }

    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<Split> {
        let split = self.split.next_split();
        if let Some((train, valid)) = self.sinks.as_mut() {
            let sink = match split {
                Split::Train => train,
                Split::Valid => valid,
            };
            serde_json::to_writer(&mut *sink, record)?;
            writeln!(sink)?;
        }
        match split {
            Split::Train => self.train += 1,
            Split::Valid => self.valid += 1,
        }
        Ok(split)
    }

    /// Flush both files and return `(train, valid)` line counts.
    pub fn finish(self) -> Result<(usize, usize)> {
        if let Some((mut train, mut valid)) = self.sinks {
            train.flush()?;
            valid.flush()?;
        }
        Ok((self.train, self.valid))
    }
}

pub fn stage_chat(
    config: &Config,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    dry_run: bool,
    progress: &dyn ProgressReporter,
) -> Result<StageSummary> {
    let input = input.unwrap_or_else(|| config.paths.normalized_chat());
    let output = output.unwrap_or_else(|| config.paths.staging_chat());
    let grouping = config.grouping.to_core()?;

    progress.report(ProgressEvent::Discovering {
        stage: "chat".to_string(),
    });
    let loaded = loader::scan_chat_dir(&input, &config.loader)?;
    let total = loaded.files.len() as u64;

    let mut writer = if dry_run {
        SplitWriter::counting(config.staging.valid_every)
    } else {
        SplitWriter::create(&output, config.staging.valid_every)?
    };

    let mut summary = StageSummary {
        files: loaded.files.len(),
        skipped_files: loaded.skipped.len(),
        ..StageSummary::default()
    };

    for (i, file) in loaded.files.into_iter().enumerate() {
        summary.records_in += file.messages.len();
        let report = group_messages(file.messages, &grouping);
        debug!(
            file = %file.source_id,
            blocks = report.blocks.len(),
            discarded = report.discarded,
            "grouped chat file"
        );
        summary.blocks += report.blocks.len();
        summary.discarded_groups += report.discarded;

        for block in report.blocks {
            writer.write(&StagedChat::from(block))?;
        }

        progress.report(ProgressEvent::Processing {
            stage: "chat".to_string(),
            n: i as u64 + 1,
            total,
        });
    }

    let (train, valid) = writer.finish()?;
    summary.train = train;
    summary.valid = valid;
    info!(
        input = %input.display(),
        blocks = summary.blocks,
        train,
        valid,
        dry_run,
        "staged chat data"
    );
    Ok(summary)
}

pub fn stage_text(
    config: &Config,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    dry_run: bool,
    progress: &dyn ProgressReporter,
) -> Result<StageSummary> {
    let input = input.unwrap_or_else(|| config.paths.normalized_text());
    let output = output.unwrap_or_else(|| config.paths.staging_text());

    progress.report(ProgressEvent::Discovering {
        stage: "text".to_string(),
    });
    let loaded = loader::scan_text_dir(&input, &config.loader)?;
    let total = loaded.files.len() as u64;

    let mut writer = if dry_run {
        SplitWriter::counting(config.staging.valid_every)
    } else {
        SplitWriter::create(&output, config.staging.valid_every)?
    };

    let mut summary = StageSummary {
        files: loaded.files.len(),
        skipped_files: loaded.skipped.len(),
        ..StageSummary::default()
    };

    for (i, file) in loaded.files.into_iter().enumerate() {
        summary.records_in += file.lines.len();
        for text in file.lines {
            writer.write(&TextRecord { text })?;
        }
        progress.report(ProgressEvent::Processing {
            stage: "text".to_string(),
            n: i as u64 + 1,
            total,
        });
    }

    let (train, valid) = writer.finish()?;
    summary.train = train;
    summary.valid = valid;
    info!(input = %input.display(), train, valid, dry_run, "staged text data");
    Ok(summary)
}

pub fn run_stage(
    config: &Config,
    kind: &str,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    dry_run: bool,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let summary = match kind {
        "chat" => stage_chat(config, input, output, dry_run, progress)?,
        "text" => stage_text(config, input, output, dry_run, progress)?,
        other => anyhow::bail!("Unknown stage kind: '{}'. Available: chat, text", other),
    };

    if dry_run {
        println!("stage {} (dry-run)", kind);
    } else {
        println!("stage {}", kind);
    }
    println!("  files: {}", summary.files);
    if summary.skipped_files > 0 {
        println!("  skipped files: {}", summary.skipped_files);
    }
    println!("  records read: {}", summary.records_in);
    if kind == "chat" {
        println!("  blocks: {}", summary.blocks);
        println!("  discarded groups: {}", summary.discarded_groups);
    }
    println!("  train: {}", summary.train);
    println!("  valid: {}", summary.valid);
    println!("ok");
    Ok(())
}
