//! Staging → training conversion.
//!
//! Reads every `*.jsonl` file in the staging chat directory and writes a
//! same-named file into the training directory, rendering each staged
//! conversation with the configured [`TrainingFormat`](chatprep_core::format::TrainingFormat).

use anyhow::{Context, Result};
use chatprep_core::format::{render, RenderOptions};
use chatprep_core::models::StagedChat;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;

/// Per-file conversion counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainFileSummary {
    pub file: String,
    pub lines_in: usize,
    pub lines_out: usize,
    pub malformed: usize,
}

/// Convert one staging file into one training file.
pub fn convert_file(input: &Path, output: &Path, opts: &RenderOptions) -> Result<TrainFileSummary> {
    let reader = BufReader::new(
        File::open(input).with_context(|| format!("Failed to open {}", input.display()))?,
    );
    let mut writer = BufWriter::new(
        File::create(output).with_context(|| format!("Failed to create {}", output.display()))?,
    );

    let mut summary = TrainFileSummary {
        file: input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        lines_in: 0,
        lines_out: 0,
        malformed: 0,
    };

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        summary.lines_in += 1;

        let staged: StagedChat = match serde_json::from_str(&line) {
            Ok(s) => s,
            Err(e) => {
                warn!(file = %summary.file, line = lineno + 1, error = %e, "skipping malformed line");
                summary.malformed += 1;
                continue;
            }
        };

        for record in render(&staged, opts) {
            serde_json::to_writer(&mut writer, &record)?;
            writeln!(writer)?;
            summary.lines_out += 1;
        }
    }

    writer.flush()?;
    Ok(summary)
}

pub fn convert_dir(input: &Path, output: &Path, opts: &RenderOptions) -> Result<Vec<TrainFileSummary>> {
    if !input.is_dir() {
        anyhow::bail!("Staging directory does not exist: {}", input.display());
    }
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory: {}", output.display()))?;
    if fs::canonicalize(input)? == fs::canonicalize(output)? {
        anyhow::bail!(
            "Training output would overwrite staging input: {}",
            output.display()
        );
    }

    let mut inputs: Vec<PathBuf> = fs::read_dir(input)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "jsonl"))
        .collect();
    inputs.sort();

    let mut summaries = Vec::with_capacity(inputs.len());
    for path in inputs {
        let Some(name) = path.file_name() else {
            continue;
        };
        let summary = convert_file(&path, &output.join(name), opts)?;
        info!(
            file = %summary.file,
            lines_in = summary.lines_in,
            lines_out = summary.lines_out,
            "converted staging file"
        );
        summaries.push(summary);
    }
    Ok(summaries)
}

pub fn run_train(config: &Config, input: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
    let input = input.unwrap_or_else(|| config.paths.staging_chat());
    let output = output.unwrap_or_else(|| config.paths.training());
    let opts = config.training.render_options();

    let summaries = convert_dir(&input, &output, &opts)?;

    println!("train ({:?})", opts.format);
    println!("  {:<24} {:>8} {:>8} {:>10}", "FILE", "IN", "OUT", "MALFORMED");
    for s in &summaries {
        println!(
            "  {:<24} {:>8} {:>8} {:>10}",
            s.file, s.lines_in, s.lines_out, s.malformed
        );
    }
    println!("  output: {}", output.display());
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatprep_core::format::TrainingFormat;
    use tempfile::TempDir;

    const STAGED: &str = concat!(
        r#"{"messages":[{"role":"user","content":"hi"},{"role":"assistant","content":"hey"}]}"#,
        "\n",
        "not json\n",
        "\n",
        r#"{"messages":[{"role":"user","content":"q"},{"role":"assistant","content":"a"},{"role":"user","content":"left hanging"}]}"#,
        "\n",
    );

    #[test]
    fn converts_chat_format_with_system_prompt() {
        let tmp = TempDir::new().unwrap();
        let staging = tmp.path().join("staging");
        let training = tmp.path().join("training");
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("train.jsonl"), STAGED).unwrap();
        fs::write(staging.join("ignored.txt"), "x").unwrap();

        let opts = RenderOptions {
            system_prompt: Some("You are Ada.".to_string()),
            drop_trailing_user: true,
            ..RenderOptions::default()
        };
        let summaries = convert_dir(&staging, &training, &opts).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].lines_in, 3);
        assert_eq!(summaries[0].lines_out, 2);
        assert_eq!(summaries[0].malformed, 1);

        let out = fs::read_to_string(training.join("train.jsonl")).unwrap();
        let second: StagedChat = serde_json::from_str(out.lines().nth(1).unwrap()).unwrap();
        assert_eq!(second.messages.len(), 3);
        assert_eq!(second.messages[0].content, "You are Ada.");
        assert_eq!(second.messages[2].content, "a");
    }

    #[test]
    fn converts_instruct_format() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("valid.jsonl");
        let output = tmp.path().join("out.jsonl");
        fs::write(&input, STAGED).unwrap();

        let opts = RenderOptions {
            format: TrainingFormat::Instruct,
            ..RenderOptions::default()
        };
        let summary = convert_file(&input, &output, &opts).unwrap();
        assert_eq!(summary.lines_out, 2);
        let out = fs::read_to_string(&output).unwrap();
        assert!(out.contains(r#"{"text":"<s>[INST] hi [/INST] hey </s>"}"#));
    }

    #[test]
    fn missing_staging_dir_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = convert_dir(
            &tmp.path().join("nope"),
            &tmp.path().join("out"),
            &RenderOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn same_input_and_output_dir_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let staging = tmp.path().join("staging");
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join("train.jsonl"), STAGED).unwrap();

        let err = convert_dir(&staging, &staging.join("."), &RenderOptions::default()).unwrap_err();
        assert!(err.to_string().contains("overwrite"));
        assert_eq!(fs::read_to_string(staging.join("train.jsonl")).unwrap(), STAGED);
    }
}
