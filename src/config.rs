//! TOML configuration.
//!
//! Every section is optional; a missing file section falls back to the
//! defaults below, which match `config/chatprep.example.toml`.

use anyhow::{bail, Context, Result};
use chatprep_core::format::{RenderOptions, TrainingFormat};
use chatprep_core::group::{GroupingConfig, NamePrefix};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub grouping: GroupingSection,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub training: TrainingConfig,
}

/// Layout of the data directory tree rooted at `root`.
#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("./data")
}

impl PathsConfig {
    pub fn normalized_chat(&self) -> PathBuf {
        self.root.join("1-normalized").join("chat")
    }

    pub fn normalized_text(&self) -> PathBuf {
        self.root.join("1-normalized").join("text")
    }

    pub fn staging_chat(&self) -> PathBuf {
        self.root.join("2-staging").join("chat")
    }

    pub fn staging_text(&self) -> PathBuf {
        self.root.join("2-staging").join("text")
    }

    pub fn training(&self) -> PathBuf {
        self.root.join("3-training")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GroupingSection {
    #[serde(default = "default_time_threshold_minutes")]
    pub time_threshold_minutes: i64,
    #[serde(default = "default_consecutive_user_limit")]
    pub consecutive_user_limit: usize,
    #[serde(default)]
    pub name_prefix: NamePrefix,
    #[serde(default)]
    pub direct_messages_only: bool,
}

impl Default for GroupingSection {
    fn default() -> Self {
        Self {
            time_threshold_minutes: default_time_threshold_minutes(),
            consecutive_user_limit: default_consecutive_user_limit(),
            name_prefix: NamePrefix::default(),
            direct_messages_only: false,
        }
    }
}

fn default_time_threshold_minutes() -> i64 {
    120
}
fn default_consecutive_user_limit() -> usize {
    20
}

impl GroupingSection {
    pub fn to_core(&self) -> Result<GroupingConfig> {
        let Some(time_threshold) = chrono::Duration::try_minutes(self.time_threshold_minutes)
        else {
            bail!(
                "grouping.time_threshold_minutes out of range: {}",
                self.time_threshold_minutes
            );
        };
        Ok(GroupingConfig {
            time_threshold,
            consecutive_user_limit: self.consecutive_user_limit,
            name_prefix: self.name_prefix,
            direct_messages_only: self.direct_messages_only,
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StagingConfig {
    /// Every n-th record goes to `valid.jsonl`; 0 disables validation output.
    #[serde(default = "default_valid_every")]
    pub valid_every: usize,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            valid_every: default_valid_every(),
        }
    }
}

fn default_valid_every() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoaderConfig {
    #[serde(default = "default_chat_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_text_globs")]
    pub text_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            include_globs: default_chat_globs(),
            exclude_globs: Vec::new(),
            text_globs: default_text_globs(),
            follow_symlinks: false,
        }
    }
}

fn default_chat_globs() -> Vec<String> {
    vec!["**/*.json".to_string()]
}

fn default_text_globs() -> Vec<String> {
    vec!["**/*".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrainingConfig {
    #[serde(default)]
    pub format: TrainingFormat,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub assistant_prefix: Option<String>,
    #[serde(default = "default_drop_trailing_user")]
    pub drop_trailing_user: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            format: TrainingFormat::default(),
            system_prompt: None,
            assistant_prefix: None,
            drop_trailing_user: default_drop_trailing_user(),
        }
    }
}

fn default_drop_trailing_user() -> bool {
    true
}

impl TrainingConfig {
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            format: self.format,
            system_prompt: self.system_prompt.clone(),
            assistant_prefix: self.assistant_prefix.clone(),
            drop_trailing_user: self.drop_trailing_user,
        }
    }
}

impl Config {
    /// Defaults only, for commands that can run without a config file.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    config
        .grouping
        .to_core()?
        .validate()
        .context("Invalid [grouping] section")?;

    if config.loader.include_globs.is_empty() {
        bail!("loader.include_globs must not be empty");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.paths.root, PathBuf::from("./data"));
        assert_eq!(cfg.grouping.time_threshold_minutes, 120);
        assert_eq!(cfg.grouping.consecutive_user_limit, 20);
        assert_eq!(cfg.grouping.name_prefix, NamePrefix::Auto);
        assert_eq!(cfg.staging.valid_every, 10);
        assert!(cfg.training.drop_trailing_user);
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = parse_config(
            r#"
[paths]
root = "/tmp/persona"

[grouping]
time_threshold_minutes = 720
consecutive_user_limit = 5
name_prefix = "always"
direct_messages_only = true

[training]
format = "instruct"
system_prompt = "You are Ada."
"#,
        )
        .unwrap();
        assert_eq!(
            cfg.paths.staging_chat(),
            PathBuf::from("/tmp/persona/2-staging/chat")
        );
        let grouping = cfg.grouping.to_core().unwrap();
        assert_eq!(grouping.time_threshold, chrono::Duration::hours(12));
        assert_eq!(grouping.consecutive_user_limit, 5);
        assert!(grouping.direct_messages_only);
        assert_eq!(cfg.training.format, TrainingFormat::Instruct);
    }

    #[test]
    fn zero_user_limit_is_rejected() {
        let err = parse_config("[grouping]\nconsecutive_user_limit = 0\n").unwrap_err();
        assert!(format!("{:#}", err).contains("consecutive_user_limit"));
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let err = parse_config("[grouping]\ntime_threshold_minutes = 9223372036854775807\n")
            .unwrap_err();
        assert!(format!("{:#}", err).contains("out of range"));
    }

    #[test]
    fn negative_threshold_is_rejected() {
        assert!(parse_config("[grouping]\ntime_threshold_minutes = -5\n").is_err());
    }

    #[test]
    fn training_format_accepts_model_aliases() {
        let cfg = parse_config("[training]\nformat = \"mistral\"\n").unwrap();
        assert_eq!(cfg.training.format, TrainingFormat::Instruct);
        let cfg = parse_config("[training]\nformat = \"mlx\"\n").unwrap();
        assert_eq!(cfg.training.format, TrainingFormat::Chat);
    }

    #[test]
    fn unknown_name_prefix_is_rejected() {
        assert!(parse_config("[grouping]\nname_prefix = \"sometimes\"\n").is_err());
    }
}
