//! Staging → training record rendering.
//!
//! Two target layouts are supported:
//!
//! | Format | Line shape | Notes |
//! |--------|------------|-------|
//! | `chat` | `{"messages": [...]}` | MLX / llama chat format, optional system prompt |
//! | `instruct` | `{"text": "<s>[INST] ... [/INST] ... </s>"}` | one line per user/assistant pair |

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::{Role, StagedChat, TextRecord, Turn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingFormat {
    #[default]
    #[serde(alias = "llama", alias = "mlx")]
    Chat,
    #[serde(alias = "mistral")]
    Instruct,
}

impl FromStr for TrainingFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" | "llama" | "mlx" => Ok(TrainingFormat::Chat),
            "instruct" | "mistral" => Ok(TrainingFormat::Instruct),
            other => Err(CoreError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub format: TrainingFormat,
    /// Inserted as a leading `system` turn in chat output.
    pub system_prompt: Option<String>,
    /// Prepended to every assistant turn in chat output.
    pub assistant_prefix: Option<String>,
    /// Remove a final user turn that never got a reply.
    pub drop_trailing_user: bool,
}

/// One line of a training file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TrainingRecord {
    Chat(StagedChat),
    Text(TextRecord),
}

/// Render a staged conversation into zero or more training records.
pub fn render(staged: &StagedChat, opts: &RenderOptions) -> Vec<TrainingRecord> {
    match opts.format {
        TrainingFormat::Chat => render_chat(staged, opts).into_iter().collect(),
        TrainingFormat::Instruct => render_instruct(staged),
    }
}

fn render_chat(staged: &StagedChat, opts: &RenderOptions) -> Option<TrainingRecord> {
    let mut turns: Vec<Turn> = staged
        .messages
        .iter()
        .filter(|t| t.role != Role::System)
        .cloned()
        .collect();

    if opts.drop_trailing_user && turns.last().is_some_and(|t| t.role == Role::User) {
        turns.pop();
    }
    if !turns.iter().any(|t| t.role == Role::Assistant) {
        return None;
    }

    if let Some(prefix) = opts.assistant_prefix.as_deref().filter(|p| !p.is_empty()) {
        for turn in turns.iter_mut().filter(|t| t.role == Role::Assistant) {
            turn.content.insert_str(0, prefix);
        }
    }

    if let Some(prompt) = opts.system_prompt.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        turns.insert(0, Turn::new(Role::System, prompt));
    }

    Some(TrainingRecord::Chat(StagedChat { messages: turns }))
}

fn render_instruct(staged: &StagedChat) -> Vec<TrainingRecord> {
    let turns: Vec<&Turn> = staged
        .messages
        .iter()
        .filter(|t| t.role != Role::System)
        .collect();

    turns
        .chunks_exact(2)
        .filter(|pair| pair[0].role == Role::User && pair[1].role == Role::Assistant)
        .map(|pair| {
            TrainingRecord::Text(TextRecord {
                text: format!(
                    "<s>[INST] {} [/INST] {} </s>",
                    pair[0].content, pair[1].content
                ),
            })
        })
        .collect()
}
