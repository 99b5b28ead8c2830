//! Time-gap grouping and role-alternation merge.
//!
//! Turns a flat list of timestamped chat messages into [`ChatBlock`]s, each a
//! clean alternation of user and assistant turns suitable for supervised
//! fine-tuning.
//!
//! # Algorithm
//!
//! 1. Sort messages by timestamp (stable).
//! 2. A group opens only on a user message; assistant-first messages are
//!    skipped while no group is open.
//! 3. A message more than `time_threshold` after the group's last message
//!    closes the group. The closed group is kept only if it contains both a
//!    user and an assistant message.
//! 4. Within a group, a run of consecutive user messages is capped at
//!    `consecutive_user_limit`; the oldest message of the run is dropped to
//!    make room.
//! 5. On close, consecutive same-role messages are merged into one turn,
//!    joined with `". "`, optionally prefixing sender names.
//!
//! # Example
//!
//! ```rust
//! use chatprep_core::group::{group_messages, GroupingConfig};
//! use chatprep_core::models::{ChatMessage, Role};
//! use chrono::{TimeZone, Utc};
//!
//! let t0 = Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap();
//! let msgs = vec![
//!     ChatMessage::new(Role::User, "Ada", "hi", t0),
//!     ChatMessage::new(Role::Assistant, "Me", "hello", t0 + chrono::Duration::minutes(1)),
//! ];
//! let report = group_messages(msgs, &GroupingConfig::default());
//! assert_eq!(report.blocks.len(), 1);
//! assert_eq!(report.blocks[0].turns.len(), 2);
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::error::CoreError;
use crate::models::{ChatBlock, ChatMessage, Role, Turn};

/// Joins merged same-role segments.
pub const SEGMENT_SEPARATOR: &str = ". ";

/// When to write `"{name} said: "` in front of user segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamePrefix {
    Off,
    /// Only for multi-party groups (more than two distinct members).
    #[default]
    Auto,
    Always,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupingConfig {
    /// Messages further apart than this are considered unrelated.
    pub time_threshold: Duration,
    /// Maximum consecutive user messages retained before a reply.
    pub consecutive_user_limit: usize,
    pub name_prefix: NamePrefix,
    /// Accept only groups with exactly two distinct participants.
    pub direct_messages_only: bool,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            time_threshold: Duration::hours(2),
            consecutive_user_limit: 20,
            name_prefix: NamePrefix::Auto,
            direct_messages_only: false,
        }
    }
}

impl GroupingConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.consecutive_user_limit == 0 {
            return Err(CoreError::ZeroUserLimit);
        }
        if self.time_threshold < Duration::zero() {
            return Err(CoreError::NegativeThreshold);
        }
        Ok(())
    }
}

/// An open group of raw messages, not yet merged.
#[derive(Debug, Default)]
pub struct MessageGroup {
    messages: Vec<ChatMessage>,
    members: BTreeSet<String>,
    /// Length of the trailing run of user messages.
    user_run: usize,
    user_limit: usize,
}

impl MessageGroup {
    pub fn new(user_limit: usize) -> Self {
        Self {
            user_limit: user_limit.max(1),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.messages.last().map(|m| m.timestamp)
    }

    pub fn has_both_roles(&self) -> bool {
        let mut user = false;
        let mut assistant = false;
        for msg in &self.messages {
            match msg.role {
                Role::User => user = true,
                Role::Assistant => assistant = true,
                Role::System => {}
            }
        }
        user && assistant
    }

    /// Append a message, enforcing the consecutive-user cap.
    pub fn push(&mut self, msg: ChatMessage) {
        if msg.role == Role::User {
            if self.user_run >= self.user_limit {
                // The run occupies the tail; its oldest entry follows an
                // assistant message or opens the group.
                let oldest = self.messages.len() - self.user_run;
                self.messages.remove(oldest);
                self.user_run -= 1;
            }
            self.user_run += 1;
        } else {
            self.user_run = 0;
        }
        self.members.insert(msg.name.clone());
        self.messages.push(msg);
    }

    /// Close the group, returning a merged block if it is accepted.
    ///
    /// The group is empty afterwards regardless of the outcome.
    pub fn close(&mut self, config: &GroupingConfig) -> Option<ChatBlock> {
        let accepted = self.has_both_roles()
            && (!config.direct_messages_only || self.members.len() == 2);

        let messages = std::mem::take(&mut self.messages);
        let members = std::mem::take(&mut self.members);
        self.user_run = 0;

        if !accepted {
            return None;
        }

        let prefix_names = match config.name_prefix {
            NamePrefix::Off => false,
            NamePrefix::Auto => members.len() > 2,
            NamePrefix::Always => true,
        };

        Some(ChatBlock {
            turns: merge_turns(&messages, prefix_names),
            source_messages: messages.len(),
            members,
        })
    }
}

/// Collapse consecutive same-role messages into alternating turns.
pub fn merge_turns(messages: &[ChatMessage], prefix_names: bool) -> Vec<Turn> {
    let mut turns: Vec<Turn> = Vec::new();
    let mut last_sender: Option<&str> = None;

    for msg in messages {
        let continues = turns.last().is_some_and(|t| t.role == msg.role);
        let prefix = prefix_names && msg.role == Role::User;

        if continues {
            if let Some(turn) = turns.last_mut() {
                turn.content.push_str(SEGMENT_SEPARATOR);
                if prefix && last_sender != Some(msg.name.as_str()) {
                    push_said(&mut turn.content, &msg.name);
                }
                turn.content.push_str(&msg.content);
            }
        } else {
            let mut content = String::with_capacity(msg.content.len());
            if prefix {
                push_said(&mut content, &msg.name);
            }
            content.push_str(&msg.content);
            turns.push(Turn::new(msg.role, content));
        }

        last_sender = Some(msg.name.as_str());
    }

    turns
}

fn push_said(buf: &mut String, name: &str) {
    buf.push_str(name);
    buf.push_str(" said: ");
}

/// Result of grouping one conversation.
#[derive(Debug, Default)]
pub struct GroupingReport {
    pub blocks: Vec<ChatBlock>,
    /// Groups closed without being accepted.
    pub discarded: usize,
    /// Assistant messages skipped because no group was open.
    pub skipped_openers: usize,
}

/// Streaming driver: feed messages in timestamp order, then [`finish`](Grouper::finish).
pub struct Grouper<'a> {
    config: &'a GroupingConfig,
    group: MessageGroup,
    report: GroupingReport,
}

impl<'a> Grouper<'a> {
    pub fn new(config: &'a GroupingConfig) -> Self {
        Self {
            config,
            group: MessageGroup::new(config.consecutive_user_limit),
            report: GroupingReport::default(),
        }
    }

    pub fn push(&mut self, msg: ChatMessage) {
        if let Some(last) = self.group.last_timestamp() {
            if msg.timestamp - last <= self.config.time_threshold {
                self.group.push(msg);
                return;
            }
            self.close_group();
        }
        self.open_with(msg);
    }

    pub fn finish(mut self) -> GroupingReport {
        if !self.group.is_empty() {
            self.close_group();
        }
        self.report
    }

    fn open_with(&mut self, msg: ChatMessage) {
        if msg.role == Role::User {
            self.group.push(msg);
        } else {
            self.report.skipped_openers += 1;
        }
    }

    fn close_group(&mut self) {
        match self.group.close(self.config) {
            Some(block) => self.report.blocks.push(block),
            None => self.report.discarded += 1,
        }
    }
}

/// Sort `messages` by timestamp and group them into accepted blocks.
pub fn group_messages(mut messages: Vec<ChatMessage>, config: &GroupingConfig) -> GroupingReport {
    messages.sort_by_key(|m| m.timestamp);
    let mut grouper = Grouper::new(config);
    for msg in messages {
        grouper.push(msg);
    }
    grouper.finish()
}
