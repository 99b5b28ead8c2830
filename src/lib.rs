//! # chatprep
//!
//! A data-preparation pipeline for fine-tuning a language model on one
//! person's chat history and journal entries.
//!
//! chatprep takes chat exports that upstream parsers have already normalized
//! to a common JSON message format, groups them into conversation blocks
//! that alternate cleanly between user and assistant, and writes
//! train/validation JSONL files ready for fine-tuning.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ 1-normalized │──▶│   Loader    │──▶│ Group+Merge  │──▶│  2-staging  │
//! │ chat / text  │   │ walk + json │   │ (core crate) │   │ train/valid │
//! └──────────────┘   └─────────────┘   └──────────────┘   └──────┬──────┘
//!                                                                │ render
//!                                                                ▼
//!                                                         ┌─────────────┐
//!                                                         │ 3-training  │
//!                                                         └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! chatprep init                 # create the data tree
//! chatprep stage chat           # normalized chat → staging blocks
//! chatprep stage text           # journal lines → staging records
//! chatprep train                # staging → training format
//! chatprep stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`loader`] | Input discovery and parsing |
//! | [`stage`] | Grouping and train/valid staging |
//! | [`train`] | Training format rendering |
//! | [`stats`] | Staging summaries |
//! | [`scaffold`] | Data directory layout |
//! | [`progress`] | Stderr progress reporting |

pub mod config;
pub mod loader;
pub mod progress;
pub mod scaffold;
pub mod stage;
pub mod stats;
pub mod train;
