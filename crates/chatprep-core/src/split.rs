//! Deterministic train/validation assignment.
//!
//! Every `every`-th record (1-based) goes to the validation set; the rest
//! go to training. The counter is owned by the caller so it can span many
//! input files in one run.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Valid,
}

#[derive(Debug, Clone)]
pub struct EverySplit {
    every: usize,
    seen: usize,
}

impl EverySplit {
    /// `every = 0` sends everything to training.
    pub fn new(every: usize) -> Self {
        Self { every, seen: 0 }
    }

    pub fn next_split(&mut self) -> Split {
        self.seen += 1;
        if self.every > 0 && self.seen % self.every == 0 {
            Split::Valid
        } else {
            Split::Train
        }
    }

    pub fn seen(&self) -> usize {
        self.seen
    }
}
