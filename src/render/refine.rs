//! Progressive refinement state machine.
//!
//! Tracks how many samples per pixel have been accumulated in the current
//! cycle and sizes the next batch. The cycle is done once `sample_root²`
//! samples are in; any restart drops back to zero.

/// One kernel dispatch worth of samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    /// Index of the first sample within the cycle.
    pub start: u32,
    pub size: u32,
}

impl Batch {
    pub fn end(&self) -> u32 {
        self.start + self.size
    }

    /// First batch of a cycle.
    pub fn is_first(&self) -> bool {
        self.start == 0
    }
}

/// Where the controller is in the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Accumulating,
    Converged,
}

/// Result of completing a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub sample_num: u32,
    /// This batch reached the target.
    pub converged: bool,
}

#[derive(Debug, Clone)]
pub struct Refinement {
    sample_num: u32,
    target: u32,
}

impl Refinement {
    pub fn new(sample_root: u32) -> Self {
        Self { sample_num: 0, target: sample_root * sample_root }
    }

    pub fn sample_num(&self) -> u32 {
        self.sample_num
    }

    /// Samples per pixel at convergence.
    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn phase(&self) -> Phase {
        if self.sample_num >= self.target {
            Phase::Converged
        } else {
            Phase::Accumulating
        }
    }

    pub fn is_converged(&self) -> bool {
        self.phase() == Phase::Converged
    }

    /// Start a new cycle.
    pub fn restart(&mut self) {
        self.sample_num = 0;
    }

    /// Change the target and start a new cycle.
    pub fn set_sample_root(&mut self, sample_root: u32) {
        self.target = sample_root * sample_root;
        self.restart();
    }

    /// Next batch to dispatch, clamped to what is left of the cycle.
    ///
    /// `None` once converged. `batch_size` of zero is treated as one.
    pub fn next_batch(&self, batch_size: u32) -> Option<Batch> {
        let remaining = self.target.saturating_sub(self.sample_num);
        if remaining == 0 {
            return None;
        }
        Some(Batch {
            start: self.sample_num,
            size: batch_size.max(1).min(remaining),
        })
    }

    /// Record a finished batch.
    pub fn complete(&mut self, batch: Batch) -> Progress {
        debug_assert_eq!(batch.start, self.sample_num, "batch does not continue the cycle");
        let was_converged = self.is_converged();
        self.sample_num = batch.end().min(self.target);
        Progress {
            sample_num: self.sample_num,
            converged: !was_converged && self.is_converged(),
        }
    }
}

/// Forces single-sample batches while any input is held.
///
/// The configured batch size is never written; the override only changes
/// what [`BatchThrottle::effective`] returns, so releasing the input restores
/// the user's setting exactly.
#[derive(Debug, Clone, Default)]
pub struct BatchThrottle {
    engaged: bool,
}

impl BatchThrottle {
    /// Update from the current held-input state. Returns true on a transition.
    pub fn update(&mut self, input_held: bool) -> bool {
        let changed = self.engaged != input_held;
        self.engaged = input_held;
        changed
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    /// Batch size to dispatch given the configured one.
    pub fn effective(&self, configured: u32) -> u32 {
        if self.engaged {
            1
        } else {
            configured
        }
    }
}
