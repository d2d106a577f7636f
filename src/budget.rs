use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct BudgetLimits {
    pub initial: f64,
    pub min: f64,
    pub max: f64,
    pub grow: f64,
    pub shrink: f64,
}

impl Default for BudgetLimits {
    fn default() -> Self {
        Self {
            initial: 1000.0,
            min: 1200.0,
            max: 2400.0,
            grow: 1.2,
            shrink: 0.8,
        }
    }
}

/// Target chunk size in characters, tuned by request outcomes.
///
/// The initial value may sit below `min`; the first adjustment pulls it into range
/// and it stays within `[min, max]` from then on. Not persisted across runs.
#[derive(Clone, Debug)]
pub struct ChunkBudget {
    target: f64,
    limits: BudgetLimits,
}

impl ChunkBudget {
    #[must_use]
    pub fn new(limits: BudgetLimits) -> Self {
        Self {
            target: limits.initial,
            limits,
        }
    }

    #[must_use]
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Whole-character budget handed to the chunker.
    #[must_use]
    pub fn target_chars(&self) -> usize {
        self.target.max(0.0).floor() as usize
    }

    pub fn on_success(&mut self) -> f64 {
        self.target = (self.target * self.limits.grow).min(self.limits.max);
        tracing::info!(target = self.target, "adjusted target length");
        self.target
    }

    pub fn on_failure(&mut self) -> f64 {
        self.target = (self.target * self.limits.shrink).max(self.limits.min);
        tracing::info!(target = self.target, "adjusted target length");
        self.target
    }
}

impl Default for ChunkBudget {
    fn default() -> Self {
        Self::new(BudgetLimits::default())
    }
}
