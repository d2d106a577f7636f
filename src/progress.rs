use std::time::Instant;

/// Reports run progress through the log after each finished chunk.
pub struct ProgressTracker {
    total: usize,
    t0: Instant,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            t0: Instant::now(),
        }
    }

    #[must_use]
    pub fn percent(&self, done: usize) -> f64 {
        let total = self.total.max(1);
        let done = done.min(total);
        (done as f64 / total as f64) * 100.0
    }

    pub fn report(&self, done: usize, glossary_len: usize) {
        let pct = self.percent(done);
        let total = self.total;
        let elapsed = fmt_elapsed(self.t0.elapsed().as_secs_f64());
        tracing::info!("Progress: {pct:.2}% ({done}/{total}) elapsed {elapsed}");
        tracing::info!("Current glossary size: {glossary_len}");
    }
}

fn fmt_elapsed(seconds: f64) -> String {
    let seconds = seconds.max(0.0) as u64;
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::{fmt_elapsed, ProgressTracker};

    #[test]
    fn percent_is_clamped() {
        let p = ProgressTracker::new(4);
        assert_eq!(p.percent(1), 25.0);
        assert_eq!(p.percent(9), 100.0);
        assert_eq!(ProgressTracker::new(0).percent(0), 0.0);
    }

    #[test]
    fn elapsed_format() {
        assert_eq!(fmt_elapsed(65.0), "01:05");
        assert_eq!(fmt_elapsed(3725.0), "01:02:05");
    }
}
