use std::time::{Duration, Instant};

/// Default ceiling applied to every run
pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(5);

/// Cooperative wall-clock budget
///
/// Nothing here interrupts running code. Interpreters call [`Budget::exceeded`]
/// at their own checkpoints (loop iterations, calls, scanned lines) and stop
/// when it reports true.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    started: Instant,
    limit: Duration,
}

impl Budget {
    pub fn start(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    #[inline]
    pub fn exceeded(&self) -> bool {
        self.elapsed() >= self.limit
    }

    /// Message reported in `error` when the budget runs out
    pub fn timeout_message(&self) -> String {
        let secs = self.limit.as_secs_f64();
        if secs.fract() == 0.0 {
            format!("Execution timed out after {} seconds", secs as u64)
        } else {
            format!("Execution timed out after {secs:.3} seconds")
        }
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self::start(DEFAULT_TIME_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_budget_is_exceeded() {
        let budget = Budget::start(Duration::ZERO);
        assert!(budget.exceeded());
    }

    #[test]
    fn test_default_budget_is_not_exceeded() {
        let budget = Budget::default();
        assert!(!budget.exceeded());
        assert_eq!(
            budget.timeout_message(),
            "Execution timed out after 5 seconds"
        );
    }

    #[test]
    fn test_fractional_timeout_message() {
        let budget = Budget::start(Duration::from_millis(250));
        assert_eq!(
            budget.timeout_message(),
            "Execution timed out after 0.250 seconds"
        );
    }
}
