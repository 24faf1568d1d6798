/// Playback counters reported to the host page.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub messages_shown: u64,
    pub flows_completed: u64,
    /// Length of one playback pass at 1x speed.
    pub total_duration_ms: u64,
    pub user_interactions: u64,
    pub playbacks_started: u64,
    pub playbacks_completed: u64,
}

impl Metrics {
    /// Share of started playbacks that reached the end, as a percentage.
    pub fn completion_rate(&self) -> f64 {
        if self.playbacks_started == 0 {
            return 0.0;
        }
        self.playbacks_completed as f64 / self.playbacks_started as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_rate_handles_zero() {
        assert_eq!(Metrics::default().completion_rate(), 0.0);
    }

    #[test]
    fn completion_rate_percentage() {
        let m = Metrics {
            playbacks_started: 4,
            playbacks_completed: 3,
            ..Metrics::default()
        };
        assert!((m.completion_rate() - 75.0).abs() < f64::EPSILON);
    }
}
