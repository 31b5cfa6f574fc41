//! Process-wide counters for production monitoring

use serde::{Deserialize, Serialize};
use std::sync::RwLock;

lazy_static::lazy_static! {
    static ref METRICS: RwLock<Metrics> = RwLock::new(Metrics::new());
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub turns_total: u64,
    pub turns_failed: u64,
    pub llm_calls: u64,
    pub game_turns: u64,
    pub memory_writes: u64,
    pub memory_write_failures: u64,
    pub start_time_secs: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            start_time_secs: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            ..Default::default()
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        now.saturating_sub(self.start_time_secs)
    }
}

pub fn record_turn() {
    if let Ok(mut m) = METRICS.write() {
        m.turns_total += 1;
    }
}

pub fn record_turn_failure() {
    if let Ok(mut m) = METRICS.write() {
        m.turns_failed += 1;
    }
}

pub fn record_llm_call() {
    if let Ok(mut m) = METRICS.write() {
        m.llm_calls += 1;
    }
}

pub fn record_game_turn() {
    if let Ok(mut m) = METRICS.write() {
        m.game_turns += 1;
    }
}

pub fn record_memory_write() {
    if let Ok(mut m) = METRICS.write() {
        m.memory_writes += 1;
    }
}

pub fn record_memory_write_failure() {
    if let Ok(mut m) = METRICS.write() {
        m.memory_write_failures += 1;
    }
}

pub fn snapshot() -> Metrics {
    METRICS.read().map(|m| m.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let before = snapshot();
        record_turn();
        record_game_turn();
        let after = snapshot();
        assert!(after.turns_total >= before.turns_total + 1);
        assert!(after.game_turns >= before.game_turns + 1);
    }
}
