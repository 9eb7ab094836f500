//! Per-round tallies and the final result record

use serde::{Deserialize, Serialize};

use crate::Millis;

/// Flat record handed to persistence when a round ends
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub kill_count: u32,
    pub misfire_count: u32,
    /// kills - misfires, unbounded (unlike the live round score)
    pub final_score: i64,
    /// Mean hit latency; null when the round had no hits
    pub average_reaction_time_ms: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionAggregator {
    kills: u32,
    misfires: u32,
    hit_latencies: Vec<Millis>,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_kill(&mut self) {
        self.kills += 1;
    }

    pub fn record_misfire(&mut self) {
        self.misfires += 1;
    }

    pub fn record_hit(&mut self, latency_ms: Millis) {
        self.hit_latencies.push(latency_ms);
    }

    pub fn kills(&self) -> u32 {
        self.kills
    }

    pub fn misfires(&self) -> u32 {
        self.misfires
    }

    pub fn hits(&self) -> usize {
        self.hit_latencies.len()
    }

    pub fn average_reaction_time_ms(&self) -> Option<f64> {
        if self.hit_latencies.is_empty() {
            return None;
        }
        let total: f64 = self.hit_latencies.iter().map(|l| *l as f64).sum();
        Some(total / self.hit_latencies.len() as f64)
    }

    pub fn result(&self) -> SessionResult {
        SessionResult {
            kill_count: self.kills,
            misfire_count: self.misfires,
            final_score: self.kills as i64 - self.misfires as i64,
            average_reaction_time_ms: self.average_reaction_time_ms(),
        }
    }
}
