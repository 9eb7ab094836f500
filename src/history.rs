//! Session history and personal bests
//!
//! Keeps the 20 most recent results (newest first) and running personal
//! bests. The core hands each finished round to a [`PersistenceSink`]; the
//! JSON file sink is what the native binary uses.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::SessionResult;

/// Maximum number of sessions to keep
pub const MAX_HISTORY: usize = 20;

/// Failure to store session history or settings
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("persistence unavailable: {0}")]
    Unavailable(String),
}

/// Receives one result per concluded round
pub trait PersistenceSink {
    fn persist(&mut self, result: &SessionResult) -> Result<(), PersistError>;
}

/// A single stored session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub result: SessionResult,
    /// Unix time when stored
    pub timestamp_ms: f64,
}

/// Best values across every stored session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalBests {
    pub highest_score: Option<i64>,
    pub most_kills: u32,
    pub fewest_misfires: Option<u32>,
    pub best_average_reaction_time_ms: Option<f64>,
}

impl PersonalBests {
    fn update(&mut self, result: &SessionResult) {
        self.highest_score = Some(
            self.highest_score
                .map_or(result.final_score, |s| s.max(result.final_score)),
        );
        self.most_kills = self.most_kills.max(result.kill_count);
        self.fewest_misfires = Some(
            self.fewest_misfires
                .map_or(result.misfire_count, |m| m.min(result.misfire_count)),
        );
        // A round without hits has no reaction time to compare
        if let Some(rt) = result.average_reaction_time_ms {
            self.best_average_reaction_time_ms =
                Some(self.best_average_reaction_time_ms.map_or(rt, |b| b.min(rt)));
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHistory {
    pub entries: Vec<HistoryEntry>,
    pub personal_bests: PersonalBests,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a result at the front and fold it into the personal bests
    pub fn record(&mut self, result: SessionResult, timestamp_ms: f64) {
        self.entries.insert(0, HistoryEntry { result, timestamp_ms });
        self.entries.truncate(MAX_HISTORY);
        self.personal_bests.update(&result);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.first()
    }
}

/// History persisted as pretty JSON in a single file
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
    history: SessionHistory,
}

impl JsonFileSink {
    /// Open the history at `path`, starting fresh if it is missing or unreadable
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let history = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<SessionHistory>(&bytes) {
                Ok(history) => {
                    log::info!("Loaded {} sessions from {}", history.entries.len(), path.display());
                    history
                }
                Err(e) => {
                    log::warn!("Ignoring unreadable history {}: {}", path.display(), e);
                    SessionHistory::new()
                }
            },
            Err(_) => {
                log::info!("No session history at {}, starting fresh", path.display());
                SessionHistory::new()
            }
        };
        Self { path, history }
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_vec_pretty(&self.history)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl PersistenceSink for JsonFileSink {
    fn persist(&mut self, result: &SessionResult) -> Result<(), PersistError> {
        self.history.record(*result, unix_millis());
        self.save()?;
        log::info!(
            "Session saved ({} entries) to {}",
            self.history.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Keeps results in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub results: Vec<SessionResult>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceSink for MemorySink {
    fn persist(&mut self, result: &SessionResult) -> Result<(), PersistError> {
        self.results.push(*result);
        Ok(())
    }
}

impl<S: PersistenceSink + ?Sized> PersistenceSink for Box<S> {
    fn persist(&mut self, result: &SessionResult) -> Result<(), PersistError> {
        (**self).persist(result)
    }
}

fn unix_millis() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}
