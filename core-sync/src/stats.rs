//! # Sync Run Statistics
//!
//! Counters and timing for one reconciliation run, guarded by a small state
//! machine so a finished run can no longer change.
//!
//! ## State Machine
//!
//! ```text
//! NotStarted → Running → Finalized(Completed | Failed | Cancelled)
//! ```
//!
//! Counters only move while `Running`. Any other mutation is rejected with
//! [`SyncError::InvalidStateTransition`]; that is a programming error in the
//! orchestrator, never an expected runtime path.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut stats = SyncStats::new("filler-list");
//! stats.start(clock.now())?;
//! stats.record_seen(1100)?;
//! stats.record_new(3)?;
//! stats.record_inserted(3)?;
//! stats.finalize(clock.now(), RunOutcome::Completed, None)?;
//! ```

use crate::{Result, SyncError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncRunId(Uuid);

impl SyncRunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a run ID from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self> {
        Ok(Self(
            Uuid::parse_str(s).map_err(|e| SyncError::InvalidRunId(e.to_string()))?,
        ))
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for SyncRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SyncRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Running,
    Finalized,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::NotStarted => "not_started",
            RunState::Running => "running",
            RunState::Finalized => "finalized",
        }
    }
}

/// How a finalized run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Completed,
    Failed,
    Cancelled,
}

impl RunOutcome {
    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Failed => "failed",
            RunOutcome::Cancelled => "cancelled",
        }
    }
}

impl FromStr for RunOutcome {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "completed" => Ok(RunOutcome::Completed),
            "failed" => Ok(RunOutcome::Failed),
            "cancelled" => Ok(RunOutcome::Cancelled),
            _ => Err(SyncError::InvalidStatus(s.to_string())),
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SyncStats
// ============================================================================

/// Accumulated counters for one run
///
/// Owned by the orchestrator; stages return their own outcomes and the
/// orchestrator folds them in here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncStats {
    pub run_id: SyncRunId,
    pub source: String,
    state: RunState,
    episodes_seen: u64,
    rejected: u64,
    existing_in_store: u64,
    new_found: u64,
    inserted: u64,
    failed: u64,
    unassigned: u64,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    duration_ms: Option<i64>,
    outcome: Option<RunOutcome>,
    error_message: Option<String>,
}

impl SyncStats {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            run_id: SyncRunId::new(),
            source: source.into(),
            state: RunState::NotStarted,
            episodes_seen: 0,
            rejected: 0,
            existing_in_store: 0,
            new_found: 0,
            inserted: 0,
            failed: 0,
            unassigned: 0,
            started_at: None,
            finished_at: None,
            duration_ms: None,
            outcome: None,
            error_message: None,
        }
    }

    /// Enter `Running` and capture the start time
    ///
    /// # Errors
    ///
    /// Returns an error unless the stats are `NotStarted`
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.validate_transition(RunState::Running)?;
        self.state = RunState::Running;
        self.started_at = Some(now);
        Ok(())
    }

    /// Enter `Finalized`, capture the end time and the outcome
    ///
    /// # Errors
    ///
    /// Returns an error unless the stats are `Running`; a run is finalized
    /// exactly once.
    pub fn finalize(
        &mut self,
        now: DateTime<Utc>,
        outcome: RunOutcome,
        error_message: Option<String>,
    ) -> Result<()> {
        self.validate_transition(RunState::Finalized)?;
        self.state = RunState::Finalized;
        self.finished_at = Some(now);
        self.duration_ms = self
            .started_at
            .map(|start| (now - start).num_milliseconds().max(0));
        self.outcome = Some(outcome);
        self.error_message = error_message;
        Ok(())
    }

    pub fn record_seen(&mut self, n: u64) -> Result<()> {
        self.ensure_running("record_seen")?;
        self.episodes_seen += n;
        Ok(())
    }

    pub fn record_rejected(&mut self, n: u64) -> Result<()> {
        self.ensure_running("record_rejected")?;
        self.rejected += n;
        Ok(())
    }

    pub fn record_existing(&mut self, n: u64) -> Result<()> {
        self.ensure_running("record_existing")?;
        self.existing_in_store += n;
        Ok(())
    }

    pub fn record_new(&mut self, n: u64) -> Result<()> {
        self.ensure_running("record_new")?;
        self.new_found += n;
        Ok(())
    }

    pub fn record_inserted(&mut self, n: u64) -> Result<()> {
        self.ensure_running("record_inserted")?;
        self.inserted += n;
        Ok(())
    }

    pub fn record_failed(&mut self, n: u64) -> Result<()> {
        self.ensure_running("record_failed")?;
        self.failed += n;
        Ok(())
    }

    pub fn record_unassigned(&mut self, n: u64) -> Result<()> {
        self.ensure_running("record_unassigned")?;
        self.unassigned += n;
        Ok(())
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn episodes_seen(&self) -> u64 {
        self.episodes_seen
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn existing_in_store(&self) -> u64 {
        self.existing_in_store
    }

    pub fn new_found(&self) -> u64 {
        self.new_found
    }

    pub fn inserted(&self) -> u64 {
        self.inserted
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn unassigned(&self) -> u64 {
        self.unassigned
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn outcome(&self) -> Option<RunOutcome> {
        self.outcome
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// `finished_at - started_at`, available once finalized
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.duration_ms.map(chrono::Duration::milliseconds)
    }

    /// `inserted / new_found`, or 1.0 when nothing was new
    pub fn success_rate(&self) -> f64 {
        if self.new_found == 0 {
            1.0
        } else {
            self.inserted as f64 / self.new_found as f64
        }
    }

    /// A completed run that still lost records or left some without an arc
    pub fn is_degraded(&self) -> bool {
        self.failed > 0 || self.unassigned > 0
    }

    fn ensure_running(&self, operation: &str) -> Result<()> {
        if self.state != RunState::Running {
            return Err(SyncError::InvalidStateTransition {
                from: self.state.as_str().to_string(),
                to: operation.to_string(),
                reason: "Stats must be running to record counters".to_string(),
            });
        }
        Ok(())
    }

    fn validate_transition(&self, to: RunState) -> Result<()> {
        let valid = matches!(
            (self.state, to),
            (RunState::NotStarted, RunState::Running) | (RunState::Running, RunState::Finalized)
        );

        if !valid {
            return Err(SyncError::InvalidStateTransition {
                from: self.state.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!(
                    "Cannot transition from {} to {}",
                    self.state.as_str(),
                    to.as_str()
                ),
            });
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_run_id_round_trip() {
        let id = SyncRunId::new();
        assert_eq!(SyncRunId::from_string(&id.as_str()).unwrap(), id);
        assert!(matches!(
            SyncRunId::from_string("not-a-uuid"),
            Err(SyncError::InvalidRunId(_))
        ));
    }

    #[test]
    fn test_outcome_parse() {
        assert_eq!("completed".parse::<RunOutcome>().unwrap(), RunOutcome::Completed);
        assert_eq!("CANCELLED".parse::<RunOutcome>().unwrap(), RunOutcome::Cancelled);
        assert!(matches!(
            "paused".parse::<RunOutcome>(),
            Err(SyncError::InvalidStatus(_))
        ));
    }

    #[test]
    fn test_counters_rejected_before_start() {
        let mut stats = SyncStats::new("test");
        assert_eq!(stats.state(), RunState::NotStarted);

        let result = stats.record_seen(1);
        assert!(matches!(
            result,
            Err(SyncError::InvalidStateTransition { ref from, .. }) if from == "not_started"
        ));
        assert_eq!(stats.episodes_seen(), 0);
    }

    #[test]
    fn test_full_lifecycle() {
        let mut stats = SyncStats::new("test");
        stats.start(at(100)).unwrap();

        stats.record_seen(3).unwrap();
        stats.record_existing(1).unwrap();
        stats.record_new(2).unwrap();
        stats.record_inserted(2).unwrap();

        stats.finalize(at(103), RunOutcome::Completed, None).unwrap();

        assert_eq!(stats.state(), RunState::Finalized);
        assert_eq!(stats.outcome(), Some(RunOutcome::Completed));
        assert_eq!(stats.duration(), Some(chrono::Duration::seconds(3)));
        assert_eq!(stats.success_rate(), 1.0);
        assert!(!stats.is_degraded());
    }

    #[test]
    fn test_finalized_stats_are_frozen() {
        let mut stats = SyncStats::new("test");
        stats.start(at(0)).unwrap();
        stats
            .finalize(at(1), RunOutcome::Failed, Some("store down".into()))
            .unwrap();

        assert!(stats.record_inserted(1).is_err());
        assert!(stats.finalize(at(2), RunOutcome::Completed, None).is_err());
        assert!(stats.start(at(3)).is_err());
        assert_eq!(stats.error_message(), Some("store down"));
    }

    #[test]
    fn test_cannot_finalize_before_start() {
        let mut stats = SyncStats::new("test");
        assert!(stats.finalize(at(1), RunOutcome::Cancelled, None).is_err());
    }

    #[test]
    fn test_success_rate_and_degradation() {
        let mut stats = SyncStats::new("test");
        stats.start(at(0)).unwrap();
        stats.record_new(250).unwrap();
        stats.record_inserted(150).unwrap();
        stats.record_failed(100).unwrap();

        assert!((stats.success_rate() - 0.6).abs() < f64::EPSILON);
        assert!(stats.is_degraded());

        let mut unassigned_only = SyncStats::new("test");
        unassigned_only.start(at(0)).unwrap();
        unassigned_only.record_unassigned(1).unwrap();
        assert!(unassigned_only.is_degraded());
    }

    #[test]
    fn test_serializes_snapshot() {
        let mut stats = SyncStats::new("filler-list");
        stats.start(at(0)).unwrap();
        stats.record_seen(5).unwrap();
        stats.finalize(at(2), RunOutcome::Cancelled, None).unwrap();

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["source"], "filler-list");
        assert_eq!(json["episodes_seen"], 5);
        assert_eq!(json["outcome"], "cancelled");
        assert_eq!(json["duration_ms"], 2000);
        assert_eq!(json["state"], "finalized");
    }
}
