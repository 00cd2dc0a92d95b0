use chrono::Utc;
use serde::Serialize;
use std::fmt;
use tracing::{debug, error, info, instrument, warn};

use crate::clustering::{edit_distance, next_cluster, DistanceFn};
use crate::error::{CleanerError, MergeStep, Result};
use crate::registry::NameRegistry;
use crate::resolution::{apply_decision, Decision, DecisionSource, Resolution};
use crate::store::ArtistStore;
use crate::TARGET_SESSION;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Iterating,
    Committing,
    Done,
    Aborted,
    Failed,
}

/// How a session that committed came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOutcome {
    /// Every artist was resolved.
    Completed,
    /// The operator quit; merges made before that were kept.
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub threshold: usize,
    pub outcome: SessionOutcome,
    pub artists_loaded: usize,
    pub clusters_presented: usize,
    pub singletons: usize,
    pub retained: usize,
    pub artists_merged: usize,
    pub tracks_reassigned: u64,
    pub started_at: String,
    pub finished_at: String,
}

impl SessionReport {
    fn new(threshold: usize) -> Self {
        Self {
            threshold,
            outcome: SessionOutcome::Completed,
            artists_loaded: 0,
            clusters_presented: 0,
            singletons: 0,
            retained: 0,
            artists_merged: 0,
            tracks_reassigned: 0,
            started_at: Utc::now().to_rfc3339(),
            finished_at: String::new(),
        }
    }

    fn record(&mut self, resolution: &Resolution) {
        match resolution {
            Resolution::Singleton => self.singletons += 1,
            Resolution::Retained { members } => self.retained += members,
            Resolution::Merged {
                merged,
                tracks_reassigned,
                ..
            } => {
                self.artists_merged += merged;
                self.tracks_reassigned += tracks_reassigned;
            }
            Resolution::Aborted => self.outcome = SessionOutcome::Aborted,
        }
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = match self.outcome {
            SessionOutcome::Completed => "completed",
            SessionOutcome::Aborted => "stopped early",
        };
        write!(
            f,
            "Session {}: {} cluster(s) reviewed, {} artist(s) merged, {} track(s) reassigned, {} artist(s) retained",
            outcome, self.clusters_presented, self.artists_merged, self.tracks_reassigned, self.retained
        )
    }
}

/// One cleaning pass over the artists table.
///
/// The session owns nothing but borrows the store (and with it the open
/// transaction) and the decision source for its whole run. Whatever happens,
/// `run` leaves the transaction committed or rolled back.
pub struct Session<'a, S: ?Sized, D: ?Sized> {
    store: &'a mut S,
    decisions: &'a mut D,
    threshold: usize,
    distance: DistanceFn,
    state: SessionState,
}

impl<'a, S, D> Session<'a, S, D>
where
    S: ArtistStore + ?Sized,
    D: DecisionSource + ?Sized,
{
    pub fn new(store: &'a mut S, decisions: &'a mut D, threshold: usize) -> Self {
        Self {
            store,
            decisions,
            threshold,
            distance: edit_distance,
            state: SessionState::Loading,
        }
    }

    /// Replaces the default Levenshtein metric.
    pub fn with_distance(mut self, distance: DistanceFn) -> Self {
        self.distance = distance;
        self
    }

    fn transition(&mut self, next: SessionState) {
        debug!(target: TARGET_SESSION, "Session state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    #[instrument(target = "session", level = "info", skip(self), fields(threshold = self.threshold))]
    pub async fn run(mut self) -> Result<SessionReport> {
        let mut report = SessionReport::new(self.threshold);

        if let Err(err) = self.iterate(&mut report).await {
            self.fail(&err).await;
            return Err(err);
        }

        self.transition(SessionState::Committing);
        self.store.commit().await.map_err(|e| {
            error!(target: TARGET_SESSION, "Commit failed: {}", e);
            CleanerError::Commit(e)
        })?;

        self.transition(match report.outcome {
            SessionOutcome::Completed => SessionState::Done,
            SessionOutcome::Aborted => SessionState::Aborted,
        });
        report.finished_at = Utc::now().to_rfc3339();
        info!(target: TARGET_SESSION, "{}", report);
        Ok(report)
    }

    async fn iterate(&mut self, report: &mut SessionReport) -> Result<()> {
        let mut registry = NameRegistry::load(&mut *self.store)
            .await
            .map_err(CleanerError::Load)?;
        report.artists_loaded = registry.len();
        self.decisions.begin(self.threshold)?;

        self.transition(SessionState::Iterating);
        let max_iterations = registry.len();
        let mut iterations = 0;

        while let Some(cluster) = next_cluster(&registry, self.threshold, self.distance) {
            iterations += 1;
            debug_assert!(iterations <= max_iterations);

            if cluster.is_singleton() {
                registry.pop(&cluster.pivot().name);
                report.record(&Resolution::Singleton);
                continue;
            }

            report.clusters_presented += 1;
            let decision = loop {
                let decision = self.decisions.decide(&cluster)?;
                if decision.is_valid_for(&cluster) {
                    break decision;
                }
                warn!(
                    target: TARGET_SESSION,
                    "Ignoring {:?} for a cluster of {} members", decision, cluster.len()
                );
            };

            let resolution =
                apply_decision(&cluster, decision, &mut registry, &mut *self.store).await?;
            report.record(&resolution);

            if decision == Decision::Abort {
                info!(
                    target: TARGET_SESSION,
                    "Stopped by operator with {} artist(s) unresolved",
                    registry.len()
                );
                break;
            }
        }

        Ok(())
    }

    /// Rolls back after an error. A rollback failure is logged; the caller
    /// still reports the original error.
    async fn fail(&mut self, err: &CleanerError) {
        self.transition(SessionState::Failed);
        error!(target: TARGET_SESSION, "Session failed: {}", err);

        if let CleanerError::Database {
            step: MergeStep::DeleteArtist,
            artist,
            survivor_id,
            ..
        } = err
        {
            warn!(
                target: TARGET_SESSION,
                "Tracks of \"{}\" had already been moved to id {} when the delete failed",
                artist, survivor_id
            );
        }

        if !err.requires_rollback() {
            return;
        }
        match self.store.rollback().await {
            Ok(()) => info!(target: TARGET_SESSION, "Transaction rolled back"),
            Err(e) => error!(target: TARGET_SESSION, "Rollback failed: {}", e),
        }
    }
}

/// Runs a full session with the default metric.
pub async fn run_session<S, D>(
    store: &mut S,
    decisions: &mut D,
    threshold: usize,
) -> Result<SessionReport>
where
    S: ArtistStore + ?Sized,
    D: DecisionSource + ?Sized,
{
    Session::new(store, decisions, threshold).run().await
}
