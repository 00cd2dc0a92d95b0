pub mod prompt;

use std::io;
use tracing::{debug, info};

use crate::clustering::{Cluster, ClusterMember};
use crate::error::{CleanerError, MergeStep, Result};
use crate::registry::NameRegistry;
use crate::store::ArtistStore;
use crate::TARGET_SESSION;

pub use prompt::ConsolePrompt;

/// What the operator wants done with a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Keep every member as a separate artist.
    RetainAll,
    /// Keep the member at this 1-based position and merge the rest into it.
    MergeTo(usize),
    /// Stop the session, keeping merges already applied.
    Abort,
}

impl Decision {
    /// Whether this decision can be applied to `cluster`.
    pub fn is_valid_for(&self, cluster: &Cluster) -> bool {
        match self {
            Decision::MergeTo(k) => cluster.option(*k).is_some(),
            Decision::RetainAll | Decision::Abort => true,
        }
    }
}

/// Source of operator decisions. The console implementation blocks on stdin;
/// tests substitute a scripted one.
pub trait DecisionSource {
    /// Called once before the first cluster is presented.
    fn begin(&mut self, _threshold: usize) -> io::Result<()> {
        Ok(())
    }

    /// Presents a cluster of two or more members and waits for a decision.
    fn decide(&mut self, cluster: &Cluster) -> io::Result<Decision>;
}

/// Decisions replayed from a fixed list. Running out of answers aborts.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDecisions {
    answers: std::collections::VecDeque<Decision>,
    presented: Vec<Cluster>,
}

impl ScriptedDecisions {
    pub fn new(answers: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            presented: Vec::new(),
        }
    }

    /// Clusters that were shown, in order.
    pub fn presented(&self) -> &[Cluster] {
        &self.presented
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl DecisionSource for ScriptedDecisions {
    fn decide(&mut self, cluster: &Cluster) -> io::Result<Decision> {
        self.presented.push(cluster.clone());
        Ok(self.answers.pop_front().unwrap_or(Decision::Abort))
    }
}

/// What resolving one cluster did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Only the pivot matched; resolved without asking.
    Singleton,
    /// All members kept.
    Retained { members: usize },
    /// Non-survivors merged into the survivor.
    Merged {
        survivor: ClusterMember,
        merged: usize,
        tracks_reassigned: u64,
    },
    /// The operator stopped the session.
    Aborted,
}

/// Applies `decision` to `cluster`, updating the registry and issuing the
/// merge statements against `store`.
///
/// For `MergeTo`, each non-survivor is handled in cluster order: its tracks
/// are reassigned to the survivor, then its row is deleted, then it leaves the
/// registry. The first failing statement stops the merge; members not yet
/// processed stay in the registry and nothing further is written.
pub async fn apply_decision<S: ArtistStore + ?Sized>(
    cluster: &Cluster,
    decision: Decision,
    registry: &mut NameRegistry,
    store: &mut S,
) -> Result<Resolution> {
    match decision {
        Decision::Abort => Ok(Resolution::Aborted),
        Decision::RetainAll => {
            let removed = registry.remove_many(cluster.names());
            info!(
                target: TARGET_SESSION,
                "Retained {} artists similar to \"{}\"", removed, cluster.pivot().name
            );
            Ok(Resolution::Retained { members: removed })
        }
        Decision::MergeTo(choice) => {
            let survivor = cluster
                .option(choice)
                .cloned()
                .ok_or_else(|| {
                    CleanerError::Input(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("option {} is not between 1 and {}", choice, cluster.len()),
                    ))
                })?;

            let mut merged = 0;
            let mut tracks_reassigned = 0;
            for member in cluster.members() {
                if member.name == survivor.name {
                    continue;
                }
                tracks_reassigned += merge_member(member, &survivor, store).await?;
                registry.pop(&member.name);
                merged += 1;
            }
            registry.pop(&survivor.name);

            info!(
                target: TARGET_SESSION,
                "Merged {} artist(s) into \"{}\" (id {}), {} track(s) reassigned",
                merged, survivor.name, survivor.id, tracks_reassigned
            );
            Ok(Resolution::Merged {
                survivor,
                merged,
                tracks_reassigned,
            })
        }
    }
}

/// Reassigns the tracks of `member` to `survivor` and deletes `member`.
async fn merge_member<S: ArtistStore + ?Sized>(
    member: &ClusterMember,
    survivor: &ClusterMember,
    store: &mut S,
) -> Result<u64> {
    let fail = |step: MergeStep| {
        let artist = member.name.clone();
        let (artist_id, survivor_id) = (member.id, survivor.id);
        move |source: sqlx::Error| CleanerError::Database {
            step,
            artist,
            artist_id,
            survivor_id,
            source,
        }
    };

    let moved = store
        .reassign_tracks(member.id, survivor.id)
        .await
        .map_err(fail(MergeStep::ReassignTracks))?;
    store
        .delete_artist(member.id)
        .await
        .map_err(fail(MergeStep::DeleteArtist))?;

    debug!(
        target: TARGET_SESSION,
        "Moved {} track(s) from \"{}\" (id {}) to id {} and deleted it",
        moved, member.name, member.id, survivor.id
    );
    Ok(moved)
}
