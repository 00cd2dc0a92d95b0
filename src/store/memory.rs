use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};

use super::{Artist, ArtistStore};

/// A write issued against the store, in the order it was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    ReassignTracks { from_id: i64, to_id: i64 },
    DeleteArtist { artist_id: i64 },
    Commit,
    Rollback,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    // artist_id -> name
    artists: BTreeMap<i64, String>,
    // track_id -> artist_id
    tracks: BTreeMap<i64, i64>,
}

/// In-memory `ArtistStore` with transaction semantics.
///
/// Writes go to a working copy that replaces the committed tables on
/// `commit` and is thrown away on `rollback`. Every write is recorded in
/// `ops()` so callers can check exactly which statements a session issued.
#[derive(Debug, Default)]
pub struct MemoryStore {
    committed: Tables,
    working: Tables,
    ops: Vec<StoreOp>,
    next_track_id: i64,
    fail_reassign: HashSet<i64>,
    fail_delete: HashSet<i64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store whose committed state holds the given artists.
    pub fn with_artists<'a>(artists: impl IntoIterator<Item = (&'a str, i64)>) -> Self {
        let mut store = Self::new();
        for (name, id) in artists {
            store.committed.artists.insert(id, name.to_string());
        }
        store.working = store.committed.clone();
        store
    }

    /// Adds `count` committed tracks owned by `artist_id`.
    pub fn add_tracks(&mut self, artist_id: i64, count: usize) {
        for _ in 0..count {
            self.next_track_id += 1;
            self.committed.tracks.insert(self.next_track_id, artist_id);
        }
        self.working = self.committed.clone();
    }

    /// Makes every later reassignment away from `artist_id` fail.
    pub fn fail_reassign_of(&mut self, artist_id: i64) {
        self.fail_reassign.insert(artist_id);
    }

    /// Makes every later delete of `artist_id` fail.
    pub fn fail_delete_of(&mut self, artist_id: i64) {
        self.fail_delete.insert(artist_id);
    }

    pub fn ops(&self) -> &[StoreOp] {
        &self.ops
    }

    /// Number of reassignments and deletes issued, commits and rollbacks excluded.
    pub fn write_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| {
                matches!(
                    op,
                    StoreOp::ReassignTracks { .. } | StoreOp::DeleteArtist { .. }
                )
            })
            .count()
    }

    /// Committed artists as `(id, name)`, ordered by id.
    pub fn committed_artists(&self) -> Vec<(i64, String)> {
        self.committed
            .artists
            .iter()
            .map(|(id, name)| (*id, name.clone()))
            .collect()
    }

    /// Number of committed tracks owned by `artist_id`.
    pub fn committed_track_count(&self, artist_id: i64) -> usize {
        self.committed
            .tracks
            .values()
            .filter(|owner| **owner == artist_id)
            .count()
    }
}

#[async_trait]
impl ArtistStore for MemoryStore {
    async fn fetch_artists(&mut self) -> Result<Vec<Artist>, sqlx::Error> {
        let mut by_name: BTreeMap<&str, i64> = BTreeMap::new();
        for (id, name) in &self.working.artists {
            by_name
                .entry(name.as_str())
                .and_modify(|kept| *kept = (*kept).min(*id))
                .or_insert(*id);
        }

        Ok(by_name
            .into_iter()
            .map(|(name, id)| Artist::new(name, id))
            .collect())
    }

    async fn reassign_tracks(&mut self, from_id: i64, to_id: i64) -> Result<u64, sqlx::Error> {
        self.ops.push(StoreOp::ReassignTracks { from_id, to_id });
        if self.fail_reassign.contains(&from_id) {
            return Err(sqlx::Error::Protocol(format!(
                "injected failure reassigning tracks of artist {}",
                from_id
            )));
        }

        let mut moved = 0;
        for owner in self.working.tracks.values_mut() {
            if *owner == from_id {
                *owner = to_id;
                moved += 1;
            }
        }
        Ok(moved)
    }

    async fn delete_artist(&mut self, artist_id: i64) -> Result<u64, sqlx::Error> {
        self.ops.push(StoreOp::DeleteArtist { artist_id });
        if self.fail_delete.contains(&artist_id) {
            return Err(sqlx::Error::Protocol(format!(
                "injected failure deleting artist {}",
                artist_id
            )));
        }

        if self.working.tracks.values().any(|owner| *owner == artist_id) {
            return Err(sqlx::Error::Protocol(format!(
                "artist {} is still referenced by tracks",
                artist_id
            )));
        }

        Ok(self.working.artists.remove(&artist_id).map_or(0, |_| 1))
    }

    async fn commit(&mut self) -> Result<(), sqlx::Error> {
        self.ops.push(StoreOp::Commit);
        self.committed = self.working.clone();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), sqlx::Error> {
        self.ops.push(StoreOp::Rollback);
        self.working = self.committed.clone();
        Ok(())
    }
}
