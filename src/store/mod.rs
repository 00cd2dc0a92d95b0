pub mod memory;

use async_trait::async_trait;

pub use memory::MemoryStore;

/// One artist row as seen by a session: a distinct name and the id kept for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artist {
    pub name: String,
    pub id: i64,
}

impl Artist {
    pub fn new(name: impl Into<String>, id: i64) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

/// Storage operations a cleaning session relies on.
///
/// Every call runs inside the single transaction owned by the implementor.
/// Nothing is visible outside the store until `commit` succeeds, and
/// `rollback` discards every write issued since the store was opened.
#[async_trait]
pub trait ArtistStore: Send {
    /// Distinct artist names ordered by name, one id per name (the lowest one
    /// when several rows share a name).
    async fn fetch_artists(&mut self) -> Result<Vec<Artist>, sqlx::Error>;

    /// Points every track of `from_id` at `to_id`. Returns the number of tracks moved.
    async fn reassign_tracks(&mut self, from_id: i64, to_id: i64) -> Result<u64, sqlx::Error>;

    /// Deletes one artist row. Returns the number of rows removed.
    async fn delete_artist(&mut self, artist_id: i64) -> Result<u64, sqlx::Error>;

    async fn commit(&mut self) -> Result<(), sqlx::Error>;

    async fn rollback(&mut self) -> Result<(), sqlx::Error>;
}
