use std::fmt;
use std::io;

/// Which half of a merge a database failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStep {
    ReassignTracks,
    DeleteArtist,
}

impl fmt::Display for MergeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeStep::ReassignTracks => write!(f, "reassigning tracks"),
            MergeStep::DeleteArtist => write!(f, "deleting artist"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CleanerError {
    #[error("failed to load artists: {0}")]
    Load(#[source] sqlx::Error),

    /// A merge statement failed. When `step` is `DeleteArtist` the tracks of
    /// `artist_id` were already pointed at `survivor_id` inside the transaction.
    #[error("database error while {step} of \"{artist}\" (id {artist_id}) into id {survivor_id}: {source}")]
    Database {
        step: MergeStep,
        artist: String,
        artist_id: i64,
        survivor_id: i64,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to commit session: {0}")]
    Commit(#[source] sqlx::Error),

    #[error("failed to read operator input: {0}")]
    Input(#[from] io::Error),
}

impl CleanerError {
    /// False only when the transaction is already gone (a failed commit).
    pub fn requires_rollback(&self) -> bool {
        !matches!(self, CleanerError::Commit(_))
    }
}

pub type Result<T> = std::result::Result<T, CleanerError>;
