use std::collections::HashSet;
use tracing::{debug, info};

use crate::store::{Artist, ArtistStore};
use crate::TARGET_SESSION;

/// The artists a session has not resolved yet, in load order.
///
/// Load order is the order the store returned names in (sorted by name), and
/// every pivot is taken from the front. Entries only ever leave the registry.
#[derive(Debug, Default, Clone)]
pub struct NameRegistry {
    entries: Vec<Artist>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from artists in the order given. A repeated name keeps
    /// its first position and the lowest id seen for it.
    pub fn from_artists(artists: impl IntoIterator<Item = Artist>) -> Self {
        let mut registry = Self::new();
        for artist in artists {
            match registry.entries.iter_mut().find(|e| e.name == artist.name) {
                Some(existing) => existing.id = existing.id.min(artist.id),
                None => registry.entries.push(artist),
            }
        }
        registry
    }

    /// Reads the point-in-time snapshot of artists a session works on.
    pub async fn load<S: ArtistStore + ?Sized>(store: &mut S) -> Result<Self, sqlx::Error> {
        let artists = store.fetch_artists().await?;
        let registry = Self::from_artists(artists);
        info!(
            target: TARGET_SESSION,
            "Loaded {} distinct artist names", registry.len()
        );
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn id_of(&self, name: &str) -> Option<i64> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.id)
    }

    /// First unresolved artist, the next pivot.
    pub fn first(&self) -> Option<&Artist> {
        self.entries.first()
    }

    /// A fresh copy of the current entries in order.
    pub fn snapshot(&self) -> Vec<Artist> {
        self.entries.clone()
    }

    /// A fresh copy of the current names in order.
    pub fn keys_snapshot(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Removes one entry and returns its id, or `None` when `name` is absent.
    pub fn pop(&mut self, name: &str) -> Option<i64> {
        let position = self.entries.iter().position(|e| e.name == name)?;
        let removed = self.entries.remove(position);
        debug!(target: TARGET_SESSION, "Resolved \"{}\" (id {})", removed.name, removed.id);
        Some(removed.id)
    }

    /// Removes every entry whose name is in `names` in one pass. Returns how
    /// many entries were removed; names not present are ignored.
    pub fn remove_many<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> usize {
        let names: HashSet<&str> = names.into_iter().collect();
        let before = self.entries.len();
        self.entries.retain(|e| !names.contains(e.name.as_str()));
        before - self.entries.len()
    }
}
