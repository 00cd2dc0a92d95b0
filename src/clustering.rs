use tracing::debug;

use crate::registry::NameRegistry;
use crate::TARGET_SESSION;

/// Pairwise distance between two names. Must be symmetric and return 0 for
/// identical names.
pub type DistanceFn = fn(&str, &str) -> usize;

/// Levenshtein distance over Unicode scalar values.
pub fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterMember {
    pub name: String,
    pub id: i64,
    /// Distance from the pivot.
    pub distance: usize,
}

/// Names within the threshold of a pivot, in registry order. The pivot is
/// always the first member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    members: Vec<ClusterMember>,
}

impl Cluster {
    pub fn pivot(&self) -> &ClusterMember {
        &self.members[0]
    }

    pub fn members(&self) -> &[ClusterMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }

    /// Member for a 1-based menu option.
    pub fn option(&self, choice: usize) -> Option<&ClusterMember> {
        choice.checked_sub(1).and_then(|i| self.members.get(i))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.name.as_str())
    }
}

/// Forms the next cluster from the live registry, or `None` when nothing is
/// left to resolve.
///
/// The pivot is the first registry entry. Every entry, pivot included, is
/// measured against it and kept when its distance is within `threshold`.
/// The registry is not modified.
pub fn next_cluster(
    registry: &NameRegistry,
    threshold: usize,
    distance: DistanceFn,
) -> Option<Cluster> {
    let entries = registry.snapshot();
    let pivot = entries.first()?.name.clone();

    let mut members = Vec::new();
    for artist in entries {
        // Pivot is always a member, whatever the metric reports for it.
        let d = if artist.name == pivot {
            0
        } else {
            distance(&pivot, &artist.name)
        };
        if d <= threshold {
            members.push(ClusterMember {
                name: artist.name,
                id: artist.id,
                distance: d,
            });
        }
    }

    debug!(
        target: TARGET_SESSION,
        "Pivot \"{}\" clustered with {} name(s) at threshold {}",
        pivot,
        members.len() - 1,
        threshold
    );

    Some(Cluster { members })
}
