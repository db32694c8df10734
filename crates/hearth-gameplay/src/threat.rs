//! Mutual threat tracking.
//!
//! Combat links are stored as an id-keyed adjacency set so that neither side
//! holds a reference to the other. Every link is symmetric.

use ahash::{AHashMap, AHashSet};
use tracing::debug;

use hearth_common::EntityId;

/// Who is fighting whom, plus each entity's current focus.
#[derive(Debug, Clone, Default)]
pub struct ThreatTable {
    links: AHashMap<EntityId, AHashSet<EntityId>>,
    focus: AHashMap<EntityId, EntityId>,
}

impl ThreatTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Links `a` and `b` as opponents.
    ///
    /// Either side without a focus starts focusing the other. Returns false
    /// for self-links and for already linked pairs.
    pub fn enter_combat(&mut self, a: EntityId, b: EntityId) -> bool {
        if a == b {
            return false;
        }
        let added = self.links.entry(a).or_default().insert(b);
        self.links.entry(b).or_default().insert(a);
        self.focus.entry(a).or_insert(b);
        self.focus.entry(b).or_insert(a);
        if added {
            debug!("{a} entered combat with {b}");
        }
        added
    }

    /// Severs the link between `a` and `b` in both directions.
    pub fn exit_combat(&mut self, a: EntityId, b: EntityId) -> bool {
        let removed = self.unlink(a, b);
        self.unlink(b, a);
        removed
    }

    /// Severs every link `a` holds.
    pub fn exit_all(&mut self, a: EntityId) {
        let Some(opponents) = self.links.remove(&a) else {
            self.focus.remove(&a);
            return;
        };
        for other in opponents {
            self.unlink(other, a);
        }
        self.focus.remove(&a);
    }

    /// Drops an entity from the table entirely.
    pub fn remove(&mut self, id: EntityId) {
        self.exit_all(id);
    }

    fn unlink(&mut self, from: EntityId, to: EntityId) -> bool {
        let Some(set) = self.links.get_mut(&from) else {
            return false;
        };
        let removed = set.remove(&to);
        if set.is_empty() {
            self.links.remove(&from);
            self.focus.remove(&from);
        } else if self.focus.get(&from) == Some(&to) {
            let next = set.iter().min().copied();
            if let Some(next) = next {
                self.focus.insert(from, next);
            }
        }
        removed
    }

    /// Checks if `a` has any opponents.
    #[must_use]
    pub fn in_combat(&self, a: EntityId) -> bool {
        self.links.get(&a).is_some_and(|set| !set.is_empty())
    }

    /// Checks if `a` and `b` are linked.
    #[must_use]
    pub fn are_fighting(&self, a: EntityId, b: EntityId) -> bool {
        self.links.get(&a).is_some_and(|set| set.contains(&b))
    }

    /// Opponents of `a` in ascending id order.
    #[must_use]
    pub fn opponents(&self, a: EntityId) -> Vec<EntityId> {
        let mut out: Vec<EntityId> = self
            .links
            .get(&a)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        out.sort_unstable();
        out
    }

    /// Current focus of `a`.
    #[must_use]
    pub fn target(&self, a: EntityId) -> Option<EntityId> {
        self.focus.get(&a).copied()
    }

    /// Focuses `a` on `b`, linking them if needed.
    pub fn set_target(&mut self, a: EntityId, b: EntityId) {
        if self.enter_combat(a, b) || self.are_fighting(a, b) {
            self.focus.insert(a, b);
        }
    }

    /// Entities currently focusing `target`, in ascending id order.
    #[must_use]
    pub fn attackers_of(&self, target: EntityId) -> Vec<EntityId> {
        let mut out: Vec<EntityId> = self
            .focus
            .iter()
            .filter(|&(_, &focus)| focus == target)
            .map(|(&id, _)| id)
            .collect();
        out.sort_unstable();
        out
    }

    /// Checks the symmetry of every link.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.links.iter().all(|(a, set)| {
            !set.is_empty() && set.iter().all(|b| self.are_fighting(*b, *a))
        }) && self.focus.iter().all(|(a, b)| self.are_fighting(*a, *b))
    }
}
