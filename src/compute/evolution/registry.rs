//! Discovery registry for target states.
//!
//! The registry is owned by the coordinator. Workers only see an immutable
//! [`RegistrySnapshot`] taken before a generation is evaluated, and their
//! results are folded in with [`DiscoveryRegistry::merge`] once every worker
//! has finished.

use std::collections::{BTreeMap, BTreeSet};

use super::Evaluation;
use crate::schema::{InputId, StateId};

/// What is known about one target state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    /// Times the state was distinguished over the run.
    pub count: usize,
    /// Shortest UIO seen, ties broken lexicographically.
    pub best_uio: Option<Vec<InputId>>,
}

impl Discovery {
    #[inline]
    pub fn is_discovered(&self) -> bool {
        self.best_uio.is_some()
    }
}

/// Target states still open when a generation started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    open: BTreeSet<StateId>,
}

impl RegistrySnapshot {
    pub fn new(open: BTreeSet<StateId>) -> Self {
        Self { open }
    }

    #[inline]
    pub fn is_open(&self, state: StateId) -> bool {
        self.open.contains(&state)
    }

    pub fn open_states(&self) -> &BTreeSet<StateId> {
        &self.open
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.open.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

/// Registry of target states and the UIOs found for them.
///
/// Discovery is monotone: once a state has a UIO it never loses it, and a
/// merge yields the same registry whatever order the evaluations come in.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryRegistry {
    entries: BTreeMap<StateId, Discovery>,
}

impl DiscoveryRegistry {
    /// Create a registry with every target open.
    pub fn new(targets: impl IntoIterator<Item = StateId>) -> Self {
        Self {
            entries: targets
                .into_iter()
                .map(|state| (state, Discovery::default()))
                .collect(),
        }
    }

    /// Open targets at this point.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot::new(self.open().collect())
    }

    /// Record one UIO for `state`. Non-target states are ignored.
    ///
    /// Returns `true` if the state was open before.
    pub fn record(&mut self, state: StateId, uio: &[InputId]) -> bool {
        let Some(entry) = self.entries.get_mut(&state) else {
            return false;
        };
        let was_open = !entry.is_discovered();
        entry.count += 1;
        let better = entry
            .best_uio
            .as_ref()
            .is_none_or(|best| (uio.len(), uio) < (best.len(), best.as_slice()));
        if better {
            entry.best_uio = Some(uio.to_vec());
        }
        was_open
    }

    /// Fold a generation's evaluations into the registry.
    ///
    /// Returns the targets discovered by this merge.
    pub fn merge<'a>(
        &mut self,
        evaluations: impl IntoIterator<Item = &'a Evaluation>,
    ) -> BTreeSet<StateId> {
        let mut discovered = BTreeSet::new();
        for evaluation in evaluations {
            for (&state, uio) in &evaluation.uios {
                if self.record(state, uio) {
                    discovered.insert(state);
                }
            }
        }
        discovered
    }

    pub fn get(&self, state: StateId) -> Option<&Discovery> {
        self.entries.get(&state)
    }

    #[inline]
    pub fn is_discovered(&self, state: StateId) -> bool {
        self.get(state).is_some_and(Discovery::is_discovered)
    }

    /// Discovered targets with their best UIO, ordered by state.
    pub fn discovered(&self) -> impl Iterator<Item = (StateId, &Discovery)> {
        self.entries
            .iter()
            .filter(|(_, d)| d.is_discovered())
            .map(|(&s, d)| (s, d))
    }

    /// Targets without a UIO, ordered by state.
    pub fn open(&self) -> impl Iterator<Item = StateId> + '_ {
        self.entries
            .iter()
            .filter(|(_, d)| !d.is_discovered())
            .map(|(&s, _)| s)
    }

    pub fn targets(&self) -> impl Iterator<Item = StateId> + '_ {
        self.entries.keys().copied()
    }

    pub fn discovered_count(&self) -> usize {
        self.discovered().count()
    }

    pub fn open_count(&self) -> usize {
        self.len() - self.discovered_count()
    }

    /// True when every target has a UIO.
    pub fn is_complete(&self) -> bool {
        self.open().next().is_none()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
