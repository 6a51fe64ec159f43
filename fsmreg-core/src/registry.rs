//! Deduplicating definition registry.
//!
//! The registry maps structurally equal definitions to a single id. It is
//! sharded by the definition digest, so registrations of different
//! definitions rarely contend on the same lock, and a lookup of a known
//! definition only takes a shard read lock.

use crate::definition::{Definition, DefinitionParts};
use crate::error::CoreError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

static GLOBAL_REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Stable id of a registered definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryId(u64);

impl RegistryId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "def-{}", self.0)
    }
}

/// Concurrent store of immutable, deduplicated definitions.
pub struct Registry {
    /// Content -> id. The entry lock of this map serializes first
    /// registration of equal definitions.
    by_content: DashMap<Arc<Definition>, RegistryId>,

    /// Id -> definition. Written before the id becomes visible in
    /// `by_content`.
    by_id: DashMap<RegistryId, Arc<Definition>>,

    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            by_content: DashMap::new(),
            by_id: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Returns the process-wide registry, creating it on first use.
    pub fn global() -> &'static Registry {
        GLOBAL_REGISTRY.get_or_init(Registry::new)
    }

    /// Returns the id of an equal registered definition, registering the
    /// given one if none exists.
    ///
    /// Validation happens before any lock is taken; an invalid definition
    /// is never published.
    pub fn get_or_create<A, S>(
        &self,
        alphabet: &[A],
        states: &[S],
        transitions: &[Vec<usize>],
    ) -> Result<RegistryId, CoreError>
    where
        A: AsRef<str>,
        S: AsRef<str>,
    {
        let definition = Definition::new(alphabet, states, transitions)?;
        Ok(self.register(definition).0)
    }

    /// Same as [`Registry::get_or_create`] over owned parts.
    pub fn get_or_create_parts(
        &self,
        parts: DefinitionParts,
    ) -> Result<(RegistryId, Arc<Definition>), CoreError> {
        let definition = Definition::from_parts(parts)?;
        Ok(self.register(definition))
    }

    /// Registers an already validated definition.
    pub fn register(&self, definition: Definition) -> (RegistryId, Arc<Definition>) {
        if let Some(existing) = self.by_content.get(&definition) {
            return (*existing.value(), Arc::clone(existing.key()));
        }

        match self.by_content.entry(Arc::new(definition)) {
            Entry::Occupied(entry) => (*entry.get(), Arc::clone(entry.key())),
            Entry::Vacant(entry) => {
                let id = RegistryId(self.next_id.fetch_add(1, Ordering::Relaxed));
                let definition = Arc::clone(entry.key());
                self.by_id.insert(id, Arc::clone(&definition));
                entry.insert(id);

                tracing::debug!(
                    "Registered definition {} ({} symbols, {} states, fingerprint {})",
                    id,
                    definition.alphabet_size(),
                    definition.states_size(),
                    definition.fingerprint()
                );

                (id, definition)
            }
        }
    }

    /// Returns the definition registered under `id`.
    pub fn lookup(&self, id: RegistryId) -> Option<Arc<Definition>> {
        self.by_id.get(&id).map(|r| Arc::clone(r.value()))
    }

    /// Like [`Registry::lookup`], failing with `UnknownDefinition`.
    pub fn get(&self, id: RegistryId) -> Result<Arc<Definition>, CoreError> {
        self.lookup(id)
            .ok_or(CoreError::UnknownDefinition { id: id.as_u64() })
    }

    /// Returns the number of distinct registered definitions.
    pub fn number_of_definitions(&self) -> usize {
        self.by_content.len()
    }

    /// Removes every definition.
    ///
    /// Maintenance and test operation only: it must not race with
    /// `get_or_create` calls. Ids handed out before the call are not
    /// reused, so a stale id resolves to nothing rather than to a
    /// different definition.
    pub fn clear(&self) {
        self.by_content.clear();
        self.by_id.clear();
        tracing::debug!("Cleared definition registry");
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("definitions", &self.number_of_definitions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Barrier;

    fn toggle_table() -> Vec<Vec<usize>> {
        vec![vec![1, 0], vec![0, 1]]
    }

    #[test]
    fn test_dedup_equal_definitions() {
        let registry = Registry::new();
        let a = registry
            .get_or_create(&["0", "1"], &["A", "B"], &toggle_table())
            .unwrap();
        let b = registry
            .get_or_create(
                &["0".to_string(), "1".to_string()],
                &["A".to_string(), "B".to_string()],
                &toggle_table(),
            )
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(registry.number_of_definitions(), 1);
    }

    #[test]
    fn test_distinct_definitions_get_distinct_ids() {
        let registry = Registry::new();
        let a = registry
            .get_or_create(&["0", "1"], &["A", "B"], &toggle_table())
            .unwrap();
        let b = registry
            .get_or_create(&["0", "1"], &["A", "C"], &toggle_table())
            .unwrap();
        let c = registry
            .get_or_create(&["0", "1"], &["A", "B"], &[vec![0, 0], vec![1, 1]])
            .unwrap();

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
        assert_eq!(registry.number_of_definitions(), 3);
    }

    #[test]
    fn test_lookup() {
        let registry = Registry::new();
        let id = registry
            .get_or_create(&["0", "1"], &["A", "B"], &toggle_table())
            .unwrap();

        let def = registry.lookup(id).unwrap();
        assert_eq!(def.states(), &["A".to_string(), "B".to_string()]);
        assert_eq!(def.transitions(), toggle_table().as_slice());
    }

    #[test]
    fn test_invalid_definition_not_published() {
        let registry = Registry::new();
        let result = registry.get_or_create(&["0", "1"], &["A", "B"], &[vec![1, 0]]);

        assert!(matches!(result, Err(CoreError::InvalidDefinition { .. })));
        assert_eq!(registry.number_of_definitions(), 0);
    }

    #[test]
    fn test_clear() {
        let registry = Registry::new();
        let id = registry
            .get_or_create(&["0", "1"], &["A", "B"], &toggle_table())
            .unwrap();
        registry.clear();

        assert_eq!(registry.number_of_definitions(), 0);
        assert!(registry.lookup(id).is_none());
        assert!(matches!(
            registry.get(id),
            Err(CoreError::UnknownDefinition { .. })
        ));

        // Re-registering after a reset hands out a fresh id.
        let again = registry
            .get_or_create(&["0", "1"], &["A", "B"], &toggle_table())
            .unwrap();
        assert_ne!(id, again);
        assert_eq!(registry.number_of_definitions(), 1);
    }

    #[test]
    fn test_concurrent_first_registration() {
        let registry = Registry::new();
        let threads = 64;
        let barrier = Barrier::new(threads);

        let ids: Vec<RegistryId> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        registry
                            .get_or_create(&["0", "1"], &["A", "B"], &toggle_table())
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(registry.number_of_definitions(), 1);
        assert!(registry.lookup(ids[0]).is_some());
    }

    #[test]
    fn test_concurrent_distinct_registration() {
        let registry = Registry::new();
        let threads = 16;
        let per_thread = 50;
        let barrier = Barrier::new(threads);

        std::thread::scope(|s| {
            for t in 0..threads {
                let registry = &registry;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    // Every thread registers the same 50 definitions in a
                    // different order.
                    for i in 0..per_thread {
                        let k = (i + t * 7) % per_thread;
                        let states: Vec<String> = (0..=k).map(|j| format!("s{}", j)).collect();
                        let table = vec![(0..=k).map(|j| (j + 1) % (k + 1)).collect()];
                        let id = registry.get_or_create(&["tick"], &states, &table).unwrap();
                        let def = registry.lookup(id).unwrap();
                        assert_eq!(def.states_size(), k + 1);
                    }
                });
            }
        });

        assert_eq!(registry.number_of_definitions(), per_thread);
    }

    #[test]
    fn test_global_registry_is_shared() {
        let a = Registry::global();
        let b = Registry::global();
        assert!(std::ptr::eq(a, b));
    }

    fn arb_parts() -> impl Strategy<Value = DefinitionParts> {
        (1usize..4, 1usize..5).prop_flat_map(|(symbols, states)| {
            (
                Just((0..symbols).map(|i| i.to_string()).collect::<Vec<_>>()),
                Just(
                    (0..states)
                        .map(|i| format!("S{}", i))
                        .collect::<Vec<_>>(),
                ),
                prop::collection::vec(prop::collection::vec(0..states, states), symbols),
            )
                .prop_map(|(alphabet, states, transitions)| DefinitionParts {
                    alphabet,
                    states,
                    transitions,
                })
        })
    }

    proptest! {
        #[test]
        fn prop_equal_parts_share_id(parts in arb_parts()) {
            let registry = Registry::new();
            let (a, _) = registry.get_or_create_parts(parts.clone()).unwrap();
            let (b, _) = registry.get_or_create_parts(parts).unwrap();
            prop_assert_eq!(a, b);
            prop_assert_eq!(registry.number_of_definitions(), 1);
        }

        #[test]
        fn prop_count_matches_distinct(parts in prop::collection::vec(arb_parts(), 1..20)) {
            let registry = Registry::new();
            let mut distinct = parts.clone();
            distinct.sort_by(|a, b| {
                (&a.alphabet, &a.states, &a.transitions)
                    .cmp(&(&b.alphabet, &b.states, &b.transitions))
            });
            distinct.dedup();

            for p in parts {
                registry.get_or_create_parts(p).unwrap();
            }
            prop_assert_eq!(registry.number_of_definitions(), distinct.len());
        }
    }
}
