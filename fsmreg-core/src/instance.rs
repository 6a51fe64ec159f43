//! Automaton instances.
//!
//! An instance is a lightweight handle on a registered definition plus its
//! own current state. Many instances, on many threads, may share one
//! definition; each instance is mutated by a single owner.

use crate::checksum::checksum;
use crate::definition::Definition;
use crate::error::CoreError;
use crate::registry::{Registry, RegistryId};
use std::sync::Arc;

/// A running automaton.
#[derive(Debug, Clone)]
pub struct Automaton {
    id: RegistryId,
    definition: Arc<Definition>,
    state: usize,
}

impl Automaton {
    /// Creates an automaton whose definition lives in the process-wide
    /// registry.
    pub fn create<A, S>(
        alphabet: &[A],
        states: &[S],
        transitions: &[Vec<usize>],
        initial_state: usize,
    ) -> Result<Self, CoreError>
    where
        A: AsRef<str>,
        S: AsRef<str>,
    {
        Self::create_in(
            Registry::global(),
            alphabet,
            states,
            transitions,
            initial_state,
        )
    }

    /// Creates an automaton whose definition lives in `registry`.
    pub fn create_in<A, S>(
        registry: &Registry,
        alphabet: &[A],
        states: &[S],
        transitions: &[Vec<usize>],
        initial_state: usize,
    ) -> Result<Self, CoreError>
    where
        A: AsRef<str>,
        S: AsRef<str>,
    {
        let definition = Definition::new(alphabet, states, transitions)?;
        let (id, definition) = registry.register(definition);
        Self::bind(id, definition, initial_state)
    }

    /// Creates an automaton bound to an already registered definition.
    pub fn from_id(
        registry: &Registry,
        id: RegistryId,
        initial_state: usize,
    ) -> Result<Self, CoreError> {
        let definition = registry.get(id)?;
        Self::bind(id, definition, initial_state)
    }

    fn bind(
        id: RegistryId,
        definition: Arc<Definition>,
        initial_state: usize,
    ) -> Result<Self, CoreError> {
        if initial_state >= definition.states_size() {
            return Err(CoreError::InvalidState {
                state: initial_state,
                states: definition.states_size(),
            });
        }
        Ok(Self {
            id,
            definition,
            state: initial_state,
        })
    }

    /// Applies a symbol.
    ///
    /// Returns false and leaves the state untouched if `symbol` is not in
    /// the alphabet.
    pub fn apply(&mut self, symbol: usize) -> bool {
        match self.definition.next_state(symbol, self.state) {
            Some(next) => {
                self.state = next;
                true
            }
            None => false,
        }
    }

    /// Applies a symbol given by label.
    pub fn apply_label(&mut self, label: &str) -> bool {
        match self.definition.symbol_index(label) {
            Some(symbol) => self.apply(symbol),
            None => false,
        }
    }

    /// Current state index.
    pub fn state(&self) -> usize {
        self.state
    }

    /// Label of the current state.
    pub fn state_label(&self) -> &str {
        // `state` is always in range.
        &self.definition.states()[self.state]
    }

    /// Resolves a state index to its label.
    pub fn print_state(&self, state: usize) -> Option<&str> {
        self.definition.state_label(state)
    }

    /// Checksum of the definition content and the current state.
    pub fn checksum(&self) -> u64 {
        checksum(&self.definition, self.state)
    }

    pub fn id(&self) -> RegistryId {
        self.id
    }

    pub fn definition(&self) -> &Arc<Definition> {
        &self.definition
    }

    /// Overwrites the current state with a previously persisted one.
    ///
    /// Used by persistence only; driving code goes through `apply`.
    pub fn restore_state(&mut self, state: usize) -> Result<(), CoreError> {
        if state >= self.definition.states_size() {
            return Err(CoreError::InvalidState {
                state,
                states: self.definition.states_size(),
            });
        }
        self.state = state;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::DefinitionParts;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::sync::Barrier;

    fn alphabet() -> Vec<String> {
        vec!["0".to_string(), "1".to_string()]
    }

    fn states() -> Vec<String> {
        vec!["A".to_string(), "B".to_string()]
    }

    fn toggle_table() -> Vec<Vec<usize>> {
        vec![vec![1, 0], vec![0, 1]]
    }

    fn random_machines(n: usize, seed: u64) -> Vec<DefinitionParts> {
        let labels = ["A", "B", "C", "D", "E", "F", "G", "H", "I", "J"];
        let symbols = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        (0..n)
            .map(|_| {
                let ns = rng.gen_range(2..labels.len());
                let na = rng.gen_range(1..symbols.len());
                let transitions: Vec<Vec<usize>> = (0..na)
                    .map(|_| (0..ns).map(|_| rng.gen_range(0..ns)).collect())
                    .collect();
                DefinitionParts::new(&symbols[..na], &labels[..ns], &transitions)
            })
            .collect()
    }

    #[test]
    fn test_toggle_scenario() {
        let registry = Registry::new();
        let mut sm = Automaton::create_in(&registry, &alphabet(), &states(), &toggle_table(), 0)
            .unwrap();

        assert!(sm.apply(0));
        assert_eq!(sm.state(), 1);
        assert_eq!(sm.state_label(), "B");

        assert!(sm.apply(0));
        assert_eq!(sm.state(), 0);

        assert!(sm.apply(1));
        assert_eq!(sm.state(), 0);
        assert_eq!(sm.print_state(sm.state()), Some("A"));
        assert_eq!(sm.print_state(1), Some("B"));
        assert_eq!(sm.print_state(2), None);
    }

    #[test]
    fn test_apply_label() {
        let registry = Registry::new();
        let mut sm = Automaton::create_in(&registry, &alphabet(), &states(), &toggle_table(), 0)
            .unwrap();

        assert!(sm.apply_label("0"));
        assert_eq!(sm.state_label(), "B");
        assert!(!sm.apply_label("x"));
        assert_eq!(sm.state_label(), "B");
    }

    #[test]
    fn test_invalid_symbol_leaves_state() {
        let registry = Registry::new();
        let mut sm = Automaton::create_in(&registry, &alphabet(), &states(), &toggle_table(), 1)
            .unwrap();

        assert!(!sm.apply(2));
        assert_eq!(sm.state(), 1);
    }

    #[test]
    fn test_invalid_initial_state() {
        let registry = Registry::new();
        let result = Automaton::create_in(&registry, &alphabet(), &states(), &toggle_table(), 2);
        assert_eq!(
            result.unwrap_err(),
            CoreError::InvalidState {
                state: 2,
                states: 2
            }
        );
    }

    #[test]
    fn test_invalid_definition() {
        let registry = Registry::new();
        let result = Automaton::create_in(&registry, &alphabet(), &states(), &[vec![0, 0]], 0);
        assert!(matches!(result, Err(CoreError::InvalidDefinition { .. })));
        assert_eq!(registry.number_of_definitions(), 0);
    }

    #[test]
    fn test_from_id() {
        let registry = Registry::new();
        let id = registry
            .get_or_create(&alphabet(), &states(), &toggle_table())
            .unwrap();

        let sm = Automaton::from_id(&registry, id, 1).unwrap();
        assert_eq!(sm.id(), id);
        assert_eq!(sm.state_label(), "B");

        registry.clear();
        assert!(matches!(
            Automaton::from_id(&registry, id, 0),
            Err(CoreError::UnknownDefinition { .. })
        ));
    }

    #[test]
    fn test_instances_share_definition() {
        let registry = Registry::new();
        let a = Automaton::create_in(&registry, &alphabet(), &states(), &toggle_table(), 0)
            .unwrap();
        let b = Automaton::create_in(&registry, &alphabet(), &states(), &toggle_table(), 1)
            .unwrap();

        assert_eq!(a.id(), b.id());
        assert!(Arc::ptr_eq(a.definition(), b.definition()));
        assert_ne!(a.checksum(), b.checksum());
    }

    #[test]
    fn test_checksum_follows_state() {
        let registry = Registry::new();
        let mut a = Automaton::create_in(&registry, &alphabet(), &states(), &toggle_table(), 0)
            .unwrap();
        let b = Automaton::create_in(&registry, &alphabet(), &states(), &toggle_table(), 1)
            .unwrap();

        a.apply(0);
        assert_eq!(a.checksum(), b.checksum());
    }

    #[test]
    fn test_restore_state() {
        let registry = Registry::new();
        let mut sm = Automaton::create_in(&registry, &alphabet(), &states(), &toggle_table(), 0)
            .unwrap();

        sm.restore_state(1).unwrap();
        assert_eq!(sm.state(), 1);
        assert!(matches!(
            sm.restore_state(5),
            Err(CoreError::InvalidState { .. })
        ));
        assert_eq!(sm.state(), 1);
    }

    #[test]
    fn test_global_create() {
        let mut sm = Automaton::create(&alphabet(), &states(), &toggle_table(), 0).unwrap();
        assert!(sm.apply(0));
        assert_eq!(sm.state_label(), "B");
        assert!(Registry::global().lookup(sm.id()).is_some());
    }

    #[test]
    fn test_every_transition() {
        let registry = Registry::new();
        for machine in random_machines(5, 1) {
            for symbol in 0..machine.alphabet.len() {
                for initial in 0..machine.states.len() {
                    let mut sm = Automaton::create_in(
                        &registry,
                        &machine.alphabet,
                        &machine.states,
                        &machine.transitions,
                        initial,
                    )
                    .unwrap();

                    assert!(sm.apply(symbol));
                    let expected = &machine.states[machine.transitions[symbol][initial]];
                    assert_eq!(sm.print_state(sm.state()), Some(expected.as_str()));
                }
            }
        }
    }

    #[test]
    fn test_multithreaded() {
        // Each machine is registered once and no thread observes a
        // partially built definition.
        let registry = Registry::new();

        let mut machines = random_machines(100, 7);
        machines.sort_by(|a, b| {
            (&a.alphabet, &a.states, &a.transitions).cmp(&(&b.alphabet, &b.states, &b.transitions))
        });
        machines.dedup();

        let threads = 20;
        let iterations = 5000;
        let barrier = Barrier::new(threads);

        let results: Vec<(usize, Vec<usize>)> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    s.spawn(|| {
                        let mut rng = ChaCha8Rng::seed_from_u64(42);
                        let mut failures = 0;
                        let mut trace = Vec::with_capacity(iterations);
                        barrier.wait();
                        for _ in 0..iterations {
                            let m = &machines[rng.gen_range(0..machines.len())];
                            let mut sm = Automaton::create_in(
                                &registry,
                                &m.alphabet,
                                &m.states,
                                &m.transitions,
                                0,
                            )
                            .unwrap();
                            if !sm.apply(0) {
                                failures += 1;
                            }
                            trace.push(sm.state());
                        }
                        (failures, trace)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for (failures, _) in &results {
            assert_eq!(*failures, 0);
        }
        for pair in results.windows(2) {
            assert_eq!(pair[0].1, pair[1].1);
        }
        assert_eq!(registry.number_of_definitions(), machines.len());
    }
}
