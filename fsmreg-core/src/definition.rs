//! Automaton definition types.
//!
//! A definition is an alphabet, a list of states and a dense transition
//! table. The table is symbol-major: `transitions[symbol][state]` is the
//! index of the next state.
//!
//! ```json
//! {
//!   "alphabet": ["0", "1"],
//!   "states": ["A", "B"],
//!   "transitions": [[1, 0], [0, 1]]
//! }
//! ```

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::hash::{Hash, Hasher};

/// Raw definition as declared by callers or configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionParts {
    /// Input symbol labels, in index order.
    pub alphabet: Vec<String>,

    /// State labels, in index order.
    pub states: Vec<String>,

    /// Symbol-major transition table.
    pub transitions: Vec<Vec<usize>>,
}

impl DefinitionParts {
    pub fn new<A, S>(alphabet: &[A], states: &[S], transitions: &[Vec<usize>]) -> Self
    where
        A: AsRef<str>,
        S: AsRef<str>,
    {
        Self {
            alphabet: alphabet.iter().map(|a| a.as_ref().to_string()).collect(),
            states: states.iter().map(|s| s.as_ref().to_string()).collect(),
            transitions: transitions.to_vec(),
        }
    }
}

/// Validated, immutable automaton definition.
///
/// Equality is structural over the alphabet, the states and the table.
#[derive(Debug, Clone)]
pub struct Definition {
    alphabet: Vec<String>,
    states: Vec<String>,
    transitions: Vec<Vec<usize>>,
    digest: [u8; 32],
}

impl Definition {
    /// Validates the parts and builds a definition.
    ///
    /// Fails if the alphabet or state list is empty, if the table is not
    /// exactly `alphabet.len() x states.len()`, or if any entry names a
    /// state that does not exist.
    pub fn from_parts(parts: DefinitionParts) -> Result<Self, CoreError> {
        let DefinitionParts {
            alphabet,
            states,
            transitions,
        } = parts;

        if alphabet.is_empty() {
            return Err(CoreError::invalid_definition("alphabet is empty"));
        }
        if states.is_empty() {
            return Err(CoreError::invalid_definition("state list is empty"));
        }
        if transitions.len() != alphabet.len() {
            return Err(CoreError::invalid_definition(format!(
                "transition table has {} row(s), alphabet has {} symbol(s)",
                transitions.len(),
                alphabet.len()
            )));
        }
        for (symbol, row) in transitions.iter().enumerate() {
            if row.len() != states.len() {
                return Err(CoreError::invalid_definition(format!(
                    "row for symbol '{}' has {} column(s), expected {}",
                    alphabet[symbol],
                    row.len(),
                    states.len()
                )));
            }
            let out_of_range = row.iter().enumerate().find(|&(_, &n)| n >= states.len());
            if let Some((state, next)) = out_of_range {
                return Err(CoreError::invalid_definition(format!(
                    "transition from '{}' on '{}' targets state {} out of {}",
                    states[state],
                    alphabet[symbol],
                    next,
                    states.len()
                )));
            }
        }

        let digest = content_digest(&alphabet, &states, &transitions);

        Ok(Self {
            alphabet,
            states,
            transitions,
            digest,
        })
    }

    /// Convenience constructor over borrowed labels.
    pub fn new<A, S>(
        alphabet: &[A],
        states: &[S],
        transitions: &[Vec<usize>],
    ) -> Result<Self, CoreError>
    where
        A: AsRef<str>,
        S: AsRef<str>,
    {
        Self::from_parts(DefinitionParts::new(alphabet, states, transitions))
    }

    pub fn alphabet(&self) -> &[String] {
        &self.alphabet
    }

    pub fn states(&self) -> &[String] {
        &self.states
    }

    pub fn transitions(&self) -> &[Vec<usize>] {
        &self.transitions
    }

    pub fn alphabet_size(&self) -> usize {
        self.alphabet.len()
    }

    pub fn states_size(&self) -> usize {
        self.states.len()
    }

    /// Returns the next state, or `None` if either index is out of range.
    pub fn next_state(&self, symbol: usize, state: usize) -> Option<usize> {
        self.transitions.get(symbol)?.get(state).copied()
    }

    /// Returns the label of a state.
    pub fn state_label(&self, state: usize) -> Option<&str> {
        self.states.get(state).map(String::as_str)
    }

    /// Returns the label of a symbol.
    pub fn symbol_label(&self, symbol: usize) -> Option<&str> {
        self.alphabet.get(symbol).map(String::as_str)
    }

    /// Resolves a symbol label to its index.
    pub fn symbol_index(&self, label: &str) -> Option<usize> {
        self.alphabet.iter().position(|a| a == label)
    }

    /// Resolves a state label to its index.
    pub fn state_index(&self, label: &str) -> Option<usize> {
        self.states.iter().position(|s| s == label)
    }

    /// SHA-256 of the canonical content encoding.
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    /// Hex-encoded content digest. Stable across processes, unlike registry ids.
    pub fn fingerprint(&self) -> String {
        hex::encode(self.digest)
    }
}

impl PartialEq for Definition {
    fn eq(&self, other: &Self) -> bool {
        // Digest first: unequal content almost always differs here.
        self.digest == other.digest
            && self.alphabet == other.alphabet
            && self.states == other.states
            && self.transitions == other.transitions
    }
}

impl Eq for Definition {}

impl Hash for Definition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Consistent with Eq: equal content implies equal digest.
        self.digest.hash(state);
    }
}

/// Length-prefixed encoding so that label boundaries and table shape are
/// part of the digest.
fn content_digest(alphabet: &[String], states: &[String], transitions: &[Vec<usize>]) -> [u8; 32] {
    fn labels(hasher: &mut Sha256, labels: &[String]) {
        hasher.update((labels.len() as u64).to_le_bytes());
        for label in labels {
            hasher.update((label.len() as u64).to_le_bytes());
            hasher.update(label.as_bytes());
        }
    }

    let mut hasher = Sha256::new();
    hasher.update(b"fsmreg.definition.v1");
    labels(&mut hasher, alphabet);
    labels(&mut hasher, states);
    for row in transitions {
        for &next in row {
            hasher.update((next as u64).to_le_bytes());
        }
    }
    hasher.finalize().into()
}
