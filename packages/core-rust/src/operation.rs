//! Operations and the declarative capability predicates evaluated against them.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// An immutable description of what a caller is asking providers to do.
///
/// Two operations with equal caching keys are the same query: every provider
/// must answer `provides` identically for both. Operations without a key are
/// never served from a cache.
pub trait Operation: Send + Sync {
    /// Key type used to memoize dispatch results.
    type Key: Eq + Hash + Clone + Debug + Send + Sync + 'static;

    /// Operation family, e.g. `"create-view"`.
    fn kind(&self) -> &str;

    /// Key under which dispatch results may be memoized; `None` disables
    /// caching for this operation.
    fn caching_key(&self) -> Option<Self::Key> {
        None
    }

    /// Named descriptive attribute consulted by [`Capability::Hint`].
    fn hint(&self, _name: &str) -> Option<&str> {
        None
    }
}

/// Declarative predicate deciding whether a provider could possibly handle an
/// operation, evaluated without instantiating the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Capability {
    Always,
    Never,
    /// Operation kind is one of the listed kinds.
    Kinds { kinds: BTreeSet<String> },
    /// Named hint is present and equal to one of `values`.
    Hint {
        name: String,
        values: BTreeSet<String>,
    },
    AllOf { of: Vec<Capability> },
    AnyOf { of: Vec<Capability> },
    Not { of: Box<Capability> },
}

impl Capability {
    /// Matches operations whose kind is one of `kinds`.
    pub fn kinds<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Capability::Kinds {
            kinds: kinds.into_iter().map(Into::into).collect(),
        }
    }

    /// Matches operations whose `name` hint equals one of `values`.
    pub fn hint<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Capability::Hint {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn negate(self) -> Self {
        Capability::Not { of: Box::new(self) }
    }

    /// Evaluates the predicate against `op`.
    pub fn matches<O: Operation + ?Sized>(&self, op: &O) -> bool {
        match self {
            Capability::Always => true,
            Capability::Never => false,
            Capability::Kinds { kinds } => kinds.contains(op.kind()),
            Capability::Hint { name, values } => {
                op.hint(name).is_some_and(|value| values.contains(value))
            }
            Capability::AllOf { of } => of.iter().all(|c| c.matches(op)),
            Capability::AnyOf { of } => of.iter().any(|c| c.matches(op)),
            Capability::Not { of } => !of.matches(op),
        }
    }
}
