//! Ranked demonstration choices.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Demonstration names in the order they should be tried, with the value
/// the selector assigned to each.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Agenda {
    /// Demonstration names.
    pub actions: Vec<String>,
    /// One value per action: a cost for greedy ranking, a value-function
    /// score for beam search.
    pub values: Vec<f64>,
}

impl Agenda {
    /// Builds an agenda from `(action, value)` pairs, keeping their order.
    #[must_use]
    pub fn from_pairs(pairs: Vec<(String, f64)>) -> Self {
        let (actions, values) = pairs.into_iter().unzip();
        Self { actions, values }
    }

    /// Number of actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether there are no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// The first action, if any.
    #[must_use]
    pub fn first(&self) -> Option<(&str, f64)> {
        self.iter().next()
    }

    /// `(action, value)` pairs in agenda order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.actions
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}
