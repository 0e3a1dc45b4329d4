// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Merged pattern table of a scope chain.

use std::fmt;

use itertools::Itertools as _;
use linked_hash_map::LinkedHashMap;

use crate::{
    scope::{Binding, ScopeId, ScopeTree},
    step::CaptureName,
};

use super::ResolutionError;

/// Ordered map of pattern strings to the [`Binding`]s visible at the end of a
/// chain of scopes.
///
/// Built from the root scope down: a pattern redeclared in a descendant scope
/// overwrites the ancestor's entry (keeping its position), while new patterns
/// are appended.
pub struct PatternTable<World> {
    entries: LinkedHashMap<String, Binding<World>>,
}

impl<World> fmt::Debug for PatternTable<World> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, b)| (k, b.scope)))
            .finish()
    }
}

impl<World> PatternTable<World> {
    /// Merges the steps of the given `chain` of scopes, ordered from the
    /// outermost to the innermost.
    #[must_use]
    pub fn merge(tree: &ScopeTree<World>, chain: &[ScopeId]) -> Self {
        let mut entries = LinkedHashMap::new();
        for id in chain {
            for binding in tree.node(*id).steps() {
                let pattern = binding.pattern.as_str();
                if let Some(entry) = entries.get_mut(pattern) {
                    *entry = binding.clone();
                } else {
                    _ = entries.insert(pattern.to_owned(), binding.clone());
                }
            }
        }
        Self { entries }
    }

    /// Returns the [`Binding`] declared for the given pattern string.
    #[must_use]
    pub fn get(&self, pattern: &str) -> Option<&Binding<World>> {
        self.entries.get(pattern)
    }

    /// Returns the number of visible patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Indicates whether no patterns are visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the visible [`Binding`]s in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Binding<World>> {
        self.entries.values()
    }

    /// Resolves the given `step` text, requiring exactly one pattern to match.
    ///
    /// # Errors
    ///
    /// - [`ResolutionError::Unresolved`] if nothing matches;
    /// - [`ResolutionError::Ambiguous`] if more than one pattern matches.
    pub fn resolve(
        &self,
        scenario: &str,
        step: &str,
    ) -> Result<(&Binding<World>, Vec<(CaptureName, String)>), ResolutionError>
    {
        let mut found = self
            .entries
            .values()
            .filter_map(|b| b.pattern.captures(step).map(|m| (b, m)))
            .collect::<Vec<_>>();

        if found.len() > 1 {
            return Err(ResolutionError::Ambiguous {
                scenario: scenario.to_owned(),
                step: step.to_owned(),
                patterns: found
                    .into_iter()
                    .map(|(b, _)| b.pattern.as_str().to_owned())
                    .sorted()
                    .collect(),
            });
        }
        found.pop().ok_or_else(|| ResolutionError::Unresolved {
            scenario: scenario.to_owned(),
            step: step.to_owned(),
        })
    }
}
