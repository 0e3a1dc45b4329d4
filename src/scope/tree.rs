// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Scope nodes and the frozen [`ScopeTree`].

use std::fmt;

use linked_hash_map::LinkedHashMap;

use super::{Binding, Hooks, Mode, ScopeId, ScopeKind};

/// Single declaration scope.
pub struct ScopeNode<World> {
    pub(super) id: ScopeId,
    pub(super) parent: Option<ScopeId>,
    pub(super) kind: ScopeKind,
    pub(super) name: String,
    pub(super) mode: Mode,
    pub(super) tags: Vec<String>,
    pub(super) steps: LinkedHashMap<String, Binding<World>>,
    pub(super) hooks: Hooks<World>,
    pub(super) children: Vec<ScopeId>,
}

impl<World> ScopeNode<World> {
    pub(super) fn new(
        id: ScopeId,
        parent: Option<ScopeId>,
        kind: ScopeKind,
        name: String,
        tags: Vec<String>,
    ) -> Self {
        Self {
            id,
            parent,
            kind,
            name,
            mode: Mode::from_tags(&tags),
            tags,
            steps: LinkedHashMap::new(),
            hooks: Hooks::default(),
            children: Vec::new(),
        }
    }

    /// Returns the [`ScopeId`] of this scope.
    #[must_use]
    pub const fn id(&self) -> ScopeId {
        self.id
    }

    /// Returns the [`ScopeId`] of the parent scope, if any.
    #[must_use]
    pub const fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    /// Returns the [`ScopeKind`] of this scope.
    #[must_use]
    pub const fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// Returns the name of this scope.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the [`Mode`] derived from the tags of this scope.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns the tags declared on this scope (without the leading `@`).
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the steps declared in this scope, keyed by their pattern
    /// string, in declaration order.
    pub fn steps(&self) -> impl Iterator<Item = &Binding<World>> {
        self.steps.values()
    }

    /// Returns the hooks declared in this scope.
    #[must_use]
    pub const fn hooks(&self) -> &Hooks<World> {
        &self.hooks
    }

    /// Returns the children of this scope in declaration order.
    #[must_use]
    pub fn children(&self) -> &[ScopeId] {
        &self.children
    }

    /// Indicates whether this scope declares the given document node name.
    pub(crate) fn is_named(&self, name: &str) -> bool {
        self.name.trim() == name.trim()
    }
}

impl<World> fmt::Debug for ScopeNode<World> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeNode")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("tags", &self.tags)
            .field("steps", &self.steps.keys().collect::<Vec<_>>())
            .field("hooks", &self.hooks)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// Immutable tree of declaration scopes, produced by
/// [`ScopeRegistry::finalize()`].
///
/// [`ScopeRegistry::finalize()`]: super::ScopeRegistry::finalize
pub struct ScopeTree<World> {
    pub(super) nodes: Vec<ScopeNode<World>>,
}

impl<World> fmt::Debug for ScopeTree<World> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.nodes).finish()
    }
}

impl<World> ScopeTree<World> {
    /// Returns the root (global) scope.
    #[must_use]
    pub fn root(&self) -> &ScopeNode<World> {
        &self.nodes[ScopeId::ROOT.index()]
    }

    /// Returns the scope with the given [`ScopeId`].
    ///
    /// # Panics
    ///
    /// If the `id` doesn't belong to this [`ScopeTree`].
    #[must_use]
    pub fn node(&self, id: ScopeId) -> &ScopeNode<World> {
        &self.nodes[id.index()]
    }

    /// Returns the number of scopes, including the root one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`, as the root scope is always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over all the scopes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ScopeNode<World>> {
        self.nodes.iter()
    }

    /// Finds a direct child of the `parent` scope with the given `kind`
    /// matching the given document node `name`.
    ///
    /// [`ScopeKind::Background`] scopes match regardless of the `name`.
    #[must_use]
    pub fn find_child(
        &self,
        parent: ScopeId,
        kind: ScopeKind,
        name: &str,
    ) -> Option<ScopeId> {
        self.node(parent).children.iter().copied().find(|id| {
            let child = self.node(*id);
            child.kind == kind
                && (kind == ScopeKind::Background || child.is_named(name))
        })
    }

    /// Returns the chain of scopes from the root one down to the given `id`
    /// (inclusive).
    #[must_use]
    pub fn chain(&self, id: ScopeId) -> Vec<ScopeId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.node(current).parent {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }
}
