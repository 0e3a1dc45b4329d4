// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Mutable [`ScopeRegistry`] filled in by user code.

use regex::Regex;

use crate::step::{self, Pattern};

use super::{
    Binding, ConfigError, Hook, HookFn, HookKind, ScopeId, ScopeKind,
    ScopeNode, ScopeTree, SuiteHook,
};

/// Registry recording scopes, steps and hooks in the order user code
/// declares them.
///
/// The root (global) scope is open from the start. Scopes are opened and
/// closed with a stack discipline, and every step or hook is attached to the
/// innermost open scope.
///
/// # Example
///
/// ```rust
/// # use cucumber_plan::{scope::{ConfigError, ScopeRegistry}, step, World};
/// # use futures::{future::LocalBoxFuture, FutureExt as _};
/// #
/// # #[derive(Debug, Default)]
/// # struct Counter(usize);
/// #
/// # impl World for Counter {
/// #     type Error = std::convert::Infallible;
/// #     async fn new() -> Result<Self, Self::Error> { Ok(Self::default()) }
/// # }
/// #
/// fn increment(w: &mut Counter, _: step::Context) -> LocalBoxFuture<'_, ()> {
///     async move { w.0 += 1 }.boxed_local()
/// }
///
/// fn increment_twice(
///     w: &mut Counter,
///     _: step::Context,
/// ) -> LocalBoxFuture<'_, ()> {
///     async move { w.0 += 2 }.boxed_local()
/// }
///
/// # fn main() -> Result<(), ConfigError> {
/// let mut registry = ScopeRegistry::<Counter>::new();
/// registry.step("I increment", increment)?;
/// _ = registry.feature("Counting", &["smoke"], |r| {
///     _ = r.scenario("twice", &[], |r| {
///         r.step("I increment", increment_twice)
///     })?;
///     Ok(())
/// })?;
/// let tree = registry.finalize()?;
/// assert_eq!(tree.len(), 3);
/// # Ok(())
/// # }
/// ```
pub struct ScopeRegistry<World> {
    nodes: Vec<ScopeNode<World>>,
    stack: Vec<ScopeId>,
}

impl<World> Default for ScopeRegistry<World> {
    fn default() -> Self {
        Self {
            nodes: vec![ScopeNode::new(
                ScopeId::ROOT,
                None,
                ScopeKind::Root,
                String::new(),
                Vec::new(),
            )],
            stack: vec![ScopeId::ROOT],
        }
    }
}

impl<World> std::fmt::Debug for ScopeRegistry<World> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeRegistry")
            .field("nodes", &self.nodes)
            .field("stack", &self.stack)
            .finish()
    }
}

impl<World> ScopeRegistry<World> {
    /// Creates a new [`ScopeRegistry`] with only the root scope open.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the [`ScopeId`] of the innermost open scope.
    #[must_use]
    pub fn current(&self) -> ScopeId {
        // The root scope is never popped.
        self.stack.last().copied().unwrap_or(ScopeId::ROOT)
    }

    fn current_node(&mut self) -> &mut ScopeNode<World> {
        let id = self.current();
        &mut self.nodes[id.index()]
    }

    /// Opens a new scope as a child of the currently open one.
    ///
    /// Tags may be given with or without the leading `@`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidNesting`] if a scope of the `kind` can't live
    ///   inside the currently open scope;
    /// - [`ConfigError::DuplicateScope`] if the currently open scope already
    ///   has a child with the same `kind` and `name` (or any
    ///   [`ScopeKind::Background`] child, when opening a background).
    pub fn open_scope(
        &mut self,
        kind: ScopeKind,
        name: impl Into<String>,
        tags: &[&str],
    ) -> Result<ScopeId, ConfigError> {
        let name = name.into();
        let parent = self.current();
        let parent_kind = self.nodes[parent.index()].kind;

        if !kind.allowed_in(parent_kind) {
            return Err(ConfigError::InvalidNesting {
                parent: parent_kind,
                child: kind,
                name,
            });
        }
        let duplicate = self.nodes[parent.index()].children.iter().any(|c| {
            let c = &self.nodes[c.index()];
            c.kind == kind
                && (kind == ScopeKind::Background || c.is_named(&name))
        });
        if duplicate {
            return Err(ConfigError::DuplicateScope { kind, name });
        }

        let tags = tags
            .iter()
            .map(|t| t.trim_start_matches('@').to_owned())
            .collect();
        let id = ScopeId(self.nodes.len());
        tracing::trace!(%id, %kind, %name, "opening scope");

        self.nodes.push(ScopeNode::new(id, Some(parent), kind, name, tags));
        self.nodes[parent.index()].children.push(id);
        self.stack.push(id);
        Ok(id)
    }

    /// Closes the currently open scope, returning its [`ScopeId`].
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnmatchedClose`] if only the root scope is open.
    pub fn close_scope(&mut self) -> Result<ScopeId, ConfigError> {
        if self.stack.len() <= 1 {
            return Err(ConfigError::UnmatchedClose);
        }
        self.stack.pop().ok_or(ConfigError::UnmatchedClose)
    }

    /// Attaches a step to the currently open scope.
    ///
    /// Registering an identical pattern string again in the same scope
    /// replaces the previous [`step::Step`], while registering it in a nested
    /// scope shadows it for that subtree only.
    ///
    /// # Errors
    ///
    /// Never fails at the moment, returning [`Result`] for symmetry with
    /// other registration methods.
    pub fn register_step(
        &mut self,
        pattern: impl Into<Pattern>,
        step: step::Step<World>,
    ) -> Result<(), ConfigError> {
        let pattern = pattern.into();
        let scope = self.current();
        let key = pattern.as_str().to_owned();
        let node = self.current_node();
        if node
            .steps
            .insert(key, Binding { pattern, step, scope })
            .is_some()
        {
            tracing::debug!(
                %scope,
                "replaced step previously declared with the same pattern",
            );
        }
        Ok(())
    }

    /// Appends a hook to the bucket of its `kind` in the currently open scope.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::HookSignature`] if the callback doesn't fit the
    ///   `kind`;
    /// - [`ConfigError::MisplacedHook`] if a [`HookKind::Setup`] or
    ///   [`HookKind::Teardown`] hook is declared outside the root, a feature
    ///   or a rule scope.
    pub fn register_hook(
        &mut self,
        kind: HookKind,
        hook: HookFn<World>,
    ) -> Result<(), ConfigError> {
        let node = self.current_node();
        if kind.is_suite() && !node.kind.accepts_suite_hooks() {
            return Err(ConfigError::MisplacedHook {
                hook: kind,
                scope: node.kind,
            });
        }
        match (kind, hook) {
            (HookKind::Setup, HookFn::Suite(h)) => node.hooks.setup.push(h),
            (HookKind::Teardown, HookFn::Suite(h)) => {
                node.hooks.teardown.push(h);
            }
            (HookKind::Before, HookFn::Scenario(h)) => {
                node.hooks.before.push(h);
            }
            (HookKind::After, HookFn::Scenario(h)) => node.hooks.after.push(h),
            (hook, _) => return Err(ConfigError::HookSignature { hook }),
        }
        Ok(())
    }

    /// Opens a scope, fills it with the given `body` and closes it.
    ///
    /// # Errors
    ///
    /// If opening the scope fails or the `body` returns an error.
    pub fn scope(
        &mut self,
        kind: ScopeKind,
        name: impl Into<String>,
        tags: &[&str],
        body: impl FnOnce(&mut Self) -> Result<(), ConfigError>,
    ) -> Result<ScopeId, ConfigError> {
        let id = self.open_scope(kind, name, tags)?;
        body(self)?;
        _ = self.close_scope()?;
        Ok(id)
    }

    /// Declares a [`ScopeKind::Feature`] scope.
    ///
    /// # Errors
    ///
    /// See [`ScopeRegistry::scope()`].
    pub fn feature(
        &mut self,
        name: impl Into<String>,
        tags: &[&str],
        body: impl FnOnce(&mut Self) -> Result<(), ConfigError>,
    ) -> Result<ScopeId, ConfigError> {
        self.scope(ScopeKind::Feature, name, tags, body)
    }

    /// Declares a [`ScopeKind::Rule`] scope.
    ///
    /// # Errors
    ///
    /// See [`ScopeRegistry::scope()`].
    pub fn rule(
        &mut self,
        name: impl Into<String>,
        tags: &[&str],
        body: impl FnOnce(&mut Self) -> Result<(), ConfigError>,
    ) -> Result<ScopeId, ConfigError> {
        self.scope(ScopeKind::Rule, name, tags, body)
    }

    /// Declares a [`ScopeKind::Scenario`] scope.
    ///
    /// # Errors
    ///
    /// See [`ScopeRegistry::scope()`].
    pub fn scenario(
        &mut self,
        name: impl Into<String>,
        tags: &[&str],
        body: impl FnOnce(&mut Self) -> Result<(), ConfigError>,
    ) -> Result<ScopeId, ConfigError> {
        self.scope(ScopeKind::Scenario, name, tags, body)
    }

    /// Declares a [`ScopeKind::ScenarioOutline`] scope.
    ///
    /// # Errors
    ///
    /// See [`ScopeRegistry::scope()`].
    pub fn outline(
        &mut self,
        name: impl Into<String>,
        tags: &[&str],
        body: impl FnOnce(&mut Self) -> Result<(), ConfigError>,
    ) -> Result<ScopeId, ConfigError> {
        self.scope(ScopeKind::ScenarioOutline, name, tags, body)
    }

    /// Declares the [`ScopeKind::Background`] scope of the currently open
    /// feature or rule.
    ///
    /// # Errors
    ///
    /// See [`ScopeRegistry::scope()`].
    pub fn background(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<(), ConfigError>,
    ) -> Result<ScopeId, ConfigError> {
        self.scope(ScopeKind::Background, "", &[], body)
    }

    /// Declares a step matched by the given [Cucumber Expression][0].
    ///
    /// # Errors
    ///
    /// [`ConfigError::Pattern`] if the `expr` can't be parsed.
    ///
    /// [0]: https://github.com/cucumber/cucumber-expressions
    pub fn step(
        &mut self,
        expr: &str,
        step: step::Step<World>,
    ) -> Result<(), ConfigError> {
        self.register_step(Pattern::expression(expr)?, step)
    }

    /// Declares a step matched by the given [`Regex`].
    ///
    /// # Errors
    ///
    /// See [`ScopeRegistry::register_step()`].
    pub fn step_regex(
        &mut self,
        re: Regex,
        step: step::Step<World>,
    ) -> Result<(), ConfigError> {
        self.register_step(re, step)
    }

    /// Declares a [`HookKind::Before`] hook.
    ///
    /// # Errors
    ///
    /// See [`ScopeRegistry::register_hook()`].
    pub fn before(&mut self, hook: Hook<World>) -> Result<(), ConfigError> {
        self.register_hook(HookKind::Before, HookFn::Scenario(hook))
    }

    /// Declares a [`HookKind::After`] hook.
    ///
    /// # Errors
    ///
    /// See [`ScopeRegistry::register_hook()`].
    pub fn after(&mut self, hook: Hook<World>) -> Result<(), ConfigError> {
        self.register_hook(HookKind::After, HookFn::Scenario(hook))
    }

    /// Declares a [`HookKind::Setup`] hook.
    ///
    /// # Errors
    ///
    /// See [`ScopeRegistry::register_hook()`].
    pub fn setup(&mut self, hook: SuiteHook) -> Result<(), ConfigError> {
        self.register_hook(HookKind::Setup, HookFn::Suite(hook))
    }

    /// Declares a [`HookKind::Teardown`] hook.
    ///
    /// # Errors
    ///
    /// See [`ScopeRegistry::register_hook()`].
    pub fn teardown(&mut self, hook: SuiteHook) -> Result<(), ConfigError> {
        self.register_hook(HookKind::Teardown, HookFn::Suite(hook))
    }

    /// Freezes this [`ScopeRegistry`] into an immutable [`ScopeTree`].
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnclosedScope`] if any scope besides the root one is
    /// still open.
    pub fn finalize(self) -> Result<ScopeTree<World>, ConfigError> {
        if let Some(open) = self.stack.get(1) {
            let node = &self.nodes[open.index()];
            return Err(ConfigError::UnclosedScope {
                kind: node.kind,
                name: node.name.clone(),
            });
        }
        tracing::debug!(scopes = self.nodes.len(), "scope registry finalized");
        Ok(ScopeTree { nodes: self.nodes })
    }
}
