// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Declaration scopes of steps and hooks.
//!
//! User code declares features, rules, scenarios and backgrounds in a
//! [`ScopeRegistry`], attaching steps and hooks to the currently open scope.
//! Once finalized, the registry turns into an immutable [`ScopeTree`] read by
//! the [`plan::Builder`].
//!
//! A step declared in some scope is visible to all of its descendants, unless
//! a descendant redeclares the same pattern, in which case the innermost
//! declaration wins inside that descendant's subtree.
//!
//! [`plan::Builder`]: crate::plan::Builder

mod error;
mod registry;
mod tree;

use std::fmt;

use derive_more::with_trait::Display;
use futures::future::LocalBoxFuture;

use crate::step::{self, Pattern};

pub use self::{
    error::ConfigError,
    registry::ScopeRegistry,
    tree::{ScopeNode, ScopeTree},
};

/// Hook running around every scenario falling into its scope.
///
/// Receives the executed (already expanded) [`gherkin::Scenario`] and the
/// scenario's [`World`].
///
/// [`World`]: crate::World
pub type Hook<World> = for<'a> fn(
    &'a gherkin::Scenario,
    &'a mut World,
) -> LocalBoxFuture<'a, ()>;

/// Hook running once for a whole feature or rule (or the whole run, when
/// declared at the root scope).
pub type SuiteHook = fn() -> LocalBoxFuture<'static, ()>;

/// Callback of any [`HookKind`].
pub enum HookFn<World> {
    /// Callback of a [`HookKind::Before`] or [`HookKind::After`] hook.
    Scenario(Hook<World>),

    /// Callback of a [`HookKind::Setup`] or [`HookKind::Teardown`] hook.
    Suite(SuiteHook),
}

// Manual implementation is required to omit the redundant `World: Clone` trait
// bound imposed by `#[derive(Clone)]`.
impl<World> Clone for HookFn<World> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<World> Copy for HookFn<World> {}

impl<World> fmt::Debug for HookFn<World> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scenario(h) => write!(f, "Scenario({h:p})"),
            Self::Suite(h) => write!(f, "Suite({h:p})"),
        }
    }
}

/// Index of a scope inside a [`ScopeRegistry`] or a [`ScopeTree`].
#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("#{_0}")]
pub struct ScopeId(usize);

impl ScopeId {
    /// [`ScopeId`] of the root (global) scope.
    pub const ROOT: Self = Self(0);

    /// Returns the index of this [`ScopeId`].
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Kind of a declaration scope.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum ScopeKind {
    /// Global scope, visible to every scenario.
    #[display("root")]
    Root,

    /// Scope of a [`gherkin::Feature`].
    #[display("feature")]
    Feature,

    /// Scope of a [`gherkin::Rule`].
    #[display("rule")]
    Rule,

    /// Scope of a plain [`gherkin::Scenario`].
    #[display("scenario")]
    Scenario,

    /// Scope of a [`gherkin::Scenario`] with [`gherkin::Examples`].
    #[display("scenario outline")]
    ScenarioOutline,

    /// Scope of a [`gherkin::Background`] of the enclosing feature or rule.
    #[display("background")]
    Background,
}

impl ScopeKind {
    /// Indicates whether a scope of this kind may be opened directly inside a
    /// `parent` scope.
    #[must_use]
    pub const fn allowed_in(self, parent: Self) -> bool {
        match self {
            Self::Root => false,
            Self::Feature => matches!(parent, Self::Root),
            Self::Rule => matches!(parent, Self::Feature),
            Self::Scenario | Self::ScenarioOutline | Self::Background => {
                matches!(parent, Self::Feature | Self::Rule)
            }
        }
    }

    /// Indicates whether [`HookKind::Setup`] and [`HookKind::Teardown`] hooks
    /// make sense in this scope.
    #[must_use]
    pub const fn accepts_suite_hooks(self) -> bool {
        matches!(self, Self::Root | Self::Feature | Self::Rule)
    }
}

/// Execution mode of a scope or a document node.
#[derive(Clone, Copy, Debug, Default, Display, Eq, Hash, PartialEq)]
pub enum Mode {
    /// Executed as usual.
    #[default]
    #[display("default")]
    Default,

    /// Never executed, but still reported.
    #[display("skip")]
    Skip,

    /// Restricts execution of its siblings to [`Mode::Only`] ones.
    #[display("only")]
    Only,
}

impl Mode {
    /// Tag switching a node into [`Mode::Skip`].
    pub const SKIP_TAG: &'static str = "skip";

    /// Tag switching a node into [`Mode::Only`].
    pub const ONLY_TAG: &'static str = "only";

    /// Derives a [`Mode`] from the given `tags` (without the leading `@`).
    ///
    /// [`Mode::Skip`] takes precedence over [`Mode::Only`].
    #[must_use]
    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tags.into_iter().fold(Self::Default, |mode, tag| {
            match (mode, tag.as_ref()) {
                (_, Self::SKIP_TAG) | (Self::Skip, _) => Self::Skip,
                (_, Self::ONLY_TAG) => Self::Only,
                (m, _) => m,
            }
        })
    }
}

/// Kind of a hook, selecting the bucket it's registered into.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum HookKind {
    /// Runs once before all the scenarios of a feature or rule.
    #[display("setup")]
    Setup,

    /// Runs before every scenario of the scope.
    #[display("before")]
    Before,

    /// Runs after every scenario of the scope.
    #[display("after")]
    After,

    /// Runs once after all the scenarios of a feature or rule.
    #[display("teardown")]
    Teardown,
}

impl HookKind {
    /// Indicates whether this [`HookKind`] runs once per suite rather than
    /// once per scenario.
    #[must_use]
    pub const fn is_suite(self) -> bool {
        matches!(self, Self::Setup | Self::Teardown)
    }
}

/// Step declared in some scope.
pub struct Binding<World> {
    /// [`Pattern`] the step is matched with.
    pub pattern: Pattern,

    /// Step function.
    pub step: step::Step<World>,

    /// Scope the step was declared in.
    pub scope: ScopeId,
}

// Manual implementation is required to omit the redundant `World: Clone` trait
// bound imposed by `#[derive(Clone)]`.
impl<World> Clone for Binding<World> {
    fn clone(&self) -> Self {
        Self { pattern: self.pattern.clone(), step: self.step, scope: self.scope }
    }
}

impl<World> fmt::Debug for Binding<World> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("pattern", &self.pattern)
            .field("step", &format_args!("{:p}", self.step))
            .field("scope", &self.scope)
            .finish()
    }
}

/// Hooks declared in some scope, bucketed by their [`HookKind`].
pub struct Hooks<World> {
    /// [`HookKind::Setup`] hooks in registration order.
    pub setup: Vec<SuiteHook>,

    /// [`HookKind::Before`] hooks in registration order.
    pub before: Vec<Hook<World>>,

    /// [`HookKind::After`] hooks in registration order.
    pub after: Vec<Hook<World>>,

    /// [`HookKind::Teardown`] hooks in registration order.
    pub teardown: Vec<SuiteHook>,
}

impl<World> Default for Hooks<World> {
    fn default() -> Self {
        Self {
            setup: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
            teardown: Vec::new(),
        }
    }
}

impl<World> fmt::Debug for Hooks<World> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("setup", &self.setup.len())
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .field("teardown", &self.teardown.len())
            .finish()
    }
}

impl<World> Hooks<World> {
    /// Indicates whether no hooks are declared at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.setup.is_empty()
            && self.before.is_empty()
            && self.after.is_empty()
            && self.teardown.is_empty()
    }
}
