// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Configuration errors, fatal at registration time.

use derive_more::with_trait::{Display, Error};

use crate::step::PatternError;

use super::{HookKind, ScopeKind};

/// Error of declaring scopes, steps or hooks in a [`ScopeRegistry`].
///
/// Any of these stops the run before a plan is built.
///
/// [`ScopeRegistry`]: super::ScopeRegistry
#[derive(Clone, Debug, Display, Error)]
pub enum ConfigError {
    /// [`ScopeRegistry::close_scope()`] called with no open scope.
    ///
    /// [`ScopeRegistry::close_scope()`]: super::ScopeRegistry::close_scope
    #[display("`close_scope()` called without a matching `open_scope()`")]
    UnmatchedClose,

    /// Registry finalized while some scope is still open.
    #[display("{kind} scope `{name}` is never closed")]
    UnclosedScope {
        /// Kind of the open scope.
        kind: ScopeKind,

        /// Name of the open scope.
        name: String,
    },

    /// Scope opened inside a scope it can't belong to.
    #[display("{child} scope `{name}` can't be declared inside a {parent} scope")]
    InvalidNesting {
        /// Kind of the currently open scope.
        parent: ScopeKind,

        /// Kind of the scope being opened.
        child: ScopeKind,

        /// Name of the scope being opened.
        name: String,
    },

    /// Scope with the same kind and name declared twice in the same parent.
    #[display("{kind} scope `{name}` is declared more than once")]
    DuplicateScope {
        /// Kind of the duplicated scope.
        kind: ScopeKind,

        /// Name of the duplicated scope.
        name: String,
    },

    /// Once-per-suite hook declared in a scope not forming a suite.
    #[display("{hook} hook can't be declared inside a {scope} scope")]
    MisplacedHook {
        /// Kind of the rejected hook.
        hook: HookKind,

        /// Kind of the currently open scope.
        scope: ScopeKind,
    },

    /// Hook callback doesn't fit its [`HookKind`].
    #[display("callback doesn't fit a {hook} hook")]
    HookSignature {
        /// Kind of the rejected hook.
        hook: HookKind,
    },

    /// Step pattern can't be parsed.
    #[display("{_0}")]
    Pattern(PatternError),
}

impl From<PatternError> for ConfigError {
    fn from(e: PatternError) -> Self {
        Self::Pattern(e)
    }
}
