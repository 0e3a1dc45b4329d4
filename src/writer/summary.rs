// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Subscriber`] collecting a summary of execution.

use std::{cell::RefCell, fmt::Write as _, rc::Rc};

use crate::{
    event::{Metadata, Phase, Source, Status},
    observer::{Error, Subscriber},
    plan::NodeId,
    scope::HookKind,
};

use super::Styles;

/// Statistics of nodes by their terminal [`Status`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Stats {
    /// Number of passed nodes.
    pub passed: usize,

    /// Number of failed nodes.
    pub failed: usize,

    /// Number of nodes never executed.
    pub pending: usize,

    /// Number of nodes skipped because of a preceding failure.
    pub skipped: usize,
}

impl Stats {
    /// Returns the total number of nodes.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.passed + self.failed + self.pending + self.skipped
    }

    fn record(&mut self, status: Status) {
        match status {
            Status::Passed => self.passed += 1,
            Status::Failed => self.failed += 1,
            Status::Pending => self.pending += 1,
            Status::Skipped => self.skipped += 1,
            Status::Running => {}
        }
    }
}

/// Totals of an execution collected by a [`Summary`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Totals {
    /// Number of started [`Feature`]s.
    ///
    /// [`Feature`]: gherkin::Feature
    pub features: usize,

    /// Number of started [`Rule`]s.
    ///
    /// [`Rule`]: gherkin::Rule
    pub rules: usize,

    /// Scenarios [`Stats`].
    pub scenarios: Stats,

    /// [`Step`]s [`Stats`], background ones included.
    ///
    /// [`Step`]: gherkin::Step
    pub steps: Stats,

    /// Number of failed hooks of any [`HookKind`].
    pub hook_errors: usize,
}

/// [`Subscriber`] collecting [`Totals`] of an execution.
///
/// Cloning is cheap and every clone observes the same [`Totals`], so one
/// clone may be subscribed while another one is kept for inspecting the
/// results afterwards.
#[derive(Clone, Debug, Default)]
pub struct Summary {
    totals: Rc<RefCell<Totals>>,
}

impl Summary {
    /// Creates a new empty [`Summary`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the [`Totals`] collected so far.
    #[must_use]
    pub fn totals(&self) -> Totals {
        *self.totals.borrow()
    }

    /// Indicates whether there have been failed scenarios or hooks.
    #[must_use]
    pub fn execution_has_failed(&self) -> bool {
        let totals = self.totals.borrow();
        totals.scenarios.failed > 0 || totals.hook_errors > 0
    }

    /// Renders the collected [`Totals`] with the given [`Styles`].
    #[must_use]
    pub fn render(&self, styles: &Styles) -> String {
        let t = self.totals();

        let mut out = styles.bold("[Summary]").into_owned();
        let _ = write!(
            out,
            "\n{}\n{}\n{}{}\n{}{}",
            plural(t.features, "feature"),
            plural(t.rules, "rule"),
            plural(t.scenarios.total(), "scenario"),
            breakdown(&t.scenarios, styles),
            plural(t.steps.total(), "step"),
            breakdown(&t.steps, styles),
        );
        if t.hook_errors > 0 {
            let errors = plural(t.hook_errors, "hook error");
            let _ = write!(out, "\n{}", styles.err(errors));
        }
        out
    }

    fn update(&self, f: impl FnOnce(&mut Totals)) {
        f(&mut self.totals.borrow_mut());
    }
}

impl Subscriber for Summary {
    fn on_feature(
        &mut self,
        _: Metadata,
        _: NodeId,
        _: &Source<gherkin::Feature>,
        phase: Phase,
    ) -> Result<(), Error> {
        if phase == Phase::Started {
            self.update(|t| t.features += 1);
        }
        Ok(())
    }

    fn on_rule(
        &mut self,
        _: Metadata,
        _: NodeId,
        _: &Source<gherkin::Rule>,
        phase: Phase,
    ) -> Result<(), Error> {
        if phase == Phase::Started {
            self.update(|t| t.rules += 1);
        }
        Ok(())
    }

    fn on_scenario(
        &mut self,
        _: Metadata,
        _: NodeId,
        _: &Source<gherkin::Scenario>,
        _: &str,
        phase: Phase,
    ) -> Result<(), Error> {
        if let Phase::Finished(status) = phase {
            self.update(|t| t.scenarios.record(status));
        }
        Ok(())
    }

    fn on_background(
        &mut self,
        _: Metadata,
        _: NodeId,
        _: &Source<gherkin::Step>,
        phase: Phase,
    ) -> Result<(), Error> {
        if let Phase::Finished(status) = phase {
            self.update(|t| t.steps.record(status));
        }
        Ok(())
    }

    fn on_step(
        &mut self,
        _: Metadata,
        _: NodeId,
        _: &Source<gherkin::Step>,
        phase: Phase,
    ) -> Result<(), Error> {
        if let Phase::Finished(status) = phase {
            self.update(|t| t.steps.record(status));
        }
        Ok(())
    }

    fn on_hook(
        &mut self,
        _: Metadata,
        _: Option<NodeId>,
        _: HookKind,
        phase: Phase,
    ) -> Result<(), Error> {
        if phase == Phase::Finished(Status::Failed) {
            self.update(|t| t.hook_errors += 1);
        }
        Ok(())
    }
}

fn plural(n: usize, singular: &str) -> String {
    format!("{n} {singular}{}", if n == 1 { "" } else { "s" })
}

/// Formats non-zero [`Stats`] as ` (1 passed, 2 failed)`.
fn breakdown(stats: &Stats, styles: &Styles) -> String {
    let parts = [
        (stats.passed, Status::Passed),
        (stats.failed, Status::Failed),
        (stats.pending, Status::Pending),
        (stats.skipped, Status::Skipped),
    ]
    .into_iter()
    .filter(|(n, _)| *n > 0)
    .map(|(n, status)| styles.status(status, format!("{n} {status}")))
    .collect::<Vec<_>>();

    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        event::Lifecycle,
        observer::Dispatcher,
        writer::Coloring,
    };

    use super::*;

    fn scenario(status: Status) -> Lifecycle {
        let feature = gherkin::Feature::parse(
            "Feature: F\n  Scenario: S\n    Given x\n",
            gherkin::GherkinEnv::default(),
        )
        .unwrap();
        Lifecycle::Scenario {
            node: NodeId(1),
            scenario: Source::new(feature.scenarios[0].clone()),
            title: "S".into(),
            tags: Vec::new(),
            phase: Phase::Finished(status),
        }
    }

    #[test]
    fn counts_terminal_statuses() {
        let summary = Summary::new();
        let mut dispatcher = Dispatcher::new();
        dispatcher.subscribe(summary.clone());

        dispatcher.emit(scenario(Status::Passed));
        dispatcher.emit(scenario(Status::Pending));
        dispatcher.emit(Lifecycle::Hook {
            node: None,
            kind: HookKind::Setup,
            phase: Phase::Finished(Status::Failed),
        });

        let totals = summary.totals();
        assert_eq!(totals.scenarios.passed, 1);
        assert_eq!(totals.scenarios.pending, 1);
        assert_eq!(totals.hook_errors, 1);
        assert!(summary.execution_has_failed());
    }

    #[test]
    fn renders_totals() {
        let summary = Summary::new();
        let mut dispatcher = Dispatcher::new();
        dispatcher.subscribe(summary.clone());
        dispatcher.emit(scenario(Status::Passed));
        dispatcher.emit(scenario(Status::Failed));
        let mut styles = Styles::new();
        styles.apply_coloring(Coloring::Never);

        assert_eq!(
            summary.render(&styles),
            "[Summary]\n\
             0 features\n\
             0 rules\n\
             2 scenarios (1 passed, 1 failed)\n\
             0 steps",
        );
    }
}
