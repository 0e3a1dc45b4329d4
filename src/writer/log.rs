// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Subscriber`] re-emitting lifecycle events as [`tracing`] events.

use crate::{
    event::{Metadata, Phase, Source, Status},
    observer::{Error, Subscriber},
    plan::NodeId,
    runner::ExecutionError,
    scope::HookKind,
};

/// [`Subscriber`] re-emitting lifecycle events as [`tracing`] events.
///
/// Errors are emitted at the `WARN` level, terminal statuses at the `DEBUG`
/// level and everything else at the `TRACE` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct Log;

impl Subscriber for Log {
    fn on_started(&mut self, meta: Metadata) -> Result<(), Error> {
        tracing::debug!(event = meta.id, "execution started");
        Ok(())
    }

    fn on_finished(&mut self, meta: Metadata) -> Result<(), Error> {
        tracing::debug!(event = meta.id, "execution finished");
        Ok(())
    }

    fn on_feature(
        &mut self,
        meta: Metadata,
        node: NodeId,
        feature: &Source<gherkin::Feature>,
        phase: Phase,
    ) -> Result<(), Error> {
        tracing::trace!(event = meta.id, %node, "feature `{}` {phase}", feature.name);
        Ok(())
    }

    fn on_rule(
        &mut self,
        meta: Metadata,
        node: NodeId,
        rule: &Source<gherkin::Rule>,
        phase: Phase,
    ) -> Result<(), Error> {
        tracing::trace!(event = meta.id, %node, "rule `{}` {phase}", rule.name);
        Ok(())
    }

    fn on_outline(
        &mut self,
        meta: Metadata,
        node: NodeId,
        outline: &Source<gherkin::Scenario>,
        phase: Phase,
    ) -> Result<(), Error> {
        tracing::trace!(
            event = meta.id,
            %node,
            "outline `{}` {phase}",
            outline.name,
        );
        Ok(())
    }

    fn on_examples(
        &mut self,
        meta: Metadata,
        node: NodeId,
        examples: &Source<gherkin::Examples>,
        phase: Phase,
    ) -> Result<(), Error> {
        tracing::trace!(
            event = meta.id,
            %node,
            "{} `{}` {phase}",
            examples.keyword,
            examples.name.as_deref().unwrap_or_default(),
        );
        Ok(())
    }

    fn on_scenario(
        &mut self,
        meta: Metadata,
        node: NodeId,
        _: &Source<gherkin::Scenario>,
        title: &str,
        phase: Phase,
    ) -> Result<(), Error> {
        tracing::trace!(event = meta.id, %node, "scenario `{title}` {phase}");
        Ok(())
    }

    fn on_background(
        &mut self,
        meta: Metadata,
        scenario: NodeId,
        step: &Source<gherkin::Step>,
        phase: Phase,
    ) -> Result<(), Error> {
        tracing::trace!(
            event = meta.id,
            %scenario,
            "background step `{}` {phase}",
            step.value,
        );
        Ok(())
    }

    fn on_step(
        &mut self,
        meta: Metadata,
        scenario: NodeId,
        step: &Source<gherkin::Step>,
        phase: Phase,
    ) -> Result<(), Error> {
        tracing::trace!(
            event = meta.id,
            %scenario,
            "step `{}` {phase}",
            step.value,
        );
        Ok(())
    }

    fn on_hook(
        &mut self,
        meta: Metadata,
        node: Option<NodeId>,
        kind: HookKind,
        phase: Phase,
    ) -> Result<(), Error> {
        tracing::trace!(event = meta.id, ?node, "{kind} hook {phase}");
        Ok(())
    }

    fn on_status(
        &mut self,
        meta: Metadata,
        node: NodeId,
        status: Status,
    ) -> Result<(), Error> {
        tracing::debug!(event = meta.id, %node, %status, "status changed");
        Ok(())
    }

    fn on_error(
        &mut self,
        meta: Metadata,
        node: Option<NodeId>,
        error: &ExecutionError,
    ) -> Result<(), Error> {
        tracing::warn!(event = meta.id, ?node, "{error}");
        Ok(())
    }
}
