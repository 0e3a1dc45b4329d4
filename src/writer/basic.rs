// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Default console [`Subscriber`].

use std::{collections::HashMap, io};

use console::Term;

use crate::{
    event::{Metadata, Phase, Source, Status},
    observer::{Error, Subscriber},
    plan::NodeId,
    runner::ExecutionError,
    scope::HookKind,
};

use super::{Coloring, Styles, Summary, WriteStrExt as _};

/// Default console [`Subscriber`].
///
/// Prints features, rules and outlines as they start. Since the host may
/// run sibling scenarios concurrently, the output of each scenario is
/// buffered and printed at once, when the scenario finishes.
///
/// If a [`Summary`] is attached, it's rendered once the execution finishes.
/// It should be subscribed before this [`Basic`] writer, so its totals are
/// complete by that time.
#[derive(Debug)]
pub struct Basic<Out = Term> {
    output: Out,
    styles: Styles,
    indent: usize,
    scenarios: HashMap<NodeId, Buffered>,
    summary: Option<Summary>,
}

/// Output of a running scenario.
#[derive(Debug)]
struct Buffered {
    indent: usize,
    keyword: String,
    title: String,
    lines: Vec<String>,
}

impl Default for Basic {
    fn default() -> Self {
        Self::new(Term::stdout())
    }
}

impl Basic {
    /// Creates a new [`Basic`] writer printing to STDOUT.
    #[must_use]
    pub fn stdout() -> Self {
        Self::default()
    }
}

impl<Out: io::Write> Basic<Out> {
    /// Creates a new [`Basic`] writer printing into the given `output`.
    #[must_use]
    pub fn new(output: Out) -> Self {
        Self {
            output,
            styles: Styles::new(),
            indent: 0,
            scenarios: HashMap::new(),
            summary: None,
        }
    }

    /// Applies the given [`Coloring`] policy.
    #[must_use]
    pub fn coloring(mut self, color: Coloring) -> Self {
        self.styles.apply_coloring(color);
        self
    }

    /// Attaches the given [`Summary`] to be rendered at the end.
    #[must_use]
    pub fn with_summary(mut self, summary: Summary) -> Self {
        self.summary = Some(summary);
        self
    }

    /// Returns the underlying output.
    #[must_use]
    pub fn into_inner(self) -> Out {
        self.output
    }

    fn line(&mut self, indent: usize, text: &str) -> io::Result<()> {
        self.output
            .write_line(format!("{}{text}", " ".repeat(indent)))
    }

    /// Prints the header of a suite node and nests everything after it.
    fn suite(&mut self, header: String, phase: Phase) -> io::Result<()> {
        match phase {
            Phase::Started => {
                let header = self.styles.header(header).into_owned();
                self.line(self.indent, &header)?;
                self.indent += 2;
            }
            Phase::Finished(_) => self.indent = self.indent.saturating_sub(2),
        }
        Ok(())
    }

    fn step(
        &mut self,
        scenario: NodeId,
        step: &gherkin::Step,
        background: bool,
        phase: Phase,
    ) {
        let Phase::Finished(status) = phase else {
            return;
        };
        let Some(buf) = self.scenarios.get_mut(&scenario) else {
            return;
        };

        let mark = match status {
            Status::Passed => "\u{2714}",
            Status::Failed => "\u{2718}",
            Status::Pending | Status::Running | Status::Skipped => "?",
        };
        let text = format!(
            "{}{mark}{} {} {}{}",
            " ".repeat(buf.indent + 2),
            if background { ">" } else { " " },
            step.keyword.trim(),
            step.value,
            if status == Status::Skipped { " (skipped)" } else { "" },
        );
        buf.lines.push(self.styles.status(status, text).into_owned());
    }

    fn scenario_finished(
        &mut self,
        node: NodeId,
        status: Status,
    ) -> io::Result<()> {
        let Some(buf) = self.scenarios.remove(&node) else {
            return Ok(());
        };

        let mark = match status {
            Status::Passed => "\u{2714}",
            Status::Failed => "\u{2718}",
            Status::Pending | Status::Running | Status::Skipped => "-",
        };
        let header = format!(
            "{mark}  {}: {}{}",
            buf.keyword,
            buf.title,
            if status == Status::Pending { " (pending)" } else { "" },
        );
        let header = self.styles.status(status, header).into_owned();
        self.line(buf.indent, &header)?;
        for line in buf.lines {
            self.output.write_line(line)?;
        }
        Ok(())
    }
}

impl<Out: io::Write> Subscriber for Basic<Out> {
    fn on_finished(&mut self, _: Metadata) -> Result<(), Error> {
        if let Some(summary) = &self.summary {
            let rendered = summary.render(&self.styles);
            self.output.write_line(rendered)?;
        }
        self.output.flush()?;
        Ok(())
    }

    fn on_feature(
        &mut self,
        _: Metadata,
        _: NodeId,
        feature: &Source<gherkin::Feature>,
        phase: Phase,
    ) -> Result<(), Error> {
        let header = format!("{}: {}", feature.keyword, feature.name);
        Ok(self.suite(header, phase)?)
    }

    fn on_rule(
        &mut self,
        _: Metadata,
        _: NodeId,
        rule: &Source<gherkin::Rule>,
        phase: Phase,
    ) -> Result<(), Error> {
        let header = format!("{}: {}", rule.keyword, rule.name);
        Ok(self.suite(header, phase)?)
    }

    fn on_outline(
        &mut self,
        _: Metadata,
        _: NodeId,
        outline: &Source<gherkin::Scenario>,
        phase: Phase,
    ) -> Result<(), Error> {
        let header = format!("{}: {}", outline.keyword, outline.name);
        Ok(self.suite(header, phase)?)
    }

    fn on_examples(
        &mut self,
        _: Metadata,
        _: NodeId,
        examples: &Source<gherkin::Examples>,
        phase: Phase,
    ) -> Result<(), Error> {
        let header = match examples.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => {
                format!("{}: {name}", examples.keyword)
            }
            _ => format!("{}:", examples.keyword),
        };
        Ok(self.suite(header, phase)?)
    }

    fn on_scenario(
        &mut self,
        _: Metadata,
        node: NodeId,
        scenario: &Source<gherkin::Scenario>,
        title: &str,
        phase: Phase,
    ) -> Result<(), Error> {
        match phase {
            Phase::Started => {
                _ = self.scenarios.insert(node, Buffered {
                    indent: self.indent,
                    keyword: scenario.keyword.clone(),
                    title: title.to_owned(),
                    lines: Vec::new(),
                });
                Ok(())
            }
            Phase::Finished(status) => {
                Ok(self.scenario_finished(node, status)?)
            }
        }
    }

    fn on_background(
        &mut self,
        _: Metadata,
        scenario: NodeId,
        step: &Source<gherkin::Step>,
        phase: Phase,
    ) -> Result<(), Error> {
        self.step(scenario, step, true, phase);
        Ok(())
    }

    fn on_step(
        &mut self,
        _: Metadata,
        scenario: NodeId,
        step: &Source<gherkin::Step>,
        phase: Phase,
    ) -> Result<(), Error> {
        self.step(scenario, step, false, phase);
        Ok(())
    }

    fn on_hook(
        &mut self,
        _: Metadata,
        node: Option<NodeId>,
        kind: HookKind,
        phase: Phase,
    ) -> Result<(), Error> {
        if phase != Phase::Finished(Status::Failed) || kind.is_suite() {
            return Ok(());
        }
        if let Some(buf) = node.and_then(|n| self.scenarios.get_mut(&n)) {
            let text =
                format!("{}\u{2718}  {kind} hook", " ".repeat(buf.indent + 2));
            buf.lines.push(self.styles.err(text).into_owned());
        }
        Ok(())
    }

    fn on_error(
        &mut self,
        _: Metadata,
        node: Option<NodeId>,
        error: &ExecutionError,
    ) -> Result<(), Error> {
        if let Some(buf) = node.and_then(|n| self.scenarios.get_mut(&n)) {
            let indent = " ".repeat(buf.indent + 5);
            let text = format!("{indent}{error}");
            buf.lines.push(self.styles.err(text).into_owned());
            return Ok(());
        }

        // Not bound to a running scenario, so printed right away.
        let text = self.styles.err(format!("\u{2718}  {error}")).into_owned();
        Ok(self.line(self.indent, &text)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::{event::Lifecycle, observer::Dispatcher};

    use super::*;

    fn feature() -> gherkin::Feature {
        gherkin::Feature::parse(
            "Feature: Counter\n\
             \x20 Scenario: A\n\
             \x20   Given a counter\n\
             \x20   When it explodes\n\
             \x20   Then it is two\n",
            gherkin::GherkinEnv::default(),
        )
        .unwrap()
    }

    #[derive(Clone, Default)]
    struct Shared(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);

    impl io::Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            io::Write::write(&mut *self.0.borrow_mut(), buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn prints_scenario_once_finished() {
        let feature = feature();
        let scenario = Source::new(feature.scenarios[0].clone());
        let steps = scenario
            .steps
            .iter()
            .cloned()
            .map(Source::new)
            .collect::<Vec<_>>();
        let out = Shared::default();
        let mut dispatcher = Dispatcher::new();
        dispatcher.subscribe(Basic::new(out.clone()).coloring(Coloring::Never));

        let node = NodeId(1);
        let sc = |phase| Lifecycle::Scenario {
            node,
            scenario: scenario.clone(),
            title: "A".into(),
            tags: Vec::new(),
            phase,
        };
        let step = |i: usize, status| Lifecycle::Step {
            scenario: node,
            step: steps[i].clone(),
            phase: Phase::Finished(status),
        };
        dispatcher.emit(Lifecycle::Feature {
            node: NodeId(0),
            feature: Source::new(feature.clone()),
            phase: Phase::Started,
        });
        dispatcher.emit(sc(Phase::Started));
        dispatcher.emit(step(0, Status::Passed));
        dispatcher.emit(step(1, Status::Failed));
        dispatcher.emit(Lifecycle::Error {
            node: Some(node),
            error: ExecutionError::Dropped { scenario: "A".into() },
        });
        assert_eq!(
            String::from_utf8(out.0.borrow().clone()).unwrap(),
            "Feature: Counter\n",
            "scenario output is buffered until it finishes",
        );
        dispatcher.emit(step(2, Status::Skipped));
        dispatcher.emit(sc(Phase::Finished(Status::Failed)));

        let printed = String::from_utf8(out.0.borrow().clone()).unwrap();
        assert_eq!(
            printed,
            "Feature: Counter\n\
             \x20 \u{2718}  Scenario: A\n\
             \x20   \u{2714}  Given a counter\n\
             \x20   \u{2718}  When it explodes\n\
             \x20      Scenario `A`: dropped by the host runner unfinished\n\
             \x20   ?  Then it is two (skipped)\n",
        );
    }
}
