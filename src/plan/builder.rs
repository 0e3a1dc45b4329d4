// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Builder`] compiling [`gherkin::Feature`]s and a [`ScopeTree`] into a
//! [`TestPlan`].

use std::collections::HashSet;

use gherkin::tagexpr::TagOperation;
use itertools::Itertools as _;
use regex::Regex;

use crate::{
    event::Source,
    scope::{Mode, ScopeId, ScopeKind, ScopeTree},
    tag::Ext as _,
};

use super::{
    expand, ExamplesNode, FeatureNode, HookBinding, HookChain, Item, NodeId,
    OutlineNode, PatternTable, ResolutionError, RuleNode, ScenarioNode,
    SkipReason, State, StepBinding, SuiteHooks, TestPlan, UnmatchedScope,
    UnusedStep,
};

/// Deterministic compiler of a [`TestPlan`].
///
/// Walks the [`gherkin::Feature`]s in document order, matching every
/// document node with the scope declared for it (by kind and name), resolving
/// each step against the [`PatternTable`] of its scope chain and assembling
/// the [`HookChain`] of each scenario.
///
/// A scenario failing to resolve is recorded as [`State::Broken`], never
/// aborting the build of the rest of the plan.
pub struct Builder<'t, World> {
    tree: &'t ScopeTree<World>,
    tags: Option<TagOperation>,
    name: Option<Regex>,
    next_id: usize,
    matched: HashSet<ScopeId>,
    used: HashSet<(ScopeId, String)>,
}

impl<World> std::fmt::Debug for Builder<'_, World> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("tags", &self.tags)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Document path of the node being built.
#[derive(Clone, Debug, Default)]
struct Lineage {
    /// Declared scopes from the root one down to the current node.
    chain: Vec<ScopeId>,

    /// Innermost declared feature or rule scope, if the whole chain above it
    /// is declared too.
    parent: Option<ScopeId>,

    /// Tags of all the enclosing document nodes and scopes.
    tags: Vec<String>,

    /// Whether anything enclosing is marked with `@skip`.
    skip: bool,

    /// Whether anything enclosing is marked with `@only`.
    only: bool,

    /// Backgrounds to run before every scenario, outermost first.
    backgrounds: Vec<Background>,
}

/// [`gherkin::Background`] along with the scope chain its steps resolve in.
#[derive(Clone, Debug)]
struct Background {
    steps: Vec<Source<gherkin::Step>>,
    chain: Vec<ScopeId>,
}

impl<'t, World> Builder<'t, World> {
    /// Creates a new [`Builder`] over the given [`ScopeTree`].
    #[must_use]
    pub fn new(tree: &'t ScopeTree<World>) -> Self {
        Self {
            tree,
            tags: None,
            name: None,
            next_id: 0,
            matched: HashSet::new(),
            used: HashSet::new(),
        }
    }

    /// Only executes scenarios whose effective tags satisfy the given
    /// [`TagOperation`]. Others are treated as skipped.
    #[must_use]
    pub fn filter_tags(mut self, op: impl Into<Option<TagOperation>>) -> Self {
        self.tags = op.into();
        self
    }

    /// Only executes scenarios whose titles match the given [`Regex`]. Others
    /// are treated as skipped.
    #[must_use]
    pub fn filter_name(mut self, re: impl Into<Option<Regex>>) -> Self {
        self.name = re.into();
        self
    }

    /// Compiles the given `features` into a [`TestPlan`].
    #[must_use]
    pub fn build<I>(mut self, features: I) -> TestPlan<World>
    where
        I: IntoIterator<Item = gherkin::Feature>,
    {
        let root = self.tree.root();
        let mut hooks = suite_hooks(self.tree, Some(ScopeId::ROOT));
        hooks.scope = Some(ScopeId::ROOT);
        let lineage = Lineage {
            chain: vec![ScopeId::ROOT],
            parent: Some(ScopeId::ROOT),
            tags: root.tags().to_vec(),
            skip: root.mode() == Mode::Skip,
            only: root.mode() == Mode::Only,
            backgrounds: Vec::new(),
        };

        let mut features = features
            .into_iter()
            .map(|f| self.feature(f, &lineage))
            .collect::<Vec<_>>();
        let only = features.iter().map(|f| has_only(&f.items)).collect_vec();
        if only.iter().any(|o| *o) {
            for (f, only) in features.iter_mut().zip(only) {
                if !only {
                    f.items.iter_mut().for_each(exclude);
                }
            }
        }
        for f in &mut features {
            apply_only(&mut f.items);
        }

        let plan = TestPlan {
            hooks,
            features,
            unmatched_scopes: self.unmatched_scopes(),
            unused_steps: self.unused_steps(),
        };
        tracing::debug!(
            features = plan.features.len(),
            scenarios = plan.scenarios().len(),
            broken = plan.resolution_errors().len(),
            "test plan built",
        );
        plan
    }

    fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn find(
        &mut self,
        parent: Option<ScopeId>,
        kind: ScopeKind,
        name: &str,
    ) -> Option<ScopeId> {
        let id = self.tree.find_child(parent?, kind, name)?;
        _ = self.matched.insert(id);
        Some(id)
    }

    /// Descends the `lineage` into a feature or rule node.
    fn descend(
        &mut self,
        lineage: &Lineage,
        kind: ScopeKind,
        name: &str,
        tags: &[String],
        background: Option<&gherkin::Background>,
    ) -> (Lineage, Option<ScopeId>) {
        let scope = self.find(lineage.parent, kind, name);
        let mut next = lineage.clone();
        next.parent = scope;
        next.tags.extend(tags.iter().cloned());
        let mut mode = Mode::from_tags(tags);
        if let Some(id) = scope {
            let node = self.tree.node(id);
            next.chain.push(id);
            next.tags.extend(node.tags().iter().cloned());
            mode = merge_modes(mode, node.mode());
        }
        next.skip |= mode == Mode::Skip;
        next.only |= mode == Mode::Only;
        if let Some(bg) = background {
            let mut chain = next.chain.clone();
            if let Some(id) = self.find(scope, ScopeKind::Background, "") {
                chain.push(id);
            }
            next.backgrounds.push(Background {
                steps: bg.steps.iter().cloned().map(Source::new).collect(),
                chain,
            });
        }
        (next, scope)
    }

    fn feature(
        &mut self,
        feature: gherkin::Feature,
        lineage: &Lineage,
    ) -> FeatureNode<World> {
        let id = self.next_id();
        let (lineage, scope) = self.descend(
            lineage,
            ScopeKind::Feature,
            &feature.name,
            &feature.tags,
            feature.background.as_ref(),
        );
        let hooks = suite_hooks(self.tree, scope);
        let feature = Source::new(feature);

        enum Child<'f> {
            Scenario(&'f gherkin::Scenario),
            Rule(&'f gherkin::Rule),
        }
        let children = feature
            .scenarios
            .iter()
            .map(|s| (s.position.line, Child::Scenario(s)))
            .chain(feature.rules.iter().map(|r| (r.position.line, Child::Rule(r))))
            .sorted_by_key(|(line, _)| *line)
            .map(|(_, c)| c)
            .collect_vec();

        let items = children
            .into_iter()
            .map(|child| match child {
                Child::Scenario(s) => self.item(s, &lineage),
                Child::Rule(r) => Item::Rule(self.rule(r, &lineage)),
            })
            .collect();

        FeatureNode { id, feature, scope, hooks, items }
    }

    fn rule(&mut self, rule: &gherkin::Rule, lineage: &Lineage) -> RuleNode<World> {
        let id = self.next_id();
        let (lineage, scope) = self.descend(
            lineage,
            ScopeKind::Rule,
            &rule.name,
            &rule.tags,
            rule.background.as_ref(),
        );
        let hooks = suite_hooks(self.tree, scope);
        let items = rule
            .scenarios
            .iter()
            .map(|s| self.item(s, &lineage))
            .collect();

        RuleNode { id, rule: Source::new(rule.clone()), scope, hooks, items }
    }

    fn item(
        &mut self,
        scenario: &gherkin::Scenario,
        lineage: &Lineage,
    ) -> Item<World> {
        if scenario.examples.is_empty() {
            let scope =
                self.find(lineage.parent, ScopeKind::Scenario, &scenario.name);
            let title = scenario.name.clone();
            return Item::Scenario(self.scenario(
                scenario.clone(),
                title,
                scope,
                lineage,
                Vec::new(),
            ));
        }

        let id = self.next_id();
        let scope = self.find(
            lineage.parent,
            ScopeKind::ScenarioOutline,
            &scenario.name,
        );
        let examples = scenario
            .examples
            .iter()
            .zip(expand::expand(scenario))
            .map(|(examples, rows)| {
                let id = self.next_id();
                let title = match examples.name.as_deref().map(str::trim) {
                    Some(name) if !name.is_empty() => {
                        format!("{}: {name}", examples.keyword)
                    }
                    _ => examples.keyword.clone(),
                };
                let scenarios = rows
                    .into_iter()
                    .map(|row| {
                        let title =
                            format!("{} #{}", row.scenario.name, row.number);
                        self.scenario(
                            row.scenario,
                            title,
                            scope,
                            lineage,
                            row.unmatched,
                        )
                    })
                    .collect();
                ExamplesNode {
                    id,
                    title,
                    examples: Source::new(examples.clone()),
                    scenarios,
                }
            })
            .collect();

        Item::Outline(OutlineNode {
            id,
            title: scenario.name.clone(),
            outline: Source::new(scenario.clone()),
            scope,
            examples,
        })
    }

    fn scenario(
        &mut self,
        scenario: gherkin::Scenario,
        title: String,
        scope: Option<ScopeId>,
        lineage: &Lineage,
        unmatched_placeholders: Vec<String>,
    ) -> ScenarioNode<World> {
        let id = self.next_id();

        let mut chain = lineage.chain.clone();
        let mut tags = lineage.tags.clone();
        tags.extend(scenario.tags.iter().cloned());
        let mut mode = Mode::from_tags(&scenario.tags);
        if let Some(s) = scope {
            let node = self.tree.node(s);
            chain.push(s);
            tags.extend(node.tags().iter().cloned());
            mode = merge_modes(mode, node.mode());
        }
        if lineage.skip {
            mode = Mode::Skip;
        } else if lineage.only {
            mode = merge_modes(mode, Mode::Only);
        }
        let tags = tags.into_iter().unique().collect_vec();

        let mut errors = Vec::new();
        let mut steps = Vec::new();
        for bg in &lineage.backgrounds {
            let table = PatternTable::merge(self.tree, &bg.chain);
            for step in &bg.steps {
                match self.bind(&table, &title, step, true) {
                    Ok(b) => steps.push(b),
                    Err(e) => errors.push(e),
                }
            }
        }
        let table = PatternTable::merge(self.tree, &chain);
        for step in &scenario.steps {
            let step = Source::new(step.clone());
            match self.bind(&table, &title, &step, false) {
                Ok(b) => steps.push(b),
                Err(e) => errors.push(e),
            }
        }

        let hooks = self.hook_chain(&chain, lineage);

        let filtered = !self.tags.as_ref().map_or(true, |op| op.eval(&tags))
            || !self.name.as_ref().map_or(true, |re| re.is_match(&title));
        let state = if filtered {
            State::Skipped(SkipReason::Filtered)
        } else if mode == Mode::Skip {
            State::Skipped(SkipReason::Mode)
        } else if !errors.is_empty() {
            for e in &errors {
                tracing::warn!(%id, "{e}");
            }
            State::Broken(errors)
        } else {
            State::Ready
        };
        tracing::trace!(%id, %title, ?state, "scenario resolved");

        ScenarioNode {
            id,
            title,
            scenario: Source::new(scenario),
            scope,
            tags,
            mode,
            steps,
            hooks,
            state,
            unmatched_placeholders,
        }
    }

    fn bind(
        &mut self,
        table: &PatternTable<World>,
        scenario: &str,
        step: &Source<gherkin::Step>,
        background: bool,
    ) -> Result<StepBinding<World>, ResolutionError> {
        let (binding, matches) = table.resolve(scenario, &step.value)?;
        _ = self
            .used
            .insert((binding.scope, binding.pattern.as_str().to_owned()));
        Ok(StepBinding {
            step: step.clone(),
            background,
            pattern: binding.pattern.clone(),
            scope: binding.scope,
            matches,
            func: binding.step,
        })
    }

    /// Assembles the [`HookChain`] of a scenario declared along the given
    /// `chain`, interleaving background scopes right after the scope they
    /// belong to.
    fn hook_chain(&self, chain: &[ScopeId], lineage: &Lineage) -> HookChain<World> {
        let backgrounds = lineage
            .backgrounds
            .iter()
            .filter_map(|bg| bg.chain.last().copied())
            .filter(|id| self.tree.node(*id).kind() == ScopeKind::Background)
            .collect_vec();
        let scopes = chain.iter().flat_map(|id| {
            iter_with_background(self.tree, *id, &backgrounds)
        });

        let mut hooks = HookChain::default();
        for scope in scopes {
            let node = self.tree.node(scope);
            hooks.before.extend(
                node.hooks().before.iter().map(|h| HookBinding { scope, hook: *h }),
            );
            hooks.after.extend(
                node.hooks().after.iter().map(|h| HookBinding { scope, hook: *h }),
            );
        }
        hooks.after.reverse();
        hooks
    }

    fn unmatched_scopes(&self) -> Vec<UnmatchedScope> {
        self.tree
            .iter()
            .filter(|n| n.kind() != ScopeKind::Root)
            .filter(|n| !self.matched.contains(&n.id()))
            .map(|n| {
                tracing::warn!(
                    scope = %n.id(),
                    kind = %n.kind(),
                    name = n.name(),
                    "scope doesn't match any document node",
                );
                UnmatchedScope {
                    id: n.id(),
                    kind: n.kind(),
                    name: n.name().to_owned(),
                }
            })
            .collect()
    }

    fn unused_steps(&self) -> Vec<UnusedStep> {
        self.tree
            .iter()
            .flat_map(|n| n.steps())
            .filter(|b| {
                !self.used.contains(&(b.scope, b.pattern.as_str().to_owned()))
            })
            .map(|b| {
                tracing::debug!(
                    scope = %b.scope,
                    pattern = b.pattern.as_str(),
                    "step is never used",
                );
                UnusedStep {
                    scope: b.scope,
                    pattern: b.pattern.as_str().to_owned(),
                }
            })
            .collect()
    }
}

/// Yields the `id` followed by the background scope declared right inside it,
/// if that one is in the `backgrounds`.
fn iter_with_background<World>(
    tree: &ScopeTree<World>,
    id: ScopeId,
    backgrounds: &[ScopeId],
) -> Vec<ScopeId> {
    let mut out = vec![id];
    out.extend(
        backgrounds
            .iter()
            .copied()
            .filter(|bg| tree.node(*bg).parent() == Some(id)),
    );
    out
}

/// Collects the once-per-suite hooks of the given `scope`.
fn suite_hooks<World>(
    tree: &ScopeTree<World>,
    scope: Option<ScopeId>,
) -> SuiteHooks {
    scope.map_or_else(SuiteHooks::default, |id| {
        let hooks = tree.node(id).hooks();
        SuiteHooks {
            scope: Some(id),
            setup: hooks.setup.clone(),
            teardown: hooks.teardown.iter().rev().copied().collect(),
        }
    })
}

/// Combines a document node [`Mode`] with the one of its scope.
const fn merge_modes(node: Mode, scope: Mode) -> Mode {
    match (node, scope) {
        (Mode::Skip, _) | (_, Mode::Skip) => Mode::Skip,
        (Mode::Only, _) | (_, Mode::Only) => Mode::Only,
        (Mode::Default, Mode::Default) => Mode::Default,
    }
}

/// Indicates whether some runnable scenario among the `items` is marked with
/// `@only`.
fn has_only<World>(items: &[Item<World>]) -> bool {
    items.iter().any(item_has_only)
}

fn item_has_only<World>(item: &Item<World>) -> bool {
    item.scenarios()
        .iter()
        .any(|s| s.mode == Mode::Only && !s.state.is_skipped())
}

/// Skips every scenario of the given `item` because of `@only` siblings.
fn exclude<World>(item: &mut Item<World>) {
    for s in item.scenarios_mut() {
        if !s.state.is_skipped() {
            s.state = State::Skipped(SkipReason::NotOnly);
        }
    }
}

/// Restricts each level of sibling `items` to the ones containing `@only`
/// scenarios, if any of them does.
fn apply_only<World>(items: &mut [Item<World>]) {
    if has_only(items) {
        for item in items.iter_mut() {
            if !item_has_only(item) {
                exclude(item);
            }
        }
    }
    for item in items.iter_mut() {
        match item {
            Item::Rule(r) => apply_only(&mut r.items),
            Item::Outline(o) => {
                let only = o
                    .examples
                    .iter()
                    .map(|e| {
                        e.scenarios.iter().any(|s| {
                            s.mode == Mode::Only && !s.state.is_skipped()
                        })
                    })
                    .collect_vec();
                if only.iter().any(|o| *o) {
                    for (e, only) in o.examples.iter_mut().zip(only) {
                        if !only {
                            for s in &mut e.scenarios {
                                if !s.state.is_skipped() {
                                    s.state =
                                        State::Skipped(SkipReason::NotOnly);
                                }
                            }
                        }
                    }
                }
            }
            Item::Scenario(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::{future::LocalBoxFuture, FutureExt as _};
    use gherkin::GherkinEnv;

    use crate::{
        scope::{ConfigError, ScopeRegistry, ScopeTree},
        step::Context,
        tag,
    };

    use super::*;

    #[derive(Debug, Default)]
    struct Calls(Vec<&'static str>);

    fn step(w: &mut Calls, _: Context) -> LocalBoxFuture<'_, ()> {
        async move { w.0.push("step") }.boxed_local()
    }

    fn other(w: &mut Calls, _: Context) -> LocalBoxFuture<'_, ()> {
        async move { w.0.push("other") }.boxed_local()
    }

    fn hook<'a>(
        _: &'a gherkin::Scenario,
        w: &'a mut Calls,
    ) -> LocalBoxFuture<'a, ()> {
        async move { w.0.push("hook") }.boxed_local()
    }

    fn parse(text: &str) -> gherkin::Feature {
        gherkin::Feature::parse(text, GherkinEnv::default()).unwrap()
    }

    fn tree(
        f: impl FnOnce(&mut ScopeRegistry<Calls>) -> Result<(), ConfigError>,
    ) -> ScopeTree<Calls> {
        let mut reg = ScopeRegistry::new();
        f(&mut reg).unwrap();
        reg.finalize().unwrap()
    }

    const BASIC: &str = "Feature: Basic\n\
                         \n\
                         \x20 Background:\n\
                         \x20   Given a counter\n\
                         \n\
                         \x20 Scenario: first\n\
                         \x20   When it is incremented\n\
                         \n\
                         \x20 Scenario: third\n\
                         \x20   When it is incremented\n\
                         \n\
                         \x20 Rule: nested\n\
                         \n\
                         \x20   Scenario: second\n\
                         \x20     When it is incremented\n";

    #[test]
    fn keeps_document_order() {
        let tree = tree(|r| {
            r.step("a counter", step)?;
            r.step("it is incremented", step)
        });

        let plan = Builder::new(&tree).build([parse(BASIC)]);

        let titles = plan
            .scenarios()
            .iter()
            .map(|s| s.title.clone())
            .collect::<Vec<_>>();
        assert_eq!(titles, ["first", "third", "second"]);
        let ids = plan
            .scenarios()
            .iter()
            .map(|s| s.id.index())
            .collect::<Vec<_>>();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids: {ids:?}");
        assert!(matches!(plan.features[0].items[1], Item::Scenario(_)));
        assert!(matches!(plan.features[0].items[2], Item::Rule(_)));
    }

    #[test]
    fn background_steps_go_first() {
        let tree = tree(|r| {
            r.step("a counter", step)?;
            r.step("it is incremented", other)
        });

        let plan = Builder::new(&tree).build([parse(BASIC)]);
        let first = plan.scenario("first").unwrap();

        assert!(first.state.is_ready());
        assert_eq!(first.steps.len(), 2);
        assert_eq!(first.background_steps().count(), 1);
        assert_eq!(first.steps[0].step.value, "a counter");
        assert_eq!(
            first.own_steps().next().unwrap().pattern.as_str(),
            "it is incremented",
        );
    }

    #[test]
    fn innermost_declaration_wins() {
        let mut feature = None;
        let tree = tree(|r| {
            r.step("a counter", step)?;
            r.step("it is incremented", step)?;
            feature = Some(r.feature("Basic", &[], |r| {
                r.step("it is incremented", other)
            })?);
            Ok(())
        });
        let feature = feature.unwrap();

        let plan = Builder::new(&tree).build([parse(BASIC)]);

        for s in plan.scenarios() {
            let own = s.own_steps().next().unwrap();
            assert_eq!(own.scope, feature, "scenario: {}", s.title);
            assert_eq!(own.func as usize, other as usize);
        }
        assert!(plan.unused_steps.iter().any(|u| u.scope == ScopeId::ROOT
            && u.pattern == "it is incremented"));
    }

    #[test]
    fn unresolved_steps_break_only_their_scenario() {
        let tree = tree(|r| {
            r.step("a counter", step)?;
            _ = r.feature("Basic", &[], |r| {
                _ = r.scenario("first", &[], |r| {
                    r.step("it is incremented", step)
                })?;
                Ok(())
            })?;
            Ok(())
        });

        let plan = Builder::new(&tree).build([parse(BASIC)]);

        assert!(plan.scenario("first").unwrap().state.is_ready());
        let second = plan.scenario("second").unwrap();
        let State::Broken(errors) = &second.state else {
            panic!("expected broken, got: {:?}", second.state);
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].step(), "it is incremented");
        assert_eq!(plan.resolution_errors().len(), 2);
    }

    #[test]
    fn ambiguous_steps_break_the_scenario() {
        let tree = tree(|r| {
            r.step("a counter", step)?;
            r.step("it is incremented", step)?;
            r.step_regex(regex::Regex::new(r"^it is (\w+)$").unwrap(), other)
        });

        let plan = Builder::new(&tree).build([parse(BASIC)]);

        let first = plan.scenario("first").unwrap();
        assert!(matches!(
            &first.state,
            State::Broken(e) if matches!(e[0], ResolutionError::Ambiguous { .. }),
        ));
    }

    #[test]
    fn hooks_wrap_inner_to_outer() {
        let mut ids = Vec::new();
        let tree = tree(|r| {
            r.step("a counter", step)?;
            r.step("it is incremented", step)?;
            r.before(hook)?;
            r.after(hook)?;
            let feature = r.feature("Basic", &[], |r| {
                ids.push(r.background(|r| r.before(hook))?);
                r.before(hook)?;
                r.after(hook)?;
                ids.push(r.scenario("first", &[], |r| {
                    r.before(hook)?;
                    r.after(hook)
                })?);
                Ok(())
            })?;
            ids.push(feature);
            Ok(())
        });
        let (root, background, scenario, feature) =
            (ScopeId::ROOT, ids[0], ids[1], ids[2]);

        let plan = Builder::new(&tree).build([parse(BASIC)]);
        let first = plan.scenario("first").unwrap();

        let before =
            first.hooks.before.iter().map(|h| h.scope).collect::<Vec<_>>();
        let after =
            first.hooks.after.iter().map(|h| h.scope).collect::<Vec<_>>();
        assert_eq!(before, [root, feature, background, scenario]);
        assert_eq!(after, [scenario, feature, root]);
    }

    #[test]
    fn expands_outlines() {
        let tree = tree(|r| r.step("I eat {int}", step));

        let plan = Builder::new(&tree).build([parse(
            "Feature: Hungry\n\
             \n\
             \x20 Scenario Outline: eating <eat>\n\
             \x20   Given I eat <eat>\n\
             \n\
             \x20   Examples:\n\
             \x20     | eat |\n\
             \x20     |   5 |\n\
             \x20     |   7 |\n\
             \n\
             \x20   Examples: big\n\
             \x20     | eat |\n\
             \x20     |  99 |\n",
        )]);

        let Item::Outline(outline) = &plan.features[0].items[0] else {
            panic!("expected outline");
        };
        assert_eq!(outline.title, "eating <eat>");
        let groups =
            outline.examples.iter().map(|e| e.title.as_str()).collect_vec();
        assert_eq!(groups, ["Examples", "Examples: big"]);
        assert_eq!(outline.examples[1].scenarios[0].title, "eating 99 #3");
        let titles = outline.examples[0]
            .scenarios
            .iter()
            .map(|s| s.title.clone())
            .collect::<Vec<_>>();
        assert_eq!(titles, ["eating 5 #1", "eating 7 #2"]);
        assert_eq!(outline.examples[0].scenarios[1].steps[0].matches[1].1, "7");
    }

    #[test]
    fn skip_propagates_down() {
        let tree = tree(|r| {
            r.step("a counter", step)?;
            r.step("it is incremented", step)?;
            _ = r.feature("Basic", &[], |r| {
                _ = r.rule("nested", &["skip"], |_| Ok(()))?;
                Ok(())
            })?;
            Ok(())
        });

        let plan = Builder::new(&tree).build([parse(BASIC)]);

        assert!(plan.scenario("first").unwrap().state.is_ready());
        assert_eq!(
            plan.scenario("second").unwrap().state,
            State::Skipped(SkipReason::Mode),
        );
        assert!(plan.scenario("third").unwrap().state.is_ready());
    }

    #[test]
    fn only_excludes_siblings() {
        let tree = tree(|r| {
            r.step("a counter", step)?;
            r.step("it is incremented", step)?;
            _ = r.feature("Basic", &[], |r| {
                _ = r.scenario("third", &["@only"], |_| Ok(()))?;
                Ok(())
            })?;
            Ok(())
        });

        let plan = Builder::new(&tree).build([parse(BASIC)]);

        assert_eq!(
            plan.scenario("first").unwrap().state,
            State::Skipped(SkipReason::NotOnly),
        );
        assert_eq!(
            plan.scenario("second").unwrap().state,
            State::Skipped(SkipReason::NotOnly),
        );
        assert!(plan.scenario("third").unwrap().state.is_ready());
    }

    #[test]
    fn filters_by_tags_and_name() {
        let tree = tree(|r| {
            r.step("a counter", step)?;
            r.step("it is incremented", step)?;
            _ = r.feature("Basic", &[], |r| {
                _ = r.rule("nested", &["slow"], |_| Ok(()))?;
                Ok(())
            })?;
            Ok(())
        });

        let plan = Builder::new(&tree)
            .filter_tags(tag::parse("not @slow").unwrap())
            .filter_name(regex::Regex::new("^(first|second)$").unwrap())
            .build([parse(BASIC)]);

        assert!(plan.scenario("first").unwrap().state.is_ready());
        assert_eq!(
            plan.scenario("second").unwrap().state,
            State::Skipped(SkipReason::Filtered),
        );
        assert_eq!(
            plan.scenario("third").unwrap().state,
            State::Skipped(SkipReason::Filtered),
        );
    }

    #[test]
    fn reports_unmatched_scopes() {
        let tree = tree(|r| {
            r.step("a counter", step)?;
            r.step("it is incremented", step)?;
            _ = r.feature("Missing", &[], |_| Ok(()))?;
            Ok(())
        });

        let plan = Builder::new(&tree).build([parse(BASIC)]);

        assert_eq!(plan.unmatched_scopes.len(), 1);
        assert_eq!(plan.unmatched_scopes[0].name, "Missing");
        assert_eq!(plan.scenarios().len(), 3);
    }
}
