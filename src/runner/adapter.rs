// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Adapter`] translating a [`TestPlan`] into [`Host`] declarations.

use std::{
    cell::RefCell,
    collections::HashMap,
    fmt, mem,
    panic::AssertUnwindSafe,
    rc::Rc,
    time::Duration,
};

use futures::FutureExt as _;

use crate::{
    event::{Lifecycle, Phase, Source, Status},
    observer::Dispatcher,
    plan::{
        ExamplesNode, FeatureNode, Item, NodeId, OutlineNode, ResolutionError,
        RuleNode, ScenarioNode, State, SuiteHooks, TestPlan,
    },
    scope::{Hook, HookKind, Mode, SuiteHook},
    world::Factory,
};

use super::{
    coerce_error, deadline, display_name, nested, CurrentTest, ExecutionError,
    HookBody, Host, Results, RunReport, TestBody, TestMode,
};

/// Execution adapter of a [`TestPlan`].
///
/// Registers one [`Host`] suite per feature, rule, outline and examples
/// group, and one [`Host`] test per scenario. Test bodies create a fresh
/// `World` per scenario and run its hooks and steps, emitting [`Lifecycle`]
/// events into the [`Dispatcher`] and recording [`ExecutionResult`]s.
///
/// Nodes the [`Host`] never runs (skipped tests, or bodies dropped
/// unfinished) receive their terminal status once the [`Host`] is done with
/// the enclosing suite, so every node is always reported.
///
/// # Timeouts
///
/// The timeout applies to the whole hooks and steps sequence of a single
/// scenario. Once it elapses, the scenario is dropped at its current
/// suspension point and reported as failed. A callback blocking its thread
/// can't be interrupted.
///
/// [`ExecutionResult`]: super::ExecutionResult
pub struct Adapter<World> {
    plan: Rc<TestPlan<World>>,
    factory: Factory<World>,
    dispatcher: Rc<Dispatcher>,
    results: Rc<Results>,
    timeout: Option<Duration>,
}

impl<World> fmt::Debug for Adapter<World> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("dispatcher", &self.dispatcher)
            .field("results", &self.results.len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<World: 'static> Adapter<World> {
    /// Creates a new [`Adapter`] of the given [`TestPlan`], creating `World`s
    /// with the given [`Factory`] and emitting events into the given
    /// [`Dispatcher`].
    #[must_use]
    pub fn new(
        plan: TestPlan<World>,
        factory: Factory<World>,
        dispatcher: Rc<Dispatcher>,
    ) -> Self {
        Self {
            plan: Rc::new(plan),
            factory,
            dispatcher,
            results: Rc::new(Results::new()),
            timeout: None,
        }
    }

    /// Sets the timeout of a single scenario.
    #[must_use]
    pub fn timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.timeout = timeout.into();
        self
    }

    /// Returns the adapted [`TestPlan`].
    #[must_use]
    pub fn plan(&self) -> &TestPlan<World> {
        &self.plan
    }

    /// Returns the [`Results`] recorded so far.
    #[must_use]
    pub fn results(&self) -> Rc<Results> {
        Rc::clone(&self.results)
    }

    /// Builds a [`RunReport`] of the scenarios out of the [`Results`]
    /// recorded so far.
    #[must_use]
    pub fn report(&self) -> RunReport {
        self.results.report(
            self.plan.scenarios().into_iter().map(|s| (s.id, s.title.clone())),
            self.dispatcher.failures(),
        )
    }

    /// Declares the whole [`TestPlan`] in the given [`Host`].
    pub fn register<H: Host>(&self, host: &mut H) {
        let shared = Rc::new(Shared {
            plan: Rc::clone(&self.plan),
            factory: Rc::clone(&self.factory),
            dispatcher: Rc::clone(&self.dispatcher),
            results: Rc::clone(&self.results),
            timeout: self.timeout,
            names: RefCell::new(HashMap::new()),
            suites: RefCell::new(HashMap::new()),
            in_flight: RefCell::new(HashMap::new()),
        });
        tracing::debug!(
            features = self.plan.features.len(),
            timeout = ?self.timeout,
            "registering test plan",
        );

        let hooks = self.plan.hooks.clone();
        host.before_all(hook_body(&shared, move |s| {
            let hooks = hooks.clone();
            async move {
                s.dispatcher.emit(Lifecycle::Started);
                s.setup(None, &hooks).await;
            }
        }));
        if let Some(current) = host.current_test() {
            host.after_each(reassociate(&shared, current));
        }

        let mut reg = Registration {
            shared: &shared,
            path: Vec::new(),
            suites: vec![None],
        };
        for feature in &self.plan.features {
            reg.feature(host, feature);
        }

        let hooks = self.plan.hooks.clone();
        host.after_all(hook_body(&shared, move |s| {
            let hooks = hooks.clone();
            async move {
                for f in &s.plan.features {
                    s.sweep(NodeRef::Feature(f));
                }
                s.teardown(None, &hooks).await;
                s.dispatcher.emit(Lifecycle::Finished);
            }
        }));
    }
}

/// Creates a [`HookBody`] running the given async function over the
/// [`Shared`] state.
fn hook_body<World, F, Fut>(shared: &Rc<Shared<World>>, f: F) -> HookBody
where
    World: 'static,
    F: Fn(Rc<Shared<World>>) -> Fut + 'static,
    Fut: std::future::Future<Output = ()> + 'static,
{
    let shared = Rc::clone(shared);
    Rc::new(move || f(Rc::clone(&shared)).boxed_local())
}

/// Creates a [`HookBody`] recording a terminal status for the test the
/// [`Host`] has just finished, if its body didn't.
fn reassociate<World: 'static>(
    shared: &Rc<Shared<World>>,
    current: CurrentTest,
) -> HookBody {
    let shared = Rc::clone(shared);
    Rc::new(move || {
        // Read right away, as the `Host` may switch to another test once the
        // returned future is pending.
        let node = current()
            .and_then(|name| shared.names.borrow().get(&name).copied());
        let shared = Rc::clone(&shared);
        async move {
            let Some(node) = node else {
                return;
            };
            // Never-started scenarios are left for the enclosing suite.
            if !shared.results.is_started(node) {
                return;
            }
            if let Some(s) = shared.find_scenario(node) {
                shared.sweep_scenario(s);
            }
        }
        .boxed_local()
    })
}

/// Walk over a [`TestPlan`] declaring it in a [`Host`].
struct Registration<'s, World> {
    shared: &'s Rc<Shared<World>>,
    path: Vec<String>,

    /// Enclosing suites having setup hooks, [`None`] standing for the root.
    suites: Vec<Option<NodeId>>,
}

impl<World: 'static> Registration<'_, World> {
    /// Declares a [`Host`] suite wrapping the nested declarations.
    fn suite<H: Host>(
        &mut self,
        host: &mut H,
        title: &str,
        skipped: bool,
        body: impl FnOnce(&mut Self, &mut H),
    ) {
        let mode = if skipped { TestMode::Skip } else { TestMode::Run };
        let parent = mem::take(&mut self.path);
        self.path = nested(&parent, title);
        host.suite(title, mode, |host| body(self, host));
        self.path = parent;
    }

    fn feature<H: Host>(&mut self, host: &mut H, feature: &FeatureNode<World>) {
        let (id, src, hooks) =
            (feature.id, feature.feature.clone(), feature.hooks.clone());
        let title = feature.feature.name.clone();
        self.suites.push(Some(id));
        self.suite(host, &title, feature.is_skipped(), |this, host| {
            let start = Lifecycle::Feature {
                node: id,
                feature: src,
                phase: Phase::Started,
            };
            this.suite_hooks(host, id, start, hooks);
            for item in &feature.items {
                this.item(host, item);
            }
        });
        _ = self.suites.pop();
    }

    fn rule<H: Host>(&mut self, host: &mut H, rule: &RuleNode<World>) {
        let (id, src, hooks) = (rule.id, rule.rule.clone(), rule.hooks.clone());
        let title = rule.rule.name.clone();
        let skipped = rule.items.iter().all(Item::is_skipped);
        self.suites.push(Some(id));
        self.suite(host, &title, skipped, |this, host| {
            let start =
                Lifecycle::Rule { node: id, rule: src, phase: Phase::Started };
            this.suite_hooks(host, id, start, hooks);
            for item in &rule.items {
                this.item(host, item);
            }
        });
        _ = self.suites.pop();
    }

    fn outline<H: Host>(&mut self, host: &mut H, outline: &OutlineNode<World>) {
        let (id, src) = (outline.id, outline.outline.clone());
        let skipped = outline
            .examples
            .iter()
            .flat_map(|e| &e.scenarios)
            .all(|s| s.state.is_skipped());
        self.suite(host, &outline.title, skipped, |this, host| {
            let start = Lifecycle::Outline {
                node: id,
                outline: src,
                phase: Phase::Started,
            };
            this.suite_hooks(host, id, start, SuiteHooks::default());
            for examples in &outline.examples {
                this.examples(host, examples);
            }
        });
    }

    fn examples<H: Host>(
        &mut self,
        host: &mut H,
        examples: &ExamplesNode<World>,
    ) {
        let (id, src) = (examples.id, examples.examples.clone());
        let skipped = examples.scenarios.iter().all(|s| s.state.is_skipped());
        self.suite(host, &examples.title, skipped, |this, host| {
            let start = Lifecycle::Examples {
                node: id,
                examples: src,
                phase: Phase::Started,
            };
            this.suite_hooks(host, id, start, SuiteHooks::default());
            for scenario in &examples.scenarios {
                this.scenario(host, scenario);
            }
        });
    }

    fn item<H: Host>(&mut self, host: &mut H, item: &Item<World>) {
        match item {
            Item::Scenario(s) => self.scenario(host, s),
            Item::Outline(o) => self.outline(host, o),
            Item::Rule(r) => self.rule(host, r),
        }
    }

    /// Declares the [`Host`] hooks of the current suite: starting it and
    /// running its setup hooks, finishing every leftover inside it and
    /// running its teardown hooks.
    fn suite_hooks<H: Host>(
        &self,
        host: &mut H,
        id: NodeId,
        start: Lifecycle,
        hooks: SuiteHooks,
    ) {
        let before = hooks.clone();
        host.before_all(hook_body(self.shared, move |s| {
            let (start, hooks) = (start.clone(), before.clone());
            async move {
                _ = s.start(id, start);
                s.setup(Some(id), &hooks).await;
            }
        }));
        host.after_all(hook_body(self.shared, move |s| {
            let hooks = hooks.clone();
            async move { s.close_suite(id, &hooks).await }
        }));
    }

    fn scenario<H: Host>(&mut self, host: &mut H, node: &ScenarioNode<World>) {
        let mode = match (&node.state, node.mode) {
            (State::Skipped(_), _) => TestMode::Skip,
            (State::Ready, Mode::Only) => TestMode::Only,
            _ => TestMode::Run,
        };
        let title = self.unique_title(&node.title);
        _ = self
            .shared
            .names
            .borrow_mut()
            .insert(display_name(&self.path, &title), node.id);

        let shared = Rc::clone(self.shared);
        let suites = self.suites.clone();
        let scenario = Rc::new(node.clone());
        let body: TestBody = Box::new(move || {
            async move { shared.run_scenario(&scenario, &suites).await }
                .boxed_local()
        });
        host.test(&title, mode, self.shared.timeout, body);
    }

    /// Returns the given scenario `title` suffixed with `#<n>`, if a test
    /// with the same display name has been declared already.
    fn unique_title(&self, title: &str) -> String {
        let names = self.shared.names.borrow();
        let mut unique = title.to_owned();
        let mut n = 1;
        while names.contains_key(&display_name(&self.path, &unique)) {
            n += 1;
            unique = format!("{title} #{n}");
        }
        unique
    }
}

/// Per-suite progress of its setup and teardown hooks.
#[derive(Clone, Debug, Default)]
struct SuiteState {
    setup_started: bool,
    setup_failed: bool,
    teardown_done: bool,
    error: Option<ExecutionError>,
}

/// State shared by all the [`Host`] bodies declared by an [`Adapter`].
struct Shared<World> {
    plan: Rc<TestPlan<World>>,
    factory: Factory<World>,
    dispatcher: Rc<Dispatcher>,
    results: Rc<Results>,
    timeout: Option<Duration>,

    /// Unique display names of the declared tests.
    names: RefCell<HashMap<String, NodeId>>,

    /// Suites keyed by their [`NodeId`], [`None`] standing for the root.
    suites: RefCell<HashMap<Option<NodeId>, SuiteState>>,

    /// Started, but not yet finished, step or hook of each running scenario.
    in_flight: RefCell<HashMap<NodeId, Lifecycle>>,
}

impl<World: 'static> Shared<World> {
    /// Marks the given node as started, emitting the `event`, unless it has
    /// started already.
    fn start(&self, node: NodeId, event: Lifecycle) -> bool {
        let started = self.results.start(node, Status::Running);
        if started {
            self.dispatcher.emit(event);
        }
        started
    }

    /// Records the terminal `status` of the given node, emitting the
    /// finishing variant of its starting `event`, unless it has been
    /// recorded already.
    fn finish(
        &self,
        node: NodeId,
        event: Lifecycle,
        status: Status,
        error: Option<ExecutionError>,
    ) {
        if self.results.finish(node, status, error) {
            tracing::trace!(%node, %status, "node finished");
            self.dispatcher.emit(event.with_phase(Phase::Finished(status)));
            self.dispatcher.emit(Lifecycle::Status { node, status });
        }
    }

    /// Emits the given `error`, returning it back.
    fn fail(&self, node: Option<NodeId>, error: ExecutionError) -> ExecutionError {
        tracing::debug!(?node, "{error}");
        self.dispatcher.emit(Lifecycle::Error { node, error: error.clone() });
        error
    }

    /// Starts a step or hook of the given scenario.
    fn begin(&self, scenario: NodeId, event: Lifecycle) {
        self.dispatcher.emit(event.clone());
        _ = self.in_flight.borrow_mut().insert(scenario, event);
    }

    /// Finishes the step or hook started with [`Shared::begin()`].
    fn end(&self, scenario: NodeId, event: Lifecycle, status: Status) {
        _ = self.in_flight.borrow_mut().remove(&scenario);
        self.dispatcher.emit(event.with_phase(Phase::Finished(status)));
    }

    /// Runs the setup hooks of the given suite, once.
    async fn setup(&self, suite: Option<NodeId>, hooks: &SuiteHooks) {
        {
            let mut suites = self.suites.borrow_mut();
            let state = suites.entry(suite).or_default();
            if state.setup_started {
                return;
            }
            state.setup_started = true;
        }
        for hook in &hooks.setup {
            if let Err(e) = self.run_suite_hook(suite, HookKind::Setup, *hook).await
            {
                let mut suites = self.suites.borrow_mut();
                let state = suites.entry(suite).or_default();
                state.setup_failed = true;
                state.error.get_or_insert(e);
                break;
            }
        }
    }

    /// Runs the teardown hooks of the given suite, once, if its setup hooks
    /// have been run.
    async fn teardown(&self, suite: Option<NodeId>, hooks: &SuiteHooks) {
        {
            let mut suites = self.suites.borrow_mut();
            let state = suites.entry(suite).or_default();
            if !state.setup_started || state.teardown_done {
                return;
            }
            state.teardown_done = true;
        }
        for hook in &hooks.teardown {
            if let Err(e) =
                self.run_suite_hook(suite, HookKind::Teardown, *hook).await
            {
                _ = self
                    .suites
                    .borrow_mut()
                    .entry(suite)
                    .or_default()
                    .error
                    .get_or_insert(e);
            }
        }
    }

    /// Indicates whether a setup hook of some of the given suites has failed.
    fn setup_failed(&self, suites: &[Option<NodeId>]) -> bool {
        let states = self.suites.borrow();
        suites
            .iter()
            .any(|s| states.get(s).is_some_and(|st| st.setup_failed))
    }

    async fn run_suite_hook(
        &self,
        suite: Option<NodeId>,
        kind: HookKind,
        hook: SuiteHook,
    ) -> Result<(), ExecutionError> {
        let event = Lifecycle::Hook { node: suite, kind, phase: Phase::Started };
        self.dispatcher.emit(event.clone());
        match AssertUnwindSafe(hook()).catch_unwind().await {
            Ok(()) => {
                self.dispatcher
                    .emit(event.with_phase(Phase::Finished(Status::Passed)));
                Ok(())
            }
            Err(panic) => {
                self.dispatcher
                    .emit(event.with_phase(Phase::Finished(Status::Failed)));
                Err(self.fail(suite, ExecutionError::Hook {
                    kind,
                    scenario: None,
                    message: coerce_error(&*panic).into_owned(),
                }))
            }
        }
    }

    /// Finishes everything left inside the given suite, runs its teardown
    /// hooks and finishes the suite itself.
    async fn close_suite(&self, id: NodeId, hooks: &SuiteHooks) {
        let Some(node) = NodeRef::find(&self.plan, id) else {
            return;
        };
        for child in node.children() {
            self.sweep(child);
        }
        self.teardown(Some(id), hooks).await;
        self.finish_suite(node);
    }

    /// Finishes the given suite with the status aggregated from its children.
    fn finish_suite(&self, node: NodeRef<'_, World>) {
        let id = node.id();
        let error = self
            .suites
            .borrow()
            .get(&Some(id))
            .and_then(|s| s.error.clone());
        let status = aggregate(
            error.is_some(),
            node.children().iter().map(|c| self.results.status(c.id())),
        );
        self.finish(id, node.started(), status, error);
    }

    /// Records terminal statuses for everything the [`Host`] didn't run
    /// inside the given node.
    fn sweep(&self, node: NodeRef<'_, World>) {
        if let NodeRef::Scenario(s) = node {
            self.sweep_scenario(s);
            return;
        }
        if self.results.is_finished(node.id()) {
            return;
        }
        _ = self.start(node.id(), node.started());
        for child in node.children() {
            self.sweep(child);
        }
        self.finish_suite(node);
    }

    /// Records a terminal status for the given scenario, if its body didn't.
    fn sweep_scenario(&self, node: &ScenarioNode<World>) {
        let id = node.id;
        if self.results.is_finished(id) {
            return;
        }
        let event = scenario_event(node);
        if self.results.is_started(id) {
            let error = self.abort(node);
            self.finish(id, event, Status::Failed, Some(error));
            return;
        }

        _ = self.start(id, event.clone());
        let (status, error) = match &node.state {
            State::Broken(errors) => (Status::Failed, self.broken(node, errors)),
            State::Ready | State::Skipped(_) => (Status::Pending, None),
        };
        self.finish(id, event, status, error);
    }

    /// Closes the in-flight step or hook of the given scenario, which has
    /// been dropped unfinished.
    fn abort(&self, node: &ScenarioNode<World>) -> ExecutionError {
        let in_flight = self.in_flight.borrow_mut().remove(&node.id);
        if let Some(event) = in_flight {
            self.dispatcher
                .emit(event.with_phase(Phase::Finished(Status::Failed)));
        }
        let scenario = node.title.clone();
        let error = match self.timeout {
            Some(timeout) => ExecutionError::Timeout { scenario, timeout },
            None => ExecutionError::Dropped { scenario },
        };
        self.fail(Some(node.id), error)
    }

    /// Emits the resolution errors of a broken scenario, returning the first
    /// one.
    fn broken(
        &self,
        node: &ScenarioNode<World>,
        errors: &[ResolutionError],
    ) -> Option<ExecutionError> {
        errors
            .iter()
            .map(|e| self.fail(Some(node.id), e.clone().into()))
            .collect::<Vec<_>>()
            .into_iter()
            .next()
    }

    /// Finds the scenario with the given [`NodeId`].
    fn find_scenario(&self, id: NodeId) -> Option<&ScenarioNode<World>> {
        match NodeRef::find(&self.plan, id)? {
            NodeRef::Scenario(s) => Some(s),
            NodeRef::Feature(_)
            | NodeRef::Rule(_)
            | NodeRef::Outline(_)
            | NodeRef::Examples(_) => None,
        }
    }

    /// Body of the [`Host`] test of the given scenario.
    async fn run_scenario(
        &self,
        node: &ScenarioNode<World>,
        suites: &[Option<NodeId>],
    ) -> Result<(), ExecutionError> {
        let id = node.id;
        let event = scenario_event(node);
        if !self.start(id, event.clone()) {
            return Ok(());
        }

        let (status, error) = match &node.state {
            State::Skipped(reason) => {
                tracing::trace!(%id, %reason, "scenario not executed");
                (Status::Pending, None)
            }
            State::Broken(errors) => (Status::Failed, self.broken(node, errors)),
            State::Ready if self.setup_failed(suites) => {
                let error = ExecutionError::Setup { scenario: node.title.clone() };
                (Status::Failed, Some(self.fail(Some(id), error)))
            }
            State::Ready => {
                let run = self.execute(node);
                let res = match self.timeout {
                    Some(dur) => deadline::timeout(dur, run).await,
                    None => Some(run.await),
                };
                match res {
                    Some(Ok(())) => (Status::Passed, None),
                    Some(Err(e)) => (Status::Failed, Some(e)),
                    None => (Status::Failed, Some(self.abort(node))),
                }
            }
        };

        self.finish(id, event, status, error.clone());
        error.map_or(Ok(()), Err)
    }

    /// Runs the hooks and steps of a ready scenario against a fresh `World`.
    async fn execute(
        &self,
        node: &ScenarioNode<World>,
    ) -> Result<(), ExecutionError> {
        let id = node.id;
        let mut world = match AssertUnwindSafe((self.factory)())
            .catch_unwind()
            .await
        {
            Ok(Ok(w)) => w,
            Ok(Err(message)) => {
                let scenario = node.title.clone();
                return Err(self.fail(
                    Some(id),
                    ExecutionError::World { scenario, message },
                ));
            }
            Err(panic) => {
                let scenario = node.title.clone();
                let message = coerce_error(&*panic).into_owned();
                return Err(self.fail(
                    Some(id),
                    ExecutionError::World { scenario, message },
                ));
            }
        };

        let mut failure = None;
        for hook in &node.hooks.before {
            let res =
                self.run_hook(node, HookKind::Before, hook.hook, &mut world).await;
            if let Err(e) = res {
                failure = Some(e);
                break;
            }
        }

        for step in &node.steps {
            let event = if step.background {
                Lifecycle::Background {
                    scenario: id,
                    step: step.step.clone(),
                    phase: Phase::Started,
                }
            } else {
                Lifecycle::Step {
                    scenario: id,
                    step: step.step.clone(),
                    phase: Phase::Started,
                }
            };
            if failure.is_some() {
                self.dispatcher.emit(event.clone());
                self.dispatcher
                    .emit(event.with_phase(Phase::Finished(Status::Skipped)));
                continue;
            }

            self.begin(id, event.clone());
            let res = AssertUnwindSafe((step.func)(&mut world, step.context()))
                .catch_unwind()
                .await;
            match res {
                Ok(()) => self.end(id, event, Status::Passed),
                Err(panic) => {
                    self.end(id, event, Status::Failed);
                    failure = Some(self.fail(Some(id), ExecutionError::Step {
                        scenario: node.title.clone(),
                        step: step.step.value.clone(),
                        message: coerce_error(&*panic).into_owned(),
                    }));
                }
            }
        }

        // After hooks run even if a step failed, stopping at the first
        // failure among themselves.
        for hook in &node.hooks.after {
            let res =
                self.run_hook(node, HookKind::After, hook.hook, &mut world).await;
            if let Err(e) = res {
                _ = failure.get_or_insert(e);
                break;
            }
        }
        drop(world);

        failure.map_or(Ok(()), Err)
    }

    async fn run_hook(
        &self,
        node: &ScenarioNode<World>,
        kind: HookKind,
        hook: Hook<World>,
        world: &mut World,
    ) -> Result<(), ExecutionError> {
        let event =
            Lifecycle::Hook { node: Some(node.id), kind, phase: Phase::Started };
        self.begin(node.id, event.clone());
        match AssertUnwindSafe(hook(&node.scenario, world)).catch_unwind().await
        {
            Ok(()) => {
                self.end(node.id, event, Status::Passed);
                Ok(())
            }
            Err(panic) => {
                self.end(node.id, event, Status::Failed);
                Err(self.fail(Some(node.id), ExecutionError::Hook {
                    kind,
                    scenario: Some(node.title.clone()),
                    message: coerce_error(&*panic).into_owned(),
                }))
            }
        }
    }
}

/// Creates the starting [`Lifecycle::Scenario`] event of the given node.
fn scenario_event<World>(node: &ScenarioNode<World>) -> Lifecycle {
    Lifecycle::Scenario {
        node: node.id,
        scenario: node.scenario.clone(),
        title: node.title.clone(),
        tags: node.tags.clone(),
        phase: Phase::Started,
    }
}

/// Aggregates the [`Status`] of a suite out of its children ones.
fn aggregate(failed: bool, children: impl IntoIterator<Item = Status>) -> Status {
    let mut passed = false;
    for status in children {
        match status {
            Status::Failed => return Status::Failed,
            Status::Passed => passed = true,
            Status::Pending | Status::Running | Status::Skipped => {}
        }
    }
    if failed {
        Status::Failed
    } else if passed {
        Status::Passed
    } else {
        Status::Pending
    }
}

/// Reference to a [`TestPlan`] node.
enum NodeRef<'p, World> {
    Feature(&'p FeatureNode<World>),
    Rule(&'p RuleNode<World>),
    Outline(&'p OutlineNode<World>),
    Examples(&'p ExamplesNode<World>),
    Scenario(&'p ScenarioNode<World>),
}

// Manual implementation is required to omit the redundant `World: Clone` trait
// bound imposed by `#[derive(Clone)]`.
impl<World> Clone for NodeRef<'_, World> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<World> Copy for NodeRef<'_, World> {}

impl<'p, World> NodeRef<'p, World> {
    /// Finds the node with the given [`NodeId`] in the `plan`.
    fn find(plan: &'p TestPlan<World>, id: NodeId) -> Option<Self> {
        plan.features.iter().find_map(|f| Self::Feature(f).find_inside(id))
    }

    fn find_inside(self, id: NodeId) -> Option<Self> {
        if self.id() == id {
            return Some(self);
        }
        self.children().into_iter().find_map(|c| c.find_inside(id))
    }

    fn item(item: &'p Item<World>) -> Self {
        match item {
            Item::Scenario(s) => Self::Scenario(s),
            Item::Outline(o) => Self::Outline(o),
            Item::Rule(r) => Self::Rule(r),
        }
    }

    const fn id(self) -> NodeId {
        match self {
            Self::Feature(n) => n.id,
            Self::Rule(n) => n.id,
            Self::Outline(n) => n.id,
            Self::Examples(n) => n.id,
            Self::Scenario(n) => n.id,
        }
    }

    fn children(self) -> Vec<Self> {
        match self {
            Self::Feature(f) => f.items.iter().map(Self::item).collect(),
            Self::Rule(r) => r.items.iter().map(Self::item).collect(),
            Self::Outline(o) => o.examples.iter().map(Self::Examples).collect(),
            Self::Examples(e) => e.scenarios.iter().map(Self::Scenario).collect(),
            Self::Scenario(_) => Vec::new(),
        }
    }

    /// Creates the starting [`Lifecycle`] event of this node.
    fn started(self) -> Lifecycle {
        let phase = Phase::Started;
        match self {
            Self::Feature(f) => Lifecycle::Feature {
                node: f.id,
                feature: Source::clone(&f.feature),
                phase,
            },
            Self::Rule(r) => {
                Lifecycle::Rule { node: r.id, rule: r.rule.clone(), phase }
            }
            Self::Outline(o) => Lifecycle::Outline {
                node: o.id,
                outline: o.outline.clone(),
                phase,
            },
            Self::Examples(e) => Lifecycle::Examples {
                node: e.id,
                examples: e.examples.clone(),
                phase,
            },
            Self::Scenario(s) => scenario_event(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, mem, rc::Rc, time::Duration};

    use futures::{
        executor::block_on, future, future::LocalBoxFuture, FutureExt as _,
    };
    use gherkin::GherkinEnv;

    use crate::{
        event::{Metadata, Phase, Source, Status},
        observer::{self, Dispatcher, Subscriber},
        plan::{Builder, NodeId},
        runner::{Basic, ExecutionError, RunReport},
        scope::{ConfigError, HookKind, ScopeRegistry},
        step::Context,
        world, World,
    };

    use super::Adapter;

    thread_local! {
        static LOG: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    fn log(msg: impl Into<String>) {
        LOG.with(|l| l.borrow_mut().push(msg.into()));
    }

    fn take_log() -> Vec<String> {
        LOG.with(|l| mem::take(&mut *l.borrow_mut()))
    }

    #[derive(Debug, Default)]
    struct Counter(u32);

    impl World for Counter {
        type Error = String;

        async fn new() -> Result<Self, Self::Error> {
            log("world");
            Ok(Self(0))
        }
    }

    struct Record;

    impl Subscriber for Record {
        fn on_feature(
            &mut self,
            _: Metadata,
            _: NodeId,
            feature: &Source<gherkin::Feature>,
            phase: Phase,
        ) -> Result<(), observer::Error> {
            log(format!("feature {}: {phase}", feature.name));
            Ok(())
        }

        fn on_scenario(
            &mut self,
            _: Metadata,
            _: NodeId,
            _: &Source<gherkin::Scenario>,
            title: &str,
            phase: Phase,
        ) -> Result<(), observer::Error> {
            log(format!("{title}: {phase}"));
            Ok(())
        }

        fn on_background(
            &mut self,
            _: Metadata,
            _: NodeId,
            step: &Source<gherkin::Step>,
            phase: Phase,
        ) -> Result<(), observer::Error> {
            log(format!("background {}: {phase}", step.value));
            Ok(())
        }

        fn on_step(
            &mut self,
            _: Metadata,
            _: NodeId,
            step: &Source<gherkin::Step>,
            phase: Phase,
        ) -> Result<(), observer::Error> {
            log(format!("step {}: {phase}", step.value));
            Ok(())
        }

        fn on_hook(
            &mut self,
            _: Metadata,
            _: Option<NodeId>,
            kind: HookKind,
            phase: Phase,
        ) -> Result<(), observer::Error> {
            if !kind.is_suite() {
                log(format!("{kind} hook: {phase}"));
            }
            Ok(())
        }

        fn on_error(
            &mut self,
            _: Metadata,
            _: Option<NodeId>,
            error: &ExecutionError,
        ) -> Result<(), observer::Error> {
            log(format!("error: {error}"));
            Ok(())
        }
    }

    async fn explode() {
        panic!("kaboom")
    }

    fn a_counter(w: &mut Counter, _: Context) -> LocalBoxFuture<'_, ()> {
        async move { w.0 = 1 }.boxed_local()
    }

    fn incremented(w: &mut Counter, _: Context) -> LocalBoxFuture<'_, ()> {
        async move {
            w.0 += 1;
            log(format!("incremented to {}", w.0));
        }
        .boxed_local()
    }

    fn is_two(w: &mut Counter, _: Context) -> LocalBoxFuture<'_, ()> {
        async move { assert_eq!(w.0, 2, "not two") }.boxed_local()
    }

    fn explodes(_: &mut Counter, _: Context) -> LocalBoxFuture<'_, ()> {
        explode().boxed_local()
    }

    fn hangs(_: &mut Counter, _: Context) -> LocalBoxFuture<'_, ()> {
        future::pending().boxed_local()
    }

    fn before<'a>(
        s: &'a gherkin::Scenario,
        _: &'a mut Counter,
    ) -> LocalBoxFuture<'a, ()> {
        async move { log(format!("before {}", s.name)) }.boxed_local()
    }

    fn after<'a>(
        s: &'a gherkin::Scenario,
        _: &'a mut Counter,
    ) -> LocalBoxFuture<'a, ()> {
        async move { log(format!("after {}", s.name)) }.boxed_local()
    }

    fn setup() -> LocalBoxFuture<'static, ()> {
        async { log("setup") }.boxed_local()
    }

    fn teardown() -> LocalBoxFuture<'static, ()> {
        async { log("teardown") }.boxed_local()
    }

    fn broken_setup() -> LocalBoxFuture<'static, ()> {
        explode().boxed_local()
    }

    fn steps(r: &mut ScopeRegistry<Counter>) -> Result<(), ConfigError> {
        r.step("a counter", a_counter)?;
        r.step("it is incremented", incremented)?;
        r.step("it is two", is_two)?;
        r.step("it explodes", explodes)?;
        r.step("it hangs", hangs)
    }

    fn run(
        text: &str,
        timeout: Option<Duration>,
        scopes: impl FnOnce(&mut ScopeRegistry<Counter>) -> Result<(), ConfigError>,
    ) -> (RunReport, Vec<String>) {
        let mut reg = ScopeRegistry::new();
        steps(&mut reg).unwrap();
        scopes(&mut reg).unwrap();
        let tree = reg.finalize().unwrap();
        let feature =
            gherkin::Feature::parse(text, GherkinEnv::default()).unwrap();
        let plan = Builder::new(&tree).build([feature]);

        let mut dispatcher = Dispatcher::new();
        dispatcher.subscribe(Record);
        let adapter =
            Adapter::new(plan, world::factory(), Rc::new(dispatcher))
                .timeout(timeout);
        let mut host = Basic::default();
        adapter.register(&mut host);

        _ = take_log();
        _ = block_on(host.run());
        (adapter.report(), take_log())
    }

    fn without_features(log: Vec<String>) -> Vec<String> {
        log.into_iter().filter(|l| !l.starts_with("feature ")).collect()
    }

    const COUNTER: &str = "Feature: Counter\n\
                           \n\
                           \x20 Background:\n\
                           \x20   Given a counter\n\
                           \n\
                           \x20 Scenario: A\n\
                           \x20   When it is incremented\n\
                           \x20   Then it is two\n\
                           \n\
                           \x20 @skip\n\
                           \x20 Scenario: B\n\
                           \x20   When it is incremented\n";

    #[test]
    fn runs_ready_and_reports_skipped_scenarios() {
        let (report, log) = run(COUNTER, None, |_| Ok(()));

        assert_eq!(report.scenario("A").unwrap().status, Status::Passed);
        assert_eq!(report.scenario("B").unwrap().status, Status::Pending);
        assert!(!report.execution_has_failed());
        assert_eq!(
            log,
            [
                "feature Counter: started",
                "A: started",
                "world",
                "background a counter: started",
                "background a counter: finished (passed)",
                "step it is incremented: started",
                "incremented to 2",
                "step it is incremented: finished (passed)",
                "step it is two: started",
                "step it is two: finished (passed)",
                "A: finished (passed)",
                "B: started",
                "B: finished (pending)",
                "feature Counter: finished (passed)",
            ],
        );
    }

    #[test]
    fn failed_step_skips_the_rest_but_runs_after_hooks() {
        let text = "Feature: Counter\n\
                    \x20 Scenario: A\n\
                    \x20   Given a counter\n\
                    \x20   When it explodes\n\
                    \x20   Then it is two\n";

        let (report, log) = run(text, None, |r| {
            r.before(before)?;
            r.after(after)
        });

        let a = report.scenario("A").unwrap();
        assert_eq!(a.status, Status::Failed);
        assert!(
            matches!(&a.error, Some(ExecutionError::Step { step, .. }) if step == "it explodes"),
            "error: {:?}",
            a.error,
        );
        assert_eq!(
            without_features(log),
            [
                "A: started",
                "world",
                "before hook: started",
                "before A",
                "before hook: finished (passed)",
                "step a counter: started",
                "step a counter: finished (passed)",
                "step it explodes: started",
                "step it explodes: finished (failed)",
                "error: Scenario `A`: step `it explodes` failed: kaboom",
                "step it is two: started",
                "step it is two: finished (skipped)",
                "after hook: started",
                "after A",
                "after hook: finished (passed)",
                "A: finished (failed)",
            ],
        );
    }

    const THREE: &str = "Feature: Counter\n\
                         \x20 Scenario: A\n\
                         \x20   When it is incremented\n\
                         \x20 Scenario: B\n\
                         \x20   When it is incremented\n\
                         \x20 Scenario: C\n\
                         \x20   When it is incremented\n";

    #[test]
    fn runs_setup_and_teardown_once() {
        let (report, log) = run(THREE, None, |r| {
            _ = r.feature("Counter", &[], |r| {
                r.setup(setup)?;
                r.teardown(teardown)
            })?;
            Ok(())
        });

        assert_eq!(report.count(Status::Passed), 3);
        assert_eq!(log.iter().filter(|l| *l == "setup").count(), 1);
        assert_eq!(log.iter().filter(|l| *l == "teardown").count(), 1);
        let pos = |s: &str| log.iter().position(|l| l == s).unwrap();
        assert!(pos("setup") < pos("world"));
        assert!(pos("teardown") > log.iter().rposition(|l| l == "world").unwrap());
        assert!(pos("teardown") < pos("feature Counter: finished (passed)"));
    }

    #[test]
    fn failed_setup_fails_scenarios_without_running_them() {
        let (report, log) = run(THREE, None, |r| {
            _ = r.feature("Counter", &[], |r| {
                r.setup(broken_setup)?;
                r.teardown(teardown)
            })?;
            Ok(())
        });

        assert_eq!(report.count(Status::Failed), 3);
        assert_eq!(
            report.scenario("B").unwrap().error,
            Some(ExecutionError::Setup { scenario: "B".into() }),
        );
        assert!(!log.iter().any(|l| l == "world"), "log: {log:?}");
        assert!(log.iter().any(|l| l == "teardown"), "log: {log:?}");
        assert!(
            log.iter().any(|l| l == "feature Counter: finished (failed)"),
            "log: {log:?}",
        );
    }

    #[test]
    fn runs_every_same_titled_scenario() {
        let text = "Feature: Counter\n\
                    \x20 Scenario: A\n\
                    \x20   When it is incremented\n\
                    \x20 Scenario: A\n\
                    \x20   When it is incremented\n";

        let (report, log) = run(text, None, |_| Ok(()));

        assert_eq!(report.count(Status::Passed), 2);
        assert_eq!(report.count(Status::Pending), 0);
        assert_eq!(log.iter().filter(|l| *l == "world").count(), 2);
        assert_eq!(
            log.iter().filter(|l| *l == "A: finished (passed)").count(),
            2,
        );
    }

    #[test]
    fn broken_scenario_fails_alone() {
        let text = "Feature: Counter\n\
                    \x20 Scenario: A\n\
                    \x20   When it is decremented\n\
                    \x20 Scenario: B\n\
                    \x20   When it is incremented\n";

        let (report, log) = run(text, None, |_| Ok(()));

        let a = report.scenario("A").unwrap();
        assert_eq!(a.status, Status::Failed);
        assert!(
            matches!(a.error, Some(ExecutionError::Resolution(_))),
            "error: {:?}",
            a.error,
        );
        assert_eq!(report.scenario("B").unwrap().status, Status::Passed);
        assert_eq!(log.iter().filter(|l| *l == "world").count(), 1);
    }

    #[test]
    fn times_out_hanging_scenario() {
        let text = "Feature: Counter\n\
                    \x20 Scenario: A\n\
                    \x20   When it hangs\n\
                    \x20 Scenario: B\n\
                    \x20   When it is incremented\n";

        let (report, log) =
            run(text, Some(Duration::from_millis(50)), |_| Ok(()));

        let a = report.scenario("A").unwrap();
        assert_eq!(a.status, Status::Failed);
        assert!(
            matches!(a.error, Some(ExecutionError::Timeout { .. })),
            "error: {:?}",
            a.error,
        );
        assert_eq!(report.scenario("B").unwrap().status, Status::Passed);
        assert!(
            log.iter().any(|l| l == "step it hangs: finished (failed)"),
            "log: {log:?}",
        );
        assert_eq!(log.iter().filter(|l| *l == "A: started").count(), 1);
        assert_eq!(
            log.iter().filter(|l| *l == "A: finished (failed)").count(),
            1,
        );
    }
}
