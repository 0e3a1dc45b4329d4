use std::{cell::RefCell, convert::Infallible, rc::Rc, time::Duration};

use cucumber_plan::{
    cli,
    event::{Metadata, Phase, Source, Status},
    gherkin,
    observer::{self, Subscriber},
    parser,
    plan::NodeId,
    runner::ExecutionError,
    scope::ConfigError,
    step::Context,
    writer::Coloring,
    Harness, RunReport, ScopeRegistry, World,
};
use futures::{future, future::LocalBoxFuture, FutureExt as _};

thread_local! {
    static CALLS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn call(what: impl Into<String>) {
    CALLS.with(|c| c.borrow_mut().push(what.into()));
}

fn calls() -> Vec<String> {
    CALLS.with(|c| c.borrow().clone())
}

fn count(what: &str) -> usize {
    calls().iter().filter(|c| *c == what).count()
}

#[derive(Debug, Default)]
struct Counter(i64);

impl World for Counter {
    type Error = Infallible;

    async fn new() -> Result<Self, Self::Error> {
        Ok(Self::default())
    }
}

fn at(w: &mut Counter, ctx: Context) -> LocalBoxFuture<'_, ()> {
    async move {
        w.0 = ctx.arg(1).expect("counter value");
        call(format!("at {}", w.0));
    }
    .boxed_local()
}

fn incremented(w: &mut Counter, _: Context) -> LocalBoxFuture<'_, ()> {
    async move {
        w.0 += 1;
        call("incremented");
    }
    .boxed_local()
}

fn shadowed(w: &mut Counter, _: Context) -> LocalBoxFuture<'_, ()> {
    async move {
        w.0 += 10;
        call("shadowed");
    }
    .boxed_local()
}

fn counter_is(w: &mut Counter, ctx: Context) -> LocalBoxFuture<'_, ()> {
    async move {
        let expected: i64 = ctx.arg(1).expect("expected value");
        assert_eq!(w.0, expected, "unexpected counter value");
    }
    .boxed_local()
}

fn waits_forever(_: &mut Counter, _: Context) -> LocalBoxFuture<'_, ()> {
    future::pending().boxed_local()
}

fn steps(r: &mut ScopeRegistry<Counter>) -> Result<(), ConfigError> {
    r.step("a counter at {int}", at)?;
    r.step("it is incremented", incremented)?;
    r.step("the counter is {int}", counter_is)?;
    r.step("it waits forever", waits_forever)
}

fn feature(name: &str) -> gherkin::Feature {
    parser::parse_path(format!(
        "{}/tests/features/{name}.feature",
        env!("CARGO_MANIFEST_DIR"),
    ))
    .expect("fixture parses")
}

/// Records scenario transitions.
#[derive(Clone, Default)]
struct Record(Rc<RefCell<Vec<String>>>);

impl Record {
    fn events(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

impl Subscriber for Record {
    fn on_scenario(
        &mut self,
        _: Metadata,
        _: NodeId,
        _: &Source<gherkin::Scenario>,
        title: &str,
        phase: Phase,
    ) -> Result<(), observer::Error> {
        self.0.borrow_mut().push(format!("{title}: {phase}"));
        Ok(())
    }
}

/// Fails on every event it receives.
struct Faulty;

impl Subscriber for Faulty {
    fn on_event(
        &mut self,
        _: &cucumber_plan::Event<cucumber_plan::event::Lifecycle>,
    ) -> Result<(), observer::Error> {
        Err(observer::Error::other("disk full"))
    }
}

async fn run(
    features: impl IntoIterator<Item = gherkin::Feature>,
    scopes: impl FnOnce(&mut ScopeRegistry<Counter>) -> Result<(), ConfigError>,
) -> RunReport {
    Harness::<Counter>::new()
        .quiet()
        .scopes(steps)
        .and_then(|h| h.scopes(scopes))
        .expect("scopes are valid")
        .run(features)
        .await
        .expect("plan is built")
}

fn status(report: &RunReport, title: &str) -> Status {
    report.scenario(title).expect("scenario is reported").status
}

#[tokio::test]
async fn background_counter_example() {
    let record = Record::default();

    let report = Harness::<Counter>::new()
        .coloring(Coloring::Never)
        .subscribe(record.clone())
        .scopes(steps)
        .unwrap()
        .run([feature("counter")])
        .await
        .unwrap();

    assert_eq!(status(&report, "A"), Status::Passed);
    assert_eq!(status(&report, "B"), Status::Pending);
    assert_eq!(calls(), ["at 0", "incremented"]);
    assert_eq!(
        record.events(),
        [
            "A: started",
            "A: finished (passed)",
            "B: started",
            "B: finished (pending)",
        ],
    );
}

#[tokio::test]
async fn skip_propagates_to_every_descendant() {
    let record = Record::default();

    let report = Harness::<Counter>::new()
        .quiet()
        .subscribe(record.clone())
        .scopes(steps)
        .unwrap()
        .run([feature("skipped")])
        .await
        .unwrap();

    assert_eq!(report.scenarios.len(), 4);
    assert_eq!(report.count(Status::Pending), 4);
    assert!(calls().is_empty(), "calls: {:?}", calls());
    let events = record.events();
    for scenario in &report.scenarios {
        let started = format!("{}: started", scenario.title);
        let finished = format!("{}: finished (pending)", scenario.title);
        assert_eq!(events.iter().filter(|e| **e == started).count(), 1);
        assert_eq!(events.iter().filter(|e| **e == finished).count(), 1);
    }
}

#[tokio::test]
async fn only_restricts_execution_to_marked_siblings() {
    let elsewhere = parser::parse_str(
        "Feature: Elsewhere\n\
         \x20 Scenario: unrelated\n\
         \x20   When it is incremented\n",
    )
    .unwrap();

    let report = run([feature("only"), elsewhere], |_| Ok(())).await;

    assert_eq!(status(&report, "chosen"), Status::Passed);
    assert_eq!(status(&report, "left out"), Status::Pending);
    assert_eq!(status(&report, "rows 1 #1"), Status::Pending);
    assert_eq!(status(&report, "rows 2 #2"), Status::Passed);
    assert_eq!(status(&report, "in the rule"), Status::Passed);
    assert_eq!(status(&report, "unrelated"), Status::Pending);
    assert_eq!(count("incremented"), 2);
    assert_eq!(count("at 2"), 1);
    assert_eq!(count("at 1"), 0);
}

fn before_outer<'a>(
    _: &'a gherkin::Scenario,
    _: &'a mut Counter,
) -> LocalBoxFuture<'a, ()> {
    async { call("before outer") }.boxed_local()
}

fn before_inner<'a>(
    _: &'a gherkin::Scenario,
    _: &'a mut Counter,
) -> LocalBoxFuture<'a, ()> {
    async { call("before inner") }.boxed_local()
}

fn after_outer<'a>(
    _: &'a gherkin::Scenario,
    _: &'a mut Counter,
) -> LocalBoxFuture<'a, ()> {
    async { call("after outer") }.boxed_local()
}

fn after_inner<'a>(
    s: &'a gherkin::Scenario,
    w: &'a mut Counter,
) -> LocalBoxFuture<'a, ()> {
    async move { call(format!("after inner: {} = {}", s.name, w.0)) }
        .boxed_local()
}

#[tokio::test]
async fn hooks_wrap_inner_to_outer() {
    let report = run([feature("hooks")], |r| {
        r.before(before_outer)?;
        r.after(after_outer)?;
        _ = r.feature("Hooks", &[], |r| {
            _ = r.rule("inner", &[], |r| {
                r.before(before_inner)?;
                r.after(after_inner)
            })?;
            Ok(())
        })?;
        Ok(())
    })
    .await;

    assert_eq!(status(&report, "wrapped"), Status::Passed);
    assert_eq!(
        calls(),
        [
            "before outer",
            "before inner",
            "incremented",
            "after inner: wrapped = 1",
            "after outer",
        ],
    );
}

#[tokio::test]
async fn innermost_step_declaration_wins() {
    let report = run([feature("shadowing")], |r| {
        _ = r.feature("Shadowing", &[], |r| {
            _ = r.scenario("inner", &[], |r| {
                r.step("it is incremented", shadowed)
            })?;
            Ok(())
        })?;
        Ok(())
    })
    .await;

    assert_eq!(status(&report, "outer"), Status::Passed);
    assert_eq!(status(&report, "inner"), Status::Passed);
    assert_eq!(count("incremented"), 1);
    assert_eq!(count("shadowed"), 1);
}

#[tokio::test]
async fn outline_expands_into_scenarios() {
    let plan = Harness::<Counter>::new()
        .scopes(steps)
        .unwrap()
        .plan([feature("outline")])
        .unwrap();

    let scenarios = plan.scenarios();
    let titles = scenarios.iter().map(|s| s.title.as_str()).collect::<Vec<_>>();
    assert_eq!(
        titles,
        ["starting at 1 #1", "starting at 5 #2", "starting at 9 #3"],
    );
    for s in &scenarios {
        assert_eq!(s.steps.len(), 3);
        assert!(s.steps.iter().all(|b| !b.step.value.contains('<')));
    }
    assert_eq!(scenarios[1].steps[2].step.value, "the counter is 6");

    let report = run([feature("outline")], |_| Ok(())).await;

    assert_eq!(report.count(Status::Passed), 3);
    assert_eq!(count("incremented"), 3);
}

fn setup() -> LocalBoxFuture<'static, ()> {
    async { call("setup") }.boxed_local()
}

fn teardown() -> LocalBoxFuture<'static, ()> {
    async { call("teardown") }.boxed_local()
}

#[tokio::test]
async fn setup_and_teardown_run_once_per_suite() {
    let report = run([feature("setup")], |r| {
        _ = r.feature("Setup", &[], |r| {
            r.setup(setup)?;
            r.teardown(teardown)
        })?;
        Ok(())
    })
    .await;

    assert_eq!(report.count(Status::Passed), 4);
    assert_eq!(report.count(Status::Failed), 1);
    assert!(matches!(
        report.scenario("third").unwrap().error,
        Some(ExecutionError::Step { .. }),
    ));
    assert_eq!(count("setup"), 1);
    assert_eq!(count("teardown"), 1);
    assert_eq!(count("incremented"), 5);
    assert_eq!(calls().first().map(String::as_str), Some("setup"));
    assert_eq!(calls().last().map(String::as_str), Some("teardown"));
}

fn reset(w: &mut Counter, _: Context) -> LocalBoxFuture<'_, ()> {
    async move { w.0 = 0 }.boxed_local()
}

#[tokio::test]
async fn resolution_errors_break_only_their_scenarios() {
    let report = run([feature("broken")], |r| {
        r.step("it is reset", reset)?;
        r.step_regex(regex::Regex::new("^it is (reset|cleared)$").unwrap(), reset)
    })
    .await;

    let unresolved = report.scenario("unresolved").unwrap();
    assert_eq!(unresolved.status, Status::Failed);
    let err = unresolved.error.as_ref().unwrap().to_string();
    assert!(err.contains("unresolved"), "error: {err}");
    assert!(err.contains("it is decremented"), "error: {err}");

    let ambiguous = report.scenario("ambiguous").unwrap();
    assert_eq!(ambiguous.status, Status::Failed);
    let err = ambiguous.error.as_ref().unwrap().to_string();
    assert!(err.contains("it is reset"), "error: {err}");
    assert!(err.contains("^it is (reset|cleared)$"), "error: {err}");

    assert_eq!(status(&report, "fine"), Status::Passed);
    assert_eq!(calls(), ["incremented"]);
}

#[tokio::test]
async fn timeout_fails_only_the_hanging_scenario() {
    let text = "Feature: Waiting\n\
                \x20 Scenario: hanging\n\
                \x20   When it waits forever\n\
                \x20 Scenario: quick\n\
                \x20   When it is incremented\n";

    let report = Harness::<Counter>::new()
        .quiet()
        .timeout(Duration::from_millis(100))
        .scopes(steps)
        .unwrap()
        .run([parser::parse_str(text).unwrap()])
        .await
        .unwrap();

    let hanging = report.scenario("hanging").unwrap();
    assert_eq!(hanging.status, Status::Failed);
    assert_eq!(
        hanging.error,
        Some(ExecutionError::Timeout {
            scenario: "hanging".into(),
            timeout: Duration::from_millis(100),
        }),
    );
    assert_eq!(status(&report, "quick"), Status::Passed);
}

#[tokio::test]
async fn failing_subscriber_does_not_interrupt_delivery() {
    let record = Record::default();

    let report = Harness::<Counter>::new()
        .quiet()
        .subscribe(Faulty)
        .subscribe(record.clone())
        .scopes(steps)
        .unwrap()
        .run([feature("counter")])
        .await
        .unwrap();

    assert_eq!(status(&report, "A"), Status::Passed);
    assert!(report.subscriber_failures > 0);
    assert_eq!(record.events().len(), 4);
}

#[tokio::test]
async fn cli_filters_scenarios() {
    let opts =
        cli::Opts::<cli::Empty>::try_parse_from(["tests", "--tags", "@fast"])
            .unwrap();

    let report = Harness::<Counter>::new()
        .quiet()
        .with_cli(opts)
        .scopes(steps)
        .unwrap()
        .run([feature("filtered")])
        .await
        .unwrap();

    assert_eq!(status(&report, "quick"), Status::Passed);
    assert_eq!(status(&report, "slow"), Status::Pending);
    assert_eq!(calls(), ["incremented"]);
}

#[tokio::test]
#[should_panic(expected = "1 scenario failed")]
async fn run_and_exit_panics_on_failures() {
    Harness::<Counter>::new()
        .quiet()
        .scopes(steps)
        .unwrap()
        .run_and_exit([feature("setup")])
        .await;
}
