// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Per-node [`ExecutionResult`]s of a run.

use std::{
    cell::RefCell,
    collections::HashMap,
    time::{Duration, SystemTime},
};

use crate::{event::Status, plan::NodeId};

use super::ExecutionError;

/// Mutable status record of a single [`TestPlan`] node.
///
/// Created lazily, once the node is touched by the execution. Its terminal
/// [`Status`] is set exactly once.
///
/// [`TestPlan`]: crate::plan::TestPlan
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    /// [`NodeId`] of the node.
    pub node: NodeId,

    /// Current [`Status`].
    pub status: Status,

    /// Whether the [`Status`] is terminal already.
    pub finished: bool,

    /// [`SystemTime`] the node has started at.
    pub started_at: Option<SystemTime>,

    /// Execution duration of the node, once finished.
    pub duration: Option<Duration>,

    /// First failure of the node, if any.
    pub error: Option<ExecutionError>,
}

impl ExecutionResult {
    fn new(node: NodeId) -> Self {
        Self {
            node,
            status: Status::Pending,
            finished: false,
            started_at: None,
            duration: None,
            error: None,
        }
    }
}

/// Storage of [`ExecutionResult`]s of a single run.
#[derive(Debug, Default)]
pub struct Results {
    inner: RefCell<HashMap<NodeId, ExecutionResult>>,
}

impl Results {
    /// Creates a new empty [`Results`] storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the [`ExecutionResult`] of the given node, if it
    /// was touched by the execution.
    #[must_use]
    pub fn get(&self, node: NodeId) -> Option<ExecutionResult> {
        self.inner.borrow().get(&node).cloned()
    }

    /// Returns the current [`Status`] of the given node.
    #[must_use]
    pub fn status(&self, node: NodeId) -> Status {
        self.inner.borrow().get(&node).map_or(Status::Pending, |r| r.status)
    }

    /// Indicates whether the given node has started already.
    #[must_use]
    pub fn is_started(&self, node: NodeId) -> bool {
        self.inner.borrow().get(&node).is_some_and(|r| r.started_at.is_some())
    }

    /// Indicates whether the given node has its terminal [`Status`] already.
    #[must_use]
    pub fn is_finished(&self, node: NodeId) -> bool {
        self.inner.borrow().get(&node).is_some_and(|r| r.finished)
    }

    /// Returns the number of nodes touched by the execution.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    /// Indicates whether no nodes were touched by the execution.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// Marks the given node as started, switching it to the given `status`.
    ///
    /// Returns `false` if it has started already.
    pub(crate) fn start(&self, node: NodeId, status: Status) -> bool {
        let mut inner = self.inner.borrow_mut();
        let res = inner.entry(node).or_insert_with(|| ExecutionResult::new(node));
        if res.started_at.is_some() || res.finished {
            return false;
        }
        res.started_at = Some(SystemTime::now());
        res.status = status;
        true
    }

    /// Sets the terminal `status` of the given node.
    ///
    /// Returns `false` if it has been set already.
    pub(crate) fn finish(
        &self,
        node: NodeId,
        status: Status,
        error: Option<ExecutionError>,
    ) -> bool {
        let mut inner = self.inner.borrow_mut();
        let res = inner.entry(node).or_insert_with(|| ExecutionResult::new(node));
        if res.finished {
            return false;
        }
        res.finished = true;
        res.status = status;
        res.duration = res
            .started_at
            .and_then(|at| SystemTime::now().duration_since(at).ok());
        if res.error.is_none() {
            res.error = error;
        }
        true
    }

    /// Builds a [`RunReport`] over the given scenario nodes.
    #[must_use]
    pub fn report(
        &self,
        scenarios: impl IntoIterator<Item = (NodeId, String)>,
        subscriber_failures: usize,
    ) -> RunReport {
        let inner = self.inner.borrow();
        let scenarios = scenarios
            .into_iter()
            .map(|(node, title)| {
                let res = inner.get(&node);
                ScenarioReport {
                    node,
                    title,
                    status: res.map_or(Status::Pending, |r| r.status),
                    error: res.and_then(|r| r.error.clone()),
                }
            })
            .collect();
        RunReport { scenarios, subscriber_failures }
    }
}

/// Outcome of a single scenario in a [`RunReport`].
#[derive(Clone, Debug)]
pub struct ScenarioReport {
    /// [`NodeId`] of the scenario.
    pub node: NodeId,

    /// Title of the scenario.
    pub title: String,

    /// Terminal [`Status`] of the scenario.
    pub status: Status,

    /// First failure of the scenario, if any.
    pub error: Option<ExecutionError>,
}

/// Outcome of a whole run.
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Outcomes of every scenario, in document order.
    pub scenarios: Vec<ScenarioReport>,

    /// Number of failed [`Subscriber`] deliveries.
    ///
    /// [`Subscriber`]: crate::observer::Subscriber
    pub subscriber_failures: usize,
}

impl RunReport {
    /// Returns the number of scenarios with the given [`Status`].
    #[must_use]
    pub fn count(&self, status: Status) -> usize {
        self.scenarios.iter().filter(|s| s.status == status).count()
    }

    /// Indicates whether some scenario has failed.
    #[must_use]
    pub fn execution_has_failed(&self) -> bool {
        self.count(Status::Failed) > 0
    }

    /// Returns the outcome of the scenario with the given title.
    #[must_use]
    pub fn scenario(&self, title: &str) -> Option<&ScenarioReport> {
        self.scenarios.iter().find(|s| s.title == title)
    }
}
