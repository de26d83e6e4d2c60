//! Execution: runs an [`ExecutionPlan`] serially and records one
//! [`TestResult`] per declared test.

use crate::callback::{panic_message, Callback};
use crate::error::{Failure, InvokeError, ScopeFailure};
use crate::fixtures::Fixtures;
use crate::plan::{full_name, Disposition, ExecutionPlan, ScopeStep, SkipReason, Step, TestStep};
use crate::registry::HookKind;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Passed,
    /// The body panicked or its `Done` was failed.
    Failed,
    /// A hook failed or the test timed out.
    Errored,
    Skipped,
    Todo,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Passed => "passed",
            Status::Failed => "failed",
            Status::Errored => "errored",
            Status::Skipped => "skipped",
            Status::Todo => "todo",
        })
    }
}

#[derive(Debug, Clone)]
pub struct TestResult {
    /// Names of the enclosing scopes, outermost first.
    pub path: Vec<String>,
    pub name: String,
    pub status: Status,
    pub failure: Option<Failure>,
    /// Set for skipped tests.
    pub skip_reason: Option<SkipReason>,
    pub duration: Duration,
}

impl TestResult {
    pub fn full_name(&self) -> String {
        let path: Vec<&str> = self.path.iter().map(String::as_str).collect();
        full_name(&path, &self.name)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, Status::Failed | Status::Errored)
    }
}

/// Everything a run produced, in plan order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub results: Vec<TestResult>,
    /// `after_all` failures, which belong to no single test.
    pub scope_failures: Vec<ScopeFailure>,
    pub duration: Duration,
}

impl RunReport {
    pub fn count(&self, status: Status) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn passed(&self) -> usize {
        self.count(Status::Passed)
    }

    /// Failed plus errored tests.
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_failure()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.scope_failures.is_empty()
    }

    pub fn statuses(&self) -> Vec<(String, Status)> {
        self.results
            .iter()
            .map(|r| (r.full_name(), r.status))
            .collect()
    }

    pub(crate) fn merge(&mut self, other: RunReport) {
        self.results.extend(other.results);
        self.scope_failures.extend(other.scope_failures);
        self.duration += other.duration;
    }
}

// ============================================================================
// Reporter: progress callbacks
// ============================================================================

/// Observer notified while a plan runs.
pub trait Reporter {
    fn scope_entered(&mut self, _scope: &ScopeStep<'_>) {}
    fn scope_exited(&mut self, _scope: &ScopeStep<'_>) {}
    fn test_finished(&mut self, _result: &TestResult) {}
    fn scope_failed(&mut self, _failure: &ScopeFailure) {}
}

/// Reporter that ignores everything.
pub struct Silent;

impl Reporter for Silent {}

// ============================================================================
// Executor
// ============================================================================

/// Runs plans. Holds only configuration, so one executor can run any number
/// of plans, one after the other.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    default_timeout: Option<Duration>,
}

/// Per-scope execution state.
struct Frame {
    /// Whether this scope's `before_all` hooks were run (and so its
    /// `after_all` hooks must be).
    entered: bool,
    /// Set when this scope or an ancestor failed in `before_all`.
    blocked: Option<Failure>,
}

impl Executor {
    pub fn new() -> Self {
        Executor::default()
    }

    /// Timeout for hooks, and for tests without their own `.timeout()`.
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn run(&self, plan: &ExecutionPlan<'_>) -> RunReport {
        self.run_with(plan, &mut Silent)
    }

    pub fn run_with(&self, plan: &ExecutionPlan<'_>, reporter: &mut dyn Reporter) -> RunReport {
        let start = Instant::now();
        let mut fixtures = Fixtures::new();
        let mut frames: Vec<Frame> = Vec::new();
        let mut report = RunReport::default();

        for step in plan.steps() {
            match step {
                Step::Enter(scope) => {
                    let frame = self.enter(scope, frames.last(), &mut fixtures);
                    frames.push(frame);
                    reporter.scope_entered(scope);
                }
                Step::Test(test) => {
                    let result = self.run_test(test, frames.last(), &mut fixtures);
                    tracing::debug!(test = %result.full_name(), status = %result.status, "test finished");
                    reporter.test_finished(&result);
                    report.results.push(result);
                }
                Step::Exit(scope) => {
                    let entered = frames.pop().map_or(false, |frame| frame.entered);
                    if entered {
                        for failure in self.exit(scope, &mut fixtures) {
                            reporter.scope_failed(&failure);
                            report.scope_failures.push(failure);
                        }
                    }
                    fixtures.pop_layer();
                    reporter.scope_exited(scope);
                }
            }
        }

        report.duration = start.elapsed();
        tracing::info!(
            passed = report.passed(),
            failed = report.failed(),
            skipped = report.count(Status::Skipped),
            todo = report.count(Status::Todo),
            scope_failures = report.scope_failures.len(),
            "run finished"
        );
        report
    }

    /// Open a scope: push its fixture layer and run its `before_all` hooks,
    /// unless an enclosing scope is already blocked.
    fn enter(&self, scope: &ScopeStep<'_>, parent: Option<&Frame>, fixtures: &mut Fixtures) -> Frame {
        fixtures.push_layer();

        if let Some(blocked) = parent.and_then(|frame| frame.blocked.clone()) {
            return Frame {
                entered: false,
                blocked: Some(blocked),
            };
        }

        tracing::debug!(scope = %scope.label(), "entering scope");
        for hook in scope.scope.hooks().get(HookKind::BeforeAll) {
            if let Err(source) = self.invoke(&**hook, fixtures, self.default_timeout) {
                let failure = Failure::BeforeAll {
                    scope: scope.label(),
                    source,
                };
                tracing::warn!(%failure, "tests in scope will be marked errored");
                return Frame {
                    entered: true,
                    blocked: Some(failure),
                };
            }
        }

        Frame {
            entered: true,
            blocked: None,
        }
    }

    /// Run every `after_all` hook of a scope, collecting failures.
    fn exit(&self, scope: &ScopeStep<'_>, fixtures: &mut Fixtures) -> Vec<ScopeFailure> {
        tracing::debug!(scope = %scope.label(), "leaving scope");
        let mut failures = Vec::new();
        for hook in scope.scope.hooks().get(HookKind::AfterAll) {
            if let Err(source) = self.invoke(&**hook, fixtures, self.default_timeout) {
                let failure = ScopeFailure {
                    scope: scope.label(),
                    source,
                };
                tracing::warn!(%failure, "after_all hook failed");
                failures.push(failure);
            }
        }
        failures
    }

    fn run_test(&self, step: &TestStep<'_>, frame: Option<&Frame>, fixtures: &mut Fixtures) -> TestResult {
        let start = Instant::now();
        let (status, failure) = match step.disposition {
            Disposition::Skip(_) => (Status::Skipped, None),
            Disposition::Todo => (Status::Todo, None),
            Disposition::Run => match frame.and_then(|frame| frame.blocked.clone()) {
                Some(blocked) => (Status::Errored, Some(blocked)),
                None => {
                    let failure = self.run_runnable(step, fixtures);
                    let status = match failure {
                        None => Status::Passed,
                        Some(ref f) if f.is_error() => Status::Errored,
                        Some(_) => Status::Failed,
                    };
                    (status, failure)
                }
            },
        };

        TestResult {
            path: step.path.iter().map(|s| s.to_string()).collect(),
            name: step.test.name().to_string(),
            status,
            failure,
            skip_reason: match step.disposition {
                Disposition::Skip(reason) => Some(reason),
                _ => None,
            },
            duration: start.elapsed(),
        }
    }

    /// before_each (outer→inner) → body → after_each (inner→outer). After
    /// hooks run for every scope whose before hooks were started, whatever
    /// happened in between. The first failure wins.
    fn run_runnable(&self, step: &TestStep<'_>, fixtures: &mut Fixtures) -> Option<Failure> {
        fixtures.push_layer();
        let mut failure = None;
        let mut entered = 0;

        'levels: for scope in step.chain() {
            entered += 1;
            for hook in scope.hooks().get(HookKind::BeforeEach) {
                if let Err(source) = self.invoke(&**hook, fixtures, self.default_timeout) {
                    failure = Some(Failure::Hook {
                        kind: HookKind::BeforeEach,
                        source,
                    });
                    break 'levels;
                }
            }
        }

        if failure.is_none() {
            if let Some(body) = step.test.body() {
                let limit = step.test.timeout().or(self.default_timeout);
                if let Err(source) = self.invoke(body, fixtures, limit) {
                    failure = Some(Failure::Test(source));
                }
            }
        }

        for scope in step.chain()[..entered].iter().rev() {
            for hook in scope.hooks().get(HookKind::AfterEach) {
                if let Err(source) = self.invoke(&**hook, fixtures, self.default_timeout) {
                    let hook_failure = Failure::Hook {
                        kind: HookKind::AfterEach,
                        source,
                    };
                    if failure.is_none() {
                        failure = Some(hook_failure);
                    } else {
                        tracing::warn!(test = %step.full_name(), failure = %hook_failure, "additional failure");
                    }
                }
            }
        }

        fixtures.pop_layer();
        failure
    }

    /// Call one hook or body, catching panics and waiting out suspensions.
    fn invoke(
        &self,
        callback: &dyn Callback,
        fixtures: &mut Fixtures,
        limit: Option<Duration>,
    ) -> Result<(), InvokeError> {
        let start = Instant::now();
        let suspension = catch_unwind(AssertUnwindSafe(|| callback.invoke(fixtures)))
            .map_err(|payload| InvokeError::Panicked(panic_message(&*payload)))?;
        let elapsed = start.elapsed();

        // The synchronous part alone already overran, whatever it signalled.
        if let Some(limit) = limit.filter(|limit| elapsed > *limit) {
            return Err(InvokeError::TimedOut(limit));
        }

        match suspension {
            Some(suspension) => {
                suspension.wait(limit.map(|limit| limit.saturating_sub(elapsed)), limit)
            }
            None => Ok(()),
        }
    }
}
