//! Scheduling: flattens a collected scope tree into an [`ExecutionPlan`].
//!
//! The walk is depth-first in declaration order. Every scope that holds at
//! least one runnable test is bracketed by an [`Step::Enter`] (its
//! `before_all` hooks) and an [`Step::Exit`] (its `after_all` hooks); a
//! nested scope is closed before its next sibling is opened. Scopes with
//! nothing to run get no brackets, but their tests still appear as
//! non-runnable steps so every declared test gets a result.

use crate::registry::{BoxedCallback, HookKind, Mode, Node, Scope, Test};

/// Which tests a plan should run.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Case-insensitive substring match against `"scope > ... > test"`.
    pub filter: Option<String>,
    /// Ignore focus: run unfocused tests even when something is focused.
    pub include_ignored: bool,
}

/// Why a test step will not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// `xit`, or inside an `xdescribe`.
    Declared,
    /// Did not match the name filter.
    Filtered,
    /// Something else is focused.
    NotFocused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Run,
    Skip(SkipReason),
    Todo,
}

/// Entry or exit of a scope with runnable tests.
pub struct ScopeStep<'s> {
    pub scope: &'s Scope,
    /// Scope names from the root down to and including this scope.
    pub path: Vec<&'s str>,
}

impl ScopeStep<'_> {
    pub fn label(&self) -> String {
        if self.path.is_empty() {
            "<root>".to_string()
        } else {
            self.path.join(" > ")
        }
    }
}

/// One test together with everything needed to run it.
pub struct TestStep<'s> {
    pub test: &'s Test,
    /// Names of the enclosing scopes, outermost first.
    pub path: Vec<&'s str>,
    pub disposition: Disposition,
    chain: Vec<&'s Scope>,
}

impl<'s> TestStep<'s> {
    /// Scopes from the root to the test's owner.
    pub fn chain(&self) -> &[&'s Scope] {
        &self.chain
    }

    /// `before_each` hooks in run order: outermost scope first.
    pub fn before_each(&self) -> impl Iterator<Item = &'s BoxedCallback> + '_ {
        self.chain
            .iter()
            .copied()
            .flat_map(|scope| scope.hooks().get(HookKind::BeforeEach))
    }

    /// `after_each` hooks in run order: the owning scope first.
    pub fn after_each(&self) -> impl Iterator<Item = &'s BoxedCallback> + '_ {
        self.chain
            .iter()
            .rev()
            .copied()
            .flat_map(|scope| scope.hooks().get(HookKind::AfterEach))
    }

    pub fn full_name(&self) -> String {
        full_name(&self.path, self.test.name())
    }

    pub fn is_runnable(&self) -> bool {
        self.disposition == Disposition::Run
    }
}

pub enum Step<'s> {
    Enter(ScopeStep<'s>),
    Test(TestStep<'s>),
    Exit(ScopeStep<'s>),
}

/// The flattened, ordered work list for one run. It borrows the scope tree
/// and can be executed any number of times.
pub struct ExecutionPlan<'s> {
    steps: Vec<Step<'s>>,
    focus_mode: bool,
}

impl<'s> ExecutionPlan<'s> {
    /// Plan every test with the default selection.
    pub fn build(root: &'s Scope) -> Self {
        Self::build_with(root, &Selection::default())
    }

    pub fn build_with(root: &'s Scope, selection: &Selection) -> Self {
        let focus_mode = !selection.include_ignored && root.focus_count() > 0;
        let walker = Walker {
            filter: selection.filter.as_deref().map(str::to_lowercase),
            focus_mode,
        };
        let steps = walker.visit(root, &mut Vec::new(), &mut Vec::new(), false, false);
        let plan = ExecutionPlan { steps, focus_mode };

        tracing::debug!(
            steps = plan.steps.len(),
            tests = plan.tests().count(),
            runnable = plan.runnable_count(),
            focus_mode,
            "execution plan built"
        );
        plan
    }

    pub fn steps(&self) -> &[Step<'s>] {
        &self.steps
    }

    pub fn tests(&self) -> impl Iterator<Item = &TestStep<'s>> {
        self.steps.iter().filter_map(|step| match step {
            Step::Test(test) => Some(test),
            _ => None,
        })
    }

    pub fn runnable_count(&self) -> usize {
        self.tests().filter(|t| t.is_runnable()).count()
    }

    pub fn focus_mode(&self) -> bool {
        self.focus_mode
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

pub(crate) fn full_name(path: &[&str], name: &str) -> String {
    let mut parts = path.to_vec();
    parts.push(name);
    parts.join(" > ")
}

struct Walker {
    filter: Option<String>,
    focus_mode: bool,
}

impl Walker {
    fn visit<'s>(
        &self,
        scope: &'s Scope,
        chain: &mut Vec<&'s Scope>,
        path: &mut Vec<&'s str>,
        skipped: bool,
        focused: bool,
    ) -> Vec<Step<'s>> {
        let skipped = skipped || scope.mode() == Mode::Skipped;
        let focused = focused || scope.mode() == Mode::Focused;

        if let Some(name) = scope.name() {
            path.push(name);
        }
        chain.push(scope);

        let mut inner = Vec::new();
        for node in scope.nodes() {
            match node {
                Node::Scope(child) => {
                    inner.extend(self.visit(child, chain, path, skipped, focused));
                }
                Node::Test(test) => {
                    let disposition = self.dispose(test, path, skipped, focused);
                    inner.push(Step::Test(TestStep {
                        test,
                        path: path.clone(),
                        disposition,
                        chain: chain.clone(),
                    }));
                }
            }
        }

        chain.pop();
        let scope_path = path.clone();
        if scope.name().is_some() {
            path.pop();
        }

        let runnable = inner
            .iter()
            .any(|step| matches!(step, Step::Test(t) if t.is_runnable()));
        if !runnable {
            return inner;
        }

        let mut steps = Vec::with_capacity(inner.len() + 2);
        steps.push(Step::Enter(ScopeStep {
            scope,
            path: scope_path.clone(),
        }));
        steps.extend(inner);
        steps.push(Step::Exit(ScopeStep {
            scope,
            path: scope_path,
        }));
        steps
    }

    fn dispose(&self, test: &Test, path: &[&str], skipped: bool, focused: bool) -> Disposition {
        match test.mode() {
            Mode::Todo => return Disposition::Todo,
            Mode::Skipped => return Disposition::Skip(SkipReason::Declared),
            _ if skipped => return Disposition::Skip(SkipReason::Declared),
            _ => {}
        }

        if let Some(ref filter) = self.filter {
            if !full_name(path, test.name()).to_lowercase().contains(filter) {
                return Disposition::Skip(SkipReason::Filtered);
            }
        }

        if self.focus_mode && !focused && test.mode() != Mode::Focused {
            return Disposition::Skip(SkipReason::NotFocused);
        }

        Disposition::Run
    }
}
