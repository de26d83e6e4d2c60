//! Collection phase: the scope tree, [`Context`], [`TestBuilder`] and
//! [`collect()`].

use crate::callback::{panic_message, Callback, Done, Plain};
use crate::error::CollectionError;
use crate::fixtures::Fixtures;
use std::cell::RefCell;
use std::fmt;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Duration;

// ============================================================================
// Tree types
// ============================================================================

/// Lifecycle point a hook is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    BeforeAll,
    AfterAll,
    BeforeEach,
    AfterEach,
}

impl HookKind {
    pub const ALL: [HookKind; 4] = [
        HookKind::BeforeAll,
        HookKind::AfterAll,
        HookKind::BeforeEach,
        HookKind::AfterEach,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HookKind::BeforeAll => "before_all",
            HookKind::AfterAll => "after_all",
            HookKind::BeforeEach => "before_each",
            HookKind::AfterEach => "after_each",
        }
    }

    fn index(self) -> usize {
        match self {
            HookKind::BeforeAll => 0,
            HookKind::AfterAll => 1,
            HookKind::BeforeEach => 2,
            HookKind::AfterEach => 3,
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a scope or test was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    /// `fit` / `fdescribe`
    Focused,
    /// `xit` / `xdescribe`
    Skipped,
    /// `todo`: a test with no body yet.
    Todo,
}

pub type BoxedCallback = Box<dyn Callback>;

/// The four hook lists of a scope, each in declaration order.
#[derive(Default)]
pub struct Hooks {
    lists: [Vec<BoxedCallback>; 4],
}

impl Hooks {
    pub fn get(&self, kind: HookKind) -> &[BoxedCallback] {
        &self.lists[kind.index()]
    }

    pub fn len(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(Vec::is_empty)
    }

    fn push(&mut self, kind: HookKind, hook: BoxedCallback) {
        self.lists[kind.index()].push(hook);
    }
}

/// A single declared test.
pub struct Test {
    name: String,
    mode: Mode,
    body: Option<BoxedCallback>,
    timeout: Option<Duration>,
}

impl Test {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// `None` for `todo` tests.
    pub fn body(&self) -> Option<&dyn Callback> {
        self.body.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// A child of a scope. Scopes and tests share one list so declaration order
/// survives across both.
pub enum Node {
    Scope(Scope),
    Test(Test),
}

/// A `describe` block, or the implicit root of a file.
pub struct Scope {
    name: Option<String>,
    mode: Mode,
    hooks: Hooks,
    nodes: Vec<Node>,
}

impl Scope {
    fn new(name: Option<String>, mode: Mode) -> Self {
        Scope {
            name,
            mode,
            hooks: Hooks::default(),
            nodes: Vec::new(),
        }
    }

    /// `None` for the root scope.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn is_root(&self) -> bool {
        self.name.is_none()
    }

    /// Number of tests declared here and in every nested scope.
    pub fn test_count(&self) -> usize {
        self.nodes
            .iter()
            .map(|node| match node {
                Node::Test(_) => 1,
                Node::Scope(scope) => scope.test_count(),
            })
            .sum()
    }

    /// Number of `fit` tests and `fdescribe` scopes in this subtree.
    pub fn focus_count(&self) -> usize {
        self.nodes
            .iter()
            .map(|node| match node {
                Node::Test(test) => usize::from(test.mode == Mode::Focused),
                Node::Scope(scope) => {
                    usize::from(scope.mode == Mode::Focused) + scope.focus_count()
                }
            })
            .sum()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("hooks", &self.hooks.len())
            .field("tests", &self.test_count())
            .finish()
    }
}

// ============================================================================
// Context: the user-facing handle
// ============================================================================

/// Carries a collection abort out through enclosing describe bodies.
struct CollectionAbort(CollectionError);

/// Handle for declaring scopes, tests and hooks into the current scope.
///
/// Each `describe` body receives its own `Context`; nothing is tracked in
/// global state, so collection can be nested and run in isolation.
///
/// # Example
/// ```rust
/// let root = rsjest::collect(|ctx| {
///     ctx.describe("Calculator", |ctx| {
///         ctx.it("adds", |_| assert_eq!(2 + 3, 5));
///     });
/// })
/// .unwrap();
/// assert_eq!(root.test_count(), 1);
/// ```
pub struct Context {
    scope: Scope,
    path: Vec<String>,
    /// First collection error of this `collect()` pass, shared by every
    /// nested context. Kept even if user code catches the unwind.
    aborted: Rc<RefCell<Option<CollectionError>>>,
}

impl Context {
    fn root() -> Self {
        Context {
            scope: Scope::new(None, Mode::Normal),
            path: Vec::new(),
            aborted: Rc::default(),
        }
    }

    /// Names of the enclosing scopes, outermost first.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    // ---- Describe / Context --------------------------------------------------

    /// Declare a nested scope. `body` runs immediately.
    pub fn describe(&mut self, name: &str, body: impl FnOnce(&mut Context)) {
        self.describe_impl(name, Mode::Normal, body);
    }

    /// Focused scope: when anything is focused, only focused tests run.
    pub fn fdescribe(&mut self, name: &str, body: impl FnOnce(&mut Context)) {
        self.describe_impl(name, Mode::Focused, body);
    }

    /// Skipped scope: its tests are reported but never run.
    pub fn xdescribe(&mut self, name: &str, body: impl FnOnce(&mut Context)) {
        self.describe_impl(name, Mode::Skipped, body);
    }

    pub fn context(&mut self, name: &str, body: impl FnOnce(&mut Context)) {
        self.describe(name, body);
    }

    fn describe_impl(&mut self, name: &str, mode: Mode, body: impl FnOnce(&mut Context)) {
        let mut path = self.path.clone();
        path.push(name.to_string());
        let mut child = Context {
            scope: Scope::new(Some(name.to_string()), mode),
            path,
            aborted: Rc::clone(&self.aborted),
        };

        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| body(&mut child))) {
            if payload.is::<CollectionAbort>() {
                resume_unwind(payload);
            }
            let error = CollectionError::ScopeBody {
                scope: child.path.join(" > "),
                message: panic_message(&*payload),
            };
            self.aborted.borrow_mut().get_or_insert_with(|| error.clone());
            resume_unwind(Box::new(CollectionAbort(error)));
        }

        self.scope.nodes.push(Node::Scope(child.scope));
    }

    // ---- It / Test -----------------------------------------------------------

    /// Declare a test. Returns a [`TestBuilder`] for optional settings.
    ///
    /// ```rust,no_run
    /// # fn main() { rsjest::run(|ctx| {
    /// ctx.it("works", |_| assert!(true));
    ///
    /// ctx.it("slow test", |_| { /* ... */ }).timeout(5000);
    /// # }); }
    /// ```
    pub fn it(&mut self, name: &str, body: impl Fn(&mut Fixtures) + 'static) -> TestBuilder<'_> {
        self.test_impl(name, Mode::Normal, Box::new(Plain(body)))
    }

    pub fn test(&mut self, name: &str, body: impl Fn(&mut Fixtures) + 'static) -> TestBuilder<'_> {
        self.it(name, body)
    }

    /// Focused test (`test.only`).
    pub fn fit(&mut self, name: &str, body: impl Fn(&mut Fixtures) + 'static) -> TestBuilder<'_> {
        self.test_impl(name, Mode::Focused, Box::new(Plain(body)))
    }

    /// Skipped test (`test.skip`).
    pub fn xit(&mut self, name: &str, body: impl Fn(&mut Fixtures) + 'static) -> TestBuilder<'_> {
        self.test_impl(name, Mode::Skipped, Box::new(Plain(body)))
    }

    /// A test that finishes when its [`Done`] handle is completed.
    ///
    /// ```rust,no_run
    /// # fn main() { rsjest::run(|ctx| {
    /// ctx.it_with_done("the data is peanut butter", |_, done| {
    ///     std::thread::spawn(move || {
    ///         let data = "peanut butter";
    ///         if data == "peanut butter" {
    ///             done.complete();
    ///         } else {
    ///             done.fail(format!("got {data}"));
    ///         }
    ///     });
    /// })
    /// .timeout(1000);
    /// # }); }
    /// ```
    pub fn it_with_done(
        &mut self,
        name: &str,
        body: impl Fn(&mut Fixtures, Done) + 'static,
    ) -> TestBuilder<'_> {
        self.test_impl(name, Mode::Normal, Box::new(crate::callback::with_done(body)))
    }

    /// Declare a test with any [`Callback`] as its body.
    pub fn it_callback(&mut self, name: &str, body: impl Callback + 'static) -> TestBuilder<'_> {
        self.test_impl(name, Mode::Normal, Box::new(body))
    }

    /// A placeholder test with no body (`test.todo`).
    pub fn todo(&mut self, name: &str) {
        self.scope.nodes.push(Node::Test(Test {
            name: name.to_string(),
            mode: Mode::Todo,
            body: None,
            timeout: None,
        }));
    }

    fn test_impl(&mut self, name: &str, mode: Mode, body: BoxedCallback) -> TestBuilder<'_> {
        TestBuilder {
            nodes: &mut self.scope.nodes,
            name: name.to_string(),
            mode,
            body: Some(body),
            timeout: None,
        }
    }

    // ---- Hooks ---------------------------------------------------------------

    pub fn before_all(&mut self, hook: impl Fn(&mut Fixtures) + 'static) {
        self.hook(HookKind::BeforeAll, Plain(hook));
    }

    pub fn after_all(&mut self, hook: impl Fn(&mut Fixtures) + 'static) {
        self.hook(HookKind::AfterAll, Plain(hook));
    }

    pub fn before_each(&mut self, hook: impl Fn(&mut Fixtures) + 'static) {
        self.hook(HookKind::BeforeEach, Plain(hook));
    }

    pub fn after_each(&mut self, hook: impl Fn(&mut Fixtures) + 'static) {
        self.hook(HookKind::AfterEach, Plain(hook));
    }

    /// Register any [`Callback`], e.g. one built with [`with_done`](crate::with_done).
    pub fn hook(&mut self, kind: HookKind, hook: impl Callback + 'static) {
        self.scope.hooks.push(kind, Box::new(hook));
    }

    // ---- Table-driven --------------------------------------------------------

    /// Start a table-driven group (`describe.each`).
    ///
    /// ```rust,no_run
    /// # fn main() { rsjest::run(|ctx| {
    /// ctx.each("sum")
    ///     .case("1 + 2", (1, 2, 3))
    ///     .case("2 + 2", (2, 2, 4))
    ///     .run(|_, &(a, b, expected): &(i32, i32, i32)| {
    ///         assert_eq!(a + b, expected);
    ///     });
    /// # }); }
    /// ```
    pub fn each<T: 'static>(&mut self, name: &str) -> crate::table::TableBuilder<'_, T> {
        crate::table::TableBuilder::new(self, name.to_string())
    }
}

// ============================================================================
// TestBuilder: registers the test on Drop
// ============================================================================

/// Builder returned by [`Context::it`] and friends. The test is added to its
/// scope when the builder is dropped, so a bare `ctx.it(..);` registers
/// immediately at the semicolon.
pub struct TestBuilder<'a> {
    nodes: &'a mut Vec<Node>,
    name: String,
    mode: Mode,
    body: Option<BoxedCallback>,
    timeout: Option<Duration>,
}

impl TestBuilder<'_> {
    /// Fail the test (as errored) if it runs longer than `ms` milliseconds.
    pub fn timeout(mut self, ms: u64) -> Self {
        self.timeout = Some(Duration::from_millis(ms));
        self
    }
}

impl Drop for TestBuilder<'_> {
    fn drop(&mut self) {
        let test = Test {
            name: std::mem::take(&mut self.name),
            mode: self.mode,
            body: self.body.take(),
            timeout: self.timeout,
        };
        self.nodes.push(Node::Test(test));
    }
}

// ============================================================================
// collect(): the collection pass
// ============================================================================

/// Run the collection pass and return the finished root scope.
///
/// `body` and every nested describe body run right away, in source order.
/// A panic in any of them aborts collection.
pub fn collect(body: impl FnOnce(&mut Context)) -> Result<Scope, CollectionError> {
    let mut root = Context::root();

    let outcome = catch_unwind(AssertUnwindSafe(|| body(&mut root)));
    // The first abort wins, even when a describe body caught the unwind.
    let first = root.aborted.borrow_mut().take();

    let error = match (outcome, first) {
        (Ok(()), None) => {
            tracing::debug!(
                tests = root.scope.test_count(),
                focused = root.scope.focus_count(),
                "collection finished"
            );
            return Ok(root.scope);
        }
        (_, Some(error)) => error,
        (Err(payload), None) => match payload.downcast::<CollectionAbort>() {
            Ok(abort) => abort.0,
            Err(payload) => CollectionError::ScopeBody {
                scope: "<root>".to_string(),
                message: panic_message(&*payload),
            },
        },
    };

    tracing::error!(%error, "collection aborted");
    Err(error)
}
