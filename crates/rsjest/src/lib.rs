//! # rsjest — a Jest-style test-runner core for Rust
//!
//! Declare nested scopes, tests and lifecycle hooks with `describe`, `it`,
//! `before_all`, `after_all`, `before_each` and `after_each`. A run has three
//! strictly separate phases:
//!
//! 1. **Collection**: [`collect`] runs every describe body immediately, in
//!    source order, and builds a [`Scope`] tree.
//! 2. **Scheduling**: [`ExecutionPlan::build`] flattens the tree into an
//!    ordered list of scope entries, tests and scope exits.
//! 3. **Execution**: [`Executor::run`] walks the plan serially and returns a
//!    result for every declared test.
//!
//! ## Quick example
//!
//! ```rust,no_run
//! fn main() {
//!     rsjest::run(|ctx| {
//!         ctx.before_all(|_| println!("1 - beforeAll"));
//!         ctx.before_each(|_| println!("1 - beforeEach"));
//!         ctx.it("adds 1 + 2 to equal 3", |_| {
//!             assert_eq!(1 + 2, 3);
//!         });
//!
//!         ctx.describe("Scoped / Nested block", |ctx| {
//!             ctx.before_each(|_| println!("2 - beforeEach"));
//!             ctx.it("runs both before_each hooks first", |_| {});
//!         });
//!     });
//! }
//! ```
//!
//! ## Hook order
//!
//! ```text
//! before_all (once per scope) -> before_each (outer to inner) -> body
//!     -> after_each (inner to outer) -> after_all (once per scope)
//! ```
//!
//! ## Features
//!
//! - `googletest`: re-exports `googletest` matchers via `rsjest::matchers`

mod callback;
mod error;
pub mod executor;
mod fixtures;
mod journal;
pub mod plan;
mod registry;
pub mod runner;
pub mod table;

pub use callback::{with_done, Callback, Done, Suspension, WithDone};
pub use error::{CollectionError, Failure, InvokeError, ScopeFailure};
pub use executor::{Executor, Reporter, RunReport, Status, TestResult};
pub use fixtures::Fixtures;
pub use journal::Journal;
pub use plan::{ExecutionPlan, Selection};
pub use registry::{collect, Context, HookKind, Hooks, Mode, Node, Scope, Test, TestBuilder};

/// Re-export of the [`googletest`] crate. Available with the `googletest` feature.
#[cfg(feature = "googletest")]
pub use googletest;

/// Composable matchers re-exported from [`googletest::prelude`].
#[cfg(feature = "googletest")]
pub mod matchers {
    pub use googletest::prelude::*;
}

/// Collect and run a test suite, printing a result tree to stdout.
///
/// This is the main entry point. Call it from `fn main()` in a test target
/// with `harness = false`. Exits the process with status 1 when collection
/// fails or any test fails.
///
/// # Example
///
/// ```rust,no_run
/// fn main() {
///     rsjest::run(|ctx| {
///         ctx.describe("Calculator", |ctx| {
///             ctx.it("adds", |_| assert_eq!(2 + 3, 5));
///         });
///     });
/// }
/// ```
pub fn run(body: impl FnOnce(&mut Context)) {
    runner::init_logging();

    // Phase 1: build the tree
    let root = match collect(body) {
        Ok(root) => root,
        Err(error) => {
            eprintln!("rsjest: {error}");
            std::process::exit(1);
        }
    };

    // Phases 2 and 3: plan and execute
    let config = runner::RunConfig::from_args();
    let suite = runner::Suite::new("", "", root);
    match runner::run_suites(&[suite], &config) {
        Ok(report) if report.is_success() => {}
        Ok(_) => std::process::exit(1),
        Err(error) => {
            eprintln!("rsjest: {error}");
            std::process::exit(1);
        }
    }
}
