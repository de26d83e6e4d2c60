//! Table-driven tests: one test per case inside a named scope.

use crate::fixtures::Fixtures;
use crate::registry::Context;
use std::rc::Rc;

/// Builder for table-driven (parameterized) tests, started with
/// [`Context::each`].
///
/// Each `.case()` becomes a separate test inside a scope named after the
/// table, so hooks declared around the table run for every case.
///
/// # Example
///
/// ```rust,no_run
/// # fn main() { rsjest::run(|ctx| {
/// ctx.each("arithmetic")
///     .case("addition", (2i32, 3i32, 5i32))
///     .case("large numbers", (100, 200, 300))
///     .run(|_, &(a, b, expected): &(i32, i32, i32)| {
///         assert_eq!(a + b, expected);
///     });
/// # }); }
/// ```
pub struct TableBuilder<'c, T> {
    ctx: &'c mut Context,
    name: String,
    cases: Vec<(String, T)>,
    auto_index: usize,
}

impl<'c, T: 'static> TableBuilder<'c, T> {
    pub(crate) fn new(ctx: &'c mut Context, name: String) -> Self {
        TableBuilder {
            ctx,
            name,
            cases: Vec::new(),
            auto_index: 0,
        }
    }

    /// Add a named case.
    pub fn case(mut self, label: &str, data: T) -> Self {
        self.cases.push((label.to_string(), data));
        self
    }

    /// Add an unnamed case (auto-named `case_1`, `case_2`, ...).
    pub fn case_unnamed(mut self, data: T) -> Self {
        self.auto_index += 1;
        let label = format!("case_{}", self.auto_index);
        self.cases.push((label, data));
        self
    }

    /// Declare the scope and one test per case. The test function receives
    /// the fixtures and a reference to that case's data.
    pub fn run(self, test_fn: impl Fn(&mut Fixtures, &T) + 'static) {
        let TableBuilder {
            ctx, name, cases, ..
        } = self;
        let test_fn = Rc::new(test_fn);

        ctx.describe(&name, move |ctx| {
            for (label, data) in cases {
                let test_fn = Rc::clone(&test_fn);
                ctx.it(&label, move |fx| test_fn(fx, &data));
            }
        });
    }
}
