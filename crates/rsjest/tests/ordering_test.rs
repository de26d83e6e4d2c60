use rsjest::{collect, Context, ExecutionPlan, Executor, Fixtures, Journal, Scope, Status};
use std::cell::Cell;
use std::rc::Rc;

fn collect_ok(body: impl FnOnce(&mut Context)) -> Scope {
    collect(body).expect("collection should succeed")
}

/// Registers all four hooks on the current scope, each logging `"{tag} - {hook}"`.
fn log_hooks(ctx: &mut Context, journal: &Journal, tag: &str) {
    let hook = |name: &str| {
        let j = journal.clone();
        let line = format!("{tag} - {name}");
        move |_: &mut Fixtures| j.record(line.as_str())
    };
    ctx.before_all(hook("beforeAll"));
    ctx.after_all(hook("afterAll"));
    ctx.before_each(hook("beforeEach"));
    ctx.after_each(hook("afterEach"));
}

#[test]
fn nested_hooks_run_in_documented_order() {
    let journal = Journal::new();
    let root = collect_ok(|ctx| {
        log_hooks(ctx, &journal, "1");
        let j = journal.clone();
        ctx.it("", move |_| j.record("1 - test"));

        ctx.describe("Scoped / Nested block", |ctx| {
            log_hooks(ctx, &journal, "2");
            let j = journal.clone();
            ctx.it("", move |_| j.record("2 - test"));
        });
    });

    let report = Executor::new().run(&ExecutionPlan::build(&root));

    assert!(report.is_success());
    assert_eq!(
        journal.lines(),
        vec![
            "1 - beforeAll",
            "1 - beforeEach",
            "1 - test",
            "1 - afterEach",
            "2 - beforeAll",
            "1 - beforeEach",
            "2 - beforeEach",
            "2 - test",
            "2 - afterEach",
            "1 - afterEach",
            "2 - afterAll",
            "1 - afterAll",
        ]
    );
}

#[test]
fn describe_bodies_complete_before_any_test_runs() {
    let journal = Journal::new();
    let root = collect_ok(|ctx| {
        ctx.describe("outer", |ctx| {
            journal.record("outer-a");
            ctx.describe("inner 1", |ctx| {
                journal.record("inner-1");
                let j = journal.clone();
                ctx.it("test", move |_| j.record("inner-1's test"));
            });
            journal.record("outer-b");
            let j = journal.clone();
            ctx.it("test", move |_| j.record("outer's test"));
            ctx.describe("inner 2", |ctx| {
                journal.record("inner-2");
                let j = journal.clone();
                ctx.it("test", move |_| j.record("inner-2's test"));
            });
            journal.record("outer-c");
        });
    });

    assert_eq!(
        journal.lines(),
        vec!["outer-a", "inner-1", "outer-b", "inner-2", "outer-c"]
    );

    Executor::new().run(&ExecutionPlan::build(&root));

    assert_eq!(
        journal.lines()[5..],
        ["inner-1's test", "outer's test", "inner-2's test"]
    );
}

#[test]
fn before_all_and_after_all_run_once_per_scope() {
    let before = Rc::new(Cell::new(0));
    let after = Rc::new(Cell::new(0));
    let empty_before = Rc::new(Cell::new(0));

    let root = collect_ok(|ctx| {
        ctx.describe("many tests", |ctx| {
            let b = Rc::clone(&before);
            ctx.before_all(move |_| b.set(b.get() + 1));
            let a = Rc::clone(&after);
            ctx.after_all(move |_| a.set(a.get() + 1));
            for i in 0..5 {
                ctx.it(&format!("test {i}"), |_| {});
            }
            ctx.describe("nested", |ctx| {
                ctx.it("deep", |_| {});
            });
        });

        ctx.describe("no tests", |ctx| {
            let e = Rc::clone(&empty_before);
            ctx.before_all(move |_| e.set(e.get() + 1));
            let e = Rc::clone(&empty_before);
            ctx.after_all(move |_| e.set(e.get() + 1));
            ctx.describe("still no tests", |_| {});
        });
    });

    let report = Executor::new().run(&ExecutionPlan::build(&root));

    assert_eq!(report.passed(), 6);
    assert_eq!(before.get(), 1);
    assert_eq!(after.get(), 1);
    assert_eq!(empty_before.get(), 0);
}

#[test]
fn running_a_plan_twice_is_identical() {
    let journal = Journal::new();
    let root = collect_ok(|ctx| {
        log_hooks(ctx, &journal, "root");
        ctx.describe("S", |ctx| {
            log_hooks(ctx, &journal, "S");
            let j = journal.clone();
            ctx.it("passes", move |_| j.record("pass"));
            ctx.it("fails", |_| panic!("always"));
        });
        ctx.xit("skipped", |_| {});
    });

    let plan = ExecutionPlan::build(&root);
    let executor = Executor::new();

    let first = executor.run(&plan);
    let first_log = journal.take();
    let second = executor.run(&plan);
    let second_log = journal.take();

    assert_eq!(first_log, second_log);
    assert_eq!(first.statuses(), second.statuses());
    assert_eq!(
        first.statuses(),
        vec![
            ("S > passes".to_string(), Status::Passed),
            ("S > fails".to_string(), Status::Failed),
            ("skipped".to_string(), Status::Skipped),
        ]
    );
}

#[test]
fn failing_before_all_errors_its_scope_but_not_siblings() {
    let journal = Journal::new();
    let root = collect_ok(|ctx| {
        let j = journal.clone();
        ctx.after_each(move |_| j.record("root afterEach"));

        ctx.describe("S", |ctx| {
            ctx.before_all(|_| panic!("cannot initialise"));
            let j = journal.clone();
            ctx.after_all(move |_| j.record("S afterAll"));
            ctx.it("one", |_| {});
            ctx.it("two", |_| {});
        });

        ctx.describe("sibling", |ctx| {
            let j = journal.clone();
            ctx.it("three", move |_| j.record("sibling test"));
        });
    });

    let report = Executor::new().run(&ExecutionPlan::build(&root));

    assert_eq!(
        report.statuses(),
        vec![
            ("S > one".to_string(), Status::Errored),
            ("S > two".to_string(), Status::Errored),
            ("sibling > three".to_string(), Status::Passed),
        ]
    );
    assert_eq!(
        journal.lines(),
        vec!["S afterAll", "sibling test", "root afterEach"]
    );
    assert!(report.results[0]
        .failure
        .as_ref()
        .is_some_and(|f| f.to_string().contains("cannot initialise")));
}

#[test]
fn every_declared_test_gets_a_result() {
    let root = collect_ok(|ctx| {
        ctx.before_each(|_| {});
        ctx.it("passes", |_| {});
        ctx.it("fails", |_| assert_eq!(1, 2));
        ctx.describe("skipped", |ctx| {
            ctx.xit("not run", |_| {});
        });
        ctx.xdescribe("whole group", |ctx| {
            ctx.it("a", |_| {});
            ctx.it("b", |_| {});
        });
        ctx.todo("later");
    });

    let report = Executor::new().run(&ExecutionPlan::build(&root));

    assert_eq!(report.results.len(), root.test_count());
    assert_eq!(report.passed(), 1);
    assert_eq!(report.count(Status::Failed), 1);
    assert_eq!(report.count(Status::Skipped), 3);
    assert_eq!(report.count(Status::Todo), 1);
}
