use rsjest::{collect, Context, ExecutionPlan, Executor, Fixtures, Journal};
use std::collections::{HashMap, HashSet};
use std::panic::catch_unwind;
use std::thread;
use std::time::Duration;

fn sum(a: i32, b: i32) -> i32 {
    a + b
}

fn compile_android_code() -> Result<(), String> {
    Err("you are using the wrong JDK".to_string())
}

fn fetch_data(callback: impl FnOnce(&str) + Send + 'static) {
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(5));
        callback("peanut butter");
    });
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

fn main() {
    rsjest::run(|ctx| {
        // =================================================================
        // Common matchers
        // =================================================================
        ctx.describe("Common matchers", |ctx| {
            ctx.it("adds 1 + 2 to equal 3", |_| {
                assert_eq!(sum(1, 2), 3);
            });

            ctx.it("object assignment", |_| {
                let mut data = HashMap::from([("one", 1)]);
                data.insert("two", 2);
                assert_eq!(data, HashMap::from([("one", 1), ("two", 2)]));
            });

            ctx.it("adding positive numbers is not zero", |_| {
                for a in 1..10 {
                    for b in 1..10 {
                        assert_ne!(a + b, 0);
                    }
                }
            });
        });

        // =================================================================
        // Truthiness
        // =================================================================
        ctx.describe("Truthiness", |ctx| {
            ctx.it("none", |_| {
                let n: Option<i32> = None;
                assert!(n.is_none());
                assert!(!n.is_some());
            });

            ctx.it("zero", |_| {
                let z = Some(0);
                assert!(z.is_some());
                assert_eq!(z, Some(0));
            });
        });

        // =================================================================
        // Numbers
        // =================================================================
        ctx.describe("Numbers", |ctx| {
            ctx.it("two plus two", |_| {
                let value = 2 + 2;
                assert!(value > 3);
                assert!(f64::from(value) >= 3.5);
                assert!(value < 5);
                assert!(f64::from(value) <= 4.5);
                assert_eq!(value, 4);
            });

            ctx.it("adding floating point numbers", |_| {
                let value = 0.1 + 0.2;
                assert!((value - 0.3f64).abs() < 1e-9);
            });
        });

        // =================================================================
        // Strings and collections
        // =================================================================
        ctx.describe("Strings", |ctx| {
            ctx.it("there is no I in team", |_| {
                assert!(!"team".contains('I'));
            });

            ctx.it("but there is a \"stop\" in Christoph", |_| {
                assert!("Christoph".contains("stop"));
            });
        });

        ctx.describe("Arrays and iterables", |ctx| {
            ctx.before_all(|fx| {
                fx.insert(vec!["diapers", "kleenex", "trash bags", "paper towels", "milk"]);
            });

            ctx.it("the shopping list has milk on it", |fx| {
                let list = fx.require::<Vec<&str>>();
                assert!(list.contains(&"milk"));
                assert!(list.iter().copied().collect::<HashSet<_>>().contains("milk"));
            });
        });

        // =================================================================
        // Exceptions
        // =================================================================
        ctx.describe("Exceptions", |ctx| {
            ctx.it("compiling android goes as expected", |_| {
                let err = compile_android_code().unwrap_err();
                assert_eq!(err, "you are using the wrong JDK");
                assert!(err.contains("JDK"));

                let panicked = catch_unwind(|| {
                    compile_android_code().expect("compile");
                });
                assert!(panicked.is_err());
            });
        });

        // =================================================================
        // Asynchronous code: done signal
        // =================================================================
        ctx.describe("Asynchronous code", |ctx| {
            ctx.it_with_done("the data is peanut butter", |_, done| {
                fetch_data(move |data| {
                    if data == "peanut butter" {
                        done.complete();
                    } else {
                        done.fail(format!("expected peanut butter, got {data}"));
                    }
                });
            })
            .timeout(2000);
        });

        // =================================================================
        // Setup and teardown: scoped fixtures
        // =================================================================
        ctx.describe("City database", |ctx| {
            struct Cities(Vec<&'static str>);
            struct Foods(Vec<(&'static str, &'static str)>);

            ctx.before_each(|fx: &mut Fixtures| {
                fx.insert(Cities(vec!["Vienna", "San Juan"]));
            });

            ctx.it("city database has Vienna", |fx| {
                assert!(fx.require::<Cities>().0.contains(&"Vienna"));
            });

            ctx.it("city database has San Juan", |fx| {
                assert!(fx.require::<Cities>().0.contains(&"San Juan"));
            });

            ctx.describe("matching cities to foods", |ctx| {
                ctx.before_each(|fx| {
                    fx.insert(Foods(vec![
                        ("Vienna", "Wiener Schnitzel"),
                        ("San Juan", "Mofongo"),
                    ]));
                });

                ctx.it("Vienna <3 sausage", |fx| {
                    assert!(fx
                        .require::<Foods>()
                        .0
                        .contains(&("Vienna", "Wiener Schnitzel")));
                });

                ctx.it("San Juan <3 plantains", |fx| {
                    assert!(fx.require::<Foods>().0.contains(&("San Juan", "Mofongo")));
                    assert!(fx.contains::<Cities>());
                });
            });
        });

        // =================================================================
        // Order of execution of hooks
        //
        // Each scenario is collected and run as its own suite, so the
        // recorded order does not depend on which outer tests are selected.
        // =================================================================
        ctx.describe("Order of execution", |ctx| {
            ctx.it("nests before hooks outside-in and after hooks inside-out", |_| {
                let journal = Journal::new();
                let root = collect(|ctx| {
                    log_hooks(ctx, &journal, "1");
                    let j = journal.clone();
                    ctx.it("1", move |_| j.record("1 - test"));

                    ctx.describe("Scoped / Nested block", |ctx| {
                        log_hooks(ctx, &journal, "2");
                        let j = journal.clone();
                        ctx.it("2", move |_| j.record("2 - test"));
                    });
                })
                .unwrap();

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
            });

            ctx.it("runs describe bodies before any test body", |_| {
                let order = Journal::new();
                let root = collect(|ctx| {
                    ctx.describe("outer", |ctx| {
                        order.record("describe outer-a");

                        ctx.describe("describe inner 1", |ctx| {
                            order.record("describe inner 1");
                            let j = order.clone();
                            ctx.it("test 1", move |_| j.record("test for describe inner 1"));
                        });

                        order.record("describe outer-b");

                        let j = order.clone();
                        ctx.it("test 1", move |_| j.record("test for describe outer"));

                        ctx.describe("describe inner 2", |ctx| {
                            order.record("describe inner 2");
                            let j = order.clone();
                            ctx.it("test for describe inner 2", move |_| {
                                j.record("test for describe inner 2")
                            });
                        });

                        order.record("describe outer-c");
                    });
                })
                .unwrap();

                Executor::new().run(&ExecutionPlan::build(&root));

                assert_eq!(
                    order.lines(),
                    vec![
                        "describe outer-a",
                        "describe inner 1",
                        "describe outer-b",
                        "describe inner 2",
                        "describe outer-c",
                        "test for describe inner 1",
                        "test for describe outer",
                        "test for describe inner 2",
                    ]
                );
            });
        });

        // =================================================================
        // Table-driven, skipped and todo tests
        // =================================================================
        ctx.each("sum")
            .case("1 + 2", (1, 2, 3))
            .case("2 + 2", (2, 2, 4))
            .case("negative", (-1, 1, 0))
            .run(|_, &(a, b, expected): &(i32, i32, i32)| {
                assert_eq!(sum(a, b), expected);
            });

        ctx.xit("this test will not run", |_| {
            panic!("skipped tests never run");
        });

        ctx.todo("covers the remaining matchers");
    });
}
