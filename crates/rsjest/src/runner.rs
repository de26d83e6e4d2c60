//! Terminal runner with colored, indented tree output.
//!
//! Used with `harness = false` test targets:
//!
//! ```text
//! Calculator
//!   ✓ adds two numbers
//!   when negative
//!     ✓ handles negatives
//!     ✗ fails on overflow
//! ```

use crate::error::{CollectionError, ScopeFailure};
use crate::executor::{Executor, Reporter, RunReport, Status, TestResult};
use crate::plan::{Disposition, ExecutionPlan, Selection, SkipReason};
use crate::registry::{collect, Context, Scope};
use std::fmt::Display;
use std::io::{self, Write};
use std::time::Duration;

// ============================================================================
// ANSI color helpers
// ============================================================================

fn use_color() -> bool {
    // Respect NO_COLOR env var (https://no-color.org/)
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    io::IsTerminal::is_terminal(&io::stdout())
}

#[derive(Debug, Clone, Copy)]
struct Palette {
    enabled: bool,
}

impl Palette {
    fn paint(self, code: &str, s: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{s}\x1b[0m")
        } else {
            s.to_string()
        }
    }

    fn green(self, s: &str) -> String {
        self.paint("32", s)
    }

    fn red(self, s: &str) -> String {
        self.paint("31", s)
    }

    fn yellow(self, s: &str) -> String {
        self.paint("33", s)
    }

    fn bold(self, s: &str) -> String {
        self.paint("1", s)
    }

    fn dim(self, s: &str) -> String {
        self.paint("2", s)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration parsed from command-line args and the environment.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Filter string: only run tests whose full path contains this.
    pub filter: Option<String>,
    /// Only list tests, don't run them.
    pub list: bool,
    /// Run unfocused tests even when something is focused.
    pub include_ignored: bool,
    /// `RSJEST_FAIL_ON_FOCUS`: treat focused tests as a collection error.
    pub fail_on_focus: bool,
    /// `RSJEST_TIMEOUT_MS`: timeout for hooks and tests without their own.
    pub default_timeout: Option<Duration>,
}

impl RunConfig {
    /// Parse from the process args (compatible with `cargo test -- <args>`).
    pub fn from_args() -> Self {
        RunConfig::parse(std::env::args().skip(1), |key| std::env::var(key).ok())
    }

    /// Parse `args` (without the binary name), reading settings from `env`.
    pub fn parse(
        args: impl IntoIterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut config = RunConfig::default();

        for arg in args {
            match arg.as_str() {
                "--list" => config.list = true,
                "--include-ignored" | "--ignored" => config.include_ignored = true,
                arg if !arg.starts_with('-') => config.filter = Some(arg.to_string()),
                _ => {} // ignore unknown flags
            }
        }

        if let Some(val) = env("RSJEST_FAIL_ON_FOCUS") {
            config.fail_on_focus = val == "1" || val.eq_ignore_ascii_case("true");
        }

        if let Some(val) = env("RSJEST_TIMEOUT_MS") {
            match val.trim().parse::<u64>() {
                Ok(ms) => config.default_timeout = Some(Duration::from_millis(ms)),
                Err(error) => {
                    tracing::warn!(value = %val, %error, "ignoring invalid RSJEST_TIMEOUT_MS")
                }
            }
        }

        config
    }

    pub fn selection(&self) -> Selection {
        Selection {
            filter: self.filter.clone(),
            include_ignored: self.include_ignored,
        }
    }

    pub fn executor(&self) -> Executor {
        Executor::new().with_default_timeout(self.default_timeout)
    }
}

/// Install the `tracing` subscriber used for diagnostics. `RUST_LOG`
/// overrides the default `warn` level. Safe to call more than once.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .try_init();
}

// ============================================================================
// Suites
// ============================================================================

/// A named, collected scope tree with its source location, for multi-suite
/// runs.
pub struct Suite {
    pub name: String,
    pub file: String,
    pub root: Scope,
}

impl Suite {
    pub fn new(name: impl Into<String>, file: impl Into<String>, root: Scope) -> Self {
        Suite {
            name: name.into(),
            file: file.into(),
            root,
        }
    }

    /// Run the collection pass and wrap the result.
    pub fn collect(
        name: impl Into<String>,
        file: impl Into<String>,
        body: impl FnOnce(&mut Context),
    ) -> Result<Self, CollectionError> {
        Ok(Suite::new(name, file, collect(body)?))
    }

    fn header(&self) -> String {
        match (self.name.as_str(), self.file.as_str()) {
            ("", "") => String::new(),
            (name, "") => name.to_string(),
            ("", file) => file.to_string(),
            (name, file) => format!("{name} ({file})"),
        }
    }
}

// ============================================================================
// Tree reporter
// ============================================================================

/// Prints scope headers and one line per test as results arrive.
pub struct TreeReporter<W: Write> {
    out: W,
    palette: Palette,
    /// Scope path of the last printed test, to print only new headers.
    printed: Vec<String>,
}

impl TreeReporter<io::Stdout> {
    pub fn stdout() -> Self {
        TreeReporter::new(io::stdout(), use_color())
    }
}

impl<W: Write> TreeReporter<W> {
    pub fn new(out: W, color: bool) -> Self {
        TreeReporter {
            out,
            palette: Palette { enabled: color },
            printed: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: impl Display) {
        let _ = writeln!(self.out, "{text}");
    }

    fn suite_header(&mut self, header: &str) {
        self.printed.clear();
        if !header.is_empty() {
            let header = self.palette.dim(&format!("--- {header} ---"));
            self.line(header);
            self.line("");
        }
    }

    fn headers_for(&mut self, path: &[String]) {
        let common = self
            .printed
            .iter()
            .zip(path)
            .take_while(|(a, b)| a == b)
            .count();
        for (depth, name) in path.iter().enumerate().skip(common) {
            let header = format!("{}{}", "  ".repeat(depth), self.palette.bold(name));
            self.line(header);
        }
        self.printed = path.to_vec();
    }

    /// Print the PASS/FAIL block for a finished run.
    pub fn summary(&mut self, report: &RunReport) {
        let p = self.palette;
        let elapsed_str = format!("{:.3}s", report.duration.as_secs_f64());

        let parts: Vec<String> = [
            (report.passed() > 0).then(|| p.green(&format!("{} passed", report.passed()))),
            (report.count(Status::Failed) > 0)
                .then(|| p.red(&format!("{} failed", report.count(Status::Failed)))),
            (report.count(Status::Errored) > 0)
                .then(|| p.red(&format!("{} errored", report.count(Status::Errored)))),
            (report.count(Status::Skipped) > 0)
                .then(|| p.dim(&format!("{} skipped", report.count(Status::Skipped)))),
            (report.count(Status::Todo) > 0)
                .then(|| p.yellow(&format!("{} todo", report.count(Status::Todo)))),
        ]
        .into_iter()
        .flatten()
        .collect();

        let summary = format!("{} ({})", parts.join(", "), p.dim(&elapsed_str));

        self.line("");
        if report.is_success() {
            self.line(p.green("PASS"));
            self.line(summary);
            return;
        }

        self.line(p.red("FAIL"));
        self.line(summary);
        self.line("");
        self.line("Failures:");
        let failures: Vec<String> = report
            .results
            .iter()
            .filter(|r| r.is_failure())
            .map(|r| match r.failure {
                Some(ref failure) => format!("{}: {failure}", r.full_name()),
                None => r.full_name(),
            })
            .chain(report.scope_failures.iter().map(ToString::to_string))
            .collect();
        for (i, failure) in failures.iter().enumerate() {
            self.line(format!("  {}. {}", i + 1, failure));
        }
        self.line("");
    }
}

impl<W: Write> Reporter for TreeReporter<W> {
    fn test_finished(&mut self, result: &TestResult) {
        if result.skip_reason.is_some_and(|reason| reason != SkipReason::Declared) {
            return;
        }

        self.headers_for(&result.path);
        let p = self.palette;
        let indent = "  ".repeat(result.path.len());
        let ms = result.duration.as_millis();
        let time_str = if ms > 100 {
            format!(" {}", p.dim(&format!("({ms}ms)")))
        } else {
            String::new()
        };

        match result.status {
            Status::Passed => self.line(format!("{indent}{} {}{}", p.green("✓"), result.name, time_str)),
            Status::Failed | Status::Errored => {
                self.line(format!("{indent}{} {}{}", p.red("✗"), p.red(&result.name), time_str));
                if let Some(ref failure) = result.failure {
                    let label = if result.status == Status::Errored { "Error" } else { "Failure" };
                    self.line(format!("{indent}  {}", p.red(&format!("{label}: {failure}"))));
                }
            }
            Status::Skipped => self.line(format!("{indent}{} {}", p.yellow("-"), p.dim(&result.name))),
            Status::Todo => self.line(format!("{indent}{} {}", p.yellow("✎ todo"), p.dim(&result.name))),
        }
    }

    fn scope_failed(&mut self, failure: &ScopeFailure) {
        let text = self.palette.red(&format!("✗ {failure}"));
        self.line(text);
    }
}

// ============================================================================
// Running
// ============================================================================

/// Run multiple named suites, printing a header per suite and a combined
/// summary to stdout.
pub fn run_suites(suites: &[Suite], config: &RunConfig) -> Result<RunReport, CollectionError> {
    run_suites_with(suites, config, &mut TreeReporter::stdout())
}

/// Like [`run_suites`], printing through the given reporter.
pub fn run_suites_with<W: Write>(
    suites: &[Suite],
    config: &RunConfig,
    reporter: &mut TreeReporter<W>,
) -> Result<RunReport, CollectionError> {
    if config.fail_on_focus {
        let count: usize = suites.iter().map(|s| s.root.focus_count()).sum();
        if count > 0 {
            return Err(CollectionError::FocusedTests { count });
        }
    }

    let selection = config.selection();
    let mut report = RunReport::default();

    if config.list {
        for suite in suites {
            list_plan(&ExecutionPlan::build_with(&suite.root, &selection), reporter);
        }
        return Ok(report);
    }

    let executor = config.executor();
    reporter.line("");

    for suite in suites {
        reporter.suite_header(&suite.header());
        let plan = ExecutionPlan::build_with(&suite.root, &selection);
        report.merge(executor.run_with(&plan, reporter));

        if suites.len() > 1 {
            reporter.line("");
        }
    }

    reporter.summary(&report);
    Ok(report)
}

fn list_plan<W: Write>(plan: &ExecutionPlan<'_>, reporter: &mut TreeReporter<W>) {
    for test in plan.tests() {
        match test.disposition {
            Disposition::Run => reporter.line(test.full_name()),
            Disposition::Skip(SkipReason::Declared) => {
                reporter.line(format!("{} (skipped)", test.full_name()))
            }
            Disposition::Todo => reporter.line(format!("{} (todo)", test.full_name())),
            Disposition::Skip(_) => {}
        }
    }
}
