//! Error types for collection and execution.

use crate::registry::HookKind;
use std::time::Duration;
use thiserror::Error;

/// Fatal problems found while building the scope tree. Nothing runs when
/// collection fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    #[error("scope `{scope}` panicked during collection: {message}")]
    ScopeBody { scope: String, message: String },

    #[error(
        "{count} focused test(s) found but RSJEST_FAIL_ON_FOCUS is set; \
         remove fit/fdescribe before pushing"
    )]
    FocusedTests { count: usize },
}

/// Why a single hook or test callback did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    #[error("{0}")]
    Panicked(String),

    #[error("done failed: {0}")]
    Rejected(String),

    #[error("timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    #[error("done handle dropped without being completed")]
    Abandoned,
}

/// The failure recorded against a test.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure {
    #[error("{0}")]
    Test(InvokeError),

    #[error("{kind} hook failed: {source}")]
    Hook { kind: HookKind, source: InvokeError },

    #[error("before_all hook failed in `{scope}`: {source}")]
    BeforeAll { scope: String, source: InvokeError },
}

impl Failure {
    /// Body failures are plain test failures; everything else (hooks,
    /// timeouts) means the test could not be judged.
    pub fn is_error(&self) -> bool {
        !matches!(
            self,
            Failure::Test(InvokeError::Panicked(_) | InvokeError::Rejected(_))
        )
    }
}

/// An after_all hook failure. It belongs to a scope rather than a test.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("after_all hook failed in `{scope}`: {source}")]
pub struct ScopeFailure {
    pub scope: String,
    pub source: InvokeError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_hook_failures_are_errors() {
        assert!(Failure::Test(InvokeError::TimedOut(Duration::from_millis(5))).is_error());
        assert!(Failure::Test(InvokeError::Abandoned).is_error());
        assert!(Failure::Hook {
            kind: HookKind::BeforeEach,
            source: InvokeError::Panicked("boom".into()),
        }
        .is_error());
        assert!(!Failure::Test(InvokeError::Panicked("boom".into())).is_error());
    }

    #[test]
    fn messages_name_the_hook_and_scope() {
        let failure = Failure::BeforeAll {
            scope: "db > users".into(),
            source: InvokeError::TimedOut(Duration::from_millis(250)),
        };
        assert_eq!(
            failure.to_string(),
            "before_all hook failed in `db > users`: timed out after 250ms"
        );
    }
}
