//! The callback contract shared by hooks and tests.
//!
//! Every hook and test body is a [`Callback`]: it is invoked with the
//! current [`Fixtures`] and either finishes before returning or hands back a
//! [`Suspension`]. A suspended callback holds the executor until its
//! [`Done`] handle is completed, failed or dropped, or until the step's
//! timeout elapses.

use crate::error::InvokeError;
use crate::fixtures::Fixtures;
use std::any::Any;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// A hook or test body.
pub trait Callback {
    /// Run the callback. `Some` suspends the run until the signal resolves.
    fn invoke(&self, fixtures: &mut Fixtures) -> Option<Suspension>;
}

/// Plain synchronous closure.
pub(crate) struct Plain<F>(pub(crate) F);

impl<F: Fn(&mut Fixtures)> Callback for Plain<F> {
    fn invoke(&self, fixtures: &mut Fixtures) -> Option<Suspension> {
        (self.0)(fixtures);
        None
    }
}

/// Closure that finishes by calling [`Done::complete`] or [`Done::fail`],
/// possibly from another thread. Created with [`with_done`].
pub struct WithDone<F>(F);

impl<F: Fn(&mut Fixtures, Done)> Callback for WithDone<F> {
    fn invoke(&self, fixtures: &mut Fixtures) -> Option<Suspension> {
        let (tx, rx) = mpsc::channel();
        (self.0)(fixtures, Done { tx });
        Some(Suspension { rx })
    }
}

/// Wrap a completion-style closure so it can be registered with
/// [`Context::hook`](crate::Context::hook).
///
/// ```rust,no_run
/// # fn main() { rsjest::run(|ctx| {
/// use rsjest::HookKind;
///
/// ctx.hook(HookKind::BeforeAll, rsjest::with_done(|_fx, done| {
///     std::thread::spawn(move || {
///         // connect to something slow...
///         done.complete();
///     });
/// }));
/// # }); }
/// ```
pub fn with_done<F>(f: F) -> WithDone<F>
where
    F: Fn(&mut Fixtures, Done) + 'static,
{
    WithDone(f)
}

/// Completion handle handed to a suspended callback. Dropping it without
/// calling either method fails the step.
#[derive(Debug)]
pub struct Done {
    tx: Sender<Result<(), String>>,
}

impl Done {
    pub fn complete(self) {
        // A closed receiver means the step already timed out.
        let _ = self.tx.send(Ok(()));
    }

    pub fn fail(self, reason: impl Into<String>) {
        let _ = self.tx.send(Err(reason.into()));
    }
}

/// Pending completion of a suspended callback.
#[derive(Debug)]
pub struct Suspension {
    rx: Receiver<Result<(), String>>,
}

impl Suspension {
    /// Block until the callback resolves. `remaining` is what is left of the
    /// step's `limit`, if it has one.
    pub(crate) fn wait(
        self,
        remaining: Option<Duration>,
        limit: Option<Duration>,
    ) -> Result<(), InvokeError> {
        let signal = match (remaining, limit) {
            (Some(remaining), Some(limit)) => match self.rx.recv_timeout(remaining) {
                Ok(signal) => signal,
                Err(RecvTimeoutError::Timeout) => return Err(InvokeError::TimedOut(limit)),
                Err(RecvTimeoutError::Disconnected) => return Err(InvokeError::Abandoned),
            },
            _ => self.rx.recv().map_err(|_| InvokeError::Abandoned)?,
        };
        signal.map_err(InvokeError::Rejected)
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
