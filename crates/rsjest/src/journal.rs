//! An ordered log of diagnostic lines, used to observe execution order.

use std::cell::RefCell;
use std::rc::Rc;

/// Cloneable handle to a shared list of lines. Clones write to the same
/// list, so one journal can be captured by every describe body, hook and
/// test of a suite.
///
/// ```rust
/// let journal = rsjest::Journal::new();
/// let log = journal.clone();
/// log.record("1 - beforeAll");
/// assert_eq!(journal.lines(), vec!["1 - beforeAll"]);
/// ```
#[derive(Clone, Default, Debug)]
pub struct Journal {
    lines: Rc<RefCell<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Journal::default()
    }

    /// Append a line. It is also emitted as a `tracing` event.
    pub fn record(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::info!(target: "rsjest::journal", "{line}");
        self.lines.borrow_mut().push(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    /// Return the recorded lines and start over with an empty list.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.lines.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.borrow().is_empty()
    }
}
