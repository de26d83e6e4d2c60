//! Typed, layered state passed to every hook and test.
//!
//! The executor pushes one layer when a scope is entered and one per test.
//! Writes always go to the innermost layer, reads search outward. A value
//! set up by `before_all` therefore stays visible, read-only, to every test
//! in that scope, while anything a `before_each` or test body inserts is
//! dropped when the test finishes.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;

type Layer = HashMap<TypeId, Box<dyn Any>>;

/// Shared state threaded through hook and test invocations.
///
/// ```rust,no_run
/// # fn main() { rsjest::run(|ctx| {
/// struct Db(Vec<&'static str>);
///
/// ctx.before_all(|fx| {
///     fx.insert(Db(vec!["Vienna", "San Juan"]));
/// });
///
/// ctx.it("city database has Vienna", |fx| {
///     assert!(fx.require::<Db>().0.contains(&"Vienna"));
/// });
/// # }); }
/// ```
pub struct Fixtures {
    layers: Vec<Layer>,
}

impl Fixtures {
    pub(crate) fn new() -> Self {
        Fixtures {
            layers: vec![Layer::new()],
        }
    }

    pub(crate) fn push_layer(&mut self) {
        self.layers.push(Layer::new());
    }

    pub(crate) fn pop_layer(&mut self) {
        // The base layer is never removed.
        if self.layers.len() > 1 {
            self.layers.pop();
        }
    }

    /// Store a value in the innermost layer, returning any value of the same
    /// type that layer held before.
    pub fn insert<T: 'static>(&mut self, value: T) -> Option<T> {
        self.top_mut()
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    /// Look a value up, innermost layer first.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.layers
            .iter()
            .rev()
            .find_map(|layer| layer.get(&TypeId::of::<T>()))
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Mutable access, limited to the innermost layer. Values owned by an
    /// enclosing scope cannot be changed from inside a test.
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.top_mut()
            .get_mut(&TypeId::of::<T>())
            .and_then(|value| value.downcast_mut::<T>())
    }

    /// Like [`get`](Self::get), but panics when the value is missing. Meant
    /// for test bodies, where the panic becomes the test failure.
    pub fn require<T: 'static>(&self) -> &T {
        match self.get::<T>() {
            Some(value) => value,
            None => panic!("rsjest: no fixture of type `{}` in scope", type_name::<T>()),
        }
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.get::<T>().is_some()
    }

    #[cfg(test)]
    fn depth(&self) -> usize {
        self.layers.len()
    }

    fn top_mut(&mut self) -> &mut Layer {
        if self.layers.is_empty() {
            self.layers.push(Layer::new());
        }
        let last = self.layers.len() - 1;
        &mut self.layers[last]
    }
}

impl Default for Fixtures {
    fn default() -> Self {
        Fixtures::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_layer_shadows_outer() {
        let mut fx = Fixtures::new();
        fx.insert(1u32);
        fx.push_layer();
        assert_eq!(fx.get::<u32>(), Some(&1));
        fx.insert(2u32);
        assert_eq!(fx.get::<u32>(), Some(&2));
        fx.pop_layer();
        assert_eq!(fx.get::<u32>(), Some(&1));
    }

    #[test]
    fn outer_values_are_read_only_from_inner_layers() {
        let mut fx = Fixtures::new();
        fx.insert(String::from("city db"));
        fx.push_layer();
        assert!(fx.get_mut::<String>().is_none());
        assert_eq!(fx.require::<String>(), "city db");
    }

    #[test]
    fn popped_values_do_not_leak() {
        let mut fx = Fixtures::new();
        fx.push_layer();
        fx.insert(vec![1, 2, 3]);
        fx.pop_layer();
        assert!(!fx.contains::<Vec<i32>>());
        assert_eq!(fx.depth(), 1);
    }

    #[test]
    fn insert_returns_previous_value() {
        let mut fx = Fixtures::new();
        assert_eq!(fx.insert(5i64), None);
        assert_eq!(fx.insert(6i64), Some(5));
    }

    #[test]
    #[should_panic(expected = "no fixture of type")]
    fn require_panics_when_missing() {
        let fx = Fixtures::new();
        fx.require::<bool>();
    }
}
