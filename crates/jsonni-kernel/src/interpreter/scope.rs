//! Variable scope for query evaluation.
//!
//! A scope is a persistent linked list of bindings. Binding a name returns a
//! new scope that shares its tail with the old one, so arrow functions can
//! capture the scope they were created in without copying it.
//!
//! `$input` is bound in the root scope; identifiers that no binding
//! resolves fall through to the intrinsic globals.

use std::cell::RefCell;
use std::rc::Rc;

use crate::value::Value;

/// Name of the binding that holds the query input.
pub const INPUT: &str = "$input";

#[derive(Debug, Clone, Default)]
pub struct Scope {
    head: Option<Rc<Frame>>,
}

#[derive(Debug)]
struct Frame {
    name: String,
    value: RefCell<Value>,
    parent: Option<Rc<Frame>>,
}

impl Scope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Root scope with `$input` bound to the query input.
    pub fn with_input(input: Value) -> Self {
        Self::new().bind(INPUT, input)
    }

    /// Return a new scope with `name` bound in front of this one.
    pub fn bind(&self, name: impl Into<String>, value: Value) -> Self {
        Self {
            head: Some(Rc::new(Frame {
                name: name.into(),
                value: RefCell::new(value),
                parent: self.head.clone(),
            })),
        }
    }

    /// Replace the value of the innermost binding.
    ///
    /// `const f = n => f(n - 1)` binds `f` first and assigns it after the
    /// arrow has captured the scope, so the arrow can see itself. The
    /// resulting `Rc` cycle lives until the process exits.
    pub fn assign_head(&self, value: Value) {
        if let Some(frame) = &self.head {
            *frame.value.borrow_mut() = value;
        }
    }

    /// Look up a name, innermost binding first.
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut frame = self.head.as_ref();
        while let Some(f) = frame {
            if f.name == name {
                return Some(f.value.borrow().clone());
            }
            frame = f.parent.as_ref();
        }
        None
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadowing() {
        let outer = Scope::new().bind("x", Value::Number(1.0));
        let inner = outer.bind("x", Value::Number(2.0));
        assert!(matches!(inner.get("x"), Some(Value::Number(n)) if n == 2.0));
        assert!(matches!(outer.get("x"), Some(Value::Number(n)) if n == 1.0));
    }

    #[test]
    fn test_input_binding() {
        let scope = Scope::with_input(Value::from("data"));
        assert!(scope.contains(INPUT));
        assert!(!scope.contains("missing"));
    }

    #[test]
    fn test_assign_head() {
        let scope = Scope::new().bind("f", Value::Undefined);
        scope.assign_head(Value::Bool(true));
        assert!(matches!(scope.get("f"), Some(Value::Bool(true))));
    }
}
