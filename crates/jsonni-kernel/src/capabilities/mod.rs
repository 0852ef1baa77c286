//! Capability sets exposed to queries.
//!
//! Each dialect sees a different set of names:
//!
//! | dialect  | extra bindings |
//! |----------|----------------|
//! | identity | none           |
//! | native   | none           |
//! | utility  | `_`            |
//! | sequence | `from`         |
//!
//! The intrinsic globals (`Math`, `JSON`, `Object`, `Array`, `Number`, ...)
//! are visible everywhere.

pub mod intrinsics;
pub mod sequence;
pub mod utility;

use crate::interpreter::{EvalResult, Evaluator};
use crate::value::{Builtin, Function, Namespace, Value};

/// Name of the sequence entry point.
pub const FROM: &str = "from";

/// Name of the utility namespace.
pub const UTILITY: &str = "_";

/// The `_` namespace value.
pub fn utility_namespace() -> Value {
    Value::Namespace(Namespace::Utility)
}

/// The `from` function value.
pub fn from_function() -> Value {
    Value::Function(Function::Builtin(Builtin {
        namespace: Namespace::Global,
        name: FROM,
    }))
}

fn function_names(ns: Namespace) -> &'static [&'static str] {
    match ns {
        Namespace::Utility => utility::FUNCTIONS,
        Namespace::Math => intrinsics::MATH,
        Namespace::Json => intrinsics::JSON,
        Namespace::Object => intrinsics::OBJECT,
        Namespace::Array => intrinsics::ARRAY,
        Namespace::Global => intrinsics::GLOBAL,
    }
}

/// Read `ns.name`: a constant, a builtin function, or `undefined`.
pub fn namespace_member(ns: Namespace, name: &str) -> Value {
    if ns == Namespace::Math
        && let Some(c) = intrinsics::math_constant(name)
    {
        return Value::Number(c);
    }
    function_names(ns)
        .iter()
        .find(|n| **n == name)
        .map(|n| {
            Value::Function(Function::Builtin(Builtin {
                namespace: ns,
                name: n,
            }))
        })
        .unwrap_or_default()
}

/// Call `ns.name(args)`. `Ok(None)` if the namespace has no such function.
pub fn call_namespace(
    ev: &mut Evaluator,
    ns: Namespace,
    name: &str,
    args: Vec<Value>,
) -> EvalResult<Option<Value>> {
    match ns {
        Namespace::Utility => utility::call(ev, name, args),
        Namespace::Global if name == FROM => sequence::from(ev, args).map(Some),
        _ => intrinsics::call(ev, ns, name, args),
    }
}
