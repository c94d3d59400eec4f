//! Host-provided native functions.
//!
//! The host builds a [`NativeRegistry`] once and hands it to every compile
//! and resume. Natives are looked up by name after the lexical environment,
//! so a closure parameter with the same name shadows them. A native that
//! receives a continuation may return it instead of calling it; that is all
//! it takes to suspend. Natives that suspend must tolerate their side effects
//! happening again when a continuation is resumed more than once.

use crate::{
    runtime::{builtins::Builtins, eval::Interpreter, FromValue, RuntimeError, Value},
    syntax::tree::Ident,
};
use std::{
    collections::HashMap,
    fmt::{Debug, Formatter},
    rc::Rc,
};
use thiserror::Error;

pub type NativeResult = Result<Value, RuntimeError>;
pub type NativeFn = dyn Fn(&mut Interpreter, Vec<Value>) -> NativeResult;

#[derive(Clone)]
pub struct NativeFunction {
    name: Ident,
    argc: Option<usize>,
    closure: Rc<NativeFn>,
}

#[derive(Debug, Error)]
pub enum NativeError {
    #[error("TypeError: argument {index} of '{name}': expected {expected}, got '{got}'")]
    ArgTypeMismatch {
        name: Ident,
        index: usize,
        expected: &'static str,
        got: &'static str,
    },

    #[error("RuntimeError: {0}")]
    CustomError(String),
}

impl NativeFunction {
    /// `argc` of `None` accepts any number of arguments.
    pub fn new<S, F>(name: S, argc: Option<usize>, closure: F) -> Self
    where
        S: Into<Ident>,
        F: Fn(&mut Interpreter, Vec<Value>) -> NativeResult + 'static,
    {
        Self {
            name: name.into(),
            argc,
            closure: Rc::new(closure),
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn argc(&self) -> Option<usize> {
        self.argc
    }

    pub fn call(&self, interp: &mut Interpreter, args: Vec<Value>) -> NativeResult {
        match self.argc {
            Some(expected) if expected != args.len() => Err(RuntimeError::Arity {
                callee: format!("native '{}'", self.name),
                expected,
                got: args.len(),
            }),
            _ => (self.closure)(interp, args),
        }
    }

    pub fn same_as(&self, other: &NativeFunction) -> bool {
        self.name == other.name && Rc::ptr_eq(&self.closure, &other.closure)
    }
}

impl Debug for NativeFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

/// Converts the `index`-th argument of native `name`.
pub fn native_arg<T: FromValue>(name: &str, index: usize, value: Value) -> Result<T, NativeError> {
    let got = value.type_name();
    T::from_value(value).ok_or_else(|| NativeError::ArgTypeMismatch {
        name: name.to_owned(),
        index,
        expected: T::EXPECTED,
        got,
    })
}

#[derive(Clone, Default)]
pub struct NativeRegistry {
    fns: HashMap<Ident, NativeFunction>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// A registry preloaded with `complete`, `suspend` and `receive`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        Builtins::init(&mut registry);
        registry
    }

    pub fn register<S, F>(&mut self, name: S, argc: Option<usize>, closure: F) -> &mut Self
    where
        S: Into<Ident>,
        F: Fn(&mut Interpreter, Vec<Value>) -> NativeResult + 'static,
    {
        self.insert(NativeFunction::new(name, argc, closure))
    }

    pub fn insert(&mut self, native: NativeFunction) -> &mut Self {
        self.fns.insert(native.name.clone(), native);
        self
    }

    pub fn get(&self, name: &str) -> Option<&NativeFunction> {
        self.fns.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fns.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names = self.fns.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.fns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fns.is_empty()
    }
}

impl Debug for NativeRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Value::{IntValue, StringValue};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_registry_names_sorted() {
        let mut registry = NativeRegistry::with_builtins();
        registry.register("zeta", Some(0), |_, _| Ok(Value::NoneValue));
        assert_eq!(registry.names(), vec!["complete", "receive", "suspend", "zeta"]);
        assert!(registry.contains("zeta"));
        assert!(!registry.contains("print"));
    }

    #[test]
    fn test_native_arity_checked() {
        let registry = NativeRegistry::with_builtins();
        let mut interp = Interpreter::new(Rc::new(NativeRegistry::new()));
        let suspend = registry.get("suspend").unwrap();
        match suspend.call(&mut interp, vec![]) {
            Err(RuntimeError::Arity { expected, got, .. }) => assert_eq!((expected, got), (1, 0)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_native_arg_conversion() {
        assert_eq!(native_arg::<i64>("f", 0, IntValue(3)).unwrap(), 3);
        match native_arg::<i64>("f", 1, StringValue("x".into())) {
            Err(NativeError::ArgTypeMismatch {
                index, expected, got, ..
            }) => assert_eq!((index, expected, got), (1, "int", "str")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
