//! Lexical environments as chains of immutable frames.
//!
//! A frame is never mutated once created. Binding new names always
//! allocates a child frame whose parent is shared by reference, so a
//! closure holding an `Env` observes exactly the bindings that existed
//! when it was created, no matter how often it is invoked.

use crate::{runtime::Value, syntax::tree::Ident};
use std::{
    collections::HashMap,
    fmt::Formatter,
    rc::Rc,
};

#[derive(Clone, Default)]
pub struct Env(Option<Rc<Scope>>);

pub struct Scope {
    vars: HashMap<Ident, Value>,
    parent: Env,
}

impl Env {
    /// The empty environment, with no frames at all.
    pub fn new() -> Env {
        Env(None)
    }

    /// A single root frame holding the given bindings.
    pub fn from_bindings<I>(bindings: I) -> Env
    where
        I: IntoIterator<Item = (Ident, Value)>,
    {
        Env::new().extend(bindings.into_iter().collect())
    }

    pub fn extend(&self, vars: HashMap<Ident, Value>) -> Env {
        Env(Some(Rc::new(Scope {
            vars,
            parent: self.clone(),
        })))
    }

    /// Binds `params` to `args` positionally in a fresh child frame.
    /// Callers check the arity beforehand.
    pub fn bind(&self, params: &[Ident], args: Vec<Value>) -> Env {
        debug_assert_eq!(params.len(), args.len());
        self.extend(params.iter().cloned().zip(args.into_iter()).collect())
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut env = self;
        while let Some(scope) = &env.0 {
            if let Some(value) = scope.vars.get(name) {
                return Some(value);
            }
            env = &scope.parent;
        }
        None
    }

    pub fn depth(&self) -> usize {
        self.frames().count()
    }

    pub fn is_empty(&self) -> bool {
        self.frames().all(|scope| scope.vars.is_empty())
    }

    pub fn ptr_eq(&self, other: &Env) -> bool {
        match (&self.0, &other.0) {
            (Some(lhs), Some(rhs)) => Rc::ptr_eq(lhs, rhs),
            (None, None) => true,
            _ => false,
        }
    }

    fn frames(&self) -> Frames<'_> {
        Frames(self)
    }
}

struct Frames<'a>(&'a Env);

impl<'a> Iterator for Frames<'a> {
    type Item = &'a Scope;

    fn next(&mut self) -> Option<&'a Scope> {
        let env: &'a Env = self.0;
        let scope = env.0.as_deref()?;
        self.0 = &scope.parent;
        Some(scope)
    }
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let frames = self
            .frames()
            .map(|scope| {
                let mut names = scope.vars.keys().map(String::as_str).collect::<Vec<_>>();
                names.sort_unstable();
                names
            })
            .collect::<Vec<_>>();
        f.debug_tuple("Env").field(&frames).finish()
    }
}
