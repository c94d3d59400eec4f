use crate::{
    codegen::{text::TextCodeGenerator, PartialCodeGenerator},
    ffi::{NativeError, NativeFunction},
    runtime::{env::Env, pattern::MessagePattern},
    syntax::tree::{
        Atom::AtomLambda,
        Expr::{self, AtomExpr},
        Ident,
        Lit::{LitFloat, LitString},
    },
};
use std::{collections::BTreeMap, fmt::Formatter, rc::Rc};
use thiserror::Error;

pub mod builtins;
pub mod env;
pub mod eval;
pub mod ops;
pub mod pattern;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("UnboundNameError: name '{0}' is not defined")]
    UnboundName(Ident),

    #[error("ArityError: {callee} takes {expected} argument(s) but {got} were given")]
    Arity {
        callee: String,
        expected: usize,
        got: usize,
    },

    #[error("TypeError: '{0}' object is not callable")]
    NotApplicable(&'static str),

    #[error("TypeError: unsupported operand type(s) for {op}: '{lhs}' and '{rhs}'")]
    TypeMismatch {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("ZeroDivisionError: {0}")]
    DivisionByZero(&'static str),

    #[error("OverflowError: integer overflow in {0}")]
    Overflow(&'static str),

    #[error("ValueError: negative shift count")]
    NegativeShift,

    #[error("RecursionError: maximum call depth of {0} exceeded")]
    RecursionLimit(usize),

    #[error("MessageError: expected a message of shape {expected}, got '{got}'")]
    MessageMismatch {
        expected: MessagePattern,
        got: &'static str,
    },

    #[error(transparent)]
    Native(#[from] NativeError),
}

/// A realized function literal: immutable once created.
pub struct Closure {
    pub params: Vec<Ident>,
    pub body: Rc<Expr>,
    pub env: Env,
}

#[derive(Clone)]
pub enum Value {
    NoneValue,
    BoolValue(bool),
    IntValue(i64),
    FloatValue(f64),
    StringValue(String),
    ListValue(Vec<Value>),
    ClosureValue(Rc<Closure>),
    NativeValue(NativeFunction),
    // a continuation that only accepts messages of the given shape
    AwaitingValue(Rc<Closure>, MessagePattern),
}

use Value::{
    AwaitingValue, BoolValue, ClosureValue, FloatValue, IntValue, ListValue, NativeValue,
    NoneValue, StringValue,
};

impl Closure {
    pub fn new(params: Vec<Ident>, body: Rc<Expr>, env: Env) -> Closure {
        Closure { params, body, env }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// The function literal this closure was created from.
    pub fn to_expr(&self) -> Expr {
        AtomExpr(AtomLambda(self.params.clone(), self.body.clone()))
    }

    pub fn source(&self) -> String {
        TextCodeGenerator::new().partial_codegen_expr(&self.to_expr())
    }

    /// The bindings the body can actually reach: its free names resolved
    /// against the captured environment. Names found nowhere in the chain
    /// are left to the natives at call time.
    pub fn captures(&self) -> BTreeMap<Ident, Value> {
        let mut names = self.body.free_names();
        self.params.iter().for_each(|param| {
            names.remove(param);
        });
        names
            .into_iter()
            .filter_map(|name| {
                let value = self.env.lookup(name.as_str())?.clone();
                Some((name, value))
            })
            .collect()
    }
}

impl std::fmt::Debug for Closure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Closure")
            .field("source", &self.source())
            .field("env", &self.env)
            .finish()
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            NoneValue => "NoneType",
            BoolValue(_) => "bool",
            IntValue(_) => "int",
            FloatValue(_) => "float",
            StringValue(_) => "str",
            ListValue(_) => "list",
            ClosureValue(_) => "function",
            NativeValue(_) => "native",
            AwaitingValue(_, _) => "continuation",
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, ClosureValue(_) | NativeValue(_) | AwaitingValue(_, _))
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ClosureValue(closure) => write!(f, "ClosureValue({:?})", closure),
            AwaitingValue(closure, pattern) => {
                write!(f, "AwaitingValue({:?}, {:?})", closure, pattern)
            }
            NativeValue(native) => write!(f, "NativeValue({})", native.name()),
            _ => write!(f, "{}", self),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let gen = TextCodeGenerator::new();
        match self {
            NoneValue => write!(f, "None"),
            BoolValue(true) => write!(f, "True"),
            BoolValue(false) => write!(f, "False"),
            IntValue(v) => write!(f, "{}", v),
            FloatValue(v) => write!(f, "{}", gen.partial_codegen_lit(&LitFloat(*v))),
            StringValue(v) => write!(f, "{}", gen.partial_codegen_lit(&LitString(v.clone()))),
            ListValue(items) => {
                let items = items.iter().map(|v| v.to_string()).collect::<Vec<_>>();
                write!(f, "[{}]", items.join(", "))
            }
            ClosureValue(closure) => write!(f, "<function {}>", closure.source()),
            NativeValue(native) => write!(f, "<native {}>", native.name()),
            AwaitingValue(closure, pattern) => {
                write!(f, "<continuation awaiting {} {}>", pattern, closure.source())
            }
        }
    }
}

impl std::cmp::PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NoneValue, NoneValue) => true,
            (BoolValue(lhs), BoolValue(rhs)) => lhs == rhs,
            (IntValue(lhs), IntValue(rhs)) => lhs == rhs,
            (FloatValue(lhs), FloatValue(rhs)) => lhs == rhs,
            (StringValue(lhs), StringValue(rhs)) => lhs == rhs,
            (ListValue(lhs), ListValue(rhs)) => lhs == rhs,
            (ClosureValue(lhs), ClosureValue(rhs)) => Rc::ptr_eq(lhs, rhs),
            (AwaitingValue(lhs, p), AwaitingValue(rhs, q)) => Rc::ptr_eq(lhs, rhs) && p == q,
            (NativeValue(lhs), NativeValue(rhs)) => lhs.same_as(rhs),
            _ => false,
        }
    }
}

pub trait IntoValue {
    fn into_value(self) -> Value;
}

pub trait FromValue
where
    Self: Sized,
{
    /// Shape name used in argument mismatch diagnostics.
    const EXPECTED: &'static str;

    fn from_value(value: Value) -> Option<Self>;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        NoneValue
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        BoolValue(self)
    }
}

impl IntoValue for i64 {
    fn into_value(self) -> Value {
        IntValue(self)
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        FloatValue(self)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        StringValue(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        StringValue(self.to_owned())
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        ListValue(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl FromValue for Value {
    const EXPECTED: &'static str = "any";

    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }
}

impl FromValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            BoolValue(b) => Some(b),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "int";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            IntValue(i) => Some(i),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "number";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            IntValue(i) => Some(i as f64),
            FloatValue(f) => Some(f),
            _ => None,
        }
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "str";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            StringValue(s) => Some(s),
            _ => None,
        }
    }
}

impl FromValue for Vec<Value> {
    const EXPECTED: &'static str = "list";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            ListValue(items) => Some(items),
            _ => None,
        }
    }
}

impl FromValue for Rc<Closure> {
    const EXPECTED: &'static str = "function";

    fn from_value(value: Value) -> Option<Self> {
        match value {
            ClosureValue(closure) | AwaitingValue(closure, _) => Some(closure),
            _ => None,
        }
    }
}
