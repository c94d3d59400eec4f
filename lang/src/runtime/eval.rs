use std::rc::Rc;

use tracing::trace;

use crate::{
    ffi::NativeRegistry,
    runtime::{
        env::Env,
        ops,
        Closure, RuntimeError,
        RuntimeError::{Arity, MessageMismatch, NotApplicable, RecursionLimit, UnboundName},
        Value,
        Value::{
            AwaitingValue, BoolValue, ClosureValue, FloatValue, IntValue, ListValue, NativeValue,
            NoneValue, StringValue,
        },
    },
    syntax::tree::{
        Atom,
        Atom::{AtomId, AtomLambda, AtomList, AtomLit},
        Expr,
        Expr::{ApplyExpr, AtomExpr, BinaryExpr},
        Lit,
        Lit::{LitBool, LitFloat, LitInt, LitNone, LitString},
    },
};

/// Default bound on nested applications.
pub const DEFAULT_MAX_DEPTH: usize = 1000;

/// Grow the stack once less than this much of it remains.
const RED_ZONE: usize = 128 * 1024;

/// Size of each segment the stack grows by.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Runs `f` on a fresh stack segment when the current one is nearly used
/// up. Every recursive step of evaluation goes through here, so the depth
/// limit is the only thing that bounds nesting, whatever thread we run on.
#[inline]
fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// Direct evaluator for (possibly CPS-transformed) expression trees.
///
/// Suspension needs no support here: a native that returns its
/// continuation instead of calling it simply makes that closure the
/// result of the whole evaluation.
pub struct Interpreter {
    natives: Rc<NativeRegistry>,
    depth: usize,
    max_depth: usize,
}

pub(crate) trait Eval {
    fn eval_in(&self, interp: &mut Interpreter, env: &Env) -> Result<Value, RuntimeError>;
}

impl Eval for Expr {
    fn eval_in(&self, interp: &mut Interpreter, env: &Env) -> Result<Value, RuntimeError> {
        ensure_sufficient_stack(|| match self {
            AtomExpr(atom) => atom.eval_in(interp, env),
            BinaryExpr(op, lhs, rhs) => {
                let lhs = lhs.eval_in(interp, env)?;
                let rhs = rhs.eval_in(interp, env)?;
                ops::binary(*op, lhs, rhs)
            }
            ApplyExpr(f, args) => {
                let f = f.eval_in(interp, env)?;
                let args = args
                    .iter()
                    .map(|arg| arg.eval_in(interp, env))
                    .collect::<Result<Vec<_>, _>>()?;
                interp.apply(f, args)
            }
        })
    }
}

impl Eval for Atom {
    fn eval_in(&self, interp: &mut Interpreter, env: &Env) -> Result<Value, RuntimeError> {
        match self {
            AtomLit(lit) => lit.eval_in(interp, env),
            AtomId(id) => interp.lookup(env, id.as_str()),
            AtomList(items) => items
                .iter()
                .map(|item| item.eval_in(interp, env))
                .collect::<Result<Vec<_>, _>>()
                .map(ListValue),
            AtomLambda(params, body) => Ok(ClosureValue(Rc::new(Closure::new(
                params.clone(),
                body.clone(),
                env.clone(),
            )))),
        }
    }
}

impl Eval for Lit {
    fn eval_in(&self, _: &mut Interpreter, _: &Env) -> Result<Value, RuntimeError> {
        match self {
            LitNone => Ok(NoneValue),
            LitBool(b) => Ok(BoolValue(*b)),
            LitInt(i) => Ok(IntValue(*i)),
            LitFloat(f) => Ok(FloatValue(*f)),
            LitString(s) => Ok(StringValue(s.clone())),
        }
    }
}

impl Interpreter {
    pub fn new(natives: Rc<NativeRegistry>) -> Interpreter {
        Interpreter {
            natives,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Interpreter {
        self.max_depth = max_depth;
        self
    }

    pub fn natives(&self) -> &NativeRegistry {
        &self.natives
    }

    pub fn eval(&mut self, expr: &Expr, env: &Env) -> Result<Value, RuntimeError> {
        expr.eval_in(self, env)
    }

    /// Applies a callable value to already evaluated arguments.
    ///
    /// Closures may be applied any number of times; every application
    /// gets its own frame, so replaying a suspended continuation twice
    /// runs the rest of the computation twice, independently.
    pub fn apply(&mut self, f: Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        if self.depth >= self.max_depth {
            return Err(RecursionLimit(self.max_depth));
        }
        trace!(callee = f.type_name(), argc = args.len(), depth = self.depth, "apply");

        self.depth += 1;
        let result = ensure_sufficient_stack(|| match f {
            ClosureValue(closure) => self.apply_closure(&closure, args),
            AwaitingValue(closure, pattern) => match args.first() {
                Some(message) if !pattern.matches(message) => Err(MessageMismatch {
                    expected: pattern,
                    got: message.type_name(),
                }),
                _ => self.apply_closure(&closure, args),
            },
            NativeValue(native) => native.call(self, args),
            other => Err(NotApplicable(other.type_name())),
        });
        self.depth -= 1;
        result
    }

    fn apply_closure(&mut self, closure: &Closure, args: Vec<Value>) -> Result<Value, RuntimeError> {
        if closure.arity() != args.len() {
            return Err(Arity {
                callee: format!("function '{}'", closure.source()),
                expected: closure.arity(),
                got: args.len(),
            });
        }
        let env = closure.env.bind(&closure.params, args);
        closure.body.eval_in(self, &env)
    }

    fn lookup(&self, env: &Env, name: &str) -> Result<Value, RuntimeError> {
        if let Some(value) = env.lookup(name) {
            return Ok(value.clone());
        }
        match self.natives.get(name) {
            Some(native) => Ok(NativeValue(native.clone())),
            None => Err(UnboundName(name.to_owned())),
        }
    }
}
