//! The durable form of a suspended capability.
//!
//! A record is a JSON object holding the pending continuation in the stable
//! textual notation and its data-only environment. Native functions have no
//! durable form: meeting one anywhere in the environment aborts encoding.

use crate::{
    codegen::{text::TextCodeGenerator, PartialCodeGenerator},
    runtime::{
        env::Env,
        pattern::MessagePattern,
        Closure, Value,
        Value::{
            AwaitingValue, BoolValue, ClosureValue, FloatValue, IntValue, ListValue, NativeValue,
            NoneValue, StringValue,
        },
    },
    syntax::{
        parse::{CapParser, CompileError},
        tree::{
            Atom::AtomLambda,
            Expr::{self, AtomExpr},
            Ident,
        },
    },
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    rc::Rc,
};
use thiserror::Error;

pub const RECORD_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("SerializationError: '{0}' is bound to a native function and cannot be persisted")]
    NativeBinding(String),

    #[error("SerializationError: '{0}' holds a non-finite float")]
    NonFiniteFloat(String),

    #[error("SerializationError: malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("SerializationError: unsupported record version {0}")]
    Version(u32),

    #[error("SerializationError: not a function literal: {0}")]
    NotAFunction(String),

    #[error("SerializationError: {0}")]
    Expression(CompileError),

    #[error("SerializationError: closure #{0} is referenced before it is defined")]
    DanglingClosure(usize),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub version: u32,
    pub continuation: String,
    pub environment: BTreeMap<Ident, Datum>,
    pub message_pattern: Option<MessagePattern>,
    /// Every closure reachable from `environment`, each stored once.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub closures: Vec<ClosureDatum>,
}

/// Persist-safe image of a [`Value`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Datum {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Datum>),
    Closure {
        /// Index into the record's closure table.
        id: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<MessagePattern>,
    },
}

/// A function literal with the captures its body reads.
///
/// Captures may only refer to closures earlier in the table, which the
/// immutability of frames guarantees: a closure's environment exists
/// before the closure does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureDatum {
    pub source: String,
    pub environment: BTreeMap<Ident, Datum>,
}

/// Turns live values into data, interning closures by identity so a
/// closure shared by many bindings is written once.
#[derive(Default)]
pub struct RecordWriter {
    closures: Vec<ClosureDatum>,
    interned: HashMap<*const Closure, usize>,
}

impl RecordWriter {
    pub fn new() -> RecordWriter {
        Default::default()
    }

    /// `path` names the binding being encoded, for diagnostics.
    pub fn datum(&mut self, path: &str, value: &Value) -> Result<Datum, SerializationError> {
        match value {
            NoneValue => Ok(Datum::None),
            BoolValue(b) => Ok(Datum::Bool(*b)),
            IntValue(i) => Ok(Datum::Int(*i)),
            FloatValue(f) if f.is_finite() => Ok(Datum::Float(*f)),
            FloatValue(_) => Err(SerializationError::NonFiniteFloat(path.to_owned())),
            StringValue(s) => Ok(Datum::String(s.clone())),
            ListValue(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.datum(format!("{}[{}]", path, i).as_str(), item))
                .collect::<Result<Vec<_>, _>>()
                .map(Datum::List),
            ClosureValue(closure) => Ok(Datum::Closure {
                id: self.closure(path, closure)?,
                pattern: None,
            }),
            AwaitingValue(closure, pattern) => Ok(Datum::Closure {
                id: self.closure(path, closure)?,
                pattern: Some(*pattern),
            }),
            NativeValue(_) => Err(SerializationError::NativeBinding(path.to_owned())),
        }
    }

    pub fn environment(
        &mut self,
        path: &str,
        bindings: &BTreeMap<Ident, Value>,
    ) -> Result<BTreeMap<Ident, Datum>, SerializationError> {
        bindings
            .iter()
            .map(|(name, value)| {
                let path = match path {
                    "" => name.clone(),
                    _ => format!("{}.{}", path, name),
                };
                self.datum(path.as_str(), value).map(|datum| (name.clone(), datum))
            })
            .collect()
    }

    fn closure(&mut self, path: &str, closure: &Rc<Closure>) -> Result<usize, SerializationError> {
        let key = Rc::as_ptr(closure);
        if let Some(id) = self.interned.get(&key) {
            return Ok(*id);
        }
        let environment = self.environment(path, &closure.captures())?;
        let id = self.closures.len();
        self.closures.push(ClosureDatum {
            source: closure.source(),
            environment,
        });
        self.interned.insert(key, id);
        Ok(id)
    }

    pub fn finish(self) -> Vec<ClosureDatum> {
        self.closures
    }
}

/// Rebuilds values from a record, sharing one closure per table entry.
pub struct RecordReader {
    closures: Vec<Rc<Closure>>,
}

impl RecordReader {
    pub fn new(table: Vec<ClosureDatum>) -> Result<RecordReader, SerializationError> {
        let mut reader = RecordReader {
            closures: Vec::with_capacity(table.len()),
        };
        for entry in table {
            let (params, body) = parse_lambda(entry.source.as_str())?;
            let env = Env::from_bindings(reader.environment(entry.environment)?);
            reader.closures.push(Rc::new(Closure::new(params, body, env)));
        }
        Ok(reader)
    }

    pub fn value(&self, datum: Datum) -> Result<Value, SerializationError> {
        match datum {
            Datum::None => Ok(NoneValue),
            Datum::Bool(b) => Ok(BoolValue(b)),
            Datum::Int(i) => Ok(IntValue(i)),
            Datum::Float(f) => Ok(FloatValue(f)),
            Datum::String(s) => Ok(StringValue(s)),
            Datum::List(items) => items
                .into_iter()
                .map(|item| self.value(item))
                .collect::<Result<Vec<_>, _>>()
                .map(ListValue),
            Datum::Closure { id, pattern } => {
                let closure = self
                    .closures
                    .get(id)
                    .cloned()
                    .ok_or(SerializationError::DanglingClosure(id))?;
                Ok(match pattern {
                    Some(pattern) => AwaitingValue(closure, pattern),
                    None => ClosureValue(closure),
                })
            }
        }
    }

    pub fn environment(
        &self,
        environment: BTreeMap<Ident, Datum>,
    ) -> Result<BTreeMap<Ident, Value>, SerializationError> {
        environment
            .into_iter()
            .map(|(name, datum)| self.value(datum).map(|value| (name, value)))
            .collect()
    }
}

/// Reads back a function literal printed by the text code generator.
pub fn parse_lambda(source: &str) -> Result<(Vec<Ident>, Rc<Expr>), SerializationError> {
    match CapParser::expr(source).map_err(SerializationError::Expression)? {
        AtomExpr(AtomLambda(params, body)) => Ok((params, body)),
        other => Err(SerializationError::NotAFunction(
            TextCodeGenerator::new().partial_codegen_expr(&other),
        )),
    }
}

impl PersistedRecord {
    pub fn to_json(&self) -> Result<String, SerializationError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<PersistedRecord, SerializationError> {
        let record: PersistedRecord = serde_json::from_str(text)?;
        if record.version != RECORD_VERSION {
            return Err(SerializationError::Version(record.version));
        }
        Ok(record)
    }
}
