//! Suspendable capabilities and their execution states.
//!
//! A capability is compiled once into a single continuation call. Running it
//! either completes with a value or stops at a suspension, yielding a
//! [`CapabilityExecutionState`] that can be resumed in this process or
//! persisted and resumed in a later one.

use crate::{
    codegen::{text::TextCodeGenerator, PartialCodeGenerator},
    ffi::NativeRegistry,
    runtime::{
        env::Env,
        eval::{Interpreter, DEFAULT_MAX_DEPTH},
        pattern::MessagePattern,
        Closure, RuntimeError, Value,
        Value::{AwaitingValue, ClosureValue},
    },
    syntax::tree::{Expr, Ident, DISCARD},
    Compiler, Error,
};
use std::{collections::BTreeMap, fmt::Formatter, rc::Rc};
use tracing::debug;

pub mod record;

use record::{
    parse_lambda, PersistedRecord, RecordReader, RecordWriter, SerializationError, RECORD_VERSION,
};

/// What the host supplies to every compile and resume.
#[derive(Clone, Debug)]
pub struct Host {
    natives: Rc<NativeRegistry>,
    max_depth: usize,
}

impl Host {
    pub fn new(natives: NativeRegistry) -> Host {
        Host {
            natives: Rc::new(natives),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Host {
        self.max_depth = max_depth;
        self
    }

    pub fn natives(&self) -> &NativeRegistry {
        &self.natives
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn interpreter(&self) -> Interpreter {
        Interpreter::new(self.natives.clone()).with_max_depth(self.max_depth)
    }
}

impl Default for Host {
    fn default() -> Self {
        Host::new(NativeRegistry::with_builtins())
    }
}

pub struct CapabilityDefinition {
    source: String,
    program: Expr,
}

#[derive(Debug)]
pub enum Outcome {
    Complete(Value),
    Suspended(CapabilityExecutionState),
}

/// A pending continuation together with the data it closes over.
///
/// States are values: resuming never changes the state it is called on, so
/// the same state may be resumed any number of times, each run branching
/// independently from the suspension point.
#[derive(Clone)]
pub struct CapabilityExecutionState {
    params: Vec<Ident>,
    body: Rc<Expr>,
    environment: BTreeMap<Ident, Value>,
    message_pattern: Option<MessagePattern>,
}

impl CapabilityDefinition {
    pub fn compile(source: &str) -> Result<CapabilityDefinition, Error> {
        let program = Compiler::compile(source)?;
        debug!(bytes = source.len(), "capability compiled");
        Ok(CapabilityDefinition {
            source: source.to_owned(),
            program,
        })
    }

    pub fn source(&self) -> &str {
        self.source.as_str()
    }

    /// The transformed program.
    pub fn cps(&self) -> &Expr {
        &self.program
    }

    pub fn cps_text(&self) -> String {
        TextCodeGenerator::new().partial_codegen_expr(&self.program)
    }

    /// The state before anything ran: `lambda _: <program>` with no data.
    pub fn initial_state(&self) -> CapabilityExecutionState {
        CapabilityExecutionState {
            params: vec![DISCARD.to_owned()],
            body: Rc::new(self.program.clone()),
            environment: BTreeMap::new(),
            message_pattern: None,
        }
    }

    /// Runs the capability up to its first suspension or to completion.
    pub fn execute(&self, host: &Host) -> Result<Outcome, Error> {
        self.initial_state().resume(host, Value::NoneValue)
    }
}

impl Outcome {
    /// Classifies the value an evaluation produced: a continuation means
    /// the computation stopped early, anything else is final.
    pub fn from_value(value: Value) -> Outcome {
        match value {
            ClosureValue(closure) => {
                Outcome::Suspended(CapabilityExecutionState::from_closure(&closure, None))
            }
            AwaitingValue(closure, pattern) => {
                Outcome::Suspended(CapabilityExecutionState::from_closure(&closure, Some(pattern)))
            }
            value => Outcome::Complete(value),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Complete(_))
    }
}

impl CapabilityExecutionState {
    pub fn from_closure(closure: &Closure, message_pattern: Option<MessagePattern>) -> Self {
        CapabilityExecutionState {
            params: closure.params.clone(),
            body: closure.body.clone(),
            environment: closure.captures(),
            message_pattern,
        }
    }

    pub fn environment(&self) -> &BTreeMap<Ident, Value> {
        &self.environment
    }

    pub fn message_pattern(&self) -> Option<MessagePattern> {
        self.message_pattern
    }

    pub fn to_closure(&self) -> Closure {
        Closure::new(
            self.params.clone(),
            self.body.clone(),
            Env::from_bindings(self.environment.clone()),
        )
    }

    /// The pending continuation in textual notation.
    pub fn continuation_text(&self) -> String {
        self.to_closure().source()
    }

    /// Continues the computation with `message` as the value of the call
    /// that suspended. The receiver is left as it was, whatever happens.
    pub fn resume(&self, host: &Host, message: Value) -> Result<Outcome, Error> {
        if let Some(pattern) = self.message_pattern {
            if !pattern.matches(&message) {
                return Err(RuntimeError::MessageMismatch {
                    expected: pattern,
                    got: message.type_name(),
                }
                .into());
            }
        }
        debug!(
            bindings = self.environment.len(),
            message = message.type_name(),
            "resuming capability"
        );

        let continuation = ClosureValue(Rc::new(self.to_closure()));
        let value = host.interpreter().apply(continuation, vec![message])?;
        let outcome = Outcome::from_value(value);

        match &outcome {
            Outcome::Complete(value) => debug!(value = %value, "capability completed"),
            Outcome::Suspended(state) => debug!(
                pattern = ?state.message_pattern,
                "capability suspended"
            ),
        }
        Ok(outcome)
    }

    /// Encodes the state as a JSON record. Fails if any binding, however
    /// deeply nested, holds a native function.
    pub fn persist(&self) -> Result<String, SerializationError> {
        let mut writer = RecordWriter::new();
        let environment = writer.environment("", &self.environment)?;
        let record = PersistedRecord {
            version: RECORD_VERSION,
            continuation: self.continuation_text(),
            environment,
            message_pattern: self.message_pattern,
            closures: writer.finish(),
        };
        let text = record.to_json()?;
        debug!(bytes = text.len(), "capability state persisted");
        Ok(text)
    }

    pub fn load(text: &str) -> Result<CapabilityExecutionState, SerializationError> {
        let record = PersistedRecord::from_json(text)?;
        let (params, body) = parse_lambda(record.continuation.as_str())?;
        let environment = RecordReader::new(record.closures)?.environment(record.environment)?;
        debug!(bindings = environment.len(), "capability state loaded");
        Ok(CapabilityExecutionState {
            params,
            body,
            environment,
            message_pattern: record.message_pattern,
        })
    }
}

impl std::fmt::Debug for CapabilityExecutionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityExecutionState")
            .field("continuation", &self.continuation_text())
            .field("environment", &self.environment)
            .field("message_pattern", &self.message_pattern)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Value::{IntValue, ListValue, NoneValue, StringValue};
    use pretty_assertions::assert_eq;

    fn suspended(outcome: Outcome) -> CapabilityExecutionState {
        match outcome {
            Outcome::Suspended(state) => state,
            Outcome::Complete(value) => panic!("completed with {}", value),
        }
    }

    #[test]
    fn test_initial_state() {
        let definition = CapabilityDefinition::compile("suspend()").unwrap();
        let state = definition.initial_state();
        assert_eq!(state.continuation_text(), "lambda _: suspend(lambda _: complete())");
        assert!(state.environment().is_empty());
        assert_eq!(state.message_pattern(), None);
    }

    #[test]
    fn test_execute_to_completion() {
        let definition = CapabilityDefinition::compile("").unwrap();
        match definition.execute(&Host::default()).unwrap() {
            Outcome::Complete(value) => assert_eq!(value, NoneValue),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_received_value_is_bound() {
        let definition = CapabilityDefinition::compile("n = receive('int')\ncomplete(n * 2)").unwrap();
        let host = Host::default();
        let state = suspended(definition.execute(&host).unwrap());
        assert_eq!(state.message_pattern(), Some(MessagePattern::Int));

        match state.resume(&host, IntValue(21)).unwrap() {
            Outcome::Complete(value) => assert_eq!(value, IntValue(42)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_message_leaves_state_usable() {
        let definition = CapabilityDefinition::compile("n = receive('int')\ncomplete(n)").unwrap();
        let host = Host::default();
        let state = suspended(definition.execute(&host).unwrap());
        let before = state.persist().unwrap();

        assert!(matches!(
            state.resume(&host, StringValue("x".into())),
            Err(Error::Runtime(RuntimeError::MessageMismatch { .. }))
        ));
        assert_eq!(state.persist().unwrap(), before);
        assert!(state.resume(&host, IntValue(1)).unwrap().is_complete());
    }

    #[test]
    fn test_persist_is_stable_and_loadable() {
        let definition =
            CapabilityDefinition::compile("a = receive('any')\nb = receive('string')\ncomplete([a, b])").unwrap();
        let host = Host::default();
        let first = suspended(definition.execute(&host).unwrap());
        let second = suspended(first.resume(&host, IntValue(7)).unwrap());

        let text = second.persist().unwrap();
        assert_eq!(text, second.persist().unwrap());
        assert_eq!(
            text,
            concat!(
                r#"{"version":1,"continuation":"lambda b: complete([a, b], lambda _: complete())","#,
                r#""environment":{"a":{"Int":7}},"message_pattern":"string"}"#
            )
        );

        let loaded = CapabilityExecutionState::load(text.as_str()).unwrap();
        match loaded.resume(&host, StringValue("x".into())).unwrap() {
            Outcome::Complete(value) => {
                assert_eq!(value, ListValue(vec![IntValue(7), StringValue("x".into())]))
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
