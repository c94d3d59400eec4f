use std::{cell::RefCell, rc::Rc};

use lang::{
    capability::{
        record::SerializationError, CapabilityDefinition, CapabilityExecutionState, Host, Outcome,
    },
    ffi::{native_arg, NativeRegistry},
    runtime::{
        RuntimeError,
        Value::{self, ClosureValue, FloatValue, IntValue, NoneValue, StringValue},
    },
    Error,
};
use pretty_assertions::assert_eq;

type Log = Rc<RefCell<Vec<String>>>;

/// Builtins, plus `f`, `g`, `done` and `say` which log and continue, plus `add`.
fn host_with_log() -> (Host, Log) {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let mut registry = NativeRegistry::with_builtins();

    for name in &["f", "g", "done"] {
        let log = log.clone();
        let name = name.to_string();
        registry.register(name.clone(), Some(1), move |interp, mut args| {
            log.borrow_mut().push(name.clone());
            let k = args.remove(0);
            interp.apply(k, vec![NoneValue])
        });
    }

    let sink = log.clone();
    registry.register("say", Some(2), move |interp, args| {
        let mut args = args.into_iter();
        let text: String = native_arg("say", 0, args.next().unwrap_or(NoneValue))?;
        sink.borrow_mut().push(text);
        interp.apply(args.next().unwrap_or(NoneValue), vec![NoneValue])
    });

    registry.register("add", Some(2), |_, args| {
        let mut args = args.into_iter();
        let lhs: f64 = native_arg("add", 0, args.next().unwrap_or(NoneValue))?;
        let rhs: f64 = native_arg("add", 1, args.next().unwrap_or(NoneValue))?;
        Ok(FloatValue(lhs + rhs))
    });

    (Host::new(registry), log)
}

fn suspended(outcome: Outcome) -> CapabilityExecutionState {
    match outcome {
        Outcome::Suspended(state) => state,
        Outcome::Complete(value) => panic!("completed with {}", value),
    }
}

fn completed(outcome: Outcome) -> Value {
    match outcome {
        Outcome::Complete(value) => value,
        Outcome::Suspended(state) => panic!("suspended at {:?}", state),
    }
}

#[test]
fn test_chain_runs_in_order_once() {
    let (host, log) = host_with_log();
    let definition = CapabilityDefinition::compile("f(); g()").unwrap();
    assert_eq!(definition.cps_text(), "f(lambda _: g(lambda _: complete()))");

    let value = completed(definition.execute(&host).unwrap());
    assert_eq!(value, NoneValue);
    assert_eq!(*log.borrow(), vec!["f", "g"]);
}

#[test]
fn test_suspend_then_resume_runs_rest_once() {
    let (host, log) = host_with_log();
    let definition = CapabilityDefinition::compile("suspend()\ndone()").unwrap();

    let state = suspended(definition.execute(&host).unwrap());
    assert!(log.borrow().is_empty());

    completed(state.resume(&host, NoneValue).unwrap());
    assert_eq!(*log.borrow(), vec!["done"]);
}

#[test]
fn test_suspended_closure_is_the_evaluation_result() {
    let (host, log) = host_with_log();
    let expr = lang::Compiler::compile("suspend()\ndone()").unwrap();
    let mut interp = host.interpreter();

    let result = interp.eval(&expr, &Default::default()).unwrap();
    assert!(matches!(result, ClosureValue(_)));
    assert!(log.borrow().is_empty());

    interp.apply(result, vec![NoneValue]).unwrap();
    assert_eq!(*log.borrow(), vec!["done"]);
}

#[test]
fn test_resume_is_repeatable() {
    let (host, log) = host_with_log();
    let definition =
        CapabilityDefinition::compile("name = receive('string')\nsay(name)\ncomplete(name)").unwrap();
    let state = suspended(definition.execute(&host).unwrap());

    let first = completed(state.resume(&host, StringValue("ada".into())).unwrap());
    let second = completed(state.resume(&host, StringValue("bob".into())).unwrap());

    assert_eq!(first, StringValue("ada".into()));
    assert_eq!(second, StringValue("bob".into()));
    assert_eq!(*log.borrow(), vec!["ada", "bob"]);
}

#[test]
fn test_curried_addition() {
    let (host, _) = host_with_log();
    let definition = CapabilityDefinition::compile("complete((lambda x: lambda y: add(x, y))(2)(3))").unwrap();
    assert_eq!(completed(definition.execute(&host).unwrap()), FloatValue(5.0));
}

#[test]
fn test_unbound_name_stops_before_siblings() {
    let (host, log) = host_with_log();
    let definition = CapabilityDefinition::compile("say(missing, f())").unwrap();
    match definition.execute(&host) {
        Err(Error::Runtime(RuntimeError::UnboundName(name))) => assert_eq!(name, "missing"),
        other => panic!("unexpected {:?}", other),
    }
    assert!(log.borrow().is_empty());
}

#[test]
fn test_natives_must_be_resupplied() {
    let (host, _) = host_with_log();
    let definition = CapabilityDefinition::compile("suspend()\ndone()").unwrap();
    let text = suspended(definition.execute(&host).unwrap()).persist().unwrap();

    let loaded = CapabilityExecutionState::load(text.as_str()).unwrap();
    match loaded.resume(&Host::default(), NoneValue) {
        Err(Error::Runtime(RuntimeError::UnboundName(name))) => assert_eq!(name, "done"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_persisting_native_binding_fails() {
    let (host, _) = host_with_log();
    let definition = CapabilityDefinition::compile("(lambda p, k: suspend(lambda _: p(1)))(say)").unwrap();
    let state = match definition.execute(&host).unwrap() {
        Outcome::Suspended(state) => state,
        other => panic!("unexpected {:?}", other),
    };
    match state.persist() {
        Err(SerializationError::NativeBinding(name)) => assert_eq!(name, "p"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_failed_resume_keeps_state() {
    let (host, _) = host_with_log();
    let definition = CapabilityDefinition::compile("x = receive('any')\ncomplete(x + 1)").unwrap();
    let state = suspended(definition.execute(&host).unwrap());
    let before = state.persist().unwrap();

    assert!(matches!(
        state.resume(&host, StringValue("one".into())),
        Err(Error::Runtime(RuntimeError::TypeMismatch { .. }))
    ));
    assert_eq!(state.persist().unwrap(), before);
    assert_eq!(completed(state.resume(&host, IntValue(1)).unwrap()), IntValue(2));
}

#[test]
fn test_captured_closure_survives_persistence() {
    let (host, _) = host_with_log();
    let src = "scale = receive('number')\n\
               f = (lambda n, k: k(lambda v: v * n))(scale)\n\
               x = receive('number')\n\
               complete(f(x))";
    let definition = CapabilityDefinition::compile(src).unwrap();
    let first = suspended(definition.execute(&host).unwrap());
    let live = suspended(first.resume(&host, IntValue(3)).unwrap());

    let text = live.persist().unwrap();
    assert!(text.contains(r#""environment":{"f":{"Closure":{"id":0}}}"#));
    assert!(text.contains(r#""closures":[{"source":"lambda v: (v * n)","environment":{"n":{"Int":3}}}]"#));
    let loaded = CapabilityExecutionState::load(text.as_str()).unwrap();

    assert_eq!(completed(live.resume(&host, IntValue(4)).unwrap()), IntValue(12));
    assert_eq!(completed(loaded.resume(&host, IntValue(4)).unwrap()), IntValue(12));
}

#[test]
fn test_record_grows_linearly_with_shared_closures() {
    // every step reads the two before it
    let steps = 24;
    let mut src = String::from("x0 = (lambda v, k: k(v))(lambda: 1)\nx1 = (lambda v, k: k(v))(lambda: 1)\n");
    for i in 2..steps {
        src.push_str(format!("x{} = (lambda v, k: k(v))(lambda: x{}() + x{}())\n", i, i - 1, i - 2).as_str());
    }
    src.push_str(format!("suspend()\ncomplete(x{}())", steps - 1).as_str());

    let (host, _) = host_with_log();
    let definition = CapabilityDefinition::compile(src.as_str()).unwrap();
    let state = suspended(definition.execute(&host).unwrap());

    let text = state.persist().unwrap();
    assert!(text.len() < steps * 160, "record is {} bytes", text.len());

    let loaded = CapabilityExecutionState::load(text.as_str()).unwrap();
    assert_eq!(loaded.persist().unwrap(), text);
    assert_eq!(completed(loaded.resume(&host, NoneValue).unwrap()), IntValue(46368));
}

#[test]
fn test_long_chain_completes_on_default_stack() {
    let (host, log) = host_with_log();
    let src = vec!["f()"; 490].join("\n");
    let definition = CapabilityDefinition::compile(src.as_str()).unwrap();
    assert_eq!(completed(definition.execute(&host).unwrap()), NoneValue);
    assert_eq!(log.borrow().len(), 490);

    let too_long = vec!["f()"; 600].join("\n");
    let definition = CapabilityDefinition::compile(too_long.as_str()).unwrap();
    assert!(matches!(
        definition.execute(&host),
        Err(Error::Runtime(RuntimeError::RecursionLimit(1000)))
    ));
}
