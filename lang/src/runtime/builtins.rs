use crate::{
    ffi::{native_arg, NativeError, NativeRegistry},
    runtime::{
        pattern::MessagePattern,
        Closure,
        Value::{AwaitingValue, ClosureValue, NoneValue},
    },
    syntax::tree::COMPLETE,
};
use std::rc::Rc;

pub struct Builtins {}

impl Builtins {
    pub fn init(registry: &mut NativeRegistry) {
        // terminal marker: yields its first argument, and drops the
        // continuation appended when it is written as a statement itself
        registry.register(COMPLETE, None, |_, args| {
            Ok(args.into_iter().next().unwrap_or(NoneValue))
        });

        registry.register("suspend", Some(1), |_, mut args| {
            let k: Rc<Closure> = native_arg("suspend", 0, args.remove(0))?;
            Ok(ClosureValue(k))
        });

        registry.register("receive", Some(2), |_, args| {
            let mut args = args.into_iter();
            let shape: String = native_arg("receive", 0, args.next().unwrap_or(NoneValue))?;
            let k: Rc<Closure> = native_arg("receive", 1, args.next().unwrap_or(NoneValue))?;
            let pattern = MessagePattern::from_name(shape.as_str()).ok_or_else(|| {
                NativeError::CustomError(format!("unknown message shape '{}'", shape))
            })?;
            Ok(AwaitingValue(k, pattern))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        runtime::{env::Env, eval::Interpreter, RuntimeError, Value::IntValue},
        syntax::parse::CapParser,
    };
    use pretty_assertions::assert_eq;

    fn eval(src: &str) -> Result<crate::runtime::Value, RuntimeError> {
        let expr = CapParser::expr(src).unwrap();
        Interpreter::new(Rc::new(NativeRegistry::with_builtins())).eval(&expr, &Env::new())
    }

    #[test]
    fn test_complete() {
        assert_eq!(eval("complete()").unwrap(), NoneValue);
        assert_eq!(eval("complete(3)").unwrap(), IntValue(3));
        assert_eq!(eval("complete(3, lambda _: complete())").unwrap(), IntValue(3));
    }

    #[test]
    fn test_suspend_requires_function() {
        assert!(matches!(
            eval("suspend(1)"),
            Err(RuntimeError::Native(NativeError::ArgTypeMismatch { index: 0, .. }))
        ));
        assert!(matches!(eval("suspend(lambda _: 1)"), Ok(ClosureValue(_))));
    }

    #[test]
    fn test_receive_shapes() {
        match eval("receive('number', lambda n: n)") {
            Ok(AwaitingValue(_, pattern)) => assert_eq!(pattern, MessagePattern::Number),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            eval("receive('dict', lambda n: n)"),
            Err(RuntimeError::Native(NativeError::CustomError(_)))
        ));
    }
}
