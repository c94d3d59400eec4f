//! Effectful natives the command line host offers to capabilities.

use lang::{
    ffi::{native_arg, NativeError, NativeRegistry},
    runtime::{
        Closure,
        Value::{self, ClosureValue, NoneValue, StringValue},
    },
};
use std::{
    io::{self, Write},
    rc::Rc,
};

/// Builtins plus `print` and `ask`.
pub fn registry() -> NativeRegistry {
    let mut registry = NativeRegistry::with_builtins();

    // print(values..., k): writes the values and continues with None
    registry.register("print", None, |interp, mut args| {
        let k = args
            .pop()
            .filter(Value::is_callable)
            .ok_or_else(|| NativeError::CustomError("print expects a continuation".to_owned()))?;
        let line = args.iter().map(display).collect::<Vec<_>>().join(" ");
        println!("{}", line);
        interp.apply(k, vec![NoneValue])
    });

    // ask(prompt, k): shows the prompt and suspends; the answer is the
    // message the capability is resumed with
    registry.register("ask", Some(2), |_, args| {
        let mut args = args.into_iter();
        let prompt: String = native_arg("ask", 0, args.next().unwrap_or(NoneValue))?;
        let k: Rc<Closure> = native_arg("ask", 1, args.next().unwrap_or(NoneValue))?;
        print!("{} ", prompt);
        let _ = io::stdout().flush();
        Ok(ClosureValue(k))
    });

    registry
}

/// Strings print without quotes, everything else in source form.
pub fn display(value: &Value) -> String {
    match value {
        StringValue(s) => s.clone(),
        other => other.to_string(),
    }
}
