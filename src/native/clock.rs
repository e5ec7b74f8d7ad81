use std::time::SystemTime;

use ordered_float::OrderedFloat;

use crate::{
    Result,
    interpreter::Interpreter,
    lox_callable::LoxCallable,
    object::{Literal, Object},
};

#[derive(Debug)]
pub struct LoxClock {}

impl std::fmt::Display for LoxClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<native fn>")
    }
}

impl LoxCallable for LoxClock {
    fn call(&self, _interpreter: &mut Interpreter, _arguments: Vec<Object>) -> Result<Object> {
        let seconds = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("Unix Epoch was a long damn time ago")
            .as_secs_f64();
        Ok(Object::Literal(Literal::Number(OrderedFloat(seconds))))
    }

    fn arity(&self) -> u8 {
        0
    }

    fn name(&self) -> &str {
        "clock"
    }
}
