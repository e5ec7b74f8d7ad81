use std::rc::Rc;

use crate::{
    LoxError, Result,
    interpreter::{
        Interpreter,
        environment::{Environment, RcCell, rc_cell},
    },
    lox_callable::LoxCallable,
    lox_instance::LoxInstance,
    object::{Literal, Object},
    stmt::Function,
};

#[derive(Clone)]
pub struct LoxFunction {
    declaration: Rc<Function>,
    closure: RcCell<Environment>,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(declaration: Rc<Function>, closure: RcCell<Environment>, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    /// Produce a copy of this method whose closure sees `this` as the given
    /// instance.
    pub fn bind(&self, instance: RcCell<LoxInstance>) -> LoxFunction {
        let mut environment = Environment::with_enclosing(self.closure.clone());
        environment.define("this".to_string(), Object::Instance(instance));
        LoxFunction::new(Rc::clone(&self.declaration), rc_cell(environment), self.is_initializer)
    }
}

impl std::fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Closures point back into the environment chain, so a derived
        // Debug could recurse forever.
        f.debug_struct("LoxFunction")
            .field("name", &self.declaration.name.lexeme)
            .field("is_initializer", &self.is_initializer)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<fn {}>", self.declaration.name.lexeme)
    }
}

impl LoxCallable for LoxFunction {
    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Object>) -> Result<Object> {
        let mut environment = Environment::with_enclosing(self.closure.clone());
        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            environment.define(param.lexeme.clone(), argument);
        }

        match interpreter.execute_block(&self.declaration.body, environment) {
            Err(LoxError::Return { value }) => {
                if self.is_initializer {
                    // `return;` in an initializer still yields the instance
                    self.closure.borrow().get_at(0, "this")
                } else {
                    Ok(value)
                }
            }
            Err(other) => Err(other),
            Ok(()) => {
                if self.is_initializer {
                    self.closure.borrow().get_at(0, "this")
                } else {
                    Ok(Object::Literal(Literal::Null))
                }
            }
        }
    }

    fn arity(&self) -> u8 {
        self.declaration.params.len() as u8
    }

    fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }
}
