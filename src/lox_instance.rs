use std::{collections::HashMap, rc::Rc};

use crate::{
    LoxError, Result, interpreter::environment::RcCell, lox_class::LoxClass, object::Object, token::Token,
};

pub struct LoxInstance {
    class: Rc<LoxClass>,
    fields: HashMap<String, Object>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }

    /// Fields shadow methods; a found method comes back bound to this
    /// instance. Takes the `RcCell` rather than `&self` because binding
    /// stores the instance in the method's closure.
    pub fn get(instance: &RcCell<LoxInstance>, name: &Token) -> Result<Object> {
        if let Some(field) = instance.borrow().fields.get(&name.lexeme) {
            return Ok(field.clone());
        }

        let method = instance.borrow().class.find_method(&name.lexeme);
        match method {
            Some(method) => Ok(Object::Callable(Rc::new(method.bind(instance.clone())))),
            None => Err(LoxError::Runtime {
                message: format!("Undefined property '{}'.", name.lexeme),
                line: Some(name.line),
            }),
        }
    }

    pub fn set(&mut self, name: &Token, value: Object) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}

impl std::fmt::Debug for LoxInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Fields can refer back to this instance, so a derived Debug could
        // recurse forever.
        f.debug_struct("LoxInstance").field("class", &self.class.name).finish_non_exhaustive()
    }
}

impl std::fmt::Display for LoxInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} instance", self.class)
    }
}
