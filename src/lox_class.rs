use std::{collections::HashMap, rc::Rc};

use crate::{
    Result,
    interpreter::{Interpreter, environment::rc_cell},
    lox_callable::LoxCallable as _,
    lox_function::LoxFunction,
    lox_instance::LoxInstance,
    object::Object,
};

pub struct LoxClass {
    pub name: String,
    superclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, LoxFunction>,
}

impl LoxClass {
    pub fn new(name: String, superclass: Option<Rc<LoxClass>>, methods: HashMap<String, LoxFunction>) -> Self {
        Self {
            name,
            superclass,
            methods,
        }
    }

    pub fn find_method(&self, name: &str) -> Option<LoxFunction> {
        match self.methods.get(name) {
            Some(method) => Some(method.clone()),
            None => self.superclass.as_ref().and_then(|superclass| superclass.find_method(name)),
        }
    }

    /// A class's arity is its initializer's, or zero without one.
    pub fn arity(&self) -> u8 {
        self.find_method("init").map(|initializer| initializer.arity()).unwrap_or(0)
    }

    /// Calling a class builds an instance and runs `init` against it when
    /// the class chain has one. Takes the `Rc` rather than `&self` because
    /// the new instance needs to hold its class.
    pub fn construct(class: &Rc<LoxClass>, interpreter: &mut Interpreter, arguments: Vec<Object>) -> Result<Object> {
        let instance = rc_cell(LoxInstance::new(Rc::clone(class)));
        if let Some(initializer) = class.find_method("init") {
            initializer.bind(instance.clone()).call(interpreter, arguments)?;
        }
        Ok(Object::Instance(instance))
    }
}

impl std::fmt::Debug for LoxClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoxClass")
            .field("name", &self.name)
            .field("superclass", &self.superclass.as_ref().map(|s| &s.name))
            .finish_non_exhaustive()
    }
}

impl std::fmt::Display for LoxClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
