use std::{
    cell::RefCell,
    collections::{HashMap, hash_map::Entry},
    rc::Rc,
};

use tracing::trace;

use crate::{LoxError, Result, object::Object, token::Token};

pub type RcCell<T> = Rc<RefCell<T>>;

pub fn rc_cell<T>(value: T) -> RcCell<T> {
    Rc::new(RefCell::new(value))
}

/// One link of the lexical scope chain. Closures and blocks alias their
/// enclosing environment, they never copy it.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Object>,
    enclosing: Option<RcCell<Environment>>,
}

impl Environment {
    pub fn new() -> Environment {
        Self::default()
    }

    pub fn with_enclosing(enclosing: RcCell<Environment>) -> Environment {
        Self {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    pub fn define(&mut self, name: String, value: Object) {
        trace!(?name, ?value, "defining");
        self.values.insert(name, value);
    }

    pub fn assign(&mut self, name: &Token, value: Object) -> Result<()> {
        match self.values.entry(name.lexeme.clone()) {
            Entry::Occupied(mut entry) => {
                entry.insert(value);
                Ok(())
            }
            Entry::Vacant(_) => match &self.enclosing {
                Some(outer) => outer.borrow_mut().assign(name, value),
                None => Err(LoxError::Runtime {
                    message: format!("Undefined variable '{}'.", name.lexeme),
                    line: Some(name.line),
                }),
            },
        }
    }

    pub fn get(&self, name: &Token) -> Result<Object> {
        match self.values.get(&name.lexeme) {
            Some(val) => Ok(val.clone()),
            None => match &self.enclosing {
                Some(outer) => outer.borrow().get(name),
                None => Err(LoxError::Runtime {
                    message: format!("Undefined variable '{}'.", name.lexeme),
                    line: Some(name.line),
                }),
            },
        }
    }

    /// Read at exactly `distance` hops. The resolver guarantees the name is
    /// there; a miss is a bug in this crate, not the user's program.
    pub fn get_at(&self, distance: usize, key: &str) -> Result<Object> {
        if distance == 0 {
            return self.values.get(key).cloned().ok_or_else(|| LoxError::Internal {
                message: format!("Expected variable '{key}' at distance {distance}"),
            });
        }
        match &self.enclosing {
            Some(outer) => outer.borrow().get_at(distance - 1, key),
            None => Err(LoxError::Internal {
                message: format!("Ran out of enclosing scopes while looking for '{key}'"),
            }),
        }
    }

    pub fn assign_at(&mut self, distance: usize, name: &Token, value: Object) -> Result<()> {
        trace!(distance, name = %name.lexeme, ?value, "assigning to scope ancestor");
        if distance == 0 {
            self.values.insert(name.lexeme.clone(), value);
            return Ok(());
        }
        match &self.enclosing {
            Some(outer) => outer.borrow_mut().assign_at(distance - 1, name, value),
            None => Err(LoxError::Internal {
                message: format!("Ran out of enclosing scopes while assigning '{}'", name.lexeme),
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::token_type::TokenType;

    fn name(text: &str) -> Token {
        Token::new(TokenType::Identifier, text, ().into(), 1)
    }

    #[test]
    fn get_walks_the_chain() {
        let global = rc_cell(Environment::new());
        global.borrow_mut().define("a".to_string(), Object::from(1.0));
        let inner = Environment::with_enclosing(global.clone());
        assert_eq!(inner.get(&name("a")).unwrap(), Object::from(1.0));
    }

    #[test]
    fn define_shadows_without_overwriting() {
        let global = rc_cell(Environment::new());
        global.borrow_mut().define("a".to_string(), Object::from(1.0));
        let mut inner = Environment::with_enclosing(global.clone());
        inner.define("a".to_string(), Object::from(2.0));
        assert_eq!(inner.get(&name("a")).unwrap(), Object::from(2.0));
        assert_eq!(global.borrow().get(&name("a")).unwrap(), Object::from(1.0));
    }

    #[test]
    fn assign_updates_the_defining_scope() {
        let global = rc_cell(Environment::new());
        global.borrow_mut().define("a".to_string(), Object::from(1.0));
        let mut inner = Environment::with_enclosing(global.clone());
        inner.assign(&name("a"), Object::from(2.0)).unwrap();
        assert_eq!(global.borrow().get(&name("a")).unwrap(), Object::from(2.0));
    }

    #[test]
    fn assign_to_undefined_is_an_error() {
        let mut global = Environment::new();
        let err = global.assign(&name("missing"), Object::from(1.0)).unwrap_err();
        assert_eq!(err.to_string(), "Undefined variable 'missing'.\n[line 1]");
    }

    #[test]
    fn get_at_reads_exactly_that_distance() {
        let global = rc_cell(Environment::new());
        global.borrow_mut().define("a".to_string(), Object::from(1.0));
        let middle = rc_cell(Environment::with_enclosing(global));
        middle.borrow_mut().define("a".to_string(), Object::from(2.0));
        let inner = Environment::with_enclosing(middle);

        assert_eq!(inner.get_at(1, "a").unwrap(), Object::from(2.0));
        assert_eq!(inner.get_at(2, "a").unwrap(), Object::from(1.0));
        assert!(inner.get_at(0, "a").is_err());
    }
}
