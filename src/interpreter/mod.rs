pub mod environment;
pub mod resolver;

use std::{cell::RefCell, collections::HashMap, io::Write, rc::Rc};

use environment::{Environment, RcCell, rc_cell};
use tracing::{instrument, trace};

use super::{LoxError, Result};
use crate::{
    expr::{self, Expr, ExprId},
    lox_callable::LoxCallable as _,
    lox_class::LoxClass,
    lox_function::LoxFunction,
    lox_instance::LoxInstance,
    native::clock::LoxClock,
    object::{Literal, Object},
    stmt::{self, Stmt},
    token::Token,
    token_type::TokenType,
};

pub struct Interpreter {
    environment: RcCell<Environment>,
    pub globals: RcCell<Environment>,
    /// Side table filled in by the resolver: how many environment hops from
    /// a reference's evaluation site to the scope that binds it.
    locals: HashMap<ExprId, usize>,
    output: RcCell<dyn Write>,
    /// In the REPL, a lone expression statement echoes its value.
    pub repl: bool,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Interpreter {
        Self::with_output(Rc::new(RefCell::new(std::io::stdout())))
    }

    pub fn with_output(output: RcCell<dyn Write>) -> Interpreter {
        let globals = rc_cell(Environment::new());
        globals.borrow_mut().define("clock".to_string(), Object::Callable(Rc::new(LoxClock {})));
        Self {
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
            output,
            repl: false,
        }
    }

    /// Called by the resolver for every reference it can place statically.
    pub fn resolve(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    #[instrument(skip(self, statements), err, level = "trace")]
    pub fn interpret(&mut self, statements: Vec<Stmt>) -> Result<()> {
        if self.repl {
            if let [Stmt::Expression(stmt)] = statements.as_slice() {
                let value = self.evaluate(&stmt.expression)?;
                return writeln!(self.output.borrow_mut(), "{value}").map_err(|source| LoxError::Io { source });
            }
        }
        for statement in statements {
            self.execute(&statement)?;
        }
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Print(stmt) => self.execute_print_stmt(stmt),
            Stmt::Block(stmt) => {
                self.execute_block(&stmt.statements, Environment::with_enclosing(self.environment.clone()))
            }
            Stmt::Expression(stmt) => self.evaluate(&stmt.expression).map(|_| ()),
            Stmt::Var(stmt) => self.execute_var_stmt(stmt),
            Stmt::If(stmt) => self.execute_if_stmt(stmt),
            Stmt::While(stmt) => self.execute_while_stmt(stmt),
            Stmt::Function(stmt) => self.execute_fn_stmt(stmt),
            Stmt::Return(stmt) => self.execute_return_stmt(stmt),
            Stmt::Class(stmt) => self.execute_class_stmt(stmt),
        }
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Object> {
        match expr {
            Expr::Binary(expr) => self.eval_binary(expr),
            Expr::Logical(expr) => self.eval_logical(expr),
            Expr::Grouping(expr) => self.eval_grouping(expr),
            Expr::Literal(expr) => self.eval_literal(expr),
            Expr::Unary(expr) => self.eval_unary(expr),
            Expr::Variable(expr) => self.eval_variable(expr),
            Expr::Assign(expr) => self.eval_assign(expr),
            Expr::Call(expr) => self.eval_call(expr),
            Expr::Get(expr) => self.eval_get(expr),
            Expr::Set(expr) => self.eval_set(expr),
            Expr::This(expr) => self.eval_this(expr),
            Expr::Super(expr) => self.eval_super(expr),
        }
    }

    /// Runs `statements` with `environment` installed as the current scope,
    /// restoring the previous scope on every exit path, including `return`
    /// unwinds and runtime errors.
    pub fn execute_block(&mut self, statements: &[Stmt], environment: Environment) -> Result<()> {
        let previous = std::mem::replace(&mut self.environment, rc_cell(environment));
        let result = statements.iter().try_for_each(|statement| self.execute(statement));
        self.environment = previous;
        result
    }
}

// Statements
impl Interpreter {
    fn execute_print_stmt(&mut self, stmt: &stmt::Print) -> Result<()> {
        let value = self.evaluate(&stmt.expression)?;
        writeln!(self.output.borrow_mut(), "{value}").map_err(|source| LoxError::Io { source })
    }

    fn execute_var_stmt(&mut self, stmt: &stmt::Var) -> Result<()> {
        let value = match &stmt.initializer {
            Some(init) => self.evaluate(init)?,
            None => Object::Literal(Literal::Null),
        };

        self.environment.borrow_mut().define(stmt.name.lexeme.clone(), value);
        Ok(())
    }

    fn execute_if_stmt(&mut self, stmt: &stmt::If) -> Result<()> {
        let res = self.evaluate(&stmt.condition)?;
        if res.is_truthy() {
            self.execute(&stmt.then_branch)?;
        } else if let Some(ref eb) = stmt.else_branch {
            self.execute(eb)?;
        }

        Ok(())
    }

    fn execute_while_stmt(&mut self, stmt: &stmt::While) -> Result<()> {
        let mut res = self.evaluate(&stmt.condition)?;
        while res.is_truthy() {
            self.execute(&stmt.body)?;
            res = self.evaluate(&stmt.condition)?;
        }

        Ok(())
    }

    fn execute_fn_stmt(&mut self, stmt: &Rc<stmt::Function>) -> Result<()> {
        let function = LoxFunction::new(Rc::clone(stmt), self.environment.clone(), false);
        self.environment
            .borrow_mut()
            .define(stmt.name.lexeme.clone(), Object::Callable(Rc::new(function)));
        Ok(())
    }

    fn execute_return_stmt(&mut self, stmt: &stmt::Return) -> Result<()> {
        let value = match &stmt.value {
            Some(value) => self.evaluate(value)?,
            None => Object::Literal(Literal::Null),
        };
        // Unwinds to the nearest call boundary, which turns it back into an
        // ordinary value
        Err(LoxError::Return { value })
    }

    fn execute_class_stmt(&mut self, stmt: &stmt::Class) -> Result<()> {
        let superclass = match &stmt.superclass {
            Some(superclass) => match self.eval_variable(superclass)? {
                Object::Class(class) => Some(class),
                _ => {
                    return Err(runtime_error(&superclass.name, "Superclass must be a class."));
                }
            },
            None => None,
        };

        // Reserve the name first so methods can refer to the class itself
        self.environment
            .borrow_mut()
            .define(stmt.name.lexeme.clone(), Object::Literal(Literal::Null));

        let enclosing = superclass.as_ref().map(|superclass| {
            let previous = self.environment.clone();
            let mut super_env = Environment::with_enclosing(previous.clone());
            super_env.define("super".to_string(), Object::Class(Rc::clone(superclass)));
            self.environment = rc_cell(super_env);
            previous
        });

        let mut methods = HashMap::new();
        for method in &stmt.methods {
            let is_initializer = method.name.lexeme == "init";
            let function = LoxFunction::new(Rc::clone(method), self.environment.clone(), is_initializer);
            // Duplicate names within one body: last definition wins
            methods.insert(method.name.lexeme.clone(), function);
        }

        let class = Object::Class(Rc::new(LoxClass::new(stmt.name.lexeme.clone(), superclass, methods)));

        if let Some(previous) = enclosing {
            self.environment = previous;
        }

        self.environment.borrow_mut().assign(&stmt.name, class)
    }
}

// Expressions
impl Interpreter {
    fn eval_binary(&mut self, expr: &expr::Binary) -> Result<Object> {
        let left = self.evaluate(&expr.left)?;
        let right = self.evaluate(&expr.right)?;

        let obj = match expr.operator.typ {
            TokenType::Greater => {
                let (l, r) = Object::into_numbers(left, right).map_err(|e| e.into_lox(&expr.operator))?;
                (l > r).into()
            }
            TokenType::GreaterEqual => {
                let (l, r) = Object::into_numbers(left, right).map_err(|e| e.into_lox(&expr.operator))?;
                (l >= r).into()
            }
            TokenType::Less => {
                let (l, r) = Object::into_numbers(left, right).map_err(|e| e.into_lox(&expr.operator))?;
                (l < r).into()
            }
            TokenType::LessEqual => {
                let (l, r) = Object::into_numbers(left, right).map_err(|e| e.into_lox(&expr.operator))?;
                (l <= r).into()
            }
            TokenType::Minus => (left - right).map_err(|e| e.into_lox(&expr.operator))?,
            TokenType::Plus => (left + right).map_err(|e| e.into_lox(&expr.operator))?,
            TokenType::Slash => (left / right).map_err(|e| e.into_lox(&expr.operator))?,
            TokenType::Star => (left * right).map_err(|e| e.into_lox(&expr.operator))?,
            TokenType::EqualEqual => (left == right).into(),
            TokenType::BangEqual => (left != right).into(),
            _ => {
                return Err(LoxError::Internal {
                    message: format!("Token '{}' is not a binary operator", expr.operator.lexeme),
                });
            }
        };

        Ok(obj)
    }

    fn eval_logical(&mut self, expr: &expr::Logical) -> Result<Object> {
        let left = self.evaluate(&expr.left)?;

        // Short-circuit, yielding the deciding operand itself
        let truthy_left = left.is_truthy();
        match (&expr.operator.typ, truthy_left) {
            (&TokenType::Or, true) | (&TokenType::And, false) => Ok(left),
            _ => self.evaluate(&expr.right),
        }
    }

    fn eval_grouping(&mut self, expr: &expr::Grouping) -> Result<Object> {
        self.evaluate(&expr.expression)
    }

    fn eval_literal(&mut self, expr: &expr::Literal) -> Result<Object> {
        Ok(Object::Literal(expr.value.clone()))
    }

    fn eval_unary(&mut self, expr: &expr::Unary) -> Result<Object> {
        let right = self.evaluate(&expr.right)?;
        let obj = match expr.operator.typ {
            TokenType::Minus => {
                let n = right.into_number().map_err(|e| e.into_lox(&expr.operator))?;
                Object::from(-n)
            }
            TokenType::Bang => (!right.is_truthy()).into(),
            _ => {
                return Err(LoxError::Internal {
                    message: format!("Token '{}' is not a unary operator", expr.operator.lexeme),
                });
            }
        };

        Ok(obj)
    }

    fn eval_variable(&mut self, expr: &expr::Variable) -> Result<Object> {
        self.look_up_variable(&expr.name, expr.id)
    }

    fn eval_assign(&mut self, expr: &expr::Assign) -> Result<Object> {
        let value = self.evaluate(&expr.value)?;
        match self.locals.get(&expr.id) {
            Some(distance) => self.environment.borrow_mut().assign_at(*distance, &expr.name, value.clone())?,
            None => self.globals.borrow_mut().assign(&expr.name, value.clone())?,
        }
        Ok(value)
    }

    fn eval_call(&mut self, expr: &expr::Call) -> Result<Object> {
        let callee = self.evaluate(&expr.callee)?;
        let mut arguments = Vec::new();
        for argument in expr.arguments.iter() {
            arguments.push(self.evaluate(argument)?);
        }

        match callee {
            Object::Callable(function) => {
                self.check_arity(function.arity(), arguments.len(), &expr.paren)?;
                trace!(callee = function.name(), "calling function");
                function.call(self, arguments).map_err(|e| e.add_line(expr.paren.line))
            }
            Object::Class(class) => {
                self.check_arity(class.arity(), arguments.len(), &expr.paren)?;
                trace!(callee = %class.name, "constructing instance");
                LoxClass::construct(&class, self, arguments).map_err(|e| e.add_line(expr.paren.line))
            }
            _ => Err(runtime_error(&expr.paren, "Can only call functions and classes.")),
        }
    }

    fn eval_get(&mut self, expr: &expr::Get) -> Result<Object> {
        match self.evaluate(&expr.object)? {
            Object::Instance(instance) => LoxInstance::get(&instance, &expr.name),
            _ => Err(runtime_error(&expr.name, "Only instances have properties.")),
        }
    }

    fn eval_set(&mut self, expr: &expr::Set) -> Result<Object> {
        match self.evaluate(&expr.object)? {
            Object::Instance(instance) => {
                let value = self.evaluate(&expr.value)?;
                instance.borrow_mut().set(&expr.name, value.clone());
                Ok(value)
            }
            _ => Err(runtime_error(&expr.name, "Only instances have fields.")),
        }
    }

    fn eval_this(&mut self, expr: &expr::This) -> Result<Object> {
        self.look_up_variable(&expr.keyword, expr.id)
    }

    fn eval_super(&mut self, expr: &expr::Super) -> Result<Object> {
        let distance = self.locals.get(&expr.id).copied().ok_or_else(|| LoxError::Internal {
            message: "'super' expression was never resolved".to_string(),
        })?;

        let superclass = match self.environment.borrow().get_at(distance, "super")? {
            Object::Class(class) => class,
            other => {
                return Err(LoxError::Internal {
                    message: format!("Expected 'super' to be a class, found {other}"),
                });
            }
        };
        // The instance lives one scope inside the `super` binding
        let instance = match self.environment.borrow().get_at(distance - 1, "this")? {
            Object::Instance(instance) => instance,
            other => {
                return Err(LoxError::Internal {
                    message: format!("Expected 'this' to be an instance, found {other}"),
                });
            }
        };

        match superclass.find_method(&expr.method.lexeme) {
            Some(method) => Ok(Object::Callable(Rc::new(method.bind(instance)))),
            None => Err(runtime_error(&expr.method, &format!("Undefined property '{}'.", expr.method.lexeme))),
        }
    }
}

// Helpers
impl Interpreter {
    fn look_up_variable(&self, name: &Token, id: ExprId) -> Result<Object> {
        match self.locals.get(&id) {
            Some(distance) => self.environment.borrow().get_at(*distance, &name.lexeme),
            None => self.globals.borrow().get(name),
        }
    }

    fn check_arity(&self, arity: u8, found: usize, paren: &Token) -> Result<()> {
        if found != arity as usize {
            return Err(runtime_error(paren, &format!("Expected {arity} arguments but got {found}.")));
        }
        Ok(())
    }
}

fn runtime_error(token: &Token, message: &str) -> LoxError {
    LoxError::Runtime {
        message: message.to_string(),
        line: Some(token.line),
    }
}
