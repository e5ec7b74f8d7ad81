use std::collections::HashMap;

use snafu::whatever;
use tracing::trace;

use super::Interpreter;
use crate::{
    LoxError, Result,
    expr::{self, Expr, ExprId},
    stmt::{self, Stmt},
    token::Token,
};

/// Walks the statement list once before execution, recording for every
/// variable reference how many environment hops away its binding lives.
/// Also diagnoses the handful of errors that are visible statically.
pub struct Resolver<'a> {
    interpreter: &'a mut Interpreter,
    scopes: Vec<HashMap<String, bool>>,
    curr_fn: FunctionType,
    curr_class: ClassType,
    errors: Vec<LoxError>,
}

#[derive(Clone, Copy)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Clone, Copy)]
enum ClassType {
    None,
    Class,
    Subclass,
}

impl<'a> Resolver<'a> {
    pub fn new(interpreter: &'a mut Interpreter) -> Self {
        Self {
            interpreter,
            scopes: vec![],
            curr_fn: FunctionType::None,
            curr_class: ClassType::None,
            errors: vec![],
        }
    }

    pub fn resolve_all(&mut self, statements: &[Stmt]) -> Result<()> {
        self.resolve_stmts(statements);

        if self.errors.is_empty() {
            return Ok(());
        }
        for error in &self.errors {
            eprintln!("{error}");
        }
        whatever!("One or more errors during static analysis")
    }

    /// Diagnostics are collected, not thrown: the pass always runs to the
    /// end of the input so one bad statement doesn't hide the next error.
    fn error(&mut self, token: &Token, message: &str) {
        self.errors.push(LoxError::at_token(token, message));
    }
}

// Statements
impl Resolver<'_> {
    fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_stmt(statement);
        }
    }

    fn resolve_stmt(&mut self, statement: &Stmt) {
        trace!(?statement, "Resolving statement");
        match statement {
            Stmt::Var(var) => {
                self.declare(&var.name);
                if let Some(initializer) = &var.initializer {
                    self.resolve_expr(initializer);
                }
                self.define(&var.name);
            }
            Stmt::Function(func) => {
                self.declare(&func.name);
                self.define(&func.name);

                self.resolve_func(func, FunctionType::Function);
            }
            Stmt::Expression(expr) => self.resolve_expr(&expr.expression),
            Stmt::If(stmt) => {
                self.resolve_expr(&stmt.condition);
                self.resolve_stmt(&stmt.then_branch);
                if let Some(else_branch) = &stmt.else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::Print(stmt) => {
                self.resolve_expr(&stmt.expression);
            }
            Stmt::Return(stmt) => {
                if let FunctionType::None = self.curr_fn {
                    self.error(&stmt.keyword, "Can't return from top-level code.");
                }
                if let Some(value) = &stmt.value {
                    if let FunctionType::Initializer = self.curr_fn {
                        self.error(&stmt.keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(value);
                }
            }
            Stmt::While(stmt) => {
                self.resolve_expr(&stmt.condition);
                self.resolve_stmt(&stmt.body);
            }
            Stmt::Block(block) => {
                self.begin_scope();
                self.resolve_stmts(&block.statements);
                self.end_scope();
            }
            Stmt::Class(stmt) => self.resolve_class(stmt),
        }
    }

    fn resolve_class(&mut self, stmt: &stmt::Class) {
        let enclosing_class = self.curr_class;
        self.curr_class = ClassType::Class;

        self.declare(&stmt.name);
        self.define(&stmt.name);

        if let Some(superclass) = &stmt.superclass {
            if superclass.name.lexeme == stmt.name.lexeme {
                self.error(&superclass.name, "A class can't inherit from itself.");
            }
            self.curr_class = ClassType::Subclass;
            self.resolve_variable(superclass);

            // Methods of a subclass close over one extra scope holding `super`
            self.begin_scope();
            self.define_keyword("super");
        }

        self.begin_scope();
        self.define_keyword("this");

        for method in &stmt.methods {
            let declaration = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_func(method, declaration);
        }

        self.end_scope();

        if stmt.superclass.is_some() {
            self.end_scope();
        }

        self.curr_class = enclosing_class;
    }

    fn resolve_func(&mut self, func: &stmt::Function, typ: FunctionType) {
        let enclosing_fn = self.curr_fn;
        self.curr_fn = typ;
        self.begin_scope();
        for param in &func.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(&func.body);
        self.end_scope();
        self.curr_fn = enclosing_fn;
    }
}

// Expressions
impl Resolver<'_> {
    fn resolve_expr(&mut self, expr: &Expr) {
        trace!(?expr, "Resolving expression");
        match expr {
            Expr::Variable(var) => {
                self.resolve_variable(var);
            }
            Expr::Assign(assign) => {
                self.resolve_expr(&assign.value);
                self.resolve_local(assign.id, &assign.name);
            }
            Expr::Binary(binary) => {
                self.resolve_expr(&binary.left);
                self.resolve_expr(&binary.right);
            }
            Expr::Call(call) => {
                self.resolve_expr(&call.callee);
                for arg in call.arguments.iter() {
                    self.resolve_expr(arg);
                }
            }
            Expr::Get(get) => {
                // Properties are looked up dynamically; only the object
                // expression resolves statically
                self.resolve_expr(&get.object);
            }
            Expr::Grouping(group) => {
                self.resolve_expr(&group.expression);
            }
            Expr::Literal(_) => (),
            Expr::Logical(logic) => {
                self.resolve_expr(&logic.left);
                self.resolve_expr(&logic.right);
            }
            Expr::Unary(unary) => self.resolve_expr(&unary.right),
            Expr::Set(set) => {
                self.resolve_expr(&set.value);
                self.resolve_expr(&set.object);
            }
            Expr::This(this) => {
                if let ClassType::None = self.curr_class {
                    self.error(&this.keyword, "Can't use 'this' outside of a class.");
                    return;
                }
                self.resolve_local(this.id, &this.keyword);
            }
            Expr::Super(sup) => {
                match self.curr_class {
                    ClassType::None => self.error(&sup.keyword, "Can't use 'super' outside of a class."),
                    ClassType::Class => {
                        self.error(&sup.keyword, "Can't use 'super' in a class with no superclass.")
                    }
                    ClassType::Subclass => (),
                }
                self.resolve_local(sup.id, &sup.keyword);
            }
        }
    }

    fn resolve_variable(&mut self, var: &expr::Variable) {
        if let Some(peeked) = self.scopes.last() {
            if peeked.get(&var.name.lexeme) == Some(&false) {
                self.error(&var.name, "Can't read local variable in its own initializer.");
            }
        }

        self.resolve_local(var.id, &var.name);
    }
}

// Helpers
impl Resolver<'_> {
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        if self.scopes.pop().is_none() {
            self.errors.push(LoxError::Internal {
                message: "Ended a scope when there was no stack".to_string(),
            });
        }
    }

    /// Declared but not yet defined: the name is reserved while its
    /// initializer resolves, which is what catches `var a = a;`.
    fn declare(&mut self, name: &Token) {
        if self.scopes.is_empty() {
            // The global scope tolerates redeclaration
            return;
        }

        let already_declared = self.scopes.last().is_some_and(|scope| scope.contains_key(&name.lexeme));
        if already_declared {
            self.error(name, "Already a variable with this name in this scope.");
        }
        if let Some(peeked) = self.scopes.last_mut() {
            peeked.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(peeked) = self.scopes.last_mut() {
            peeked.insert(name.lexeme.clone(), true);
        }
    }

    /// `this` and `super` are bound by the evaluator, not by user code, so
    /// they go straight to defined.
    fn define_keyword(&mut self, name: &str) {
        if let Some(peeked) = self.scopes.last_mut() {
            peeked.insert(name.to_string(), true);
        }
    }

    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (hops, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                trace!(name = %name.lexeme, depth = hops, "resolved local");
                self.interpreter.resolve(id, hops);
                return;
            }
        }
        // Not on the stack at all: a global, left for runtime lookup
    }
}
