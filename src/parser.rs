use std::rc::Rc;

use crate::{
    LoxError, Result,
    expr::{Assign, Binary, Call, Expr, Get, Grouping, Literal, Logical, Set, Super, This, Unary, Variable},
    stmt::{Block, Class, Expression, Function, If, Print, Return, Stmt, Var, While},
    token::Token,
    token_type::TokenType,
};

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    had_error: bool,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            had_error: false,
        }
    }

    /// Parses to the end of the input, recovering at statement boundaries.
    /// The salvaged statements come back even when some failed, so later
    /// passes can still analyze them; the flag says whether any failed.
    pub fn parse(&mut self) -> (Vec<Stmt>, bool) {
        let mut statements: Vec<Stmt> = Vec::new();
        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    self.report(e);
                    self.synchronize();
                }
            }
        }
        (statements, self.had_error)
    }

    /// A non-fatal diagnostic: printed, remembered, parsing goes on.
    fn report(&mut self, error: LoxError) {
        self.had_error = true;
        eprintln!("{error}");
    }
}

// Declarations
impl Parser {
    fn declaration(&mut self) -> Result<Stmt> {
        if self.match_advance(&[TokenType::Class]) {
            self.class_declaration()
        } else if self.match_advance(&[TokenType::Fun]) {
            Ok(Stmt::Function(self.function("function")?))
        } else if self.match_advance(&[TokenType::Var]) {
            self.var_declaration()
        } else {
            self.statement()
        }
    }

    fn class_declaration(&mut self) -> Result<Stmt> {
        let name = self.consume(TokenType::Identifier, "Expect class name.")?;

        let superclass = if self.match_advance(&[TokenType::Less]) {
            let superclass = self.consume(TokenType::Identifier, "Expect superclass name.")?;
            Some(Variable::new(superclass))
        } else {
            None
        };

        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;

        Ok(Class::stmt(name, superclass, methods))
    }

    fn function(&mut self, kind: &str) -> Result<Rc<Function>> {
        let name = self.consume(TokenType::Identifier, &format!("Expect {kind} name."))?;
        self.consume(TokenType::LeftParen, &format!("Expect '(' after {kind} name."))?;

        let mut params = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                if params.len() >= 255 {
                    let err = error(self.peek(), "Can't have more than 255 parameters.");
                    self.report(err);
                }
                params.push(self.consume(TokenType::Identifier, "Expect parameter name.")?);
                if !self.match_advance(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;

        self.consume(TokenType::LeftBrace, &format!("Expect '{{' before {kind} body."))?;
        let body = self.block()?;

        Ok(Rc::new(Function { name, params, body }))
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let name = self.consume(TokenType::Identifier, "Expect variable name.")?;
        let initializer = if self.match_advance(&[TokenType::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::Semicolon, "Expect ';' after variable declaration.")?;

        Ok(Var::stmt(name, initializer))
    }
}

// Statements
impl Parser {
    fn statement(&mut self) -> Result<Stmt> {
        if self.match_advance(&[TokenType::Print]) {
            return self.print_statement();
        }
        if self.match_advance(&[TokenType::Return]) {
            return self.return_statement();
        }
        if self.match_advance(&[TokenType::While]) {
            return self.while_statement();
        }
        if self.match_advance(&[TokenType::LeftBrace]) {
            return Ok(Block::stmt(self.block()?));
        }
        if self.match_advance(&[TokenType::If]) {
            return self.if_statement();
        }
        if self.match_advance(&[TokenType::For]) {
            return self.for_statement();
        }
        self.expression_statement()
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        let value = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value.")?;
        Ok(Print::stmt(value))
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let keyword = self.previous();
        let value = if !self.check(&TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;

        Ok(Return::stmt(keyword, value))
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;
        let body = self.statement()?;

        Ok(While::stmt(condition, body))
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;

        let then_branch = self.statement()?;
        let else_branch = if self.match_advance(&[TokenType::Else]) {
            Some(self.statement()?)
        } else {
            None
        };

        Ok(If::stmt(condition, then_branch, else_branch))
    }

    /// De-sugar a for statement into a while statement
    fn for_statement(&mut self) -> Result<Stmt> {
        /* for (var i = 0; i < 10; i = i + 1) {
         *    print i;
         *  }
         */
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;
        // `var i = 0;`, could also be empty, or just an expression which
        // we'd treat as a statement to keep things tidy
        let initializer = match self.peek().typ {
            TokenType::Semicolon => {
                self.advance();
                None
            }
            TokenType::Var => {
                self.advance();
                Some(self.var_declaration()?)
            }
            _ => Some(self.expression_statement()?),
        };

        // `i < 10;`, if not present use `true` instead
        let condition = match self.check(&TokenType::Semicolon) {
            true => Literal::expr(true.into()),
            false => self.expression()?,
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        // `i = i + 1;`, could also be empty
        let increment = match self.check(&TokenType::RightParen) {
            true => None,
            false => Some(self.expression()?),
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        // `{ print i; }`
        let mut body = self.statement()?;

        // Now, build out the while statement, working backwards
        if let Some(incr) = increment {
            /* {
             *   { print i; }
             *   i = i + 1;
             * }
             */
            body = Block::stmt(vec![body, Expression::stmt(incr)]);
        }
        /* while (i < 10) {
         *   { print i; }
         *   i = i + 1;
         * }
         */
        body = While::stmt(condition, body);

        /* {
         *   // scope `var` to just this block
         *   var i = 0;
         *   while (i < 10) {
         *     { print i; }
         *     i = i + 1;
         *   }
         * }
         */
        if let Some(init) = initializer {
            body = Block::stmt(vec![init, body]);
        }

        // boom!
        Ok(body)
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let expr = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Expression::stmt(expr))
    }

    fn block(&mut self) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;

        Ok(statements)
    }
}

// Expressions
impl Parser {
    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr = self.or()?;

        if self.match_advance(&[TokenType::Equal]) {
            let equals = self.previous();
            let value = self.assignment()?;

            return match expr {
                Expr::Variable(var) => Ok(Assign::expr(var.name, value)),
                Expr::Get(get) => Ok(Set::expr(*get.object, get.name, value)),
                other => {
                    let err = error(&equals, "Invalid assignment target.");
                    self.report(err);
                    Ok(other)
                }
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr> {
        let mut expr = self.and()?;

        while self.match_advance(&[TokenType::Or]) {
            let operator = self.previous();
            let right = self.and()?;
            expr = Logical::expr(expr, operator, right);
        }

        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut expr = self.equality()?;

        while self.match_advance(&[TokenType::And]) {
            let operator = self.previous();
            let right = self.equality()?;
            expr = Logical::expr(expr, operator, right);
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut expr = self.comparison()?;

        while self.match_advance(&[TokenType::BangEqual, TokenType::EqualEqual]) {
            let operator = self.previous();
            let right = self.comparison()?;
            expr = Binary::expr(expr, operator, right);
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut expr = self.term()?;
        while self.match_advance(&[TokenType::Greater, TokenType::GreaterEqual, TokenType::Less, TokenType::LessEqual]) {
            let operator = self.previous();
            let right = self.term()?;
            expr = Binary::expr(expr, operator, right);
        }

        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut expr = self.factor()?;
        while self.match_advance(&[TokenType::Minus, TokenType::Plus]) {
            let operator = self.previous();
            let right = self.factor()?;
            expr = Binary::expr(expr, operator, right);
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr> {
        let mut expr = self.unary()?;
        while self.match_advance(&[TokenType::Slash, TokenType::Star]) {
            let operator = self.previous();
            let right = self.unary()?;
            expr = Binary::expr(expr, operator, right);
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.match_advance(&[TokenType::Bang, TokenType::Minus]) {
            let operator = self.previous();
            let right = self.unary()?;
            return Ok(Unary::expr(operator, right));
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_advance(&[TokenType::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.match_advance(&[TokenType::Dot]) {
                let name = self.consume(TokenType::Identifier, "Expect property name after '.'.")?;
                expr = Get::expr(expr, name);
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut arguments = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                if arguments.len() >= 255 {
                    let err = error(self.peek(), "Can't have more than 255 arguments.");
                    self.report(err);
                }
                arguments.push(self.expression()?);
                if !self.match_advance(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        let paren = self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;

        Ok(Call::expr(callee, paren, arguments))
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.advance().typ {
            TokenType::False => Ok(Literal::expr(false.into())),
            TokenType::True => Ok(Literal::expr(true.into())),
            TokenType::Nil => Ok(Literal::expr(().into())),
            TokenType::Number | TokenType::String => Ok(Literal::expr(self.previous().literal)),
            TokenType::Identifier => Ok(Variable::expr(self.previous())),
            TokenType::This => Ok(This::expr(self.previous())),
            TokenType::Super => {
                let keyword = self.previous();
                self.consume(TokenType::Dot, "Expect '.' after 'super'.")?;
                let method = self.consume(TokenType::Identifier, "Expect superclass method name.")?;
                Ok(Super::expr(keyword, method))
            }
            TokenType::LeftParen => {
                let expr = self.expression()?;
                self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
                Ok(Grouping::expr(expr))
            }
            _ => Err(error(&self.previous(), "Expect expression.")),
        }
    }
}

// Helpers
impl Parser {
    fn previous(&self) -> Token {
        self.tokens[self.current - 1].clone()
    }

    fn consume(&mut self, typ: TokenType, msg: &str) -> Result<Token> {
        if self.check(&typ) {
            return Ok(self.advance());
        }

        Err(error(self.peek(), msg))
    }

    /// If any of the token types are the next token, advance and return true
    /// Otherwise, return false and do not advance
    fn match_advance(&mut self, typs: &[TokenType]) -> bool {
        if typs.iter().any(|t| self.check(t)) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, typ: &TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        &self.peek().typ == typ
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    /// Returns the next token and advances over it (if not at the end)
    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().typ == TokenType::Eof
    }

    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().typ == TokenType::Semicolon {
                return;
            }
            match self.peek().typ {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => {
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }
}

fn error(token: &Token, message: &str) -> LoxError {
    LoxError::at_token(token, message)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{ast_printer::AstPrinter, scanner::Scanner};

    fn parse(source: &str) -> Vec<Stmt> {
        let tokens = Scanner::new(source.to_string()).scan_tokens().expect("scan should succeed");
        let (statements, had_error) = Parser::new(tokens).parse();
        assert!(!had_error, "parse should succeed");
        statements
    }

    fn parse_fails(source: &str) -> bool {
        let tokens = Scanner::new(source.to_string()).scan_tokens().expect("scan should succeed");
        Parser::new(tokens).parse().1
    }

    fn first_expression(source: &str) -> String {
        let statements = parse(source);
        let Some(Stmt::Expression(stmt)) = statements.first() else {
            panic!("expected an expression statement");
        };
        AstPrinter {}.print(&stmt.expression)
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(first_expression("1 + 2 * 3;"), "(+ 1 (* 2 3))");
    }

    #[test]
    fn unary_binds_tighter_than_factors() {
        assert_eq!(first_expression("-1 * 2;"), "(* (- 1) 2)");
    }

    #[test]
    fn comparison_is_left_associative() {
        assert_eq!(first_expression("1 - 2 - 3;"), "(- (- 1 2) 3)");
    }

    #[test]
    fn assignment_is_right_associative() {
        assert_eq!(first_expression("a = b = 1;"), "(= a (= b 1))");
    }

    #[test]
    fn property_assignment_becomes_set() {
        assert_eq!(first_expression("a.b.c = 1;"), "(.= (. a b) c 1)");
    }

    #[test]
    fn calls_and_gets_chain() {
        assert_eq!(first_expression("a.b(1)(2);"), "(call (call (. a b) 1) 2)");
    }

    #[test]
    fn logical_operators_nest_by_precedence() {
        assert_eq!(first_expression("a or b and c;"), "(or a (and b c))");
    }

    #[test]
    fn invalid_assignment_target_is_reported() {
        assert!(parse_fails("1 = 2;"));
    }

    #[test]
    fn missing_semicolon_is_reported() {
        assert!(parse_fails("print 1"));
    }

    #[test]
    fn for_desugars_to_block_and_while() {
        let statements = parse("for (var i = 0; i < 3; i = i + 1) print i;");
        let Some(Stmt::Block(outer)) = statements.first() else {
            panic!("expected the initializer block");
        };
        assert!(matches!(outer.statements[0], Stmt::Var(_)));
        let Stmt::While(while_stmt) = &outer.statements[1] else {
            panic!("expected the while loop");
        };
        let Stmt::Block(body) = while_stmt.body.as_ref() else {
            panic!("expected the body/increment block");
        };
        assert!(matches!(body.statements[0], Stmt::Print(_)));
        assert!(matches!(body.statements[1], Stmt::Expression(_)));
    }

    #[test]
    fn for_without_condition_loops_on_true() {
        let statements = parse("for (;;) print 1;");
        let Some(Stmt::While(while_stmt)) = statements.first() else {
            panic!("expected a bare while loop");
        };
        assert_eq!(AstPrinter {}.print(&while_stmt.condition), "true");
    }

    #[test]
    fn class_bodies_collect_methods_and_superclass() {
        let statements = parse("class B < A { one() {} two() {} }");
        let Some(Stmt::Class(class)) = statements.first() else {
            panic!("expected a class declaration");
        };
        assert_eq!(class.name.lexeme, "B");
        assert_eq!(class.superclass.as_ref().map(|s| s.name.lexeme.clone()), Some("A".to_string()));
        let names: Vec<_> = class.methods.iter().map(|m| m.name.lexeme.clone()).collect();
        assert_eq!(names, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn super_requires_a_method_name() {
        assert!(parse_fails("super.;"));
    }

    #[test]
    fn parser_recovers_at_statement_boundaries() {
        let tokens = Scanner::new("var = 1; print 2;".to_string())
            .scan_tokens()
            .expect("scan should succeed");
        let mut parser = Parser::new(tokens);
        // The bad declaration is reported, but the parser picks back up past
        // the ';' and still salvages the statement after it.
        let (statements, had_error) = parser.parse();
        assert!(had_error);
        assert!(parser.is_at_end());
        assert_eq!(statements.len(), 1);
        assert!(matches!(statements[0], Stmt::Print(_)));
    }
}
