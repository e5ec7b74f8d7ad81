use crate::expr::Expr;

/// Renders an expression tree as a parenthesized prefix string, which makes
/// precedence and associativity easy to pin in tests.
pub struct AstPrinter {}

impl AstPrinter {
    pub fn print(&self, expr: &Expr) -> String {
        match expr {
            Expr::Assign(expr) => self.parenthesize(&format!("= {}", expr.name.lexeme), &[&*expr.value]),
            Expr::Binary(expr) => self.parenthesize(&expr.operator.lexeme, &[&*expr.left, &*expr.right]),
            Expr::Call(expr) => {
                let mut parts = vec![self.print(&expr.callee)];
                parts.extend(expr.arguments.iter().map(|arg| self.print(arg)));
                format!("(call {})", parts.join(" "))
            }
            Expr::Get(expr) => format!("(. {} {})", self.print(&expr.object), expr.name.lexeme),
            Expr::Grouping(expr) => self.parenthesize("group", &[&*expr.expression]),
            Expr::Literal(expr) => expr.value.to_string(),
            Expr::Logical(expr) => self.parenthesize(&expr.operator.lexeme, &[&*expr.left, &*expr.right]),
            Expr::Set(expr) => format!(
                "(.= {} {} {})",
                self.print(&expr.object),
                expr.name.lexeme,
                self.print(&expr.value)
            ),
            Expr::Super(expr) => format!("(super {})", expr.method.lexeme),
            Expr::This(_) => "this".to_string(),
            Expr::Unary(expr) => self.parenthesize(&expr.operator.lexeme, &[&*expr.right]),
            Expr::Variable(expr) => expr.name.lexeme.clone(),
        }
    }

    fn parenthesize(&self, name: &str, exprs: &[&Expr]) -> String {
        let parts: Vec<_> = exprs.iter().map(|expr| self.print(expr)).collect();
        format!("({} {})", name, parts.join(" "))
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        expr::{Binary, Grouping, Literal, Unary},
        token::Token,
        token_type::TokenType,
    };

    #[test]
    fn does_the_thing() {
        let expr = Binary::expr(
            Unary::expr(
                Token::new(TokenType::Minus, "-", ().into(), 1),
                Literal::expr(123_f64.into()),
            ),
            Token::new(TokenType::Star, "*", ().into(), 1),
            Grouping::expr(Literal::expr(45.67.into())),
        );
        let printer = AstPrinter {};
        assert_eq!(printer.print(&expr), "(* (- 123) (group 45.67))".to_string());
    }
}
