//! Recursive-descent (Pratt) parser producing the expression [AST].
//!
//! [AST]: crate::ast

use crate::{
    ast::{BinaryOp, ComprehensionOp, Expr, Literal, UnaryOp},
    lexer::{tokenize, Spanned, Token},
    Error,
};

/// Parse an expression source string into an [Expr].
pub(crate) fn parse(src: &str) -> Result<Expr, Error> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: src.len(),
    };
    let expr = parser.ternary()?;
    if let Some(tok) = parser.peek() {
        return Err(Error::Parse {
            position: tok.position,
            message: format!("unexpected {} after expression", tok.token.describe()),
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Spanned> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn position(&self) -> usize {
        self.peek().map(|t| t.position).unwrap_or(self.end)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek().map(|t| &t.token) == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), Error> {
        if self.eat(&expected) {
            return Ok(());
        }
        let message = match self.peek() {
            Some(tok) => format!(
                "expected {}, found {}",
                expected.describe(),
                tok.token.describe()
            ),
            None => format!("expected {}, found end of expression", expected.describe()),
        };
        Err(Error::Parse {
            position: self.position(),
            message,
        })
    }

    fn ternary(&mut self) -> Result<Expr, Error> {
        let cond = self.or()?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let then = self.ternary()?;
        self.expect(Token::Colon)?;
        let otherwise = self.ternary()?;
        Ok(Expr::Ternary {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn or(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.and()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.relation()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.relation()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn relation(&mut self) -> Result<Expr, Error> {
        let lhs = self.additive()?;
        let op = match self.peek().map(|t| &t.token) {
            Some(Token::EqEq) => BinaryOp::Eq,
            Some(Token::NotEq) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            Some(Token::Ident(name)) if name == "in" => BinaryOp::In,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.additive()?;
        Ok(binary(op, lhs, rhs))
    }

    fn additive(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek().map(|t| &t.token) {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().map(|t| &t.token) {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, Error> {
        if self.eat(&Token::Bang) {
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        if self.eat(&Token::Minus) {
            let operand = self.unary()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, Error> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let position = self.position();
                let Some(Spanned {
                    token: Token::Ident(name),
                    ..
                }) = self.next()
                else {
                    return Err(Error::Parse {
                        position,
                        message: "expected field or method name after `.`".to_string(),
                    });
                };
                if self.eat(&Token::LParen) {
                    expr = self.method_call(expr, name, position)?;
                } else {
                    expr = Expr::Member {
                        object: Box::new(expr),
                        field: name,
                    };
                }
                continue;
            }
            if self.eat(&Token::LBracket) {
                let index = self.ternary()?;
                self.expect(Token::RBracket)?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                };
                continue;
            }
            break;
        }
        Ok(expr)
    }

    /// Parse the argument list of `receiver.name(…)`, recognizing
    /// comprehension macros by their `(ident, body)` shape.
    fn method_call(&mut self, receiver: Expr, name: String, position: usize) -> Result<Expr, Error> {
        if let Some(op) = ComprehensionOp::from_name(&name) {
            let var_position = self.position();
            let Some(Spanned {
                token: Token::Ident(var),
                ..
            }) = self.next()
            else {
                return Err(Error::Parse {
                    position: var_position,
                    message: format!("`{name}` expects an iteration variable as its first argument"),
                });
            };
            self.expect(Token::Comma)?;
            let body = self.ternary()?;
            self.expect(Token::RParen)?;
            return Ok(Expr::Comprehension {
                target: Box::new(receiver),
                op,
                var,
                body: Box::new(body),
            });
        }

        let args = self.arguments(position)?;
        Ok(Expr::Call {
            target: Some(Box::new(receiver)),
            function: name,
            args,
        })
    }

    /// Parse a comma-separated argument list up to the closing paren, which
    /// has already been opened.
    fn arguments(&mut self, open_position: usize) -> Result<Vec<Expr>, Error> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.ternary()?);
            if self.eat(&Token::Comma) {
                continue;
            }
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            return Err(Error::Parse {
                position: self.position(),
                message: format!(
                    "unterminated argument list opened at byte {open_position}"
                ),
            });
        }
    }

    fn primary(&mut self) -> Result<Expr, Error> {
        let position = self.position();
        let Some(spanned) = self.next() else {
            return Err(Error::Parse {
                position,
                message: "unexpected end of expression".to_string(),
            });
        };

        match spanned.token {
            Token::Int(n) => Ok(Expr::Literal(Literal::Int(n))),
            Token::UInt(n) => Ok(Expr::Literal(Literal::UInt(n))),
            Token::Double(n) => Ok(Expr::Literal(Literal::Double(n))),
            Token::Str(s) => Ok(Expr::Literal(Literal::String(s))),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Literal::Bool(true))),
                "false" => Ok(Expr::Literal(Literal::Bool(false))),
                "null" => Ok(Expr::Literal(Literal::Null)),
                _ => {
                    if self.eat(&Token::LParen) {
                        let args = self.arguments(position)?;
                        Ok(Expr::Call {
                            target: None,
                            function: name,
                            args,
                        })
                    } else {
                        Ok(Expr::Ident(name))
                    }
                }
            },
            Token::LParen => {
                let inner = self.ternary()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.ternary()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(Token::RBracket)?;
                        break;
                    }
                }
                Ok(Expr::List(items))
            }
            Token::LBrace => {
                let mut entries = Vec::new();
                if !self.eat(&Token::RBrace) {
                    loop {
                        let key = self.ternary()?;
                        self.expect(Token::Colon)?;
                        let value = self.ternary()?;
                        entries.push((key, value));
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(Token::RBrace)?;
                        break;
                    }
                }
                Ok(Expr::Map(entries))
            }
            other => Err(Error::Parse {
                position: spanned.position,
                message: format!("unexpected {}", other.describe()),
            }),
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_member_chains() {
        let expr = parse("a.b.c").unwrap();
        assert_eq!(
            expr,
            Expr::Member {
                object: Box::new(Expr::Member {
                    object: Box::new(Expr::Ident("a".to_string())),
                    field: "b".to_string(),
                }),
                field: "c".to_string(),
            }
        );
    }

    #[test]
    fn parses_index_access() {
        let expr = parse("a[0]").unwrap();
        assert_eq!(
            expr,
            Expr::Index {
                object: Box::new(Expr::Ident("a".to_string())),
                index: Box::new(Expr::Literal(Literal::Int(0))),
            }
        );
    }

    #[test]
    fn precedence_mul_over_add() {
        let expr = parse("1 + 2 * 3").unwrap();
        let Expr::Binary { op: BinaryOp::Add, rhs, .. } = expr else {
            panic!("expected addition at the top");
        };
        assert!(matches!(*rhs, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn parses_ternary_right_associative() {
        let expr = parse("a ? b : c ? d : e").unwrap();
        let Expr::Ternary { otherwise, .. } = expr else {
            panic!("expected ternary");
        };
        assert!(matches!(*otherwise, Expr::Ternary { .. }));
    }

    #[test]
    fn parses_in_operator() {
        let expr = parse("x in [1, 2]").unwrap();
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::In, .. }));
    }

    #[test]
    fn parses_calls_and_methods() {
        let expr = parse("size(a)").unwrap();
        assert!(matches!(expr, Expr::Call { target: None, .. }));

        let expr = parse("a.b.startsWith('x')").unwrap();
        let Expr::Call { target: Some(target), function, .. } = expr else {
            panic!("expected method call");
        };
        assert_eq!(function, "startsWith");
        assert!(matches!(*target, Expr::Member { .. }));
    }

    #[test]
    fn parses_comprehensions() {
        let expr = parse("items.filter(i, i.enabled)").unwrap();
        let Expr::Comprehension { op, var, .. } = expr else {
            panic!("expected comprehension");
        };
        assert_eq!(op, ComprehensionOp::Filter);
        assert_eq!(var, "i");
    }

    #[test]
    fn comprehension_requires_iteration_variable() {
        assert!(matches!(
            parse("items.filter(1, true)"),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn parses_map_and_list_literals() {
        let expr = parse("{'k': [1, 2], 'other': {}}").unwrap();
        let Expr::Map(entries) = expr else {
            panic!("expected map literal");
        };
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn rejects_trailing_tokens() {
        let err = parse("a b").unwrap_err();
        assert!(matches!(err, Error::Parse { position: 2, .. }));
    }

    #[test]
    fn keyword_literals() {
        assert_eq!(parse("true").unwrap(), Expr::Literal(Literal::Bool(true)));
        assert_eq!(parse("null").unwrap(), Expr::Literal(Literal::Null));
    }
}
