use serde_json::{Number, Value};

use crate::ast::{BinOp, Expr, ExprKind, Step};
use crate::error::{QueryError, Result};

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Variable(String),
    Str(String),
    Num(f64),
    True,
    False,
    Null,
    And,
    Or,
    Dot,
    Star,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '$')
}

fn lex(source: &str) -> Result<Vec<(Token, usize)>> {
    let mut tokens = Vec::new();
    let bytes: Vec<char> = source.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        let position = i;
        let ch = bytes[i];
        match ch {
            c if c.is_whitespace() => {
                i += 1;
            }
            '.' => {
                tokens.push((Token::Dot, position));
                i += 1;
            }
            '*' => {
                tokens.push((Token::Star, position));
                i += 1;
            }
            '[' => {
                tokens.push((Token::LBracket, position));
                i += 1;
            }
            ']' => {
                tokens.push((Token::RBracket, position));
                i += 1;
            }
            '(' => {
                tokens.push((Token::LParen, position));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, position));
                i += 1;
            }
            '=' => {
                tokens.push((Token::Eq, position));
                i += 1;
            }
            '!' => {
                if bytes.get(i + 1) == Some(&'=') {
                    tokens.push((Token::Ne, position));
                    i += 2;
                } else {
                    return Err(QueryError::Parse {
                        position,
                        reason: "expected '=' after '!'".to_string(),
                    });
                }
            }
            '<' => {
                if bytes.get(i + 1) == Some(&'=') {
                    tokens.push((Token::Le, position));
                    i += 2;
                } else {
                    tokens.push((Token::Lt, position));
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&'=') {
                    tokens.push((Token::Ge, position));
                    i += 2;
                } else {
                    tokens.push((Token::Gt, position));
                    i += 1;
                }
            }
            '\'' | '"' => {
                let quote = ch;
                let mut value = String::new();
                i += 1;
                loop {
                    match bytes.get(i) {
                        Some(&c) if c == quote => {
                            i += 1;
                            break;
                        }
                        Some(&'\\') => {
                            match bytes.get(i + 1) {
                                Some(&c) => value.push(c),
                                None => {
                                    return Err(QueryError::Parse {
                                        position,
                                        reason: "unterminated escape".to_string(),
                                    })
                                }
                            }
                            i += 2;
                        }
                        Some(&c) => {
                            value.push(c);
                            i += 1;
                        }
                        None => {
                            return Err(QueryError::Parse {
                                position,
                                reason: "unterminated string literal".to_string(),
                            })
                        }
                    }
                }
                tokens.push((Token::Str(value), position));
            }
            '$' => {
                let mut name = String::new();
                i += 1;
                while i < bytes.len() && is_ident_char(bytes[i]) {
                    name.push(bytes[i]);
                    i += 1;
                }
                tokens.push((Token::Variable(name), position));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut text = String::new();
                text.push(c);
                i += 1;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == '.') {
                    text.push(bytes[i]);
                    i += 1;
                }
                let value: f64 = text.parse().map_err(|_| QueryError::Parse {
                    position,
                    reason: format!("invalid number {text:?}"),
                })?;
                tokens.push((Token::Num(value), position));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while i < bytes.len() && is_ident_char(bytes[i]) {
                    name.push(bytes[i]);
                    i += 1;
                }
                let token = match name.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(name),
                };
                tokens.push((token, position));
            }
            other => {
                return Err(QueryError::Parse {
                    position,
                    reason: format!("unexpected character {other:?}"),
                })
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    index: usize,
    len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index).map(|(t, _)| t)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.index)
            .map(|(_, p)| *p)
            .unwrap_or(self.len)
    }

    fn advance(&mut self) -> Option<(Token, usize)> {
        let item = self.tokens.get(self.index).cloned();
        self.index += 1;
        item
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        let position = self.position();
        match self.advance() {
            Some((found, _)) if found == token => Ok(()),
            Some((found, _)) => Err(QueryError::Parse {
                position,
                reason: format!("expected {token:?}, found {found:?}"),
            }),
            None => Err(QueryError::Parse {
                position,
                reason: format!("expected {token:?}, found end of input"),
            }),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            let position = self.position();
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::new(
                position,
                ExprKind::Binary { op: BinOp::Or, lhs: Box::new(lhs), rhs: Box::new(rhs) },
            );
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_cmp()?;
        while self.peek() == Some(&Token::And) {
            let position = self.position();
            self.advance();
            let rhs = self.parse_cmp()?;
            lhs = Expr::new(
                position,
                ExprKind::Binary { op: BinOp::And, lhs: Box::new(lhs), rhs: Box::new(rhs) },
            );
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> Result<Expr> {
        let lhs = self.parse_path()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinOp::Eq,
            Some(Token::Ne) => BinOp::Ne,
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Le) => BinOp::Le,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Ge) => BinOp::Ge,
            _ => return Ok(lhs),
        };
        let position = self.position();
        self.advance();
        let rhs = self.parse_path()?;
        Ok(Expr::new(
            position,
            ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) },
        ))
    }

    fn parse_steps(&mut self) -> Result<Vec<Step>> {
        let mut steps = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.advance();
                    let position = self.position();
                    match self.advance() {
                        Some((Token::Ident(name), _)) => steps.push(Step::Field(name)),
                        Some((Token::Star, _)) => steps.push(Step::Wildcard),
                        found => {
                            return Err(QueryError::Parse {
                                position,
                                reason: format!("expected field after '.', found {found:?}"),
                            })
                        }
                    }
                }
                Some(Token::LBracket) => {
                    self.advance();
                    let inner = self.parse_expr()?;
                    self.expect(Token::RBracket)?;
                    steps.push(Step::Filter(Box::new(inner)));
                }
                _ => break,
            }
        }
        Ok(steps)
    }

    fn parse_path(&mut self) -> Result<Expr> {
        let position = self.position();
        let head = match self.peek() {
            Some(Token::Ident(_)) => {
                let Some((Token::Ident(name), _)) = self.advance() else { unreachable!() };
                let mut steps = vec![Step::Field(name)];
                steps.extend(self.parse_steps()?);
                return Ok(Expr::new(position, ExprKind::Relative(steps)));
            }
            Some(Token::Variable(_)) => {
                let Some((Token::Variable(name), _)) = self.advance() else { unreachable!() };
                if name.is_empty() {
                    Expr::new(position, ExprKind::Context)
                } else {
                    Expr::new(position, ExprKind::Variable(name))
                }
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                inner
            }
            Some(Token::Str(_)) => {
                let Some((Token::Str(value), _)) = self.advance() else { unreachable!() };
                Expr::new(position, ExprKind::Literal(Value::String(value)))
            }
            Some(Token::Num(_)) => {
                let Some((Token::Num(value), _)) = self.advance() else { unreachable!() };
                let number = Number::from_f64(value).ok_or(QueryError::Parse {
                    position,
                    reason: "non-finite number".to_string(),
                })?;
                Expr::new(position, ExprKind::Literal(Value::Number(number)))
            }
            Some(Token::True) => {
                self.advance();
                Expr::new(position, ExprKind::Literal(Value::Bool(true)))
            }
            Some(Token::False) => {
                self.advance();
                Expr::new(position, ExprKind::Literal(Value::Bool(false)))
            }
            Some(Token::Null) => {
                self.advance();
                Expr::new(position, ExprKind::Literal(Value::Null))
            }
            found => {
                return Err(QueryError::Parse {
                    position,
                    reason: format!("unexpected token {found:?}"),
                })
            }
        };

        let steps = self.parse_steps()?;
        if steps.is_empty() {
            Ok(head)
        } else {
            Ok(Expr::new(position, ExprKind::Path { head: Box::new(head), steps }))
        }
    }
}

/// Parse an expression source into an AST.
pub fn parse(source: &str) -> Result<Expr> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        tokens,
        index: 0,
        len: source.len(),
    };
    let expr = parser.parse_expr()?;
    if parser.index < parser.tokens.len() {
        return Err(QueryError::Parse {
            position: parser.position(),
            reason: "trailing input after expression".to_string(),
        });
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_relative_navigation() {
        let expr = parse("docs.welcome.title").unwrap();
        assert!(matches!(expr.kind, ExprKind::Relative(ref steps) if steps.len() == 3));
    }

    #[test]
    fn parses_variable_with_filter() {
        let expr = parse("$list[type = 'a']").unwrap();
        let ExprKind::Path { head, steps } = expr.kind else {
            panic!("expected path");
        };
        assert!(matches!(head.kind, ExprKind::Variable(ref n) if n == "list"));
        assert!(matches!(steps[0], Step::Filter(_)));
    }

    #[test]
    fn parses_bare_context_and_wildcard() {
        let expr = parse("$.*").unwrap();
        let ExprKind::Path { head, steps } = expr.kind else {
            panic!("expected path");
        };
        assert!(matches!(head.kind, ExprKind::Context));
        assert_eq!(steps, vec![Step::Wildcard]);
    }

    #[test]
    fn parses_boolean_combinations() {
        let expr = parse("items[n > 1 and n <= 3]").unwrap();
        assert!(matches!(expr.kind, ExprKind::Relative(_)));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("").is_err());
        assert!(parse("a ~ b").is_err());
        assert!(parse("'unterminated").is_err());
        assert!(parse("a.b c").is_err());
        assert!(parse("items[").is_err());
    }

    #[test]
    fn positions_track_source_offsets() {
        let expr = parse("a = 'b'").unwrap();
        let ExprKind::Binary { lhs, rhs, .. } = expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(expr.position, 2);
        assert_eq!(lhs.position, 0);
        assert_eq!(rhs.position, 4);
    }
}
