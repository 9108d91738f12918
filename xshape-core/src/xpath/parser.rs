//! Recursive-descent parser for XPath 1.0 expressions.
use super::XPathError;
use super::ast::{Axis, BinaryOp, Expr, Function, NodeTest, Step};
use super::lexer::{Lexeme, Token, tokenize};

/// How deep the expression tree may grow. Parentheses, predicates, function
/// arguments, unary minus and each operator in a chain all add a level.
const MAX_DEPTH: usize = 128;

pub(crate) fn parse(expr: &str) -> Result<Expr, XPathError> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        source: expr,
    };
    let parsed = parser.or_expr()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error(format!("unexpected token {token:?}")));
    }
    Ok(parsed)
}

struct Parser<'a> {
    tokens: Vec<Lexeme>,
    pos: usize,
    depth: usize,
    source: &'a str,
}

fn descendant_or_self() -> Step {
    Step::new(Axis::DescendantOrSelf, NodeTest::Node)
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|lexeme| &lexeme.token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek().cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), XPathError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {expected:?}")))
        }
    }

    /// Byte offset of the next unread token.
    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|lexeme| lexeme.offset)
            .unwrap_or(self.source.len())
    }

    fn error(&self, message: impl Into<String>) -> XPathError {
        self.error_at(self.offset(), message)
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> XPathError {
        XPathError::Syntax {
            expr: self.source.to_string(),
            offset,
            message: message.into(),
        }
    }

    fn descend(&mut self) -> Result<(), XPathError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error("expression nested too deeply"));
        }
        Ok(())
    }

    fn or_expr(&mut self) -> Result<Expr, XPathError> {
        let saved = self.depth;
        self.descend()?;
        let mut lhs = self.and_expr()?;
        while self.eat(&Token::Or) {
            self.descend()?;
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        self.depth = saved;
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, XPathError> {
        let saved = self.depth;
        let mut lhs = self.equality_expr()?;
        while self.eat(&Token::And) {
            self.descend()?;
            let rhs = self.equality_expr()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        self.depth = saved;
        Ok(lhs)
    }

    fn binary_level(
        &mut self,
        ops: &[(Token, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, XPathError>,
    ) -> Result<Expr, XPathError> {
        let saved = self.depth;
        let mut lhs = next(self)?;
        'outer: loop {
            for (token, op) in ops {
                if self.eat(token) {
                    self.descend()?;
                    let rhs = next(self)?;
                    lhs = Expr::Binary(*op, Box::new(lhs), Box::new(rhs));
                    continue 'outer;
                }
            }
            self.depth = saved;
            return Ok(lhs);
        }
    }

    fn equality_expr(&mut self) -> Result<Expr, XPathError> {
        self.binary_level(
            &[(Token::Eq, BinaryOp::Eq), (Token::NotEq, BinaryOp::NotEq)],
            Self::relational_expr,
        )
    }

    fn relational_expr(&mut self) -> Result<Expr, XPathError> {
        self.binary_level(
            &[
                (Token::Lt, BinaryOp::Lt),
                (Token::Lte, BinaryOp::Lte),
                (Token::Gt, BinaryOp::Gt),
                (Token::Gte, BinaryOp::Gte),
            ],
            Self::additive_expr,
        )
    }

    fn additive_expr(&mut self) -> Result<Expr, XPathError> {
        self.binary_level(
            &[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)],
            Self::multiplicative_expr,
        )
    }

    fn multiplicative_expr(&mut self) -> Result<Expr, XPathError> {
        self.binary_level(
            &[
                (Token::Multiply, BinaryOp::Mul),
                (Token::Div, BinaryOp::Div),
                (Token::Mod, BinaryOp::Mod),
            ],
            Self::unary_expr,
        )
    }

    fn unary_expr(&mut self) -> Result<Expr, XPathError> {
        let saved = self.depth;
        let mut negations = 0;
        while self.eat(&Token::Minus) {
            self.descend()?;
            negations += 1;
        }
        let mut expr = self.union_expr()?;
        for _ in 0..negations {
            expr = Expr::Negate(Box::new(expr));
        }
        self.depth = saved;
        Ok(expr)
    }

    fn union_expr(&mut self) -> Result<Expr, XPathError> {
        let saved = self.depth;
        let mut lhs = self.path_expr()?;
        while self.eat(&Token::Pipe) {
            self.descend()?;
            let rhs = self.path_expr()?;
            lhs = Expr::Union(Box::new(lhs), Box::new(rhs));
        }
        self.depth = saved;
        Ok(lhs)
    }

    fn path_expr(&mut self) -> Result<Expr, XPathError> {
        match self.peek() {
            Some(Token::Literal(_) | Token::Number(_) | Token::Function(_) | Token::LParen) => {
                self.filter_expr()
            }
            Some(Token::Slash) => {
                self.advance();
                let steps = if self.starts_step() {
                    self.relative_path()?
                } else {
                    Vec::new()
                };
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            Some(Token::DoubleSlash) => {
                self.advance();
                let mut steps = vec![descendant_or_self()];
                steps.extend(self.relative_path()?);
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            Some(_) if self.starts_step() => Ok(Expr::Path {
                absolute: false,
                steps: self.relative_path()?,
            }),
            Some(token) => Err(self.error(format!("unexpected token {token:?}"))),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn filter_expr(&mut self) -> Result<Expr, XPathError> {
        let primary = self.primary_expr()?;
        let predicates = self.predicates()?;
        let steps = match self.peek() {
            Some(Token::Slash) => {
                self.advance();
                self.relative_path()?
            }
            Some(Token::DoubleSlash) => {
                self.advance();
                let mut steps = vec![descendant_or_self()];
                steps.extend(self.relative_path()?);
                steps
            }
            _ => Vec::new(),
        };
        if predicates.is_empty() && steps.is_empty() {
            return Ok(primary);
        }
        Ok(Expr::Filter {
            primary: Box::new(primary),
            predicates,
            steps,
        })
    }

    fn primary_expr(&mut self) -> Result<Expr, XPathError> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Literal(value)) => Ok(Expr::Literal(value)),
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Function(name)) => self.function_call(name),
            other => Err(self.error_at(
                offset,
                format!("expected primary expression, found {other:?}"),
            )),
        }
    }

    fn function_call(&mut self, name: String) -> Result<Expr, XPathError> {
        let function =
            Function::from_name(&name).ok_or_else(|| XPathError::UnknownFunction {
                name: name.clone(),
            })?;
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.or_expr()?);
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(&Token::Comma)?;
            }
        }
        let (min, max) = function.arity();
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            return Err(XPathError::Arity {
                name,
                given: args.len(),
            });
        }
        Ok(Expr::Call(function, args))
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Dot | Token::DoubleDot | Token::At | Token::Axis(_) | Token::Test(_))
        )
    }

    fn relative_path(&mut self) -> Result<Vec<Step>, XPathError> {
        let mut steps = vec![self.step()?];
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(descendant_or_self());
                steps.push(self.step()?);
            } else {
                return Ok(steps);
            }
        }
    }

    fn step(&mut self) -> Result<Step, XPathError> {
        if self.eat(&Token::Dot) {
            return Ok(Step::new(Axis::SelfAxis, NodeTest::Node));
        }
        if self.eat(&Token::DoubleDot) {
            return Ok(Step::new(Axis::Parent, NodeTest::Node));
        }

        let axis = if self.eat(&Token::At) {
            Axis::Attribute
        } else if let Some(Token::Axis(axis)) = self.peek() {
            let axis = *axis;
            self.advance();
            axis
        } else {
            Axis::Child
        };

        let offset = self.offset();
        let test = match self.advance() {
            Some(Token::Test(test)) => test,
            other => {
                return Err(self.error_at(offset, format!("expected node test, found {other:?}")));
            }
        };

        let mut step = Step::new(axis, test);
        step.predicates = self.predicates()?;
        Ok(step)
    }

    fn predicates(&mut self) -> Result<Vec<Expr>, XPathError> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.or_expr()?);
            self.expect(&Token::RBracket)?;
        }
        Ok(predicates)
    }
}
