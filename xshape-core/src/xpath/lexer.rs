//! Tokenizer for XPath expressions.
use super::XPathError;
use super::ast::{Axis, NodeTest};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Slash,
    DoubleSlash,
    Dot,
    DoubleDot,
    At,
    Comma,
    Pipe,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Plus,
    Minus,
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Multiply,
    And,
    Or,
    Div,
    Mod,
    Literal(String),
    Number(f64),
    Test(NodeTest),
    /// A function name; the opening parenthesis is left in the stream.
    Function(String),
    /// An axis name; the `::` is consumed.
    Axis(Axis),
}

impl Token {
    /// Whether a following `*` or name must be read as an operator.
    fn ends_operand(&self) -> bool {
        matches!(
            self,
            Token::RParen
                | Token::RBracket
                | Token::Dot
                | Token::DoubleDot
                | Token::Literal(_)
                | Token::Number(_)
                | Token::Test(_)
        )
    }
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Lexeme {
    pub token: Token,
    pub offset: usize,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Lexeme>, XPathError> {
    let mut lexer = Lexer {
        chars: input.char_indices().collect(),
        pos: 0,
        input,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    chars: Vec<(usize, char)>,
    pos: usize,
    input: &'a str,
    tokens: Vec<Lexeme>,
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || !c.is_ascii() && !c.is_whitespace()
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_ascii_digit() || c == '-' || c == '.'
}

impl Lexer<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.offset_of(self.pos)
    }

    fn offset_of(&self, pos: usize) -> usize {
        self.chars
            .get(pos)
            .map(|(i, _)| *i)
            .unwrap_or(self.input.len())
    }

    fn emit(&mut self, token: Token, start: usize) {
        let offset = self.offset_of(start);
        self.tokens.push(Lexeme { token, offset });
    }

    fn error(&self, message: impl Into<String>) -> XPathError {
        XPathError::Syntax {
            expr: self.input.to_string(),
            offset: self.offset(),
            message: message.into(),
        }
    }

    fn operator_expected(&self) -> bool {
        self.tokens.last().is_some_and(|last| last.token.ends_operand())
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    /// First non-whitespace char at or after the cursor, without consuming it.
    fn next_significant(&self) -> (usize, Option<char>) {
        let mut idx = self.pos;
        while let Some((_, c)) = self.chars.get(idx) {
            if !c.is_whitespace() {
                return (idx, Some(*c));
            }
            idx += 1;
        }
        (idx, None)
    }

    fn push(&mut self, token: Token, width: usize) {
        self.emit(token, self.pos);
        self.pos += width;
    }

    fn run(&mut self) -> Result<(), XPathError> {
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek() else {
                return Ok(());
            };
            match c {
                '/' if self.peek_at(1) == Some('/') => self.push(Token::DoubleSlash, 2),
                '/' => self.push(Token::Slash, 1),
                '.' if self.peek_at(1) == Some('.') => self.push(Token::DoubleDot, 2),
                '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => self.number()?,
                '.' => self.push(Token::Dot, 1),
                '@' => self.push(Token::At, 1),
                ',' => self.push(Token::Comma, 1),
                '|' => self.push(Token::Pipe, 1),
                '(' => self.push(Token::LParen, 1),
                ')' => self.push(Token::RParen, 1),
                '[' => self.push(Token::LBracket, 1),
                ']' => self.push(Token::RBracket, 1),
                '+' => self.push(Token::Plus, 1),
                '-' => self.push(Token::Minus, 1),
                '=' => self.push(Token::Eq, 1),
                '!' if self.peek_at(1) == Some('=') => self.push(Token::NotEq, 2),
                '<' if self.peek_at(1) == Some('=') => self.push(Token::Lte, 2),
                '<' => self.push(Token::Lt, 1),
                '>' if self.peek_at(1) == Some('=') => self.push(Token::Gte, 2),
                '>' => self.push(Token::Gt, 1),
                '*' if self.operator_expected() => self.push(Token::Multiply, 1),
                '*' => self.push(Token::Test(NodeTest::Any), 1),
                '"' | '\'' => self.literal(c)?,
                '$' => return Err(self.error("variable references are not supported")),
                d if d.is_ascii_digit() => self.number()?,
                n if is_name_start(n) => self.name()?,
                other => return Err(self.error(format!("unexpected character '{other}'"))),
            }
        }
    }

    fn literal(&mut self, quote: char) -> Result<(), XPathError> {
        let quote_at = self.pos;
        let start = quote_at + 1;
        let mut end = start;
        while let Some((_, c)) = self.chars.get(end) {
            if *c == quote {
                let value: String = self.chars[start..end].iter().map(|(_, c)| c).collect();
                self.emit(Token::Literal(value), quote_at);
                self.pos = end + 1;
                return Ok(());
            }
            end += 1;
        }
        Err(self.error("unterminated string literal"))
    }

    fn number(&mut self) -> Result<(), XPathError> {
        let start = self.pos;
        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => self.pos += 1,
                '.' if !seen_dot && self.peek_at(1) != Some('.') => {
                    seen_dot = true;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        let text: String = self.chars[start..self.pos].iter().map(|(_, c)| c).collect();
        let value = text
            .parse::<f64>()
            .map_err(|_| self.error(format!("invalid number '{text}'")))?;
        self.emit(Token::Number(value), start);
        Ok(())
    }

    fn ncname(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_name_char) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().map(|(_, c)| c).collect()
    }

    fn name(&mut self) -> Result<(), XPathError> {
        let start = self.pos;
        let operator_expected = self.operator_expected();
        let first = self.ncname();

        if operator_expected {
            let token = match first.as_str() {
                "and" => Token::And,
                "or" => Token::Or,
                "div" => Token::Div,
                "mod" => Token::Mod,
                other => return Err(self.error(format!("expected operator, found '{other}'"))),
            };
            self.emit(token, start);
            return Ok(());
        }

        // prefix:local or prefix:*, but never the axis separator
        let mut qname = first.clone();
        if self.peek() == Some(':') && self.peek_at(1) != Some(':') {
            match self.peek_at(1) {
                Some('*') => {
                    self.pos += 2;
                    self.emit(Token::Test(NodeTest::Prefix(first)), start);
                    return Ok(());
                }
                Some(c) if is_name_start(c) => {
                    self.pos += 1;
                    let local = self.ncname();
                    qname = format!("{first}:{local}");
                }
                _ => return Err(self.error("expected local name after prefix")),
            }
        }

        let (idx, next) = self.next_significant();
        if next == Some(':') && self.chars.get(idx + 1).map(|(_, c)| *c) == Some(':') {
            let axis = Axis::from_name(&qname)
                .ok_or_else(|| self.error(format!("unknown axis '{qname}'")))?;
            self.pos = idx + 2;
            self.emit(Token::Axis(axis), start);
            return Ok(());
        }

        if next == Some('(') {
            let token = match qname.as_str() {
                "node" => self.node_type(NodeTest::Node)?,
                "text" => self.node_type(NodeTest::Text)?,
                "comment" => self.node_type(NodeTest::Comment)?,
                "processing-instruction" => self.processing_instruction()?,
                _ => Token::Function(qname),
            };
            self.emit(token, start);
            return Ok(());
        }

        self.emit(Token::Test(NodeTest::Name(qname)), start);
        Ok(())
    }

    fn expect_char(&mut self, expected: char) -> Result<(), XPathError> {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{expected}'")))
        }
    }

    fn node_type(&mut self, test: NodeTest) -> Result<Token, XPathError> {
        self.expect_char('(')?;
        self.expect_char(')')?;
        Ok(Token::Test(test))
    }

    fn processing_instruction(&mut self) -> Result<Token, XPathError> {
        self.expect_char('(')?;
        self.skip_whitespace();
        let target = match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.literal(q)?;
                match self.tokens.pop().map(|lexeme| lexeme.token) {
                    Some(Token::Literal(value)) => Some(value),
                    _ => None,
                }
            }
            _ => None,
        };
        self.expect_char(')')?;
        Ok(Token::Test(NodeTest::ProcessingInstruction(target)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<Token> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|lexeme| lexeme.token)
            .collect()
    }

    #[test]
    fn star_is_context_sensitive() {
        let tokens = lex("* * 2");
        assert_eq!(
            tokens,
            vec![Token::Test(NodeTest::Any), Token::Multiply, Token::Number(2.0)]
        );
    }

    #[test]
    fn operator_names_follow_operands() {
        let tokens = lex("a div b");
        assert_eq!(
            tokens,
            vec![
                Token::Test(NodeTest::Name("a".into())),
                Token::Div,
                Token::Test(NodeTest::Name("b".into())),
            ]
        );
        let tokens = lex("/div");
        assert_eq!(
            tokens,
            vec![Token::Slash, Token::Test(NodeTest::Name("div".into()))]
        );
    }

    #[test]
    fn axes_functions_and_prefixes() {
        let tokens = lex("child::ns:item[count(ns:*) > 1]/text()");
        assert_eq!(
            tokens,
            vec![
                Token::Axis(Axis::Child),
                Token::Test(NodeTest::Name("ns:item".into())),
                Token::LBracket,
                Token::Function("count".into()),
                Token::LParen,
                Token::Test(NodeTest::Prefix("ns".into())),
                Token::RParen,
                Token::Gt,
                Token::Number(1.0),
                Token::RBracket,
                Token::Slash,
                Token::Test(NodeTest::Text),
            ]
        );
    }

    #[test]
    fn literals_and_numbers() {
        let tokens = lex(r#"concat('a "b"', "c", .5, 10.25)"#);
        assert_eq!(tokens[2], Token::Literal("a \"b\"".into()));
        assert_eq!(tokens[4], Token::Literal("c".into()));
        assert_eq!(tokens[6], Token::Number(0.5));
        assert_eq!(tokens[8], Token::Number(10.25));
    }

    #[test]
    fn lexemes_carry_byte_offsets() {
        let offsets: Vec<_> = tokenize("é = 'x' and @b")
            .unwrap()
            .into_iter()
            .map(|lexeme| lexeme.offset)
            .collect();
        assert_eq!(offsets, vec![0, 3, 5, 9, 13, 14]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(tokenize("a # b"), Err(XPathError::Syntax { .. })));
        assert!(matches!(tokenize("'open"), Err(XPathError::Syntax { .. })));
        assert!(matches!(tokenize("$var"), Err(XPathError::Syntax { .. })));
        assert!(matches!(tokenize("bogus::a"), Err(XPathError::Syntax { .. })));
    }
}
