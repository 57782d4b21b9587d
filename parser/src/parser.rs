use crate::ast::{Ast, Symbol};
use crate::position::Position;
use crate::token::{Token, TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub position: Position,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: Position) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.position, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parses a token stream into a stream of [`Ast`] nodes.
///
/// Implements [`Iterator`]; each call produces one top-level node. After
/// the first error the iterator is exhausted; concatenative source has
/// no statement boundary to resynchronize on.
pub struct Parser<I: Iterator<Item = Token>> {
    tokens: std::iter::Peekable<I>,
    last_position: Position,
    failed: bool,
}

impl<I: Iterator<Item = Token>> Parser<I> {
    pub fn new(tokens: I) -> Self {
        Self {
            tokens: tokens.peekable(),
            last_position: Position::origin(""),
            failed: false,
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.next()?;
        self.last_position = token.position.clone();
        Some(token)
    }

    fn unexpected_end(&self, expected: &str) -> ParseError {
        ParseError::new(
            format!("unexpected end of input, expected {expected}"),
            self.last_position.clone(),
        )
    }

    fn parse_node(&mut self, token: Token) -> Result<Ast, ParseError> {
        match token.kind {
            TokenKind::String(value) => Ok(Ast::Str(value)),
            TokenKind::Word(id) => Ok(Ast::Symbol(Symbol {
                id,
                position: token.position,
            })),
            TokenKind::LBracket => {
                let elements =
                    self.parse_sequence(&TokenKind::RBracket, true)?;
                Ok(Ast::Array(elements))
            }
            TokenKind::LParen => {
                let children = self.parse_sequence(&TokenKind::RParen, false)?;
                Ok(Ast::Quote(children))
            }
            TokenKind::LBrace => self.parse_object(),
            TokenKind::Colon => self.parse_word(),
            TokenKind::Error(message) => {
                Err(ParseError::new(message, token.position))
            }
            kind => Err(ParseError::new(
                format!("unexpected {}", kind.name()),
                token.position,
            )),
        }
    }

    /// Parse nodes until `terminator`. Commas are permitted between
    /// elements when `allow_commas` is set (array syntax).
    fn parse_sequence(
        &mut self,
        terminator: &TokenKind,
        allow_commas: bool,
    ) -> Result<Vec<Ast>, ParseError> {
        let mut nodes = Vec::new();

        loop {
            let token = self
                .advance()
                .ok_or_else(|| self.unexpected_end(terminator.name()))?;
            if token.kind == *terminator {
                return Ok(nodes);
            }
            if allow_commas && token.kind == TokenKind::Comma {
                continue;
            }
            nodes.push(self.parse_node(token)?);
        }
    }

    fn parse_object(&mut self) -> Result<Ast, ParseError> {
        let mut properties = Vec::new();

        loop {
            let token = self
                .advance()
                .ok_or_else(|| self.unexpected_end("`}`"))?;
            let key = match token.kind {
                TokenKind::RBrace => return Ok(Ast::Object(properties)),
                TokenKind::Comma => continue,
                TokenKind::String(key) => key,
                kind => {
                    return Err(ParseError::new(
                        format!("expected object key, found {}", kind.name()),
                        token.position,
                    ));
                }
            };

            let colon = self
                .advance()
                .ok_or_else(|| self.unexpected_end("`:`"))?;
            if colon.kind != TokenKind::Colon {
                return Err(ParseError::new(
                    format!("expected `:`, found {}", colon.kind.name()),
                    colon.position,
                ));
            }

            let value = self
                .advance()
                .ok_or_else(|| self.unexpected_end("object value"))?;
            properties.push((key, self.parse_node(value)?));
        }
    }

    fn parse_word(&mut self) -> Result<Ast, ParseError> {
        let name = self
            .advance()
            .ok_or_else(|| self.unexpected_end("word name"))?;
        let symbol = match name.kind {
            TokenKind::Word(id) => Symbol {
                id,
                position: name.position,
            },
            kind => {
                return Err(ParseError::new(
                    format!("expected word name, found {}", kind.name()),
                    name.position,
                ));
            }
        };

        let quote = self.parse_sequence(&TokenKind::Semicolon, false)?;

        Ok(Ast::Word { symbol, quote })
    }
}

impl<I: Iterator<Item = Token>> Iterator for Parser<I> {
    type Item = Result<Ast, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let token = self.advance()?;
        let result = self.parse_node(token);
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}
