/// Streaming lexer for the L language.
///
/// The [`Lexer`] walks the source text one character at a time and
/// implements [`Iterator`] over [`Token`]s. It tracks line and column for
/// every token it produces, so downstream consumers (the parser, the
/// compiler, the runtime's error reporting) always know where a token
/// came from.
///
/// # Word characters
///
/// Anything that is not whitespace and not one of the reserved
/// punctuation characters `[ ] ( ) { } : ; , "` is part of a word. This
/// includes digits and sign characters: `42`, `-7` and `3.14` are
/// ordinary words that the runtime resolves to numbers when executed.
///
/// # Comments
///
/// `#` starts a line comment running to the end of the line.
use std::rc::Rc;
use std::str::Chars;

use crate::position::Position;
use crate::token::{Token, TokenKind};

fn is_reserved(c: char) -> bool {
    matches!(
        c,
        '[' | ']' | '(' | ')' | '{' | '}' | ':' | ';' | ',' | '"'
    )
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<Chars<'a>>,
    file: Rc<str>,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(file: impl Into<Rc<str>>, source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            file: file.into(),
            line: 1,
            column: 1,
        }
    }

    fn position(&self) -> Position {
        Position::new(self.file.clone(), self.line, self.column)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == '#' {
                while let Some(&c) = self.chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn lex_string(&mut self, position: &Position) -> TokenKind {
        let mut value = String::new();

        self.advance(); // opening quote
        loop {
            match self.advance() {
                None => {
                    return TokenKind::Error(format!(
                        "unterminated string starting at {position}"
                    ));
                }
                Some('"') => return TokenKind::String(value),
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('r') => value.push('\r'),
                    Some('t') => value.push('\t'),
                    Some(c @ ('"' | '\'' | '\\')) => value.push(c),
                    Some(c) => {
                        return TokenKind::Error(format!(
                            "unrecognized escape sequence `\\{c}`"
                        ));
                    }
                    None => {
                        return TokenKind::Error(format!(
                            "unterminated string starting at {position}"
                        ));
                    }
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn lex_word(&mut self) -> TokenKind {
        let mut id = String::new();

        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() || is_reserved(c) || c == '#' {
                break;
            }
            id.push(c);
            self.advance();
        }

        TokenKind::Word(id)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.skip_whitespace_and_comments();

        let position = Lexer::position(self);
        let &c = self.chars.peek()?;
        let kind = match c {
            '[' => {
                self.advance();
                TokenKind::LBracket
            }
            ']' => {
                self.advance();
                TokenKind::RBracket
            }
            '(' => {
                self.advance();
                TokenKind::LParen
            }
            ')' => {
                self.advance();
                TokenKind::RParen
            }
            '{' => {
                self.advance();
                TokenKind::LBrace
            }
            '}' => {
                self.advance();
                TokenKind::RBrace
            }
            ':' => {
                self.advance();
                TokenKind::Colon
            }
            ';' => {
                self.advance();
                TokenKind::Semicolon
            }
            ',' => {
                self.advance();
                TokenKind::Comma
            }
            '"' => self.lex_string(&position),
            _ => self.lex_word(),
        };

        Some(Token { kind, position })
    }
}
