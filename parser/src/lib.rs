//! # Parser
//!
//! A streaming lexer and parser for L source text.
//!
//! ## Architecture
//!
//! ```text
//!  &str source
//!      │
//!      ▼
//!  ┌────────┐    Token stream     ┌────────┐    Ast stream
//!  │ Lexer  │ ──────────────────▶ │ Parser │ ──────────────────▶
//!  └────────┘  (impl Iterator)    └────────┘  (impl Iterator)
//! ```
//!
//! ```rust
//! use parser::{Lexer, Parser};
//!
//! let source = ": double 2 * ; 21 double println";
//! let parser = Parser::new(Lexer::new("example.lk", source));
//!
//! for result in parser {
//!     match result {
//!         Ok(node) => println!("{:#?}", node),
//!         Err(err) => eprintln!("Parse error: {}", err),
//!     }
//! }
//! ```

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod position;
pub mod token;

pub use ast::{Ast, Symbol};
pub use lexer::Lexer;
pub use parser::{ParseError, Parser};
pub use position::Position;
pub use token::{Token, TokenKind};
