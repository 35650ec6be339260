
use quill_diagnostic::Location;
use quill_session::diagnostics::{Diagnostic, IntoDiagnostic};

use crate::reader::{Mark, SourceReader, EOF};
use crate::token::*;

pub const DEFAULT_MAX_IDENTIFIER_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct LexerError {
    pub kind: LexerErrorKind,
    pub location: Location,
    pub text: String,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexerErrorKind {
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),

    #[error("expected `{0}{0}`")]
    HalfOperator(char),

    #[error("integer literal out of range")]
    IntegerOverflow,

    #[error("expected a digit after `.`")]
    MissingFraction,

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unknown escape sequence `\\{0}`")]
    UnknownEscape(char),
}

impl IntoDiagnostic for LexerError {
    fn into_diagnostic(self) -> Diagnostic {
        Diagnostic::lex(self.kind.to_string()).at(&self.location, self.text)
    }
}

pub type LexerResult<T> = Result<T, LexerErrorKind>;

/// Turns the preprocessed character stream into tokens, one per call.
pub struct Lexer {
    reader: SourceReader,
    max_identifier_len: usize,
    errors: Vec<LexerError>,

    ch: char,
    ch_mark: Mark,

    token_start: Mark,
    text: String,
}

impl Lexer {
    pub fn new(reader: SourceReader, max_identifier_len: usize) -> Self {
        let mut lexer = Self {
            ch_mark: reader.mark(),
            token_start: reader.mark(),

            reader,
            max_identifier_len,
            errors: vec![],

            ch: EOF,
            text: String::new(),
        };

        lexer.ch = lexer.reader.next_char();
        lexer.ch_mark = lexer.reader.mark();
        lexer
    }

    /// Lexes everything up to and including the end-of-file token.
    pub fn lex(mut self) -> (Vec<Token>, Vec<LexerError>) {
        let mut tokens = vec![];
        loop {
            let token = self.next_token();
            let at_end = token.is(TokenKind::Eof);
            tokens.push(token);

            if at_end {
                break;
            }
        }

        (tokens, self.errors)
    }

    pub fn finish(self) -> Vec<LexerError> {
        self.errors
    }

    /// Produces the next token. Once input runs out every call returns [`TokenKind::Eof`].
    pub fn next_token(&mut self) -> Token {
        loop {
            macro_rules! try_lex {
                ($e:expr) => {{
                    match $e {
                        Ok(token) => token,
                        Err(err) => {
                            self.report_error(err);
                            continue;
                        }
                    }
                }};
            }

            self.token_start = self.ch_mark;
            self.text.clear();

            let kind = match self.bump() {
                EOF => TokenKind::Eof,

                // comment
                '/' if self.eat('/') => {
                    while !matches!(self.ch, '\n' | EOF) {
                        self.bump();
                    }
                    continue;
                }

                ch if ch.is_whitespace() => continue,

                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                '[' => TokenKind::LBracket,
                ']' => TokenKind::RBracket,
                '{' => TokenKind::LBrace,
                '}' => TokenKind::RBrace,
                ',' => TokenKind::Comma,
                ';' => TokenKind::Semicolon,

                '+' => TokenKind::Add,
                '-' => TokenKind::Sub,
                '*' => TokenKind::Mul,
                '/' => TokenKind::Div,
                '%' => TokenKind::Mod,

                '=' if self.eat('=') => TokenKind::EqEq,
                '=' => TokenKind::Assign,
                '!' if self.eat('=') => TokenKind::NotEq,
                '!' => TokenKind::Bang,
                '<' if self.eat('=') => TokenKind::LtEq,
                '<' => TokenKind::Lt,
                '>' if self.eat('=') => TokenKind::GtEq,
                '>' => TokenKind::Gt,

                '&' if self.eat('&') => TokenKind::AndAnd,
                '|' if self.eat('|') => TokenKind::OrOr,
                ch @ ('&' | '|') => {
                    self.report_error(LexerErrorKind::HalfOperator(ch));
                    continue;
                }

                '"' => {
                    let value = try_lex!(self.lex_string());
                    return self.token_with_text(TokenKind::StringLiteral, value);
                }

                '0'..='9' => try_lex!(self.lex_number()),

                ch if is_ident_start(ch) => self.lex_alpha(),

                ch => {
                    self.report_error(LexerErrorKind::UnexpectedChar(ch));
                    continue;
                }
            };

            let text = std::mem::take(&mut self.text);
            return self.token_with_text(kind, text);
        }
    }

    fn lex_string(&mut self) -> LexerResult<String> {
        let mut value = String::new();

        loop {
            match self.ch {
                '\n' | EOF => return Err(LexerErrorKind::UnterminatedString),
                '"' => {
                    self.bump();
                    return Ok(value);
                }
                '\\' => {
                    self.bump();
                    match self.bump() {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        '"' => value.push('"'),
                        '\\' => value.push('\\'),
                        '\n' | EOF => return Err(LexerErrorKind::UnterminatedString),
                        other => {
                            self.report_error(LexerErrorKind::UnknownEscape(other));
                            value.push(other);
                        }
                    }
                }
                _ => value.push(self.bump()),
            }
        }
    }

    fn lex_number(&mut self) -> LexerResult<TokenKind> {
        self.eat_digits();

        if !self.eat('.') {
            return match self.text.parse::<i64>() {
                Ok(_) => Ok(TokenKind::IntLiteral),
                Err(_) => Err(LexerErrorKind::IntegerOverflow),
            };
        }

        if !self.ch.is_ascii_digit() {
            return Err(LexerErrorKind::MissingFraction);
        }
        self.eat_digits();

        Ok(TokenKind::FloatLiteral)
    }

    fn eat_digits(&mut self) {
        while self.ch.is_ascii_digit() {
            self.bump();
        }
    }

    fn lex_alpha(&mut self) -> TokenKind {
        while is_ident(self.ch) {
            self.bump();
        }

        self.text.truncate(self.max_identifier_len);

        match Keyword::lookup(&self.text) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Identifier,
        }
    }

    /// Consumes the lookahead character, recording it in the current token's text.
    fn bump(&mut self) -> char {
        let ch = self.ch;
        if ch == EOF {
            return EOF;
        }

        self.text.push(ch);
        self.ch = self.reader.next_char();
        self.ch_mark = self.reader.mark();
        ch
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.ch == expected {
            self.bump();
            true
        } else {
            false
        }
    }

    fn token_with_text(&self, kind: TokenKind, text: String) -> Token {
        Token::new(kind, text, self.reader.location(self.token_start))
    }

    fn report_error(&mut self, kind: LexerErrorKind) {
        self.errors.push(LexerError {
            kind,
            location: self.reader.location(self.token_start),
            text: self.text.clone(),
        });
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}
