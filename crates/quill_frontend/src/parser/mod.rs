#[cfg(test)]
mod tests;

mod expr;

use quill_session::diagnostics::{Diagnostic, IntoDiagnostic};

use crate::ast::*;
use crate::lexer::{Lexer, LexerError};
use crate::token::{Keyword, Token, TokenKind, TokenSet};

pub const DEFAULT_MAX_SYNTAX_ERRORS: usize = 20;
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 128;

/// Which top-level items a compilation accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Declarations and statements.
    Program,
    /// Declarations only.
    Declarations,
    /// Statements only.
    Statements,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub token: Token,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("expected {expected}, found {found}")]
    Expected { expected: String, found: String },

    #[error("{0} are not allowed here")]
    NotAllowed(&'static str),

    #[error("only the first dimension may omit its size")]
    MissingInnerSize,

    #[error("array size must be at least 1")]
    ZeroSize,

    #[error("too many syntax errors, giving up")]
    TooManyErrors,

    #[error("nesting is deeper than {0} levels, giving up")]
    TooDeep(usize),
}

impl IntoDiagnostic for ParseError {
    fn into_diagnostic(self) -> Diagnostic {
        Diagnostic::syntax(self.kind.to_string()).at(&self.token.location, self.token.text)
    }
}

pub struct Parsed {
    pub program: Program,
    pub lexer_errors: Vec<LexerError>,
    pub parse_errors: Vec<ParseError>,
}

const TYPE_START: TokenSet = TokenSet::of(&[
    TokenKind::Keyword(Keyword::Int),
    TokenKind::Keyword(Keyword::Float),
    TokenKind::Keyword(Keyword::Bool),
    TokenKind::Keyword(Keyword::String),
    TokenKind::Keyword(Keyword::Void),
]);

const STMT_START: TokenSet = TokenSet::of(&[
    TokenKind::LBrace,
    TokenKind::Keyword(Keyword::If),
    TokenKind::Keyword(Keyword::While),
    TokenKind::Keyword(Keyword::Return),
    TokenKind::Identifier,
    TokenKind::Semicolon,
]);

const ITEM_START: TokenSet = TYPE_START.union(STMT_START);

/// Tokens that reliably start or end a statement.
const SYNC: TokenSet = TYPE_START.union(TokenSet::of(&[
    TokenKind::LBrace,
    TokenKind::RBrace,
    TokenKind::Semicolon,
    TokenKind::Keyword(Keyword::If),
    TokenKind::Keyword(Keyword::While),
    TokenKind::Keyword(Keyword::Return),
]));

const EXPR_START: TokenSet = TokenSet::of(&[
    TokenKind::Identifier,
    TokenKind::IntLiteral,
    TokenKind::FloatLiteral,
    TokenKind::StringLiteral,
    TokenKind::LParen,
    TokenKind::Sub,
    TokenKind::Bang,
]);

pub struct Parser {
    lexer: Lexer,
    token: Token,
    consumed: usize,

    errors: Vec<ParseError>,
    max_errors: usize,
    gave_up: bool,

    depth: usize,
    max_depth: usize,

    next_id: usize,
}

impl Parser {
    pub fn new(mut lexer: Lexer, max_errors: usize, max_depth: usize) -> Self {
        let token = lexer.next_token();

        Self {
            lexer,
            token,
            consumed: 0,

            errors: vec![],
            max_errors,
            gave_up: false,

            depth: 0,
            max_depth,

            next_id: 0,
        }
    }

    pub fn parse(mut self, mode: ParseMode) -> Parsed {
        let items = self.parse_items(mode, true, TokenSet::of(&[TokenKind::Eof]));

        Parsed {
            program: Program { items },
            lexer_errors: self.lexer.finish(),
            parse_errors: self.errors,
        }
    }

    /// Parses items up to (not including) a token in `end`.
    fn parse_items(&mut self, mode: ParseMode, global: bool, end: TokenSet) -> Vec<Item> {
        let mut items = vec![];
        let follow = end.union(ITEM_START);

        while !end.contains(self.token.kind) && !self.at(TokenKind::Eof) {
            let before = self.consumed;

            if TYPE_START.contains(self.token.kind) {
                if mode == ParseMode::Statements {
                    self.report_here(ParseErrorKind::NotAllowed("declarations"));
                }

                if let Some(item) = self.parse_declaration(follow, global) {
                    items.push(item);
                }
            } else if STMT_START.contains(self.token.kind) {
                if mode == ParseMode::Declarations {
                    self.report_here(ParseErrorKind::NotAllowed("statements"));
                }

                items.push(Item::Stmt(self.parse_statement(follow)));
            } else {
                self.error_expected("a declaration or statement");
                self.skip_to(follow);
            }

            self.ensure_progress(before);
        }

        items
    }

    fn parse_type_decl(&mut self) -> TypeDecl {
        let base = match self.token.kind {
            TokenKind::Keyword(Keyword::Int) => BaseType::Int,
            TokenKind::Keyword(Keyword::Float) => BaseType::Float,
            TokenKind::Keyword(Keyword::Bool) => BaseType::Bool,
            TokenKind::Keyword(Keyword::String) => BaseType::String,
            TokenKind::Keyword(Keyword::Void) => BaseType::Void,
            other => unreachable!("`{other}` does not start a type"),
        };

        TypeDecl {
            token: self.advance(),
            base,
        }
    }

    // current token starts a type
    fn parse_declaration(&mut self, follow: TokenSet, allow_functions: bool) -> Option<Item> {
        let ty = self.parse_type_decl();

        let name_follow = follow.union(TokenSet::of(&[
            TokenKind::LParen,
            TokenKind::LBracket,
            TokenKind::Assign,
            TokenKind::Comma,
            TokenKind::Semicolon,
        ]));
        let Some(name) = self.expect(TokenKind::Identifier, name_follow) else {
            self.skip_to(follow.with(TokenKind::Semicolon));
            self.eat(TokenKind::Semicolon);
            return None;
        };

        if self.at(TokenKind::LParen) {
            if !allow_functions {
                self.report(ParseErrorKind::NotAllowed("nested functions"), name.clone());
            }

            return Some(Item::Func(self.parse_func_rest(ty, name, follow)));
        }

        let var_follow = follow.union(TokenSet::of(&[TokenKind::Comma, TokenKind::Semicolon]));

        let mut vars = vec![self.parse_var_rest(name, var_follow)];
        while self.eat(TokenKind::Comma).is_some() {
            match self.expect(TokenKind::Identifier, var_follow) {
                Some(name) => vars.push(self.parse_var_rest(name, var_follow)),
                None => break,
            }
        }

        self.expect(TokenKind::Semicolon, follow);

        Some(Item::Vars(VarList { ty, vars }))
    }

    fn parse_var_rest(&mut self, name: Token, follow: TokenSet) -> VarDecl {
        let mut dims = vec![];

        let dim_follow = follow.union(TokenSet::of(&[TokenKind::LBracket, TokenKind::Assign]));
        while let Some(open) = self.eat(TokenKind::LBracket) {
            let size = if self.at(TokenKind::IntLiteral) {
                let token = self.advance();
                let size = self.array_size(&token);
                Some(size)
            } else {
                if !dims.is_empty() {
                    self.report(ParseErrorKind::MissingInnerSize, open);
                }
                None
            };

            dims.push(size);
            self.expect(TokenKind::RBracket, dim_follow);
        }

        let init = self
            .eat(TokenKind::Assign)
            .map(|_| self.parse_initializer(follow));

        VarDecl { name, dims, init }
    }

    fn parse_func_rest(&mut self, ret: TypeDecl, name: Token, follow: TokenSet) -> FuncDecl {
        let body_follow = follow.with(TokenKind::LBrace);
        let param_follow = body_follow.union(TokenSet::of(&[TokenKind::Comma, TokenKind::RParen]));

        self.expect(TokenKind::LParen, param_follow);

        let mut params = vec![];
        if !self.at(TokenKind::RParen) {
            loop {
                if let Some(param) = self.parse_param(param_follow) {
                    params.push(param);
                }
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }

        self.expect(TokenKind::RParen, body_follow);

        let mut body = vec![];
        if self
            .expect(TokenKind::LBrace, follow.union(ITEM_START))
            .is_some()
        {
            let end = TokenSet::of(&[TokenKind::RBrace]);
            body = self.parse_items(ParseMode::Program, false, end);
            self.expect(TokenKind::RBrace, follow);
        }

        FuncDecl {
            ret,
            name,
            params,
            body,
        }
    }

    fn parse_param(&mut self, follow: TokenSet) -> Option<Param> {
        let by_ref = self.eat(TokenKind::Keyword(Keyword::Ref)).is_some();

        if !TYPE_START.contains(self.token.kind) {
            self.error_expected("a parameter type");
            self.skip_to(follow);
            return None;
        }
        let ty = self.parse_type_decl();

        let name = self.expect(TokenKind::Identifier, follow.with(TokenKind::LBracket))?;

        let mut dims = vec![];
        while self.eat(TokenKind::LBracket).is_some() {
            if let Some(token) = self.expect(TokenKind::IntLiteral, follow.with(TokenKind::RBracket))
            {
                dims.push(self.array_size(&token));
            }
            self.expect(TokenKind::RBracket, follow.with(TokenKind::LBracket));
        }

        Some(Param {
            by_ref,
            ty,
            name,
            dims,
        })
    }

    fn array_size(&mut self, token: &Token) -> usize {
        let size = token.text.parse().unwrap_or(0);
        if size == 0 {
            self.report(ParseErrorKind::ZeroSize, token.clone());
        }
        size
    }

    fn parse_initializer(&mut self, follow: TokenSet) -> Expr {
        if self.at(TokenKind::LBrace) {
            self.parse_tuple(follow)
        } else {
            self.parse_full_expr(follow)
        }
    }

    fn parse_statement(&mut self, follow: TokenSet) -> Stmt {
        let token = self.token.clone();

        let kind = if self.descend() {
            let kind = self.parse_statement_kind(follow);
            self.ascend();
            kind
        } else {
            StmtKind::ParseError
        };

        Stmt {
            id: self.node_id(),
            token,
            kind,
        }
    }

    fn parse_statement_kind(&mut self, follow: TokenSet) -> StmtKind {
        match self.token.kind {
            TokenKind::LBrace => {
                self.advance();
                let stmts = self.parse_compound_body(follow);
                self.expect(TokenKind::RBrace, follow);
                StmtKind::Compound(stmts)
            }

            TokenKind::Keyword(Keyword::If) => {
                self.advance();
                let cond = self.parse_condition(follow);

                let then = self.parse_statement(follow.with(TokenKind::Keyword(Keyword::Else)));
                let otherwise = self
                    .eat(TokenKind::Keyword(Keyword::Else))
                    .map(|_| Box::new(self.parse_statement(follow)));

                StmtKind::If {
                    cond,
                    then: Box::new(then),
                    otherwise,
                }
            }

            TokenKind::Keyword(Keyword::While) => {
                self.advance();
                let cond = self.parse_condition(follow);
                let body = self.parse_statement(follow);

                StmtKind::While {
                    cond,
                    body: Box::new(body),
                }
            }

            TokenKind::Keyword(Keyword::Return) => {
                self.advance();

                let value = if self.at(TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.parse_full_expr(follow.with(TokenKind::Semicolon)))
                };
                self.expect(TokenKind::Semicolon, follow);

                StmtKind::Return(value)
            }

            TokenKind::Semicolon => {
                self.advance();
                StmtKind::Empty
            }

            TokenKind::Identifier => {
                let name = self.advance();
                let end_follow = follow.with(TokenKind::Semicolon);

                let kind = if self.at(TokenKind::LParen) {
                    StmtKind::Call(self.parse_args(end_follow))
                } else {
                    let target = self.parse_target(name, end_follow.with(TokenKind::Assign));

                    let value_follow = end_follow.union(EXPR_START).with(TokenKind::LBrace);
                    let value = match self.expect(TokenKind::Assign, value_follow) {
                        Some(_) => self.parse_initializer(end_follow),
                        None if EXPR_START.contains(self.token.kind)
                            || self.at(TokenKind::LBrace) =>
                        {
                            self.parse_initializer(end_follow)
                        }
                        None => self.expr(self.token.clone(), ExprKind::ParseError),
                    };

                    StmtKind::Assign { target, value }
                };

                self.expect(TokenKind::Semicolon, follow);
                kind
            }

            _ => {
                self.error_expected("a statement");
                self.skip_to(follow);
                StmtKind::ParseError
            }
        }
    }

    fn parse_compound_body(&mut self, follow: TokenSet) -> Vec<Stmt> {
        let mut stmts = vec![];
        let stmt_follow = follow.union(STMT_START).with(TokenKind::RBrace);

        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            let before = self.consumed;

            if TYPE_START.contains(self.token.kind) {
                self.report_here(ParseErrorKind::NotAllowed("declarations in nested blocks"));
                self.parse_declaration(stmt_follow, false);
            } else {
                stmts.push(self.parse_statement(stmt_follow));
            }

            self.ensure_progress(before);
        }

        stmts
    }

    fn parse_condition(&mut self, follow: TokenSet) -> Expr {
        let cond_follow = follow.union(STMT_START).with(TokenKind::RParen);

        self.expect(TokenKind::LParen, cond_follow.union(EXPR_START));
        let cond = self.parse_full_expr(cond_follow);
        self.expect(TokenKind::RParen, SYNC);

        cond
    }

    fn node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.token.is(kind)
    }

    fn advance(&mut self) -> Token {
        let next = if self.gave_up {
            Token::new(TokenKind::Eof, "", self.token.location.clone())
        } else {
            self.lexer.next_token()
        };

        self.consumed += 1;
        std::mem::replace(&mut self.token, next)
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        self.at(kind).then(|| self.advance())
    }

    /// Consumes a `kind` token, or reports an error and skips to `kind` or a token in `follow`.
    fn expect(&mut self, kind: TokenKind, follow: TokenSet) -> Option<Token> {
        if let Some(token) = self.eat(kind) {
            return Some(token);
        }

        self.error_expected(kind.token_name());
        self.skip_to(follow.with(kind));
        self.eat(kind)
    }

    fn skip_to(&mut self, set: TokenSet) {
        while !set.contains(self.token.kind) && !self.at(TokenKind::Eof) {
            self.advance();
        }
    }

    fn ensure_progress(&mut self, before: usize) {
        if self.consumed == before && !self.at(TokenKind::Eof) {
            self.advance();
        }
    }

    fn error_expected(&mut self, expected: impl Into<String>) {
        let kind = ParseErrorKind::Expected {
            expected: expected.into(),
            found: self.token.kind.token_name(),
        };
        self.report_here(kind);
    }

    fn report_here(&mut self, kind: ParseErrorKind) {
        self.report(kind, self.token.clone());
    }

    /// Enters one more level of nesting. Past `max_depth` the parse is abandoned.
    fn descend(&mut self) -> bool {
        if self.depth >= self.max_depth {
            self.give_up(ParseErrorKind::TooDeep(self.max_depth));
            return false;
        }

        self.depth += 1;
        true
    }

    fn ascend(&mut self) {
        self.depth -= 1;
    }

    fn report(&mut self, kind: ParseErrorKind, token: Token) {
        if self.gave_up {
            return;
        }

        self.errors.push(ParseError { kind, token });

        if self.errors.len() >= self.max_errors {
            self.give_up(ParseErrorKind::TooManyErrors);
        }
    }

    /// Reports `kind` and pretends the input ended here.
    fn give_up(&mut self, kind: ParseErrorKind) {
        if self.gave_up {
            return;
        }

        self.errors.push(ParseError {
            kind,
            token: self.token.clone(),
        });

        self.gave_up = true;
        self.token = Token::new(TokenKind::Eof, "", self.token.location.clone());
    }
}
