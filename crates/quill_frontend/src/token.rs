use std::fmt;

use quill_diagnostic::Location;

use crate::{Node, NodeCopy};

#[derive(Node!)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text, except for string literals where it holds the unescaped contents.
    pub text: String,
    pub location: Location,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, location: Location) -> Self {
        Self {
            kind,
            text: text.into(),
            location,
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

#[derive(NodeCopy!)]
pub enum TokenKind {
    Identifier,
    IntLiteral,
    FloatLiteral,
    StringLiteral,

    Keyword(Keyword),

    Add,
    Sub,
    Mul,
    Div,
    Mod,

    Assign,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    AndAnd,
    OrOr,
    Bang,

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semicolon,

    Eof,
}

#[derive(NodeCopy!)]
pub enum Keyword {
    Int,
    Float,
    Bool,
    String,
    Void,

    If,
    Else,
    While,
    Return,
    Ref,
}

impl Keyword {
    pub fn lookup(s: &str) -> Option<Keyword> {
        let keyword = match s {
            "int" => Keyword::Int,
            "float" => Keyword::Float,
            "bool" => Keyword::Bool,
            "string" => Keyword::String,
            "void" => Keyword::Void,
            "if" => Keyword::If,
            "else" => Keyword::Else,
            "while" => Keyword::While,
            "return" => Keyword::Return,
            "ref" => Keyword::Ref,
            _ => return None,
        };

        Some(keyword)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Int => "int",
            Keyword::Float => "float",
            Keyword::Bool => "bool",
            Keyword::String => "string",
            Keyword::Void => "void",
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::While => "while",
            Keyword::Return => "return",
            Keyword::Ref => "ref",
        }
    }

    const ALL: [Keyword; 10] = [
        Keyword::Int,
        Keyword::Float,
        Keyword::Bool,
        Keyword::String,
        Keyword::Void,
        Keyword::If,
        Keyword::Else,
        Keyword::While,
        Keyword::Return,
        Keyword::Ref,
    ];
}

impl TokenKind {
    pub fn token_name(&self) -> String {
        let name = match self {
            TokenKind::Keyword(kw) => return format!("keyword `{}`", kw.as_str()),
            TokenKind::Identifier => "identifier",
            TokenKind::IntLiteral => "integer",
            TokenKind::FloatLiteral => "float",
            TokenKind::StringLiteral => "string",
            TokenKind::Add => "`+`",
            TokenKind::Sub => "`-`",
            TokenKind::Mul => "`*`",
            TokenKind::Div => "`/`",
            TokenKind::Mod => "`%`",
            TokenKind::Assign => "`=`",
            TokenKind::EqEq => "`==`",
            TokenKind::NotEq => "`!=`",
            TokenKind::Lt => "`<`",
            TokenKind::LtEq => "`<=`",
            TokenKind::Gt => "`>`",
            TokenKind::GtEq => "`>=`",
            TokenKind::AndAnd => "`&&`",
            TokenKind::OrOr => "`||`",
            TokenKind::Bang => "`!`",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::LBracket => "`[`",
            TokenKind::RBracket => "`]`",
            TokenKind::LBrace => "`{`",
            TokenKind::RBrace => "`}`",
            TokenKind::Comma => "`,`",
            TokenKind::Semicolon => "`;`",
            TokenKind::Eof => "end of file",
        };

        name.to_owned()
    }

    /// Dense index used by [`TokenSet`].
    const fn index(self) -> u32 {
        match self {
            TokenKind::Identifier => 0,
            TokenKind::IntLiteral => 1,
            TokenKind::FloatLiteral => 2,
            TokenKind::StringLiteral => 3,
            TokenKind::Add => 4,
            TokenKind::Sub => 5,
            TokenKind::Mul => 6,
            TokenKind::Div => 7,
            TokenKind::Mod => 8,
            TokenKind::Assign => 9,
            TokenKind::EqEq => 10,
            TokenKind::NotEq => 11,
            TokenKind::Lt => 12,
            TokenKind::LtEq => 13,
            TokenKind::Gt => 14,
            TokenKind::GtEq => 15,
            TokenKind::AndAnd => 16,
            TokenKind::OrOr => 17,
            TokenKind::Bang => 18,
            TokenKind::LParen => 19,
            TokenKind::RParen => 20,
            TokenKind::LBracket => 21,
            TokenKind::RBracket => 22,
            TokenKind::LBrace => 23,
            TokenKind::RBrace => 24,
            TokenKind::Comma => 25,
            TokenKind::Semicolon => 26,
            TokenKind::Eof => 27,
            TokenKind::Keyword(kw) => 28 + kw as u32,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token_name())
    }
}

/// A set of token kinds, used for expected and follow sets during error recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenSet(u64);

impl TokenSet {
    pub const EMPTY: TokenSet = TokenSet(0);

    pub const fn of(kinds: &[TokenKind]) -> Self {
        let mut set = Self::EMPTY;
        let mut i = 0;
        while i < kinds.len() {
            set = set.with(kinds[i]);
            i += 1;
        }
        set
    }

    #[must_use]
    pub const fn with(self, kind: TokenKind) -> Self {
        Self(self.0 | (1 << kind.index()))
    }

    #[must_use]
    pub const fn union(self, other: TokenSet) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, kind: TokenKind) -> bool {
        self.0 & (1 << kind.index()) != 0
    }

    pub fn iter(self) -> impl Iterator<Item = TokenKind> {
        ALL_KINDS.into_iter().filter(move |&kind| self.contains(kind))
    }
}

const ALL_KINDS: [TokenKind; 38] = {
    let mut kinds = [TokenKind::Eof; 38];
    let simple = [
        TokenKind::Identifier,
        TokenKind::IntLiteral,
        TokenKind::FloatLiteral,
        TokenKind::StringLiteral,
        TokenKind::Add,
        TokenKind::Sub,
        TokenKind::Mul,
        TokenKind::Div,
        TokenKind::Mod,
        TokenKind::Assign,
        TokenKind::EqEq,
        TokenKind::NotEq,
        TokenKind::Lt,
        TokenKind::LtEq,
        TokenKind::Gt,
        TokenKind::GtEq,
        TokenKind::AndAnd,
        TokenKind::OrOr,
        TokenKind::Bang,
        TokenKind::LParen,
        TokenKind::RParen,
        TokenKind::LBracket,
        TokenKind::RBracket,
        TokenKind::LBrace,
        TokenKind::RBrace,
        TokenKind::Comma,
        TokenKind::Semicolon,
        TokenKind::Eof,
    ];

    let mut i = 0;
    while i < simple.len() {
        kinds[i] = simple[i];
        i += 1;
    }

    let mut k = 0;
    while k < Keyword::ALL.len() {
        kinds[simple.len() + k] = TokenKind::Keyword(Keyword::ALL[k]);
        k += 1;
    }

    kinds
};
