use quill_ir::{BinOp, UnOp};

use super::{Parser, EXPR_START};
use crate::ast::*;
use crate::token::*;

const REL_OPS: TokenSet = TokenSet::of(&[
    TokenKind::EqEq,
    TokenKind::NotEq,
    TokenKind::Lt,
    TokenKind::LtEq,
    TokenKind::Gt,
    TokenKind::GtEq,
]);

fn binop(kind: TokenKind) -> Option<BinOp> {
    let op = match kind {
        TokenKind::Add => BinOp::Add,
        TokenKind::Sub => BinOp::Sub,
        TokenKind::Mul => BinOp::Mul,
        TokenKind::Div => BinOp::Div,
        TokenKind::Mod => BinOp::Mod,

        TokenKind::EqEq => BinOp::Eq,
        TokenKind::NotEq => BinOp::NotEq,
        TokenKind::Lt => BinOp::Lt,
        TokenKind::LtEq => BinOp::LtEq,
        TokenKind::Gt => BinOp::Gt,
        TokenKind::GtEq => BinOp::GtEq,

        TokenKind::AndAnd => BinOp::And,
        TokenKind::OrOr => BinOp::Or,

        _ => return None,
    };

    Some(op)
}

impl Parser {
    /// `['!'] expr [('&&' | '||') fullExpr]`
    pub(super) fn parse_full_expr(&mut self, follow: TokenSet) -> Expr {
        let logical = TokenSet::of(&[TokenKind::AndAnd, TokenKind::OrOr]);

        let bang = self.eat(TokenKind::Bang);
        let mut expr = self.parse_expr(follow.union(logical));

        if let Some(token) = bang {
            expr = self.unary(UnOp::Not, token, expr);
        }

        if logical.contains(self.token.kind) && self.descend() {
            let token = self.advance();
            let rhs = self.parse_full_expr(follow);
            self.ascend();
            expr = self.dyadic(token, expr, rhs);
        }

        expr
    }

    /// `simpleExpr [relOp simpleExpr]`
    fn parse_expr(&mut self, follow: TokenSet) -> Expr {
        let lhs = self.parse_simple_expr(follow.union(REL_OPS));

        if REL_OPS.contains(self.token.kind) {
            let token = self.advance();
            let rhs = self.parse_simple_expr(follow);
            return self.dyadic(token, lhs, rhs);
        }

        lhs
    }

    fn parse_simple_expr(&mut self, follow: TokenSet) -> Expr {
        let ops = TokenSet::of(&[TokenKind::Add, TokenKind::Sub]);

        // each operator nests the tree one level deeper
        let mut chained = 0;

        let mut expr = self.parse_term(follow.union(ops));
        while ops.contains(self.token.kind) && self.descend() {
            chained += 1;
            let token = self.advance();
            let rhs = self.parse_term(follow.union(ops));
            expr = self.dyadic(token, expr, rhs);
        }

        self.depth -= chained;
        expr
    }

    fn parse_term(&mut self, follow: TokenSet) -> Expr {
        let ops = TokenSet::of(&[TokenKind::Mul, TokenKind::Div, TokenKind::Mod]);

        let mut chained = 0;

        let mut expr = self.parse_factor(follow.union(ops));
        while ops.contains(self.token.kind) && self.descend() {
            chained += 1;
            let token = self.advance();
            let rhs = self.parse_factor(follow.union(ops));
            expr = self.dyadic(token, expr, rhs);
        }

        self.depth -= chained;
        expr
    }

    fn parse_factor(&mut self, follow: TokenSet) -> Expr {
        let token = self.token.clone();
        if !self.descend() {
            return self.expr(token, ExprKind::ParseError);
        }

        let expr = self.parse_operand(follow);
        self.ascend();
        expr
    }

    fn parse_operand(&mut self, follow: TokenSet) -> Expr {
        let kind = match self.token.kind {
            TokenKind::Identifier => {
                let name = self.advance();

                if self.at(TokenKind::LParen) {
                    let args = self.parse_args(follow);
                    return self.expr(name, ExprKind::Call(args));
                }

                return self.parse_target(name, follow);
            }

            TokenKind::IntLiteral => {
                // range checked by the lexer
                ExprKind::Constant(Literal::Int(self.token.text.parse().unwrap_or_default()))
            }
            TokenKind::FloatLiteral => {
                ExprKind::Constant(Literal::Float(self.token.text.parse().unwrap_or_default()))
            }
            TokenKind::StringLiteral => ExprKind::Constant(Literal::String(self.token.text.clone())),

            TokenKind::Sub => {
                let token = self.advance();
                let operand = self.parse_factor(follow);
                return self.unary(UnOp::Negate, token, operand);
            }

            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_full_expr(follow.with(TokenKind::RParen));
                self.expect(TokenKind::RParen, follow);
                return expr;
            }

            _ => {
                let token = self.token.clone();
                self.error_expected("an expression");
                self.skip_to(follow);
                return self.expr(token, ExprKind::ParseError);
            }
        };

        let token = self.advance();
        self.expr(token, kind)
    }

    /// A variable, optionally indexed. The name has already been consumed.
    pub(super) fn parse_target(&mut self, name: Token, follow: TokenSet) -> Expr {
        let mut indices = vec![];

        let index_follow = follow.union(TokenSet::of(&[TokenKind::RBracket, TokenKind::LBracket]));
        while self.eat(TokenKind::LBracket).is_some() {
            indices.push(self.parse_full_expr(index_follow));
            self.expect(TokenKind::RBracket, follow.with(TokenKind::LBracket));
        }

        if indices.is_empty() {
            self.expr(name, ExprKind::Variable)
        } else {
            self.expr(name, ExprKind::Index(indices))
        }
    }

    /// `'(' [fullExpr {',' fullExpr}] ')'`
    pub(super) fn parse_args(&mut self, follow: TokenSet) -> Vec<Expr> {
        let arg_follow = follow.union(TokenSet::of(&[TokenKind::Comma, TokenKind::RParen]));

        self.expect(TokenKind::LParen, arg_follow.union(EXPR_START));

        let mut args = vec![];
        if !self.at(TokenKind::RParen) {
            loop {
                args.push(self.parse_full_expr(arg_follow));
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }

        self.expect(TokenKind::RParen, follow);
        args
    }

    /// `'{' element {',' element} '}'`, where an element is a tuple or an expression.
    pub(super) fn parse_tuple(&mut self, follow: TokenSet) -> Expr {
        if !self.descend() {
            return self.expr(self.token.clone(), ExprKind::ParseError);
        }

        let open = self.advance();
        let element_follow = follow.union(TokenSet::of(&[TokenKind::Comma, TokenKind::RBrace]));

        let mut elements = vec![];
        loop {
            elements.push(self.parse_initializer(element_follow));
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }

        self.expect(TokenKind::RBrace, follow);
        self.ascend();
        self.expr(open, ExprKind::Tuple(elements))
    }

    fn unary(&mut self, op: UnOp, token: Token, operand: Expr) -> Expr {
        let kind = ExprKind::Unary {
            op,
            operand: Box::new(operand),
        };
        self.expr(token, kind)
    }

    fn dyadic(&mut self, token: Token, lhs: Expr, rhs: Expr) -> Expr {
        let op = binop(token.kind)
            .unwrap_or_else(|| unreachable!("`{}` is not a binary operator", token.kind));

        let kind = ExprKind::Dyadic {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        };
        self.expr(token, kind)
    }

    pub(super) fn expr(&mut self, token: Token, kind: ExprKind) -> Expr {
        Expr {
            id: self.node_id(),
            token,
            kind,
        }
    }
}
