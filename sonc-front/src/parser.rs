//! Recursive-descent parser with precedence climbing for `+ - * /`.
//!
//! The parser does not attempt error recovery: on the first malformed
//! construct it reports a [`ParseError`] and stops, rather than panicking
//! or guessing at the programmer's intent.

use crate::ast::*;
use crate::lexer::{Lexer, Token, TokenKind};
use sonc_util::{Span, SymbolInterner};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected character {ch:?} at {span:?}")]
    UnexpectedChar { ch: char, span: Span },
    #[error("unexpected token {found:?}, expected {expected}")]
    UnexpectedToken { found: TokenKind, expected: &'static str },
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: &'static str },
}

pub fn parse(src: &str, interner: &mut SymbolInterner) -> Result<Program, ParseError> {
    let mut tokens = Vec::new();
    let mut lexer = Lexer::new(src, interner);
    loop {
        let tok = lexer
            .next_token()
            .map_err(|(ch, span)| ParseError::UnexpectedChar { ch, span })?;
        let eof = tok.kind == TokenKind::Eof;
        tokens.push(tok);
        if eof {
            break;
        }
    }
    Parser { tokens, pos: 0 }.parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    fn bump(&mut self) -> TokenKind {
        let kind = self.peek();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn eat(&mut self, kind: TokenKind, expected: &'static str) -> Result<(), ParseError> {
        if self.peek() == kind {
            self.bump();
            Ok(())
        } else if self.peek() == TokenKind::Eof {
            Err(ParseError::UnexpectedEof { expected })
        } else {
            Err(ParseError::UnexpectedToken {
                found: self.peek(),
                expected,
            })
        }
    }

    fn ident(&mut self, expected: &'static str) -> Result<sonc_util::Symbol, ParseError> {
        match self.peek() {
            TokenKind::Ident(sym) => {
                self.bump();
                Ok(sym)
            }
            TokenKind::Eof => Err(ParseError::UnexpectedEof { expected }),
            found => Err(ParseError::UnexpectedToken { found, expected }),
        }
    }

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut items = Vec::new();
        while self.peek() != TokenKind::Eof {
            items.push(self.parse_item()?);
        }
        Ok(items)
    }

    fn parse_item(&mut self) -> Result<Item, ParseError> {
        let start = self.tokens[self.pos].span;
        self.eat(TokenKind::Fn, "'fn'")?;
        let name = self.ident("function name")?;
        self.eat(TokenKind::LParen, "'('")?;
        self.eat(TokenKind::RParen, "')'")?;
        let body = self.parse_block()?;
        let end = self.tokens[self.pos.saturating_sub(1)].span;
        Ok(Item::Fn(FnItem {
            name,
            body,
            span: start.to(end),
        }))
    }

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        self.eat(TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while self.peek() != TokenKind::RBrace {
            stmts.push(self.parse_stmt()?);
        }
        self.eat(TokenKind::RBrace, "'}'")?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek() {
            TokenKind::Let => {
                self.bump();
                let name = self.ident("variable name")?;
                self.eat(TokenKind::Eq, "'='")?;
                let value = self.parse_expr()?;
                self.eat(TokenKind::Semi, "';'")?;
                Ok(Stmt::Let { name, value })
            }
            TokenKind::If => {
                self.bump();
                self.eat(TokenKind::LParen, "'('")?;
                let cond = self.parse_expr()?;
                self.eat(TokenKind::RParen, "')'")?;
                let then_blk = self.parse_block()?;
                let else_blk = if self.peek() == TokenKind::Else {
                    self.bump();
                    Some(self.parse_block()?)
                } else {
                    None
                };
                Ok(Stmt::If { cond, then_blk, else_blk })
            }
            TokenKind::While => {
                self.bump();
                self.eat(TokenKind::LParen, "'('")?;
                let cond = self.parse_expr()?;
                self.eat(TokenKind::RParen, "')'")?;
                let body = self.parse_block()?;
                Ok(Stmt::While { cond, body })
            }
            TokenKind::Return => {
                self.bump();
                let value = if self.peek() == TokenKind::Semi {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.eat(TokenKind::Semi, "';'")?;
                Ok(Stmt::Return(value))
            }
            TokenKind::Ident(_) if self.peek_is_assignment() => {
                let name = self.ident("variable name")?;
                self.eat(TokenKind::Eq, "'='")?;
                let value = self.parse_expr()?;
                self.eat(TokenKind::Semi, "';'")?;
                Ok(Stmt::Assign { name, value })
            }
            _ => {
                let e = self.parse_expr()?;
                self.eat(TokenKind::Semi, "';'")?;
                Ok(Stmt::Expr(e))
            }
        }
    }

    fn peek_is_assignment(&self) -> bool {
        matches!(self.peek(), TokenKind::Ident(_))
            && self.pos + 1 < self.tokens.len()
            && self.tokens[self.pos + 1].kind == TokenKind::Eq
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.peek() == TokenKind::Minus {
            self.bump();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(UnOp::Neg, Box::new(operand)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            TokenKind::Int(v) => {
                self.bump();
                Ok(Expr::Int(v))
            }
            TokenKind::Ident(sym) => {
                self.bump();
                Ok(Expr::Var(sym))
            }
            TokenKind::LParen => {
                self.bump();
                let e = self.parse_expr()?;
                self.eat(TokenKind::RParen, "')'")?;
                Ok(e)
            }
            TokenKind::Eof => Err(ParseError::UnexpectedEof { expected: "expression" }),
            found => Err(ParseError::UnexpectedToken { found, expected: "expression" }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_empty_function() {
        let mut interner = SymbolInterner::new();
        let prog = parse("fn main() { }", &mut interner).unwrap();
        assert_eq!(prog.len(), 1);
    }

    #[test]
    fn parses_arithmetic_precedence() {
        let mut interner = SymbolInterner::new();
        let prog = parse("fn main() { return 1 + 2 * 3; }", &mut interner).unwrap();
        let Item::Fn(f) = &prog[0];
        match &f.body[0] {
            Stmt::Return(Some(Expr::Binary(BinOp::Add, lhs, rhs))) => {
                assert!(matches!(**lhs, Expr::Int(1)));
                assert!(matches!(**rhs, Expr::Binary(BinOp::Mul, _, _)));
            }
            other => panic!("unexpected stmt: {other:?}"),
        }
    }

    #[test]
    fn reports_malformed_input_instead_of_panicking() {
        let mut interner = SymbolInterner::new();
        let err = parse("fn main() { return ; + }", &mut interner);
        assert!(err.is_err());
    }

    #[test]
    fn parses_if_else_and_while() {
        let mut interner = SymbolInterner::new();
        let src = "fn main() { let x = 1; while (x) { if (x) { x = 0; } else { x = 1; } } return x; }";
        let prog = parse(src, &mut interner).unwrap();
        assert_eq!(prog.len(), 1);
    }
}
