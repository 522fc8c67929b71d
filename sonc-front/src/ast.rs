//! AST node definitions for the toy language.

use sonc_util::{Span, Symbol};

pub type Program = Vec<Item>;

#[derive(Debug, Clone)]
pub enum Item {
    Fn(FnItem),
}

#[derive(Debug, Clone)]
pub struct FnItem {
    pub name: Symbol,
    pub body: Block,
    pub span: Span,
}

pub type Block = Vec<Stmt>;

#[derive(Debug, Clone)]
pub enum Stmt {
    Let { name: Symbol, value: Expr },
    Assign { name: Symbol, value: Expr },
    If { cond: Expr, then_blk: Block, else_blk: Option<Block> },
    While { cond: Expr, body: Block },
    Return(Option<Expr>),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Int(i64),
    Var(Symbol),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}
