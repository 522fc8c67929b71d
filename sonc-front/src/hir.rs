//! AST → HIR lowering: turns structured control flow (`if`/`else`/`while`)
//! into the flat block-list-with-terminators shape the MIR lowering pass
//! consumes.

use crate::ast::{self, BinOp, Expr, Item, Program, Stmt, UnOp};
use sonc_util::index_vec::{Idx, IndexVec};
use sonc_util::{define_idx, Symbol};

define_idx!(HirBlockId);
define_idx!(HirValueId);

/// A statement opcode. `Var`/`Assign` are the optional mutable-local
/// opcodes, lowered here rather than rejected outright.
#[derive(Debug, Clone, Copy)]
pub enum HirOp {
    IntegerLiteral(i32),
    Add(HirValueId, HirValueId),
    Sub(HirValueId, HirValueId),
    Mul(HirValueId, HirValueId),
    Div(HirValueId, HirValueId),
    Neg(HirValueId),
    Var(Symbol),
    Assign(Symbol, HirValueId),
}

#[derive(Debug, Clone, Copy)]
pub struct HirInst {
    pub id: HirValueId,
    pub op: HirOp,
}

#[derive(Debug, Clone, Copy)]
pub enum HirTerminator {
    Jump(HirBlockId),
    Branch(HirValueId, HirBlockId, HirBlockId),
    Return(Option<HirValueId>),
    /// Falls off the end of the block: treated as a return site with no
    /// successors and no explicit value.
    None,
}

#[derive(Debug, Clone)]
pub struct HirBlock {
    pub id: HirBlockId,
    pub insts: Vec<HirInst>,
    pub terminator: HirTerminator,
}

#[derive(Debug, Clone)]
pub struct HirProc {
    pub blocks: IndexVec<HirBlockId, HirBlock>,
    pub entry: HirBlockId,
}

struct Builder {
    blocks: IndexVec<HirBlockId, HirBlock>,
    cur: HirBlockId,
    next_value: u32,
}

impl Builder {
    fn new_block(&mut self) -> HirBlockId {
        self.blocks.push(HirBlock {
            id: HirBlockId(0), // patched below
            insts: Vec::new(),
            terminator: HirTerminator::None,
        })
    }

    fn emit(&mut self, op: HirOp) -> HirValueId {
        let id = HirValueId::from_usize(self.next_value as usize);
        self.next_value += 1;
        self.blocks[self.cur].insts.push(HirInst { id, op });
        id
    }

    fn set_terminator(&mut self, term: HirTerminator) {
        self.blocks[self.cur].terminator = term;
    }

    fn lower_expr(&mut self, e: &Expr) -> HirValueId {
        match e {
            Expr::Int(v) => self.emit(HirOp::IntegerLiteral(*v as i32)),
            Expr::Var(sym) => self.emit(HirOp::Var(*sym)),
            Expr::Unary(UnOp::Neg, inner) => {
                let v = self.lower_expr(inner);
                self.emit(HirOp::Neg(v))
            }
            Expr::Binary(op, lhs, rhs) => {
                let l = self.lower_expr(lhs);
                let r = self.lower_expr(rhs);
                match op {
                    BinOp::Add => self.emit(HirOp::Add(l, r)),
                    BinOp::Sub => self.emit(HirOp::Sub(l, r)),
                    BinOp::Mul => self.emit(HirOp::Mul(l, r)),
                    BinOp::Div => self.emit(HirOp::Div(l, r)),
                }
            }
        }
    }

    fn lower_block(&mut self, block: &ast::Block) {
        for stmt in block {
            // A block whose terminator was already fixed (e.g. by `return`)
            // is done; any further statements lower into a fresh orphan
            // block with no predecessor edge, i.e. unreachable code after
            // a return.
            if !matches!(self.blocks[self.cur].terminator, HirTerminator::None) {
                self.cur = self.new_block();
            }
            self.lower_stmt(stmt);
        }
    }

    fn lower_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let { name, value } | Stmt::Assign { name, value } => {
                let v = self.lower_expr(value);
                self.emit(HirOp::Assign(*name, v));
            }
            Stmt::Expr(e) => {
                self.lower_expr(e);
            }
            Stmt::Return(value) => {
                let v = value.as_ref().map(|e| self.lower_expr(e));
                self.set_terminator(HirTerminator::Return(v));
            }
            Stmt::If { cond, then_blk, else_blk } => {
                let cond_v = self.lower_expr(cond);
                let then_b = self.new_block();
                let else_b = self.new_block();
                let join_b = self.new_block();

                self.set_terminator(HirTerminator::Branch(cond_v, then_b, else_b));

                self.cur = then_b;
                self.lower_block(then_blk);
                if matches!(self.blocks[self.cur].terminator, HirTerminator::None) {
                    self.set_terminator(HirTerminator::Jump(join_b));
                }

                self.cur = else_b;
                if let Some(else_blk) = else_blk {
                    self.lower_block(else_blk);
                }
                if matches!(self.blocks[self.cur].terminator, HirTerminator::None) {
                    self.set_terminator(HirTerminator::Jump(join_b));
                }

                self.cur = join_b;
            }
            Stmt::While { cond, body } => {
                let header_b = self.new_block();
                let body_b = self.new_block();
                let exit_b = self.new_block();

                self.set_terminator(HirTerminator::Jump(header_b));

                self.cur = header_b;
                let cond_v = self.lower_expr(cond);
                self.set_terminator(HirTerminator::Branch(cond_v, body_b, exit_b));

                self.cur = body_b;
                self.lower_block(body);
                if matches!(self.blocks[self.cur].terminator, HirTerminator::None) {
                    self.set_terminator(HirTerminator::Jump(header_b));
                }

                self.cur = exit_b;
            }
        }
    }
}

/// Lowers the first `fn` item in `program` to an [`HirProc`]. Multiple
/// procedures aren't supported; later items are ignored.
pub fn lower_program(program: &Program) -> HirProc {
    let Some(Item::Fn(f)) = program.first() else {
        panic!("program must contain at least one function");
    };

    let mut builder = Builder {
        blocks: IndexVec::new(),
        cur: HirBlockId(0),
        next_value: 0,
    };
    let entry = builder.new_block();
    builder.cur = entry;
    builder.lower_block(&f.body);

    // Patch the self-referential `id` fields now that every block exists.
    let mut blocks = builder.blocks;
    for (id, block) in blocks.as_mut_slice().iter_mut().enumerate() {
        block.id = HirBlockId::from_usize(id);
    }

    HirProc { blocks, entry }
}
