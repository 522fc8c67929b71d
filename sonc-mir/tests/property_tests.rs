//! Property tests over randomly generated arithmetic programs: use-def
//! symmetry, idealization monotonicity, and single-block scheduling for
//! branch-free code, checked against many small generated graphs rather
//! than a handful of hand-written ones.

use std::collections::HashSet;

use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;

use sonc_mir::{compile, Context, NodeId, Proc};
use sonc_util::index_vec::Idx;

#[derive(Clone, Debug)]
enum ArithExpr {
    Int(i32),
    Add(Box<ArithExpr>, Box<ArithExpr>),
    Sub(Box<ArithExpr>, Box<ArithExpr>),
    Mul(Box<ArithExpr>, Box<ArithExpr>),
}

impl ArithExpr {
    fn render(&self) -> String {
        match self {
            ArithExpr::Int(v) => v.to_string(),
            ArithExpr::Add(l, r) => format!("({} + {})", l.render(), r.render()),
            ArithExpr::Sub(l, r) => format!("({} - {})", l.render(), r.render()),
            ArithExpr::Mul(l, r) => format!("({} * {})", l.render(), r.render()),
        }
    }
}

fn arbitrary_depth(g: &mut Gen, depth: u32) -> ArithExpr {
    if depth == 0 || bool::arbitrary(g) {
        ArithExpr::Int(i32::arbitrary(g) % 1000)
    } else {
        let l = Box::new(arbitrary_depth(g, depth - 1));
        let r = Box::new(arbitrary_depth(g, depth - 1));
        match u8::arbitrary(g) % 3 {
            0 => ArithExpr::Add(l, r),
            1 => ArithExpr::Sub(l, r),
            _ => ArithExpr::Mul(l, r),
        }
    }
}

impl Arbitrary for ArithExpr {
    fn arbitrary(g: &mut Gen) -> Self {
        arbitrary_depth(g, 3)
    }
}

fn lower_and_compile(expr: &ArithExpr, optimize: bool) -> (Context, Proc) {
    let src = format!("fn main() {{ return {}; }}", expr.render());
    let mut interner = sonc_util::SymbolInterner::new();
    let program = sonc_front::parse(&src, &mut interner).expect("generated program must parse");
    let hir = sonc_front::lower_program(&program);
    let (cx, proc, _cfg) = compile(&hir, optimize, 1 << 16);
    (cx, proc)
}

/// The set of nodes reachable from `end` by following inputs — the "live"
/// set that survives trimming/idealization, as opposed to every node ever
/// allocated in `cx` (trimming prunes user lists, not the node arena
/// itself).
fn reachable(cx: &Context, end: NodeId) -> HashSet<NodeId> {
    let mut seen = HashSet::new();
    let mut stack = vec![end];
    while let Some(node) = stack.pop() {
        if !seen.insert(node) {
            continue;
        }
        for &input in cx.node(node).inputs().iter().flatten() {
            stack.push(input);
        }
    }
    seen
}

/// P-1: after every public operation, every input edge has a matching
/// back-edge in the target's user list.
#[quickcheck]
fn use_def_symmetry_holds_for_random_arithmetic_programs(expr: ArithExpr) -> bool {
    let (cx, _proc) = lower_and_compile(&expr, true);
    cx.ids().all(|id| {
        cx.node(id)
            .inputs()
            .iter()
            .enumerate()
            .all(|(slot, input)| match input {
                Some(src) => cx
                    .node(*src)
                    .users()
                    .iter()
                    .any(|&(user, user_slot)| user == id && user_slot as usize == slot),
                None => true,
            })
    })
}

/// P-3: idealization never increases the live node count.
#[quickcheck]
fn idealization_never_increases_live_node_count(expr: ArithExpr) -> bool {
    let (cx_unopt, proc_unopt) = lower_and_compile(&expr, false);
    let (cx_opt, proc_opt) = lower_and_compile(&expr, true);
    reachable(&cx_opt, proc_opt.end).len() <= reachable(&cx_unopt, proc_unopt.end).len()
}

/// P-7: a graph built from a branch-free expression schedules to one block.
#[quickcheck]
fn branch_free_arithmetic_schedules_to_a_single_block(expr: ArithExpr) -> bool {
    let src = format!("fn main() {{ return {}; }}", expr.render());
    let mut interner = sonc_util::SymbolInterner::new();
    let program = sonc_front::parse(&src, &mut interner).unwrap();
    let hir = sonc_front::lower_program(&program);
    let (_cx, _proc, cfg) = compile(&hir, true, 1 << 16);
    cfg.blocks.len() == 1
}
