//! Global code motion: reconstructs the basic-block control-flow graph
//! from the sea-of-nodes graph and computes the dominator tree, grounded
//! on gcm.c's `build_control_flow_graph`/`build_dominator_tree` pair.

use sonc_util::index_vec::{Idx, IndexVec};
use sonc_util::define_idx;

use crate::node::{Context, NodeId, Proc};

define_idx!(BlockId);

/// One reconstructed basic block: the control-chain nodes assigned to it
/// (in visitation order), its CFG edges, and its immediate dominator.
#[derive(Debug, Clone)]
pub struct GcmBlock {
    pub id: BlockId,
    /// Topological identifier: this block's position in reverse postorder
    /// from the entry block. `id.index()` and `tid` always agree, since
    /// `blocks` itself is stored in `tid` order.
    pub tid: u32,
    pub nodes: Vec<NodeId>,
    pub successors: Vec<BlockId>,
    pub predecessors: Vec<BlockId>,
    /// `None` only for the entry block.
    pub immediate_dominator: Option<BlockId>,
}

/// The reconstructed CFG, blocks ordered by `tid` (reverse postorder from
/// the entry block).
pub struct ControlFlowGraph {
    pub blocks: IndexVec<BlockId, GcmBlock>,
    pub entry: BlockId,
    /// Which block each node landed in, indexed by `NodeId`. `None` for
    /// nodes never visited by the block-graph walk (pure value nodes are
    /// still assigned to the block of their nearest control-dependent
    /// user; only nodes unreachable from `proc.start` are `None`).
    pub assignment: Vec<Option<BlockId>>,
}

/// Discovers blocks and assigns nodes to them by walking the control
/// chain from `start`. Blocks here are keyed by discovery order, not yet
/// by `tid`; `global_code_motion` remaps everything into `tid` order once
/// the walk finishes.
struct Builder<'a> {
    cx: &'a Context,
    visited: Vec<bool>,
    assignment: Vec<Option<BlockId>>,
    blocks: IndexVec<BlockId, GcmBlock>,
    /// Block ids in the order their subtrees finished (postorder); reversed
    /// at the end this is reverse-postorder from the entry block.
    finish_order: Vec<BlockId>,
}

impl<'a> Builder<'a> {
    fn visit(&mut self, node: NodeId, current: Option<BlockId>) -> BlockId {
        if self.visited[node.index()] {
            return self.assignment[node.index()].expect("visited node must have an assignment");
        }
        self.visited[node.index()] = true;

        let mut new_block = None;
        let mut current = current;
        if self.cx.node(node).op.starts_block() {
            let id = self.blocks.push(GcmBlock {
                id: BlockId(0),
                tid: 0,
                nodes: Vec::new(),
                successors: Vec::new(),
                predecessors: Vec::new(),
                immediate_dominator: None,
            });
            self.blocks[id].id = id;
            current = Some(id);
            new_block = Some(id);
        }

        let current = current.expect("the first node visited (start) must start a block");
        self.assignment[node.index()] = Some(current);
        self.blocks[current].nodes.push(node);

        for &(user, _) in self.cx.node(node).users() {
            if !self.cx.node(user).op.produces_control() {
                continue;
            }
            let result = self.visit(user, Some(current));
            if result != current {
                self.blocks[current].successors.push(result);
            }
        }

        if let Some(id) = new_block {
            self.finish_order.push(id);
        }
        current
    }
}

fn fill_predecessors(blocks: &mut IndexVec<BlockId, GcmBlock>) {
    let edges: Vec<(BlockId, BlockId)> = blocks
        .iter_enumerated()
        .flat_map(|(id, b)| b.successors.iter().map(move |&s| (id, s)))
        .collect();
    for (from, to) in edges {
        blocks[to].predecessors.push(from);
    }
}

/// Two-finger dominator-chain intersection (Cooper, Harvey, Kennedy). Walks
/// in `tid` space, so `a > b` is the same test as "`a` was discovered after
/// `b` in reverse postorder".
fn intersect(idom: &[Option<usize>], mut a: usize, mut b: usize) -> usize {
    while a != b {
        while a > b {
            a = idom[a].expect("a block on the dominator chain above entry always has an idom");
        }
        while b > a {
            b = idom[b].expect("a block on the dominator chain above entry always has an idom");
        }
    }
    a
}

/// Computes each block's immediate dominator. Requires `blocks` to already
/// be in `tid` order (entry at index 0), which is what makes `intersect`'s
/// plain integer comparison equivalent to comparing reverse-postorder
/// positions.
fn build_dominator_tree(blocks: &IndexVec<BlockId, GcmBlock>) -> Vec<Option<BlockId>> {
    let n = blocks.len();
    let mut idom: Vec<Option<usize>> = vec![None; n];
    idom[0] = Some(0);

    loop {
        let mut changed = false;
        for t in 1..n {
            let block = &blocks[BlockId::from_usize(t)];
            let preds_with_idom: Vec<usize> = block
                .predecessors
                .iter()
                .map(|&p| p.index())
                .filter(|&pt| idom[pt].is_some())
                .collect();
            let mut new_idom = *preds_with_idom
                .first()
                .expect("every reachable block has at least one already-processed predecessor");
            for &pt in &preds_with_idom[1..] {
                new_idom = intersect(&idom, pt, new_idom);
            }
            if idom[t] != Some(new_idom) {
                idom[t] = Some(new_idom);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let mut result = vec![None; n];
    for t in 1..n {
        result[t] = idom[t].map(BlockId::from_usize);
    }
    result
}

/// Rebuilds the basic-block CFG for `proc` and computes its dominator
/// tree.
pub fn global_code_motion(cx: &Context, proc: Proc) -> ControlFlowGraph {
    let mut builder = Builder {
        cx,
        visited: vec![false; cx.len()],
        assignment: vec![None; cx.len()],
        blocks: IndexVec::new(),
        finish_order: Vec::new(),
    };
    let discovery_entry = builder.visit(proc.start, None);

    // `finish_order` reversed is reverse postorder from the entry block;
    // this is the order `blocks` must end up in so that a block's `tid`
    // and its position in `blocks` always agree.
    let rpo: Vec<BlockId> = builder.finish_order.iter().rev().copied().collect();
    let discovery_blocks = builder.blocks;
    let discovery_assignment = builder.assignment;

    let mut discovery_to_tid = vec![BlockId(0); discovery_blocks.len()];
    for (tid, &discovery_id) in rpo.iter().enumerate() {
        discovery_to_tid[discovery_id.index()] = BlockId::from_usize(tid);
    }

    let mut blocks: IndexVec<BlockId, GcmBlock> = IndexVec::new();
    for (tid, &discovery_id) in rpo.iter().enumerate() {
        let discovered = &discovery_blocks[discovery_id];
        let id = blocks.push(GcmBlock {
            id: BlockId(0),
            tid: tid as u32,
            nodes: discovered.nodes.clone(),
            successors: discovered
                .successors
                .iter()
                .map(|&s| discovery_to_tid[s.index()])
                .collect(),
            predecessors: Vec::new(),
            immediate_dominator: None,
        });
        blocks[id].id = id;
    }
    fill_predecessors(&mut blocks);

    let idoms = build_dominator_tree(&blocks);
    for (id, idom) in idoms.into_iter().enumerate() {
        blocks[BlockId::from_usize(id)].immediate_dominator = idom;
    }

    let assignment = discovery_assignment
        .into_iter()
        .map(|slot| slot.map(|b| discovery_to_tid[b.index()]))
        .collect();

    ControlFlowGraph {
        blocks,
        entry: discovery_to_tid[discovery_entry.index()],
        assignment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower_hir;
    use crate::opt::idealize_proc;

    fn cfg_for(src: &str) -> ControlFlowGraph {
        let mut interner = sonc_util::SymbolInterner::new();
        let program = sonc_front::parse(src, &mut interner).unwrap();
        let hir = sonc_front::lower_program(&program);
        let (mut cx, start, end) = lower_hir(&hir);
        let proc = cx.make_proc(start, end);
        idealize_proc(&mut cx, proc);
        global_code_motion(&cx, proc)
    }

    #[test]
    fn straight_line_function_is_a_single_block() {
        let cfg = cfg_for("fn main() { return 1 + 2; }");
        assert_eq!(cfg.blocks.len(), 1);
        assert!(cfg.blocks[cfg.entry].successors.is_empty());
        assert!(cfg.blocks[cfg.entry].immediate_dominator.is_none());
        assert_eq!(cfg.blocks[cfg.entry].tid, 0);
    }

    #[test]
    fn if_else_recovers_four_blocks_with_the_entry_as_idom_of_both_arms() {
        let cfg = cfg_for("fn main() { let x = 1; if (x) { x = 2; } else { x = 3; } return x; }");
        assert_eq!(cfg.blocks.len(), 4); // entry, then, else, join
        let entry = cfg.entry;
        for block in cfg.blocks.iter() {
            if block.id != entry && block.predecessors.contains(&entry) {
                assert_eq!(block.immediate_dominator, Some(entry));
            }
        }
    }

    #[test]
    fn while_loop_header_is_its_own_loop_back_edge_target() {
        let cfg = cfg_for("fn main() { while (1) { } return 0; }");
        assert_eq!(cfg.blocks.len(), 4); // entry, header, body, exit
        let header = cfg
            .blocks
            .iter()
            .find(|b| b.predecessors.len() == 2)
            .expect("loop header has two predecessors: entry and the back edge");
        assert_eq!(header.immediate_dominator, Some(cfg.entry));
    }

    #[test]
    fn blocks_are_stored_in_tid_order_matching_reverse_postorder() {
        let cfg = cfg_for("fn main() { let x = 1; if (x) { x = 2; } else { x = 3; } return x; }");
        for (i, block) in cfg.blocks.iter_enumerated() {
            assert_eq!(block.id, i);
            assert_eq!(block.tid as usize, i.index());
        }
        // Entry always comes first in reverse postorder.
        assert_eq!(cfg.blocks[cfg.entry].tid, 0);
        // Every block's tid must be smaller than any successor it falls
        // through to directly (a forward edge always increases tid); the
        // loop test below is the one place a successor can have a *smaller*
        // tid than its predecessor, via the back edge.
        for block in cfg.blocks.iter() {
            if block.id == cfg.entry {
                continue;
            }
            assert!(block.predecessors.iter().any(|&p| cfg.blocks[p].tid < block.tid));
        }
    }

    #[test]
    fn node_to_block_assignment_is_exposed_and_consistent_with_block_membership() {
        let cfg = cfg_for("fn main() { let x = 1; if (x) { x = 2; } else { x = 3; } return x; }");
        for block in cfg.blocks.iter() {
            for &node in &block.nodes {
                assert_eq!(cfg.assignment[node.index()], Some(block.id));
            }
        }
    }
}
