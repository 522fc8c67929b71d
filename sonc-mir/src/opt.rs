//! The idealization pass: a worklist-driven peephole optimizer that
//! collapses trivial `REGION`/`PHI` nodes, grounded on opt.c's
//! `sb_opt`/`_idealize_phi`/`_idealize_region`.
//!
//! opt.c backs its worklist with an open-addressed hash table keyed by
//! node id, because in C there is no data structure
//! that turns an arbitrary integer id into an O(1) "is this queued"
//! lookup. Our node ids are already dense `u32`s handed out by an
//! [`IndexVec`](sonc_util::index_vec::IndexVec), so the idiomatic
//! replacement is a direct position array rather than a reimplemented hash
//! table.

use tracing::debug;

use sonc_util::index_vec::Idx;

use crate::node::{Context, NodeId, Opcode, Proc};

struct WorkList {
    stack: Vec<NodeId>,
    position: Vec<Option<u32>>,
}

impl WorkList {
    fn new(node_count: usize) -> Self {
        WorkList {
            stack: Vec::new(),
            position: vec![None; node_count],
        }
    }

    fn has(&self, id: NodeId) -> bool {
        self.position[id.index()].is_some()
    }

    fn add(&mut self, id: NodeId) {
        if self.has(id) {
            return;
        }
        let index = self.stack.len() as u32;
        self.stack.push(id);
        self.position[id.index()] = Some(index);
    }

    /// Seeds the worklist with every node reachable from `seed` through its
    /// inputs, mirroring `_work_list_init`.
    fn seed(&mut self, cx: &Context, seed: NodeId) {
        if self.has(seed) {
            return;
        }
        self.add(seed);
        for &input in cx.node(seed).inputs().iter().flatten() {
            self.seed(cx, input);
        }
    }

    fn pop(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.position[id.index()] = None;
        Some(id)
    }
}

/// Returns the input this node should be replaced by, or `node` itself if
/// no rewrite applies. A `PHI` whose non-self inputs all agree on one
/// value collapses to that value (and re-enqueues its region, since the
/// region may now itself be collapsible).
fn idealize_phi(work_list: &mut WorkList, cx: &Context, node: NodeId) -> NodeId {
    let inputs = cx.node(node).inputs();
    let mut same: Option<NodeId> = None;
    for &input in inputs[1..].iter().flatten() {
        if input == node {
            continue;
        }
        match same {
            None => same = Some(input),
            Some(s) if s != input => return node,
            _ => {}
        }
    }
    let Some(same) = same else { return node };
    // A phi built from a sealed, well-formed region always has at least
    // one real (non-self) input, so `same` is always found here; the
    // region itself may have become dead as a result.
    if let Some(region) = cx.node(node).input(0) {
        work_list.add(region);
    }
    same
}

/// A `REGION` with a live phi anchored at its own input slot 0 can never
/// be eliminated (the phi still needs to distinguish predecessors). Absent
/// that, a region whose inputs all agree collapses to that one input.
fn idealize_region(cx: &Context, node: NodeId) -> NodeId {
    for &(user, index) in cx.node(node).users() {
        if cx.node(user).op == Opcode::Phi && index == 0 {
            return node;
        }
    }

    let mut same: Option<NodeId> = None;
    for &input in cx.node(node).inputs().iter().flatten() {
        match same {
            None => same = Some(input),
            Some(s) if s != input => return node,
            _ => {}
        }
    }
    same.unwrap_or(node)
}

fn idealize(work_list: &mut WorkList, cx: &Context, node: NodeId) -> Option<NodeId> {
    match cx.node(node).op {
        Opcode::Phi => Some(idealize_phi(work_list, cx, node)),
        Opcode::Region => Some(idealize_region(cx, node)),
        _ => None,
    }
}

fn queue_users(work_list: &mut WorkList, cx: &Context, node: NodeId) {
    for &(user, _) in cx.node(node).users() {
        work_list.add(user);
    }
}

/// Runs the idealization worklist to a fixed point over `proc`.
pub fn idealize_proc(cx: &mut Context, proc: Proc) {
    let mut work_list = WorkList::new(cx.len());
    work_list.seed(cx, proc.end);

    while let Some(node) = work_list.pop() {
        let Some(ideal) = idealize(&mut work_list, cx, node) else {
            continue;
        };
        if ideal != node {
            debug!(node = node.index(), replacement = ideal.index(), op = cx.node(node).op.name(), "idealize");
            queue_users(&mut work_list, cx, node);
            cx.replace(node, ideal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower_hir;

    fn idealized(src: &str) -> (Context, NodeId, NodeId) {
        let mut interner = sonc_util::SymbolInterner::new();
        let program = sonc_front::parse(src, &mut interner).unwrap();
        let hir = sonc_front::lower_program(&program);
        let (mut cx, start, end) = lower_hir(&hir);
        let proc = cx.make_proc(start, end);
        idealize_proc(&mut cx, proc);
        (cx, proc.start, proc.end)
    }

    #[test]
    fn a_join_phi_whose_arms_never_diverged_collapses_to_the_shared_store() {
        // Neither branch writes to `x`, so the store token reaching the
        // join point is literally the same node on both arms; the merge
        // phi should collapse away entirely.
        let (cx, _start, end) = idealized("fn main() { let x = 1; if (x) { } else { } return x; }");
        let return_value = cx.node(end).input(2).unwrap();
        assert_eq!(cx.node(return_value).op, Opcode::Load);
        let store_input = cx.node(return_value).input(1).unwrap();
        assert_ne!(cx.node(store_input).op, Opcode::Phi);
    }

    #[test]
    fn straight_line_function_is_unaffected() {
        let (cx, _start, end) = idealized("fn main() { return 1 + 2; }");
        let return_value = cx.node(end).input(2).unwrap();
        assert_eq!(cx.node(return_value).op, Opcode::Add);
    }

    #[test]
    fn idealizing_a_graph_with_no_phis_or_regions_is_a_no_op() {
        let (cx, _start, end) = idealized("fn main() { let x = 1 + 2; return x; }");
        let return_value = cx.node(end).input(2).unwrap();
        assert_eq!(cx.node(return_value).op, Opcode::Load);
    }
}
