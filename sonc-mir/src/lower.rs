//! HIR → MIR lowering.
//!
//! Every mutable local gets a single `ALLOCA` at function entry:
//! reads lower to a `LOAD` that does not advance the store token, writes
//! lower to a `STORE` that does. Both `LOAD` and `STORE` are control
//! nodes, so the running `flow.control` cursor always advances past them
//! too — this is what lets global code motion's walk recover a total
//! order over memory operations.
//!
//! Structured control flow (`if`/`while`) becomes a `REGION`/`PHI` shell at
//! every reachable HIR block, including the entry block (whose one-slot
//! shell is fed by the synthetic start projections rather than a recorded
//! predecessor edge). Shells with a single input are trivial by
//! construction; idealization's region/phi-collapse rules fold them away,
//! so only a real merge point still has a `REGION`/`PHI` pair once
//! idealization finishes. Multiple `return` sites (and a block that falls
//! off the end) converge through one synthetic end-region before reaching
//! the single `END` node (the "end-merge": a region's input count always
//! matches the arity every phi anchored on it was sealed with).

use std::collections::HashMap;

use sonc_front::{HirBlockId, HirOp, HirProc, HirTerminator, HirValueId};
use sonc_util::Symbol;

use crate::node::{Context, NodeId};

/// The running control/store cursor threaded through a block's lowering.
#[derive(Clone, Copy)]
struct Flow {
    control: NodeId,
    store: NodeId,
}

struct PendingRegion {
    region: NodeId,
    phi: NodeId,
    /// One slot per predecessor, in `predecessors[block]` order.
    controls: Vec<Option<NodeId>>,
    stores: Vec<Option<NodeId>>,
}

struct Lowering<'a> {
    hir: &'a HirProc,
    cx: &'a mut Context,
    allocas: HashMap<Symbol, NodeId>,
    values: HashMap<HirValueId, NodeId>,
    predecessors: HashMap<HirBlockId, Vec<HirBlockId>>,
    regions: HashMap<HirBlockId, PendingRegion>,
    processed: Vec<bool>,
    returns: Vec<(NodeId, NodeId, Option<NodeId>)>,
}

fn successors(term: &HirTerminator) -> Vec<HirBlockId> {
    match *term {
        HirTerminator::Jump(t) => vec![t],
        HirTerminator::Branch(_, a, b) => vec![a, b],
        HirTerminator::Return(_) | HirTerminator::None => vec![],
    }
}

fn reachable_blocks(hir: &HirProc) -> Vec<HirBlockId> {
    use sonc_util::index_vec::Idx;
    let mut seen = vec![false; hir.blocks.len()];
    let mut order = Vec::new();
    let mut stack = vec![hir.entry];
    seen[hir.entry.index()] = true;
    while let Some(b) = stack.pop() {
        order.push(b);
        for s in successors(&hir.blocks[b].terminator) {
            if !seen[s.index()] {
                seen[s.index()] = true;
                stack.push(s);
            }
        }
    }
    order
}

impl<'a> Lowering<'a> {
    fn collect_locals(&mut self, reachable: &[HirBlockId]) {
        for &b in reachable {
            for inst in &self.hir.blocks[b].insts {
                let sym = match inst.op {
                    HirOp::Var(s) | HirOp::Assign(s, _) => s,
                    _ => continue,
                };
                self.allocas.entry(sym).or_insert_with(|| self.cx.node_alloca());
            }
        }
    }

    fn build_predecessors(&mut self, reachable: &[HirBlockId]) {
        for &b in reachable {
            for s in successors(&self.hir.blocks[b].terminator) {
                self.predecessors.entry(s).or_default().push(b);
            }
        }
    }

    /// Allocates a region/phi shell for every reachable block. The entry
    /// block gets a one-slot shell representing the synthetic start
    /// projections (`seed_entry_region` fills it directly, since there is
    /// no predecessor edge to record it from); every other reachable block
    /// gets a shell sized to its actual predecessor count.
    fn preallocate_regions(&mut self, reachable: &[HirBlockId]) {
        for &b in reachable {
            let pred_count = if b == self.hir.entry {
                1
            } else {
                self.predecessors.get(&b).map_or(0, |v| v.len())
            };
            if pred_count == 0 {
                continue;
            }
            let region = self.cx.node_region();
            let phi = self.cx.node_phi();
            self.regions.insert(
                b,
                PendingRegion {
                    region,
                    phi,
                    controls: vec![None; pred_count],
                    stores: vec![None; pred_count],
                },
            );
        }
    }

    /// Fills the entry block's one-slot shell from the function's start
    /// flow. Every other block's shell is filled by `record_edge` as its
    /// predecessors are processed; the entry block has no predecessor
    /// block to record an edge from, so it is seeded up front instead.
    fn seed_entry_region(&mut self, start: Flow) {
        if let Some(pending) = self.regions.get_mut(&self.hir.entry) {
            pending.controls[0] = Some(start.control);
            pending.stores[0] = Some(start.store);
        }
    }

    /// The entry flow for `block`: its region/phi shell, which every
    /// reachable block now has. `start` is only ever returned for a block
    /// with no recorded predecessors, which `process_block` never visits.
    fn entry_flow(&self, block: HirBlockId, start: Flow) -> Flow {
        if let Some(pending) = self.regions.get(&block) {
            return Flow {
                control: pending.region,
                store: pending.phi,
            };
        }
        start
    }

    fn record_edge(&mut self, from: HirBlockId, to: HirBlockId, exit: Flow) {
        if let Some(pending) = self.regions.get_mut(&to) {
            let position = self.predecessors[&to]
                .iter()
                .position(|&p| p == from)
                .expect("from must be a recorded predecessor of to");
            // A predecessor with two edges into the same successor (both
            // branch arms identical) fills each slot once, in order.
            let slot = pending
                .controls
                .iter()
                .enumerate()
                .skip(position)
                .find(|(_, v)| v.is_none())
                .map(|(i, _)| i)
                .unwrap_or(position);
            pending.controls[slot] = Some(exit.control);
            pending.stores[slot] = Some(exit.store);
        }
    }

    fn lower_expr(&mut self, flow: &mut Flow, id: HirValueId, op: HirOp) -> NodeId {
        let node = match op {
            HirOp::IntegerLiteral(v) => self.cx.node_integer_constant(v as i64),
            HirOp::Add(l, r) => self.cx.node_add(self.values[&l], self.values[&r]),
            HirOp::Sub(l, r) => self.cx.node_sub(self.values[&l], self.values[&r]),
            HirOp::Mul(l, r) => self.cx.node_mul(self.values[&l], self.values[&r]),
            HirOp::Div(l, r) => self.cx.node_sdiv(self.values[&l], self.values[&r]),
            HirOp::Neg(v) => {
                let zero = self.cx.node_integer_constant(0);
                self.cx.node_sub(zero, self.values[&v])
            }
            HirOp::Var(sym) => {
                let alloca = self.allocas[&sym];
                let load = self.cx.node_load(flow.control, flow.store, alloca);
                flow.control = load;
                load
            }
            HirOp::Assign(sym, value) => {
                let alloca = self.allocas[&sym];
                let value_node = self.values[&value];
                let store = self.cx.node_store(flow.control, flow.store, alloca, value_node);
                flow.control = store;
                flow.store = store;
                store
            }
        };
        self.values.insert(id, node);
        node
    }

    fn process_block(&mut self, block: HirBlockId, start: Flow) {
        use sonc_util::index_vec::Idx;
        if self.processed[block.index()] {
            return;
        }
        self.processed[block.index()] = true;

        let mut flow = self.entry_flow(block, start);
        let insts: Vec<_> = self.hir.blocks[block].insts.clone();
        for inst in insts {
            self.lower_expr(&mut flow, inst.id, inst.op);
        }

        match self.hir.blocks[block].terminator {
            HirTerminator::Jump(target) => {
                self.record_edge(block, target, flow);
                self.process_block(target, flow);
            }
            HirTerminator::Branch(cond, then_b, else_b) => {
                let predicate = self.values[&cond];
                let branch = self.cx.node_branch(flow.control, predicate);
                let on_true = self.cx.node_branch_true(branch);
                let on_false = self.cx.node_branch_false(branch);

                let then_flow = Flow { control: on_true, store: flow.store };
                let else_flow = Flow { control: on_false, store: flow.store };

                self.record_edge(block, then_b, then_flow);
                self.record_edge(block, else_b, else_flow);
                self.process_block(then_b, then_flow);
                self.process_block(else_b, else_flow);
            }
            HirTerminator::Return(value) => {
                let value_node = value.map(|v| self.values[&v]);
                self.returns.push((flow.control, flow.store, value_node));
            }
            HirTerminator::None => {
                self.returns.push((flow.control, flow.store, None));
            }
        }
    }

    fn seal_regions(&mut self) {
        for pending in self.regions.values() {
            let controls: Vec<NodeId> = pending
                .controls
                .iter()
                .map(|c| c.expect("every predecessor edge must be recorded before sealing"))
                .collect();
            let stores: Vec<NodeId> = pending
                .stores
                .iter()
                .map(|s| s.expect("every predecessor edge must be recorded before sealing"))
                .collect();
            self.cx.set_region_inputs(pending.region, &controls);
            self.cx.set_phi_inputs(pending.phi, pending.region, &stores);
        }
    }

    fn seal_end(&mut self) -> (NodeId, NodeId, NodeId) {
        assert!(!self.returns.is_empty(), "a lowered function must have at least one exit");
        if self.returns.len() == 1 {
            let (control, store, value) = self.returns[0];
            let value = value.unwrap_or_else(|| self.cx.node_null());
            return (control, store, value);
        }

        let null = self.cx.node_null();
        let controls: Vec<NodeId> = self.returns.iter().map(|(c, _, _)| *c).collect();
        let stores: Vec<NodeId> = self.returns.iter().map(|(_, s, _)| *s).collect();
        let values: Vec<NodeId> = self
            .returns
            .iter()
            .map(|(_, _, v)| v.unwrap_or(null))
            .collect();

        let end_region = self.cx.node_region();
        let store_phi = self.cx.node_phi();
        let value_phi = self.cx.node_phi();
        self.cx.set_region_inputs(end_region, &controls);
        self.cx.set_phi_inputs(store_phi, end_region, &stores);
        self.cx.set_phi_inputs(value_phi, end_region, &values);
        (end_region, store_phi, value_phi)
    }
}

/// Lowers a single-procedure HIR graph to the MIR kernel representation,
/// returning the freshly populated [`Context`] and the resulting
/// [`crate::node::Context`]'s start/end handle.
pub fn lower_hir(hir: &HirProc) -> (Context, NodeId, NodeId) {
    lower_hir_with(Context::new(), hir)
}

/// Like [`lower_hir`], but lowers into a caller-supplied [`Context`] (the
/// driver uses this to pre-size the scratch pool via
/// [`Context::with_arena_capacity`]).
pub fn lower_hir_with(mut cx: Context, hir: &HirProc) -> (Context, NodeId, NodeId) {
    let start = cx.node_start();
    let start_control = cx.node_start_control(start);
    let start_store = cx.node_start_store(start);

    let reachable = reachable_blocks(hir);

    let mut lowering = Lowering {
        hir,
        cx: &mut cx,
        allocas: HashMap::new(),
        values: HashMap::new(),
        predecessors: HashMap::new(),
        regions: HashMap::new(),
        processed: vec![false; hir.blocks.len()],
        returns: Vec::new(),
    };

    lowering.collect_locals(&reachable);
    lowering.build_predecessors(&reachable);
    lowering.preallocate_regions(&reachable);

    let entry_flow = Flow {
        control: start_control,
        store: start_store,
    };
    lowering.seed_entry_region(entry_flow);
    lowering.process_block(hir.entry, entry_flow);
    lowering.seal_regions();
    let (end_control, end_store, end_value) = lowering.seal_end();

    let end = cx.node_end(end_control, end_store, end_value);
    (cx, start, end)
}
