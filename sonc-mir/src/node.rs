//! The MIR graph kernel: node storage, the inputs/users bidirectional
//! linkage, and the opcode-specific constructors.
//!
//! Nodes are stable indices into an [`IndexVec`] owned by the [`Context`]
//! rather than arena pointers (Design Notes, "Arena + IDs as identity").

use sonc_util::index_vec::{Idx, IndexVec};
use sonc_util::{
    arena::{Bitset, ScratchPool},
    define_idx,
};

define_idx!(NodeId);

/// The fixed opcode enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Start,
    End,
    StartControl,
    StartStore,
    BranchTrue,
    BranchFalse,
    Null,
    IntegerConstant,
    Add,
    Sub,
    Mul,
    Sdiv,
    Alloca,
    Load,
    Store,
    Branch,
    Region,
    Phi,
}

impl Opcode {
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Start => "start",
            Opcode::End => "end",
            Opcode::StartControl => "start_control",
            Opcode::StartStore => "start_store",
            Opcode::BranchTrue => "branch_true",
            Opcode::BranchFalse => "branch_false",
            Opcode::Null => "null",
            Opcode::IntegerConstant => "integer_constant",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Sdiv => "sdiv",
            Opcode::Alloca => "alloca",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::Branch => "branch",
            Opcode::Region => "region",
            Opcode::Phi => "phi",
        }
    }

    /// A block starts at any node with one of these opcodes.
    pub fn starts_block(self) -> bool {
        matches!(
            self,
            Opcode::Start | Opcode::Region | Opcode::BranchTrue | Opcode::BranchFalse
        )
    }

    /// Whether this opcode has a control *output* another node can consume
    /// as a control input, i.e. whether GCM's block-graph walk should ever
    /// recurse into a user with this opcode. Every
    /// opcode that appears in the control chain between block starts
    /// (the control projection of `START`, `BRANCH` itself, and the
    /// control-threading `LOAD`/`STORE`) must produce control, or the walk
    /// would stop immediately after the entry block.
    pub fn produces_control(self) -> bool {
        matches!(
            self,
            Opcode::Start
                | Opcode::StartControl
                | Opcode::Branch
                | Opcode::Region
                | Opcode::BranchTrue
                | Opcode::BranchFalse
                | Opcode::Load
                | Opcode::Store
        )
    }
}

/// A node's inputs and users, kept symmetric: every input edge has a
/// matching back-edge in the target's user list.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub op: Opcode,
    inputs: Vec<Option<NodeId>>,
    pub data: Option<i64>,
    users: Vec<(NodeId, u32)>,
    /// `REGION`/`PHI` start unsealed (empty inputs) until their bulk setter
    /// runs exactly once (Design Notes, "builder state on the node").
    sealed: bool,
}

impl Node {
    pub fn inputs(&self) -> &[Option<NodeId>] {
        &self.inputs
    }

    pub fn users(&self) -> &[(NodeId, u32)] {
        &self.users
    }

    pub fn input(&self, index: usize) -> Option<NodeId> {
        self.inputs.get(index).copied().flatten()
    }
}

/// Owns every node allocated during a single compilation and the scratch
/// pool used by dead-code trimming, idealization's worklist seed, and GCM's
/// reachability marking.
pub struct Context {
    nodes: IndexVec<NodeId, Node>,
    pub scratch: ScratchPool,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Context {
            nodes: IndexVec::new(),
            scratch: ScratchPool::new(),
        }
    }

    /// Like [`Context::new`], but pre-sizes the scratch pool to
    /// `arena_size_bytes` per arena (the driver's `--arena-size`/
    /// `arena_size_bytes` knob).
    pub fn with_arena_capacity(arena_size_bytes: usize) -> Self {
        Context {
            nodes: IndexVec::new(),
            scratch: ScratchPool::with_capacity(arena_size_bytes),
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        self.nodes.indices()
    }

    fn make_node(&mut self, op: Opcode, arity: usize) -> NodeId {
        self.nodes.push(Node {
            id: NodeId(0),
            op,
            inputs: vec![None; arity],
            data: None,
            users: Vec::new(),
            sealed: true,
        })
    }

    /// Writes `u.inputs[index] = v` and records `(u, index)` in `v.users`.
    /// Precondition (asserted): `u.inputs[index]` is currently empty.
    pub fn set_input(&mut self, u: NodeId, index: usize, v: NodeId) {
        assert!(
            self.nodes[u].inputs[index].is_none(),
            "set_input: slot {index} of node {u:?} is already occupied"
        );
        self.nodes[u].inputs[index] = Some(v);
        self.nodes[v].users.push((u, index as u32));
    }

    // -- Anchors -----------------------------------------------------

    pub fn node_start(&mut self) -> NodeId {
        let id = self.make_node(Opcode::Start, 0);
        self.fix_id(id)
    }

    pub fn node_end(&mut self, control: NodeId, store: NodeId, return_value: NodeId) -> NodeId {
        let id = self.make_node(Opcode::End, 3);
        self.set_input(id, 0, control);
        self.set_input(id, 1, store);
        self.set_input(id, 2, return_value);
        self.fix_id(id)
    }

    // -- Values --------------------------------------------------------

    pub fn node_null(&mut self) -> NodeId {
        let id = self.make_node(Opcode::Null, 0);
        self.fix_id(id)
    }

    pub fn node_integer_constant(&mut self, value: i64) -> NodeId {
        let id = self.make_node(Opcode::IntegerConstant, 0);
        self.nodes[id].data = Some(value);
        self.fix_id(id)
    }

    pub fn node_alloca(&mut self) -> NodeId {
        let id = self.make_node(Opcode::Alloca, 0);
        self.fix_id(id)
    }

    fn make_binary(&mut self, op: Opcode, left: NodeId, right: NodeId) -> NodeId {
        let id = self.make_node(op, 2);
        self.set_input(id, 0, left);
        self.set_input(id, 1, right);
        self.fix_id(id)
    }

    pub fn node_add(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.make_binary(Opcode::Add, left, right)
    }

    pub fn node_sub(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.make_binary(Opcode::Sub, left, right)
    }

    pub fn node_mul(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.make_binary(Opcode::Mul, left, right)
    }

    pub fn node_sdiv(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.make_binary(Opcode::Sdiv, left, right)
    }

    // -- Memory / control ------------------------------------------------

    pub fn node_load(&mut self, control: NodeId, store: NodeId, address: NodeId) -> NodeId {
        let id = self.make_node(Opcode::Load, 3);
        self.set_input(id, 0, control);
        self.set_input(id, 1, store);
        self.set_input(id, 2, address);
        self.fix_id(id)
    }

    pub fn node_store(
        &mut self,
        control: NodeId,
        store: NodeId,
        address: NodeId,
        value: NodeId,
    ) -> NodeId {
        let id = self.make_node(Opcode::Store, 4);
        self.set_input(id, 0, control);
        self.set_input(id, 1, store);
        self.set_input(id, 2, address);
        self.set_input(id, 3, value);
        self.fix_id(id)
    }

    pub fn node_branch(&mut self, control: NodeId, predicate: NodeId) -> NodeId {
        let id = self.make_node(Opcode::Branch, 2);
        self.set_input(id, 0, control);
        self.set_input(id, 1, predicate);
        self.fix_id(id)
    }

    // -- Projections -----------------------------------------------------

    pub fn node_start_control(&mut self, start: NodeId) -> NodeId {
        assert_eq!(self.nodes[start].op, Opcode::Start);
        let id = self.make_node(Opcode::StartControl, 1);
        self.set_input(id, 0, start);
        self.fix_id(id)
    }

    pub fn node_start_store(&mut self, start: NodeId) -> NodeId {
        assert_eq!(self.nodes[start].op, Opcode::Start);
        let id = self.make_node(Opcode::StartStore, 1);
        self.set_input(id, 0, start);
        self.fix_id(id)
    }

    pub fn node_branch_true(&mut self, branch: NodeId) -> NodeId {
        assert_eq!(self.nodes[branch].op, Opcode::Branch);
        let id = self.make_node(Opcode::BranchTrue, 1);
        self.set_input(id, 0, branch);
        self.fix_id(id)
    }

    pub fn node_branch_false(&mut self, branch: NodeId) -> NodeId {
        assert_eq!(self.nodes[branch].op, Opcode::Branch);
        let id = self.make_node(Opcode::BranchFalse, 1);
        self.set_input(id, 0, branch);
        self.fix_id(id)
    }

    // -- Region / phi: two-stage construction ----------------------------

    pub fn node_region(&mut self) -> NodeId {
        let id = self.nodes.push(Node {
            id: NodeId(0),
            op: Opcode::Region,
            inputs: Vec::new(),
            data: None,
            users: Vec::new(),
            sealed: false,
        });
        self.fix_id(id)
    }

    pub fn node_phi(&mut self) -> NodeId {
        let id = self.nodes.push(Node {
            id: NodeId(0),
            op: Opcode::Phi,
            inputs: Vec::new(),
            data: None,
            users: Vec::new(),
            sealed: false,
        });
        self.fix_id(id)
    }

    /// Allocates `region`'s input vector and fills it in one shot. Calling
    /// this twice on the same region is a programming error.
    pub fn set_region_inputs(&mut self, region: NodeId, inputs: &[NodeId]) {
        assert_eq!(self.nodes[region].op, Opcode::Region);
        assert!(!self.nodes[region].sealed, "region {region:?} already sealed");
        self.nodes[region].inputs = vec![None; inputs.len()];
        self.nodes[region].sealed = true;
        for (i, &input) in inputs.iter().enumerate() {
            self.set_input(region, i, input);
        }
    }

    /// Allocates `phi`'s input vector (`region` plus one value per
    /// predecessor) and fills it in one shot.
    pub fn set_phi_inputs(&mut self, phi: NodeId, region: NodeId, inputs: &[NodeId]) {
        assert_eq!(self.nodes[phi].op, Opcode::Phi);
        assert_eq!(self.nodes[region].op, Opcode::Region);
        assert!(!self.nodes[phi].sealed, "phi {phi:?} already sealed");
        self.nodes[phi].inputs = vec![None; inputs.len() + 1];
        self.nodes[phi].sealed = true;
        self.set_input(phi, 0, region);
        for (i, &input) in inputs.iter().enumerate() {
            self.set_input(phi, i + 1, input);
        }
    }

    fn fix_id(&mut self, id: NodeId) -> NodeId {
        self.nodes[id].id = id;
        id
    }

    // -- Idealization support --------------------------------------------

    /// Rewrites every use of `target` to point at `source` instead, then
    /// unlinks `target` (cascading into any of its inputs that become dead
    /// as a result). Mirrors the reference optimizer's
    /// `replace_node`/`delete_node` pair (opt.c).
    pub fn replace(&mut self, target: NodeId, source: NodeId) {
        let users = std::mem::take(&mut self.nodes[target].users);
        for &(user, index) in &users {
            self.nodes[user].inputs[index as usize] = Some(source);
            self.nodes[source].users.push((user, index));
        }
        self.delete(target);
    }

    fn delete(&mut self, node: NodeId) {
        assert!(
            self.nodes[node].users.is_empty(),
            "cannot delete node {node:?}: still has users"
        );
        let inputs: Vec<NodeId> = self.nodes[node].inputs.iter().filter_map(|i| *i).collect();
        for input in inputs {
            self.nodes[input].users.retain(|&(u, _)| u != node);
            if self.nodes[input].users.is_empty() {
                self.delete(input);
            }
        }
    }

    /// Marks every node reachable backwards from `end` through `inputs` as
    /// live, asserts `start` is among them, then prunes every node's user
    /// list down to only its live users. Mirrors `mark_useful`/`trim` in
    /// sb.c.
    pub fn make_proc(&mut self, start: NodeId, end: NodeId) -> Proc {
        let scratch = self.scratch.acquire(&[]);
        let n = self.nodes.len();
        let useful = self.scratch.bitset(&scratch, n);
        self.mark_useful(useful, end);
        assert!(
            self.scratch.bitset_get(&useful, start.index()),
            "start is not reachable from end"
        );

        let trimmed = self.scratch.bitset(&scratch, n);
        self.trim(trimmed, useful, end);

        self.scratch.release(scratch);
        Proc { start, end }
    }

    fn mark_useful(&mut self, useful: Bitset, node: NodeId) {
        if self.scratch.bitset_get(&useful, node.index()) {
            return;
        }
        self.scratch.bitset_set(&useful, node.index());
        let inputs: Vec<NodeId> = self.nodes[node].inputs.iter().filter_map(|i| *i).collect();
        for input in inputs {
            self.mark_useful(useful, input);
        }
    }

    fn trim(&mut self, trimmed: Bitset, useful: Bitset, node: NodeId) {
        if self.scratch.bitset_get(&trimmed, node.index()) {
            return;
        }
        self.scratch.bitset_set(&trimmed, node.index());
        self.nodes[node]
            .users
            .retain(|&(u, _)| self.scratch.bitset_get(&useful, u.index()));
        let inputs: Vec<NodeId> = self.nodes[node].inputs.iter().filter_map(|i| *i).collect();
        for input in inputs {
            self.trim(trimmed, useful, input);
        }
    }
}

/// A handle to a finished, trimmed procedure graph.
#[derive(Debug, Clone, Copy)]
pub struct Proc {
    pub start: NodeId,
    pub end: NodeId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn use_def_symmetry_holds_after_set_input() {
        let mut cx = Context::new();
        let a = cx.node_integer_constant(1);
        let b = cx.node_integer_constant(2);
        let add = cx.node_add(a, b);

        assert_eq!(cx.node(add).input(0), Some(a));
        assert_eq!(cx.node(add).input(1), Some(b));
        assert!(cx.node(a).users().contains(&(add, 0)));
        assert!(cx.node(b).users().contains(&(add, 1)));
    }

    #[test]
    #[should_panic(expected = "already occupied")]
    fn set_input_twice_on_the_same_slot_panics() {
        let mut cx = Context::new();
        let a = cx.node_integer_constant(1);
        let start = cx.node_start();
        cx.set_input(start, 0, a); // START has arity 0: any index panics on bounds first
    }

    #[test]
    fn region_phi_two_stage_construction() {
        let mut cx = Context::new();
        let c0 = cx.node_integer_constant(0);
        let c1 = cx.node_integer_constant(1);
        let region = cx.node_region();
        let phi = cx.node_phi();

        cx.set_region_inputs(region, &[c0, c1]);
        cx.set_phi_inputs(phi, region, &[c0, c1]);

        assert_eq!(cx.node(region).inputs().len(), 2);
        assert_eq!(cx.node(phi).inputs().len(), 3);
        assert_eq!(cx.node(phi).input(0), Some(region));
    }

    #[test]
    #[should_panic(expected = "already sealed")]
    fn bulk_setting_a_region_twice_panics() {
        let mut cx = Context::new();
        let c0 = cx.node_integer_constant(0);
        let region = cx.node_region();
        cx.set_region_inputs(region, &[c0]);
        cx.set_region_inputs(region, &[c0]);
    }

    #[test]
    fn ids_are_dense_and_stable() {
        let mut cx = Context::new();
        let a = cx.node_null();
        let b = cx.node_null();
        assert_ne!(a, b);
        assert_eq!(cx.node(a).id, a);
    }

    #[test]
    fn make_proc_trims_dead_users_but_keeps_live_inputs() {
        let mut cx = Context::new();
        let start = cx.node_start();
        let control = cx.node_start_control(start);
        let store = cx.node_start_store(start);
        let shared = cx.node_integer_constant(5);
        let dead = cx.node_add(shared, shared); // never wired into end
        let end = cx.node_end(control, store, shared);

        let proc = cx.make_proc(start, end);
        assert_eq!(proc.start, start);
        assert_eq!(proc.end, end);
        // `dead` is unreachable from `end`, so trimming must drop it from
        // `shared`'s user list even though nothing deleted it outright.
        assert!(!cx.node(shared).users().iter().any(|&(u, _)| u == dead));
    }

    #[test]
    fn replace_rewires_users_and_deletes_the_dead_node() {
        let mut cx = Context::new();
        let a = cx.node_integer_constant(1);
        let b = cx.node_integer_constant(2);
        let add1 = cx.node_add(a, b);
        let add2 = cx.node_add(add1, a);

        cx.replace(add1, a);

        assert_eq!(cx.node(add2).input(0), Some(a));
        assert!(cx.node(a).users().contains(&(add2, 0)));
        assert!(!cx.node(a).users().iter().any(|&(u, _)| u == add1));
    }
}
