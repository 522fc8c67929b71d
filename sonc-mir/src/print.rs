//! Output formats: a graphviz node-and-edge dump (`sb_visualize` in sb.c)
//! and a plain-text basic-block listing (`gcm_print` in gcm.c).

use std::fmt::Write as _;

use sonc_util::index_vec::Idx;

use crate::gcm::{BlockId, ControlFlowGraph};
use crate::node::{Context, NodeId};

/// Renders the graph reachable (through inputs) from `end` as a Graphviz
/// `digraph`.
pub fn graphviz(cx: &Context, end: NodeId) -> String {
    let mut out = String::new();
    let mut visited = vec![false; cx.len()];
    writeln!(out, "digraph G {{").unwrap();
    graphviz_node(cx, &mut visited, &mut out, end);
    writeln!(out, "}}").unwrap();
    out
}

fn graphviz_node(cx: &Context, visited: &mut [bool], out: &mut String, node: NodeId) {
    if visited[node.index()] {
        return;
    }
    visited[node.index()] = true;

    let n = cx.node(node);
    let inputs = n.inputs();
    write!(out, "  n{} [shape=\"record\",label=\"", node.index()).unwrap();
    if inputs.is_empty() {
        write!(out, "{}", n.op.name()).unwrap();
    } else {
        write!(out, "{{{{").unwrap();
        for i in 0..inputs.len() {
            if i > 0 {
                write!(out, "|").unwrap();
            }
            write!(out, "<i{i}>{i}").unwrap();
        }
        write!(out, "}}|{}}}", n.op.name()).unwrap();
    }
    writeln!(out, "\"];").unwrap();

    for (i, input) in inputs.iter().enumerate() {
        if let Some(input) = input {
            graphviz_node(cx, visited, out, *input);
            writeln!(out, "  n{} -> n{}:i{}", input.index(), node.index(), i).unwrap();
        }
    }
}

fn tid_of(cfg: &ControlFlowGraph, id: BlockId) -> u32 {
    cfg.blocks[id].tid
}

/// Renders `cfg` as a `bb_N:`/`idom:`/`jmp` listing, one block per
/// paragraph, numbered by `tid` rather than the block's raw id so the
/// listing always reads in reverse-postorder.
pub fn format_blocks(cfg: &ControlFlowGraph) -> String {
    let mut out = String::new();
    for block in cfg.blocks.iter() {
        writeln!(out, "bb_{}:", block.tid).unwrap();
        if let Some(idom) = block.immediate_dominator {
            writeln!(out, "  idom: bb_{}", tid_of(cfg, idom)).unwrap();
        }
        if block.successors.len() == 1 {
            writeln!(out, "  jmp bb_{}", tid_of(cfg, block.successors[0])).unwrap();
        }
    }
    out
}
