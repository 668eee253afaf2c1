// src/ir/printer.rs
use crate::ir::function::Function;
use crate::ir::node::NodeData;
use std::fmt::{self, Write};

/// Renders the reachable part of the graph as Graphviz dot, one record per
/// node with data edges drawn solid and the node payload inlined into the
/// label. Used by the driver's `--dump-ir` flag.
pub fn graphviz(func: &Function) -> String {
    let mut out = String::new();
    write_graphviz(func, &mut out).expect("writing to a String cannot fail");
    out
}

fn write_graphviz(func: &Function, w: &mut impl Write) -> fmt::Result {
    writeln!(w, "digraph \"{}\" {{", func.name)?;
    writeln!(w, "  rankdir=BT;")?;
    writeln!(w, "  node [shape=box, fontname=monospace];")?;

    let mut reachable = func.reachable();
    reachable.sort_unstable();

    for &id in &reachable {
        let node = func.node(id);
        let label = match node.data {
            NodeData::None => format!("{id}: {}", node.kind.label()),
            NodeData::Constant(value) => format!("{id}: {} {value}", node.kind.label()),
            NodeData::Imm32(value) => format!("{id}: {} {value}", node.kind.label()),
        };
        writeln!(w, "  {id} [label=\"{label}\"];")?;

        for (i, input) in node.ins.iter().enumerate() {
            if let Some(input) = input {
                writeln!(w, "  {id} -> {input} [taillabel=\"{i}\"];")?;
            }
        }
    }

    writeln!(w, "}}")
}
