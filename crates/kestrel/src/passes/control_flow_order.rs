//! Deterministic ordering of sibling control-flow operations.

use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::op::ControlFlowKind;

use super::{Pass, PassContext};

/// Threads a synthetic data dependency between loop/branch statements that
/// share a graph, in ascending `sub_block` order.
///
/// Sibling control-flow operations often have no data dependency between
/// them; without an artificial edge their relative execution order would be
/// left to topological tie-breaking. The synthetic argument between each
/// consecutive pair pins the order to the block nesting sequence.
pub struct ControlFlowOrderPass;

impl Pass for ControlFlowOrderPass {
    fn name(&self) -> &'static str {
        "control_flow_order"
    }

    fn apply(&self, graph: &mut Graph, _cx: &PassContext<'_>) -> Result<()> {
        let mut control_flow_ops = Vec::new();
        for id in graph.node_ids() {
            let Some(stmt) = graph.node(id).as_stmt() else {
                continue;
            };
            if !matches!(
                stmt.op.control_flow(),
                Some(ControlFlowKind::Loop) | Some(ControlFlowKind::Branch)
            ) {
                continue;
            }
            let sub_block = stmt.op.desc().sub_block().ok_or_else(|| {
                Error::ir_integrity(format!(
                    "control-flow op '{}' missing the sub_block attribute",
                    stmt.op_type()
                ))
            })?;
            control_flow_ops.push((sub_block, id));
        }

        control_flow_ops.sort_by_key(|(sub_block, _)| *sub_block);
        for pair in control_flow_ops.windows(2) {
            let (from_block, producer) = pair[0];
            let (to_block, consumer) = pair[1];
            let name = format!("control_flow_op_{from_block}_to_{to_block}");
            debug!(arg = %name, "threading control-flow order dependency");
            let arg = graph.new_argument_node(&name, false);
            graph.link(producer, arg)?;
            graph.link(arg, consumer)?;
        }
        Ok(())
    }
}
