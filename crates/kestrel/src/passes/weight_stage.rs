//! Compile-time staging of constant weights onto a device.

use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::{Graph, NodeKind};
use crate::place::Target;

use super::{Pass, PassContext};

/// Launches every `io_copy_once` statement during the pass itself, so
/// constant weights are device-resident before the first `run`.
///
/// This is the one pass allowed to launch kernels at compile time
/// ([`Pass::launches_kernels`]); it only applies to targets that require
/// explicit device-resident weight copies.
pub struct WeightStagePass;

impl Pass for WeightStagePass {
    fn name(&self) -> &'static str {
        "weight_stage"
    }

    fn apply(&self, graph: &mut Graph, _cx: &PassContext<'_>) -> Result<()> {
        for id in graph.stmt_topological_order()? {
            let node = graph.node_mut(id);
            let NodeKind::Stmt(stmt) = &mut node.kind else {
                continue;
            };
            if stmt.op.op_type() != "io_copy_once" {
                continue;
            }
            stmt.op.infer_shape()?;
            let kernel = stmt.kernel.as_mut().ok_or_else(|| {
                Error::compile("weight staging requires kernels to be bound first")
            })?;
            debug!(key = %kernel.key(), "staging weights at compile time");
            kernel.launch(stmt.op.as_ref())?;
        }
        Ok(())
    }

    fn bound_targets(&self) -> &[Target] {
        &[Target::Npu]
    }

    fn launches_kernels(&self) -> bool {
        true
    }
}
