//! Kernel binding: resolves one kernel per statement node.

use tracing::debug;

use crate::error::Result;
use crate::graph::Graph;
use crate::kernel::{check_binding, select_kernel};

use super::{Pass, PassContext};

/// Selects and binds a kernel for every unbound statement, in topological
/// order. Binding runs inside the pipeline so later passes (weight staging)
/// can launch the bound kernels.
pub struct KernelBindPass;

impl Pass for KernelBindPass {
    fn name(&self) -> &'static str {
        "kernel_bind"
    }

    fn apply(&self, graph: &mut Graph, cx: &PassContext<'_>) -> Result<()> {
        for id in graph.stmt_topological_order()? {
            let stmt = graph
                .node_mut(id)
                .as_stmt_mut()
                .expect("stmt order yielded a non-stmt node");
            if stmt.kernel.is_some() {
                continue;
            }
            let kernel = select_kernel(stmt.op.as_ref(), &cx.place, cx.kernels, cx.contexts)?;
            check_binding(stmt.op.as_ref(), kernel.as_ref())?;
            debug!(op = stmt.op.op_type(), key = %kernel.key(), "bound kernel");
            stmt.kernel = Some(kernel);
        }
        Ok(())
    }
}
