//! Built-in operation implementations.
//!
//! These cover the io boundary (feed/fetch/device copies), the control-flow
//! family, and a couple of elementwise compute ops used by host kernels and
//! the test suites. Anything heavier lives with the kernel libraries.

mod control_flow;
mod elementwise;
mod io;

pub use control_flow::{ConditionalBlockOp, SubgraphOp, WhileOp};
pub use elementwise::{ReluOp, ScaleOp};
pub use io::{FeedOp, FetchOp, IoCopyOp};

use std::sync::Arc;

use crate::desc::OpDesc;
use crate::error::{Error, Result};
use crate::op::OpRegistry;
use crate::workspace::{Scope, VarRef};

/// Registers every built-in operation type.
pub fn register_builtin_ops(registry: &mut OpRegistry) {
    registry.register("feed", || Box::new(FeedOp::new()));
    registry.register("fetch", || Box::new(FetchOp::new()));
    registry.register("io_copy", || Box::new(IoCopyOp::new(false)));
    registry.register("io_copy_once", || Box::new(IoCopyOp::new(true)));
    registry.register("while", || Box::new(WhileOp::new()));
    registry.register("conditional_block", || Box::new(ConditionalBlockOp::new()));
    registry.register("subgraph", || Box::new(SubgraphOp::new()));
    registry.register("relu", || Box::new(ReluOp::new()));
    registry.register("scale", || Box::new(ScaleOp::new()));
}

/// Description and scope bound to an op by `attach`.
pub(crate) struct Attachment {
    pub desc: OpDesc,
    pub scope: Arc<Scope>,
}

impl Attachment {
    pub fn new(desc: &OpDesc, scope: &Arc<Scope>) -> Self {
        Attachment {
            desc: desc.clone(),
            scope: Arc::clone(scope),
        }
    }

    /// Resolves the idx-th input operand through the scope chain.
    pub fn input_var(&self, idx: usize) -> Result<VarRef> {
        let name = self.desc.inputs.get(idx).ok_or_else(|| {
            Error::ir_integrity(format!(
                "op '{}' has no input operand {idx}",
                self.desc.op_type
            ))
        })?;
        self.scope.find_var(name).ok_or_else(|| {
            Error::workspace(format!(
                "input '{name}' of op '{}' not found in workspace",
                self.desc.op_type
            ))
        })
    }

    /// Resolves the idx-th output operand through the scope chain.
    pub fn output_var(&self, idx: usize) -> Result<VarRef> {
        let name = self.desc.outputs.get(idx).ok_or_else(|| {
            Error::ir_integrity(format!(
                "op '{}' has no output operand {idx}",
                self.desc.op_type
            ))
        })?;
        self.scope.find_var(name).ok_or_else(|| {
            Error::workspace(format!(
                "output '{name}' of op '{}' not found in workspace",
                self.desc.op_type
            ))
        })
    }
}

/// Checks the attached description declares exactly the expected operand counts.
pub(crate) fn expect_arity(desc: &OpDesc, inputs: usize, outputs: usize) -> Result<()> {
    if desc.inputs.len() != inputs || desc.outputs.len() != outputs {
        return Err(Error::ir_integrity(format!(
            "op '{}' expects {inputs} input(s) and {outputs} output(s), got {} and {}",
            desc.op_type,
            desc.inputs.len(),
            desc.outputs.len()
        )));
    }
    Ok(())
}

pub(crate) fn attachment(attachment: &Option<Attachment>) -> &Attachment {
    attachment.as_ref().expect("op not attached")
}
