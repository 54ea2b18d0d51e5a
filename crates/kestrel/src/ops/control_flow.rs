//! Control-flow operations: loops, conditional branches, device offload.
//!
//! Each kind is resolved once at instantiation through
//! [`ControlFlowKind`](crate::op::ControlFlowKind); the builder and the
//! serializer dispatch on the kind, never on the type string.

use std::sync::{Arc, RwLock};

use crate::desc::{BlockDesc, OpDesc, ProgramDesc};
use crate::error::{Error, Result};
use crate::op::{ControlFlowKind, Op};
use crate::workspace::Scope;

use super::{attachment, Attachment};

/// Repeats its sub-block while the condition operand holds.
pub struct WhileOp {
    attached: Option<Attachment>,
    sub_block: Option<BlockDesc>,
}

impl WhileOp {
    pub fn new() -> Self {
        WhileOp {
            attached: None,
            sub_block: None,
        }
    }

    pub fn sub_block_desc(&self) -> Option<&BlockDesc> {
        self.sub_block.as_ref()
    }
}

impl Op for WhileOp {
    fn op_type(&self) -> &str {
        "while"
    }

    fn attach(&mut self, desc: &OpDesc, scope: &Arc<Scope>) -> Result<()> {
        if desc.inputs.is_empty() {
            return Err(Error::ir_integrity(
                "while op requires a condition input operand",
            ));
        }
        if desc.sub_block().is_none() {
            return Err(Error::ir_integrity(
                "while op missing the sub_block attribute",
            ));
        }
        self.attached = Some(Attachment::new(desc, scope));
        Ok(())
    }

    fn desc(&self) -> &OpDesc {
        &attachment(&self.attached).desc
    }

    fn scope(&self) -> &Arc<Scope> {
        &attachment(&self.attached).scope
    }

    fn check_shape(&self) -> Result<()> {
        attachment(&self.attached).input_var(0)?;
        Ok(())
    }

    fn infer_shape(&self) -> Result<()> {
        // Body instructions propagate their own shapes each iteration.
        Ok(())
    }

    fn control_flow(&self) -> Option<ControlFlowKind> {
        Some(ControlFlowKind::Loop)
    }

    fn attach_sub_block(&mut self, block: BlockDesc) -> Result<()> {
        self.sub_block = Some(block);
        Ok(())
    }
}

/// Runs its sub-block once when the condition operand holds.
pub struct ConditionalBlockOp {
    attached: Option<Attachment>,
    sub_block: Option<BlockDesc>,
}

impl ConditionalBlockOp {
    pub fn new() -> Self {
        ConditionalBlockOp {
            attached: None,
            sub_block: None,
        }
    }

    pub fn sub_block_desc(&self) -> Option<&BlockDesc> {
        self.sub_block.as_ref()
    }
}

impl Op for ConditionalBlockOp {
    fn op_type(&self) -> &str {
        "conditional_block"
    }

    fn attach(&mut self, desc: &OpDesc, scope: &Arc<Scope>) -> Result<()> {
        if desc.inputs.is_empty() {
            return Err(Error::ir_integrity(
                "conditional_block op requires a condition input operand",
            ));
        }
        if desc.sub_block().is_none() {
            return Err(Error::ir_integrity(
                "conditional_block op missing the sub_block attribute",
            ));
        }
        self.attached = Some(Attachment::new(desc, scope));
        Ok(())
    }

    fn desc(&self) -> &OpDesc {
        &attachment(&self.attached).desc
    }

    fn scope(&self) -> &Arc<Scope> {
        &attachment(&self.attached).scope
    }

    fn check_shape(&self) -> Result<()> {
        attachment(&self.attached).input_var(0)?;
        Ok(())
    }

    fn infer_shape(&self) -> Result<()> {
        Ok(())
    }

    fn control_flow(&self) -> Option<ControlFlowKind> {
        Some(ControlFlowKind::Branch)
    }

    fn attach_sub_block(&mut self, block: BlockDesc) -> Result<()> {
        self.sub_block = Some(block);
        Ok(())
    }
}

/// Region of the program compiled into a device-resident executable.
///
/// A freshly partitioned region starts detached: it owns a standalone
/// description and its `sub_block` attribute is 0 until
/// `save_op_infos` materializes the region as a new block of the owning
/// program and rewrites the attribute.
pub struct SubgraphOp {
    attached: Option<Attachment>,
    program: Option<Arc<RwLock<ProgramDesc>>>,
    detached: Option<ProgramDesc>,
}

impl SubgraphOp {
    pub fn new() -> Self {
        SubgraphOp {
            attached: None,
            program: None,
            detached: None,
        }
    }

    pub fn program_desc(&self) -> Option<&Arc<RwLock<ProgramDesc>>> {
        self.program.as_ref()
    }
}

impl Op for SubgraphOp {
    fn op_type(&self) -> &str {
        "subgraph"
    }

    fn attach(&mut self, desc: &OpDesc, scope: &Arc<Scope>) -> Result<()> {
        if desc.sub_block().is_none() {
            return Err(Error::ir_integrity(
                "subgraph op missing the sub_block attribute",
            ));
        }
        self.attached = Some(Attachment::new(desc, scope));
        Ok(())
    }

    fn desc(&self) -> &OpDesc {
        &attachment(&self.attached).desc
    }

    fn scope(&self) -> &Arc<Scope> {
        &attachment(&self.attached).scope
    }

    fn check_shape(&self) -> Result<()> {
        Ok(())
    }

    fn infer_shape(&self) -> Result<()> {
        Ok(())
    }

    fn control_flow(&self) -> Option<ControlFlowKind> {
        Some(ControlFlowKind::Offload)
    }

    fn attach_program(&mut self, desc: Arc<RwLock<ProgramDesc>>) -> Result<()> {
        self.program = Some(desc);
        Ok(())
    }

    fn set_detached_program(&mut self, desc: ProgramDesc) -> Result<()> {
        if desc.blocks.is_empty() {
            return Err(Error::compile(
                "detached subgraph description has no blocks",
            ));
        }
        self.detached = Some(desc);
        Ok(())
    }

    fn take_detached_program(&mut self) -> Option<ProgramDesc> {
        self.detached.take()
    }
}
