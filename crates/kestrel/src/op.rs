//! Operation contract and the operation registry.
//!
//! An [`Op`] is the compile-time half of a statement: it validates and infers
//! shapes against the workspace, while the bound kernel performs the launch.
//! Control-flow behavior is a closed [`ControlFlowKind`] resolved once when
//! the operation is instantiated, never re-derived from type strings later.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::desc::{BlockDesc, OpDesc, ProgramDesc};
use crate::error::{Error, Result};
use crate::workspace::Scope;

/// Control-flow capability of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlowKind {
    /// Repeats its sub-block while a condition holds (`while`).
    Loop,
    /// Runs its sub-block when a condition holds (`conditional_block`).
    Branch,
    /// Offloads its sub-block to a device-resident executable (`subgraph`).
    Offload,
}

/// One operation statement, attachable to a description and a workspace.
pub trait Op: Send {
    fn op_type(&self) -> &str;

    /// Binds the operation to its description and execution scope.
    fn attach(&mut self, desc: &OpDesc, scope: &Arc<Scope>) -> Result<()>;

    /// The attached description. Panics if `attach` has not run.
    fn desc(&self) -> &OpDesc;

    /// The attached execution scope. Panics if `attach` has not run.
    fn scope(&self) -> &Arc<Scope>;

    /// One-time structural validation, run on an instruction's first epoch.
    fn check_shape(&self) -> Result<()>;

    /// Per-execution output shape propagation, run before every launch.
    fn infer_shape(&self) -> Result<()>;

    /// Whether the instruction short-circuits after its first successful run.
    fn run_once(&self) -> bool {
        false
    }

    fn control_flow(&self) -> Option<ControlFlowKind> {
        None
    }

    /// Hands a `Loop`/`Branch` operation the block it executes.
    fn attach_sub_block(&mut self, block: BlockDesc) -> Result<()> {
        let _ = block;
        Err(Error::compile(format!(
            "op '{}' does not accept a sub-block",
            self.op_type()
        )))
    }

    /// Hands an `Offload` operation the whole program description, which it
    /// may need to grow when its region is materialized as a new block.
    fn attach_program(&mut self, desc: Arc<RwLock<ProgramDesc>>) -> Result<()> {
        let _ = desc;
        Err(Error::compile(format!(
            "op '{}' does not accept a program description",
            self.op_type()
        )))
    }

    /// Gives an `Offload` operation a standalone description of its region,
    /// pending materialization into the owning program (`sub_block` stays 0).
    fn set_detached_program(&mut self, desc: ProgramDesc) -> Result<()> {
        let _ = desc;
        Err(Error::compile(format!(
            "op '{}' does not carry a detached program",
            self.op_type()
        )))
    }

    /// Takes the detached region description out of an `Offload` operation.
    fn take_detached_program(&mut self) -> Option<ProgramDesc> {
        None
    }
}

pub type OpConstructor = Box<dyn Fn() -> Box<dyn Op> + Send + Sync>;

/// Registry mapping operation type names to constructors.
pub struct OpRegistry {
    ops: HashMap<String, OpConstructor>,
}

impl OpRegistry {
    pub fn new() -> Self {
        OpRegistry {
            ops: HashMap::new(),
        }
    }

    /// A registry pre-populated with the built-in io/control-flow/compute ops.
    pub fn with_builtin_ops() -> Self {
        let mut registry = OpRegistry::new();
        crate::ops::register_builtin_ops(&mut registry);
        registry
    }

    pub fn register<F>(&mut self, op_type: impl Into<String>, constructor: F)
    where
        F: Fn() -> Box<dyn Op> + Send + Sync + 'static,
    {
        self.ops.insert(op_type.into(), Box::new(constructor));
    }

    pub fn create(&self, op_type: &str) -> Option<Box<dyn Op>> {
        self.ops.get(op_type).map(|ctor| ctor())
    }

    pub fn has_op(&self, op_type: &str) -> bool {
        self.ops.contains_key(op_type)
    }
}

impl Default for OpRegistry {
    fn default() -> Self {
        OpRegistry::with_builtin_ops()
    }
}
