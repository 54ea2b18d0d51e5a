//! Program construction, instruction linearization, and the runtime executor.
//!
//! A [`Program`] instantiates the operations of every block and prepares the
//! workspace. After the pass pipeline has rewritten the block graphs and
//! bound kernels, [`gen_program`] linearizes each graph into instructions and
//! attaches nested [`RuntimeProgram`]s to control-flow kernels, bottom-up, so
//! a parent never observes a partially built child. [`RuntimeProgram::run`]
//! then walks the instructions in build order with no reordering.

use std::sync::{Arc, RwLock};

use tracing::{debug, trace};

use crate::desc::{
    AttrValue, OpDesc, ProgramDesc, VarDesc, VarKind, FEED_VAR_NAME, FETCH_VAR_NAME,
    KERNEL_TYPE_ATTR, SUB_BLOCK_ATTR,
};
use crate::error::{Error, Result};
use crate::graph::{Graph, NodeKind};
use crate::kernel::{select_kernel, ContextRegistry, Kernel, KernelRegistry};
use crate::op::{ControlFlowKind, Op, OpRegistry};
use crate::place::Place;
use crate::workspace::{Scope, Variable};

/// A program description with its operations instantiated and its workspace
/// prepared, ready for graph construction and optimization.
pub struct Program {
    desc: Arc<RwLock<ProgramDesc>>,
    root: Arc<Scope>,
    exec_scope: Option<Arc<Scope>>,
    blocks: Vec<Vec<Box<dyn Op>>>,
    weights: Vec<String>,
    tmp_vars: Vec<String>,
}

impl Program {
    pub fn new(desc: ProgramDesc, root: &Arc<Scope>) -> Result<Self> {
        if desc.blocks.is_empty() {
            return Err(Error::compile("program description has no blocks"));
        }
        Ok(Program {
            desc: Arc::new(RwLock::new(desc)),
            root: Arc::clone(root),
            exec_scope: None,
            blocks: Vec::new(),
            weights: Vec::new(),
            tmp_vars: Vec::new(),
        })
    }

    pub fn desc(&self) -> Arc<RwLock<ProgramDesc>> {
        Arc::clone(&self.desc)
    }

    pub fn exec_scope(&self) -> Result<&Arc<Scope>> {
        self.exec_scope
            .as_ref()
            .ok_or_else(|| Error::compile("workspace has not been prepared"))
    }

    /// Names of the persistent root-scope variables (weights).
    pub fn weights(&self) -> &[String] {
        &self.weights
    }

    /// Names of the transient exec-scope variables.
    pub fn tmp_vars(&self) -> &[String] {
        &self.tmp_vars
    }

    /// Creates the exec scope and every declared variable.
    ///
    /// The reserved `feed`/`fetch` names are always created as tensor-list
    /// containers in the root scope and are never recorded as weights, even
    /// when a description marks them persistable. Tensor-list variables are
    /// transient regardless of their declared flag.
    pub fn prepare_workspace(&mut self) -> Result<()> {
        if self.exec_scope.is_some() {
            return Err(Error::compile("duplicate PrepareWorkspace"));
        }
        let exec_scope = self.root.new_child();
        self.root.declare(FEED_VAR_NAME, VarKind::TensorList)?;
        self.root.declare(FETCH_VAR_NAME, VarKind::TensorList)?;
        self.tmp_vars.push(FEED_VAR_NAME.to_string());
        self.tmp_vars.push(FETCH_VAR_NAME.to_string());

        let desc = self.desc.read().expect("program desc poisoned").clone();
        for block in &desc.blocks {
            for var in &block.vars {
                if var.name == FEED_VAR_NAME || var.name == FETCH_VAR_NAME {
                    continue;
                }
                if var.kind == VarKind::Unsupported {
                    return Err(Error::workspace(format!(
                        "unsupported var type for '{}'",
                        var.name
                    )));
                }
                let persistable = var.persistable && var.kind == VarKind::Tensor;
                if persistable {
                    trace!(var = %var.name, "declaring weight");
                    self.weights.push(var.name.clone());
                    let weight = self.root.declare(&var.name, VarKind::Tensor)?;
                    let mut guard = weight.write().expect("variable poisoned");
                    let tensor = guard.as_tensor_mut()?;
                    tensor.set_persistable(true);
                    if let Some(precision) = var.precision {
                        tensor.set_precision(precision);
                    }
                } else {
                    trace!(var = %var.name, kind = ?var.kind, "declaring local");
                    self.tmp_vars.push(var.name.clone());
                    let local = exec_scope.declare(&var.name, var.kind)?;
                    if let (Some(precision), VarKind::Tensor) = (var.precision, var.kind) {
                        local
                            .write()
                            .expect("variable poisoned")
                            .as_tensor_mut()?
                            .set_precision(precision);
                    }
                }
            }
        }
        self.exec_scope = Some(exec_scope);
        Ok(())
    }

    /// Instantiates and attaches the operations of every block.
    ///
    /// Loop and branch operations receive their referenced block description;
    /// offload operations receive the shared whole-program description, which
    /// they may need to grow later.
    pub fn build(&mut self, ops: &OpRegistry) -> Result<()> {
        if !self.blocks.is_empty() {
            return Err(Error::compile("duplicate Build"));
        }
        let exec_scope = Arc::clone(self.exec_scope()?);
        let desc = self.desc.read().expect("program desc poisoned").clone();
        for (block_idx, block) in desc.blocks.iter().enumerate() {
            let mut block_ops: Vec<Box<dyn Op>> = Vec::with_capacity(block.ops.len());
            for op_desc in &block.ops {
                trace!(op = %op_desc.op_type, block = block_idx, "creating op");
                let mut op = ops.create(&op_desc.op_type).ok_or_else(|| {
                    Error::compile(format!("no op registered for '{}'", op_desc.op_type))
                })?;
                match op.control_flow() {
                    Some(ControlFlowKind::Loop) | Some(ControlFlowKind::Branch) => {
                        let idx = resolve_sub_block(op_desc, block_idx, desc.blocks.len())?;
                        op.attach_sub_block(desc.blocks[idx].clone())?;
                    }
                    Some(ControlFlowKind::Offload) => {
                        op.attach_program(Arc::clone(&self.desc))?;
                    }
                    None => {}
                }
                op.attach(op_desc, &exec_scope)?;
                block_ops.push(op);
            }
            self.blocks.push(block_ops);
        }
        Ok(())
    }

    /// Moves the attached operations into one IR graph per block.
    pub fn build_graphs(&mut self) -> Result<Vec<Graph>> {
        if self.blocks.is_empty() {
            return Err(Error::compile("Build must run before graph construction"));
        }
        let exec_scope = Arc::clone(self.exec_scope()?);
        let desc = self.desc.read().expect("program desc poisoned").clone();
        let blocks = std::mem::take(&mut self.blocks);
        blocks
            .into_iter()
            .zip(desc.blocks.iter())
            .map(|(ops, block)| Graph::from_block(ops, block, &exec_scope))
            .collect()
    }
}

/// Validates a loop/branch `sub_block` attribute: present, in range, and
/// strictly later than the parent block.
fn resolve_sub_block(op_desc: &OpDesc, parent_idx: usize, block_count: usize) -> Result<usize> {
    let raw = op_desc.sub_block().ok_or_else(|| {
        Error::ir_integrity(format!(
            "op '{}' missing the sub_block attribute",
            op_desc.op_type
        ))
    })?;
    let idx = usize::try_from(raw).ok().filter(|idx| *idx < block_count);
    match idx {
        Some(idx) if idx > parent_idx => Ok(idx),
        _ => Err(Error::ir_integrity(format!(
            "invalid sub_block({raw}) for op '{}' in block {parent_idx}",
            op_desc.op_type
        ))),
    }
}

/// An operation paired with its bound kernel, plus mutable execution state.
pub struct Instruction {
    op: Box<dyn Op>,
    kernel: Box<dyn Kernel>,
    control_flow: Option<ControlFlowKind>,
    need_sync: bool,
    first_epoch: bool,
    has_run: bool,
}

impl Instruction {
    pub fn new(op: Box<dyn Op>, kernel: Box<dyn Kernel>) -> Self {
        let control_flow = op.control_flow();
        Instruction {
            op,
            kernel,
            control_flow,
            need_sync: false,
            first_epoch: true,
            has_run: false,
        }
    }

    pub fn op(&self) -> &dyn Op {
        self.op.as_ref()
    }

    pub fn kernel(&self) -> &dyn Kernel {
        self.kernel.as_ref()
    }

    pub fn kernel_mut(&mut self) -> &mut dyn Kernel {
        self.kernel.as_mut()
    }

    pub fn control_flow(&self) -> Option<ControlFlowKind> {
        self.control_flow
    }

    pub fn need_sync(&self) -> bool {
        self.need_sync
    }

    pub fn has_run(&self) -> bool {
        self.has_run
    }

    fn set_need_sync(&mut self, need_sync: bool) {
        self.need_sync = need_sync;
    }

    /// Drives one execution: a one-time shape check on the first epoch, then
    /// shape inference and kernel launch. A run-once instruction
    /// short-circuits every execution after its first successful run.
    pub fn run(&mut self) -> Result<()> {
        if self.first_epoch {
            self.first_epoch = false;
            self.op.check_shape()?;
        }
        if self.op.run_once() && self.has_run {
            return Ok(());
        }
        if self.need_sync {
            if let Some(ctx) = self.kernel.context() {
                ctx.sync();
            }
        }
        self.op.infer_shape()?;
        self.kernel.launch(self.op.as_ref())?;
        self.has_run = true;
        Ok(())
    }
}

/// Collaborators needed to build instructions directly from a block
/// description (the reload path).
pub struct BlockBuildContext<'a> {
    pub ops: &'a OpRegistry,
    pub kernels: &'a KernelRegistry,
    pub contexts: &'a ContextRegistry,
    pub place: Place,
}

/// An executable instruction sequence for one block.
pub struct RuntimeProgram {
    instructions: Vec<Instruction>,
    exec_scope: Arc<Scope>,
    desc: Arc<RwLock<ProgramDesc>>,
}

impl std::fmt::Debug for RuntimeProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeProgram")
            .field("instructions", &self.instructions.len())
            .finish_non_exhaustive()
    }
}

impl RuntimeProgram {
    pub(crate) fn from_instructions(
        mut instructions: Vec<Instruction>,
        exec_scope: Arc<Scope>,
        desc: Arc<RwLock<ProgramDesc>>,
    ) -> Result<Self> {
        if instructions.is_empty() {
            return Err(Error::compile("no instructions"));
        }
        mark_sync_points(&mut instructions);
        Ok(RuntimeProgram {
            instructions,
            exec_scope,
            desc,
        })
    }

    /// Builds a runtime program directly from a block description, selecting
    /// kernels through the saved kernel-type attribute when present. Nested
    /// programs for control-flow operations are built recursively.
    pub fn from_block(
        block_idx: usize,
        desc: &Arc<RwLock<ProgramDesc>>,
        exec_scope: &Arc<Scope>,
        cx: &BlockBuildContext<'_>,
    ) -> Result<Self> {
        let snapshot = desc.read().expect("program desc poisoned").clone();
        let block = snapshot.blocks.get(block_idx).ok_or_else(|| {
            Error::compile(format!("block index {block_idx} out of range"))
        })?;
        let mut instructions = Vec::with_capacity(block.ops.len());
        for op_desc in &block.ops {
            let mut op = cx.ops.create(&op_desc.op_type).ok_or_else(|| {
                Error::compile(format!("no op registered for '{}'", op_desc.op_type))
            })?;
            let mut nested_idx = None;
            match op.control_flow() {
                Some(ControlFlowKind::Loop) | Some(ControlFlowKind::Branch) => {
                    let idx = resolve_sub_block(op_desc, block_idx, snapshot.blocks.len())?;
                    op.attach_sub_block(snapshot.blocks[idx].clone())?;
                    nested_idx = Some(idx);
                }
                Some(ControlFlowKind::Offload) => {
                    op.attach_program(Arc::clone(desc))?;
                    if op_desc.sub_block().unwrap_or(0) > 0 {
                        nested_idx =
                            Some(resolve_sub_block(op_desc, block_idx, snapshot.blocks.len())?);
                    }
                }
                None => {}
            }
            op.attach(op_desc, exec_scope)?;
            let mut kernel = select_kernel(op.as_ref(), &cx.place, cx.kernels, cx.contexts)?;
            if let Some(idx) = nested_idx {
                let sub_program = RuntimeProgram::from_block(idx, desc, exec_scope, cx)?;
                kernel.attach_sub_program(sub_program)?;
            }
            instructions.push(Instruction::new(op, kernel));
        }
        RuntimeProgram::from_instructions(instructions, Arc::clone(exec_scope), Arc::clone(desc))
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn exec_scope(&self) -> &Arc<Scope> {
        &self.exec_scope
    }

    pub fn description(&self) -> Arc<RwLock<ProgramDesc>> {
        Arc::clone(&self.desc)
    }

    /// Executes every instruction in build order. Completion is implicit;
    /// callers inspect named output variables afterwards.
    pub fn run(&mut self) -> Result<()> {
        for instruction in &mut self.instructions {
            instruction.run()?;
        }
        Ok(())
    }

    /// Rewrites the entry block's operations from the live instruction list,
    /// recording every resolved kernel signature so a later load can skip
    /// selection.
    ///
    /// An offload operation whose region is still detached (`sub_block` 0)
    /// first has that region appended as a new block and its attribute
    /// rewritten — before its own serialization, so block indices stay
    /// stable.
    pub fn save_op_infos(&mut self) -> Result<()> {
        let desc = Arc::clone(&self.desc);
        let mut guard = desc.write().expect("program desc poisoned");
        if guard.blocks.is_empty() {
            return Err(Error::compile("cannot save into an empty description"));
        }
        let block_idx = 0usize;
        let exec_scope = Arc::clone(&self.exec_scope);
        let mut saved_ops = Vec::with_capacity(self.instructions.len());
        for instruction in &mut self.instructions {
            let mut op_desc = instruction.op.desc().clone();
            if instruction.control_flow == Some(ControlFlowKind::Offload)
                && op_desc.sub_block() == Some(0)
            {
                let detached = instruction.op.take_detached_program().ok_or_else(|| {
                    Error::compile(
                        "offload op has sub_block 0 but no detached program description",
                    )
                })?;
                let mut region = detached.blocks.into_iter().next().ok_or_else(|| {
                    Error::compile("detached subgraph description has no blocks")
                })?;
                region.parent_idx = Some(block_idx);
                guard.blocks.push(region);
                let new_idx = guard.blocks.len() - 1;
                debug!(sub_block = new_idx, "materialized offload region as new block");
                op_desc.set_attr(SUB_BLOCK_ATTR, AttrValue::Int(new_idx as i64));
                // Re-attach so the live op sees the updated block index and the
                // grown program description.
                instruction.op.attach(&op_desc, &exec_scope)?;
                instruction.op.attach_program(Arc::clone(&self.desc))?;
            }
            op_desc.set_attr(
                KERNEL_TYPE_ATTR,
                AttrValue::Str(instruction.kernel.key().to_string()),
            );
            saved_ops.push(op_desc);
        }
        guard.blocks[block_idx].ops = saved_ops;
        Ok(())
    }

    /// Rewrites the entry block's variable list: descriptions no surviving
    /// instruction references are dropped, originals are carried over, and
    /// pass-introduced variables are synthesized as dense-tensor entries with
    /// persistability taken from the live workspace state.
    pub fn update_vars(&self) -> Result<()> {
        let mut guard = self.desc.write().expect("program desc poisoned");
        if guard.blocks.is_empty() {
            return Err(Error::compile("cannot update vars of an empty description"));
        }
        let origin: Vec<VarDesc> = std::mem::take(&mut guard.blocks[0].vars);
        let mut vars = Vec::new();
        let mut seen = std::collections::BTreeSet::new();
        for instruction in &self.instructions {
            for name in instruction.op.desc().arg_names() {
                if !seen.insert(name.clone()) {
                    continue;
                }
                if let Some(existing) = origin.iter().find(|v| &v.name == name) {
                    vars.push(existing.clone());
                    continue;
                }
                let var = self.exec_scope.find_var(name).ok_or_else(|| {
                    Error::workspace(format!("no live variable named '{name}'"))
                })?;
                let desc = match &*var.read().expect("variable poisoned") {
                    Variable::Tensor(tensor) => {
                        let mut desc = VarDesc::tensor(name).persistable(tensor.persistable());
                        desc.precision = tensor.precision();
                        desc
                    }
                    Variable::TensorList(_) => VarDesc::tensor_list(name),
                };
                vars.push(desc);
            }
        }
        guard.blocks[0].vars = vars;
        Ok(())
    }
}

/// Linearizes the optimized, kernel-bound block graphs into a runtime
/// program. Nested programs are attached bottom-up over the block list, so a
/// parent kernel never receives a partially built child.
pub fn gen_program(program: &Program, graphs: Vec<Graph>) -> Result<RuntimeProgram> {
    let exec_scope = Arc::clone(program.exec_scope()?);
    let desc = program.desc();

    let mut block_instructions: Vec<Option<Vec<Instruction>>> = Vec::with_capacity(graphs.len());
    for graph in graphs {
        let order = graph.stmt_topological_order()?;
        let mut nodes: Vec<Option<_>> = graph.into_nodes().into_iter().map(Some).collect();
        let mut instructions = Vec::with_capacity(order.len());
        for id in order {
            let node = nodes[id.0].take().expect("stmt order repeated a node");
            let NodeKind::Stmt(stmt) = node.kind else {
                continue;
            };
            let kernel = stmt.kernel.ok_or_else(|| {
                Error::compile(format!(
                    "op '{}' reached program generation without a bound kernel",
                    stmt.op.op_type()
                ))
            })?;
            instructions.push(Instruction::new(stmt.op, kernel));
        }
        block_instructions.push(Some(instructions));
    }

    for idx in (0..block_instructions.len()).rev() {
        let nested: Vec<(usize, usize)> = match &block_instructions[idx] {
            Some(instructions) => instructions
                .iter()
                .enumerate()
                .filter(|(_, instruction)| instruction.control_flow.is_some())
                .filter_map(|(pos, instruction)| {
                    let sub = instruction.op.desc().sub_block().unwrap_or(0);
                    (sub > 0).then_some((pos, sub as usize))
                })
                .collect(),
            None => continue,
        };
        for (pos, sub_idx) in nested {
            if sub_idx <= idx || sub_idx >= block_instructions.len() {
                return Err(Error::ir_integrity(format!(
                    "invalid sub_block({sub_idx}) referenced from block {idx}"
                )));
            }
            let child = block_instructions[sub_idx].take().ok_or_else(|| {
                Error::compile(format!("sub-block {sub_idx} referenced more than once"))
            })?;
            let sub_program =
                RuntimeProgram::from_instructions(child, Arc::clone(&exec_scope), Arc::clone(&desc))?;
            debug!(
                block = idx,
                sub_block = sub_idx,
                len = sub_program.instructions.len(),
                "attached nested program"
            );
            let parent = block_instructions[idx]
                .as_mut()
                .expect("parent block present");
            parent[pos].kernel_mut().attach_sub_program(sub_program)?;
        }
    }

    let entry = block_instructions[0]
        .take()
        .ok_or_else(|| Error::compile("entry block consumed as a sub-block"))?;
    RuntimeProgram::from_instructions(entry, exec_scope, desc)
}

/// Marks instructions whose device stream differs from the previous
/// instruction's; the executor waits on the stream before those launches.
fn mark_sync_points(instructions: &mut [Instruction]) {
    let mut previous: Option<(crate::place::Target, u16)> = None;
    for instruction in instructions.iter_mut() {
        let current = instruction
            .kernel
            .context()
            .map(|ctx| (ctx.target(), ctx.stream()));
        if let (Some(prev), Some(cur)) = (previous, current) {
            if cur.0.is_device() && prev != cur {
                instruction.set_need_sync(true);
            }
        }
        previous = current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc::BlockDesc;
    use crate::kernel::KernelContext;
    use crate::ops::SubgraphOp;
    use crate::place::{DataLayout, KernelKey, Precision, Target};

    struct NoopKernel {
        key: KernelKey,
        ctx: Option<Arc<KernelContext>>,
    }

    impl NoopKernel {
        fn new(op_type: &str) -> Self {
            NoopKernel {
                key: KernelKey::new(
                    op_type,
                    "def",
                    Place::new(Target::Host, Precision::Any, DataLayout::Any),
                ),
                ctx: None,
            }
        }
    }

    impl Kernel for NoopKernel {
        fn key(&self) -> &KernelKey {
            &self.key
        }

        fn set_context(&mut self, ctx: Arc<KernelContext>) {
            self.ctx = Some(ctx);
        }

        fn context(&self) -> Option<&Arc<KernelContext>> {
            self.ctx.as_ref()
        }

        fn launch(&mut self, _op: &dyn Op) -> Result<()> {
            Ok(())
        }
    }

    fn detached_region() -> ProgramDesc {
        let mut region = ProgramDesc::new();
        let block = region.add_block();
        block.ops.push(
            OpDesc::new("relu")
                .with_inputs(&["x"])
                .with_outputs(&["y"]),
        );
        block.vars.push(VarDesc::tensor("x"));
        block.vars.push(VarDesc::tensor("y"));
        region
    }

    #[test]
    fn save_materializes_detached_offload_region_before_serialization() {
        let mut desc = ProgramDesc::new();
        let block = desc.add_block();
        block.ops.push(
            OpDesc::new("subgraph")
                .with_inputs(&["x"])
                .with_outputs(&["y"])
                .with_attr(SUB_BLOCK_ATTR, AttrValue::Int(0)),
        );
        block.vars.push(VarDesc::tensor("x"));
        block.vars.push(VarDesc::tensor("y"));

        let root = Scope::root();
        let exec_scope = root.new_child();
        exec_scope.declare("x", VarKind::Tensor).unwrap();
        exec_scope.declare("y", VarKind::Tensor).unwrap();

        let shared = Arc::new(RwLock::new(desc));
        let op_desc = shared.read().unwrap().blocks[0].ops[0].clone();
        let mut op = SubgraphOp::new();
        op.attach_program(Arc::clone(&shared)).unwrap();
        op.set_detached_program(detached_region()).unwrap();
        op.attach(&op_desc, &exec_scope).unwrap();

        let instruction = Instruction::new(Box::new(op), Box::new(NoopKernel::new("subgraph")));
        let mut runtime =
            RuntimeProgram::from_instructions(vec![instruction], exec_scope, shared).unwrap();
        runtime.save_op_infos().unwrap();

        let saved = runtime.description();
        let saved = saved.read().unwrap();
        assert_eq!(saved.blocks.len(), 2);
        assert_eq!(saved.blocks[1].parent_idx, Some(0));
        let saved_op = &saved.blocks[0].ops[0];
        assert_eq!(saved_op.sub_block(), Some(1));
        assert!(saved_op.attr(KERNEL_TYPE_ATTR).is_some());
    }

    #[test]
    fn update_vars_drops_unreferenced_and_synthesizes_new_names() {
        let mut desc = ProgramDesc::new();
        let block = desc.add_block();
        block.ops.push(
            OpDesc::new("relu")
                .with_inputs(&["x"])
                .with_outputs(&["y"]),
        );
        block.vars.push(VarDesc::tensor("x"));
        block.vars.push(VarDesc::tensor("stale"));

        let root = Scope::root();
        let exec_scope = root.new_child();
        exec_scope.declare("x", VarKind::Tensor).unwrap();
        exec_scope.declare("y", VarKind::Tensor).unwrap();

        let shared = Arc::new(RwLock::new(desc));
        let op_desc = shared.read().unwrap().blocks[0].ops[0].clone();
        let mut op = crate::ops::ReluOp::new();
        op.attach(&op_desc, &exec_scope).unwrap();
        let instruction = Instruction::new(Box::new(op), Box::new(NoopKernel::new("relu")));
        let runtime =
            RuntimeProgram::from_instructions(vec![instruction], exec_scope, shared).unwrap();
        runtime.update_vars().unwrap();

        let saved = runtime.description();
        let saved = saved.read().unwrap();
        let names: Vec<_> = saved.blocks[0].vars.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y"]);
        assert_eq!(saved.blocks[0].vars[1].kind, VarKind::Tensor);
        assert!(!saved.blocks[0].vars[1].persistable);
    }

    #[test]
    fn missing_block_is_a_compile_error() {
        let mut block = BlockDesc::default();
        block.vars.push(VarDesc::tensor("x"));
        let desc = ProgramDesc { blocks: vec![block] };
        let shared = Arc::new(RwLock::new(desc));
        let root = Scope::root();
        let ops = OpRegistry::with_builtin_ops();
        let kernels = KernelRegistry::new();
        let contexts = ContextRegistry::new();
        let cx = BlockBuildContext {
            ops: &ops,
            kernels: &kernels,
            contexts: &contexts,
            place: Place::host(),
        };
        let err = RuntimeProgram::from_block(3, &shared, &root, &cx).unwrap_err();
        assert!(matches!(err, Error::Compile(_)));
    }
}
