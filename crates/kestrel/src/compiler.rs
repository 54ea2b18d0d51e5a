//! Compilation session: registries, pass pipeline, and entry points.

use std::sync::Arc;

use tracing::debug;

use crate::desc::ProgramDesc;
use crate::error::Result;
use crate::kernel::{ContextRegistry, KernelRegistry};
use crate::op::OpRegistry;
use crate::passes::{ControlFlowOrderPass, KernelBindPass, PassContext, Pipeline, WeightStagePass};
use crate::place::Place;
use crate::program::{gen_program, BlockBuildContext, Program, RuntimeProgram};
use crate::workspace::Scope;

/// Owns everything one compilation session needs: the op and kernel
/// registries, the per-target execution contexts, and the pass pipeline.
///
/// The default pipeline orders sibling control-flow operations, binds
/// kernels, and stages weights for targets that need device-resident copies.
pub struct Compiler {
    place: Place,
    ops: OpRegistry,
    kernels: KernelRegistry,
    contexts: Arc<ContextRegistry>,
    pipeline: Pipeline,
}

impl Compiler {
    pub fn new(place: Place) -> Self {
        let mut pipeline = Pipeline::new();
        pipeline.add(Box::new(ControlFlowOrderPass));
        pipeline.add(Box::new(KernelBindPass));
        pipeline.add(Box::new(WeightStagePass));
        Compiler {
            place,
            ops: OpRegistry::with_builtin_ops(),
            kernels: KernelRegistry::new(),
            contexts: Arc::new(ContextRegistry::new()),
            pipeline,
        }
    }

    pub fn place(&self) -> Place {
        self.place
    }

    pub fn ops_mut(&mut self) -> &mut OpRegistry {
        &mut self.ops
    }

    pub fn kernels_mut(&mut self) -> &mut KernelRegistry {
        &mut self.kernels
    }

    pub fn pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }

    pub fn contexts(&self) -> &Arc<ContextRegistry> {
        &self.contexts
    }

    /// Full compilation: workspace preparation, op instantiation, per-block
    /// graph construction, the pass pipeline, and instruction generation.
    pub fn compile(&self, desc: ProgramDesc, root: &Arc<Scope>) -> Result<RuntimeProgram> {
        let mut program = Program::new(desc, root)?;
        program.prepare_workspace()?;
        program.build(&self.ops)?;
        let mut graphs = program.build_graphs()?;
        debug!(blocks = graphs.len(), "running pass pipeline");
        let cx = PassContext {
            place: self.place,
            kernels: &self.kernels,
            contexts: &self.contexts,
        };
        self.pipeline.run(&mut graphs, &cx)?;
        gen_program(&program, graphs)
    }

    /// Reload path for a previously saved description: instructions are built
    /// straight from the entry block, and the recorded kernel-type attributes
    /// bypass kernel selection.
    pub fn load(&self, desc: ProgramDesc, root: &Arc<Scope>) -> Result<RuntimeProgram> {
        let mut program = Program::new(desc, root)?;
        program.prepare_workspace()?;
        let exec_scope = Arc::clone(program.exec_scope()?);
        let cx = BlockBuildContext {
            ops: &self.ops,
            kernels: &self.kernels,
            contexts: &self.contexts,
            place: self.place,
        };
        RuntimeProgram::from_block(0, &program.desc(), &exec_scope, &cx)
    }
}
