//! Host control-flow kernels owning nested runtime programs.

use std::sync::Arc;

use tracing::trace;

use kestrel::error::{Error, Result};
use kestrel::kernel::{Kernel, KernelContext, KernelRegistry};
use kestrel::op::Op;
use kestrel::place::KernelKey;
use kestrel::program::RuntimeProgram;

use crate::HOST_ANY;

pub(crate) fn register(registry: &mut KernelRegistry) {
    registry.register(KernelKey::new("while", "def", HOST_ANY), || {
        Box::new(WhileKernel::new())
    });
    registry.register(KernelKey::new("conditional_block", "def", HOST_ANY), || {
        Box::new(ConditionalBlockKernel::new())
    });
    registry.register(KernelKey::new("subgraph", "def", HOST_ANY), || {
        Box::new(SubgraphKernel::new())
    });
}

fn condition(op: &dyn Op) -> Result<bool> {
    let desc = op.desc();
    let name = desc
        .inputs
        .first()
        .ok_or_else(|| Error::ir_integrity("control-flow op has no condition operand"))?;
    let var = op
        .scope()
        .find_var(name)
        .ok_or_else(|| Error::workspace(format!("condition '{name}' missing from workspace")))?;
    let guard = var.read().expect("variable poisoned");
    Ok(guard.as_tensor()?.first_scalar_is_true())
}

/// Re-runs its sub-program while the condition operand reads true.
pub struct WhileKernel {
    key: KernelKey,
    ctx: Option<Arc<KernelContext>>,
    program: Option<RuntimeProgram>,
}

impl WhileKernel {
    pub fn new() -> Self {
        WhileKernel {
            key: KernelKey::new("while", "def", HOST_ANY),
            ctx: None,
            program: None,
        }
    }
}

impl Kernel for WhileKernel {
    fn key(&self) -> &KernelKey {
        &self.key
    }

    fn set_context(&mut self, ctx: Arc<KernelContext>) {
        self.ctx = Some(ctx);
    }

    fn context(&self) -> Option<&Arc<KernelContext>> {
        self.ctx.as_ref()
    }

    fn launch(&mut self, op: &dyn Op) -> Result<()> {
        let program = self
            .program
            .as_mut()
            .ok_or_else(|| Error::compile("while kernel has no attached sub-program"))?;
        let mut iterations = 0usize;
        while condition(op)? {
            trace!(iteration = iterations, "while body");
            program.run()?;
            iterations += 1;
        }
        Ok(())
    }

    fn attach_sub_program(&mut self, program: RuntimeProgram) -> Result<()> {
        self.program = Some(program);
        Ok(())
    }

    fn sub_program(&self) -> Option<&RuntimeProgram> {
        self.program.as_ref()
    }
}

/// Runs its sub-program once when the condition operand reads true.
pub struct ConditionalBlockKernel {
    key: KernelKey,
    ctx: Option<Arc<KernelContext>>,
    program: Option<RuntimeProgram>,
}

impl ConditionalBlockKernel {
    pub fn new() -> Self {
        ConditionalBlockKernel {
            key: KernelKey::new("conditional_block", "def", HOST_ANY),
            ctx: None,
            program: None,
        }
    }
}

impl Kernel for ConditionalBlockKernel {
    fn key(&self) -> &KernelKey {
        &self.key
    }

    fn set_context(&mut self, ctx: Arc<KernelContext>) {
        self.ctx = Some(ctx);
    }

    fn context(&self) -> Option<&Arc<KernelContext>> {
        self.ctx.as_ref()
    }

    fn launch(&mut self, op: &dyn Op) -> Result<()> {
        if condition(op)? {
            let program = self.program.as_mut().ok_or_else(|| {
                Error::compile("conditional_block kernel has no attached sub-program")
            })?;
            program.run()?;
        }
        Ok(())
    }

    fn attach_sub_program(&mut self, program: RuntimeProgram) -> Result<()> {
        self.program = Some(program);
        Ok(())
    }

    fn sub_program(&self) -> Option<&RuntimeProgram> {
        self.program.as_ref()
    }
}

/// Host rendition of an offload region: the referenced block executes inline
/// instead of on a device. A region that was never materialized into the
/// program cannot run.
pub struct SubgraphKernel {
    key: KernelKey,
    ctx: Option<Arc<KernelContext>>,
    program: Option<RuntimeProgram>,
}

impl SubgraphKernel {
    pub fn new() -> Self {
        SubgraphKernel {
            key: KernelKey::new("subgraph", "def", HOST_ANY),
            ctx: None,
            program: None,
        }
    }
}

impl Kernel for SubgraphKernel {
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
        let program = self
            .program
            .as_mut()
            .ok_or_else(|| Error::compile("subgraph kernel has no materialized sub-program"))?;
        program.run()
    }

    fn attach_sub_program(&mut self, program: RuntimeProgram) -> Result<()> {
        self.program = Some(program);
        Ok(())
    }

    fn sub_program(&self) -> Option<&RuntimeProgram> {
        self.program.as_ref()
    }
}
