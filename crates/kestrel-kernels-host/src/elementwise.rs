//! Host elementwise compute kernels.

use std::sync::Arc;

use kestrel::error::{Error, Result};
use kestrel::kernel::{Kernel, KernelContext, KernelRegistry, TypeDecl};
use kestrel::op::Op;
use kestrel::ops::ScaleOp;
use kestrel::place::{KernelKey, Precision};

use crate::HOST_FLOAT;

pub(crate) fn register(registry: &mut KernelRegistry) {
    registry.register(KernelKey::new("relu", "def", HOST_FLOAT), || {
        Box::new(ReluKernel::new())
    });
    registry.register(KernelKey::new("scale", "def", HOST_FLOAT), || {
        Box::new(ScaleKernel::new())
    });
}

fn unary_map(op: &dyn Op, f: impl Fn(f32) -> f32) -> Result<()> {
    let desc = op.desc();
    let scope = op.scope();
    let (dims, values) = {
        let input = scope
            .find_var(&desc.inputs[0])
            .ok_or_else(|| Error::workspace(format!("input '{}' missing", desc.inputs[0])))?;
        let guard = input.read().expect("variable poisoned");
        let tensor = guard.as_tensor()?;
        (tensor.dims().to_vec(), tensor.f32_data()?)
    };
    let mapped: Vec<f32> = values.into_iter().map(f).collect();
    let out = scope
        .find_var(&desc.outputs[0])
        .ok_or_else(|| Error::workspace(format!("output '{}' missing", desc.outputs[0])))?;
    let result = out
        .write()
        .expect("variable poisoned")
        .as_tensor_mut()?
        .copy_from_f32(dims, &mapped);
    result
}

/// `out = max(x, 0)`.
pub struct ReluKernel {
    key: KernelKey,
    ctx: Option<Arc<KernelContext>>,
}

impl ReluKernel {
    pub fn new() -> Self {
        ReluKernel {
            key: KernelKey::new("relu", "def", HOST_FLOAT),
            ctx: None,
        }
    }
}

impl Kernel for ReluKernel {
    fn key(&self) -> &KernelKey {
        &self.key
    }

    fn set_context(&mut self, ctx: Arc<KernelContext>) {
        self.ctx = Some(ctx);
    }

    fn context(&self) -> Option<&Arc<KernelContext>> {
        self.ctx.as_ref()
    }

    fn input_decl(&self) -> TypeDecl {
        TypeDecl::tensor(Precision::Float)
    }

    fn output_decl(&self) -> TypeDecl {
        TypeDecl::tensor(Precision::Float)
    }

    fn launch(&mut self, op: &dyn Op) -> Result<()> {
        unary_map(op, |x| x.max(0.0))
    }
}

/// `out = x * scale + bias`.
pub struct ScaleKernel {
    key: KernelKey,
    ctx: Option<Arc<KernelContext>>,
}

impl ScaleKernel {
    pub fn new() -> Self {
        ScaleKernel {
            key: KernelKey::new("scale", "def", HOST_FLOAT),
            ctx: None,
        }
    }
}

impl Kernel for ScaleKernel {
    fn key(&self) -> &KernelKey {
        &self.key
    }

    fn set_context(&mut self, ctx: Arc<KernelContext>) {
        self.ctx = Some(ctx);
    }

    fn context(&self) -> Option<&Arc<KernelContext>> {
        self.ctx.as_ref()
    }

    fn input_decl(&self) -> TypeDecl {
        TypeDecl::tensor(Precision::Float)
    }

    fn output_decl(&self) -> TypeDecl {
        TypeDecl::tensor(Precision::Float)
    }

    fn launch(&mut self, op: &dyn Op) -> Result<()> {
        let scale = ScaleOp::scale(op.desc());
        let bias = ScaleOp::bias(op.desc());
        unary_map(op, |x| x * scale + bias)
    }
}
