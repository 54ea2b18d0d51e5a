//! Host io-boundary kernels: feed, fetch, and tensor copies.

use std::sync::Arc;

use kestrel::desc::VarKind;
use kestrel::error::{Error, Result};
use kestrel::kernel::{Kernel, KernelContext, KernelRegistry, TypeDecl};
use kestrel::op::Op;
use kestrel::ops::{FeedOp, FetchOp};
use kestrel::place::{KernelKey, Precision};
use kestrel::tensor::Tensor;

use crate::HOST_ANY;

pub(crate) fn register(registry: &mut KernelRegistry) {
    registry.register(KernelKey::new("feed", "def", HOST_ANY), || {
        Box::new(FeedKernel::new())
    });
    registry.register(KernelKey::new("fetch", "def", HOST_ANY), || {
        Box::new(FetchKernel::new())
    });
    registry.register(KernelKey::new("io_copy", "def", HOST_ANY), || {
        Box::new(IoCopyKernel::new("io_copy"))
    });
    registry.register(KernelKey::new("io_copy_once", "def", HOST_ANY), || {
        Box::new(IoCopyKernel::new("io_copy_once"))
    });
}

/// Copies one slot of the `feed` tensor list into the output variable.
pub struct FeedKernel {
    key: KernelKey,
    ctx: Option<Arc<KernelContext>>,
}

impl FeedKernel {
    pub fn new() -> Self {
        FeedKernel {
            key: KernelKey::new("feed", "def", HOST_ANY),
            ctx: None,
        }
    }
}

impl Kernel for FeedKernel {
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
        TypeDecl::tensor_list()
    }

    fn output_decl(&self) -> TypeDecl {
        TypeDecl::tensor(Precision::Any)
    }

    fn launch(&mut self, op: &dyn Op) -> Result<()> {
        let desc = op.desc();
        let scope = op.scope();
        let col = FeedOp::col(desc);
        let feed = scope
            .find_var(&desc.inputs[0])
            .ok_or_else(|| Error::workspace("feed variable missing from workspace"))?;
        let source = {
            let guard = feed.read().expect("variable poisoned");
            guard
                .as_tensor_list()?
                .get(col)
                .cloned()
                .ok_or_else(|| Error::workspace(format!("feed slot {col} is empty")))?
        };
        let out = scope
            .find_var(&desc.outputs[0])
            .ok_or_else(|| Error::workspace(format!("output '{}' missing", desc.outputs[0])))?;
        out.write()
            .expect("variable poisoned")
            .as_tensor_mut()?
            .copy_data_from(&source);
        Ok(())
    }
}

/// Copies the input variable into one slot of the `fetch` tensor list.
pub struct FetchKernel {
    key: KernelKey,
    ctx: Option<Arc<KernelContext>>,
}

impl FetchKernel {
    pub fn new() -> Self {
        FetchKernel {
            key: KernelKey::new("fetch", "def", HOST_ANY),
            ctx: None,
        }
    }
}

impl Kernel for FetchKernel {
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
        TypeDecl::tensor(Precision::Any)
    }

    fn output_decl(&self) -> TypeDecl {
        TypeDecl::tensor_list()
    }

    fn launch(&mut self, op: &dyn Op) -> Result<()> {
        let desc = op.desc();
        let scope = op.scope();
        let col = FetchOp::col(desc);
        let source = {
            let input = scope
                .find_var(&desc.inputs[0])
                .ok_or_else(|| Error::workspace(format!("input '{}' missing", desc.inputs[0])))?;
            let guard = input.read().expect("variable poisoned");
            let mut tensor = Tensor::new();
            tensor.copy_data_from(guard.as_tensor()?);
            tensor
        };
        let fetch = scope
            .find_var(&desc.outputs[0])
            .ok_or_else(|| Error::workspace("fetch variable missing from workspace"))?;
        let mut guard = fetch.write().expect("variable poisoned");
        let list = guard.as_tensor_list_mut()?;
        if list.len() <= col {
            list.resize_with(col + 1, Tensor::new);
        }
        list[col] = source;
        Ok(())
    }
}

/// Copies one tensor variable into another. On the host both sides live in
/// the same address space, so the copy is a payload clone.
pub struct IoCopyKernel {
    key: KernelKey,
    ctx: Option<Arc<KernelContext>>,
}

impl IoCopyKernel {
    pub fn new(op_type: &str) -> Self {
        IoCopyKernel {
            key: KernelKey::new(op_type, "def", HOST_ANY),
            ctx: None,
        }
    }
}

impl Kernel for IoCopyKernel {
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
        TypeDecl {
            kind: Some(VarKind::Tensor),
            ..TypeDecl::any()
        }
    }

    fn output_decl(&self) -> TypeDecl {
        TypeDecl {
            kind: Some(VarKind::Tensor),
            ..TypeDecl::any()
        }
    }

    fn launch(&mut self, op: &dyn Op) -> Result<()> {
        let desc = op.desc();
        let scope = op.scope();
        let source = {
            let input = scope
                .find_var(&desc.inputs[0])
                .ok_or_else(|| Error::workspace(format!("input '{}' missing", desc.inputs[0])))?;
            let guard = input.read().expect("variable poisoned");
            let mut tensor = Tensor::new();
            tensor.copy_data_from(guard.as_tensor()?);
            tensor
        };
        let out = scope
            .find_var(&desc.outputs[0])
            .ok_or_else(|| Error::workspace(format!("output '{}' missing", desc.outputs[0])))?;
        out.write()
            .expect("variable poisoned")
            .as_tensor_mut()?
            .copy_data_from(&source);
        Ok(())
    }
}
