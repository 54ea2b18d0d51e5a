//! Elementwise compute operations used by the host kernel library.

use std::sync::Arc;

use crate::desc::{AttrValue, OpDesc};
use crate::error::Result;
use crate::op::Op;
use crate::workspace::Scope;

use super::{attachment, expect_arity, Attachment};

fn infer_unary(attached: &Attachment) -> Result<()> {
    let dims = {
        let input = attached.input_var(0)?;
        let guard = input.read().expect("variable poisoned");
        guard.as_tensor()?.dims().to_vec()
    };
    let out = attached.output_var(0)?;
    out.write()
        .expect("variable poisoned")
        .as_tensor_mut()?
        .resize(dims);
    Ok(())
}

/// `out = max(x, 0)`.
pub struct ReluOp {
    attached: Option<Attachment>,
}

impl ReluOp {
    pub fn new() -> Self {
        ReluOp { attached: None }
    }
}

impl Op for ReluOp {
    fn op_type(&self) -> &str {
        "relu"
    }

    fn attach(&mut self, desc: &OpDesc, scope: &Arc<Scope>) -> Result<()> {
        expect_arity(desc, 1, 1)?;
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
        let attached = attachment(&self.attached);
        attached.input_var(0)?;
        attached.output_var(0)?;
        Ok(())
    }

    fn infer_shape(&self) -> Result<()> {
        infer_unary(attachment(&self.attached))
    }
}

/// `out = x * scale + bias`.
pub struct ScaleOp {
    attached: Option<Attachment>,
}

impl ScaleOp {
    pub fn new() -> Self {
        ScaleOp { attached: None }
    }

    pub fn scale(desc: &OpDesc) -> f32 {
        desc.attr("scale")
            .and_then(AttrValue::as_float)
            .unwrap_or(1.0) as f32
    }

    pub fn bias(desc: &OpDesc) -> f32 {
        desc.attr("bias")
            .and_then(AttrValue::as_float)
            .unwrap_or(0.0) as f32
    }
}

impl Op for ScaleOp {
    fn op_type(&self) -> &str {
        "scale"
    }

    fn attach(&mut self, desc: &OpDesc, scope: &Arc<Scope>) -> Result<()> {
        expect_arity(desc, 1, 1)?;
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
        let attached = attachment(&self.attached);
        attached.input_var(0)?;
        attached.output_var(0)?;
        Ok(())
    }

    fn infer_shape(&self) -> Result<()> {
        infer_unary(attachment(&self.attached))
    }
}
