//! Program io-boundary operations: feed, fetch, and device copies.

use std::sync::Arc;

use crate::desc::{AttrValue, OpDesc, FEED_VAR_NAME, FETCH_VAR_NAME};
use crate::error::{Error, Result};
use crate::op::Op;
use crate::workspace::Scope;

use super::{attachment, expect_arity, Attachment};

/// Copies one slot of the reserved `feed` tensor list into a named variable.
pub struct FeedOp {
    attached: Option<Attachment>,
}

impl FeedOp {
    pub fn new() -> Self {
        FeedOp { attached: None }
    }

    /// Slot of the feed list this op reads, defaulting to 0.
    pub fn col(desc: &OpDesc) -> usize {
        desc.attr("col")
            .and_then(AttrValue::as_int)
            .map(|col| col.max(0) as usize)
            .unwrap_or(0)
    }
}

impl Op for FeedOp {
    fn op_type(&self) -> &str {
        "feed"
    }

    fn attach(&mut self, desc: &OpDesc, scope: &Arc<Scope>) -> Result<()> {
        expect_arity(desc, 1, 1)?;
        if desc.inputs[0] != FEED_VAR_NAME {
            return Err(Error::ir_integrity(format!(
                "feed op must read the reserved '{FEED_VAR_NAME}' variable, got '{}'",
                desc.inputs[0]
            )));
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
        let attached = attachment(&self.attached);
        attached.input_var(0)?.read().expect("variable poisoned").as_tensor_list()?;
        attached.output_var(0)?;
        Ok(())
    }

    fn infer_shape(&self) -> Result<()> {
        let attached = attachment(&self.attached);
        let col = FeedOp::col(&attached.desc);
        let feed = attached.input_var(0)?;
        let dims = {
            let guard = feed.read().expect("variable poisoned");
            guard
                .as_tensor_list()?
                .get(col)
                .map(|tensor| tensor.dims().to_vec())
        };
        if let Some(dims) = dims {
            let out = attached.output_var(0)?;
            out.write()
                .expect("variable poisoned")
                .as_tensor_mut()?
                .resize(dims);
        }
        Ok(())
    }
}

/// Copies a named variable into one slot of the reserved `fetch` tensor list.
pub struct FetchOp {
    attached: Option<Attachment>,
}

impl FetchOp {
    pub fn new() -> Self {
        FetchOp { attached: None }
    }

    pub fn col(desc: &OpDesc) -> usize {
        desc.attr("col")
            .and_then(AttrValue::as_int)
            .map(|col| col.max(0) as usize)
            .unwrap_or(0)
    }
}

impl Op for FetchOp {
    fn op_type(&self) -> &str {
        "fetch"
    }

    fn attach(&mut self, desc: &OpDesc, scope: &Arc<Scope>) -> Result<()> {
        expect_arity(desc, 1, 1)?;
        if desc.outputs[0] != FETCH_VAR_NAME {
            return Err(Error::ir_integrity(format!(
                "fetch op must write the reserved '{FETCH_VAR_NAME}' variable, got '{}'",
                desc.outputs[0]
            )));
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
        let attached = attachment(&self.attached);
        attached.input_var(0)?;
        attached.output_var(0)?.read().expect("variable poisoned").as_tensor_list()?;
        Ok(())
    }

    fn infer_shape(&self) -> Result<()> {
        // The fetch list grows at launch; nothing to propagate beforehand.
        Ok(())
    }
}

/// Copies a tensor between targets. The `once` variant stages constant
/// weights and never repeats after its first successful run.
pub struct IoCopyOp {
    attached: Option<Attachment>,
    once: bool,
}

impl IoCopyOp {
    pub fn new(once: bool) -> Self {
        IoCopyOp {
            attached: None,
            once,
        }
    }
}

impl Op for IoCopyOp {
    fn op_type(&self) -> &str {
        if self.once {
            "io_copy_once"
        } else {
            "io_copy"
        }
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
        let attached = attachment(&self.attached);
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

    fn run_once(&self) -> bool {
        self.once
    }
}
