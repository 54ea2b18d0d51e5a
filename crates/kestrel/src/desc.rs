//! Serializable program descriptions consumed and produced by the compiler.
//!
//! A [`ProgramDesc`] is an ordered, append-only list of blocks; block 0 is the
//! entry block. Control-flow operations reference other blocks through the
//! `sub_block` attribute, forming a nesting tree rooted at the entry block.
//! Indices of existing blocks never change once assigned.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::place::Precision;

/// Reserved tensor-list variable holding program inputs.
pub const FEED_VAR_NAME: &str = "feed";
/// Reserved tensor-list variable holding program outputs.
pub const FETCH_VAR_NAME: &str = "fetch";
/// Attribute naming the block a control-flow operation executes.
pub const SUB_BLOCK_ATTR: &str = "sub_block";
/// Attribute carrying the serialized [`crate::place::KernelKey`] of a saved op.
pub const KERNEL_TYPE_ATTR: &str = "__kernel_type__";

/// Typed attribute value attached to an operation description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Ints(Vec<i64>),
    Strs(Vec<String>),
}

impl AttrValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttrValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// One operation in a block: type, ordered operand names, and attributes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OpDesc {
    pub op_type: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub attrs: BTreeMap<String, AttrValue>,
}

impl OpDesc {
    pub fn new(op_type: impl Into<String>) -> Self {
        OpDesc {
            op_type: op_type.into(),
            ..OpDesc::default()
        }
    }

    pub fn with_inputs(mut self, inputs: &[&str]) -> Self {
        self.inputs = inputs.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_outputs(mut self, outputs: &[&str]) -> Self {
        self.outputs = outputs.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: AttrValue) -> Self {
        self.attrs.insert(name.into(), value);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: AttrValue) {
        self.attrs.insert(name.into(), value);
    }

    /// Block index referenced by a control-flow operation, if declared.
    pub fn sub_block(&self) -> Option<i64> {
        self.attr(SUB_BLOCK_ATTR).and_then(AttrValue::as_int)
    }

    /// All operand names, inputs before outputs, in declaration order.
    pub fn arg_names(&self) -> impl Iterator<Item = &String> {
        self.inputs.iter().chain(self.outputs.iter())
    }
}

/// Declared kind of a workspace variable.
///
/// Descriptions loaded from foreign producers may carry type tags this core
/// does not model; those deserialize as `Unsupported` and fail workspace
/// preparation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarKind {
    Tensor,
    TensorList,
    #[serde(other)]
    Unsupported,
}

/// One declared variable: name, kind, persistability, optional precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDesc {
    pub name: String,
    pub kind: VarKind,
    pub persistable: bool,
    pub precision: Option<Precision>,
}

impl VarDesc {
    pub fn tensor(name: impl Into<String>) -> Self {
        VarDesc {
            name: name.into(),
            kind: VarKind::Tensor,
            persistable: false,
            precision: None,
        }
    }

    pub fn tensor_list(name: impl Into<String>) -> Self {
        VarDesc {
            name: name.into(),
            kind: VarKind::TensorList,
            persistable: false,
            precision: None,
        }
    }

    pub fn persistable(mut self, persistable: bool) -> Self {
        self.persistable = persistable;
        self
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = Some(precision);
        self
    }
}

/// Ordered operations and variable declarations of one block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockDesc {
    pub parent_idx: Option<usize>,
    pub ops: Vec<OpDesc>,
    pub vars: Vec<VarDesc>,
}

impl BlockDesc {
    pub fn var(&self, name: &str) -> Option<&VarDesc> {
        self.vars.iter().find(|v| v.name == name)
    }
}

/// The whole program: an append-only list of blocks, block 0 as entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgramDesc {
    pub blocks: Vec<BlockDesc>,
}

impl ProgramDesc {
    pub fn new() -> Self {
        ProgramDesc::default()
    }

    /// Appends an empty block and returns it for in-place population.
    pub fn add_block(&mut self) -> &mut BlockDesc {
        self.blocks.push(BlockDesc::default());
        self.blocks.last_mut().expect("block just appended")
    }

    pub fn entry(&self) -> Option<&BlockDesc> {
        self.blocks.first()
    }
}
