//! Placement descriptors used to key kernel selection.
//!
//! A [`Place`] is the (target device, numeric precision, memory layout) triple
//! a kernel is registered under. `Any` components act as wildcards during
//! matching, so a kernel registered for `(host, any, any)` serves every host
//! request regardless of precision or layout.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Target device a kernel executes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Host,
    Cuda,
    Npu,
    Any,
}

impl Target {
    pub fn as_str(self) -> &'static str {
        match self {
            Target::Host => "host",
            Target::Cuda => "cuda",
            Target::Npu => "npu",
            Target::Any => "any",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "host" => Some(Target::Host),
            "cuda" => Some(Target::Cuda),
            "npu" => Some(Target::Npu),
            "any" => Some(Target::Any),
            _ => None,
        }
    }

    /// Returns `true` for accelerator targets with their own device streams.
    pub fn is_device(self) -> bool {
        matches!(self, Target::Cuda | Target::Npu)
    }
}

/// Numeric precision a kernel computes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Float,
    Half,
    Int8,
    Int32,
    Int64,
    Any,
}

impl Precision {
    pub fn as_str(self) -> &'static str {
        match self {
            Precision::Float => "float",
            Precision::Half => "half",
            Precision::Int8 => "int8",
            Precision::Int32 => "int32",
            Precision::Int64 => "int64",
            Precision::Any => "any",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "float" => Some(Precision::Float),
            "half" => Some(Precision::Half),
            "int8" => Some(Precision::Int8),
            "int32" => Some(Precision::Int32),
            "int64" => Some(Precision::Int64),
            "any" => Some(Precision::Any),
            _ => None,
        }
    }
}

/// Memory layout a kernel expects its tensors in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataLayout {
    Nchw,
    Nhwc,
    Any,
}

impl DataLayout {
    pub fn as_str(self) -> &'static str {
        match self {
            DataLayout::Nchw => "nchw",
            DataLayout::Nhwc => "nhwc",
            DataLayout::Any => "any",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "nchw" => Some(DataLayout::Nchw),
            "nhwc" => Some(DataLayout::Nhwc),
            "any" => Some(DataLayout::Any),
            _ => None,
        }
    }
}

/// The (target, precision, layout) triple kernel selection is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Place {
    pub target: Target,
    pub precision: Precision,
    pub layout: DataLayout,
}

impl Place {
    pub const fn new(target: Target, precision: Precision, layout: DataLayout) -> Self {
        Place {
            target,
            precision,
            layout,
        }
    }

    /// Generic host fallback accepted when no target-specific kernel exists.
    pub const fn host() -> Self {
        Place::new(Target::Host, Precision::Any, DataLayout::Any)
    }

    /// Component-wise match where `Any` on either side acts as a wildcard.
    pub fn matches(&self, requested: &Place) -> bool {
        fn component<T: PartialEq>(a: T, b: T, any: T) -> bool {
            a == any || b == any || a == b
        }
        component(self.target, requested.target, Target::Any)
            && component(self.precision, requested.precision, Precision::Any)
            && component(self.layout, requested.layout, DataLayout::Any)
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.target.as_str(),
            self.precision.as_str(),
            self.layout.as_str()
        )
    }
}

/// Fully resolved kernel identity: operation type, alias, and place.
///
/// The display form is the serialized kernel-type attribute recorded on a
/// saved operation so a reload can bypass selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KernelKey {
    pub op_type: String,
    pub alias: String,
    pub place: Place,
}

impl KernelKey {
    pub fn new(op_type: impl Into<String>, alias: impl Into<String>, place: Place) -> Self {
        KernelKey {
            op_type: op_type.into(),
            alias: alias.into(),
            place,
        }
    }

    /// Parses the serialized form produced by [`fmt::Display`].
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.split('/');
        let invalid = || Error::selection(format!("malformed kernel type attribute '{raw}'"));
        let op_type = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let alias = parts.next().filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let target = parts
            .next()
            .and_then(Target::parse)
            .ok_or_else(invalid)?;
        let precision = parts
            .next()
            .and_then(Precision::parse)
            .ok_or_else(invalid)?;
        let layout = parts
            .next()
            .and_then(DataLayout::parse)
            .ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(KernelKey::new(
            op_type,
            alias,
            Place::new(target, precision, layout),
        ))
    }
}

impl fmt::Display for KernelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.op_type, self.alias, self.place)
    }
}
