//! Nested named-variable store backing tensor storage.
//!
//! A [`Scope`] holds named variables and falls back to its parent on lookup
//! miss. The root scope holds persistent weights; each compiled program gets
//! one child exec scope for its transient activations. Variable maps are
//! behind an `RwLock` so independently built programs may share a read-only
//! root scope of weights.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::desc::VarKind;
use crate::error::{Error, Result};
use crate::tensor::Tensor;

/// A named workspace value: a dense tensor or an ordered tensor list.
#[derive(Debug)]
pub enum Variable {
    Tensor(Tensor),
    TensorList(Vec<Tensor>),
}

impl Variable {
    pub fn kind(&self) -> VarKind {
        match self {
            Variable::Tensor(_) => VarKind::Tensor,
            Variable::TensorList(_) => VarKind::TensorList,
        }
    }

    pub fn as_tensor(&self) -> Result<&Tensor> {
        match self {
            Variable::Tensor(tensor) => Ok(tensor),
            Variable::TensorList(_) => {
                Err(Error::workspace("expected a tensor, found a tensor list"))
            }
        }
    }

    pub fn as_tensor_mut(&mut self) -> Result<&mut Tensor> {
        match self {
            Variable::Tensor(tensor) => Ok(tensor),
            Variable::TensorList(_) => {
                Err(Error::workspace("expected a tensor, found a tensor list"))
            }
        }
    }

    pub fn as_tensor_list(&self) -> Result<&Vec<Tensor>> {
        match self {
            Variable::TensorList(list) => Ok(list),
            Variable::Tensor(_) => {
                Err(Error::workspace("expected a tensor list, found a tensor"))
            }
        }
    }

    pub fn as_tensor_list_mut(&mut self) -> Result<&mut Vec<Tensor>> {
        match self {
            Variable::TensorList(list) => Ok(list),
            Variable::Tensor(_) => {
                Err(Error::workspace("expected a tensor list, found a tensor"))
            }
        }
    }
}

/// Shared handle to one workspace variable.
pub type VarRef = Arc<RwLock<Variable>>;

/// One level of the workspace hierarchy.
pub struct Scope {
    parent: Option<Arc<Scope>>,
    vars: RwLock<HashMap<String, VarRef>>,
}

impl Scope {
    /// Creates a root scope with no parent.
    pub fn root() -> Arc<Scope> {
        Arc::new(Scope {
            parent: None,
            vars: RwLock::new(HashMap::new()),
        })
    }

    /// Creates a child scope whose lookups fall back to `self`.
    pub fn new_child(self: &Arc<Self>) -> Arc<Scope> {
        Arc::new(Scope {
            parent: Some(Arc::clone(self)),
            vars: RwLock::new(HashMap::new()),
        })
    }

    /// Creates a local variable of the declared kind, or returns the existing
    /// local one. Unsupported kinds are fatal.
    pub fn declare(&self, name: &str, kind: VarKind) -> Result<VarRef> {
        if let Some(existing) = self.find_local(name) {
            return Ok(existing);
        }
        let variable = match kind {
            VarKind::Tensor => Variable::Tensor(Tensor::new()),
            VarKind::TensorList => Variable::TensorList(Vec::new()),
            VarKind::Unsupported => {
                return Err(Error::workspace(format!(
                    "unsupported var type for '{name}'"
                )))
            }
        };
        let var = Arc::new(RwLock::new(variable));
        self.vars
            .write()
            .expect("scope poisoned")
            .insert(name.to_string(), Arc::clone(&var));
        Ok(var)
    }

    /// Looks up a variable in this scope only.
    pub fn find_local(&self, name: &str) -> Option<VarRef> {
        self.vars
            .read()
            .expect("scope poisoned")
            .get(name)
            .cloned()
    }

    /// Looks up a variable here, falling back to the parent chain on miss.
    pub fn find_var(&self, name: &str) -> Option<VarRef> {
        if let Some(var) = self.find_local(name) {
            return Some(var);
        }
        self.parent.as_ref().and_then(|parent| parent.find_var(name))
    }

    /// Names of the variables local to this scope, unordered.
    pub fn local_names(&self) -> Vec<String> {
        self.vars
            .read()
            .expect("scope poisoned")
            .keys()
            .cloned()
            .collect()
    }
}
