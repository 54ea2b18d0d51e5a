//! Kernel contract, catalog, selection, and per-target execution contexts.
//!
//! The registry maps an operation type to an ordered list of kernel factories
//! keyed by [`KernelKey`]. Selection is deterministic: entries are tried in
//! registration order against the requested place list, and the first match
//! wins. An explicit kernel-type attribute on a saved operation bypasses the
//! search and selects by alias.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use crate::desc::{AttrValue, VarKind, KERNEL_TYPE_ATTR};
use crate::error::{Error, Result};
use crate::op::Op;
use crate::place::{DataLayout, KernelKey, Place, Precision, Target};
use crate::program::RuntimeProgram;

/// Declared operand type constraint of a kernel side (inputs or outputs).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeDecl {
    /// Required variable kind, `None` accepting any.
    pub kind: Option<VarKind>,
    pub precision: Precision,
    pub layout: DataLayout,
}

impl TypeDecl {
    /// A declaration that accepts any operand.
    pub fn any() -> Self {
        TypeDecl {
            kind: None,
            precision: Precision::Any,
            layout: DataLayout::Any,
        }
    }

    /// A dense-tensor declaration at the given precision.
    pub fn tensor(precision: Precision) -> Self {
        TypeDecl {
            kind: Some(VarKind::Tensor),
            precision,
            layout: DataLayout::Any,
        }
    }

    /// A tensor-list declaration.
    pub fn tensor_list() -> Self {
        TypeDecl {
            kind: Some(VarKind::TensorList),
            precision: Precision::Any,
            layout: DataLayout::Any,
        }
    }
}

/// A callable unit of computation bound to a place.
pub trait Kernel: Send {
    fn key(&self) -> &KernelKey;

    fn set_context(&mut self, ctx: Arc<KernelContext>);

    fn context(&self) -> Option<&Arc<KernelContext>>;

    fn input_decl(&self) -> TypeDecl {
        TypeDecl::any()
    }

    fn output_decl(&self) -> TypeDecl {
        TypeDecl::any()
    }

    /// Executes the kernel against the op's attached operands.
    fn launch(&mut self, op: &dyn Op) -> Result<()>;

    /// Hands a control-flow kernel the program for its sub-block.
    fn attach_sub_program(&mut self, program: RuntimeProgram) -> Result<()> {
        let _ = program;
        Err(Error::compile(format!(
            "kernel '{}' does not execute a sub-program",
            self.key()
        )))
    }

    /// The attached sub-program of a control-flow kernel.
    fn sub_program(&self) -> Option<&RuntimeProgram> {
        None
    }
}

/// Execution context shared by instructions bound to one device stream.
#[derive(Debug)]
pub struct KernelContext {
    target: Target,
    stream: u16,
}

impl KernelContext {
    pub fn target(&self) -> Target {
        self.target
    }

    pub fn stream(&self) -> u16 {
        self.stream
    }

    /// Waits for previously queued work on this stream. Host contexts have
    /// nothing to wait on.
    pub fn sync(&self) {
        trace!(target_device = self.target.as_str(), stream = self.stream, "stream sync");
    }
}

/// Session-owned registry of execution contexts, one per (target, stream).
///
/// Contexts are created lazily under a lock; the contexts themselves carry no
/// internal synchronization and must not be driven concurrently.
pub struct ContextRegistry {
    contexts: Mutex<HashMap<(Target, u16), Arc<KernelContext>>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        ContextRegistry {
            contexts: Mutex::new(HashMap::new()),
        }
    }

    pub fn context(&self, target: Target, stream: u16) -> Arc<KernelContext> {
        let mut contexts = self.contexts.lock().expect("context registry poisoned");
        Arc::clone(
            contexts
                .entry((target, stream))
                .or_insert_with(|| Arc::new(KernelContext { target, stream })),
        )
    }
}

impl Default for ContextRegistry {
    fn default() -> Self {
        ContextRegistry::new()
    }
}

pub type KernelConstructor = Box<dyn Fn() -> Box<dyn Kernel> + Send + Sync>;

struct KernelEntry {
    key: KernelKey,
    factory: KernelConstructor,
}

/// Catalog of kernel factories grouped by operation type.
pub struct KernelRegistry {
    entries: HashMap<String, Vec<KernelEntry>>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        KernelRegistry {
            entries: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, key: KernelKey, factory: F)
    where
        F: Fn() -> Box<dyn Kernel> + Send + Sync + 'static,
    {
        self.entries
            .entry(key.op_type.clone())
            .or_default()
            .push(KernelEntry {
                key,
                factory: Box::new(factory),
            });
    }

    pub fn has_kernel(&self, op_type: &str) -> bool {
        self.entries.contains_key(op_type)
    }

    /// Instantiates every kernel whose registered place matches one of the
    /// requested places. Place order dominates; registration order breaks
    /// ties within a place, so the result is deterministic.
    pub fn create(&self, op_type: &str, places: &[Place]) -> Vec<Box<dyn Kernel>> {
        let Some(entries) = self.entries.get(op_type) else {
            return Vec::new();
        };
        let mut picked = Vec::new();
        let mut seen = vec![false; entries.len()];
        for place in places {
            for (idx, entry) in entries.iter().enumerate() {
                if !seen[idx] && entry.key.place.matches(place) {
                    seen[idx] = true;
                    picked.push((entry.factory)());
                }
            }
        }
        picked
    }
}

impl Default for KernelRegistry {
    fn default() -> Self {
        KernelRegistry::new()
    }
}

/// Resolves the single kernel for an attached op and binds its context.
///
/// A serialized kernel-type attribute (written by a previous save) selects by
/// alias; otherwise the first kernel produced for the requested place, then
/// the generic host fallback, wins. No candidate is a fatal selection error.
pub fn select_kernel(
    op: &dyn Op,
    place: &Place,
    registry: &KernelRegistry,
    contexts: &ContextRegistry,
) -> Result<Box<dyn Kernel>> {
    let op_type = op.op_type();
    let mut kernel = match op.desc().attr(KERNEL_TYPE_ATTR).and_then(AttrValue::as_str) {
        Some(raw) => {
            let key = KernelKey::parse(raw)?;
            debug!(op = op_type, kernel_type = raw, "selecting kernel by saved type");
            let candidates = registry.create(&key.op_type, &[key.place]);
            candidates
                .into_iter()
                .find(|kernel| kernel.key().alias == key.alias)
                .ok_or_else(|| {
                    Error::selection(format!(
                        "no kernel with alias '{}' for op '{}' at {}",
                        key.alias, key.op_type, key.place
                    ))
                })?
        }
        None => {
            let places = [*place, Place::host()];
            let mut candidates = registry.create(op_type, &places);
            if candidates.is_empty() {
                return Err(Error::selection(format!(
                    "no kernel found for op '{op_type}' at {place} (host fallback included)"
                )));
            }
            let kernel = candidates.remove(0);
            debug!(op = op_type, key = %kernel.key(), "selected first matching kernel");
            kernel
        }
    };
    let ctx = contexts.context(kernel.key().place.target, 0);
    kernel.set_context(ctx);
    Ok(kernel)
}

/// Verifies the op's operand kinds satisfy the kernel's declared constraints.
pub fn check_binding(op: &dyn Op, kernel: &dyn Kernel) -> Result<()> {
    let scope = op.scope();
    let sides = [
        (&op.desc().inputs, kernel.input_decl()),
        (&op.desc().outputs, kernel.output_decl()),
    ];
    for (names, decl) in sides {
        for name in names.iter() {
            let var = scope.find_var(name).ok_or_else(|| {
                Error::workspace(format!(
                    "operand '{name}' of op '{}' not found in workspace",
                    op.op_type()
                ))
            })?;
            let guard = var.read().expect("variable poisoned");
            if let Some(required) = decl.kind {
                let kind = guard.kind();
                if kind != required {
                    return Err(Error::selection(format!(
                        "operand '{name}' of op '{}' is {kind:?} but kernel '{}' declares {required:?}",
                        op.op_type(),
                        kernel.key()
                    )));
                }
            }
            if decl.precision != Precision::Any {
                if let Ok(tensor) = guard.as_tensor() {
                    if let Some(precision) = tensor.precision() {
                        if precision != decl.precision {
                            return Err(Error::selection(format!(
                                "operand '{name}' of op '{}' is {} but kernel '{}' declares {}",
                                op.op_type(),
                                precision.as_str(),
                                kernel.key(),
                                decl.precision.as_str()
                            )));
                        }
                    }
                }
            }
        }
    }
    Ok(())
}
