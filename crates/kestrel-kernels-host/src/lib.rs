//! Host kernel library for the kestrel inference core.
//!
//! Implements the kernel-provider collaborator for the host target: the
//! feed/fetch boundary, tensor copies, control-flow kernels that own nested
//! runtime programs, and a couple of elementwise compute kernels.

mod control_flow;
mod elementwise;
mod io;
mod memory;

pub use control_flow::{ConditionalBlockKernel, SubgraphKernel, WhileKernel};
pub use elementwise::{ReluKernel, ScaleKernel};
pub use io::{FeedKernel, FetchKernel, IoCopyKernel};
pub use memory::HostBackend;

use kestrel::kernel::KernelRegistry;
use kestrel::place::{DataLayout, Place, Precision, Target};

/// Place the io and control-flow kernels are registered under.
pub(crate) const HOST_ANY: Place = Place::new(Target::Host, Precision::Any, DataLayout::Any);
/// Place the compute kernels are registered under.
pub(crate) const HOST_FLOAT: Place = Place::new(Target::Host, Precision::Float, DataLayout::Nchw);

/// Registers every host kernel with the session's catalog.
pub fn register_host_kernels(registry: &mut KernelRegistry) {
    io::register(registry);
    control_flow::register(registry);
    elementwise::register(registry);
}
