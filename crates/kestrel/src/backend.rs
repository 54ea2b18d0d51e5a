//! Device backend collaborator interfaces.
//!
//! The core never talks to a vendor SDK directly. It needs an allocator with
//! a monotonically growing scratch pad, a direction-parameterized synchronous
//! copy, and — for accelerator offload — a loader that compiles an operator
//! region into a device-resident executable blob, with a capped number of
//! rebuild attempts per engine and an optional blob file cache.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::desc::OpDesc;
use crate::error::{Error, Result};
use crate::place::Target;

/// Direction of a synchronous memory copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyDirection {
    HostToDevice,
    DeviceToHost,
    DeviceToDevice,
}

/// Memory services of one device.
pub trait DeviceBackend: Send + Sync {
    type Buffer;

    fn target(&self) -> Target;

    fn malloc(&self, size: usize) -> Result<Self::Buffer>;

    fn free(&self, buffer: Self::Buffer);

    /// Synchronous copy; both sides are presented as byte views by the
    /// implementation.
    fn memcpy_sync(&self, dst: &mut [u8], src: &[u8], dir: CopyDirection) -> Result<()>;
}

/// Reusable device allocation whose reservation only ever grows.
pub struct ScratchPad<B: DeviceBackend> {
    buffer: Option<B::Buffer>,
    size: usize,
}

impl<B: DeviceBackend> ScratchPad<B> {
    pub fn new() -> Self {
        ScratchPad {
            buffer: None,
            size: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn buffer(&self) -> Option<&B::Buffer> {
        self.buffer.as_ref()
    }

    /// Grows the reservation to at least `new_size`. Requests at or below the
    /// current size keep the existing allocation.
    pub fn reserve(&mut self, backend: &B, new_size: usize) -> Result<()> {
        if new_size <= self.size {
            return Ok(());
        }
        if let Some(old) = self.buffer.take() {
            backend.free(old);
        }
        self.buffer = Some(backend.malloc(new_size)?);
        self.size = new_size;
        Ok(())
    }
}

impl<B: DeviceBackend> Default for ScratchPad<B> {
    fn default() -> Self {
        ScratchPad::new()
    }
}

/// Compiles an operator region into a device-resident executable.
pub trait SubgraphLoader: Send + Sync {
    type Executable;

    /// Builds the region into a loadable blob.
    fn build(&self, ops: &[OpDesc]) -> Result<Vec<u8>>;

    /// Loads a previously built blob into a device-resident executable.
    fn load(&self, blob: &[u8]) -> Result<Self::Executable>;
}

/// Rebuild attempts allowed per engine, to avoid redundant device
/// compilation rather than to recover from data errors.
pub const MAX_SUBGRAPH_BUILD_ATTEMPTS: usize = 2;

/// Drives a [`SubgraphLoader`] with blob-file reuse and a capped rebuild
/// counter.
pub struct SubgraphEngine<L: SubgraphLoader> {
    loader: L,
    blob_path: Option<PathBuf>,
    build_attempts: usize,
}

impl<L: SubgraphLoader> SubgraphEngine<L> {
    pub fn new(loader: L) -> Self {
        SubgraphEngine {
            loader,
            blob_path: None,
            build_attempts: 0,
        }
    }

    /// An engine that persists built blobs at `path` and prefers loading the
    /// cached file over rebuilding.
    pub fn with_blob_cache(loader: L, path: impl Into<PathBuf>) -> Self {
        SubgraphEngine {
            loader,
            blob_path: Some(path.into()),
            build_attempts: 0,
        }
    }

    /// Default blob cache location for a named region, honoring the
    /// `KESTREL_SUBGRAPH_CACHE_DIR` override.
    pub fn default_blob_path(region_name: &str) -> Option<PathBuf> {
        crate::env::subgraph_cache_dir()
            .map(|dir| Path::new(dir).join(format!("{region_name}.blob")))
    }

    pub fn build_attempts(&self) -> usize {
        self.build_attempts
    }

    /// Produces a device executable for the region: from the cached blob file
    /// when present, otherwise by building — at most
    /// [`MAX_SUBGRAPH_BUILD_ATTEMPTS`] times over the engine's lifetime.
    pub fn prepare(&mut self, ops: &[OpDesc]) -> Result<L::Executable> {
        if let Some(path) = &self.blob_path {
            if path.exists() {
                debug!(path = %path.display(), "loading cached subgraph blob");
                let blob = fs::read(path).map_err(|err| {
                    Error::device(format!(
                        "failed to read cached subgraph blob {}: {err}",
                        path.display()
                    ))
                })?;
                return self.loader.load(&blob);
            }
        }
        if self.build_attempts >= MAX_SUBGRAPH_BUILD_ATTEMPTS {
            return Err(Error::device(format!(
                "subgraph rebuild limit ({MAX_SUBGRAPH_BUILD_ATTEMPTS}) exceeded"
            )));
        }
        self.build_attempts += 1;
        debug!(attempt = self.build_attempts, ops = ops.len(), "building subgraph blob");
        let blob = self.loader.build(ops)?;
        if let Some(path) = &self.blob_path {
            fs::write(path, &blob).map_err(|err| {
                Error::device(format!(
                    "failed to persist subgraph blob {}: {err}",
                    path.display()
                ))
            })?;
        }
        self.loader.load(&blob)
    }
}
