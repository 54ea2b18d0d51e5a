//! Host implementation of the device-backend collaborator.

use kestrel::backend::{CopyDirection, DeviceBackend};
use kestrel::error::{Error, Result};
use kestrel::place::Target;

/// Backend whose "device" memory is plain host memory.
pub struct HostBackend;

impl DeviceBackend for HostBackend {
    type Buffer = Vec<u8>;

    fn target(&self) -> Target {
        Target::Host
    }

    fn malloc(&self, size: usize) -> Result<Self::Buffer> {
        Ok(vec![0; size])
    }

    fn free(&self, buffer: Self::Buffer) {
        drop(buffer);
    }

    fn memcpy_sync(&self, dst: &mut [u8], src: &[u8], _dir: CopyDirection) -> Result<()> {
        if dst.len() != src.len() {
            return Err(Error::device(format!(
                "memcpy length mismatch: dst {} vs src {}",
                dst.len(),
                src.len()
            )));
        }
        dst.copy_from_slice(src);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel::backend::ScratchPad;

    #[test]
    fn memcpy_copies_and_rejects_length_mismatch() {
        let backend = HostBackend;
        let mut dst = backend.malloc(4).unwrap();
        backend
            .memcpy_sync(&mut dst, &[1, 2, 3, 4], CopyDirection::HostToDevice)
            .unwrap();
        assert_eq!(dst, vec![1, 2, 3, 4]);

        let err = backend
            .memcpy_sync(&mut dst, &[1, 2], CopyDirection::DeviceToHost)
            .unwrap_err();
        assert!(matches!(err, Error::Device(_)));
    }

    #[test]
    fn scratch_pad_backed_by_host_memory() {
        let backend = HostBackend;
        let mut pad: ScratchPad<HostBackend> = ScratchPad::new();
        pad.reserve(&backend, 64).unwrap();
        pad.reserve(&backend, 32).unwrap();
        assert_eq!(pad.size(), 64);
        assert_eq!(pad.buffer().map(|b| b.len()), Some(64));
    }
}
