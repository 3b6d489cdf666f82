#[cfg(test)]
mod tests;

use {
    crate::{
        surface::MemId,
        utils::oserror::OsError,
        video::dmabuf::{DmaBuf, DmaBufPlane, PlaneVec},
    },
    ahash::AHashMap,
    std::{cell::RefCell, rc::Rc},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Memory {0:?} has not been registered")]
    UnknownMemory(MemId),
    #[error("Memory {0:?} has no planes")]
    NoPlanes(MemId),
    #[error("Could not duplicate a dma-buf fd")]
    Dup(#[source] OsError),
}

/// Gives the renderer access to frame memory owned by the allocator.
///
/// Every successful `acquire` is paired with exactly one `release` once the display no
/// longer references the buffer.
pub trait Exporter {
    fn acquire(&self, mem: MemId) -> Result<DmaBuf, ExportError>;
    fn release(&self, mem: MemId, buf: DmaBuf);
}

/// An exporter over buffers the allocator has already exported as dma-bufs.
#[derive(Default)]
pub struct PrimeExporter {
    buffers: RefCell<AHashMap<MemId, DmaBuf>>,
    outstanding: RefCell<AHashMap<MemId, usize>>,
}

impl PrimeExporter {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn register(&self, mem: MemId, buf: DmaBuf) {
        log::debug!(
            "Registering {:?}: {}x{} {} with {} plane(s), disjoint: {}",
            mem,
            buf.width,
            buf.height,
            buf.format.name,
            buf.planes.len(),
            buf.is_disjoint(),
        );
        self.buffers.borrow_mut().insert(mem, buf);
    }

    pub fn unregister(&self, mem: MemId) -> Option<DmaBuf> {
        if self.is_acquired(mem) {
            log::warn!("Unregistering {:?} while it is still displayed", mem);
        }
        self.buffers.borrow_mut().remove(&mem)
    }

    pub fn is_acquired(&self, mem: MemId) -> bool {
        self.outstanding.borrow().contains_key(&mem)
    }
}

impl Exporter for PrimeExporter {
    fn acquire(&self, mem: MemId) -> Result<DmaBuf, ExportError> {
        let buffers = self.buffers.borrow();
        let Some(buf) = buffers.get(&mem) else {
            return Err(ExportError::UnknownMemory(mem));
        };
        if buf.planes.is_empty() {
            return Err(ExportError::NoPlanes(mem));
        }
        let mut planes = PlaneVec::new();
        for plane in &buf.planes {
            let fd = uapi::fcntl_dupfd_cloexec(plane.fd.raw(), 0)
                .map_err(|e| ExportError::Dup(e.into()))?;
            planes.push(DmaBufPlane {
                offset: plane.offset,
                stride: plane.stride,
                fd: Rc::new(fd),
            });
        }
        *self.outstanding.borrow_mut().entry(mem).or_default() += 1;
        Ok(DmaBuf {
            planes,
            ..buf.clone()
        })
    }

    fn release(&self, mem: MemId, buf: DmaBuf) {
        let mut outstanding = self.outstanding.borrow_mut();
        match outstanding.get_mut(&mem) {
            Some(n) if *n > 1 => *n -= 1,
            Some(_) => {
                outstanding.remove(&mem);
            }
            None => log::warn!("Released {:?} which was not acquired", mem),
        }
        drop(buf);
    }
}
