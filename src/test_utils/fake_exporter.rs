use {
    crate::{
        exporter::{ExportError, Exporter},
        format::NV12,
        surface::MemId,
        test_utils::{Event, Journal},
        video::{
            LINEAR_MODIFIER,
            dmabuf::{DmaBuf, DmaBufPlane, PlaneVec},
        },
    },
    ahash::{AHashMap, AHashSet},
    std::{cell::RefCell, rc::Rc},
    uapi::c,
};

/// Hands out memfd-backed buffers and records acquire/release calls.
pub struct FakeExporter {
    journal: Journal,
    outstanding: RefCell<AHashMap<MemId, usize>>,
    broken: RefCell<AHashSet<MemId>>,
}

impl FakeExporter {
    pub fn new(journal: &Journal) -> Rc<Self> {
        Rc::new(Self {
            journal: journal.clone(),
            outstanding: Default::default(),
            broken: Default::default(),
        })
    }

    /// Makes `acquire` fail for `mem`.
    pub fn break_memory(&self, mem: MemId) {
        self.broken.borrow_mut().insert(mem);
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.borrow().values().sum()
    }

    pub fn is_outstanding(&self, mem: MemId) -> bool {
        self.outstanding.borrow().contains_key(&mem)
    }
}

impl Exporter for FakeExporter {
    fn acquire(&self, mem: MemId) -> Result<DmaBuf, ExportError> {
        if self.broken.borrow().contains(&mem) {
            return Err(ExportError::UnknownMemory(mem));
        }
        let fd = Rc::new(uapi::memfd_create("fake-dmabuf", c::MFD_CLOEXEC).unwrap());
        let mut planes = PlaneVec::new();
        for offset in [0, 1920 * 1080] {
            planes.push(DmaBufPlane {
                offset,
                stride: 1920,
                fd: fd.clone(),
            });
        }
        *self.outstanding.borrow_mut().entry(mem).or_default() += 1;
        self.journal.push(Event::Acquire(mem));
        Ok(DmaBuf {
            width: 1920,
            height: 1080,
            format: NV12,
            modifier: LINEAR_MODIFIER,
            planes,
        })
    }

    fn release(&self, mem: MemId, _buf: DmaBuf) {
        let mut outstanding = self.outstanding.borrow_mut();
        let n = outstanding.get_mut(&mem).expect("released memory that was not acquired");
        *n -= 1;
        if *n == 0 {
            outstanding.remove(&mem);
        }
        self.journal.push(Event::Release(mem));
    }
}
