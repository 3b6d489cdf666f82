pub mod fake_exporter;
pub mod fake_kms;

use {
    crate::{
        surface::MemId,
        video::drm::{DrmBlob, DrmCrtc, DrmFb},
    },
    std::{cell::RefCell, rc::Rc},
};

/// A kernel or allocator call observed by the fakes.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SetMaster { ok: bool },
    DropMaster,
    CreateBlob { blob: DrmBlob, len: usize },
    DestroyBlob(DrmBlob),
    AddFb(DrmFb),
    RmFb(DrmFb),
    Commit { flags: u32, changes: Vec<(u32, String, u64)> },
    SetCrtc { crtc: DrmCrtc, fb: DrmFb },
    Acquire(MemId),
    Release(MemId),
}

#[derive(Clone, Default)]
pub struct Journal {
    events: Rc<RefCell<Vec<Event>>>,
}

impl Journal {
    pub fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn position(&self, f: impl Fn(&Event) -> bool) -> Option<usize> {
        self.events.borrow().iter().position(f)
    }

    pub fn count(&self, f: impl Fn(&Event) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| f(e)).count()
    }

    pub fn commits(&self) -> Vec<(u32, Vec<(u32, String, u64)>)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Event::Commit { flags, changes } => Some((*flags, changes.clone())),
                _ => None,
            })
            .collect()
    }
}
