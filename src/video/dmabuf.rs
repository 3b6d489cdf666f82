use {
    crate::{format::Format, video::Modifier},
    arrayvec::ArrayVec,
    std::rc::Rc,
    uapi::OwnedFd,
};

#[derive(Clone, Debug)]
pub struct DmaBufPlane {
    pub offset: u32,
    pub stride: u32,
    pub fd: Rc<OwnedFd>,
}

/// A buffer exported as one dma-buf fd per plane.
#[derive(Debug, Clone)]
pub struct DmaBuf {
    pub width: i32,
    pub height: i32,
    pub format: &'static Format,
    pub modifier: Modifier,
    pub planes: PlaneVec<DmaBufPlane>,
}

pub const MAX_PLANES: usize = 4;

pub type PlaneVec<T> = ArrayVec<T, MAX_PLANES>;

impl DmaBuf {
    pub fn is_disjoint(&self) -> bool {
        if self.planes.len() <= 1 {
            return false;
        }
        let stat = match uapi::fstat(self.planes[0].fd.raw()) {
            Ok(s) => s,
            _ => return true,
        };
        for plane in &self.planes[1..] {
            let stat2 = match uapi::fstat(plane.fd.raw()) {
                Ok(s) => s,
                _ => return true,
            };
            if stat2.st_ino != stat.st_ino {
                return true;
            }
        }
        false
    }
}
