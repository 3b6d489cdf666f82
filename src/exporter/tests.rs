use {
    crate::{
        exporter::{ExportError, Exporter, PrimeExporter},
        format::NV12,
        surface::MemId,
        video::{
            LINEAR_MODIFIER,
            dmabuf::{DmaBuf, DmaBufPlane, PlaneVec},
        },
    },
    std::rc::Rc,
    uapi::c,
};

fn buffer() -> DmaBuf {
    let fd = Rc::new(uapi::memfd_create("exporter-test", c::MFD_CLOEXEC).unwrap());
    let mut planes = PlaneVec::new();
    planes.push(DmaBufPlane {
        offset: 0,
        stride: 1920,
        fd: fd.clone(),
    });
    planes.push(DmaBufPlane {
        offset: 1920 * 1080,
        stride: 1920,
        fd,
    });
    DmaBuf {
        width: 1920,
        height: 1080,
        format: NV12,
        modifier: LINEAR_MODIFIER,
        planes,
    }
}

#[test]
fn acquire_release() {
    let exporter = PrimeExporter::new();
    let original = buffer();
    let original_fd = original.planes[0].fd.raw();
    exporter.register(MemId(1), original);
    let buf = exporter.acquire(MemId(1)).unwrap();
    assert_eq!(buf.planes.len(), 2);
    assert_eq!(buf.planes[1].offset, 1920 * 1080);
    assert_ne!(buf.planes[0].fd.raw(), original_fd);
    assert!(!buf.is_disjoint());
    assert!(exporter.is_acquired(MemId(1)));
    let again = exporter.acquire(MemId(1)).unwrap();
    exporter.release(MemId(1), buf);
    assert!(exporter.is_acquired(MemId(1)));
    exporter.release(MemId(1), again);
    assert!(!exporter.is_acquired(MemId(1)));
    assert!(exporter.unregister(MemId(1)).is_some());
}

#[test]
fn unknown_memory() {
    let exporter = PrimeExporter::new();
    assert!(matches!(
        exporter.acquire(MemId(7)),
        Err(ExportError::UnknownMemory(MemId(7)))
    ));
}
