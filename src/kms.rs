use {
    crate::{
        utils::errorfmt::ErrorFmt,
        video::{
            dmabuf::DmaBuf,
            drm::{
                DrmBlob, DrmCardResources, DrmConnector, DrmConnectorInfo, DrmCrtc, DrmCrtcInfo,
                DrmEncoder, DrmEncoderInfo, DrmError, DrmFb, DrmModeInfo, DrmObject, DrmPlane,
                DrmPlaneInfo, DrmProperty, DrmPropertyDefinition, DrmPropertyValue,
            },
        },
    },
    std::{
        fmt::{Debug, Formatter},
        rc::Rc,
    },
    uapi::Packed,
};

/// Kernel mode-setting operations.
///
/// [`Drm`](crate::video::drm::Drm) implements this with ioctls on a DRM node. The
/// renderer only ever talks to the kernel through this trait.
pub trait Kms {
    fn get_resources(&self) -> Result<DrmCardResources, DrmError>;
    fn get_connector_info(&self, connector: DrmConnector) -> Result<DrmConnectorInfo, DrmError>;
    fn get_encoder_info(&self, encoder: DrmEncoder) -> Result<DrmEncoderInfo, DrmError>;
    fn get_crtc_info(&self, crtc: DrmCrtc) -> Result<DrmCrtcInfo, DrmError>;
    fn get_planes(&self) -> Result<Vec<DrmPlane>, DrmError>;
    fn get_plane_info(&self, plane: DrmPlane) -> Result<DrmPlaneInfo, DrmError>;
    fn get_properties(&self, obj: u32, ty: u32) -> Result<Vec<DrmPropertyValue>, DrmError>;
    fn get_property(&self, prop: DrmProperty) -> Result<DrmPropertyDefinition, DrmError>;
    fn create_blob(&self, data: &[u8]) -> Result<DrmBlob, DrmError>;
    fn destroy_blob(&self, blob: DrmBlob) -> Result<(), DrmError>;
    fn atomic(
        &self,
        flags: u32,
        objects: &[u32],
        object_lengths: &[u32],
        props: &[u32],
        values: &[u64],
    ) -> Result<(), DrmError>;
    fn set_crtc(
        &self,
        crtc: DrmCrtc,
        fb: DrmFb,
        x: u32,
        y: u32,
        connectors: &[DrmConnector],
        mode: Option<&DrmModeInfo>,
    ) -> Result<(), DrmError>;
    fn set_master(&self) -> Result<(), DrmError>;
    fn drop_master(&self) -> Result<(), DrmError>;
    fn add_fb(&self, dma: &DmaBuf) -> Result<DrmFb, DrmError>;
    fn rm_fb(&self, fb: DrmFb) -> Result<(), DrmError>;
}

pub fn get_properties<T: DrmObject>(
    kms: &dyn Kms,
    t: T,
) -> Result<Vec<DrmPropertyValue>, DrmError> {
    kms.get_properties(t.id(), T::TYPE)
}

/// A property blob that is destroyed when dropped.
pub struct PropBlob {
    kms: Rc<dyn Kms>,
    id: DrmBlob,
}

impl PropBlob {
    pub fn new<T: Packed + ?Sized>(kms: &Rc<dyn Kms>, t: &T) -> Result<Self, DrmError> {
        let id = kms.create_blob(uapi::as_bytes(t))?;
        Ok(Self {
            kms: kms.clone(),
            id,
        })
    }

    pub fn id(&self) -> DrmBlob {
        self.id
    }
}

impl Debug for PropBlob {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PropBlob").field(&self.id).finish()
    }
}

impl Drop for PropBlob {
    fn drop(&mut self) {
        if let Err(e) = self.kms.destroy_blob(self.id) {
            log::error!("Could not destroy blob: {}", ErrorFmt(e));
        }
    }
}

/// A framebuffer that is removed when dropped.
pub struct DrmFramebuffer {
    kms: Rc<dyn Kms>,
    fb: DrmFb,
}

impl DrmFramebuffer {
    pub fn new(kms: &Rc<dyn Kms>, dma: &DmaBuf) -> Result<Self, DrmError> {
        let fb = kms.add_fb(dma)?;
        Ok(Self {
            kms: kms.clone(),
            fb,
        })
    }

    pub fn id(&self) -> DrmFb {
        self.fb
    }
}

impl Debug for DrmFramebuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrmFramebuffer")
            .field("fb", &self.fb)
            .finish_non_exhaustive()
    }
}

impl Drop for DrmFramebuffer {
    fn drop(&mut self) {
        if let Err(e) = self.kms.rm_fb(self.fb) {
            log::error!("Could not delete framebuffer: {}", ErrorFmt(e));
        }
    }
}

/// An atomic request under construction.
pub struct Change {
    kms: Rc<dyn Kms>,
    objects: Vec<u32>,
    object_lengths: Vec<u32>,
    props: Vec<u32>,
    values: Vec<u64>,
}

pub struct ObjectChange<'a> {
    change: &'a mut Change,
}

impl Change {
    pub fn new(kms: &Rc<dyn Kms>) -> Self {
        Self {
            kms: kms.clone(),
            objects: vec![],
            object_lengths: vec![],
            props: vec![],
            values: vec![],
        }
    }

    pub fn commit(&self, flags: u32) -> Result<(), DrmError> {
        if self.objects.is_empty() {
            return Ok(());
        }
        self.kms.atomic(
            flags,
            &self.objects,
            &self.object_lengths,
            &self.props,
            &self.values,
        )
    }

    pub fn change_object<T, F>(&mut self, obj: T, f: F)
    where
        T: DrmObject,
        F: FnOnce(&mut ObjectChange),
    {
        let old_len = self.props.len();
        let mut oc = ObjectChange { change: self };
        f(&mut oc);
        if self.props.len() > old_len {
            let new = (self.props.len() - old_len) as u32;
            match self.object_lengths.last_mut() {
                Some(len) if self.objects.last() == Some(&obj.id()) => *len += new,
                _ => {
                    self.objects.push(obj.id());
                    self.object_lengths.push(new);
                }
            }
        }
    }
}

impl ObjectChange<'_> {
    pub fn change(&mut self, property_id: DrmProperty, value: u64) {
        self.change.props.push(property_id.0);
        self.change.values.push(value);
    }
}
