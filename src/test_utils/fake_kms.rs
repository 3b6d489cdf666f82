use {
    crate::{
        format::Format,
        kms::Kms,
        test_utils::{Event, Journal},
        utils::{bitflags::BitflagsExt, oserror::OsError},
        video::{
            dmabuf::DmaBuf,
            drm::{
                ConnectorStatus, ConnectorType, DRM_MODE_ATOMIC_ALLOW_MODESET, DrmBlob,
                DrmCardResources, DrmConnector, DrmConnectorInfo, DrmCrtc, DrmCrtcInfo, DrmEncoder,
                DrmEncoderInfo, DrmError, DrmFb, DrmModeInfo, DrmObject, DrmPlane, DrmPlaneInfo,
                DrmProperty, DrmPropertyDefinition, DrmPropertyEnumValue, DrmPropertyType,
                DrmPropertyValue,
            },
        },
    },
    ahash::{AHashMap, AHashSet},
    std::{cell::RefCell, rc::Rc},
    uapi::c,
};

pub fn mode_1080p() -> DrmModeInfo {
    DrmModeInfo {
        clock: 148500,
        hdisplay: 1920,
        hsync_start: 2008,
        hsync_end: 2052,
        htotal: 2200,
        hskew: 0,
        vdisplay: 1080,
        vsync_start: 1084,
        vsync_end: 1089,
        vtotal: 1125,
        vscan: 0,
        vrefresh: 60,
        flags: 5,
        ty: 0x48,
        name: "1920x1080".into(),
    }
}

pub fn mode_720p() -> DrmModeInfo {
    DrmModeInfo {
        clock: 74250,
        hdisplay: 1280,
        hsync_start: 1390,
        hsync_end: 1430,
        htotal: 1650,
        hskew: 0,
        vdisplay: 720,
        vsync_start: 725,
        vsync_end: 730,
        vtotal: 750,
        vscan: 0,
        vrefresh: 60,
        flags: 5,
        ty: 0x40,
        name: "1280x720".into(),
    }
}

pub struct ConnectorOptions {
    pub hdr: bool,
    pub colorspace: bool,
    pub modes: Vec<DrmModeInfo>,
}

impl Default for ConnectorOptions {
    fn default() -> Self {
        Self {
            hdr: true,
            colorspace: true,
            modes: vec![mode_1080p(), mode_720p()],
        }
    }
}

#[derive(Default)]
struct Inner {
    next_id: u32,
    crtcs: Vec<DrmCrtcInfo>,
    encoders: Vec<DrmEncoderInfo>,
    connectors: Vec<DrmConnectorInfo>,
    planes: Vec<DrmPlaneInfo>,
    prop_defs: AHashMap<DrmProperty, DrmPropertyDefinition>,
    prop_names: AHashMap<String, DrmProperty>,
    object_props: AHashMap<u32, Vec<DrmPropertyValue>>,
    blobs: AHashMap<DrmBlob, Vec<u8>>,
    fbs: AHashSet<DrmFb>,
    master: bool,
    master_error: Option<c::c_int>,
    commit_error: Option<c::c_int>,
    blob_budget: Option<usize>,
}

impl Inner {
    fn id(&mut self) -> u32 {
        self.next_id += 1;
        100 + self.next_id
    }

    fn attach(&mut self, obj: u32, name: &str, ty: DrmPropertyType, value: u64) {
        let id = match self.prop_names.get(name) {
            Some(id) => *id,
            None => {
                let id = DrmProperty(self.id());
                self.prop_names.insert(name.to_string(), id);
                self.prop_defs.insert(
                    id,
                    DrmPropertyDefinition {
                        id,
                        name: name.into(),
                        immutable: false,
                        atomic: false,
                        ty,
                    },
                );
                id
            }
        };
        self.object_props
            .entry(obj)
            .or_default()
            .push(DrmPropertyValue { id, value });
    }

    fn value(&self, obj: u32, name: &str) -> Option<u64> {
        let id = self.prop_names.get(name)?;
        self.object_props
            .get(&obj)?
            .iter()
            .find(|p| p.id == *id)
            .map(|p| p.value)
    }
}

fn range(min: u64, max: u64) -> DrmPropertyType {
    DrmPropertyType::Range { min, max }
}

fn enumeration(values: &[(&str, u64)]) -> DrmPropertyType {
    DrmPropertyType::Enum {
        values: values
            .iter()
            .map(|(name, value)| DrmPropertyEnumValue {
                value: *value,
                name: (*name).into(),
            })
            .collect(),
        bitmask: false,
    }
}

/// An in-memory display device.
pub struct FakeKms {
    journal: Journal,
    inner: RefCell<Inner>,
}

impl FakeKms {
    pub fn new(journal: &Journal) -> Rc<Self> {
        Rc::new(Self {
            journal: journal.clone(),
            inner: Default::default(),
        })
    }

    /// Adds a CRTC that scans out a console framebuffer.
    pub fn add_crtc(&self) -> DrmCrtc {
        let inner = &mut *self.inner.borrow_mut();
        let crtc = DrmCrtc(inner.id());
        inner.crtcs.push(DrmCrtcInfo {
            crtc_id: crtc,
            fb_id: DrmFb(1),
            x: 0,
            y: 0,
            mode: Some(mode_1080p()),
        });
        inner.attach(crtc.0, "MODE_ID", DrmPropertyType::Blob, 0);
        inner.attach(crtc.0, "ACTIVE", range(0, 1), 1);
        crtc
    }

    /// Makes `crtc` look like nothing is being scanned out.
    pub fn deactivate_crtc(&self, crtc: DrmCrtc) {
        let inner = &mut *self.inner.borrow_mut();
        if let Some(info) = inner.crtcs.iter_mut().find(|c| c.crtc_id == crtc) {
            info.fb_id = DrmFb::NONE;
            info.mode = None;
        }
    }

    pub fn add_encoder(&self, possible_crtcs: u32, crtc: Option<DrmCrtc>) -> DrmEncoder {
        let inner = &mut *self.inner.borrow_mut();
        let encoder = DrmEncoder(inner.id());
        inner.encoders.push(DrmEncoderInfo {
            encoder_id: encoder,
            crtc_id: crtc.unwrap_or(DrmCrtc::NONE),
            possible_crtcs,
        });
        encoder
    }

    pub fn add_connector(
        &self,
        ty: ConnectorType,
        status: ConnectorStatus,
        encoders: &[DrmEncoder],
        options: ConnectorOptions,
    ) -> DrmConnector {
        let inner = &mut *self.inner.borrow_mut();
        let connector = DrmConnector(inner.id());
        let type_id = inner.connectors.iter().filter(|c| c.ty() == ty).count() as u32 + 1;
        let connected = status == ConnectorStatus::Connected;
        inner.connectors.push(DrmConnectorInfo {
            connector_id: connector,
            encoder_id: match connected {
                true => encoders.first().copied().unwrap_or(DrmEncoder::NONE),
                false => DrmEncoder::NONE,
            },
            encoders: encoders.to_vec(),
            modes: match connected {
                true => options.modes,
                false => vec![],
            },
            connector_type: ty.to_drm(),
            connector_type_id: type_id,
            connection: status.to_drm(),
            mm_width: 600,
            mm_height: 340,
        });
        inner.attach(
            connector.0,
            "CRTC_ID",
            DrmPropertyType::Object {
                ty: DrmCrtc::TYPE,
            },
            0,
        );
        if options.hdr {
            inner.attach(connector.0, "HDR_OUTPUT_METADATA", DrmPropertyType::Blob, 0);
        }
        if options.colorspace {
            let ty = enumeration(&[("Default", 0), ("BT2020_RGB", 9), ("BT2020_YCC", 10)]);
            inner.attach(connector.0, "Colorspace", ty, 0);
        }
        connector
    }

    pub fn add_plane(&self, possible_crtcs: u32, formats: &[&Format]) -> DrmPlane {
        let inner = &mut *self.inner.borrow_mut();
        let plane = DrmPlane(inner.id());
        inner.planes.push(DrmPlaneInfo {
            plane_id: plane,
            crtc_id: DrmCrtc::NONE,
            fb_id: DrmFb::NONE,
            possible_crtcs,
            format_types: formats.iter().map(|f| f.drm).collect(),
        });
        let object = |ty| DrmPropertyType::Object { ty };
        inner.attach(plane.0, "type", enumeration(&[("Overlay", 0), ("Primary", 1)]), 0);
        inner.attach(plane.0, "FB_ID", object(DrmFb::TYPE), 0);
        inner.attach(plane.0, "CRTC_ID", object(DrmCrtc::TYPE), 0);
        for name in ["SRC_X", "SRC_Y", "SRC_W", "SRC_H", "CRTC_W", "CRTC_H"] {
            inner.attach(plane.0, name, range(0, u32::MAX as u64), 0);
        }
        for name in ["CRTC_X", "CRTC_Y"] {
            let ty = DrmPropertyType::SignedRange {
                min: i32::MIN as i64,
                max: i32::MAX as i64,
            };
            inner.attach(plane.0, name, ty, 0);
        }
        plane
    }

    pub fn set_master_error(&self, errno: Option<c::c_int>) {
        self.inner.borrow_mut().master_error = errno;
    }

    pub fn set_commit_error(&self, errno: Option<c::c_int>) {
        self.inner.borrow_mut().commit_error = errno;
    }

    /// Limits how many more blobs can be created.
    pub fn set_blob_budget(&self, budget: Option<usize>) {
        self.inner.borrow_mut().blob_budget = budget;
    }

    pub fn is_master(&self) -> bool {
        self.inner.borrow().master
    }

    pub fn live_blobs(&self) -> Vec<(DrmBlob, usize)> {
        let mut blobs: Vec<_> = self
            .inner
            .borrow()
            .blobs
            .iter()
            .map(|(b, data)| (*b, data.len()))
            .collect();
        blobs.sort_by_key(|(b, _)| b.0);
        blobs
    }

    pub fn blob_data(&self, blob: DrmBlob) -> Option<Vec<u8>> {
        self.inner.borrow().blobs.get(&blob).cloned()
    }

    /// Removes `name` from the properties of `obj`.
    pub fn remove_property<T: DrmObject>(&self, obj: T, name: &str) {
        let inner = &mut *self.inner.borrow_mut();
        let Some(&id) = inner.prop_names.get(name) else {
            return;
        };
        if let Some(props) = inner.object_props.get_mut(&obj.id()) {
            props.retain(|p| p.id != id);
        }
    }

    pub fn live_fbs(&self) -> Vec<DrmFb> {
        self.inner.borrow().fbs.iter().copied().collect()
    }

    pub fn value<T: DrmObject>(&self, obj: T, name: &str) -> Option<u64> {
        self.inner.borrow().value(obj.id(), name)
    }

    fn lookup<T: Clone>(
        items: &[T],
        f: impl Fn(&T) -> bool,
        err: fn(OsError) -> DrmError,
    ) -> Result<T, DrmError> {
        match items.iter().find(|i| f(i)) {
            Some(i) => Ok(i.clone()),
            None => Err(err(OsError(c::ENOENT))),
        }
    }
}

impl Kms for FakeKms {
    fn get_resources(&self) -> Result<DrmCardResources, DrmError> {
        let inner = self.inner.borrow();
        Ok(DrmCardResources {
            min_width: 0,
            max_width: 16384,
            min_height: 0,
            max_height: 16384,
            crtcs: inner.crtcs.iter().map(|c| c.crtc_id).collect(),
            connectors: inner.connectors.iter().map(|c| c.connector_id).collect(),
            encoders: inner.encoders.iter().map(|e| e.encoder_id).collect(),
        })
    }

    fn get_connector_info(&self, connector: DrmConnector) -> Result<DrmConnectorInfo, DrmError> {
        let inner = self.inner.borrow();
        Self::lookup(
            &inner.connectors,
            |c| c.connector_id == connector,
            DrmError::GetConnector,
        )
    }

    fn get_encoder_info(&self, encoder: DrmEncoder) -> Result<DrmEncoderInfo, DrmError> {
        let inner = self.inner.borrow();
        Self::lookup(
            &inner.encoders,
            |e| e.encoder_id == encoder,
            DrmError::GetEncoder,
        )
    }

    fn get_crtc_info(&self, crtc: DrmCrtc) -> Result<DrmCrtcInfo, DrmError> {
        let inner = self.inner.borrow();
        Self::lookup(&inner.crtcs, |c| c.crtc_id == crtc, DrmError::GetCrtc)
    }

    fn get_planes(&self) -> Result<Vec<DrmPlane>, DrmError> {
        Ok(self.inner.borrow().planes.iter().map(|p| p.plane_id).collect())
    }

    fn get_plane_info(&self, plane: DrmPlane) -> Result<DrmPlaneInfo, DrmError> {
        let inner = self.inner.borrow();
        Self::lookup(&inner.planes, |p| p.plane_id == plane, DrmError::GetPlane)
    }

    fn get_properties(&self, obj: u32, _ty: u32) -> Result<Vec<DrmPropertyValue>, DrmError> {
        match self.inner.borrow().object_props.get(&obj) {
            Some(props) => Ok(props.clone()),
            None => Err(DrmError::GetProperties(OsError(c::ENOENT))),
        }
    }

    fn get_property(&self, prop: DrmProperty) -> Result<DrmPropertyDefinition, DrmError> {
        match self.inner.borrow().prop_defs.get(&prop) {
            Some(def) => Ok(def.clone()),
            None => Err(DrmError::GetProperty(OsError(c::ENOENT))),
        }
    }

    fn create_blob(&self, data: &[u8]) -> Result<DrmBlob, DrmError> {
        let inner = &mut *self.inner.borrow_mut();
        if let Some(budget) = &mut inner.blob_budget {
            if *budget == 0 {
                return Err(DrmError::CreateBlob(OsError(c::ENOMEM)));
            }
            *budget -= 1;
        }
        let blob = DrmBlob(inner.id());
        inner.blobs.insert(blob, data.to_vec());
        self.journal.push(Event::CreateBlob {
            blob,
            len: data.len(),
        });
        Ok(blob)
    }

    fn destroy_blob(&self, blob: DrmBlob) -> Result<(), DrmError> {
        if self.inner.borrow_mut().blobs.remove(&blob).is_none() {
            return Err(DrmError::DestroyBlob(OsError(c::ENOENT)));
        }
        self.journal.push(Event::DestroyBlob(blob));
        Ok(())
    }

    fn atomic(
        &self,
        flags: u32,
        objects: &[u32],
        object_lengths: &[u32],
        props: &[u32],
        values: &[u64],
    ) -> Result<(), DrmError> {
        let inner = &mut *self.inner.borrow_mut();
        let einval = || DrmError::Atomic(OsError(c::EINVAL));
        if let Some(e) = inner.commit_error {
            return Err(DrmError::Atomic(OsError(e)));
        }
        let modeset = flags.contains(DRM_MODE_ATOMIC_ALLOW_MODESET);
        if modeset && !inner.master {
            return Err(DrmError::Atomic(OsError(c::EACCES)));
        }
        let mut changes = vec![];
        let mut pos = 0;
        for (obj, len) in objects.iter().zip(object_lengths) {
            for idx in pos..pos + *len as usize {
                let (prop, value) = (DrmProperty(props[idx]), values[idx]);
                let attached = inner.object_props.get(obj).ok_or_else(einval)?;
                if attached.iter().all(|p| p.id != prop) {
                    return Err(einval());
                }
                let def = inner.prop_defs.get(&prop).ok_or_else(einval)?;
                let name = def.name.to_string();
                if matches!(def.ty, DrmPropertyType::Blob)
                    && value != 0
                    && !inner.blobs.contains_key(&DrmBlob(value as u32))
                {
                    return Err(einval());
                }
                if name == "FB_ID" && value != 0 && !inner.fbs.contains(&DrmFb(value as u32)) {
                    return Err(einval());
                }
                if matches!(name.as_str(), "MODE_ID" | "ACTIVE") && !modeset {
                    return Err(einval());
                }
                changes.push((*obj, name, value));
            }
            pos += *len as usize;
        }
        for (obj, name, value) in &changes {
            let Some(&id) = inner.prop_names.get(name.as_str()) else {
                continue;
            };
            if let Some(props) = inner.object_props.get_mut(obj) {
                for p in props.iter_mut().filter(|p| p.id == id) {
                    p.value = *value;
                }
            }
        }
        self.journal.push(Event::Commit { flags, changes });
        Ok(())
    }

    fn set_crtc(
        &self,
        crtc: DrmCrtc,
        fb: DrmFb,
        x: u32,
        y: u32,
        _connectors: &[DrmConnector],
        mode: Option<&DrmModeInfo>,
    ) -> Result<(), DrmError> {
        let inner = &mut *self.inner.borrow_mut();
        if !inner.master {
            return Err(DrmError::SetCrtc(OsError(c::EACCES)));
        }
        let Some(info) = inner.crtcs.iter_mut().find(|c| c.crtc_id == crtc) else {
            return Err(DrmError::SetCrtc(OsError(c::ENOENT)));
        };
        info.fb_id = fb;
        info.x = x;
        info.y = y;
        info.mode = mode.cloned();
        self.journal.push(Event::SetCrtc { crtc, fb });
        Ok(())
    }

    fn set_master(&self) -> Result<(), DrmError> {
        let inner = &mut *self.inner.borrow_mut();
        if let Some(e) = inner.master_error {
            self.journal.push(Event::SetMaster { ok: false });
            return Err(DrmError::SetMaster(OsError(e)));
        }
        inner.master = true;
        self.journal.push(Event::SetMaster { ok: true });
        Ok(())
    }

    fn drop_master(&self) -> Result<(), DrmError> {
        let inner = &mut *self.inner.borrow_mut();
        if !inner.master {
            return Err(DrmError::DropMaster(OsError(c::EINVAL)));
        }
        inner.master = false;
        self.journal.push(Event::DropMaster);
        Ok(())
    }

    fn add_fb(&self, dma: &DmaBuf) -> Result<DrmFb, DrmError> {
        if dma.planes.is_empty() {
            return Err(DrmError::AddFb(OsError(c::EINVAL)));
        }
        let inner = &mut *self.inner.borrow_mut();
        let fb = DrmFb(inner.id());
        inner.fbs.insert(fb);
        self.journal.push(Event::AddFb(fb));
        Ok(fb)
    }

    fn rm_fb(&self, fb: DrmFb) -> Result<(), DrmError> {
        if !self.inner.borrow_mut().fbs.remove(&fb) {
            return Err(DrmError::RmFb(OsError(c::ENOENT)));
        }
        self.journal.push(Event::RmFb(fb));
        Ok(())
    }
}
